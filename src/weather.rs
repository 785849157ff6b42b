//! 海況モデル
//!
//! 受容体格子の各セルの海況（0〜14）を一定周期で更新します。
//! 海況は探知距離と乗り込み成功率を減衰させます。

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::random::SimRng;
use crate::receptors::ReceptorGrid;

pub const SEA_STATE_COUNT: usize = 15;

/// 海況の遷移確率行列（行: 現在の海況, 列: 次の海況）
pub const SEA_STATE_TRANSITIONS: [[f64; SEA_STATE_COUNT]; SEA_STATE_COUNT] = [
    [0.86797, 0.13202, 1e-05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.01759, 0.91031, 0.072, 0.0001, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.00028, 0.07991, 0.84874, 0.07046, 0.0006, 1e-05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.00012, 0.00891, 0.20346, 0.67584, 0.10752, 0.00405, 9e-05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [6e-05, 0.00465, 0.0558, 0.27422, 0.49631, 0.1529, 0.01496, 0.00106, 4e-05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1e-05, 0.00211, 0.02767, 0.12292, 0.30308, 0.37542, 0.13974, 0.02456, 0.00385, 0.00054, 9e-05, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.00064, 0.018, 0.07771, 0.15775, 0.28886, 0.28494, 0.13138, 0.03085, 0.00733, 0.00195, 0.00061, 0.0, 0.0, 0.0],
    [0.0, 0.00027, 0.01244, 0.05629, 0.10846, 0.18872, 0.25432, 0.20376, 0.11955, 0.04385, 0.00886, 0.00304, 0.00045, 0.0, 0.0],
    [0.0, 0.0, 0.00566, 0.05019, 0.08571, 0.11737, 0.19562, 0.19614, 0.14466, 0.1323, 0.06178, 0.00927, 0.00103, 0.00026, 0.0],
    [0.0, 0.0, 0.00112, 0.03652, 0.05506, 0.08708, 0.14944, 0.19663, 0.1309, 0.12978, 0.14888, 0.0573, 0.00618, 0.00056, 0.00056],
    [0.0, 0.0, 0.0, 0.01331, 0.04197, 0.04606, 0.07062, 0.14944, 0.19345, 0.13204, 0.14637, 0.15967, 0.03992, 0.00716, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.01843, 0.03456, 0.06452, 0.07834, 0.12903, 0.19124, 0.27419, 0.15207, 0.0553, 0.0, 0.0023],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.01111, 0.04444, 0.05556, 0.08889, 0.21111, 0.34444, 0.17778, 0.06667, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1, 0.1, 0.2, 0.3, 0.2, 0.0, 0.1, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0],
];

/// 海況ごとの探知減衰係数（6以上は最終値で頭打ち）
pub const DEFAULT_SEA_STATE_ATTENUATION: [f64; 7] = [1.0, 0.89, 0.77, 0.68, 0.62, 0.53, 0.47];

/// 減衰表から海況に対応する係数を引く。表の範囲外は末尾の値
pub fn sea_state_attenuation(table: &[f64], sea_state: u8) -> f64 {
    table
        .get(sea_state as usize)
        .or_else(|| table.last())
        .copied()
        .unwrap_or(1.0)
}

/// 海況の次状態を決めるサンプラ
pub trait SeaStateSampler: std::fmt::Debug + Send + Sync {
    fn next_state(&self, current: u8, rng: &mut SimRng) -> u8;

    fn name(&self) -> &'static str;
}

/// 遷移確率行列によるマルコフ連鎖
#[derive(Debug, Clone)]
pub struct MarkovWeather {
    transitions: [[f64; SEA_STATE_COUNT]; SEA_STATE_COUNT],
}

impl MarkovWeather {
    pub fn new(transitions: [[f64; SEA_STATE_COUNT]; SEA_STATE_COUNT]) -> Self {
        Self { transitions }
    }
}

impl Default for MarkovWeather {
    fn default() -> Self {
        Self::new(SEA_STATE_TRANSITIONS)
    }
}

impl SeaStateSampler for MarkovWeather {
    fn next_state(&self, current: u8, rng: &mut SimRng) -> u8 {
        let row = &self.transitions[(current as usize).min(SEA_STATE_COUNT - 1)];
        rng.weighted_index(row).map(|i| i as u8).unwrap_or(current)
    }

    fn name(&self) -> &'static str {
        "markov"
    }
}

/// 海況を変化させない
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticWeather;

impl SeaStateSampler for StaticWeather {
    fn next_state(&self, current: u8, _rng: &mut SimRng) -> u8 {
        current
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherModel {
    #[default]
    Markov,
    Static,
}

impl WeatherModel {
    pub fn sampler(self) -> Box<dyn SeaStateSampler> {
        match self {
            WeatherModel::Markov => Box::new(MarkovWeather::default()),
            WeatherModel::Static => Box::new(StaticWeather),
        }
    }
}

/// 全セルの海況を1段階進める
pub fn update_sea_states(grid: &mut ReceptorGrid, sampler: &dyn SeaStateSampler, rng: &mut SimRng) {
    let mut histogram = [0usize; SEA_STATE_COUNT];
    for receptor in grid.receptors_mut() {
        receptor.sea_state = sampler.next_state(receptor.sea_state, rng);
        histogram[(receptor.sea_state as usize).min(SEA_STATE_COUNT - 1)] += 1;
    }
    debug!(sampler = sampler.name(), histogram = ?histogram, "WEATHER_UPDATED: 海況を更新しました");
}
