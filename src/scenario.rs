use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{
    BoardingSettings, DetectionConfig, EngagementConfig, MunitionEntry, Posture, Side, SizeClass, Skill,
};
use crate::receptors::PheromoneSettings;
use crate::routing::MovementDomain;
use crate::weather::WeatherModel;

/// シナリオメタデータ
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

/// シミュレーション設定（時間の単位は時間 h）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub dt_h: f64,
    pub t_max_h: f64,
    pub seed: u64,
    /// 1ターン内ループの反復上限
    pub iteration_limit: usize,
    /// 帰投判定・探知フェーズを並列実行するか
    pub parallel: bool,
    /// 支援要請の通信遅延
    pub communication_delay_h: f64,
    /// 帰投判定の安全係数
    pub safety_endurance: f64,
    /// 追尾中のルート再計算間隔
    pub route_refresh_h: f64,
    /// 海況の更新間隔
    pub weather_update_h: f64,
    /// 行動不能時の整備時間倍率
    pub ctl_repair_factor: f64,
    /// 哨戒点の最小間隔（度）
    pub patrol_spacing: f64,
    /// 哨戒点選択時にフェロモンを集計する半径 (km)
    pub pheromone_radius_km: f64,
    /// 哨戒点選択時の候補数
    pub patrol_candidates: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt_h: 0.25,
            t_max_h: 168.0,
            seed: 42,
            iteration_limit: 500,
            parallel: true,
            communication_delay_h: 0.25,
            safety_endurance: 1.1,
            route_refresh_h: 1.0,
            weather_update_h: 7.0,
            ctl_repair_factor: 4.0,
            patrol_spacing: 0.5,
            pheromone_radius_km: 30.0,
            patrol_candidates: 10,
        }
    }
}

/// 作戦領域（経度・緯度）
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AreaConfig {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// 世界設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    pub area: AreaConfig,
    #[serde(default = "default_grid_cell")]
    pub grid_cell: f64,
    /// 作戦領域の外側に張る格子の幅（度）
    #[serde(default = "default_grid_padding")]
    pub grid_padding: f64,
    #[serde(default = "default_sea_state")]
    pub initial_sea_state: u8,
    #[serde(default)]
    pub weather: WeatherModel,
    #[serde(default)]
    pub pheromones: PheromoneSettings,
}

fn default_grid_cell() -> f64 {
    0.1
}

fn default_grid_padding() -> f64 {
    6.0
}

fn default_sea_state() -> u8 {
    2
}

/// 名前付き多角形（陸地）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolygonConfig {
    pub name: String,
    pub points: Vec<[f64; 2]>,
}

/// 陣営・移動区分ごとの経路探索で避ける領域
///
/// 陸地は常に障害物。`avoid_zones` に挙げたゾーンが追加される。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingLayerConfig {
    pub side: Side,
    pub domain: MovementDomain,
    #[serde(default)]
    pub avoid_zones: Vec<String>,
}

/// ゾーン（優先順に記述する）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZoneConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub points: Vec<[f64; 2]>,
    /// 待機ゾーンかどうか
    #[serde(default)]
    pub holding: bool,
    /// 哨戒点を除去する内側のゾーン
    #[serde(default)]
    pub carve_out: Vec<String>,
}

/// 陣営ごとのエスカレーションレベル
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub coalition: u8,
    pub hunter: u8,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self { coalition: 1, hunter: 1 }
    }
}

impl EscalationConfig {
    pub fn level(&self, side: Side) -> u8 {
        match side {
            Side::Coalition => self.coalition,
            Side::Hunter | Side::Neutral => self.hunter,
        }
    }

    pub fn set(&mut self, side: Side, level: u8) {
        match side {
            Side::Coalition => self.coalition = level,
            Side::Hunter => self.hunter = level,
            Side::Neutral => {}
        }
    }
}

/// 交戦規定コード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoeCode {
    /// 常に交戦可
    Always,
    /// 目標が交戦中の場合のみ
    IfInCombat,
    /// 目標が無人機の場合のみ
    IfUnmanned,
    Never,
}

impl RoeCode {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => RoeCode::Always,
            2 => RoeCode::IfInCombat,
            3 => RoeCode::IfUnmanned,
            _ => RoeCode::Never,
        }
    }
}

/// エスカレーション → 種別 → ゾーン → 値
pub type EscalationTable<T> = BTreeMap<u8, BTreeMap<String, BTreeMap<String, T>>>;

/// ゾーン割り当ての重み（陣営別）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ZoneAssignmentConfig {
    pub coalition: EscalationTable<f64>,
    pub hunter: EscalationTable<f64>,
}

impl ZoneAssignmentConfig {
    pub fn table(&self, side: Side) -> Option<&EscalationTable<f64>> {
        match side {
            Side::Coalition => Some(&self.coalition),
            Side::Hunter => Some(&self.hunter),
            Side::Neutral => None,
        }
    }
}

/// 交戦規定の設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RulesConfig {
    /// 連合側の交戦規定コード（1: 常時, 2: 交戦中のみ, 3: 無人機のみ, 4: 不可）
    pub coalition_roe: EscalationTable<u8>,
    /// 追跡側が目標とできる種別（未定義は可）
    pub hunter_targets: BTreeMap<String, bool>,
    /// 追跡側が目標を攻撃できないゾーン
    pub hunter_illegal_zones: Vec<String>,
    /// 商船には乗り込みのみ行う
    pub boarding_only: bool,
    pub zone_assignment: ZoneAssignmentConfig,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            coalition_roe: BTreeMap::new(),
            hunter_targets: BTreeMap::new(),
            hunter_illegal_zones: Vec::new(),
            boarding_only: true,
            zone_assignment: ZoneAssignmentConfig::default(),
        }
    }
}

impl RulesConfig {
    pub fn coalition_code(&self, escalation: u8, combat_type: &str, zone: &str) -> RoeCode {
        self.coalition_roe
            .get(&escalation)
            .and_then(|by_type| by_type.get(combat_type))
            .and_then(|by_zone| by_zone.get(zone))
            .map(|code| RoeCode::from_code(*code))
            .unwrap_or(RoeCode::Never)
    }

    pub fn hunter_may_target(&self, combat_type: &str) -> bool {
        self.hunter_targets.get(combat_type).copied().unwrap_or(true)
    }

    /// 種別のゾーン割り当て重み（ゾーンID, 重み）
    pub fn zone_weights(&self, side: Side, escalation: u8, combat_type: &str) -> Vec<(String, f64)> {
        self.zone_assignment
            .table(side)
            .and_then(|t| t.get(&escalation))
            .and_then(|by_type| by_type.get(combat_type))
            .map(|by_zone| by_zone.iter().map(|(z, w)| (z.clone(), *w)).collect())
            .unwrap_or_default()
    }

    pub fn zone_weight(&self, side: Side, escalation: u8, combat_type: &str, zone: &str) -> f64 {
        self.zone_assignment
            .table(side)
            .and_then(|t| t.get(&escalation))
            .and_then(|by_type| by_type.get(combat_type))
            .and_then(|by_zone| by_zone.get(zone))
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    #[default]
    Ship,
    Aircraft,
    Submarine,
}

/// モデル（艦種・機種）ごとの諸元
///
/// 省略したキーは既定値になります。技能を省略した区分は探知・攻撃不能です。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: PlatformKind,
    /// 交戦規定・確率表で用いる種別（省略時はモデル名）
    pub combat_type: Option<String>,
    pub service: String,
    /// km/h
    pub cruising_speed: f64,
    pub max_speed: f64,
    /// km
    pub endurance: f64,
    /// h
    pub maintenance_time: f64,
    pub visibility: SizeClass,
    pub surface_detection: Option<Skill>,
    pub air_detection: Option<Skill>,
    pub subsurface_detection: Option<Skill>,
    pub anti_surface: Option<Skill>,
    pub anti_air: Option<Skill>,
    pub anti_subsurface: Option<Skill>,
    pub anti_surface_ammunition: u32,
    pub anti_air_ammunition: u32,
    pub anti_subsurface_ammunition: u32,
    pub helicopter: bool,
    pub aws: bool,
    pub manned: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: PlatformKind::Ship,
            combat_type: None,
            service: "Navy".to_string(),
            cruising_speed: 30.0,
            max_speed: 55.0,
            endurance: 5000.0,
            maintenance_time: 24.0,
            visibility: SizeClass::Medium,
            surface_detection: None,
            air_detection: None,
            subsurface_detection: None,
            anti_surface: None,
            anti_air: None,
            anti_subsurface: None,
            anti_surface_ammunition: 6,
            anti_air_ammunition: 6,
            anti_subsurface_ammunition: 6,
            helicopter: false,
            aws: false,
            manned: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BaseConfig {
    pub name: String,
    pub location: [f64; 2],
    #[serde(default = "default_share")]
    pub share: f64,
}

fn default_share() -> f64 {
    1.0
}

/// 艦隊構成（モデル × 隻数）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FleetConfig {
    pub model: String,
    pub count: u32,
    /// 予備として待機させる隻数
    #[serde(default)]
    pub reserve: u32,
    /// 配備基地（省略時は比率で割り当て）
    #[serde(default)]
    pub base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagerConfig {
    pub name: String,
    pub side: Side,
    #[serde(default = "default_utilisation")]
    pub utilisation: f64,
    pub bases: Vec<BaseConfig>,
    #[serde(default)]
    pub fleets: Vec<FleetConfig>,
    #[serde(default)]
    pub ammunition: Vec<MunitionEntry>,
}

fn default_utilisation() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MerchantTypeConfig {
    pub name: String,
    /// 1週間あたりの平均到着数
    pub weekly_arrivals: f64,
    /// km/h
    pub speed: f64,
    #[serde(default)]
    pub visibility: SizeClass,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CountryConfig {
    pub name: String,
    pub share: f64,
    /// 追跡側のエスカレーションレベルごとの対応方針（未定義は従う）
    #[serde(default)]
    pub postures: BTreeMap<u8, Posture>,
}

impl CountryConfig {
    pub fn posture(&self, escalation: u8) -> Posture {
        self.postures.get(&escalation).copied().unwrap_or(Posture::Comply)
    }
}

/// 商船交通の設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MerchantConfig {
    pub types: Vec<MerchantTypeConfig>,
    pub countries: Vec<CountryConfig>,
    pub bases: Vec<BaseConfig>,
    /// 出入域帯の北端（省略時は領域全体）
    #[serde(default)]
    pub entry_max_y: Option<f64>,
    #[serde(default = "default_unloading_time")]
    pub unloading_time_h: f64,
}

fn default_unloading_time() -> f64 {
    24.0
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub meta: ScenarioMeta,
    #[serde(default)]
    pub sim: SimulationConfig,
    pub world: WorldConfig,
    #[serde(default)]
    pub landmasses: Vec<PolygonConfig>,
    #[serde(default)]
    pub routing: Vec<RoutingLayerConfig>,
    pub zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub engagement: EngagementConfig,
    #[serde(default)]
    pub boarding: BoardingSettings,
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
    #[serde(default)]
    pub managers: Vec<ManagerConfig>,
    #[serde(default)]
    pub merchants: Option<MerchantConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|e| ScenarioError::Io(path.to_path_buf(), e))?;

        let config: ScenarioConfig =
            serde_yaml::from_str(&contents).map_err(|e| ScenarioError::Parse(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列から読み込み（検証込み）
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig =
            serde_yaml::from_str(contents).map_err(|e| ScenarioError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let invalid = |msg: String| Err(ScenarioError::Validation(msg));

        if self.sim.dt_h <= 0.0 {
            return invalid("dt_h must be positive".to_string());
        }
        if self.sim.t_max_h <= 0.0 {
            return invalid("t_max_h must be positive".to_string());
        }
        if self.sim.iteration_limit == 0 {
            return invalid("iteration_limit must be positive".to_string());
        }

        let area = &self.world.area;
        if area.min_x >= area.max_x || area.min_y >= area.max_y {
            return invalid("Invalid area bounds".to_string());
        }
        if self.world.grid_cell <= 0.0 {
            return invalid("grid_cell must be positive".to_string());
        }
        if !self.world.grid_padding.is_finite() || self.world.grid_padding < 0.0 {
            return invalid("grid_padding must be non-negative".to_string());
        }

        for landmass in &self.landmasses {
            if landmass.points.len() < 3 {
                return invalid(format!("Landmass {} has fewer than 3 points", landmass.name));
            }
        }

        if self.zones.is_empty() {
            return invalid("At least one zone is required".to_string());
        }
        let zone_ids: BTreeSet<&str> = self.zones.iter().map(|z| z.id.as_str()).collect();
        if zone_ids.len() != self.zones.len() {
            return invalid("Duplicate zone id".to_string());
        }
        for zone in &self.zones {
            if zone.points.len() < 3 {
                return invalid(format!("Zone {} has fewer than 3 points", zone.id));
            }
            for nested in &zone.carve_out {
                if !zone_ids.contains(nested.as_str()) {
                    return invalid(format!("Zone {} carves out unknown zone {}", zone.id, nested));
                }
            }
        }
        let check_zone = |zone: &str, context: &str| -> Result<(), ScenarioError> {
            if zone_ids.contains(zone) {
                Ok(())
            } else {
                Err(ScenarioError::Validation(format!("Unknown zone {} in {}", zone, context)))
            }
        };

        for layer in &self.routing {
            for zone in &layer.avoid_zones {
                check_zone(zone, "routing")?;
            }
        }
        for zone in &self.rules.hunter_illegal_zones {
            check_zone(zone, "hunter_illegal_zones")?;
        }
        for by_type in self.rules.coalition_roe.values() {
            for by_zone in by_type.values() {
                for zone in by_zone.keys() {
                    check_zone(zone, "coalition_roe")?;
                }
            }
        }
        for table in [&self.rules.zone_assignment.coalition, &self.rules.zone_assignment.hunter] {
            for by_type in table.values() {
                for by_zone in by_type.values() {
                    for (zone, weight) in by_zone {
                        check_zone(zone, "zone_assignment")?;
                        if !weight.is_finite() || *weight < 0.0 {
                            return invalid(format!("Negative zone weight for {}", zone));
                        }
                    }
                }
            }
        }

        for entry in &self.engagement.attack_table {
            if !entry.probabilities.is_distribution() {
                return invalid(format!(
                    "Attack probabilities for {} -> {} do not sum to 1",
                    entry.attacker, entry.defender
                ));
            }
        }
        let vulnerability = &self.engagement.merchant_vulnerability;
        for probabilities in [vulnerability.large, vulnerability.medium, vulnerability.small] {
            if !probabilities.is_distribution() {
                return invalid("Merchant vulnerability does not sum to 1".to_string());
            }
        }

        for manager in &self.managers {
            if manager.side == Side::Neutral {
                return invalid(format!("Manager {} cannot be neutral", manager.name));
            }
            if manager.bases.is_empty() {
                return invalid(format!("Manager {} has no bases", manager.name));
            }
            if !(0.0..=1.0).contains(&manager.utilisation) {
                return invalid(format!("Manager {} utilisation out of range", manager.name));
            }
            check_shares(manager.bases.iter().map(|b| b.share), &manager.name)?;
            for fleet in &manager.fleets {
                if !self.models.contains_key(&fleet.model) {
                    return invalid(format!("Manager {} uses unknown model {}", manager.name, fleet.model));
                }
                if fleet.reserve > fleet.count {
                    return invalid(format!("Fleet {} reserve exceeds count", fleet.model));
                }
                if let Some(base) = &fleet.base {
                    if !manager.bases.iter().any(|b| &b.name == base) {
                        return invalid(format!("Fleet {} uses unknown base {}", fleet.model, base));
                    }
                }
            }
        }

        if let Some(merchants) = &self.merchants {
            if merchants.bases.is_empty() {
                return invalid("Merchant traffic has no bases".to_string());
            }
            check_shares(merchants.bases.iter().map(|b| b.share), "merchant bases")?;
            check_shares(merchants.countries.iter().map(|c| c.share), "merchant countries")?;
            for merchant_type in &merchants.types {
                if !merchant_type.weekly_arrivals.is_finite() || merchant_type.weekly_arrivals < 0.0 {
                    return invalid(format!("Negative arrivals for {}", merchant_type.name));
                }
                if merchant_type.speed <= 0.0 {
                    return invalid(format!("Merchant type {} speed must be positive", merchant_type.name));
                }
            }
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.2}時間", self.sim.dt_h);
        println!("最大時間: {:.1}時間 ({:.1}日)", self.sim.t_max_h, self.sim.t_max_h / 24.0);
        println!("シード値: {}", self.sim.seed);
        println!(
            "エスカレーション: 連合 {} / 追跡 {}",
            self.escalation.coalition, self.escalation.hunter
        );
        println!();

        println!("=== 地理 ===");
        println!("陸地: {}", self.landmasses.len());
        println!("ゾーン: {}", self.zones.len());
        for zone in &self.zones {
            let holding = if zone.holding { " (待機)" } else { "" };
            println!("  {}: {}{}", zone.id, zone.name.as_deref().unwrap_or(&zone.id), holding);
        }
        println!();

        println!("=== 戦力 ===");
        for manager in &self.managers {
            let total: u32 = manager.fleets.iter().map(|f| f.count).sum();
            println!("{} ({}): {}隻/機, 基地 {}", manager.name, manager.side, total, manager.bases.len());
            for fleet in &manager.fleets {
                println!("  {}: {} (予備 {})", fleet.model, fleet.count, fleet.reserve);
            }
        }

        if let Some(merchants) = &self.merchants {
            println!();
            println!("=== 商船交通 ===");
            let weekly: f64 = merchants.types.iter().map(|t| t.weekly_arrivals).sum();
            println!("週あたり到着数: {:.1}", weekly);
            println!("入港先: {}", merchants.bases.len());
        }
    }
}

fn check_shares(shares: impl Iterator<Item = f64>, context: &str) -> Result<(), ScenarioError> {
    let mut total = 0.0;
    for share in shares {
        if !share.is_finite() || share < 0.0 {
            return Err(ScenarioError::Validation(format!("Negative share in {}", context)));
        }
        total += share;
    }
    if total <= 0.0 {
        return Err(ScenarioError::Validation(format!("Shares in {} sum to zero", context)));
    }
    Ok(())
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const MINIMAL: &str = r#"
meta:
  name: minimal
world:
  area: { min_x: 119.0, max_x: 123.0, min_y: 21.0, max_y: 26.0 }
landmasses:
  - name: Taiwan
    points: [[120.2, 22.0], [121.9, 22.0], [121.9, 25.2], [120.2, 25.2]]
zones:
  - id: A
    points: [[119.0, 21.0], [123.0, 21.0], [123.0, 26.0], [119.0, 26.0]]
models:
  TW ESC:
    service: ROCN
    surface_detection: advanced
    anti_surface: basic
managers:
  - name: Taiwan Navy
    side: coalition
    bases:
      - { name: Keelung, location: [121.75, 25.3] }
    fleets:
      - { model: TW ESC, count: 4, reserve: 1 }
"#;

    #[test]
    fn test_parse_minimal_scenario_with_defaults() {
        let config = ScenarioConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.sim.dt_h, 0.25);
        assert_eq!(config.sim.iteration_limit, 500);
        assert_eq!(config.sim.safety_endurance, 1.1);
        assert_eq!(config.world.grid_padding, 6.0);
        assert_eq!(config.world.initial_sea_state, 2);
        assert!(config.rules.boarding_only);

        let model = &config.models["TW ESC"];
        assert_eq!(model.surface_detection, Some(Skill::Advanced));
        assert_eq!(model.air_detection, None);
        assert_eq!(model.anti_surface_ammunition, 6);
        assert_eq!(model.kind, PlatformKind::Ship);
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let yaml = MINIMAL.replace("model: TW ESC", "model: TW FFG");
        assert!(matches!(
            ScenarioConfig::from_yaml_str(&yaml),
            Err(ScenarioError::Validation(msg)) if msg.contains("TW FFG")
        ));
    }

    #[test]
    fn test_inverted_area_is_rejected() {
        let yaml = MINIMAL.replace("min_x: 119.0, max_x: 123.0", "min_x: 123.0, max_x: 119.0");
        assert!(matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::Validation(_))));
    }

    #[test]
    fn test_fractional_grid_padding() {
        let area = "area: { min_x: 119.0, max_x: 123.0, min_y: 21.0, max_y: 26.0 }";
        let yaml = MINIMAL.replace(area, &format!("{}\n  grid_padding: 0.5", area));
        let config = ScenarioConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.world.grid_padding, 0.5);

        let negative = MINIMAL.replace(area, &format!("{}\n  grid_padding: -1.0", area));
        assert!(matches!(ScenarioConfig::from_yaml_str(&negative), Err(ScenarioError::Validation(_))));
    }

    #[test]
    fn test_bad_probability_triple_is_rejected() {
        let yaml = format!(
            "{}\nengagement:\n  attack_table:\n    - {{ attacker: TW ESC, attacker_skill: basic, defender: CN PLAN, probabilities: {{ sunk: 0.5, ctl: 0.5, nothing: 0.5 }} }}\n",
            MINIMAL
        );
        assert!(matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::Validation(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ScenarioConfig::from_file("does/not/exist.yaml"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_bundled_strait_scenario() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/strait.yaml");
        let config = ScenarioConfig::from_file(path).unwrap();
        assert_eq!(config.managers.len(), 3);
        assert_eq!(config.zones.last().map(|z| z.id.as_str()), Some("OPEN"));
        let merchants = config.merchants.as_ref().unwrap();
        assert_eq!(merchants.countries[1].posture(2), Posture::Resist);
        assert_eq!(merchants.countries[0].posture(2), Posture::Comply);
        assert_eq!(config.models["TW P3C"].kind, PlatformKind::Aircraft);
    }

    #[test]
    fn test_rules_lookups_default() {
        let mut rules = RulesConfig::default();
        assert_eq!(rules.coalition_code(1, "TW ESC", "A"), RoeCode::Never);
        assert!(rules.hunter_may_target("TW SUB"));
        rules.hunter_targets.insert("TW SUB".to_string(), false);
        assert!(!rules.hunter_may_target("TW SUB"));

        let mut by_zone = BTreeMap::new();
        by_zone.insert("A".to_string(), 2u8);
        let mut by_type = BTreeMap::new();
        by_type.insert("TW ESC".to_string(), by_zone);
        rules.coalition_roe.insert(3, by_type);
        assert_eq!(rules.coalition_code(3, "TW ESC", "A"), RoeCode::IfInCombat);
        assert_eq!(rules.coalition_code(2, "TW ESC", "A"), RoeCode::Never);
    }
}
