//! 交戦モデル
//!
//! 攻撃結果のカテゴリ抽選、弾薬カタログ、商船への乗り込み判定を扱います。
//! 弾切れや対象無効は想定内の状況であり、エラーではなく結果列挙型で返します。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{SimError, SimResult};
use crate::models::common::{Posture, SizeClass, Skill};
use crate::random::SimRng;

/// 攻撃1回の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackOutcome {
    Sunk,
    Ctl,
    Nothing,
}

/// 攻撃試行の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackAttempt {
    Resolved(AttackOutcome),
    NoAmmunition,
    OutOfRange,
    InvalidTarget,
}

/// 乗り込み試行の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardingOutcome {
    Seized,
    Failed,
    /// 護衛が近傍にいて試行できない
    Blocked,
    /// 海況が閾値を超えている
    Forbidden,
}

/// {撃沈, 行動不能, 効果なし} の確率
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProbabilities {
    pub sunk: f64,
    pub ctl: f64,
    pub nothing: f64,
}

impl OutcomeProbabilities {
    pub fn new(sunk: f64, ctl: f64, nothing: f64) -> Self {
        Self { sunk, ctl, nothing }
    }

    pub fn is_distribution(&self) -> bool {
        let values = [self.sunk, self.ctl, self.nothing];
        values.iter().all(|p| p.is_finite() && *p >= 0.0) && (values.iter().sum::<f64>() - 1.0).abs() <= 1e-6
    }

    pub fn sample(&self, rng: &mut SimRng) -> AttackOutcome {
        match rng.weighted_index(&[self.sunk, self.ctl, self.nothing]) {
            Some(0) => AttackOutcome::Sunk,
            Some(1) => AttackOutcome::Ctl,
            _ => AttackOutcome::Nothing,
        }
    }

    /// 累積損傷に応じて撃沈確率を引き上げる
    pub fn with_damage(&self, damage: u32, increment: f64) -> Self {
        let sunk = (self.sunk + damage as f64 * increment).min(1.0);
        let ctl = self.ctl.min(1.0 - sunk);
        Self::new(sunk, ctl, (1.0 - sunk - ctl).max(0.0))
    }
}

/// 攻撃確率表の1行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackEntry {
    pub attacker: String,
    pub attacker_skill: Skill,
    pub defender: String,
    /// 防御側の技能（None は能力なし）
    #[serde(default)]
    pub defender_skill: Option<Skill>,
    pub probabilities: OutcomeProbabilities,
}

/// 弾薬カタログの1行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunitionEntry {
    pub attacker: String,
    pub attacker_skill: Skill,
    pub defender: String,
    /// 射程 (km)
    pub range: f64,
    /// 陣営全体の在庫（None は無制限）
    #[serde(default)]
    pub stock: Option<u32>,
}

impl MunitionEntry {
    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|s| s > 0)
    }

    /// 在庫を1減らす。在庫切れなら false
    pub fn consume(&mut self) -> bool {
        match &mut self.stock {
            None => true,
            Some(0) => false,
            Some(s) => {
                *s -= 1;
                true
            }
        }
    }

    pub fn matches(&self, attacker: &str, skill: Skill, defender: &str) -> bool {
        self.attacker == attacker && self.attacker_skill == skill && self.defender == defender
    }
}

/// 商船の被害表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MerchantVulnerability {
    pub large: OutcomeProbabilities,
    pub medium: OutcomeProbabilities,
    pub small: OutcomeProbabilities,
    /// 損傷1回あたりの撃沈確率の増分
    pub damage_increment: f64,
}

impl Default for MerchantVulnerability {
    fn default() -> Self {
        Self {
            large: OutcomeProbabilities::new(0.05, 0.35, 0.60),
            medium: OutcomeProbabilities::new(0.10, 0.40, 0.50),
            small: OutcomeProbabilities::new(0.20, 0.45, 0.35),
            damage_increment: 0.15,
        }
    }
}

impl MerchantVulnerability {
    pub fn probabilities(&self, size: SizeClass, damage: u32) -> OutcomeProbabilities {
        let base = match size {
            SizeClass::Large => self.large,
            SizeClass::Medium => self.medium,
            SizeClass::Small | SizeClass::VerySmall | SizeClass::Stealthy => self.small,
        };
        base.with_damage(damage, self.damage_increment)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    pub attack_table: Vec<AttackEntry>,
    pub merchant_vulnerability: MerchantVulnerability,
    pub ammunition: Vec<MunitionEntry>,
}

impl EngagementConfig {
    /// (攻撃側種別, 攻撃技能, 防御側種別, 防御技能) で確率を引く
    pub fn attack_probabilities(
        &self,
        attacker: &str,
        attacker_skill: Skill,
        defender: &str,
        defender_skill: Option<Skill>,
    ) -> SimResult<OutcomeProbabilities> {
        self.attack_table
            .iter()
            .find(|e| {
                e.attacker == attacker
                    && e.attacker_skill == attacker_skill
                    && e.defender == defender
                    && e.defender_skill == defender_skill
            })
            .map(|e| e.probabilities)
            .ok_or_else(|| {
                SimError::Config(format!(
                    "攻撃確率表に該当行がありません: {} ({:?}) -> {} ({:?})",
                    attacker, attacker_skill, defender, defender_skill
                ))
            })
    }
}

/// 乗り込み判定の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardingSettings {
    pub base_rate: f64,
    /// 海況ごとの係数（添字が海況）
    pub sea_state_factors: Vec<f64>,
    /// この海況を超えると乗り込み不可
    pub max_sea_state: u8,
    /// 軍種ごとの係数（未定義は1.0）
    pub service_factors: HashMap<String, f64>,
    pub helicopter_factor: f64,
    pub comply_factor: f64,
    pub evade_factor: f64,
    pub resist_factor: f64,
    /// 乗り込みを阻止する護衛の距離 (km)
    pub escort_block_radius: f64,
    /// 乗り込みを試行できる距離 (km)
    pub range: f64,
}

impl Default for BoardingSettings {
    fn default() -> Self {
        Self {
            base_rate: 0.22,
            sea_state_factors: vec![1.0, 1.0, 1.0, 0.8, 0.6, 0.4],
            max_sea_state: 5,
            service_factors: HashMap::new(),
            helicopter_factor: 1.25,
            comply_factor: 1.6,
            evade_factor: 0.8,
            resist_factor: 0.5,
            escort_block_radius: 20.0,
            range: 5.0,
        }
    }
}

impl BoardingSettings {
    pub fn posture_factor(&self, posture: Posture) -> f64 {
        match posture {
            Posture::Comply => self.comply_factor,
            Posture::Evade => self.evade_factor,
            Posture::Resist => self.resist_factor,
        }
    }

    /// 成功確率 = 基本率 × 海況 × 軍種 × ヘリコプター × 対応方針
    pub fn success_probability(&self, sea_state: u8, service: &str, helicopter: bool, posture: Posture) -> f64 {
        if sea_state > self.max_sea_state {
            return 0.0;
        }
        let sea = self
            .sea_state_factors
            .get(sea_state as usize)
            .copied()
            .unwrap_or(0.0);
        let service = self.service_factors.get(service).copied().unwrap_or(1.0);
        let helicopter = if helicopter { self.helicopter_factor } else { 1.0 };
        (self.base_rate * sea * service * helicopter * self.posture_factor(posture)).clamp(0.0, 1.0)
    }

    pub fn attempt(
        &self,
        sea_state: u8,
        service: &str,
        helicopter: bool,
        posture: Posture,
        escort_nearby: bool,
        rng: &mut SimRng,
    ) -> BoardingOutcome {
        if escort_nearby {
            return BoardingOutcome::Blocked;
        }
        if sea_state > self.max_sea_state {
            return BoardingOutcome::Forbidden;
        }
        if rng.chance(self.success_probability(sea_state, service, helicopter, posture)) {
            BoardingOutcome::Seized
        } else {
            BoardingOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boarding_multiplier_chain() {
        let settings = BoardingSettings::default();
        let p = settings.success_probability(2, "CCG", false, Posture::Comply);
        assert!((p - 0.352).abs() < 1e-12);

        let with_heli = settings.success_probability(2, "CCG", true, Posture::Comply);
        assert!((with_heli - 0.352 * 1.25).abs() < 1e-12);

        let rough = settings.success_probability(4, "CCG", false, Posture::Resist);
        assert!((rough - 0.22 * 0.6 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_boarding_forbidden_and_blocked() {
        let settings = BoardingSettings::default();
        let mut rng = SimRng::new(1);
        assert_eq!(settings.success_probability(6, "CCG", true, Posture::Comply), 0.0);
        assert_eq!(
            settings.attempt(6, "CCG", true, Posture::Comply, false, &mut rng),
            BoardingOutcome::Forbidden
        );
        assert_eq!(
            settings.attempt(0, "CCG", true, Posture::Comply, true, &mut rng),
            BoardingOutcome::Blocked
        );
    }

    #[test]
    fn test_service_factor_applies() {
        let mut settings = BoardingSettings::default();
        settings.service_factors.insert("PLAN".to_string(), 1.5);
        let p = settings.success_probability(0, "PLAN", false, Posture::Evade);
        assert!((p - 0.22 * 1.5 * 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_merchant_damage_raises_sunk_probability() {
        let table = MerchantVulnerability::default();
        let fresh = table.probabilities(SizeClass::Medium, 0);
        let damaged = table.probabilities(SizeClass::Medium, 2);
        assert!(damaged.sunk > fresh.sunk);
        assert!(damaged.is_distribution());
        assert_eq!(table.probabilities(SizeClass::Small, 10).sunk, 1.0);
    }

    #[test]
    fn test_outcome_sampling_respects_zero_weights() {
        let mut rng = SimRng::new(5);
        let always_sunk = OutcomeProbabilities::new(1.0, 0.0, 0.0);
        let never = OutcomeProbabilities::new(0.0, 0.0, 1.0);
        for _ in 0..100 {
            assert_eq!(always_sunk.sample(&mut rng), AttackOutcome::Sunk);
            assert_eq!(never.sample(&mut rng), AttackOutcome::Nothing);
        }
    }

    #[test]
    fn test_munition_stock() {
        let mut limited = MunitionEntry {
            attacker: "CN PLAN".to_string(),
            attacker_skill: Skill::Basic,
            defender: "TW ESC".to_string(),
            range: 100.0,
            stock: Some(1),
        };
        assert!(limited.consume());
        assert!(!limited.in_stock());
        assert!(!limited.consume());

        let mut unlimited = MunitionEntry { stock: None, ..limited };
        assert!(unlimited.consume());
        assert!(unlimited.in_stock());
    }

    #[test]
    fn test_missing_attack_row_is_config_error() {
        let config = EngagementConfig::default();
        assert!(config.attack_probabilities("X", Skill::Basic, "Y", None).is_err());
    }
}
