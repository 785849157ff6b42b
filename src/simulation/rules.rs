//! 交戦規定による目標の妥当性判定

use super::SimulationEngine;
use crate::geometry::Point;
use crate::models::*;
use crate::scenario::RoeCode;

impl SimulationEngine {
    /// 地点の所属ゾーンID
    pub fn zone_id_at(&self, point: &Point) -> Option<&str> {
        self.geography.zones.current_zone(point).map(|z| z.id.as_str())
    }

    /// 攻撃側から見て目標が交戦可能か
    ///
    /// 目標の現在位置のゾーンとエスカレーションレベルで判定します。
    pub fn is_valid_target(&self, attacker: &Agent, target: &Agent) -> bool {
        if attacker.id == target.id || !target.is_active() || !attacker.side.is_hostile_to(target.side) {
            return false;
        }
        if target.is_seized() {
            return false;
        }
        let Some(zone) = self.zone_id_at(&target.location) else {
            return false;
        };

        match attacker.side {
            Side::Coalition => {
                if target.side != Side::Hunter || target.is_merchant() {
                    return false;
                }
                let level = self.escalation.level(Side::Coalition);
                match self.rules.coalition_code(level, &attacker.combat_type, zone) {
                    RoeCode::Always => true,
                    RoeCode::IfInCombat => target.in_combat,
                    RoeCode::IfUnmanned => target.is_uav(),
                    RoeCode::Never => false,
                }
            }
            Side::Hunter => {
                if self.rules.hunter_illegal_zones.iter().any(|z| z == zone) {
                    return false;
                }
                if target.is_merchant() && self.rules.boarding_only && !matches!(attacker.kind, AgentKind::Ship { .. }) {
                    return false;
                }
                self.rules.hunter_may_target(&target.combat_type)
            }
            Side::Neutral => false,
        }
    }

    pub(crate) fn is_valid_target_id(&self, attacker: AgentId, target: AgentId) -> bool {
        match (self.agents.get(attacker.0), self.agents.get(target.0)) {
            (Some(a), Some(t)) => self.is_valid_target(a, t),
            _ => false,
        }
    }

    /// 乗り込みで対処する組み合わせか
    pub(crate) fn uses_boarding(&self, attacker: &Agent, target: &Agent) -> bool {
        self.rules.boarding_only
            && attacker.side == Side::Hunter
            && target.is_merchant()
            && matches!(attacker.kind, AgentKind::Ship { .. })
    }

    /// 商船の現在の対応方針（追跡側のエスカレーションレベルで決まる）
    pub(crate) fn posture_of(&self, merchant: &Agent) -> Posture {
        let level = self.escalation.level(Side::Hunter);
        merchant
            .merchant_state()
            .and_then(|state| {
                self.merchants.as_ref().and_then(|traffic| {
                    traffic
                        .config
                        .countries
                        .iter()
                        .find(|c| c.name == state.country)
                        .map(|c| c.posture(level))
                })
            })
            .unwrap_or(Posture::Comply)
    }

    /// 攻撃側の射程（乗り込みは乗り込み距離、それ以外は選択弾薬の射程）
    pub(crate) fn engagement_range(&self, attacker: &Agent, target: &Agent) -> Option<f64> {
        if self.uses_boarding(attacker, target) {
            return Some(self.boarding.range);
        }
        let skill = attacker.attack_skill(target.domain())?;
        let manager = self.managers.get(attacker.manager)?;
        manager
            .select_munition(&attacker.combat_type, skill, &target.combat_type)
            .and_then(|i| manager.munition(i))
            .map(|m| m.range)
    }

    /// 攻撃（または乗り込み）を実行できるか
    pub(crate) fn can_engage(&self, attacker: &Agent, target: &Agent) -> bool {
        if self.uses_boarding(attacker, target) {
            return true;
        }
        attacker.able_to_attack(target.domain()) && self.engagement_range(attacker, target).is_some()
    }
}
