//! エージェント
//!
//! 艦艇・航空機・潜水艦・商船を共通の [`Agent`] 構造体で表し、プラットフォーム固有の
//! 性質は [`AgentKind`] の列挙子で区別します。探知・攻撃能力は区分ごとの
//! [`Capability`] として保持し、能力がなければ `None` です。

use serde::Serialize;

use crate::error::{SimError, SimResult};
use crate::geometry::Point;
use crate::models::common::*;
use crate::models::traits::{Attacker, Detector, Observable};
use crate::routing::{MovementDomain, Route};
use crate::scenario::{ModelConfig, PlatformKind};

/// 区分ごとの探知・攻撃能力
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Capability {
    pub detection: Option<Skill>,
    pub attack: Option<Skill>,
    pub ammunition: u32,
    pub max_ammunition: u32,
}

impl Capability {
    pub fn new(detection: Option<Skill>, attack: Option<Skill>, ammunition: u32) -> Self {
        let ammunition = if attack.is_some() { ammunition } else { 0 };
        Self {
            detection,
            attack,
            ammunition,
            max_ammunition: ammunition,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Capabilities {
    pub surface: Capability,
    pub air: Capability,
    pub subsurface: Capability,
}

impl Capabilities {
    pub fn get(&self, domain: Domain) -> &Capability {
        match domain {
            Domain::Surface => &self.surface,
            Domain::Air => &self.air,
            Domain::Subsurface => &self.subsurface,
        }
    }

    pub fn get_mut(&mut self, domain: Domain) -> &mut Capability {
        match domain {
            Domain::Surface => &mut self.surface,
            Domain::Air => &mut self.air,
            Domain::Subsurface => &mut self.subsurface,
        }
    }

    pub fn refill(&mut self) {
        for domain in Domain::ALL {
            let capability = self.get_mut(domain);
            capability.ammunition = capability.max_ammunition;
        }
    }
}

/// 商船固有の状態
#[derive(Debug, Clone, PartialEq)]
pub struct MerchantState {
    pub merchant_type: String,
    pub country: String,
    /// 出入域地点
    pub entry_point: Point,
    /// 本来の荷揚げ港
    pub delivery_base: Point,
    pub delivery_base_name: String,
    /// 被害回数
    pub damage: u32,
    /// 拿捕している監視エージェント
    pub guarded_by: Option<AgentId>,
    pub seized: bool,
    /// 荷揚げを終えたか
    pub unloaded: bool,
}

/// プラットフォーム固有の性質
#[derive(Debug, Clone, PartialEq)]
pub enum AgentKind {
    Ship { helicopter: bool, aws: bool },
    Aircraft { manned: bool },
    Submarine,
    Merchant(MerchantState),
}

/// 1ターン内の移動の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    ReachedEndOfRoute,
    SpentTurnMovement,
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub model: String,
    /// 交戦規定・攻撃確率表で用いる種別名
    pub combat_type: String,
    pub service: String,
    pub side: Side,
    /// 所属マネージャの添字
    pub manager: usize,
    pub kind: AgentKind,
    pub status: AgentStatus,

    pub location: Point,
    /// km/h
    pub speed: f64,
    pub cruising_speed: f64,
    pub max_speed: f64,
    /// このターンの残り移動量 (km)
    pub movement_left: f64,

    /// 最大航続距離 (km)
    pub endurance: f64,
    pub remaining_endurance: f64,

    /// 整備に要する時間 (h)
    pub maintenance_time: f64,
    pub remaining_maintenance: f64,

    pub capabilities: Capabilities,
    pub visibility: SizeClass,

    pub base: Point,
    pub base_name: String,
    pub assigned_zone: Option<String>,

    pub mission: Option<MissionId>,
    /// 自身が目標となっているミッション
    pub involved_missions: Vec<MissionId>,
    pub route: Option<Route>,

    pub ctl: bool,
    pub in_combat: bool,
}

impl Agent {
    /// モデル設定からエージェントを生成（基地で非活動状態）
    pub fn from_model(
        id: AgentId,
        manager: usize,
        side: Side,
        model_name: &str,
        model: &ModelConfig,
        base_name: &str,
        base: Point,
    ) -> Self {
        let kind = match model.kind {
            PlatformKind::Ship => AgentKind::Ship {
                helicopter: model.helicopter,
                aws: model.aws,
            },
            PlatformKind::Aircraft => AgentKind::Aircraft { manned: model.manned },
            PlatformKind::Submarine => AgentKind::Submarine,
        };
        let capabilities = Capabilities {
            surface: Capability::new(model.surface_detection, model.anti_surface, model.anti_surface_ammunition),
            air: Capability::new(model.air_detection, model.anti_air, model.anti_air_ammunition),
            subsurface: Capability::new(
                model.subsurface_detection,
                model.anti_subsurface,
                model.anti_subsurface_ammunition,
            ),
        };

        Self {
            id,
            model: model_name.to_string(),
            combat_type: model.combat_type.clone().unwrap_or_else(|| model_name.to_string()),
            service: model.service.clone(),
            side,
            manager,
            kind,
            status: AgentStatus::Inactive,
            location: base,
            speed: model.cruising_speed,
            cruising_speed: model.cruising_speed,
            max_speed: model.max_speed.max(model.cruising_speed),
            movement_left: 0.0,
            endurance: model.endurance,
            remaining_endurance: model.endurance,
            maintenance_time: model.maintenance_time,
            remaining_maintenance: 0.0,
            capabilities,
            visibility: model.visibility,
            base,
            base_name: base_name.to_string(),
            assigned_zone: None,
            mission: None,
            involved_missions: Vec::new(),
            route: None,
            ctl: false,
            in_combat: false,
        }
    }

    /// 出入域地点に現れる商船を生成
    #[allow(clippy::too_many_arguments)]
    pub fn merchant(
        id: AgentId,
        manager: usize,
        merchant_type: &str,
        speed: f64,
        visibility: SizeClass,
        country: &str,
        entry_point: Point,
        base_name: &str,
        base: Point,
        unloading_time: f64,
    ) -> Self {
        Self {
            id,
            model: merchant_type.to_string(),
            combat_type: format!("{} MER", country),
            service: "Merchant".to_string(),
            side: Side::Neutral,
            manager,
            kind: AgentKind::Merchant(MerchantState {
                merchant_type: merchant_type.to_string(),
                country: country.to_string(),
                entry_point,
                delivery_base: base,
                delivery_base_name: base_name.to_string(),
                damage: 0,
                guarded_by: None,
                seized: false,
                unloaded: false,
            }),
            status: AgentStatus::Active,
            location: entry_point,
            speed,
            cruising_speed: speed,
            max_speed: speed,
            movement_left: 0.0,
            endurance: f64::INFINITY,
            remaining_endurance: f64::INFINITY,
            maintenance_time: unloading_time,
            remaining_maintenance: 0.0,
            capabilities: Capabilities::default(),
            visibility,
            base,
            base_name: base_name.to_string(),
            assigned_zone: None,
            mission: None,
            involved_missions: Vec::new(),
            route: None,
            ctl: false,
            in_combat: false,
        }
    }

    pub fn domain(&self) -> Domain {
        match self.kind {
            AgentKind::Ship { .. } | AgentKind::Merchant(_) => Domain::Surface,
            AgentKind::Aircraft { .. } => Domain::Air,
            AgentKind::Submarine => Domain::Subsurface,
        }
    }

    pub fn movement_domain(&self) -> MovementDomain {
        match self.kind {
            AgentKind::Aircraft { .. } => MovementDomain::Air,
            _ => MovementDomain::Surface,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    pub fn is_gone(&self) -> bool {
        matches!(self.status, AgentStatus::Destroyed | AgentStatus::Removed)
    }

    pub fn is_merchant(&self) -> bool {
        matches!(self.kind, AgentKind::Merchant(_))
    }

    pub fn is_uav(&self) -> bool {
        matches!(self.kind, AgentKind::Aircraft { manned: false })
    }

    pub fn has_helicopter(&self) -> bool {
        matches!(self.kind, AgentKind::Ship { helicopter: true, .. })
    }

    pub fn merchant_state(&self) -> Option<&MerchantState> {
        match &self.kind {
            AgentKind::Merchant(state) => Some(state),
            _ => None,
        }
    }

    pub fn merchant_state_mut(&mut self) -> Option<&mut MerchantState> {
        match &mut self.kind {
            AgentKind::Merchant(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_seized(&self) -> bool {
        self.merchant_state().is_some_and(|m| m.seized)
    }

    pub fn distance_to(&self, other: &Agent) -> f64 {
        self.location.distance_to(&other.location)
    }

    pub fn distance_to_base(&self) -> f64 {
        self.location.distance_to(&self.base)
    }

    /// 現在速度 × 時間刻みをこのターンの移動量とする
    pub fn set_movement_budget(&mut self, dt: f64) {
        self.movement_left = self.speed * dt;
    }

    pub fn set_route(&mut self, route: Route) {
        self.route = Some(route);
    }

    /// 経路に沿って移動量を消費する
    ///
    /// 航続距離は実際に移動した距離だけ減少します。1ターン内の反復回数は
    /// `iteration_limit` で打ち切り、超過時はタイムアウトエラーを返します。
    pub fn move_through_route(&mut self, iteration_limit: usize) -> SimResult<MoveOutcome> {
        let id = self.id;
        let Some(route) = self.route.as_mut() else {
            return Err(SimError::NoRoute(id));
        };

        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > iteration_limit {
                return Err(SimError::IterationLimit {
                    agent: id,
                    limit: iteration_limit,
                    context: "move_through_route",
                });
            }

            let Some(next) = route.next_point() else {
                return Ok(MoveOutcome::ReachedEndOfRoute);
            };
            if self.movement_left <= 0.0 {
                return Ok(MoveOutcome::SpentTurnMovement);
            }

            let distance = self.location.distance_to(&next);
            if distance <= self.movement_left {
                self.movement_left -= distance;
                self.remaining_endurance -= distance;
                self.location = next;
                route.reached_point();
            } else {
                let target = self.location.lerp(&next, self.movement_left / distance);
                self.remaining_endurance -= self.location.distance_to(&target);
                self.location = target;
                self.movement_left = 0.0;
                return Ok(MoveOutcome::SpentTurnMovement);
            }
        }
    }

    /// 移動せずにこのターンの移動量を航続距離から差し引く（待機）
    pub fn drain_endurance(&mut self) {
        self.remaining_endurance -= self.movement_left.max(0.0);
        self.movement_left = 0.0;
    }

    /// 基地までの距離 × 安全係数 が残り航続距離以下なら継続可能
    pub fn can_continue(&self, distance_to_base: f64, margin: f64) -> bool {
        distance_to_base * margin <= self.remaining_endurance
    }

    /// 地点まで行って基地へ戻れるか
    pub fn reach_and_return(&self, point: &Point, margin: f64) -> bool {
        let round_trip = self.location.distance_to(point) + point.distance_to(&self.base);
        self.can_continue(round_trip, margin)
    }

    /// 基地に入り整備を開始する。行動不能なら整備時間を `ctl_factor` 倍
    pub fn start_maintenance(&mut self, ctl_factor: f64) {
        let factor = if self.ctl { ctl_factor } else { 1.0 };
        self.remaining_maintenance = self.maintenance_time * factor;
        self.location = self.base;
        self.route = None;
        self.movement_left = 0.0;
        self.in_combat = false;
        self.assigned_zone = None;
        if self.status == AgentStatus::Active {
            self.status = AgentStatus::Inactive;
        }
    }

    /// 整備を1刻み進め、完了したら true
    pub fn tick_maintenance(&mut self, dt: f64) -> bool {
        if self.remaining_maintenance <= 0.0 {
            return false;
        }
        self.remaining_maintenance -= dt;
        if self.remaining_maintenance <= 1e-9 {
            self.complete_maintenance();
            return true;
        }
        false
    }

    /// 航続距離・弾薬を回復し、行動不能状態を解除
    pub fn complete_maintenance(&mut self) {
        self.remaining_maintenance = 0.0;
        self.remaining_endurance = self.endurance;
        self.capabilities.refill();
        self.ctl = false;
    }

    pub fn is_ready(&self) -> bool {
        self.status == AgentStatus::Inactive && self.remaining_maintenance <= 0.0
    }
}

impl Detector for Agent {
    fn detection_skill(&self, domain: Domain) -> Option<Skill> {
        self.capabilities.get(domain).detection
    }

    fn platform_domain(&self) -> Domain {
        self.domain()
    }

    fn has_aws(&self) -> bool {
        matches!(self.kind, AgentKind::Ship { aws: true, .. })
    }

    fn sensor_position(&self) -> Point {
        self.location
    }
}

impl Observable for Agent {
    fn target_domain(&self) -> Domain {
        self.domain()
    }

    fn size_class(&self) -> SizeClass {
        self.visibility
    }

    fn position(&self) -> Point {
        self.location
    }
}

impl Attacker for Agent {
    fn attack_skill(&self, domain: Domain) -> Option<Skill> {
        self.capabilities.get(domain).attack
    }

    fn ammunition(&self, domain: Domain) -> u32 {
        self.capabilities.get(domain).ammunition
    }

    fn consume_ammunition(&mut self, domain: Domain) -> bool {
        let capability = self.capabilities.get_mut(domain);
        if capability.ammunition == 0 {
            return false;
        }
        capability.ammunition -= 1;
        true
    }
}

/// 可視化・ログ向けのエージェント状態
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub id: usize,
    pub model: String,
    pub service: String,
    pub side: Side,
    pub manager: usize,
    pub x: f64,
    pub y: f64,
    pub status: AgentStatus,
    pub mission: String,
    pub remaining_endurance: f64,
    pub ammunition: [u32; 3],
    pub ctl: bool,
    pub seized: bool,
}

impl Agent {
    pub fn snapshot(&self, mission: String) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id.0,
            model: self.model.clone(),
            service: self.service.clone(),
            side: self.side,
            manager: self.manager,
            x: self.location.x,
            y: self.location.y,
            status: self.status,
            mission,
            remaining_endurance: if self.remaining_endurance.is_finite() {
                self.remaining_endurance
            } else {
                -1.0
            },
            ammunition: Domain::ALL.map(|d| self.capabilities.get(d).ammunition),
            ctl: self.ctl,
            seized: self.is_seized(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LATITUDE_CONVERSION_FACTOR;

    fn test_ship(id: usize) -> Agent {
        let model = ModelConfig {
            surface_detection: Some(Skill::Basic),
            anti_surface: Some(Skill::Basic),
            ..ModelConfig::default()
        };
        Agent::from_model(AgentId(id), 0, Side::Coalition, "TW ESC", &model, "Keelung", Point::new(121.0, 25.0))
    }

    #[test]
    fn test_can_continue_boundary() {
        let mut agent = test_ship(1);
        agent.remaining_endurance = 5.0;
        // 4 × 1.1 = 4.4 ≤ 5
        assert!(agent.can_continue(4.0, 1.1));
        agent.remaining_endurance = 4.3;
        assert!(!agent.can_continue(4.0, 1.1));
        agent.remaining_endurance = 4.0 * 1.1;
        assert!(agent.can_continue(4.0, 1.1));
    }

    #[test]
    fn test_move_consumes_exact_distance() {
        let mut agent = test_ship(1);
        let start = agent.location;
        let end = Point::new(start.x, start.y + 100.0 / LATITUDE_CONVERSION_FACTOR);
        agent.set_route(Route::new(vec![start, end], 0.0));
        agent.speed = 30.0;
        agent.set_movement_budget(1.0);
        let before = agent.remaining_endurance;

        assert_eq!(agent.move_through_route(500).unwrap(), MoveOutcome::SpentTurnMovement);
        let travelled = start.distance_to(&agent.location);
        assert!((before - agent.remaining_endurance - travelled).abs() < 1e-9);
        assert!((travelled - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_endurance_tracks_distance_not_budget() {
        let mut agent = test_ship(1);
        let start = agent.location;
        let end = Point::new(start.x + 0.1, start.y);
        agent.set_route(Route::new(vec![start, end], 0.0));
        agent.movement_left = 1000.0;
        let before = agent.remaining_endurance;

        assert_eq!(agent.move_through_route(500).unwrap(), MoveOutcome::ReachedEndOfRoute);
        assert_eq!(agent.location, end);
        assert!((before - agent.remaining_endurance - start.distance_to(&end)).abs() < 1e-9);
        assert!(agent.movement_left > 0.0);
    }

    #[test]
    fn test_move_without_route_is_error() {
        let mut agent = test_ship(3);
        assert!(matches!(agent.move_through_route(10), Err(SimError::NoRoute(AgentId(3)))));
    }

    #[test]
    fn test_iteration_limit_is_enforced() {
        let mut agent = test_ship(1);
        let p = agent.location;
        // 同一点が続く経路は移動量を消費しない
        agent.set_route(Route::new(vec![p; 20], 0.0));
        agent.movement_left = 10.0;
        assert!(matches!(
            agent.move_through_route(5),
            Err(SimError::IterationLimit { limit: 5, .. })
        ));
    }

    #[test]
    fn test_maintenance_restores_endurance_and_ammunition() {
        let mut agent = test_ship(1);
        agent.status = AgentStatus::Active;
        agent.remaining_endurance = 10.0;
        assert!(agent.consume_ammunition(Domain::Surface));
        agent.ctl = true;
        agent.start_maintenance(4.0);
        assert_eq!(agent.status, AgentStatus::Inactive);
        assert_eq!(agent.remaining_maintenance, agent.maintenance_time * 4.0);
        assert!(!agent.is_ready());

        let mut completed = false;
        for _ in 0..10_000 {
            if agent.tick_maintenance(0.25) {
                completed = true;
                break;
            }
        }
        assert!(completed);
        assert!(agent.is_ready());
        assert_eq!(agent.remaining_endurance, agent.endurance);
        assert_eq!(agent.ammunition(Domain::Surface), agent.capabilities.surface.max_ammunition);
        assert!(!agent.ctl);
    }

    #[test]
    fn test_holding_drains_without_moving() {
        let mut agent = test_ship(1);
        let start = agent.location;
        agent.speed = 20.0;
        agent.set_movement_budget(0.25);
        let before = agent.remaining_endurance;
        agent.drain_endurance();
        assert_eq!(agent.location, start);
        assert!((before - agent.remaining_endurance - 5.0).abs() < 1e-12);
    }
}
