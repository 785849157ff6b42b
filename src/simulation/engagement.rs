//! 攻撃・乗り込み・撃沈時の連鎖処理

use tracing::{debug, info};

use super::SimulationEngine;
use crate::error::{SimError, SimResult};
use crate::geometry::Point;
use crate::models::*;
use crate::routing::Route;

impl SimulationEngine {
    /// 攻撃ミッションの1ターン分
    pub(crate) fn execute_attack(&mut self, agent: AgentId, mission: &Mission) -> SimResult<()> {
        let Some(target) = mission.target.agent() else {
            return self.abort_and_patrol(agent);
        };
        if !self.is_valid_target_id(agent, target) {
            return self.abort_and_patrol(agent);
        }
        if self.uses_boarding(self.agent(agent)?, self.agent(target)?) {
            return self.execute_boarding(agent, target);
        }

        match self.attempt_to_attack(agent, target)? {
            AttackAttempt::Resolved(outcome) => self.apply_attack_outcome(agent, target, outcome),
            AttackAttempt::OutOfRange => {
                self.change_mission(agent, MissionTarget::Agent(target), MissionKind::Track)?;
                Ok(())
            }
            AttackAttempt::NoAmmunition => {
                info!(agent = %agent, target = %target, "ATTACK_ABORTED: 弾薬がないため帰投します");
                self.missions.finish_current(&mut self.agents, agent, MissionEnd::Aborted)?;
                self.send_home(agent)
            }
            AttackAttempt::InvalidTarget => self.abort_and_patrol(agent),
        }
    }

    /// 攻撃を1回試行する
    ///
    /// 弾薬（個艦と陣営在庫）を消費するのは結果を抽選する場合だけです。
    /// 確率表に該当行がない場合は設定エラーを返します。
    pub fn attempt_to_attack(&mut self, agent: AgentId, target: AgentId) -> SimResult<AttackAttempt> {
        let attacker = self.agent(agent)?;
        let defender = self.agent(target)?;
        if !self.is_valid_target(attacker, defender) {
            return Ok(AttackAttempt::InvalidTarget);
        }

        let domain = defender.domain();
        let Some(skill) = attacker.attack_skill(domain) else {
            return Ok(AttackAttempt::NoAmmunition);
        };
        if attacker.ammunition(domain) == 0 {
            return Ok(AttackAttempt::NoAmmunition);
        }
        let manager = attacker.manager;
        let Some(munition) = self.managers[manager].select_munition(&attacker.combat_type, skill, &defender.combat_type)
        else {
            return Ok(AttackAttempt::NoAmmunition);
        };
        let range = self.managers[manager].munition(munition).map_or(0.0, |m| m.range);
        if attacker.distance_to(defender) > range {
            return Ok(AttackAttempt::OutOfRange);
        }

        let probabilities = match defender.merchant_state() {
            Some(state) => self
                .engagement
                .merchant_vulnerability
                .probabilities(defender.visibility, state.damage),
            None => self.engagement.attack_probabilities(
                &attacker.combat_type,
                skill,
                &defender.combat_type,
                defender.attack_skill(attacker.domain()),
            )?,
        };

        self.agent_mut(agent)?.consume_ammunition(domain);
        self.managers[manager].consume_munition(munition);
        self.agent_mut(agent)?.in_combat = true;
        self.agent_mut(target)?.in_combat = true;

        let outcome = probabilities.sample(&mut self.rng);
        debug!(agent = %agent, target = %target, outcome = ?outcome, "ATTACK_RESOLVED: 攻撃結果");
        Ok(AttackAttempt::Resolved(outcome))
    }

    fn apply_attack_outcome(&mut self, agent: AgentId, target: AgentId, outcome: AttackOutcome) -> SimResult<()> {
        let location = self.agent(target)?.location;
        match outcome {
            AttackOutcome::Sunk => {
                self.events
                    .record(self.time, EventKind::Destroyed, agent, Some(target), location, "");
                self.missions.finish_current(&mut self.agents, agent, MissionEnd::Completed)?;
                self.destroy_agent(target)?;
                self.send_home(agent)
            }
            AttackOutcome::Ctl => {
                self.events
                    .record(self.time, EventKind::Ctl, agent, Some(target), location, "");
                if self.agent(target)?.is_merchant() {
                    if let Some(state) = self.agent_mut(target)?.merchant_state_mut() {
                        state.damage += 1;
                    }
                } else {
                    self.agent_mut(target)?.ctl = true;
                    self.force_return(target, None)?;
                }
                self.missions.finish_current(&mut self.agents, agent, MissionEnd::Completed)?;
                self.start_patrol(agent)
            }
            AttackOutcome::Nothing => {
                self.events
                    .record(self.time, EventKind::AttackMissed, agent, Some(target), location, "");
                Ok(())
            }
        }
    }

    /// 商船への乗り込み
    fn execute_boarding(&mut self, agent: AgentId, merchant: AgentId) -> SimResult<()> {
        let (boarder, vessel) = (self.agent(agent)?, self.agent(merchant)?);
        if boarder.distance_to(vessel) > self.boarding.range {
            self.change_mission(agent, MissionTarget::Agent(merchant), MissionKind::Track)?;
            return Ok(());
        }

        let location = vessel.location;
        let service = boarder.service.clone();
        let helicopter = boarder.has_helicopter();
        let escort_nearby = self.escort_near(&location, Side::Coalition);
        let sea_state = self.sea_state_at(&location);
        let posture = self.posture_of(vessel);
        let outcome = self.boarding.attempt(
            sea_state,
            &service,
            helicopter,
            posture,
            escort_nearby,
            &mut self.rng,
        );

        match outcome {
            BoardingOutcome::Seized => self.seize_merchant(agent, merchant),
            BoardingOutcome::Failed => {
                self.events
                    .record(self.time, EventKind::BoardingFailed, agent, Some(merchant), location, "");
                Ok(())
            }
            BoardingOutcome::Forbidden => {
                debug!(agent = %agent, sea_state = sea_state, "BOARDING_FORBIDDEN: 海況のため乗り込みできません");
                Ok(())
            }
            BoardingOutcome::Blocked => {
                self.events
                    .record(self.time, EventKind::BoardingBlocked, agent, Some(merchant), location, "");
                self.abort_and_patrol(agent)
            }
        }
    }

    /// 拿捕: 商船は捕獲側の基地へ向かい、乗り込んだ艦が護送する
    fn seize_merchant(&mut self, captor: AgentId, merchant: AgentId) -> SimResult<()> {
        let (side, base, base_name) = {
            let a = self.agent(captor)?;
            (a.side, a.base, a.base_name.clone())
        };
        let vessel = self.agent_mut(merchant)?;
        vessel.side = side;
        vessel.base = base;
        vessel.base_name = base_name.clone();
        if let Some(state) = vessel.merchant_state_mut() {
            state.seized = true;
            state.guarded_by = Some(captor);
        }
        let location = vessel.location;

        info!(captor = %captor, merchant = %merchant, base = %base_name, "MERCHANT_SEIZED: 商船を拿捕しました");
        self.events
            .record(self.time, EventKind::MerchantSeized, captor, Some(merchant), location, base_name);
        self.missions.finish_current(&mut self.agents, captor, MissionEnd::Completed)?;
        self.change_mission(merchant, MissionTarget::Location(base), MissionKind::Return)?;
        self.change_mission(captor, MissionTarget::Agent(merchant), MissionKind::Guard)?;
        Ok(())
    }

    /// 護送ミッションの1ターン分
    pub(crate) fn execute_guard(&mut self, agent: AgentId, mission: &Mission) -> SimResult<()> {
        let Some(merchant) = mission.target.agent() else {
            return self.send_home(agent);
        };
        let guarding = self
            .agent(merchant)?
            .merchant_state()
            .is_some_and(|s| s.seized && s.guarded_by == Some(agent));
        if !guarding || self.agent(merchant)?.is_gone() {
            self.missions.finish(&mut self.agents, mission.id, MissionEnd::Completed)?;
            return self.send_home(agent);
        }
        if self.check_liberation(merchant)? {
            return Ok(());
        }

        let destination = self.agent(merchant)?.location;
        let stale = self.agent(agent)?.route.as_ref().is_none_or(|r| {
            r.is_finished() || self.time - r.created_at() >= self.settings.route_refresh_h - 1e-9
        });
        if stale {
            let a = self.agent(agent)?;
            let route = self
                .geography
                .router
                .create_route(a.location, destination, a.side, a.movement_domain(), self.time)?;
            self.agent_mut(agent)?.set_route(route);
        }
        let limit = self.settings.iteration_limit;
        self.agent_mut(agent)?.move_through_route(limit)?;
        Ok(())
    }

    /// 護送が失われたか護衛が近傍にいれば商船を解放する
    pub(crate) fn check_liberation(&mut self, merchant: AgentId) -> SimResult<bool> {
        let vessel = self.agent(merchant)?;
        let Some(state) = vessel.merchant_state().filter(|s| s.seized) else {
            return Ok(false);
        };
        let guard_lost = state
            .guarded_by
            .and_then(|g| self.agents.get(g.0))
            .is_none_or(|g| !g.is_active() || g.ctl);
        if guard_lost || self.escort_near(&vessel.location, Side::Coalition) {
            self.liberate(merchant)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// 拿捕された商船を解放し、本来の入港先へ戻す
    pub fn liberate(&mut self, merchant: AgentId) -> SimResult<()> {
        let vessel = self.agent_mut(merchant)?;
        let Some(state) = vessel.merchant_state_mut() else {
            return Ok(());
        };
        let guard = state.guarded_by.take();
        state.seized = false;
        let (delivery, delivery_name) = (state.delivery_base, state.delivery_base_name.clone());
        vessel.side = Side::Neutral;
        vessel.base = delivery;
        vessel.base_name = delivery_name;
        let location = vessel.location;

        self.events
            .record(self.time, EventKind::MerchantLiberated, merchant, guard, location, "");
        if !self.agent(merchant)?.is_gone() {
            self.change_mission(merchant, MissionTarget::Location(delivery), MissionKind::Return)?;
        }

        if let Some(guard) = guard {
            let escorting = self
                .mission_of(guard)
                .is_some_and(|m| m.kind == MissionKind::Guard && m.target.agent() == Some(merchant));
            if escorting && !self.agent(guard)?.is_gone() {
                self.missions.finish_current(&mut self.agents, guard, MissionEnd::Aborted)?;
                self.send_home(guard)?;
            }
        }
        Ok(())
    }

    /// 商船を保護する陣営の健在なエージェントが近傍にいるか
    pub(crate) fn escort_near(&self, point: &Point, protector: Side) -> bool {
        let radius = self.boarding.escort_block_radius;
        self.agents.iter().any(|a| {
            a.side == protector && a.is_active() && !a.ctl && !a.is_merchant() && a.location.distance_to(point) <= radius
        })
    }

    /// 航続距離不足や行動不能による帰投
    ///
    /// 護送中であれば商船を解放してから帰投します。
    pub(crate) fn force_return(&mut self, agent: AgentId, route: Option<Route>) -> SimResult<()> {
        let guarded = self
            .mission_of(agent)
            .filter(|m| m.kind == MissionKind::Guard)
            .and_then(|m| m.target.agent());
        if let Some(merchant) = guarded {
            self.missions.finish_current(&mut self.agents, agent, MissionEnd::Aborted)?;
            self.liberate(merchant)?;
        }

        self.send_home(agent)?;
        if let Some(route) = route {
            self.agent_mut(agent)?.set_route(route);
        }
        Ok(())
    }

    /// 撃沈処理
    ///
    /// 自身のミッションと、目標として関与している全ミッションを終了させ、
    /// 各陣営の支援要請キューからも取り除きます。
    pub fn destroy_agent(&mut self, agent: AgentId) -> SimResult<()> {
        if self.agent(agent)?.is_gone() {
            return Ok(());
        }
        let guarded = self
            .mission_of(agent)
            .filter(|m| m.kind == MissionKind::Guard)
            .and_then(|m| m.target.agent());

        let a = self.agent_mut(agent)?;
        a.status = AgentStatus::Destroyed;
        a.route = None;
        let (manager, location) = (a.manager, a.location);
        self.managers[manager].place(agent, AgentStatus::Destroyed);

        if let Some(merchant) = guarded {
            self.liberate(merchant)?;
        }
        self.leave_world(agent)?;
        info!(agent = %agent, x = location.x, y = location.y, "AGENT_DESTROYED: 撃沈されました");
        Ok(())
    }

    /// 入港・離脱した商船をワールドから取り除く
    pub(crate) fn remove_from_world(&mut self, agent: AgentId) -> SimResult<()> {
        let a = self.agent_mut(agent)?;
        a.status = AgentStatus::Removed;
        a.route = None;
        let manager = a.manager;
        self.managers[manager].place(agent, AgentStatus::Removed);
        self.leave_world(agent)
    }

    fn leave_world(&mut self, agent: AgentId) -> SimResult<()> {
        self.missions.finish_current(&mut self.agents, agent, MissionEnd::Aborted)?;
        let involved = self.agent(agent)?.involved_missions.clone();
        for mission in involved {
            self.remove_agent_from_mission(mission, agent)?;
        }
        for manager in &mut self.managers {
            manager.drop_requests_for(agent);
        }
        Ok(())
    }

    /// エージェントをミッションから外す
    ///
    /// 担当者なら中止、目標なら中止して担当者を哨戒（護送なら帰投）に戻します。
    /// どちらでもなければ不変条件違反です。
    pub fn remove_agent_from_mission(&mut self, mission: MissionId, agent: AgentId) -> SimResult<()> {
        let current = self.missions.get(mission).cloned().ok_or(SimError::UnknownMission(mission))?;
        if current.agent == agent {
            self.missions.finish(&mut self.agents, mission, MissionEnd::Aborted)?;
            return Ok(());
        }
        if current.target.agent() != Some(agent) {
            return Err(SimError::NotInMission { agent, mission });
        }

        self.missions.finish(&mut self.agents, mission, MissionEnd::Aborted)?;
        let owner = current.agent;
        if !self.agent(owner)?.is_active() {
            return Ok(());
        }
        match current.kind {
            MissionKind::Guard => self.send_home(owner),
            _ => self.start_patrol(owner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::scenario::{BaseConfig, CountryConfig, MerchantConfig, MerchantTypeConfig};

    /// 攻撃可能な距離に青と赤を1隻ずつ展開
    fn duel() -> (SimulationEngine, AgentId, AgentId) {
        let mut engine = engine();
        let blue = deploy(&mut engine, BLUE, Point::new(122.0, 24.8));
        let red = deploy(&mut engine, RED, east_of(Point::new(122.0, 24.8), 20.0));
        (engine, blue, red)
    }

    #[test]
    fn test_sunk_cascades_and_attacker_returns() {
        let (mut engine, blue, red) = duel();
        let other = deploy(&mut engine, BLUE, Point::new(122.1, 24.9));
        engine
            .change_mission(other, MissionTarget::Agent(red), MissionKind::Track)
            .unwrap();
        engine
            .change_mission(blue, MissionTarget::Agent(red), MissionKind::Attack)
            .unwrap();
        engine.managers[BLUE].push_request(Request {
            target: red,
            requester: other,
            action_time: 1.0,
        });

        engine.execute_mission(blue).unwrap();

        assert_eq!(engine.agents[red.0].status, AgentStatus::Destroyed);
        assert!(engine.managers[RED].destroyed.contains(&red));
        assert!(engine.agents[red.0].involved_missions.is_empty());
        assert_eq!(engine.mission_kind_of(blue), Some(MissionKind::Return));
        // 目標を失った追尾は哨戒へ
        assert!(matches!(engine.mission_kind_of(other), Some(MissionKind::Travel { .. })));
        assert!(engine.managers[BLUE].requests.is_empty());
        assert_eq!(engine.events.of_kind(EventKind::Destroyed).count(), 1);
        assert_eq!(engine.agents[blue.0].capabilities.surface.ammunition, 3);
    }

    #[test]
    fn test_no_ammunition_aborts_without_outcome() {
        let (mut engine, blue, red) = duel();
        engine.agents[blue.0].capabilities.surface.ammunition = 0;
        engine
            .change_mission(blue, MissionTarget::Agent(red), MissionKind::Attack)
            .unwrap();
        assert_eq!(engine.attempt_to_attack(blue, red).unwrap(), AttackAttempt::NoAmmunition);

        engine.execute_mission(blue).unwrap();
        assert_eq!(engine.mission_kind_of(blue), Some(MissionKind::Return));
        assert_eq!(engine.agents[red.0].status, AgentStatus::Active);
        assert!(engine.events.is_empty());
    }

    #[test]
    fn test_out_of_range_goes_back_to_track() {
        let mut engine = engine();
        let blue = deploy(&mut engine, BLUE, Point::new(119.5, 25.0));
        let red = deploy(&mut engine, RED, east_of(Point::new(119.5, 25.0), 150.0));
        engine
            .change_mission(blue, MissionTarget::Agent(red), MissionKind::Attack)
            .unwrap();
        assert_eq!(engine.attempt_to_attack(blue, red).unwrap(), AttackAttempt::OutOfRange);
        engine.execute_mission(blue).unwrap();
        assert_eq!(engine.mission_kind_of(blue), Some(MissionKind::Track));
        assert_eq!(engine.agents[blue.0].capabilities.surface.ammunition, 4);
    }

    #[test]
    fn test_missed_attack_keeps_mission() {
        let (mut engine, blue, red) = duel();
        engine
            .change_mission(red, MissionTarget::Agent(blue), MissionKind::Attack)
            .unwrap();
        engine.execute_mission(red).unwrap();
        assert_eq!(engine.mission_kind_of(red), Some(MissionKind::Attack));
        assert_eq!(engine.events.of_kind(EventKind::AttackMissed).count(), 1);
        assert!(engine.agents[blue.0].in_combat);
    }

    #[test]
    fn test_remove_uninvolved_agent_is_error() {
        let (mut engine, blue, red) = duel();
        let other = deploy(&mut engine, BLUE, Point::new(122.1, 24.9));
        let mission = engine
            .change_mission(blue, MissionTarget::Agent(red), MissionKind::Track)
            .unwrap();
        let err = engine.remove_agent_from_mission(mission, other).unwrap_err();
        assert!(matches!(err, SimError::NotInMission { .. }));
        assert!(err.is_invariant_violation());
    }

    fn with_merchants() -> SimulationEngine {
        let mut config = scenario();
        config.boarding.base_rate = 10.0;
        config.merchants = Some(MerchantConfig {
            types: vec![MerchantTypeConfig {
                name: "Tanker".to_string(),
                weekly_arrivals: 0.0,
                speed: 25.0,
                visibility: SizeClass::Large,
            }],
            countries: vec![CountryConfig {
                name: "Market".to_string(),
                share: 1.0,
                postures: Default::default(),
            }],
            bases: vec![BaseConfig {
                name: "Kaohsiung".to_string(),
                location: [120.3, 22.6],
                share: 1.0,
            }],
            entry_max_y: None,
            unloading_time_h: 12.0,
        });
        SimulationEngine::from_scenario(&config).unwrap()
    }

    fn spawn_merchant(engine: &mut SimulationEngine, location: Point) -> AgentId {
        let id = AgentId(engine.agents.len());
        let delivery = Point::new(120.3, 22.6);
        engine.agents.push(Agent::merchant(
            id,
            2,
            "Tanker",
            25.0,
            SizeClass::Large,
            "Market",
            location,
            "Kaohsiung",
            delivery,
            12.0,
        ));
        engine.managers[2].place(id, AgentStatus::Active);
        engine
            .change_mission(id, MissionTarget::Location(delivery), MissionKind::Return)
            .unwrap();
        id
    }

    #[test]
    fn test_seizure_and_liberation() {
        let mut engine = with_merchants();
        let location = Point::new(122.0, 24.0);
        let merchant = spawn_merchant(&mut engine, location);
        let red = deploy(&mut engine, RED, east_of(location, 2.0));
        engine
            .change_mission(red, MissionTarget::Agent(merchant), MissionKind::Attack)
            .unwrap();
        engine.execute_mission(red).unwrap();

        let vessel = &engine.agents[merchant.0];
        assert!(vessel.is_seized());
        assert_eq!(vessel.side, Side::Hunter);
        assert_eq!(vessel.base_name, "Red Port");
        assert_eq!(engine.mission_kind_of(red), Some(MissionKind::Guard));
        assert_eq!(engine.mission_kind_of(merchant), Some(MissionKind::Return));
        assert_eq!(engine.events.of_kind(EventKind::MerchantSeized).count(), 1);

        // 護衛が近づくと解放される
        deploy(&mut engine, BLUE, east_of(location, -5.0));
        assert!(engine.check_liberation(merchant).unwrap());
        let vessel = &engine.agents[merchant.0];
        assert!(!vessel.is_seized());
        assert_eq!(vessel.side, Side::Neutral);
        assert_eq!(vessel.base_name, "Kaohsiung");
        assert_eq!(engine.mission_kind_of(red), Some(MissionKind::Return));
        assert_eq!(engine.events.of_kind(EventKind::MerchantLiberated).count(), 1);
    }

    #[test]
    fn test_boarding_blocked_by_escort() {
        let mut engine = with_merchants();
        let location = Point::new(122.0, 24.0);
        let merchant = spawn_merchant(&mut engine, location);
        let red = deploy(&mut engine, RED, east_of(location, 2.0));
        deploy(&mut engine, BLUE, east_of(location, -10.0));
        engine
            .change_mission(red, MissionTarget::Agent(merchant), MissionKind::Attack)
            .unwrap();
        engine.execute_mission(red).unwrap();

        assert!(!engine.agents[merchant.0].is_seized());
        assert_eq!(engine.events.of_kind(EventKind::BoardingBlocked).count(), 1);
        assert!(matches!(engine.mission_kind_of(red), Some(MissionKind::Travel { .. })));
    }

    #[test]
    fn test_destroyed_guard_releases_merchant() {
        let mut engine = with_merchants();
        let location = Point::new(122.0, 24.0);
        let merchant = spawn_merchant(&mut engine, location);
        let red = deploy(&mut engine, RED, east_of(location, 2.0));
        engine
            .change_mission(red, MissionTarget::Agent(merchant), MissionKind::Attack)
            .unwrap();
        engine.execute_mission(red).unwrap();
        assert!(engine.agents[merchant.0].is_seized());

        engine.destroy_agent(red).unwrap();
        let vessel = &engine.agents[merchant.0];
        assert!(!vessel.is_seized());
        assert_eq!(vessel.side, Side::Neutral);
        assert_eq!(engine.mission_kind_of(merchant), Some(MissionKind::Return));
        assert!(engine.agents[red.0].mission.is_none());
    }
}
