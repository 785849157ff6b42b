//! ミッションの実行
//!
//! 各ミッション種別の1ターン分の処理と、ミッション切り替えの共通処理。

use std::sync::Arc;

use tracing::{debug, info};

use super::SimulationEngine;
use crate::error::{SimError, SimResult};
use crate::geometry::Point;
use crate::models::*;
use crate::random::SimRng;
use crate::routing::Route;

/// 帰投中の探知に用いる乱数ストリームの番号の起点
const EN_ROUTE_STREAM: u64 = 1 << 32;

/// 現在地とみなす哨戒点までの距離 (km)
const SAME_POINT_KM: f64 = 0.1;

impl SimulationEngine {
    /// 現在のミッションを終了して新しいミッションを設定する
    pub(crate) fn change_mission(
        &mut self,
        agent: AgentId,
        target: MissionTarget,
        kind: MissionKind,
    ) -> SimResult<MissionId> {
        self.missions.finish_current(&mut self.agents, agent, MissionEnd::Changed)?;
        let id = self
            .missions
            .set_mission(&mut self.ids, &mut self.agents, agent, target, kind, self.time)?;

        let a = self.agent_mut(agent)?;
        a.route = None;
        if !a.is_merchant() {
            a.speed = match kind {
                MissionKind::Track | MissionKind::Attack | MissionKind::Guard => a.max_speed,
                _ => a.cruising_speed,
            };
        }
        debug!(agent = %agent, mission = %id, kind = kind.name(), "MISSION_CHANGED: ミッションを切り替えました");
        Ok(id)
    }

    /// 割り当てゾーン内の哨戒点へ向かう。ゾーンがなければ帰投
    pub fn start_patrol(&mut self, agent: AgentId) -> SimResult<()> {
        let (zone, side, location) = {
            let a = self.agent(agent)?;
            (a.assigned_zone.clone(), a.side, a.location)
        };
        let Some(zone) = zone else {
            return self.send_home(agent);
        };

        let holding = self.geography.zones.get(&zone).is_some_and(|z| z.holding);
        let point = self
            .choose_patrol_point(&zone, side, Some(location))
            .or_else(|| self.choose_patrol_point(&zone, side, None));
        match point {
            Some(point) => {
                let then = if holding { FollowUp::Holding } else { FollowUp::Observe };
                self.change_mission(agent, MissionTarget::Location(point), MissionKind::Travel { then })?;
                debug!(agent = %agent, zone = %zone, x = point.x, y = point.y, "PATROL_ASSIGNED: 哨戒点を割り当てました");
                Ok(())
            }
            None => self.send_home(agent),
        }
    }

    /// 基地への帰投ミッションを設定
    pub fn send_home(&mut self, agent: AgentId) -> SimResult<()> {
        let base = self.agent(agent)?.base;
        self.change_mission(agent, MissionTarget::Location(base), MissionKind::Return)?;
        Ok(())
    }

    /// フェロモンの少ない哨戒点を選ぶ
    ///
    /// 候補を複数サンプルし、周辺の自陣営フェロモン濃度が最小のものを採用します。
    /// `from` を渡すとその地点と同じ哨戒点は候補から外します。
    pub(crate) fn choose_patrol_point(&mut self, zone_id: &str, side: Side, from: Option<Point>) -> Option<Point> {
        let geography = Arc::clone(&self.geography);
        let zone = geography.zones.get(zone_id)?;

        let mut best: Option<(f64, Point)> = None;
        for _ in 0..self.settings.patrol_candidates.max(1) {
            let point = zone.sample_patrol_location(&mut self.rng)?;
            if from.is_some_and(|here| here.distance_to(&point) < SAME_POINT_KM) {
                continue;
            }
            let (concentration, _) =
                self.grid
                    .concentration_around(&point, self.settings.pheromone_radius_km, side);
            if best.is_none_or(|(lowest, _)| concentration < lowest) {
                best = Some((concentration, point));
            }
        }
        best.map(|(_, point)| point)
    }

    /// ミッション目標の現在位置
    pub(crate) fn target_location(&self, mission: &Mission) -> SimResult<Point> {
        match mission.target {
            MissionTarget::Location(point) => Ok(point),
            MissionTarget::Agent(id) => Ok(self.agent(id)?.location),
        }
    }

    /// ルートがなければ（追尾では古ければ）作り直す
    fn ensure_route(&mut self, agent: AgentId, destination: Point, refresh: bool) -> SimResult<()> {
        let a = self.agent(agent)?;
        let stale = match &a.route {
            None => true,
            Some(route) => {
                route.is_finished()
                    || (refresh && self.time - route.created_at() >= self.settings.route_refresh_h - 1e-9)
            }
        };
        if !stale {
            return Ok(());
        }
        let route = self
            .geography
            .router
            .create_route(a.location, destination, a.side, a.movement_domain(), self.time)?;
        self.agent_mut(agent)?.set_route(route);
        Ok(())
    }

    fn advance(&mut self, agent: AgentId) -> SimResult<MoveOutcome> {
        let limit = self.settings.iteration_limit;
        self.agent_mut(agent)?.move_through_route(limit)
    }

    /// エージェントの現在のミッションを1ターン分実行
    pub(crate) fn execute_mission(&mut self, agent: AgentId) -> SimResult<()> {
        let Some(mission) = self.mission_of(agent).cloned() else {
            return Ok(());
        };
        match mission.kind {
            MissionKind::Travel { then } => self.execute_travel(agent, &mission, then),
            // 探知フェーズで移動済み
            MissionKind::Observe => Ok(()),
            MissionKind::Track => self.execute_track(agent, &mission),
            MissionKind::Attack => self.execute_attack(agent, &mission),
            MissionKind::Guard => self.execute_guard(agent, &mission),
            MissionKind::Return => self.execute_return(agent, &mission),
            MissionKind::Holding => {
                self.agent_mut(agent)?.drain_endurance();
                Ok(())
            }
            MissionKind::Depart => self.execute_depart(agent, &mission),
        }
    }

    /// 観測中の哨戒移動
    ///
    /// 経路の終点に着くたびにフェロモンの少ない次の哨戒点へ向かいます。
    pub(crate) fn patrol_move(&mut self, agent: AgentId) -> SimResult<()> {
        let limit = self.settings.iteration_limit;
        let mut iterations = 0;
        while self.agent(agent)?.movement_left > 0.0 {
            iterations += 1;
            if iterations > limit {
                return Err(SimError::IterationLimit {
                    agent,
                    limit,
                    context: "patrol_move",
                });
            }

            let finished = self.agent(agent)?.route.as_ref().is_none_or(|route| route.is_finished());
            if finished {
                let (zone, side, location) = {
                    let a = self.agent(agent)?;
                    (a.assigned_zone.clone(), a.side, a.location)
                };
                let Some(zone) = zone else {
                    return self.send_home(agent);
                };
                let Some(point) = self.choose_patrol_point(&zone, side, Some(location)) else {
                    // 移動先になる哨戒点がなければその場で滞空・漂泊する
                    debug!(agent = %agent, zone = %zone, "PATROL_HOLD: 次の哨戒点がありません");
                    self.agent_mut(agent)?.drain_endurance();
                    return Ok(());
                };
                self.ensure_route(agent, point, false)?;
            }

            let before = self.agent(agent)?.movement_left;
            self.advance(agent)?;
            // 長さ0の経路では進めないので残りの移動量を消費して終える
            let a = self.agent_mut(agent)?;
            if a.movement_left >= before && a.route.as_ref().is_none_or(|route| route.is_finished()) {
                a.drain_endurance();
            }
        }
        Ok(())
    }

    fn execute_travel(&mut self, agent: AgentId, mission: &Mission, then: FollowUp) -> SimResult<()> {
        let destination = self.target_location(mission)?;
        self.ensure_route(agent, destination, false)?;
        if self.advance(agent)? == MoveOutcome::SpentTurnMovement {
            return Ok(());
        }

        self.missions.finish(&mut self.agents, mission.id, MissionEnd::Completed)?;
        let location = self.agent(agent)?.location;
        let kind = match then {
            FollowUp::Observe => MissionKind::Observe,
            FollowUp::Holding => MissionKind::Holding,
        };
        self.change_mission(agent, MissionTarget::Location(location), kind)?;
        Ok(())
    }

    fn execute_track(&mut self, agent: AgentId, mission: &Mission) -> SimResult<()> {
        let Some(target) = mission.target.agent() else {
            return self.abort_and_patrol(agent);
        };
        if !self.is_valid_target_id(agent, target) {
            debug!(agent = %agent, target = %target, "TRACK_LOST: 目標が無効になりました");
            return self.abort_and_patrol(agent);
        }

        let (tracker, contact) = (self.agent(agent)?, self.agent(target)?);
        if self.can_engage(tracker, contact) {
            let in_range = self
                .engagement_range(tracker, contact)
                .is_some_and(|range| tracker.distance_to(contact) <= range);
            if in_range {
                let id = self.change_mission(agent, MissionTarget::Agent(target), MissionKind::Attack)?;
                let attack = self.missions.get(id).cloned().ok_or(SimError::UnknownMission(id))?;
                return self.execute_attack(agent, &attack);
            }
        } else if !mission.support_requested {
            if !self.request_support(agent, target)? {
                debug!(agent = %agent, target = %target, "TRACK_ABANDONED: 支援を要請できる艦隊がありません");
                return self.abort_and_patrol(agent);
            }
            if let Some(m) = self.missions.get_mut(mission.id) {
                m.support_requested = true;
            }
        }

        let destination = self.agent(target)?.location;
        self.ensure_route(agent, destination, true)?;
        self.advance(agent)?;
        Ok(())
    }

    fn execute_return(&mut self, agent: AgentId, mission: &Mission) -> SimResult<()> {
        if self.agent(agent)?.is_seized() && self.check_liberation(agent)? {
            return Ok(());
        }

        let destination = self.target_location(mission)?;
        self.ensure_route(agent, destination, false)?;
        let outcome = self.advance(agent)?;

        let observes = {
            let a = self.agent(agent)?;
            !a.is_merchant() && !a.ctl
        };
        if observes {
            self.observe_en_route(agent)?;
        }

        if outcome == MoveOutcome::ReachedEndOfRoute {
            self.arrive_at_base(agent, mission.id)?;
        }
        Ok(())
    }

    fn execute_depart(&mut self, agent: AgentId, mission: &Mission) -> SimResult<()> {
        let destination = self.target_location(mission)?;
        self.ensure_route(agent, destination, false)?;
        if self.advance(agent)? == MoveOutcome::ReachedEndOfRoute {
            let location = self.agent(agent)?.location;
            self.events
                .record(self.time, EventKind::MerchantDeparted, agent, None, location, "");
            self.remove_from_world(agent)?;
        }
        Ok(())
    }

    /// 基地到着時の処理
    fn arrive_at_base(&mut self, agent: AgentId, mission: MissionId) -> SimResult<()> {
        self.missions.finish(&mut self.agents, mission, MissionEnd::Completed)?;
        let ctl_factor = self.settings.ctl_repair_factor;
        let a = self.agent_mut(agent)?;
        let location = a.location;
        let manager = a.manager;

        match a.merchant_state().map(|m| (m.seized, m.unloaded)) {
            Some((true, _)) => {
                let base = a.base_name.clone();
                self.events
                    .record(self.time, EventKind::MerchantDelivered, agent, None, location, base);
                self.remove_from_world(agent)?;
            }
            Some((false, false)) => {
                a.start_maintenance(1.0);
                if let Some(state) = a.merchant_state_mut() {
                    state.unloaded = true;
                }
                self.managers[manager].place(agent, AgentStatus::Inactive);
                debug!(agent = %agent, "MERCHANT_UNLOADING: 荷揚げを開始しました");
            }
            Some((false, true)) => {
                let exit = a.merchant_state().map(|m| m.entry_point).unwrap_or(location);
                self.change_mission(agent, MissionTarget::Location(exit), MissionKind::Depart)?;
            }
            None => {
                a.start_maintenance(ctl_factor);
                let maintenance = a.remaining_maintenance;
                self.managers[manager].place(agent, AgentStatus::Inactive);
                info!(agent = %agent, maintenance = maintenance, "AGENT_AT_BASE: 基地に帰投しました");
            }
        }
        Ok(())
    }

    /// 帰投中の探知。発見した目標は支援要請として自艦隊に積む
    fn observe_en_route(&mut self, agent: AgentId) -> SimResult<()> {
        let mut rng = self.rng.derive(self.step_count, EN_ROUTE_STREAM + agent.0 as u64);
        let observer = self.agent(agent)?;
        let Some((target, distance)) = self.sweep(observer, &mut rng) else {
            return Ok(());
        };

        let manager = observer.manager;
        let location = observer.location;
        if self.managers[manager].requests.iter().any(|r| r.target == target) {
            return Ok(());
        }
        self.events.record(
            self.time,
            EventKind::Detected,
            agent,
            Some(target),
            location,
            format!("en route {:.1} km", distance),
        );
        self.managers[manager].push_request(Request {
            target,
            requester: agent,
            action_time: self.time + self.settings.communication_delay_h,
        });
        Ok(())
    }

    /// 探知できた敵対目標のうち最も近いものを返す
    ///
    /// 全候補に探知判定を行います。距離が等しければID順で先のものを選びます。
    pub(crate) fn sweep(&self, observer: &Agent, rng: &mut SimRng) -> Option<(AgentId, f64)> {
        let sea_state = self.sea_state_at(&observer.location);
        self.agents
            .iter()
            .filter(|target| self.is_valid_target(observer, target))
            .filter_map(|target| match self.detection.detect(observer, target, sea_state, rng) {
                DetectionOutcome::Detected { distance } => Some((target.id, distance)),
                _ => None,
            })
            .reduce(|nearest, candidate| if candidate.1 < nearest.1 { candidate } else { nearest })
    }

    /// 同陣営の艦隊に支援を要請する（自艦隊を優先）
    pub(crate) fn request_support(&mut self, requester: AgentId, target: AgentId) -> SimResult<bool> {
        let (side, own) = {
            let a = self.agent(requester)?;
            (a.side, a.manager)
        };
        let mut order: Vec<usize> = vec![own];
        order.extend((0..self.managers.len()).filter(|&i| i != own));

        for index in order {
            let manager = &self.managers[index];
            if manager.side != side || manager.is_merchant() || !self.manager_can_take_task(index, target) {
                continue;
            }
            let location = self.agent(requester)?.location;
            self.managers[index].push_request(Request {
                target,
                requester,
                action_time: self.time + self.settings.communication_delay_h,
            });
            let name = self.managers[index].name.clone();
            self.events
                .record(self.time, EventKind::SupportRequested, requester, Some(target), location, name);
            return Ok(true);
        }
        Ok(false)
    }

    /// 待機中または出撃可能なエージェントで目標に対処できるものがあるか
    pub(crate) fn manager_can_take_task(&self, index: usize, target: AgentId) -> bool {
        let Ok(contact) = self.agent(target) else {
            return false;
        };
        self.task_candidates(index)
            .into_iter()
            .filter_map(|id| self.agents.get(id.0))
            .any(|a| self.is_valid_target(a, contact) && self.can_engage(a, contact))
    }

    /// 任務割り当て候補（待機ミッション中のものを優先し、次に基地で出撃可能なもの）
    pub(crate) fn task_candidates(&self, index: usize) -> Vec<AgentId> {
        let manager = &self.managers[index];
        let holding = manager
            .active
            .iter()
            .copied()
            .filter(|id| self.mission_kind_of(*id) == Some(MissionKind::Holding));
        let idle = manager
            .inactive
            .iter()
            .copied()
            .filter(|id| self.agents.get(id.0).is_some_and(|a| a.is_ready()));
        holding.chain(idle).collect()
    }

    /// 現在のミッションを中止して哨戒に戻る
    pub(crate) fn abort_and_patrol(&mut self, agent: AgentId) -> SimResult<()> {
        self.missions.finish_current(&mut self.agents, agent, MissionEnd::Aborted)?;
        self.start_patrol(agent)
    }

    /// 処理に失敗したエージェントを安全な状態へ戻す
    pub(crate) fn recover(&mut self, agent: AgentId) -> SimResult<()> {
        let Some(mission) = self.mission_of(agent).cloned() else {
            if self.agent(agent)?.is_active() {
                self.send_home(agent)?;
            }
            return Ok(());
        };

        if mission.kind.is_homebound() {
            // 経路探索に失敗した帰投は直線で向かう
            let destination = self.target_location(&mission)?;
            let now = self.time;
            let a = self.agent_mut(agent)?;
            let route = Route::new(vec![a.location, destination], now);
            a.set_route(route);
            return Ok(());
        }

        self.missions.finish_current(&mut self.agents, agent, MissionEnd::Aborted)?;
        if self.agent(agent)?.is_active() {
            self.send_home(agent)?;
        }
        Ok(())
    }
}
