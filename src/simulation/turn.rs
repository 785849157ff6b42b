//! マネージャ単位の1ターン処理
//!
//! 航続距離判定と哨戒探知はエージェントごとに独立した読み取り専用の計算なので、
//! 設定に応じて rayon で並列に評価し、結果の適用はエージェントID順に逐次行います。
//! 探知の乱数はステップ番号とエージェントIDから導出するため、並列・逐次で結果は一致します。

use std::collections::VecDeque;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use super::SimulationEngine;
use crate::error::{SimError, SimResult};
use crate::models::*;
use crate::routing::Route;

/// 直線距離による航続距離の事前判定の係数
const STRAIGHT_LINE_ALLOWANCE: f64 = 1.5;

/// 航続距離判定の結果
enum EnduranceCheck {
    Continue,
    /// 帰投が必要（経路探索に失敗した場合は None）
    ForceReturn(Option<Route>),
}

impl SimulationEngine {
    /// マネージャ1つ分のターン処理
    pub(crate) fn run_manager_turn(&mut self, index: usize) -> SimResult<()> {
        let merchant = self.managers[index].is_merchant();

        self.progress_maintenance(index)?;
        self.assign_movement_budgets(index);
        if !merchant {
            self.activate_agents(index)?;
            self.check_endurance(index)?;
            self.observe(index)?;
            self.drain_requests(index)?;
        }
        self.execute_missions(index)
    }

    /// 基地整備を進める。荷揚げを終えた商船は出口へ向かう
    fn progress_maintenance(&mut self, index: usize) -> SimResult<()> {
        let dt = self.settings.dt_h;
        let waiting: Vec<AgentId> = self.managers[index].inactive.iter().copied().collect();
        for id in waiting {
            if !self.agent_mut(id)?.tick_maintenance(dt) {
                continue;
            }
            let agent = self.agent(id)?;
            let Some(exit) = agent.merchant_state().map(|s| s.entry_point) else {
                debug!(agent = %id, "MAINTENANCE_COMPLETE: 整備完了");
                continue;
            };
            self.agent_mut(id)?.status = AgentStatus::Active;
            self.managers[index].place(id, AgentStatus::Active);
            self.agent_mut(id)?.set_movement_budget(dt);
            self.change_mission(id, MissionTarget::Location(exit), MissionKind::Depart)?;
            debug!(agent = %id, "MERCHANT_UNLOADED: 荷揚げを終えて出港します");
        }
        Ok(())
    }

    fn assign_movement_budgets(&mut self, index: usize) {
        let dt = self.settings.dt_h;
        for id in self.managers[index].active.iter() {
            if let Some(agent) = self.agents.get_mut(id.0) {
                agent.set_movement_budget(dt);
            }
        }
    }

    /// 活動率が目標を下回る間、待機中のエージェントを出撃させる
    fn activate_agents(&mut self, index: usize) -> SimResult<()> {
        let side = self.managers[index].side;
        let level = self.escalation.level(side);
        let limit = self.settings.iteration_limit;

        let mut iterations = 0;
        while self.managers[index].current_utilisation() < self.managers[index].utilisation {
            iterations += 1;
            if iterations > limit {
                warn!(manager = %self.managers[index].name, limit = limit, "ACTIVATION_LIMIT: 出撃処理の反復上限に達しました");
                break;
            }

            let candidates: Vec<AgentId> = self.managers[index]
                .inactive
                .iter()
                .copied()
                .filter(|id| {
                    self.agents.get(id.0).is_some_and(|a| {
                        a.is_ready()
                            && self
                                .rules
                                .zone_weights(side, level, &a.combat_type)
                                .iter()
                                .any(|(_, w)| *w > 0.0)
                    })
                })
                .collect();
            let Some(&id) = self.rng.choose(&candidates) else {
                break;
            };

            let weights = self.rules.zone_weights(side, level, &self.agent(id)?.combat_type);
            let values: Vec<f64> = weights.iter().map(|(_, w)| *w).collect();
            let Some(zone) = self.rng.weighted_index(&values).map(|i| weights[i].0.clone()) else {
                break;
            };

            self.activate(id, Some(zone.clone()))?;
            self.start_patrol(id)?;
            info!(
                agent = %id,
                manager = %self.managers[index].name,
                zone = %zone,
                "AGENT_ACTIVATED: 出撃しました"
            );
        }
        Ok(())
    }

    /// 待機中のエージェントを活動状態にする
    fn activate(&mut self, id: AgentId, zone: Option<String>) -> SimResult<()> {
        let dt = self.settings.dt_h;
        let agent = self.agent_mut(id)?;
        agent.status = AgentStatus::Active;
        agent.assigned_zone = zone;
        agent.speed = agent.cruising_speed;
        agent.set_movement_budget(dt);
        let manager = agent.manager;
        self.managers[manager].place(id, AgentStatus::Active);
        Ok(())
    }

    /// 航続距離が基地までの経路長×安全係数を下回ったエージェントを帰投させる
    fn check_endurance(&mut self, index: usize) -> SimResult<()> {
        let ids: Vec<AgentId> = self.managers[index]
            .active
            .iter()
            .copied()
            .filter(|id| !self.mission_kind_of(*id).is_some_and(|k| k.is_homebound()))
            .collect();

        let results: Vec<(AgentId, EnduranceCheck)> = {
            let engine = &*self;
            let evaluate = |id: &AgentId| (*id, engine.endurance_check(*id));
            if self.settings.parallel {
                ids.par_iter().map(evaluate).collect()
            } else {
                ids.iter().map(evaluate).collect()
            }
        };

        for (id, check) in results {
            let EnduranceCheck::ForceReturn(route) = check else {
                continue;
            };
            let agent = self.agent(id)?;
            let (location, remaining) = (agent.location, agent.remaining_endurance);
            self.events
                .record(self.time, EventKind::ForcedReturn, id, None, location, "endurance");
            info!(agent = %id, remaining = remaining, "FORCED_RETURN: 航続距離不足のため帰投します");
            self.force_return(id, route)?;
        }
        Ok(())
    }

    fn endurance_check(&self, id: AgentId) -> EnduranceCheck {
        let Some(agent) = self.agents.get(id.0) else {
            return EnduranceCheck::Continue;
        };
        if STRAIGHT_LINE_ALLOWANCE * agent.distance_to_base() <= agent.remaining_endurance {
            return EnduranceCheck::Continue;
        }
        match self.geography.router.create_route(
            agent.location,
            agent.base,
            agent.side,
            agent.movement_domain(),
            self.time,
        ) {
            Ok(route) if agent.can_continue(route.length(), self.settings.safety_endurance) => {
                EnduranceCheck::Continue
            }
            Ok(route) => EnduranceCheck::ForceReturn(Some(route)),
            Err(e) => {
                warn!(agent = %id, error = %e, "RETURN_ROUTE_FAILED: 帰投経路を作成できません");
                EnduranceCheck::ForceReturn(None)
            }
        }
    }

    /// 観測中エージェントの哨戒移動、探知、探索済みフェロモンの付加
    ///
    /// 移動は逐次、探知は並列に評価します。探知がなければ観測ミッションを続けます。
    fn observe(&mut self, index: usize) -> SimResult<()> {
        let observing = |engine: &Self| -> Vec<AgentId> {
            engine.managers[index]
                .active
                .iter()
                .copied()
                .filter(|id| engine.mission_kind_of(*id) == Some(MissionKind::Observe))
                .collect()
        };

        for id in observing(&*self) {
            if let Err(e) = self.patrol_move(id) {
                let description = self.mission_of(id).map(|m| m.describe()).unwrap_or_default();
                self.handle_failure(id, description, e)?;
            }
        }
        let observers = observing(&*self);

        let results: Vec<(AgentId, Option<(AgentId, f64)>)> = {
            let engine = &*self;
            let evaluate = |id: &AgentId| {
                let found = engine.agents.get(id.0).and_then(|observer| {
                    let mut rng = engine.rng.derive(engine.step_count, id.0 as u64);
                    engine.sweep(observer, &mut rng)
                });
                (*id, found)
            };
            if self.settings.parallel {
                observers.par_iter().map(evaluate).collect()
            } else {
                observers.iter().map(evaluate).collect()
            }
        };

        for (id, found) in results {
            let agent = self.agent(id)?;
            let (location, side) = (agent.location, agent.side);
            if let Err(e) = self.grid.deposit(&location, side) {
                debug!(agent = %id, error = %e, "PHEROMONE_SKIPPED: フェロモンを付加できません");
            }

            if let Some((target, distance)) = found.filter(|(target, _)| self.is_valid_target_id(id, *target)) {
                self.missions.finish_current(&mut self.agents, id, MissionEnd::Completed)?;
                info!(agent = %id, target = %target, distance, "TARGET_DETECTED: 目標を探知しました");
                self.events.record(
                    self.time,
                    EventKind::Detected,
                    id,
                    Some(target),
                    location,
                    format!("{:.1} km", distance),
                );
                self.change_mission(id, MissionTarget::Agent(target), MissionKind::Track)?;
            }
        }
        Ok(())
    }

    /// 通信遅延を過ぎた支援要請に対処するエージェントを割り当てる
    ///
    /// 割り当てできなかった要請は順序を保ったままキューに残ります。
    fn drain_requests(&mut self, index: usize) -> SimResult<()> {
        let mut pending = std::mem::take(&mut self.managers[index].requests);
        let mut remaining = VecDeque::with_capacity(pending.len());
        let limit = self.settings.iteration_limit;

        let mut iterations = 0;
        while let Some(request) = pending.pop_front() {
            iterations += 1;
            if iterations > limit {
                remaining.push_back(request);
                remaining.extend(pending);
                self.managers[index].requests = remaining;
                return Err(SimError::IterationLimit {
                    agent: request.requester,
                    limit,
                    context: "drain_requests",
                });
            }

            if request.action_time > self.time + 1e-9 {
                remaining.push_back(request);
                continue;
            }
            if !self.agent(request.target)?.is_active() {
                continue;
            }
            match self.find_responder(index, request.target) {
                Some(responder) => self.assign_task(responder, request.target)?,
                None => remaining.push_back(request),
            }
        }

        let pushed = std::mem::take(&mut self.managers[index].requests);
        remaining.extend(pushed);
        self.managers[index].requests = remaining;
        Ok(())
    }

    fn find_responder(&self, index: usize, target: AgentId) -> Option<AgentId> {
        let contact = self.agents.get(target.0)?;
        let margin = self.settings.safety_endurance;
        self.task_candidates(index).into_iter().find(|id| {
            self.agents.get(id.0).is_some_and(|a| {
                self.is_valid_target(a, contact)
                    && a.reach_and_return(&contact.location, margin)
                    && self.can_engage(a, contact)
            })
        })
    }

    fn assign_task(&mut self, responder: AgentId, target: AgentId) -> SimResult<()> {
        if !self.agent(responder)?.is_active() {
            let zone = self.zone_id_at(&self.agent(target)?.location).map(str::to_string);
            self.activate(responder, zone)?;
        }
        self.change_mission(responder, MissionTarget::Agent(target), MissionKind::Track)?;
        info!(agent = %responder, target = %target, "TASK_ASSIGNED: 支援要請に対処します");
        Ok(())
    }

    /// 探知以外のミッションを逐次実行
    ///
    /// 不変条件違反はステップを中断し、それ以外のエラーはエージェント単位で
    /// 記録して安全な状態へ戻します。
    fn execute_missions(&mut self, index: usize) -> SimResult<()> {
        let ids: Vec<AgentId> = self.managers[index].active.iter().copied().collect();
        for id in ids {
            let agent = self.agent(id)?;
            if !agent.is_active() {
                continue;
            }
            let Some(mission) = self.missions.of(agent).cloned() else {
                continue;
            };
            if mission.kind == MissionKind::Observe {
                continue;
            }

            if let Err(e) = self.execute_mission(id) {
                self.handle_failure(id, mission.describe(), e)?;
            }
        }
        Ok(())
    }

    /// 不変条件違反はステップごと中断し、それ以外はエージェントを復旧させる
    fn handle_failure(&mut self, id: AgentId, mission: String, e: SimError) -> SimResult<()> {
        let agent = self.agent(id)?;
        let wrapped = SimError::Agent {
            agent: id,
            mission,
            x: agent.location.x,
            y: agent.location.y,
            source: Box::new(e),
        };
        if wrapped.is_invariant_violation() {
            error!(error = %wrapped, "INVARIANT_VIOLATION: 不変条件違反のためステップを中断します");
            return Err(wrapped);
        }
        warn!(error = %wrapped, "MISSION_FAILED: ミッション処理に失敗しました");
        self.recover(id)
    }
}
