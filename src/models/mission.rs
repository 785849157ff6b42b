//! ミッション
//!
//! エージェント1体につき高々1つのミッションを保持します。ミッションはIDで索引される
//! [`MissionArena`] が所有し、エージェント側は自身のミッションIDと、
//! 目標として関与しているミッションIDの一覧だけを持ちます。

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::geometry::Point;
use crate::models::agent::Agent;
use crate::models::common::{AgentId, IdGenerator, MissionId};

/// ミッションの目標
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissionTarget {
    Agent(AgentId),
    Location(Point),
}

impl MissionTarget {
    pub fn agent(&self) -> Option<AgentId> {
        match self {
            MissionTarget::Agent(id) => Some(*id),
            MissionTarget::Location(_) => None,
        }
    }
}

/// 移動完了後に続けるミッション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    Observe,
    Holding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionKind {
    Travel { then: FollowUp },
    Observe,
    Track,
    Attack,
    Guard,
    Return,
    Holding,
    Depart,
}

impl MissionKind {
    pub fn name(&self) -> &'static str {
        match self {
            MissionKind::Travel { .. } => "Travel",
            MissionKind::Observe => "Observe",
            MissionKind::Track => "Track",
            MissionKind::Attack => "Attack",
            MissionKind::Guard => "Guard",
            MissionKind::Return => "Return",
            MissionKind::Holding => "Holding",
            MissionKind::Depart => "Depart",
        }
    }

    /// 基地・出域点へ向かう途中か
    pub fn is_homebound(&self) -> bool {
        matches!(self, MissionKind::Return | MissionKind::Depart)
    }
}

/// ミッション終了の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionEnd {
    Completed,
    Aborted,
    /// 別のミッションへの切り替え
    Changed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mission {
    pub id: MissionId,
    pub agent: AgentId,
    pub target: MissionTarget,
    pub kind: MissionKind,
    pub created_at: f64,
    /// 支援要請を出したか（追尾中に1回のみ）
    pub support_requested: bool,
}

impl Mission {
    pub fn describe(&self) -> String {
        match self.target {
            MissionTarget::Agent(id) => format!("{} {}", self.kind.name(), id),
            MissionTarget::Location(p) => format!("{} ({:.3}, {:.3})", self.kind.name(), p.x, p.y),
        }
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.id, self.describe())
    }
}

/// ミッションの格納庫
#[derive(Debug, Clone, Default)]
pub struct MissionArena {
    missions: BTreeMap<MissionId, Mission>,
}

impl MissionArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn get(&self, id: MissionId) -> Option<&Mission> {
        self.missions.get(&id)
    }

    pub fn get_mut(&mut self, id: MissionId) -> Option<&mut Mission> {
        self.missions.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mission> {
        self.missions.values()
    }

    /// エージェントの現在のミッション
    pub fn of(&self, agent: &Agent) -> Option<&Mission> {
        agent.mission.and_then(|id| self.missions.get(&id))
    }

    /// ミッションを設定する
    ///
    /// 既にミッションを保持しているエージェントへの設定は不変条件違反です。
    /// 目標がエージェントの場合、目標側の関与ミッション一覧に登録します。
    pub fn set_mission(
        &mut self,
        ids: &mut IdGenerator,
        agents: &mut [Agent],
        agent: AgentId,
        target: MissionTarget,
        kind: MissionKind,
        now: f64,
    ) -> SimResult<MissionId> {
        let owner = agents.get(agent.0).ok_or(SimError::UnknownAgent(agent))?;
        if let Some(existing) = owner.mission {
            return Err(SimError::MissionAlreadySet {
                agent,
                mission: existing,
            });
        }
        if let MissionTarget::Agent(target_id) = target {
            if agents.get(target_id.0).is_none() {
                return Err(SimError::UnknownAgent(target_id));
            }
        }

        let id = ids.next_mission();
        let mission = Mission {
            id,
            agent,
            target,
            kind,
            created_at: now,
            support_requested: false,
        };
        debug!(
            agent = %agent,
            mission = %mission,
            time = now,
            "MISSION_SET: ミッション設定"
        );
        self.missions.insert(id, mission);

        agents[agent.0].mission = Some(id);
        if let MissionTarget::Agent(target_id) = target {
            agents[target_id.0].involved_missions.push(id);
        }
        Ok(id)
    }

    /// ミッションを終了させ、所有者と目標の参照を外す
    pub fn finish(&mut self, agents: &mut [Agent], id: MissionId, end: MissionEnd) -> SimResult<Mission> {
        let mission = self.missions.remove(&id).ok_or(SimError::UnknownMission(id))?;

        if let Some(owner) = agents.get_mut(mission.agent.0) {
            if owner.mission == Some(id) {
                owner.mission = None;
                owner.route = None;
            }
        }
        if let MissionTarget::Agent(target_id) = mission.target {
            if let Some(target) = agents.get_mut(target_id.0) {
                target.involved_missions.retain(|m| *m != id);
            }
        }

        debug!(
            agent = %mission.agent,
            mission = %mission,
            end = ?end,
            "MISSION_FINISHED: ミッション終了"
        );
        Ok(mission)
    }

    /// エージェントの現在のミッションを終了させる（なければ何もしない）
    pub fn finish_current(&mut self, agents: &mut [Agent], agent: AgentId, end: MissionEnd) -> SimResult<Option<Mission>> {
        let current = agents.get(agent.0).ok_or(SimError::UnknownAgent(agent))?.mission;
        match current {
            Some(id) => self.finish(agents, id, end).map(Some),
            None => Ok(None),
        }
    }
}
