//! マネージャ
//!
//! 国・軍種ごとの艦隊を管理し、エージェントの所属プール（活動・非活動・予備・喪失）、
//! 基地、弾薬在庫、通信遅延付きの支援要請キューを保持します。
//! ターン内の各フェーズの実行自体は `simulation` 側が行います。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::models::base::Base;
use crate::models::common::{AgentId, AgentStatus, Side, Skill};
use crate::models::engagement::MunitionEntry;
use crate::random::SimRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    Fleet,
    Merchant,
}

/// 支援要請（通信遅延後に処理可能になる）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Request {
    pub target: AgentId,
    pub requester: AgentId,
    pub action_time: f64,
}

#[derive(Debug, Clone)]
pub struct Manager {
    pub index: usize,
    pub name: String,
    pub side: Side,
    pub kind: ManagerKind,
    /// 目標とする活動率
    pub utilisation: f64,
    pub bases: Vec<Base>,
    pub active: BTreeSet<AgentId>,
    pub inactive: BTreeSet<AgentId>,
    pub reserved: BTreeSet<AgentId>,
    pub destroyed: BTreeSet<AgentId>,
    pub munitions: Vec<MunitionEntry>,
    pub requests: VecDeque<Request>,
}

impl Manager {
    pub fn new(index: usize, name: impl Into<String>, side: Side, kind: ManagerKind, utilisation: f64) -> Self {
        Self {
            index,
            name: name.into(),
            side,
            kind,
            utilisation,
            bases: Vec::new(),
            active: BTreeSet::new(),
            inactive: BTreeSet::new(),
            reserved: BTreeSet::new(),
            destroyed: BTreeSet::new(),
            munitions: Vec::new(),
            requests: VecDeque::new(),
        }
    }

    pub fn is_merchant(&self) -> bool {
        self.kind == ManagerKind::Merchant
    }

    /// 状態に対応するプールへ移す（他のプールからは取り除く）
    ///
    /// `Removed` はどのプールにも属さない。
    pub fn place(&mut self, agent: AgentId, status: AgentStatus) {
        self.active.remove(&agent);
        self.inactive.remove(&agent);
        self.reserved.remove(&agent);
        self.destroyed.remove(&agent);
        match status {
            AgentStatus::Active => self.active.insert(agent),
            AgentStatus::Inactive => self.inactive.insert(agent),
            AgentStatus::Reserved => self.reserved.insert(agent),
            AgentStatus::Destroyed => self.destroyed.insert(agent),
            AgentStatus::Removed => false,
        };
    }

    pub fn owns(&self, agent: AgentId) -> bool {
        self.active.contains(&agent)
            || self.inactive.contains(&agent)
            || self.reserved.contains(&agent)
            || self.destroyed.contains(&agent)
    }

    /// 活動中 / (活動中 + 非活動)
    pub fn current_utilisation(&self) -> f64 {
        let total = self.active.len() + self.inactive.len();
        if total == 0 {
            return 1.0;
        }
        self.active.len() as f64 / total as f64
    }

    /// 比率に従って基地を選ぶ
    pub fn sample_base(&self, rng: &mut SimRng) -> Option<&Base> {
        let weights: Vec<f64> = self.bases.iter().map(|b| b.share).collect();
        rng.weighted_index(&weights).and_then(|i| self.bases.get(i))
    }

    pub fn base_named(&self, name: &str) -> Option<&Base> {
        self.bases.iter().find(|b| b.name == name)
    }

    /// 在庫のある弾薬のうち射程が最大のもの
    pub fn select_munition(&self, attacker: &str, skill: Skill, defender: &str) -> Option<usize> {
        self.munitions
            .iter()
            .enumerate()
            .filter(|(_, m)| m.matches(attacker, skill, defender) && m.in_stock())
            .max_by(|(_, a), (_, b)| a.range.total_cmp(&b.range))
            .map(|(i, _)| i)
    }

    pub fn munition(&self, index: usize) -> Option<&MunitionEntry> {
        self.munitions.get(index)
    }

    pub fn consume_munition(&mut self, index: usize) -> bool {
        self.munitions.get_mut(index).is_some_and(|m| m.consume())
    }

    pub fn push_request(&mut self, request: Request) {
        self.requests.push_back(request);
    }

    /// 目標に関する要請を取り除く
    pub fn drop_requests_for(&mut self, target: AgentId) {
        self.requests.retain(|r| r.target != target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn munition(range: f64, stock: Option<u32>) -> MunitionEntry {
        MunitionEntry {
            attacker: "TW ESC".to_string(),
            attacker_skill: Skill::Basic,
            defender: "CN PLAN".to_string(),
            range,
            stock,
        }
    }

    #[test]
    fn test_agent_in_exactly_one_pool() {
        let mut manager = Manager::new(0, "Taiwan Navy", Side::Coalition, ManagerKind::Fleet, 0.5);
        let id = AgentId(3);
        manager.place(id, AgentStatus::Inactive);
        manager.place(id, AgentStatus::Active);
        assert!(manager.active.contains(&id));
        assert!(!manager.inactive.contains(&id));

        manager.place(id, AgentStatus::Destroyed);
        assert!(!manager.active.contains(&id));
        assert!(manager.destroyed.contains(&id));
        assert!(manager.owns(id));

        manager.place(id, AgentStatus::Removed);
        assert!(!manager.owns(id));
    }

    #[test]
    fn test_current_utilisation() {
        let mut manager = Manager::new(0, "Taiwan Navy", Side::Coalition, ManagerKind::Fleet, 0.5);
        for i in 0..4 {
            manager.place(AgentId(i), AgentStatus::Inactive);
        }
        manager.place(AgentId(9), AgentStatus::Reserved);
        assert_eq!(manager.current_utilisation(), 0.0);
        manager.place(AgentId(0), AgentStatus::Active);
        assert!((manager.current_utilisation() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_munition_selection_prefers_range_in_stock() {
        let mut manager = Manager::new(0, "Taiwan Navy", Side::Coalition, ManagerKind::Fleet, 0.5);
        manager.munitions = vec![munition(50.0, None), munition(150.0, Some(1)), munition(90.0, Some(3))];

        assert_eq!(manager.select_munition("TW ESC", Skill::Basic, "CN PLAN"), Some(1));
        assert!(manager.consume_munition(1));
        assert_eq!(manager.select_munition("TW ESC", Skill::Basic, "CN PLAN"), Some(2));
        assert_eq!(manager.select_munition("TW ESC", Skill::Advanced, "CN PLAN"), None);
    }

    #[test]
    fn test_sample_base_by_share() {
        let mut manager = Manager::new(0, "Merchants", Side::Neutral, ManagerKind::Merchant, 0.0);
        manager.bases = vec![
            Base::new("Kaohsiung", Point::new(120.3, 22.6), 0.0),
            Base::new("Keelung", Point::new(121.7, 25.1), 1.0),
        ];
        let mut rng = SimRng::new(11);
        for _ in 0..20 {
            assert_eq!(manager.sample_base(&mut rng).map(|b| b.name.as_str()), Some("Keelung"));
        }
    }

    #[test]
    fn test_drop_requests_for_target() {
        let mut manager = Manager::new(0, "Taiwan Navy", Side::Coalition, ManagerKind::Fleet, 0.5);
        for (target, t) in [(1, 0.25), (2, 0.5), (1, 0.75)] {
            manager.push_request(Request {
                target: AgentId(target),
                requester: AgentId(7),
                action_time: t,
            });
        }
        manager.drop_requests_for(AgentId(1));
        assert_eq!(manager.requests.len(), 1);
        assert_eq!(manager.requests[0].target, AgentId(2));
    }
}
