use serde::{Deserialize, Serialize};

/// エージェントの識別子（ワールド内のエージェント配列の添字）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub usize);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "A{:04}", self.0)
    }
}

/// ミッションの識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MissionId(pub u64);

impl std::fmt::Display for MissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// ワールドが所有する単調増加のID発行器
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    next_agent: usize,
    next_mission: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_agent(&mut self) -> AgentId {
        let id = AgentId(self.next_agent);
        self.next_agent += 1;
        id
    }

    pub fn next_mission(&mut self) -> MissionId {
        self.next_mission += 1;
        MissionId(self.next_mission)
    }

    pub fn agents_issued(&self) -> usize {
        self.next_agent
    }
}

/// 陣営
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Coalition,
    Hunter,
    Neutral,
}

impl Side {
    /// 互いに敵対する陣営か（中立は連合側からは敵対扱いしない）
    pub fn is_hostile_to(self, other: Side) -> bool {
        matches!(
            (self, other),
            (Side::Coalition, Side::Hunter) | (Side::Hunter, Side::Coalition) | (Side::Hunter, Side::Neutral)
        )
    }

    /// 商船を保護する陣営
    pub fn protector_of(self) -> Option<Side> {
        match self {
            Side::Neutral => Some(Side::Coalition),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Side::Coalition => "coalition",
            Side::Hunter => "hunter",
            Side::Neutral => "neutral",
        };
        write!(f, "{}", name)
    }
}

/// 探知・攻撃の対象区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Surface,
    Air,
    Subsurface,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Surface, Domain::Air, Domain::Subsurface];
}

/// 被探知性の大きさ区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Stealthy,
    #[serde(rename = "vsmall")]
    VerySmall,
    Small,
    #[default]
    Medium,
    Large,
}

/// 探知・攻撃の技能水準
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Basic,
    Advanced,
}

/// エージェントの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    /// 基地で待機・整備中
    Inactive,
    /// 展開中
    Active,
    /// 予備（エスカレーション変更まで展開しない）
    Reserved,
    /// 撃沈・撃墜
    Destroyed,
    /// ワールドから離脱（商船の出域・引き渡し）
    Removed,
}

/// 乗り込みに対する商船の対応方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
    Comply,
    Evade,
    Resist,
}
