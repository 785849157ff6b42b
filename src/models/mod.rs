// 基本的なデータ型
pub mod common;

// 探知・攻撃のインターフェース（trait）定義
pub mod traits;

// エージェントとミッション
pub mod agent;
pub mod mission;

// 探知・交戦モデル
pub mod detection;
pub mod engagement;

// マネージャと基地
pub mod base;
pub mod manager;

pub mod events;

// 便利な re-export
pub use agent::{Agent, AgentKind, AgentSnapshot, Capabilities, Capability, MerchantState, MoveOutcome};
pub use base::Base;
pub use common::*;
pub use detection::{DetectionConfig, DetectionMethod, DetectionOutcome};
pub use engagement::{
    AttackAttempt, AttackOutcome, BoardingOutcome, BoardingSettings, EngagementConfig, MunitionEntry,
    OutcomeProbabilities,
};
pub use events::{EventKind, EventLog, SimEvent};
pub use manager::{Manager, ManagerKind, Request};
pub use mission::{FollowUp, Mission, MissionArena, MissionEnd, MissionKind, MissionTarget};
pub use traits::*;
