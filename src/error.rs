//! シミュレーション中核のエラー型
//!
//! 設定エラー（初期化を中断）、不変条件違反（ステップを中断）、
//! 反復上限超過（タイムアウト）を区別します。弾切れや目標喪失のような
//! 想定内の状況はエラーではなく、各モジュールの結果列挙型で表現します。

use thiserror::Error;

use crate::models::{AgentId, MissionId};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ゾーンに属さない地点です: ({x:.4}, {y:.4})")]
    NoZone { x: f64, y: f64 },

    #[error("到達不能な地点です（可視ノードなし）: ({x:.4}, {y:.4})")]
    Unreachable { x: f64, y: f64 },

    #[error("受容体グリッド範囲外の地点です: ({x:.4}, {y:.4})")]
    OutOfGrid { x: f64, y: f64 },

    #[error("エージェント {agent} は既にミッション {mission} を保持しています")]
    MissionAlreadySet { agent: AgentId, mission: MissionId },

    #[error("エージェント {agent} はミッション {mission} に関与していません")]
    NotInMission { agent: AgentId, mission: MissionId },

    #[error("エージェント {0} は存在しません")]
    UnknownAgent(AgentId),

    #[error("ミッション {0} は存在しません")]
    UnknownMission(MissionId),

    #[error("エージェント {0} にルートが設定されていません")]
    NoRoute(AgentId),

    #[error("反復上限 {limit} を超過しました: {context} (エージェント {agent})")]
    IterationLimit {
        agent: AgentId,
        limit: usize,
        context: &'static str,
    },

    #[error("エージェント {agent} [{mission}] の処理に失敗 ({x:.4}, {y:.4}): {source}")]
    Agent {
        agent: AgentId,
        mission: String,
        x: f64,
        y: f64,
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    /// 状態破損を示すエラーかどうか
    ///
    /// 不変条件違反と反復上限超過はステップを中断させ、それ以外は
    /// エージェント単位で記録して処理を継続します。
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            SimError::MissionAlreadySet { .. }
            | SimError::NotInMission { .. }
            | SimError::UnknownAgent(_)
            | SimError::UnknownMission(_)
            | SimError::NoRoute(_)
            | SimError::IterationLimit { .. } => true,
            SimError::Agent { source, .. } => source.is_invariant_violation(),
            SimError::Config(_)
            | SimError::NoZone { .. }
            | SimError::Unreachable { .. }
            | SimError::OutOfGrid { .. } => false,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_classification() {
        let err = SimError::MissionAlreadySet {
            agent: AgentId(1),
            mission: MissionId(2),
        };
        assert!(err.is_invariant_violation());
        assert!(!SimError::Unreachable { x: 0.0, y: 0.0 }.is_invariant_violation());

        let wrapped = SimError::Agent {
            agent: AgentId(1),
            mission: "Track".to_string(),
            x: 1.0,
            y: 2.0,
            source: Box::new(SimError::IterationLimit {
                agent: AgentId(1),
                limit: 500,
                context: "move_through_route",
            }),
        };
        assert!(wrapped.is_invariant_violation());
        assert!(wrapped.to_string().contains("Track"));
    }
}
