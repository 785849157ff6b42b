//! # straitsim
//!
//! 海峡周辺の海空域を対象とした離散時間ウォーゲーム・シミュレーション。
//!
//! 複数のマネージャ（国・軍種ごとの艦隊）がエージェント（艦艇・航空機・潜水艦・商船）を
//! 運用し、哨戒・探知・追尾・攻撃・帰投を、ゾーンとエスカレーションレベルに基づく
//! 交戦規定のもとでターン単位に実行します。

pub mod error;
pub mod geometry;
pub mod logging;
pub mod models;
pub mod random;
pub mod receptors;
pub mod routing;
pub mod scenario;
pub mod simulation;
pub mod weather;
pub mod zones;
