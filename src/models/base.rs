use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// 基地（整備・補給を行う港湾・飛行場）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Base {
    pub name: String,
    pub location: Point,
    /// 配備・入港の割り当て比率
    #[serde(default = "default_share")]
    pub share: f64,
}

fn default_share() -> f64 {
    1.0
}

impl Base {
    pub fn new(name: impl Into<String>, location: Point, share: f64) -> Self {
        Self {
            name: name.into(),
            location,
            share,
        }
    }
}
