//! シミュレーションイベント
//!
//! 撃沈・拿捕などの離散イベントを記録し、実行終了時の統計に用います。

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use tracing::info;

use crate::geometry::Point;
use crate::models::common::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventKind {
    Detected,
    Destroyed,
    Ctl,
    AttackMissed,
    MerchantSeized,
    MerchantLiberated,
    MerchantDelivered,
    MerchantDeparted,
    BoardingFailed,
    BoardingBlocked,
    SupportRequested,
    ForcedReturn,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Detected => "Detected",
            EventKind::Destroyed => "Destroyed",
            EventKind::Ctl => "CTL",
            EventKind::AttackMissed => "Attack Missed",
            EventKind::MerchantSeized => "Merchant Seized",
            EventKind::MerchantLiberated => "Merchant Liberated",
            EventKind::MerchantDelivered => "Merchant Delivered",
            EventKind::MerchantDeparted => "Merchant Departed",
            EventKind::BoardingFailed => "Boarding Failed",
            EventKind::BoardingBlocked => "Boarding Blocked",
            EventKind::SupportRequested => "Support Requested",
            EventKind::ForcedReturn => "Forced Return",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimEvent {
    pub time: f64,
    pub kind: EventKind,
    pub actor: AgentId,
    pub target: Option<AgentId>,
    pub x: f64,
    pub y: f64,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// イベントを記録し、同時にログへ出力する
    pub fn record(
        &mut self,
        time: f64,
        kind: EventKind,
        actor: AgentId,
        target: Option<AgentId>,
        location: Point,
        detail: impl Into<String>,
    ) {
        let detail = detail.into();
        info!(
            event = %kind,
            time = time,
            actor = %actor,
            target = ?target,
            x = location.x,
            y = location.y,
            detail = %detail,
            "SIM_EVENT: イベント発生"
        );
        self.events.push(SimEvent {
            time,
            kind,
            actor,
            target,
            x: location.x,
            y: location.y,
            detail,
        });
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &SimEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// 種別ごとの件数
    pub fn counts(&self) -> BTreeMap<EventKind, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }
}
