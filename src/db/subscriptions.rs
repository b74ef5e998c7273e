//! Types for persisted sweep subscriptions.

use serde::{Deserialize, Serialize};

use crate::schedule::ScheduleCode;

/// Most distinct locations one owner may watch.
pub const MAX_SUBSCRIPTIONS_PER_OWNER: usize = 5;

/// Opaque identifier of the subscribing user or chat.
pub type OwnerId = i64;

/// Errors from subscription store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The owner already watches the maximum number of locations.
    #[error("You already have {cap} subscriptions. Use /unsubscribe to remove one first.")]
    CapExceeded { cap: usize },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode sweep days: {0}")]
    Json(#[from] serde_json::Error),
}

/// A watched point. Coordinates are rounded to 4 decimal places on
/// construction; the rounded pair is the subscription's identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: round4(x),
            y: round4(y),
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Mutable fields of a subscription, replaced wholesale on upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionFields {
    pub label: String,
    pub sweep_days: Vec<String>,
    pub sweep_schedule: ScheduleCode,
    pub sweep_time: Option<String>,
    pub street_name: Option<String>,
}

/// A subscription record.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub owner_id: OwnerId,
    pub location: Location,
    pub label: String,
    pub sweep_days: Vec<String>,
    pub sweep_schedule: ScheduleCode,
    pub sweep_time: Option<String>,
    pub street_name: Option<String>,
    pub created_at: String,
}

/// Remove repeated weekday names, keeping first-seen order.
pub fn dedup_days(days: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(days.len());
    for day in days {
        if !out.contains(day) {
            out.push(day.clone());
        }
    }
    out
}
