//! Domain rows and read/write shapes.
//!
//! Leg market data (team, bet type, odds, line) is carried opaquely by the
//! core; only the stores and the analyst interpret it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub subscription_tier: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Parlay {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Classification tag: `safe` / `balanced` / `risky` for daily slots,
    /// `custom` for user-built parlays.
    pub parlay_type: String,
    pub total_odds: Option<i32>,
    pub is_daily: bool,
    pub risk_level: i32,
    /// 0-100.
    pub ai_confidence: i32,
    pub num_legs: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ParlayLeg {
    pub id: Uuid,
    pub parlay_id: Uuid,
    /// Insertion order, preserved for display.
    pub leg_index: i32,
    pub sport: String,
    pub team: String,
    pub opponent: Option<String>,
    pub bet_type: String,
    pub odds: i32,
    pub line: Option<f64>,
    pub player: Option<String>,
    pub ai_reasoning: Option<String>,
    pub result: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyPick {
    pub id: Uuid,
    pub parlay_id: Uuid,
    /// Cycle boundary instant, the equality key for a cycle.
    pub post_date: DateTime<Utc>,
    /// Daily slot this pick fills (`safe` / `balanced` / `risky`).
    pub slot: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BetHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub parlay_id: Uuid,
    pub stake: Option<f64>,
    pub sportsbook: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Parlay with its ordered legs, as returned by read paths.
#[derive(Debug, Clone, Serialize)]
pub struct ParlayDetail {
    #[serde(flatten)]
    pub parlay: Parlay,
    pub legs: Vec<ParlayLeg>,
}

/// A daily pick joined with its parlay, as served to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DailyPickDetail {
    pub pick: DailyPick,
    #[serde(flatten)]
    pub parlay: ParlayDetail,
    /// Set when serving the previous cycle because the current one is empty.
    pub is_yesterday: bool,
}

/// A bet history row joined with its parlay snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BetHistoryDetail {
    #[serde(flatten)]
    pub bet: BetHistory,
    pub parlay: ParlayDetail,
}

/// Write shape for a parlay and its legs, persisted atomically.
#[derive(Debug, Clone)]
pub struct NewParlay {
    pub parlay_type: String,
    pub total_odds: Option<i32>,
    pub is_daily: bool,
    pub risk_level: i32,
    pub ai_confidence: i32,
    pub legs: Vec<NewLeg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLeg {
    pub sport: String,
    pub team: String,
    pub opponent: Option<String>,
    pub bet_type: String,
    pub odds: i32,
    pub line: Option<f64>,
    pub player: Option<String>,
    pub ai_reasoning: Option<String>,
}

/// Request body for recording a user bet.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBet {
    pub stake: Option<f64>,
    pub sportsbook: Option<String>,
    pub total_odds: Option<i32>,
    #[serde(default = "default_risk_level")]
    pub risk_level: i32,
    #[serde(default = "default_confidence")]
    pub confidence: i32,
    pub legs: Vec<NewLeg>,
}

fn default_risk_level() -> i32 {
    5
}

fn default_confidence() -> i32 {
    50
}
