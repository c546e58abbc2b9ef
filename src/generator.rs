//! Daily generation job.
//!
//! Produces exactly one set of daily parlays per cycle, idempotently:
//! delete-then-create per cycle, with the store's uniqueness guard covering
//! the race where two runs both see an empty cycle. A gateway failure aborts
//! the run after cleanup, leaving the cycle visibly empty for an operator to
//! re-trigger; a per-slot analyst failure is recorded and skipped.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analyst::{ParlayAnalyst, DAILY_LEGS, DAILY_SLOTS};
use crate::config::{GENERATION_MARKETS, SUPPORTED_SPORTS};
use crate::cycle;
use crate::error::{Error, Result};
use crate::model::{NewLeg, NewParlay};
use crate::odds::OddsGateway;
use crate::store::{users, PicksStore};

/// Outcome of one slot in a generation run.
#[derive(Debug, Serialize)]
pub struct SlotOutcome {
    pub slot: String,
    pub success: bool,
    /// True when another run already generated this slot (benign).
    pub skipped: bool,
    pub parlay_id: Option<Uuid>,
    pub confidence: Option<i32>,
    pub error: Option<String>,
}

/// Structured result of a generation run.
#[derive(Debug, Serialize)]
pub struct CycleReport {
    pub cycle_date: DateTime<Utc>,
    pub deleted_existing: u64,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<SlotOutcome>,
}

/// Shared generation health, read by the liveness endpoint.
#[derive(Clone)]
pub struct JobState {
    pub last_run_time: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub last_generated: Arc<RwLock<usize>>,
    pub error_count: Arc<RwLock<usize>>,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            last_run_time: Arc::new(RwLock::new(None)),
            last_generated: Arc::new(RwLock::new(0)),
            error_count: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn record_success(&self, generated: usize) {
        *self.last_run_time.write().await = Some(Utc::now());
        *self.last_generated.write().await = generated;
        *self.error_count.write().await = 0;
    }

    pub async fn record_error(&self) {
        *self.error_count.write().await += 1;
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Generator {
    pool: PgPool,
    picks: PicksStore,
    odds: Arc<dyn OddsGateway>,
    analyst: Arc<dyn ParlayAnalyst>,
    tz: Tz,
    system_user_email: String,
}

impl Generator {
    pub fn new(
        pool: PgPool,
        odds: Arc<dyn OddsGateway>,
        analyst: Arc<dyn ParlayAnalyst>,
        tz: Tz,
        system_user_email: String,
    ) -> Self {
        Self {
            picks: PicksStore::new(pool.clone()),
            pool,
            odds,
            analyst,
            tz,
            system_user_email,
        }
    }

    /// Generate the picks for the cycle containing `now`, replacing any
    /// partial earlier output for that cycle. Safe to re-run.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let cycle_date = cycle::resolve(now, self.tz);
        info!("Generating daily picks for cycle {}", cycle_date);

        let system_user =
            users::get_or_create_system_user(&self.pool, &self.system_user_email).await?;

        // Defensive cleanup of partial prior runs for this cycle.
        let deleted_existing = self.picks.delete_for_cycle(cycle_date).await?;
        if deleted_existing > 0 {
            info!(
                "Deleted {} existing picks for cycle {}",
                deleted_existing, cycle_date
            );
        }

        // One bulk fetch for every slot; per-slot fetches would burn through
        // the provider quota and trip 429s.
        let odds = self
            .odds
            .fetch_odds(SUPPORTED_SPORTS, "us", GENERATION_MARKETS, false)
            .await?;

        if odds.is_empty() {
            return Err(Error::Gateway(
                "no odds data available for any supported sport".to_string(),
            ));
        }
        info!("Fetched odds for {} games", odds.len());

        let mut results = Vec::with_capacity(DAILY_SLOTS.len());
        for slot in DAILY_SLOTS {
            match self.analyst.build_parlay(&odds, slot, DAILY_LEGS).await {
                Ok(candidate) => {
                    let new_parlay = NewParlay {
                        parlay_type: slot.slot.to_string(),
                        total_odds: Some(candidate.total_odds),
                        is_daily: true,
                        risk_level: slot.risk,
                        ai_confidence: candidate.confidence,
                        legs: candidate
                            .legs
                            .into_iter()
                            .map(|l| NewLeg {
                                sport: l.sport,
                                team: l.team,
                                opponent: l.opponent,
                                bet_type: l.bet_type,
                                odds: l.odds,
                                line: l.line,
                                player: l.player,
                                ai_reasoning: l.reasoning,
                            })
                            .collect(),
                    };

                    match self
                        .picks
                        .create(cycle_date, slot.slot, system_user.id, &new_parlay)
                        .await
                    {
                        Ok(pick) => {
                            info!(
                                "Generated {} parlay for {} (parlay {})",
                                slot.slot, cycle_date, pick.parlay_id
                            );
                            results.push(SlotOutcome {
                                slot: slot.slot.to_string(),
                                success: true,
                                skipped: false,
                                parlay_id: Some(pick.parlay_id),
                                confidence: Some(new_parlay.ai_confidence),
                                error: None,
                            });
                        }
                        Err(Error::DuplicateCycle) => {
                            // A concurrent run already generated this slot.
                            info!("Slot {} for {} already generated", slot.slot, cycle_date);
                            results.push(SlotOutcome {
                                slot: slot.slot.to_string(),
                                success: false,
                                skipped: true,
                                parlay_id: None,
                                confidence: None,
                                error: None,
                            });
                        }
                        Err(e) => {
                            error!("Failed to persist {} parlay: {}", slot.slot, e);
                            results.push(SlotOutcome {
                                slot: slot.slot.to_string(),
                                success: false,
                                skipped: false,
                                parlay_id: None,
                                confidence: None,
                                error: Some(e.to_string()),
                            });
                        }
                    }
                }
                Err(e) => {
                    warn!("Analysis failed for slot {}: {}", slot.slot, e);
                    results.push(SlotOutcome {
                        slot: slot.slot.to_string(),
                        success: false,
                        skipped: false,
                        parlay_id: None,
                        confidence: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let generated = results.iter().filter(|r| r.success).count();
        let skipped = results.iter().filter(|r| r.skipped).count();
        let failed = results.len() - generated - skipped;
        info!(
            "Cycle {} generation complete: {} succeeded, {} skipped, {} failed",
            cycle_date, generated, skipped, failed
        );

        Ok(CycleReport {
            cycle_date,
            deleted_existing,
            generated,
            skipped,
            failed,
            results,
        })
    }

    /// Generate only if the cycle containing `now` has no picks yet.
    /// Returns `None` when the cycle is already populated.
    pub async fn ensure_cycle(&self, now: DateTime<Utc>) -> Result<Option<CycleReport>> {
        let cycle_date = cycle::resolve(now, self.tz);
        let existing = self.picks.find_for_cycle(cycle_date).await?;
        if !existing.is_empty() {
            return Ok(None);
        }
        self.run_cycle(now).await.map(Some)
    }

    /// Periodic watcher: checks the current cycle and generates when empty.
    pub async fn watch(self: Arc<Self>, state: JobState, interval: Duration) {
        info!(
            "Starting daily cycle watcher (interval: {}s)",
            interval.as_secs()
        );

        loop {
            match self.ensure_cycle(Utc::now()).await {
                Ok(Some(report)) => state.record_success(report.generated).await,
                Ok(None) => state.record_success(0).await,
                Err(e) => {
                    state.record_error().await;
                    error!("Cycle generation failed: {:?}", e);
                }
            }

            tokio::time::sleep(interval).await;
        }
    }
}
