//! Persistence layer.
//!
//! Cascading deletes are a store contract here, not a property of the
//! schema: every destructive operation removes legs, picks, and parlays in
//! dependency order inside one transaction, so no orphan rows survive even
//! though the foreign keys are plain RESTRICT.

pub mod history;
pub mod picks;
pub mod users;

pub use history::BetHistoryStore;
pub use picks::PicksStore;

use anyhow::{anyhow, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::{Parlay, ParlayDetail, ParlayLeg};

pub async fn connect_with_retry(url: &str, max_retries: u32) -> Result<PgPool> {
    let mut attempt = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
        {
            Ok(pool) => {
                info!("Connected to PostgreSQL");
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;
                if attempt >= max_retries {
                    return Err(anyhow!(
                        "Failed to connect to database after {} attempts: {}",
                        max_retries,
                        e
                    ));
                }
                warn!(
                    "Database connection attempt {} failed: {}. Retrying...",
                    attempt, e
                );
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }
        }
    }
}

/// Postgres unique-violation (SQLSTATE 23505).
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Load parlays with their ordered legs, keyed by parlay id.
pub(crate) async fn load_parlay_details(
    pool: &PgPool,
    ids: &[Uuid],
) -> crate::error::Result<HashMap<Uuid, ParlayDetail>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let parlays: Vec<Parlay> = sqlx::query_as("SELECT * FROM parlays WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;

    let legs: Vec<ParlayLeg> = sqlx::query_as(
        "SELECT * FROM parlay_legs WHERE parlay_id = ANY($1) ORDER BY leg_index ASC",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    let mut leg_map: HashMap<Uuid, Vec<ParlayLeg>> = HashMap::new();
    for leg in legs {
        leg_map.entry(leg.parlay_id).or_default().push(leg);
    }

    Ok(parlays
        .into_iter()
        .map(|p| {
            let legs = leg_map.remove(&p.id).unwrap_or_default();
            (p.id, ParlayDetail { parlay: p, legs })
        })
        .collect())
}
