//! Daily picks store.
//!
//! Owns DailyPick/Parlay/ParlayLeg rows created for daily cycles. `create`
//! is the authoritative duplicate-cycle guard: the unique index on
//! `(post_date, slot)` turns a lost race into [`Error::DuplicateCycle`],
//! which the generation job treats as a benign no-op.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{is_unique_violation, load_parlay_details};
use crate::error::{Error, Result};
use crate::model::{DailyPick, DailyPickDetail, NewParlay};

#[derive(Clone)]
pub struct PicksStore {
    pool: PgPool,
}

impl PicksStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All picks for a cycle with nested parlays and legs, ordered by risk.
    pub async fn find_for_cycle(&self, date: DateTime<Utc>) -> Result<Vec<DailyPickDetail>> {
        let picks: Vec<DailyPick> = sqlx::query_as(
            r#"
            SELECT dp.*
            FROM daily_picks dp
            JOIN parlays p ON p.id = dp.parlay_id
            WHERE dp.post_date = $1
            ORDER BY p.risk_level ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = picks.iter().map(|p| p.parlay_id).collect();
        let mut parlays = load_parlay_details(&self.pool, &ids).await?;

        Ok(picks
            .into_iter()
            .filter_map(|pick| {
                let parlay = parlays.remove(&pick.parlay_id)?;
                Some(DailyPickDetail {
                    pick,
                    parlay,
                    is_yesterday: false,
                })
            })
            .collect())
    }

    /// Persist a candidate parlay and its pick for a cycle slot atomically.
    ///
    /// The caller (the generation job) owns delete-then-create idempotency;
    /// this only maps the uniqueness violation to `DuplicateCycle`.
    pub async fn create(
        &self,
        date: DateTime<Utc>,
        slot: &str,
        owner: Uuid,
        parlay: &NewParlay,
    ) -> Result<DailyPick> {
        let mut tx = self.pool.begin().await?;

        let parlay_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO parlays (id, user_id, parlay_type, total_odds, is_daily,
                                 risk_level, ai_confidence, num_legs)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(parlay_id)
        .bind(owner)
        .bind(&parlay.parlay_type)
        .bind(parlay.total_odds)
        .bind(parlay.is_daily)
        .bind(parlay.risk_level)
        .bind(parlay.ai_confidence)
        .bind(parlay.legs.len() as i32)
        .execute(&mut *tx)
        .await?;

        for (i, leg) in parlay.legs.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO parlay_legs (id, parlay_id, leg_index, sport, team, opponent,
                                         bet_type, odds, line, player, ai_reasoning)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(parlay_id)
            .bind(i as i32)
            .bind(&leg.sport)
            .bind(&leg.team)
            .bind(&leg.opponent)
            .bind(&leg.bet_type)
            .bind(leg.odds)
            .bind(leg.line)
            .bind(&leg.player)
            .bind(&leg.ai_reasoning)
            .execute(&mut *tx)
            .await?;
        }

        let pick = match sqlx::query_as::<_, DailyPick>(
            r#"
            INSERT INTO daily_picks (id, parlay_id, post_date, slot)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(parlay_id)
        .bind(date)
        .bind(slot)
        .fetch_one(&mut *tx)
        .await
        {
            Ok(pick) => pick,
            Err(e) if is_unique_violation(&e) => return Err(Error::DuplicateCycle),
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(pick)
    }

    /// Delete the picks for one cycle, cascading to parlays and legs.
    /// Returns the number of picks removed.
    pub async fn delete_for_cycle(&self, date: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT parlay_id FROM daily_picks WHERE post_date = $1")
                .bind(date)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM parlay_legs WHERE parlay_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM daily_picks WHERE post_date = $1")
            .bind(date)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM parlays WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted)
    }

    /// Delete picks posted at or after `since`, cascading. Returns the
    /// number of picks removed.
    pub async fn delete_recent(&self, since: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT parlay_id FROM daily_picks WHERE post_date >= $1")
                .bind(since)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM parlay_legs WHERE parlay_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM daily_picks WHERE post_date >= $1")
            .bind(since)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM parlays WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Deleted {} daily picks since {}", deleted, since);
        Ok(deleted)
    }

    /// Unscoped wipe of all daily picks and daily parlays, including daily
    /// parlays no pick references anymore. Returns picks removed.
    pub async fn delete_all(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM parlays WHERE is_daily = TRUE")
            .fetch_all(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM parlay_legs WHERE parlay_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM daily_picks")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM parlays WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Wiped {} daily picks and {} daily parlays", deleted, ids.len());
        Ok(deleted)
    }

    /// Most recently created picks, for operator inspection.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<DailyPick>> {
        let picks = sqlx::query_as(
            "SELECT * FROM daily_picks ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(picks)
    }
}
