//! Bet history store.
//!
//! Every read is scoped to a server-validated user id supplied by the
//! caller; this store never queries across users.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{is_unique_violation, load_parlay_details};
use crate::error::{Error, Result};
use crate::model::{BetHistory, BetHistoryDetail, NewBet};

#[derive(Clone)]
pub struct BetHistoryStore {
    pool: PgPool,
}

impl BetHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The user's bets with nested parlay snapshots, newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<BetHistoryDetail>> {
        let bets: Vec<BetHistory> = sqlx::query_as(
            "SELECT * FROM bet_history WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = bets.iter().map(|b| b.parlay_id).collect();
        let parlays = load_parlay_details(&self.pool, &ids).await?;

        Ok(bets
            .into_iter()
            .filter_map(|bet| {
                // Cloned rather than moved: two bets may share a snapshot.
                let parlay = parlays.get(&bet.parlay_id).cloned()?;
                Some(BetHistoryDetail { bet, parlay })
            })
            .collect())
    }

    /// Record a bet: sync the user row, snapshot the parlay and legs, then
    /// the history row, all in one transaction.
    pub async fn record_bet(
        &self,
        user_id: Uuid,
        email: &str,
        bet: &NewBet,
    ) -> Result<BetHistory> {
        let mut tx = self.pool.begin().await?;

        // Ensure the authenticated identity exists locally; the auth layer
        // owns the email, so a changed email follows the id.
        let synced = sqlx::query(
            r#"
            INSERT INTO users (id, email, subscription_tier)
            VALUES ($1, $2, 'free')
            ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email
            "#,
        )
        .bind(user_id)
        .bind(email)
        .execute(&mut *tx)
        .await;

        match synced {
            Ok(_) => {}
            // The email unique index fires when a different id already owns
            // this email: a stale pairing from the auth layer.
            Err(e) if is_unique_violation(&e) => return Err(Error::IdentityConflict),
            Err(e) => return Err(e.into()),
        }

        let parlay_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO parlays (id, user_id, parlay_type, total_odds, is_daily,
                                 risk_level, ai_confidence, num_legs)
            VALUES ($1, $2, 'custom', $3, FALSE, $4, $5, $6)
            "#,
        )
        .bind(parlay_id)
        .bind(user_id)
        .bind(bet.total_odds)
        .bind(bet.risk_level)
        .bind(bet.confidence.clamp(0, 100))
        .bind(bet.legs.len() as i32)
        .execute(&mut *tx)
        .await?;

        for (i, leg) in bet.legs.iter().enumerate() {
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

        let record: BetHistory = sqlx::query_as(
            r#"
            INSERT INTO bet_history (id, user_id, parlay_id, stake, sportsbook)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(parlay_id)
        .bind(bet.stake)
        .bind(&bet.sportsbook)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Recorded bet {} for user {}", record.id, user_id);
        Ok(record)
    }

    /// Administrative wipe of all bet history, cascading to the parlay
    /// snapshots the history rows reference. Returns history rows removed.
    pub async fn delete_all(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT parlay_id FROM bet_history")
            .fetch_all(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM bet_history")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM parlay_legs WHERE parlay_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM parlays WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Wiped {} bet history entries", deleted);
        Ok(deleted)
    }
}
