//! Service configuration.
//!
//! Secrets/config:
//! - Docker Compose: read from /run/secrets/*
//! - Managed container platforms: read from env vars (no /run/secrets mount)

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use std::env;

/// Leagues the service generates picks for. Fixed set; the dashboard and the
/// generation job must stay in sync on this list.
pub const SUPPORTED_SPORTS: &[&str] = &[
    "basketball_nba",
    "basketball_ncaab",
    "icehockey_nhl",
    "soccer_epl",
    "soccer_spain_la_liga",
    "soccer_uefa_champs_league",
];

/// Markets fetched for daily generation.
pub const GENERATION_MARKETS: &str = "h2h,spreads,totals";

#[derive(Clone)]
pub struct Config {
    pub odds_api_key: String,
    pub database_url: String,
    /// Operator bearer token for cron triggers and destructive admin calls.
    /// Absent means those endpoints refuse with a server-configuration error.
    pub admin_token: Option<String>,
    /// Timezone the daily cycle boundary is anchored to.
    pub business_timezone: Tz,
    pub system_user_email: String,
    pub port: u16,
    /// How often the watcher checks whether the current cycle has picks.
    pub watch_interval_seconds: u64,
    /// Schedule responses are cached in-process for this long.
    pub schedule_cache_seconds: u64,
    /// If true, run one generation pass and exit (no watcher loop).
    pub run_once: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // API key
        let odds_api_key = match env::var("ODDS_API_KEY") {
            Ok(v) if !v.trim().is_empty() => v,
            Ok(_) => return Err(anyhow!("ODDS_API_KEY is set but empty")),
            Err(_) => read_secret_file("/run/secrets/odds_api_key", "odds_api_key")?,
        };

        // Prevent accidental use of sample/placeholder keys
        let key_lower = odds_api_key.trim().to_lowercase();
        if key_lower.contains("change_me")
            || key_lower.contains("your_")
            || key_lower.starts_with("sample")
        {
            return Err(anyhow!(
                "ODDS_API_KEY appears to be a placeholder value; replace with your real key"
            ));
        }

        let db_user = env::var("DB_USER").unwrap_or_else(|_| "picks".to_string());
        let db_name = env::var("DB_NAME").unwrap_or_else(|_| "picks".to_string());
        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "postgres".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());

        let database_url = match env::var("DATABASE_URL") {
            Ok(v) if !v.trim().is_empty() => v,
            Ok(_) => return Err(anyhow!("DATABASE_URL is set but empty")),
            Err(_) => {
                let db_password = read_secret_file("/run/secrets/db_password", "db_password")?;
                format!(
                    "postgresql://{}:{}@{}:{}/{}",
                    db_user, db_password, db_host, db_port, db_name
                )
            }
        };

        // Operator token is optional at startup: read paths must keep working
        // without it, destructive paths refuse until it is configured.
        let admin_token = match env::var("ADMIN_TOKEN") {
            Ok(v) if !v.trim().is_empty() => Some(v),
            _ => read_secret_file("/run/secrets/admin_token", "admin_token").ok(),
        };

        // An invalid timezone name is a fatal configuration error, not
        // something to recover from at runtime.
        let tz_name =
            env::var("BUSINESS_TIMEZONE").unwrap_or_else(|_| "America/New_York".to_string());
        let business_timezone: Tz = tz_name
            .parse()
            .map_err(|e| anyhow!("invalid BUSINESS_TIMEZONE '{}': {}", tz_name, e))?;

        Ok(Self {
            odds_api_key,
            database_url,
            admin_token,
            business_timezone,
            system_user_email: env::var("SYSTEM_USER_EMAIL")
                .unwrap_or_else(|_| "picks-engine@system.local".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8084".to_string())
                .parse()
                .unwrap_or(8084),
            watch_interval_seconds: env::var("WATCH_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            schedule_cache_seconds: env::var("SCHEDULE_CACHE_SECONDS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
            run_once: env::var("RUN_ONCE")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                == "true",
        })
    }
}

/// Read a secret from a Docker secret file - REQUIRED, NO fallbacks
fn read_secret_file(file_path: &str, secret_name: &str) -> Result<String> {
    std::fs::read_to_string(file_path)
        .map(|s| s.trim().to_string())
        .context(format!(
            "CRITICAL: Secret file not found at {} ({}). Container must have secrets mounted.",
            file_path, secret_name
        ))
}
