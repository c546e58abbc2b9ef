//! The Odds API gateway.
//!
//! Fetches upcoming events and current odds for the supported league set and
//! summarizes them into the dashboard schedule shape. All provider access
//! goes through [`OddsGateway`]; the generation job and the diagnostic probe
//! never talk to the provider directly.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Error, Result};

const BASE_URL: &str = "https://api.the-odds-api.com/v4/sports";

/// Live games from up to 2 hours ago stay relevant.
const WINDOW_START_HOURS: i64 = 2;
/// Odds lookahead: next day's games plus buffer.
const ODDS_WINDOW_END_HOURS: i64 = 30;
/// Schedule lookahead.
const SCHEDULE_WINDOW_END_HOURS: i64 = 24;

/// The Odds API event structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct GameOdds {
    pub id: String,
    pub sport_key: String,
    pub sport_title: String,
    pub commence_time: Option<DateTime<Utc>>,
    pub home_team: String,
    pub away_team: String,
    pub bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Bookmaker {
    pub key: String,
    pub title: String,
    pub last_update: Option<DateTime<Utc>>,
    pub markets: Vec<Market>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Market {
    pub key: String,
    pub last_update: Option<DateTime<Utc>>,
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Outcome {
    pub name: String,
    pub price: Option<i32>,
    pub point: Option<f64>,
}

/// Per-sport schedule summary served to the dashboard.
#[derive(Debug, Serialize, Clone)]
pub struct SportSchedule {
    pub sport: String,
    pub games_count: usize,
    pub matchups: Vec<Matchup>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Matchup {
    pub id: String,
    pub home: String,
    pub away: String,
    pub time: DateTime<Utc>,
    pub h2h: Option<Vec<Outcome>>,
    pub best_book: String,
    pub ev_score: f64,
}

/// External collaborator contract for the odds provider.
#[async_trait]
pub trait OddsGateway: Send + Sync {
    /// Fetch current odds for the given sports. `test_mode` disables the
    /// commence-time window filter (used by the diagnostic probe).
    async fn fetch_odds(
        &self,
        sports: &[&str],
        region: &str,
        markets: &str,
        test_mode: bool,
    ) -> Result<Vec<GameOdds>>;

    /// Fetch and summarize the upcoming schedule for the given sports.
    async fn fetch_schedule(&self, sports: &[&str]) -> Result<Vec<SportSchedule>>;
}

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// HTTP client for The Odds API with provider-side rate limiting.
pub struct OddsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    rate_limiter: DirectRateLimiter,
}

impl OddsClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, BASE_URL.to_string())
    }

    fn with_base_url(api_key: String, base_url: String) -> anyhow::Result<Self> {
        // Rate limiter: 30 requests per minute, well under the provider cap
        let rate_limiter = RateLimiter::direct(Quota::per_minute(
            NonZeroU32::new(30).expect("nonzero quota"),
        ));

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            rate_limiter,
        })
    }

    /// Fetch odds for a single sport.
    async fn fetch_sport(&self, sport: &str, region: &str, markets: &str) -> Result<Vec<GameOdds>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}/odds", self.base_url, sport);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", region),
                ("markets", markets),
                ("oddsFormat", "american"),
            ])
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("request for {} failed: {}", sport, e)))?;

        // Log API usage from headers
        if let Some(remaining) = response.headers().get("x-requests-remaining") {
            info!(
                "API requests remaining: {}",
                remaining.to_str().unwrap_or("?")
            );
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Gateway(format!("failed to read body for {}: {}", sport, e)))?;

        if !status.is_success() {
            return Err(Error::Gateway(format!(
                "odds API error for {} (status {}): {}",
                sport, status, body
            )));
        }

        let events: Vec<GameOdds> = serde_json::from_str(&body)
            .map_err(|e| Error::Gateway(format!("failed to parse events for {}: {}", sport, e)))?;

        Ok(events)
    }
}

#[async_trait]
impl OddsGateway for OddsClient {
    async fn fetch_odds(
        &self,
        sports: &[&str],
        region: &str,
        markets: &str,
        test_mode: bool,
    ) -> Result<Vec<GameOdds>> {
        let now = Utc::now();
        let mut all_games = Vec::new();
        let mut last_err: Option<Error> = None;
        let mut any_ok = false;

        for sport in sports {
            match self.fetch_sport(sport, region, markets).await {
                Ok(events) => {
                    any_ok = true;
                    let kept: Vec<GameOdds> = events
                        .into_iter()
                        .filter(|g| {
                            test_mode
                                || in_window(g.commence_time, now, ODDS_WINDOW_END_HOURS)
                        })
                        .collect();
                    info!("Fetched {} relevant events for {}", kept.len(), sport);
                    all_games.extend(kept);
                }
                Err(e) => {
                    warn!("Odds fetch failed for {}: {}", sport, e);
                    last_err = Some(e);
                }
            }
        }

        // A single sport failing is tolerable (off-season, unsupported
        // market); every sport failing means the provider is down.
        if !any_ok {
            if let Some(e) = last_err {
                return Err(e);
            }
        }

        Ok(all_games)
    }

    async fn fetch_schedule(&self, sports: &[&str]) -> Result<Vec<SportSchedule>> {
        let now = Utc::now();
        let mut results = Vec::with_capacity(sports.len());
        let mut last_err: Option<Error> = None;
        let mut any_ok = false;

        for sport in sports {
            match self.fetch_sport(sport, "us", "h2h").await {
                Ok(events) => {
                    any_ok = true;
                    results.push(summarize_schedule(sport, events, now));
                }
                Err(e) => {
                    // Degrade to an empty section rather than failing the
                    // whole schedule for one league.
                    warn!("Schedule fetch failed for {}: {}", sport, e);
                    last_err = Some(e);
                    results.push(SportSchedule {
                        sport: sport.to_string(),
                        games_count: 0,
                        matchups: Vec::new(),
                    });
                }
            }
        }

        // Every league failing means the provider is down; an all-empty
        // schedule must not be served (or cached) as a valid answer.
        if !any_ok {
            if let Some(e) = last_err {
                return Err(e);
            }
        }

        Ok(results)
    }
}

fn in_window(commence: Option<DateTime<Utc>>, now: DateTime<Utc>, end_hours: i64) -> bool {
    match commence {
        Some(t) => {
            t >= now - Duration::hours(WINDOW_START_HOURS)
                && t <= now + Duration::hours(end_hours)
        }
        None => false,
    }
}

/// Build the per-sport schedule summary: upcoming matchups with the first
/// head-to-head market, the best-priced book for the home side, and a rough
/// expected-value score.
pub fn summarize_schedule(
    sport: &str,
    events: Vec<GameOdds>,
    now: DateTime<Utc>,
) -> SportSchedule {
    let mut matchups: Vec<Matchup> = events
        .into_iter()
        .filter(|g| in_window(g.commence_time, now, SCHEDULE_WINDOW_END_HOURS))
        .filter_map(|game| {
            let time = game.commence_time?;

            let h2h_markets: Vec<(&Market, &str)> = game
                .bookmakers
                .iter()
                .flat_map(|b| {
                    b.markets
                        .iter()
                        .filter(|m| m.key == "h2h")
                        .map(move |m| (m, b.title.as_str()))
                })
                .collect();

            let h2h = h2h_markets.first().map(|(m, _)| m.outcomes.clone());

            let home_outcomes: Vec<(i32, &str)> = h2h_markets
                .iter()
                .flat_map(|(m, book)| {
                    m.outcomes
                        .iter()
                        .filter(|o| o.name == game.home_team)
                        .filter_map(move |o| o.price.map(|p| (p, *book)))
                })
                .collect();

            let (best_book, ev_score) = score_home_outcomes(&home_outcomes);

            Some(Matchup {
                id: game.id,
                home: game.home_team,
                away: game.away_team,
                time,
                h2h,
                best_book,
                ev_score,
            })
        })
        .collect();

    matchups.sort_by_key(|m| m.time);

    SportSchedule {
        sport: sport.to_string(),
        games_count: matchups.len(),
        matchups,
    }
}

fn score_home_outcomes(outcomes: &[(i32, &str)]) -> (String, f64) {
    match outcomes {
        [] => ("SmartBooks".to_string(), 0.0),
        [(_, book)] => (book.to_string(), 52.4),
        many => {
            let prices: Vec<i32> = many.iter().map(|(p, _)| *p).collect();
            let max_price = *prices.iter().max().unwrap_or(&0);
            let avg_price: f64 = prices.iter().sum::<i32>() as f64 / prices.len() as f64;

            let best_book = many
                .iter()
                .find(|(p, _)| *p == max_price)
                .map(|(_, b)| b.to_string())
                .unwrap_or_else(|| "SmartBooks".to_string());

            let diff = max_price as f64 - avg_price;
            let score = if diff > 2.0 {
                75.0 + diff * 1.5
            } else if diff > 0.0 {
                60.0 + diff * 5.0
            } else {
                // Deterministic but "low edge" score based on avg price
                43.0 + (avg_price.abs() as i64 % 7) as f64
            };

            (best_book, round1(score.min(98.9)))
        }
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// In-process TTL cache for the schedule response.
#[derive(Clone)]
pub struct ScheduleCache {
    inner: Arc<RwLock<Option<(Instant, Vec<SportSchedule>)>>>,
    ttl: std::time::Duration,
}

impl ScheduleCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            ttl,
        }
    }

    pub async fn get(&self) -> Option<Vec<SportSchedule>> {
        let guard = self.inner.read().await;
        match guard.as_ref() {
            Some((at, cached)) if at.elapsed() < self.ttl => Some(cached.clone()),
            _ => None,
        }
    }

    pub async fn set(&self, value: Vec<SportSchedule>) {
        let mut guard = self.inner.write().await;
        *guard = Some((Instant::now(), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn h2h_market(outcomes: Vec<(&str, i32)>) -> Market {
        Market {
            key: "h2h".to_string(),
            last_update: None,
            outcomes: outcomes
                .into_iter()
                .map(|(name, price)| Outcome {
                    name: name.to_string(),
                    price: Some(price),
                    point: None,
                })
                .collect(),
        }
    }

    fn game(id: &str, home: &str, away: &str, hours_out: i64, books: Vec<(&str, Market)>) -> GameOdds {
        GameOdds {
            id: id.to_string(),
            sport_key: "basketball_nba".to_string(),
            sport_title: "NBA".to_string(),
            commence_time: Some(Utc::now() + Duration::hours(hours_out)),
            home_team: home.to_string(),
            away_team: away.to_string(),
            bookmakers: books
                .into_iter()
                .map(|(title, market)| Bookmaker {
                    key: title.to_lowercase(),
                    title: title.to_string(),
                    last_update: None,
                    markets: vec![market],
                })
                .collect(),
        }
    }

    #[test]
    fn parses_provider_event_payload() {
        let body = r#"[{
            "id": "abc123",
            "sport_key": "basketball_nba",
            "sport_title": "NBA",
            "commence_time": "2025-01-15T23:00:00Z",
            "home_team": "Boston Celtics",
            "away_team": "Miami Heat",
            "bookmakers": [{
                "key": "draftkings",
                "title": "DraftKings",
                "markets": [{
                    "key": "h2h",
                    "outcomes": [
                        {"name": "Boston Celtics", "price": -220},
                        {"name": "Miami Heat", "price": 180}
                    ]
                }]
            }]
        }]"#;

        let events: Vec<GameOdds> = serde_json::from_str(body).unwrap();
        assert_eq!(events.len(), 1);
        let game = &events[0];
        assert_eq!(game.home_team, "Boston Celtics");
        assert_eq!(
            game.commence_time,
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 23, 0, 0).unwrap())
        );
        assert_eq!(game.bookmakers[0].markets[0].outcomes[0].price, Some(-220));
    }

    #[test]
    fn parses_event_with_missing_fields() {
        // The provider omits fields freely; everything is defaulted.
        let events: Vec<GameOdds> = serde_json::from_str(r#"[{"id": "x"}]"#).unwrap();
        assert_eq!(events[0].id, "x");
        assert!(events[0].commence_time.is_none());
        assert!(events[0].bookmakers.is_empty());
    }

    #[test]
    fn schedule_filters_out_of_window_games() {
        let games = vec![
            game("soon", "A", "B", 3, vec![]),
            game("past", "C", "D", -8, vec![]),
            game("far", "E", "F", 60, vec![]),
        ];
        let sched = summarize_schedule("basketball_nba", games, Utc::now());
        assert_eq!(sched.games_count, 1);
        assert_eq!(sched.matchups[0].id, "soon");
    }

    #[test]
    fn schedule_picks_best_book_for_home_side() {
        let games = vec![game(
            "g1",
            "Home",
            "Away",
            3,
            vec![
                ("BookLow", h2h_market(vec![("Home", -150), ("Away", 130)])),
                ("BookHigh", h2h_market(vec![("Home", -140), ("Away", 120)])),
            ],
        )];
        let sched = summarize_schedule("basketball_nba", games, Utc::now());
        let m = &sched.matchups[0];
        assert_eq!(m.best_book, "BookHigh");
        // max=-140, avg=-145, diff=5 -> 75 + 7.5
        assert_eq!(m.ev_score, 82.5);
        assert_eq!(m.h2h.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn schedule_single_book_gets_flat_score() {
        let games = vec![game(
            "g1",
            "Home",
            "Away",
            3,
            vec![("OnlyBook", h2h_market(vec![("Home", -150), ("Away", 130)]))],
        )];
        let sched = summarize_schedule("basketball_nba", games, Utc::now());
        assert_eq!(sched.matchups[0].best_book, "OnlyBook");
        assert_eq!(sched.matchups[0].ev_score, 52.4);
    }

    #[test]
    fn schedule_sorted_by_start_time() {
        let games = vec![
            game("late", "A", "B", 10, vec![]),
            game("early", "C", "D", 2, vec![]),
        ];
        let sched = summarize_schedule("basketball_nba", games, Utc::now());
        assert_eq!(sched.matchups[0].id, "early");
        assert_eq!(sched.matchups[1].id, "late");
    }

    #[tokio::test]
    async fn schedule_errors_when_every_sport_fetch_fails() {
        // Nothing listens on port 1; every per-sport request is refused, so
        // the all-empty schedule must surface as a gateway error instead of
        // a cacheable empty result.
        let client = OddsClient::with_base_url(
            "test-key".to_string(),
            "http://127.0.0.1:1/v4/sports".to_string(),
        )
        .unwrap();

        let err = client
            .fetch_schedule(&["basketball_nba", "icehockey_nhl"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Gateway(_)));
    }

    #[tokio::test]
    async fn schedule_cache_expires() {
        let cache = ScheduleCache::new(std::time::Duration::from_millis(20));
        assert!(cache.get().await.is_none());

        cache
            .set(vec![SportSchedule {
                sport: "basketball_nba".to_string(),
                games_count: 0,
                matchups: Vec::new(),
            }])
            .await;
        assert!(cache.get().await.is_some());

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(cache.get().await.is_none());
    }
}
