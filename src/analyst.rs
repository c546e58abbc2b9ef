//! Parlay analysis collaborator.
//!
//! [`ParlayAnalyst`] is the seam for whatever model produces candidate
//! parlays from the day's odds. The shipped [`OddsHeuristicAnalyst`] builds
//! moneyline parlays from risk-banded head-to-head prices; a model-backed
//! implementation plugs in behind the same trait.

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::error::{Error, Result};
use crate::odds::GameOdds;

/// Legs per daily parlay.
pub const DAILY_LEGS: usize = 3;

/// Configuration for one daily slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotConfig {
    pub slot: &'static str,
    pub risk: i32,
    pub description: &'static str,
}

/// The three parlays generated every cycle, ordered by risk.
pub const DAILY_SLOTS: &[SlotConfig] = &[
    SlotConfig {
        slot: "safe",
        risk: 2,
        description: "Heavy favorites - high probability outcomes",
    },
    SlotConfig {
        slot: "balanced",
        risk: 5,
        description: "Mix of safe anchors and moderate market challenges",
    },
    SlotConfig {
        slot: "risky",
        risk: 8,
        description: "Underdogs and high-reward outcomes",
    },
];

#[derive(Debug, Clone)]
pub struct CandidateLeg {
    pub sport: String,
    pub team: String,
    pub opponent: Option<String>,
    pub bet_type: String,
    pub odds: i32,
    pub line: Option<f64>,
    pub player: Option<String>,
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CandidateParlay {
    /// 0-100.
    pub confidence: i32,
    pub total_odds: i32,
    pub legs: Vec<CandidateLeg>,
}

#[async_trait]
pub trait ParlayAnalyst: Send + Sync {
    /// Produce one candidate parlay for the slot from the day's odds.
    async fn build_parlay(
        &self,
        odds: &[GameOdds],
        slot: &SlotConfig,
        num_legs: usize,
    ) -> Result<CandidateParlay>;
}

/// Deterministic analyst over head-to-head prices: filters selections into a
/// risk band for the slot, shuffles for variety, then takes the strongest
/// fits across distinct games.
pub struct OddsHeuristicAnalyst;

#[derive(Debug, Clone)]
struct Selection {
    game_id: String,
    sport: String,
    team: String,
    opponent: String,
    price: i32,
}

impl OddsHeuristicAnalyst {
    fn selections(odds: &[GameOdds]) -> Vec<Selection> {
        let mut out = Vec::new();
        for game in odds {
            // First book's head-to-head market is the reference price.
            let Some(market) = game
                .bookmakers
                .iter()
                .flat_map(|b| b.markets.iter())
                .find(|m| m.key == "h2h")
            else {
                continue;
            };

            for outcome in &market.outcomes {
                let Some(price) = outcome.price else { continue };
                let opponent = if outcome.name == game.home_team {
                    game.away_team.clone()
                } else {
                    game.home_team.clone()
                };
                out.push(Selection {
                    game_id: game.id.clone(),
                    sport: if game.sport_title.is_empty() {
                        game.sport_key.clone()
                    } else {
                        game.sport_title.clone()
                    },
                    team: outcome.name.clone(),
                    opponent,
                    price,
                });
            }
        }
        out
    }

    fn in_band(price: i32, risk: i32) -> bool {
        if risk <= 4 {
            // Clear favorites only.
            price <= -120
        } else if risk <= 7 {
            // Moderate favorites through small dogs.
            (-250..=150).contains(&price)
        } else {
            // Underdogs.
            price >= 110
        }
    }
}

#[async_trait]
impl ParlayAnalyst for OddsHeuristicAnalyst {
    async fn build_parlay(
        &self,
        odds: &[GameOdds],
        slot: &SlotConfig,
        num_legs: usize,
    ) -> Result<CandidateParlay> {
        let mut pool: Vec<Selection> = Self::selections(odds)
            .into_iter()
            .filter(|s| Self::in_band(s.price, slot.risk))
            .collect();

        // Shuffle first so equally-priced selections vary across runs, then
        // rank within the band.
        pool.shuffle(&mut rand::thread_rng());
        if slot.risk <= 4 {
            pool.sort_by_key(|s| s.price);
        } else if slot.risk <= 7 {
            pool.sort_by_key(|s| s.price.abs());
        } else {
            pool.sort_by_key(|s| std::cmp::Reverse(s.price));
        }

        let mut legs: Vec<CandidateLeg> = Vec::with_capacity(num_legs);
        let mut used_games: Vec<String> = Vec::new();
        for sel in pool {
            if used_games.contains(&sel.game_id) {
                continue;
            }
            used_games.push(sel.game_id.clone());

            let implied = implied_probability(sel.price);
            legs.push(CandidateLeg {
                sport: sel.sport,
                team: sel.team.clone(),
                opponent: Some(sel.opponent.clone()),
                bet_type: "moneyline".to_string(),
                odds: sel.price,
                line: None,
                player: None,
                reasoning: Some(format!(
                    "{} over {} at {}: implied win probability {:.0}%. {}",
                    sel.team,
                    sel.opponent,
                    format_american(sel.price),
                    implied * 100.0,
                    slot.description
                )),
            });
            if legs.len() == num_legs {
                break;
            }
        }

        if legs.len() < num_legs {
            return Err(Error::Analysis(format!(
                "only {} qualifying games for slot '{}' (need {})",
                legs.len(),
                slot.slot,
                num_legs
            )));
        }

        let prices: Vec<i32> = legs.iter().map(|l| l.odds).collect();
        let avg_implied =
            prices.iter().map(|&p| implied_probability(p)).sum::<f64>() / prices.len() as f64;

        Ok(CandidateParlay {
            confidence: ((avg_implied * 100.0).round() as i32).clamp(30, 95),
            total_odds: parlay_odds(&prices),
            legs,
        })
    }
}

/// Implied win probability for an American price.
pub fn implied_probability(price: i32) -> f64 {
    if price < 0 {
        let p = -price as f64;
        p / (p + 100.0)
    } else {
        100.0 / (price as f64 + 100.0)
    }
}

fn american_to_decimal(price: i32) -> f64 {
    if price < 0 {
        1.0 + 100.0 / (-price as f64)
    } else {
        1.0 + price as f64 / 100.0
    }
}

fn decimal_to_american(decimal: f64) -> i32 {
    if decimal >= 2.0 {
        ((decimal - 1.0) * 100.0).round() as i32
    } else {
        (-100.0 / (decimal - 1.0)).round() as i32
    }
}

/// Combined American odds for a parlay of independent legs.
pub fn parlay_odds(prices: &[i32]) -> i32 {
    let combined: f64 = prices.iter().map(|&p| american_to_decimal(p)).product();
    decimal_to_american(combined)
}

fn format_american(price: i32) -> String {
    if price > 0 {
        format!("+{}", price)
    } else {
        price.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::{Bookmaker, Market, Outcome};

    fn game(id: &str, home: &str, away: &str, home_price: i32, away_price: i32) -> GameOdds {
        GameOdds {
            id: id.to_string(),
            sport_key: "basketball_nba".to_string(),
            sport_title: "NBA".to_string(),
            commence_time: None,
            home_team: home.to_string(),
            away_team: away.to_string(),
            bookmakers: vec![Bookmaker {
                key: "dk".to_string(),
                title: "DraftKings".to_string(),
                last_update: None,
                markets: vec![Market {
                    key: "h2h".to_string(),
                    last_update: None,
                    outcomes: vec![
                        Outcome {
                            name: home.to_string(),
                            price: Some(home_price),
                            point: None,
                        },
                        Outcome {
                            name: away.to_string(),
                            price: Some(away_price),
                            point: None,
                        },
                    ],
                }],
            }],
        }
    }

    fn sample_slate() -> Vec<GameOdds> {
        vec![
            game("g1", "Celtics", "Heat", -200, 170),
            game("g2", "Nuggets", "Lakers", -150, 130),
            game("g3", "Bucks", "Knicks", -130, 110),
            game("g4", "Thunder", "Wizards", -400, 320),
        ]
    }

    #[tokio::test]
    async fn safe_slot_takes_heaviest_favorites() {
        let parlay = OddsHeuristicAnalyst
            .build_parlay(&sample_slate(), &DAILY_SLOTS[0], 3)
            .await
            .unwrap();

        assert_eq!(parlay.legs.len(), 3);
        for leg in &parlay.legs {
            assert!(leg.odds <= -120, "unexpected price {}", leg.odds);
            assert_eq!(leg.bet_type, "moneyline");
            assert!(leg.reasoning.is_some());
        }
        // Heaviest favorite ranks first.
        assert_eq!(parlay.legs[0].team, "Thunder");
        assert!(parlay.confidence > 60);
    }

    #[tokio::test]
    async fn risky_slot_takes_underdogs() {
        let parlay = OddsHeuristicAnalyst
            .build_parlay(&sample_slate(), &DAILY_SLOTS[2], 3)
            .await
            .unwrap();

        for leg in &parlay.legs {
            assert!(leg.odds >= 110);
        }
        assert!(parlay.total_odds > 0);
        assert!(parlay.confidence < 50);
    }

    #[tokio::test]
    async fn legs_come_from_distinct_games() {
        let parlay = OddsHeuristicAnalyst
            .build_parlay(&sample_slate(), &DAILY_SLOTS[1], 3)
            .await
            .unwrap();

        let mut teams: Vec<&str> = parlay.legs.iter().map(|l| l.team.as_str()).collect();
        teams.sort();
        teams.dedup();
        assert_eq!(teams.len(), 3);
    }

    #[tokio::test]
    async fn fails_when_slate_is_too_thin() {
        let slate = vec![game("g1", "Celtics", "Heat", -200, 170)];
        let err = OddsHeuristicAnalyst
            .build_parlay(&slate, &DAILY_SLOTS[0], 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Analysis(_)));
    }

    #[test]
    fn implied_probability_matches_book_math() {
        assert!((implied_probability(-200) - 2.0 / 3.0).abs() < 1e-9);
        assert!((implied_probability(100) - 0.5).abs() < 1e-9);
        assert!((implied_probability(150) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn parlay_odds_compound_correctly() {
        // Three -110 legs pay just under 6x.
        assert_eq!(parlay_odds(&[-110, -110, -110]), 596);
        // A single leg round-trips.
        assert_eq!(parlay_odds(&[150]), 150);
        assert_eq!(parlay_odds(&[-200]), -200);
    }
}
