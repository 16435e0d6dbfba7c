use crate::capture::{Outcome, Response};
use crate::clock::Millis;
use crate::config::{AwardOn, GameConfig, PenaltyMode, ScoringRule};
use crate::sequencer::completes_round;
use crate::session::GameSession;

/// Signed change produced by one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreDelta {
    pub points: i64,
    pub reason: Outcome,
}

/// Points for a correct response under `rule`
pub fn points_for_hit(rule: &ScoringRule, latency_ms: Millis, grid_size: u32, round: u32) -> i64 {
    match *rule {
        ScoringRule::LatencyInverse {
            numerator,
            floor_ms,
            base,
        } => (numerator / latency_ms.max(floor_ms).max(1) as f64).round() as i64 + base,
        ScoringRule::LinearDecay { base, slope } => {
            (base - latency_ms as f64 * slope).round().max(0.0) as i64
        }
        ScoringRule::Fixed { points } => points,
        ScoringRule::DifficultyScaled {
            base,
            grid_bonus,
            round_bonus,
        } => base + (grid_size as i64 - 2) * grid_bonus + round as i64 * round_bonus,
    }
}

/// Score one response against the session it belongs to
pub fn score(response: &Response, session: &GameSession, rules: &GameConfig) -> ScoreDelta {
    let penalties = &rules.scoring.penalties;
    let points = match response.outcome {
        Outcome::Hit => {
            let awarded = match rules.scoring.award {
                AwardOn::EachHit => true,
                AwardOn::RoundComplete => completes_round(session, response, rules),
            };
            if awarded {
                points_for_hit(
                    &rules.scoring.rule,
                    response.latency_ms.unwrap_or(rules.latency_floor_ms),
                    session.difficulty.grid_size,
                    session.round,
                )
            } else {
                0
            }
        }
        Outcome::Miss => -penalties.miss,
        Outcome::WrongTarget if response.stray => -penalties.stray_tap.unwrap_or(0),
        Outcome::WrongTarget | Outcome::OutOfPattern => -penalties.wrong_target,
        Outcome::EarlyTap => -penalties.early_tap.unwrap_or(0),
    };

    ScoreDelta {
        points,
        reason: response.outcome,
    }
}

/// Running totals after folding `delta` in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub score: i64,
    pub penalty_points: i64,
    pub penalty_clicks: u32,
}

/// Fold a delta into the running totals. Negative deltas either come off the
/// gross score (clamped at the floor) or go to the penalty ledger.
pub fn fold(totals: Totals, delta: ScoreDelta, rules: &GameConfig) -> Totals {
    let floor = rules.scoring.floor;
    let mut next = totals;

    if delta.reason.is_penalty() {
        next.penalty_clicks = next.penalty_clicks.saturating_add(1);
    }

    if delta.points >= 0 {
        next.score += delta.points;
    } else {
        match rules.scoring.penalties.mode {
            PenaltyMode::Deduct => next.score = (next.score + delta.points).max(floor),
            PenaltyMode::Ledger => next.penalty_points += -delta.points,
        }
    }

    next
}
