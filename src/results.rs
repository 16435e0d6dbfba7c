use serde::Serialize;

use crate::capture::Outcome;
use crate::clock::Millis;
use crate::config::GameConfig;
use crate::game::GameKind;
use crate::session::GameSession;
use crate::util::{mean, percent, std_dev};

/// Performance bands by average latency, fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum Tier {
    #[strum(to_string = "World Class")]
    WorldClass,
    Excellent,
    Good,
    Average,
    Slow,
    #[strum(to_string = "Very Slow")]
    VerySlow,
}

const TIERS: [Tier; 6] = [
    Tier::WorldClass,
    Tier::Excellent,
    Tier::Good,
    Tier::Average,
    Tier::Slow,
    Tier::VerySlow,
];

/// First band whose boundary the average does not exceed
pub fn tier_for(average_ms: f64, boundaries: &[Millis; 6]) -> Tier {
    boundaries
        .iter()
        .zip(TIERS)
        .find(|(limit, _)| average_ms <= **limit as f64)
        .map(|(_, tier)| tier)
        .unwrap_or(Tier::VerySlow)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub kind: GameKind,
    pub final_score: i64,
    /// Gross score minus the penalty ledger, never below the floor.
    pub net_score: i64,
    pub penalty_points: i64,
    pub penalty_clicks: u32,
    pub response_count: usize,
    pub hits: usize,
    /// Percentage of responses that were hits.
    pub accuracy: f64,
    pub average_latency_ms: Option<f64>,
    pub best_latency_ms: Option<Millis>,
    pub worst_latency_ms: Option<Millis>,
    pub latency_std_dev: Option<f64>,
    /// `None` when nothing was hit.
    pub tier: Option<Tier>,
    pub elapsed_ms: Millis,
    pub rounds: u32,
}

/// Summarize a session. Pure: the same session always yields the same summary.
pub fn summarize(session: &GameSession, rules: &GameConfig) -> ResultSummary {
    let latencies: Vec<Millis> = session
        .responses
        .iter()
        .filter(|r| r.outcome == Outcome::Hit)
        .filter_map(|r| r.latency_ms)
        .collect();

    let hits = session
        .responses
        .iter()
        .filter(|r| r.outcome.is_correct())
        .count();
    let response_count = session.responses.len();
    let average = mean(&latencies);

    ResultSummary {
        kind: session.kind,
        final_score: session.score,
        net_score: (session.score - session.penalty_points).max(rules.scoring.floor),
        penalty_points: session.penalty_points,
        penalty_clicks: session.penalty_clicks,
        response_count,
        hits,
        accuracy: percent(hits, response_count),
        average_latency_ms: average,
        best_latency_ms: latencies.iter().copied().min(),
        worst_latency_ms: latencies.iter().copied().max(),
        latency_std_dev: std_dev(&latencies),
        tier: average.map(|avg| tier_for(avg, &rules.tiers)),
        elapsed_ms: session.elapsed_ms(session.ended_at.unwrap_or(session.created_at)),
        rounds: session.round,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Response;
    use crate::config::DEFAULT_TIERS;
    use crate::session::Phase;

    fn hit(at: Millis, latency: Millis) -> Response {
        Response {
            at,
            stimulus: None,
            outcome: Outcome::Hit,
            latency_ms: Some(latency),
            stray: false,
        }
    }

    fn wrong(at: Millis) -> Response {
        Response {
            at,
            stimulus: None,
            outcome: Outcome::WrongTarget,
            latency_ms: None,
            stray: false,
        }
    }

    #[test]
    fn tiers_pick_first_boundary_not_exceeded() {
        assert_eq!(tier_for(150.0, &DEFAULT_TIERS), Tier::WorldClass);
        assert_eq!(tier_for(180.0, &DEFAULT_TIERS), Tier::WorldClass);
        assert_eq!(tier_for(181.0, &DEFAULT_TIERS), Tier::Excellent);
        assert_eq!(tier_for(300.0, &DEFAULT_TIERS), Tier::Average);
        assert_eq!(tier_for(5000.0, &DEFAULT_TIERS), Tier::VerySlow);
        assert_eq!(Tier::WorldClass.to_string(), "World Class");
    }

    #[test]
    fn no_hits_yields_absent_latency_stats() {
        let rules = GameConfig::builtin(GameKind::FindColor);
        let mut s = GameSession::new(GameKind::FindColor, &rules, 0);
        s.responses.push(wrong(100));
        let summary = summarize(&s, &rules);
        assert_eq!(summary.hits, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert_eq!(summary.average_latency_ms, None);
        assert_eq!(summary.best_latency_ms, None);
        assert_eq!(summary.tier, None);
    }

    #[test]
    fn ledger_penalties_reduce_net_only() {
        let rules = GameConfig::builtin(GameKind::FindColor);
        let mut s = GameSession::new(GameKind::FindColor, &rules, 0);
        s.phase = Phase::Finished;
        s.started_at = Some(3000);
        s.ended_at = Some(13_000);
        s.responses = vec![hit(3400, 400), wrong(3900), hit(4200, 200)];
        s.score = 200;
        s.penalty_points = 50;
        s.penalty_clicks = 1;

        let summary = summarize(&s, &rules);
        assert_eq!(summary.final_score, 200);
        assert_eq!(summary.net_score, 150);
        assert_eq!(summary.average_latency_ms, Some(300.0));
        assert_eq!(summary.best_latency_ms, Some(200));
        assert_eq!(summary.worst_latency_ms, Some(400));
        assert_eq!(summary.tier, Some(Tier::Average));
        assert_eq!(summary.elapsed_ms, 10_000);
        assert!((summary.accuracy - 66.666).abs() < 0.01);
    }

    #[test]
    fn net_score_respects_floor() {
        let rules = GameConfig::builtin(GameKind::FindColor);
        let mut s = GameSession::new(GameKind::FindColor, &rules, 0);
        s.score = 100;
        s.penalty_points = 500;
        assert_eq!(summarize(&s, &rules).net_score, 0);
    }

    #[test]
    fn summarize_is_idempotent() {
        let rules = GameConfig::builtin(GameKind::ReflexTap);
        let mut s = GameSession::new(GameKind::ReflexTap, &rules, 0);
        s.responses = vec![hit(10, 120), hit(20, 240), wrong(30)];
        s.score = 20;
        assert_eq!(summarize(&s, &rules), summarize(&s, &rules));
    }
}
