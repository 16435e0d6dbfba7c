use serde::Serialize;

use crate::capture::Response;
use crate::clock::{elapsed_between, Millis};
use crate::config::{Difficulty, GameConfig};
use crate::game::GameKind;
use crate::scoring::Totals;
use crate::stimulus::{Stimulus, StimulusId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Countdown { ends_at: Millis },
    Playing,
    BetweenRounds { resumes_at: Millis },
    Finished,
    /// Discarded before finishing; never summarized or persisted.
    Abandoned,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Abandoned)
    }
}

/// Snapshot of one game session. The sequencer never mutates a snapshot in
/// place; every event yields a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSession {
    pub kind: GameKind,
    pub phase: Phase,
    pub created_at: Millis,
    /// Set when the countdown completes.
    pub started_at: Option<Millis>,
    pub ended_at: Option<Millis>,
    pub responses: Vec<Response>,
    /// Gross score.
    pub score: i64,
    /// Penalty ledger, only fed when penalties are kept apart from the score.
    pub penalty_points: i64,
    pub penalty_clicks: u32,
    /// Completed rounds (or levels, taps, catches).
    pub round: u32,
    pub difficulty: Difficulty,
    pub active: Vec<Stimulus>,
    /// Color the player hunts for, for games that have one.
    pub target_color: Option<String>,
    /// Sequence of the current pattern level.
    pub pattern: Vec<u32>,
    pub next_id: u64,
}

impl GameSession {
    pub fn new(kind: GameKind, rules: &GameConfig, created_at: Millis) -> Self {
        Self {
            kind,
            phase: Phase::Idle,
            created_at,
            started_at: None,
            ended_at: None,
            responses: Vec::new(),
            score: 0,
            penalty_points: 0,
            penalty_clicks: 0,
            round: 0,
            difficulty: rules.difficulty,
            active: Vec::new(),
            target_color: None,
            pattern: Vec::new(),
            next_id: 0,
        }
    }

    pub fn with_target_color(mut self, color: Option<String>) -> Self {
        self.target_color = color;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn totals(&self) -> Totals {
        Totals {
            score: self.score,
            penalty_points: self.penalty_points,
            penalty_clicks: self.penalty_clicks,
        }
    }

    pub fn find(&self, id: StimulusId) -> Option<&Stimulus> {
        self.active.iter().find(|s| s.id == id)
    }

    /// Stimuli that can be responded to at `now`
    pub fn armed(&self, now: Millis) -> impl Iterator<Item = &Stimulus> {
        self.active.iter().filter(move |s| s.spawned_at <= now)
    }

    /// Some stimulus is on screen but not responsive yet (a pattern reveal).
    pub fn is_revealing(&self, now: Millis) -> bool {
        self.active.iter().any(|s| s.spawned_at > now)
    }

    /// Wall time from the end of the countdown until the end (or `now`).
    pub fn elapsed_ms(&self, now: Millis) -> Millis {
        match self.started_at {
            Some(start) => elapsed_between(start, self.ended_at.unwrap_or(now)),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::{Expiry, StimulusKind};

    #[test]
    fn new_session_is_idle_with_base_difficulty() {
        let rules = GameConfig::builtin(GameKind::FindNumber);
        let s = GameSession::new(GameKind::FindNumber, &rules, 42);
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.difficulty.grid_size, 3);
        assert_eq!(s.elapsed_ms(1000), 0);
        assert!(!s.is_terminal());
    }

    #[test]
    fn unarmed_stimuli_are_revealing() {
        let rules = GameConfig::builtin(GameKind::PatternMemory);
        let mut s = GameSession::new(GameKind::PatternMemory, &rules, 0);
        s.active.push(Stimulus {
            id: StimulusId(0),
            kind: StimulusKind::PatternStep {
                sequence: vec![1],
                index: 0,
            },
            spawned_at: 800,
            expiry: Expiry::OnInteraction,
        });
        assert!(s.is_revealing(100));
        assert_eq!(s.armed(100).count(), 0);
        assert!(!s.is_revealing(800));
        assert_eq!(s.armed(800).count(), 1);
    }

    #[test]
    fn elapsed_stops_at_end() {
        let rules = GameConfig::builtin(GameKind::CatchBall);
        let mut s = GameSession::new(GameKind::CatchBall, &rules, 0);
        s.started_at = Some(3000);
        assert_eq!(s.elapsed_ms(4000), 1000);
        s.ended_at = Some(5000);
        assert_eq!(s.elapsed_ms(9000), 2000);
    }
}
