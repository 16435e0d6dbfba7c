//! Round progression as a pure reducer: `(snapshot, event) -> snapshot`.
//!
//! Timers and spawning are the engine's business. The reducer only reports
//! what it wants scheduled through [`Directive`]s.

use log::debug;

use crate::capture::{Outcome, Response};
use crate::clock::Millis;
use crate::config::{Advance, Difficulty, Escalation, GameConfig, RoundFlow, Step, Termination};
use crate::scoring::{fold, ScoreDelta};
use crate::session::{GameSession, Phase};
use crate::stimulus::{Expiry, Stimulus, StimulusId, StimulusKind};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Start { at: Millis, countdown_ms: Millis },
    CountdownElapsed { at: Millis },
    Spawned { stimulus: Stimulus },
    /// A stimulus left the screen without consequence.
    Expired { id: StimulusId },
    Responded { response: Response, delta: ScoreDelta },
    PauseElapsed { at: Millis },
    DeadlineReached { at: Millis },
    Abandon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Countdown { until: Millis },
    EnterPlaying { at: Millis },
    Pause { until: Millis },
    Finish,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub session: GameSession,
    pub directives: Vec<Directive>,
}

impl Transition {
    fn unchanged(session: &GameSession) -> Self {
        Self {
            session: session.clone(),
            directives: Vec::new(),
        }
    }
}

fn step_value(steps: &[Step], round: u32) -> Option<u32> {
    steps
        .iter()
        .filter(|s| s.from_round <= round)
        .max_by_key(|s| s.from_round)
        .map(|s| s.value)
}

/// Difficulty in force for `round` at `score`
pub fn difficulty_at(rules: &GameConfig, round: u32, score: i64) -> Difficulty {
    let mut d = rules.difficulty;
    match &rules.escalation {
        Escalation::None => {}
        Escalation::Grid {
            size_steps,
            value_steps,
        } => {
            if let Some(size) = step_value(size_steps, round) {
                d.grid_size = size;
            }
            if let Some(max) = step_value(value_steps, round) {
                d.value_max = max;
            }
        }
        Escalation::Speed {
            every_points,
            speed_factor,
            size_step,
            max_speed,
            min_size,
        } => {
            let level = (score.max(0) / (*every_points).max(1)).min(i32::MAX as i64) as i32;
            d.ball_speed = (d.ball_speed * speed_factor.powi(level)).min(*max_speed);
            d.ball_size = (d.ball_size - level as f64 * size_step).max(*min_size);
        }
    }
    d
}

/// Whether `response` closes the current round
pub fn completes_round(session: &GameSession, response: &Response, rules: &GameConfig) -> bool {
    let stimulus = response.stimulus.and_then(|id| session.find(id));
    match response.outcome {
        Outcome::Hit => match stimulus.map(|s| &s.kind) {
            Some(StimulusKind::PatternStep { sequence, index }) => index + 1 >= sequence.len(),
            _ => true,
        },
        Outcome::WrongTarget | Outcome::OutOfPattern => {
            rules.advance == Advance::OnAnyAnswer && stimulus.is_some()
        }
        Outcome::Miss | Outcome::EarlyTap => false,
    }
}

fn finish(next: &mut GameSession, at: Millis, directives: &mut Vec<Directive>) {
    next.phase = Phase::Finished;
    next.ended_at = Some(at);
    next.active.clear();
    directives.push(Directive::Finish);
}

fn on_response(
    session: &GameSession,
    response: Response,
    delta: ScoreDelta,
    rules: &GameConfig,
) -> Transition {
    let mut next = session.clone();
    let mut directives = Vec::new();

    let totals = fold(session.totals(), delta, rules);
    next.score = totals.score;
    next.penalty_points = totals.penalty_points;
    next.penalty_clicks = totals.penalty_clicks;
    next.responses.push(response);

    let completes = completes_round(session, &response, rules);
    let stimulus = response.stimulus.and_then(|id| session.find(id));

    if let Some(s) = stimulus {
        let remove = match response.outcome {
            Outcome::Hit | Outcome::Miss => true,
            Outcome::WrongTarget if !response.stray && !s.is_target() => true,
            _ => completes,
        };
        if remove {
            next.active.retain(|a| a.id != s.id);
        }

        // A correct non-final pattern step arms the next one right away.
        if let (Outcome::Hit, StimulusKind::PatternStep { sequence, index }) =
            (response.outcome, &s.kind)
        {
            if index + 1 < sequence.len() {
                let id = StimulusId(next.next_id);
                next.next_id += 1;
                next.active.push(Stimulus {
                    id,
                    kind: StimulusKind::PatternStep {
                        sequence: sequence.clone(),
                        index: index + 1,
                    },
                    spawned_at: response.at,
                    expiry: Expiry::OnInteraction,
                });
            }
        }
    }

    if completes {
        next.round = session.round + 1;
        next.difficulty = difficulty_at(rules, next.round, next.score);
        debug!(
            "{}: round {} complete, score {}",
            session.kind, next.round, next.score
        );
    }

    let struck_out = matches!(rules.termination, Termination::OneStrike { .. })
        && stimulus.is_some()
        && !response.outcome.is_correct();
    let out_of_rounds = match rules.termination {
        Termination::Rounds { count } => next.round >= count,
        Termination::OneStrike {
            max_rounds: Some(max),
        } => next.round >= max,
        _ => false,
    };

    if struck_out || out_of_rounds {
        finish(&mut next, response.at, &mut directives);
    } else if completes {
        if let RoundFlow::Discrete { pause_ms } = rules.flow {
            let until = response.at.saturating_add(pause_ms);
            next.phase = Phase::BetweenRounds { resumes_at: until };
            next.active.clear();
            directives.push(Directive::Pause { until });
        }
    }

    Transition {
        session: next,
        directives,
    }
}

/// Apply one event. Events that make no sense in the current phase are
/// ignored and return the snapshot unchanged.
pub fn reduce(session: &GameSession, event: SessionEvent, rules: &GameConfig) -> Transition {
    match (session.phase, event) {
        (Phase::Idle, SessionEvent::Start { at, countdown_ms }) => {
            let mut next = session.clone();
            if countdown_ms == 0 {
                next.phase = Phase::Playing;
                next.started_at = Some(at);
                next.difficulty = difficulty_at(rules, 0, 0);
                return Transition {
                    session: next,
                    directives: vec![Directive::EnterPlaying { at }],
                };
            }
            let until = at.saturating_add(countdown_ms);
            next.phase = Phase::Countdown { ends_at: until };
            Transition {
                session: next,
                directives: vec![Directive::Countdown { until }],
            }
        }
        (Phase::Countdown { .. }, SessionEvent::CountdownElapsed { at }) => {
            let mut next = session.clone();
            next.phase = Phase::Playing;
            next.started_at = Some(at);
            next.difficulty = difficulty_at(rules, 0, 0);
            Transition {
                session: next,
                directives: vec![Directive::EnterPlaying { at }],
            }
        }
        (Phase::Playing, SessionEvent::Spawned { stimulus }) => {
            let mut next = session.clone();
            next.next_id = next.next_id.max(stimulus.id.0 + 1);
            if let StimulusKind::PatternStep { sequence, .. } = &stimulus.kind {
                next.pattern = sequence.clone();
            }
            next.active.push(stimulus);
            Transition {
                session: next,
                directives: Vec::new(),
            }
        }
        (Phase::Playing, SessionEvent::Expired { id }) => {
            let mut next = session.clone();
            next.active.retain(|s| s.id != id);
            Transition {
                session: next,
                directives: Vec::new(),
            }
        }
        (Phase::Playing, SessionEvent::Responded { response, delta }) => {
            on_response(session, response, delta, rules)
        }
        (Phase::BetweenRounds { .. }, SessionEvent::PauseElapsed { .. }) => {
            let mut next = session.clone();
            next.phase = Phase::Playing;
            Transition {
                session: next,
                directives: Vec::new(),
            }
        }
        (Phase::Playing | Phase::BetweenRounds { .. }, SessionEvent::DeadlineReached { at }) => {
            let mut next = session.clone();
            let mut directives = Vec::new();
            finish(&mut next, at, &mut directives);
            Transition {
                session: next,
                directives,
            }
        }
        (phase, SessionEvent::Abandon) if !phase.is_terminal() => {
            let mut next = session.clone();
            next.phase = Phase::Abandoned;
            next.active.clear();
            Transition {
                session: next,
                directives: Vec::new(),
            }
        }
        (phase, event) => {
            debug!("{}: ignoring {event:?} in {phase:?}", session.kind);
            Transition::unchanged(session)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ResponseCapture;
    use crate::game::GameKind;
    use crate::scoring::score;

    fn playing(kind: GameKind) -> (GameSession, GameConfig) {
        let rules = GameConfig::builtin(kind);
        let s = GameSession::new(kind, &rules, 0);
        let s = reduce(
            &s,
            SessionEvent::Start {
                at: 0,
                countdown_ms: 3000,
            },
            &rules,
        )
        .session;
        let s = reduce(&s, SessionEvent::CountdownElapsed { at: 3000 }, &rules).session;
        (s, rules)
    }

    fn spawn(s: &GameSession, rules: &GameConfig, kind: StimulusKind, at: Millis) -> GameSession {
        let stimulus = Stimulus {
            id: StimulusId(s.next_id),
            kind,
            spawned_at: at,
            expiry: Expiry::OnInteraction,
        };
        reduce(s, SessionEvent::Spawned { stimulus }, rules).session
    }

    fn respond(s: &GameSession, rules: &GameConfig, target_hit: bool, at: Millis) -> Transition {
        let capture = ResponseCapture::from_rules(rules);
        let response = capture.capture(s.active.first(), at, target_hit);
        let delta = score(&response, s, rules);
        reduce(s, SessionEvent::Responded { response, delta }, rules)
    }

    #[test]
    fn countdown_then_playing() {
        let rules = GameConfig::builtin(GameKind::CatchBall);
        let s = GameSession::new(GameKind::CatchBall, &rules, 0);
        let t = reduce(
            &s,
            SessionEvent::Start {
                at: 10,
                countdown_ms: 3000,
            },
            &rules,
        );
        assert_eq!(t.session.phase, Phase::Countdown { ends_at: 3010 });
        assert_eq!(t.directives, vec![Directive::Countdown { until: 3010 }]);

        let t = reduce(&t.session, SessionEvent::CountdownElapsed { at: 3010 }, &rules);
        assert_eq!(t.session.phase, Phase::Playing);
        assert_eq!(t.session.started_at, Some(3010));
        assert_eq!(t.directives, vec![Directive::EnterPlaying { at: 3010 }]);
    }

    #[test]
    fn grid_escalates_at_round_thresholds() {
        let rules = GameConfig::builtin(GameKind::FindNumber);
        let sizes: Vec<u32> = (0..8).map(|r| difficulty_at(&rules, r, 0).grid_size).collect();
        assert_eq!(sizes, vec![3, 3, 3, 4, 4, 4, 5, 5]);
        assert_eq!(difficulty_at(&rules, 4, 0).value_max, 20);
        assert_eq!(difficulty_at(&rules, 5, 0).value_max, 50);
    }

    #[test]
    fn speed_escalates_every_five_points_within_bounds() {
        let rules = GameConfig::builtin(GameKind::CatchBall);
        let base = difficulty_at(&rules, 0, 4);
        assert_eq!(base.ball_speed, 120.0);
        assert_eq!(base.ball_size, 50.0);

        let one = difficulty_at(&rules, 5, 5);
        assert!((one.ball_speed - 138.0).abs() < 1e-9);
        assert_eq!(one.ball_size, 46.0);

        let far = difficulty_at(&rules, 500, 500);
        assert_eq!(far.ball_speed, 400.0);
        assert_eq!(far.ball_size, 26.0);
    }

    #[test]
    fn discrete_flow_pauses_after_a_hit() {
        let (s, rules) = playing(GameKind::ColorChange);
        let s = spawn(
            &s,
            &rules,
            StimulusKind::ColorSwatch {
                color: "Red".into(),
            },
            5000,
        );
        let t = respond(&s, &rules, true, 5300);
        assert_eq!(t.session.score, 850);
        assert_eq!(t.session.round, 1);
        assert_eq!(t.session.phase, Phase::BetweenRounds { resumes_at: 6300 });
        assert_eq!(t.directives, vec![Directive::Pause { until: 6300 }]);
        assert!(t.session.active.is_empty());

        let back = reduce(&t.session, SessionEvent::PauseElapsed { at: 6300 }, &rules);
        assert_eq!(back.session.phase, Phase::Playing);
    }

    #[test]
    fn one_strike_finishes_on_first_mismatch() {
        let (s, rules) = playing(GameKind::PatternMemory);
        let s = spawn(
            &s,
            &rules,
            StimulusKind::PatternStep {
                sequence: vec![2, 0],
                index: 0,
            },
            3000,
        );
        let t = respond(&s, &rules, false, 3500);
        assert_eq!(t.session.phase, Phase::Finished);
        assert_eq!(t.directives, vec![Directive::Finish]);
        assert_eq!(t.session.ended_at, Some(3500));
        assert_eq!(t.session.penalty_clicks, 1);
    }

    #[test]
    fn pattern_steps_chain_and_award_on_completion() {
        let (s, rules) = playing(GameKind::PatternMemory);
        let s = spawn(
            &s,
            &rules,
            StimulusKind::PatternStep {
                sequence: vec![1, 3],
                index: 0,
            },
            3000,
        );
        let t = respond(&s, &rules, true, 3400);
        assert_eq!(t.session.score, 0);
        assert_eq!(t.session.round, 0);
        assert_eq!(t.session.active.len(), 1);
        let follow = &t.session.active[0];
        assert_eq!(follow.spawned_at, 3400);
        assert_eq!(follow.accepts_option(3), Some(true));

        let t = respond(&t.session, &rules, true, 3700);
        assert_eq!(t.session.score, 1);
        assert_eq!(t.session.round, 1);
        assert_eq!(t.session.phase, Phase::BetweenRounds { resumes_at: 4700 });
    }

    #[test]
    fn rounds_limit_finishes_once() {
        let (mut s, rules) = playing(GameKind::CatchBall);
        let mut finishes = 0;
        for i in 0..12u64 {
            s = spawn(
                &s,
                &rules,
                StimulusKind::Ball {
                    position: Default::default(),
                    velocity: Default::default(),
                    size: 50.0,
                },
                4000 + i * 100,
            );
            let t = respond(&s, &rules, true, 4050 + i * 100);
            finishes += t
                .directives
                .iter()
                .filter(|d| **d == Directive::Finish)
                .count();
            s = t.session;
        }
        assert_eq!(finishes, 1);
        assert_eq!(s.round, 10);
        assert_eq!(s.score, 10);
        assert_eq!(s.phase, Phase::Finished);
    }

    #[test]
    fn deadline_finishes_duration_games() {
        let (s, rules) = playing(GameKind::ColorCatch);
        let t = reduce(&s, SessionEvent::DeadlineReached { at: 33_000 }, &rules);
        assert_eq!(t.session.phase, Phase::Finished);
        assert_eq!(t.session.elapsed_ms(40_000), 30_000);
    }

    #[test]
    fn abandon_is_terminal_and_silent() {
        let (s, rules) = playing(GameKind::ReflexTap);
        let t = reduce(&s, SessionEvent::Abandon, &rules);
        assert_eq!(t.session.phase, Phase::Abandoned);
        assert!(t.directives.is_empty());

        let again = reduce(&t.session, SessionEvent::DeadlineReached { at: 1 }, &rules);
        assert_eq!(again.session, t.session);
    }

    #[test]
    fn nothing_leaves_finished() {
        let (s, rules) = playing(GameKind::ColorCatch);
        let done = reduce(&s, SessionEvent::DeadlineReached { at: 33_000 }, &rules).session;
        for event in [
            SessionEvent::Abandon,
            SessionEvent::PauseElapsed { at: 1 },
            SessionEvent::CountdownElapsed { at: 1 },
        ] {
            assert_eq!(reduce(&done, event, &rules).session.phase, Phase::Finished);
        }
    }

    #[test]
    fn any_answer_advances_color_text() {
        let (s, rules) = playing(GameKind::ColorText);
        let s = spawn(
            &s,
            &rules,
            StimulusKind::ColorWord {
                word: "Red".into(),
                ink: "Blue".into(),
                options: vec!["Blue".into(), "Red".into()],
            },
            3000,
        );
        let t = respond(&s, &rules, false, 3600);
        assert_eq!(t.session.round, 1);
        assert_eq!(t.session.score, 0);
        assert!(t.session.active.is_empty());
    }
}
