use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::capture::ResponseCapture;
use crate::clock::Millis;
use crate::config::{Config, GameConfig, PenaltyMode, Spawning, Termination};
use crate::error::Result;
use crate::game::GameKind;
use crate::results::{summarize, ResultSummary};
use crate::scheduler::{pick_target, Scheduled, StimulusScheduler};
use crate::scoring::{score, ScoreDelta};
use crate::sequencer::{reduce, Directive, SessionEvent};
use crate::session::{GameSession, Phase};
use crate::stimulus::{Arena, Point, Stimulus, StimulusId, StimulusKind};
use crate::timers::{TimerKind, TimerQueue};

/// What the finish callback receives, exactly once per finished session
#[derive(Debug, Clone, PartialEq)]
pub struct FinishReport {
    pub kind: GameKind,
    /// Gross score.
    pub score: i64,
    pub elapsed_ms: Millis,
    /// Only for games that keep penalties in a separate ledger.
    pub penalty_score: Option<i64>,
    pub penalty_clicks: Option<u32>,
    pub summary: ResultSummary,
}

pub type FinishListener = Box<dyn FnMut(&FinishReport)>;

/// A player interaction, before it is judged
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tap {
    /// Struck a specific stimulus.
    Stimulus(StimulusId),
    /// Picked an option (grid cell, color name, pattern pad) by index.
    Option(usize),
    /// Clicked an arena point; hit-tested against what is on screen.
    At(Point),
    /// Tapped empty space.
    Background,
}

/// Drives one game session: owns its timers, asks the scheduler for
/// stimuli and feeds every event through the sequencer.
pub struct RoundEngine<R: Rng> {
    rules: GameConfig,
    countdown_ms: Millis,
    session: GameSession,
    timers: TimerQueue,
    scheduler: StimulusScheduler,
    capture: ResponseCapture,
    rng: R,
    listener: Option<FinishListener>,
    summary: Option<ResultSummary>,
    last_frame: Option<Millis>,
}

impl RoundEngine<StdRng> {
    /// Refuses to start when the game has no valid rules.
    pub fn begin(kind: GameKind, config: &Config, arena: Arena) -> Result<Self> {
        Self::begin_with_rng(kind, config, arena, StdRng::from_entropy())
    }
}

impl<R: Rng> RoundEngine<R> {
    pub fn begin_with_rng(kind: GameKind, config: &Config, arena: Arena, mut rng: R) -> Result<Self> {
        let rules = config.rules(kind)?.clone();
        let target = pick_target(&rules, &mut rng);
        let session = GameSession::new(kind, &rules, 0).with_target_color(target);
        info!("begin {kind}");

        Ok(Self {
            capture: ResponseCapture::from_rules(&rules),
            rules,
            countdown_ms: config.countdown_ms(),
            session,
            timers: TimerQueue::new(),
            scheduler: StimulusScheduler::new(arena),
            rng,
            listener: None,
            summary: None,
            last_frame: None,
        })
    }

    /// Register the finish callback. It fires once, when the session finishes.
    pub fn on_finish<F: FnMut(&FinishReport) + 'static>(&mut self, f: F) {
        self.listener = Some(Box::new(f));
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn rules(&self) -> &GameConfig {
        &self.rules
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn kind(&self) -> GameKind {
        self.session.kind
    }

    pub fn arena(&self) -> Arena {
        self.scheduler.arena()
    }

    pub fn active(&self) -> &[Stimulus] {
        &self.session.active
    }

    pub fn summary(&self) -> Option<&ResultSummary> {
        self.summary.as_ref()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Earliest moment something is scheduled to happen
    pub fn next_wakeup(&self) -> Option<Millis> {
        self.timers.next_due()
    }

    pub fn countdown_remaining(&self, now: Millis) -> Option<Millis> {
        match self.session.phase {
            Phase::Countdown { ends_at } => Some(ends_at.saturating_sub(now)),
            _ => None,
        }
    }

    /// Time left for duration-limited games
    pub fn time_remaining(&self, now: Millis) -> Option<Millis> {
        match self.rules.termination {
            Termination::Duration { ms } => Some(ms.saturating_sub(self.session.elapsed_ms(now))),
            _ => None,
        }
    }

    pub fn start(&mut self, now: Millis) {
        self.session.created_at = now;
        self.dispatch(
            SessionEvent::Start {
                at: now,
                countdown_ms: self.countdown_ms,
            },
            now,
        );
    }

    /// Fire every timer due by `now` at its own due time, then move what moves.
    pub fn tick(&mut self, now: Millis) {
        while let Some(timer) = self.timers.pop_due(now) {
            self.fire(timer.kind, timer.due);
        }
        self.animate(now);
    }

    /// Judge an interaction. `None` when it was ignored.
    pub fn tap(&mut self, now: Millis, tap: Tap) -> Option<ScoreDelta> {
        self.tick(now);
        if self.session.phase != Phase::Playing || self.session.is_revealing(now) {
            return None;
        }

        let response = match self.resolve(now, tap) {
            Tap::Stimulus(id) => {
                let stimulus = self.session.find(id)?;
                self.capture
                    .capture(Some(stimulus), now, stimulus.is_target())
            }
            Tap::Option(index) => {
                let (stimulus, ok) = self
                    .session
                    .armed(now)
                    .find_map(|s| s.accepts_option(index).map(|ok| (s, ok)))?;
                self.capture.capture(Some(stimulus), now, ok)
            }
            _ => {
                let penalties = self.rules.scoring.penalties;
                match self.session.armed(now).find(|s| s.is_target()) {
                    Some(waiting) => {
                        penalties.stray_tap?;
                        self.capture.capture_stray(waiting, now)
                    }
                    None if self.session.active.is_empty() => {
                        penalties.early_tap?;
                        self.capture.capture(None, now, false)
                    }
                    None => return None,
                }
            }
        };

        let delta = score(&response, &self.session, &self.rules);
        debug!(
            "{}: {} at {now} ({:+})",
            self.session.kind, delta.reason, delta.points
        );
        self.dispatch(SessionEvent::Responded { response, delta }, now);
        Some(delta)
    }

    /// Silent discard: no summary, no callback, nothing left scheduled.
    pub fn abandon(&mut self) {
        if self.session.is_terminal() {
            return;
        }
        self.timers.cancel_all();
        self.listener = None;
        let at = self.session.started_at.unwrap_or(self.session.created_at);
        self.dispatch(SessionEvent::Abandon, at);
        info!("abandoned {}", self.session.kind);
    }

    /// Narrow a tap to the stimulus it lands on, if any
    fn resolve(&self, now: Millis, tap: Tap) -> Tap {
        let direct = |s: &Stimulus| s.covers_arena() || s.footprint().is_some();
        match tap {
            Tap::Stimulus(id) => match self.session.find(id) {
                Some(s) if s.spawned_at <= now && direct(s) => tap,
                _ => Tap::Background,
            },
            Tap::At(point) => self
                .session
                .armed(now)
                .filter(|s| direct(s))
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .find(|s| s.hit_test(point))
                .map(|s| Tap::Stimulus(s.id))
                .unwrap_or(Tap::Background),
            Tap::Option(index) => {
                if self
                    .session
                    .armed(now)
                    .any(|s| s.accepts_option(index).is_some())
                {
                    tap
                } else {
                    Tap::Background
                }
            }
            Tap::Background => match self.session.armed(now).find(|s| s.covers_arena()) {
                Some(s) => Tap::Stimulus(s.id),
                None => Tap::Background,
            },
        }
    }

    fn fire(&mut self, kind: TimerKind, at: Millis) {
        self.animate(at);
        match kind {
            TimerKind::CountdownEnd => self.dispatch(SessionEvent::CountdownElapsed { at }, at),
            TimerKind::Spawn => {
                if self.session.phase == Phase::Playing {
                    if let Scheduled::Stimulus(s) = self.scheduler.schedule_next(
                        &self.session,
                        &self.rules,
                        at,
                        true,
                        &mut self.rng,
                    ) {
                        self.spawn(s, at);
                    }
                }
            }
            TimerKind::SpawnInterval => {
                if self.session.phase == Phase::Playing {
                    let s = self
                        .scheduler
                        .spawn(&self.session, &self.rules, at, &mut self.rng);
                    self.spawn(s, at);
                }
                if let Spawning::Interval { every_ms } = self.rules.spawning {
                    if !self.session.is_terminal() {
                        self.timers
                            .schedule(TimerKind::SpawnInterval, at.saturating_add(every_ms));
                    }
                }
            }
            TimerKind::Expire(id) => {
                let Some(stimulus) = self.session.find(id) else {
                    return;
                };
                if stimulus.is_target() {
                    let response = self.capture.miss(stimulus, at);
                    let delta = score(&response, &self.session, &self.rules);
                    self.dispatch(SessionEvent::Responded { response, delta }, at);
                } else {
                    self.dispatch(SessionEvent::Expired { id }, at);
                }
            }
            TimerKind::Resume => self.dispatch(SessionEvent::PauseElapsed { at }, at),
            TimerKind::Deadline => self.dispatch(SessionEvent::DeadlineReached { at }, at),
        }
    }

    fn spawn(&mut self, stimulus: Stimulus, at: Millis) {
        if let Some(due) = stimulus.expires_at() {
            self.timers.schedule(TimerKind::Expire(stimulus.id), due);
        }
        debug!("{}: spawn {:?}", self.session.kind, stimulus.kind);
        self.dispatch(SessionEvent::Spawned { stimulus }, at);
    }

    fn dispatch(&mut self, event: SessionEvent, at: Millis) {
        let transition = reduce(&self.session, event, &self.rules);
        self.session = transition.session;

        for directive in transition.directives {
            match directive {
                Directive::Countdown { until } => {
                    self.timers.schedule(TimerKind::CountdownEnd, until);
                }
                Directive::EnterPlaying { at } => {
                    info!("{} playing", self.session.kind);
                    self.last_frame = Some(at);
                    if let Termination::Duration { ms } = self.rules.termination {
                        self.timers
                            .schedule(TimerKind::Deadline, at.saturating_add(ms));
                    }
                    if let Spawning::Interval { .. } = self.rules.spawning {
                        self.timers.schedule(TimerKind::SpawnInterval, at);
                    }
                }
                Directive::Pause { until } => {
                    self.timers.cancel_kind(TimerKind::Spawn);
                    self.timers.schedule(TimerKind::Resume, until);
                }
                Directive::Finish => self.finish(),
            }
        }

        self.refill(at);
    }

    /// Keep one stimulus in play for games that are not interval driven
    fn refill(&mut self, now: Millis) {
        if self.session.phase != Phase::Playing
            || !self.session.active.is_empty()
            || self.timers.has(TimerKind::Spawn)
            || matches!(self.rules.spawning, Spawning::Interval { .. })
        {
            return;
        }

        match self
            .scheduler
            .schedule_next(&self.session, &self.rules, now, false, &mut self.rng)
        {
            Scheduled::Delay(ms) => {
                self.timers.schedule(TimerKind::Spawn, now.saturating_add(ms));
            }
            Scheduled::Stimulus(s) => self.spawn(s, now),
        }
    }

    fn animate(&mut self, now: Millis) {
        let Some(last) = self.last_frame else {
            return;
        };
        if self.session.phase != Phase::Playing || now <= last {
            return;
        }
        let arena = self.scheduler.arena();
        for s in self
            .session
            .active
            .iter_mut()
            .filter(|s| matches!(s.kind, StimulusKind::Ball { .. }))
        {
            s.advance(now - last, arena);
        }
        self.last_frame = Some(now);
    }

    fn finish(&mut self) {
        self.timers.cancel_all();
        self.last_frame = None;
        let summary = summarize(&self.session, &self.rules);
        let report = FinishReport {
            kind: self.session.kind,
            score: self.session.score,
            elapsed_ms: summary.elapsed_ms,
            penalty_score: match self.rules.scoring.penalties.mode {
                PenaltyMode::Ledger => Some(self.session.penalty_points),
                PenaltyMode::Deduct => None,
            },
            penalty_clicks: Some(self.session.penalty_clicks),
            summary: summary.clone(),
        };
        info!(
            "{} finished: score {} in {}ms",
            report.kind, report.score, report.elapsed_ms
        );
        self.summary = Some(summary);
        if let Some(mut listener) = self.listener.take() {
            listener(&report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine(kind: GameKind) -> RoundEngine<StdRng> {
        RoundEngine::begin_with_rng(
            kind,
            &Config::default(),
            Arena::default(),
            StdRng::seed_from_u64(17),
        )
        .unwrap()
    }

    #[test]
    fn missing_rules_refuse_to_start() {
        let mut cfg = Config::default();
        cfg.games.remove(&GameKind::CatchBall);
        assert!(RoundEngine::begin(GameKind::CatchBall, &cfg, Arena::default()).is_err());
    }

    #[test]
    fn countdown_then_first_stimulus() {
        let mut e = engine(GameKind::CatchBall);
        e.start(0);
        assert_eq!(e.countdown_remaining(1000), Some(2000));
        assert!(e.active().is_empty());
        e.tick(3000);
        assert_eq!(e.phase(), Phase::Playing);
        assert_eq!(e.active().len(), 1);
    }

    #[test]
    fn taps_during_countdown_are_ignored() {
        let mut e = engine(GameKind::ColorChange);
        e.start(0);
        assert_eq!(e.tap(500, Tap::Background), None);
        assert!(e.session().responses.is_empty());
    }

    #[test]
    fn early_tap_before_color_change() {
        let mut e = engine(GameKind::ColorChange);
        e.start(0);
        e.tick(3000);
        assert!(e.active().is_empty());
        let delta = e.tap(3100, Tap::Background).unwrap();
        assert_eq!(delta.points, -10);
        assert_eq!(e.session().score, 0);
        assert_eq!(e.session().penalty_clicks, 1);
    }

    #[test]
    fn finish_callback_fires_once() {
        let mut e = engine(GameKind::CatchBall);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        e.on_finish(move |r| sink.borrow_mut().push(r.clone()));
        e.start(0);
        e.tick(3000);
        let mut now = 3000;
        while e.phase() == Phase::Playing {
            now += 100;
            let id = e.active()[0].id;
            e.tap(now, Tap::Stimulus(id));
        }
        e.tick(now + 60_000);
        assert_eq!(e.phase(), Phase::Finished);
        assert_eq!(e.pending_timers(), 0);
        assert!(e.active().is_empty());

        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].score, 10);
        assert_eq!(calls[0].elapsed_ms, 1000);
        assert_eq!(calls[0].penalty_score, None);
        assert_eq!(calls[0].penalty_clicks, Some(0));
    }

    #[test]
    fn abandon_cancels_everything_silently() {
        let mut e = engine(GameKind::ColorCatch);
        let fired = Rc::new(RefCell::new(false));
        let flag = fired.clone();
        e.on_finish(move |_| *flag.borrow_mut() = true);
        e.start(0);
        e.tick(5000);
        e.abandon();
        assert_eq!(e.phase(), Phase::Abandoned);
        assert_eq!(e.pending_timers(), 0);
        e.tick(100_000);
        assert!(e.active().is_empty());
        assert!(e.summary().is_none());
        assert!(!*fired.borrow());
    }
}
