use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{Local, Utc};
use log::warn;
use rand::rngs::StdRng;
use ratatui::layout::Rect;
use webbrowser::Browser;

use crate::clock::{Clock, Millis};
use crate::config::Config;
use crate::daily::{record_daily_play, Streak};
use crate::engine::{FinishReport, RoundEngine, Tap};
use crate::error::Result;
use crate::game::GameKind;
use crate::input::{cell_to_arena, Command};
use crate::leaderboard::record_result;
use crate::scoring::ScoreDelta;
use crate::session::Phase;
use crate::share::share_url;
use crate::stimulus::{Arena, StimulusKind};
use crate::store::{ResultRecord, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Playing,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

const MAX_ENTRY_DIGITS: usize = 3;

/// One game on screen: the engine plus the persistence around it
pub struct App<S: Store, C: Clock> {
    pub config: Config,
    pub engine: RoundEngine<StdRng>,
    pub store: S,
    pub state: AppState,
    /// Playing today's daily challenge.
    pub daily: bool,
    /// Digits typed so far for a grid answer.
    pub entry: String,
    pub last_delta: Option<ScoreDelta>,
    pub previous_best: Option<i64>,
    pub report: Option<FinishReport>,
    pub record: Option<ResultRecord>,
    pub streak: Option<Streak>,
    /// Where the arena was last drawn; used to hit-test clicks.
    pub arena_area: Cell<Rect>,
    clock: C,
    finished: Rc<RefCell<Option<FinishReport>>>,
}

impl<S: Store, C: Clock> App<S, C> {
    pub fn new(kind: GameKind, config: Config, store: S, clock: C, daily: bool) -> Result<Self> {
        let finished = Rc::new(RefCell::new(None));
        let engine = Self::start_engine(kind, &config, &clock, &finished)?;
        let previous_best = store.high_score(kind)?;

        Ok(Self {
            config,
            engine,
            store,
            state: AppState::Playing,
            daily,
            entry: String::new(),
            last_delta: None,
            previous_best,
            report: None,
            record: None,
            streak: None,
            arena_area: Cell::new(Rect::default()),
            clock,
            finished,
        })
    }

    fn start_engine(
        kind: GameKind,
        config: &Config,
        clock: &C,
        slot: &Rc<RefCell<Option<FinishReport>>>,
    ) -> Result<RoundEngine<StdRng>> {
        let mut engine = RoundEngine::begin(kind, config, Arena::default())?;
        let sink = Rc::clone(slot);
        engine.on_finish(move |report| *sink.borrow_mut() = Some(report.clone()));
        engine.start(clock.now_ms());
        Ok(engine)
    }

    pub fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn kind(&self) -> GameKind {
        self.engine.kind()
    }

    /// Same game again, fresh session
    pub fn restart(&mut self) -> Result<()> {
        let kind = self.kind();
        self.engine.abandon();
        self.finished.borrow_mut().take();
        self.engine = Self::start_engine(kind, &self.config, &self.clock, &self.finished)?;
        self.previous_best = self.store.high_score(kind)?;
        self.state = AppState::Playing;
        self.entry.clear();
        self.last_delta = None;
        self.report = None;
        self.record = None;
        Ok(())
    }

    pub fn on_tick(&mut self) {
        self.engine.tick(self.now());
        self.collect_finish();
    }

    pub fn on_command(&mut self, command: Command) -> Flow {
        match self.state {
            AppState::Playing => {
                if command == Command::Quit {
                    self.engine.abandon();
                    return Flow::Quit;
                }
                if let Some(tap) = self.tap_for(command) {
                    self.tap(tap);
                }
            }
            AppState::Results => match command {
                Command::Quit => return Flow::Quit,
                Command::Retry => {
                    if let Err(e) = self.restart() {
                        warn!("could not restart: {e}");
                        return Flow::Quit;
                    }
                }
                Command::Share => {
                    if let Some(report) = &self.report {
                        if Browser::is_available() {
                            webbrowser::open(&share_url(report)).unwrap_or_default();
                        }
                    }
                }
                _ => {}
            },
        }
        Flow::Continue
    }

    /// A mouse press at a terminal cell
    pub fn on_click(&mut self, column: u16, row: u16) {
        if self.state != AppState::Playing {
            return;
        }
        let tap = match cell_to_arena(self.arena_area.get(), column, row, self.engine.arena()) {
            Some(point) => Tap::At(point),
            None => return,
        };
        self.tap(tap);
    }

    fn tap(&mut self, tap: Tap) {
        let now = self.now();
        if let Some(delta) = self.engine.tap(now, tap) {
            self.last_delta = Some(delta);
        }
        self.collect_finish();
    }

    fn grid_cells(&self) -> Option<&[u32]> {
        self.engine.active().iter().find_map(|s| match &s.kind {
            StimulusKind::NumberGrid { cells, .. } => Some(cells.as_slice()),
            _ => None,
        })
    }

    /// Stimuli tapped directly, in the order they are numbered on screen
    pub fn direct_targets(&self) -> Vec<crate::stimulus::StimulusId> {
        let now = self.now();
        self.engine
            .active()
            .iter()
            .filter(|s| s.spawned_at <= now && s.footprint().is_some())
            .map(|s| s.id)
            .collect()
    }

    fn tap_for(&mut self, command: Command) -> Option<Tap> {
        match command {
            Command::Tap => Some(
                self.direct_targets()
                    .first()
                    .map(|id| Tap::Stimulus(*id))
                    .unwrap_or(Tap::Background),
            ),
            Command::Background => Some(Tap::Background),
            Command::Digit(d) => {
                if self.grid_cells().is_some() {
                    if self.entry.len() < MAX_ENTRY_DIGITS {
                        self.entry.push((b'0' + d) as char);
                    }
                    return None;
                }
                if d == 0 {
                    return None;
                }
                let index = d as usize - 1;
                let direct = self.direct_targets();
                if direct.is_empty() {
                    Some(Tap::Option(index))
                } else {
                    direct.get(index).map(|id| Tap::Stimulus(*id))
                }
            }
            Command::Enter => {
                let cells = self.grid_cells().map(|c| c.to_vec());
                match cells {
                    Some(cells) if !self.entry.is_empty() => {
                        let value = self.entry.parse::<u32>().ok();
                        self.entry.clear();
                        let index = cells
                            .iter()
                            .position(|c| Some(*c) == value)
                            .unwrap_or(cells.len());
                        Some(Tap::Option(index))
                    }
                    Some(_) => None,
                    None => self.tap_for(Command::Tap),
                }
            }
            Command::Backspace => {
                self.entry.pop();
                None
            }
            Command::Retry | Command::Share | Command::Quit => None,
        }
    }

    /// Persist the result once the engine reports the finish
    fn collect_finish(&mut self) {
        let Some(report) = self.finished.borrow_mut().take() else {
            return;
        };

        match record_result(&mut self.store, &report, Utc::now()) {
            Ok(record) => self.record = Some(record),
            Err(e) => warn!("could not save result: {e}"),
        }
        if self.daily {
            match record_daily_play(&mut self.store, Local::now().date_naive()) {
                Ok(streak) => self.streak = Some(streak),
                Err(e) => warn!("could not update streak: {e}"),
            }
        }

        self.entry.clear();
        self.report = Some(report);
        self.state = AppState::Results;
    }

    pub fn is_finished(&self) -> bool {
        self.engine.phase() == Phase::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{KvStore, MemoryStore, ResultStore};

    fn app(kind: GameKind) -> App<MemoryStore, ManualClock> {
        App::new(kind, Config::default(), MemoryStore::new(), ManualClock::new(0), false).unwrap()
    }

    #[test]
    fn finishing_persists_one_record() {
        let mut app = app(GameKind::CatchBall);
        app.clock().set(3000);
        app.on_tick();
        for _ in 0..10 {
            app.clock().advance(150);
            app.on_command(Command::Tap);
        }
        assert_eq!(app.state, AppState::Results);
        assert_eq!(app.report.as_ref().map(|r| r.score), Some(10));
        assert!(app.record.as_ref().unwrap().is_new_high_score);
        assert_eq!(app.store.results(None).unwrap().len(), 1);

        app.on_tick();
        assert_eq!(app.store.results(None).unwrap().len(), 1);
    }

    #[test]
    fn quitting_mid_game_saves_nothing() {
        let mut app = app(GameKind::ReflexTap);
        app.clock().set(5000);
        app.on_tick();
        app.on_command(Command::Tap);
        assert_eq!(app.on_command(Command::Quit), Flow::Quit);
        assert_eq!(app.engine.phase(), Phase::Abandoned);
        assert!(app.store.results(None).unwrap().is_empty());
        assert!(app.report.is_none());
    }

    #[test]
    fn typed_numbers_answer_the_grid() {
        let mut app = app(GameKind::FindNumber);
        app.clock().set(3000);
        app.on_tick();
        let target = app
            .engine
            .active()
            .iter()
            .find_map(|s| match &s.kind {
                StimulusKind::NumberGrid { target, .. } => Some(*target),
                _ => None,
            })
            .unwrap();
        for digit in target.to_string().bytes() {
            app.on_command(Command::Digit(digit - b'0'));
        }
        assert_eq!(app.entry, target.to_string());
        app.clock().advance(400);
        app.on_command(Command::Enter);
        assert_eq!(app.entry, "");
        assert_eq!(app.engine.session().score, 120);
        assert_eq!(app.engine.session().round, 1);
    }

    #[test]
    fn wrong_grid_number_costs_points() {
        let mut app = app(GameKind::FindNumber);
        app.clock().set(3000);
        app.on_tick();
        app.on_command(Command::Digit(9));
        app.on_command(Command::Digit(9));
        app.on_command(Command::Enter);
        assert_eq!(app.last_delta.map(|d| d.points), Some(-50));
        assert_eq!(app.engine.session().penalty_clicks, 1);
    }

    #[test]
    fn daily_play_bumps_the_streak() {
        let mut app = App::new(
            GameKind::CatchBall,
            Config::default(),
            MemoryStore::new(),
            ManualClock::new(0),
            true,
        )
        .unwrap();
        app.clock().set(3000);
        app.on_tick();
        for _ in 0..10 {
            app.clock().advance(100);
            app.on_command(Command::Tap);
        }
        assert_eq!(app.streak.map(|s| s.count), Some(1));
        assert_eq!(app.store.get("streak").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn retry_starts_a_fresh_session() {
        let mut app = app(GameKind::CatchBall);
        app.clock().set(3000);
        app.on_tick();
        for _ in 0..10 {
            app.clock().advance(100);
            app.on_command(Command::Tap);
        }
        assert_eq!(app.on_command(Command::Retry), Flow::Continue);
        assert_eq!(app.state, AppState::Playing);
        assert_eq!(app.previous_best, Some(10));
        assert!(matches!(app.engine.phase(), Phase::Countdown { .. }));
    }
}
