use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::clock::Millis;
use crate::error::{Error, Result};
use crate::game::GameKind;
use crate::stimulus::Shape;

/// Inclusive uniform range a delay is drawn from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DelayRange {
    pub min_ms: Millis,
    pub max_ms: Millis,
}

impl DelayRange {
    pub const fn new(min_ms: Millis, max_ms: Millis) -> Self {
        Self { min_ms, max_ms }
    }
}

/// What a game puts on screen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StimulusRule {
    /// The whole arena changes color; any tap counts.
    ColorSwatch { palette: Vec<String> },
    /// One bouncing ball; size and speed come from the difficulty.
    Ball,
    /// Colored circles; only the session's target color should be tapped.
    Circles {
        palette: Vec<String>,
        size: f64,
        lifetime_ms: Millis,
    },
    /// Grid of unique numbers; size and value range come from the difficulty.
    NumberGrid,
    /// A color swatch plus named options.
    ColorChoice { palette: Vec<String>, options: usize },
    /// A color word printed in a different ink; the answer is the ink.
    ColorWord { palette: Vec<String>, options: usize },
    Shape { shapes: Vec<Shape>, size: f64 },
    /// Growing sequence over `pads`, revealed one step every `reveal_step_ms`.
    Pattern { pads: u32, reveal_step_ms: Millis },
}

/// When the next stimulus appears
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Spawning {
    Immediate,
    Delayed { delay: DelayRange },
    /// A new stimulus every `every_ms`, independent of responses.
    Interval { every_ms: Millis },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScoringRule {
    /// `round(numerator / max(latency, floor_ms)) + base`
    LatencyInverse {
        numerator: f64,
        floor_ms: Millis,
        base: i64,
    },
    /// `max(0, round(base - latency * slope))`
    LinearDecay { base: f64, slope: f64 },
    Fixed { points: i64 },
    /// `base + (grid_size - 2) * grid_bonus + round * round_bonus`
    DifficultyScaled {
        base: i64,
        grid_bonus: i64,
        round_bonus: i64,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AwardOn {
    EachHit,
    /// Points only when the last step of a round is hit.
    RoundComplete,
}

/// Where penalty points go
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PenaltyMode {
    /// Subtracted from the gross score.
    Deduct,
    /// Kept in a separate ledger; gross score is untouched.
    Ledger,
}

/// Penalty magnitudes. `None` means the interaction is ignored entirely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Penalties {
    pub mode: PenaltyMode,
    /// Struck the wrong option or a non-target stimulus.
    pub wrong_target: i64,
    /// Tapped the background while a stimulus was up.
    pub stray_tap: Option<i64>,
    /// Tapped while nothing was up.
    pub early_tap: Option<i64>,
    /// A target expired untouched.
    pub miss: i64,
}

impl Penalties {
    pub const fn none() -> Self {
        Self {
            mode: PenaltyMode::Deduct,
            wrong_target: 0,
            stray_tap: None,
            early_tap: None,
            miss: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoringConfig {
    pub rule: ScoringRule,
    pub award: AwardOn,
    pub penalties: Penalties,
    pub floor: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Advance {
    OnHit,
    OnAnyAnswer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RoundFlow {
    Continuous,
    Discrete { pause_ms: Millis },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Termination {
    Rounds { count: u32 },
    Duration { ms: Millis },
    /// The first incorrect response ends the session.
    OneStrike { max_rounds: Option<u32> },
}

/// Difficulty knobs that vary by game and escalate with progress
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Difficulty {
    pub grid_size: u32,
    pub value_max: u32,
    /// Arena units per second.
    pub ball_speed: f64,
    pub ball_size: f64,
}

impl Difficulty {
    /// Cells in a square grid of `grid_size`; `None` when that overflows.
    pub fn cell_count(&self) -> Option<u32> {
        self.grid_size.checked_mul(self.grid_size)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self {
            grid_size: 3,
            value_max: 20,
            ball_speed: 120.0,
            ball_size: 50.0,
        }
    }
}

/// A value that takes effect from `from_round` onward
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub from_round: u32,
    pub value: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Escalation {
    None,
    Grid {
        size_steps: Vec<Step>,
        value_steps: Vec<Step>,
    },
    Speed {
        every_points: i64,
        speed_factor: f64,
        size_step: f64,
        max_speed: f64,
        min_size: f64,
    },
}

/// Complete rule set for one game kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    pub stimulus: StimulusRule,
    pub spawning: Spawning,
    pub scoring: ScoringConfig,
    pub advance: Advance,
    pub flow: RoundFlow,
    pub termination: Termination,
    pub difficulty: Difficulty,
    pub escalation: Escalation,
    /// Correct-response latencies are clamped up to this.
    pub latency_floor_ms: Millis,
    /// Six ascending average-latency boundaries, world class first.
    pub tiers: [Millis; 6],
}

pub const DEFAULT_TIERS: [Millis; 6] = [180, 220, 270, 350, 450, 600];

fn palette(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

const SIX_COLORS: [&str; 6] = ["Red", "Blue", "Green", "Yellow", "Purple", "Orange"];

impl GameConfig {
    /// Built-in rules for a game
    pub fn builtin(kind: GameKind) -> Self {
        let base = GameConfig {
            stimulus: StimulusRule::Ball,
            spawning: Spawning::Immediate,
            scoring: ScoringConfig {
                rule: ScoringRule::Fixed { points: 1 },
                award: AwardOn::EachHit,
                penalties: Penalties::none(),
                floor: 0,
            },
            advance: Advance::OnHit,
            flow: RoundFlow::Continuous,
            termination: Termination::Rounds { count: 10 },
            difficulty: Difficulty::default(),
            escalation: Escalation::None,
            latency_floor_ms: 80,
            tiers: DEFAULT_TIERS,
        };

        match kind {
            GameKind::ColorChange => GameConfig {
                stimulus: StimulusRule::ColorSwatch {
                    palette: palette(&[
                        "Red", "Blue", "Green", "Yellow", "Purple", "Pink", "Indigo",
                    ]),
                },
                spawning: Spawning::Delayed {
                    delay: DelayRange::new(1000, 4000),
                },
                scoring: ScoringConfig {
                    rule: ScoringRule::LinearDecay {
                        base: 1000.0,
                        slope: 0.5,
                    },
                    penalties: Penalties {
                        early_tap: Some(10),
                        ..Penalties::none()
                    },
                    ..base.scoring
                },
                flow: RoundFlow::Discrete { pause_ms: 1000 },
                ..base
            },
            GameKind::CatchBall => GameConfig {
                escalation: Escalation::Speed {
                    every_points: 5,
                    speed_factor: 1.15,
                    size_step: 4.0,
                    max_speed: 400.0,
                    min_size: 26.0,
                },
                ..base
            },
            GameKind::FindNumber => GameConfig {
                stimulus: StimulusRule::NumberGrid,
                scoring: ScoringConfig {
                    rule: ScoringRule::DifficultyScaled {
                        base: 100,
                        grid_bonus: 20,
                        round_bonus: 5,
                    },
                    penalties: Penalties {
                        wrong_target: 50,
                        ..Penalties::none()
                    },
                    ..base.scoring
                },
                escalation: Escalation::Grid {
                    size_steps: vec![
                        Step {
                            from_round: 0,
                            value: 3,
                        },
                        Step {
                            from_round: 3,
                            value: 4,
                        },
                        Step {
                            from_round: 6,
                            value: 5,
                        },
                    ],
                    value_steps: vec![
                        Step {
                            from_round: 0,
                            value: 20,
                        },
                        Step {
                            from_round: 5,
                            value: 50,
                        },
                    ],
                },
                ..base
            },
            GameKind::FindColor => GameConfig {
                stimulus: StimulusRule::ColorChoice {
                    palette: palette(&SIX_COLORS),
                    options: 4,
                },
                scoring: ScoringConfig {
                    rule: ScoringRule::Fixed { points: 100 },
                    penalties: Penalties {
                        mode: PenaltyMode::Ledger,
                        wrong_target: 50,
                        ..Penalties::none()
                    },
                    ..base.scoring
                },
                advance: Advance::OnAnyAnswer,
                ..base
            },
            GameKind::ColorText => GameConfig {
                stimulus: StimulusRule::ColorWord {
                    palette: palette(&SIX_COLORS),
                    options: 4,
                },
                advance: Advance::OnAnyAnswer,
                ..base
            },
            GameKind::ColorCatch => GameConfig {
                stimulus: StimulusRule::Circles {
                    palette: palette(&SIX_COLORS),
                    size: 60.0,
                    lifetime_ms: 2500,
                },
                spawning: Spawning::Interval { every_ms: 1000 },
                scoring: ScoringConfig {
                    penalties: Penalties {
                        wrong_target: 1,
                        ..Penalties::none()
                    },
                    ..base.scoring
                },
                termination: Termination::Duration { ms: 30_000 },
                ..base
            },
            GameKind::ReflexTap => GameConfig {
                stimulus: StimulusRule::Shape {
                    shapes: vec![Shape::Circle, Shape::Square, Shape::Triangle],
                    size: 76.0,
                },
                spawning: Spawning::Delayed {
                    delay: DelayRange::new(700, 1400),
                },
                scoring: ScoringConfig {
                    rule: ScoringRule::LatencyInverse {
                        numerator: 800.0,
                        floor_ms: 80,
                        base: 2,
                    },
                    penalties: Penalties {
                        stray_tap: Some(7),
                        ..Penalties::none()
                    },
                    ..base.scoring
                },
                advance: Advance::OnAnyAnswer,
                termination: Termination::Rounds { count: 15 },
                ..base
            },
            GameKind::PatternMemory => GameConfig {
                stimulus: StimulusRule::Pattern {
                    pads: 4,
                    reveal_step_ms: 800,
                },
                scoring: ScoringConfig {
                    rule: ScoringRule::DifficultyScaled {
                        base: 1,
                        grid_bonus: 0,
                        round_bonus: 1,
                    },
                    award: AwardOn::RoundComplete,
                    ..base.scoring
                },
                flow: RoundFlow::Discrete { pause_ms: 1000 },
                termination: Termination::OneStrike { max_rounds: None },
                ..base
            },
        }
    }

    /// Reject rule sets that would corrupt scoring or stall a session
    pub fn validate(&self, kind: GameKind) -> Result<()> {
        let bad = |reason: &str| Err(Error::invalid(kind, reason));

        match &self.stimulus {
            StimulusRule::ColorSwatch { palette } if palette.is_empty() => {
                return bad("color swatch palette is empty")
            }
            StimulusRule::Circles {
                palette,
                size,
                lifetime_ms,
            } => {
                if palette.is_empty() {
                    return bad("circle palette is empty");
                }
                if *size <= 0.0 || *lifetime_ms == 0 {
                    return bad("circles need a positive size and lifetime");
                }
            }
            StimulusRule::ColorChoice { palette, options }
            | StimulusRule::ColorWord { palette, options } => {
                if *options < 2 || *options > palette.len() {
                    return bad("option count must be between 2 and the palette size");
                }
            }
            StimulusRule::Shape { shapes, size } => {
                if shapes.is_empty() || *size <= 0.0 {
                    return bad("shape stimulus needs shapes and a positive size");
                }
            }
            StimulusRule::Pattern {
                pads,
                reveal_step_ms,
            } => {
                if *pads < 2 || *reveal_step_ms == 0 {
                    return bad("pattern needs at least two pads and a reveal step");
                }
            }
            _ => {}
        }

        match self.spawning {
            Spawning::Delayed { delay } if delay.min_ms > delay.max_ms => {
                return bad("spawn delay min exceeds max")
            }
            Spawning::Interval { every_ms: 0 } => return bad("spawn interval is zero"),
            _ => {}
        }

        let p = &self.scoring.penalties;
        let magnitudes = [
            Some(p.wrong_target),
            p.stray_tap,
            p.early_tap,
            Some(p.miss),
        ];
        if magnitudes.iter().flatten().any(|m| *m < 0) {
            return bad("penalties are magnitudes and must not be negative");
        }

        match self.termination {
            Termination::Rounds { count: 0 } => return bad("round limit is zero"),
            Termination::Duration { ms: 0 } => return bad("duration limit is zero"),
            Termination::OneStrike {
                max_rounds: Some(0),
            } => return bad("round limit is zero"),
            _ => {}
        }

        if self.difficulty.ball_speed <= 0.0 || self.difficulty.ball_size <= 0.0 {
            return bad("ball speed and size must be positive");
        }

        if self.tiers.windows(2).any(|w| w[0] >= w[1]) {
            return bad("tier thresholds must be strictly ascending");
        }

        match &self.escalation {
            Escalation::None => {}
            Escalation::Grid {
                size_steps,
                value_steps,
            } => {
                let ascending = |steps: &[Step]| steps.windows(2).all(|w| w[0].from_round < w[1].from_round);
                if !ascending(size_steps) || !ascending(value_steps) {
                    return bad("escalation steps must be in ascending round order");
                }
                // Every round needs enough distinct values to fill the grid.
                let last_change = size_steps
                    .iter()
                    .chain(value_steps.iter())
                    .map(|s| s.from_round)
                    .max()
                    .unwrap_or(0);
                for round in 0..=last_change {
                    let d = crate::sequencer::difficulty_at(self, round, 0);
                    if d.grid_size == 0 {
                        return bad("grid size is zero");
                    }
                    match d.cell_count() {
                        None => return bad("grid size is too large"),
                        Some(cells) if cells > d.value_max => {
                            return bad("value range too small to fill the grid with unique numbers")
                        }
                        Some(_) => {}
                    }
                }
            }
            Escalation::Speed {
                every_points,
                speed_factor,
                max_speed,
                min_size,
                ..
            } => {
                if *every_points <= 0 || *speed_factor < 1.0 || *max_speed <= 0.0 || *min_size <= 0.0 {
                    return bad("speed escalation needs positive steps and bounds");
                }
            }
        }

        if matches!(self.stimulus, StimulusRule::NumberGrid)
            && matches!(self.escalation, Escalation::None)
        {
            let d = &self.difficulty;
            match d.cell_count() {
                None => return bad("grid size is too large"),
                Some(cells) if d.grid_size == 0 || cells > d.value_max => {
                    return bad("value range too small to fill the grid with unique numbers")
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

/// Shell settings plus every game's rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub countdown_secs: u32,
    pub games: BTreeMap<GameKind, GameConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            games: GameKind::ALL
                .into_iter()
                .map(|k| (k, GameConfig::builtin(k)))
                .collect(),
        }
    }
}

impl Config {
    /// Validated rules for `kind`. Missing or inconsistent rules are fatal.
    pub fn rules(&self, kind: GameKind) -> Result<&GameConfig> {
        let rules = self.games.get(&kind).ok_or(Error::MissingConfig(kind))?;
        rules.validate(kind)?;
        Ok(rules)
    }

    pub fn countdown_ms(&self) -> Millis {
        self.countdown_secs as Millis * 1000
    }
}

pub trait ConfigStore {
    fn load(&self) -> Result<Config>;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "reflex") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("reflex_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// A missing file means defaults; a broken one is an error.
    fn load(&self) -> Result<Config> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice::<Config>(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
