use std::f64::consts::PI;

use rand::seq::{index, SliceRandom};
use rand::Rng;

use crate::clock::Millis;
use crate::config::{GameConfig, Spawning, StimulusRule};
use crate::session::GameSession;
use crate::stimulus::{Arena, Expiry, Point, Shape, Stimulus, StimulusId, StimulusKind, Velocity};

/// Either a stimulus to show now, or how long to wait before asking again
#[derive(Debug, Clone, PartialEq)]
pub enum Scheduled {
    Delay(Millis),
    Stimulus(Stimulus),
}

/// Color circles must match, for games that hunt one color
pub fn pick_target<R: Rng>(rules: &GameConfig, rng: &mut R) -> Option<String> {
    match &rules.stimulus {
        StimulusRule::Circles { palette, .. } => palette.choose(rng).cloned(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StimulusScheduler {
    arena: Arena,
}

impl StimulusScheduler {
    pub fn new(arena: Arena) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> Arena {
        self.arena
    }

    /// Decide what comes next. Games with a spawn delay get a
    /// [`Scheduled::Delay`] until the caller reports the delay as served.
    pub fn schedule_next<R: Rng>(
        &self,
        session: &GameSession,
        rules: &GameConfig,
        now: Millis,
        delay_served: bool,
        rng: &mut R,
    ) -> Scheduled {
        if let Spawning::Delayed { delay } = rules.spawning {
            if !delay_served {
                return Scheduled::Delay(rng.gen_range(delay.min_ms..=delay.max_ms));
            }
        }
        Scheduled::Stimulus(self.spawn(session, rules, now, rng))
    }

    fn position<R: Rng>(&self, size: f64, rng: &mut R) -> Point {
        let (x0, x1) = Arena::axis_span(self.arena.width, size);
        let (y0, y1) = Arena::axis_span(self.arena.height, size);
        Point::new(rng.gen_range(x0..=x1), rng.gen_range(y0..=y1))
    }

    /// Enter from a random edge, heading inward at `speed`
    fn launch<R: Rng>(&self, size: f64, speed: f64, rng: &mut R) -> (Point, Velocity) {
        let (x0, x1) = Arena::axis_span(self.arena.width, size);
        let (y0, y1) = Arena::axis_span(self.arena.height, size);
        let angle = rng.gen_range(PI / 6.0..=PI / 3.0);
        let along = speed * angle.cos() * if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let inward = speed * angle.sin();

        match rng.gen_range(0..4) {
            0 => (
                Point::new(rng.gen_range(x0..=x1), y0),
                Velocity { dx: along, dy: inward },
            ),
            1 => (
                Point::new(rng.gen_range(x0..=x1), y1),
                Velocity { dx: along, dy: -inward },
            ),
            2 => (
                Point::new(x0, rng.gen_range(y0..=y1)),
                Velocity { dx: inward, dy: along },
            ),
            _ => (
                Point::new(x1, rng.gen_range(y0..=y1)),
                Velocity { dx: -inward, dy: along },
            ),
        }
    }

    /// Draw `count` distinct palette entries
    fn distinct<R: Rng>(palette: &[String], count: usize, rng: &mut R) -> Vec<String> {
        index::sample(rng, palette.len(), count.min(palette.len()))
            .into_iter()
            .map(|i| palette[i].clone())
            .collect()
    }

    pub fn spawn<R: Rng>(
        &self,
        session: &GameSession,
        rules: &GameConfig,
        now: Millis,
        rng: &mut R,
    ) -> Stimulus {
        let id = StimulusId(session.next_id);
        let difficulty = session.difficulty;
        let mut spawned_at = now;
        let mut expiry = Expiry::OnInteraction;

        let kind = match &rules.stimulus {
            StimulusRule::ColorSwatch { palette } => StimulusKind::ColorSwatch {
                color: palette.choose(rng).cloned().unwrap_or_default(),
            },
            StimulusRule::Ball => {
                let size = difficulty.ball_size;
                let (position, velocity) = self.launch(size, difficulty.ball_speed, rng);
                StimulusKind::Ball {
                    position,
                    velocity,
                    size,
                }
            }
            StimulusRule::Circles {
                palette,
                size,
                lifetime_ms,
            } => {
                let color = palette.choose(rng).cloned().unwrap_or_default();
                expiry = Expiry::After(*lifetime_ms);
                StimulusKind::Circle {
                    position: self.position(*size, rng),
                    is_target: session.target_color.as_deref() == Some(color.as_str()),
                    color,
                    size: *size,
                }
            }
            StimulusRule::NumberGrid => {
                let cells_wanted = difficulty.cell_count().map_or(usize::MAX, |c| c as usize);
                let range = difficulty.value_max as usize;
                let cells: Vec<u32> = index::sample(rng, range, cells_wanted.min(range))
                    .into_iter()
                    .map(|v| v as u32 + 1)
                    .collect();
                let target = cells.choose(rng).copied().unwrap_or(1);
                StimulusKind::NumberGrid {
                    size: difficulty.grid_size,
                    cells,
                    target,
                }
            }
            StimulusRule::ColorChoice { palette, options } => {
                let options = Self::distinct(palette, *options, rng);
                StimulusKind::ColorChoice {
                    target: options.choose(rng).cloned().unwrap_or_default(),
                    options,
                }
            }
            StimulusRule::ColorWord { palette, options } => {
                let word = palette.choose(rng).cloned().unwrap_or_default();
                let inks: Vec<&String> = palette.iter().filter(|c| **c != word).collect();
                let ink = inks
                    .choose(rng)
                    .map(|c| (*c).clone())
                    .unwrap_or_else(|| word.clone());
                let others: Vec<String> = palette.iter().filter(|c| **c != ink).cloned().collect();
                let mut choices = Self::distinct(&others, options.saturating_sub(1), rng);
                choices.push(ink.clone());
                choices.shuffle(rng);
                StimulusKind::ColorWord {
                    word,
                    ink,
                    options: choices,
                }
            }
            StimulusRule::Shape { shapes, size } => StimulusKind::Shape {
                shape: shapes.choose(rng).copied().unwrap_or(Shape::Circle),
                position: self.position(*size, rng),
                size: *size,
            },
            StimulusRule::Pattern {
                pads,
                reveal_step_ms,
            } => {
                let level = session.round as usize + 1;
                let mut sequence: Vec<u32> =
                    session.pattern.iter().copied().take(level - 1).collect();
                while sequence.len() < level {
                    sequence.push(rng.gen_range(0..*pads));
                }
                // One step per pad, then one dark step before input opens.
                spawned_at =
                    now.saturating_add((sequence.len() as Millis + 1) * reveal_step_ms);
                StimulusKind::PatternStep { sequence, index: 0 }
            }
        };

        Stimulus {
            id,
            kind,
            spawned_at,
            expiry,
        }
    }
}
