//! Stimuli: what the player reacts to, where it sits, and how long it lives.

use serde::{Deserialize, Serialize};

use crate::clock::Millis;

/// Identifier unique within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StimulusId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Velocity in arena units per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: f64,
    pub dy: f64,
}

/// The playfield stimuli are placed in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
}

impl Arena {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Range a centre coordinate may take on one axis so that a stimulus of
    /// `size` is never clipped. Collapses to the middle when it cannot fit.
    pub fn axis_span(extent: f64, size: f64) -> (f64, f64) {
        let half = size / 2.0;
        if extent <= size {
            let mid = extent.max(0.0) / 2.0;
            (mid, mid)
        } else {
            (half, extent - half)
        }
    }

    pub fn contains(&self, centre: Point, size: f64) -> bool {
        let (x0, x1) = Self::axis_span(self.width, size);
        let (y0, y1) = Self::axis_span(self.height, size);
        centre.x >= x0 && centre.x <= x1 && centre.y >= y0 && centre.y <= y1
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase")]
pub enum Shape {
    Circle,
    Square,
    Triangle,
}

/// How a stimulus leaves the screen when nobody touches it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiry {
    OnInteraction,
    After(Millis),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StimulusKind {
    ColorSwatch {
        color: String,
    },
    Ball {
        position: Point,
        velocity: Velocity,
        size: f64,
    },
    Circle {
        position: Point,
        color: String,
        size: f64,
        is_target: bool,
    },
    NumberGrid {
        size: u32,
        cells: Vec<u32>,
        target: u32,
    },
    ColorChoice {
        target: String,
        options: Vec<String>,
    },
    ColorWord {
        word: String,
        ink: String,
        options: Vec<String>,
    },
    Shape {
        shape: Shape,
        position: Point,
        size: f64,
    },
    /// One step of a pattern: `sequence[index]` is the pad that must be hit next.
    PatternStep {
        sequence: Vec<u32>,
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    pub id: StimulusId,
    pub kind: StimulusKind,
    /// When the stimulus became actionable; latencies are measured from here.
    pub spawned_at: Millis,
    pub expiry: Expiry,
}

impl Stimulus {
    pub fn expires_at(&self) -> Option<Millis> {
        match self.expiry {
            Expiry::OnInteraction => None,
            Expiry::After(ms) => Some(self.spawned_at.saturating_add(ms)),
        }
    }

    /// Stimuli that fill the whole arena treat any tap as aimed at them
    pub fn covers_arena(&self) -> bool {
        matches!(self.kind, StimulusKind::ColorSwatch { .. })
    }

    /// Whether hitting this stimulus is the right thing to do
    pub fn is_target(&self) -> bool {
        match &self.kind {
            StimulusKind::Circle { is_target, .. } => *is_target,
            _ => true,
        }
    }

    /// Options picked by index. Empty for stimuli that are tapped directly.
    pub fn options(&self) -> Vec<String> {
        match &self.kind {
            StimulusKind::NumberGrid { cells, .. } => cells.iter().map(|c| c.to_string()).collect(),
            StimulusKind::ColorChoice { options, .. } | StimulusKind::ColorWord { options, .. } => {
                options.clone()
            }
            _ => Vec::new(),
        }
    }

    /// Judge a picked option. `None` when this stimulus has no options.
    pub fn accepts_option(&self, index: usize) -> Option<bool> {
        match &self.kind {
            StimulusKind::NumberGrid { cells, target, .. } => {
                Some(cells.get(index).is_some_and(|v| v == target))
            }
            StimulusKind::ColorChoice { target, options } => {
                Some(options.get(index).is_some_and(|o| o == target))
            }
            StimulusKind::ColorWord { ink, options, .. } => {
                Some(options.get(index).is_some_and(|o| o == ink))
            }
            StimulusKind::PatternStep { sequence, index: step } => {
                Some(sequence.get(*step).is_some_and(|pad| *pad as usize == index))
            }
            _ => None,
        }
    }

    /// Centre and size for stimuli that occupy a spot in the arena
    pub fn footprint(&self) -> Option<(Point, f64)> {
        match &self.kind {
            StimulusKind::Ball { position, size, .. }
            | StimulusKind::Circle { position, size, .. }
            | StimulusKind::Shape { position, size, .. } => Some((*position, *size)),
            _ => None,
        }
    }

    /// Point-in-box hit test against the stimulus footprint
    pub fn hit_test(&self, at: Point) -> bool {
        if self.covers_arena() {
            return true;
        }
        match self.footprint() {
            Some((centre, size)) => {
                let half = size / 2.0;
                (at.x - centre.x).abs() <= half && (at.y - centre.y).abs() <= half
            }
            None => false,
        }
    }

    /// Advance a moving stimulus by `dt_ms`, bouncing off the arena walls
    pub fn advance(&mut self, dt_ms: Millis, arena: Arena) {
        if let StimulusKind::Ball {
            position,
            velocity,
            size,
        } = &mut self.kind
        {
            let dt = dt_ms as f64 / 1000.0;
            let (x0, x1) = Arena::axis_span(arena.width, *size);
            let (y0, y1) = Arena::axis_span(arena.height, *size);

            position.x += velocity.dx * dt;
            position.y += velocity.dy * dt;

            if position.x <= x0 {
                position.x = x0;
                velocity.dx = velocity.dx.abs();
            } else if position.x >= x1 {
                position.x = x1;
                velocity.dx = -velocity.dx.abs();
            }
            if position.y <= y0 {
                position.y = y0;
                velocity.dy = velocity.dy.abs();
            } else if position.y >= y1 {
                position.y = y1;
                velocity.dy = -velocity.dy.abs();
            }
        }
    }
}
