use serde::{Deserialize, Serialize};

use crate::clock::{elapsed_between, Millis};
use crate::config::GameConfig;
use crate::stimulus::{Stimulus, StimulusId, StimulusKind};

/// Classification of one interaction (or of a target left untouched)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Outcome {
    Hit,
    /// A target expired before anyone touched it.
    Miss,
    WrongTarget,
    /// Tapped while nothing was up.
    EarlyTap,
    /// Pressed the wrong pad while repeating a pattern.
    OutOfPattern,
}

impl Outcome {
    pub fn is_correct(&self) -> bool {
        matches!(self, Outcome::Hit)
    }

    /// Outcomes caused by a tap the player should not have made
    pub fn is_penalty(&self) -> bool {
        matches!(
            self,
            Outcome::WrongTarget | Outcome::EarlyTap | Outcome::OutOfPattern
        )
    }
}

/// One immutable entry of the session log
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub at: Millis,
    pub stimulus: Option<StimulusId>,
    pub outcome: Outcome,
    /// Only present for hits.
    pub latency_ms: Option<Millis>,
    /// The tap landed on the background rather than on any element.
    pub stray: bool,
}

/// Turns raw interactions into classified [`Response`]s
#[derive(Debug, Clone, Copy)]
pub struct ResponseCapture {
    latency_floor_ms: Millis,
}

impl ResponseCapture {
    pub fn new(latency_floor_ms: Millis) -> Self {
        Self { latency_floor_ms }
    }

    pub fn from_rules(rules: &GameConfig) -> Self {
        Self::new(rules.latency_floor_ms)
    }

    pub fn capture(&self, stimulus: Option<&Stimulus>, at: Millis, target_hit: bool) -> Response {
        match stimulus {
            None => Response {
                at,
                stimulus: None,
                outcome: Outcome::EarlyTap,
                latency_ms: None,
                stray: false,
            },
            Some(s) if !target_hit => Response {
                at,
                stimulus: Some(s.id),
                outcome: match s.kind {
                    StimulusKind::PatternStep { .. } => Outcome::OutOfPattern,
                    _ => Outcome::WrongTarget,
                },
                latency_ms: None,
                stray: false,
            },
            Some(s) => Response {
                at,
                stimulus: Some(s.id),
                outcome: Outcome::Hit,
                latency_ms: Some(
                    elapsed_between(s.spawned_at, at).max(self.latency_floor_ms),
                ),
                stray: false,
            },
        }
    }

    /// A tap on the background while `stimulus` was waiting to be hit
    pub fn capture_stray(&self, stimulus: &Stimulus, at: Millis) -> Response {
        Response {
            stray: true,
            ..self.capture(Some(stimulus), at, false)
        }
    }

    pub fn miss(&self, stimulus: &Stimulus, at: Millis) -> Response {
        Response {
            at,
            stimulus: Some(stimulus.id),
            outcome: Outcome::Miss,
            latency_ms: None,
            stray: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::Expiry;

    fn swatch(spawned_at: Millis) -> Stimulus {
        Stimulus {
            id: StimulusId(7),
            kind: StimulusKind::ColorSwatch {
                color: "Red".into(),
            },
            spawned_at,
            expiry: Expiry::OnInteraction,
        }
    }

    #[test]
    fn no_stimulus_is_an_early_tap() {
        let r = ResponseCapture::new(80).capture(None, 500, true);
        assert_eq!(r.outcome, Outcome::EarlyTap);
        assert_eq!(r.latency_ms, None);
        assert!(r.outcome.is_penalty());
    }

    #[test]
    fn hit_latency_is_measured_from_spawn() {
        let r = ResponseCapture::new(80).capture(Some(&swatch(1000)), 1250, true);
        assert_eq!(r.outcome, Outcome::Hit);
        assert_eq!(r.latency_ms, Some(250));
        assert_eq!(r.stimulus, Some(StimulusId(7)));
    }

    #[test]
    fn fast_hits_are_clamped_to_the_floor() {
        let r = ResponseCapture::new(80).capture(Some(&swatch(0)), 50, true);
        assert_eq!(r.latency_ms, Some(80));
    }

    #[test]
    fn wrong_pad_is_out_of_pattern() {
        let step = Stimulus {
            id: StimulusId(1),
            kind: StimulusKind::PatternStep {
                sequence: vec![0, 2],
                index: 0,
            },
            spawned_at: 0,
            expiry: Expiry::OnInteraction,
        };
        let r = ResponseCapture::new(80).capture(Some(&step), 300, false);
        assert_eq!(r.outcome, Outcome::OutOfPattern);
    }

    #[test]
    fn stray_taps_are_flagged() {
        let r = ResponseCapture::new(80).capture_stray(&swatch(0), 10);
        assert_eq!(r.outcome, Outcome::WrongTarget);
        assert!(r.stray);
    }

    #[test]
    fn miss_is_not_a_penalty_click() {
        let r = ResponseCapture::new(80).miss(&swatch(0), 2500);
        assert_eq!(r.outcome, Outcome::Miss);
        assert!(!r.outcome.is_penalty());
        assert!(!r.outcome.is_correct());
    }
}
