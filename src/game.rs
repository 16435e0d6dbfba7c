use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The eight mini-games. Each one is only a tag; its behaviour lives in
/// [`crate::config::GameConfig`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum GameKind {
    ColorChange,
    CatchBall,
    FindNumber,
    FindColor,
    ColorText,
    ColorCatch,
    ReflexTap,
    PatternMemory,
}

impl GameKind {
    pub const ALL: [GameKind; 8] = [
        GameKind::ColorChange,
        GameKind::CatchBall,
        GameKind::FindNumber,
        GameKind::FindColor,
        GameKind::ColorText,
        GameKind::ColorCatch,
        GameKind::ReflexTap,
        GameKind::PatternMemory,
    ];

    /// Parse the stable key used in storage and config files
    pub fn from_key(key: &str) -> Option<GameKind> {
        Self::ALL.into_iter().find(|k| k.to_string() == key)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GameKind::ColorChange => "Color Change",
            GameKind::CatchBall => "Catch the Ball",
            GameKind::FindNumber => "Find the Number",
            GameKind::FindColor => "Find the Color",
            GameKind::ColorText => "Color Text",
            GameKind::ColorCatch => "Color Catch",
            GameKind::ReflexTap => "Reflex Tap",
            GameKind::PatternMemory => "Pattern Memory",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            GameKind::ColorChange => "Tap when the color changes",
            GameKind::CatchBall => "Catch the bouncing ball",
            GameKind::FindNumber => "Tap the correct number in the grid",
            GameKind::FindColor => "Tap the name of the color shown",
            GameKind::ColorText => "Tap the word describing the text color",
            GameKind::ColorCatch => "Tap circles of a specific color",
            GameKind::ReflexTap => "Tap as quickly as possible",
            GameKind::PatternMemory => "Repeat the shown sequence",
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            GameKind::ColorChange => {
                "Watch the screen carefully and tap as soon as the color changes. Tapping early costs points."
            }
            GameKind::CatchBall => "Catch the ball before it gets away. It speeds up as you score.",
            GameKind::FindNumber => {
                "Quickly find and tap the specified number among the grid of numbers."
            }
            GameKind::FindColor => "Tap the name that matches the color shown at the top.",
            GameKind::ColorText => {
                "Tap the word that describes the color of the text, not the word itself."
            }
            GameKind::ColorCatch => "Tap only the circles of the specified color as they appear.",
            GameKind::ReflexTap => "Tap the shape as soon as it appears. Missing costs points.",
            GameKind::PatternMemory => {
                "Watch the sequence of pads, then repeat it in the same order. One mistake ends the game."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_use_camel_case() {
        assert_eq!(GameKind::ColorChange.to_string(), "colorChange");
        assert_eq!(
            GameKind::from_key("patternMemory"),
            Some(GameKind::PatternMemory)
        );
        assert_eq!(GameKind::from_key("tetris"), None);
    }

    #[test]
    fn serde_matches_display() {
        for kind in GameKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn every_game_has_catalog_text() {
        for kind in GameKind::ALL {
            assert!(!kind.name().is_empty());
            assert!(!kind.description().is_empty());
            assert!(!kind.instructions().is_empty());
        }
    }
}
