use thiserror::Error;

use crate::game::GameKind;

/// Errors that surface to callers. Per-response problems never end up here;
/// they are folded into score and penalty counters instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no rules configured for game `{0}`")]
    MissingConfig(GameKind),

    #[error("invalid rules for game `{kind}`: {reason}")]
    InvalidConfig { kind: GameKind, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid(kind: GameKind, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            kind,
            reason: reason.into(),
        }
    }
}
