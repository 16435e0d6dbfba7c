// Library surface for the binary and for headless/integration tests.
pub mod app;
pub mod app_dirs;
pub mod capture;
pub mod clock;
pub mod config;
pub mod daily;
pub mod engine;
pub mod error;
pub mod game;
pub mod input;
pub mod leaderboard;
pub mod results;
pub mod runtime;
pub mod scheduler;
pub mod scoring;
pub mod sequencer;
pub mod session;
pub mod share;
pub mod stimulus;
pub mod store;
pub mod timers;
pub mod ui;
pub mod util;

pub use error::{Error, Result};
