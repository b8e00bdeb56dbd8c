//! Error types shared across the harness.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or arming a phase schedule.
///
/// Every variant is fatal for the scenario being set up: an experiment whose
/// timeline cannot be armed would not reproduce the intended phases.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("transition {index} at {delay:?} does not come after the previous one at {previous:?}")]
    NonIncreasingDelay {
        index: usize,
        previous: Duration,
        delay: Duration,
    },

    #[error("time scale must be a positive finite number, got {0}")]
    InvalidScale(f64),

    #[error("transition {index} at {delay:?} overflows when scaled by {factor}")]
    OffsetOverflow {
        index: usize,
        delay: Duration,
        factor: f64,
    },

    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Errors raised while setting up or driving a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("unknown dispatch policy: {0}")]
    UnknownPolicy(String),

    #[error("unknown dispatch mode: {0}")]
    UnknownMode(String),

    #[error("failed to spawn measurement thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("measurement thread panicked")]
    WorkerPanicked,
}

/// Result type for scenario operations.
pub type ScenarioResult<T> = Result<T, ScenarioError>;
