//! Harness Configuration
//!
//! Configuration can be set programmatically or loaded from environment variables.
//!
//! # Environment Variables
//!
//! All environment variables use the `PERTURB_` prefix:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PERTURB_TIME_SCALE` | Multiplier applied to every schedule offset | 1.0 |
//! | `PERTURB_ANNOUNCE` | Log phase transitions ("true"/"false") | true |
//! | `PERTURB_SEED` | Seed for per-context random sources | entropy |
//! | `PERTURB_ITERATIONS` | Number of measured iterations | 100 |
//! | `PERTURB_WARMUP_ITERATIONS` | Number of warmup iterations | 0 |
//! | `PERTURB_ITERATION_MS` | Length of one iteration in milliseconds | 1000 |
//! | `PERTURB_THREADS` | Number of measurement threads | 1 |
//! | `PERTURB_LOG_LEVEL` | Log level (off/error/warn/info/debug/trace) | info |
//!
//! # Example
//!
//! ```rust,ignore
//! use perturb_runtime::config::HarnessConfig;
//!
//! // Load from environment with defaults
//! let config = HarnessConfig::from_env();
//!
//! // Or use the builder pattern
//! let config = HarnessConfig::builder()
//!     .time_scale(0.01)
//!     .seed(Some(42))
//!     .build()?;
//! ```

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::warn;

use crate::policy::dispatch::{DispatchMode, DispatchPolicy};

/// Log level for harness diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// No logging.
    Off,
    /// Error messages only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Informational messages (default). Phase transitions are logged here.
    #[default]
    Info,
    /// Debug messages.
    Debug,
    /// Trace-level messages.
    Trace,
}

impl LogLevel {
    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "none" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// The equivalent `tracing` filter.
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Phase schedule configuration.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Multiplier applied to every transition offset.
    /// Default: 1.0 (production timeline).
    pub time_scale: f64,

    /// Emit a notice whenever a transition fires.
    /// Default: true.
    pub announce: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            announce: true,
        }
    }
}

/// Random source configuration.
#[derive(Debug, Clone, Default)]
pub struct RngConfig {
    /// Seed for the per-context random sources.
    /// `None` seeds from OS entropy (default).
    pub seed: Option<u64>,
}

/// Measurement loop configuration, used by the iteration runner.
#[derive(Debug, Clone)]
pub struct MeasurementConfig {
    /// Number of measured iterations.
    /// Default: 100.
    pub iterations: usize,

    /// Number of unreported warmup iterations run first.
    /// Default: 0.
    pub warmup_iterations: usize,

    /// Wall-clock length of one iteration.
    /// Default: 1 second.
    pub iteration_time: Duration,

    /// Number of measurement threads, each with its own scenario context.
    /// Default: 1.
    pub threads: usize,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            warmup_iterations: 0,
            iteration_time: Duration::from_secs(1),
            threads: 1,
        }
    }
}

/// Dispatch configuration for the n-morphic scenario.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchConfig {
    /// Pin a single policy instead of following the phase.
    /// Default: None (policy follows the phase).
    pub policy: Option<DispatchPolicy>,

    /// How the selected target is invoked.
    /// Default: virtual dispatch.
    pub mode: DispatchMode,
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Log level.
    /// Default: Info.
    pub level: LogLevel,
}

/// Complete harness configuration.
///
/// Use `HarnessConfig::default()` for the production timeline, or
/// `HarnessConfig::from_env()` to load from environment variables.
#[derive(Debug, Clone, Default)]
pub struct HarnessConfig {
    /// Phase schedule configuration.
    pub schedule: ScheduleConfig,

    /// Random source configuration.
    pub rng: RngConfig,

    /// Measurement loop configuration.
    pub measurement: MeasurementConfig,

    /// Dispatch configuration.
    pub dispatch: DispatchConfig,

    /// Logging configuration.
    pub log: LogConfig,
}

impl HarnessConfig {
    /// Create a new builder for HarnessConfig.
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// Variables that are not set use default values. Invalid values are
    /// logged as warnings and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_lookup(|name| env::var(name).ok(), |err| warn!("{}", err));
        config
    }

    /// Load configuration from environment variables, failing on the first
    /// value that does not parse or does not validate.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::try_from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn try_from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut first_error = None;
        config.apply_lookup(lookup, |err| {
            if first_error.is_none() {
                first_error = Some(err);
            }
        });
        match first_error {
            Some(err) => Err(err),
            None => {
                config.validate()?;
                Ok(config)
            }
        }
    }

    fn apply_lookup<F, E>(&mut self, lookup: F, mut on_error: E)
    where
        F: Fn(&str) -> Option<String>,
        E: FnMut(ConfigError),
    {
        let parse = |var: &str| -> Option<String> { lookup(var).map(|s| s.trim().to_string()) };

        if let Some(raw) = parse("PERTURB_TIME_SCALE") {
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() && v > 0.0 => self.schedule.time_scale = v,
                _ => on_error(ConfigError::env("PERTURB_TIME_SCALE", "expected a positive number")),
            }
        }

        if let Some(raw) = parse("PERTURB_ANNOUNCE") {
            match parse_bool(&raw) {
                Some(v) => self.schedule.announce = v,
                None => on_error(ConfigError::env("PERTURB_ANNOUNCE", "expected true or false")),
            }
        }

        if let Some(raw) = parse("PERTURB_SEED") {
            match raw.parse::<u64>() {
                Ok(v) => self.rng.seed = Some(v),
                Err(e) => on_error(ConfigError::env("PERTURB_SEED", e.to_string())),
            }
        }

        if let Some(raw) = parse("PERTURB_ITERATIONS") {
            match raw.parse::<usize>() {
                Ok(v) if v > 0 => self.measurement.iterations = v,
                _ => on_error(ConfigError::env("PERTURB_ITERATIONS", "expected a positive integer")),
            }
        }

        if let Some(raw) = parse("PERTURB_WARMUP_ITERATIONS") {
            match raw.parse::<usize>() {
                Ok(v) => self.measurement.warmup_iterations = v,
                Err(e) => on_error(ConfigError::env("PERTURB_WARMUP_ITERATIONS", e.to_string())),
            }
        }

        if let Some(raw) = parse("PERTURB_ITERATION_MS") {
            match raw.parse::<u64>() {
                Ok(v) if v > 0 => self.measurement.iteration_time = Duration::from_millis(v),
                _ => on_error(ConfigError::env("PERTURB_ITERATION_MS", "expected a positive integer")),
            }
        }

        if let Some(raw) = parse("PERTURB_THREADS") {
            match raw.parse::<usize>() {
                Ok(v) if v > 0 => self.measurement.threads = v,
                _ => on_error(ConfigError::env("PERTURB_THREADS", "expected a positive integer")),
            }
        }

        if let Some(raw) = parse("PERTURB_LOG_LEVEL") {
            match LogLevel::parse(&raw) {
                Some(level) => self.log.level = level,
                None => on_error(ConfigError::env("PERTURB_LOG_LEVEL", format!("unknown level '{}'", raw))),
            }
        }
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.schedule.time_scale.is_finite() && self.schedule.time_scale > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "schedule.time_scale".into(),
                message: "must be a positive finite number".into(),
            });
        }

        if self.measurement.iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "measurement.iterations".into(),
                message: "must be at least 1".into(),
            });
        }

        if self.measurement.iteration_time.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "measurement.iteration_time".into(),
                message: "must be non-zero".into(),
            });
        }

        if self.measurement.threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "measurement.threads".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("invalid configuration for '{field}': {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
    },
    /// Environment variable parse error.
    #[error("failed to parse environment variable '{var}': {message}")]
    EnvParseError {
        /// Variable name.
        var: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    fn env(var: &str, message: impl Into<String>) -> Self {
        ConfigError::EnvParseError {
            var: var.to_string(),
            message: message.into(),
        }
    }
}

/// Builder for HarnessConfig.
#[derive(Debug, Clone, Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Set the schedule time scale.
    pub fn time_scale(mut self, scale: f64) -> Self {
        self.config.schedule.time_scale = scale;
        self
    }

    /// Enable or disable transition notices.
    pub fn announce(mut self, enabled: bool) -> Self {
        self.config.schedule.announce = enabled;
        self
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.config.rng.seed = seed;
        self
    }

    /// Set the number of measured iterations.
    pub fn iterations(mut self, n: usize) -> Self {
        self.config.measurement.iterations = n;
        self
    }

    /// Set the number of warmup iterations.
    pub fn warmup_iterations(mut self, n: usize) -> Self {
        self.config.measurement.warmup_iterations = n;
        self
    }

    /// Set the length of one iteration.
    pub fn iteration_time(mut self, time: Duration) -> Self {
        self.config.measurement.iteration_time = time;
        self
    }

    /// Set the number of measurement threads.
    pub fn threads(mut self, n: usize) -> Self {
        self.config.measurement.threads = n;
        self
    }

    /// Pin the n-morphic dispatch policy.
    pub fn dispatch_policy(mut self, policy: Option<DispatchPolicy>) -> Self {
        self.config.dispatch.policy = policy;
        self
    }

    /// Set the n-morphic dispatch mode.
    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.config.dispatch.mode = mode;
        self
    }

    /// Set the log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log.level = level;
        self
    }

    /// Build the configuration.
    ///
    /// This validates the configuration and returns an error if invalid.
    pub fn build(self) -> Result<HarnessConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration without validation.
    pub fn build_unchecked(self) -> HarnessConfig {
        self.config
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
