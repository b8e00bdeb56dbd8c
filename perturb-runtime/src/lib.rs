//! # Perturb Runtime Library
//!
//! Microbenchmark scenarios whose behaviour is perturbed on a timer while they
//! are being measured:
//!
//! - **Branching**: a branch whose bias shifts from unpredictable to fully
//!   predictable
//! - **N-morphic**: a call site that moves between one, two and five
//!   calculator implementations
//! - **Nullness**: an operation whose input turns absent for a few seconds
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        PERTURB RUNTIME                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐  stores  ┌──────────────┐  reads  ┌──────────┐ │
//! │  │  Scheduler   │ ───────▶ │ Phase/Chance │ ◀────── │ Scenario │ │
//! │  │(scheduler.rs)│          │  (state.rs)  │         │ measure()│ │
//! │  └──────────────┘          └──────────────┘         └──────────┘ │
//! │         ▲                                                │       │
//! │         │ arm                                  select    ▼       │
//! │  ┌──────────────┐                            ┌──────────────┐    │
//! │  │PhaseSchedule │                            │   Policies   │    │
//! │  │(schedule.rs) │                            │ (policy/*.rs)│    │
//! │  └──────────────┘                            └──────────────┘    │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A driver (the [`runner`], a criterion bench, or the `perturb` CLI) calls
//! [`Scenario::setup`] once and [`Scenario::measure`] repeatedly.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod policy;
pub mod runner;
pub mod scenario;
pub mod schedule;
pub mod scheduler;
pub mod state;

// Re-exports
pub use config::{ConfigError, HarnessConfig, HarnessConfigBuilder, LogLevel};
pub use error::{ScenarioError, ScenarioResult, ScheduleError};
pub use policy::{AbsentValue, Calculator, CalculatorKind, Calculators, DispatchMode, DispatchPolicy};
pub use runner::{run, run_kind, run_with, IterationReport, RunReport, ThreadReport};
pub use scenario::{Branching, NMorphic, Nullness, Scenario, ScenarioKind};
pub use schedule::{PhaseSchedule, PhaseScheduleBuilder, Transition};
pub use scheduler::{DelayScheduler, SchedulerHandle};
pub use state::{Chance, Phase, PhaseCell, Sink};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
