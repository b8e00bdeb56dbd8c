//! Benchmark scenarios.
//!
//! A scenario is a per-thread context: a control cell shared with its own
//! scheduler worker, a result sink, a private random source, and whatever
//! targets its measured operation needs. [`Scenario::setup`] arms the phase
//! schedule; [`Scenario::measure`] is the operation a driver invokes
//! repeatedly.
//!
//! | Scenario | Control value | Measures |
//! |----------|---------------|----------|
//! | [`Branching`] | chance of a negative draw | branch misprediction |
//! | [`NMorphic`] | dispatch phase 0..=4 | call-site morphism |
//! | [`Nullness`] | nullness phase 0..=1 | check on an absent value |

pub mod branching;
pub mod nmorphic;
pub mod nullness;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::HarnessConfig;
use crate::error::{ScenarioError, ScenarioResult, ScheduleError};
use crate::schedule::PhaseSchedule;
use crate::scheduler::SchedulerHandle;
use crate::state::Sink;

pub use branching::Branching;
pub use nmorphic::NMorphic;
pub use nullness::Nullness;

/// A self-contained measurement scenario.
pub trait Scenario: Sized + Send {
    /// Short name, used for the scheduler thread and diagnostics.
    const NAME: &'static str;

    /// Type of the control value.
    type Value: Copy + PartialEq + fmt::Display + Send + Sync + 'static;

    /// The production timeline.
    fn default_schedule() -> Result<PhaseSchedule<Self::Value>, ScheduleError>;

    /// Arm the production timeline, scaled by the configured time scale.
    fn setup(config: &HarnessConfig) -> ScenarioResult<Self> {
        Self::setup_with(config, &Self::default_schedule()?)
    }

    /// Arm `schedule`, scaled by the configured time scale.
    fn setup_with(config: &HarnessConfig, schedule: &PhaseSchedule<Self::Value>) -> ScenarioResult<Self>;

    /// The measured operation.
    fn measure(&mut self);

    /// The result sink.
    fn sink(&self) -> &Arc<Sink>;

    /// The control value currently in force.
    fn control(&self) -> Self::Value;

    /// Overwrite the control value. Scheduled transitions still fire.
    fn force(&self, value: Self::Value);

    /// The scheduler armed at setup.
    fn scheduler(&self) -> &SchedulerHandle;
}

/// Random source for a scenario context.
pub(crate) fn make_rng(config: &HarnessConfig) -> SmallRng {
    match config.rng.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

/// Scale `schedule` by the configured time scale.
pub(crate) fn scaled<T>(
    config: &HarnessConfig,
    schedule: &PhaseSchedule<T>,
) -> Result<PhaseSchedule<T>, ScheduleError>
where
    T: Copy + fmt::Display + Send + Sync + 'static,
{
    schedule.scaled(config.schedule.time_scale)
}

/// The available scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioKind {
    /// [`Branching`].
    Branching,
    /// [`NMorphic`].
    NMorphic,
    /// [`Nullness`].
    Nullness,
}

impl ScenarioKind {
    /// Every scenario.
    pub const ALL: [ScenarioKind; 3] = [ScenarioKind::Branching, ScenarioKind::NMorphic, ScenarioKind::Nullness];

    /// Scenario name.
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioKind::Branching => Branching::NAME,
            ScenarioKind::NMorphic => NMorphic::NAME,
            ScenarioKind::Nullness => Nullness::NAME,
        }
    }

    /// One-line description.
    pub fn description(self) -> &'static str {
        match self {
            ScenarioKind::Branching => "cost of a branch whose bias shifts over time",
            ScenarioKind::NMorphic => "cost of mono-, bi- and megamorphic call sites",
            ScenarioKind::Nullness => "cost of checking a value that turns absent",
        }
    }

    /// The production timeline, rendered one transition per line and scaled
    /// by `time_scale`.
    pub fn describe_schedule(self, time_scale: f64) -> Result<String, ScheduleError> {
        Ok(match self {
            ScenarioKind::Branching => Branching::default_schedule()?.scaled(time_scale)?.to_string(),
            ScenarioKind::NMorphic => NMorphic::default_schedule()?.scaled(time_scale)?.to_string(),
            ScenarioKind::Nullness => Nullness::default_schedule()?.scaled(time_scale)?.to_string(),
        })
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKind {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ScenarioError::UnknownScenario(s.to_string()))
    }
}
