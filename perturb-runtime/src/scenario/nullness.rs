//! Nullness scenario.
//!
//! The measured operation folds a case-converted string into the sink. For a
//! few seconds of the timeline the string is absent; the resulting error is
//! discarded at the call site, so only the cost of the check is observed.

use std::sync::Arc;
use std::time::Duration;

use super::{scaled, Scenario};
use crate::config::HarnessConfig;
use crate::error::{ScenarioResult, ScheduleError};
use crate::policy::nullable::{self, AbsentValue};
use crate::schedule::PhaseSchedule;
use crate::scheduler::SchedulerHandle;
use crate::state::{Phase, PhaseCell, Sink};

/// Per-thread context of the nullness scenario.
pub struct Nullness {
    phase: Arc<Phase>,
    sink: Arc<Sink>,
    scheduler: SchedulerHandle,
}

impl Nullness {
    /// Fetch the value for the current phase, convert it, and fold its hash
    /// into the sink. An absent value leaves the sink untouched.
    #[inline]
    pub fn step(&mut self) -> Result<i32, AbsentValue> {
        let value = nullable::value_for(self.phase.get());
        let hash = nullable::string_hash(&nullable::safe_upper(value)?);
        self.sink.add(hash as i64);
        Ok(hash)
    }
}

impl Scenario for Nullness {
    const NAME: &'static str = "nullness";

    type Value = i32;

    fn default_schedule() -> Result<PhaseSchedule<i32>, ScheduleError> {
        PhaseSchedule::builder(0)
            .at_with_notice(Duration::from_secs(25), 1, "deoptimize: absent")
            .at_with_notice(Duration::from_secs(30), 0, "deoptimize: present")
            .build()
    }

    fn setup_with(config: &HarnessConfig, schedule: &PhaseSchedule<i32>) -> ScenarioResult<Self> {
        let schedule = scaled(config, schedule)?;
        let phase = Arc::new(Phase::default());
        let scheduler = schedule.arm(Self::NAME, phase.clone(), config.schedule.announce)?;

        Ok(Self {
            phase,
            sink: Arc::new(Sink::new()),
            scheduler,
        })
    }

    #[inline]
    fn measure(&mut self) {
        // An absent value is the condition under measurement.
        let _ = self.step();
    }

    fn sink(&self) -> &Arc<Sink> {
        &self.sink
    }

    fn control(&self) -> i32 {
        self.phase.load()
    }

    fn force(&self, value: i32) {
        self.phase.store(value);
    }

    fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}
