//! Branching scenario.
//!
//! Measures a two-way branch whose bias changes on a timer: first never
//! negative, then a coin flip, then progressively more predictable, and
//! finally always negative.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::SmallRng;

use super::{make_rng, scaled, Scenario};
use crate::config::HarnessConfig;
use crate::error::{ScenarioResult, ScheduleError};
use crate::policy::branch;
use crate::schedule::PhaseSchedule;
use crate::scheduler::SchedulerHandle;
use crate::state::{Chance, PhaseCell, Sink};

/// Per-thread context of the branching scenario.
pub struct Branching {
    chance: Arc<Chance>,
    sink: Arc<Sink>,
    rng: SmallRng,
    scheduler: SchedulerHandle,
}

impl Branching {
    /// Draw one outcome and take the branch on it. Returns the outcome.
    #[inline]
    pub fn step(&mut self) -> i32 {
        let outcome = branch::draw(&mut self.rng, self.chance.get());
        self.sink.add(branch::take_branch(outcome));
        outcome
    }
}

impl Scenario for Branching {
    const NAME: &'static str = "branching";

    type Value = f64;

    fn default_schedule() -> Result<PhaseSchedule<f64>, ScheduleError> {
        let secs = Duration::from_secs;
        PhaseSchedule::builder(0.0)
            .at_with_notice(secs(20), 0.5, "50%")
            .at_with_notice(secs(25), 0.4, "40%")
            .at_with_notice(secs(28), 0.3, "30%")
            .at_with_notice(secs(31), 0.2, "20%")
            .at_with_notice(secs(34), 0.1, "10%")
            .at_with_notice(secs(37), 0.05, "5%")
            .at_with_notice(secs(40), 0.01, "1%")
            .at_with_notice(secs(43), 0.0, "0%")
            .at_with_notice(secs(46), 1.0, "all negative")
            .build()
    }

    fn setup_with(config: &HarnessConfig, schedule: &PhaseSchedule<f64>) -> ScenarioResult<Self> {
        let schedule = scaled(config, schedule)?;
        let chance = Arc::new(Chance::default());
        let scheduler = schedule.arm(Self::NAME, chance.clone(), config.schedule.announce)?;

        Ok(Self {
            chance,
            sink: Arc::new(Sink::new()),
            rng: make_rng(config),
            scheduler,
        })
    }

    #[inline]
    fn measure(&mut self) {
        self.step();
    }

    fn sink(&self) -> &Arc<Sink> {
        &self.sink
    }

    fn control(&self) -> f64 {
        self.chance.load()
    }

    fn force(&self, value: f64) {
        self.chance.store(value);
    }

    fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}
