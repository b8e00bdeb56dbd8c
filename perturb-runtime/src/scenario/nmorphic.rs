//! N-morphic dispatch scenario.
//!
//! The measured call site invokes a calculator chosen by the policy of the
//! current phase. Over the production timeline the call site goes from
//! monomorphic, to technically polymorphic but never observed so, to
//! bimorphic, to megamorphic, and back to monomorphic:
//!
//! ```text
//! phase  0 ──25s──▶ 1 ──35s──▶ 2 ──160s──▶ 3 ──180s──▶ 4
//!       mono   mono-rare   even-two    even-five    mono
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::SmallRng;

use super::{make_rng, scaled, Scenario};
use crate::config::HarnessConfig;
use crate::error::{ScenarioResult, ScheduleError};
use crate::policy::dispatch::{CalculatorKind, Calculators, DispatchMode, DispatchPolicy};
use crate::schedule::PhaseSchedule;
use crate::scheduler::SchedulerHandle;
use crate::state::{Phase, PhaseCell, Sink};

/// First operand passed to every calculator.
pub const START: i32 = 1312;
/// Second operand passed to every calculator.
pub const STEP: i32 = 2435;

/// Per-thread context of the n-morphic scenario.
pub struct NMorphic {
    phase: Arc<Phase>,
    sink: Arc<Sink>,
    rng: SmallRng,
    calculators: Calculators,
    pinned: Option<DispatchPolicy>,
    mode: DispatchMode,
    scheduler: SchedulerHandle,
}

impl NMorphic {
    /// The policy the next measured invocation will use.
    pub fn policy(&self) -> DispatchPolicy {
        self.pinned
            .unwrap_or_else(|| DispatchPolicy::for_phase(self.phase.get()))
    }

    /// The dispatch mode in use.
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Select a calculator, call it, and fold both the draw and the result
    /// into the sink. Returns the selected calculator.
    #[inline]
    pub fn step(&mut self) -> CalculatorKind {
        let kind = self.policy().select(&mut self.rng, &self.sink);
        let result = self.mode.invoke(&self.calculators, kind, START, STEP);
        self.sink.add(result as i64);
        kind
    }
}

impl Scenario for NMorphic {
    const NAME: &'static str = "n-morphic";

    type Value = i32;

    fn default_schedule() -> Result<PhaseSchedule<i32>, ScheduleError> {
        let secs = Duration::from_secs;
        PhaseSchedule::builder(0)
            .at_with_notice(secs(25), 1, "deoptimize: mono-rare")
            .at_with_notice(secs(35), 2, "deoptimize: even-two")
            .at_with_notice(secs(160), 3, "deoptimize: even-five")
            .at_with_notice(secs(180), 4, "deoptimize: mono")
            .build()
    }

    fn setup_with(config: &HarnessConfig, schedule: &PhaseSchedule<i32>) -> ScenarioResult<Self> {
        let schedule = scaled(config, schedule)?;
        let phase = Arc::new(Phase::default());
        let calculators = Calculators::new();
        let scheduler = schedule.arm(Self::NAME, phase.clone(), config.schedule.announce)?;

        Ok(Self {
            phase,
            sink: Arc::new(Sink::new()),
            rng: make_rng(config),
            calculators,
            pinned: config.dispatch.policy,
            mode: config.dispatch.mode,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> HarnessConfig {
        HarnessConfig::builder()
            .announce(false)
            .seed(Some(5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_schedule_is_monotonic() {
        let schedule = NMorphic::default_schedule().unwrap();
        let values: Vec<_> = schedule.transitions().iter().map(|t| t.value).collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
        assert_eq!(schedule.value_at(Duration::from_secs(170)), 3);
        assert_eq!(schedule.span(), Duration::from_secs(180));
    }

    #[test]
    fn test_policy_follows_phase() {
        let scenario = NMorphic::setup(&quiet_config()).unwrap();
        assert_eq!(scenario.policy(), DispatchPolicy::Mono);
        scenario.force(2);
        assert_eq!(scenario.policy(), DispatchPolicy::EvenTwo);
        scenario.force(4);
        assert_eq!(scenario.policy(), DispatchPolicy::Mono);
        scenario.force(17);
        assert_eq!(scenario.policy(), DispatchPolicy::Mono);
    }

    #[test]
    fn test_pinned_policy_ignores_phase() {
        let config = HarnessConfig::builder()
            .announce(false)
            .dispatch_policy(Some(DispatchPolicy::EvenFour))
            .dispatch_mode(DispatchMode::Enum)
            .build()
            .unwrap();
        let mut scenario = NMorphic::setup(&config).unwrap();
        scenario.force(3);
        assert_eq!(scenario.policy(), DispatchPolicy::EvenFour);
        assert_eq!(scenario.mode(), DispatchMode::Enum);

        for _ in 0..1000 {
            let kind = scenario.step();
            assert_ne!(kind, CalculatorKind::X);
        }
    }

    #[test]
    fn test_mono_sink_accounting() {
        let mut scenario = NMorphic::setup(&quiet_config()).unwrap();
        for _ in 0..100 {
            assert_eq!(scenario.step(), CalculatorKind::Marvelous);
        }
        // Mono draws lie in 0..5, each call adds START + STEP on top.
        let sink = scenario.sink().get();
        assert!(sink >= 100 * 3747);
        assert!(sink <= 100 * (3747 + 4));
    }
}
