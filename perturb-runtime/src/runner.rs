//! Iteration runner.
//!
//! Drives a scenario's measured operation in fixed-length wall-clock
//! iterations and records how many operations each iteration completed,
//! together with the control value in force when it ended. Because the
//! schedule keeps running underneath, phase transitions show up as changes
//! in throughput between iterations.
//!
//! Each measurement thread sets up its own scenario context, and therefore
//! arms its own scheduler.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, trace};

use crate::config::HarnessConfig;
use crate::error::{ScenarioError, ScenarioResult};
use crate::scenario::{Branching, NMorphic, Nullness, Scenario, ScenarioKind};
use crate::schedule::PhaseSchedule;

/// Number of measured invocations between clock reads.
const BATCH: u64 = 1024;

/// Outcome of one iteration.
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// Iteration index, counting warmup iterations.
    pub index: usize,
    /// Whether this was a warmup iteration.
    pub warmup: bool,
    /// Measured invocations completed.
    pub operations: u64,
    /// Wall-clock time spent.
    pub elapsed: Duration,
    /// Offset of the end of the iteration from setup.
    pub since_setup: Duration,
    /// Control value in force at the end of the iteration.
    pub control: String,
    /// Scheduled transitions fired by the end of the iteration.
    pub transitions_fired: usize,
}

impl IterationReport {
    /// Throughput of the iteration.
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.operations as f64 / secs
        } else {
            0.0
        }
    }
}

/// All iterations of one measurement thread.
#[derive(Debug, Clone)]
pub struct ThreadReport {
    /// Measurement thread index.
    pub thread: usize,
    /// Measured (non-warmup) iterations.
    pub iterations: Vec<IterationReport>,
    /// Final sink value of the thread's context.
    pub sink: i64,
}

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: &'static str,
    /// One report per measurement thread, in thread order.
    pub threads: Vec<ThreadReport>,
}

impl RunReport {
    /// Measured operations across all threads.
    pub fn total_operations(&self) -> u64 {
        self.threads
            .iter()
            .flat_map(|t| t.iterations.iter())
            .map(|i| i.operations)
            .sum()
    }
}

/// Run the scenario of the given kind on its production timeline.
pub fn run_kind(kind: ScenarioKind, config: &HarnessConfig) -> ScenarioResult<RunReport> {
    match kind {
        ScenarioKind::Branching => run::<Branching>(config),
        ScenarioKind::NMorphic => run::<NMorphic>(config),
        ScenarioKind::Nullness => run::<Nullness>(config),
    }
}

/// Run `S` on its production timeline.
pub fn run<S: Scenario>(config: &HarnessConfig) -> ScenarioResult<RunReport> {
    run_with::<S>(config, &S::default_schedule()?)
}

/// Run `S` on a custom timeline.
pub fn run_with<S: Scenario>(
    config: &HarnessConfig,
    schedule: &PhaseSchedule<S::Value>,
) -> ScenarioResult<RunReport> {
    config.validate()?;

    info!(
        scenario = S::NAME,
        threads = config.measurement.threads,
        iterations = config.measurement.iterations,
        warmup = config.measurement.warmup_iterations,
        iteration_time = ?config.measurement.iteration_time,
        "starting run"
    );

    let threads = if config.measurement.threads == 1 {
        vec![run_thread::<S>(0, config, schedule)?]
    } else {
        thread::scope(|scope| -> ScenarioResult<Vec<ThreadReport>> {
            let mut handles = Vec::with_capacity(config.measurement.threads);
            for index in 0..config.measurement.threads {
                let thread_config = config_for_thread(config, index);
                let handle = thread::Builder::new()
                    .name(format!("perturb-measure-{}", index))
                    .spawn_scoped(scope, move || run_thread::<S>(index, &thread_config, schedule))
                    .map_err(ScenarioError::Spawn)?;
                handles.push(handle);
            }

            handles
                .into_iter()
                .map(|h| h.join().map_err(|_| ScenarioError::WorkerPanicked)?)
                .collect()
        })?
    };

    Ok(RunReport {
        scenario: S::NAME,
        threads,
    })
}

/// Give every thread a distinct but reproducible seed.
fn config_for_thread(config: &HarnessConfig, index: usize) -> HarnessConfig {
    let mut config = config.clone();
    config.rng.seed = config.rng.seed.map(|s| s.wrapping_add(index as u64));
    config
}

fn run_thread<S: Scenario>(
    thread: usize,
    config: &HarnessConfig,
    schedule: &PhaseSchedule<S::Value>,
) -> ScenarioResult<ThreadReport> {
    let mut scenario = S::setup_with(config, schedule)?;
    let measurement = &config.measurement;
    let total = measurement.warmup_iterations + measurement.iterations;
    let mut iterations = Vec::with_capacity(measurement.iterations);

    for index in 0..total {
        let warmup = index < measurement.warmup_iterations;
        let report = run_iteration(&mut scenario, index, warmup, measurement.iteration_time);

        trace!(
            scenario = S::NAME,
            thread,
            iteration = index,
            warmup,
            operations = report.operations,
            ops_per_sec = report.ops_per_sec(),
            control = %report.control,
            "iteration complete"
        );

        if !warmup {
            iterations.push(report);
        }
    }

    Ok(ThreadReport {
        thread,
        iterations,
        sink: scenario.sink().get(),
    })
}

/// Invoke the measured operation in batches until `duration` has elapsed.
pub fn run_iteration<S: Scenario>(
    scenario: &mut S,
    index: usize,
    warmup: bool,
    duration: Duration,
) -> IterationReport {
    let start = Instant::now();
    let mut operations = 0u64;

    let elapsed = loop {
        for _ in 0..BATCH {
            scenario.measure();
        }
        operations += BATCH;

        let elapsed = start.elapsed();
        if elapsed >= duration {
            break elapsed;
        }
    };

    IterationReport {
        index,
        warmup,
        operations,
        elapsed,
        since_setup: scenario.scheduler().elapsed(),
        control: scenario.control().to_string(),
        transitions_fired: scenario.scheduler().fired(),
    }
}
