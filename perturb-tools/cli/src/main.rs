//! Perturb Binary
//!
//! Run with: `perturb [COMMAND]`

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use perturb_runtime::{
    run_kind, ConfigError, DispatchMode, DispatchPolicy, HarnessConfig, HarnessConfigBuilder, RunReport,
    ScenarioKind,
};

#[derive(Parser)]
#[command(name = "perturb")]
#[command(about = "Microbenchmarks whose state is perturbed on a timer while they run")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the scenarios and their timelines
    List,

    /// Show the timeline of a scenario
    Schedule {
        /// Scenario name
        scenario: ScenarioKind,

        /// Multiplier applied to every transition offset
        #[arg(long)]
        time_scale: Option<f64>,
    },

    /// Drive a scenario and report throughput per iteration
    Run {
        /// Scenario name
        scenario: ScenarioKind,

        #[command(flatten)]
        options: RunOptions,
    },
}

/// Flags of `perturb run`. Each one overrides its `PERTURB_*` variable.
#[derive(Args, Debug)]
struct RunOptions {
    /// Measured iterations
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Warmup iterations, run first and not reported
    #[arg(short, long)]
    warmup: Option<usize>,

    /// Length of one iteration in milliseconds
    #[arg(long)]
    iteration_ms: Option<u64>,

    /// Measurement threads, each with its own scenario context
    #[arg(short, long)]
    threads: Option<usize>,

    /// Multiplier applied to every transition offset
    #[arg(long)]
    time_scale: Option<f64>,

    /// Seed for the random sources
    #[arg(long)]
    seed: Option<u64>,

    /// Pin an n-morphic dispatch policy instead of following the phase
    #[arg(long)]
    policy: Option<DispatchPolicy>,

    /// How n-morphic targets are invoked (virtual, enum, baseline)
    #[arg(long)]
    mode: Option<DispatchMode>,

    /// Do not log phase transitions
    #[arg(short, long)]
    quiet: bool,
}

impl RunOptions {
    /// Layer the flags that were given over `config` and validate the result.
    fn apply(&self, config: HarnessConfig) -> Result<HarnessConfig, ConfigError> {
        let mut builder = HarnessConfigBuilder::from_config(config);
        if let Some(n) = self.iterations {
            builder = builder.iterations(n);
        }
        if let Some(n) = self.warmup {
            builder = builder.warmup_iterations(n);
        }
        if let Some(ms) = self.iteration_ms {
            builder = builder.iteration_time(Duration::from_millis(ms));
        }
        if let Some(n) = self.threads {
            builder = builder.threads(n);
        }
        if let Some(scale) = self.time_scale {
            builder = builder.time_scale(scale);
        }
        if self.seed.is_some() {
            builder = builder.seed(self.seed);
        }
        if self.policy.is_some() {
            builder = builder.dispatch_policy(self.policy);
        }
        if let Some(mode) = self.mode {
            builder = builder.dispatch_mode(mode);
        }
        if self.quiet {
            builder = builder.announce(false);
        }
        builder.build()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = HarnessConfig::try_from_env().context("invalid PERTURB_* environment")?;

    // Initialize logging
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        config.log.level.to_level_filter()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::default().add_directive(level.into())),
        )
        .init();

    let mut out = io::stdout().lock();
    match cli.command {
        Commands::List => cmd_list(&mut out, &config),
        Commands::Schedule { scenario, time_scale } => {
            cmd_schedule(&mut out, scenario, time_scale.unwrap_or(config.schedule.time_scale))
        }
        Commands::Run { scenario, options } => {
            let config = options.apply(config).context("invalid run options")?;
            cmd_run(&mut out, scenario, &config)
        }
    }
}

fn cmd_list<W: Write>(out: &mut W, config: &HarnessConfig) -> Result<()> {
    for kind in ScenarioKind::ALL {
        writeln!(out, "{:<10} {}", kind, kind.description())?;
        let timeline = kind
            .describe_schedule(config.schedule.time_scale)
            .with_context(|| format!("failed to build the {} timeline", kind))?;
        for line in timeline.lines() {
            writeln!(out, "    {}", line)?;
        }
    }
    Ok(())
}

fn cmd_schedule<W: Write>(out: &mut W, kind: ScenarioKind, time_scale: f64) -> Result<()> {
    let timeline = kind
        .describe_schedule(time_scale)
        .with_context(|| format!("failed to build the {} timeline", kind))?;
    writeln!(out, "{}", timeline)?;
    Ok(())
}

fn cmd_run<W: Write>(out: &mut W, kind: ScenarioKind, config: &HarnessConfig) -> Result<()> {
    let report = run_kind(kind, config).with_context(|| format!("failed to run {}", kind))?;
    print_report(out, &report)?;
    info!(
        scenario = report.scenario,
        operations = report.total_operations(),
        "run complete"
    );
    Ok(())
}

fn print_report<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    for thread in &report.threads {
        for iteration in &thread.iterations {
            writeln!(
                out,
                "[{}] #{:<4} {:>8.1}s  {:>12} ops  {:>14.0} ops/s  control={}",
                thread.thread,
                iteration.index,
                iteration.since_setup.as_secs_f64(),
                iteration.operations,
                iteration.ops_per_sec(),
                iteration.control,
            )?;
        }
    }
    for thread in &report.threads {
        writeln!(out, "[{}] sink = {}", thread.thread, thread.sink)?;
    }
    Ok(())
}
