//! Phase schedules: the timeline of an experiment.
//!
//! A [`PhaseSchedule`] is an initial control value plus an ordered list of
//! transitions, each overwriting the value at a fixed offset after setup.
//! Arming a schedule against a [`PhaseCell`] stores the initial value and
//! hands every transition to a [`DelayScheduler`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::ScheduleError;
use crate::scheduler::{DelayScheduler, SchedulerHandle};
use crate::state::PhaseCell;

/// One timed change of the control value.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T> {
    /// Offset from setup at which the transition fires.
    pub at: Duration,
    /// The new control value.
    pub value: T,
    /// Human-readable notice emitted when the transition fires.
    pub notice: Option<String>,
}

/// Initial control value and the ordered transitions that follow it.
///
/// Offsets are strictly increasing; this is checked when the schedule is
/// built or scaled.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSchedule<T> {
    initial: T,
    transitions: Vec<Transition<T>>,
}

impl<T> PhaseSchedule<T>
where
    T: Copy + fmt::Display + Send + Sync + 'static,
{
    /// Start building a schedule from its initial value.
    pub fn builder(initial: T) -> PhaseScheduleBuilder<T> {
        PhaseScheduleBuilder {
            initial,
            transitions: Vec::new(),
        }
    }

    /// The value stored when the schedule is armed.
    pub fn initial(&self) -> T {
        self.initial
    }

    /// The transitions, in firing order.
    pub fn transitions(&self) -> &[Transition<T>] {
        &self.transitions
    }

    /// Offset of the last transition, or zero for a constant schedule.
    pub fn span(&self) -> Duration {
        self.transitions.last().map(|t| t.at).unwrap_or_default()
    }

    /// The control value the schedule prescribes `elapsed` after setup.
    pub fn value_at(&self, elapsed: Duration) -> T {
        self.transitions
            .iter()
            .take_while(|t| t.at <= elapsed)
            .last()
            .map(|t| t.value)
            .unwrap_or(self.initial)
    }

    /// Multiply every offset by `factor`.
    ///
    /// Fails if `factor` is not positive and finite, or if a scaled offset
    /// does not fit in a `Duration`.
    pub fn scaled(&self, factor: f64) -> Result<Self, ScheduleError> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(ScheduleError::InvalidScale(factor));
        }

        let transitions = self
            .transitions
            .iter()
            .enumerate()
            .map(|(index, t)| -> Result<Transition<T>, ScheduleError> {
                Ok(Transition {
                    at: scale_offset(t.at, factor).ok_or(ScheduleError::OffsetOverflow {
                        index,
                        delay: t.at,
                        factor,
                    })?,
                    value: t.value,
                    notice: t.notice.clone(),
                })
            })
            .collect::<Result<Vec<_>, ScheduleError>>()?;
        validate(&transitions)?;

        Ok(Self {
            initial: self.initial,
            transitions,
        })
    }

    /// Store the initial value into `cell` and start a scheduler that applies
    /// every transition to it.
    ///
    /// When `announce` is set, each firing is logged at `info` level under
    /// the scenario name.
    pub fn arm<C>(
        &self,
        scenario: &str,
        cell: Arc<C>,
        announce: bool,
    ) -> Result<SchedulerHandle, ScheduleError>
    where
        C: PhaseCell<Value = T>,
    {
        cell.store(self.initial);

        let mut scheduler = DelayScheduler::new(scenario);
        for transition in &self.transitions {
            let cell = cell.clone();
            let scenario = scenario.to_string();
            let Transition { at, value, notice } = transition.clone();

            scheduler.schedule(at, move || {
                cell.store(value);
                if announce {
                    match notice {
                        Some(notice) => info!(scenario = %scenario, value = %value, at = ?at, "{}", notice),
                        None => info!(scenario = %scenario, value = %value, at = ?at, "phase changed"),
                    }
                }
            });
        }

        scheduler.start()
    }
}

impl<T: fmt::Display> fmt::Display for PhaseSchedule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}  {}", "0s", self.initial)?;
        for t in &self.transitions {
            write!(f, "\n{:>8}  {}", format!("{:?}", t.at), t.value)?;
            if let Some(notice) = &t.notice {
                write!(f, "  ({})", notice)?;
            }
        }
        Ok(())
    }
}

/// Builder for [`PhaseSchedule`].
#[derive(Debug, Clone)]
pub struct PhaseScheduleBuilder<T> {
    initial: T,
    transitions: Vec<Transition<T>>,
}

impl<T> PhaseScheduleBuilder<T>
where
    T: Copy + fmt::Display + Send + Sync + 'static,
{
    /// Add a transition to `value` at offset `at`.
    pub fn at(mut self, at: Duration, value: T) -> Self {
        self.transitions.push(Transition {
            at,
            value,
            notice: None,
        });
        self
    }

    /// Add a transition with a notice emitted when it fires.
    pub fn at_with_notice(mut self, at: Duration, value: T, notice: impl Into<String>) -> Self {
        self.transitions.push(Transition {
            at,
            value,
            notice: Some(notice.into()),
        });
        self
    }

    /// Validate offsets and build the schedule.
    pub fn build(self) -> Result<PhaseSchedule<T>, ScheduleError> {
        validate(&self.transitions)?;
        Ok(PhaseSchedule {
            initial: self.initial,
            transitions: self.transitions,
        })
    }
}

/// `offset * factor`, or `None` if the result does not fit in a `Duration`.
fn scale_offset(offset: Duration, factor: f64) -> Option<Duration> {
    if factor == 1.0 {
        return Some(offset);
    }
    Duration::try_from_secs_f64(offset.as_secs_f64() * factor).ok()
}

fn validate<T>(transitions: &[Transition<T>]) -> Result<(), ScheduleError> {
    for (index, pair) in transitions.windows(2).enumerate() {
        if pair[1].at <= pair[0].at {
            return Err(ScheduleError::NonIncreasingDelay {
                index: index + 1,
                previous: pair[0].at,
                delay: pair[1].at,
            });
        }
    }
    Ok(())
}
