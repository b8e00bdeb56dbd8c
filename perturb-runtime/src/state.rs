//! Shared control state and result sink.
//!
//! The control value of a scenario is written by exactly one thread (the
//! scheduler worker) and read by every measurement thread on every measured
//! invocation. It is therefore a bare atomic: no lock ever sits on the
//! measured path, and a reader observing the previous value for one extra
//! invocation is acceptable.
//!
//! The [`Sink`] absorbs every computed result so the optimizer has to treat
//! the measured work as live.

use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU64, Ordering};

/// A cell holding the control value of a running experiment.
///
/// Implemented by [`Phase`] (integer phases) and [`Chance`] (fractional
/// phases). Scheduled transitions store into the cell; the selection
/// policies load from it.
pub trait PhaseCell: Send + Sync + 'static {
    /// The value type stored in the cell.
    type Value: Copy + Send + Sync + fmt::Display + 'static;

    /// Read the current value.
    fn load(&self) -> Self::Value;

    /// Overwrite the current value.
    fn store(&self, value: Self::Value);
}

/// Integer phase indicator.
#[derive(Debug, Default)]
pub struct Phase(AtomicI32);

impl Phase {
    /// Create a phase cell with the given initial phase.
    pub const fn new(initial: i32) -> Self {
        Self(AtomicI32::new(initial))
    }

    /// Read the current phase.
    #[inline]
    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Acquire)
    }

    /// Set the current phase.
    #[inline]
    pub fn set(&self, phase: i32) {
        self.0.store(phase, Ordering::Release);
    }
}

impl PhaseCell for Phase {
    type Value = i32;

    #[inline]
    fn load(&self) -> i32 {
        self.get()
    }

    #[inline]
    fn store(&self, value: i32) {
        self.set(value)
    }
}

/// Fractional phase indicator, stored as the bit pattern of an `f64`.
#[derive(Debug)]
pub struct Chance(AtomicU64);

impl Chance {
    /// Create a chance cell with the given initial value.
    pub fn new(initial: f64) -> Self {
        Self(AtomicU64::new(initial.to_bits()))
    }

    /// Read the current value.
    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Set the current value.
    #[inline]
    pub fn set(&self, chance: f64) {
        self.0.store(chance.to_bits(), Ordering::Release);
    }
}

impl Default for Chance {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl PhaseCell for Chance {
    type Value = f64;

    #[inline]
    fn load(&self) -> f64 {
        self.get()
    }

    #[inline]
    fn store(&self, value: f64) {
        self.set(value)
    }
}

/// Accumulator register for measured results.
///
/// Additions wrap on overflow. The value can be read from any thread at any
/// time; no consistency is promised beyond eventual visibility.
#[derive(Debug, Default)]
pub struct Sink(AtomicI64);

impl Sink {
    /// Create an empty sink.
    pub const fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    /// Fold a value into the sink.
    #[inline]
    pub fn add(&self, value: i64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    /// Read the accumulated value.
    #[inline]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_phase_roundtrip() {
        let phase = Phase::new(0);
        assert_eq!(phase.get(), 0);
        phase.store(3);
        assert_eq!(phase.load(), 3);
    }

    #[test]
    fn test_chance_preserves_value() {
        let chance = Chance::default();
        assert_eq!(chance.get(), 0.0);
        chance.set(0.05);
        assert_eq!(chance.load(), 0.05);
    }

    #[test]
    fn test_sink_wraps_on_overflow() {
        let sink = Sink::new();
        sink.add(i64::MAX);
        sink.add(1);
        assert_eq!(sink.get(), i64::MIN);
    }

    #[test]
    fn test_phase_write_visible_to_other_thread() {
        let phase = Arc::new(Phase::new(0));
        let writer = phase.clone();

        thread::spawn(move || writer.set(1));

        let deadline = Instant::now() + Duration::from_secs(5);
        while phase.get() != 1 {
            assert!(Instant::now() < deadline, "write never became visible");
            std::hint::spin_loop();
        }
    }
}
