//! Biased binary-branch policy.
//!
//! A uniform draw in `[0, i32::MAX)` is shifted down by a threshold derived
//! from the chance of a negative outcome, so `chance` controls how often the
//! measured `outcome >= 0` branch is taken.

use rand::Rng;

/// Threshold subtracted from the raw draw for a given chance.
///
/// `chance` is clamped to `[0.0, 1.0]`; NaN counts as 0.0.
#[inline]
pub fn threshold(chance: f64) -> i32 {
    let chance = if chance.is_nan() { 0.0 } else { chance.clamp(0.0, 1.0) };
    (i32::MAX as f64 * chance) as i32
}

/// Draw a branch outcome. Negative with probability close to `chance`.
#[inline]
pub fn draw<R: Rng + ?Sized>(rng: &mut R, chance: f64) -> i32 {
    rng.gen_range(0..i32::MAX) - threshold(chance)
}

/// The branch under measurement.
#[inline]
pub fn take_branch(outcome: i32) -> i64 {
    if outcome >= 0 {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn negative_ratio(chance: f64, n: usize) -> f64 {
        let mut rng = SmallRng::seed_from_u64(42);
        let negatives = (0..n).filter(|_| draw(&mut rng, chance) < 0).count();
        negatives as f64 / n as f64
    }

    #[test]
    fn test_threshold_bounds() {
        assert_eq!(threshold(0.0), 0);
        assert_eq!(threshold(1.0), i32::MAX);
        assert_eq!(threshold(-3.0), 0);
        assert_eq!(threshold(7.5), i32::MAX);
        assert_eq!(threshold(f64::NAN), 0);
        assert_eq!(threshold(0.5), i32::MAX / 2);
    }

    #[test]
    fn test_zero_chance_never_negative() {
        assert_eq!(negative_ratio(0.0, 100_000), 0.0);
    }

    #[test]
    fn test_full_chance_always_negative() {
        assert_eq!(negative_ratio(1.0, 100_000), 1.0);
    }

    #[test]
    fn test_half_chance_roughly_even() {
        let ratio = negative_ratio(0.5, 200_000);
        assert!((ratio - 0.5).abs() < 0.01, "ratio was {}", ratio);
    }

    #[test]
    fn test_small_chance() {
        let ratio = negative_ratio(0.05, 200_000);
        assert!((ratio - 0.05).abs() < 0.005, "ratio was {}", ratio);
    }

    #[test]
    fn test_take_branch() {
        assert_eq!(take_branch(0), 2);
        assert_eq!(take_branch(i32::MAX), 2);
        assert_eq!(take_branch(-1), 1);
    }
}
