//! Property-based tests for the perturbation harness.
//!
//! Uses proptest to generate random inputs and verify invariants hold.

use std::time::Duration;

use perturb_runtime::policy::{branch, nullable};
use perturb_runtime::{DispatchPolicy, NMorphic, PhaseSchedule, Scenario, ScheduleError, Sink};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Strategy for any dispatch policy
fn dispatch_policy() -> impl Strategy<Value = DispatchPolicy> {
    prop::sample::select(DispatchPolicy::ALL.to_vec())
}

/// Strategy for strictly increasing offsets, in milliseconds
fn increasing_offsets() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1u64..10_000, 0..12).prop_map(|gaps| {
        gaps.iter()
            .scan(0u64, |at, gap| {
                *at += gap;
                Some(*at)
            })
            .collect()
    })
}

fn schedule_from(offsets: &[u64]) -> Result<PhaseSchedule<i32>, ScheduleError> {
    offsets
        .iter()
        .enumerate()
        .fold(PhaseSchedule::builder(0), |b, (i, ms)| {
            b.at(Duration::from_millis(*ms), i as i32 + 1)
        })
        .build()
}

proptest! {
    /// Draws stay inside the shifted range for any chance
    #[test]
    fn branch_draw_within_shifted_range(chance in 0.0f64..=1.0, seed in any::<u64>()) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let threshold = branch::threshold(chance);
        for _ in 0..64 {
            let outcome = branch::draw(&mut rng, chance);
            prop_assert!(outcome >= -threshold);
            prop_assert!(outcome < i32::MAX - threshold);
        }
    }

    /// Chance 0.0 never goes negative; chance 1.0 always does
    #[test]
    fn branch_extremes_are_deterministic(seed in any::<u64>()) {
        let mut rng = SmallRng::seed_from_u64(seed);
        for _ in 0..64 {
            prop_assert_eq!(branch::take_branch(branch::draw(&mut rng, 0.0)), 2);
            prop_assert_eq!(branch::take_branch(branch::draw(&mut rng, 1.0)), 1);
        }
    }

    /// Threshold is monotonic in chance
    #[test]
    fn branch_threshold_monotonic(a in -1.0f64..2.0, b in -1.0f64..2.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(branch::threshold(lo) <= branch::threshold(hi));
    }

    /// Every draw in range maps to one of the policy's targets
    #[test]
    fn target_for_stays_within_targets(policy in dispatch_policy(), draw in 0i32..i32::MAX) {
        let draw = draw % policy.draw_bound();
        prop_assert!(policy.targets().contains(&policy.target_for(draw)));
    }

    /// Selection folds exactly the draw into the sink
    #[test]
    fn select_adds_draw_to_sink(policy in dispatch_policy(), seed in any::<u64>()) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let sink = Sink::new();
        let kind = policy.select(&mut rng, &sink);
        let draw = sink.get();
        prop_assert!(draw >= 0 && draw < policy.draw_bound() as i64);
        prop_assert_eq!(policy.target_for(draw as i32), kind);
    }

    /// Out-of-domain phases fall back to mono
    #[test]
    fn unknown_phase_is_mono(phase in prop_oneof![i32::MIN..0, 4..i32::MAX]) {
        prop_assert_eq!(DispatchPolicy::for_phase(phase), DispatchPolicy::Mono);
    }

    /// Only phase 1 is absent
    #[test]
    fn nullness_absent_only_in_phase_one(phase in any::<i32>()) {
        prop_assert_eq!(nullable::value_for(phase).is_none(), phase == 1);
    }

    /// The present value is followed by its upper-case copy
    #[test]
    fn safe_upper_concatenates(s in "[a-z]{0,16}") {
        let combined = nullable::safe_upper(Some(s.as_str())).unwrap();
        prop_assert_eq!(combined.len(), s.len() * 2);
        prop_assert!(combined.starts_with(&s));
        prop_assert_eq!(&combined[s.len()..], s.to_uppercase());
    }

    /// Builder accepts strictly increasing offsets
    #[test]
    fn builder_accepts_increasing(offsets in increasing_offsets()) {
        let schedule = schedule_from(&offsets).unwrap();
        prop_assert_eq!(schedule.transitions().len(), offsets.len());
    }

    /// Builder rejects a repeated or earlier offset
    #[test]
    fn builder_rejects_non_increasing(offsets in increasing_offsets(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!offsets.is_empty());
        let mut offsets = offsets;
        let repeated = offsets[pick.index(offsets.len())];
        offsets.push(repeated);
        let rejected = matches!(
            schedule_from(&offsets),
            Err(ScheduleError::NonIncreasingDelay { .. })
        );
        prop_assert!(rejected);
    }

    /// Scaling keeps order and values
    #[test]
    fn scaled_preserves_order(offsets in increasing_offsets(), factor in 0.5f64..10.0) {
        let schedule = schedule_from(&offsets).unwrap();
        let scaled = schedule.scaled(factor).unwrap();
        prop_assert_eq!(scaled.initial(), schedule.initial());
        prop_assert!(scaled.transitions().windows(2).all(|w| w[0].at < w[1].at));
        let values: Vec<_> = scaled.transitions().iter().map(|t| t.value).collect();
        let expected: Vec<_> = schedule.transitions().iter().map(|t| t.value).collect();
        prop_assert_eq!(values, expected);
    }

    /// The n-morphic timeline never steps back a phase
    #[test]
    fn nmorphic_timeline_monotonic(a in 0u64..300_000, b in 0u64..300_000) {
        let schedule = NMorphic::default_schedule().unwrap();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            schedule.value_at(Duration::from_millis(lo)) <= schedule.value_at(Duration::from_millis(hi))
        );
    }
}
