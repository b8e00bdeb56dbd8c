//! Nullable-value policy and the case-folding operation it feeds.

use thiserror::Error;

/// The value returned while the nullness phase is 0.
pub const PRESENT: &str = "yep";

/// Error raised when the measured operation is handed an absent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value is absent")]
pub struct AbsentValue;

/// The value for a nullness phase: absent in phase 1, present otherwise.
///
/// Only phase 1 is absent. Any other value, including phases outside
/// `0..=1`, falls back to the present value rather than to absence.
#[inline]
pub fn value_for(phase: i32) -> Option<&'static str> {
    if phase == 1 {
        None
    } else {
        Some(PRESENT)
    }
}

/// Lower-case and upper-case renditions of `value`, concatenated.
#[inline]
pub fn safe_upper(value: Option<&str>) -> Result<String, AbsentValue> {
    let value = value.ok_or(AbsentValue)?;
    let mut out = value.to_lowercase();
    out.push_str(&value.to_uppercase());
    Ok(out)
}

/// Polynomial string hash over UTF-16 code units with multiplier 31,
/// wrapping at 32 bits.
#[inline]
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}
