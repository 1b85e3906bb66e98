//! Numeric utilities: safe and centralized integer conversions.
//!
//! Guidelines
//! - Prefer saturating conversions when best-effort is acceptable and clamping is safer than panicking or truncating (e.g., converting a time span to u64 for metrics/logging).
//! - Prefer lossless widening with explicit helpers to keep call sites consistent and searchable.

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    v as u64
}

#[inline]
#[must_use]
pub fn u128_to_u64_saturating(v: u128) -> u64 {
    if v > u128::from(u64::MAX) { u64::MAX } else { v as u64 }
}

#[inline]
#[must_use]
pub fn i64_to_u64_saturating_nonnegative(v: i64) -> u64 {
    if v <= 0 { 0 } else { v as u64 }
}

/// Milliseconds in a duration, clamped to `u64`.
#[inline]
#[must_use]
pub fn duration_millis(d: std::time::Duration) -> u64 {
    u128_to_u64_saturating(d.as_millis())
}

/// Number of entries to drop for a batch eviction: `ceil(len * fraction)`, at least one when `len > 0`.
#[must_use]
pub fn batch_count(len: usize, fraction: f64) -> usize {
    if len == 0 {
        return 0;
    }
    let raw = (len as f64 * fraction).ceil();
    let n = if raw.is_finite() && raw > 0.0 { raw as usize } else { 1 };
    n.clamp(1, len)
}

/// Ratio `num / (num + other)`, 0.0 when both are zero.
#[must_use]
pub fn ratio(num: u64, other: u64) -> f64 {
    let total = num.saturating_add(other);
    if total == 0 { 0.0 } else { num as f64 / total as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn usize_to_u64_is_lossless() {
        let values = [0usize, 1, 42, 10_000, usize::BITS.min(63) as usize];
        for &v in &values {
            let w = usize_to_u64(v);
            assert_eq!(w as usize, v);
        }
    }

    #[test]
    fn u128_to_u64_saturating_edges() {
        assert_eq!(u128_to_u64_saturating(0), 0);
        assert_eq!(u128_to_u64_saturating(u64::MAX as u128), u64::MAX);
        assert_eq!(u128_to_u64_saturating(u64::MAX as u128 + 1), u64::MAX);
        assert_eq!(u128_to_u64_saturating(u128::MAX), u64::MAX);
    }

    #[test]
    fn i64_to_u64_nonneg_saturating() {
        assert_eq!(i64_to_u64_saturating_nonnegative(-5), 0);
        assert_eq!(i64_to_u64_saturating_nonnegative(0), 0);
        assert_eq!(i64_to_u64_saturating_nonnegative(7), 7);
    }

    #[test]
    fn duration_millis_clamps() {
        assert_eq!(duration_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn batch_count_rounds_up_and_never_zero() {
        assert_eq!(batch_count(0, 0.1), 0);
        assert_eq!(batch_count(1, 0.1), 1);
        assert_eq!(batch_count(10, 0.1), 1);
        assert_eq!(batch_count(11, 0.1), 2);
        assert_eq!(batch_count(100, 0.1), 10);
        assert_eq!(batch_count(5, 1.0), 5);
        assert_eq!(batch_count(5, f64::NAN), 1);
    }

    #[test]
    fn ratio_handles_zero() {
        assert_eq!(ratio(0, 0), 0.0);
        assert!((ratio(8, 2) - 0.8).abs() < 1e-9);
    }
}
