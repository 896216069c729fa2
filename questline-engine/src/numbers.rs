//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Floor a f64 to two decimal places, returning 0.0 for non-finite values.
///
/// A tiny bias absorbs binary representation error so that values such as
/// `0.3` (stored as `0.29999…`) do not floor down a full hundredth.
#[must_use]
pub fn floor_to_hundredths(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    ((value * 100.0) + 1e-9).floor() / 100.0
}

/// Percentage of `part` over `whole`, rounded to the nearest integer and
/// clamped to `0..=100`. An empty `whole` yields 0.
#[must_use]
pub fn rounded_percentage(part: u32, whole: u32) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole);
    let pct = (f64::from(part) * 100.0 / f64::from(whole)).round();
    cast::<f64, u8>(pct.clamp(0.0, 100.0)).unwrap_or(0)
}

/// Convert a collection length to u32, saturating on overflow.
#[must_use]
pub fn len_to_u32(len: usize) -> u32 {
    cast::<usize, u32>(len).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_handles_representation_error() {
        assert!((floor_to_hundredths(0.3) - 0.3).abs() < f64::EPSILON);
        assert!((floor_to_hundredths(1.239) - 1.23).abs() < 1e-12);
        assert!((floor_to_hundredths(f64::NAN) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn percentage_rounds_and_clamps() {
        assert_eq!(rounded_percentage(2, 3), 67);
        assert_eq!(rounded_percentage(1, 3), 33);
        assert_eq!(rounded_percentage(3, 3), 100);
        assert_eq!(rounded_percentage(5, 3), 100);
        assert_eq!(rounded_percentage(0, 0), 0);
    }

    #[test]
    fn casts_saturate() {
        assert_eq!(len_to_u32(7), 7);
    }
}
