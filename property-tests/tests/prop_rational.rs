//! Property tests for RationalNumber
//!
//! Tests invariants for:
//! - from_float: at most three decimal places of error, bounded relative error
//! - normal form: no trailing decimal zeros below the maximum exponent

use iso20_core::message::datatypes::RationalNumber;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Magnitudes a charger actually reports: millivolts up to megawatts
fn physical_value() -> impl Strategy<Value = f32> {
    prop_oneof![-1.0f32..1.0f32, -1000.0f32..1000.0f32, -1_000_000.0f32..1_000_000.0f32,]
}

fn rational() -> impl Strategy<Value = RationalNumber> {
    (any::<i16>(), -3i8..=3i8).prop_map(|(value, exponent)| RationalNumber::new(value, exponent))
}

// ============================================================================
// Encoding precision
// ============================================================================

proptest! {
    /// CORE INVARIANT: decode(encode(x)) keeps three significant digits
    #[test]
    fn from_float_keeps_three_significant_digits(x in physical_value()) {
        let decoded = RationalNumber::from_float(x).to_float();
        let tolerance = 0.0005 + x.abs() * 1e-3;

        prop_assert!(
            (decoded - x).abs() <= tolerance,
            "from_float({}) decoded to {}, error {} > {}",
            x, decoded, (decoded - x).abs(), tolerance
        );
    }

    /// Sign survives encoding for values that do not round to zero
    #[test]
    fn from_float_preserves_sign(x in physical_value()) {
        prop_assume!(x.abs() >= 0.001);
        let encoded = RationalNumber::from_float(x);
        prop_assert_eq!(encoded.value.signum() as i32, x.signum() as i32);
    }

    /// Encoding is normalized: trailing zeros are folded into the exponent
    #[test]
    fn from_float_is_normalized(x in physical_value()) {
        let encoded = RationalNumber::from_float(x);
        prop_assert!(
            encoded.value == 0 || encoded.value % 10 != 0 || encoded.exponent == 3,
            "{:?} is not normalized",
            encoded
        );
        prop_assert!((-3..=3).contains(&encoded.exponent));
    }

    /// Re-encoding a decoded wire value lands on the same number
    #[test]
    fn wire_value_is_stable(r in rational()) {
        let once = RationalNumber::from_float(r.to_float());
        let twice = RationalNumber::from_float(once.to_float());
        prop_assert_eq!(once, twice);
    }

    /// Non-finite input encodes as zero
    #[test]
    fn non_finite_encodes_as_zero(x in prop_oneof![Just(f32::NAN), Just(f32::INFINITY), Just(f32::NEG_INFINITY)]) {
        prop_assert_eq!(RationalNumber::from_float(x), RationalNumber::default());
    }
}
