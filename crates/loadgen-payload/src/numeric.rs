//! Numeric value generators.

use rand::Rng;

/// Round a value to two decimal places.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generate a random float in the given range (inclusive), rounded to two
/// decimal places.
///
/// Rounding never leaves the range as long as both bounds are themselves
/// representable with two decimals.
pub fn generate_rounded_range<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    round_to_cents(rng.gen_range(min..=max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_round_to_cents() {
        assert_eq!(round_to_cents(1.234), 1.23);
        assert_eq!(round_to_cents(-1.235_1), -1.24);
        assert_eq!(round_to_cents(99.999), 100.0);
        assert_eq!(round_to_cents(0.0), 0.0);
    }

    #[test]
    fn test_generate_rounded_range() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..1000 {
            let value = generate_rounded_range(&mut rng, -100.0, 100.0);
            assert!((-100.0..=100.0).contains(&value));
            // At most two decimals
            assert!(((value * 100.0).round() - value * 100.0).abs() < 1e-6);
        }
    }
}
