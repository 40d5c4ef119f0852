/// Property-based tests for exact decimal arithmetic using proptest
///
/// These tests verify that `Numeric` arithmetic is exact across mixed
/// exponents and that conversions to the database wire type keep the value.
use proptest::prelude::*;
use simple_bank::numeric::{Numeric, checked_sum, rescale};

// Strategy for money-sized values with up to four fractional digits
fn amount_strategy() -> impl Strategy<Value = Numeric> {
    (-1_000_000_000_000i64..=1_000_000_000_000, 0i32..=4)
        .prop_map(|(int, scale)| Numeric::new(i128::from(int), -scale))
}

proptest! {
    #[test]
    fn test_add_then_sub_is_identity(a in amount_strategy(), b in amount_strategy()) {
        let back = a.checked_add(b).unwrap().checked_sub(b).unwrap();
        prop_assert_eq!(back, a);
    }

    #[test]
    fn test_add_is_commutative(a in amount_strategy(), b in amount_strategy()) {
        prop_assert_eq!(a.checked_add(b).unwrap(), b.checked_add(a).unwrap());
    }

    #[test]
    fn test_transfer_pair_sums_to_zero(amount in amount_strategy()) {
        let debit = amount.checked_neg().unwrap();
        prop_assert!(debit.checked_add(amount).unwrap().is_zero());
    }

    #[test]
    fn test_rescale_down_and_up_is_identity(int in -1_000_000i128..=1_000_000, shift in 0i32..=10) {
        let widened = rescale(int, 0, -shift).unwrap();
        prop_assert_eq!(rescale(widened, -shift, 0).unwrap(), int);
    }

    #[test]
    fn test_sum_matches_integer_sum(values in prop::collection::vec(-1_000_000i64..=1_000_000, 0..50)) {
        let expected: i64 = values.iter().sum();
        let total = checked_sum(values.iter().copied().map(Numeric::from)).unwrap();
        prop_assert_eq!(total, Numeric::from(expected));
    }

    #[test]
    fn test_ordering_agrees_with_difference(a in amount_strategy(), b in amount_strategy()) {
        let diff = a.checked_sub(b).unwrap();
        prop_assert_eq!(a > b, diff.is_positive());
        prop_assert_eq!(a < b, diff.is_negative());
    }

    #[test]
    fn test_decimal_conversion_keeps_value(a in amount_strategy()) {
        let decimal = a.to_decimal().unwrap().expect("set value");
        prop_assert_eq!(Numeric::from(decimal), a);
    }

    #[test]
    fn test_display_parses_back(a in amount_strategy()) {
        let parsed: Numeric = a.to_string().parse().unwrap();
        prop_assert_eq!(parsed, a);
    }
}

#[test]
fn test_null_never_equals_a_value() {
    assert_ne!(Numeric::NULL, Numeric::ZERO);
    assert!(Numeric::NULL.partial_cmp(&Numeric::ZERO).is_none());
}
