//! Bound checks applied to every decoded sample.

use primitive_types::U256;

use crate::error::{ValidationError, ValidationFailure};
use crate::sampler::{SampleRequest, SampleResult, MAX_BITS};

/// Largest value representable with `bits` bits, `2^bits - 1`.
pub fn max_value(bits: u32) -> U256 {
    if bits >= MAX_BITS {
        U256::MAX
    } else {
        (U256::one() << bits as usize) - U256::one()
    }
}

/// Checks one result against the request that produced it.
///
/// Order of checks: event presence, bit count, absolute bounds, then the
/// requested range when `range_max > 0`.
pub fn validate_result(
    result: &SampleResult,
    request: &SampleRequest,
) -> Result<(), ValidationError> {
    let min_val = U256::zero();
    let max_val = max_value(request.bits);

    if !result.event_found {
        return Err(ValidationError::EventMissing);
    }

    if result.bits != request.bits {
        return Err(ValidationError::BitsMismatch {
            expected: request.bits,
            actual: result.bits,
        });
    }

    if result.random_val < min_val {
        return Err(ValidationError::BelowAbsoluteMinimum {
            value: result.random_val,
            bound: min_val,
        });
    }

    if result.random_val > max_val {
        return Err(ValidationError::AboveAbsoluteMaximum {
            value: result.random_val,
            bound: max_val,
        });
    }

    let (range_min, range_max) = request.range.bounds();
    if range_max > min_val {
        if result.random_val < range_min {
            return Err(ValidationError::BelowRangeMinimum {
                value: result.random_val,
                bound: range_min,
            });
        }

        if result.random_val > range_max {
            return Err(ValidationError::AboveRangeMaximum {
                value: result.random_val,
                bound: range_max,
            });
        }
    }

    Ok(())
}

/// Validates every result of a batch, collecting all failures instead of stopping at the first.
pub fn validate_batch(results: &[SampleResult], request: &SampleRequest) -> Vec<ValidationFailure> {
    results
        .iter()
        .enumerate()
        .filter_map(|(index, result)| {
            validate_result(result, request)
                .err()
                .map(|error| ValidationFailure { index, error })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn found(bits: u32, value: u64) -> SampleResult {
        SampleResult {
            event_found: true,
            bits,
            random_val: U256::from(value),
        }
    }

    fn ranged(bits: u32, min: u64, max: u64) -> SampleRequest {
        SampleRequest::new(bits, U256::from(min), U256::from(max))
    }

    #[test]
    fn test_max_value() {
        assert_eq!(max_value(1), U256::one());
        assert_eq!(max_value(8), U256::from(255u64));
        assert_eq!(max_value(64), U256::from(u64::MAX));
        assert_eq!(max_value(255), U256::MAX >> 1);
        assert_eq!(max_value(256), U256::MAX);
    }

    #[test]
    fn test_accepts_values_within_bits() {
        let request = SampleRequest::unbounded(8);
        assert!(validate_result(&found(8, 0), &request).is_ok());
        assert!(validate_result(&found(8, 255), &request).is_ok());
    }

    #[test]
    fn test_missing_event_is_first_failure() {
        let request = SampleRequest::unbounded(8);
        assert_eq!(
            validate_result(&SampleResult::default(), &request),
            Err(ValidationError::EventMissing)
        );
    }

    #[test]
    fn test_bits_mismatch() {
        let request = SampleRequest::unbounded(8);
        assert_eq!(
            validate_result(&found(16, 3), &request),
            Err(ValidationError::BitsMismatch {
                expected: 8,
                actual: 16
            })
        );
    }

    #[test]
    fn test_above_absolute_maximum() {
        let request = SampleRequest::unbounded(8);
        assert_eq!(
            validate_result(&found(8, 256), &request),
            Err(ValidationError::AboveAbsoluteMaximum {
                value: U256::from(256u64),
                bound: U256::from(255u64)
            })
        );
    }

    #[test]
    fn test_range_bounds() {
        let request = ranged(16, 100, 200);
        assert!(validate_result(&found(16, 100), &request).is_ok());
        assert!(validate_result(&found(16, 200), &request).is_ok());
        assert_eq!(
            validate_result(&found(16, 99), &request),
            Err(ValidationError::BelowRangeMinimum {
                value: U256::from(99u64),
                bound: U256::from(100u64)
            })
        );
        assert_eq!(
            validate_result(&found(16, 201), &request),
            Err(ValidationError::AboveRangeMaximum {
                value: U256::from(201u64),
                bound: U256::from(200u64)
            })
        );
    }

    #[test]
    fn test_range_with_zero_max_is_not_checked() {
        // (0, 0) is the unbounded sentinel, only the bit ceiling applies
        let request = ranged(8, 0, 0);
        assert!(validate_result(&found(8, 77), &request).is_ok());
    }

    #[test]
    fn test_batch_checks_every_sibling() {
        let request = ranged(8, 10, 20);
        let results = vec![
            found(8, 15),
            SampleResult::default(),
            found(8, 21),
            found(8, 10),
            found(8, 300),
        ];

        let failures = validate_batch(&results, &request);
        let indexes: Vec<usize> = failures.iter().map(|f| f.index).collect();
        assert_eq!(indexes, vec![1, 2, 4]);
        assert_eq!(failures[0].error, ValidationError::EventMissing);
        assert!(matches!(
            failures[2].error,
            ValidationError::AboveAbsoluteMaximum { .. }
        ));
    }

    proptest! {
        #[test]
        fn prop_values_within_bits_pass(bits in 1u32..=64, raw in any::<u64>()) {
            let value = if bits == 64 { raw } else { raw % (1u64 << bits) };
            let request = SampleRequest::unbounded(bits);
            prop_assert!(validate_result(&found(bits, value), &request).is_ok());
        }

        #[test]
        fn prop_values_above_bits_fail(bits in 1u32..=63, excess in 0u64..1_000) {
            let value = (1u64 << bits).saturating_add(excess);
            let request = SampleRequest::unbounded(bits);
            let is_above = matches!(
                validate_result(&found(bits, value), &request),
                Err(ValidationError::AboveAbsoluteMaximum { .. })
            );
            prop_assert!(is_above);
        }
    }
}
