//! Combinatorial parameter generation.
//!
//! Two tools for building test matrices:
//! - [`generate_combinations`] enumerates the full Cartesian product of
//!   several dimensions by mixed-radix decomposition of a combination index.
//! - [`Circular`] round-robins through a finite sequence forever, so a long
//!   list of generated cases can each take "the next" flag-set variant
//!   without multiplying the matrix.

use crate::error::{OracleError, OracleResult};

/// Full Cartesian product of `variants`.
///
/// Combination `c` takes `variants[i][(c / interval_i) % len_i]` from each
/// dimension, where `interval_i` is the product of the lengths of every
/// dimension after `i`. The last dimension therefore varies fastest, and
/// each combination is produced exactly once.
///
/// The result has `product(len_i)` entries: none if any dimension is empty,
/// and a single empty combination when there are no dimensions.
///
/// # Errors
///
/// Returns [`OracleError::Precondition`] when the number of combinations
/// does not fit in `usize`.
///
/// # Examples
///
/// ```
/// use er_oracle::generate_combinations;
///
/// let combos = generate_combinations(&[vec!['a', 'b'], vec!['x', 'y', 'z']]).unwrap();
/// assert_eq!(combos.len(), 6);
/// assert_eq!(combos[0], vec!['a', 'x']);
/// assert_eq!(combos[1], vec!['a', 'y']);
/// assert_eq!(combos[3], vec!['b', 'x']);
/// ```
pub fn generate_combinations<T: Clone>(variants: &[Vec<T>]) -> OracleResult<Vec<Vec<T>>> {
    if variants.iter().any(Vec::is_empty) {
        return Ok(Vec::new());
    }

    // intervals[i] = product of lengths of dimensions after i
    let mut intervals = vec![1usize; variants.len()];
    let mut total = 1usize;
    for i in (0..variants.len()).rev() {
        intervals[i] = total;
        total = total
            .checked_mul(variants[i].len())
            .ok_or_else(|| combination_overflow(variants))?;
    }

    Ok((0..total)
        .map(|c| {
            variants
                .iter()
                .zip(&intervals)
                .map(|(dim, interval)| dim[(c / interval) % dim.len()].clone())
                .collect()
        })
        .collect())
}

fn combination_overflow<T>(variants: &[Vec<T>]) -> OracleError {
    let lens: Vec<usize> = variants.iter().map(Vec::len).collect();
    OracleError::precondition(format!(
        "combination count overflows usize for dimension lengths {lens:?}"
    ))
}

/// Every tuple of `param_count` tri-state booleans.
///
/// The alphabet is `[Some(true), Some(false)]`, prefixed with `None` when
/// `include_null` is set, and the output has `alphabet.len() ^ param_count`
/// entries ordered the same way as [`generate_combinations`]. Zero
/// parameters give one empty tuple.
///
/// # Errors
///
/// Returns [`OracleError::Precondition`] when the tuple count overflows.
pub fn boolean_variants(
    param_count: usize,
    include_null: bool,
) -> OracleResult<Vec<Vec<Option<bool>>>> {
    let alphabet: Vec<Option<bool>> = if include_null {
        vec![None, Some(true), Some(false)]
    } else {
        vec![Some(true), Some(false)]
    };
    generate_combinations(&vec![alphabet; param_count])
}

/// Infinite round-robin cursor over a non-empty sequence.
///
/// `next` returns elements in their original order and restarts at the
/// beginning after each full pass. The k-th and (k + len)-th values are
/// always equal.
#[derive(Debug, Clone)]
pub struct Circular<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T: Clone> Circular<T> {
    /// Wraps `items`.
    ///
    /// # Errors
    /// Returns [`OracleError::Precondition`] if `items` is empty; an empty
    /// cycle could never produce a value.
    pub fn new(items: Vec<T>) -> OracleResult<Self> {
        if items.is_empty() {
            return Err(OracleError::precondition(
                "circular iteration requires a non-empty sequence",
            ));
        }
        Ok(Self { items, cursor: 0 })
    }

    /// Always true.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        true
    }

    /// Returns the next value and advances the cursor.
    pub fn next_value(&mut self) -> T {
        let value = self.items[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.items.len();
        value
    }

    /// Length of one full pass.
    #[must_use]
    pub fn period(&self) -> usize {
        self.items.len()
    }
}

impl<T: Clone> Iterator for Circular<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        Some(self.next_value())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_last_dimension_varies_fastest() {
        let combos = generate_combinations(&[vec![0, 1], vec![0, 1, 2]]).unwrap();
        assert_eq!(
            combos,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
    }

    #[test]
    fn test_empty_dimension_yields_nothing() {
        let combos = generate_combinations(&[vec![1, 2], Vec::<i32>::new(), vec![3]]).unwrap();
        assert!(combos.is_empty());
    }

    #[test]
    fn test_no_dimensions_yield_one_empty_combination() {
        let combos = generate_combinations::<i32>(&[]).unwrap();
        assert_eq!(combos, vec![Vec::<i32>::new()]);
    }

    #[test]
    fn test_overflowing_count_is_rejected() {
        let wide: Vec<Vec<u8>> = vec![vec![0, 1]; usize::BITS as usize];
        let err = generate_combinations(&wide).unwrap_err();
        assert!(err.is_harness());
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_single_dimension() {
        let combos = generate_combinations(&[vec!["a", "b", "c"]]).unwrap();
        assert_eq!(combos, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[rstest]
    #[case(0, false, 1)]
    #[case(0, true, 1)]
    #[case(1, false, 2)]
    #[case(3, false, 8)]
    #[case(2, true, 9)]
    #[case(4, true, 81)]
    fn test_boolean_variant_counts(
        #[case] params: usize,
        #[case] include_null: bool,
        #[case] expected: usize,
    ) {
        let variants = boolean_variants(params, include_null).unwrap();
        assert_eq!(variants.len(), expected);
        let unique: HashSet<_> = variants.iter().collect();
        assert_eq!(unique.len(), expected);
    }

    #[test]
    fn test_boolean_variants_order() {
        let variants = boolean_variants(2, true).unwrap();
        assert_eq!(variants[0], vec![None, None]);
        assert_eq!(variants[1], vec![None, Some(true)]);
        assert_eq!(variants[8], vec![Some(false), Some(false)]);
    }

    #[test]
    fn test_circular_rejects_empty() {
        let err = Circular::<u8>::new(Vec::new()).unwrap_err();
        assert!(err.is_harness());
    }

    #[test]
    fn test_circular_wraps() {
        let mut cycle = Circular::new(vec!['a', 'b', 'c']).unwrap();
        assert_eq!(cycle.period(), 3);
        let seen: String = cycle.by_ref().take(7).collect();
        assert_eq!(seen, "abcabca");
        assert!(cycle.has_next());
        assert_eq!(cycle.next_value(), 'b');
    }

    proptest! {
        #[test]
        fn prop_combination_count_and_uniqueness(lens in prop::collection::vec(1usize..4, 1..5)) {
            let variants: Vec<Vec<usize>> = lens.iter().map(|&n| (0..n).collect()).collect();
            let combos = generate_combinations(&variants).unwrap();
            let expected: usize = lens.iter().product();
            prop_assert_eq!(combos.len(), expected);
            let unique: HashSet<_> = combos.iter().collect();
            prop_assert_eq!(unique.len(), expected);
        }

        #[test]
        fn prop_dimension_period(lens in prop::collection::vec(1usize..4, 2..5), dim in 0usize..4) {
            let dim = dim % lens.len();
            let variants: Vec<Vec<usize>> = lens.iter().map(|&n| (0..n).collect()).collect();
            let combos = generate_combinations(&variants).unwrap();
            let interval: usize = lens[dim + 1..].iter().product();
            for (c, combo) in combos.iter().enumerate() {
                prop_assert_eq!(combo[dim], (c / interval) % lens[dim]);
            }
        }

        #[test]
        fn prop_circular_period(items in prop::collection::vec(any::<u16>(), 1..8), k in 0usize..64) {
            let mut cycle = Circular::new(items).unwrap();
            let len = cycle.period();
            let values: Vec<u16> = cycle.by_ref().take(k + len + 1).collect();
            prop_assert_eq!(values[k], values[k + len]);
        }
    }
}
