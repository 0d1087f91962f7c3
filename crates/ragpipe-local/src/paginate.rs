//! Offset/limit pagination over an already-ranked list.
//!
//! Pagination runs before size truncation in the response pipeline: it
//! selects which candidates compete for the budget.

/// Pure slice: `results[offset..offset + limit]` with clamping. A negative
/// `offset` clamps to 0; an out-of-range `offset` or non-positive `limit`
/// returns an empty list. Never mutates or reorders the input.
pub fn paginate_results<T: Clone>(results: &[T], offset: i64, limit: i64) -> Vec<T> {
    if limit <= 0 {
        return Vec::new();
    }
    let offset = offset.max(0) as usize;
    if offset >= results.len() {
        return Vec::new();
    }
    let end = offset.saturating_add(limit as usize).min(results.len());
    results[offset..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slices_a_middle_page() {
        let v: Vec<i64> = (0..25).collect();
        assert_eq!(paginate_results(&v, 10, 10), (10..20).collect::<Vec<_>>());
    }

    #[test]
    fn negative_offset_clamps_to_zero() {
        let v: Vec<i64> = (0..5).collect();
        assert_eq!(paginate_results(&v, -3, 2), vec![0, 1]);
    }

    #[test]
    fn offset_past_end_is_empty() {
        let v: Vec<i64> = (0..5).collect();
        assert!(paginate_results(&v, 5, 10).is_empty());
        assert!(paginate_results(&v, 100, 10).is_empty());
    }

    #[test]
    fn non_positive_limit_is_empty() {
        let v: Vec<i64> = (0..5).collect();
        assert!(paginate_results(&v, 0, 0).is_empty());
        assert!(paginate_results(&v, 0, -1).is_empty());
    }

    #[test]
    fn limit_past_end_clamps() {
        let v: Vec<i64> = (0..5).collect();
        assert_eq!(paginate_results(&v, 3, 100), vec![3, 4]);
    }

    proptest! {
        #[test]
        fn matches_a_manual_slice(
            len in 0usize..50,
            offset in -10i64..60,
            limit in -10i64..60,
        ) {
            let v: Vec<usize> = (0..len).collect();
            let got = paginate_results(&v, offset, limit);
            let expect: Vec<usize> = if limit <= 0 {
                Vec::new()
            } else {
                let start = offset.max(0) as usize;
                v.iter()
                    .skip(start)
                    .take(limit as usize)
                    .copied()
                    .collect()
            };
            prop_assert_eq!(got, expect);
        }
    }
}
