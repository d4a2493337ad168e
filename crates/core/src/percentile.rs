//! Rank-based percentile placement within a peer population.
//!
//! Rank-based rather than z-score on purpose: revenue distributions here are
//! long-tailed and skewed, and a handful of whale accounts must not wash out
//! the ranking of everyone else.

/// Percentile position of `value` within `population`, as an integer 0-100.
///
/// Non-finite members are dropped before ranking. A value above every member
/// ranks 100. An empty population (after filtering) also ranks 100: with no
/// peers the entity is trivially top of its class.
pub fn percentile_rank(value: f64, population: &[f64]) -> u8 {
    let mut members: Vec<f64> = population.iter().copied().filter(|v| v.is_finite()).collect();
    if members.is_empty() || !value.is_finite() {
        return 100;
    }
    members.sort_by(|a, b| a.total_cmp(b));

    match members.iter().position(|member| *member >= value) {
        Some(index) => {
            let pct = index as f64 / members.len() as f64 * 100.0;
            pct.round() as u8
        }
        None => 100,
    }
}

/// Median of `values`, ignoring non-finite members. `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut members: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if members.is_empty() {
        return None;
    }
    members.sort_by(|a, b| a.total_cmp(b));
    let mid = members.len() / 2;
    if members.len() % 2 == 1 {
        Some(members[mid])
    } else {
        Some((members[mid - 1] + members[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{median, percentile_rank};

    #[test]
    fn minimum_value_ranks_zero() {
        let population = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile_rank(10.0, &population), 0);
    }

    #[test]
    fn value_above_all_members_ranks_hundred() {
        let population = [10.0, 20.0, 30.0];
        assert_eq!(percentile_rank(31.0, &population), 100);
    }

    #[test]
    fn mid_population_value_ranks_by_position() {
        let population = [10.0, 20.0, 30.0, 40.0];
        // First member >= 30.0 sits at index 2 of 4.
        assert_eq!(percentile_rank(30.0, &population), 50);
    }

    #[test]
    fn empty_population_ranks_hundred() {
        assert_eq!(percentile_rank(5.0, &[]), 100);
    }

    #[test]
    fn non_finite_members_are_dropped() {
        let population = [f64::NAN, 10.0, f64::INFINITY, 20.0];
        assert_eq!(percentile_rank(10.0, &population), 0);
    }

    #[test]
    fn result_is_always_in_range() {
        let population = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        for value in [-10.0, 0.0, 1.0, 4.5, 9.0, 100.0] {
            assert!(percentile_rank(value, &population) <= 100);
        }
    }

    #[test]
    fn median_of_odd_and_even_populations() {
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
