//! Median-based outlier detection.
//!
//! Failure rates and latencies are heavy-tailed, so a couple of very bad
//! endpoints would drag a mean/stddev threshold up until they no longer look
//! unusual. The split here uses the median and the median absolute deviation
//! (MAD) instead: `v` is an outlier iff `compare(v, median + multiplier * MAD)`.

use std::cmp::Ordering;

/// Two failure rates closer than this are treated as equal.
pub const FAILURE_RATE_TOLERANCE: f64 = 0.1;

/// Median of `values`; 0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Median of the absolute distances from the median.
pub fn median_absolute_deviation(values: &[f64]) -> f64 {
    let m = median(values);
    let distances: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&distances)
}

/// Flag each of `values` as an outlier (`true`) or not.
///
/// An even-sized input is padded with `sentinel` before the median and MAD
/// are taken, so that two values alone can still be told apart (the median
/// of `{0, 1}` would otherwise sit halfway between them). The flags are
/// returned for the original values only, in input order.
pub fn classify<F>(compare: F, multiplier: f64, sentinel: f64, values: &[f64]) -> Vec<bool>
where
    F: Fn(f64, f64) -> bool,
{
    if values.is_empty() {
        return Vec::new();
    }

    let mut padded = values.to_vec();
    if padded.len() % 2 == 0 {
        padded.push(sentinel);
    }

    let m = median(&padded);
    let threshold = m + multiplier * median_absolute_deviation(&padded);
    values.iter().map(|&v| compare(v, threshold)).collect()
}

/// Split `values` into distinct "good" and "bad" values.
///
/// Duplicates collapse, so `{0, 0}` yields `good = {0}`. Order of first
/// appearance is kept.
pub fn split_by_significant_deviation<F>(
    compare: F,
    multiplier: f64,
    sentinel: f64,
    values: &[f64],
) -> (Vec<f64>, Vec<f64>)
where
    F: Fn(f64, f64) -> bool,
{
    let verdicts = classify(compare, multiplier, sentinel, values);
    let mut good = Vec::new();
    let mut bad = Vec::new();
    for (&v, is_bad) in values.iter().zip(verdicts) {
        let set = if is_bad { &mut bad } else { &mut good };
        if !set.iter().any(|x: &f64| x.total_cmp(&v) == Ordering::Equal) {
            set.push(v);
        }
    }
    (good, bad)
}

/// Plain `a > b`, for flagging values above the central tendency.
pub fn greater_than(a: f64, b: f64) -> bool {
    a > b
}

/// `a` exceeds `b` by more than [`FAILURE_RATE_TOLERANCE`].
///
/// Noise-level differences between two samples of the same endpoint must
/// not be read as a change in behaviour.
pub fn significantly_greater(a: f64, b: f64) -> bool {
    a - b > FAILURE_RATE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(values: &[f64]) -> (Vec<f64>, Vec<f64>) {
        split_by_significant_deviation(greater_than, 1.5, 0.0, values)
    }

    fn sorted(mut v: Vec<f64>) -> Vec<f64> {
        v.sort_by(f64::total_cmp);
        v
    }

    #[test]
    fn median_of_odd_and_even_sets() {
        assert_eq!(median(&[0.1, 0.2]), (0.1 + 0.2) / 2.0);
        assert_eq!(median(&[0.3, 0.2, 0.5]), 0.3);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn mad_ignores_a_single_extreme() {
        assert_eq!(median_absolute_deviation(&[1.0, 1.0, 2.0, 2.0, 100.0]), 1.0);
    }

    #[test]
    fn split_failure_rates() {
        let cases: &[(&[f64], &[f64], &[f64])] = &[
            (&[0.0, 0.0], &[0.0], &[]),
            (&[0.0, 1.0], &[0.0], &[1.0]),
            (&[0.1, 0.1], &[0.1], &[]),
            (&[0.15, 0.1], &[0.1, 0.15], &[]),
            (&[0.01, 0.01], &[0.01], &[]),
            (&[0.012, 0.01, 1.0], &[0.01, 0.012], &[1.0]),
            (&[0.0, 0.0, 1.0, 1.0], &[0.0], &[1.0]),
            (&[0.0, 0.1, 0.1, 0.0], &[0.0], &[0.1]),
            (&[0.0, 0.01, 0.1, 0.0], &[0.0], &[0.01, 0.1]),
            (&[0.0, 0.01, 0.02, 1.0], &[0.0, 0.01, 0.02], &[1.0]),
            (
                &[0.0, 0.0, 0.0, 0.0, 0.0, 0.01, 0.02, 1.0],
                &[0.0],
                &[0.01, 0.02, 1.0],
            ),
        ];
        for (values, good, bad) in cases {
            let (g, b) = split(values);
            assert_eq!(sorted(g), good.to_vec(), "good split of {values:?}");
            assert_eq!(sorted(b), bad.to_vec(), "bad split of {values:?}");
        }
    }

    #[test]
    fn split_latencies_with_custom_sentinel() {
        // Milliseconds, padded with a zero latency.
        let (good, bad) =
            split_by_significant_deviation(greater_than, 1.5, 0.0, &[1.0, 2.0, 4.0, 40.0]);
        assert_eq!(good, vec![1.0, 2.0, 4.0]);
        assert_eq!(bad, vec![40.0]);

        let (good, bad) =
            split_by_significant_deviation(greater_than, 1.5, 0.0, &[40.0, 60.0, 1000.0]);
        assert_eq!(good, vec![40.0, 60.0]);
        assert_eq!(bad, vec![1000.0]);
    }

    #[test]
    fn classify_keeps_input_order() {
        assert_eq!(
            classify(greater_than, 1.5, 0.0, &[0.5, 0.0, 0.5, 0.0, 0.0]),
            vec![true, false, true, false, false]
        );
        assert!(classify(greater_than, 1.5, 0.0, &[]).is_empty());
    }

    #[test]
    fn tolerance_band() {
        assert!(!significantly_greater(0.19, 0.1));
        assert!(!significantly_greater(0.2, 0.19));
        assert!(!significantly_greater(0.1, 0.5));
        assert!(significantly_greater(0.5, 0.0));
        assert!(significantly_greater(0.35, 0.2));
    }
}
