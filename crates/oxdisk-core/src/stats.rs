//! Multi-pass reduction: pass-count clamping, trimmed mean and sample capture.

// Allow numeric casts - rates are f64, counts are usize/u64
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use crate::config::{MAX_PASSES, MAX_SAMPLES};
use crate::result::Sample;

/// Trimming needs at least this many valid passes.
pub const MIN_PASSES_FOR_TRIM: usize = 3;

/// Clamp a requested pass count into `1..=MAX_PASSES`.
pub fn clamp_pass_count(requested: u32) -> u32 {
    requested.clamp(1, MAX_PASSES)
}

/// Aggregate of the per-pass rates that counted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reduction {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Passes that contributed to `mean`.
    pub effective_passes: usize,
}

/// Reduce per-pass rates to a single value.
///
/// With `trimmed` set and at least [`MIN_PASSES_FOR_TRIM`] rates, one minimum
/// and one maximum (first occurrences) are dropped and the rest averaged; the
/// reported min/max are those of the remaining values. Otherwise every rate is
/// averaged. Returns `None` for an empty slice.
pub fn reduce(rates: &[f64], trimmed: bool) -> Option<Reduction> {
    if rates.is_empty() {
        return None;
    }

    if trimmed && rates.len() >= MIN_PASSES_FOR_TRIM {
        let min_idx = first_index_by(rates, None, |a, b| a < b);
        let max_idx = first_index_by(rates, Some(min_idx), |a, b| a > b);
        let kept: Vec<f64> = rates
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != min_idx && *i != max_idx)
            .map(|(_, v)| *v)
            .collect();
        return Some(summarize(&kept));
    }

    Some(summarize(rates))
}

/// Index of the first element that wins `better` against all others, skipping `exclude`.
fn first_index_by(values: &[f64], exclude: Option<usize>, better: impl Fn(f64, f64) -> bool) -> usize {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if Some(i) == exclude {
            continue;
        }
        match best {
            Some(b) if !better(v, values[b]) => {}
            _ => best = Some(i),
        }
    }
    best.unwrap_or(0)
}

fn summarize(values: &[f64]) -> Reduction {
    let sum: f64 = values.iter().sum();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Reduction {
        mean: sum / values.len() as f64,
        min,
        max,
        effective_passes: values.len(),
    }
}

/// Integer mean of per-pass IOPS.
pub fn integer_mean(values: &[f64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    (values.iter().sum::<f64>() / values.len() as f64) as u64
}

/// Time series capped at [`MAX_SAMPLES`] entries; further samples are dropped.
#[derive(Debug, Clone, Default)]
pub struct SampleSeries {
    samples: Vec<Sample>,
    dropped: usize,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample. Returns `false` once the cap is reached.
    pub fn push(&mut self, time_offset: f64, value: f64) -> bool {
        if self.samples.len() >= MAX_SAMPLES {
            self.dropped += 1;
            return false;
        }
        self.samples.push(Sample { time_offset, value });
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples that did not fit.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_vec(self) -> Vec<Sample> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_trimmed_mean_drops_extremes() {
        let r = reduce(&[10.0, 20.0, 30.0], true).unwrap();
        assert!(approx(r.mean, 20.0));
        assert_eq!(r.effective_passes, 1);
        assert!(approx(r.min, 20.0));
        assert!(approx(r.max, 20.0));
    }

    #[test]
    fn test_plain_mean_without_trim() {
        let r = reduce(&[10.0, 20.0, 30.0], false).unwrap();
        assert!(approx(r.mean, 20.0));
        assert_eq!(r.effective_passes, 3);
        assert!(approx(r.min, 10.0));
        assert!(approx(r.max, 30.0));
    }

    #[test]
    fn test_trim_skipped_below_three_passes() {
        let r = reduce(&[10.0, 30.0], true).unwrap();
        assert!(approx(r.mean, 20.0));
        assert_eq!(r.effective_passes, 2);
        assert!(approx(r.min, 10.0));
        assert!(approx(r.max, 30.0));
    }

    #[test]
    fn test_trim_with_duplicates_drops_one_of_each() {
        let r = reduce(&[5.0, 5.0, 9.0, 9.0, 7.0], true).unwrap();
        assert_eq!(r.effective_passes, 3);
        assert!(approx(r.mean, 7.0));
        assert!(approx(r.min, 5.0));
        assert!(approx(r.max, 9.0));
    }

    #[test]
    fn test_trim_all_equal_drops_two() {
        let r = reduce(&[4.0, 4.0, 4.0, 4.0], true).unwrap();
        assert_eq!(r.effective_passes, 2);
        assert!(approx(r.mean, 4.0));
    }

    #[test]
    fn test_empty_reduction() {
        assert!(reduce(&[], true).is_none());
        assert!(reduce(&[], false).is_none());
    }

    #[test]
    fn test_integer_mean() {
        assert_eq!(integer_mean(&[100.0, 101.0]), 100);
        assert_eq!(integer_mean(&[]), 0);
    }

    #[test]
    fn test_sample_cap() {
        let mut series = SampleSeries::new();
        for i in 0..1500 {
            series.push(f64::from(i), 1.0);
        }
        assert_eq!(series.len(), MAX_SAMPLES);
        assert_eq!(series.dropped(), 1500 - MAX_SAMPLES);
        assert!(approx(series.as_slice()[MAX_SAMPLES - 1].time_offset, 1023.0));
    }

    #[test]
    fn test_clamp_examples() {
        assert_eq!(clamp_pass_count(0), 1);
        assert_eq!(clamp_pass_count(5), 5);
        assert_eq!(clamp_pass_count(25), MAX_PASSES);
    }

    proptest! {
        #[test]
        fn prop_clamp_in_range(n in 0u32..=25) {
            let c = clamp_pass_count(n);
            prop_assert!((1..=MAX_PASSES).contains(&c));
            if (1..=MAX_PASSES).contains(&n) {
                prop_assert_eq!(c, n);
            }
        }

        #[test]
        fn prop_trimmed_effective_passes(rates in proptest::collection::vec(0.1f64..1e4, 1..20)) {
            let r = reduce(&rates, true).unwrap();
            let expected = if rates.len() >= MIN_PASSES_FOR_TRIM { rates.len() - 2 } else { rates.len() };
            prop_assert_eq!(r.effective_passes, expected);
            prop_assert!(r.min <= r.mean + 1e-9 && r.mean <= r.max + 1e-9);
        }
    }
}
