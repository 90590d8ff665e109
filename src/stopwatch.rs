use std::time::Duration;

use tdigest::TDigest;

/// Wall-clock durations of individual queries, keyed by query position.
#[derive(Clone, Default, Debug)]
pub struct Stopwatch {
    query_durations: Vec<PositionDurationMicros>,
}

pub type PositionDurationMicros = (usize, f64);

impl Stopwatch {
    pub fn new() -> Stopwatch {
        Stopwatch {
            query_durations: Vec::new(),
        }
    }

    pub fn record(&mut self, position: usize, duration: Duration) {
        self.query_durations
            .push((position, duration.as_micros() as f64));
    }

    pub fn len(&self) -> usize {
        self.query_durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query_durations.is_empty()
    }

    /// Estimated quantile of the recorded durations, `q` in `[0, 1]`.
    pub fn percentile_in_micros(&self, q: f64) -> f64 {
        if self.query_durations.is_empty() {
            return 0.0;
        }
        let t_digest = TDigest::new_with_size(100);
        let durations = self
            .query_durations
            .iter()
            .map(|(_, micros)| *micros)
            .collect();
        let sorted_digest = t_digest.merge_unsorted(durations);
        sorted_digest.estimate_quantile(q)
    }

    pub fn mean_in_micros(&self) -> f64 {
        if self.query_durations.is_empty() {
            return 0.0;
        }
        let total: f64 = self.query_durations.iter().map(|(_, micros)| micros).sum();
        total / self.query_durations.len() as f64
    }

    pub fn raw_durations(&self) -> &[PositionDurationMicros] {
        &self.query_durations
    }
}

#[cfg(test)]
mod stopwatch_test {
    use super::*;

    #[test]
    fn should_estimate_percentiles() {
        let mut stopwatch = Stopwatch::new();
        for position in 0..100 {
            stopwatch.record(position, Duration::from_micros(position as u64 + 1));
        }
        assert_eq!(100, stopwatch.len());
        assert_eq!(50.5, stopwatch.mean_in_micros());
        let p99 = stopwatch.percentile_in_micros(0.99);
        assert!(p99 > 90.0 && p99 <= 100.0, "p99 was {}", p99);
        assert_eq!((0, 1.0), stopwatch.raw_durations()[0]);
    }

    #[test]
    fn should_report_zero_without_records() {
        let stopwatch = Stopwatch::new();
        assert!(stopwatch.is_empty());
        assert_eq!(0.0, stopwatch.percentile_in_micros(0.5));
        assert_eq!(0.0, stopwatch.mean_in_micros());
    }
}
