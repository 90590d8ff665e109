use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::KnnError;
use crate::io::{ItemId, UserId};
use crate::knn::model::KnnModel;
use crate::knn::neighborhood::Deadline;
use crate::knn::similarity::Similarity;
use crate::stopwatch::Stopwatch;

/// Outcome of a single `(user, item)` query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Estimate {
    Predicted(f64),
    /// No neighbor with a nonzero similarity rated the target, or the subject rated it already.
    NoInformation,
    TimedOut,
}

impl Estimate {
    pub fn value(&self) -> Option<f64> {
        match self {
            Estimate::Predicted(value) => Some(*value),
            _ => None,
        }
    }

    /// Collapses missing estimates to 0, so "no information" and a predicted 0 look the same.
    pub fn value_or_zero(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }

    pub fn is_predicted(&self) -> bool {
        matches!(self, Estimate::Predicted(_))
    }
}

#[derive(Clone, Debug)]
pub struct BatchOptions {
    pub k: usize,
    pub metric: Similarity,
    /// Time budget per query.
    pub timeout: Option<Duration>,
    pub show_progress: bool,
}

impl BatchOptions {
    pub fn new(k: usize, metric: Similarity) -> Self {
        BatchOptions {
            k,
            metric,
            timeout: None,
            show_progress: false,
        }
    }

    pub fn validate(&self) -> Result<(), KnnError> {
        if self.k == 0 {
            return Err(KnnError::InvalidNeighborhoodSize(self.k));
        }
        Ok(())
    }
}

pub struct BatchReport {
    /// One estimate per query, in query order.
    pub estimates: Vec<Estimate>,
    pub stopwatch: Stopwatch,
}

impl BatchReport {
    pub fn scores(&self) -> Vec<f64> {
        self.estimates.iter().map(Estimate::value_or_zero).collect()
    }
}

impl KnnModel {
    /// Estimates every `(user, item)` query in parallel.
    ///
    /// Queries are independent; the output keeps the order of `queries`. A query
    /// that runs out of time becomes `TimedOut` without affecting the others.
    pub fn predict_batch(
        &self,
        queries: &[(UserId, ItemId)],
        options: &BatchOptions,
    ) -> Result<BatchReport, KnnError> {
        options.validate()?;
        let start_time = Instant::now();
        let progress = if options.show_progress {
            ProgressBar::new(queries.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let timed: Vec<(Estimate, Duration)> = queries
            .par_iter()
            .map(|(user, item)| -> Result<(Estimate, Duration), KnnError> {
                let query_start = Instant::now();
                let estimate = self.estimate(*user, *item, options)?;
                progress.inc(1);
                Ok((estimate, query_start.elapsed()))
            })
            .collect::<Result<_, _>>()?;
        progress.finish_and_clear();

        let mut stopwatch = Stopwatch::new();
        let mut estimates = Vec::with_capacity(timed.len());
        for (position, (estimate, duration)) in timed.into_iter().enumerate() {
            stopwatch.record(position, duration);
            estimates.push(estimate);
        }

        let qty_predicted = estimates.iter().filter(|e| e.is_predicted()).count();
        let qty_timed_out = estimates
            .iter()
            .filter(|e| matches!(e, Estimate::TimedOut))
            .count();
        if qty_timed_out > 0 {
            warn!(qty_timed_out, timeout = ?options.timeout, "queries exceeded their time budget");
        }
        info!(
            filtering = %self.filtering(),
            metric = %options.metric,
            k = options.k,
            qty_queries = estimates.len(),
            qty_predicted,
            millis = start_time.elapsed().as_millis() as u64,
            "predicted batch"
        );

        Ok(BatchReport {
            estimates,
            stopwatch,
        })
    }

    /// Scores aligned with `queries`, using 0 wherever there is no prediction.
    pub fn predict_batch_scores(
        &self,
        queries: &[(UserId, ItemId)],
        k: usize,
        metric: Similarity,
    ) -> Result<Vec<f64>, KnnError> {
        Ok(self
            .predict_batch(queries, &BatchOptions::new(k, metric))?
            .scores())
    }

    pub fn estimate(
        &self,
        user: UserId,
        item: ItemId,
        options: &BatchOptions,
    ) -> Result<Estimate, KnnError> {
        options.validate()?;
        let deadline = options.timeout.map(Deadline::after);
        self.estimate_before(user, item, options, deadline.as_ref())
    }

    fn estimate_before(
        &self,
        user: UserId,
        item: ItemId,
        options: &BatchOptions,
        deadline: Option<&Deadline>,
    ) -> Result<Estimate, KnnError> {
        let (subject, target) = self.filtering().orient(user, item);
        match self.evidence_before(subject, target, options.k, options.metric, deadline) {
            Ok(evidence) => Ok(evidence
                .and_then(|accumulated| accumulated.informative_rating())
                .map(Estimate::Predicted)
                .unwrap_or(Estimate::NoInformation)),
            Err(KnnError::Timeout(_)) => Ok(Estimate::TimedOut),
            Err(error) => Err(error),
        }
    }
}
