use crate::io::{EntityId, RatingValue};
use crate::knn::batch::Estimate;

pub mod coverage;
pub mod evaluation_reporter;
pub mod mrr;
pub mod ndcg;
pub mod rating_error;

/// Quality of a ranked recommendation list against the held-out targets of its subject.
pub trait RankingMetric {
    fn add(&mut self, recommendations: &[EntityId], relevant: &[EntityId]);
    fn result(&self) -> f64;
    fn get_name(&self) -> String;
}

/// Accuracy of individual rating estimates against held-out ratings.
pub trait RatingMetric {
    fn add(&mut self, estimate: &Estimate, actual: RatingValue);
    fn result(&self) -> f64;
    fn get_name(&self) -> String;
}
