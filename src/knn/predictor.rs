use hashbrown::HashMap;

use crate::io::EntityId;
use crate::knn::rating_store::RatingStore;
use crate::knn::{top_scored, Neighbor, Prediction};

/// Running weighted-sum / weight-sum pair for one candidate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Accumulated {
    pub weighted_sum: f64,
    pub weight_sum: f64,
}

impl Accumulated {
    fn add(&mut self, rating: f64, similarity: f64) {
        self.weighted_sum += rating * similarity;
        self.weight_sum += similarity;
    }

    /// Similarity-weighted average; 0 when the weights cancel out or are all 0.
    pub fn predicted_rating(&self) -> f64 {
        if self.weight_sum == 0.0 {
            0.0
        } else {
            self.weighted_sum / self.weight_sum
        }
    }

    /// The weighted average, or `None` when the neighbors carry no similarity weight.
    pub fn informative_rating(&self) -> Option<f64> {
        if self.weight_sum == 0.0 {
            return None;
        }
        Some(self.predicted_rating()).filter(|rating| !rating.is_nan())
    }
}

/// Collects neighbor ratings for every target the subject has not rated yet.
///
/// The returned map is owned by the caller and never shared between calls.
pub fn accumulate(
    store: &RatingStore,
    subject: EntityId,
    neighbors: &[Neighbor],
) -> HashMap<EntityId, Accumulated> {
    let mut candidates: HashMap<EntityId, Accumulated> = HashMap::new();

    for neighbor in neighbors {
        for (candidate, rating) in store.rated_by(neighbor.id) {
            if store.has_rated(subject, *candidate) {
                continue;
            }
            candidates
                .entry(*candidate)
                .or_default()
                .add(*rating, neighbor.score);
        }
    }

    candidates
}

/// Predicted ratings for the targets rated by `neighbors` but not by `subject`, best first.
///
/// Candidates whose prediction is NaN are dropped. `top_k` truncates the list;
/// `None` returns every candidate.
pub fn predict(
    store: &RatingStore,
    subject: EntityId,
    neighbors: &[Neighbor],
    top_k: Option<usize>,
) -> Vec<Prediction> {
    let predictions = accumulate(store, subject, neighbors)
        .into_iter()
        .map(|(candidate, accumulated)| Prediction::new(candidate, accumulated.predicted_rating()))
        .filter(|prediction| !prediction.score.is_nan());

    top_scored(predictions, top_k)
}
