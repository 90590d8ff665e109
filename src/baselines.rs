use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use tracing::info;

use crate::io::{EntityId, ItemId, Rating, UserId};
use crate::knn::batch::Estimate;
use crate::knn::{top_scored, Filtering, ScoredEntity};

/// Predicts every rating of a subject as that subject's mean training rating.
pub struct MeanRating {
    filtering: Filtering,
    subject_means: HashMap<EntityId, f64>,
}

impl MeanRating {
    pub fn new(ratings: &[Rating], filtering: Filtering) -> MeanRating {
        let mut sums: HashMap<EntityId, (f64, usize)> = HashMap::new();
        for rating in ratings {
            let (subject, _) = filtering.orient(rating.user, rating.item);
            let (sum, qty) = sums.entry(subject).or_insert((0.0, 0));
            *sum += rating.rating;
            *qty += 1;
        }
        let subject_means: HashMap<EntityId, f64> = sums
            .into_iter()
            .map(|(subject, (sum, qty))| (subject, sum / qty as f64))
            .collect();
        info!(qty_subjects = subject_means.len(), "fitted mean rating baseline");

        MeanRating {
            filtering,
            subject_means,
        }
    }

    /// Subjects without training ratings get `NoInformation`.
    pub fn estimate(&self, user: UserId, item: ItemId) -> Estimate {
        let (subject, _) = self.filtering.orient(user, item);
        self.subject_means
            .get(&subject)
            .filter(|mean| !mean.is_nan())
            .map(|mean| Estimate::Predicted(*mean))
            .unwrap_or(Estimate::NoInformation)
    }

    pub fn predict_batch(&self, queries: &[(UserId, ItemId)]) -> Vec<Estimate> {
        queries
            .par_iter()
            .map(|(user, item)| self.estimate(*user, *item))
            .collect()
    }
}

/// Recommends the targets with the most training ratings that the subject has not rated yet.
pub struct MostPop {
    targets_by_popularity: Vec<ScoredEntity>,
    seen: HashMap<EntityId, HashSet<EntityId>>,
}

impl MostPop {
    pub fn new(ratings: &[Rating], filtering: Filtering) -> MostPop {
        let mut counts: HashMap<EntityId, usize> = HashMap::new();
        let mut seen: HashMap<EntityId, HashSet<EntityId>> = HashMap::new();
        for rating in ratings {
            let (subject, target) = filtering.orient(rating.user, rating.item);
            if seen.entry(subject).or_default().insert(target) {
                *counts.entry(target).or_insert(0) += 1;
            }
        }
        let targets_by_popularity = top_scored(
            counts
                .into_iter()
                .map(|(target, qty)| ScoredEntity::new(target, qty as f64)),
            None,
        );

        MostPop {
            targets_by_popularity,
            seen,
        }
    }

    /// The `how_many` most rated unseen targets, scored by their rating count.
    pub fn recommend(&self, subject: EntityId, how_many: usize) -> Vec<ScoredEntity> {
        let seen = self.seen.get(&subject);
        self.targets_by_popularity
            .iter()
            .filter(|scored| seen.map_or(true, |targets| !targets.contains(&scored.id)))
            .take(how_many)
            .copied()
            .collect()
    }
}
