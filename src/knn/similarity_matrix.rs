use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use tracing::info;

use crate::io::EntityId;
use crate::knn::rating_store::RatingStore;
use crate::knn::similarity::{Similarity, SimilarityComputation};

/// Precomputed pairwise similarities for every subject of a store.
///
/// Only pairs with at least one co-rated target and a nonzero score are kept;
/// every other pair scores 0, which is also what the metric would return. Rows
/// are sorted by neighbor id and looked up with a binary search.
pub struct SimilarityMatrix {
    metric: Similarity,
    subject_to_scores_sorted: HashMap<EntityId, Vec<(EntityId, f64)>>,
    qty_pairs: usize,
}

impl SimilarityMatrix {
    pub fn precompute(store: &RatingStore, metric: Similarity) -> Self {
        let start_time = Instant::now();

        let subject_to_scores_sorted: HashMap<EntityId, Vec<(EntityId, f64)>> = store
            .distinct_subjects()
            .par_iter()
            .map(|subject| (*subject, Self::compute_row(store, metric, *subject)))
            .collect();

        let qty_pairs = subject_to_scores_sorted.values().map(Vec::len).sum();
        info!(
            %metric,
            qty_subjects = store.distinct_subjects().len(),
            qty_pairs,
            micros = start_time.elapsed().as_micros() as u64,
            "precomputed similarity matrix"
        );

        SimilarityMatrix {
            metric,
            subject_to_scores_sorted,
            qty_pairs,
        }
    }

    fn compute_row(store: &RatingStore, metric: Similarity, subject: EntityId) -> Vec<(EntityId, f64)> {
        // subjects sharing at least one target; all others score 0 anyway
        let mut co_raters: HashSet<EntityId> = HashSet::new();
        for target in store.history(subject) {
            co_raters.extend(store.raters_of(target).iter().copied());
        }
        co_raters.remove(&subject);

        let own_ratings = store.rated_by(subject);
        let mut row: Vec<(EntityId, f64)> = co_raters
            .into_iter()
            .map(|other| (other, metric.score(own_ratings, store.rated_by(other))))
            .filter(|(_, score)| *score != 0.0)
            .collect();
        row.sort_unstable_by_key(|(other, _)| *other);
        row
    }

    /// Number of stored (directed) nonzero pairs.
    pub fn qty_pairs(&self) -> usize {
        self.qty_pairs
    }
}

impl SimilarityComputation for SimilarityMatrix {
    fn similarity(&self, left: EntityId, right: EntityId) -> f64 {
        self.subject_to_scores_sorted
            .get(&left)
            .and_then(|row| {
                row.binary_search_by_key(&right, |(other, _)| *other)
                    .ok()
                    .map(|index| row[index].1)
            })
            .unwrap_or(0.0)
    }

    fn metric(&self) -> Similarity {
        self.metric
    }
}

#[cfg(test)]
mod similarity_matrix_test {
    use super::*;
    use crate::knn::similarity::OnTheFly;

    fn store() -> RatingStore {
        RatingStore::from_triples(vec![
            (1, 10, 5.0),
            (1, 11, 3.0),
            (1, 12, 1.0),
            (2, 10, 4.0),
            (2, 11, 3.5),
            (3, 10, 1.0),
            (3, 12, 5.0),
            (4, 13, 2.0),
            (5, 10, 3.0),
            (5, 11, 3.0),
        ])
    }

    #[test]
    fn should_match_on_the_fly_scores() {
        let store = store();
        for metric in [Similarity::Pearson, Similarity::Cosine] {
            let matrix = SimilarityMatrix::precompute(&store, metric);
            let on_the_fly = OnTheFly::new(&store, metric);
            for left in store.distinct_subjects() {
                for right in store.distinct_subjects() {
                    if left != right {
                        assert_eq!(
                            on_the_fly.similarity(*left, *right),
                            matrix.similarity(*left, *right),
                            "{} similarity of {} and {}",
                            metric,
                            left,
                            right
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn should_skip_pairs_without_co_rated_targets() {
        let store = store();
        let matrix = SimilarityMatrix::precompute(&store, Similarity::Cosine);
        assert_eq!(0.0, matrix.similarity(4, 1));
        assert_eq!(0.0, matrix.similarity(99, 1));
        // 4 shares nothing, so only pairs among 1, 2, 3 and 5 remain
        assert_eq!(12, matrix.qty_pairs());
    }
}
