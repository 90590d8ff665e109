use tracing::{debug, info};

use crate::error::KnnError;
use crate::io::{EntityId, Rating};
use crate::knn::neighborhood::{most_similar, most_similar_before, Deadline};
use crate::knn::predictor::{accumulate, predict, Accumulated};
use crate::knn::rating_store::RatingStore;
use crate::knn::similarity::{OnTheFly, Similarity, SimilarityComputation};
use crate::knn::similarity_matrix::SimilarityMatrix;
use crate::knn::{Filtering, Neighbor, Prediction};

/// Neighborhood collaborative filtering over one rating snapshot.
///
/// The same model serves user-based and item-based filtering; `filtering`
/// decides which side of each rating acts as the subject. All methods take
/// subject ids in that orientation, except the batch methods, which take
/// `(user, item)` pairs.
pub struct KnnModel {
    filtering: Filtering,
    store: RatingStore,
    precomputed: Option<SimilarityMatrix>,
}

/// Similarity source used by a single query.
pub(crate) enum Scorer<'a> {
    OnTheFly(OnTheFly<'a>),
    Precomputed(&'a SimilarityMatrix),
}

impl SimilarityComputation for Scorer<'_> {
    fn similarity(&self, left: EntityId, right: EntityId) -> f64 {
        match self {
            Scorer::OnTheFly(scorer) => scorer.similarity(left, right),
            Scorer::Precomputed(matrix) => matrix.similarity(left, right),
        }
    }

    fn metric(&self) -> Similarity {
        match self {
            Scorer::OnTheFly(scorer) => scorer.metric(),
            Scorer::Precomputed(matrix) => matrix.metric(),
        }
    }
}

impl KnnModel {
    pub fn new(ratings: &[Rating], filtering: Filtering) -> Self {
        let store = RatingStore::new(ratings, filtering);
        info!(
            %filtering,
            qty_ratings = store.qty_ratings(),
            qty_subjects = store.distinct_subjects().len(),
            qty_targets = store.distinct_targets().len(),
            "created knn model"
        );
        KnnModel {
            filtering,
            store,
            precomputed: None,
        }
    }

    pub fn user_based(ratings: &[Rating]) -> Self {
        Self::new(ratings, Filtering::UserBased)
    }

    pub fn item_based(ratings: &[Rating]) -> Self {
        Self::new(ratings, Filtering::ItemBased)
    }

    /// Precomputes all pairwise similarities for `metric`.
    ///
    /// Queries with the same metric then read from the matrix; results are
    /// identical to computing the scores per query.
    pub fn with_precomputed_similarities(mut self, metric: Similarity) -> Self {
        self.precomputed = Some(SimilarityMatrix::precompute(&self.store, metric));
        self
    }

    pub fn filtering(&self) -> Filtering {
        self.filtering
    }

    pub fn store(&self) -> &RatingStore {
        &self.store
    }

    pub(crate) fn scorer(&self, metric: Similarity) -> Scorer<'_> {
        match &self.precomputed {
            Some(matrix) if matrix.metric() == metric => Scorer::Precomputed(matrix),
            _ => Scorer::OnTheFly(OnTheFly::new(&self.store, metric)),
        }
    }

    pub fn similarity(&self, left: EntityId, right: EntityId, metric: Similarity) -> f64 {
        self.scorer(metric).similarity(left, right)
    }

    pub fn most_similar(&self, subject: EntityId, k: usize, metric: Similarity) -> Vec<Neighbor> {
        most_similar(&self.store, &self.scorer(metric), subject, k)
    }

    /// Ranked predictions for the targets `subject` has not rated yet.
    pub fn recommend(
        &self,
        subject: EntityId,
        k: usize,
        metric: Similarity,
        top_k: Option<usize>,
    ) -> Vec<Prediction> {
        let neighbors = self.most_similar(subject, k, metric);
        debug!(subject, qty_neighbors = neighbors.len(), "found neighbors");
        predict(&self.store, subject, &neighbors, top_k)
    }

    /// Neighbor evidence for one `(subject, target)` pair, or `None` when no neighbor rated `target`.
    ///
    /// `deadline` is checked while scoring neighbors and once more before accumulating.
    pub(crate) fn evidence_before(
        &self,
        subject: EntityId,
        target: EntityId,
        k: usize,
        metric: Similarity,
        deadline: Option<&Deadline>,
    ) -> Result<Option<Accumulated>, KnnError> {
        let scorer = self.scorer(metric);
        let neighbors = match deadline {
            Some(deadline) => most_similar_before(&self.store, &scorer, subject, k, deadline)?,
            None => most_similar(&self.store, &scorer, subject, k),
        };
        if let Some(deadline) = deadline {
            deadline.check()?;
        }
        Ok(accumulate(&self.store, subject, &neighbors).remove(&target))
    }
}

#[cfg(test)]
mod model_test {
    use super::*;

    // U1 = 1, U2 = 2, U3 = 3; I1 = 11, I2 = 12, I3 = 13
    fn scenario() -> Vec<Rating> {
        vec![
            Rating::new(1, 11, 5.0),
            Rating::new(1, 12, 3.0),
            Rating::new(2, 11, 5.0),
            Rating::new(2, 12, 1.0),
            Rating::new(2, 13, 4.0),
            Rating::new(3, 11, 1.0),
        ]
    }

    #[test]
    fn should_predict_single_neighbor_rating_exactly() {
        let model = KnnModel::user_based(&scenario());

        // over their two co-rated items U1 and U2 correlate perfectly
        let neighbors = model.most_similar(1, 1, Similarity::Pearson);
        assert_eq!(vec![2], neighbors.iter().map(|n| n.id).collect::<Vec<_>>());
        let recommendations = model.recommend(1, 1, Similarity::Pearson, None);
        assert_eq!(vec![Prediction::new(13, 4.0)], recommendations);

        // U3 agrees with U1 on its single co-rated item, so cosine ranks it first
        let neighbors = model.most_similar(1, 1, Similarity::Cosine);
        assert_eq!(3, neighbors[0].id);
        assert!(model.recommend(1, 1, Similarity::Cosine, None).is_empty());
        let recommendations = model.recommend(1, 2, Similarity::Cosine, None);
        assert_eq!(vec![Prediction::new(13, 4.0)], recommendations);
    }

    #[test]
    fn should_swap_roles_for_item_based_filtering() {
        let model = KnnModel::item_based(&scenario());
        assert_eq!(Filtering::ItemBased, model.filtering());
        assert_eq!(&[11, 12, 13], model.store().distinct_subjects());

        // I3 was only rated by U2; its neighbors' other raters are U1 and U3
        let recommendations = model.recommend(13, 2, Similarity::Cosine, None);
        let users: Vec<EntityId> = recommendations.iter().map(|p| p.id).collect();
        assert!(users.iter().all(|user| *user != 2));
        assert!(users.contains(&1));
    }

    #[test]
    fn should_use_matching_precomputed_similarities() {
        let on_the_fly = KnnModel::user_based(&scenario());
        let precomputed =
            KnnModel::user_based(&scenario()).with_precomputed_similarities(Similarity::Cosine);

        assert!(matches!(precomputed.scorer(Similarity::Cosine), Scorer::Precomputed(_)));
        assert!(matches!(precomputed.scorer(Similarity::Pearson), Scorer::OnTheFly(_)));
        for metric in [Similarity::Pearson, Similarity::Cosine] {
            for subject in [1, 2, 3] {
                assert_eq!(
                    on_the_fly.recommend(subject, 2, metric, None),
                    precomputed.recommend(subject, 2, metric, None)
                );
            }
        }
    }

    #[test]
    fn should_report_symmetric_similarities() {
        let model = KnnModel::user_based(&scenario());
        for metric in [Similarity::Pearson, Similarity::Cosine] {
            for left in [1, 2, 3] {
                for right in [1, 2, 3] {
                    assert_eq!(
                        model.similarity(left, right, metric),
                        model.similarity(right, left, metric)
                    );
                }
            }
        }
        // U2 and U3 share one item only, so Pearson has zero variance
        assert_eq!(0.0, model.similarity(2, 3, Similarity::Pearson));
    }
}
