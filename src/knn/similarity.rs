use std::fmt;
use std::str::FromStr;

use crate::error::KnnError;
use crate::io::{EntityId, RatingValue};
use crate::knn::rating_store::RatingStore;

/// Closed set of supported similarity measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Similarity {
    Pearson,
    Cosine,
}

impl Similarity {
    pub fn name(&self) -> &'static str {
        match self {
            Similarity::Pearson => "pearson",
            Similarity::Cosine => "cosine",
        }
    }

    /// Scores two rating histories, each sorted ascending by counterpart id.
    pub fn score(
        &self,
        left: &[(EntityId, RatingValue)],
        right: &[(EntityId, RatingValue)],
    ) -> f64 {
        match self {
            Similarity::Pearson => pearson(left, right),
            Similarity::Cosine => cosine(left, right),
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Similarity {
    type Err = KnnError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pearson" => Ok(Similarity::Pearson),
            "cosine" => Ok(Similarity::Cosine),
            _ => Err(KnnError::UnsupportedMetric(name.to_owned())),
        }
    }
}

/// Source of pairwise similarity scores between subjects of one store.
pub trait SimilarityComputation {
    fn similarity(&self, left: EntityId, right: EntityId) -> f64;

    fn metric(&self) -> Similarity;
}

/// Computes every score on demand from the rating store.
pub struct OnTheFly<'a> {
    store: &'a RatingStore,
    metric: Similarity,
}

impl<'a> OnTheFly<'a> {
    pub fn new(store: &'a RatingStore, metric: Similarity) -> Self {
        OnTheFly { store, metric }
    }
}

impl SimilarityComputation for OnTheFly<'_> {
    fn similarity(&self, left: EntityId, right: EntityId) -> f64 {
        self.metric
            .score(self.store.rated_by(left), self.store.rated_by(right))
    }

    fn metric(&self) -> Similarity {
        self.metric
    }
}

/// Walks two id-sorted histories in lockstep and yields the rating pairs of the co-rated set.
pub fn co_rated<'a>(
    left: &'a [(EntityId, RatingValue)],
    right: &'a [(EntityId, RatingValue)],
) -> impl Iterator<Item = (RatingValue, RatingValue)> + 'a {
    let mut left = left.iter().peekable();
    let mut right = right.iter().peekable();
    std::iter::from_fn(move || loop {
        let (left_id, left_rating) = **left.peek()?;
        let (right_id, right_rating) = **right.peek()?;
        if left_id < right_id {
            left.next();
        } else if left_id > right_id {
            right.next();
        } else {
            left.next();
            right.next();
            return Some((left_rating, right_rating));
        }
    })
}

/// Pearson correlation with means taken over the co-rated set only.
pub fn pearson(left: &[(EntityId, RatingValue)], right: &[(EntityId, RatingValue)]) -> f64 {
    let mut qty = 0_usize;
    let mut sum_left = 0_f64;
    let mut sum_right = 0_f64;
    for (l, r) in co_rated(left, right) {
        qty += 1;
        sum_left += l;
        sum_right += r;
    }
    if qty == 0 {
        return 0.0;
    }
    let mean_left = sum_left / qty as f64;
    let mean_right = sum_right / qty as f64;

    let mut numerator = 0_f64;
    let mut squares_left = 0_f64;
    let mut squares_right = 0_f64;
    for (l, r) in co_rated(left, right) {
        let centered_left = l - mean_left;
        let centered_right = r - mean_right;
        numerator += centered_left * centered_right;
        squares_left += centered_left * centered_left;
        squares_right += centered_right * centered_right;
    }

    let denominator = squares_left.sqrt() * squares_right.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Cosine of the two rating vectors restricted to the co-rated set.
pub fn cosine(left: &[(EntityId, RatingValue)], right: &[(EntityId, RatingValue)]) -> f64 {
    let mut dot = 0_f64;
    let mut squares_left = 0_f64;
    let mut squares_right = 0_f64;
    for (l, r) in co_rated(left, right) {
        dot += l * r;
        squares_left += l * l;
        squares_right += r * r;
    }
    // also covers the empty co-rated set
    let denominator = squares_left.sqrt() * squares_right.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    dot / denominator
}

#[cfg(test)]
mod similarity_test {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn should_intersect_sorted_histories() {
        let left = [(1, 1.0), (3, 3.0), (5, 5.0), (9, 9.0)];
        let right = [(2, 20.0), (3, 30.0), (9, 90.0), (10, 100.0)];
        let pairs: Vec<_> = co_rated(&left, &right).collect();
        assert_eq!(vec![(3.0, 30.0), (9.0, 90.0)], pairs);
    }

    #[test]
    fn should_score_zero_without_co_rated_targets() {
        let left = [(1, 4.0), (2, 5.0)];
        let right = [(3, 4.0), (4, 5.0)];
        assert_eq!(0.0, pearson(&left, &right));
        assert_eq!(0.0, cosine(&left, &right));
        assert_eq!(0.0, cosine(&[], &right));
    }

    #[test]
    fn should_score_zero_pearson_for_constant_ratings() {
        let left = [(1, 3.0), (2, 3.0), (3, 3.0)];
        let right = [(1, 3.0), (2, 3.0), (3, 3.0)];
        let score = pearson(&left, &right);
        assert_eq!(0.0, score);
        assert!(!score.is_nan());
    }

    #[test]
    fn should_use_co_rated_means_for_pearson() {
        // the rating on target 9 must not shift the mean of `left`
        let left = [(1, 1.0), (2, 2.0), (3, 3.0), (9, 100.0)];
        let right = [(1, 2.0), (2, 4.0), (3, 6.0)];
        assert!(approx_eq!(f64, 1.0, pearson(&left, &right), ulps = 4));

        let inverted = [(1, 6.0), (2, 4.0), (3, 2.0)];
        assert!(approx_eq!(f64, -1.0, pearson(&left, &inverted), ulps = 4));
    }

    #[test]
    fn should_compute_cosine_over_co_rated_set() {
        let left = [(1, 5.0), (2, 3.0), (7, 1.0)];
        let right = [(1, 5.0), (2, 1.0), (3, 4.0)];
        let expected = (25.0 + 3.0) / (34.0_f64.sqrt() * 26.0_f64.sqrt());
        assert!(approx_eq!(f64, expected, cosine(&left, &right), ulps = 4));
    }

    #[test]
    fn should_score_zero_cosine_for_zero_vectors() {
        let left = [(1, 0.0), (2, 0.0)];
        let right = [(1, 4.0), (2, 5.0)];
        assert_eq!(0.0, cosine(&left, &right));
    }

    #[test]
    fn should_parse_metric_names() {
        assert_eq!(Similarity::Pearson, "pearson".parse().unwrap());
        assert_eq!(Similarity::Cosine, " Cosine ".parse().unwrap());
        let error = "jaccard".parse::<Similarity>().unwrap_err();
        assert!(matches!(error, KnnError::UnsupportedMetric(name) if name == "jaccard"));
    }

    fn history() -> impl Strategy<Value = Vec<(EntityId, RatingValue)>> {
        proptest::collection::btree_map(0_u64..30, 0_u8..=10, 0..20).prop_map(|ratings| {
            ratings
                .into_iter()
                .map(|(target, half_stars)| (target, half_stars as f64 / 2.0))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn similarity_is_symmetric(left in history(), right in history()) {
            prop_assert_eq!(pearson(&left, &right), pearson(&right, &left));
            prop_assert_eq!(cosine(&left, &right), cosine(&right, &left));
        }

        #[test]
        fn similarity_is_never_nan(left in history(), right in history()) {
            prop_assert!(!pearson(&left, &right).is_nan());
            prop_assert!(!cosine(&left, &right).is_nan());
        }
    }
}
