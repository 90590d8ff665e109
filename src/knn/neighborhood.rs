use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::error::KnnError;
use crate::io::EntityId;
use crate::knn::rating_store::RatingStore;
use crate::knn::similarity::SimilarityComputation;
use crate::knn::{top_scored, Neighbor};

/// Point in time after which a query gives up.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Deadline {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// Fails once the budget is used up; a zero budget is expired from the start.
    pub fn check(&self) -> Result<(), KnnError> {
        if Instant::now() >= self.at {
            Err(KnnError::Timeout(self.budget))
        } else {
            Ok(())
        }
    }
}

/// The `k` subjects most similar to `subject`, best first.
///
/// Every other subject in the store is scored, including those with a score of 0
/// or below; `subject` itself is never part of the result.
pub fn most_similar<S>(store: &RatingStore, scorer: &S, subject: EntityId, k: usize) -> Vec<Neighbor>
where
    S: SimilarityComputation + Sync,
{
    let scored: Vec<Neighbor> = store
        .distinct_subjects()
        .par_iter()
        .filter(|other| **other != subject)
        .map(|other| Neighbor::new(*other, scorer.similarity(subject, *other)))
        .collect();

    top_scored(scored, Some(k))
}

/// Same as [`most_similar`], but stops scoring once `deadline` has passed.
pub fn most_similar_before<S>(
    store: &RatingStore,
    scorer: &S,
    subject: EntityId,
    k: usize,
    deadline: &Deadline,
) -> Result<Vec<Neighbor>, KnnError>
where
    S: SimilarityComputation + Sync,
{
    let scored = store
        .distinct_subjects()
        .par_iter()
        .filter(|other| **other != subject)
        .map(|other| {
            deadline.check()?;
            Ok(Neighbor::new(*other, scorer.similarity(subject, *other)))
        })
        .collect::<Result<Vec<Neighbor>, KnnError>>()?;

    Ok(top_scored(scored, Some(k)))
}

#[cfg(test)]
mod neighborhood_test {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::knn::similarity::{OnTheFly, Similarity};

    fn scenario_store() -> RatingStore {
        RatingStore::from_triples(vec![
            (1, 1, 5.0),
            (1, 2, 3.0),
            (2, 1, 5.0),
            (2, 2, 1.0),
            (2, 3, 4.0),
            (3, 1, 1.0),
        ])
    }

    #[test]
    fn should_rank_most_similar_subjects() {
        let store = scenario_store();
        let scorer = OnTheFly::new(&store, Similarity::Cosine);
        let neighbors = most_similar(&store, &scorer, 1, 2);

        assert_eq!(2, neighbors.len());
        // 1 and 3 share one target, so their cosine is exactly 1
        assert_eq!(3, neighbors[0].id);
        assert_eq!(1.0, neighbors[0].score);
        assert_eq!(2, neighbors[1].id);
        let expected = 28.0 / (34.0_f64.sqrt() * 26.0_f64.sqrt());
        assert!(approx_eq!(f64, expected, neighbors[1].score, ulps = 4));
    }

    #[test]
    fn should_break_ties_by_descending_id() {
        let store = RatingStore::from_triples(vec![
            (1, 1, 4.0),
            (2, 9, 4.0),
            (3, 9, 4.0),
            (4, 9, 4.0),
        ]);
        let scorer = OnTheFly::new(&store, Similarity::Pearson);
        let ids: Vec<EntityId> = most_similar(&store, &scorer, 1, 2)
            .iter()
            .map(|neighbor| neighbor.id)
            .collect();
        assert_eq!(vec![4, 3], ids);
    }

    #[test]
    fn should_return_nothing_for_empty_or_single_subject_store() {
        let empty = RatingStore::from_triples(vec![]);
        let scorer = OnTheFly::new(&empty, Similarity::Cosine);
        assert!(most_similar(&empty, &scorer, 1, 10).is_empty());

        let single = RatingStore::from_triples(vec![(1, 1, 3.0), (1, 2, 4.0)]);
        let scorer = OnTheFly::new(&single, Similarity::Pearson);
        assert!(most_similar(&single, &scorer, 1, 10).is_empty());
    }

    #[test]
    fn should_time_out_on_expired_deadline() {
        let store = scenario_store();
        let scorer = OnTheFly::new(&store, Similarity::Cosine);
        let expired = Deadline {
            at: Instant::now() - Duration::from_millis(1),
            budget: Duration::from_millis(5),
        };
        let result = most_similar_before(&store, &scorer, 1, 2, &expired);
        assert!(matches!(result, Err(KnnError::Timeout(budget)) if budget == Duration::from_millis(5)));

        let zero_budget = Deadline::after(Duration::ZERO);
        assert!(matches!(
            most_similar_before(&store, &scorer, 1, 2, &zero_budget),
            Err(KnnError::Timeout(_))
        ));

        let generous = Deadline::after(Duration::from_secs(60));
        let neighbors = most_similar_before(&store, &scorer, 1, 2, &generous).unwrap();
        assert_eq!(most_similar(&store, &scorer, 1, 2), neighbors);
    }

    fn triples() -> impl Strategy<Value = Vec<(EntityId, EntityId, f64)>> {
        proptest::collection::btree_map((0_u64..12, 0_u64..15), 1_u8..=5, 0..60).prop_map(
            |ratings| {
                ratings
                    .into_iter()
                    .map(|((subject, target), stars)| (subject, target, stars as f64))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn neighbors_exclude_query_and_respect_k(triples in triples(), subject in 0_u64..12, k in 0_usize..15) {
            let store = RatingStore::from_triples(triples);
            for metric in [Similarity::Pearson, Similarity::Cosine] {
                let scorer = OnTheFly::new(&store, metric);
                let neighbors = most_similar(&store, &scorer, subject, k);

                prop_assert!(neighbors.len() <= k);
                prop_assert!(neighbors.len() <= store.distinct_subjects().len().saturating_sub(1) || !store.contains_subject(subject));
                prop_assert!(neighbors.iter().all(|neighbor| neighbor.id != subject));
                prop_assert!(neighbors.windows(2).all(|pair| pair[0].score >= pair[1].score));
            }
        }
    }
}
