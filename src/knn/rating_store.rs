use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::io::{EntityId, Rating, RatingValue};
use crate::knn::Filtering;

/// Read-only index over a fixed set of rating observations, oriented by role.
///
/// In user-based filtering the subjects are users and the targets are items; in
/// item-based filtering the two are swapped. Histories are kept sorted by target
/// id so two of them can be intersected with a single merge pass.
pub struct RatingStore {
    subject_to_targets_sorted: HashMap<EntityId, Vec<(EntityId, RatingValue)>>,
    target_to_subjects_sorted: HashMap<EntityId, Vec<EntityId>>,
    subjects_in_order: Vec<EntityId>,
    targets_in_order: Vec<EntityId>,
    qty_ratings: usize,
}

impl RatingStore {
    pub fn new(ratings: &[Rating], filtering: Filtering) -> Self {
        Self::from_triples(
            ratings
                .iter()
                .map(|rating| {
                    let (subject, target) = filtering.orient(rating.user, rating.item);
                    (subject, target, rating.rating)
                }),
        )
    }

    /// Builds the store from `(subject, target, rating)` triples.
    ///
    /// A repeated pair keeps its first rating; ingestion rejects those upstream.
    pub fn from_triples<I>(triples: I) -> Self
    where
        I: IntoIterator<Item = (EntityId, EntityId, RatingValue)>,
    {
        let mut subject_to_targets_sorted: HashMap<EntityId, Vec<(EntityId, RatingValue)>> =
            HashMap::new();
        let mut target_to_subjects_sorted: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        let mut subjects_in_order = Vec::new();
        let mut targets_in_order = Vec::new();

        for (subject, target, rating) in triples {
            let history = subject_to_targets_sorted.entry(subject).or_insert_with(|| {
                subjects_in_order.push(subject);
                Vec::new()
            });
            history.push((target, rating));

            target_to_subjects_sorted
                .entry(target)
                .or_insert_with(|| {
                    targets_in_order.push(target);
                    Vec::new()
                })
                .push(subject);
        }

        let mut qty_ratings = 0;
        let mut qty_duplicates = 0;
        for history in subject_to_targets_sorted.values_mut() {
            // stable sort, so dedup keeps the first observed rating per target
            history.sort_by_key(|(target, _)| *target);
            let before = history.len();
            history.dedup_by_key(|(target, _)| *target);
            qty_duplicates += before - history.len();
            qty_ratings += history.len();
        }
        for raters in target_to_subjects_sorted.values_mut() {
            raters.sort_unstable();
            raters.dedup();
        }
        if qty_duplicates > 0 {
            warn!(qty_duplicates, "ignored repeated ratings for the same pair");
        }
        debug!(
            qty_ratings,
            qty_subjects = subjects_in_order.len(),
            qty_targets = targets_in_order.len(),
            "built rating store"
        );

        RatingStore {
            subject_to_targets_sorted,
            target_to_subjects_sorted,
            subjects_in_order,
            targets_in_order,
            qty_ratings,
        }
    }

    pub fn rating(&self, subject: EntityId, target: EntityId) -> Option<RatingValue> {
        let history = self.subject_to_targets_sorted.get(&subject)?;
        history
            .binary_search_by_key(&target, |(other, _)| *other)
            .ok()
            .map(|index| history[index].1)
    }

    /// Targets rated by `subject`, ascending by id; empty for unknown subjects.
    pub fn history(&self, subject: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.rated_by(subject).iter().map(|(target, _)| *target)
    }

    /// Ratings given by `subject`, ascending by target id.
    pub fn rated_by(&self, subject: EntityId) -> &[(EntityId, RatingValue)] {
        self.subject_to_targets_sorted
            .get(&subject)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Subjects who rated `target`, ascending by id.
    pub fn raters_of(&self, target: EntityId) -> &[EntityId] {
        self.target_to_subjects_sorted
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_rated(&self, subject: EntityId, target: EntityId) -> bool {
        self.rating(subject, target).is_some()
    }

    /// Subjects in order of first appearance.
    pub fn distinct_subjects(&self) -> &[EntityId] {
        &self.subjects_in_order
    }

    /// Targets in order of first appearance.
    pub fn distinct_targets(&self) -> &[EntityId] {
        &self.targets_in_order
    }

    pub fn contains_subject(&self, subject: EntityId) -> bool {
        self.subject_to_targets_sorted.contains_key(&subject)
    }

    pub fn qty_ratings(&self) -> usize {
        self.qty_ratings
    }

    pub fn is_empty(&self) -> bool {
        self.qty_ratings == 0
    }
}

#[cfg(test)]
mod rating_store_test {
    use super::*;

    fn store() -> RatingStore {
        RatingStore::new(
            &[
                Rating::new(7, 30, 4.0),
                Rating::new(7, 10, 2.0),
                Rating::new(3, 10, 5.0),
                Rating::new(3, 20, 1.0),
            ],
            Filtering::UserBased,
        )
    }

    #[test]
    fn should_lookup_ratings() {
        let store = store();
        assert_eq!(Some(4.0), store.rating(7, 30));
        assert_eq!(Some(5.0), store.rating(3, 10));
        assert_eq!(None, store.rating(3, 30));
        assert_eq!(None, store.rating(99, 10));
        assert_eq!(4, store.qty_ratings());
    }

    #[test]
    fn should_keep_insertion_order_for_distinct_entities() {
        let store = store();
        assert_eq!(&[7, 3], store.distinct_subjects());
        assert_eq!(&[30, 10, 20], store.distinct_targets());
    }

    #[test]
    fn should_return_sorted_histories() {
        let store = store();
        assert_eq!(vec![10, 30], store.history(7).collect::<Vec<_>>());
        assert_eq!(&[3, 7], store.raters_of(10));
        assert_eq!(0, store.history(42).count());
        assert!(store.raters_of(42).is_empty());
    }

    #[test]
    fn should_swap_roles_for_item_based_filtering() {
        let store = RatingStore::new(
            &[Rating::new(1, 100, 5.0), Rating::new(2, 100, 3.0)],
            Filtering::ItemBased,
        );
        assert_eq!(&[100], store.distinct_subjects());
        assert_eq!(&[1, 2], store.distinct_targets());
        assert_eq!(Some(3.0), store.rating(100, 2));
        assert_eq!(None, store.rating(2, 100));
    }

    #[test]
    fn should_keep_first_rating_of_repeated_pair() {
        let store = RatingStore::from_triples(vec![(1, 2, 4.0), (1, 2, 1.0), (1, 3, 2.0)]);
        assert_eq!(Some(4.0), store.rating(1, 2));
        assert_eq!(2, store.qty_ratings());
        assert_eq!(&[1], store.raters_of(2));
    }

    #[test]
    fn should_handle_empty_input() {
        let store = RatingStore::new(&[], Filtering::UserBased);
        assert!(store.is_empty());
        assert!(store.distinct_subjects().is_empty());
        assert!(!store.contains_subject(1));
    }
}
