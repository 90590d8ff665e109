use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use dary_heap::OctonaryHeap;

use crate::error::KnnError;
use crate::io::EntityId;

pub mod batch;
pub mod model;
pub mod neighborhood;
pub mod predictor;
pub mod rating_store;
pub mod similarity;
pub mod similarity_matrix;

/// Which side of a rating plays the subject role.
///
/// User-based filtering finds similar users and predicts item ratings; item-based
/// filtering finds similar items and predicts how users would rate them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filtering {
    UserBased,
    ItemBased,
}

impl Filtering {
    /// Maps a `(user, item)` pair onto `(subject, target)`.
    pub fn orient(&self, user: EntityId, item: EntityId) -> (EntityId, EntityId) {
        match self {
            Filtering::UserBased => (user, item),
            Filtering::ItemBased => (item, user),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filtering::UserBased => "user",
            Filtering::ItemBased => "item",
        }
    }
}

impl fmt::Display for Filtering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Filtering {
    type Err = KnnError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "user" | "user_based" | "userknn" => Ok(Filtering::UserBased),
            "item" | "item_based" | "itemknn" => Ok(Filtering::ItemBased),
            _ => Err(KnnError::UnsupportedFiltering(name.to_owned())),
        }
    }
}

/// An entity with a score: a neighbor with its similarity, or a candidate with its predicted rating.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ScoredEntity {
    pub id: EntityId,
    pub score: f64,
}

pub type Neighbor = ScoredEntity;
pub type Prediction = ScoredEntity;

impl ScoredEntity {
    pub fn new(id: EntityId, score: f64) -> Self {
        ScoredEntity { id, score }
    }
}

impl Eq for ScoredEntity {}

impl Ord for ScoredEntity {
    /// Best first: higher scores, then higher ids on equal scores.
    ///
    /// This is the order produced by sorting `(score, id)` ascending and
    /// reversing. NaN scores never reach this comparison.
    fn cmp(&self, other: &Self) -> Ordering {
        // reverse order by score
        let by_score = match self.score.partial_cmp(&other.score) {
            Some(Ordering::Less) => Ordering::Greater,
            Some(Ordering::Greater) => Ordering::Less,
            _ => Ordering::Equal,
        };
        by_score.then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for ScoredEntity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Keeps the best `how_many` entries, returned best first.
///
/// `None` keeps everything. The heap top is the worst retained entry, so a
/// candidate only replaces it when it ranks strictly better.
pub fn top_scored<I>(scored: I, how_many: Option<usize>) -> Vec<ScoredEntity>
where
    I: IntoIterator<Item = ScoredEntity>,
{
    let mut all_or_top: Vec<ScoredEntity> = match how_many {
        None => scored.into_iter().collect(),
        Some(0) => Vec::new(),
        Some(how_many) => {
            let mut top: OctonaryHeap<ScoredEntity> = OctonaryHeap::with_capacity(how_many);
            for entry in scored {
                if top.len() < how_many {
                    top.push(entry);
                } else if let Some(mut bottom) = top.peek_mut() {
                    if entry < *bottom {
                        *bottom = entry;
                    }
                }
            }
            top.into_vec()
        }
    };
    all_or_top.sort_unstable();
    all_or_top
}

#[cfg(test)]
mod knn_test {
    use super::*;

    #[test]
    fn should_order_best_first_with_id_tie_break() {
        let mut scored = vec![
            ScoredEntity::new(1, 0.5),
            ScoredEntity::new(2, 0.9),
            ScoredEntity::new(3, 0.5),
            ScoredEntity::new(4, -0.2),
        ];
        scored.sort();
        let ids: Vec<EntityId> = scored.iter().map(|s| s.id).collect();
        assert_eq!(vec![2, 3, 1, 4], ids);
    }

    #[test]
    fn should_match_full_sort_when_truncating() {
        let scored: Vec<ScoredEntity> = (0..50)
            .map(|id| ScoredEntity::new(id, ((id * 7) % 5) as f64))
            .collect();
        let mut expected = scored.clone();
        expected.sort();
        expected.truncate(12);

        assert_eq!(expected, top_scored(scored.clone(), Some(12)));
        assert_eq!(50, top_scored(scored.clone(), None).len());
        assert!(top_scored(scored, Some(0)).is_empty());
    }

    #[test]
    fn should_parse_filtering_names() {
        assert_eq!(Filtering::UserBased, "user".parse().unwrap());
        assert_eq!(Filtering::ItemBased, "ItemKNN".parse().unwrap());
        assert!(matches!(
            "both".parse::<Filtering>(),
            Err(KnnError::UnsupportedFiltering(_))
        ));
    }

    #[test]
    fn should_orient_pairs_by_role() {
        assert_eq!((1, 2), Filtering::UserBased.orient(1, 2));
        assert_eq!((2, 1), Filtering::ItemBased.orient(1, 2));
    }
}
