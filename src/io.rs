use std::path::Path;
use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use tracing::info;

use crate::error::IngestError;

pub type EntityId = u64;
pub type UserId = EntityId;
pub type ItemId = EntityId;
pub type RatingValue = f64;

/// One observed rating, already mapped to internal ids.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rating {
    pub user: UserId,
    pub item: ItemId,
    pub rating: RatingValue,
}

impl Rating {
    pub fn new(user: UserId, item: ItemId, rating: RatingValue) -> Self {
        Rating { user, item, rating }
    }
}

/// Names of the source columns holding the user, item and rating values.
#[derive(Clone, Debug)]
pub struct RatingColumns {
    pub user: String,
    pub item: String,
    pub rating: String,
    pub delimiter: u8,
}

impl Default for RatingColumns {
    fn default() -> Self {
        RatingColumns {
            user: "userId".to_string(),
            item: "movieId".to_string(),
            rating: "rating".to_string(),
            delimiter: b',',
        }
    }
}

/// Interns external identifiers into dense ids, in order of first appearance.
#[derive(Default, Debug)]
pub struct IdDictionary {
    ids: HashMap<String, EntityId>,
    names: Vec<String>,
}

impl IdDictionary {
    pub fn intern(&mut self, name: &str) -> EntityId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.names.len() as EntityId;
        self.ids.insert(name.to_owned(), id);
        self.names.push(name.to_owned());
        id
    }

    pub fn id(&self, name: &str) -> Option<EntityId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: EntityId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Ratings read from disk together with the dictionaries for their ids.
pub struct RatingTable {
    pub ratings: Vec<Rating>,
    pub users: IdDictionary,
    pub items: IdDictionary,
}

pub fn read_ratings<P>(path: P, columns: &RatingColumns) -> Result<RatingTable, IngestError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let start_time = Instant::now();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(columns.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| IngestError::MissingColumn(name.to_owned()))
    };
    let user_col = position(&columns.user)?;
    let item_col = position(&columns.item)?;
    let rating_col = position(&columns.rating)?;

    let mut users = IdDictionary::default();
    let mut items = IdDictionary::default();
    let mut seen: HashSet<(UserId, ItemId)> = HashSet::new();
    let mut ratings = Vec::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let field = |col: usize| record.get(col).unwrap_or_default().trim();

        let raw_rating = field(rating_col);
        let rating = raw_rating
            .parse::<RatingValue>()
            .map_err(|_| IngestError::InvalidRating {
                line,
                value: raw_rating.to_owned(),
            })?;

        let user = users.intern(field(user_col));
        let item = items.intern(field(item_col));
        if !seen.insert((user, item)) {
            return Err(IngestError::DuplicateRating {
                line,
                user: field(user_col).to_owned(),
                item: field(item_col).to_owned(),
            });
        }
        ratings.push(Rating::new(user, item, rating));
    }

    if ratings.is_empty() {
        return Err(IngestError::Empty(path.display().to_string()));
    }

    info!(
        path = %path.display(),
        qty_ratings = ratings.len(),
        micros = start_time.elapsed().as_micros() as u64,
        "read ratings"
    );

    Ok(RatingTable {
        ratings,
        users,
        items,
    })
}

/// Shuffles with a seeded generator and splits off the first `train_fraction` as training data.
pub fn train_test_split(
    ratings: &[Rating],
    train_fraction: f64,
    seed: u64,
) -> Result<(Vec<Rating>, Vec<Rating>), IngestError> {
    if !(train_fraction > 0.0 && train_fraction <= 1.0) {
        return Err(IngestError::InvalidSplitFraction(train_fraction));
    }
    let mut shuffled = ratings.to_vec();
    let mut rng = Pcg64::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let qty_train = (shuffled.len() as f64 * train_fraction).round() as usize;
    let test = shuffled.split_off(qty_train.min(shuffled.len()));
    Ok((shuffled, test))
}
