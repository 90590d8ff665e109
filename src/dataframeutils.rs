use hashbrown::HashMap;
use num_format::{Locale, ToFormattedString};
use rayon::prelude::*;
use tdigest::TDigest;
use tracing::info;

use crate::io::{EntityId, Rating};

pub struct RatingDataStats {
    pub descriptive_name: String,
    pub qty_records: usize,
    pub qty_unique_user_ids: usize,
    pub qty_unique_item_ids: usize,
    pub min_rating: f64,
    pub max_rating: f64,
    pub mean_rating: f64,
    pub ratings_per_user: Percentiles,
    pub ratings_per_item: Percentiles,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub p100: f64,
}

impl Percentiles {
    fn of_counts(counts: HashMap<EntityId, usize>) -> Percentiles {
        if counts.is_empty() {
            return Percentiles::default();
        }
        let max_qty = counts.values().copied().max().unwrap_or_default();
        let digest = TDigest::new_with_size(100)
            .merge_unsorted(counts.into_iter().map(|(_, qty)| qty as f64).collect());
        Percentiles {
            p50: digest.estimate_quantile(0.50).round(),
            p90: digest.estimate_quantile(0.90).round(),
            p99: digest.estimate_quantile(0.99).round(),
            p100: max_qty as f64,
        }
    }
}

fn count_by<F>(ratings: &[Rating], key: F) -> HashMap<EntityId, usize>
where
    F: Fn(&Rating) -> EntityId,
{
    let mut counts = HashMap::new();
    for rating in ratings {
        *counts.entry(key(rating)).or_insert(0) += 1;
    }
    counts
}

pub fn determine_rating_data_statistics(descriptive_name: &str, ratings: &[Rating]) -> RatingDataStats {
    let qty_records = ratings.len();

    let ratings_per_user = count_by(ratings, |rating| rating.user);
    let ratings_per_item = count_by(ratings, |rating| rating.item);
    let qty_unique_user_ids = ratings_per_user.len();
    let qty_unique_item_ids = ratings_per_item.len();

    let (min_rating, max_rating, sum_rating) = ratings
        .par_iter()
        .map(|rating| (rating.rating, rating.rating, rating.rating))
        .reduce(
            || (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min_a, max_a, sum_a), (min_b, max_b, sum_b)| (min_a.min(min_b), max_a.max(max_b), sum_a + sum_b),
        );
    let (min_rating, max_rating, mean_rating) = if qty_records == 0 {
        (0.0, 0.0, 0.0)
    } else {
        (min_rating, max_rating, sum_rating / qty_records as f64)
    };

    let stats = RatingDataStats {
        descriptive_name: descriptive_name.to_string(),
        qty_records,
        qty_unique_user_ids,
        qty_unique_item_ids,
        min_rating,
        max_rating,
        mean_rating,
        ratings_per_user: Percentiles::of_counts(ratings_per_user),
        ratings_per_item: Percentiles::of_counts(ratings_per_item),
    };
    stats.log();
    stats
}

impl RatingDataStats {
    pub fn density(&self) -> f64 {
        let cells = self.qty_unique_user_ids as f64 * self.qty_unique_item_ids as f64;
        if cells == 0.0 {
            0.0
        } else {
            self.qty_records as f64 / cells
        }
    }

    fn log(&self) {
        info!(
            "Loaded {}: {} ratings, {} users, {} items, density {:.5}",
            self.descriptive_name,
            self.qty_records.to_formatted_string(&Locale::en),
            self.qty_unique_user_ids.to_formatted_string(&Locale::en),
            self.qty_unique_item_ids.to_formatted_string(&Locale::en),
            self.density()
        );
        info!(
            "\tRatings: min={} max={} mean={:.3}",
            self.min_rating, self.max_rating, self.mean_rating
        );
        info!(
            "\tRatings per user: p50={} p90={} p99={} p100={}",
            self.ratings_per_user.p50,
            self.ratings_per_user.p90,
            self.ratings_per_user.p99,
            self.ratings_per_user.p100
        );
        info!(
            "\tRatings per item: p50={} p90={} p99={} p100={}",
            self.ratings_per_item.p50,
            self.ratings_per_item.p90,
            self.ratings_per_item.p99,
            self.ratings_per_item.p100
        );
    }
}

#[cfg(test)]
mod dataframeutils_test {
    use super::*;

    #[test]
    fn should_determine_statistics() {
        let ratings = vec![
            Rating::new(1, 10, 4.0),
            Rating::new(1, 11, 2.0),
            Rating::new(2, 10, 5.0),
            Rating::new(3, 12, 0.5),
        ];
        let stats = determine_rating_data_statistics("tiny", &ratings);

        assert_eq!(4, stats.qty_records);
        assert_eq!(3, stats.qty_unique_user_ids);
        assert_eq!(3, stats.qty_unique_item_ids);
        assert_eq!(0.5, stats.min_rating);
        assert_eq!(5.0, stats.max_rating);
        assert_eq!(2.875, stats.mean_rating);
        assert_eq!(2.0, stats.ratings_per_user.p100);
        assert_eq!(4.0 / 9.0, stats.density());
    }

    #[test]
    fn should_handle_empty_data() {
        let stats = determine_rating_data_statistics("empty", &[]);
        assert_eq!(0, stats.qty_records);
        assert_eq!(0.0, stats.mean_rating);
        assert_eq!(Percentiles::default(), stats.ratings_per_item);
        assert_eq!(0.0, stats.density());
    }
}
