use hashbrown::HashSet;

use crate::io::EntityId;
use crate::metrics::RankingMetric;

/// Mean reciprocal rank of the first relevant target within the top `length` recommendations.
pub struct Mrr {
    sum_of_scores: f64,
    qty: usize,
    length: usize,
}

impl Mrr {
    pub fn new(length: usize) -> Mrr {
        Mrr {
            sum_of_scores: 0_f64,
            qty: 0,
            length,
        }
    }
}

impl RankingMetric for Mrr {
    fn add(&mut self, recommendations: &[EntityId], relevant: &[EntityId]) {
        if relevant.is_empty() {
            return;
        }
        self.qty += 1;
        let relevant: HashSet<&EntityId> = relevant.iter().collect();
        let index = recommendations
            .iter()
            .take(self.length)
            .position(|target| relevant.contains(target));
        if let Some(rank) = index {
            self.sum_of_scores += 1_f64 / (rank as f64 + 1_f64)
        }
    }

    fn result(&self) -> f64 {
        if self.qty > 0 {
            self.sum_of_scores / self.qty as f64
        } else {
            0.0
        }
    }

    fn get_name(&self) -> String {
        format!("Mrr@{}", self.length)
    }
}
