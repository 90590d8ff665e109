use hashbrown::HashSet;
use itertools::Itertools;

use crate::io::EntityId;
use crate::metrics::RankingMetric;

pub struct Ndcg {
    sum_of_scores: f64,
    qty: usize,
    length: usize,
}

impl Ndcg {
    /// Binary-relevance DCG: position 0 counts 1, position i counts 1 / log2(i + 1).
    fn dcg(&self, top_recos: &[&EntityId], relevant: &HashSet<&EntityId>) -> f64 {
        let mut result = 0_f64;
        for (index, target) in top_recos.iter().enumerate() {
            if relevant.contains(target) {
                if index == 0 {
                    result += 1_f64;
                } else {
                    result += 1_f64 / ((index as f64) + 1_f64).log2();
                }
            }
        }
        result
    }
}

impl Ndcg {
    /// Normalized DCG of the top `length` recommendations, relative to a perfect ranking of the relevant targets.
    pub fn new(length: usize) -> Ndcg {
        Ndcg {
            sum_of_scores: 0_f64,
            qty: 0,
            length,
        }
    }
}

impl RankingMetric for Ndcg {
    fn add(&mut self, recommendations: &[EntityId], relevant: &[EntityId]) {
        let relevant_set: HashSet<&EntityId> = relevant.iter().collect();
        if relevant_set.is_empty() {
            return;
        }
        let top_recos = recommendations.iter().take(self.length).collect_vec();
        let ideal_recos = relevant.iter().unique().take(self.length).collect_vec();
        let dcg: f64 = self.dcg(&top_recos, &relevant_set);
        let dcg_max: f64 = self.dcg(&ideal_recos, &relevant_set);
        self.sum_of_scores += dcg / dcg_max;
        self.qty += 1;
    }

    fn result(&self) -> f64 {
        if self.qty > 0 {
            self.sum_of_scores / self.qty as f64
        } else {
            0.0
        }
    }

    fn get_name(&self) -> String {
        format!("Ndcg@{}", self.length)
    }
}
