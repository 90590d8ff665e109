use hashbrown::HashSet;

use crate::io::{EntityId, RatingValue};
use crate::knn::batch::Estimate;
use crate::metrics::{RankingMetric, RatingMetric};

/// Share of the training catalog that shows up in at least one top-`length` list.
pub struct Coverage {
    unique_training_targets: usize,
    recommended: HashSet<EntityId>,
    length: usize,
}

impl Coverage {
    pub fn new(unique_training_targets: usize, length: usize) -> Coverage {
        Coverage {
            unique_training_targets,
            recommended: HashSet::new(),
            length,
        }
    }
}

impl RankingMetric for Coverage {
    fn add(&mut self, recommendations: &[EntityId], _relevant: &[EntityId]) {
        for target in recommendations.iter().take(self.length) {
            self.recommended.insert(*target);
        }
    }

    fn result(&self) -> f64 {
        if self.unique_training_targets > 0 {
            self.recommended.len() as f64 / self.unique_training_targets as f64
        } else {
            0.0
        }
    }

    fn get_name(&self) -> String {
        format!("Coverage@{}", self.length)
    }
}

/// Share of rating queries that received an actual prediction.
#[derive(Default)]
pub struct PredictionCoverage {
    qty_predicted: usize,
    qty: usize,
}

impl PredictionCoverage {
    pub fn new() -> PredictionCoverage {
        PredictionCoverage::default()
    }
}

impl RatingMetric for PredictionCoverage {
    fn add(&mut self, estimate: &Estimate, _actual: RatingValue) {
        self.qty += 1;
        if estimate.is_predicted() {
            self.qty_predicted += 1;
        }
    }

    fn result(&self) -> f64 {
        if self.qty > 0 {
            self.qty_predicted as f64 / self.qty as f64
        } else {
            0.0
        }
    }

    fn get_name(&self) -> String {
        String::from("PredictionCoverage")
    }
}
