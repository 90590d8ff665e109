use crate::io::RatingValue;
use crate::knn::batch::Estimate;
use crate::metrics::RatingMetric;

// Queries without a prediction are left out of both error metrics, PredictionCoverage reports them.

pub struct Rmse {
    sum_of_squares: f64,
    qty: usize,
}

impl Rmse {
    pub fn new() -> Rmse {
        Rmse {
            sum_of_squares: 0_f64,
            qty: 0,
        }
    }
}

impl Default for Rmse {
    fn default() -> Self {
        Rmse::new()
    }
}

impl RatingMetric for Rmse {
    fn add(&mut self, estimate: &Estimate, actual: RatingValue) {
        if let Some(predicted) = estimate.value() {
            self.sum_of_squares += (predicted - actual).powi(2);
            self.qty += 1;
        }
    }

    fn result(&self) -> f64 {
        if self.qty > 0 {
            (self.sum_of_squares / self.qty as f64).sqrt()
        } else {
            0.0
        }
    }

    fn get_name(&self) -> String {
        String::from("Rmse")
    }
}

pub struct Mae {
    sum_of_errors: f64,
    qty: usize,
}

impl Mae {
    pub fn new() -> Mae {
        Mae {
            sum_of_errors: 0_f64,
            qty: 0,
        }
    }
}

impl Default for Mae {
    fn default() -> Self {
        Mae::new()
    }
}

impl RatingMetric for Mae {
    fn add(&mut self, estimate: &Estimate, actual: RatingValue) {
        if let Some(predicted) = estimate.value() {
            self.sum_of_errors += (predicted - actual).abs();
            self.qty += 1;
        }
    }

    fn result(&self) -> f64 {
        if self.qty > 0 {
            self.sum_of_errors / self.qty as f64
        } else {
            0.0
        }
    }

    fn get_name(&self) -> String {
        String::from("Mae")
    }
}
