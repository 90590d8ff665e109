use crate::io::{EntityId, RatingValue};
use crate::knn::batch::Estimate;
use crate::metrics::coverage::{Coverage, PredictionCoverage};
use crate::metrics::mrr::Mrr;
use crate::metrics::ndcg::Ndcg;
use crate::metrics::rating_error::{Mae, Rmse};
use crate::metrics::{RankingMetric, RatingMetric};

/// Collects every rating and ranking metric of one evaluation run and renders them as a csv row.
pub struct EvaluationReporter {
    rmse: Rmse,
    mae: Mae,
    prediction_coverage: PredictionCoverage,
    mrr: Mrr,
    ndcg: Ndcg,
    coverage: Coverage,
}

impl EvaluationReporter {
    pub fn new(unique_training_targets: usize, length: usize) -> EvaluationReporter {
        EvaluationReporter {
            rmse: Rmse::new(),
            mae: Mae::new(),
            prediction_coverage: PredictionCoverage::new(),
            mrr: Mrr::new(length),
            ndcg: Ndcg::new(length),
            coverage: Coverage::new(unique_training_targets, length),
        }
    }

    pub fn add_estimate(&mut self, estimate: &Estimate, actual: RatingValue) {
        self.rmse.add(estimate, actual);
        self.mae.add(estimate, actual);
        self.prediction_coverage.add(estimate, actual);
    }

    pub fn add_ranking(&mut self, recommendations: &[EntityId], relevant: &[EntityId]) {
        self.mrr.add(recommendations, relevant);
        self.ndcg.add(recommendations, relevant);
        self.coverage.add(recommendations, relevant);
    }

    pub fn result(&self) -> String {
        format!(
            "{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
            self.rmse.result(),
            self.mae.result(),
            self.prediction_coverage.result(),
            self.mrr.result(),
            self.ndcg.result(),
            self.coverage.result()
        )
    }

    pub fn get_name(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.rmse.get_name(),
            self.mae.get_name(),
            self.prediction_coverage.get_name(),
            self.mrr.get_name(),
            self.ndcg.get_name(),
            self.coverage.get_name()
        )
    }
}

#[cfg(test)]
mod evaluation_reporter_test {
    use super::*;

    #[test]
    fn should_report_all_metrics() {
        let mut reporter = EvaluationReporter::new(4, 20);
        reporter.add_estimate(&Estimate::Predicted(4.0), 5.0);
        reporter.add_estimate(&Estimate::NoInformation, 3.0);
        reporter.add_ranking(&[1, 2], &[2]);

        assert_eq!(
            "Rmse,Mae,PredictionCoverage,Mrr@20,Ndcg@20,Coverage@20",
            reporter.get_name()
        );
        assert_eq!(
            "1.0000,1.0000,0.5000,0.5000,1.0000,0.5000",
            reporter.result()
        );
    }
}
