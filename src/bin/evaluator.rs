use std::time::Instant;

use anyhow::Context;
use hashbrown::HashMap;
use itertools::Itertools;
use num_format::{Locale, ToFormattedString};
use rayon::prelude::*;
use serde_derive::Serialize;
use tracing::info;

use memknn::baselines::{MeanRating, MostPop};
use memknn::config::AppConfig;
use memknn::dataframeutils::determine_rating_data_statistics;
use memknn::io::{self, EntityId, Rating, RatingTable};
use memknn::knn::batch::Estimate;
use memknn::knn::model::KnnModel;
use memknn::logging::init_logging;
use memknn::metrics::evaluation_reporter::EvaluationReporter;

#[derive(Serialize)]
struct PredictionRecord<'a> {
    user: &'a str,
    item: &'a str,
    actual: f64,
    predicted: Option<f64>,
    status: &'static str,
}

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_default();
    let config = AppConfig::new(&config_path)?;
    init_logging(&config.log.level);

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.evaluation.num_workers)
        .build_global()
        .context("failed to configure the worker pool")?;

    let table = io::read_ratings(&config.data.ratings_path, &config.data.columns)
        .with_context(|| format!("reading {} failed", config.data.ratings_path))?;
    determine_rating_data_statistics("ratings", &table.ratings);

    let (train, test) = io::train_test_split(
        &table.ratings,
        config.evaluation.train_fraction,
        config.evaluation.seed,
    )?;
    determine_rating_data_statistics("training split", &train);
    determine_rating_data_statistics("test split", &test);

    let start_time = Instant::now();
    let mut model = KnnModel::new(&train, config.model.filtering);
    if config.model.precompute_similarities {
        model = model.with_precomputed_similarities(config.model.similarity);
    }
    info!(
        millis = start_time.elapsed().as_millis() as u64,
        "model ready"
    );

    let queries = test
        .iter()
        .map(|rating| (rating.user, rating.item))
        .collect_vec();
    let report = model.predict_batch(&queries, &config.batch_options())?;

    let mut reporter = EvaluationReporter::new(
        model.store().distinct_targets().len(),
        config.model.num_items_to_recommend,
    );
    for (estimate, rating) in report.estimates.iter().zip(test.iter()) {
        reporter.add_estimate(estimate, rating.rating);
    }

    let held_out = held_out_targets(&model, &test, config.evaluation.max_ranking_subjects);
    let rankings: Vec<(Vec<EntityId>, &Vec<EntityId>)> = held_out
        .par_iter()
        .map(|(subject, relevant)| {
            let recommended = model
                .recommend(
                    *subject,
                    config.model.neighborhood_size_k,
                    config.model.similarity,
                    Some(config.model.num_items_to_recommend),
                )
                .iter()
                .map(|prediction| prediction.id)
                .collect_vec();
            (recommended, relevant)
        })
        .collect();
    for (recommended, relevant) in rankings.iter() {
        reporter.add_ranking(recommended, relevant);
    }

    // non-personalized reference: mean rating for estimates, most popular for rankings
    let mean_rating = MeanRating::new(&train, config.model.filtering);
    let most_pop = MostPop::new(&train, config.model.filtering);
    let mut baseline_reporter = EvaluationReporter::new(
        model.store().distinct_targets().len(),
        config.model.num_items_to_recommend,
    );
    for (estimate, rating) in mean_rating.predict_batch(&queries).iter().zip(test.iter()) {
        baseline_reporter.add_estimate(estimate, rating.rating);
    }
    for (subject, relevant) in held_out.iter() {
        let recommended = most_pop
            .recommend(*subject, config.model.num_items_to_recommend)
            .iter()
            .map(|scored| scored.id)
            .collect_vec();
        baseline_reporter.add_ranking(&recommended, relevant);
    }

    if let Some(out_path) = &config.evaluation.predictions_out_path {
        write_predictions(out_path, &table, &test, &report.estimates)
            .with_context(|| format!("writing predictions to {} failed", out_path))?;
        info!(out_path = out_path.as_str(), "wrote predictions");
    }

    let stopwatch = &report.stopwatch;
    println!("===============================================================");
    println!("===               START EVALUATING TEST SPLIT              ====");
    println!("===============================================================");
    println!(
        "filtering: {}, similarity: {}, k: {}",
        config.model.filtering, config.model.similarity, config.model.neighborhood_size_k
    );
    println!("model,{}", reporter.get_name());
    println!("knn,{}", reporter.result());
    println!("baseline,{}", baseline_reporter.result());
    println!(
        "Qty test evaluations: {}",
        stopwatch.len().to_formatted_string(&Locale::en)
    );
    println!("Qty ranked subjects: {}", rankings.len());
    println!("Prediction latency");
    println!("p50 (microseconds): {:.0}", stopwatch.percentile_in_micros(0.50));
    println!("p90 (microseconds): {:.0}", stopwatch.percentile_in_micros(0.90));
    println!("p95 (microseconds): {:.0}", stopwatch.percentile_in_micros(0.95));
    println!("p99.5 (microseconds): {:.0}", stopwatch.percentile_in_micros(0.995));
    Ok(())
}

/// Held-out targets per known subject, for at most `max_subjects` subjects in test order.
fn held_out_targets(
    model: &KnnModel,
    test: &[Rating],
    max_subjects: usize,
) -> Vec<(EntityId, Vec<EntityId>)> {
    let mut positions: HashMap<EntityId, usize> = HashMap::new();
    let mut held_out: Vec<(EntityId, Vec<EntityId>)> = Vec::new();
    for rating in test {
        let (subject, target) = model.filtering().orient(rating.user, rating.item);
        if !model.store().contains_subject(subject) {
            continue;
        }
        match positions.get(&subject) {
            Some(position) => held_out[*position].1.push(target),
            None if held_out.len() < max_subjects => {
                positions.insert(subject, held_out.len());
                held_out.push((subject, vec![target]));
            }
            None => {}
        }
    }
    held_out
}

fn write_predictions(
    out_path: &str,
    table: &RatingTable,
    test: &[Rating],
    estimates: &[Estimate],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(out_path)?;
    for (rating, estimate) in test.iter().zip(estimates.iter()) {
        writer.serialize(PredictionRecord {
            user: table.users.name(rating.user).unwrap_or_default(),
            item: table.items.name(rating.item).unwrap_or_default(),
            actual: rating.rating,
            predicted: estimate.value(),
            status: match estimate {
                Estimate::Predicted(_) => "predicted",
                Estimate::NoInformation => "no_information",
                Estimate::TimedOut => "timed_out",
            },
        })?;
    }
    writer.flush()?;
    Ok(())
}
