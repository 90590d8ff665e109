use anyhow::{anyhow, Context};

use memknn::config::AppConfig;
use memknn::io;
use memknn::knn::model::KnnModel;
use memknn::knn::Filtering;
use memknn::logging::init_logging;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_default();
    let subject_name = std::env::args()
        .nth(2)
        .ok_or_else(|| anyhow!("usage: recommend <config> <subject id>"))?;
    let config = AppConfig::new(&config_path)?;
    init_logging(&config.log.level);

    let table = io::read_ratings(&config.data.ratings_path, &config.data.columns)
        .with_context(|| format!("reading {} failed", config.data.ratings_path))?;
    let model = KnnModel::new(&table.ratings, config.model.filtering);

    let (subjects, targets) = match config.model.filtering {
        Filtering::UserBased => (&table.users, &table.items),
        Filtering::ItemBased => (&table.items, &table.users),
    };
    let subject = subjects
        .id(&subject_name)
        .ok_or_else(|| anyhow!("unknown {} id {}", config.model.filtering, subject_name))?;

    let recommendations = model.recommend(
        subject,
        config.model.neighborhood_size_k,
        config.model.similarity,
        Some(config.model.num_items_to_recommend),
    );
    if recommendations.is_empty() {
        println!("No recommendations for {}", subject_name);
    }
    for (rank, prediction) in recommendations.iter().enumerate() {
        println!(
            "{}\t{}\t{:.4}",
            rank + 1,
            targets.name(prediction.id).unwrap_or("?"),
            prediction.score
        );
    }
    Ok(())
}
