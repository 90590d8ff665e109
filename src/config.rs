use std::ffi::OsStr;
use std::fs::File;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use justconfig::item::ValueExtractor;
use justconfig::processors::Trim;
use justconfig::sources::env::Env;
use justconfig::sources::text::ConfigText;
use justconfig::ConfPath;
use justconfig::Config;
use tracing::warn;

use crate::config_processors::{NormalizeName, Unquote};
use crate::error::KnnError;
use crate::io::RatingColumns;
use crate::knn::batch::BatchOptions;
use crate::knn::similarity::Similarity;
use crate::knn::Filtering;

// Set some default values
const DEFAULT_NEIGHBORHOOD_SIZE_K: usize = 40;
const DEFAULT_NUM_ITEMS_TO_RECOMMEND: usize = 20;
const DEFAULT_TRAIN_FRACTION: f64 = 0.8;
const DEFAULT_SEED: u64 = 22;
const DEFAULT_MAX_RANKING_SUBJECTS: usize = 500;

pub struct AppConfig {
    pub log: LogConfig,
    pub data: DataConfig,
    pub model: ModelConfig,
    pub evaluation: EvaluationConfig,
}

pub struct LogConfig {
    pub level: String,
}

pub struct DataConfig {
    pub ratings_path: String,
    pub columns: RatingColumns,
}

pub struct ModelConfig {
    pub filtering: Filtering,
    pub similarity: Similarity,
    pub neighborhood_size_k: usize,
    pub num_items_to_recommend: usize,
    pub precompute_similarities: bool,
}

pub struct EvaluationConfig {
    pub train_fraction: f64,
    pub seed: u64,
    pub num_workers: usize,
    pub query_timeout: Option<Duration>,
    pub max_ranking_subjects: usize,
    pub predictions_out_path: Option<String>,
    pub show_progress: bool,
}

impl AppConfig {
    pub fn new(config_path: &str) -> anyhow::Result<AppConfig> {
        // Initialize config object
        let mut conf = Config::default();

        // The config file is optional, everything can come from the environment
        match File::open(config_path) {
            Ok(config_file) => {
                let config_text = ConfigText::new(config_file, config_path)
                    .map_err(|error| anyhow!("{}", error))
                    .with_context(|| format!("loading configuration file {} failed", config_path))?;
                conf.add_source(config_text);
            }
            Err(_) if !config_path.is_empty() => {
                warn!(config_path, "configuration file not found, using environment and defaults");
            }
            Err(_) => {}
        }

        // Define config params from environment variables
        let config_env = Env::new(&[
            (
                ConfPath::from(&["data", "ratings_path"]),
                OsStr::new("RATINGS_DATA"),
            ),
            (
                ConfPath::from(&["evaluation", "num_workers"]),
                OsStr::new("NUM_WORKERS"),
            ),
            (ConfPath::from(&["log", "level"]), OsStr::new("LOG_LEVEL")),
        ]);
        conf.add_source(config_env);

        // Parse into custom config struct
        AppConfig::parse(&conf)
    }

    fn parse(conf: &Config) -> anyhow::Result<AppConfig> {
        Ok(AppConfig {
            log: LogConfig::parse(conf, ConfPath::from(&["log"])),
            data: DataConfig::parse(conf, ConfPath::from(&["data"]))?,
            model: ModelConfig::parse(conf, ConfPath::from(&["model"]))?,
            evaluation: EvaluationConfig::parse(conf, ConfPath::from(&["evaluation"]))?,
        })
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            k: self.model.neighborhood_size_k,
            metric: self.model.similarity,
            timeout: self.evaluation.query_timeout,
            show_progress: self.evaluation.show_progress,
        }
    }
}

impl LogConfig {
    fn parse(conf: &Config, path: ConfPath) -> LogConfig {
        LogConfig {
            level: conf
                .get(path.push("level"))
                .unquote()
                .value()
                .unwrap_or_else(|_| String::from("info")),
        }
    }
}

impl DataConfig {
    fn parse(conf: &Config, path: ConfPath) -> anyhow::Result<DataConfig> {
        let defaults = RatingColumns::default();
        let column = |key: &str, default: String| -> String {
            conf.get(path.push(key))
                .unquote()
                .value()
                .unwrap_or(default)
        };
        let delimiter: String = conf
            .get(path.push("delimiter"))
            .unquote()
            .value()
            .unwrap_or_else(|_| String::from(","));

        Ok(DataConfig {
            ratings_path: conf
                .get(path.push("ratings_path"))
                .unquote()
                .value()
                .map_err(|error| anyhow!("{}", error))
                .context("data.ratings_path (or RATINGS_DATA) must be set")?,
            columns: RatingColumns {
                user: column("user_column", defaults.user),
                item: column("item_column", defaults.item),
                rating: column("rating_column", defaults.rating),
                delimiter: parse_delimiter(&delimiter)?,
            },
        })
    }
}

fn parse_delimiter(raw: &str) -> anyhow::Result<u8> {
    match raw {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ if raw.len() == 1 => Ok(raw.as_bytes()[0]),
        _ => bail!("data.delimiter must be a single byte or \"tab\", got {:?}", raw),
    }
}

impl ModelConfig {
    fn parse(conf: &Config, path: ConfPath) -> anyhow::Result<ModelConfig> {
        let filtering: String = conf
            .get(path.push("filtering"))
            .normalize_name()
            .value()
            .unwrap_or_else(|_| String::from("user"));
        let similarity: String = conf
            .get(path.push("similarity"))
            .normalize_name()
            .value()
            .unwrap_or_else(|_| String::from("cosine"));
        let neighborhood_size_k = conf
            .get(path.push("neighborhood_size_k"))
            .trim()
            .value()
            .unwrap_or(DEFAULT_NEIGHBORHOOD_SIZE_K);
        if neighborhood_size_k == 0 {
            return Err(KnnError::InvalidNeighborhoodSize(neighborhood_size_k).into());
        }

        Ok(ModelConfig {
            filtering: filtering.parse()?,
            similarity: similarity.parse()?,
            neighborhood_size_k,
            num_items_to_recommend: conf
                .get(path.push("num_items_to_recommend"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_NUM_ITEMS_TO_RECOMMEND),
            precompute_similarities: conf
                .get(path.push("precompute_similarities"))
                .normalize_name()
                .value()
                .unwrap_or(false),
        })
    }
}

impl EvaluationConfig {
    fn parse(conf: &Config, path: ConfPath) -> anyhow::Result<EvaluationConfig> {
        let train_fraction = conf
            .get(path.push("train_fraction"))
            .trim()
            .value()
            .unwrap_or(DEFAULT_TRAIN_FRACTION);
        if !(train_fraction > 0.0 && train_fraction <= 1.0) {
            bail!("evaluation.train_fraction must lie in (0, 1], got {}", train_fraction);
        }
        let query_timeout_millis: Option<u64> = conf
            .get(path.push("query_timeout_millis"))
            .trim()
            .value()
            .ok();

        Ok(EvaluationConfig {
            train_fraction,
            seed: conf
                .get(path.push("seed"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_SEED),
            num_workers: conf
                .get(path.push("num_workers"))
                .trim()
                .value()
                // Detect number of CPUs
                .unwrap_or_else(|_| sys_info::cpu_num().map(|cpus| cpus as usize).unwrap_or(1))
                .max(1),
            query_timeout: query_timeout_millis
                .filter(|millis| *millis > 0)
                .map(Duration::from_millis),
            max_ranking_subjects: conf
                .get(path.push("max_ranking_subjects"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_MAX_RANKING_SUBJECTS),
            predictions_out_path: conf
                .get(path.push("predictions_out_path"))
                .unquote()
                .value()
                .ok(),
            show_progress: conf
                .get(path.push("show_progress"))
                .normalize_name()
                .value()
                .unwrap_or(true),
        })
    }
}
