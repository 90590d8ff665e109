use std::time::Duration;

/// Errors raised by the neighborhood engine.
#[derive(Debug, thiserror::Error)]
pub enum KnnError {
    #[error("unsupported similarity metric: {0:?} (expected one of: pearson, cosine)")]
    UnsupportedMetric(String),

    #[error("unsupported filtering mode: {0:?} (expected one of: user, item)")]
    UnsupportedFiltering(String),

    #[error("neighborhood size k must be a positive integer, got {0}")]
    InvalidNeighborhoodSize(usize),

    #[error("query exceeded its time budget of {0:?}")]
    Timeout(Duration),
}

/// Errors raised while reading and splitting rating data.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unable to read ratings: {0}")]
    Csv(#[from] csv::Error),

    #[error("column {0:?} not found in header")]
    MissingColumn(String),

    #[error("line {line}: rating {value:?} is not a number")]
    InvalidRating { line: u64, value: String },

    #[error("line {line}: duplicate rating for user {user:?} and item {item:?}")]
    DuplicateRating {
        line: u64,
        user: String,
        item: String,
    },

    #[error("no ratings found in {0}")]
    Empty(String),

    #[error("train fraction must lie in (0, 1], got {0}")]
    InvalidSplitFraction(f64),
}
