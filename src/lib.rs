pub mod baselines;
pub mod config;
pub mod config_processors;
pub mod dataframeutils;
pub mod error;
pub mod io;
pub mod knn;
pub mod logging;
pub mod metrics;
pub mod stopwatch;
