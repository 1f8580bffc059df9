pub mod benchmarking;
pub mod config;
pub mod data_set;
pub mod errors;
pub mod export;
pub mod processing;
pub mod trade_runs;
