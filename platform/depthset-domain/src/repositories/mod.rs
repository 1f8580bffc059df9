pub mod data_set;
pub mod export;
pub mod trade_runs;
