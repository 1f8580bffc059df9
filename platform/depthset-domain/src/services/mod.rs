pub mod data_set_calculator;
pub mod order_book_stats;
pub mod record_features;
pub mod trade_runs;
pub mod trade_window;
