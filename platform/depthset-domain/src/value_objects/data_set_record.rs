use crate::value_objects::decimal::Decimal;
use crate::value_objects::symbol::SymbolId;
use serde::{Deserialize, Serialize};

/// Cross-sectional statistics of one side of the book. An empty side is all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSideStatistics {
    pub total_quantity: Decimal,
    pub total_volume: Decimal,
    pub max_price: Decimal,
    pub min_price: Decimal,
    pub max_quantity: Decimal,
    pub min_quantity: Decimal,
    pub max_volume: Decimal,
    pub min_volume: Decimal,
}

impl BookSideStatistics {
    pub fn is_empty(&self) -> bool {
        self.total_volume.is_zero() && self.total_quantity.is_zero()
    }
}

/// Trades reduced over one `[start, end)` window that holds at least one trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeWindowStatistics {
    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub close_price: Decimal,
    pub total_quantity: Decimal,
    pub total_volume: Decimal,
    pub buy_quantity: Decimal,
    pub buy_volume: Decimal,
    pub trade_count: u32,
    pub buy_trade_count: u32,
    pub start_trade_id: i64,
    pub end_trade_id: i64,
    pub start_timestamp_ms: i64,
    pub end_timestamp_ms: i64,
}

/// One row of the final data set: a window between two consecutive book events that saw at
/// least one trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSetRecord {
    pub symbol_id: SymbolId,
    pub data_set_idx: i32,
    pub record_idx: i32,

    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub close_price: Decimal,
    pub total_quantity: Decimal,
    pub total_volume: Decimal,
    pub total_trades_count: i32,
    pub buy_quantity: Decimal,
    pub buy_volume: Decimal,
    pub buy_trades_count: i32,
    pub start_trade_id: i64,
    pub end_trade_id: i64,
    pub start_timestamp_ms: i64,
    pub end_timestamp_ms: i64,

    pub start_asks: BookSideStatistics,
    pub start_bids: BookSideStatistics,
    pub end_asks: BookSideStatistics,
    pub end_bids: BookSideStatistics,
}
