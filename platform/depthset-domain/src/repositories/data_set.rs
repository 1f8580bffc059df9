use crate::errors::RepositoryError;
use crate::value_objects::data_set_record::DataSetRecord;
use crate::value_objects::order_book_event::OrderBookEvent;
use crate::value_objects::symbol::SymbolId;
use crate::value_objects::trade::Trade;

/// Storage of book events, trades and the final data set records derived from them.
pub trait DataSetRepository {
    /// The newest record of `symbol`, ordered by `(data_set_idx, record_idx)`.
    fn last_record(&self, symbol: SymbolId) -> Result<Option<DataSetRecord>, RepositoryError>;

    /// Up to `limit` snapshots with `timestamp_ms >= from_ts_ms`, oldest first.
    fn order_book_snapshots(
        &self,
        symbol: SymbolId,
        from_ts_ms: i64,
        limit: usize,
    ) -> Result<Vec<OrderBookEvent>, RepositoryError>;

    /// Updates with `start_ts_ms <= timestamp_ms < end_ts_ms`, oldest first.
    fn order_book_updates(
        &self,
        symbol: SymbolId,
        start_ts_ms: i64,
        end_ts_ms: i64,
    ) -> Result<Vec<OrderBookEvent>, RepositoryError>;

    /// Trades with `start_ts_ms <= timestamp_ms <= end_ts_ms`, ordered by trade id.
    fn trades(
        &self,
        symbol: SymbolId,
        start_ts_ms: i64,
        end_ts_ms: i64,
    ) -> Result<Vec<Trade>, RepositoryError>;

    /// Persists the batch atomically: either every record is stored or none is.
    fn save_records(&self, records: &[DataSetRecord]) -> Result<(), RepositoryError>;

    fn records(
        &self,
        symbol: SymbolId,
        data_set_idx: i32,
    ) -> Result<Vec<DataSetRecord>, RepositoryError>;
}
