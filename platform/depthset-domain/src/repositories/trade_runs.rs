use crate::errors::RepositoryError;
use crate::value_objects::symbol::SymbolId;
use crate::value_objects::trade::Trade;
use crate::value_objects::trade_run::TradeRunRecord;

pub trait TradeRunRepository {
    /// The run with the highest `start_trade_id` for `symbol`.
    fn last_run(&self, symbol: SymbolId) -> Result<Option<TradeRunRecord>, RepositoryError>;

    /// Up to `limit` trades with `timestamp_ms >= from_ts_ms` (all trades when `None`), ordered
    /// by trade id.
    fn trades_from(
        &self,
        symbol: SymbolId,
        from_ts_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Trade>, RepositoryError>;

    /// Inserts new runs and overwrites existing ones with the same `(symbol_id, start_trade_id)`.
    fn upsert_runs(&self, runs: &[TradeRunRecord]) -> Result<(), RepositoryError>;
}
