use crate::errors::CycleError;
use depthset_domain::repositories::trade_runs::TradeRunRepository;
use depthset_domain::services::trade_runs::TradeRunAggregator;
use depthset_domain::value_objects::symbol::SymbolId;
use serde::Serialize;
use std::time::Instant;
use tracing::info_span;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeRunCycleReport {
    pub symbol: SymbolId,
    pub resumed_from_trade_id: Option<i64>,
    pub trades_fetched: usize,
    pub runs_upserted: usize,
}

/// Extends the trade-run data set of `symbol` with up to `batch_size` trades.
///
/// Trades are read from the end timestamp of the newest stored run; the ones that run already
/// covers are skipped by trade id.
pub fn save_trade_runs(
    repo: &dyn TradeRunRepository,
    symbol: SymbolId,
    batch_size: usize,
) -> Result<TradeRunCycleReport, CycleError> {
    let _span = info_span!("trade_runs.save", symbol = %symbol).entered();
    let cycle_start = Instant::now();

    let last = repo.last_run(symbol)?;
    let resume_ts = last.as_ref().map(|run| run.end_timestamp_ms);
    let trades = repo.trades_from(symbol, resume_ts, batch_size)?;

    let mut report = TradeRunCycleReport {
        symbol,
        resumed_from_trade_id: last.as_ref().map(|run| run.end_trade_id),
        trades_fetched: trades.len(),
        runs_upserted: 0,
    };
    if trades.is_empty() {
        tracing::debug!("no trades to aggregate");
        return Ok(report);
    }

    let runs = TradeRunAggregator::aggregate(last.as_ref(), &trades)?;
    if !runs.is_empty() {
        repo.upsert_runs(&runs)?;
    }
    report.runs_upserted = runs.len();

    metrics::counter!("depthset.trade_runs.upserted_total", "symbol" => symbol.name())
        .increment(runs.len() as u64);
    metrics::histogram!("depthset.trade_runs.cycle_ms")
        .record(cycle_start.elapsed().as_millis() as f64);
    tracing::info!(
        trades = report.trades_fetched,
        runs = report.runs_upserted,
        "trade runs saved"
    );

    Ok(report)
}
