use crate::errors::CycleError;
use depthset_domain::repositories::data_set::DataSetRepository;
use depthset_domain::services::data_set_calculator::DataSetCalculator;
use depthset_domain::value_objects::symbol::SymbolId;
use serde::Serialize;
use std::time::Instant;
use tracing::info_span;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSetCycleReport {
    pub symbol: SymbolId,
    pub data_set_idx: i32,
    pub from_timestamp_ms: i64,
    /// `None` when fewer than two snapshots exist past the resume point.
    pub to_timestamp_ms: Option<i64>,
    pub updates: usize,
    pub trades: usize,
    pub records_saved: usize,
}

impl DataSetCycleReport {
    pub fn skipped(&self) -> bool {
        self.to_timestamp_ms.is_none()
    }
}

/// Builds and stores the next data set of `symbol`: the span between the first two snapshots at
/// or after the end of the last stored record.
pub fn save_data_set(
    repo: &dyn DataSetRepository,
    calculator: &DataSetCalculator,
    symbol: SymbolId,
) -> Result<DataSetCycleReport, CycleError> {
    let _span = info_span!("data_set.save", symbol = %symbol).entered();
    let cycle_start = Instant::now();

    let last = repo.last_record(symbol)?;
    let (from_ts, data_set_idx) = match &last {
        Some(record) => (record.end_timestamp_ms, record.data_set_idx + 1),
        None => (0, 0),
    };

    let mut report = DataSetCycleReport {
        symbol,
        data_set_idx,
        from_timestamp_ms: from_ts,
        to_timestamp_ms: None,
        updates: 0,
        trades: 0,
        records_saved: 0,
    };

    let snapshots = repo.order_book_snapshots(symbol, from_ts, 2)?;
    let (Some(start), Some(end)) = (snapshots.first(), snapshots.get(1)) else {
        tracing::info!(
            snapshots = snapshots.len(),
            from_ts,
            "not enough order book snapshots; skipping data set"
        );
        metrics::counter!("depthset.data_set.skipped_total", "symbol" => symbol.name())
            .increment(1);
        return Ok(report);
    };
    report.to_timestamp_ms = Some(end.timestamp_ms);

    let stage_start = Instant::now();
    let updates = repo
        .order_book_updates(symbol, start.timestamp_ms, end.timestamp_ms)?;
    let trades = repo.trades(symbol, start.timestamp_ms, end.timestamp_ms)?;
    metrics::histogram!("depthset.data_set.load_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    report.updates = updates.len();
    report.trades = trades.len();

    let mut events = Vec::with_capacity(updates.len() + 1);
    events.push(start.clone());
    events.extend(updates);

    let stage_start = Instant::now();
    let records = calculator.calculate(symbol, data_set_idx, &events, &trades)?;
    metrics::histogram!("depthset.data_set.calculate_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    if records.is_empty() {
        // Nothing advances the resume point, so the same span is read again next cycle.
        tracing::warn!(
            from_ts,
            to_ts = end.timestamp_ms,
            "no trades between snapshots; data set not advanced"
        );
    } else {
        repo.save_records(&records)?;
    }
    report.records_saved = records.len();

    metrics::counter!("depthset.data_set.records_total", "symbol" => symbol.name())
        .increment(records.len() as u64);
    metrics::histogram!("depthset.data_set.cycle_ms")
        .record(cycle_start.elapsed().as_millis() as f64);
    tracing::info!(
        data_set_idx,
        events = events.len(),
        trades = report.trades,
        records = report.records_saved,
        "data set saved"
    );

    Ok(report)
}
