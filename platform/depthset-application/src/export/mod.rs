use depthset_domain::repositories::data_set::DataSetRepository;
use depthset_domain::repositories::export::DataSetExporter;
use depthset_domain::services::record_features::RecordFeatures;
use depthset_domain::value_objects::symbol::SymbolId;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info_span;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub symbol: SymbolId,
    pub data_set_idx: i32,
    pub rows: usize,
    pub path: PathBuf,
}

/// Writes one data set (the newest when `data_set_idx` is `None`) with its derived feature
/// columns.
pub fn export_data_set(
    repo: &dyn DataSetRepository,
    exporter: &dyn DataSetExporter,
    symbol: SymbolId,
    data_set_idx: Option<i32>,
    path: &Path,
    division_scale: u32,
) -> Result<ExportSummary, String> {
    let _span = info_span!("data_set.export", symbol = %symbol, path = %path.display()).entered();
    let start = Instant::now();

    let data_set_idx = match data_set_idx {
        Some(idx) => idx,
        None => repo
            .last_record(symbol)
            .map_err(|err| err.to_string())?
            .map(|record| record.data_set_idx)
            .ok_or_else(|| format!("no data set stored for {symbol}"))?,
    };

    let records = repo
        .records(symbol, data_set_idx)
        .map_err(|err| err.to_string())?;
    if records.is_empty() {
        return Err(format!("data set {data_set_idx} of {symbol} has no records"));
    }

    let rows = records
        .into_iter()
        .map(|record| {
            RecordFeatures::derive(&record, division_scale)
                .map(|features| (record, features))
                .map_err(|err| format!("failed to derive features: {err}"))
        })
        .collect::<Result<Vec<_>, String>>()?;

    let written = exporter.write_records(path, &rows)?;
    metrics::histogram!("depthset.export.write_ms").record(start.elapsed().as_millis() as f64);
    tracing::info!(data_set_idx, rows = written, "data set exported");

    Ok(ExportSummary {
        symbol,
        data_set_idx,
        rows: written,
        path: path.to_path_buf(),
    })
}
