use chrono::{DateTime, SecondsFormat};
use depthset_domain::repositories::export::DataSetExporter;
use depthset_domain::services::record_features::RecordFeatures;
use depthset_domain::value_objects::data_set_record::{BookSideStatistics, DataSetRecord};
use depthset_domain::value_objects::decimal::Decimal;
use std::path::Path;

/// Writes data set records plus their derived features as one CSV row per record.
///
/// Undefined ratios (zero denominators) are written as empty cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDataSetExporter;

impl DataSetExporter for CsvDataSetExporter {
    fn write_records(
        &self,
        path: &Path,
        rows: &[(DataSetRecord, RecordFeatures)],
    ) -> Result<usize, String> {
        let mut wtr = csv::Writer::from_path(path)
            .map_err(|err| format!("failed to create data set csv {}: {err}", path.display()))?;
        wtr.write_record(header())
            .map_err(|err| format!("failed to write data set csv header: {err}"))?;

        for (record, features) in rows {
            wtr.write_record(row(record, features))
                .map_err(|err| format!("failed to write data set row {}: {err}", record.record_idx))?;
        }

        wtr.flush()
            .map_err(|err| format!("failed to flush data set csv: {err}"))?;
        Ok(rows.len())
    }
}

const RECORD_HEADER: [&str; 19] = [
    "symbol",
    "data_set_idx",
    "record_idx",
    "start_time_utc",
    "end_time_utc",
    "start_timestamp_ms",
    "end_timestamp_ms",
    "start_trade_id",
    "end_trade_id",
    "open_price",
    "high_price",
    "low_price",
    "close_price",
    "total_quantity",
    "total_volume",
    "total_trades_count",
    "buy_quantity",
    "buy_volume",
    "buy_trades_count",
];

const FEATURE_HEADER: [&str; 21] = [
    "sell_quantity",
    "sell_volume",
    "sell_trades_count",
    "buy_quantity_percent",
    "buy_volume_percent",
    "buy_trades_count_percent",
    "sell_quantity_percent",
    "sell_volume_percent",
    "sell_trades_count_percent",
    "total_price_average",
    "buy_price_average",
    "sell_price_average",
    "close_price_delta",
    "high_price_delta",
    "low_price_delta",
    "close_price_delta_percent",
    "high_price_delta_percent",
    "low_price_delta_percent",
    "spread",
    "spread_percent",
    "mid_price",
];

const SIDE_PREFIXES: [&str; 4] = ["start_asks", "start_bids", "end_asks", "end_bids"];

const SIDE_FIELDS: [&str; 8] = [
    "total_quantity",
    "total_volume",
    "max_price",
    "max_quantity",
    "max_volume",
    "min_price",
    "min_quantity",
    "min_volume",
];

fn header() -> Vec<String> {
    let mut columns: Vec<String> = RECORD_HEADER.iter().map(|c| c.to_string()).collect();
    for prefix in SIDE_PREFIXES {
        columns.extend(SIDE_FIELDS.iter().map(|field| format!("{prefix}_{field}")));
    }
    columns.extend(FEATURE_HEADER.iter().map(|c| c.to_string()));
    columns
}

fn row(record: &DataSetRecord, features: &RecordFeatures) -> Vec<String> {
    let mut cells = vec![
        record.symbol_id.name().to_string(),
        record.data_set_idx.to_string(),
        record.record_idx.to_string(),
        utc_time(record.start_timestamp_ms),
        utc_time(record.end_timestamp_ms),
        record.start_timestamp_ms.to_string(),
        record.end_timestamp_ms.to_string(),
        record.start_trade_id.to_string(),
        record.end_trade_id.to_string(),
        record.open_price.to_string(),
        record.high_price.to_string(),
        record.low_price.to_string(),
        record.close_price.to_string(),
        record.total_quantity.to_string(),
        record.total_volume.to_string(),
        record.total_trades_count.to_string(),
        record.buy_quantity.to_string(),
        record.buy_volume.to_string(),
        record.buy_trades_count.to_string(),
    ];
    for side in [
        &record.start_asks,
        &record.start_bids,
        &record.end_asks,
        &record.end_bids,
    ] {
        cells.extend(side_cells(side));
    }
    cells.extend([
        features.sell_quantity.to_string(),
        features.sell_volume.to_string(),
        features.sell_trades_count.to_string(),
        optional(features.buy_quantity_percent),
        optional(features.buy_volume_percent),
        optional(features.buy_trades_count_percent),
        optional(features.sell_quantity_percent),
        optional(features.sell_volume_percent),
        optional(features.sell_trades_count_percent),
        optional(features.total_price_average),
        optional(features.buy_price_average),
        optional(features.sell_price_average),
        features.close_price_delta.to_string(),
        features.high_price_delta.to_string(),
        features.low_price_delta.to_string(),
        optional(features.close_price_delta_percent),
        optional(features.high_price_delta_percent),
        optional(features.low_price_delta_percent),
        optional(features.spread),
        optional(features.spread_percent),
        optional(features.mid_price),
    ]);
    cells
}

fn side_cells(side: &BookSideStatistics) -> [String; 8] {
    [
        side.total_quantity.to_string(),
        side.total_volume.to_string(),
        side.max_price.to_string(),
        side.max_quantity.to_string(),
        side.max_volume.to_string(),
        side.min_price.to_string(),
        side.min_quantity.to_string(),
        side.min_volume.to_string(),
    ]
}

fn optional(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn utc_time(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthset_domain::value_objects::symbol::SymbolId;
    use std::fs;

    fn record() -> DataSetRecord {
        let side = BookSideStatistics {
            total_quantity: Decimal::from(2),
            total_volume: Decimal::from(200),
            max_price: Decimal::from(101),
            min_price: Decimal::from(99),
            max_quantity: Decimal::ONE,
            min_quantity: Decimal::ONE,
            max_volume: Decimal::from(101),
            min_volume: Decimal::from(99),
        };
        DataSetRecord {
            symbol_id: SymbolId::EthUsdt,
            data_set_idx: 3,
            record_idx: 0,
            open_price: Decimal::from(100),
            high_price: Decimal::from(102),
            low_price: Decimal::from(99),
            close_price: Decimal::from(101),
            total_quantity: Decimal::from(4),
            total_volume: Decimal::from(402),
            total_trades_count: 3,
            buy_quantity: Decimal::from(4),
            buy_volume: Decimal::from(402),
            buy_trades_count: 3,
            start_trade_id: 10,
            end_trade_id: 12,
            start_timestamp_ms: 1_700_000_000_000,
            end_timestamp_ms: 1_700_000_000_500,
            start_asks: side,
            start_bids: side,
            end_asks: side,
            end_bids: side,
        }
    }

    #[test]
    fn header_and_rows_have_same_width() {
        let record = record();
        let features = RecordFeatures::derive(&record, 16).unwrap();
        assert_eq!(header().len(), row(&record, &features).len());
        assert!(header().contains(&"end_bids_min_volume".to_string()));
    }

    #[test]
    fn writes_csv_with_empty_cells_for_undefined_ratios() {
        let dir = std::env::temp_dir().join(format!("depthset_csv_export_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("data_set.csv");

        let record = record();
        let features = RecordFeatures::derive(&record, 16).unwrap();
        assert!(features.sell_price_average.is_none());

        let written = CsvDataSetExporter
            .write_records(&path, &[(record, features)])
            .unwrap();
        assert_eq!(written, 1);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);

        let cell = |name: &str| {
            let idx = headers.iter().position(|h| h == name).unwrap();
            rows[0][idx].to_string()
        };
        assert_eq!(cell("symbol"), "ETH_USDT");
        assert_eq!(cell("start_time_utc"), "2023-11-14T22:13:20.000Z");
        assert_eq!(cell("sell_price_average"), "");
        assert_eq!(cell("close_price_delta"), "1");

        fs::remove_dir_all(&dir).ok();
    }
}
