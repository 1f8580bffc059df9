use crate::persistence::wire::decode_book_side;
use depthset_domain::errors::RepositoryError;
use depthset_domain::repositories::data_set::DataSetRepository;
use depthset_domain::repositories::trade_runs::TradeRunRepository;
use depthset_domain::value_objects::data_set_record::{BookSideStatistics, DataSetRecord};
use depthset_domain::value_objects::decimal::Decimal;
use depthset_domain::value_objects::order_book_event::{OrderBookAction, OrderBookEvent};
use depthset_domain::value_objects::symbol::SymbolId;
use depthset_domain::value_objects::trade::Trade;
use depthset_domain::value_objects::trade_run::TradeRunRecord;
use postgres::types::{FromSql, ToSql};
use postgres::{NoTls, Row};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use std::time::Instant;

type PgPool = Pool<PostgresConnectionManager<NoTls>>;
type PgConnection = PooledConnection<PostgresConnectionManager<NoTls>>;
type SqlValues = Vec<Box<dyn ToSql + Sync>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub records: String,
    pub trade_runs: String,
    pub order_books: String,
    pub trades: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            records: "okx_data_set_record_data".to_string(),
            trade_runs: "okx_data_set_record_data_2".to_string(),
            order_books: "okx_order_book_data_2".to_string(),
            trades: "okx_trade_data_2".to_string(),
        }
    }
}

impl TableNames {
    fn validate(&self) -> Result<(), String> {
        for (key, table) in [
            ("records", &self.records),
            ("trade_runs", &self.trade_runs),
            ("order_books", &self.order_books),
            ("trades", &self.trades),
        ] {
            validate_table_name(table)
                .map_err(|err| format!("invalid {key} table '{table}': {err}"))?;
        }
        Ok(())
    }
}

/// Postgres-backed store for book events, trades, data set records and trade runs.
#[derive(Debug, Clone)]
pub struct PostgresDataSetRepository {
    pool: PgPool,
    tables: TableNames,
}

impl PostgresDataSetRepository {
    pub fn new(db_url: &str, tables: TableNames, pool_max_size: u32) -> Result<Self, String> {
        tables.validate()?;
        let config = db_url
            .parse::<postgres::Config>()
            .map_err(|err| format!("invalid postgres db url: {err}"))?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_max_size)
            .build(manager)
            .map_err(|err| format!("failed to build postgres pool: {err}"))?;
        Ok(Self { pool, tables })
    }

    pub fn from_pool(pool: PgPool, tables: TableNames) -> Result<Self, String> {
        tables.validate()?;
        Ok(Self { pool, tables })
    }

    /// Runs a multi-statement SQL script (schema migrations) in one transaction.
    pub fn execute_script(&self, sql: &str) -> Result<(), String> {
        let _span = tracing::info_span!("infra.postgres.execute_script").entered();
        let started = Instant::now();
        let result = self.connection().and_then(|mut client| {
            let mut tx = client
                .transaction()
                .map_err(|err| format!("failed to open transaction: {err}"))?;
            tx.batch_execute(sql)
                .map_err(|err| format!("failed to execute script: {err}"))?;
            tx.commit()
                .map_err(|err| format!("failed to commit script: {err}"))
        });
        observe("execute_script", started, result)
    }

    fn connection(&self) -> Result<PgConnection, String> {
        let started = Instant::now();
        let client = self.pool.get().map_err(|err| {
            metrics::counter!("depthset.infra.postgres.pool.get.errors_total").increment(1);
            format!("failed to checkout postgres connection: {err}")
        })?;
        metrics::histogram!("depthset.infra.postgres.pool.get_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(client)
    }

    fn query(
        &self,
        op: &'static str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, String> {
        let started = Instant::now();
        let result = self.connection().and_then(|mut client| {
            client
                .query(sql, params)
                .map_err(|err| format!("{op} query failed: {err}"))
        });
        if let Ok(rows) = &result {
            metrics::counter!("depthset.infra.postgres.rows_returned_total", "op" => op)
                .increment(rows.len() as u64);
        }
        observe(op, started, result)
    }

    /// Executes `sql` once per parameter set inside a single transaction.
    fn execute_batch(&self, op: &'static str, sql: &str, batch: &[SqlValues]) -> Result<(), String> {
        let started = Instant::now();
        let result = self.connection().and_then(|mut client| {
            let mut tx = client
                .transaction()
                .map_err(|err| format!("{op}: failed to open transaction: {err}"))?;
            let statement = tx
                .prepare(sql)
                .map_err(|err| format!("{op}: failed to prepare statement: {err}"))?;
            for values in batch {
                let params: Vec<&(dyn ToSql + Sync)> =
                    values.iter().map(|value| value.as_ref()).collect();
                tx.execute(&statement, &params)
                    .map_err(|err| format!("{op}: insert failed: {err}"))?;
            }
            tx.commit()
                .map_err(|err| format!("{op}: failed to commit: {err}"))
        });
        if result.is_ok() {
            metrics::counter!("depthset.infra.postgres.rows_written_total", "op" => op)
                .increment(batch.len() as u64);
        }
        observe(op, started, result)
    }

    fn select_records_sql(&self, filter: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {filter}",
            record_columns().join(", "),
            self.tables.records
        )
    }

    fn book_events(
        &self,
        op: &'static str,
        symbol: SymbolId,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<OrderBookEvent>, RepositoryError> {
        self.query(op, sql, params)?
            .iter()
            .map(|row| book_event_from_row(symbol, row))
            .collect()
    }
}

impl DataSetRepository for PostgresDataSetRepository {
    fn last_record(&self, symbol: SymbolId) -> Result<Option<DataSetRecord>, RepositoryError> {
        let _span = tracing::debug_span!("infra.postgres.last_record", symbol = %symbol).entered();
        let sql = self.select_records_sql(
            "symbol_id = $1 ORDER BY data_set_idx DESC, record_idx DESC LIMIT 1",
        );
        let rows = self.query("last_record", &sql, &[&symbol.name()])?;
        rows.first().map(record_from_row).transpose()
    }

    fn order_book_snapshots(
        &self,
        symbol: SymbolId,
        from_ts_ms: i64,
        limit: usize,
    ) -> Result<Vec<OrderBookEvent>, RepositoryError> {
        let _span =
            tracing::debug_span!("infra.postgres.order_book_snapshots", symbol = %symbol).entered();
        let sql = format!(
            "SELECT timestamp_ms, action_id::text, asks, bids FROM {} \
             WHERE symbol_id = $1 AND action_id::text = 'Snapshot' AND timestamp_ms >= $2 \
             ORDER BY timestamp_ms ASC LIMIT $3",
            self.tables.order_books
        );
        let limit = i64::try_from(limit).map_err(|_| format!("limit too large: {limit}"))?;
        self.book_events(
            "order_book_snapshots",
            symbol,
            &sql,
            &[&symbol.name(), &from_ts_ms, &limit],
        )
    }

    fn order_book_updates(
        &self,
        symbol: SymbolId,
        start_ts_ms: i64,
        end_ts_ms: i64,
    ) -> Result<Vec<OrderBookEvent>, RepositoryError> {
        let _span =
            tracing::debug_span!("infra.postgres.order_book_updates", symbol = %symbol).entered();
        let sql = format!(
            "SELECT timestamp_ms, action_id::text, asks, bids FROM {} \
             WHERE symbol_id = $1 AND action_id::text = 'Update' \
               AND timestamp_ms >= $2 AND timestamp_ms < $3 \
             ORDER BY timestamp_ms ASC",
            self.tables.order_books
        );
        self.book_events(
            "order_book_updates",
            symbol,
            &sql,
            &[&symbol.name(), &start_ts_ms, &end_ts_ms],
        )
    }

    fn trades(
        &self,
        symbol: SymbolId,
        start_ts_ms: i64,
        end_ts_ms: i64,
    ) -> Result<Vec<Trade>, RepositoryError> {
        let _span = tracing::debug_span!("infra.postgres.trades", symbol = %symbol).entered();
        let sql = format!(
            "SELECT timestamp_ms, trade_id, price, quantity, is_buy FROM {} \
             WHERE symbol_id = $1 AND timestamp_ms >= $2 AND timestamp_ms <= $3 \
             ORDER BY trade_id ASC",
            self.tables.trades
        );
        self.query("trades", &sql, &[&symbol.name(), &start_ts_ms, &end_ts_ms])?
            .iter()
            .map(|row| trade_from_row(symbol, row))
            .collect()
    }

    fn save_records(&self, records: &[DataSetRecord]) -> Result<(), RepositoryError> {
        if records.is_empty() {
            return Ok(());
        }
        let _span =
            tracing::info_span!("infra.postgres.save_records", records = records.len()).entered();
        let sql = insert_records_sql(&self.tables.records);
        let batch: Vec<SqlValues> = records.iter().map(record_values).collect();
        Ok(self.execute_batch("save_records", &sql, &batch)?)
    }

    fn records(
        &self,
        symbol: SymbolId,
        data_set_idx: i32,
    ) -> Result<Vec<DataSetRecord>, RepositoryError> {
        let sql =
            self.select_records_sql("symbol_id = $1 AND data_set_idx = $2 ORDER BY record_idx ASC");
        self.query("records", &sql, &[&symbol.name(), &data_set_idx])?
            .iter()
            .map(record_from_row)
            .collect()
    }
}

impl TradeRunRepository for PostgresDataSetRepository {
    fn last_run(&self, symbol: SymbolId) -> Result<Option<TradeRunRecord>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE symbol_id = $1 ORDER BY start_trade_id DESC LIMIT 1",
            RUN_COLUMNS.join(", "),
            self.tables.trade_runs
        );
        let rows = self.query("last_run", &sql, &[&symbol.name()])?;
        rows.first().map(run_from_row).transpose()
    }

    fn trades_from(
        &self,
        symbol: SymbolId,
        from_ts_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Trade>, RepositoryError> {
        let sql = format!(
            "SELECT timestamp_ms, trade_id, price, quantity, is_buy FROM {} \
             WHERE symbol_id = $1 AND ($2::BIGINT IS NULL OR timestamp_ms >= $2) \
             ORDER BY trade_id ASC LIMIT $3",
            self.tables.trades
        );
        let limit = i64::try_from(limit).map_err(|_| format!("limit too large: {limit}"))?;
        self.query("trades_from", &sql, &[&symbol.name(), &from_ts_ms, &limit])?
            .iter()
            .map(|row| trade_from_row(symbol, row))
            .collect()
    }

    fn upsert_runs(&self, runs: &[TradeRunRecord]) -> Result<(), RepositoryError> {
        if runs.is_empty() {
            return Ok(());
        }
        let _span = tracing::info_span!("infra.postgres.upsert_runs", runs = runs.len()).entered();
        let sql = upsert_runs_sql(&self.tables.trade_runs);
        let batch: Vec<SqlValues> = runs.iter().map(run_values).collect();
        Ok(self.execute_batch("upsert_runs", &sql, &batch)?)
    }
}

fn observe<T>(op: &'static str, started: Instant, result: Result<T, String>) -> Result<T, String> {
    metrics::histogram!("depthset.infra.postgres.query_ms", "op" => op)
        .record(started.elapsed().as_secs_f64() * 1000.0);
    match &result {
        Ok(_) => {
            metrics::counter!("depthset.infra.postgres.calls_total", "op" => op, "result" => "ok")
                .increment(1);
        }
        Err(err) => {
            metrics::counter!("depthset.infra.postgres.calls_total", "op" => op, "result" => "err")
                .increment(1);
            tracing::error!(op, error = %err, "postgres operation failed");
        }
    }
    result
}

const TRADE_COLUMNS: [&str; 14] = [
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
    "start_trade_id",
    "end_trade_id",
    "start_timestamp_ms",
    "end_timestamp_ms",
];

/// (stage, side) pairs in the order the record stores its book statistics.
const BOOK_SIDES: [(&str, &str); 4] = [("start", "ask"), ("start", "bid"), ("end", "ask"), ("end", "bid")];

fn side_columns(stage: &str, side: &str) -> [String; 8] {
    [
        format!("{stage}_{side}s_total_quantity"),
        format!("{stage}_{side}s_total_volume"),
        format!("max_{stage}_{side}_price"),
        format!("max_{stage}_{side}_quantity"),
        format!("max_{stage}_{side}_volume"),
        format!("min_{stage}_{side}_price"),
        format!("min_{stage}_{side}_quantity"),
        format!("min_{stage}_{side}_volume"),
    ]
}

fn record_columns() -> Vec<String> {
    let mut columns: Vec<String> = ["symbol_id", "data_set_idx", "record_idx"]
        .iter()
        .chain(TRADE_COLUMNS.iter())
        .map(|column| column.to_string())
        .collect();
    for (stage, side) in BOOK_SIDES {
        columns.extend(side_columns(stage, side));
    }
    columns
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|idx| format!("${idx}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_records_sql(table: &str) -> String {
    let columns = record_columns();
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders(columns.len())
    )
}

fn sql_value<T: ToSql + Sync + 'static>(value: T) -> Box<dyn ToSql + Sync> {
    Box::new(value)
}

fn record_values(record: &DataSetRecord) -> SqlValues {
    let mut values: SqlValues = vec![
        sql_value(record.symbol_id.name()),
        sql_value(record.data_set_idx),
        sql_value(record.record_idx),
        sql_value(record.open_price.into_inner()),
        sql_value(record.high_price.into_inner()),
        sql_value(record.low_price.into_inner()),
        sql_value(record.close_price.into_inner()),
        sql_value(record.total_quantity.into_inner()),
        sql_value(record.total_volume.into_inner()),
        sql_value(record.total_trades_count),
        sql_value(record.buy_quantity.into_inner()),
        sql_value(record.buy_volume.into_inner()),
        sql_value(record.buy_trades_count),
        sql_value(record.start_trade_id),
        sql_value(record.end_trade_id),
        sql_value(record.start_timestamp_ms),
        sql_value(record.end_timestamp_ms),
    ];
    for stats in [
        &record.start_asks,
        &record.start_bids,
        &record.end_asks,
        &record.end_bids,
    ] {
        for value in side_values(stats) {
            values.push(sql_value(value.into_inner()));
        }
    }
    values
}

fn side_values(stats: &BookSideStatistics) -> [Decimal; 8] {
    [
        stats.total_quantity,
        stats.total_volume,
        stats.max_price,
        stats.max_quantity,
        stats.max_volume,
        stats.min_price,
        stats.min_quantity,
        stats.min_volume,
    ]
}

/// Reads columns left to right, in the order the SELECT listed them.
struct RowCursor<'a> {
    row: &'a Row,
    idx: usize,
}

impl<'a> RowCursor<'a> {
    fn new(row: &'a Row) -> Self {
        Self { row, idx: 0 }
    }

    fn next<T: FromSql<'a>>(&mut self) -> Result<T, RepositoryError> {
        let idx = self.idx;
        self.idx += 1;
        self.row
            .try_get::<usize, T>(idx)
            .map_err(|err| {
                RepositoryError::Storage(format!("failed to read column #{idx}: {err}"))
            })
    }

    fn decimal(&mut self) -> Result<Decimal, RepositoryError> {
        self.next::<rust_decimal::Decimal>().map(Decimal::from)
    }

    fn symbol(&mut self) -> Result<SymbolId, RepositoryError> {
        let raw: String = self.next()?;
        SymbolId::from_name(&raw).map_err(|err| RepositoryError::invalid("symbol_id", err))
    }

    fn side(&mut self) -> Result<BookSideStatistics, RepositoryError> {
        Ok(BookSideStatistics {
            total_quantity: self.decimal()?,
            total_volume: self.decimal()?,
            max_price: self.decimal()?,
            max_quantity: self.decimal()?,
            max_volume: self.decimal()?,
            min_price: self.decimal()?,
            min_quantity: self.decimal()?,
            min_volume: self.decimal()?,
        })
    }
}

fn record_from_row(row: &Row) -> Result<DataSetRecord, RepositoryError> {
    let mut cur = RowCursor::new(row);
    Ok(DataSetRecord {
        symbol_id: cur.symbol()?,
        data_set_idx: cur.next()?,
        record_idx: cur.next()?,
        open_price: cur.decimal()?,
        high_price: cur.decimal()?,
        low_price: cur.decimal()?,
        close_price: cur.decimal()?,
        total_quantity: cur.decimal()?,
        total_volume: cur.decimal()?,
        total_trades_count: cur.next()?,
        buy_quantity: cur.decimal()?,
        buy_volume: cur.decimal()?,
        buy_trades_count: cur.next()?,
        start_trade_id: cur.next()?,
        end_trade_id: cur.next()?,
        start_timestamp_ms: cur.next()?,
        end_timestamp_ms: cur.next()?,
        start_asks: cur.side()?,
        start_bids: cur.side()?,
        end_asks: cur.side()?,
        end_bids: cur.side()?,
    })
}

fn book_event_from_row(symbol: SymbolId, row: &Row) -> Result<OrderBookEvent, RepositoryError> {
    let mut cur = RowCursor::new(row);
    let timestamp_ms: i64 = cur.next()?;
    let action: String = cur.next()?;
    let asks: Option<serde_json::Value> = cur.next()?;
    let bids: Option<serde_json::Value> = cur.next()?;
    let side = |name: &str, value: Option<serde_json::Value>| {
        decode_book_side(&value.unwrap_or_default())
            .map_err(|err| err.context(format!("order book at {timestamp_ms} ({name})")))
    };
    Ok(OrderBookEvent {
        symbol_id: symbol,
        timestamp_ms,
        action: OrderBookAction::parse(&action).map_err(|err| {
            RepositoryError::invalid(format!("order book at {timestamp_ms}"), err)
        })?,
        asks: side("asks", asks)?,
        bids: side("bids", bids)?,
    })
}

fn trade_from_row(symbol: SymbolId, row: &Row) -> Result<Trade, RepositoryError> {
    let mut cur = RowCursor::new(row);
    Ok(Trade {
        symbol_id: symbol,
        timestamp_ms: cur.next()?,
        trade_id: cur.next()?,
        price: cur.decimal()?,
        quantity: cur.decimal()?,
        is_buy: cur.next()?,
    })
}

const RUN_COLUMNS: [&str; 16] = [
    "symbol_id",
    "start_trade_id",
    "end_trade_id",
    "start_timestamp_ms",
    "end_timestamp_ms",
    "is_buy",
    "open_price",
    "high_price",
    "low_price",
    "close_price",
    "buy_quantity",
    "buy_volume",
    "buy_trades_count",
    "total_quantity",
    "total_volume",
    "total_trades_count",
];

fn upsert_runs_sql(table: &str) -> String {
    let updates = RUN_COLUMNS[2..]
        .iter()
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({}) \
         ON CONFLICT (symbol_id, start_trade_id) DO UPDATE SET {updates}",
        RUN_COLUMNS.join(", "),
        placeholders(RUN_COLUMNS.len())
    )
}

fn run_values(run: &TradeRunRecord) -> SqlValues {
    vec![
        sql_value(run.symbol_id.name()),
        sql_value(run.start_trade_id),
        sql_value(run.end_trade_id),
        sql_value(run.start_timestamp_ms),
        sql_value(run.end_timestamp_ms),
        sql_value(run.is_buy),
        sql_value(run.open_price.into_inner()),
        sql_value(run.high_price.into_inner()),
        sql_value(run.low_price.into_inner()),
        sql_value(run.close_price.into_inner()),
        sql_value(run.buy_quantity.into_inner()),
        sql_value(run.buy_volume.into_inner()),
        sql_value(run.buy_trades_count),
        sql_value(run.total_quantity.into_inner()),
        sql_value(run.total_volume.into_inner()),
        sql_value(run.total_trades_count),
    ]
}

fn run_from_row(row: &Row) -> Result<TradeRunRecord, RepositoryError> {
    let mut cur = RowCursor::new(row);
    Ok(TradeRunRecord {
        symbol_id: cur.symbol()?,
        start_trade_id: cur.next()?,
        end_trade_id: cur.next()?,
        start_timestamp_ms: cur.next()?,
        end_timestamp_ms: cur.next()?,
        is_buy: cur.next()?,
        open_price: cur.decimal()?,
        high_price: cur.decimal()?,
        low_price: cur.decimal()?,
        close_price: cur.decimal()?,
        buy_quantity: cur.decimal()?,
        buy_volume: cur.decimal()?,
        buy_trades_count: cur.next()?,
        total_quantity: cur.decimal()?,
        total_volume: cur.decimal()?,
        total_trades_count: cur.next()?,
    })
}

fn validate_table_name(table: &str) -> Result<(), String> {
    if table.is_empty() {
        return Err("table name is empty".to_string());
    }
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 {
        return Err(format!("invalid table name: {table}"));
    }
    for part in parts {
        let mut chars = part.chars();
        let first_ok = matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_');
        if !first_ok || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(format!("invalid table name: {table}"));
        }
    }
    Ok(())
}
