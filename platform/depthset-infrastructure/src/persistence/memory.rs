use depthset_domain::errors::RepositoryError;
use depthset_domain::repositories::data_set::DataSetRepository;
use depthset_domain::repositories::trade_runs::TradeRunRepository;
use depthset_domain::value_objects::data_set_record::DataSetRecord;
use depthset_domain::value_objects::order_book_event::{OrderBookAction, OrderBookEvent};
use depthset_domain::value_objects::symbol::SymbolId;
use depthset_domain::value_objects::trade::Trade;
use depthset_domain::value_objects::trade_run::TradeRunRecord;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Default)]
struct MemoryState {
    events: Vec<OrderBookEvent>,
    trades: Vec<Trade>,
    records: BTreeMap<(SymbolId, i32, i32), DataSetRecord>,
    runs: BTreeMap<(SymbolId, i64), TradeRunRecord>,
    failing_calls: u32,
    /// Returned by the injected failures; a storage error naming the call when `None`.
    injected: Option<RepositoryError>,
}

impl MemoryState {
    fn check_failure(&mut self, op: &str) -> Result<(), RepositoryError> {
        if self.failing_calls == 0 {
            return Ok(());
        }
        self.failing_calls -= 1;
        Err(match &self.injected {
            Some(err) => err.clone(),
            None => RepositoryError::Storage(format!("{op}: injected storage failure")),
        })
    }
}

/// Process-local store with the same query semantics as the Postgres adapter.
///
/// Used by tests and dry runs. `fail_next_calls` makes the next calls return storage errors;
/// `fail_next_calls_with` returns a given error instead, e.g. undecodable stored data.
#[derive(Default)]
pub struct InMemoryDataSetRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryDataSetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: OrderBookEvent) {
        self.state.lock().events.push(event);
    }

    pub fn push_trade(&self, trade: Trade) {
        self.state.lock().trades.push(trade);
    }

    pub fn extend_trades(&self, trades: impl IntoIterator<Item = Trade>) {
        self.state.lock().trades.extend(trades);
    }

    pub fn fail_next_calls(&self, calls: u32) {
        let mut state = self.state.lock();
        state.failing_calls = calls;
        state.injected = None;
    }

    pub fn fail_next_calls_with(&self, calls: u32, err: RepositoryError) {
        let mut state = self.state.lock();
        state.failing_calls = calls;
        state.injected = Some(err);
    }

    pub fn stored_records(&self, symbol: SymbolId) -> Vec<DataSetRecord> {
        self.state
            .lock()
            .records
            .values()
            .filter(|record| record.symbol_id == symbol)
            .cloned()
            .collect()
    }

    pub fn stored_runs(&self, symbol: SymbolId) -> Vec<TradeRunRecord> {
        self.state
            .lock()
            .runs
            .range((symbol, i64::MIN)..=(symbol, i64::MAX))
            .map(|(_, run)| run.clone())
            .collect()
    }

    fn events_where(
        &self,
        op: &str,
        filter: impl Fn(&OrderBookEvent) -> bool,
    ) -> Result<Vec<OrderBookEvent>, RepositoryError> {
        let mut state = self.state.lock();
        state.check_failure(op)?;
        let mut events: Vec<OrderBookEvent> = state
            .events
            .iter()
            .filter(|event| filter(event))
            .cloned()
            .collect();
        events.sort_by_key(|event| event.timestamp_ms);
        Ok(events)
    }

    fn trades_where(
        &self,
        op: &str,
        filter: impl Fn(&Trade) -> bool,
    ) -> Result<Vec<Trade>, RepositoryError> {
        let mut state = self.state.lock();
        state.check_failure(op)?;
        let mut trades: Vec<Trade> = state
            .trades
            .iter()
            .filter(|trade| filter(trade))
            .cloned()
            .collect();
        trades.sort_by_key(|trade| trade.trade_id);
        Ok(trades)
    }
}

impl DataSetRepository for InMemoryDataSetRepository {
    fn last_record(&self, symbol: SymbolId) -> Result<Option<DataSetRecord>, RepositoryError> {
        let mut state = self.state.lock();
        state.check_failure("last_record")?;
        Ok(state
            .records
            .range((symbol, i32::MIN, i32::MIN)..=(symbol, i32::MAX, i32::MAX))
            .next_back()
            .map(|(_, record)| record.clone()))
    }

    fn order_book_snapshots(
        &self,
        symbol: SymbolId,
        from_ts_ms: i64,
        limit: usize,
    ) -> Result<Vec<OrderBookEvent>, RepositoryError> {
        let mut events = self.events_where("order_book_snapshots", |event| {
            event.symbol_id == symbol
                && event.action == OrderBookAction::Snapshot
                && event.timestamp_ms >= from_ts_ms
        })?;
        events.truncate(limit);
        Ok(events)
    }

    fn order_book_updates(
        &self,
        symbol: SymbolId,
        start_ts_ms: i64,
        end_ts_ms: i64,
    ) -> Result<Vec<OrderBookEvent>, RepositoryError> {
        self.events_where("order_book_updates", |event| {
            event.symbol_id == symbol
                && event.action == OrderBookAction::Update
                && event.timestamp_ms >= start_ts_ms
                && event.timestamp_ms < end_ts_ms
        })
    }

    fn trades(
        &self,
        symbol: SymbolId,
        start_ts_ms: i64,
        end_ts_ms: i64,
    ) -> Result<Vec<Trade>, RepositoryError> {
        self.trades_where("trades", |trade| {
            trade.symbol_id == symbol
                && trade.timestamp_ms >= start_ts_ms
                && trade.timestamp_ms <= end_ts_ms
        })
    }

    fn save_records(&self, records: &[DataSetRecord]) -> Result<(), RepositoryError> {
        let mut state = self.state.lock();
        state.check_failure("save_records")?;
        for record in records {
            let key = (record.symbol_id, record.data_set_idx, record.record_idx);
            if state.records.contains_key(&key) {
                return Err(RepositoryError::Storage(format!(
                    "duplicate record {}/{}/{}",
                    record.symbol_id, record.data_set_idx, record.record_idx
                )));
            }
        }
        for record in records {
            let key = (record.symbol_id, record.data_set_idx, record.record_idx);
            state.records.insert(key, record.clone());
        }
        Ok(())
    }

    fn records(
        &self,
        symbol: SymbolId,
        data_set_idx: i32,
    ) -> Result<Vec<DataSetRecord>, RepositoryError> {
        let mut state = self.state.lock();
        state.check_failure("records")?;
        Ok(state
            .records
            .range((symbol, data_set_idx, i32::MIN)..=(symbol, data_set_idx, i32::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }
}

impl TradeRunRepository for InMemoryDataSetRepository {
    fn last_run(&self, symbol: SymbolId) -> Result<Option<TradeRunRecord>, RepositoryError> {
        let mut state = self.state.lock();
        state.check_failure("last_run")?;
        Ok(state
            .runs
            .range((symbol, i64::MIN)..=(symbol, i64::MAX))
            .next_back()
            .map(|(_, run)| run.clone()))
    }

    fn trades_from(
        &self,
        symbol: SymbolId,
        from_ts_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Trade>, RepositoryError> {
        let mut trades = self.trades_where("trades_from", |trade| {
            trade.symbol_id == symbol && from_ts_ms.map_or(true, |from| trade.timestamp_ms >= from)
        })?;
        trades.truncate(limit);
        Ok(trades)
    }

    fn upsert_runs(&self, runs: &[TradeRunRecord]) -> Result<(), RepositoryError> {
        let mut state = self.state.lock();
        state.check_failure("upsert_runs")?;
        for run in runs {
            state
                .runs
                .insert((run.symbol_id, run.start_trade_id), run.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthset_domain::errors::ValidationError;
    use depthset_domain::value_objects::decimal::Decimal;

    fn event(ts: i64, action: OrderBookAction) -> OrderBookEvent {
        OrderBookEvent {
            symbol_id: SymbolId::BtcUsdt,
            timestamp_ms: ts,
            action,
            asks: Vec::new(),
            bids: Vec::new(),
        }
    }

    fn trade(id: i64, ts: i64) -> Trade {
        Trade {
            symbol_id: SymbolId::BtcUsdt,
            timestamp_ms: ts,
            trade_id: id,
            price: Decimal::ONE,
            quantity: Decimal::ONE,
            is_buy: true,
        }
    }

    #[test]
    fn snapshot_and_update_windows_follow_bounds() {
        let repo = InMemoryDataSetRepository::new();
        repo.push_event(event(300, OrderBookAction::Snapshot));
        repo.push_event(event(100, OrderBookAction::Snapshot));
        repo.push_event(event(200, OrderBookAction::Update));
        repo.push_event(event(100, OrderBookAction::Update));
        repo.push_event(event(500, OrderBookAction::Snapshot));

        let snapshots = repo
            .order_book_snapshots(SymbolId::BtcUsdt, 100, 2)
            .unwrap();
        let ts: Vec<i64> = snapshots.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(ts, vec![100, 300]);

        let updates = repo
            .order_book_updates(SymbolId::BtcUsdt, 100, 200)
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].timestamp_ms, 100);

        assert!(repo
            .order_book_snapshots(SymbolId::EthUsdt, 0, 2)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn trades_are_inclusive_and_ordered_by_id() {
        let repo = InMemoryDataSetRepository::new();
        repo.extend_trades([trade(3, 200), trade(1, 100), trade(2, 150), trade(4, 201)]);

        let ids: Vec<i64> = repo
            .trades(SymbolId::BtcUsdt, 100, 200)
            .unwrap()
            .iter()
            .map(|t| t.trade_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let from: Vec<i64> = repo
            .trades_from(SymbolId::BtcUsdt, Some(150), 2)
            .unwrap()
            .iter()
            .map(|t| t.trade_id)
            .collect();
        assert_eq!(from, vec![2, 3]);
        assert_eq!(repo.trades_from(SymbolId::BtcUsdt, None, 10).unwrap().len(), 4);
    }

    #[test]
    fn upsert_overwrites_by_start_trade_id() {
        let repo = InMemoryDataSetRepository::new();
        let mut run = TradeRunRecord::open(&trade(1, 100)).unwrap();
        repo.upsert_runs(std::slice::from_ref(&run)).unwrap();
        run.push(&trade(2, 110)).unwrap();
        repo.upsert_runs(std::slice::from_ref(&run)).unwrap();

        let stored = repo.stored_runs(SymbolId::BtcUsdt);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].end_trade_id, 2);
        assert_eq!(
            repo.last_run(SymbolId::BtcUsdt).unwrap().unwrap().total_trades_count,
            2
        );
    }

    #[test]
    fn injected_failures_are_consumed() {
        let repo = InMemoryDataSetRepository::new();
        repo.fail_next_calls(1);
        assert_eq!(
            repo.last_record(SymbolId::BtcUsdt),
            Err(RepositoryError::Storage(
                "last_record: injected storage failure".to_string()
            ))
        );
        assert!(repo.last_record(SymbolId::BtcUsdt).unwrap().is_none());
    }

    #[test]
    fn injected_invalid_data_is_returned_as_given() {
        let repo = InMemoryDataSetRepository::new();
        let invalid =
            RepositoryError::invalid("book row #0", ValidationError::MalformedLevel { fields: 1 });
        repo.fail_next_calls_with(2, invalid.clone());

        assert_eq!(repo.order_book_snapshots(SymbolId::BtcUsdt, 0, 2), Err(invalid.clone()));
        assert_eq!(repo.trades_from(SymbolId::BtcUsdt, None, 10), Err(invalid));
        assert!(repo.trades_from(SymbolId::BtcUsdt, None, 10).is_ok());
    }
}
