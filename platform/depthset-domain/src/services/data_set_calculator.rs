use crate::entities::order_book::OrderBookState;
use crate::errors::ValidationError;
use crate::services::order_book_stats::OrderBookAggregator;
use crate::services::trade_window::TradeWindowAggregator;
use crate::value_objects::data_set_record::{
    BookSideStatistics, DataSetRecord, TradeWindowStatistics,
};
use crate::value_objects::order_book_event::{OrderBookAction, OrderBookEvent};
use crate::value_objects::symbol::SymbolId;
use crate::value_objects::trade::Trade;
use serde::{Deserialize, Serialize};

/// How the start-of-window book statistics are captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatsPolicy {
    /// Per side, keep recapturing until a non-zero total volume is seen, then freeze that value
    /// for the rest of the call. This is what the historical data sets were built with.
    #[default]
    FirstNonEmpty,
    /// Capture the pre-update book on every window.
    PerWindow,
}

#[derive(Debug, Clone, Default)]
pub struct DataSetCalculator {
    start_stats: StartStatsPolicy,
}

impl DataSetCalculator {
    pub fn new(start_stats: StartStatsPolicy) -> Self {
        Self { start_stats }
    }

    pub fn start_stats_policy(&self) -> StartStatsPolicy {
        self.start_stats
    }

    /// Replays `events` (one snapshot followed by updates) and emits one record per window
    /// `[events[i].timestamp_ms, events[i + 1].timestamp_ms)` that contains at least one trade.
    ///
    /// `trades` must be sorted by timestamp. Fewer than two events yield no records.
    pub fn calculate(
        &self,
        symbol_id: SymbolId,
        data_set_idx: i32,
        events: &[OrderBookEvent],
        trades: &[Trade],
    ) -> Result<Vec<DataSetRecord>, ValidationError> {
        if events.len() < 2 {
            return Ok(Vec::new());
        }
        validate_sequence(events)?;

        let mut book = OrderBookState::new();
        book.initialize_from_snapshot(&events[0])?;

        let mut start_asks = BookSideStatistics::default();
        let mut start_bids = BookSideStatistics::default();
        let mut trade_cursor = 0usize;
        let mut records = Vec::new();

        for pair in events.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);

            if self.recapture(&start_asks) {
                start_asks = OrderBookAggregator::summarize(book.asks())?;
            }
            if self.recapture(&start_bids) {
                start_bids = OrderBookAggregator::summarize(book.bids())?;
            }

            book.apply_update(next)?;
            let end_asks = OrderBookAggregator::summarize(book.asks())?;
            let end_bids = OrderBookAggregator::summarize(book.bids())?;

            let Some(window) = TradeWindowAggregator::summarize(
                trades,
                current.timestamp_ms,
                next.timestamp_ms,
                &mut trade_cursor,
            )?
            else {
                continue;
            };

            let record_idx = i32::try_from(records.len())
                .map_err(|_| ValidationError::ArithmeticOverflow("record_idx"))?;
            let sides = WindowBook {
                start_asks,
                start_bids,
                end_asks,
                end_bids,
            };
            records.push(build_record(
                symbol_id,
                data_set_idx,
                record_idx,
                next.timestamp_ms,
                window,
                sides,
            )?);
        }

        Ok(records)
    }

    fn recapture(&self, captured: &BookSideStatistics) -> bool {
        match self.start_stats {
            StartStatsPolicy::PerWindow => true,
            StartStatsPolicy::FirstNonEmpty => captured.total_volume.is_zero(),
        }
    }
}

fn validate_sequence(events: &[OrderBookEvent]) -> Result<(), ValidationError> {
    let mut previous_ms: Option<i64> = None;
    for (index, event) in events.iter().enumerate() {
        let expected = if index == 0 {
            OrderBookAction::Snapshot
        } else {
            OrderBookAction::Update
        };
        if event.action != expected {
            return Err(ValidationError::UnexpectedAction {
                index,
                expected,
                found: event.action,
            });
        }
        if let Some(previous_ms) = previous_ms {
            if event.timestamp_ms < previous_ms {
                return Err(ValidationError::OutOfOrderEvent {
                    index,
                    previous_ms,
                    current_ms: event.timestamp_ms,
                });
            }
        }
        previous_ms = Some(event.timestamp_ms);
    }
    Ok(())
}

struct WindowBook {
    start_asks: BookSideStatistics,
    start_bids: BookSideStatistics,
    end_asks: BookSideStatistics,
    end_bids: BookSideStatistics,
}

fn build_record(
    symbol_id: SymbolId,
    data_set_idx: i32,
    record_idx: i32,
    end_timestamp_ms: i64,
    window: TradeWindowStatistics,
    book: WindowBook,
) -> Result<DataSetRecord, ValidationError> {
    Ok(DataSetRecord {
        symbol_id,
        data_set_idx,
        record_idx,
        open_price: window.open_price,
        high_price: window.high_price,
        low_price: window.low_price,
        close_price: window.close_price,
        total_quantity: window.total_quantity,
        total_volume: window.total_volume,
        total_trades_count: count_to_i32(window.trade_count)?,
        buy_quantity: window.buy_quantity,
        buy_volume: window.buy_volume,
        buy_trades_count: count_to_i32(window.buy_trade_count)?,
        start_trade_id: window.start_trade_id,
        end_trade_id: window.end_trade_id,
        start_timestamp_ms: window.start_timestamp_ms,
        end_timestamp_ms,
        start_asks: book.start_asks,
        start_bids: book.start_bids,
        end_asks: book.end_asks,
        end_bids: book.end_bids,
    })
}

fn count_to_i32(count: u32) -> Result<i32, ValidationError> {
    i32::try_from(count).map_err(|_| ValidationError::ArithmeticOverflow("trade count"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::decimal::Decimal;
    use crate::value_objects::order_book_event::BookLevel;

    fn d(raw: &str) -> Decimal {
        Decimal::parse(raw).unwrap()
    }

    fn level(price: &str, qty: &str) -> BookLevel {
        BookLevel::new(d(price), d(qty))
    }

    fn event(ts: i64, action: OrderBookAction, asks: Vec<BookLevel>, bids: Vec<BookLevel>) -> OrderBookEvent {
        OrderBookEvent {
            symbol_id: SymbolId::BtcUsdt,
            timestamp_ms: ts,
            action,
            asks,
            bids,
        }
    }

    fn snapshot(ts: i64) -> OrderBookEvent {
        event(
            ts,
            OrderBookAction::Snapshot,
            vec![level("50001", "1"), level("50002", "2")],
            vec![level("49999", "1.5")],
        )
    }

    fn update(ts: i64) -> OrderBookEvent {
        event(ts, OrderBookAction::Update, vec![level("50001", "0")], vec![])
    }

    fn trade(ts: i64, id: i64, price: &str, qty: &str, is_buy: bool) -> Trade {
        Trade {
            symbol_id: SymbolId::BtcUsdt,
            timestamp_ms: ts,
            trade_id: id,
            price: d(price),
            quantity: d(qty),
            is_buy,
        }
    }

    #[test]
    fn single_window_with_one_trade_emits_one_record() {
        let calculator = DataSetCalculator::default();
        let records = calculator
            .calculate(
                SymbolId::BtcUsdt,
                7,
                &[snapshot(1000), update(2000)],
                &[trade(1500, 1, "50000", "0.1", true)],
            )
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.data_set_idx, 7);
        assert_eq!(record.record_idx, 0);
        assert_eq!(record.total_trades_count, 1);
        assert_eq!(record.buy_trades_count, 1);
        assert_eq!(record.open_price, d("50000"));
        assert_eq!(record.close_price, d("50000"));
        assert_eq!(record.start_trade_id, 1);
        assert_eq!(record.end_trade_id, 1);
        assert_eq!(record.start_timestamp_ms, 1500);
        assert_eq!(record.end_timestamp_ms, 2000);
        assert_eq!(record.total_volume, d("5000"));

        assert_eq!(record.start_asks.total_quantity, d("3"));
        assert_eq!(record.end_asks.total_quantity, d("2"));
        assert_eq!(record.end_asks.min_price, d("50002"));
        assert_eq!(record.start_bids, record.end_bids);
    }

    #[test]
    fn no_trades_means_no_records() {
        let records = DataSetCalculator::default()
            .calculate(SymbolId::BtcUsdt, 0, &[snapshot(1000), update(2000)], &[])
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn fewer_than_two_events_is_empty() {
        let calculator = DataSetCalculator::default();
        assert!(calculator
            .calculate(SymbolId::BtcUsdt, 0, &[], &[])
            .unwrap()
            .is_empty());
        assert!(calculator
            .calculate(SymbolId::BtcUsdt, 0, &[snapshot(1000)], &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn sequence_errors_fail_the_call() {
        let calculator = DataSetCalculator::default();

        let err = calculator
            .calculate(SymbolId::BtcUsdt, 0, &[update(1000), update(2000)], &[])
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnexpectedAction { index: 0, .. }));

        let err = calculator
            .calculate(SymbolId::BtcUsdt, 0, &[snapshot(1000), snapshot(2000)], &[])
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnexpectedAction { index: 1, .. }));

        let err = calculator
            .calculate(SymbolId::BtcUsdt, 0, &[snapshot(2000), update(1000)], &[])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfOrderEvent {
                index: 1,
                previous_ms: 2000,
                current_ms: 1000,
            }
        );
    }

    #[test]
    fn start_stats_policy_controls_recapture() {
        let events = [
            snapshot(1000),
            event(2000, OrderBookAction::Update, vec![level("50003", "4")], vec![]),
            update(3000),
        ];
        let trades = [
            trade(1500, 1, "50000", "1", true),
            trade(2500, 2, "50000", "1", false),
        ];

        let legacy = DataSetCalculator::new(StartStatsPolicy::FirstNonEmpty)
            .calculate(SymbolId::BtcUsdt, 0, &events, &trades)
            .unwrap();
        assert_eq!(legacy.len(), 2);
        assert_eq!(legacy[1].start_asks, legacy[0].start_asks);
        assert_eq!(legacy[1].start_asks.total_quantity, d("3"));

        let per_window = DataSetCalculator::new(StartStatsPolicy::PerWindow)
            .calculate(SymbolId::BtcUsdt, 0, &events, &trades)
            .unwrap();
        assert_eq!(per_window[1].start_asks.total_quantity, d("7"));
        assert_eq!(per_window[1].start_asks, per_window[0].end_asks);
    }

    #[test]
    fn every_window_with_trades_becomes_a_record() {
        let events = [snapshot(1000), update(2000), update(3000), update(4000)];
        let trades = [
            trade(1000, 1, "50000", "1", true),
            trade(2999, 2, "50001", "1", false),
            trade(3000, 3, "50002", "2", true),
        ];

        let records = DataSetCalculator::default()
            .calculate(SymbolId::BtcUsdt, 0, &events, &trades)
            .unwrap();

        assert_eq!(records.len(), 3);
        let ids: Vec<_> = records
            .iter()
            .map(|r| (r.record_idx, r.start_trade_id, r.end_timestamp_ms))
            .collect();
        assert_eq!(ids, vec![(0, 1, 2000), (1, 2, 3000), (2, 3, 4000)]);
        assert_eq!(records[2].total_volume, d("100004"));
    }

    #[test]
    fn oversized_book_level_is_an_error() {
        let events = [
            event(
                1000,
                OrderBookAction::Snapshot,
                vec![level("10000000000000000", "10000000000000")],
                vec![],
            ),
            update(2000),
        ];
        let err = DataSetCalculator::default()
            .calculate(SymbolId::BtcUsdt, 0, &events, &[])
            .unwrap_err();
        assert_eq!(err, ValidationError::ArithmeticOverflow("mul"));
    }
}
