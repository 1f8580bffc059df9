use crate::errors::ValidationError;
use crate::value_objects::data_set_record::TradeWindowStatistics;
use crate::value_objects::decimal::Decimal;
use crate::value_objects::trade::Trade;

pub struct TradeWindowAggregator;

impl TradeWindowAggregator {
    /// Reduces the trades with `start_ts <= timestamp < end_ts`, starting the scan at `*cursor`.
    /// `None` means the window holds no trade.
    ///
    /// `trades` must be sorted by timestamp. The cursor is left on the first trade at or past
    /// `end_ts` (or at `trades.len()`), so consecutive windows scan the list once in total.
    pub fn summarize(
        trades: &[Trade],
        start_ts: i64,
        end_ts: i64,
        cursor: &mut usize,
    ) -> Result<Option<TradeWindowStatistics>, ValidationError> {
        let mut stats: Option<TradeWindowStatistics> = None;

        while let Some(trade) = trades.get(*cursor) {
            if trade.timestamp_ms >= end_ts {
                break;
            }
            *cursor += 1;
            if trade.timestamp_ms < start_ts {
                continue;
            }
            match stats.as_mut() {
                Some(stats) => accumulate(stats, trade)?,
                None => stats = Some(open(trade)?),
            }
        }

        Ok(stats)
    }
}

fn open(trade: &Trade) -> Result<TradeWindowStatistics, ValidationError> {
    let volume = trade.volume()?;
    let (buy_quantity, buy_volume, buy_trade_count) = if trade.is_buy {
        (trade.quantity, volume, 1)
    } else {
        (Decimal::ZERO, Decimal::ZERO, 0)
    };
    Ok(TradeWindowStatistics {
        open_price: trade.price,
        high_price: trade.price,
        low_price: trade.price,
        close_price: trade.price,
        total_quantity: trade.quantity,
        total_volume: volume,
        buy_quantity,
        buy_volume,
        trade_count: 1,
        buy_trade_count,
        start_trade_id: trade.trade_id,
        end_trade_id: trade.trade_id,
        start_timestamp_ms: trade.timestamp_ms,
        end_timestamp_ms: trade.timestamp_ms,
    })
}

fn accumulate(stats: &mut TradeWindowStatistics, trade: &Trade) -> Result<(), ValidationError> {
    let volume = trade.volume()?;
    stats.total_quantity = stats.total_quantity.checked_add(trade.quantity)?;
    stats.total_volume = stats.total_volume.checked_add(volume)?;
    stats.trade_count = increment(stats.trade_count)?;
    if trade.is_buy {
        stats.buy_quantity = stats.buy_quantity.checked_add(trade.quantity)?;
        stats.buy_volume = stats.buy_volume.checked_add(volume)?;
        stats.buy_trade_count = increment(stats.buy_trade_count)?;
    }

    stats.close_price = trade.price;
    stats.high_price = stats.high_price.max(trade.price);
    stats.low_price = stats.low_price.min(trade.price);
    stats.end_trade_id = trade.trade_id;
    stats.end_timestamp_ms = trade.timestamp_ms;
    Ok(())
}

fn increment(count: u32) -> Result<u32, ValidationError> {
    count
        .checked_add(1)
        .ok_or(ValidationError::ArithmeticOverflow("trade count"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::symbol::SymbolId;

    fn trade(ts: i64, id: i64, price: &str, qty: &str, is_buy: bool) -> Trade {
        Trade {
            symbol_id: SymbolId::BtcUsdt,
            timestamp_ms: ts,
            trade_id: id,
            price: Decimal::parse(price).unwrap(),
            quantity: Decimal::parse(qty).unwrap(),
            is_buy,
        }
    }

    #[test]
    fn window_is_half_open_and_cursor_stops_at_end() {
        let trades = vec![
            trade(500, 1, "10", "1", true),
            trade(1000, 2, "12", "1", false),
            trade(1500, 3, "9", "2", true),
            trade(2000, 4, "11", "1", true),
        ];
        let mut cursor = 0;

        let stats = TradeWindowAggregator::summarize(&trades, 1000, 2000, &mut cursor)
            .unwrap()
            .unwrap();

        assert_eq!(cursor, 3);
        assert_eq!(stats.trade_count, 2);
        assert_eq!(stats.buy_trade_count, 1);
        assert_eq!(stats.open_price, Decimal::from(12));
        assert_eq!(stats.close_price, Decimal::from(9));
        assert_eq!(stats.high_price, Decimal::from(12));
        assert_eq!(stats.low_price, Decimal::from(9));
        assert_eq!(stats.start_trade_id, 2);
        assert_eq!(stats.end_trade_id, 3);
        assert_eq!(stats.start_timestamp_ms, 1000);
        assert_eq!(stats.end_timestamp_ms, 1500);
        assert_eq!(stats.total_quantity, Decimal::from(3));
        assert_eq!(stats.total_volume, Decimal::from(30));
        assert_eq!(stats.buy_volume, Decimal::from(18));
    }

    #[test]
    fn cursor_reaches_end_when_trades_run_out() {
        let trades = vec![trade(1200, 1, "10", "1", false)];
        let mut cursor = 0;
        let stats = TradeWindowAggregator::summarize(&trades, 1000, 2000, &mut cursor)
            .unwrap()
            .unwrap();
        assert_eq!(stats.trade_count, 1);
        assert_eq!(stats.buy_trade_count, 0);
        assert_eq!(stats.buy_volume, Decimal::ZERO);
        assert_eq!(cursor, trades.len());

        let next = TradeWindowAggregator::summarize(&trades, 2000, 3000, &mut cursor).unwrap();
        assert_eq!(next, None);
    }

    #[test]
    fn consecutive_windows_share_one_cursor() {
        let trades: Vec<Trade> = (0..10)
            .map(|i| trade(i * 100, i, "1", "1", i % 2 == 0))
            .collect();
        let mut cursor = 0;
        let mut seen = 0;
        for start in (0..1000).step_by(250) {
            if let Some(stats) =
                TradeWindowAggregator::summarize(&trades, start, start + 250, &mut cursor).unwrap()
            {
                seen += stats.trade_count;
            }
        }
        assert_eq!(seen, 10);
        assert_eq!(cursor, trades.len());
    }

    #[test]
    fn volume_overflow_fails_the_window() {
        let trades = vec![
            trade(1000, 1, "1", "1", true),
            trade(1100, 2, "10000000000000000", "10000000000000", true),
        ];
        let mut cursor = 0;
        assert_eq!(
            TradeWindowAggregator::summarize(&trades, 1000, 2000, &mut cursor),
            Err(ValidationError::ArithmeticOverflow("mul"))
        );
    }
}
