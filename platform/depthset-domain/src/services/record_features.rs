use crate::errors::ValidationError;
use crate::value_objects::data_set_record::DataSetRecord;
use crate::value_objects::decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Columns computed from a stored [`DataSetRecord`] at read time.
///
/// Ratios are `None` when their denominator is zero. Spread fields are `None` unless both end
/// book sides hold at least one level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFeatures {
    pub sell_quantity: Decimal,
    pub sell_volume: Decimal,
    pub sell_trades_count: i32,

    pub buy_quantity_percent: Option<Decimal>,
    pub buy_volume_percent: Option<Decimal>,
    pub buy_trades_count_percent: Option<Decimal>,
    pub sell_quantity_percent: Option<Decimal>,
    pub sell_volume_percent: Option<Decimal>,
    pub sell_trades_count_percent: Option<Decimal>,

    pub total_price_average: Option<Decimal>,
    pub buy_price_average: Option<Decimal>,
    pub sell_price_average: Option<Decimal>,

    pub close_price_delta: Decimal,
    pub high_price_delta: Decimal,
    pub low_price_delta: Decimal,
    pub close_price_delta_percent: Option<Decimal>,
    pub high_price_delta_percent: Option<Decimal>,
    pub low_price_delta_percent: Option<Decimal>,

    pub spread: Option<Decimal>,
    pub spread_percent: Option<Decimal>,
    pub mid_price: Option<Decimal>,
}

impl RecordFeatures {
    pub fn derive(record: &DataSetRecord, scale: u32) -> Result<Self, ValidationError> {
        let ratio = |num: Decimal, den: Decimal| -> Result<Option<Decimal>, ValidationError> {
            if den.is_zero() {
                return Ok(None);
            }
            num.div_with_scale(den, scale).map(Some)
        };
        let relative = |delta: Decimal| -> Result<Option<Decimal>, ValidationError> {
            ratio(delta, record.open_price)?
                .map(|share| Decimal::ONE.checked_add(share))
                .transpose()
        };

        let sell_quantity = record.total_quantity.checked_sub(record.buy_quantity)?;
        let sell_volume = record.total_volume.checked_sub(record.buy_volume)?;
        let sell_trades_count = record
            .total_trades_count
            .checked_sub(record.buy_trades_count)
            .ok_or(ValidationError::ArithmeticOverflow("sell trades count"))?;
        let total_count = Decimal::from(i64::from(record.total_trades_count));

        let close_price_delta = record.close_price.checked_sub(record.open_price)?;
        let high_price_delta = record.high_price.checked_sub(record.open_price)?;
        let low_price_delta = record.low_price.checked_sub(record.open_price)?;

        let (spread, spread_percent, mid_price) =
            if record.end_asks.total_quantity.is_zero() || record.end_bids.total_quantity.is_zero() {
                (None, None, None)
            } else {
                let best_ask = record.end_asks.min_price;
                let best_bid = record.end_bids.max_price;
                let spread = best_ask.checked_sub(best_bid)?;
                let half = spread.div_with_scale(Decimal::from(2), scale)?;
                (
                    Some(spread),
                    ratio(spread, best_bid)?,
                    Some(best_bid.checked_add(half)?),
                )
            };

        Ok(Self {
            sell_quantity,
            sell_volume,
            sell_trades_count,
            buy_quantity_percent: ratio(record.buy_quantity, record.total_quantity)?,
            buy_volume_percent: ratio(record.buy_volume, record.total_volume)?,
            buy_trades_count_percent: ratio(
                Decimal::from(i64::from(record.buy_trades_count)),
                total_count,
            )?,
            sell_quantity_percent: ratio(sell_quantity, record.total_quantity)?,
            sell_volume_percent: ratio(sell_volume, record.total_volume)?,
            sell_trades_count_percent: ratio(
                Decimal::from(i64::from(sell_trades_count)),
                total_count,
            )?,
            total_price_average: ratio(record.total_volume, record.total_quantity)?,
            buy_price_average: ratio(record.buy_volume, record.buy_quantity)?,
            sell_price_average: ratio(sell_volume, sell_quantity)?,
            close_price_delta,
            high_price_delta,
            low_price_delta,
            close_price_delta_percent: relative(close_price_delta)?,
            high_price_delta_percent: relative(high_price_delta)?,
            low_price_delta_percent: relative(low_price_delta)?,
            spread,
            spread_percent,
            mid_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::data_set_record::BookSideStatistics;
    use crate::value_objects::symbol::SymbolId;

    fn d(raw: &str) -> Decimal {
        Decimal::parse(raw).unwrap()
    }

    fn record() -> DataSetRecord {
        DataSetRecord {
            symbol_id: SymbolId::EthUsdt,
            data_set_idx: 0,
            record_idx: 0,
            open_price: d("100"),
            high_price: d("110"),
            low_price: d("95"),
            close_price: d("105"),
            total_quantity: d("4"),
            total_volume: d("420"),
            total_trades_count: 4,
            buy_quantity: d("1"),
            buy_volume: d("100"),
            buy_trades_count: 1,
            start_trade_id: 10,
            end_trade_id: 13,
            start_timestamp_ms: 1_000,
            end_timestamp_ms: 2_000,
            start_asks: BookSideStatistics::default(),
            start_bids: BookSideStatistics::default(),
            end_asks: BookSideStatistics {
                total_quantity: d("1"),
                min_price: d("101"),
                max_price: d("102"),
                ..BookSideStatistics::default()
            },
            end_bids: BookSideStatistics {
                total_quantity: d("1"),
                min_price: d("98"),
                max_price: d("100"),
                ..BookSideStatistics::default()
            },
        }
    }

    #[test]
    fn derives_sell_side_and_shares() {
        let features = RecordFeatures::derive(&record(), 8).unwrap();
        assert_eq!(features.sell_quantity, d("3"));
        assert_eq!(features.sell_volume, d("320"));
        assert_eq!(features.sell_trades_count, 3);
        assert_eq!(features.buy_quantity_percent, Some(d("0.25")));
        assert_eq!(features.sell_trades_count_percent, Some(d("0.75")));
        assert_eq!(features.total_price_average, Some(d("105")));
        assert_eq!(features.sell_price_average, Some(d("106.66666667")));
    }

    #[test]
    fn derives_price_deltas_and_spread() {
        let features = RecordFeatures::derive(&record(), 8).unwrap();
        assert_eq!(features.close_price_delta, d("5"));
        assert_eq!(features.low_price_delta, d("-5"));
        assert_eq!(features.close_price_delta_percent, Some(d("1.05")));
        assert_eq!(features.low_price_delta_percent, Some(d("0.95")));
        assert_eq!(features.spread, Some(d("1")));
        assert_eq!(features.spread_percent, Some(d("0.01")));
        assert_eq!(features.mid_price, Some(d("100.5")));
    }

    #[test]
    fn zero_denominators_become_none() {
        let mut rec = record();
        rec.open_price = Decimal::ZERO;
        rec.buy_quantity = Decimal::ZERO;
        rec.buy_volume = Decimal::ZERO;
        rec.end_bids = BookSideStatistics::default();

        let features = RecordFeatures::derive(&rec, 8).unwrap();
        assert_eq!(features.close_price_delta_percent, None);
        assert_eq!(features.buy_price_average, None);
        assert_eq!(features.spread, None);
        assert_eq!(features.mid_price, None);
        assert_eq!(features.buy_quantity_percent, Some(Decimal::ZERO));
    }

    #[test]
    fn out_of_range_delta_is_an_error() {
        let mut rec = record();
        rec.open_price = Decimal::from(rust_decimal::Decimal::MAX);
        rec.low_price = -Decimal::from(rust_decimal::Decimal::MAX);

        assert_eq!(
            RecordFeatures::derive(&rec, 8),
            Err(ValidationError::ArithmeticOverflow("sub"))
        );
    }
}
