use crate::errors::ValidationError;
use crate::value_objects::decimal::Decimal;
use crate::value_objects::symbol::SymbolId;
use crate::value_objects::trade::Trade;
use serde::{Deserialize, Serialize};

/// A maximal sequence of consecutive trades sharing the same taker side.
///
/// Keyed by `(symbol_id, start_trade_id)`; the last run of a batch may still grow, so it is
/// written with upsert semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRunRecord {
    pub symbol_id: SymbolId,
    pub start_trade_id: i64,
    pub end_trade_id: i64,
    pub start_timestamp_ms: i64,
    pub end_timestamp_ms: i64,
    pub is_buy: bool,
    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub close_price: Decimal,
    pub buy_quantity: Decimal,
    pub buy_volume: Decimal,
    pub buy_trades_count: i64,
    pub total_quantity: Decimal,
    pub total_volume: Decimal,
    pub total_trades_count: i64,
}

impl TradeRunRecord {
    pub fn open(trade: &Trade) -> Result<Self, ValidationError> {
        let mut run = Self {
            symbol_id: trade.symbol_id,
            start_trade_id: trade.trade_id,
            end_trade_id: trade.trade_id,
            start_timestamp_ms: trade.timestamp_ms,
            end_timestamp_ms: trade.timestamp_ms,
            is_buy: trade.is_buy,
            open_price: trade.price,
            high_price: trade.price,
            low_price: trade.price,
            close_price: trade.price,
            buy_quantity: Decimal::ZERO,
            buy_volume: Decimal::ZERO,
            buy_trades_count: 0,
            total_quantity: Decimal::ZERO,
            total_volume: Decimal::ZERO,
            total_trades_count: 0,
        };
        run.accumulate(trade)?;
        Ok(run)
    }

    pub fn accepts(&self, trade: &Trade) -> bool {
        self.is_buy == trade.is_buy
    }

    /// Folds `trade` into the run. The caller checks [`TradeRunRecord::accepts`] first.
    ///
    /// On error the run is left untouched.
    pub fn push(&mut self, trade: &Trade) -> Result<(), ValidationError> {
        self.accumulate(trade)?;
        self.end_trade_id = trade.trade_id;
        self.end_timestamp_ms = trade.timestamp_ms;
        self.high_price = self.high_price.max(trade.price);
        self.low_price = self.low_price.min(trade.price);
        self.close_price = trade.price;
        Ok(())
    }

    fn accumulate(&mut self, trade: &Trade) -> Result<(), ValidationError> {
        let volume = trade.volume()?;
        let total_quantity = self.total_quantity.checked_add(trade.quantity)?;
        let total_volume = self.total_volume.checked_add(volume)?;
        if trade.is_buy {
            let buy_quantity = self.buy_quantity.checked_add(trade.quantity)?;
            self.buy_volume = self.buy_volume.checked_add(volume)?;
            self.buy_quantity = buy_quantity;
            self.buy_trades_count += 1;
        }
        self.total_quantity = total_quantity;
        self.total_volume = total_volume;
        self.total_trades_count += 1;
        Ok(())
    }
}
