use crate::errors::ValidationError;
use crate::value_objects::decimal::Decimal;
use crate::value_objects::symbol::SymbolId;
use serde::{Deserialize, Serialize};

/// An executed public trade. `is_buy` is the taker side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol_id: SymbolId,
    pub timestamp_ms: i64,
    pub trade_id: i64,
    pub price: Decimal,
    pub quantity: Decimal,
    pub is_buy: bool,
}

impl Trade {
    pub fn volume(&self) -> Result<Decimal, ValidationError> {
        self.price.checked_mul(self.quantity)
    }
}
