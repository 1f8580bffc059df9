use crate::errors::ValidationError;
use crate::value_objects::decimal::Decimal;
use crate::value_objects::symbol::SymbolId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderBookAction {
    Snapshot,
    Update,
}

impl OrderBookAction {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderBookAction::Snapshot => "Snapshot",
            OrderBookAction::Update => "Update",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_lowercase().as_str() {
            "snapshot" => Ok(OrderBookAction::Snapshot),
            "update" => Ok(OrderBookAction::Update),
            _ => Err(ValidationError::UnknownAction(raw.to_string())),
        }
    }
}

impl fmt::Display for OrderBookAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `[price, quantity]` row of a book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Decodes a wire row `[price, quantity, ...]`. Fields past the second are venue placeholders
    /// and are ignored.
    pub fn from_wire<S: AsRef<str>>(fields: &[S]) -> Result<Self, ValidationError> {
        match fields {
            [price, quantity, ..] => Ok(Self {
                price: Decimal::parse(price.as_ref())?,
                quantity: Decimal::parse(quantity.as_ref())?,
            }),
            _ => Err(ValidationError::MalformedLevel {
                fields: fields.len(),
            }),
        }
    }

    pub fn volume(&self) -> Result<Decimal, ValidationError> {
        self.price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookEvent {
    pub symbol_id: SymbolId,
    pub timestamp_ms: i64,
    pub action: OrderBookAction,
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
}

impl OrderBookEvent {
    pub fn is_snapshot(&self) -> bool {
        self.action == OrderBookAction::Snapshot
    }
}
