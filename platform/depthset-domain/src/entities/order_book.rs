use crate::errors::ValidationError;
use crate::value_objects::decimal::Decimal;
use crate::value_objects::order_book_event::{BookLevel, OrderBookAction, OrderBookEvent};
use std::collections::BTreeMap;

/// Price -> resting quantity for one side. Zero quantities are never stored.
pub type PriceLevels = BTreeMap<Decimal, Decimal>;

/// Reconstructed limit order book of one symbol.
///
/// Built from one snapshot and then mutated in place by updates. Owned by a single calculation;
/// deliberately not `Clone`.
#[derive(Debug, Default)]
pub struct OrderBookState {
    asks: PriceLevels,
    bids: PriceLevels,
    initialized: bool,
}

impl OrderBookState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn asks(&self) -> &PriceLevels {
        &self.asks
    }

    pub fn bids(&self) -> &PriceLevels {
        &self.bids
    }

    /// Loads a full snapshot. Levels with quantity <= 0 are dropped.
    pub fn initialize_from_snapshot(
        &mut self,
        snapshot: &OrderBookEvent,
    ) -> Result<(), ValidationError> {
        if snapshot.action != OrderBookAction::Snapshot {
            return Err(ValidationError::UnexpectedAction {
                index: 0,
                expected: OrderBookAction::Snapshot,
                found: snapshot.action,
            });
        }
        if self.initialized {
            return Err(ValidationError::BookAlreadyInitialized);
        }

        self.asks.clear();
        self.bids.clear();
        load_levels(&mut self.asks, &snapshot.asks);
        load_levels(&mut self.bids, &snapshot.bids);
        self.initialized = true;
        Ok(())
    }

    /// Applies an incremental update: quantity > 0 sets the level, anything else removes it.
    pub fn apply_update(&mut self, update: &OrderBookEvent) -> Result<(), ValidationError> {
        if update.action != OrderBookAction::Update {
            return Err(ValidationError::UnexpectedAction {
                index: 0,
                expected: OrderBookAction::Update,
                found: update.action,
            });
        }
        if !self.initialized {
            return Err(ValidationError::BookNotInitialized);
        }

        apply_levels(&mut self.asks, &update.asks);
        apply_levels(&mut self.bids, &update.bids);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.asks.clear();
        self.bids.clear();
        self.initialized = false;
    }
}

fn load_levels(side: &mut PriceLevels, levels: &[BookLevel]) {
    for level in levels {
        if level.quantity.is_positive() {
            side.insert(level.price, level.quantity);
        }
    }
}

fn apply_levels(side: &mut PriceLevels, levels: &[BookLevel]) {
    for level in levels {
        if level.quantity.is_positive() {
            side.insert(level.price, level.quantity);
        } else {
            side.remove(&level.price);
        }
    }
}
