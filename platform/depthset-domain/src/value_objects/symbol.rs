use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Instruments known to the market-data store. The numeric id is the value stored in `symbol_id`
/// columns; the name is the venue pair label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolId {
    #[serde(rename = "BTC_USDT")]
    BtcUsdt,
    #[serde(rename = "ETH_USDT")]
    EthUsdt,
    #[serde(rename = "SOL_USDT")]
    SolUsdt,
}

impl SymbolId {
    pub const ALL: [SymbolId; 3] = [SymbolId::BtcUsdt, SymbolId::EthUsdt, SymbolId::SolUsdt];

    pub fn id(self) -> i32 {
        match self {
            SymbolId::BtcUsdt => 1,
            SymbolId::EthUsdt => 2,
            SymbolId::SolUsdt => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SymbolId::BtcUsdt => "BTC_USDT",
            SymbolId::EthUsdt => "ETH_USDT",
            SymbolId::SolUsdt => "SOL_USDT",
        }
    }

    pub fn from_id(id: i32) -> Result<Self, ValidationError> {
        SymbolId::ALL
            .into_iter()
            .find(|symbol| symbol.id() == id)
            .ok_or_else(|| ValidationError::UnknownSymbol(id.to_string()))
    }

    /// Accepts `BTC_USDT`, `btc_usdt` and the dashed `BTC-USDT` spelling.
    pub fn from_name(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_uppercase().replace('-', "_");
        SymbolId::ALL
            .into_iter()
            .find(|symbol| symbol.name() == normalized)
            .ok_or_else(|| ValidationError::UnknownSymbol(raw.to_string()))
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SymbolId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymbolId::from_name(s)
    }
}
