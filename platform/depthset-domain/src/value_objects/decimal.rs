use crate::errors::ValidationError;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

/// Fractional digits kept by [`Decimal::checked_div`] unless a caller asks for another scale.
pub const DEFAULT_DIVISION_SCALE: u32 = 16;

/// Largest scale the underlying 96-bit representation can carry.
pub const MAX_SCALE: u32 = 28;

/// Exact decimal number used for every price, size and volume.
///
/// Backed by `rust_decimal` (96-bit mantissa, up to 28 significant digits), which is exact for
/// the magnitudes crypto venues publish. There are no arithmetic operators: sums and products go
/// through `checked_*` and fail instead of rounding or panicking. Only division and
/// [`Decimal::round_dp`] round, and both say so in their signature.
///
/// Equality, ordering and hashing compare logical values: `1.0`, `1.00` and `1` are the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimal(rust_decimal::Decimal);

impl Decimal {
    pub const ZERO: Decimal = Decimal(rust_decimal::Decimal::ZERO);
    pub const ONE: Decimal = Decimal(rust_decimal::Decimal::ONE);

    /// Parses the textual form venues put on the wire (`"50000.1"`, `"-0.25"`, `"3"`).
    ///
    /// Inputs that would need rounding to fit are rejected rather than silently truncated.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::MalformedDecimal {
                input: String::new(),
                reason: "empty string".to_string(),
            });
        }
        rust_decimal::Decimal::from_str_exact(raw)
            .map(Decimal)
            .map_err(|err| ValidationError::MalformedDecimal {
                input: raw.to_string(),
                reason: err.to_string(),
            })
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(rust_decimal::Decimal::from(value))
    }

    pub fn into_inner(self) -> rust_decimal::Decimal {
        self.0
    }

    pub fn checked_add(self, rhs: Decimal) -> Result<Decimal, ValidationError> {
        self.0
            .checked_add(rhs.0)
            .map(Decimal)
            .ok_or(ValidationError::ArithmeticOverflow("add"))
    }

    pub fn checked_sub(self, rhs: Decimal) -> Result<Decimal, ValidationError> {
        self.0
            .checked_sub(rhs.0)
            .map(Decimal)
            .ok_or(ValidationError::ArithmeticOverflow("sub"))
    }

    /// Exact product.
    ///
    /// `rust_decimal` rounds a product that needs more than [`MAX_SCALE`] fractional digits, or
    /// more than 96 mantissa bits, and keeps the scale otherwise. A product whose scale came back
    /// smaller than the operands' combined (normalized) scale was rounded and is rejected.
    pub fn checked_mul(self, rhs: Decimal) -> Result<Decimal, ValidationError> {
        let (lhs, rhs) = (self.0.normalize(), rhs.0.normalize());
        let product = lhs
            .checked_mul(rhs)
            .ok_or(ValidationError::ArithmeticOverflow("mul"))?;
        if product.scale() != lhs.scale() + rhs.scale() {
            return Err(ValidationError::PrecisionLoss("mul"));
        }
        Ok(Decimal(product))
    }

    /// Divides and rounds the quotient to [`DEFAULT_DIVISION_SCALE`] fractional digits.
    pub fn checked_div(self, rhs: Decimal) -> Result<Decimal, ValidationError> {
        self.div_with_scale(rhs, DEFAULT_DIVISION_SCALE)
    }

    /// Divides and rounds the quotient to `scale` fractional digits (midpoint away from zero).
    ///
    /// Digits past `scale` are lost; that is the expected behaviour of division here, not an
    /// error. `scale` is clamped to [`MAX_SCALE`].
    pub fn div_with_scale(self, rhs: Decimal, scale: u32) -> Result<Decimal, ValidationError> {
        if rhs.is_zero() {
            return Err(ValidationError::DivisionByZero);
        }
        let quotient = self
            .0
            .checked_div(rhs.0)
            .ok_or(ValidationError::ArithmeticOverflow("div"))?;
        Ok(Decimal(quotient.round_dp_with_strategy(
            scale.min(MAX_SCALE),
            RoundingStrategy::MidpointAwayFromZero,
        )))
    }

    pub fn round_dp(self, scale: u32) -> Decimal {
        Decimal(
            self.0
                .round_dp_with_strategy(scale.min(MAX_SCALE), RoundingStrategy::MidpointAwayFromZero),
        )
    }

    pub fn abs(self) -> Decimal {
        Decimal(self.0.abs())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    pub fn max(self, other: Decimal) -> Decimal {
        if other > self {
            other
        } else {
            self
        }
    }

    pub fn min(self, other: Decimal) -> Decimal {
        if other < self {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Decimal {
    /// Canonical form: trailing fractional zeros stripped and `-0` printed as `0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Decimal {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::parse(s)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::from_i64(value)
    }
}

impl From<rust_decimal::Decimal> for Decimal {
    fn from(value: rust_decimal::Decimal) -> Self {
        Decimal(value)
    }
}

impl Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}
