//! Token amounts in integer base units.
//!
//! Every token uses 18 decimals, so one whole token is `10^18` base units.
//! All ledger arithmetic is unsigned and checked; human quantities such as
//! `"0.9"` go through [`Amount::from_tokens`] and come back through
//! [`Amount::to_tokens`].

use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Number of decimal places of every token.
pub const TOKEN_DECIMALS: u32 = 18;

/// Base units in one whole token.
pub const BASE_UNITS_PER_TOKEN: u128 = 10u128.pow(TOKEN_DECIMALS);

/// A non-negative token quantity in base units.
///
/// Serialized as a decimal string of base units, since JSON consumers
/// cannot hold 128-bit integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    /// Zero base units.
    pub const ZERO: Amount = Amount(0);

    /// Create from raw base units.
    pub const fn new(base_units: u128) -> Self {
        Self(base_units)
    }

    /// Create from a whole number of tokens.
    pub fn whole(tokens: u64) -> Self {
        Self(tokens as u128 * BASE_UNITS_PER_TOKEN)
    }

    /// Parse a human-readable token quantity ("10", "0.9", "1.25").
    pub fn from_tokens(value: &str) -> Result<Self, AmountParseError> {
        let decimal: Decimal = value.trim().parse()?;
        if decimal.is_sign_negative() && !decimal.is_zero() {
            return Err(AmountParseError::Negative(value.to_string()));
        }

        let scale = decimal.scale();
        if scale > TOKEN_DECIMALS {
            return Err(AmountParseError::TooPrecise { scale });
        }

        decimal
            .mantissa()
            .unsigned_abs()
            .checked_mul(10u128.pow(TOKEN_DECIMALS - scale))
            .map(Self)
            .ok_or(AmountParseError::Overflow)
    }

    /// Get the raw base units.
    pub const fn base_units(&self) -> u128 {
        self.0
    }

    /// Convert to a decimal number of tokens, if representable.
    pub fn to_tokens(&self) -> Option<Decimal> {
        let mantissa = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(mantissa, TOKEN_DECIMALS)
            .ok()
            .map(|d| d.normalize())
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction; `None` when `other` exceeds `self`.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// `floor(self * percent / 100)` in integer arithmetic.
    pub fn percent(self, percent: u32) -> Option<Amount> {
        self.0
            .checked_mul(percent as u128)
            .map(|scaled| Amount(scaled / 100))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(base_units: u128) -> Self {
        Self(base_units)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("base units as a decimal string or unsigned integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse::<u128>().map(Amount).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount(v as u128))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Error when parsing a human-readable token quantity.
#[derive(Debug, Error)]
pub enum AmountParseError {
    /// Not a decimal number.
    #[error("Invalid token quantity: {0}")]
    Invalid(#[from] rust_decimal::Error),

    /// Negative quantities are not amounts.
    #[error("Negative token quantity: {0}")]
    Negative(String),

    /// More fractional digits than the token supports.
    #[error("Token quantity has {scale} decimals, at most 18 are supported")]
    TooPrecise { scale: u32 },

    /// Does not fit in base units.
    #[error("Token quantity overflows base units")]
    Overflow,
}
