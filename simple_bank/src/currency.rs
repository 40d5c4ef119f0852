//! Supported account currencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ISO 4217 currency an account is denominated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    Eur,
    Bhd,
    Usd,
    Aed,
    Sar,
    Cad,
}

impl Currency {
    /// Every supported currency
    pub const ALL: [Currency; 6] = [
        Currency::Eur,
        Currency::Bhd,
        Currency::Usd,
        Currency::Aed,
        Currency::Sar,
        Currency::Cad,
    ];

    /// Three-letter code as stored in `accounts.currency`
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Bhd => "BHD",
            Currency::Usd => "USD",
            Currency::Aed => "AED",
            Currency::Sar => "SAR",
            Currency::Cad => "CAD",
        }
    }

    /// Number of decimal places in one major unit (fils for BHD, cents otherwise)
    pub fn minor_units(&self) -> u32 {
        match self {
            Currency::Bhd => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned for a code outside [`Currency::ALL`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported currency: {0}")]
pub struct UnsupportedCurrency(pub String);

impl FromStr for Currency {
    type Err = UnsupportedCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == s.trim())
            .ok_or_else(|| UnsupportedCurrency(s.to_string()))
    }
}

impl TryFrom<String> for Currency {
    type Error = UnsupportedCurrency;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}
