//! Exact-precision signed decimal used for every monetary value.
//!
//! A [`Numeric`] is an `i128` mantissa scaled by a base-10 exponent, plus a
//! validity flag that plays the role of SQL `NULL`. Values are never routed
//! through floating point. Addition and subtraction first bring both operands
//! to the smaller exponent with [`rescale`] and [`align`], then operate on the
//! integers with overflow checks.
//!
//! ## Example
//!
//! ```
//! use simple_bank::numeric::Numeric;
//!
//! let balance: Numeric = "100.5".parse().unwrap();
//! let amount = Numeric::new(25, 0);
//!
//! let after = balance.checked_sub(amount).unwrap();
//! assert_eq!(after.to_string(), "75.5");
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Largest scale a PostgreSQL `NUMERIC` can round-trip through `rust_decimal`
pub const MAX_DECIMAL_SCALE: u32 = 28;

/// Numeric arithmetic and conversion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    /// Result does not fit in the mantissa
    #[error("Numeric overflow")]
    Overflow,

    /// An operand that must be set was NULL
    #[error("Numeric value is NULL")]
    Null,

    /// Rescaling would drop non-zero digits
    #[error("Cannot rescale {int}e{from} to exponent {to} without losing precision")]
    PrecisionLoss { int: i128, from: i32, to: i32 },

    /// Malformed decimal literal
    #[error("Invalid numeric literal: {0}")]
    Parse(String),

    /// Value cannot be represented as a database `NUMERIC`
    #[error("Value {0} is out of range for a database NUMERIC")]
    OutOfRange(String),
}

/// Scaled integer with an explicit decimal exponent.
///
/// The represented value is `int * 10^exp`. An invalid value (`valid ==
/// false`) is a NULL: arithmetic on it yields NULL and it never compares equal
/// to a set value.
#[derive(Debug, Clone, Copy)]
pub struct Numeric {
    int: i128,
    exp: i32,
    valid: bool,
}

impl Numeric {
    /// The NULL value
    pub const NULL: Numeric = Numeric {
        int: 0,
        exp: 0,
        valid: false,
    };

    /// Zero with exponent 0
    pub const ZERO: Numeric = Numeric {
        int: 0,
        exp: 0,
        valid: true,
    };

    /// Build a valid value equal to `int * 10^exp`
    pub const fn new(int: i128, exp: i32) -> Self {
        Self {
            int,
            exp,
            valid: true,
        }
    }

    /// Build a value from an integer count of minor units.
    ///
    /// `from_minor_units(1234, 2)` is `12.34`.
    pub fn from_minor_units(units: i64, minor_units: u32) -> Self {
        Self::new(i128::from(units), -(minor_units as i32))
    }

    /// Unscaled mantissa
    pub fn int(&self) -> i128 {
        self.int
    }

    /// Base-10 exponent
    pub fn exp(&self) -> i32 {
        self.exp
    }

    /// False for NULL
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_positive(&self) -> bool {
        self.valid && self.int > 0
    }

    pub fn is_negative(&self) -> bool {
        self.valid && self.int < 0
    }

    pub fn is_zero(&self) -> bool {
        self.valid && self.int == 0
    }

    /// Negate, keeping the exponent
    pub fn checked_neg(self) -> Result<Self, NumericError> {
        if !self.valid {
            return Ok(Self::NULL);
        }
        self.int
            .checked_neg()
            .map(|int| Self::new(int, self.exp))
            .ok_or(NumericError::Overflow)
    }

    /// Exact addition. NULL in, NULL out.
    pub fn checked_add(self, rhs: Self) -> Result<Self, NumericError> {
        if !self.valid || !rhs.valid {
            return Ok(Self::NULL);
        }
        let (a, b, exp) = align(self, rhs)?;
        a.checked_add(b)
            .map(|int| Self::new(int, exp))
            .ok_or(NumericError::Overflow)
    }

    /// Exact subtraction. NULL in, NULL out.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, NumericError> {
        if !self.valid || !rhs.valid {
            return Ok(Self::NULL);
        }
        let (a, b, exp) = align(self, rhs)?;
        a.checked_sub(b)
            .map(|int| Self::new(int, exp))
            .ok_or(NumericError::Overflow)
    }

    /// Re-express the value with exponent `exp`, failing if digits would be lost
    pub fn rescaled(self, exp: i32) -> Result<Self, NumericError> {
        if !self.valid {
            return Ok(Self::NULL);
        }
        rescale(self.int, self.exp, exp).map(|int| Self::new(int, exp))
    }

    /// Strip trailing zeros from the mantissa. Zero always normalizes to `0e0`.
    pub fn normalize(self) -> Self {
        if !self.valid {
            return Self::NULL;
        }
        if self.int == 0 {
            return Self::ZERO;
        }
        let mut int = self.int;
        let mut exp = self.exp;
        while int % 10 == 0 {
            int /= 10;
            exp += 1;
        }
        Self::new(int, exp)
    }

    /// Convert to the `rust_decimal` wire type used for `NUMERIC` columns.
    ///
    /// NULL maps to `None`.
    pub fn to_decimal(self) -> Result<Option<Decimal>, NumericError> {
        if !self.valid {
            return Ok(None);
        }
        let mut n = self.normalize();
        if n.exp > 0 {
            n = n.rescaled(0)?;
        }
        let scale = n.exp.unsigned_abs();
        if scale > MAX_DECIMAL_SCALE {
            return Err(NumericError::OutOfRange(self.to_string()));
        }
        Decimal::try_from_i128_with_scale(n.int, scale)
            .map(Some)
            .map_err(|_| NumericError::OutOfRange(self.to_string()))
    }

    /// Convert from the `rust_decimal` wire type, keeping its scale
    pub fn from_decimal(value: Decimal) -> Self {
        Self::new(value.mantissa(), -(value.scale() as i32))
    }
}

/// `10^n`, or `None` if it does not fit in an `i128`
pub fn pow10(n: u32) -> Option<i128> {
    10i128.checked_pow(n)
}

/// Re-express `int * 10^from_exp` as a mantissa for `to_exp`.
///
/// Moving to a smaller exponent multiplies the mantissa and can overflow.
/// Moving to a larger exponent divides it and succeeds only when no non-zero
/// digit is dropped.
pub fn rescale(int: i128, from_exp: i32, to_exp: i32) -> Result<i128, NumericError> {
    if int == 0 {
        return Ok(0);
    }
    let shift = from_exp.abs_diff(to_exp);
    match to_exp.cmp(&from_exp) {
        Ordering::Equal => Ok(int),
        Ordering::Less => pow10(shift)
            .and_then(|factor| int.checked_mul(factor))
            .ok_or(NumericError::Overflow),
        Ordering::Greater => {
            let lost = NumericError::PrecisionLoss {
                int,
                from: from_exp,
                to: to_exp,
            };
            match pow10(shift) {
                Some(factor) if int % factor == 0 => Ok(int / factor),
                _ => Err(lost),
            }
        }
    }
}

/// Bring two set values to their common (smaller) exponent.
///
/// Returns both mantissas and the shared exponent.
pub fn align(a: Numeric, b: Numeric) -> Result<(i128, i128, i32), NumericError> {
    if !a.valid || !b.valid {
        return Err(NumericError::Null);
    }
    let exp = a.exp.min(b.exp);
    Ok((rescale(a.int, a.exp, exp)?, rescale(b.int, b.exp, exp)?, exp))
}

/// Exact sum of a sequence; NULL if any element is NULL
pub fn checked_sum<I>(values: I) -> Result<Numeric, NumericError>
where
    I: IntoIterator<Item = Numeric>,
{
    values
        .into_iter()
        .try_fold(Numeric::ZERO, |acc, value| acc.checked_add(value))
}

impl Default for Numeric {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Self::new(i128::from(value), 0)
    }
}

impl From<Decimal> for Numeric {
    fn from(value: Decimal) -> Self {
        Self::from_decimal(value)
    }
}

impl From<Option<Decimal>> for Numeric {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(Self::NULL, Self::from_decimal)
    }
}

impl PartialEq for Numeric {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.normalize(), other.normalize());
        a.valid == b.valid && a.int == b.int && a.exp == b.exp
    }
}

impl Eq for Numeric {}

impl Hash for Numeric {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let n = self.normalize();
        n.valid.hash(state);
        n.int.hash(state);
        n.exp.hash(state);
    }
}

impl PartialOrd for Numeric {
    /// NULL is unordered, like in SQL
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        align(*self, *other).ok().map(|(a, b, _)| a.cmp(&b))
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return write!(f, "NULL");
        }
        if self.int == 0 {
            return write!(f, "0");
        }
        let sign = if self.int < 0 { "-" } else { "" };
        let digits = self.int.unsigned_abs().to_string();

        if self.exp >= 0 {
            return write!(f, "{sign}{digits}{}", "0".repeat(self.exp as usize));
        }

        let scale = self.exp.unsigned_abs() as usize;
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (whole, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{whole}.{frac}")
    }
}

impl FromStr for Numeric {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NumericError::Parse(s.to_string());
        let trimmed = s.trim();

        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, frac) = match unsigned.split_once('.') {
            Some((whole, frac)) if !frac.is_empty() => (whole, frac),
            Some(_) => return Err(invalid()),
            None => (unsigned, ""),
        };

        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let magnitude: i128 = format!("{whole}{frac}").parse().map_err(|_| invalid())?;
        let int = if negative { -magnitude } else { magnitude };
        let exp = i32::try_from(frac.len()).map_err(|_| invalid())?;

        Ok(Self::new(int, -exp))
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.valid {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_none()
        }
    }
}

impl<'de> Deserialize<'de> for Numeric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Int(i64),
        }

        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(Self::NULL),
            Some(Repr::Int(value)) => Ok(Self::from(value)),
            Some(Repr::Text(text)) => text.parse().map_err(de::Error::custom),
        }
    }
}
