//! # Simple Bank
//!
//! A double-entry money ledger: accounts hold a balance in one currency, and
//! every movement of money is a transfer recorded with two offsetting entries.
//!
//! ## Core Modules
//!
//! - [`numeric`]: Exact scaled-integer decimal with NULL propagation
//! - [`currency`]: Supported ISO 4217 currencies
//! - [`ledger`]: Models, errors and the transfer engine
//! - [`db`]: Store traits with PostgreSQL and in-memory implementations
//!
//! ## Example
//!
//! ```
//! use simple_bank::numeric::Numeric;
//!
//! let balance: Numeric = "100.00".parse().unwrap();
//! let after = balance.checked_sub("12.5".parse().unwrap()).unwrap();
//! assert_eq!(after.to_string(), "87.50");
//! ```

/// Supported currencies.
pub mod currency;

/// Storage: connection pool, repository traits and stores.
pub mod db;

/// Accounts, entries, transfers and the transfer engine.
pub mod ledger;

/// Exact decimal arithmetic.
pub mod numeric;

pub use currency::Currency;
pub use ledger::{LedgerApi, LedgerError, LedgerManager, LedgerResult, TransferEngine};
pub use numeric::Numeric;
