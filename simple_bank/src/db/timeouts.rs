//! Deadline helpers for store operations
//!
//! Wraps ledger futures so a stuck lock wait or commit surfaces as
//! `LedgerError::Timeout` instead of hanging the caller.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

use crate::ledger::{LedgerError, LedgerResult};

/// Default timeout for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for a whole transfer (10 seconds)
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `future` until `deadline`.
///
/// When the deadline passes the future is dropped, which rolls back any
/// transaction it owns.
///
/// # Example
///
/// ```no_run
/// use simple_bank::db::timeouts::with_deadline;
/// use std::time::Duration;
/// use tokio::time::Instant;
/// # async fn example() -> simple_bank::ledger::LedgerResult<()> {
///
/// let deadline = Instant::now() + Duration::from_millis(200);
/// let value = with_deadline(deadline, async { Ok(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn with_deadline<F, T>(deadline: Instant, future: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    let budget = deadline.saturating_duration_since(Instant::now());
    match timeout_at(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout(format!(
            "deadline of {budget:?} exceeded"
        ))),
    }
}

/// Run `future` for at most `duration`
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    with_deadline(Instant::now() + duration, future).await
}
