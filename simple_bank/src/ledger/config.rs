//! Transfer engine configuration.

use std::env;
use std::time::Duration;

use crate::db::timeouts::DEFAULT_TRANSFER_TIMEOUT;

/// What to do with a transfer whose source and destination are the same account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelfTransferPolicy {
    /// Fail validation with `LedgerError::SameAccount`
    #[default]
    Reject,
    /// Post two offsetting entries against the account; its balance is unchanged
    Allow,
}

/// Transfer engine configuration
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Upper bound on a whole transfer, including lock waits and commit
    pub transfer_timeout: Duration,

    /// Longest a single row-lock acquisition may wait, if bounded
    pub lock_timeout: Option<Duration>,

    /// Same-account transfer handling
    pub self_transfer: SelfTransferPolicy,
}

impl TransferConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `TRANSFER_TIMEOUT_MS`: Whole-transfer deadline (default: 10000)
    /// - `LOCK_TIMEOUT_MS`: Row-lock wait bound, 0 disables (default: 0)
    /// - `ALLOW_SELF_TRANSFER`: `true` to allow same-account transfers (default: false)
    ///
    /// Unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let transfer_timeout = env::var("TRANSFER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.transfer_timeout);

        let lock_timeout = env::var("LOCK_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let self_transfer = match env::var("ALLOW_SELF_TRANSFER").ok().as_deref() {
            Some("true") | Some("1") => SelfTransferPolicy::Allow,
            _ => SelfTransferPolicy::Reject,
        };

        Self {
            transfer_timeout,
            lock_timeout,
            self_transfer,
        }
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn with_self_transfer(mut self, policy: SelfTransferPolicy) -> Self {
        self.self_transfer = policy;
        self
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            lock_timeout: None,
            self_transfer: SelfTransferPolicy::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.transfer_timeout, DEFAULT_TRANSFER_TIMEOUT);
        assert_eq!(config.lock_timeout, None);
        assert_eq!(config.self_transfer, SelfTransferPolicy::Reject);
    }

    #[test]
    fn test_builders() {
        let config = TransferConfig::default()
            .with_transfer_timeout(Duration::from_millis(250))
            .with_lock_timeout(Duration::from_millis(50))
            .with_self_transfer(SelfTransferPolicy::Allow);

        assert_eq!(config.transfer_timeout, Duration::from_millis(250));
        assert_eq!(config.lock_timeout, Some(Duration::from_millis(50)));
        assert_eq!(config.self_transfer, SelfTransferPolicy::Allow);
    }
}
