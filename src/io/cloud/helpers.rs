//! Generic helpers for cloud-backed output.
//!
//! - [`retry_with_backoff`] - Retry with exponential backoff
//! - [`config_from_env`] - Collect prefixed environment variables
//! - [`validate_key_path`] - Validate object keys

use crate::error::WriterError;
use crate::io::cloud::traits::{CloudIOError, CloudResult, ErrorKind};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

// ============================================================================
// Retry Helper
// ============================================================================

/// Errors that know whether attempting the operation again can help.
pub trait Retryable {
    fn is_retriable(&self) -> bool;
}

impl Retryable for CloudIOError {
    fn is_retriable(&self) -> bool {
        self.kind.is_transient()
    }
}

impl Retryable for WriterError {
    fn is_retriable(&self) -> bool {
        Self::is_retriable(self)
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No sleeping between attempts; handy in tests.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }
}

/// Retry a function with exponential backoff
///
/// Only errors reporting [`Retryable::is_retriable`] are retried; anything
/// else is returned straight away.
///
/// # Errors
///
/// Returns the last error if it is not retriable or the maximum number of
/// attempts is exhausted.
pub fn retry_with_backoff<F, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        attempt += 1;
        match operation() {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retriable() || attempt >= config.max_attempts {
                    return Err(err);
                }
                warn!(attempt, max_attempts = config.max_attempts, delay_ms, error = %err, "retrying");

                std::thread::sleep(Duration::from_millis(delay_ms));

                // Saturating to avoid overflow; a multiplier of 2.0 or more doubles the delay
                let new_delay = if config.backoff_multiplier >= 2.0 {
                    delay_ms.saturating_mul(2)
                } else {
                    delay_ms
                };
                delay_ms = new_delay.min(config.max_delay_ms);
            }
        }
    }
}

// ============================================================================
// Environment Helpers
// ============================================================================

/// Helper for loading config from environment variables
///
/// Keys are returned lowercased with the prefix removed.
#[must_use]
pub fn config_from_env(prefix: &str) -> HashMap<String, String> {
    let mut config = HashMap::new();

    for (key, value) in std::env::vars() {
        if let Some(key_name) = key.strip_prefix(prefix) {
            config.insert(key_name.to_lowercase(), value);
        }
    }

    config
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate a key path (for object storage, etc.)
///
/// # Errors
///
/// Returns an error if:
/// - The key path is empty
/// - The key path starts with a forward slash
pub fn validate_key_path(path: &str) -> CloudResult<()> {
    if path.is_empty() {
        return Err(CloudIOError::new(
            ErrorKind::InvalidInput,
            "Key path cannot be empty",
        ));
    }

    if path.starts_with('/') {
        return Err(CloudIOError::new(
            ErrorKind::InvalidInput,
            "Key path cannot start with '/'",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_with_backoff() {
        let config = RetryConfig::immediate(3);
        let mut attempts = 0;

        let result = retry_with_backoff(&config, || {
            attempts += 1;
            if attempts < 3 {
                Err(CloudIOError::new(ErrorKind::Network, "Temporary failure"))
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_non_retriable_error_is_not_retried() {
        let config = RetryConfig::immediate(5);
        let mut attempts = 0;

        let result: CloudResult<()> = retry_with_backoff(&config, || {
            attempts += 1;
            Err(CloudIOError::new(ErrorKind::Authorization, "denied"))
        });

        assert_eq!(result.unwrap_err().kind, ErrorKind::Authorization);
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let config = RetryConfig::immediate(2);
        let mut attempts = 0;

        let result: CloudResult<()> = retry_with_backoff(&config, || {
            attempts += 1;
            Err(CloudIOError::new(ErrorKind::Timeout, "slow"))
        });

        assert!(result.is_err());
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_validate_key_path() {
        assert!(validate_key_path("path/to/key").is_ok());
        assert!(validate_key_path("key").is_ok());
        assert!(validate_key_path("").is_err());
        assert!(validate_key_path("/absolute/path").is_err());
    }
}
