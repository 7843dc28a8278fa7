//! Custom error types for the probe runtime.
//!
//! This module defines the primary error type, `ProbeError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to classify the failures that instrument orchestration
//! produces.
//!
//! ## Error Taxonomy
//!
//! - **`Resource`** / **`Io`**: communication failures with an instrument or
//!   its transport. The status aggregator isolates these per role; the
//!   background worker treats them as fatal to the current run (cleanup still
//!   executes).
//! - **`ConfigFile`** / **`Configuration`**: the first wraps parse errors from
//!   the `config` crate; the second covers semantic rejections, such as a
//!   filter count outside the capability contract's bounds or a zero polling
//!   interval.
//! - **`Logic`**: an unmapped enum or value in an instrument response. These
//!   indicate a driver bug rather than a flaky transport and are never
//!   silently skipped.
//! - **`Instrument`**: an entry popped from an instrument's own error queue,
//!   carrying the device-reported code and message.
//!
//! By using `#[from]`, `ProbeError` can be seamlessly created from underlying
//! error types, simplifying error handling throughout the crate with the `?`
//! operator.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, ProbeError>;

/// Unified error type for the probe runtime.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Communication failure with an instrument or its transport.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Underlying transport I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be loaded or parsed.
    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    /// A value rejected by a capability contract or settings validation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An unmapped enum or value in an instrument response.
    #[error("Logic error: {0}")]
    Logic(String),

    /// An error reported by the instrument's own error queue.
    #[error("Instrument error {code}: {message}")]
    Instrument {
        /// Device-reported error code.
        code: i32,
        /// Device-reported error message.
        message: String,
    },

    /// Any other error bubbled up from a collaborator.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProbeError {
    /// True for failures of an instrument or its transport.
    ///
    /// The status aggregator catches this class per role and continues the
    /// run; every other class indicates a bug or misconfiguration and is
    /// propagated.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            ProbeError::Resource(_) | ProbeError::Io(_) | ProbeError::Instrument { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProbeError::Resource("lcr timed out".to_string());
        assert_eq!(err.to_string(), "Resource error: lcr timed out");
    }

    #[test]
    fn test_instrument_error_display() {
        let err = ProbeError::Instrument {
            code: -113,
            message: "undefined header".to_string(),
        };
        assert_eq!(err.to_string(), "Instrument error -113: undefined header");
    }

    #[test]
    fn test_resource_classification() {
        assert!(ProbeError::Resource("x".into()).is_resource());
        assert!(ProbeError::Io(std::io::Error::other("x")).is_resource());
        assert!(ProbeError::Instrument {
            code: 0,
            message: String::new()
        }
        .is_resource());
        assert!(!ProbeError::Configuration("x".into()).is_resource());
        assert!(!ProbeError::Logic("x".into()).is_resource());
    }
}
