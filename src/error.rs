//! Error types for driver construction and validation.
//!
//! The per-frame path (`advance`/`update`) never returns errors; these only
//! surface while building instruments, envelopes and configuration.

use thiserror::Error;

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors that can occur while building driver inputs.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Instrument data does not match what the chip requires.
    #[error("Invalid instrument '{instrument}': {reason}")]
    InvalidInstrument {
        /// Instrument name.
        instrument: String,
        /// What was wrong.
        reason: String,
    },

    /// Envelope text or data could not be accepted.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Configuration values out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be (de)serialized.
    #[error("Configuration format error: {0}")]
    Config(#[from] serde_json::Error),

    /// Register log export failed.
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    pub(crate) fn instrument(name: &str, reason: impl Into<String>) -> Self {
        DriverError::InvalidInstrument {
            instrument: name.to_string(),
            reason: reason.into(),
        }
    }
}
