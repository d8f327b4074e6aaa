//! Error handling for the ECG workspace
//!
//! Within-tick numerical edge cases (empty search windows, ties, short buffers) are
//! not errors and never surface here; these variants are for configuration, input
//! framing and transport failures.

use crate::lead::Lead;
use thiserror::Error;

/// Result type alias for ECG operations
pub type EcgResult<T> = Result<T, EcgError>;

/// Error type shared by all ECG crates
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EcgError {
    /// Invalid configuration, raised at setup time
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },

    /// Filter corner at or above the Nyquist frequency
    #[error("cutoff {cutoff_hz} Hz must be below the Nyquist frequency {nyquist_hz} Hz")]
    CutoffAboveNyquist {
        /// Requested corner frequency
        cutoff_hz: f64,
        /// Half the sample rate
        nyquist_hz: f64,
    },

    /// Sample rate that cannot drive filter design or rate estimation
    #[error("sample rate must be positive and finite, got {rate}")]
    InvalidSampleRate {
        /// Provided sample rate
        rate: f64,
    },

    /// Lead requested by a profile that the layout cannot produce
    #[error("lead {lead} is neither acquired nor derivable from the channel layout")]
    UnsupportedLead {
        /// The lead that cannot be produced
        lead: Lead,
    },

    /// Lead identifier that is not one of the twelve standard leads
    #[error("unknown lead identifier '{0}'")]
    UnknownLead(String),

    /// Tick carrying the wrong number of channel values
    #[error("malformed tick: expected {expected} values, got {actual}")]
    TickArity {
        /// Arity of the channel layout
        expected: usize,
        /// Number of values received
        actual: usize,
    },

    /// Tick that could not be decoded
    #[error("malformed tick: {reason}")]
    MalformedTick {
        /// Description of the framing problem
        reason: String,
    },

    /// Terminal transport failure
    #[error("transport link lost: {reason}")]
    LinkLost {
        /// Description of the failure
        reason: String,
    },

    /// Configuration document could not be parsed
    #[error("configuration parse error: {0}")]
    ConfigParse(String),

    /// I/O failure outside the transport (configuration files, export)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EcgError {
    /// True for errors that only invalidate a single tick
    pub fn is_tick_local(&self) -> bool {
        matches!(self, EcgError::TickArity { .. } | EcgError::MalformedTick { .. })
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::EcgError::InvalidConfig {
            reason: format!($($arg)+),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EcgError::TickArity {
            expected: 8,
            actual: 7,
        };
        let display = format!("{}", error);
        assert!(display.contains("malformed tick"));
        assert!(display.contains('8'));
        assert!(display.contains('7'));
    }

    #[test]
    fn test_config_error_macro() {
        let error = config_error!("capacity {} is too small", 0);
        match error {
            EcgError::InvalidConfig { reason } => assert_eq!(reason, "capacity 0 is too small"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_tick_local_classification() {
        assert!(EcgError::MalformedTick { reason: "x".into() }.is_tick_local());
        assert!(!EcgError::LinkLost { reason: "eof".into() }.is_tick_local());
        assert!(!EcgError::UnsupportedLead { lead: Lead::III }.is_tick_local());
    }
}
