//! Error types and result definitions for the Vesper engine.
//!
//! Cache misses are never errors: every cache level recovers from a miss by
//! falling through to the next. Only genuine language-level failures
//! (TypeError on an illegal typed store, property access on a nullish
//! receiver) surface through this type.

use thiserror::Error;

/// The unified result type used throughout Vesper.
pub type EngineResult<T> = Result<T, EngineError>;

/// Language-level errors surfaced to script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Dynamic type mismatch, including writes of non-matching values into
    /// statically-typed shared-object fields.
    #[error("TypeError: {message}")]
    TypeError {
        /// Error description.
        message: String,
    },

    /// Property access on `undefined` or `null`.
    #[error("TypeError: cannot read properties of {receiver} (reading '{key}')")]
    NullishReceiver {
        /// `"undefined"` or `"null"`.
        receiver: &'static str,
        /// The key being read.
        key: String,
    },

    /// Name not found where one is required.
    #[error("ReferenceError: {name} is not defined")]
    ReferenceError {
        /// The undefined name.
        name: String,
    },

    /// Out-of-range index on a typed store.
    #[error("RangeError: {message}")]
    RangeError {
        /// Error description.
        message: String,
    },

    /// Internal invariant failure; indicates an engine bug, not script error.
    #[error("InternalError: {message}")]
    InternalError {
        /// Error description.
        message: String,
    },
}

impl EngineError {
    /// Construct a TypeError.
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    /// Construct a RangeError.
    #[must_use]
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::RangeError {
            message: message.into(),
        }
    }

    /// Check whether this is a TypeError (either form).
    #[must_use]
    pub const fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeError { .. } | Self::NullishReceiver { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_display() {
        let err = EngineError::type_error("x is not a function");
        assert_eq!(err.to_string(), "TypeError: x is not a function");
        assert!(err.is_type_error());
    }

    #[test]
    fn test_nullish_receiver_display() {
        let err = EngineError::NullishReceiver {
            receiver: "undefined",
            key: "foo".into(),
        };
        assert_eq!(
            err.to_string(),
            "TypeError: cannot read properties of undefined (reading 'foo')"
        );
        assert!(err.is_type_error());
    }

    #[test]
    fn test_range_error_not_type_error() {
        let err = EngineError::range_error("index 9 out of bounds");
        assert!(!err.is_type_error());
    }
}
