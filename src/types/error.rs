//! Error types for the Registrar Ledger
//!
//! This module defines all error types that can occur while loading record
//! tables and operating the ledger. Errors are designed to surface a
//! human-readable reason to the presentation layer.
//!
//! # Error Categories
//!
//! - **File I/O Errors**: unreadable files, failed writes, unresolvable data
//!   directory
//! - **Parse Errors**: a malformed table line; always recoverable, the line
//!   is skipped and logged, never fatal to the scan
//! - **Caller Input Errors**: bad identifier format, non-positive payment
//!   amount, empty credential
//! - **Lookup/State Errors**: unknown record, failed authentication,
//!   identifier-space exhaustion during account creation
//!
//! A missing table file is *not* an error: it reads as an empty table.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the registrar ledger
///
/// Each variant carries the context needed to render a diagnostic or a
/// user-facing failure reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrarError {
    /// I/O error occurred while reading or writing a table file
    ///
    /// Typically fatal for the operation that triggered it (permissions,
    /// disk full, etc.).
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// The data directory could not be resolved
    ///
    /// Raised when neither the given path nor the bounded upward search
    /// finds a directory holding any known table file.
    #[error("Data directory not found from '{start}'")]
    DataDirNotFound {
        /// The path the search started from
        start: String,
    },

    /// A table line failed field-count or type validation
    ///
    /// Recoverable: the line is skipped with a diagnostic and the scan
    /// continues with the next line.
    #[error("Record parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// Identifier failed the format check (seven ASCII digits)
    ///
    /// Rejected at the API boundary; never a silent no-op.
    #[error("Invalid identifier '{id}'")]
    InvalidIdentifier {
        /// The offending identifier string
        id: String,
    },

    /// No record exists for a well-formed identifier
    #[error("Record not found for {id}")]
    RecordNotFound {
        /// The identifier that was looked up
        id: String,
    },

    /// Payment amount was zero or negative
    #[error("Invalid amount {amount} for {id}: payment must be positive")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
        /// The identifier the payment was for
        id: String,
    },

    /// Credential was empty
    #[error("Empty credential for {id}")]
    EmptyCredential {
        /// The identifier the credential was for
        id: String,
    },

    /// Authentication failed (wrong current password on an update)
    #[error("Authentication failed for {id}")]
    AuthenticationFailed {
        /// The identifier that failed to authenticate
        id: String,
    },

    /// Account creation could not find an unused identifier
    ///
    /// Generation retries random suffixes against the live cache; after the
    /// retry budget the prefix is considered exhausted.
    #[error("Identifier space exhausted for prefix '{prefix}' after {attempts} attempts")]
    IdentifierExhausted {
        /// The three-digit prefix that was being generated under
        prefix: String,
        /// How many candidates were tried
        attempts: u32,
    },

    /// A payment status transition outside the state machine was requested
    #[error("Illegal status transition {from} -> {to} for reference '{reference}'")]
    IllegalStatusTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
        /// Reference of the affected transaction
        reference: String,
    },
}

// Conversion from io::Error to RegistrarError
impl From<std::io::Error> for RegistrarError {
    fn from(error: std::io::Error) -> Self {
        RegistrarError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to RegistrarError
impl From<csv::Error> for RegistrarError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        RegistrarError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl RegistrarError {
    /// Create a ParseError with an optional line number
    pub fn parse_error(line: Option<u64>, message: impl Into<String>) -> Self {
        RegistrarError::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an InvalidIdentifier error
    pub fn invalid_identifier(id: &str) -> Self {
        RegistrarError::InvalidIdentifier { id: id.to_string() }
    }

    /// Create a RecordNotFound error
    pub fn record_not_found(id: &str) -> Self {
        RegistrarError::RecordNotFound { id: id.to_string() }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal, id: &str) -> Self {
        RegistrarError::InvalidAmount {
            amount,
            id: id.to_string(),
        }
    }

    /// Create an EmptyCredential error
    pub fn empty_credential(id: &str) -> Self {
        RegistrarError::EmptyCredential { id: id.to_string() }
    }

    /// Create an AuthenticationFailed error
    pub fn authentication_failed(id: &str) -> Self {
        RegistrarError::AuthenticationFailed { id: id.to_string() }
    }

    /// Create an IdentifierExhausted error
    pub fn identifier_exhausted(prefix: &str, attempts: u32) -> Self {
        RegistrarError::IdentifierExhausted {
            prefix: prefix.to_string(),
            attempts,
        }
    }

    /// Create an IllegalStatusTransition error
    pub fn illegal_transition(from: &str, to: &str, reference: &str) -> Self {
        RegistrarError::IllegalStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
            reference: reference.to_string(),
        }
    }
}
