//! # vaultkit-client
//!
//! Ledger-facing side of vaultkit.
//!
//! - [`provider`]: the [`LedgerProvider`](provider::LedgerProvider) and
//!   [`ShareholderIndex`](provider::ShareholderIndex) boundaries
//! - [`session`]: the signing identity and the [`Submitter`](session::Submitter)
//!   that sends through the tracker
//! - [`confirm`]: [`ConfirmationTracker`](confirm::ConfirmationTracker), the
//!   keyed wait-for-confirmation state machine
//! - [`vault`], [`strategy`], [`pool`]: contract proxies
//! - [`gateway`]: JSON-RPC provider over a Unix socket

pub mod confirm;
pub mod gateway;
pub mod pool;
pub mod provider;
pub mod session;
pub mod strategy;
pub mod vault;

use vaultkit_cell::CellError;
use vaultkit_protocol::ProtocolError;

/// Error types for ledger interaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Cell encoding or decoding failed.
    #[error(transparent)]
    Cell(#[from] CellError),

    /// Message building or stack decoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Provider could not complete a request (transport, node unavailable).
    #[error("provider error: {0}")]
    Provider(String),

    /// Gateway answered with a JSON-RPC error object.
    #[error("gateway error {code}: {message}")]
    Gateway {
        /// JSON-RPC error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Malformed frame from the gateway.
    #[error("gateway protocol error: {0}")]
    GatewayProtocol(String),

    /// Socket I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// A get method ran but exited with a non-zero code.
    #[error("get method {method} failed with exit code {exit_code}")]
    GetMethodFailed {
        /// Method name.
        method: String,
        /// TVM exit code.
        exit_code: i32,
    },

    /// The ledger reported the submission as failed.
    #[error("submission {key} failed: {reason}")]
    SubmissionFailed {
        /// Submission key.
        key: String,
        /// Exit code, when the failure came from the contract.
        exit_code: Option<i32>,
        /// Reason text.
        reason: String,
    },

    /// Every submit attempt errored.
    #[error("submission {key} abandoned after {attempts} submit attempts: {last_error}")]
    SubmitExhausted {
        /// Submission key.
        key: String,
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last_error: String,
    },

    /// Submitted but not confirmed within the poll budget.
    #[error("submission {key} unconfirmed after {polls} polls")]
    ConfirmationTimeout {
        /// Submission key.
        key: String,
        /// Polls made.
        polls: u32,
    },

    /// Retry policy values are unusable.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// A deploy was requested from a proxy that has no state-init.
    #[error("contract {0} was opened by address only and cannot be deployed")]
    MissingStateInit(String),
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::GatewayProtocol(e.to_string())
    }
}

/// Convenience result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
