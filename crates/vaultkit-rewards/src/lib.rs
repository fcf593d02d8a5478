//! # vaultkit-rewards
//!
//! Periodic extra-reward distribution to vault share holders.
//!
//! ## Modules
//!
//! - [`allocation`]: pro-rata split of a period budget over share holdings
//! - [`period`]: period numbering
//! - [`orchestrator`]: the per-vault read, allocate, distribute, fund pass

pub mod allocation;
pub mod orchestrator;
pub mod period;

use vaultkit_cell::Address;
use vaultkit_client::ClientError;
use vaultkit_protocol::ProtocolError;

/// Error types for reward distribution.
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    /// Ledger interaction failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Message or state encoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Arithmetic overflow.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// Reward settings are unusable.
    #[error("invalid reward config: {0}")]
    InvalidConfig(String),

    /// The vault points at a different distribution pool than configured.
    #[error("vault {vault} uses distribution pool {actual}, config says {configured}")]
    PoolMismatch {
        /// Vault address.
        vault: Address,
        /// Pool named in the vault's state.
        actual: Address,
        /// Pool named in the config.
        configured: Address,
    },

    /// Processing of one vault failed; the run stops here.
    #[error("vault {vault}: {source}")]
    Vault {
        /// Vault being processed.
        vault: Address,
        /// What went wrong.
        #[source]
        source: Box<RewardError>,
    },
}

/// Convenience result type for reward operations.
pub type Result<T> = std::result::Result<T, RewardError>;
