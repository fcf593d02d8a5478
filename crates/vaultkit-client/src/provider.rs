//! Ledger boundary.
//!
//! The ledger is a black box that can (a) accept a message from a signing
//! identity and later report whether it landed, and (b) run a read-only get
//! method. Signing, sequence numbers, and broadcasting all live behind
//! [`LedgerProvider`]. The provider offers no deduplication of its own; that
//! is the [`ConfirmationTracker`](crate::confirm::ConfirmationTracker)'s job.

use std::fmt;

use sha2::{Digest, Sha256};
use vaultkit_cell::{Address, Cell, Coins};
use vaultkit_protocol::message::{ContractMessage, StateInit};
use vaultkit_protocol::stack::StackValue;

use crate::Result;

/// A message as handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Destination contract or wallet.
    pub to: Address,
    /// Native value attached.
    pub value: Coins,
    /// Sealed body.
    pub body: Cell,
    /// State-init for deploys.
    pub state_init: Option<StateInit>,
    /// Whether the message bounces back on failure.
    pub bounce: bool,
}

impl OutboundMessage {
    /// Address `message` to `to`. Deploys are sent non-bounceable.
    pub fn new(to: Address, message: ContractMessage) -> Self {
        let bounce = message.state_init.is_none();
        Self {
            to,
            value: message.value,
            body: message.body,
            state_init: message.state_init,
            bounce,
        }
    }

    /// Content fingerprint used to recognise a repeated submission.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([self.to.workchain as u8]);
        hasher.update(self.to.hash);
        hasher.update(self.value.to_be_bytes());
        hasher.update(self.body.hash());
        match &self.state_init {
            Some(init) => {
                hasher.update([1]);
                hasher.update(init.code.hash());
                hasher.update(init.data.hash());
            }
            None => hasher.update([0]),
        }
        hasher.update([u8::from(self.bounce)]);
        hasher.finalize().into()
    }
}

/// Provider's handle for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingSubmission {
    /// Opaque id assigned by the provider.
    pub id: String,
}

/// Hash of a confirmed transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", hex::encode(self.0))
    }
}

/// What the ledger knows about a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Not yet included.
    Pending,
    /// Included and successful.
    Confirmed(TxHash),
    /// Included and failed, or dropped.
    Failed {
        /// Compute-phase exit code when the contract rejected it.
        exit_code: Option<i32>,
        /// Provider's reason text.
        reason: String,
    },
}

/// Submit messages and run get methods.
pub trait LedgerProvider: Send + Sync {
    /// Sign and broadcast `message` from `sender`.
    fn submit(
        &self,
        sender: &Address,
        message: &OutboundMessage,
    ) -> impl std::future::Future<Output = Result<PendingSubmission>> + Send;

    /// Current status of an earlier submission.
    fn submission_status(
        &self,
        pending: &PendingSubmission,
    ) -> impl std::future::Future<Output = Result<SubmissionStatus>> + Send;

    /// Run a get method and return its result stack.
    ///
    /// A non-zero exit code is reported as
    /// [`ClientError::GetMethodFailed`](crate::ClientError::GetMethodFailed).
    fn run_get_method(
        &self,
        address: &Address,
        method: &str,
        args: Vec<StackValue>,
    ) -> impl std::future::Future<Output = Result<Vec<StackValue>>> + Send;
}

/// One share holding as seen by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareHolder {
    /// Owner of the share wallet.
    pub owner: Address,
    /// Share balance.
    pub balance: Coins,
}

/// Enumerates share holdings of a vault.
///
/// The vault's data does not list holders; they come from an off-chain index
/// of its share wallets. An owner may appear more than once.
pub trait ShareholderIndex: Send + Sync {
    /// Current holdings of `vault`'s shares.
    fn share_holders(
        &self,
        vault: &Address,
    ) -> impl std::future::Future<Output = Result<Vec<ShareHolder>>> + Send;
}

#[cfg(test)]
mod tests {
    use vaultkit_cell::CellBuilder;

    use super::*;

    fn body(tag: u32) -> Cell {
        let mut b = CellBuilder::new();
        b.store_uint(u128::from(tag), 32).expect("store");
        b.seal()
    }

    #[test]
    fn test_deploy_is_not_bounceable() {
        let to = Address::new(0, [1; 32]);
        let plain = OutboundMessage::new(to, ContractMessage::new(body(1), 10));
        assert!(plain.bounce);

        let deploy = OutboundMessage::new(
            to,
            ContractMessage {
                body: body(1),
                value: 10,
                state_init: Some(StateInit {
                    code: body(2),
                    data: body(3),
                }),
            },
        );
        assert!(!deploy.bounce);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let to = Address::new(0, [1; 32]);
        let a = OutboundMessage::new(to, ContractMessage::new(body(1), 10));
        let same = OutboundMessage::new(to, ContractMessage::new(body(1), 10));
        let other_value = OutboundMessage::new(to, ContractMessage::new(body(1), 11));
        let other_body = OutboundMessage::new(to, ContractMessage::new(body(2), 10));
        let other_to =
            OutboundMessage::new(Address::new(0, [2; 32]), ContractMessage::new(body(1), 10));

        assert_eq!(a.fingerprint(), same.fingerprint());
        assert_ne!(a.fingerprint(), other_value.fingerprint());
        assert_ne!(a.fingerprint(), other_body.fingerprint());
        assert_ne!(a.fingerprint(), other_to.fingerprint());
    }

    #[test]
    fn test_tx_hash_display() {
        let h = TxHash([0xab; 32]);
        assert_eq!(h.to_string(), "ab".repeat(32));
    }
}
