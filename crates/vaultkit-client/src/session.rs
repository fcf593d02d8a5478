//! Signing identity.
//!
//! A [`Session`] names the identity messages are sent from. It is created
//! once by the caller and passed explicitly to everything that submits.

use vaultkit_cell::Address;
use vaultkit_protocol::message::ContractMessage;

use crate::confirm::ConfirmationTracker;
use crate::provider::{LedgerProvider, OutboundMessage, TxHash};
use crate::Result;

/// The identity a run submits from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    identity: Address,
    label: String,
}

impl Session {
    /// Create a session for `identity`, with a label for logs.
    pub fn new(identity: Address, label: impl Into<String>) -> Self {
        Self {
            identity,
            label: label.into(),
        }
    }

    /// Sending address.
    pub fn identity(&self) -> &Address {
        &self.identity
    }

    /// Label used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Key under which this identity's submissions are serialised.
    pub fn submission_key(&self) -> String {
        self.identity.to_string()
    }
}

/// A session bound to a provider and a tracker.
pub struct Submitter<'a, P> {
    provider: &'a P,
    session: &'a Session,
    tracker: &'a ConfirmationTracker,
}

impl<'a, P: LedgerProvider> Submitter<'a, P> {
    /// Bind `session` to a provider and the tracker its sends go through.
    pub fn new(provider: &'a P, session: &'a Session, tracker: &'a ConfirmationTracker) -> Self {
        Self {
            provider,
            session,
            tracker,
        }
    }

    /// The bound provider, for get methods.
    pub fn provider(&self) -> &'a P {
        self.provider
    }

    /// The governor session sends are signed for.
    pub fn session(&self) -> &'a Session {
        self.session
    }

    /// Send `message` to `to` and wait for confirmation.
    pub async fn send(&self, to: &Address, message: ContractMessage) -> Result<TxHash> {
        let outbound = OutboundMessage::new(*to, message);
        tracing::debug!(
            from = self.session.label(),
            to = %to,
            value = %outbound.value,
            "sending message"
        );
        self.tracker
            .send_and_confirm(
                self.provider,
                &self.session.identity,
                &self.session.submission_key(),
                &outbound,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_key_is_raw_address() {
        let session = Session::new(Address::new(-1, [0xab; 32]), "governor");
        assert_eq!(session.submission_key(), format!("-1:{}", "ab".repeat(32)));
        assert_eq!(session.label(), "governor");
    }
}
