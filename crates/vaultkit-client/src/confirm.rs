//! Keyed wait-for-confirmation.
//!
//! Every submission goes through [`ConfirmationTracker::send_and_confirm`]
//! under a submission key (the sender's address string). Per key:
//!
//! ```text
//! Submitted --provider accepts--> Polling --confirmed--> Confirmed
//!     |                              |
//!     +--submit attempts exhausted---+--failed / poll budget exhausted--> Failed
//! ```
//!
//! - Submit errors are retried with exponential backoff.
//! - Once the provider has accepted a message it is never resubmitted. An
//!   on-chain failure or an exhausted poll budget is final.
//! - At most one submission per key is in flight. A concurrent call with the
//!   same key and the same message fingerprint shares the first call's
//!   outcome; one with a different message waits for the first to finish and
//!   then submits its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vaultkit_cell::Address;
use vaultkit_protocol::exit_codes;

use crate::provider::{
    LedgerProvider, OutboundMessage, PendingSubmission, SubmissionStatus, TxHash,
};
use crate::{ClientError, Result};

/// Retry and polling limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Submit attempts before giving up (at least 1).
    pub max_submit_attempts: u32,
    /// Status polls after acceptance before giving up (at least 1).
    pub max_polls: u32,
    /// First backoff delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Backoff cap in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_submit_attempts: 3,
            max_polls: 60,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Validate the policy.
    pub fn validate(&self) -> Result<()> {
        if self.max_submit_attempts == 0 {
            return Err(ClientError::InvalidPolicy(
                "max_submit_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_polls == 0 {
            return Err(ClientError::InvalidPolicy(
                "max_polls must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ClientError::InvalidPolicy(format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms,
            )));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (0-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Where a keyed submission is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    /// Being handed to the provider.
    Submitted,
    /// Accepted; waiting for inclusion.
    Polling,
    /// Included and successful.
    Confirmed,
    /// Rejected, failed on-chain, or unconfirmed within budget.
    Failed,
}

type Outcome = Result<TxHash>;

struct Entry {
    id: u64,
    fingerprint: [u8; 32],
    state: SubmissionState,
    outcome: watch::Receiver<Option<Outcome>>,
}

enum Claim {
    Lead(u64, watch::Sender<Option<Outcome>>),
    Join(watch::Receiver<Option<Outcome>>),
    Queue(watch::Receiver<Option<Outcome>>),
}

/// Serialises submissions per key and waits for their confirmation.
pub struct ConfirmationTracker {
    policy: RetryPolicy,
    next_id: AtomicU64,
    inflight: Mutex<HashMap<String, Entry>>,
}

impl ConfirmationTracker {
    /// Create a tracker with a validated policy.
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            next_id: AtomicU64::new(1),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// The policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// State of the in-flight submission under `key`: `Submitted` or
    /// `Polling`. `None` once it has finished.
    pub fn state(&self, key: &str) -> Option<SubmissionState> {
        self.lock().get(key).map(|e| e.state)
    }

    /// Submit `message` from `sender` under `key` and wait until it is
    /// confirmed or definitely failed.
    pub async fn send_and_confirm<P: LedgerProvider>(
        &self,
        provider: &P,
        sender: &Address,
        key: &str,
        message: &OutboundMessage,
    ) -> Result<TxHash> {
        let fingerprint = message.fingerprint();
        loop {
            match self.claim(key, fingerprint) {
                Claim::Lead(id, tx) => {
                    let guard = EntryGuard {
                        tracker: self,
                        key,
                        id,
                    };
                    let outcome = self.drive(provider, sender, key, id, message).await;
                    let state = if outcome.is_ok() {
                        SubmissionState::Confirmed
                    } else {
                        SubmissionState::Failed
                    };
                    debug!(key, ?state, "submission finished");
                    // Free the key before waking waiters so queued callers can claim it.
                    drop(guard);
                    tx.send_replace(Some(outcome.clone()));
                    return outcome;
                }
                Claim::Join(rx) => {
                    debug!(key, "identical submission in flight, sharing its outcome");
                    if let Some(outcome) = wait_outcome(rx).await {
                        return outcome;
                    }
                }
                Claim::Queue(rx) => {
                    debug!(key, "another submission in flight, waiting for it");
                    let _ = wait_outcome(rx).await;
                }
            }
        }
    }

    fn claim(&self, key: &str, fingerprint: [u8; 32]) -> Claim {
        let mut inflight = self.lock();
        match inflight.get(key) {
            Some(entry) if entry.fingerprint == fingerprint => Claim::Join(entry.outcome.clone()),
            Some(entry) => Claim::Queue(entry.outcome.clone()),
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                inflight.insert(
                    key.to_string(),
                    Entry {
                        id,
                        fingerprint,
                        state: SubmissionState::Submitted,
                        outcome: rx,
                    },
                );
                Claim::Lead(id, tx)
            }
        }
    }

    async fn drive<P: LedgerProvider>(
        &self,
        provider: &P,
        sender: &Address,
        key: &str,
        id: u64,
        message: &OutboundMessage,
    ) -> Result<TxHash> {
        let pending = self.submit_with_retry(provider, sender, key, message).await?;
        self.set_state(key, id, SubmissionState::Polling);
        info!(key, submission = %pending.id, to = %message.to, "submitted, awaiting confirmation");
        self.poll_until_final(provider, key, &pending).await
    }

    async fn submit_with_retry<P: LedgerProvider>(
        &self,
        provider: &P,
        sender: &Address,
        key: &str,
        message: &OutboundMessage,
    ) -> Result<PendingSubmission> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match provider.submit(sender, message).await {
                Ok(pending) => return Ok(pending),
                Err(e) if attempt >= self.policy.max_submit_attempts => {
                    return Err(ClientError::SubmitExhausted {
                        key: key.to_string(),
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.policy.backoff(attempt - 1);
                    warn!(
                        key,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "submit failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn poll_until_final<P: LedgerProvider>(
        &self,
        provider: &P,
        key: &str,
        pending: &PendingSubmission,
    ) -> Result<TxHash> {
        for poll in 1..=self.policy.max_polls {
            tokio::time::sleep(self.policy.backoff(poll - 1)).await;
            match provider.submission_status(pending).await {
                Ok(SubmissionStatus::Confirmed(hash)) => {
                    info!(key, polls = poll, tx = %hash, "confirmed");
                    return Ok(hash);
                }
                Ok(SubmissionStatus::Failed { exit_code, reason }) => {
                    let reason = match exit_code {
                        Some(code) => format!("{reason}: {}", exit_codes::describe(code)),
                        None => reason,
                    };
                    warn!(key, submission = %pending.id, %reason, "submission failed on ledger");
                    return Err(ClientError::SubmissionFailed {
                        key: key.to_string(),
                        exit_code,
                        reason,
                    });
                }
                Ok(SubmissionStatus::Pending) => {
                    debug!(key, poll, "still pending");
                }
                Err(e) => {
                    warn!(key, poll, error = %e, "status poll failed");
                }
            }
        }
        Err(ClientError::ConfirmationTimeout {
            key: key.to_string(),
            polls: self.policy.max_polls,
        })
    }

    fn set_state(&self, key: &str, id: u64, state: SubmissionState) {
        if let Some(entry) = self.lock().get_mut(key) {
            if entry.id == id {
                entry.state = state;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Removes the leader's entry when it finishes or is dropped mid-flight.
struct EntryGuard<'a> {
    tracker: &'a ConfirmationTracker,
    key: &'a str,
    id: u64,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = self.tracker.lock();
        if inflight.get(self.key).is_some_and(|e| e.id == self.id) {
            inflight.remove(self.key);
        }
    }
}

/// `None` if the leader went away without an outcome.
async fn wait_outcome(mut rx: watch::Receiver<Option<Outcome>>) -> Option<Outcome> {
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome).clone(),
        Err(_) => None,
    };
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, AtomicU32};

    use vaultkit_cell::CellBuilder;
    use vaultkit_protocol::message::ContractMessage;
    use vaultkit_protocol::stack::StackValue;

    use super::*;

    #[derive(Clone, Copy)]
    enum Final {
        Confirm,
        Fail,
        Never,
    }

    /// Ledger double: fails the first `submit_failures` submits, then
    /// reports `pending_polls` pending statuses before `last`.
    struct ScriptedLedger {
        submit_failures: u32,
        pending_polls: u32,
        last: Final,
        submits: AtomicU32,
        polls: Mutex<HashMap<String, u32>>,
        in_flight: AtomicI32,
        max_in_flight: AtomicI32,
    }

    impl ScriptedLedger {
        fn new(submit_failures: u32, pending_polls: u32, last: Final) -> Self {
            Self {
                submit_failures,
                pending_polls,
                last,
                submits: AtomicU32::new(0),
                polls: Mutex::new(HashMap::new()),
                in_flight: AtomicI32::new(0),
                max_in_flight: AtomicI32::new(0),
            }
        }

        fn accepted(&self) -> u32 {
            self.submits
                .load(Ordering::SeqCst)
                .saturating_sub(self.submit_failures)
        }
    }

    impl LedgerProvider for ScriptedLedger {
        async fn submit(
            &self,
            _sender: &Address,
            _message: &OutboundMessage,
        ) -> Result<PendingSubmission> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.submit_failures {
                return Err(ClientError::Provider("node unavailable".to_string()));
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            Ok(PendingSubmission {
                id: format!("sub-{n}"),
            })
        }

        async fn submission_status(&self, pending: &PendingSubmission) -> Result<SubmissionStatus> {
            let count = {
                let mut polls = self.polls.lock().expect("lock");
                let c = polls.entry(pending.id.clone()).or_insert(0);
                *c += 1;
                *c
            };
            if count <= self.pending_polls {
                return Ok(SubmissionStatus::Pending);
            }
            match self.last {
                Final::Confirm => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    let tag = pending.id.len() as u8;
                    Ok(SubmissionStatus::Confirmed(TxHash([tag; 32])))
                }
                Final::Fail => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(SubmissionStatus::Failed {
                        exit_code: Some(85),
                        reason: "compute phase failed".to_string(),
                    })
                }
                Final::Never => Ok(SubmissionStatus::Pending),
            }
        }

        async fn run_get_method(
            &self,
            _address: &Address,
            _method: &str,
            _args: Vec<StackValue>,
        ) -> Result<Vec<StackValue>> {
            Ok(Vec::new())
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_submit_attempts: 3,
            max_polls: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        }
    }

    fn message(tag: u32) -> OutboundMessage {
        let mut b = CellBuilder::new();
        b.store_uint(u128::from(tag), 32).expect("store");
        OutboundMessage::new(Address::new(0, [7; 32]), ContractMessage::new(b.seal(), 1_000))
    }

    const SENDER: Address = Address::new(0, [1; 32]);
    const KEY: &str = "0:0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(800));
        assert_eq!(p.backoff(4), Duration::from_millis(1_000));
        assert_eq!(p.backoff(200), Duration::from_millis(1_000));
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetryPolicy::default().validate().is_ok());
        let zero = RetryPolicy {
            max_polls: 0,
            ..policy()
        };
        assert!(ConfirmationTracker::new(zero).is_err());
        let inverted = RetryPolicy {
            initial_backoff_ms: 5_000,
            ..policy()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ClientError::InvalidPolicy(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_after_pending_polls() {
        let ledger = ScriptedLedger::new(0, 2, Final::Confirm);
        let tracker = ConfirmationTracker::new(policy()).expect("tracker");
        let hash = tracker
            .send_and_confirm(&ledger, &SENDER, KEY, &message(1))
            .await
            .expect("confirmed");
        assert_eq!(hash, TxHash([5; 32]));
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.state(KEY), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_follows_submission() {
        let ledger = ScriptedLedger::new(1, 3, Final::Confirm);
        let tracker = ConfirmationTracker::new(policy()).expect("tracker");
        let msg = message(1);
        let observe = async {
            let mut seen = Vec::new();
            for _ in 0..40 {
                if let Some(state) = tracker.state(KEY) {
                    if seen.last() != Some(&state) {
                        seen.push(state);
                    }
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            seen
        };
        let (outcome, seen) = tokio::join!(
            tracker.send_and_confirm(&ledger, &SENDER, KEY, &msg),
            observe
        );
        outcome.expect("confirmed");
        assert_eq!(seen, vec![SubmissionState::Submitted, SubmissionState::Polling]);
        assert_eq!(tracker.state(KEY), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_errors_are_retried() {
        let ledger = ScriptedLedger::new(2, 0, Final::Confirm);
        let tracker = ConfirmationTracker::new(policy()).expect("tracker");
        tracker
            .send_and_confirm(&ledger, &SENDER, KEY, &message(1))
            .await
            .expect("third attempt succeeds");
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_attempts_exhausted() {
        let ledger = ScriptedLedger::new(10, 0, Final::Confirm);
        let tracker = ConfirmationTracker::new(policy()).expect("tracker");
        let err = tracker
            .send_and_confirm(&ledger, &SENDER, KEY, &message(1))
            .await
            .expect_err("exhausted");
        assert!(matches!(err, ClientError::SubmitExhausted { attempts: 3, .. }));
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_onchain_failure_is_final() {
        let ledger = ScriptedLedger::new(0, 1, Final::Fail);
        let tracker = ConfirmationTracker::new(policy()).expect("tracker");
        let err = tracker
            .send_and_confirm(&ledger, &SENDER, KEY, &message(1))
            .await
            .expect_err("failed");
        match err {
            ClientError::SubmissionFailed { exit_code, reason, .. } => {
                assert_eq!(exit_code, Some(85));
                assert!(reason.contains("invalid caller"));
            }
            other => unreachable!("unexpected error {other:?}"),
        }
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_budget_exhausted_is_not_resubmitted() {
        let ledger = ScriptedLedger::new(0, 0, Final::Never);
        let tracker = ConfirmationTracker::new(policy()).expect("tracker");
        let err = tracker
            .send_and_confirm(&ledger, &SENDER, KEY, &message(1))
            .await
            .expect_err("timeout");
        assert!(matches!(err, ClientError::ConfirmationTimeout { polls: 5, .. }));
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_submissions_share_outcome() {
        let ledger = ScriptedLedger::new(0, 3, Final::Confirm);
        let tracker = ConfirmationTracker::new(policy()).expect("tracker");
        let msg = message(1);
        let (a, b) = tokio::join!(
            tracker.send_and_confirm(&ledger, &SENDER, KEY, &msg),
            tracker.send_and_confirm(&ledger, &SENDER, KEY, &msg),
        );
        assert_eq!(a.expect("first"), b.expect("second"));
        assert_eq!(ledger.accepted(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_different_submissions_are_serialised() {
        let ledger = ScriptedLedger::new(0, 2, Final::Confirm);
        let tracker = ConfirmationTracker::new(policy()).expect("tracker");
        let (first, second) = (message(1), message(2));
        let (a, b) = tokio::join!(
            tracker.send_and_confirm(&ledger, &SENDER, KEY, &first),
            tracker.send_and_confirm(&ledger, &SENDER, KEY, &second),
        );
        a.expect("first");
        b.expect("second");
        assert_eq!(ledger.accepted(), 2);
        assert_eq!(ledger.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_run_independently() {
        let ledger = ScriptedLedger::new(0, 2, Final::Confirm);
        let tracker = ConfirmationTracker::new(policy()).expect("tracker");
        let msg = message(1);
        let (a, b) = tokio::join!(
            tracker.send_and_confirm(&ledger, &SENDER, "key-a", &msg),
            tracker.send_and_confirm(&ledger, &SENDER, "key-b", &msg),
        );
        a.expect("a");
        b.expect("b");
        assert_eq!(ledger.accepted(), 2);
        assert_eq!(ledger.max_in_flight.load(Ordering::SeqCst), 2);
    }
}
