//! Integration test support for vaultkit.
//!
//! [`MockLedger`] is an in-memory ledger implementing both
//! [`LedgerProvider`] and [`ShareholderIndex`]. Contract state is installed
//! as get-method result stacks; every accepted submission is recorded in
//! order and confirms on its first status poll unless a failure was injected
//! for its destination.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p vaultkit-integration-tests
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};
use vaultkit_cell::Address;
use vaultkit_client::provider::{
    LedgerProvider, OutboundMessage, PendingSubmission, ShareHolder, ShareholderIndex,
    SubmissionStatus, TxHash,
};
use vaultkit_client::{ClientError, Result};
use vaultkit_protocol::distribution::ExtraRewardState;
use vaultkit_protocol::readers;
use vaultkit_protocol::stack::StackValue;
use vaultkit_protocol::strategy::StrategyConfig;
use vaultkit_protocol::vault::VaultConfig;

/// A submission the ledger accepted.
#[derive(Debug, Clone)]
pub struct Submission {
    pub sender: Address,
    pub message: OutboundMessage,
    pub tx: TxHash,
}

/// A get method call the ledger served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetCall {
    pub address: Address,
    pub method: String,
    pub args: Vec<StackValue>,
}

#[derive(Default)]
struct LedgerState {
    stacks: HashMap<(Address, String), Vec<StackValue>>,
    holders: HashMap<Address, Vec<ShareHolder>>,
    submissions: Vec<Submission>,
    get_calls: Vec<GetCall>,
    rejecting: HashMap<Address, i32>,
    broken_getters: HashSet<Address>,
    unavailable_submits: u32,
}

/// In-memory ledger double.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a raw result stack for `method` at `address`.
    pub fn set_stack(&self, address: Address, method: &str, stack: Vec<StackValue>) {
        self.lock().stacks.insert((address, method.to_string()), stack);
    }

    /// Install a vault's `get_vault_data` state.
    pub fn set_vault(&self, address: Address, config: &VaultConfig) {
        let stack = readers::vault_data_stack(config).expect("vault stack");
        self.set_stack(address, readers::GET_VAULT_DATA, stack);
    }

    /// Install a strategy's `get_strategy_data` state.
    pub fn set_strategy(&self, address: Address, config: &StrategyConfig) {
        let stack = readers::strategy_data_stack(config).expect("strategy stack");
        self.set_stack(address, readers::GET_STRATEGY_DATA, stack);
    }

    /// Install a distribution pool's `get_extra_reward_data` state.
    pub fn set_pool(&self, address: Address, state: &ExtraRewardState) {
        let stack = readers::extra_reward_data_stack(state).expect("pool stack");
        self.set_stack(address, readers::GET_EXTRA_REWARD_DATA, stack);
    }

    /// Set the indexed share holdings of `vault`.
    pub fn set_holders(&self, vault: Address, holders: Vec<ShareHolder>) {
        self.lock().holders.insert(vault, holders);
    }

    /// Messages to `address` fail on chain with `exit_code`.
    pub fn reject_messages_to(&self, address: Address, exit_code: i32) {
        self.lock().rejecting.insert(address, exit_code);
    }

    /// Every get method on `address` fails with exit code 11.
    pub fn break_getters(&self, address: Address) {
        self.lock().broken_getters.insert(address);
    }

    /// The next `n` submits fail before reaching the ledger.
    pub fn fail_next_submits(&self, n: u32) {
        self.lock().unavailable_submits = n;
    }

    /// Accepted submissions in order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    /// Served get method calls in order.
    pub fn get_calls(&self) -> Vec<GetCall> {
        self.lock().get_calls.clone()
    }
}

impl LedgerProvider for MockLedger {
    async fn submit(
        &self,
        sender: &Address,
        message: &OutboundMessage,
    ) -> Result<PendingSubmission> {
        let mut state = self.lock();
        if state.unavailable_submits > 0 {
            state.unavailable_submits -= 1;
            return Err(ClientError::Provider("ledger unavailable".to_string()));
        }
        let index = state.submissions.len();
        let mut hasher = Sha256::new();
        hasher.update((index as u64).to_be_bytes());
        hasher.update(message.fingerprint());
        state.submissions.push(Submission {
            sender: *sender,
            message: message.clone(),
            tx: TxHash(hasher.finalize().into()),
        });
        Ok(PendingSubmission {
            id: index.to_string(),
        })
    }

    async fn submission_status(&self, pending: &PendingSubmission) -> Result<SubmissionStatus> {
        let state = self.lock();
        let submission = pending
            .id
            .parse::<usize>()
            .ok()
            .and_then(|i| state.submissions.get(i))
            .ok_or_else(|| ClientError::Provider(format!("unknown submission {}", pending.id)))?;
        match state.rejecting.get(&submission.message.to) {
            Some(code) => Ok(SubmissionStatus::Failed {
                exit_code: Some(*code),
                reason: format!("exit code {code}"),
            }),
            None => Ok(SubmissionStatus::Confirmed(submission.tx)),
        }
    }

    async fn run_get_method(
        &self,
        address: &Address,
        method: &str,
        args: Vec<StackValue>,
    ) -> Result<Vec<StackValue>> {
        let mut state = self.lock();
        state.get_calls.push(GetCall {
            address: *address,
            method: method.to_string(),
            args,
        });
        if state.broken_getters.contains(address) {
            return Err(ClientError::GetMethodFailed {
                method: method.to_string(),
                exit_code: 11,
            });
        }
        state
            .stacks
            .get(&(*address, method.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::GetMethodFailed {
                method: method.to_string(),
                exit_code: 11,
            })
    }
}

impl ShareholderIndex for MockLedger {
    async fn share_holders(&self, vault: &Address) -> Result<Vec<ShareHolder>> {
        Ok(self.lock().holders.get(vault).cloned().unwrap_or_default())
    }
}

/// Deterministic test address.
pub fn addr(n: u8) -> Address {
    Address::new(0, [n; 32])
}
