//! Distribution pool proxy.

use std::collections::BTreeMap;

use vaultkit_cell::{Address, Coins};
use vaultkit_protocol::distribution::{self, ExtraDistributionOptions, ExtraRewardState};
use vaultkit_protocol::readers;

use crate::provider::{LedgerProvider, TxHash};
use crate::session::Submitter;
use crate::Result;

/// The extra-reward distribution pool attached to a vault.
#[derive(Debug, Clone)]
pub struct DistributionPoolContract {
    address: Address,
}

impl DistributionPoolContract {
    pub fn from_address(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Reward wallet and accounting totals.
    pub async fn get_extra_reward_data<P: LedgerProvider>(
        &self,
        provider: &P,
    ) -> Result<ExtraRewardState> {
        let stack = provider
            .run_get_method(&self.address, readers::GET_EXTRA_REWARD_DATA, Vec::new())
            .await?;
        Ok(readers::read_extra_reward_data(stack)?)
    }

    /// Publish a period's distribution.
    pub async fn send_set_extra_distribution<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        period: u64,
        entries: &BTreeMap<Address, Coins>,
    ) -> Result<TxHash> {
        let msg = distribution::set_extra_distribution(ExtraDistributionOptions {
            period,
            entries,
            query_id: Some(period),
            value: None,
        })?;
        via.send(&self.address, msg).await
    }

    /// Fund the pool's reward wallet with `budget + fee_margin`.
    pub async fn send_funding<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        reward_wallet: &Address,
        budget: Coins,
        fee_margin: Coins,
    ) -> Result<TxHash> {
        let msg = distribution::funding_transfer(budget, fee_margin)?;
        via.send(reward_wallet, msg).await
    }
}
