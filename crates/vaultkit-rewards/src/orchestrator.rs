//! Reward distribution run.
//!
//! For each configured vault, in order:
//!
//! 1. Read the pool's extra-reward state (reward wallet, totals).
//! 2. Take the configured per-period budget.
//! 3. Read the vault's state, enumerate its share holdings, and allocate the
//!    budget pro rata.
//! 4. If anyone gets a reward, publish the distribution to the pool.
//! 5. Fund the pool's reward wallet with `budget + protocol_fee_margin`.
//!
//! Both submissions go from the governor session through the confirmation
//! tracker under the governor's key, so step 4 is confirmed before step 5 is
//! sent. The first failing vault ends the run.

use tracing::{info, warn};
use vaultkit_cell::{Address, Coins};
use vaultkit_client::confirm::ConfirmationTracker;
use vaultkit_client::pool::DistributionPoolContract;
use vaultkit_client::provider::{LedgerProvider, ShareholderIndex, TxHash};
use vaultkit_client::session::{Session, Submitter};
use vaultkit_client::vault::VaultContract;
use vaultkit_protocol::vault::{validate_fee_rate, DEFAULT_MANAGEMENT_FEE_PRECISION};

use crate::allocation::allocate;
use crate::period::{period_at, DEFAULT_PERIOD_SECS};
use crate::{Result, RewardError};

/// Reward policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardConfig {
    /// Native amount distributed per period per vault.
    pub period_budget: Coins,
    /// Extra native amount sent with the funding transfer for pool fees.
    pub protocol_fee_margin: Coins,
    /// Period length in seconds.
    pub period_secs: u64,
    /// Denominator of the vault's management fee rate.
    pub management_fee_precision: u32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            period_budget: 0,
            protocol_fee_margin: 0,
            period_secs: DEFAULT_PERIOD_SECS,
            management_fee_precision: DEFAULT_MANAGEMENT_FEE_PRECISION,
        }
    }
}

impl RewardConfig {
    /// Validate the reward policy.
    pub fn validate(&self) -> Result<()> {
        if self.period_budget == 0 {
            return Err(RewardError::InvalidConfig(
                "period_budget must be positive".to_string(),
            ));
        }
        if self.period_secs == 0 {
            return Err(RewardError::InvalidConfig(
                "period_secs must be positive".to_string(),
            ));
        }
        if self.management_fee_precision == 0 {
            return Err(RewardError::InvalidConfig(
                "management_fee_precision must be positive".to_string(),
            ));
        }
        self.period_budget
            .checked_add(self.protocol_fee_margin)
            .filter(|v| *v < vaultkit_cell::MAX_COINS_EXCLUSIVE)
            .ok_or(RewardError::Overflow("funding amount"))?;
        Ok(())
    }
}

/// One vault to distribute for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultTarget {
    /// Vault whose share holders are rewarded.
    pub vault: Address,
    /// Strategy the vault is expected to delegate to.
    pub strategy: Address,
    /// Pool that receives the distribution and the funding.
    pub distribution_pool: Address,
}

/// What happened for one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultReport {
    /// Vault this report covers.
    pub vault: Address,
    /// Period distributed for.
    pub period: u64,
    /// Owners that received a reward.
    pub recipients: usize,
    /// Sum of all rewards sent.
    pub distributed: Coins,
    /// Budget left undistributed by rounding or for lack of holders.
    pub remainder: Coins,
    /// Distribution transaction; `None` when nobody was owed anything.
    pub distribution_tx: Option<TxHash>,
    /// Funding transaction.
    pub funding_tx: TxHash,
}

/// Result of a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Period the run distributed for.
    pub period: u64,
    /// One report per target, in target order.
    pub vaults: Vec<VaultReport>,
}

/// Drives distribution for a set of vaults from one governor session.
pub struct Distributor<'a, P, I> {
    provider: &'a P,
    index: &'a I,
    session: &'a Session,
    tracker: &'a ConfirmationTracker,
    config: RewardConfig,
}

impl<'a, P: LedgerProvider, I: ShareholderIndex> Distributor<'a, P, I> {
    /// Create a distributor with a validated reward policy.
    pub fn new(
        provider: &'a P,
        index: &'a I,
        session: &'a Session,
        tracker: &'a ConfirmationTracker,
        config: RewardConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            index,
            session,
            tracker,
            config,
        })
    }

    /// Distribute for every target in order, for the period containing `now_unix`.
    ///
    /// # Errors
    ///
    /// [`RewardError::Vault`] naming the first vault that failed. Vaults
    /// after it are not processed; earlier ones stay distributed.
    pub async fn run(&self, targets: &[VaultTarget], now_unix: u64) -> Result<RunReport> {
        let period = period_at(now_unix, self.config.period_secs);
        info!(
            period,
            vaults = targets.len(),
            governor = self.session.label(),
            "starting reward distribution"
        );

        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            let report = self
                .distribute_vault(target, period)
                .await
                .map_err(|e| RewardError::Vault {
                    vault: target.vault,
                    source: Box::new(e),
                })?;
            reports.push(report);
        }

        info!(period, vaults = reports.len(), "reward distribution complete");
        Ok(RunReport {
            period,
            vaults: reports,
        })
    }

    /// Distribute one period's budget for one vault.
    pub async fn distribute_vault(&self, target: &VaultTarget, period: u64) -> Result<VaultReport> {
        let pool = DistributionPoolContract::from_address(target.distribution_pool);
        let vault = VaultContract::from_address(target.vault);
        let via = Submitter::new(self.provider, self.session, self.tracker);

        let pool_state = pool.get_extra_reward_data(self.provider).await?;
        let budget = self.config.period_budget;

        let vault_state = vault.get_vault_data(self.provider).await?;
        self.check_vault_state(target, &vault_state)?;

        let holders = self.index.share_holders(&target.vault).await?;
        let allocation = allocate(budget, &holders)?;
        if allocation.total_balance > vault_state.shares_total_supply {
            warn!(
                vault = %target.vault,
                indexed = %allocation.total_balance,
                supply = %vault_state.shares_total_supply,
                "indexed share balances exceed total supply"
            );
        }

        let distribution_tx = if allocation.is_empty() {
            info!(vault = %target.vault, period, "no rewards owed, skipping distribution");
            None
        } else {
            let tx = pool
                .send_set_extra_distribution(&via, period, &allocation.rewards)
                .await?;
            info!(
                vault = %target.vault,
                period,
                recipients = allocation.rewards.len(),
                distributed = %allocation.distributed,
                tx = %tx,
                "distribution confirmed"
            );
            Some(tx)
        };

        let funding_tx = pool
            .send_funding(
                &via,
                &pool_state.reward_wallet,
                budget,
                self.config.protocol_fee_margin,
            )
            .await?;
        info!(
            vault = %target.vault,
            reward_wallet = %pool_state.reward_wallet,
            amount = %budget,
            undistributed_before = %pool_state.undistributed(),
            tx = %funding_tx,
            "pool funded"
        );

        Ok(VaultReport {
            vault: target.vault,
            period,
            recipients: allocation.rewards.len(),
            distributed: allocation.distributed,
            remainder: allocation.remainder,
            distribution_tx,
            funding_tx,
        })
    }

    fn check_vault_state(
        &self,
        target: &VaultTarget,
        state: &vaultkit_protocol::vault::VaultConfig,
    ) -> Result<()> {
        if state.distribution_pool_address != target.distribution_pool {
            return Err(RewardError::PoolMismatch {
                vault: target.vault,
                actual: state.distribution_pool_address,
                configured: target.distribution_pool,
            });
        }
        if state.strategy_address != Some(target.strategy) {
            warn!(
                vault = %target.vault,
                configured = %target.strategy,
                actual = ?state.strategy_address,
                "vault strategy differs from config"
            );
        }
        let precision = self.config.management_fee_precision;
        if validate_fee_rate(state.management_fee_rate, precision).is_err() {
            warn!(
                vault = %target.vault,
                rate = state.management_fee_rate,
                precision,
                "management fee rate above precision"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_config_validation() {
        let ok = RewardConfig {
            period_budget: 1_000,
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
        assert!(RewardConfig::default().validate().is_err());
        let zero_period = RewardConfig {
            period_secs: 0,
            ..ok.clone()
        };
        assert!(zero_period.validate().is_err());
        let overflow = RewardConfig {
            period_budget: vaultkit_cell::MAX_COINS_EXCLUSIVE - 1,
            protocol_fee_margin: 1,
            ..ok
        };
        assert!(matches!(overflow.validate(), Err(RewardError::Overflow(_))));
    }
}
