//! Vault proxy.

use tracing::info;
use vaultkit_cell::{Address, Cell, Coins};
use vaultkit_protocol::jetton::{self, DepositOptions, WithdrawOptions};
use vaultkit_protocol::message::StateInit;
use vaultkit_protocol::readers;
use vaultkit_protocol::vault::{
    self, DeployOptions, ReinvestOptions, SetAddressOptions, SetIsLockedOptions,
    SetManagementFeeRateOptions, VaultConfig, WithdrawManagementFeeOptions,
};

use crate::provider::{LedgerProvider, TxHash};
use crate::session::Submitter;
use crate::{ClientError, Result};

/// A vault at a known address, optionally with the code and data to deploy it.
#[derive(Debug, Clone)]
pub struct VaultContract {
    address: Address,
    init: Option<(Cell, VaultConfig)>,
}

impl VaultContract {
    /// Open an already deployed vault.
    pub fn from_address(address: Address) -> Self {
        Self {
            address,
            init: None,
        }
    }

    /// Prepare a vault for deployment; the address follows from code and data.
    pub fn from_init(code: Cell, config: VaultConfig, workchain: i8) -> Result<Self> {
        let state_init = StateInit {
            code: code.clone(),
            data: config.to_cell()?,
        };
        Ok(Self {
            address: state_init.address(workchain)?,
            init: Some((code, config)),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Deploy with the prepared state-init.
    pub async fn send_deploy<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        query_id: Option<u64>,
        value: Option<Coins>,
    ) -> Result<TxHash> {
        let (code, config) = self
            .init
            .clone()
            .ok_or_else(|| ClientError::MissingStateInit(self.address.to_string()))?;
        let msg = vault::deploy(DeployOptions {
            code,
            config,
            query_id,
            value,
        })?;
        info!(vault = %self.address, "deploying vault");
        via.send(&self.address, msg).await
    }

    pub async fn send_set_strategy_address<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: SetAddressOptions,
    ) -> Result<TxHash> {
        via.send(&self.address, vault::set_strategy_address(opts)?).await
    }

    pub async fn send_set_deposit_lp_wallet_address<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: SetAddressOptions,
    ) -> Result<TxHash> {
        via.send(&self.address, vault::set_deposit_lp_wallet_address(opts)?)
            .await
    }

    /// Withdraw accrued management fee, checked against current state first.
    pub async fn send_withdraw_management_fee<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: WithdrawManagementFeeOptions,
    ) -> Result<TxHash> {
        let config = self.get_vault_data(via.provider()).await?;
        config.check_fee_withdrawal(opts.amount)?;
        via.send(&self.address, vault::withdraw_management_fee(opts)?)
            .await
    }

    pub async fn send_set_is_locked<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: SetIsLockedOptions,
    ) -> Result<TxHash> {
        via.send(&self.address, vault::set_is_locked(opts)?).await
    }

    pub async fn send_set_management_fee_rate<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: SetManagementFeeRateOptions,
    ) -> Result<TxHash> {
        via.send(&self.address, vault::set_management_fee_rate(opts)?)
            .await
    }

    pub async fn send_reinvest<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: ReinvestOptions,
    ) -> Result<TxHash> {
        via.send(&self.address, vault::reinvest(opts)?).await
    }

    /// Deposit LP; sent to the depositor's own LP wallet.
    ///
    /// The vault is filled in as the transfer destination.
    pub async fn send_deposit<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        depositor_lp_wallet: &Address,
        mut opts: DepositOptions,
    ) -> Result<TxHash> {
        opts.vault = self.address;
        via.send(depositor_lp_wallet, jetton::deposit_notify(opts)?)
            .await
    }

    /// Withdraw shares; sent to the session identity's share wallet.
    pub async fn send_withdraw<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: WithdrawOptions,
    ) -> Result<TxHash> {
        let owner = *via.session().identity();
        let share_wallet = self.get_wallet_address(via.provider(), &owner).await?;
        via.send(&share_wallet, jetton::withdraw(opts)?).await
    }

    pub async fn get_vault_data<P: LedgerProvider>(&self, provider: &P) -> Result<VaultConfig> {
        let stack = provider
            .run_get_method(&self.address, readers::GET_VAULT_DATA, Vec::new())
            .await?;
        Ok(readers::read_vault_data(stack)?)
    }

    pub async fn get_estimated_lp_out<P: LedgerProvider>(
        &self,
        provider: &P,
        shares: Coins,
    ) -> Result<Coins> {
        let stack = provider
            .run_get_method(
                &self.address,
                readers::GET_ESTIMATED_LP_OUT,
                readers::estimated_lp_out_args(shares)?,
            )
            .await?;
        Ok(readers::read_estimated_lp_out(stack)?)
    }

    pub async fn get_estimated_shares_out<P: LedgerProvider>(
        &self,
        provider: &P,
        lp: Coins,
    ) -> Result<Coins> {
        let stack = provider
            .run_get_method(
                &self.address,
                readers::GET_ESTIMATED_SHARES_OUT,
                readers::estimated_shares_out_args(lp)?,
            )
            .await?;
        Ok(readers::read_estimated_shares_out(stack)?)
    }

    /// Share wallet of `owner`.
    pub async fn get_wallet_address<P: LedgerProvider>(
        &self,
        provider: &P,
        owner: &Address,
    ) -> Result<Address> {
        let stack = provider
            .run_get_method(
                &self.address,
                readers::GET_WALLET_ADDRESS,
                readers::wallet_address_args(owner)?,
            )
            .await?;
        Ok(readers::read_wallet_address(stack)?)
    }
}
