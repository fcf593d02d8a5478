//! Strategy proxy.

use tracing::info;
use vaultkit_cell::{Address, Cell, Coins};
use vaultkit_protocol::message::StateInit;
use vaultkit_protocol::readers;
use vaultkit_protocol::strategy::{
    self, DeployOptions, ReinvestOptions, SetAddressOptions, StrategyConfig,
};

use crate::provider::{LedgerProvider, TxHash};
use crate::session::Submitter;
use crate::{ClientError, Result};

/// A strategy at a known address, optionally with its deploy state.
#[derive(Debug, Clone)]
pub struct StrategyContract {
    address: Address,
    init: Option<(Cell, StrategyConfig)>,
}

impl StrategyContract {
    pub fn from_address(address: Address) -> Self {
        Self {
            address,
            init: None,
        }
    }

    pub fn from_init(code: Cell, config: StrategyConfig, workchain: i8) -> Result<Self> {
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
        let msg = strategy::deploy(DeployOptions {
            code,
            config,
            query_id,
            value,
        })?;
        info!(strategy = %self.address, "deploying strategy");
        via.send(&self.address, msg).await
    }

    pub async fn send_set_deposit_lp_wallet_address<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: SetAddressOptions,
    ) -> Result<TxHash> {
        via.send(&self.address, strategy::set_deposit_lp_wallet_address(opts)?)
            .await
    }

    pub async fn send_set_jetton_wallet_address<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: SetAddressOptions,
    ) -> Result<TxHash> {
        via.send(&self.address, strategy::set_jetton_wallet_address(opts)?)
            .await
    }

    pub async fn send_reinvest<P: LedgerProvider>(
        &self,
        via: &Submitter<'_, P>,
        opts: ReinvestOptions,
    ) -> Result<TxHash> {
        via.send(&self.address, strategy::reinvest(opts)?).await
    }

    pub async fn get_strategy_data<P: LedgerProvider>(
        &self,
        provider: &P,
    ) -> Result<StrategyConfig> {
        let stack = provider
            .run_get_method(&self.address, readers::GET_STRATEGY_DATA, Vec::new())
            .await?;
        Ok(readers::read_strategy_data(stack)?)
    }
}
