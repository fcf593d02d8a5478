//! Strategy state layout and message builders.
//!
//! ```text
//! vault_address:MsgAddress pool_address:MsgAddress pool_type:Bool
//! ^[ deposit_lp_wallet:MsgAddress jetton_wallet:MsgAddress admin:MsgAddress ]
//! ^[ jetton_vault:MsgAddress native_vault:MsgAddress ]
//! ^upgrade
//! ```

use vaultkit_cell::{Address, Cell, CellBuilder, Coins};

use crate::message::{address_setter, begin, ContractMessage, StateInit, UpgradeSlot};
use crate::opcodes::Opcode;
use crate::reinvest::{self, ReinvestParams};
use crate::Result;

/// Default value attached to deploy.
pub const DEPLOY_VALUE: Coins = 50_000_000;
/// Default value attached to admin setters.
pub const ADMIN_OP_VALUE: Coins = 50_000_000;
/// Default value attached to a direct strategy reinvest.
pub const REINVEST_VALUE: Coins = 300_000_000;

/// Curve of the trading pool the strategy swaps through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PoolType {
    /// Constant-product pool.
    #[default]
    Volatile,
    /// Stable-swap pool.
    Stable,
}

impl PoolType {
    /// Encoded bit.
    pub const fn bit(self) -> bool {
        matches!(self, PoolType::Stable)
    }

    /// Decode the stored bit.
    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            PoolType::Stable
        } else {
            PoolType::Volatile
        }
    }
}

/// Strategy persistent state, as stored and as returned by `get_strategy_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    pub vault_address: Address,
    pub pool_address: Address,
    pub pool_type: PoolType,
    /// Strategy's LP jetton wallet; none until set by the admin.
    pub deposit_lp_wallet_address: Option<Address>,
    /// Strategy's target-token wallet; none until set by the admin.
    pub jetton_wallet_address: Option<Address>,
    pub admin_address: Address,
    pub jetton_vault_address: Address,
    pub native_vault_address: Address,
    pub upgrade: UpgradeSlot,
}

impl StrategyConfig {
    /// Encode as the strategy's data cell.
    pub fn to_cell(&self) -> Result<Cell> {
        let mut wallets = CellBuilder::new();
        wallets
            .store_maybe_address(self.deposit_lp_wallet_address.as_ref())?
            .store_maybe_address(self.jetton_wallet_address.as_ref())?
            .store_address(&self.admin_address)?;

        let mut vaults = CellBuilder::new();
        vaults
            .store_address(&self.jetton_vault_address)?
            .store_address(&self.native_vault_address)?;

        let mut b = CellBuilder::new();
        b.store_address(&self.vault_address)?
            .store_address(&self.pool_address)?
            .store_bit(self.pool_type.bit())?
            .store_ref(wallets.seal())?
            .store_ref(vaults.seal())?
            .store_ref(self.upgrade.to_cell()?)?;
        Ok(b.seal())
    }

    /// Decode the strategy's data cell.
    pub fn from_cell(cell: &Cell) -> Result<Self> {
        let mut s = cell.parse();
        let vault_address = s.load_address()?;
        let pool_address = s.load_address()?;
        let pool_type = PoolType::from_bit(s.load_bit()?);

        let wallets = s.load_ref()?;
        let mut w = wallets.parse();
        let deposit_lp_wallet_address = w.load_maybe_address()?;
        let jetton_wallet_address = w.load_maybe_address()?;
        let admin_address = w.load_address()?;
        w.end_parse()?;

        let vaults = s.load_ref()?;
        let mut v = vaults.parse();
        let jetton_vault_address = v.load_address()?;
        let native_vault_address = v.load_address()?;
        v.end_parse()?;

        let upgrade = UpgradeSlot::from_cell(&s.load_ref()?)?;
        s.end_parse()?;

        Ok(Self {
            vault_address,
            pool_address,
            pool_type,
            deposit_lp_wallet_address,
            jetton_wallet_address,
            admin_address,
            jetton_vault_address,
            native_vault_address,
            upgrade,
        })
    }
}

/// Options for [`deploy`].
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub code: Cell,
    pub config: StrategyConfig,
    pub query_id: Option<u64>,
    pub value: Option<Coins>,
}

/// Deploy the strategy: state-init plus an `init` body.
pub fn deploy(opts: DeployOptions) -> Result<ContractMessage> {
    let data = opts.config.to_cell()?;
    let body = begin(Opcode::Init, opts.query_id)?.seal();
    Ok(ContractMessage {
        body,
        value: opts.value.unwrap_or(DEPLOY_VALUE),
        state_init: Some(StateInit {
            code: opts.code,
            data,
        }),
    })
}

/// Options for the strategy's single-address setters.
#[derive(Debug, Clone)]
pub struct SetAddressOptions {
    pub address: Address,
    pub query_id: Option<u64>,
    pub value: Option<Coins>,
}

/// Set the strategy's LP jetton wallet.
pub fn set_deposit_lp_wallet_address(opts: SetAddressOptions) -> Result<ContractMessage> {
    let body = address_setter(Opcode::SetDepositLpWalletAddress, &opts.address, opts.query_id)?;
    Ok(ContractMessage::new(body, opts.value.unwrap_or(ADMIN_OP_VALUE)))
}

/// Set the strategy's target-token jetton wallet.
pub fn set_jetton_wallet_address(opts: SetAddressOptions) -> Result<ContractMessage> {
    let body = address_setter(Opcode::SetJettonWalletAddress, &opts.address, opts.query_id)?;
    Ok(ContractMessage::new(body, opts.value.unwrap_or(ADMIN_OP_VALUE)))
}

/// Options for the strategy's [`reinvest`].
#[derive(Debug, Clone)]
pub struct ReinvestOptions {
    pub params: ReinvestParams,
    pub query_id: Option<u64>,
    pub value: Option<Coins>,
}

/// Reinvest sent straight to the strategy (no vault fee fields).
pub fn reinvest(opts: ReinvestOptions) -> Result<ContractMessage> {
    reinvest::build(
        &opts.params,
        None,
        opts.query_id,
        opts.value.unwrap_or(REINVEST_VALUE),
    )
}
