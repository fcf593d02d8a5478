//! Vault state layout and message builders.
//!
//! ## Persistent data
//!
//! ```text
//! distribution_pool_address:MsgAddress
//! shares_total_supply:Coins
//! deposited_lp:Coins
//! is_locked:Bool
//! management_fee_rate:uint32
//! management_fee:Coins
//! deposit_lp_wallet_address:MsgAddress      (none until set)
//! ^[ admin_address manager_address strategy_address ]   (strategy none until set)
//! ^jetton_wallet_code
//! ^upgrade
//! ```
//!
//! `shares_total_supply` and `deposited_lp` define the exchange rate between
//! LP units and share units.

use vaultkit_cell::{Address, Cell, CellBuilder, Coins};

use crate::exit_codes::ExitCode;
use crate::message::{address_setter, begin, ContractMessage, StateInit, UpgradeSlot};
use crate::opcodes::Opcode;
use crate::reinvest::{self, ReinvestFees, ReinvestParams};
use crate::{ProtocolError, Result};

/// Fee-rate denominator used unless configured otherwise.
pub const DEFAULT_MANAGEMENT_FEE_PRECISION: u32 = 10_000;

/// Default value attached to deploy (0.05 native).
pub const DEPLOY_VALUE: Coins = 50_000_000;
/// Default value attached to admin setters.
pub const ADMIN_OP_VALUE: Coins = 50_000_000;
/// Default value attached to a management fee withdrawal.
pub const WITHDRAW_MANAGEMENT_FEE_VALUE: Coins = 100_000_000;
/// Default value attached to a vault reinvest (covers strategy swaps).
pub const REINVEST_VALUE: Coins = 500_000_000;

/// Vault persistent state, as stored and as returned by `get_vault_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Extra-reward distribution pool.
    pub distribution_pool_address: Address,
    /// Shares issued.
    pub shares_total_supply: Coins,
    /// LP held on behalf of share holders.
    pub deposited_lp: Coins,
    /// When set, deposits and withdrawals are refused.
    pub is_locked: bool,
    /// Management fee rate over the configured precision.
    pub management_fee_rate: u32,
    /// Accrued, not yet withdrawn, management fee.
    pub management_fee: Coins,
    /// The vault's own LP jetton wallet.
    pub deposit_lp_wallet_address: Option<Address>,
    /// Admin identity.
    pub admin_address: Address,
    /// Manager identity (collects the management fee).
    pub manager_address: Address,
    /// Strategy that generates yield on the deposited LP.
    pub strategy_address: Option<Address>,
    /// Code of the share wallet contract.
    pub jetton_wallet_code: Cell,
    /// Pending upgrade.
    pub upgrade: UpgradeSlot,
}

impl VaultConfig {
    /// Encode as the vault's data cell.
    pub fn to_cell(&self) -> Result<Cell> {
        let mut roles = CellBuilder::new();
        roles
            .store_address(&self.admin_address)?
            .store_address(&self.manager_address)?
            .store_maybe_address(self.strategy_address.as_ref())?;

        let mut b = CellBuilder::new();
        b.store_address(&self.distribution_pool_address)?
            .store_coins(self.shares_total_supply)?
            .store_coins(self.deposited_lp)?
            .store_bit(self.is_locked)?
            .store_uint(u128::from(self.management_fee_rate), 32)?
            .store_coins(self.management_fee)?
            .store_maybe_address(self.deposit_lp_wallet_address.as_ref())?
            .store_ref(roles.seal())?
            .store_ref(self.jetton_wallet_code.clone())?
            .store_ref(self.upgrade.to_cell()?)?;
        Ok(b.seal())
    }

    /// Decode the vault's data cell.
    pub fn from_cell(cell: &Cell) -> Result<Self> {
        let mut s = cell.parse();
        let distribution_pool_address = s.load_address()?;
        let shares_total_supply = s.load_coins()?;
        let deposited_lp = s.load_coins()?;
        let is_locked = s.load_bit()?;
        let management_fee_rate = s.load_uint(32)? as u32;
        let management_fee = s.load_coins()?;
        let deposit_lp_wallet_address = s.load_maybe_address()?;

        let roles = s.load_ref()?;
        let mut r = roles.parse();
        let admin_address = r.load_address()?;
        let manager_address = r.load_address()?;
        let strategy_address = r.load_maybe_address()?;
        r.end_parse()?;

        let jetton_wallet_code = s.load_ref()?;
        let upgrade = UpgradeSlot::from_cell(&s.load_ref()?)?;
        s.end_parse()?;

        Ok(Self {
            distribution_pool_address,
            shares_total_supply,
            deposited_lp,
            is_locked,
            management_fee_rate,
            management_fee,
            deposit_lp_wallet_address,
            admin_address,
            manager_address,
            strategy_address,
            jetton_wallet_code,
            upgrade,
        })
    }

    /// LP returned for burning `shares`, rounded down.
    pub fn estimate_lp_out(&self, shares: Coins) -> Result<Coins> {
        if self.shares_total_supply == 0 {
            return Ok(0);
        }
        Ok(shares
            .checked_mul(self.deposited_lp)
            .ok_or(ProtocolError::Overflow("estimate_lp_out"))?
            / self.shares_total_supply)
    }

    /// Shares minted for depositing `lp`, rounded down; 1:1 for an empty vault.
    pub fn estimate_shares_out(&self, lp: Coins) -> Result<Coins> {
        if self.shares_total_supply == 0 || self.deposited_lp == 0 {
            return Ok(lp);
        }
        Ok(lp
            .checked_mul(self.shares_total_supply)
            .ok_or(ProtocolError::Overflow("estimate_shares_out"))?
            / self.deposited_lp)
    }

    /// Mirror of the vault's check on a management fee withdrawal.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::WouldReject`] with
    /// [`ExitCode::InsufficientManagementFee`] if `amount` exceeds the accrued fee.
    pub fn check_fee_withdrawal(&self, amount: Coins) -> Result<()> {
        if amount > self.management_fee {
            return Err(ProtocolError::WouldReject(ExitCode::InsufficientManagementFee));
        }
        Ok(())
    }
}

/// Validate a fee rate against the configured precision.
pub fn validate_fee_rate(rate: u32, precision: u32) -> Result<()> {
    if precision == 0 {
        return Err(ProtocolError::InvalidField {
            field: "management_fee_precision",
            reason: "must be positive".to_string(),
        });
    }
    if rate > precision {
        return Err(ProtocolError::WouldReject(ExitCode::FeeRateOutOfBounds));
    }
    Ok(())
}

/// Options for [`deploy`].
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Vault code.
    pub code: Cell,
    /// Initial state.
    pub config: VaultConfig,
    /// Caller query id (default 0).
    pub query_id: Option<u64>,
    /// Attached value (default [`DEPLOY_VALUE`]).
    pub value: Option<Coins>,
}

/// Deploy the vault: state-init plus an `init` body.
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

/// Options for the single-address admin setters.
#[derive(Debug, Clone)]
pub struct SetAddressOptions {
    /// New address.
    pub address: Address,
    /// Caller query id (default 0).
    pub query_id: Option<u64>,
    /// Attached value (default [`ADMIN_OP_VALUE`]).
    pub value: Option<Coins>,
}

/// Point the vault at its strategy.
pub fn set_strategy_address(opts: SetAddressOptions) -> Result<ContractMessage> {
    let body = address_setter(Opcode::SetStrategyAddress, &opts.address, opts.query_id)?;
    Ok(ContractMessage::new(body, opts.value.unwrap_or(ADMIN_OP_VALUE)))
}

/// Set the vault's own LP jetton wallet.
pub fn set_deposit_lp_wallet_address(opts: SetAddressOptions) -> Result<ContractMessage> {
    let body = address_setter(Opcode::SetDepositLpWalletAddress, &opts.address, opts.query_id)?;
    Ok(ContractMessage::new(body, opts.value.unwrap_or(ADMIN_OP_VALUE)))
}

/// Options for [`withdraw_management_fee`].
#[derive(Debug, Clone)]
pub struct WithdrawManagementFeeOptions {
    /// Amount of accrued fee to collect.
    pub amount: Coins,
    /// Where the fee goes.
    pub destination: Address,
    /// Caller query id (default 0).
    pub query_id: Option<u64>,
    /// Attached value (default [`WITHDRAW_MANAGEMENT_FEE_VALUE`]).
    pub value: Option<Coins>,
}

/// Collect accrued management fee.
pub fn withdraw_management_fee(opts: WithdrawManagementFeeOptions) -> Result<ContractMessage> {
    if opts.amount == 0 {
        return Err(ProtocolError::WouldReject(ExitCode::InvalidAmount));
    }
    let mut b = begin(Opcode::WithdrawManagementFee, opts.query_id)?;
    b.store_coins(opts.amount)?.store_address(&opts.destination)?;
    Ok(ContractMessage::new(
        b.seal(),
        opts.value.unwrap_or(WITHDRAW_MANAGEMENT_FEE_VALUE),
    ))
}

/// Options for [`set_is_locked`].
#[derive(Debug, Clone, Default)]
pub struct SetIsLockedOptions {
    /// New lock state.
    pub is_locked: bool,
    /// Caller query id (default 0).
    pub query_id: Option<u64>,
    /// Attached value (default [`ADMIN_OP_VALUE`]).
    pub value: Option<Coins>,
}

/// Lock or unlock deposits and withdrawals.
pub fn set_is_locked(opts: SetIsLockedOptions) -> Result<ContractMessage> {
    let mut b = begin(Opcode::SetIsLocked, opts.query_id)?;
    b.store_bit(opts.is_locked)?;
    Ok(ContractMessage::new(b.seal(), opts.value.unwrap_or(ADMIN_OP_VALUE)))
}

/// Options for [`set_management_fee_rate`].
#[derive(Debug, Clone)]
pub struct SetManagementFeeRateOptions {
    /// New rate over `precision`.
    pub rate: u32,
    /// Rate denominator, normally [`DEFAULT_MANAGEMENT_FEE_PRECISION`].
    pub precision: u32,
    /// Caller query id (default 0).
    pub query_id: Option<u64>,
    /// Attached value (default [`ADMIN_OP_VALUE`]).
    pub value: Option<Coins>,
}

/// Change the management fee rate.
///
/// # Errors
///
/// [`ProtocolError::WouldReject`] with [`ExitCode::FeeRateOutOfBounds`] if
/// `rate > precision`.
pub fn set_management_fee_rate(opts: SetManagementFeeRateOptions) -> Result<ContractMessage> {
    validate_fee_rate(opts.rate, opts.precision)?;
    let mut b = begin(Opcode::SetManagementFeeRate, opts.query_id)?;
    b.store_uint(u128::from(opts.rate), 32)?;
    Ok(ContractMessage::new(b.seal(), opts.value.unwrap_or(ADMIN_OP_VALUE)))
}

/// Options for the vault's [`reinvest`].
#[derive(Debug, Clone)]
pub struct ReinvestOptions {
    /// Swap and target fields.
    pub params: ReinvestParams,
    /// Gas forwarded to the strategy.
    pub fees: ReinvestFees,
    /// Caller query id (default 0).
    pub query_id: Option<u64>,
    /// Attached value (default [`REINVEST_VALUE`]).
    pub value: Option<Coins>,
}

/// Ask the vault to drive a reinvest through its strategy.
pub fn reinvest(opts: ReinvestOptions) -> Result<ContractMessage> {
    reinvest::build(
        &opts.params,
        Some(&opts.fees),
        opts.query_id,
        opts.value.unwrap_or(REINVEST_VALUE),
    )
}
