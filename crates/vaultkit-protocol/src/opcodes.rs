//! Operation tags.
//!
//! Every message body starts with `op: uint32` followed by
//! `query_id: uint64`. The values below must match the on-chain parsers bit
//! for bit.

use vaultkit_cell::Cell;

use crate::{ProtocolError, Result};

// ---------------------------------------------------------------------------
// Jetton standard
// ---------------------------------------------------------------------------

/// Jetton wallet tells its owner about an incoming transfer.
pub const OP_TRANSFER_NOTIFICATION: u32 = 0x7362_d09c;
/// Wallet-to-wallet jetton transfer.
pub const OP_INTERNAL_TRANSFER: u32 = 0x178d_4519;
/// Return of unused gas.
pub const OP_EXCESSES: u32 = 0xd532_76db;
/// Owner asks its jetton wallet to transfer.
pub const OP_TRANSFER: u32 = 0x0f8a_7ea5;
/// Share wallet tells the vault shares were burned.
pub const OP_BURN_NOTIFICATION: u32 = 0x7bdd_97de;

// ---------------------------------------------------------------------------
// Vault and strategy
// ---------------------------------------------------------------------------

/// Forward payload tag of an LP transfer into the vault.
pub const OP_DEPOSIT: u32 = 0x95db_9d39;
/// Holder withdraws shares for LP.
pub const OP_WITHDRAW: u32 = 0xb5de_5f9e;
/// Deploy-time initialisation.
pub const OP_INIT: u32 = 0xc674_e474;
/// Swap toward target balances and redeposit.
pub const OP_REINVEST: u32 = 0x0812_d4e3;
/// Strategy reports a finished reinvest to the vault.
pub const OP_COMPLETE_REINVEST: u32 = 0x9732_80f5;
/// Manager collects the accrued management fee.
pub const OP_WITHDRAW_MANAGEMENT_FEE: u32 = 0xef9e_917b;
/// Admin points the vault at its strategy.
pub const OP_SET_STRATEGY_ADDRESS: u32 = 0xa3d7_611f;
/// Admin changes the management fee rate.
pub const OP_SET_MANAGEMENT_FEE_RATE: u32 = 0xc25f_fa5f;
/// Admin locks or unlocks deposits and withdrawals.
pub const OP_SET_IS_LOCKED: u32 = 0xe2cd_e084;
/// Bounce of a transfer the vault could not accept.
pub const OP_TRANSFER_BOUNCE_INVALID_REQUEST: u32 = 0x1972_7ea8;
/// Admin sets the contract's own LP jetton wallet.
pub const OP_SET_DEPOSIT_LP_WALLET_ADDRESS: u32 = 0x7719_b84f;
/// Admin sets the strategy's target-token jetton wallet.
pub const OP_SET_JETTON_WALLET_ADDRESS: u32 = 0x288b_5223;

// ---------------------------------------------------------------------------
// Distribution pool
// ---------------------------------------------------------------------------

/// Governor publishes one period's extra-reward distribution.
pub const OP_SET_EXTRA_DISTRIBUTION: u32 = 0x5e1d_6c40;

/// Typed view of the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    TransferNotification,
    InternalTransfer,
    Excesses,
    Transfer,
    BurnNotification,
    Deposit,
    Withdraw,
    Init,
    Reinvest,
    CompleteReinvest,
    WithdrawManagementFee,
    SetStrategyAddress,
    SetManagementFeeRate,
    SetIsLocked,
    TransferBounceInvalidRequest,
    SetDepositLpWalletAddress,
    SetJettonWalletAddress,
    SetExtraDistribution,
}

impl Opcode {
    /// Every known opcode.
    pub const ALL: [Opcode; 18] = [
        Opcode::TransferNotification,
        Opcode::InternalTransfer,
        Opcode::Excesses,
        Opcode::Transfer,
        Opcode::BurnNotification,
        Opcode::Deposit,
        Opcode::Withdraw,
        Opcode::Init,
        Opcode::Reinvest,
        Opcode::CompleteReinvest,
        Opcode::WithdrawManagementFee,
        Opcode::SetStrategyAddress,
        Opcode::SetManagementFeeRate,
        Opcode::SetIsLocked,
        Opcode::TransferBounceInvalidRequest,
        Opcode::SetDepositLpWalletAddress,
        Opcode::SetJettonWalletAddress,
        Opcode::SetExtraDistribution,
    ];

    /// The 32-bit tag.
    pub const fn code(self) -> u32 {
        match self {
            Opcode::TransferNotification => OP_TRANSFER_NOTIFICATION,
            Opcode::InternalTransfer => OP_INTERNAL_TRANSFER,
            Opcode::Excesses => OP_EXCESSES,
            Opcode::Transfer => OP_TRANSFER,
            Opcode::BurnNotification => OP_BURN_NOTIFICATION,
            Opcode::Deposit => OP_DEPOSIT,
            Opcode::Withdraw => OP_WITHDRAW,
            Opcode::Init => OP_INIT,
            Opcode::Reinvest => OP_REINVEST,
            Opcode::CompleteReinvest => OP_COMPLETE_REINVEST,
            Opcode::WithdrawManagementFee => OP_WITHDRAW_MANAGEMENT_FEE,
            Opcode::SetStrategyAddress => OP_SET_STRATEGY_ADDRESS,
            Opcode::SetManagementFeeRate => OP_SET_MANAGEMENT_FEE_RATE,
            Opcode::SetIsLocked => OP_SET_IS_LOCKED,
            Opcode::TransferBounceInvalidRequest => OP_TRANSFER_BOUNCE_INVALID_REQUEST,
            Opcode::SetDepositLpWalletAddress => OP_SET_DEPOSIT_LP_WALLET_ADDRESS,
            Opcode::SetJettonWalletAddress => OP_SET_JETTON_WALLET_ADDRESS,
            Opcode::SetExtraDistribution => OP_SET_EXTRA_DISTRIBUTION,
        }
    }

    /// Snake-case name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Opcode::TransferNotification => "transfer_notification",
            Opcode::InternalTransfer => "internal_transfer",
            Opcode::Excesses => "excesses",
            Opcode::Transfer => "transfer",
            Opcode::BurnNotification => "burn_notification",
            Opcode::Deposit => "deposit",
            Opcode::Withdraw => "withdraw",
            Opcode::Init => "init",
            Opcode::Reinvest => "reinvest",
            Opcode::CompleteReinvest => "complete_reinvest",
            Opcode::WithdrawManagementFee => "withdraw_management_fee",
            Opcode::SetStrategyAddress => "set_strategy_address",
            Opcode::SetManagementFeeRate => "set_management_fee_rate",
            Opcode::SetIsLocked => "set_is_locked",
            Opcode::TransferBounceInvalidRequest => "transfer_bounce_invalid_request",
            Opcode::SetDepositLpWalletAddress => "set_deposit_lp_wallet_address",
            Opcode::SetJettonWalletAddress => "set_jetton_wallet_address",
            Opcode::SetExtraDistribution => "set_extra_distribution",
        }
    }
}

impl TryFrom<u32> for Opcode {
    type Error = ProtocolError;

    fn try_from(code: u32) -> Result<Self> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.code() == code)
            .ok_or(ProtocolError::UnknownOpcode(code))
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#010x})", self.name(), self.code())
    }
}

/// The `op` and `query_id` prefix shared by every message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Operation tag.
    pub op: Opcode,
    /// Caller-chosen correlation id.
    pub query_id: u64,
}

/// Read the header of a message body.
///
/// # Errors
///
/// - [`ProtocolError::Cell`] if the body is shorter than 96 bits
/// - [`ProtocolError::UnknownOpcode`] if the tag is not in the table
pub fn read_header(body: &Cell) -> Result<MessageHeader> {
    let mut s = body.parse();
    let code = s.load_uint(32)? as u32;
    let query_id = s.load_uint(64)? as u64;
    Ok(MessageHeader {
        op: Opcode::try_from(code)?,
        query_id,
    })
}
