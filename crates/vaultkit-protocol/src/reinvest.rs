//! Reinvest parameters.
//!
//! The opcode and query id stay in the root of the body; every other field
//! goes into one child cell because the contracts read them from a ref:
//!
//! ```text
//! body:    op:uint32 query_id:uint64 ^params
//! params:  amount:Coins limit:Coins deadline:uint32
//!          ton_target_balance:Coins jetton_target_balance:Coins
//!          [deposit_fee:Coins deposit_fwd_fee:Coins transfer_fee:Coins]   (vault only)
//! ```
//!
//! At the widest coins encoding the vault variant takes 7 * 124 + 32 = 900
//! bits, so the params cell has no room for another full-width amount.

use vaultkit_cell::{Cell, CellBuilder, Coins};

use crate::message::{begin, ContractMessage};
use crate::opcodes::Opcode;
use crate::Result;

/// Swap and target fields common to vault and strategy reinvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReinvestParams {
    /// Amount to swap.
    pub amount: Coins,
    /// Minimum swap output (slippage limit).
    pub limit: Coins,
    /// Unix time after which the swap must not execute.
    pub deadline: u32,
    /// Native balance the strategy should end with.
    pub ton_target_balance: Coins,
    /// Target-token balance the strategy should end with.
    pub jetton_target_balance: Coins,
}

/// Gas components the vault forwards to its strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReinvestFees {
    /// Fee for the LP deposit.
    pub deposit_fee: Coins,
    /// Forward fee for the LP deposit.
    pub deposit_fwd_fee: Coins,
    /// Fee for the jetton transfer.
    pub transfer_fee: Coins,
}

/// Builder holding the encoded params, before sealing.
///
/// Exposed so callers can check how much room is left.
pub fn params_builder(params: &ReinvestParams, fees: Option<&ReinvestFees>) -> Result<CellBuilder> {
    let mut b = CellBuilder::new();
    b.store_coins(params.amount)?
        .store_coins(params.limit)?
        .store_uint(u128::from(params.deadline), 32)?
        .store_coins(params.ton_target_balance)?
        .store_coins(params.jetton_target_balance)?;
    if let Some(fees) = fees {
        b.store_coins(fees.deposit_fee)?
            .store_coins(fees.deposit_fwd_fee)?
            .store_coins(fees.transfer_fee)?;
    }
    Ok(b)
}

/// Decode a params cell; fees are present when bits remain after the common fields.
pub fn decode_params(cell: &Cell) -> Result<(ReinvestParams, Option<ReinvestFees>)> {
    let mut s = cell.parse();
    let params = ReinvestParams {
        amount: s.load_coins()?,
        limit: s.load_coins()?,
        deadline: s.load_uint(32)? as u32,
        ton_target_balance: s.load_coins()?,
        jetton_target_balance: s.load_coins()?,
    };
    let fees = if s.remaining_bits() > 0 {
        Some(ReinvestFees {
            deposit_fee: s.load_coins()?,
            deposit_fwd_fee: s.load_coins()?,
            transfer_fee: s.load_coins()?,
        })
    } else {
        None
    };
    s.end_parse()?;
    Ok((params, fees))
}

/// Build a reinvest message with the params nested in one ref.
pub(crate) fn build(
    params: &ReinvestParams,
    fees: Option<&ReinvestFees>,
    query_id: Option<u64>,
    value: Coins,
) -> Result<ContractMessage> {
    let nested = params_builder(params, fees)?.seal();
    let mut b = begin(Opcode::Reinvest, query_id)?;
    b.store_ref(nested)?;
    Ok(ContractMessage::new(b.seal(), value))
}
