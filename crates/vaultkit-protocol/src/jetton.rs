//! Jetton-side messages: depositing LP into the vault and withdrawing shares.
//!
//! A deposit is a standard jetton `transfer` sent by the depositor to their
//! own LP wallet. The wallet forwards the LP to the vault, and the vault
//! recognises the deposit by the `deposit` tag at the start of the forward
//! payload:
//!
//! ```text
//! transfer#0f8a7ea5 query_id:uint64 amount:Coins destination:MsgAddress
//!                   response_destination:MsgAddress custom_payload:(Maybe ^Cell)
//!                   forward_ton_amount:Coins forward_payload:(Either Cell ^Cell)
//! ```
//!
//! The forward payload always goes in a ref (`Either` bit = 1).

use vaultkit_cell::{Address, Coins};

use crate::exit_codes::ExitCode;
use crate::message::{begin, ContractMessage};
use crate::opcodes::Opcode;
use crate::{ProtocolError, Result};

/// Gas forwarded with the notification to the vault.
pub const DEPOSIT_FORWARD_TON: Coins = 200_000_000;
/// Default value attached to the transfer (covers the forward amount and wallet gas).
pub const DEPOSIT_VALUE: Coins = 300_000_000;
/// Default value attached to a share withdraw.
pub const WITHDRAW_VALUE: Coins = 300_000_000;

/// Options for [`deposit_notify`].
#[derive(Debug, Clone)]
pub struct DepositOptions {
    /// LP to deposit.
    pub amount: Coins,
    /// The vault receiving the LP.
    pub vault: Address,
    /// Where excess gas returns, normally the depositor.
    pub response_destination: Address,
    /// Native amount forwarded to the vault (default [`DEPOSIT_FORWARD_TON`]).
    pub forward_ton_amount: Option<Coins>,
    pub query_id: Option<u64>,
    /// Attached value (default [`DEPOSIT_VALUE`]).
    pub value: Option<Coins>,
}

/// Transfer LP to the vault with a `deposit` forward payload.
///
/// Send the result to the depositor's LP jetton wallet.
pub fn deposit_notify(opts: DepositOptions) -> Result<ContractMessage> {
    if opts.amount == 0 {
        return Err(ProtocolError::WouldReject(ExitCode::InvalidAmount));
    }
    let forward_ton = opts.forward_ton_amount.unwrap_or(DEPOSIT_FORWARD_TON);
    let value = opts.value.unwrap_or(DEPOSIT_VALUE);
    if value <= forward_ton {
        return Err(ProtocolError::WouldReject(ExitCode::InsufficientGas));
    }

    let payload = begin(Opcode::Deposit, opts.query_id)?.seal();

    let mut b = begin(Opcode::Transfer, opts.query_id)?;
    b.store_coins(opts.amount)?
        .store_address(&opts.vault)?
        .store_address(&opts.response_destination)?
        .store_maybe_ref(None)?
        .store_coins(forward_ton)?
        .store_bit(true)?
        .store_ref(payload)?;
    Ok(ContractMessage::new(b.seal(), value))
}

/// Options for [`withdraw`].
#[derive(Debug, Clone)]
pub struct WithdrawOptions {
    /// Shares to burn.
    pub shares: Coins,
    /// Where the LP and excess gas go.
    pub response_destination: Address,
    pub query_id: Option<u64>,
    /// Attached value (default [`WITHDRAW_VALUE`]).
    pub value: Option<Coins>,
}

/// Burn shares for LP.
///
/// Send the result to the holder's share wallet.
pub fn withdraw(opts: WithdrawOptions) -> Result<ContractMessage> {
    if opts.shares == 0 {
        return Err(ProtocolError::WouldReject(ExitCode::InvalidAmount));
    }
    let mut b = begin(Opcode::Withdraw, opts.query_id)?;
    b.store_coins(opts.shares)?
        .store_address(&opts.response_destination)?;
    Ok(ContractMessage::new(b.seal(), opts.value.unwrap_or(WITHDRAW_VALUE)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::{read_header, OP_DEPOSIT, OP_TRANSFER};

    fn deposit_opts() -> DepositOptions {
        DepositOptions {
            amount: 1_000,
            vault: Address::new(0, [0xAA; 32]),
            response_destination: Address::new(0, [0xBB; 32]),
            forward_ton_amount: None,
            query_id: None,
            value: None,
        }
    }

    #[test]
    fn test_deposit_transfer_layout() {
        let msg = deposit_notify(deposit_opts()).expect("build");
        assert_eq!(msg.value, DEPOSIT_VALUE);

        let mut s = msg.body.parse();
        assert_eq!(s.load_uint(32).expect("op") as u32, OP_TRANSFER);
        assert_eq!(s.load_uint(64).expect("qid"), 0);
        assert_eq!(s.load_coins().expect("amount"), 1_000);
        assert_eq!(s.load_address().expect("dest"), Address::new(0, [0xAA; 32]));
        assert_eq!(s.load_address().expect("resp"), Address::new(0, [0xBB; 32]));
        assert_eq!(s.load_maybe_ref().expect("custom"), None);
        assert_eq!(s.load_coins().expect("fwd"), DEPOSIT_FORWARD_TON);
        assert!(s.load_bit().expect("either"));
        let payload = s.load_ref().expect("payload");
        s.end_parse().expect("consumed");

        let mut p = payload.parse();
        assert_eq!(p.load_uint(32).expect("op") as u32, OP_DEPOSIT);
    }

    #[test]
    fn test_deposit_rejects_zero_and_underfunded() {
        let mut zero = deposit_opts();
        zero.amount = 0;
        assert_eq!(
            deposit_notify(zero).expect_err("zero"),
            ProtocolError::WouldReject(ExitCode::InvalidAmount)
        );

        let mut underfunded = deposit_opts();
        underfunded.value = Some(DEPOSIT_FORWARD_TON);
        assert_eq!(
            deposit_notify(underfunded).expect_err("gas"),
            ProtocolError::WouldReject(ExitCode::InsufficientGas)
        );
    }

    #[test]
    fn test_withdraw_layout() {
        let dest = Address::new(0, [0xCC; 32]);
        let msg = withdraw(WithdrawOptions {
            shares: 55,
            response_destination: dest,
            query_id: Some(9),
            value: None,
        })
        .expect("build");
        let header = read_header(&msg.body).expect("header");
        assert_eq!(header.op, Opcode::Withdraw);
        assert_eq!(header.query_id, 9);

        let mut s = msg.body.parse();
        s.load_uint(96).expect("header");
        assert_eq!(s.load_coins().expect("shares"), 55);
        assert_eq!(s.load_address().expect("dest"), dest);
        s.end_parse().expect("consumed");
    }
}
