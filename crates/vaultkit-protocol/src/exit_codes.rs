//! Contract exit codes.
//!
//! The vault and strategy abort with one of these codes when a precondition
//! fails. Off-chain code only sees them indirectly, as a failed transaction
//! reported by the ledger, or when a local pre-check mirrors the rule.

use std::fmt;

/// Rejection reason reported by the vault or strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    WrongOp = 80,
    WrongWorkchain = 81,
    InvalidAmount = 82,
    InvalidDepositToken = 83,
    InsufficientGas = 84,
    InvalidCaller = 85,
    ZeroOutput = 86,
    InsufficientLpBalance = 87,
    InsufficientLpAmount = 88,
    InsufficientRewardsBalance = 89,
    InvalidReinvestSender = 90,
    WrongManagerOp = 91,
    InsufficientManagementFee = 92,
    InsufficientSharesBalance = 93,
    FeeRateOutOfBounds = 94,
}

impl ExitCode {
    /// Numeric code as reported by the ledger.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Look up a code; `None` for anything outside 80..=94.
    pub fn from_code(code: i32) -> Option<Self> {
        use ExitCode::*;
        Some(match code {
            80 => WrongOp,
            81 => WrongWorkchain,
            82 => InvalidAmount,
            83 => InvalidDepositToken,
            84 => InsufficientGas,
            85 => InvalidCaller,
            86 => ZeroOutput,
            87 => InsufficientLpBalance,
            88 => InsufficientLpAmount,
            89 => InsufficientRewardsBalance,
            90 => InvalidReinvestSender,
            91 => WrongManagerOp,
            92 => InsufficientManagementFee,
            93 => InsufficientSharesBalance,
            94 => FeeRateOutOfBounds,
            _ => return None,
        })
    }

    /// Human-readable reason.
    pub const fn description(self) -> &'static str {
        match self {
            ExitCode::WrongOp => "wrong op",
            ExitCode::WrongWorkchain => "wrong workchain",
            ExitCode::InvalidAmount => "invalid amount",
            ExitCode::InvalidDepositToken => "invalid deposit token",
            ExitCode::InsufficientGas => "insufficient gas",
            ExitCode::InvalidCaller => "invalid caller",
            ExitCode::ZeroOutput => "zero output",
            ExitCode::InsufficientLpBalance => "insufficient LP balance",
            ExitCode::InsufficientLpAmount => "insufficient LP amount",
            ExitCode::InsufficientRewardsBalance => "insufficient rewards balance",
            ExitCode::InvalidReinvestSender => "invalid reinvest sender",
            ExitCode::WrongManagerOp => "wrong manager op",
            ExitCode::InsufficientManagementFee => "insufficient management fee",
            ExitCode::InsufficientSharesBalance => "insufficient shares balance",
            ExitCode::FeeRateOutOfBounds => "fee rate out of bounds",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Describe a raw exit code, naming it when it is one of ours.
pub fn describe(code: i32) -> String {
    match ExitCode::from_code(code) {
        Some(known) => format!("exit code {code} ({known})"),
        None => format!("exit code {code}"),
    }
}
