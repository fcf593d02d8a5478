//! Pro-rata allocation of a period budget.
//!
//! Each holding receives `floor(budget * balance / total_balance)`. Holdings
//! of the same owner are summed after rounding, so an owner listed twice
//! gets the same amount as two separate owners with those balances. Owners
//! whose reward rounds to zero are left out. Whatever the floors leave
//! behind stays undistributed; it is never handed to anyone.
//!
//! ## Bounds
//!
//! - `distributed <= budget`
//! - `budget - distributed < holdings` (one rounding loss per holding at most)

use std::collections::BTreeMap;

use vaultkit_cell::{Address, Coins};
use vaultkit_client::provider::ShareHolder;

use crate::{Result, RewardError};

/// Outcome of splitting one period's budget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Owner to reward, no zero entries.
    pub rewards: BTreeMap<Address, Coins>,
    /// Sum of `rewards`.
    pub distributed: Coins,
    /// `budget - distributed`.
    pub remainder: Coins,
    /// Sum of all holding balances.
    pub total_balance: Coins,
}

impl Allocation {
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Split `budget` over `holders` in proportion to their balances.
///
/// # Errors
///
/// - [`RewardError::Overflow`] if the balances do not sum within `u128`
pub fn allocate(budget: Coins, holders: &[ShareHolder]) -> Result<Allocation> {
    let total_balance = holders
        .iter()
        .try_fold(0u128, |acc, h| acc.checked_add(h.balance))
        .ok_or(RewardError::Overflow("total share balance"))?;

    if total_balance == 0 {
        return Ok(Allocation {
            remainder: budget,
            ..Default::default()
        });
    }

    let mut rewards: BTreeMap<Address, Coins> = BTreeMap::new();
    let mut distributed: Coins = 0;
    for holder in holders {
        // balance <= total_balance, so the quotient never exceeds budget.
        let share = mul_div_floor(budget, holder.balance, total_balance)
            .ok_or(RewardError::Overflow("holder share"))?;
        if share == 0 {
            continue;
        }
        *rewards.entry(holder.owner).or_insert(0) += share;
        distributed += share;
    }

    tracing::debug!(
        holdings = holders.len(),
        recipients = rewards.len(),
        distributed = %distributed,
        remainder = %(budget - distributed),
        "allocated period budget"
    );

    Ok(Allocation {
        rewards,
        distributed,
        remainder: budget - distributed,
        total_balance,
    })
}

/// `floor(a * b / c)` with a 256-bit intermediate; `None` if `c == 0` or the
/// quotient does not fit in `u128`.
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Option<u128> {
    if c == 0 {
        return None;
    }
    let (hi, lo) = widening_mul(a, b);
    if hi == 0 {
        return Some(lo / c);
    }
    if hi >= c {
        return None;
    }
    // Long division of the 256-bit product, one bit at a time.
    let mut rem = hi;
    let mut quotient = 0u128;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quotient |= 1;
        }
    }
    Some(quotient)
}

fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | ((mid & MASK) << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}
