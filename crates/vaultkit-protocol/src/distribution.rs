//! Distribution pool payload and funding transfer.
//!
//! ```text
//! set_extra_distribution#5e1d6c40 query_id:uint64 period:uint64
//!     total:Coins count:uint32 entries:^EntryChain
//!
//! EntryChain: (recipient:MsgAddress amount:Coins){1,2} next:(Maybe ^EntryChain)
//! ```
//!
//! Entries are written in address order, two per cell. A pair takes
//! 267 + 124 bits at most, so two pairs and the `next` bit always fit.

use std::collections::BTreeMap;

use vaultkit_cell::{Address, Cell, CellBuilder, Coins, MAX_COINS_EXCLUSIVE};

use crate::message::{begin, ContractMessage};
use crate::opcodes::{read_header, Opcode};
use crate::{ProtocolError, Result};

/// Recipients per chain cell.
pub const ENTRIES_PER_CELL: usize = 2;
/// Default value attached to `set_extra_distribution`.
pub const SET_DISTRIBUTION_VALUE: Coins = 100_000_000;

/// Distribution pool state as returned by `get_extra_reward_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraRewardState {
    /// Token wallet the pool pays rewards from; funding goes here.
    pub reward_wallet: Address,
    /// Total ever funded.
    pub total_funded: Coins,
    /// Total ever distributed.
    pub total_distributed: Coins,
}

impl ExtraRewardState {
    /// Funded but not yet distributed.
    pub fn undistributed(&self) -> Coins {
        self.total_funded.saturating_sub(self.total_distributed)
    }
}

/// Options for [`set_extra_distribution`].
#[derive(Debug, Clone)]
pub struct ExtraDistributionOptions<'a> {
    /// Period number the distribution belongs to.
    pub period: u64,
    /// Recipient to amount; must be non-empty with no zero amounts.
    pub entries: &'a BTreeMap<Address, Coins>,
    /// Query id echoed by the pool (default 0).
    pub query_id: Option<u64>,
    /// Attached value (default [`SET_DISTRIBUTION_VALUE`]).
    pub value: Option<Coins>,
}

/// A decoded `set_extra_distribution` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraDistribution {
    /// Query id from the header.
    pub query_id: u64,
    /// Period the distribution belongs to.
    pub period: u64,
    /// Sum of all entries.
    pub total: Coins,
    /// Recipient to amount.
    pub entries: BTreeMap<Address, Coins>,
}

/// Publish one period's distribution to the pool.
///
/// # Errors
///
/// - [`ProtocolError::InvalidField`] for an empty map or a zero amount
/// - [`ProtocolError::Overflow`] if the amounts do not sum within the coins range
pub fn set_extra_distribution(opts: ExtraDistributionOptions<'_>) -> Result<ContractMessage> {
    if opts.entries.is_empty() {
        return Err(ProtocolError::InvalidField {
            field: "entries",
            reason: "distribution map is empty".to_string(),
        });
    }
    let mut total: Coins = 0;
    for (recipient, amount) in opts.entries {
        if *amount == 0 {
            return Err(ProtocolError::InvalidField {
                field: "entries",
                reason: format!("zero amount for {recipient}"),
            });
        }
        total = total
            .checked_add(*amount)
            .filter(|t| *t < MAX_COINS_EXCLUSIVE)
            .ok_or(ProtocolError::Overflow("distribution total"))?;
    }
    let count = u32::try_from(opts.entries.len()).map_err(|_| ProtocolError::InvalidField {
        field: "entries",
        reason: "more than u32::MAX recipients".to_string(),
    })?;

    let chain = encode_entries(opts.entries)?;
    let mut b = begin(Opcode::SetExtraDistribution, opts.query_id)?;
    b.store_uint(u128::from(opts.period), 64)?
        .store_coins(total)?
        .store_uint(u128::from(count), 32)?
        .store_ref(chain)?;
    tracing::debug!(period = opts.period, count, total = %total, "encoded distribution");
    Ok(ContractMessage::new(
        b.seal(),
        opts.value.unwrap_or(SET_DISTRIBUTION_VALUE),
    ))
}

fn encode_entries(entries: &BTreeMap<Address, Coins>) -> Result<Cell> {
    let pairs: Vec<(&Address, &Coins)> = entries.iter().collect();
    let mut next: Option<Cell> = None;
    // Build from the tail so each cell can take its successor as a ref.
    for chunk in pairs.chunks(ENTRIES_PER_CELL).rev() {
        let mut b = CellBuilder::new();
        for (recipient, amount) in chunk {
            b.store_address(recipient)?.store_coins(**amount)?;
        }
        b.store_maybe_ref(next.take())?;
        next = Some(b.seal());
    }
    next.ok_or_else(|| ProtocolError::InvalidField {
        field: "entries",
        reason: "distribution map is empty".to_string(),
    })
}

/// Walk an entry chain of `count` recipients.
pub fn decode_entries(head: &Cell, count: u32) -> Result<BTreeMap<Address, Coins>> {
    let mut entries = BTreeMap::new();
    let mut remaining = count as usize;
    let mut current = Some(head.clone());
    while let Some(cell) = current {
        let mut s = cell.parse();
        let here = remaining.min(ENTRIES_PER_CELL);
        for _ in 0..here {
            let recipient = s.load_address()?;
            let amount = s.load_coins()?;
            if entries.insert(recipient, amount).is_some() {
                return Err(ProtocolError::InvalidField {
                    field: "entries",
                    reason: format!("duplicate recipient {recipient}"),
                });
            }
        }
        remaining -= here;
        current = s.load_maybe_ref()?;
        s.end_parse()?;
    }
    if remaining != 0 {
        return Err(ProtocolError::InvalidField {
            field: "count",
            reason: format!("chain ended {remaining} entries short"),
        });
    }
    Ok(entries)
}

/// Decode a full `set_extra_distribution` body, checking count and total.
pub fn decode_extra_distribution(body: &Cell) -> Result<ExtraDistribution> {
    let header = read_header(body)?;
    if header.op != Opcode::SetExtraDistribution {
        return Err(ProtocolError::UnknownOpcode(header.op.code()));
    }
    let mut s = body.parse();
    s.load_uint(96)?;
    let period = s.load_uint(64)? as u64;
    let total = s.load_coins()?;
    let count = s.load_uint(32)? as u32;
    let entries = decode_entries(&s.load_ref()?, count)?;
    s.end_parse()?;

    let sum = entries
        .values()
        .try_fold(0u128, |acc, v| acc.checked_add(*v))
        .ok_or(ProtocolError::Overflow("distribution total"))?;
    if sum != total {
        return Err(ProtocolError::InvalidField {
            field: "total",
            reason: format!("header says {total}, entries sum to {sum}"),
        });
    }
    Ok(ExtraDistribution {
        query_id: header.query_id,
        period,
        total,
        entries,
    })
}

/// Plain value transfer funding the pool's reward wallet with
/// `budget + fee_margin`.
pub fn funding_transfer(budget: Coins, fee_margin: Coins) -> Result<ContractMessage> {
    let value = budget
        .checked_add(fee_margin)
        .filter(|v| *v < MAX_COINS_EXCLUSIVE)
        .ok_or(ProtocolError::Overflow("funding value"))?;
    Ok(ContractMessage::new(Cell::empty(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new(0, [n; 32])
    }

    fn map(pairs: &[(u8, Coins)]) -> BTreeMap<Address, Coins> {
        pairs.iter().map(|(n, v)| (addr(*n), *v)).collect()
    }

    #[test]
    fn test_distribution_body_decodes() {
        let entries = map(&[(1, 300), (2, 700), (3, 5)]);
        let msg = set_extra_distribution(ExtraDistributionOptions {
            period: 19_700,
            entries: &entries,
            query_id: None,
            value: None,
        })
        .expect("build");
        assert_eq!(msg.value, SET_DISTRIBUTION_VALUE);

        let decoded = decode_extra_distribution(&msg.body).expect("decode");
        assert_eq!(decoded.period, 19_700);
        assert_eq!(decoded.total, 1_005);
        assert_eq!(decoded.query_id, 0);
        assert_eq!(decoded.entries, entries);
    }

    #[test]
    fn test_chain_packs_two_per_cell() {
        let entries = map(&[(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);
        let head = encode_entries(&entries).expect("encode");
        // 5 entries -> 3 cells, depth 2 below the head.
        assert_eq!(head.depth(), 2);
        assert_eq!(head.refs().len(), 1);
        let tail = &head.refs()[0].refs()[0];
        assert!(tail.refs().is_empty());
        assert_eq!(decode_entries(&head, 5).expect("decode"), entries);
    }

    #[test]
    fn test_widest_pair_fits() {
        let max = MAX_COINS_EXCLUSIVE - 1;
        let entries = map(&[(1, max)]);
        set_extra_distribution(ExtraDistributionOptions {
            period: 1,
            entries: &entries,
            query_id: None,
            value: None,
        })
        .expect("single max entry");
        let head = encode_entries(&map(&[(1, max), (2, max)])).expect("two wide pairs fit");
        assert_eq!(head.bit_len(), 2 * (267 + 124) + 1);
    }

    #[test]
    fn test_empty_and_zero_rejected() {
        let empty = BTreeMap::new();
        assert!(matches!(
            set_extra_distribution(ExtraDistributionOptions {
                period: 1,
                entries: &empty,
                query_id: None,
                value: None,
            }),
            Err(ProtocolError::InvalidField { field: "entries", .. })
        ));
        let zero = map(&[(1, 0)]);
        assert!(set_extra_distribution(ExtraDistributionOptions {
            period: 1,
            entries: &zero,
            query_id: None,
            value: None,
        })
        .is_err());
    }

    #[test]
    fn test_total_overflow_rejected() {
        let half = MAX_COINS_EXCLUSIVE / 2;
        let entries = map(&[(1, half), (2, half)]);
        assert_eq!(
            set_extra_distribution(ExtraDistributionOptions {
                period: 1,
                entries: &entries,
                query_id: None,
                value: None,
            })
            .expect_err("overflow"),
            ProtocolError::Overflow("distribution total")
        );
    }

    #[test]
    fn test_short_chain_rejected() {
        let head = encode_entries(&map(&[(1, 1)])).expect("encode");
        assert!(decode_entries(&head, 3).is_err());
    }

    #[test]
    fn test_funding_transfer() {
        let msg = funding_transfer(1_000, 50).expect("funding");
        assert_eq!(msg.value, 1_050);
        assert!(msg.body.is_empty());
        assert!(msg.state_init.is_none());
        assert!(funding_transfer(MAX_COINS_EXCLUSIVE - 1, 1).is_err());
    }

    #[test]
    fn test_undistributed() {
        let state = ExtraRewardState {
            reward_wallet: addr(9),
            total_funded: 100,
            total_distributed: 40,
        };
        assert_eq!(state.undistributed(), 60);
    }
}
