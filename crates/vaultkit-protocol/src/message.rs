//! Outbound message bodies and the pieces they share.

use vaultkit_cell::{Address, Cell, CellBuilder, Coins};

use crate::opcodes::Opcode;
use crate::Result;

/// A message body ready to send, plus the native value attached to it.
///
/// Built fresh by one builder call and consumed by one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractMessage {
    /// Sealed body cell.
    pub body: Cell,
    /// Native currency to attach.
    pub value: Coins,
    /// Code and data to deploy with the message, if any.
    pub state_init: Option<StateInit>,
}

impl ContractMessage {
    /// A message without state-init.
    pub fn new(body: Cell, value: Coins) -> Self {
        Self {
            body,
            value,
            state_init: None,
        }
    }
}

/// Initial code and data of a contract.
///
/// ```text
/// split_depth:(Maybe #5)=0 special:(Maybe TickTock)=0
/// code:(Maybe ^Cell)=1 data:(Maybe ^Cell)=1 library:(Maybe ^Cell)=0
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInit {
    /// Contract code.
    pub code: Cell,
    /// Initial persistent data.
    pub data: Cell,
}

impl StateInit {
    /// Encode as a state-init cell.
    pub fn to_cell(&self) -> Result<Cell> {
        let mut b = CellBuilder::new();
        b.store_bit(false)?
            .store_bit(false)?
            .store_maybe_ref(Some(self.code.clone()))?
            .store_maybe_ref(Some(self.data.clone()))?
            .store_bit(false)?;
        Ok(b.seal())
    }

    /// Decode a state-init cell with code and data present.
    pub fn from_cell(cell: &Cell) -> Result<Self> {
        let mut s = cell.parse();
        let split_depth = s.load_bit()?;
        let special = s.load_bit()?;
        if split_depth || special {
            return Err(crate::ProtocolError::InvalidField {
                field: "state_init",
                reason: "split_depth and special are not supported".to_string(),
            });
        }
        let code = s.load_maybe_ref()?;
        let data = s.load_maybe_ref()?;
        let _library = s.load_maybe_ref()?;
        s.end_parse()?;
        match (code, data) {
            (Some(code), Some(data)) => Ok(Self { code, data }),
            _ => Err(crate::ProtocolError::InvalidField {
                field: "state_init",
                reason: "code and data must both be present".to_string(),
            }),
        }
    }

    /// The address a contract with this state-init lives at.
    pub fn address(&self, workchain: i8) -> Result<Address> {
        Ok(Address::new(workchain, self.to_cell()?.hash()))
    }
}

/// Pending code/data upgrade kept in both contracts' state.
///
/// ```text
/// effective_at:uint32 new_code:(Maybe ^Cell) new_data:(Maybe ^Cell)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeSlot {
    /// Unix time after which the upgrade may be applied (0 when empty).
    pub effective_at: u32,
    /// Replacement code.
    pub new_code: Option<Cell>,
    /// Replacement data.
    pub new_data: Option<Cell>,
}

impl UpgradeSlot {
    /// Whether an upgrade is pending.
    pub fn is_pending(&self) -> bool {
        self.new_code.is_some() || self.new_data.is_some()
    }

    /// Encode into its own cell.
    pub fn to_cell(&self) -> Result<Cell> {
        let mut b = CellBuilder::new();
        b.store_uint(u128::from(self.effective_at), 32)?
            .store_maybe_ref(self.new_code.clone())?
            .store_maybe_ref(self.new_data.clone())?;
        Ok(b.seal())
    }

    /// Decode from its own cell.
    pub fn from_cell(cell: &Cell) -> Result<Self> {
        let mut s = cell.parse();
        let effective_at = s.load_uint(32)? as u32;
        let new_code = s.load_maybe_ref()?;
        let new_data = s.load_maybe_ref()?;
        s.end_parse()?;
        Ok(Self {
            effective_at,
            new_code,
            new_data,
        })
    }
}

/// Start a body with `op` and `query_id`.
pub(crate) fn begin(op: Opcode, query_id: Option<u64>) -> Result<CellBuilder> {
    let mut b = CellBuilder::new();
    b.store_uint(u128::from(op.code()), 32)?
        .store_uint(u128::from(query_id.unwrap_or(0)), 64)?;
    tracing::debug!(op = op.name(), query_id = query_id.unwrap_or(0), "building message");
    Ok(b)
}

/// Body of the admin setters that carry a single address.
pub(crate) fn address_setter(
    op: Opcode,
    address: &Address,
    query_id: Option<u64>,
) -> Result<Cell> {
    let mut b = begin(op, query_id)?;
    b.store_address(address)?;
    Ok(b.seal())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::read_header;

    fn code_cell(tag: u32) -> Cell {
        let mut b = CellBuilder::new();
        b.store_uint(u128::from(tag), 32).expect("store");
        b.seal()
    }

    #[test]
    fn test_state_init_roundtrip_and_address() {
        let init = StateInit {
            code: code_cell(1),
            data: code_cell(2),
        };
        let cell = init.to_cell().expect("encode");
        assert_eq!(cell.bit_len(), 5);
        assert_eq!(cell.refs().len(), 2);
        assert_eq!(StateInit::from_cell(&cell).expect("decode"), init);

        let addr = init.address(0).expect("address");
        assert_eq!(addr.hash, cell.hash());
        assert_eq!(addr.workchain, 0);

        let other = StateInit {
            code: code_cell(1),
            data: code_cell(3),
        };
        assert_ne!(other.address(0).expect("address"), addr);
    }

    #[test]
    fn test_upgrade_slot_roundtrip() {
        let empty = UpgradeSlot::default();
        assert!(!empty.is_pending());
        let back = UpgradeSlot::from_cell(&empty.to_cell().expect("encode")).expect("decode");
        assert_eq!(back, empty);

        let pending = UpgradeSlot {
            effective_at: 1_700_000_000,
            new_code: Some(code_cell(9)),
            new_data: None,
        };
        let back = UpgradeSlot::from_cell(&pending.to_cell().expect("encode")).expect("decode");
        assert!(back.is_pending());
        assert_eq!(back, pending);
    }

    #[test]
    fn test_begin_defaults_query_id_to_zero() {
        let body = begin(Opcode::Init, None).expect("begin").seal();
        let header = read_header(&body).expect("header");
        assert_eq!(header.query_id, 0);
        assert_eq!(body.bit_len(), 96);
    }
}
