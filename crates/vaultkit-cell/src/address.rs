//! Account addresses.
//!
//! An address is a signed 8-bit workchain id plus a 256-bit account hash.
//!
//! ## Textual forms
//!
//! ```text
//! raw:       0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8
//! friendly:  EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N   (36 bytes, base64url)
//!
//! friendly = tag(1) || workchain(1) || hash(32) || crc16_xmodem(34 bytes)(2, BE)
//! tag      = 0x11 bounceable | 0x51 non-bounceable, +0x80 for testnet-only
//! ```
//!
//! [`Display`](std::fmt::Display) renders the raw form, which is also what
//! submission keys and serde use.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{CellError, Result};

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TESTNET: u8 = 0x80;

/// A standard account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    /// Workchain id (0 for basechain, -1 for masterchain).
    pub workchain: i8,
    /// Account id: hash of the contract's initial state.
    pub hash: [u8; 32],
}

impl Address {
    /// Create an address from its parts.
    pub const fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// Render the user-friendly base64url form.
    pub fn to_friendly(&self, bounceable: bool, testnet: bool) -> String {
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if testnet {
            tag |= TAG_TESTNET;
        }
        let mut bytes = Vec::with_capacity(36);
        bytes.push(tag);
        bytes.push(self.workchain as u8);
        bytes.extend_from_slice(&self.hash);
        let crc = crc16(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());
        URL_SAFE.encode(bytes)
    }

    /// Parse the raw `<workchain>:<hex>` form.
    pub fn from_raw(s: &str) -> Result<Self> {
        let (wc, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| CellError::InvalidAddress(format!("missing ':' in {s:?}")))?;
        let workchain: i8 = wc
            .parse()
            .map_err(|e| CellError::InvalidAddress(format!("bad workchain {wc:?}: {e}")))?;
        let bytes = hex::decode(hash_hex)
            .map_err(|e| CellError::InvalidAddress(format!("bad hash hex: {e}")))?;
        let hash: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            CellError::InvalidAddress(format!("hash must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self::new(workchain, hash))
    }

    /// Parse the 48-character friendly form (base64 or base64url).
    pub fn from_friendly(s: &str) -> Result<Self> {
        let bytes = URL_SAFE
            .decode(s)
            .or_else(|_| STANDARD.decode(s))
            .map_err(|e| CellError::InvalidAddress(format!("bad base64: {e}")))?;
        if bytes.len() != 36 {
            return Err(CellError::InvalidAddress(format!(
                "friendly address must be 36 bytes, got {}",
                bytes.len()
            )));
        }
        let tag = bytes[0] & !TAG_TESTNET;
        if tag != TAG_BOUNCEABLE && tag != TAG_NON_BOUNCEABLE {
            return Err(CellError::InvalidAddress(format!("unknown tag {:#04x}", bytes[0])));
        }
        let expected = u16::from_be_bytes([bytes[34], bytes[35]]);
        if crc16(&bytes[..34]) != expected {
            return Err(CellError::InvalidAddress("checksum mismatch".to_string()));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(Self::new(bytes[1] as i8, hash))
    }
}

impl FromStr for Address {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self> {
        if s.contains(':') {
            Self::from_raw(s)
        } else {
            Self::from_friendly(s)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.hash))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// CRC16-XMODEM (poly 0x1021, init 0).
fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
