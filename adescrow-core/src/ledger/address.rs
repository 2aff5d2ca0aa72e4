//! TON account addresses.
//!
//! Accepts the raw form `workchain:hex` and the 48-character user-friendly
//! form (standard or URL-safe base64 of flags, workchain, hash and a
//! CRC16-XMODEM checksum).

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const FRIENDLY_LEN: usize = 48;
const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("malformed address {0:?}")]
    Malformed(String),

    #[error("address {0:?} fails its checksum")]
    Checksum(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TonAddress {
    pub workchain: i8,
    pub hash: [u8; 32],
    /// Whether transfers to this address should bounce on failure. Raw
    /// addresses carry no flag and are treated as bounceable.
    pub bounceable: bool,
}

impl TonAddress {
    pub fn to_raw(&self) -> String {
        let mut out = format!("{}:", self.workchain);
        for byte in self.hash {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    fn parse_raw(s: &str) -> Result<Self, AddressError> {
        let malformed = || AddressError::Malformed(s.to_string());
        let (workchain, hex) = s.split_once(':').ok_or_else(malformed)?;
        let workchain = workchain.parse::<i8>().map_err(|_| malformed())?;
        if hex.len() != 64 || !hex.is_ascii() {
            return Err(malformed());
        }
        let mut hash = [0u8; 32];
        for (i, byte) in hash.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| malformed())?;
        }
        Ok(Self {
            workchain,
            hash,
            bounceable: true,
        })
    }

    fn parse_friendly(s: &str) -> Result<Self, AddressError> {
        let malformed = || AddressError::Malformed(s.to_string());
        let standard = s.replace('-', "+").replace('_', "/");
        let bytes = fast32::base64::RFC4648_NOPAD
            .decode_str(&standard)
            .map_err(|_| malformed())?;
        if bytes.len() != 36 {
            return Err(malformed());
        }
        let checksum = u16::from_be_bytes([bytes[34], bytes[35]]);
        if crc16(&bytes[..34]) != checksum {
            return Err(AddressError::Checksum(s.to_string()));
        }
        let bounceable = match bytes[0] & !TAG_TEST_ONLY {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            _ => return Err(malformed()),
        };
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(Self {
            workchain: bytes[1] as i8,
            hash,
            bounceable,
        })
    }
}

impl FromStr for TonAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains(':') {
            Self::parse_raw(s)
        } else if s.len() == FRIENDLY_LEN {
            Self::parse_friendly(s)
        } else {
            Err(AddressError::Malformed(s.to_string()))
        }
    }
}

impl fmt::Display for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in bytes {
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
