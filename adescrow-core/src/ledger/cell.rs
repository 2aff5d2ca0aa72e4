//! TON cells and their bag-of-cells (BOC) serialization.
//!
//! Only what outgoing wallet messages need: ordinary cells, builders that
//! append bits and references, representation hashes, and single-root BOCs
//! with the CRC32-C trailer `sendBoc` accepts.

use super::address::TonAddress;
use ring::digest;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

pub const MAX_BITS: usize = 1023;
pub const MAX_REFS: usize = 4;

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("cell overflow: {needed} bits requested, {available} left")]
    BitOverflow { needed: usize, available: usize },

    #[error("cell already holds 4 references")]
    RefOverflow,

    #[error("value does not fit in {bits} bits")]
    ValueTooLarge { bits: usize },
}

/// An immutable ordinary cell. Hash and depth are computed once on build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
    hash: [u8; 32],
    depth: u16,
}

impl Cell {
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Data bytes, the last one zero-padded when `bit_len` is not a multiple of 8.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    /// Representation hash, the value wallets sign and addresses derive from.
    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    fn bit(&self, index: usize) -> bool {
        self.data[index / 8] & (0x80 >> (index % 8)) != 0
    }

    fn descriptors(&self) -> [u8; 2] {
        // refs <= 4 and bit_len <= 1023 keep both bytes in range.
        let refs = self.refs.len() as u8;
        let bytes = (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8;
        [refs, bytes]
    }

    /// Data with the completion tag: a single 1 bit after the last data bit.
    fn padded_data(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        if self.bit_len % 8 != 0 {
            data[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        data
    }
}

#[derive(Debug, Default, Clone)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn reserve(&self, bits: usize) -> Result<(), CellError> {
        let available = MAX_BITS - self.bit_len;
        if bits > available {
            return Err(CellError::BitOverflow {
                needed: bits,
                available,
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        self.reserve(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Append the low `bits` bits of `value`, most significant first.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self, CellError> {
        if bits > 64 || (bits < 64 && value >> bits != 0) {
            return Err(CellError::ValueTooLarge { bits });
        }
        self.reserve(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CellError> {
        self.reserve(bytes.len() * 8)?;
        for byte in bytes {
            for i in (0..8).rev() {
                self.push_bit((byte >> i) & 1 == 1);
            }
        }
        Ok(self)
    }

    /// `Grams` / `VarUInteger 16`: a 4-bit byte length, then the value.
    pub fn store_coins(&mut self, amount: u64) -> Result<&mut Self, CellError> {
        let len = (u64::BITS - amount.leading_zeros()).div_ceil(8) as usize;
        self.store_uint(len as u64, 4)?;
        self.store_uint(amount, len * 8)
    }

    /// `addr_none$00`.
    pub fn store_address_none(&mut self) -> Result<&mut Self, CellError> {
        self.store_uint(0, 2)
    }

    /// `addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256`.
    pub fn store_address(&mut self, address: &TonAddress) -> Result<&mut Self, CellError> {
        self.reserve(2 + 1 + 8 + 256)?;
        self.store_uint(0b10, 2)?;
        self.store_bit(false)?;
        self.store_uint(u64::from(address.workchain as u8), 8)?;
        self.store_bytes(&address.hash)
    }

    pub fn store_ref(&mut self, cell: Arc<Cell>) -> Result<&mut Self, CellError> {
        if self.refs.len() >= MAX_REFS {
            return Err(CellError::RefOverflow);
        }
        self.refs.push(cell);
        Ok(self)
    }

    /// Append all bits and references of `cell`.
    pub fn store_cell(&mut self, cell: &Cell) -> Result<&mut Self, CellError> {
        self.reserve(cell.bit_len)?;
        if self.refs.len() + cell.refs.len() > MAX_REFS {
            return Err(CellError::RefOverflow);
        }
        for i in 0..cell.bit_len {
            self.push_bit(cell.bit(i));
        }
        self.refs.extend(cell.refs.iter().cloned());
        Ok(self)
    }

    pub fn build(&self) -> Cell {
        let depth = self
            .refs
            .iter()
            .map(|r| r.depth.saturating_add(1))
            .max()
            .unwrap_or(0);
        let mut cell = Cell {
            data: self.data.clone(),
            bit_len: self.bit_len,
            refs: self.refs.clone(),
            hash: [0; 32],
            depth,
        };
        cell.hash = representation_hash(&cell);
        cell
    }
}

fn representation_hash(cell: &Cell) -> [u8; 32] {
    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(&cell.descriptors());
    ctx.update(&cell.padded_data());
    for r in &cell.refs {
        ctx.update(&r.depth.to_be_bytes());
    }
    for r in &cell.refs {
        ctx.update(&r.hash);
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(ctx.finish().as_ref());
    hash
}

/// Serialize the tree under `root` as a single-root BOC without an index.
pub fn to_boc(root: &Cell, with_crc: bool) -> Vec<u8> {
    // Reverse post-order puts every parent before its children, which the
    // format requires; identical subtrees are stored once.
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    post_order(root, &mut seen, &mut order);
    order.reverse();

    let index: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell.hash, i))
        .collect();
    let size = byte_len(order.len() as u64);

    let mut cells = Vec::new();
    for cell in &order {
        cells.extend_from_slice(&cell.descriptors());
        cells.extend_from_slice(&cell.padded_data());
        for r in &cell.refs {
            let position = index.get(&r.hash).copied().unwrap_or_default();
            write_uint(&mut cells, position as u64, size);
        }
    }
    let offset_size = byte_len(cells.len() as u64);

    let mut out = Vec::with_capacity(6 + 4 * size + offset_size + cells.len() + 4);
    out.extend_from_slice(&BOC_MAGIC);
    // has_idx:0 has_crc32c has_cache_bits:0 flags:00 size:3
    out.push((u8::from(with_crc) << 6) | size as u8);
    out.push(offset_size as u8);
    write_uint(&mut out, order.len() as u64, size);
    write_uint(&mut out, 1, size);
    write_uint(&mut out, 0, size);
    write_uint(&mut out, cells.len() as u64, offset_size);
    write_uint(&mut out, 0, size);
    out.extend_from_slice(&cells);
    if with_crc {
        let crc = crc32c(&out);
        out.extend_from_slice(&crc.to_le_bytes());
    }
    out
}

fn post_order<'a>(cell: &'a Cell, seen: &mut HashSet<[u8; 32]>, order: &mut Vec<&'a Cell>) {
    if !seen.insert(cell.hash) {
        return;
    }
    for r in &cell.refs {
        post_order(r, seen, order);
    }
    order.push(cell);
}

/// Bytes needed to hold `value`, at least one.
fn byte_len(value: u64) -> usize {
    ((u64::BITS - value.leading_zeros()).div_ceil(8) as usize).max(1)
}

fn write_uint(out: &mut Vec<u8>, value: u64, bytes: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - bytes..]);
}

fn crc32c(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in bytes {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0x82F6_3B78 & mask);
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(bytes: &[u8]) -> String {
        fast32::base64::RFC4648.encode(bytes)
    }

    #[test]
    fn test_empty_cell_hash() {
        let cell = CellBuilder::new().build();
        assert_eq!(
            cell.hash(),
            &[
                0x96, 0xa2, 0x96, 0xd2, 0x24, 0xf2, 0x85, 0xc6, 0x7b, 0xee, 0x93, 0xc3, 0x0f,
                0x8a, 0x30, 0x91, 0x57, 0xf0, 0xda, 0xa3, 0x5d, 0xc5, 0xb8, 0x7e, 0x41, 0x0b,
                0x78, 0x63, 0x0a, 0x09, 0xcf, 0xc7,
            ]
        );
        assert_eq!(cell.depth(), 0);
    }

    #[test]
    fn test_empty_cell_boc_matches_reference_encoding() {
        let cell = CellBuilder::new().build();
        assert_eq!(b64(&to_boc(&cell, true)), "te6cckEBAQEAAgAAAEysuc0=");
        assert_eq!(b64(&to_boc(&cell, false)), "te6ccgEBAQEAAgAAAA==");
    }

    #[test]
    fn test_crc32c_check_value() {
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
    }

    #[test]
    fn test_partial_byte_gets_completion_tag() {
        let mut b = CellBuilder::new();
        b.store_uint(0b101, 3).unwrap();
        let cell = b.build();
        assert_eq!(cell.bit_len(), 3);
        assert_eq!(cell.descriptors(), [0, 1]);
        assert_eq!(cell.padded_data(), vec![0b1011_0000]);
    }

    #[test]
    fn test_coins_use_minimal_length() {
        let mut b = CellBuilder::new();
        b.store_coins(0).unwrap();
        assert_eq!(b.build().bit_len(), 4);

        let mut b = CellBuilder::new();
        b.store_coins(1_000_000_000).unwrap();
        let cell = b.build();
        // 0x3B9ACA00 needs four bytes.
        assert_eq!(cell.bit_len(), 4 + 32);
        assert_eq!(cell.data(), &[0x43, 0xb9, 0xac, 0xa0, 0x00]);
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut b = CellBuilder::new();
        b.store_bytes(&[0u8; 127]).unwrap();
        let err = b.store_uint(0, 8).unwrap_err();
        assert_eq!(
            err,
            CellError::BitOverflow {
                needed: 8,
                available: 7
            }
        );
        assert!(matches!(
            CellBuilder::new().store_uint(4, 2),
            Err(CellError::ValueTooLarge { bits: 2 })
        ));

        let leaf = Arc::new(CellBuilder::new().build());
        let mut b = CellBuilder::new();
        for _ in 0..MAX_REFS {
            b.store_ref(leaf.clone()).unwrap();
        }
        assert!(matches!(b.store_ref(leaf), Err(CellError::RefOverflow)));
    }

    #[test]
    fn test_boc_orders_parents_first_and_shares_subtrees() {
        let leaf = {
            let mut b = CellBuilder::new();
            b.store_uint(0xAB, 8).unwrap();
            Arc::new(b.build())
        };
        let mut root = CellBuilder::new();
        root.store_uint(1, 1)
            .unwrap()
            .store_ref(leaf.clone())
            .unwrap()
            .store_ref(leaf.clone())
            .unwrap();
        let root = root.build();
        assert_eq!(root.depth(), 1);

        let boc = to_boc(&root, false);
        assert_eq!(&boc[..4], &BOC_MAGIC);
        // size 1, offsets 1, two distinct cells, one root, none absent.
        assert_eq!(&boc[4..9], &[0x01, 0x01, 0x02, 0x01, 0x00]);
        // root: d1=2 refs, d2=1, data 0b1100_0000, refs to cell 1 twice.
        // leaf: d1=0, d2=2, data 0xAB.
        assert_eq!(&boc[9..], &[8, 0, 2, 1, 0xC0, 1, 1, 0, 2, 0xAB]);
    }
}
