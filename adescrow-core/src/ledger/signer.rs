//! Transfer signing.
//!
//! The engine only needs "turn a transfer into a broadcastable message";
//! the wallet contract specifics live behind [`TransferSigner`].
//!
//! [`Ed25519TransferSigner`] drives a v4r2 wallet. It derives its key the
//! way TON wallets do from a 24-word mnemonic, builds the wallet's external
//! message around one internal transfer and serializes it as a BOC for
//! `sendBoc`. No state init is attached, so the wallet must already be
//! deployed.

use super::address::TonAddress;
use super::cell::{Cell, CellBuilder, MAX_BITS, to_boc};
use super::{LedgerError, SignedTransfer};
use adescrow_sdk::objects::WalletScheme;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Default subwallet id of v4r2 wallets on the basechain.
pub const DEFAULT_WALLET_ID: u32 = 698_983_191;
/// How long a signed transfer stays valid.
pub const TRANSFER_TTL_SECS: u32 = 60;

const MNEMONIC_WORDS: usize = 24;
const SEED_SALT: &[u8] = b"TON default seed";
const SEED_ROUNDS: u32 = 100_000;

/// v4r2 `op` for a plain send of the attached messages.
const OP_SIMPLE_SEND: u64 = 0;
/// Pay transfer fees separately from the value and ignore action errors.
const SEND_MODE: u64 = 3;
/// Text comments start with a zero 32-bit opcode.
const COMMENT_PREFIX_BITS: usize = 32;

/// An outgoing transfer before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest<'a> {
    pub destination: &'a str,
    pub amount_nano: u64,
    pub seqno: u32,
    pub memo: &'a str,
}

pub trait TransferSigner: Send + Sync {
    /// Address of the wallet the signer controls. Its sequence number is
    /// what [`TransferRequest::seqno`] must carry.
    fn wallet_address(&self) -> &str;

    /// Ed25519 public key the wallet contract must hold.
    fn public_key(&self) -> [u8; 32];

    fn sign(&self, transfer: &TransferRequest<'_>) -> Result<SignedTransfer, LedgerError>;
}

pub struct Ed25519TransferSigner {
    key_pair: Ed25519KeyPair,
    public_key: [u8; 32],
    wallet_address: String,
    wallet: TonAddress,
    wallet_id: u32,
}

impl std::fmt::Debug for Ed25519TransferSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519TransferSigner")
            .field("wallet_address", &self.wallet_address)
            .field("wallet_id", &self.wallet_id)
            .finish_non_exhaustive()
    }
}

impl Ed25519TransferSigner {
    pub fn from_seed(
        seed: &[u8; 32],
        wallet_address: impl Into<String>,
        wallet_id: u32,
    ) -> Result<Self, LedgerError> {
        let wallet_address = wallet_address.into();
        let wallet: TonAddress = wallet_address.parse().map_err(|e| {
            LedgerError::Configuration(format!("invalid payout wallet address: {e}"))
        })?;
        let key_pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|_| LedgerError::Configuration("invalid Ed25519 seed".to_string()))?;
        let public_key = <[u8; 32]>::try_from(key_pair.public_key().as_ref())
            .map_err(|_| LedgerError::Configuration("unexpected public key length".to_string()))?;
        Ok(Self {
            key_pair,
            public_key,
            wallet_address,
            wallet,
            wallet_id,
        })
    }

    /// Derive the signing key from a space-separated 24-word mnemonic.
    ///
    /// Only [`WalletScheme::V4r2`] is supported.
    pub fn from_mnemonic(
        mnemonic: &str,
        scheme: WalletScheme,
        wallet_address: impl Into<String>,
        wallet_id: Option<u32>,
    ) -> Result<Self, LedgerError> {
        if scheme != WalletScheme::V4r2 {
            return Err(LedgerError::Configuration(format!(
                "wallet scheme {scheme} is not supported for payouts"
            )));
        }
        let words: Vec<&str> = mnemonic.split_whitespace().collect();
        if words.len() != MNEMONIC_WORDS {
            return Err(LedgerError::Configuration(format!(
                "wallet mnemonic must have {MNEMONIC_WORDS} words, got {}",
                words.len()
            )));
        }
        let seed = seed_from_words(&words);
        Self::from_seed(&seed, wallet_address, wallet_id.unwrap_or(DEFAULT_WALLET_ID))
    }

    fn sign_at(
        &self,
        transfer: &TransferRequest<'_>,
        now_unix: u32,
    ) -> Result<SignedTransfer, LedgerError> {
        if transfer.seqno == 0 {
            return Err(LedgerError::Configuration(format!(
                "payout wallet {} is not deployed",
                self.wallet_address
            )));
        }
        let destination: TonAddress = transfer.destination.parse()?;
        let message = self.external_message(
            &destination,
            transfer,
            now_unix.saturating_add(TRANSFER_TTL_SECS),
        )?;
        Ok(SignedTransfer {
            boc: fast32::base64::RFC4648.encode(&to_boc(&message, true)),
            seqno: transfer.seqno,
        })
    }

    /// The part of the wallet message the signature covers.
    ///
    /// `subwallet_id:u32 valid_until:u32 seqno:u32 op:u8 (mode:u8 ^message)*`
    fn signing_body(
        &self,
        destination: &TonAddress,
        transfer: &TransferRequest<'_>,
        valid_until: u32,
    ) -> Result<Cell, LedgerError> {
        let message = internal_message(destination, transfer.amount_nano, transfer.memo)?;
        let mut body = CellBuilder::new();
        body.store_uint(u64::from(self.wallet_id), 32)?
            .store_uint(u64::from(valid_until), 32)?
            .store_uint(u64::from(transfer.seqno), 32)?
            .store_uint(OP_SIMPLE_SEND, 8)?
            .store_uint(SEND_MODE, 8)?
            .store_ref(Arc::new(message))?;
        Ok(body.build())
    }

    /// `ext_in_msg_info$10` to the wallet, carrying the signed body by reference.
    fn external_message(
        &self,
        destination: &TonAddress,
        transfer: &TransferRequest<'_>,
        valid_until: u32,
    ) -> Result<Cell, LedgerError> {
        let body = self.signing_body(destination, transfer, valid_until)?;
        let signature = self.key_pair.sign(body.hash());

        let mut signed = CellBuilder::new();
        signed.store_bytes(signature.as_ref())?.store_cell(&body)?;

        let mut message = CellBuilder::new();
        message
            .store_uint(0b10, 2)?
            .store_address_none()?
            .store_address(&self.wallet)?
            .store_coins(0)? // import_fee
            .store_bit(false)? // no state init
            .store_bit(true)? // body by reference
            .store_ref(Arc::new(signed.build()))?;
        Ok(message.build())
    }
}

impl TransferSigner for Ed25519TransferSigner {
    fn wallet_address(&self) -> &str {
        &self.wallet_address
    }

    fn public_key(&self) -> [u8; 32] {
        self.public_key
    }

    fn sign(&self, transfer: &TransferRequest<'_>) -> Result<SignedTransfer, LedgerError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let now = u32::try_from(now)
            .map_err(|_| LedgerError::Configuration("system clock out of range".to_string()))?;
        self.sign_at(transfer, now)
    }
}

/// `int_msg_info$0` carrying `amount_nano` and a text comment.
fn internal_message(
    destination: &TonAddress,
    amount_nano: u64,
    memo: &str,
) -> Result<Cell, LedgerError> {
    let comment = comment_cell(memo)?;
    let mut message = CellBuilder::new();
    message
        .store_bit(false)? // int_msg_info$0
        .store_bit(true)? // ihr_disabled
        .store_bit(destination.bounceable)?
        .store_bit(false)? // bounced
        .store_address_none()? // src, filled in by the wallet
        .store_address(destination)?
        .store_coins(amount_nano)?
        .store_bit(false)? // no extra currencies
        .store_coins(0)? // ihr_fee
        .store_coins(0)? // fwd_fee
        .store_uint(0, 64)? // created_lt
        .store_uint(0, 32)? // created_at
        .store_bit(false)? // no state init
        .store_bit(true)? // body by reference
        .store_ref(Arc::new(comment))?;
    Ok(message.build())
}

/// A text comment as a snake: the opcode and the first bytes in the head
/// cell, the rest chained through single references.
fn comment_cell(memo: &str) -> Result<Cell, LedgerError> {
    let bytes = memo.as_bytes();
    let head_len = bytes.len().min((MAX_BITS - COMMENT_PREFIX_BITS) / 8);
    let (head, rest) = bytes.split_at(head_len);

    let mut tail: Option<Arc<Cell>> = None;
    let chunks: Vec<&[u8]> = rest.chunks(MAX_BITS / 8).collect();
    for chunk in chunks.into_iter().rev() {
        let mut cell = CellBuilder::new();
        cell.store_bytes(chunk)?;
        if let Some(next) = tail.take() {
            cell.store_ref(next)?;
        }
        tail = Some(Arc::new(cell.build()));
    }

    let mut cell = CellBuilder::new();
    cell.store_uint(0, COMMENT_PREFIX_BITS)?.store_bytes(head)?;
    if let Some(next) = tail {
        cell.store_ref(next)?;
    }
    Ok(cell.build())
}

fn seed_from_words(words: &[&str]) -> [u8; 32] {
    let phrase = words.join(" ");
    let entropy = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA512, phrase.as_bytes()),
        b"",
    );

    let mut derived = [0u8; 64];
    let rounds = NonZeroU32::new(SEED_ROUNDS).unwrap_or(NonZeroU32::MIN);
    ring::pbkdf2::derive(
        ring::pbkdf2::PBKDF2_HMAC_SHA512,
        rounds,
        SEED_SALT,
        entropy.as_ref(),
        &mut derived,
    );

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&derived[..32]);
    seed
}
