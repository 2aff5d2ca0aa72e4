//! External value-transfer ledger.
//!
//! [`LedgerClient`] is the seam the payment verifier and payout engine talk
//! through; [`TonCenterClient`] implements it over the TonCenter v2 HTTP API.
//! Outgoing transfers are signed by a [`TransferSigner`] and encoded as TON
//! cells.

pub mod address;
pub mod cell;
pub mod signer;
mod toncenter;

pub use address::{AddressError, TonAddress};
pub use cell::CellError;
pub use signer::{Ed25519TransferSigner, TransferRequest, TransferSigner};
pub use toncenter::{TESTNET_API_BASE, TonCenterClient};

use crate::utils::retry::Retryable;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Network or connection failure.
    #[error("ledger transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The ledger API answered with a non-success HTTP status.
    #[error("ledger API returned HTTP {status}")]
    Http { status: u16 },

    /// The ledger API answered but refused the request.
    #[error("ledger API rejected the request: {message}")]
    Rejected { message: String },

    #[error("unexpected ledger response: {0}")]
    Parse(String),

    /// Missing signing material or an unsupported capability.
    #[error("ledger configuration error: {0}")]
    Configuration(String),

    /// The transfer cannot be expressed as a ledger message.
    #[error("cannot encode transfer: {0}")]
    Encoding(String),
}

impl From<CellError> for LedgerError {
    fn from(e: CellError) -> Self {
        LedgerError::Encoding(e.to_string())
    }
}

impl From<AddressError> for LedgerError {
    fn from(e: AddressError) -> Self {
        LedgerError::Encoding(e.to_string())
    }
}

impl Retryable for LedgerError {
    fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Transport(_) | LedgerError::Http { .. } => true,
            LedgerError::Rejected { .. }
            | LedgerError::Parse(_)
            | LedgerError::Configuration(_)
            | LedgerError::Encoding(_) => false,
        }
    }
}

/// An incoming transfer to a watched address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingTransfer {
    /// Value in minor units.
    pub value: u64,
    /// Free-text comment, empty when the transfer carried none.
    pub memo: String,
    pub tx_ref: String,
}

/// A transfer signed and encoded for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    /// Base64 encoding of the signed message.
    pub boc: String,
    pub seqno: u32,
}

/// Broadcast acknowledgement. Acceptance is not on-ledger confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastAck {
    pub accepted: bool,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The most recent `limit` incoming transfers to `address`, newest first.
    async fn list_incoming_transfers(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<IncomingTransfer>, LedgerError>;

    /// The wallet's current sequence number (replay-protection nonce).
    async fn get_sequence_number(&self, address: &str) -> Result<u32, LedgerError>;

    /// Ed25519 public key stored in the wallet contract at `address`.
    async fn get_public_key(&self, address: &str) -> Result<[u8; 32], LedgerError>;

    async fn broadcast(&self, transfer: &SignedTransfer) -> Result<BroadcastAck, LedgerError>;

    /// Cheap liveness check of the ledger API.
    async fn is_reachable(&self) -> bool;
}
