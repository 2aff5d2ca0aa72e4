//! Releasing escrowed funds.
//!
//! Sequence-number fetch, signing and broadcast form one retried unit: a
//! transient failure anywhere restarts from a fresh sequence number, since
//! the wallet's counter may have moved between attempts.
//!
//! An accepted broadcast is not a confirmed transfer. The ledger API returns
//! no transaction hash at this point and nothing here polls for one.

use crate::ledger::{LedgerClient, LedgerError, TransferRequest, TransferSigner};
use crate::utils::retry::RetryPolicy;
use adescrow_sdk::objects::to_nano;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum PayoutError {
    /// Missing signing material or an unsupported wallet scheme.
    #[error("payout is not configured: {0}")]
    Configuration(String),

    #[error("payout amount {amount} cannot be expressed in minor units")]
    InvalidAmount { amount: Decimal },

    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<LedgerError> for PayoutError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Configuration(message) => PayoutError::Configuration(message),
            other => PayoutError::Ledger(other),
        }
    }
}

/// A broadcast the ledger accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReceipt {
    pub destination: String,
    pub amount_nano: u64,
    /// Sequence number the accepted message was signed with.
    pub seqno: u32,
}

#[derive(Clone)]
pub struct PayoutEngine {
    ledger: Arc<dyn LedgerClient>,
    signer: Option<Arc<dyn TransferSigner>>,
    retry: RetryPolicy,
}

impl PayoutEngine {
    /// `signer` is `None` when no signing material is configured; every
    /// payout then fails with [`PayoutError::Configuration`].
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Option<Arc<dyn TransferSigner>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            signer,
            retry,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.signer.is_some()
    }

    /// Check that the wallet at the signer's address holds the signer's key,
    /// so broadcasts are not signed for someone else's contract.
    pub async fn verify_signer(&self) -> Result<(), PayoutError> {
        let Some(signer) = &self.signer else {
            return Err(PayoutError::Configuration(
                "no signing material configured".to_string(),
            ));
        };
        let address = signer.wallet_address();
        let on_chain = self
            .retry
            .run("get_public_key", |_| self.ledger.get_public_key(address))
            .await?;
        if on_chain != signer.public_key() {
            error!(wallet = address, "Payout wallet is controlled by a different key");
            return Err(PayoutError::Configuration(format!(
                "wallet {address} does not hold the configured mnemonic's key"
            )));
        }
        info!(wallet = address, "Payout wallet key verified");
        Ok(())
    }

    /// Transfer `amount` (major units) to `destination` with `memo`.
    pub async fn send(
        &self,
        destination: &str,
        amount: Decimal,
        memo: &str,
    ) -> Result<PayoutReceipt, PayoutError> {
        let Some(signer) = &self.signer else {
            error!(destination, "Payout requested but no wallet mnemonic is configured");
            return Err(PayoutError::Configuration(
                "no signing material configured".to_string(),
            ));
        };
        let amount_nano = to_nano(amount)
            .filter(|n| *n > 0)
            .ok_or(PayoutError::InvalidAmount { amount })?;

        info!(destination, amount = %amount, memo, "Initiating payout");

        let seqno = self
            .retry
            .run("payout", |attempt| {
                self.attempt(signer.as_ref(), destination, amount_nano, memo, attempt)
            })
            .await?;

        info!(destination, amount_nano, seqno, "Payout broadcast accepted");
        Ok(PayoutReceipt {
            destination: destination.to_string(),
            amount_nano,
            seqno,
        })
    }

    async fn attempt(
        &self,
        signer: &dyn TransferSigner,
        destination: &str,
        amount_nano: u64,
        memo: &str,
        attempt: u32,
    ) -> Result<u32, LedgerError> {
        let seqno = self
            .ledger
            .get_sequence_number(signer.wallet_address())
            .await?;
        let signed = signer.sign(&TransferRequest {
            destination,
            amount_nano,
            seqno,
            memo,
        })?;
        let ack = self.ledger.broadcast(&signed).await?;
        if !ack.accepted {
            return Err(LedgerError::Rejected {
                message: format!("broadcast of seqno {seqno} not accepted (attempt {attempt})"),
            });
        }
        Ok(seqno)
    }
}
