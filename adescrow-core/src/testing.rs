//! Fixtures and hand-written collaborator mocks shared by unit tests.

use crate::config::LedgerConfig;
use crate::directory::Directory;
use crate::entities::DealStatus;
use crate::entities::deal::DealRecord;
use crate::entities::directory::{ChannelRecord, UserRecord};
use crate::ledger::{
    BroadcastAck, IncomingTransfer, LedgerClient, LedgerError, SignedTransfer, TESTNET_API_BASE,
    TransferRequest, TransferSigner,
};
use crate::processors::{ChannelPublisher, PublishError, PublishedPost};
use crate::utils::clock::now_utc;
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Notify;

/// A deal in `status` with an `updated_at` safely in the past.
pub fn deal_record(id: i64, status: DealStatus) -> DealRecord {
    let created_at = now_utc() - time::Duration::hours(1);
    DealRecord {
        id,
        advertiser_id: 1,
        channel_id: 2,
        status,
        amount: dec!(10),
        brief: "brief".to_string(),
        draft: None,
        rejection_reason: None,
        scheduled_at: None,
        published_at: None,
        proof_link: None,
        escrow_wallet: None,
        payment_tx_hash: None,
        is_disputed: false,
        dispute_reason: None,
        created_at,
        updated_at: created_at,
    }
}

pub fn ledger_config() -> LedgerConfig {
    LedgerConfig {
        api_base: url::Url::parse(TESTNET_API_BASE).unwrap(),
        api_key: None,
        custodial_address: MockSigner::ADDRESS.to_string(),
        scan_limit: 20,
    }
}

fn transient() -> LedgerError {
    LedgerError::Http { status: 502 }
}

/// Take one injected failure if any are left.
fn take_failure(remaining: &AtomicU32) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Default)]
pub struct MockLedger {
    transfers: Vec<IncomingTransfer>,
    seqno: u32,
    public_key: [u8; 32],
    advancing_seqno: bool,
    refuse_broadcast: bool,
    list_failures: AtomicU32,
    seqno_failures: AtomicU32,
    broadcast_failures: AtomicU32,
    list_calls: AtomicU32,
    seqno_calls: AtomicU32,
    broadcast_calls: AtomicU32,
    seqno_addresses: Mutex<Vec<String>>,
    broadcasts: Mutex<Vec<SignedTransfer>>,
}

impl MockLedger {
    pub fn with_transfers(transfers: Vec<IncomingTransfer>) -> Self {
        Self {
            transfers,
            ..Self::default()
        }
    }

    pub fn with_seqno(mut self, seqno: u32) -> Self {
        self.seqno = seqno;
        self
    }

    pub fn with_public_key(mut self, public_key: [u8; 32]) -> Self {
        self.public_key = public_key;
        self
    }

    /// Each sequence-number read returns one more than the previous.
    pub fn advancing_seqno(mut self) -> Self {
        self.advancing_seqno = true;
        self
    }

    pub fn refusing_broadcast(mut self) -> Self {
        self.refuse_broadcast = true;
        self
    }

    pub fn failing_list(self, times: u32) -> Self {
        self.list_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_seqno(self, times: u32) -> Self {
        self.seqno_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_broadcast(self, times: u32) -> Self {
        self.broadcast_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn seqno_calls(&self) -> u32 {
        self.seqno_calls.load(Ordering::SeqCst)
    }

    pub fn broadcast_calls(&self) -> u32 {
        self.broadcast_calls.load(Ordering::SeqCst)
    }

    pub fn seqno_addresses(&self) -> Vec<String> {
        self.seqno_addresses.lock().unwrap().clone()
    }

    /// Every broadcast attempt, including failed ones.
    pub fn broadcasts(&self) -> Vec<SignedTransfer> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn list_incoming_transfers(
        &self,
        _address: &str,
        limit: u32,
    ) -> Result<Vec<IncomingTransfer>, LedgerError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.list_failures) {
            return Err(transient());
        }
        Ok(self.transfers.iter().take(limit as usize).cloned().collect())
    }

    async fn get_sequence_number(&self, address: &str) -> Result<u32, LedgerError> {
        let previous = self.seqno_calls.fetch_add(1, Ordering::SeqCst);
        self.seqno_addresses
            .lock()
            .unwrap()
            .push(address.to_string());
        if take_failure(&self.seqno_failures) {
            return Err(transient());
        }
        if self.advancing_seqno {
            Ok(self.seqno + previous)
        } else {
            Ok(self.seqno)
        }
    }

    async fn get_public_key(&self, _address: &str) -> Result<[u8; 32], LedgerError> {
        Ok(self.public_key)
    }

    async fn broadcast(&self, transfer: &SignedTransfer) -> Result<BroadcastAck, LedgerError> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        self.broadcasts.lock().unwrap().push(transfer.clone());
        if take_failure(&self.broadcast_failures) {
            return Err(transient());
        }
        Ok(BroadcastAck {
            accepted: !self.refuse_broadcast,
        })
    }

    async fn is_reachable(&self) -> bool {
        true
    }
}

/// Signs by spelling the transfer out as `dest|amount|seqno|memo`.
pub struct MockSigner;

impl MockSigner {
    pub const ADDRESS: &'static str = "EQCustodial";
    pub const PUBLIC_KEY: [u8; 32] = [9; 32];
}

impl TransferSigner for MockSigner {
    fn wallet_address(&self) -> &str {
        Self::ADDRESS
    }

    fn public_key(&self) -> [u8; 32] {
        Self::PUBLIC_KEY
    }

    fn sign(&self, transfer: &TransferRequest<'_>) -> Result<SignedTransfer, LedgerError> {
        Ok(SignedTransfer {
            boc: format!(
                "{}|{}|{}|{}",
                transfer.destination, transfer.amount_nano, transfer.seqno, transfer.memo
            ),
            seqno: transfer.seqno,
        })
    }
}

#[derive(Default)]
pub struct MockDirectory {
    channels: HashMap<i64, ChannelRecord>,
    users: HashMap<i64, UserRecord>,
}

impl MockDirectory {
    pub fn with_channel(
        mut self,
        id: i64,
        external_channel_id: i64,
        username: Option<&str>,
        owner_id: i64,
    ) -> Self {
        self.channels.insert(
            id,
            ChannelRecord {
                id,
                external_channel_id,
                username: username.map(str::to_string),
                owner_id,
            },
        );
        self
    }

    pub fn with_user(mut self, id: i64, wallet_address: Option<&str>) -> Self {
        self.users.insert(
            id,
            UserRecord {
                id,
                wallet_address: wallet_address.map(str::to_string),
            },
        );
        self
    }
}

#[async_trait]
impl Directory for MockDirectory {
    async fn channel(&self, channel_id: i64) -> Result<Option<ChannelRecord>, sqlx::Error> {
        Ok(self.channels.get(&channel_id).cloned())
    }

    async fn user(&self, user_id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
        Ok(self.users.get(&user_id).cloned())
    }
}

/// Lets a test hold a publish call open.
#[derive(Default)]
pub struct Gate {
    /// Notified when a publish call starts.
    pub entered: Notify,
    /// Notify to let the held call finish.
    pub release: Notify,
}

/// Records posts and numbers them from 1. Never reports a channel username.
#[derive(Default)]
pub struct MockChannelPublisher {
    failing: HashSet<i64>,
    gate: Option<Arc<Gate>>,
    posts: Mutex<Vec<(i64, String)>>,
    held: AtomicBool,
}

impl MockChannelPublisher {
    pub fn failing_for(mut self, external_channel_id: i64) -> Self {
        self.failing.insert(external_channel_id);
        self
    }

    /// A publisher whose first call blocks until the gate is released.
    pub fn gated() -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let publisher = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (publisher, gate)
    }

    pub fn posts(&self) -> Vec<(i64, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelPublisher for MockChannelPublisher {
    async fn publish(
        &self,
        external_channel_id: i64,
        content: &str,
    ) -> Result<PublishedPost, PublishError> {
        if let Some(gate) = &self.gate {
            if !self.held.swap(true, Ordering::SeqCst) {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }
        if self.failing.contains(&external_channel_id) {
            return Err(PublishError::Api {
                code: 403,
                description: "Forbidden: bot is not a member of the channel chat".into(),
            });
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push((external_channel_id, content.to_string()));
        Ok(PublishedPost {
            post_id: posts.len() as i64,
            channel_username: None,
        })
    }
}
