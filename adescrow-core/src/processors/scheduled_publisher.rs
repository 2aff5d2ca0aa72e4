//! ScheduledPublisher processor.
//!
//! On every tick the publisher:
//! - loads `Scheduled` deals whose `scheduled_at` has passed
//! - posts each deal's content into its channel
//! - completes the deal with the post's proof link
//! - pays the channel owner through the [`PayoutEngine`]
//!
//! Runs are single-flight: a run requested while another is in progress is
//! dropped, not queued. Deals are processed one after another and a failure
//! on one never stops the rest; each deal's outcome is returned from
//! [`ScheduledPublisher::run_once`].

use super::channel_publisher::{ChannelPublisher, PublishError};
use super::payout_engine::PayoutEngine;
use crate::directory::Directory;
use crate::entities::deal::DealRecord;
use crate::entities::directory::ChannelRecord;
use crate::events::{DealEvent, UnpaidReason};
use crate::state_machine::{DealError, DealStateMachine, Publication};
use crate::store::StoreError;
use crate::utils::clock::now_utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Why a single deal could not be published.
///
/// The deal stays `Scheduled` and is picked up again by the next run.
#[derive(Debug, Error)]
pub enum DealRunError {
    #[error("channel {channel_id} not found")]
    ChannelNotFound { channel_id: i64 },

    #[error("directory lookup failed: {0}")]
    Directory(#[from] sqlx::Error),

    #[error("publishing failed: {0}")]
    Publish(#[from] PublishError),

    /// The post is live but the deal could not be completed.
    #[error("post {proof_link} is live but completing the deal failed: {source}")]
    Complete {
        proof_link: String,
        #[source]
        source: DealError,
    },
}

/// What happened to a deal that was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Completed and the payout broadcast was accepted.
    Paid { proof_link: String, seqno: u32 },
    /// Completed but the owner was not paid; needs manual reconciliation.
    Unpaid {
        proof_link: String,
        reason: UnpaidReason,
    },
}

#[derive(Debug)]
pub struct DealRunResult {
    pub deal_id: i64,
    pub outcome: Result<PublishOutcome, DealRunError>,
}

#[derive(Debug)]
pub enum BatchRun {
    /// Another run was in flight; this one did nothing.
    Skipped,
    /// One result per ready deal, in processing order.
    Completed(Vec<DealRunResult>),
}

/// Memo attached to payouts so owners can match them to deals.
pub fn payout_memo(deal_id: i64) -> String {
    format!("Ad escrow payout #{deal_id}")
}

/// `https://t.me/{username}/{post_id}` for public channels, the bare post
/// id otherwise.
pub fn proof_link(username: Option<&str>, post_id: i64) -> String {
    match username.filter(|u| !u.is_empty()) {
        Some(username) => format!("https://t.me/{username}/{post_id}"),
        None => post_id.to_string(),
    }
}

#[derive(Clone)]
pub struct ScheduledPublisher {
    machine: DealStateMachine,
    directory: Arc<dyn Directory>,
    channel_publisher: Arc<dyn ChannelPublisher>,
    payouts: PayoutEngine,
    interval: Duration,
    in_flight: Arc<Mutex<()>>,
}

/// Handle to a publisher started with [`ScheduledPublisher::start`].
pub struct PublisherHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PublisherHandle {
    /// Signal the loop to stop and wait for it. A run in progress finishes first.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "ScheduledPublisher task failed");
        }
    }
}

impl ScheduledPublisher {
    pub fn new(
        machine: DealStateMachine,
        directory: Arc<dyn Directory>,
        channel_publisher: Arc<dyn ChannelPublisher>,
        payouts: PayoutEngine,
        interval: Duration,
    ) -> Self {
        Self {
            machine,
            directory,
            channel_publisher,
            payouts,
            interval,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Spawn the periodic loop.
    pub fn start(self) -> PublisherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        PublisherHandle { shutdown_tx, task }
    }

    /// Run on every interval tick until `shutdown_rx` turns `true`.
    ///
    /// Ticks missed while a run was in progress are skipped, not replayed.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "ScheduledPublisher started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("ScheduledPublisher received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(BatchRun::Skipped) => {
                            debug!("Previous publishing run still in flight, skipping tick");
                        }
                        Ok(BatchRun::Completed(results)) => log_batch(&results),
                        Err(e) => error!(error = %e, "Failed to load deals ready to publish"),
                    }
                }
            }
        }

        info!("ScheduledPublisher shutdown complete");
    }

    /// Publish every deal that is due now.
    ///
    /// Returns [`BatchRun::Skipped`] without touching anything when another
    /// run holds the single-flight guard.
    pub async fn run_once(&self) -> Result<BatchRun, StoreError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return Ok(BatchRun::Skipped);
        };

        let ready = self.machine.store().ready_to_publish(now_utc()).await?;
        if !ready.is_empty() {
            info!(count = ready.len(), "Publishing scheduled deals");
        }

        let mut results = Vec::with_capacity(ready.len());
        for deal in ready {
            let deal_id = deal.id;
            let outcome = self.process_deal(deal).await;
            if let Err(e) = &outcome {
                error!(deal_id, error = %e, "Failed to publish deal");
            }
            results.push(DealRunResult { deal_id, outcome });
        }
        Ok(BatchRun::Completed(results))
    }

    async fn process_deal(&self, deal: DealRecord) -> Result<PublishOutcome, DealRunError> {
        let channel = self
            .directory
            .channel(deal.channel_id)
            .await?
            .ok_or(DealRunError::ChannelNotFound {
                channel_id: deal.channel_id,
            })?;

        info!(
            deal_id = deal.id,
            channel_id = channel.id,
            "Publishing ad"
        );
        let post = self
            .channel_publisher
            .publish(channel.external_channel_id, deal.publishable_content())
            .await?;
        let username = post
            .channel_username
            .as_deref()
            .or(channel.username.as_deref());
        let proof_link = proof_link(username, post.post_id);

        let publication = Publication {
            published_at: now_utc(),
            proof_link: proof_link.clone(),
        };
        if let Err(source) = self.machine.complete_deal(deal.id, publication).await {
            return Err(DealRunError::Complete { proof_link, source });
        }
        info!(deal_id = deal.id, proof_link, "Ad published");

        let outcome = match self.pay_owner(&deal, &channel).await {
            Ok(seqno) => PublishOutcome::Paid { proof_link, seqno },
            Err(reason) => {
                warn!(
                    deal_id = deal.id,
                    owner_id = channel.owner_id,
                    reason = %reason,
                    "Deal completed but owner not paid, manual reconciliation required"
                );
                self.machine.emit(DealEvent::PayoutUnpaid {
                    deal_id: deal.id,
                    reason: reason.clone(),
                });
                PublishOutcome::Unpaid { proof_link, reason }
            }
        };
        Ok(outcome)
    }

    /// Release the deal amount to the channel owner's wallet.
    async fn pay_owner(
        &self,
        deal: &DealRecord,
        channel: &ChannelRecord,
    ) -> Result<u32, UnpaidReason> {
        let owner = self
            .directory
            .user(channel.owner_id)
            .await
            .map_err(|e| UnpaidReason::PayoutFailed {
                error: format!("owner lookup failed: {e}"),
            })?;
        let Some(wallet) = owner
            .and_then(|u| u.wallet_address)
            .filter(|w| !w.trim().is_empty())
        else {
            return Err(UnpaidReason::NoWallet {
                owner_id: channel.owner_id,
            });
        };

        let receipt = self
            .payouts
            .send(&wallet, deal.amount, &payout_memo(deal.id))
            .await
            .map_err(|e| UnpaidReason::PayoutFailed {
                error: e.to_string(),
            })?;

        self.machine.emit(DealEvent::PayoutSent {
            deal_id: deal.id,
            destination: wallet,
            seqno: receipt.seqno,
        });
        Ok(receipt.seqno)
    }
}

fn log_batch(results: &[DealRunResult]) {
    if results.is_empty() {
        return;
    }
    let failed = results.iter().filter(|r| r.outcome.is_err()).count();
    let unpaid = results
        .iter()
        .filter(|r| matches!(r.outcome, Ok(PublishOutcome::Unpaid { .. })))
        .count();
    info!(
        total = results.len(),
        failed,
        unpaid,
        "Publishing run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DealStatus;
    use crate::events::deal_event_channel;
    use crate::store::{DealStore, InMemoryDealStore};
    use crate::testing::{
        MockChannelPublisher, MockDirectory, MockLedger, MockSigner, deal_record,
    };
    use crate::utils::retry::RetryPolicy;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: InMemoryDealStore,
        ledger: Arc<MockLedger>,
        channel_publisher: Arc<MockChannelPublisher>,
        publisher: ScheduledPublisher,
    }

    fn fixture_with(channel_publisher: MockChannelPublisher, signed: bool) -> Fixture {
        let store = InMemoryDealStore::new();
        let ledger = Arc::new(MockLedger::default().with_seqno(5));
        let channel_publisher = Arc::new(channel_publisher);
        let directory = Arc::new(
            MockDirectory::default()
                .with_channel(10, -1001, Some("widgets"), 100)
                .with_channel(11, -1002, None, 101)
                .with_channel(12, -1003, Some("nowallet"), 102)
                .with_user(100, Some("EQOwnerA"))
                .with_user(101, Some("EQOwnerB"))
                .with_user(102, None),
        );
        let signer: Option<Arc<dyn crate::ledger::TransferSigner>> = if signed {
            Some(Arc::new(MockSigner))
        } else {
            None
        };
        let payouts = PayoutEngine::new(
            ledger.clone(),
            signer,
            RetryPolicy::fixed(3, Duration::ZERO),
        );
        let publisher = ScheduledPublisher::new(
            DealStateMachine::new(Arc::new(store.clone())),
            directory,
            channel_publisher.clone(),
            payouts,
            Duration::from_secs(60),
        );
        Fixture {
            store,
            ledger,
            channel_publisher,
            publisher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockChannelPublisher::default(), true)
    }

    async fn seed_due(store: &InMemoryDealStore, id: i64, channel_id: i64) -> DealRecord {
        let mut deal = deal_record(id, DealStatus::Scheduled);
        deal.channel_id = channel_id;
        deal.amount = dec!(2);
        deal.scheduled_at = Some(now_utc() - time::Duration::minutes(5));
        store.seed(deal.clone()).await;
        deal
    }

    fn completed(run: BatchRun) -> Vec<DealRunResult> {
        match run {
            BatchRun::Completed(results) => results,
            BatchRun::Skipped => panic!("run was skipped"),
        }
    }

    #[tokio::test]
    async fn test_due_deal_is_published_completed_and_paid() {
        let f = fixture();
        let mut deal = seed_due(&f.store, 1, 10).await;
        deal.draft = Some("<b>Buy</b> our widget".into());
        f.store.seed(deal).await;

        let results = completed(f.publisher.run_once().await.unwrap());
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].outcome.as_ref().unwrap(),
            &PublishOutcome::Paid {
                proof_link: "https://t.me/widgets/1".into(),
                seqno: 5,
            }
        );

        let stored = f.store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.status, DealStatus::Completed);
        assert_eq!(stored.proof_link.as_deref(), Some("https://t.me/widgets/1"));
        assert!(stored.published_at.is_some());

        assert_eq!(
            f.channel_publisher.posts(),
            vec![(-1001, "<b>Buy</b> our widget".to_string())]
        );
        let broadcasts = f.ledger.broadcasts();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].boc, "EQOwnerA|2000000000|5|Ad escrow payout #1");
    }

    #[tokio::test]
    async fn test_brief_is_published_when_no_draft() {
        let f = fixture();
        seed_due(&f.store, 1, 11).await;

        let results = completed(f.publisher.run_once().await.unwrap());
        assert!(matches!(
            results[0].outcome,
            Ok(PublishOutcome::Paid { ref proof_link, .. }) if proof_link == "1"
        ));
        assert_eq!(f.channel_publisher.posts()[0].1, "brief");
    }

    #[tokio::test]
    async fn test_owner_without_wallet_leaves_deal_completed_unpaid() {
        let f = fixture();
        seed_due(&f.store, 1, 12).await;

        let results = completed(f.publisher.run_once().await.unwrap());
        assert_eq!(
            results[0].outcome.as_ref().unwrap(),
            &PublishOutcome::Unpaid {
                proof_link: "https://t.me/nowallet/1".into(),
                reason: UnpaidReason::NoWallet { owner_id: 102 },
            }
        );
        assert_eq!(
            f.store.get(1).await.unwrap().unwrap().status,
            DealStatus::Completed
        );
        assert_eq!(f.ledger.broadcast_calls(), 0);
    }

    #[tokio::test]
    async fn test_payout_failure_leaves_deal_completed_unpaid() {
        let f = fixture_with(MockChannelPublisher::default(), false);
        seed_due(&f.store, 1, 10).await;

        let results = completed(f.publisher.run_once().await.unwrap());
        assert!(matches!(
            results[0].outcome,
            Ok(PublishOutcome::Unpaid {
                reason: UnpaidReason::PayoutFailed { .. },
                ..
            })
        ));
        assert_eq!(
            f.store.get(1).await.unwrap().unwrap().status,
            DealStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_one_failing_deal_does_not_stop_the_batch() {
        let f = fixture_with(MockChannelPublisher::default().failing_for(-1002), true);
        seed_due(&f.store, 1, 11).await;
        seed_due(&f.store, 2, 10).await;
        seed_due(&f.store, 3, 99).await;

        let results = completed(f.publisher.run_once().await.unwrap());
        let by_id = |id: i64| results.iter().find(|r| r.deal_id == id).unwrap();

        assert!(matches!(by_id(1).outcome, Err(DealRunError::Publish(_))));
        assert!(matches!(by_id(2).outcome, Ok(PublishOutcome::Paid { .. })));
        assert!(matches!(
            by_id(3).outcome,
            Err(DealRunError::ChannelNotFound { channel_id: 99 })
        ));

        assert_eq!(f.store.get(1).await.unwrap().unwrap().status, DealStatus::Scheduled);
        assert_eq!(f.store.get(2).await.unwrap().unwrap().status, DealStatus::Completed);
        assert_eq!(f.store.get(3).await.unwrap().unwrap().status, DealStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_future_and_unscheduled_deals_are_left_alone() {
        let f = fixture();
        let mut later = deal_record(1, DealStatus::Scheduled);
        later.channel_id = 10;
        later.scheduled_at = Some(now_utc() + time::Duration::hours(1));
        f.store.seed(later).await;
        let mut locked = deal_record(2, DealStatus::Locked);
        locked.channel_id = 10;
        locked.scheduled_at = Some(now_utc() - time::Duration::hours(1));
        f.store.seed(locked).await;

        let results = completed(f.publisher.run_once().await.unwrap());
        assert!(results.is_empty());
        assert!(f.channel_publisher.posts().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_dropped() {
        let (channel_publisher, gate) = MockChannelPublisher::gated();
        let f = fixture_with(channel_publisher, true);
        seed_due(&f.store, 1, 10).await;

        let first = tokio::spawn({
            let publisher = f.publisher.clone();
            async move { publisher.run_once().await }
        });
        gate.entered.notified().await;

        let second = f.publisher.run_once().await.unwrap();
        assert!(matches!(second, BatchRun::Skipped));

        gate.release.notify_one();
        let results = completed(first.await.unwrap().unwrap());
        assert_eq!(results.len(), 1);
        assert_eq!(f.channel_publisher.posts().len(), 1);

        // The guard is released once the first run ends.
        let third = completed(f.publisher.run_once().await.unwrap());
        assert!(third.is_empty());
        assert_eq!(f.channel_publisher.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_events_report_payout_and_unpaid() {
        let (tx, mut rx) = deal_event_channel();
        let mut f = fixture();
        f.publisher.machine = DealStateMachine::new(Arc::new(f.store.clone())).with_events(tx);
        seed_due(&f.store, 1, 10).await;
        seed_due(&f.store, 2, 12).await;

        f.publisher.run_once().await.unwrap();
        drop(f);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(events.contains(&DealEvent::PayoutSent {
            deal_id: 1,
            destination: "EQOwnerA".into(),
            seqno: 5,
        }));
        assert!(events.contains(&DealEvent::PayoutUnpaid {
            deal_id: 2,
            reason: UnpaidReason::NoWallet { owner_id: 102 },
        }));
        assert!(events.contains(&DealEvent::StatusChanged {
            deal_id: 2,
            from: DealStatus::Scheduled,
            to: DealStatus::Completed,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_publisher_runs_and_stops() {
        let f = fixture();
        seed_due(&f.store, 1, 10).await;

        let handle = f.publisher.clone().start();
        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop().await;

        assert_eq!(
            f.store.get(1).await.unwrap().unwrap().status,
            DealStatus::Completed
        );
        assert_eq!(f.channel_publisher.posts().len(), 1);
    }

    #[test]
    fn test_proof_link_formats() {
        assert_eq!(proof_link(Some("chan"), 42), "https://t.me/chan/42");
        assert_eq!(proof_link(None, 42), "42");
        assert_eq!(proof_link(Some(""), 42), "42");
    }
}
