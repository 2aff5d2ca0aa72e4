use super::types::DealEvent;
use tokio::sync::mpsc;

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for DealEvent events.
pub type DealEventSender = mpsc::Sender<DealEvent>;
/// Receiver handle for DealEvent events.
pub type DealEventReceiver = mpsc::Receiver<DealEvent>;

/// Create a new DealEvent channel.
///
/// Multiple senders can be cloned from the returned sender.
pub fn deal_event_channel() -> (DealEventSender, DealEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
