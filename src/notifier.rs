//! Per-poll fan-out of option updates to live viewers.
//!
//! Delivery is best-effort: the payload is always the full current option
//! snapshot, never a delta, so a dropped or reordered event can only show a
//! transiently stale count that self-heals on the next update. No backlog is
//! kept for disconnected viewers.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::model::PollOption;

/// Buffered events per poll channel; a viewer lagging past this many
/// undelivered updates starts losing the oldest ones.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct ChangeNotifier {
    channels: DashMap<String, broadcast::Sender<PollOption>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a poll. Interest ends when the receiver is
    /// dropped; call [`prune`](Self::prune) afterwards so the registry does
    /// not accumulate drained channels.
    pub fn subscribe(&self, poll_id: &str) -> broadcast::Receiver<PollOption> {
        self.channels
            .entry(poll_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Deliver an updated option snapshot to every current subscriber of
    /// its poll. Fire-and-forget: failures are logged, never surfaced, and
    /// never block or roll back the vote that produced the update.
    pub fn publish(&self, poll_id: &str, option: PollOption) {
        let Some(sender) = self.channels.get(poll_id) else {
            return;
        };

        if sender.receiver_count() == 0 {
            return;
        }

        match sender.send(option) {
            Ok(delivered) => {
                debug!(poll_id, subscribers = delivered, "published option update");
            }
            Err(e) => {
                warn!(poll_id, "option update dropped: {e}");
            }
        }
    }

    /// Drop the channel for a poll once its last viewer is gone. Invoked on
    /// session teardown so no orphan registration outlives its session.
    pub fn prune(&self, poll_id: &str) {
        self.channels
            .remove_if(poll_id, |_, sender| sender.receiver_count() == 0);
    }

    pub fn subscriber_count(&self, poll_id: &str) -> usize {
        self.channels
            .get(poll_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
