use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::{debug, trace};

/// Create a single-slot sink.
///
/// The slot holds at most one sample. While the consumer has not taken the
/// previous sample, new ones are dropped instead of queued.
pub fn publish_slot<T>(name: &'static str) -> (PublishSlot<T>, Receiver<T>) {
    let (sender, receiver) = mpsc::channel(1);
    (
        PublishSlot {
            name,
            sender,
            published: 0,
            dropped: 0,
        },
        receiver,
    )
}

#[derive(Debug)]
pub struct PublishSlot<T> {
    name: &'static str,
    sender: Sender<T>,
    published: u64,
    dropped: u64,
}

impl<T> PublishSlot<T> {
    /// Offer a sample without waiting. Returns `true` when it was accepted.
    pub fn try_publish(&mut self, value: T) -> bool {
        match self.sender.try_send(value) {
            Ok(()) => {
                self.published += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                trace!(sink = self.name, "Sink busy, sample dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped += 1;
                debug!(sink = self.name, "Sink has no consumer, sample dropped");
                false
            }
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
