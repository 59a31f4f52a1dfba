//! Bounded outbound queue with an explicit closed state.
//!
//! The queue owns the only long-lived sender of the channel feeding a
//! connection's write loop. Closing the queue drops that sender, so the
//! write loop drains whatever is already buffered and then observes the
//! end of the channel, which is its cue for a clean shutdown.

use crate::{config::BackpressurePolicy, error::EnqueueError};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;

/// Per-connection queue of encoded messages awaiting the write loop.
#[derive(Debug)]
pub struct OutboundQueue {
    /// `None` once the queue has been closed; never reopened
    sender: Mutex<Option<mpsc::Sender<String>>>,
    policy: BackpressurePolicy,
}

impl OutboundQueue {
    /// Creates a queue holding at most `capacity` messages and returns the
    /// receiving end for the write loop.
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            sender: Mutex::new(Some(sender)),
            policy,
        };
        (queue, receiver)
    }

    /// Queues one message without blocking the caller, except under
    /// [`BackpressurePolicy::BlockWithTimeout`] where it waits at most the
    /// configured time for capacity.
    ///
    /// Fails with [`EnqueueError::Closed`] once the queue has been closed.
    pub async fn push(&self, message: String) -> Result<(), EnqueueError> {
        let mut slot = self.sender.lock().await;
        let Some(sender) = slot.as_ref() else {
            return Err(EnqueueError::Closed);
        };

        match sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => {
                // The write loop is gone; nothing will ever drain this queue.
                slot.take();
                Err(EnqueueError::Closed)
            }
            Err(TrySendError::Full(message)) => match self.policy {
                BackpressurePolicy::CloseOnFull => {
                    slot.take();
                    Err(EnqueueError::Overflow)
                }
                BackpressurePolicy::DropNewest => Err(EnqueueError::Dropped),
                BackpressurePolicy::BlockWithTimeout(millis) => {
                    let sender = sender.clone();
                    drop(slot);
                    self.push_within(sender, message, Duration::from_millis(millis))
                        .await
                }
            },
        }
    }

    /// Waits for capacity without holding the lock, then re-checks the
    /// closed state before committing the message.
    async fn push_within(
        &self,
        sender: mpsc::Sender<String>,
        message: String,
        wait: Duration,
    ) -> Result<(), EnqueueError> {
        let reserved = tokio::time::timeout(wait, sender.reserve()).await;

        let mut slot = self.sender.lock().await;
        if slot.is_none() {
            return Err(EnqueueError::Closed);
        }

        match reserved {
            Ok(Ok(permit)) => {
                permit.send(message);
                Ok(())
            }
            Ok(Err(_)) => {
                slot.take();
                Err(EnqueueError::Closed)
            }
            Err(_) => {
                slot.take();
                Err(EnqueueError::TimedOut)
            }
        }
    }

    /// Closes the queue. Returns `true` if this call performed the close.
    pub async fn close(&self) -> bool {
        self.sender.lock().await.take().is_some()
    }

    pub async fn is_closed(&self) -> bool {
        self.sender.lock().await.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_on_full_closes_queue() {
        let (queue, mut receiver) = OutboundQueue::new(256, BackpressurePolicy::CloseOnFull);

        for i in 0..256 {
            queue.push(format!("message {i}")).await.unwrap();
        }
        assert_eq!(queue.push("overflow".to_string()).await, Err(EnqueueError::Overflow));
        assert!(queue.is_closed().await);
        assert_eq!(queue.push("late".to_string()).await, Err(EnqueueError::Closed));

        // Everything accepted before the overflow is still delivered, in order.
        for i in 0..256 {
            assert_eq!(receiver.recv().await.unwrap(), format!("message {i}"));
        }
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_newest_keeps_queue_open() {
        let (queue, mut receiver) = OutboundQueue::new(2, BackpressurePolicy::DropNewest);

        queue.push("a".to_string()).await.unwrap();
        queue.push("b".to_string()).await.unwrap();
        assert_eq!(queue.push("c".to_string()).await, Err(EnqueueError::Dropped));
        assert!(!queue.is_closed().await);

        assert_eq!(receiver.recv().await.unwrap(), "a");
        queue.push("d".to_string()).await.unwrap();
        assert_eq!(receiver.recv().await.unwrap(), "b");
        assert_eq!(receiver.recv().await.unwrap(), "d");
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_with_timeout_closes_after_deadline() {
        let (queue, _receiver) = OutboundQueue::new(1, BackpressurePolicy::BlockWithTimeout(100));

        queue.push("a".to_string()).await.unwrap();
        assert_eq!(queue.push("b".to_string()).await, Err(EnqueueError::TimedOut));
        assert!(queue.is_closed().await);
    }

    #[tokio::test]
    async fn test_block_with_timeout_succeeds_when_drained() {
        let (queue, mut receiver) = OutboundQueue::new(1, BackpressurePolicy::BlockWithTimeout(5_000));
        queue.push("a".to_string()).await.unwrap();

        let drain = tokio::spawn(async move {
            let first = receiver.recv().await;
            let second = receiver.recv().await;
            (first, second)
        });

        queue.push("b".to_string()).await.unwrap();
        let (first, second) = drain.await.unwrap();
        assert_eq!(first.as_deref(), Some("a"));
        assert_eq!(second.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (queue, mut receiver) = OutboundQueue::new(4, BackpressurePolicy::CloseOnFull);
        queue.push("last words".to_string()).await.unwrap();

        assert!(queue.close().await);
        assert!(!queue.close().await);
        assert_eq!(queue.push("ignored".to_string()).await, Err(EnqueueError::Closed));

        assert_eq!(receiver.recv().await.as_deref(), Some("last words"));
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_push_after_receiver_dropped_reports_closed() {
        let (queue, receiver) = OutboundQueue::new(4, BackpressurePolicy::CloseOnFull);
        drop(receiver);

        assert_eq!(queue.push("nobody".to_string()).await, Err(EnqueueError::Closed));
        assert!(queue.is_closed().await);
    }
}
