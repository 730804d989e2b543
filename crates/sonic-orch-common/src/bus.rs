//! Change-event bus with completion tracking.
//!
//! Every table subscription and every inter-orch signal is a tokio unbounded
//! channel wrapped in [`TrackedSender`] / [`TrackedReceiver`]. Sending a
//! message bumps a shared [`SettleTracker`]; the receiving orch completes it
//! once the message (and everything it caused to be sent) has been handled.
//! When the outstanding count drops to zero the system is settled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};

/// Error type for bus operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("receiver dropped")]
    Closed,
}

#[derive(Debug, Default)]
struct TrackerInner {
    outstanding: AtomicUsize,
    notify: Notify,
}

/// Counts messages that have been sent but not yet fully processed.
///
/// Cloning yields a handle to the same counter.
#[derive(Debug, Clone, Default)]
pub struct SettleTracker {
    inner: Arc<TrackerInner>,
}

impl SettleTracker {
    /// Creates a tracker with nothing outstanding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `n` newly sent messages.
    pub fn enqueue(&self, n: usize) {
        if n > 0 {
            self.inner.outstanding.fetch_add(n, Ordering::SeqCst);
        }
    }

    /// Records `n` messages as fully processed.
    pub fn complete(&self, n: usize) {
        if n == 0 {
            return;
        }
        let prev = self
            .inner
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(v.saturating_sub(n)))
            .unwrap_or(0);
        if prev < n {
            tracing::error!(prev, n, "settle tracker completed more messages than were sent");
        }
        if prev <= n {
            self.inner.notify.notify_waiters();
        }
    }

    /// Returns the number of messages in flight.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Returns true if nothing is in flight.
    pub fn is_settled(&self) -> bool {
        self.outstanding() == 0
    }

    /// Resolves once every sent message has been processed.
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a completion between the check and
            // the await is not lost.
            notified.as_mut().enable();
            if self.is_settled() {
                return;
            }
            notified.await;
        }
    }
}

/// Sending half of a change channel.
#[derive(Debug)]
pub struct TrackedSender<T> {
    tx: mpsc::UnboundedSender<T>,
    tracker: Option<SettleTracker>,
}

impl<T> Clone for TrackedSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

impl<T> TrackedSender<T> {
    /// Sends a message, counting it against the tracker.
    pub fn send(&self, item: T) -> Result<(), BusError> {
        if let Some(tracker) = &self.tracker {
            tracker.enqueue(1);
        }
        self.tx.send(item).map_err(|_| {
            if let Some(tracker) = &self.tracker {
                tracker.complete(1);
            }
            BusError::Closed
        })
    }

    /// Returns true if the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a change channel.
#[derive(Debug)]
pub struct TrackedReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
    tracker: Option<SettleTracker>,
    closed: bool,
}

impl<T> TrackedReceiver<T> {
    /// Waits for the next message. Cancel safe.
    pub async fn recv(&mut self) -> Option<T> {
        let item = self.rx.recv().await;
        if item.is_none() {
            self.closed = true;
        }
        item
    }

    /// Returns the next message if one is immediately available.
    pub fn try_recv(&mut self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// Returns true once every sender is gone and the queue is drained.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks `n` received messages as fully processed.
    pub fn complete(&self, n: usize) {
        if let Some(tracker) = &self.tracker {
            tracker.complete(n);
        }
    }
}

/// Creates a channel whose messages are counted by `tracker`.
pub fn channel<T>(tracker: &SettleTracker) -> (TrackedSender<T>, TrackedReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        TrackedSender {
            tx,
            tracker: Some(tracker.clone()),
        },
        TrackedReceiver {
            rx,
            tracker: Some(tracker.clone()),
            closed: false,
        },
    )
}

/// Creates a channel that does not participate in settle tracking.
///
/// Used by observers such as tests and dump tools that never acknowledge.
pub fn untracked_channel<T>() -> (TrackedSender<T>, TrackedReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        TrackedSender { tx, tracker: None },
        TrackedReceiver {
            rx,
            tracker: None,
            closed: false,
        },
    )
}

/// Buffered receive side owned by an orch.
///
/// Messages move from the channel into the buffer either through
/// [`Inbox::wait`] (blocking for the first one) or [`Inbox::drain`]. They
/// stay in flight until [`Inbox::ack`].
#[derive(Debug)]
pub struct Inbox<T> {
    rx: TrackedReceiver<T>,
    buffered: VecDeque<T>,
    in_flight: usize,
}

impl<T> Inbox<T> {
    pub fn new(rx: TrackedReceiver<T>) -> Self {
        Self {
            rx,
            buffered: VecDeque::new(),
            in_flight: 0,
        }
    }

    /// Waits for one message and buffers it.
    ///
    /// Returns false when the channel is closed. Cancel safe.
    pub async fn wait(&mut self) -> bool {
        match self.rx.recv().await {
            Some(item) => {
                self.in_flight += 1;
                self.buffered.push_back(item);
                true
            }
            None => false,
        }
    }

    /// Returns true while senders remain.
    pub fn is_open(&self) -> bool {
        !self.rx.is_closed()
    }

    /// Returns true if messages are buffered but not yet drained.
    pub fn has_buffered(&self) -> bool {
        !self.buffered.is_empty()
    }

    /// Takes buffered messages plus whatever is immediately available, up
    /// to `limit` messages from the channel.
    pub fn drain(&mut self, limit: usize) -> Vec<T> {
        let mut taken = 0;
        while taken < limit {
            match self.rx.try_recv() {
                Some(item) => {
                    self.buffered.push_back(item);
                    taken += 1;
                }
                None => break,
            }
        }
        self.in_flight += taken;
        self.buffered.drain(..).collect()
    }

    /// Completes every drained message with the tracker.
    pub fn ack(&mut self) {
        let n = std::mem::take(&mut self.in_flight);
        self.rx.complete(n);
    }

    /// Number of messages received but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
