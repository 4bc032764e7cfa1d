//! Request/reply correlation.
//!
//! # Responsibilities
//! - Issue a fresh, unguessable token for every accepted request
//! - Hold one single-assignment reply slot per token
//! - Hand the value to the awaiting handler, then forget the slot
//!
//! # Design Decisions
//! - Slots live in a concurrent map keyed by UUID v4
//! - A second fulfill for a token is logged and ignored
//! - Dropping the pending reply removes its slot, so abandoned requests
//!   (client went away) do not leak entries

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

/// Opaque token identifying one accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyToken(Uuid);

impl fmt::Display for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Concurrent table of pending reply slots.
pub struct ReplyCorrelator<T> {
    slots: Arc<DashMap<Uuid, watch::Sender<Option<T>>>>,
}

impl<T> Clone for ReplyCorrelator<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> Default for ReplyCorrelator<T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ReplyCorrelator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request and return its token and reply handle.
    pub fn accept(&self) -> (ReplyToken, PendingReply<T>) {
        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(None);
        self.slots.insert(id, tx);
        (
            ReplyToken(id),
            PendingReply {
                token: ReplyToken(id),
                slot: rx,
                slots: Arc::clone(&self.slots),
            },
        )
    }

    /// Store the result for `token`.
    ///
    /// Returns false, leaving the slot untouched, if the token is unknown or
    /// was already fulfilled.
    pub fn fulfill(&self, token: ReplyToken, value: T) -> bool {
        let Some(slot) = self.slots.get(&token.0) else {
            tracing::warn!(token = %token, "Reply for unknown or abandoned request dropped");
            return false;
        };

        let mut value = Some(value);
        let stored = slot.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = value.take();
            true
        });
        if !stored {
            tracing::warn!(token = %token, "Duplicate reply ignored");
        }
        stored
    }

    /// Number of requests waiting for a reply.
    pub fn pending(&self) -> usize {
        self.slots.len()
    }
}

/// The originating handler's side of a reply slot.
pub struct PendingReply<T> {
    token: ReplyToken,
    slot: watch::Receiver<Option<T>>,
    slots: Arc<DashMap<Uuid, watch::Sender<Option<T>>>>,
}

impl<T: Clone> PendingReply<T> {
    /// Suspend until the slot is fulfilled and return the stored value.
    ///
    /// Returns `None` if the slot was removed without a value.
    pub async fn wait(mut self) -> Option<T> {
        match self.slot.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        }
    }
}

impl<T> Drop for PendingReply<T> {
    fn drop(&mut self) {
        self.slots.remove(&self.token.0);
    }
}
