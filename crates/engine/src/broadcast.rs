// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out of broadcast messages to live subscribers
//!
//! Each message is serialized exactly once into a [`Frame`] before delivery
//! starts. Delivery never waits on a subscriber: a subscriber whose channel
//! is closed or full is removed and never sees another frame.

use cw_core::{BroadcastMessage, Frame};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifies one registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Why a frame could not be handed to a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("subscriber disconnected")]
    Closed,
    #[error("subscriber is not keeping up")]
    Lagging,
}

/// A connection that accepts serialized frames without blocking
pub trait Subscriber: Send + Sync + 'static {
    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError>;
}

impl Subscriber for mpsc::Sender<Arc<str>> {
    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        self.try_send(frame.shared_text()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

impl Subscriber for mpsc::UnboundedSender<Arc<str>> {
    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        self.send(frame.shared_text())
            .map_err(|_| DeliveryError::Closed)
    }
}

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

type SubscriberMap = HashMap<SubscriptionId, Box<dyn Subscriber>>;

/// Registry of live subscribers and the fan-out over them
#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Arc<RwLock<SubscriberMap>>,
    next_id: Arc<AtomicU64>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for every future message
    pub fn subscribe(&self, subscriber: impl Subscriber) -> SubscriptionId {
        let id = self.allocate_id();
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.insert(id, Box::new(subscriber));
        tracing::debug!(subscription = %id, total = subs.len(), "subscriber added");
        id
    }

    /// Deliver `greeting` to a new subscriber, then register it.
    ///
    /// Both steps happen under the registry lock so no published message can
    /// overtake the greeting. A subscriber that rejects the greeting is not
    /// registered.
    pub fn subscribe_with_greeting(
        &self,
        subscriber: impl Subscriber,
        greeting: &BroadcastMessage,
    ) -> Result<SubscriptionId, DeliveryError> {
        let frame = match greeting.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(kind = greeting.kind(), error = %e, "failed to serialize greeting");
                return Err(DeliveryError::Closed);
            }
        };

        let id = self.allocate_id();
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscriber.deliver(&frame)?;
        subs.insert(id, Box::new(subscriber));
        tracing::debug!(subscription = %id, total = subs.len(), "subscriber added");
        Ok(id)
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let removed = subs.remove(&id).is_some();
        if removed {
            tracing::debug!(subscription = %id, total = subs.len(), "subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Deliver a message to every subscriber registered right now
    pub fn publish(&self, message: &BroadcastMessage) -> PublishReport {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(kind = message.kind(), error = %e, "failed to serialize message");
                return PublishReport::default();
            }
        };
        self.publish_frame(&frame)
    }

    /// Deliver an already serialized frame
    pub fn publish_frame(&self, frame: &Frame) -> PublishReport {
        let mut report = PublishReport::default();
        let mut failed = Vec::new();

        {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (id, subscriber) in subs.iter() {
                match subscriber.deliver(frame) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => failed.push((*id, e)),
                }
            }
        }

        if !failed.is_empty() {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            for (id, error) in failed {
                if subs.remove(&id).is_some() {
                    report.dropped += 1;
                    match error {
                        DeliveryError::Lagging => tracing::warn!(
                            subscription = %id,
                            kind = frame.kind(),
                            "dropping subscriber that is not keeping up"
                        ),
                        DeliveryError::Closed => {
                            tracing::debug!(subscription = %id, "dropping closed subscriber")
                        }
                    }
                }
            }
        }

        tracing::trace!(
            kind = frame.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            "published"
        );
        report
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
