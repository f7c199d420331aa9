//! Per-proxy signal subscriptions.
//!
//! A proxy owns at most one live subscription. Subscribing again while one
//! is live hands back the same [`SignalChannel`]; unsubscribing detaches the
//! channel so that the next subscribe starts from a fresh one.

use log::debug;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::Result;
use crate::dbus::connection::{BusConnection, Notification, SignalFilter};
use crate::types::constants::signals;

/// Receiving end of a subscription.
///
/// Clones share the same underlying queue. The channel reports closed
/// (`recv` returns `None`) once it has been unsubscribed and drained, or
/// when the connection is shut down.
#[derive(Debug, Clone)]
pub struct SignalChannel {
    inner: Arc<ChannelInner>,
}

#[derive(Debug)]
struct ChannelInner {
    id: u64,
    rx: Mutex<mpsc::Receiver<Notification>>,
}

impl SignalChannel {
    fn new(id: u64, rx: mpsc::Receiver<Notification>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                id,
                rx: Mutex::new(rx),
            }),
        }
    }

    /// Identifier of the subscription that created this channel.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns `true` if both handles refer to the same channel.
    pub fn same_channel(&self, other: &SignalChannel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Waits for the next notification.
    pub async fn recv(&self) -> Option<Notification> {
        self.inner.rx.lock().await.recv().await
    }

    /// Takes a queued notification without waiting.
    ///
    /// Returns `None` if nothing is queued or another task is receiving.
    pub fn try_recv(&self) -> Option<Notification> {
        self.inner.rx.try_lock().ok()?.try_recv().ok()
    }
}

impl PartialEq for SignalChannel {
    fn eq(&self, other: &Self) -> bool {
        self.same_channel(other)
    }
}

impl Eq for SignalChannel {}

#[derive(Debug)]
struct Active {
    id: u64,
    filter: SignalFilter,
    channel: SignalChannel,
}

/// The subscription slot of one proxy.
#[derive(Debug, Default)]
pub(crate) struct Subscription {
    active: Mutex<Option<Active>>,
}

impl Subscription {
    /// Returns the live channel, or registers `filter` and opens a new one.
    pub(crate) async fn subscribe(
        &self,
        conn: &BusConnection,
        filter: SignalFilter,
    ) -> Result<SignalChannel> {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.as_ref() {
            debug!("Reusing subscription {}", existing.id);
            return Ok(existing.channel.clone());
        }

        let (tx, rx) = mpsc::channel(signals::CHANNEL_CAPACITY);
        let id = conn.attach_channel(&filter, tx).await?;
        let channel = SignalChannel::new(id, rx);
        *active = Some(Active {
            id,
            filter,
            channel: channel.clone(),
        });
        Ok(channel)
    }

    /// Detaches the live channel, if any.
    ///
    /// The slot is cleared before the match rule is removed, so a failure
    /// to remove the rule still leaves the proxy unsubscribed.
    pub(crate) async fn unsubscribe(&self, conn: &BusConnection) -> Result<()> {
        let Some(active) = self.active.lock().await.take() else {
            return Ok(());
        };
        conn.detach_channel(active.id, &active.filter).await
    }

    pub(crate) async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }
}
