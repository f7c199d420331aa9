//! Bounded waits on D-Bus signals.
//!
//! GeoClue publishes some values only after an asynchronous event: a
//! client's `Location` property stays at the null object `/` until the
//! first `LocationUpdated` signal after `Start()`. The functions here turn
//! that into a single call that resolves once the value is populated, or
//! fails once a deadline passes.
//!
//! # Ordering
//!
//! 1. The gate property is checked before anything is registered, so an
//!    inactive client costs one property read and no subscription.
//! 2. The subscription is armed, then the target is read once more. An
//!    update that landed between the gate check and the subscribe is caught
//!    here instead of costing a full timeout.
//! 3. Each notification triggers a re-read. A notification that leaves the
//!    value at the null object does not resolve the wait; it keeps going
//!    against the same deadline.
//!
//! Every read after arming is raced against the deadline, so a service that
//! never answers still ends in a timeout.
//!
//! Each wait owns a private subscription, separate from the one a caller
//! opens with [`ObjectProxy::subscribe`]. Concurrent waits on the same
//! proxy do not share a channel, and a caller's channel is left untouched.
//! The private subscription is released on every exit path once armed.

use futures::future::Fuse;
use futures::{FutureExt, select_biased};
use futures_timer::Delay;
use log::{debug, warn};
use std::pin::{Pin, pin};
use std::time::{Duration, Instant};
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::models::GeoclueError;
use crate::dbus::{ObjectProxy, SignalChannel, Subscription, is_null_object};

type Deadline<'a> = Pin<&'a mut Fuse<Delay>>;

/// What to wait for on a proxy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PathWait<'a> {
    /// Boolean property that must be `true` for the wait to make sense.
    pub gate: &'a str,
    /// Object-path property to resolve.
    pub target: &'a str,
    /// Signal member announcing that `target` may have changed.
    pub signal: &'a str,
    /// How long to wait overall.
    pub timeout: Duration,
}

/// Waits until `wait.target` on `proxy` holds a real object path.
///
/// # Errors
///
/// - `GeoclueError::PreconditionFailed` if `wait.gate` is `false`
/// - `GeoclueError::Timeout` if no populating signal arrives in time, or a
///   property read is still pending when the deadline fires
/// - `GeoclueError::ConnectionClosed` if the connection shuts down mid-wait
/// - `GeoclueError::SubscriptionClosed` if the signal channel closes while
///   the connection stays open
/// - any error from the property reads
pub(crate) async fn wait_for_object_path(
    proxy: &ObjectProxy,
    wait: PathWait<'_>,
) -> Result<OwnedObjectPath> {
    let active: bool = proxy.get(wait.gate).await?;
    if !active {
        debug!("{} is false, not waiting for {}", wait.gate, wait.target);
        return Err(GeoclueError::PreconditionFailed(format!(
            "{} must be true before reading {}",
            wait.gate, wait.target
        )));
    }

    let conn = proxy.connection();
    let subscription = Subscription::default();
    let channel = subscription.subscribe(conn, proxy.signal_filter()).await?;
    debug!(
        "Subscribed to {} on {} (subscription {})",
        wait.signal,
        proxy.path().as_str(),
        channel.id()
    );

    let outcome = race(proxy, &channel, wait).await;
    let released = subscription.unsubscribe(conn).await;

    match (outcome, released) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
        (Ok(path), Ok(())) => Ok(path),
    }
}

async fn race(
    proxy: &ObjectProxy,
    channel: &SignalChannel,
    wait: PathWait<'_>,
) -> Result<OwnedObjectPath> {
    let started = Instant::now();
    let mut deadline = pin!(Delay::new(wait.timeout).fuse());

    let current = read_target(proxy, wait, deadline.as_mut()).await?;
    if !is_null_object(current.as_str()) {
        debug!("{} already populated: {}", wait.target, current.as_str());
        return Ok(current);
    }

    loop {
        // deadline is polled first: once it has fired, no late signal may win
        let notification = select_biased! {
            _ = deadline => return Err(timed_out(wait)),
            notification = channel.recv().fuse() => notification,
        };
        let Some(notification) = notification else {
            if proxy.connection().is_closed() {
                return Err(GeoclueError::ConnectionClosed);
            }
            return Err(GeoclueError::SubscriptionClosed(wait.signal.to_owned()));
        };
        if notification.member() != wait.signal {
            continue;
        }

        let path = read_target(proxy, wait, deadline.as_mut()).await?;
        if is_null_object(path.as_str()) {
            debug!(
                "{} still unpopulated after {} ({:?} elapsed)",
                wait.target,
                wait.signal,
                started.elapsed()
            );
            continue;
        }
        debug!("{} resolved to {}", wait.target, path.as_str());
        return Ok(path);
    }
}

/// Reads the target property, giving up when `deadline` fires first.
async fn read_target(
    proxy: &ObjectProxy,
    wait: PathWait<'_>,
    mut deadline: Deadline<'_>,
) -> Result<OwnedObjectPath> {
    select_biased! {
        _ = deadline => Err(timed_out(wait)),
        path = proxy.get::<OwnedObjectPath>(wait.target).fuse() => path,
    }
}

fn timed_out(wait: PathWait<'_>) -> GeoclueError {
    warn!("Timed out after {:?} waiting for {}", wait.timeout, wait.signal);
    GeoclueError::Timeout(wait.timeout)
}
