//! Shared bus connection and signal dispatch.
//!
//! A [`BusConnection`] is created once by the application and handed to
//! every proxy. It wraps a [`Transport`] (the real D-Bus backend or an
//! in-memory test double) and owns the dispatcher that fans inbound signals
//! out to per-proxy channels.

use async_trait::async_trait;
use log::{debug, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use zvariant::{OwnedObjectPath, OwnedValue};

use crate::Result;
use crate::api::models::{BusType, GeoclueError};
use crate::dbus::zbus_transport::ZbusTransport;

/// The bus primitives the binding layer is built on.
///
/// Names are passed as plain strings; implementations validate them.
/// Errors are reported as [`zbus::Error`] so that remote faults reach the
/// caller unchanged.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invokes `interface.member` on `path` and returns the reply arguments.
    async fn call_method(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        member: &str,
        args: Vec<OwnedValue>,
    ) -> zbus::Result<Vec<OwnedValue>>;

    /// Reads a property through `org.freedesktop.DBus.Properties.Get`.
    async fn get_property(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        name: &str,
    ) -> zbus::Result<OwnedValue>;

    /// Writes a property through `org.freedesktop.DBus.Properties.Set`.
    async fn set_property(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        name: &str,
        value: OwnedValue,
    ) -> zbus::Result<()>;

    /// Registers a signal match rule with the bus.
    async fn add_match(&self, filter: &SignalFilter) -> zbus::Result<()>;

    /// Removes a match rule previously added with [`Transport::add_match`].
    async fn remove_match(&self, filter: &SignalFilter) -> zbus::Result<()>;

    /// Hands the transport the sink it must push inbound signals into.
    ///
    /// Called exactly once, when the owning [`BusConnection`] is built.
    fn attach(&self, sink: SignalSink) -> Result<()>;

    /// Releases the underlying connection.
    async fn close(&self) -> zbus::Result<()>;
}

/// An inbound signal.
#[derive(Debug, Clone)]
pub struct Notification {
    path: OwnedObjectPath,
    interface: String,
    member: String,
    body: Arc<Vec<OwnedValue>>,
}

impl Notification {
    /// Creates a notification emitted by `path`.
    pub fn new(
        path: OwnedObjectPath,
        interface: impl Into<String>,
        member: impl Into<String>,
        body: Vec<OwnedValue>,
    ) -> Self {
        Self {
            path,
            interface: interface.into(),
            member: member.into(),
            body: Arc::new(body),
        }
    }

    /// Object path of the emitter.
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// Interface the signal belongs to.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Signal name.
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Positional signal arguments.
    pub fn body(&self) -> &[OwnedValue] {
        &self.body
    }
}

/// Selects which signals reach a subscription.
///
/// Matches every signal emitted at or below `path_namespace`, optionally
/// narrowed to one interface and one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFilter {
    path_namespace: OwnedObjectPath,
    interface: Option<String>,
    member: Option<String>,
}

impl SignalFilter {
    /// Matches all signals under `path_namespace`.
    pub fn new(path_namespace: OwnedObjectPath) -> Self {
        Self {
            path_namespace,
            interface: None,
            member: None,
        }
    }

    /// Restricts the filter to one interface.
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Restricts the filter to one signal name.
    #[must_use]
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn path_namespace(&self) -> &OwnedObjectPath {
        &self.path_namespace
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    /// Returns `true` if `notification` passes this filter.
    pub fn matches(&self, notification: &Notification) -> bool {
        if self
            .interface
            .as_deref()
            .is_some_and(|i| i != notification.interface())
        {
            return false;
        }
        if self
            .member
            .as_deref()
            .is_some_and(|m| m != notification.member())
        {
            return false;
        }

        let ns = self.path_namespace.as_str();
        let path = notification.path().as_str();
        ns == "/"
            || path == ns
            || path
                .strip_prefix(ns)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Renders the filter as a D-Bus match rule.
    pub fn match_rule(&self) -> String {
        let mut rule = String::from("type='signal'");
        if let Some(interface) = &self.interface {
            rule.push_str(&format!(",interface='{interface}'"));
        }
        if let Some(member) = &self.member {
            rule.push_str(&format!(",member='{member}'"));
        }
        rule.push_str(&format!(",path_namespace='{}'", self.path_namespace.as_str()));
        rule
    }
}

struct Route {
    id: u64,
    filter: SignalFilter,
    tx: mpsc::Sender<Notification>,
}

/// Fans inbound signals out to registered channels.
#[derive(Default)]
pub(crate) struct Dispatcher {
    next_id: AtomicU64,
    routes: Mutex<Vec<Route>>,
}

impl Dispatcher {
    fn routes(&self) -> MutexGuard<'_, Vec<Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, filter: SignalFilter, tx: mpsc::Sender<Notification>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.routes().push(Route { id, filter, tx });
        id
    }

    pub(crate) fn unregister(&self, id: u64) -> bool {
        let mut routes = self.routes();
        let before = routes.len();
        routes.retain(|r| r.id != id);
        routes.len() != before
    }

    /// Delivers `notification` to every matching route, in registration order.
    ///
    /// Never blocks: a full channel loses this notification.
    pub(crate) fn dispatch(&self, notification: &Notification) -> usize {
        let mut delivered = 0;
        self.routes().retain(|route| {
            if !route.filter.matches(notification) {
                return true;
            }
            match route.tx.try_send(notification.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Subscription {} is full, dropping {} from {}",
                        route.id,
                        notification.member(),
                        notification.path().as_str()
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscription {} receiver gone, removing route", route.id);
                    false
                }
            }
        });
        delivered
    }

    pub(crate) fn clear(&self) {
        self.routes().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.routes().len()
    }
}

/// Handle a [`Transport`] uses to push inbound signals into its connection.
///
/// Holds only a weak reference, so a transport's background pump does not
/// keep a dropped connection alive.
#[derive(Clone)]
pub struct SignalSink {
    dispatcher: Weak<Dispatcher>,
}

impl SignalSink {
    /// Delivers a signal. Returns `false` once the connection is gone.
    pub fn deliver(&self, notification: Notification) -> bool {
        match self.dispatcher.upgrade() {
            Some(dispatcher) => {
                dispatcher.dispatch(&notification);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for SignalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSink")
            .field("attached", &(self.dispatcher.strong_count() > 0))
            .finish()
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    closed: AtomicBool,
}

/// Shared handle to the message bus.
///
/// Cloning is cheap; every clone refers to the same connection. The
/// connection stays open until [`BusConnection::shutdown`] is called, after
/// which every operation fails with [`GeoclueError::ConnectionClosed`].
///
/// # Example
///
/// ```no_run
/// use geoclue::{BusConnection, Manager};
///
/// # async fn example() -> geoclue::Result<()> {
/// let conn = BusConnection::system().await?;
/// let manager = Manager::new(&conn)?;
/// println!("in use: {}", manager.in_use().await?);
/// conn.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BusConnection {
    inner: Arc<Inner>,
}

impl BusConnection {
    /// Connects to the system bus.
    pub async fn system() -> Result<Self> {
        Self::connect(BusType::System).await
    }

    /// Connects to the session bus.
    pub async fn session() -> Result<Self> {
        Self::connect(BusType::Session).await
    }

    /// Connects to the given bus.
    pub async fn connect(bus: BusType) -> Result<Self> {
        let conn = match bus {
            BusType::System => zbus::Connection::system().await?,
            BusType::Session => zbus::Connection::session().await?,
        };
        Self::from_zbus(conn)
    }

    /// Wraps an existing zbus connection.
    ///
    /// Must be called from within a tokio runtime, which runs the signal pump.
    pub fn from_zbus(conn: zbus::Connection) -> Result<Self> {
        Self::with_transport(ZbusTransport::new(conn))
    }

    /// Builds a connection over any [`Transport`].
    pub fn with_transport<T: Transport + 'static>(transport: T) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let dispatcher = Arc::new(Dispatcher::default());
        transport.attach(SignalSink {
            dispatcher: Arc::downgrade(&dispatcher),
        })?;

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                dispatcher,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns `true` after [`BusConnection::shutdown`].
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of live signal subscriptions on this connection.
    pub fn subscription_count(&self) -> usize {
        self.inner.dispatcher.len()
    }

    /// Closes the connection.
    ///
    /// Every open subscription channel is closed. Calling this twice is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("Shutting down bus connection");
        self.inner.dispatcher.clear();
        self.inner.transport.close().await?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<&dyn Transport> {
        if self.is_closed() {
            return Err(GeoclueError::ConnectionClosed);
        }
        Ok(self.inner.transport.as_ref())
    }

    pub(crate) async fn call_method(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        member: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Vec<OwnedValue>> {
        let transport = self.ensure_open()?;
        Ok(transport
            .call_method(destination, path, interface, member, args)
            .await?)
    }

    pub(crate) async fn get_property(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        name: &str,
    ) -> Result<OwnedValue> {
        let transport = self.ensure_open()?;
        Ok(transport
            .get_property(destination, path, interface, name)
            .await?)
    }

    pub(crate) async fn set_property(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        name: &str,
        value: OwnedValue,
    ) -> Result<()> {
        let transport = self.ensure_open()?;
        Ok(transport
            .set_property(destination, path, interface, name, value)
            .await?)
    }

    /// Attaches a channel to the dispatcher and registers `filter` with the bus.
    pub(crate) async fn attach_channel(
        &self,
        filter: &SignalFilter,
        tx: mpsc::Sender<Notification>,
    ) -> Result<u64> {
        let transport = self.ensure_open()?;
        // route first so nothing matched by the new rule can slip past
        let id = self.inner.dispatcher.register(filter.clone(), tx);
        if let Err(e) = transport.add_match(filter).await {
            self.inner.dispatcher.unregister(id);
            return Err(e.into());
        }
        debug!("Attached subscription {id}: {}", filter.match_rule());
        Ok(id)
    }

    /// Detaches a channel and drops its match rule.
    ///
    /// The route is removed even if the bus call fails. After shutdown the
    /// rule died with the connection, so only the route is removed.
    pub(crate) async fn detach_channel(&self, id: u64, filter: &SignalFilter) -> Result<()> {
        self.inner.dispatcher.unregister(id);
        debug!("Detached subscription {id}");
        if self.is_closed() {
            return Ok(());
        }
        self.inner.transport.remove_match(filter).await?;
        Ok(())
    }
}

impl fmt::Debug for BusConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConnection")
            .field("closed", &self.is_closed())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}
