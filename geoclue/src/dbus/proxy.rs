//! Generic proxy for one remote object.
//!
//! [`ObjectProxy`] binds a destination, interface and object path to the
//! shared [`BusConnection`] and offers typed property access, method
//! invocation and a signal subscription. The GeoClue entity types are thin
//! facades that each hold one.

use log::debug;
use std::sync::Arc;
use zbus::names::{BusName, InterfaceName};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue};

use crate::Result;
use crate::api::models::GeoclueError;
use crate::dbus::connection::{BusConnection, SignalFilter};
use crate::dbus::subscription::{SignalChannel, Subscription};
use crate::dbus::value::{RemoteValue, decode, split_member};

/// A remote object addressed by (destination, interface, path).
///
/// The address is fixed at construction. Clones address the same object and
/// share one subscription slot.
#[derive(Debug, Clone)]
pub struct ObjectProxy {
    conn: BusConnection,
    destination: String,
    interface: String,
    path: OwnedObjectPath,
    subscription: Arc<Subscription>,
}

impl ObjectProxy {
    /// Creates a proxy, validating every name up front.
    ///
    /// # Errors
    ///
    /// Returns `GeoclueError::InvalidProxy` if a name is empty or malformed,
    /// and `GeoclueError::ConnectionClosed` if `conn` has been shut down.
    pub fn new(
        conn: &BusConnection,
        destination: &str,
        interface: &str,
        path: &str,
    ) -> Result<Self> {
        if destination.is_empty() || interface.is_empty() || path.is_empty() {
            return Err(GeoclueError::InvalidProxy(format!(
                "destination, interface and path must be non-empty (got {destination:?}, {interface:?}, {path:?})"
            )));
        }
        BusName::try_from(destination)
            .map_err(|e| GeoclueError::InvalidProxy(format!("bus name {destination}: {e}")))?;
        InterfaceName::try_from(interface)
            .map_err(|e| GeoclueError::InvalidProxy(format!("interface {interface}: {e}")))?;
        let path = ObjectPath::try_from(path)
            .map_err(|e| GeoclueError::InvalidProxy(format!("object path {path}: {e}")))?;

        if conn.is_closed() {
            return Err(GeoclueError::ConnectionClosed);
        }

        Ok(Self {
            conn: conn.clone(),
            destination: destination.to_owned(),
            interface: interface.to_owned(),
            path: OwnedObjectPath::from(path),
            subscription: Arc::new(Subscription::default()),
        })
    }

    pub fn connection(&self) -> &BusConnection {
        &self.conn
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// Resolves a member name to `(interface, member)`.
    ///
    /// Unqualified names belong to the proxy's own interface.
    fn resolve<'a>(&'a self, name: &'a str) -> Result<(&'a str, &'a str)> {
        if name.contains('.') {
            split_member(name)
        } else if name.is_empty() {
            Err(GeoclueError::InvalidMember(name.to_owned()))
        } else {
            Ok((self.interface.as_str(), name))
        }
    }

    /// Reads a property and coerces it to `T`.
    ///
    /// # Errors
    ///
    /// `GeoclueError::Dbus` if the bus call fails, `GeoclueError::TypeMismatch`
    /// if the value is not a `T`.
    pub async fn get<T: RemoteValue>(&self, name: &str) -> Result<T> {
        let (interface, member) = self.resolve(name)?;
        let value = self
            .conn
            .get_property(&self.destination, self.path.as_str(), interface, member)
            .await?;
        decode(name, &value)
    }

    /// Writes a property.
    pub async fn set<T: RemoteValue>(&self, name: &str, value: T) -> Result<()> {
        let (interface, member) = self.resolve(name)?;
        let value = value.into_value()?;
        debug!("Setting {interface}.{member} on {}", self.path.as_str());
        self.conn
            .set_property(
                &self.destination,
                self.path.as_str(),
                interface,
                member,
                value,
            )
            .await
    }

    async fn invoke(&self, method: &str, args: Vec<OwnedValue>) -> Result<Vec<OwnedValue>> {
        let (interface, member) = self.resolve(method)?;
        self.conn
            .call_method(
                &self.destination,
                self.path.as_str(),
                interface,
                member,
                args,
            )
            .await
    }

    /// Calls a method, discarding any return values.
    pub async fn call(&self, method: &str, args: Vec<OwnedValue>) -> Result<()> {
        self.invoke(method, args).await?;
        Ok(())
    }

    /// Calls a method and decodes its first return value.
    pub async fn call_with_return<T: RemoteValue>(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<T> {
        let values = self.invoke(method, args).await?;
        match values.as_slice() {
            [first, ..] => decode(method, first),
            [] => Err(missing_return(method, T::WIRE_SIGNATURE)),
        }
    }

    /// Calls a method and decodes its first two return values.
    pub async fn call_with_return2<A: RemoteValue, B: RemoteValue>(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<(A, B)> {
        let values = self.invoke(method, args).await?;
        match values.as_slice() {
            [first, second, ..] => Ok((decode(method, first)?, decode(method, second)?)),
            _ => Err(GeoclueError::TypeMismatch {
                name: method.to_owned(),
                expected: "two return values",
                found: format!("{} return values", values.len()),
            }),
        }
    }

    /// The filter this proxy subscribes with: its own interface, at or below its path.
    pub fn signal_filter(&self) -> SignalFilter {
        SignalFilter::new(self.path.clone()).with_interface(self.interface.clone())
    }

    /// Opens the proxy's signal channel, or returns the one already open.
    pub async fn subscribe(&self) -> Result<SignalChannel> {
        self.subscription
            .subscribe(&self.conn, self.signal_filter())
            .await
    }

    /// Closes the proxy's signal channel. A no-op when not subscribed.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.subscription.unsubscribe(&self.conn).await
    }

    /// Returns `true` while a subscription is live.
    pub async fn is_subscribed(&self) -> bool {
        self.subscription.is_active().await
    }
}

fn missing_return(method: &str, expected: &'static str) -> GeoclueError {
    GeoclueError::TypeMismatch {
        name: method.to_owned(),
        expected,
        found: "no return value".into(),
    }
}
