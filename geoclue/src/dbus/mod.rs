//! The remote-object binding layer.
//!
//! This module maps typed Rust calls onto D-Bus: a shared
//! [`BusConnection`], the [`Transport`] seam it runs on, [`ObjectProxy`] for
//! property access and method calls, and per-proxy [`SignalChannel`]
//! subscriptions.

mod connection;
mod proxy;
mod subscription;
mod value;
mod zbus_transport;

pub use connection::{BusConnection, Notification, SignalFilter, SignalSink, Transport};
pub use proxy::ObjectProxy;
pub use subscription::SignalChannel;
pub(crate) use subscription::Subscription;
pub use value::{RemoteValue, is_null_object};
pub(crate) use value::decode as decode_value;
pub use zbus_transport::ZbusTransport;
