//! [`Transport`] backed by a real zbus connection.
//!
//! Method calls and property access are plain round-trips on the shared
//! connection. Signals are read by a background task from the connection's
//! message stream and pushed into the [`SignalSink`].

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use zbus::fdo::DBusProxy;
use zbus::message::Type as MessageType;
use zbus::{Connection, MatchRule, Message, MessageStream};
use zvariant::{OwnedObjectPath, OwnedValue, Structure, StructureBuilder, Value};

use crate::api::models::GeoclueError;
use crate::dbus::connection::{Notification, SignalFilter, SignalSink, Transport};

const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// D-Bus transport over a [`zbus::Connection`].
pub struct ZbusTransport {
    conn: Connection,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ZbusTransport {
    /// Wraps `conn`. The signal pump starts when the transport is attached.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            pump: Mutex::new(None),
        }
    }

    /// The underlying zbus connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn stop_pump(&self) {
        let task = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl fmt::Debug for ZbusTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZbusTransport")
            .field("conn", &self.conn)
            .finish_non_exhaustive()
    }
}

impl Drop for ZbusTransport {
    fn drop(&mut self) {
        self.stop_pump();
    }
}

#[async_trait]
impl Transport for ZbusTransport {
    async fn call_method(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        member: &str,
        args: Vec<OwnedValue>,
    ) -> zbus::Result<Vec<OwnedValue>> {
        debug!("Calling {interface}.{member} on {path}");
        let reply = if args.is_empty() {
            self.conn
                .call_method(Some(destination), path, Some(interface), member, &())
                .await?
        } else {
            let body = args
                .into_iter()
                .fold(StructureBuilder::new(), |builder, arg| {
                    builder.append_field(Value::from(arg))
                })
                .build()?;
            self.conn
                .call_method(Some(destination), path, Some(interface), member, &body)
                .await?
        };
        decode_body(&reply)
    }

    async fn get_property(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        name: &str,
    ) -> zbus::Result<OwnedValue> {
        let reply = self
            .conn
            .call_method(
                Some(destination),
                path,
                Some(PROPERTIES_INTERFACE),
                "Get",
                &(interface, name),
            )
            .await?;
        let value: OwnedValue = reply.body().deserialize()?;
        Ok(value)
    }

    async fn set_property(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        name: &str,
        value: OwnedValue,
    ) -> zbus::Result<()> {
        self.conn
            .call_method(
                Some(destination),
                path,
                Some(PROPERTIES_INTERFACE),
                "Set",
                &(interface, name, Value::from(value)),
            )
            .await?;
        Ok(())
    }

    async fn add_match(&self, filter: &SignalFilter) -> zbus::Result<()> {
        let rule = filter.match_rule();
        let dbus = DBusProxy::new(&self.conn).await?;
        dbus.add_match_rule(MatchRule::try_from(rule.as_str())?)
            .await?;
        Ok(())
    }

    async fn remove_match(&self, filter: &SignalFilter) -> zbus::Result<()> {
        let rule = filter.match_rule();
        let dbus = DBusProxy::new(&self.conn).await?;
        dbus.remove_match_rule(MatchRule::try_from(rule.as_str())?)
            .await?;
        Ok(())
    }

    fn attach(&self, sink: SignalSink) -> crate::Result<()> {
        let handle = Handle::try_current().map_err(|e| GeoclueError::Runtime(e.to_string()))?;
        let stream = MessageStream::from(&self.conn);
        let task = handle.spawn(pump_signals(stream, sink));

        let previous = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    async fn close(&self) -> zbus::Result<()> {
        self.stop_pump();
        self.conn.clone().close().await
    }
}

/// Forwards every signal on the connection to `sink` until either side goes away.
async fn pump_signals(mut stream: MessageStream, sink: SignalSink) {
    debug!("Signal pump started");
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Failed to read message from bus: {e}");
                continue;
            }
        };
        if msg.message_type() != MessageType::Signal {
            continue;
        }
        let Some(notification) = notification_from_message(&msg) else {
            continue;
        };
        if !sink.deliver(notification) {
            debug!("Connection dropped, stopping signal pump");
            return;
        }
    }
    warn!("Bus message stream ended");
}

fn notification_from_message(msg: &Message) -> Option<Notification> {
    let header = msg.header();
    let path = OwnedObjectPath::from(header.path()?.clone());
    let interface = header.interface()?.to_string();
    let member = header.member()?.to_string();

    let body = match decode_body(msg) {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to decode {interface}.{member} signal body: {e}");
            Vec::new()
        }
    };
    Some(Notification::new(path, interface, member, body))
}

/// Splits a message body into its positional arguments.
fn decode_body(msg: &Message) -> zbus::Result<Vec<OwnedValue>> {
    let body = msg.body();
    if body.signature().to_string().is_empty() {
        return Ok(Vec::new());
    }
    let structure: Structure<'_> = body.deserialize()?;
    structure
        .into_fields()
        .into_iter()
        .map(|field| OwnedValue::try_from(field).map_err(zbus::Error::from))
        .collect()
}
