//! In-memory bus for tests.
//!
//! [`MockBus`] implements [`Transport`] without a D-Bus daemon: properties
//! live in a map, methods are closures, match rules are recorded, and
//! signals are injected with [`MockBus::emit`]. [`MockBus::geoclue`] scripts
//! a minimal GeoClue2 service on top of that.
//!
//! ```
//! use geoclue::testing::{MockBus, CLIENT_PATH};
//! use geoclue::Manager;
//!
//! # async fn example() -> geoclue::Result<()> {
//! let bus = MockBus::geoclue()?;
//! let conn = bus.connection()?;
//!
//! let client = Manager::new(&conn)?.get_client().await?;
//! assert_eq!(client.path().as_str(), CLIENT_PATH);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use zbus::fdo;
use zvariant::{OwnedObjectPath, OwnedValue};

use crate::Result;
use crate::api::models::AccuracyLevel;
use crate::dbus::{BusConnection, Notification, RemoteValue, SignalFilter, SignalSink, Transport};
use crate::types::constants::{NULL_OBJECT_PATH, agent, client, location, manager};

/// Path [`MockBus::geoclue`] hands out from `GetClient`.
pub const CLIENT_PATH: &str = "/org/freedesktop/GeoClue2/Client/1";

/// Prefix of the location objects created by [`MockBus::publish_location`].
pub const LOCATION_PATH_PREFIX: &str = "/org/freedesktop/GeoClue2/Location";

/// A scripted method: receives the bus and the call arguments.
pub type MethodHandler =
    Arc<dyn Fn(&MockBus, &[OwnedValue]) -> zbus::Result<Vec<OwnedValue>> + Send + Sync>;

struct RecordedCall {
    method: String,
    args: Vec<OwnedValue>,
}

#[derive(Default)]
struct State {
    properties: HashMap<(String, String), OwnedValue>,
    stalled: HashSet<(String, String)>,
    methods: HashMap<(String, String), MethodHandler>,
    calls: Vec<RecordedCall>,
    matches: Vec<String>,
    matches_added: usize,
    sink: Option<SignalSink>,
    closed: bool,
    next_client: u32,
    next_location: u32,
}

/// An in-memory [`Transport`].
///
/// Clones share state, so a test can keep one handle while the
/// [`BusConnection`] owns another.
#[derive(Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<State>>,
}

impl MockBus {
    /// An empty bus: no properties, no methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a [`BusConnection`] over this bus.
    pub fn connection(&self) -> Result<BusConnection> {
        BusConnection::with_transport(self.clone())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a raw property value under its qualified name.
    pub fn insert_property(&self, path: &str, name: &str, value: OwnedValue) {
        self.state()
            .properties
            .insert((path.to_owned(), name.to_owned()), value);
    }

    /// Stores a typed property value under its qualified name.
    pub fn set_property<T: RemoteValue>(&self, path: &str, name: &str, value: T) -> Result<()> {
        self.insert_property(path, name, value.into_value()?);
        Ok(())
    }

    /// Returns a copy of a stored property.
    pub fn property(&self, path: &str, name: &str) -> Option<OwnedValue> {
        self.state()
            .properties
            .get(&(path.to_owned(), name.to_owned()))
            .and_then(|v| v.try_clone().ok())
    }

    /// Removes every property stored under `path`.
    pub fn remove_object(&self, path: &str) {
        self.state().properties.retain(|(p, _), _| p != path);
    }

    /// Makes reads of a property hang forever, like a service that never
    /// answers. Writes still go through.
    pub fn stall_property(&self, path: &str, name: &str) {
        self.state()
            .stalled
            .insert((path.to_owned(), name.to_owned()));
    }

    /// Scripts the method `method` (qualified) on `path`.
    pub fn on_method<F>(&self, path: &str, method: &str, handler: F)
    where
        F: Fn(&MockBus, &[OwnedValue]) -> zbus::Result<Vec<OwnedValue>> + Send + Sync + 'static,
    {
        self.state()
            .methods
            .insert((path.to_owned(), method.to_owned()), Arc::new(handler));
    }

    /// How many times `method` (qualified) was called, on any path.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Arguments of the most recent call to `method` (qualified).
    pub fn last_call_args(&self, method: &str) -> Option<Vec<OwnedValue>> {
        let state = self.state();
        let call = state.calls.iter().rev().find(|c| c.method == method)?;
        call.args.iter().map(|a| a.try_clone().ok()).collect()
    }

    /// Match rules currently registered.
    pub fn active_matches(&self) -> Vec<String> {
        self.state().matches.clone()
    }

    /// Match rules ever registered.
    pub fn matches_added(&self) -> usize {
        self.state().matches_added
    }

    /// Whether the owning connection has been shut down.
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Emits a signal to the attached connection.
    ///
    /// Returns `false` if no connection is attached any more.
    pub fn emit(
        &self,
        path: &str,
        interface: &str,
        member: &str,
        body: Vec<OwnedValue>,
    ) -> Result<bool> {
        let notification = Notification::new(
            OwnedObjectPath::try_from(path)?,
            interface,
            member,
            body,
        );
        let sink = self.state().sink.clone();
        Ok(sink.is_some_and(|sink| sink.deliver(notification)))
    }

    /// A bus with a scripted GeoClue2 service.
    ///
    /// - the manager hands out [`CLIENT_PATH`] from `GetClient` and fresh
    ///   paths from `CreateClient`
    /// - clients start with `Location` at `/` and refuse `Start()` until a
    ///   desktop id is set
    /// - [`MockBus::publish_location`] plays the role of a location source
    pub fn geoclue() -> Result<Self> {
        let bus = Self::new();

        bus.set_property(manager::PATH, manager::IN_USE, false)?;
        bus.set_property(
            manager::PATH,
            manager::AVAILABLE_ACCURACY_LEVEL,
            AccuracyLevel::Exact,
        )?;
        bus.set_property(agent::PATH, agent::MAX_ACCURACY_LEVEL, AccuracyLevel::Exact)?;
        bus.install_client(CLIENT_PATH)?;
        bus.state().next_client = 2;

        bus.on_method(manager::PATH, manager::GET_CLIENT, |bus, _| {
            bus.set_property(manager::PATH, manager::IN_USE, true)
                .map_err(failed)?;
            Ok(vec![object_path(CLIENT_PATH)?])
        });
        bus.on_method(manager::PATH, manager::CREATE_CLIENT, |bus, _| {
            let path = {
                let mut state = bus.state();
                let n = state.next_client;
                state.next_client += 1;
                format!("{}/{n}", client::PATH_PREFIX)
            };
            bus.install_client(&path).map_err(failed)?;
            Ok(vec![object_path(&path)?])
        });
        bus.on_method(manager::PATH, manager::DELETE_CLIENT, |bus, args| {
            let path = args
                .first()
                .and_then(|v| crate::dbus::decode_value::<OwnedObjectPath>("DeleteClient", v).ok())
                .ok_or_else(|| fdo::Error::InvalidArgs("expected an object path".into()))?;
            bus.remove_object(path.as_str());
            Ok(Vec::new())
        });
        bus.on_method(manager::PATH, manager::ADD_AGENT, |_, _| Ok(Vec::new()));
        bus.on_method(agent::PATH, agent::AUTHORIZE_APP, |_, args| {
            let [desktop_id, level] = args else {
                return Err(fdo::Error::InvalidArgs("expected (su)".into()).into());
            };
            let desktop_id: String = crate::dbus::decode_value("AuthorizeApp", desktop_id)
                .map_err(|e| fdo::Error::InvalidArgs(e.to_string()))?;
            let level: AccuracyLevel = crate::dbus::decode_value("AuthorizeApp", level)
                .map_err(|e| fdo::Error::InvalidArgs(e.to_string()))?;
            let authorized = !desktop_id.is_empty();
            Ok(vec![
                authorized.into_value().map_err(failed)?,
                level.into_value().map_err(failed)?,
            ])
        });

        Ok(bus)
    }

    fn install_client(&self, path: &str) -> Result<()> {
        self.set_property(
            path,
            client::LOCATION,
            OwnedObjectPath::try_from(NULL_OBJECT_PATH)?,
        )?;
        self.set_property(path, client::DISTANCE_THRESHOLD, 0u32)?;
        self.set_property(path, client::TIME_THRESHOLD, 0u32)?;
        self.set_property(path, client::DESKTOP_ID, String::new())?;
        self.set_property(path, client::REQUESTED_ACCURACY_LEVEL, AccuracyLevel::None)?;
        self.set_property(path, client::ACTIVE, false)?;

        let owned = path.to_owned();
        self.on_method(path, client::START, move |bus, _| {
            let desktop_id = bus
                .property(&owned, client::DESKTOP_ID)
                .and_then(|v| crate::dbus::decode_value::<String>(client::DESKTOP_ID, &v).ok())
                .unwrap_or_default();
            if desktop_id.is_empty() {
                return Err(fdo::Error::AccessDenied("desktop id is not set".into()).into());
            }
            bus.set_property(&owned, client::ACTIVE, true)
                .map_err(failed)?;
            Ok(Vec::new())
        });
        let owned = path.to_owned();
        self.on_method(path, client::STOP, move |bus, _| {
            bus.set_property(&owned, client::ACTIVE, false)
                .map_err(failed)?;
            Ok(Vec::new())
        });
        Ok(())
    }

    /// Creates a new location object and points `client_path` at it.
    ///
    /// Emits `LocationUpdated(old, new)` from the client and returns the
    /// new location's path.
    pub fn publish_location(
        &self,
        client_path: &str,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
    ) -> Result<OwnedObjectPath> {
        let path = self.stage_location(latitude, longitude, accuracy)?;
        let old = match self.property(client_path, client::LOCATION) {
            Some(v) => crate::dbus::decode_value::<OwnedObjectPath>(client::LOCATION, &v)?,
            None => OwnedObjectPath::try_from(NULL_OBJECT_PATH)?,
        };

        self.set_property(client_path, client::LOCATION, path.clone())?;
        self.emit(
            client_path,
            client::INTERFACE,
            client::LOCATION_UPDATED,
            vec![old.into_value()?, path.clone().into_value()?],
        )?;
        Ok(path)
    }

    /// Creates a location object without touching any client.
    pub fn stage_location(
        &self,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
    ) -> Result<OwnedObjectPath> {
        let n = {
            let mut state = self.state();
            state.next_location += 1;
            state.next_location
        };
        let path = format!("{LOCATION_PATH_PREFIX}/{n}");

        self.set_property(&path, location::LATITUDE, latitude)?;
        self.set_property(&path, location::LONGITUDE, longitude)?;
        self.set_property(&path, location::ACCURACY, accuracy)?;
        self.set_property(&path, location::ALTITUDE, f64::MIN)?;
        self.set_property(&path, location::SPEED, -1.0f64)?;
        self.set_property(&path, location::HEADING, -1.0f64)?;
        self.set_property(&path, location::DESCRIPTION, String::new())?;
        self.set_property(&path, location::TIMESTAMP, SystemTime::now())?;

        Ok(OwnedObjectPath::try_from(path)?)
    }
}

fn failed(e: crate::api::models::GeoclueError) -> zbus::Error {
    fdo::Error::Failed(e.to_string()).into()
}

fn object_path(path: &str) -> zbus::Result<OwnedValue> {
    OwnedObjectPath::try_from(path)?
        .into_value()
        .map_err(failed)
}

impl fmt::Debug for MockBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("MockBus")
            .field("properties", &state.properties.len())
            .field("methods", &state.methods.len())
            .field("matches", &state.matches)
            .field("closed", &state.closed)
            .finish()
    }
}

#[async_trait]
impl Transport for MockBus {
    async fn call_method(
        &self,
        _destination: &str,
        path: &str,
        interface: &str,
        member: &str,
        args: Vec<OwnedValue>,
    ) -> zbus::Result<Vec<OwnedValue>> {
        let method = format!("{interface}.{member}");
        let handler = self
            .state()
            .methods
            .get(&(path.to_owned(), method.clone()))
            .cloned();

        let result = match handler {
            Some(handler) => handler(self, &args),
            None => Err(fdo::Error::UnknownMethod(format!("{method} on {path}")).into()),
        };
        self.state().calls.push(RecordedCall { method, args });
        result
    }

    async fn get_property(
        &self,
        _destination: &str,
        path: &str,
        interface: &str,
        name: &str,
    ) -> zbus::Result<OwnedValue> {
        let key = (path.to_owned(), format!("{interface}.{name}"));
        let stalled = self.state().stalled.contains(&key);
        if stalled {
            futures::future::pending::<()>().await;
        }
        match self.state().properties.get(&key) {
            Some(value) => Ok(value.try_clone()?),
            None => Err(fdo::Error::UnknownProperty(format!("{interface}.{name} on {path}")).into()),
        }
    }

    async fn set_property(
        &self,
        _destination: &str,
        path: &str,
        interface: &str,
        name: &str,
        value: OwnedValue,
    ) -> zbus::Result<()> {
        let key = (path.to_owned(), format!("{interface}.{name}"));
        let mut state = self.state();
        let Some(existing) = state.properties.get(&key) else {
            return Err(fdo::Error::UnknownProperty(format!("{interface}.{name} on {path}")).into());
        };

        let expected = existing.value_signature().to_string();
        let found = value.value_signature().to_string();
        if expected != found {
            return Err(fdo::Error::InvalidArgs(format!(
                "{interface}.{name} has type {expected}, got {found}"
            ))
            .into());
        }
        state.properties.insert(key, value);
        Ok(())
    }

    async fn add_match(&self, filter: &SignalFilter) -> zbus::Result<()> {
        let mut state = self.state();
        state.matches.push(filter.match_rule());
        state.matches_added += 1;
        Ok(())
    }

    async fn remove_match(&self, filter: &SignalFilter) -> zbus::Result<()> {
        let rule = filter.match_rule();
        let mut state = self.state();
        if let Some(pos) = state.matches.iter().position(|m| *m == rule) {
            state.matches.remove(pos);
        }
        Ok(())
    }

    fn attach(&self, sink: SignalSink) -> Result<()> {
        self.state().sink = Some(sink);
        Ok(())
    }

    async fn close(&self) -> zbus::Result<()> {
        let mut state = self.state();
        state.closed = true;
        state.matches.clear();
        Ok(())
    }
}
