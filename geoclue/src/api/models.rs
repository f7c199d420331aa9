use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::types::constants::timeouts;

/// Level of accuracy requested by, or allowed for, a client.
///
/// These values are the `GClueAccuracyLevel` codes used on the bus.
/// Use `AccuracyLevel::from(code)` to convert the raw `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccuracyLevel {
    /// Accuracy level unknown or unset.
    None,
    /// Country-level accuracy.
    Country,
    /// City-level accuracy.
    City,
    /// Neighborhood-level accuracy.
    Neighborhood,
    /// Street-level accuracy.
    Street,
    /// Exact accuracy. Typically requires a GPS receiver.
    Exact,
    /// Unknown level code not mapped to a specific variant.
    Other(u32),
}

impl From<u32> for AccuracyLevel {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Country,
            4 => Self::City,
            5 => Self::Neighborhood,
            6 => Self::Street,
            8 => Self::Exact,
            v => Self::Other(v),
        }
    }
}

impl From<AccuracyLevel> for u32 {
    fn from(level: AccuracyLevel) -> Self {
        match level {
            AccuracyLevel::None => 0,
            AccuracyLevel::Country => 1,
            AccuracyLevel::City => 4,
            AccuracyLevel::Neighborhood => 5,
            AccuracyLevel::Street => 6,
            AccuracyLevel::Exact => 8,
            AccuracyLevel::Other(v) => v,
        }
    }
}

impl Display for AccuracyLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Country => write!(f, "country"),
            Self::City => write!(f, "city"),
            Self::Neighborhood => write!(f, "neighborhood"),
            Self::Street => write!(f, "street"),
            Self::Exact => write!(f, "exact"),
            Self::Other(v) => write!(f, "unknown level ({v})"),
        }
    }
}

/// Which message bus to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusType {
    /// The system bus, where the GeoClue2 service normally lives.
    #[default]
    System,
    /// The per-user session bus.
    Session,
}

/// Configuration for a [`GeoClue`](crate::GeoClue) handle.
///
/// # Examples
///
/// ```
/// use geoclue::GeoClueConfig;
/// use std::time::Duration;
///
/// let config = GeoClueConfig::new()
///     .with_location_timeout(Duration::from_secs(30))
///     .with_desktop_id("org.example.Maps");
///
/// assert_eq!(config.location_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoClueConfig {
    /// Bus the service is reached on.
    pub bus: BusType,
    /// How long [`Client::location`](crate::Client::location) waits for the
    /// first `LocationUpdated` signal.
    pub location_timeout: Duration,
    /// Desktop id written to every client handed out by
    /// [`GeoClue::client`](crate::GeoClue::client). GeoClue refuses to start
    /// clients without one.
    pub desktop_id: Option<String>,
}

impl GeoClueConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the bus to connect to.
    #[must_use]
    pub fn with_bus(mut self, bus: BusType) -> Self {
        self.bus = bus;
        self
    }

    /// Sets the location wait timeout.
    #[must_use]
    pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
        self.location_timeout = timeout;
        self
    }

    /// Sets the desktop id applied to new clients.
    #[must_use]
    pub fn with_desktop_id(mut self, desktop_id: impl Into<String>) -> Self {
        self.desktop_id = Some(desktop_id.into());
        self
    }
}

impl Default for GeoClueConfig {
    fn default() -> Self {
        Self {
            bus: BusType::System,
            location_timeout: timeouts::location_timeout(),
            desktop_id: None,
        }
    }
}

/// Snapshot of the manager's properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerInfo {
    /// Whether any application is currently using the service.
    pub in_use: bool,
    /// The level of available accuracy.
    pub available_accuracy_level: AccuracyLevel,
}

/// Snapshot of a client's properties.
///
/// `location` is `None` while the client has not received a fix yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Object path of the client.
    pub path: String,
    /// Current location, if populated.
    pub location: Option<LocationInfo>,
    /// Distance threshold in meters.
    pub distance_threshold: u32,
    /// Time threshold in seconds.
    pub time_threshold: u32,
    /// Desktop file id of the application.
    pub desktop_id: String,
    /// Accuracy requested by the client.
    pub requested_accuracy_level: AccuracyLevel,
    /// Whether the client is started.
    pub active: bool,
}

/// Snapshot of a location object's properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    /// Object path of the location.
    pub path: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Accuracy of the fix in meters.
    pub accuracy: f64,
    /// Altitude in meters, `f64::MIN` when unknown.
    pub altitude: f64,
    /// Speed in meters per second, `-1.0` when unknown.
    pub speed: f64,
    /// Heading in degrees clockwise from North, `-1.0` when unknown.
    pub heading: f64,
    /// Human-readable description, possibly empty.
    pub description: String,
    /// When the fix was determined.
    pub timestamp: SystemTime,
}

/// Snapshot of an agent's properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// The global maximum accuracy allowed for all clients of this user.
    pub max_accuracy_level: AccuracyLevel,
}

/// Errors that can occur while talking to GeoClue.
#[derive(Debug, Error)]
pub enum GeoclueError {
    /// A D-Bus communication error occurred (connection, permission, unknown member).
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    /// A value could not be encoded for the bus.
    #[error("value encoding error: {0}")]
    Variant(#[from] zvariant::Error),

    /// The bus returned a value of a different kind than expected.
    #[error("type mismatch for {name}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Property or method the value came from.
        name: String,
        /// Expected D-Bus signature.
        expected: &'static str,
        /// Actual D-Bus signature.
        found: String,
    },

    /// An operation that requires an active client was called on an inactive one.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// No qualifying signal arrived before the deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A proxy could not be constructed from the given names.
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),

    /// A qualified member name could not be split into interface and member.
    #[error("invalid member name: {0}")]
    InvalidMember(String),

    /// The bus connection was shut down.
    #[error("bus connection closed")]
    ConnectionClosed,

    /// A signal subscription closed while the connection stayed open.
    #[error("subscription to {0} closed")]
    SubscriptionClosed(String),

    /// The signal pump could not be started outside an async runtime.
    #[error("no async runtime available: {0}")]
    Runtime(String),
}
