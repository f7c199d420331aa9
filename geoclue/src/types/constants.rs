//! Constants for the GeoClue2 D-Bus interface.
//!
//! Well-known bus names, object paths, interface names and member names
//! used when talking to the GeoClue2 service.

/// Well-known bus name of the GeoClue2 service.
pub const SERVICE: &str = "org.freedesktop.GeoClue2";

/// The D-Bus "null object" path.
pub const NULL_OBJECT_PATH: &str = "/";

/// `org.freedesktop.GeoClue2.Manager` members.
pub mod manager {
    pub const INTERFACE: &str = "org.freedesktop.GeoClue2.Manager";
    pub const PATH: &str = "/org/freedesktop/GeoClue2/Manager";

    pub const GET_CLIENT: &str = "org.freedesktop.GeoClue2.Manager.GetClient";
    pub const CREATE_CLIENT: &str = "org.freedesktop.GeoClue2.Manager.CreateClient";
    pub const DELETE_CLIENT: &str = "org.freedesktop.GeoClue2.Manager.DeleteClient";
    pub const ADD_AGENT: &str = "org.freedesktop.GeoClue2.Manager.AddAgent";

    pub const IN_USE: &str = "org.freedesktop.GeoClue2.Manager.InUse";
    pub const AVAILABLE_ACCURACY_LEVEL: &str =
        "org.freedesktop.GeoClue2.Manager.AvailableAccuracyLevel";
}

/// `org.freedesktop.GeoClue2.Client` members.
pub mod client {
    pub const INTERFACE: &str = "org.freedesktop.GeoClue2.Client";
    pub const PATH_PREFIX: &str = "/org/freedesktop/GeoClue2/Client";

    pub const START: &str = "org.freedesktop.GeoClue2.Client.Start";
    pub const STOP: &str = "org.freedesktop.GeoClue2.Client.Stop";

    pub const LOCATION: &str = "org.freedesktop.GeoClue2.Client.Location";
    pub const DISTANCE_THRESHOLD: &str = "org.freedesktop.GeoClue2.Client.DistanceThreshold";
    pub const TIME_THRESHOLD: &str = "org.freedesktop.GeoClue2.Client.TimeThreshold";
    pub const DESKTOP_ID: &str = "org.freedesktop.GeoClue2.Client.DesktopId";
    pub const REQUESTED_ACCURACY_LEVEL: &str =
        "org.freedesktop.GeoClue2.Client.RequestedAccuracyLevel";
    pub const ACTIVE: &str = "org.freedesktop.GeoClue2.Client.Active";

    /// Signal member emitted with `(old, new)` location paths.
    pub const LOCATION_UPDATED: &str = "LocationUpdated";
}

/// `org.freedesktop.GeoClue2.Location` members.
pub mod location {
    pub const INTERFACE: &str = "org.freedesktop.GeoClue2.Location";

    pub const LATITUDE: &str = "org.freedesktop.GeoClue2.Location.Latitude";
    pub const LONGITUDE: &str = "org.freedesktop.GeoClue2.Location.Longitude";
    pub const ACCURACY: &str = "org.freedesktop.GeoClue2.Location.Accuracy";
    pub const ALTITUDE: &str = "org.freedesktop.GeoClue2.Location.Altitude";
    pub const SPEED: &str = "org.freedesktop.GeoClue2.Location.Speed";
    pub const HEADING: &str = "org.freedesktop.GeoClue2.Location.Heading";
    pub const DESCRIPTION: &str = "org.freedesktop.GeoClue2.Location.Description";
    pub const TIMESTAMP: &str = "org.freedesktop.GeoClue2.Location.Timestamp";
}

/// `org.freedesktop.GeoClue2.Agent` members.
pub mod agent {
    pub const INTERFACE: &str = "org.freedesktop.GeoClue2.Agent";
    pub const PATH: &str = "/org/freedesktop/GeoClue2/Agent";

    pub const AUTHORIZE_APP: &str = "org.freedesktop.GeoClue2.Agent.AuthorizeApp";
    pub const MAX_ACCURACY_LEVEL: &str = "org.freedesktop.GeoClue2.Agent.MaxAccuracyLevel";
}

/// Bounds for signal delivery.
pub mod signals {
    /// Slots in each subscription channel before the dispatcher starts
    /// dropping notifications for that subscriber.
    pub const CHANNEL_CAPACITY: usize = 10;
}

/// Timeout constants for signal-based waiting.
pub mod timeouts {
    use std::time::Duration;

    /// Maximum time to wait for a client's first location (5 seconds).
    const LOCATION_TIMEOUT_SECS: u64 = 5;

    /// Returns the default location wait duration.
    pub fn location_timeout() -> Duration {
        Duration::from_secs(LOCATION_TIMEOUT_SECS)
    }
}
