use std::time::Duration;
use zvariant::{OwnedObjectPath, OwnedValue};

use crate::Result;
use crate::api::location::Location;
use crate::api::models::{AccuracyLevel, ClientInfo, GeoclueError};
use crate::core::state_wait::{PathWait, wait_for_object_path};
use crate::dbus::{BusConnection, Notification, ObjectProxy, SignalChannel, is_null_object};
use crate::types::constants::{SERVICE, client, timeouts};

/// A GeoClue client object.
///
/// Obtained from [`Manager::get_client`](crate::Manager::get_client). Set a
/// desktop id, call [`Client::start`], then read [`Client::location`].
///
/// # Example
///
/// ```no_run
/// use geoclue::{AccuracyLevel, GeoClue};
///
/// # async fn example() -> geoclue::Result<()> {
/// let geoclue = GeoClue::new().await?;
/// let client = geoclue.client().await?;
/// client.set_desktop_id("org.example.Maps").await?;
/// client.set_requested_accuracy_level(AccuracyLevel::City).await?;
/// client.start().await?;
///
/// let location = client.location().await?;
/// println!("{}, {}", location.latitude().await?, location.longitude().await?);
///
/// client.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    proxy: ObjectProxy,
    location_timeout: Duration,
}

/// Decoded `LocationUpdated` signal.
///
/// Either side is `None` when it holds the null object, which is the case
/// for `old` on the first update after `Start()`.
#[derive(Debug, Clone)]
pub struct LocationUpdate {
    pub old: Option<Location>,
    pub new: Option<Location>,
}

impl Client {
    /// Binds the client object at `path`.
    pub fn new(conn: &BusConnection, path: &str) -> Result<Self> {
        Ok(Self {
            proxy: ObjectProxy::new(conn, SERVICE, client::INTERFACE, path)?,
            location_timeout: timeouts::location_timeout(),
        })
    }

    /// Sets how long [`Client::location`] waits for the first fix.
    #[must_use]
    pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
        self.location_timeout = timeout;
        self
    }

    pub fn location_timeout(&self) -> Duration {
        self.location_timeout
    }

    pub fn path(&self) -> &OwnedObjectPath {
        self.proxy.path()
    }

    pub fn proxy(&self) -> &ObjectProxy {
        &self.proxy
    }

    /// Starts receiving location updates.
    pub async fn start(&self) -> Result<()> {
        self.proxy.call(client::START, Vec::new()).await
    }

    /// Stops receiving location updates.
    pub async fn stop(&self) -> Result<()> {
        self.proxy.call(client::STOP, Vec::new()).await
    }

    /// Waits for the client's location to be populated and returns it.
    ///
    /// The client must be started. Returns immediately if a location is
    /// already known, otherwise waits up to the configured timeout for a
    /// `LocationUpdated` signal that populates it.
    ///
    /// # Errors
    ///
    /// - `GeoclueError::PreconditionFailed` if the client is not active
    /// - `GeoclueError::Timeout` if no location arrives in time
    pub async fn location(&self) -> Result<Location> {
        let path = wait_for_object_path(
            &self.proxy,
            PathWait {
                gate: client::ACTIVE,
                target: client::LOCATION,
                signal: client::LOCATION_UPDATED,
                timeout: self.location_timeout,
            },
        )
        .await?;
        Location::new(self.proxy.connection(), path.as_str())
    }

    /// Reads the raw `Location` property without waiting.
    ///
    /// Holds `/` until the first fix.
    pub async fn location_path(&self) -> Result<OwnedObjectPath> {
        self.proxy.get(client::LOCATION).await
    }

    /// Returns the current location if one has been published, without waiting.
    pub async fn current_location(&self) -> Result<Option<Location>> {
        let path = self.location_path().await?;
        if is_null_object(path.as_str()) {
            return Ok(None);
        }
        Location::new(self.proxy.connection(), path.as_str()).map(Some)
    }

    /// Distance threshold in meters below which no update is emitted.
    pub async fn distance_threshold(&self) -> Result<u32> {
        self.proxy.get(client::DISTANCE_THRESHOLD).await
    }

    pub async fn set_distance_threshold(&self, meters: u32) -> Result<()> {
        self.proxy.set(client::DISTANCE_THRESHOLD, meters).await
    }

    /// Time threshold in seconds below which no update is emitted.
    pub async fn time_threshold(&self) -> Result<u32> {
        self.proxy.get(client::TIME_THRESHOLD).await
    }

    pub async fn set_time_threshold(&self, seconds: u32) -> Result<()> {
        self.proxy.set(client::TIME_THRESHOLD, seconds).await
    }

    /// Desktop file id of the application (e.g. `firefox`).
    pub async fn desktop_id(&self) -> Result<String> {
        self.proxy.get(client::DESKTOP_ID).await
    }

    /// Must be set before [`Client::start`] for authorization to work.
    pub async fn set_desktop_id(&self, desktop_id: &str) -> Result<()> {
        self.proxy
            .set(client::DESKTOP_ID, desktop_id.to_owned())
            .await
    }

    pub async fn requested_accuracy_level(&self) -> Result<AccuracyLevel> {
        self.proxy.get(client::REQUESTED_ACCURACY_LEVEL).await
    }

    pub async fn set_requested_accuracy_level(&self, level: AccuracyLevel) -> Result<()> {
        self.proxy.set(client::REQUESTED_ACCURACY_LEVEL, level).await
    }

    /// Whether the client is started and receiving updates.
    ///
    /// GeoClue may stop and restart a client at any time on agent request.
    pub async fn is_active(&self) -> Result<bool> {
        self.proxy.get(client::ACTIVE).await
    }

    /// Opens the channel of `LocationUpdated` signals for this client.
    ///
    /// Calling this again while subscribed returns the same channel.
    pub async fn subscribe_location_updated(&self) -> Result<SignalChannel> {
        self.proxy.subscribe().await
    }

    /// Closes the channel opened by [`Client::subscribe_location_updated`].
    pub async fn unsubscribe(&self) -> Result<()> {
        self.proxy.unsubscribe().await
    }

    /// Decodes the `(old, new)` location paths of a `LocationUpdated` signal.
    pub fn parse_location_updated(&self, notification: &Notification) -> Result<LocationUpdate> {
        if notification.member() != client::LOCATION_UPDATED {
            return Err(GeoclueError::TypeMismatch {
                name: format!("{}.{}", notification.interface(), notification.member()),
                expected: "LocationUpdated signal",
                found: notification.member().to_owned(),
            });
        }

        let [old, new] = notification.body() else {
            return Err(GeoclueError::TypeMismatch {
                name: client::LOCATION_UPDATED.to_owned(),
                expected: "oo",
                found: body_signature(notification.body()),
            });
        };

        Ok(LocationUpdate {
            old: self.location_at(old)?,
            new: self.location_at(new)?,
        })
    }

    fn location_at(&self, value: &OwnedValue) -> Result<Option<Location>> {
        let path: OwnedObjectPath = crate::dbus::decode_value(client::LOCATION_UPDATED, value)?;
        if is_null_object(path.as_str()) {
            return Ok(None);
        }
        Location::new(self.proxy.connection(), path.as_str()).map(Some)
    }

    /// Reads every client property into one record.
    ///
    /// Does not wait for a location: `location` is `None` until one exists.
    pub async fn info(&self) -> Result<ClientInfo> {
        let location = match self.current_location().await? {
            Some(location) => Some(location.info().await?),
            None => None,
        };

        Ok(ClientInfo {
            path: self.path().as_str().to_owned(),
            location,
            distance_threshold: self.distance_threshold().await?,
            time_threshold: self.time_threshold().await?,
            desktop_id: self.desktop_id().await?,
            requested_accuracy_level: self.requested_accuracy_level().await?,
            active: self.is_active().await?,
        })
    }
}

fn body_signature(body: &[OwnedValue]) -> String {
    body.iter()
        .map(|v| v.value_signature().to_string())
        .collect()
}
