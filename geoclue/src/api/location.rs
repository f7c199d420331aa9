use std::time::SystemTime;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::models::LocationInfo;
use crate::dbus::{BusConnection, ObjectProxy};
use crate::types::constants::{SERVICE, location};

/// A location fix published by GeoClue.
///
/// Location objects are immutable on the service side: a new fix gets a
/// new object path.
#[derive(Debug, Clone)]
pub struct Location {
    proxy: ObjectProxy,
}

impl Location {
    /// Binds the location object at `path`.
    pub fn new(conn: &BusConnection, path: &str) -> Result<Self> {
        Ok(Self {
            proxy: ObjectProxy::new(conn, SERVICE, location::INTERFACE, path)?,
        })
    }

    pub fn path(&self) -> &OwnedObjectPath {
        self.proxy.path()
    }

    pub fn proxy(&self) -> &ObjectProxy {
        &self.proxy
    }

    /// Latitude in degrees.
    pub async fn latitude(&self) -> Result<f64> {
        self.proxy.get(location::LATITUDE).await
    }

    /// Longitude in degrees.
    pub async fn longitude(&self) -> Result<f64> {
        self.proxy.get(location::LONGITUDE).await
    }

    /// Accuracy of the fix in meters.
    pub async fn accuracy(&self) -> Result<f64> {
        self.proxy.get(location::ACCURACY).await
    }

    /// Altitude in meters. `f64::MIN` when unknown.
    pub async fn altitude(&self) -> Result<f64> {
        self.proxy.get(location::ALTITUDE).await
    }

    /// Speed in meters per second. `-1.0` when unknown.
    pub async fn speed(&self) -> Result<f64> {
        self.proxy.get(location::SPEED).await
    }

    /// Heading in degrees, clockwise from North. `-1.0` when unknown.
    pub async fn heading(&self) -> Result<f64> {
        self.proxy.get(location::HEADING).await
    }

    /// Human-readable description. Not every source provides one.
    pub async fn description(&self) -> Result<String> {
        self.proxy.get(location::DESCRIPTION).await
    }

    /// When the fix was measured, or when GeoClue received it if the
    /// source gave no time. Not guaranteed to be monotonic.
    pub async fn timestamp(&self) -> Result<SystemTime> {
        self.proxy.get(location::TIMESTAMP).await
    }

    /// Reads every location property into one record.
    pub async fn info(&self) -> Result<LocationInfo> {
        Ok(LocationInfo {
            path: self.path().as_str().to_owned(),
            latitude: self.latitude().await?,
            longitude: self.longitude().await?,
            accuracy: self.accuracy().await?,
            altitude: self.altitude().await?,
            speed: self.speed().await?,
            heading: self.heading().await?,
            description: self.description().await?,
            timestamp: self.timestamp().await?,
        })
    }
}
