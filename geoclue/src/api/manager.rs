use log::debug;
use std::time::Duration;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::client::Client;
use crate::api::models::{AccuracyLevel, ManagerInfo};
use crate::dbus::{BusConnection, ObjectProxy, RemoteValue};
use crate::types::constants::{SERVICE, manager, timeouts};

/// The GeoClue manager at `/org/freedesktop/GeoClue2/Manager`.
///
/// The only thing most applications do with it is obtain a [`Client`].
///
/// # Example
///
/// ```no_run
/// use geoclue::{BusConnection, Manager};
///
/// # async fn example() -> geoclue::Result<()> {
/// let conn = BusConnection::system().await?;
/// let manager = Manager::new(&conn)?;
/// let client = manager.get_client().await?;
/// println!("client at {}", client.path().as_str());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Manager {
    proxy: ObjectProxy,
    location_timeout: Duration,
}

impl Manager {
    /// Binds the manager object on `conn`.
    pub fn new(conn: &BusConnection) -> Result<Self> {
        Ok(Self {
            proxy: ObjectProxy::new(conn, SERVICE, manager::INTERFACE, manager::PATH)?,
            location_timeout: timeouts::location_timeout(),
        })
    }

    /// Sets the location timeout handed to clients this manager returns.
    #[must_use]
    pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
        self.location_timeout = timeout;
        self
    }

    pub fn proxy(&self) -> &ObjectProxy {
        &self.proxy
    }

    /// Returns this peer's client, creating it on first use.
    ///
    /// Subsequent calls from the same connection return the same client.
    pub async fn get_client(&self) -> Result<Client> {
        let path: OwnedObjectPath = self
            .proxy
            .call_with_return(manager::GET_CLIENT, Vec::new())
            .await?;
        debug!("GetClient returned {}", path.as_str());
        self.bind_client(&path)
    }

    /// Always creates a new client.
    pub async fn create_client(&self) -> Result<Client> {
        let path: OwnedObjectPath = self
            .proxy
            .call_with_return(manager::CREATE_CLIENT, Vec::new())
            .await?;
        debug!("CreateClient returned {}", path.as_str());
        self.bind_client(&path)
    }

    /// Destroys a client created with [`Manager::get_client`] or
    /// [`Manager::create_client`].
    pub async fn delete_client(&self, client: &Client) -> Result<()> {
        let arg = client.path().clone().into_value()?;
        self.proxy.call(manager::DELETE_CLIENT, vec![arg]).await
    }

    /// Registers an authorization agent with the given desktop id.
    pub async fn add_agent(&self, id: &str) -> Result<()> {
        let arg = id.to_owned().into_value()?;
        self.proxy.call(manager::ADD_AGENT, vec![arg]).await
    }

    /// Whether the service is in use by any application.
    pub async fn in_use(&self) -> Result<bool> {
        self.proxy.get(manager::IN_USE).await
    }

    /// The level of accuracy the service can currently provide.
    pub async fn available_accuracy_level(&self) -> Result<AccuracyLevel> {
        self.proxy.get(manager::AVAILABLE_ACCURACY_LEVEL).await
    }

    /// Reads every manager property into one record.
    pub async fn info(&self) -> Result<ManagerInfo> {
        Ok(ManagerInfo {
            in_use: self.in_use().await?,
            available_accuracy_level: self.available_accuracy_level().await?,
        })
    }

    fn bind_client(&self, path: &OwnedObjectPath) -> Result<Client> {
        Ok(Client::new(self.proxy.connection(), path.as_str())?
            .with_location_timeout(self.location_timeout))
    }
}
