use log::debug;

use crate::Result;
use crate::api::agent::Agent;
use crate::api::client::Client;
use crate::api::manager::Manager;
use crate::api::models::GeoClueConfig;
use crate::dbus::BusConnection;

/// High-level interface to the GeoClue2 service.
///
/// This is the main entry point. It owns a [`BusConnection`] and hands out
/// entity facades bound to it.
///
/// # Example
///
/// ```no_run
/// use geoclue::{GeoClue, GeoClueConfig};
///
/// # async fn example() -> geoclue::Result<()> {
/// let geoclue = GeoClue::with_config(
///     GeoClueConfig::new().with_desktop_id("org.example.Maps"),
/// )
/// .await?;
///
/// let client = geoclue.client().await?;
/// client.start().await?;
/// let location = client.location().await?;
/// println!("accuracy: {} m", location.accuracy().await?);
///
/// geoclue.shutdown().await?;
/// # Ok(())
/// # }
/// ```
///
/// # Thread Safety
///
/// `GeoClue` is `Clone` and can be shared across async tasks. Each clone
/// shares the same underlying connection.
#[derive(Debug, Clone)]
pub struct GeoClue {
    conn: BusConnection,
    config: GeoClueConfig,
}

impl GeoClue {
    /// Connects to the system bus with the default configuration.
    pub async fn new() -> Result<Self> {
        Self::with_config(GeoClueConfig::default()).await
    }

    /// Connects to the bus named in `config`.
    pub async fn with_config(config: GeoClueConfig) -> Result<Self> {
        let conn = BusConnection::connect(config.bus).await?;
        Ok(Self::from_connection(conn, config))
    }

    /// Uses an already established connection.
    pub fn from_connection(conn: BusConnection, config: GeoClueConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &GeoClueConfig {
        &self.config
    }

    pub fn connection(&self) -> &BusConnection {
        &self.conn
    }

    /// Returns the manager object.
    pub fn manager(&self) -> Result<Manager> {
        Ok(Manager::new(&self.conn)?.with_location_timeout(self.config.location_timeout))
    }

    /// Returns this application's client, applying the configured desktop id.
    pub async fn client(&self) -> Result<Client> {
        let client = self.manager()?.get_client().await?;
        self.prepare(client).await
    }

    /// Creates an additional client, applying the configured desktop id.
    pub async fn create_client(&self) -> Result<Client> {
        let client = self.manager()?.create_client().await?;
        self.prepare(client).await
    }

    /// Returns the agent object.
    pub fn agent(&self) -> Result<Agent> {
        Agent::new(&self.conn)
    }

    /// Closes the connection. Every entity bound to it stops working.
    pub async fn shutdown(&self) -> Result<()> {
        self.conn.shutdown().await
    }

    async fn prepare(&self, client: Client) -> Result<Client> {
        if let Some(desktop_id) = &self.config.desktop_id {
            debug!("Setting desktop id {desktop_id} on {}", client.path().as_str());
            client.set_desktop_id(desktop_id).await?;
        }
        Ok(client)
    }
}
