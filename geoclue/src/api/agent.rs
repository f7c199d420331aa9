use crate::Result;
use crate::api::models::{AccuracyLevel, AgentInfo};
use crate::dbus::{BusConnection, ObjectProxy, RemoteValue};
use crate::types::constants::{SERVICE, agent};

/// An authorization agent at `/org/freedesktop/GeoClue2/Agent`.
///
/// Agents decide which applications may see location data. Regular
/// applications never need this.
#[derive(Debug, Clone)]
pub struct Agent {
    proxy: ObjectProxy,
}

impl Agent {
    /// Binds the agent object on `conn`.
    pub fn new(conn: &BusConnection) -> Result<Self> {
        Ok(Self {
            proxy: ObjectProxy::new(conn, SERVICE, agent::INTERFACE, agent::PATH)?,
        })
    }

    pub fn proxy(&self) -> &ObjectProxy {
        &self.proxy
    }

    /// Asks the agent whether `desktop_id` may receive location data.
    ///
    /// Returns whether the app is authorized and the accuracy it is allowed.
    pub async fn authorize_app(
        &self,
        desktop_id: &str,
        requested: AccuracyLevel,
    ) -> Result<(bool, AccuracyLevel)> {
        let args = vec![desktop_id.to_owned().into_value()?, requested.into_value()?];
        self.proxy
            .call_with_return2(agent::AUTHORIZE_APP, args)
            .await
    }

    /// The maximum accuracy this user allows any client.
    pub async fn max_accuracy_level(&self) -> Result<AccuracyLevel> {
        self.proxy.get(agent::MAX_ACCURACY_LEVEL).await
    }

    pub async fn info(&self) -> Result<AgentInfo> {
        Ok(AgentInfo {
            max_accuracy_level: self.max_accuracy_level().await?,
        })
    }
}
