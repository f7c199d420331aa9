//! A Rust client for the GeoClue2 geolocation service over D-Bus.
//!
//! This crate provides an async API for asking GeoClue where the machine is:
//!
//! - Obtaining a client object from the GeoClue manager
//! - Starting and stopping location updates
//! - Reading location fixes (latitude, longitude, accuracy, and so on)
//! - Subscribing to `LocationUpdated` signals
//!
//! # Example
//!
//! ```no_run
//! use geoclue::{GeoClue, GeoClueConfig};
//!
//! # async fn example() -> geoclue::Result<()> {
//! let geoclue = GeoClue::with_config(
//!     GeoClueConfig::new().with_desktop_id("org.example.Maps"),
//! )
//! .await?;
//!
//! let client = geoclue.client().await?;
//! client.start().await?;
//!
//! // Waits for the first fix, bounded by the configured timeout
//! let location = client.location().await?;
//! println!(
//!     "{}, {} (±{} m)",
//!     location.latitude().await?,
//!     location.longitude().await?,
//!     location.accuracy().await?
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, GeoclueError>`. Remote faults are passed
//! through as [`GeoclueError::Dbus`]; a property of the wrong kind is a
//! [`GeoclueError::TypeMismatch`], never a silent default.
//!
//! # Waiting for a Location
//!
//! GeoClue publishes a client's `Location` as `/` until the first fix
//! arrives. [`Client::location`] subscribes to `LocationUpdated` and waits
//! for a real object path, up to [`GeoClueConfig::location_timeout`]. The
//! subscription is released whether the wait succeeds, fails, or times out.
//!
//! # Testing
//!
//! With the `testing` feature enabled, `testing::MockBus` is an in-memory
//! [`Transport`] with a scripted GeoClue service, so code built on this
//! crate can be tested without a running D-Bus daemon.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`. For example:

//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod core;

// Public API modules
pub mod api;
pub mod dbus;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

// Re-exported public API
pub use api::agent::Agent;
pub use api::client::{Client, LocationUpdate};
pub use api::geoclue::GeoClue;
pub use api::location::Location;
pub use api::manager::Manager;
pub use api::models::{
    AccuracyLevel, AgentInfo, BusType, ClientInfo, GeoClueConfig, GeoclueError, LocationInfo,
    ManagerInfo,
};
pub use dbus::{
    BusConnection, Notification, ObjectProxy, RemoteValue, SignalChannel, SignalFilter,
    SignalSink, Transport, ZbusTransport, is_null_object,
};

/// A specialized `Result` type for GeoClue operations.
pub type Result<T> = std::result::Result<T, GeoclueError>;
