//! Public API module.
//!
//! This module contains the high-level user-facing API for the `geoclue` crate.

pub mod agent;
pub mod client;
pub mod geoclue;
pub mod location;
pub mod manager;
pub mod models;
