//! Type definitions and constants.
//!
//! This module contains GeoClue2 bus names, paths and member constants.

pub mod constants;
