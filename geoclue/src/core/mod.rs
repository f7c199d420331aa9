//! Core internal logic.
//!
//! This module contains the signal-driven waiting used by the entity facades.

pub(crate) mod state_wait;
