//! Hakim API Library Crate
//!
//! This library contains all the logic for the Hakim voice appointment
//! gateway: application state, configuration, the REST management surface,
//! and the websocket proxy that bridges clients to the realtime speech API.
//! The `bin/api.rs` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod seed;
pub mod state;
pub mod ws;
