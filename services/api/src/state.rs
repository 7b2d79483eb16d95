//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the scheduling store and service clients.

use crate::config::Config;
use hakim_core::{availability::AvailabilityResolver, store::SchedulingStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SchedulingStore>,
    pub resolver: Arc<AvailabilityResolver>,
    pub http: reqwest::Client,
    pub system_prompt: Arc<String>,
    pub config: Arc<Config>,
}
