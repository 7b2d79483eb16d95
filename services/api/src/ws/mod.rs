//! WebSocket Proxy
//!
//! This module contains the core logic for bridging a client's realtime
//! voice session to the upstream speech API. It is structured into
//! submodules for clarity:
//!
//! - `protocol`: The JSON frame types exchanged on both connections.
//! - `session`: The per-session supervisor, from handshake to termination.
//! - `bridge`: The two relay activities that run while a session is active.
//! - `tools`: The tool registry the speech model can invoke mid-conversation.

pub mod bridge;
pub mod protocol;
pub mod session;
pub mod tools;

pub use session::ws_handler;
