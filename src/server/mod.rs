//! Control-plane server
//!
//! Accepts control connections, owns the conference table and the shared
//! port pool, and spawns a [`crate::relay::ConferenceRelay`] per created
//! conference.

pub mod config;
pub mod control;

pub use config::ServerConfig;
pub use control::ControlServer;
