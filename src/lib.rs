//! Multi-party conferencing relay
//!
//! A control-plane server creates, joins, and cancels conferences; each
//! live conference gets its own relay with one TCP listener per data
//! channel (text, audio, video, screen), a per-channel client registry,
//! and a continuously running compositor that merges camera feeds with the
//! current screen share into one outgoing video stream.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ControlServer>
//!                  ┌────────────────────────────┐
//!                  │ conferences: HashMap<Id,   │
//!                  │   Arc<ConferenceRelay>>    │
//!                  │ pool: PortPool             │
//!                  └─────────────┬──────────────┘
//!            create/join/cancel  │
//!                                ▼
//!                       ConferenceRelay
//!          ┌──────────┬──────────┬──────────┬──────────┐
//!          │  text    │  audio   │  video   │  screen  │   + compositor
//!          │ listener │ listener │ listener │ listener │     (20 Hz)
//!          └──────────┴──────────┴──────────┴──────────┘
//!               │  per-channel registries, broadcast fan-out
//!               ▼
//!          connected clients (one connection per channel)
//! ```
//!
//! A client first talks to the control plane to learn the per-channel port
//! mapping, then opens one connection per channel directly to the relay.
//! Every connection speaks newline-delimited JSON envelopes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use confab::{ControlServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> confab::Result<()> {
//!     let config = ServerConfig::default();
//!     let server = Arc::new(ControlServer::bind(config).await?);
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod media;
pub mod ports;
pub mod protocol;
pub mod relay;
pub mod server;

pub use error::{Error, Result};
pub use protocol::{ChannelKind, ClientId, ConferenceId, PortMap, Request, Response};
pub use relay::ConferenceRelay;
pub use server::{ControlServer, ServerConfig};
