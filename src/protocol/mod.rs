//! Wire protocol: message envelopes and line framing
//!
//! The shared contract between the control plane, the per-conference
//! relays, and their clients. Every connection exchanges one JSON object
//! per line; requests decode into the closed [`Request`] enum at the
//! protocol boundary.

pub mod codec;
pub mod message;

pub use message::{
    ChannelKind, ChannelPayload, ClientId, ConferenceId, PortMap, Request, Response,
    CANCEL_SENTINEL,
};
