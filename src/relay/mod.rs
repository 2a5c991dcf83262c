//! Conference relay: channel listeners, client registries, compositor
//!
//! One [`ConferenceRelay`] per live conference. The control plane creates
//! it with freshly allocated ports and tears it down on cancel; in between,
//! all media and text traffic flows through here without touching the
//! control plane.

pub mod conference;
mod compositor;
pub mod registry;

pub use conference::{ConferenceRelay, RelaySettings};
pub use registry::ChannelRegistry;
