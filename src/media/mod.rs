//! Media handling: raw frames, the frame wire format, and composition
//!
//! Codec internals (JPEG and friends) live client-side; the relay only sees
//! base64 payloads in the raw-frame contract defined by [`codec`].

pub mod codec;
pub mod compositor;
pub mod frame;

pub use compositor::compose;
pub use frame::{Canvas, RawFrame};
