//! Wire message types
//!
//! Every connection (control plane and all four data channels) exchanges
//! newline-delimited JSON envelopes. Requests are decoded once at the
//! boundary into a closed `action`-tagged enum; an unknown or malformed
//! action is a single well-typed error path, not a string fallthrough.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The four data channels every conference serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Chat messages (payloads are opaque, possibly pre-encrypted text)
    Text,
    /// Microphone payloads, relayed verbatim
    Audio,
    /// Camera frames, consumed by the compositor
    Video,
    /// Screen-share frames, last writer wins
    Screen,
}

impl ChannelKind {
    /// All channels, in the order ports are allocated
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Text,
        ChannelKind::Audio,
        ChannelKind::Video,
        ChannelKind::Screen,
    ];

    /// Wire name of the channel
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Text => "text",
            ChannelKind::Audio => "audio",
            ChannelKind::Video => "video",
            ChannelKind::Screen => "screen",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier for a live conference
///
/// Numeric internally, but serialized as a string on the wire; deserialization
/// accepts either form since clients echo back whatever they were given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConferenceId(pub u32);

impl fmt::Display for ConferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ConferenceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ConferenceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(u32),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(ConferenceId(n)),
            Repr::Text(s) => s
                .trim()
                .parse()
                .map(ConferenceId)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Client identity, derived from the connection's observed remote address
///
/// There is no separate authentication; a client is its `"ip:port"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Derive an identity from a peer address
    pub fn from_addr(addr: &SocketAddr) -> Self {
        ClientId(format!("{}:{}", addr.ip(), addr.port()))
    }

    /// Raw `"ip:port"` form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One port per data channel, assigned at conference creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMap {
    pub text: u16,
    pub audio: u16,
    pub video: u16,
    pub screen: u16,
}

impl PortMap {
    /// Build a map from ports listed in `ChannelKind::ALL` order
    pub fn from_slice(ports: &[u16]) -> Option<Self> {
        match ports {
            &[text, audio, video, screen] => Some(PortMap {
                text,
                audio,
                video,
                screen,
            }),
            _ => None,
        }
    }

    /// Port serving the given channel
    pub fn get(&self, kind: ChannelKind) -> u16 {
        match kind {
            ChannelKind::Text => self.text,
            ChannelKind::Audio => self.audio,
            ChannelKind::Video => self.video,
            ChannelKind::Screen => self.screen,
        }
    }

    /// All ports, in `ChannelKind::ALL` order
    pub fn ports(&self) -> [u16; 4] {
        [self.text, self.audio, self.video, self.screen]
    }

    /// Iterate `(channel, port)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (ChannelKind, u16)> + '_ {
        ChannelKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }
}

/// Inbound request, on control and channel connections alike
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Request {
    /// Create a new conference; the requesting connection becomes its creator
    #[serde(rename = "create")]
    Create,

    /// Join an existing conference by identity
    #[serde(rename = "join")]
    Join { conference_id: ConferenceId },

    /// Join an arbitrary currently-active conference
    #[serde(rename = "quickJoin")]
    QuickJoin,

    /// Leave a conference, naming the per-channel identities to disconnect
    #[serde(rename = "quit")]
    Quit {
        conference_id: ConferenceId,
        cids: HashMap<ChannelKind, ClientId>,
    },

    /// Tear down a conference (creator only)
    #[serde(rename = "cancel")]
    Cancel { conference_id: ConferenceId },

    /// Relay a payload; `conference_id` is required on the control path and
    /// absent on dedicated channel connections
    #[serde(rename = "share")]
    Share {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conference_id: Option<ConferenceId>,
        data_type: ChannelKind,
        data: String,
    },
}

/// Control-plane response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// create / join / quickJoin success: identity plus the port mapping
    Joined {
        status: String,
        conference_id: ConferenceId,
        ports: PortMap,
        client_id: ClientId,
    },
    /// quit / cancel success
    Ack {
        status: String,
        conference_id: ConferenceId,
    },
    /// Any user-visible failure
    Error { status: String, message: String },
}

impl Response {
    /// Success response carrying the conference port mapping
    pub fn joined(conference_id: ConferenceId, ports: PortMap, client_id: ClientId) -> Self {
        Response::Joined {
            status: "success".into(),
            conference_id,
            ports,
            client_id,
        }
    }

    /// Bare success acknowledgement
    pub fn ack(conference_id: ConferenceId) -> Self {
        Response::Ack {
            status: "success".into(),
            conference_id,
        }
    }

    /// Error response with a user-visible message
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            status: "error".into(),
            message: message.into(),
        }
    }
}

/// Outbound payload emitted by a relay on a data channel
///
/// `client_id` is `None` for server-originated messages (compositor output,
/// the cancel sentinel). `time` is only stamped on text payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPayload {
    pub data_type: ChannelKind,
    pub client_id: Option<ClientId>,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// Sentinel text body broadcast to every text client when a conference is
/// cancelled, ahead of connection teardown.
pub const CANCEL_SENTINEL: &str = "CANCEL";

impl ChannelPayload {
    /// Text payload, stamped with the sender and a coarse wall-clock time
    pub fn text(client_id: ClientId, data: String, time: String) -> Self {
        ChannelPayload {
            data_type: ChannelKind::Text,
            client_id: Some(client_id),
            data,
            time: Some(time),
        }
    }

    /// Media payload (audio/video/screen), relayed without a timestamp
    pub fn media(data_type: ChannelKind, client_id: Option<ClientId>, data: String) -> Self {
        ChannelPayload {
            data_type,
            client_id,
            data,
            time: None,
        }
    }

    /// The cancellation sentinel sent on the text channel
    pub fn cancel_sentinel() -> Self {
        ChannelPayload {
            data_type: ChannelKind::Text,
            client_id: None,
            data: CANCEL_SENTINEL.into(),
            time: None,
        }
    }
}
