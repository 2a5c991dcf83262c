//! Per-conference relay
//!
//! One `ConferenceRelay` owns everything scoped to a single conference: a
//! TCP listener per data channel, the per-channel client registries, the
//! per-sender camera buffers, the current screen-share frame, and the
//! compositor task. Every spawned task handle is kept in one supervised
//! set so cancellation tears the whole conference down as a unit.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::media::codec as media_codec;
use crate::media::frame::RawFrame;
use crate::protocol::codec;
use crate::protocol::{ChannelKind, ChannelPayload, ClientId, ConferenceId, PortMap, Request};
use crate::relay::registry::ChannelRegistry;

/// Knobs a relay inherits from the server configuration
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Address the channel listeners bind on
    pub bind_ip: IpAddr,
    /// Compositor cycle cadence (input-independent)
    pub compositor_interval: Duration,
    /// Per-sender camera FIFO depth
    pub camera_buffer_capacity: usize,
    /// Composited output dimensions
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// How long the cancel sentinel gets to drain before teardown
    pub cancel_flush_delay: Duration,
    pub tcp_nodelay: bool,
}

/// Relay for one live conference
pub struct ConferenceRelay {
    id: ConferenceId,
    ports: PortMap,
    creator: ClientId,
    settings: RelaySettings,

    /// One registry per channel, indexed in `ChannelKind::ALL` order
    registries: [ChannelRegistry; 4],

    /// Per-sender FIFO of decoded camera frames, created lazily on the
    /// sender's first video payload
    cameras: Mutex<HashMap<ClientId, VecDeque<RawFrame>>>,

    /// Current screen-share frame, last writer wins
    screen_share: Mutex<Option<RawFrame>>,

    /// Supervised handles: the four accept loops and the compositor
    tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Read-loop handle per live channel connection. Quit aborts the
    /// entry so the socket's read half drops along with the write half
    /// and the connection fully closes.
    readers: Mutex<HashMap<(ChannelKind, ClientId), JoinHandle<()>>>,
}

impl ConferenceRelay {
    /// Bind the four channel listeners and start the relay's tasks.
    ///
    /// The ports were probed free at allocation; a bind failure here still
    /// propagates so `create` can release the ports and report the error.
    pub async fn launch(
        id: ConferenceId,
        ports: PortMap,
        creator: ClientId,
        settings: RelaySettings,
    ) -> Result<Arc<Self>> {
        let mut listeners = Vec::with_capacity(4);
        for (kind, port) in ports.iter() {
            let listener = TcpListener::bind((settings.bind_ip, port)).await?;
            listeners.push((kind, listener));
        }

        let relay = Arc::new(ConferenceRelay {
            id,
            ports,
            creator,
            settings,
            registries: ChannelKind::ALL.map(ChannelRegistry::new),
            cameras: Mutex::new(HashMap::new()),
            screen_share: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            readers: Mutex::new(HashMap::new()),
        });

        let mut tasks = relay.tasks.lock().await;
        for (kind, listener) in listeners {
            tracing::info!(
                conference = %id,
                channel = %kind,
                port = listener.local_addr().map(|a| a.port()).unwrap_or_default(),
                "channel listener started"
            );
            let accept_relay = Arc::clone(&relay);
            tasks.push(tokio::spawn(async move {
                accept_relay.accept_loop(kind, listener).await;
            }));
        }
        let compositor_relay = Arc::clone(&relay);
        tasks.push(tokio::spawn(async move {
            super::compositor::run(compositor_relay).await;
        }));
        drop(tasks);

        Ok(relay)
    }

    pub fn id(&self) -> ConferenceId {
        self.id
    }

    pub fn ports(&self) -> PortMap {
        self.ports
    }

    pub fn creator(&self) -> &ClientId {
        &self.creator
    }

    pub(crate) fn compositor_interval(&self) -> Duration {
        self.settings.compositor_interval
    }

    fn registry(&self, kind: ChannelKind) -> &ChannelRegistry {
        &self.registries[kind as usize]
    }

    async fn accept_loop(self: Arc<Self>, kind: ChannelKind, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    if self.settings.tcp_nodelay {
                        let _ = socket.set_nodelay(true);
                    }
                    let client_id = ClientId::from_addr(&peer);
                    tracing::info!(
                        conference = %self.id,
                        channel = %kind,
                        client = %client_id,
                        "channel client connected"
                    );
                    let (read, write) = socket.into_split();
                    self.registry(kind).insert(client_id.clone(), write).await;

                    let relay = Arc::clone(&self);
                    let reader_id = client_id.clone();
                    let handle = tokio::spawn(async move {
                        relay.serve_client(kind, reader_id, read).await;
                    });
                    // Same ip:port reconnecting means the old socket is
                    // already gone; its reader just needs stopping.
                    if let Some(previous) =
                        self.readers.lock().await.insert((kind, client_id), handle)
                    {
                        previous.abort();
                    }
                }
                Err(e) => {
                    tracing::error!(
                        conference = %self.id,
                        channel = %kind,
                        error = %e,
                        "failed to accept channel connection"
                    );
                }
            }
        }
    }

    /// Read loop for one channel connection. Payload order within this
    /// connection is preserved end to end; a bad message is skipped, not
    /// answered, on data channels.
    async fn serve_client(self: Arc<Self>, kind: ChannelKind, client_id: ClientId, read: OwnedReadHalf) {
        let mut reader = BufReader::new(read);
        loop {
            match codec::read_message::<_, Request>(&mut reader).await {
                Ok(Some(Request::Share { data, .. })) => {
                    if let Err(e) = self.ingest(kind, &client_id, data).await {
                        tracing::warn!(
                            conference = %self.id,
                            channel = %kind,
                            client = %client_id,
                            error = %e,
                            "dropping bad payload"
                        );
                    }
                }
                Ok(Some(_)) => {
                    tracing::warn!(
                        conference = %self.id,
                        channel = %kind,
                        client = %client_id,
                        "ignoring non-share action on channel connection"
                    );
                }
                Ok(None) => break,
                Err(Error::Json(e)) => {
                    tracing::warn!(
                        conference = %self.id,
                        channel = %kind,
                        client = %client_id,
                        error = %e,
                        "skipping malformed channel message"
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        conference = %self.id,
                        channel = %kind,
                        client = %client_id,
                        error = %e,
                        "channel read failed"
                    );
                    break;
                }
            }
        }

        self.registry(kind).remove(&client_id).await;
        self.readers.lock().await.remove(&(kind, client_id.clone()));
        if kind == ChannelKind::Video {
            self.cameras.lock().await.remove(&client_id);
        }
        tracing::info!(
            conference = %self.id,
            channel = %kind,
            client = %client_id,
            "channel client disconnected"
        );
    }

    /// Route one inbound payload according to its channel
    async fn ingest(&self, kind: ChannelKind, sender: &ClientId, data: String) -> Result<()> {
        match kind {
            ChannelKind::Text => {
                let payload = ChannelPayload::text(sender.clone(), data, wall_clock());
                let line = codec::encode_line(&payload)?;
                self.registry(ChannelKind::Text).broadcast(line, Some(sender)).await;
            }
            ChannelKind::Audio => {
                let payload = ChannelPayload::media(ChannelKind::Audio, Some(sender.clone()), data);
                let line = codec::encode_line(&payload)?;
                self.registry(ChannelKind::Audio).broadcast(line, Some(sender)).await;
            }
            ChannelKind::Video => {
                let frame = media_codec::decode_wire(&data)?;
                self.push_camera_frame(sender, frame).await;
            }
            ChannelKind::Screen => {
                let frame = media_codec::decode_wire(&data)?;
                *self.screen_share.lock().await = Some(frame);
            }
        }
        Ok(())
    }

    /// Payload relayed through the control connection instead of a
    /// dedicated channel connection, tagged with the control address.
    pub async fn broadcast_share(&self, kind: ChannelKind, sender: &ClientId, data: String) -> Result<()> {
        let payload = match kind {
            ChannelKind::Text => ChannelPayload::text(sender.clone(), data, wall_clock()),
            _ => ChannelPayload::media(kind, Some(sender.clone()), data),
        };
        let line = codec::encode_line(&payload)?;
        self.registry(kind).broadcast(line, Some(sender)).await;
        Ok(())
    }

    async fn push_camera_frame(&self, sender: &ClientId, frame: RawFrame) {
        let mut cameras = self.cameras.lock().await;
        let buffer = cameras
            .entry(sender.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.settings.camera_buffer_capacity));
        // Full buffer drops the oldest frame; the newest one wins.
        if buffer.len() >= self.settings.camera_buffer_capacity {
            buffer.pop_front();
        }
        buffer.push_back(frame);
    }

    /// One compositor cycle: drain at most one frame per camera buffer,
    /// compose over the screen share (or the placeholder background), and
    /// broadcast the result to every video client, senders included.
    pub(crate) async fn composite_once(&self) {
        let camera_frames = self.drain_camera_frames().await;
        let screen = self.screen_share.lock().await.clone();

        let frame = crate::media::compose(
            screen.as_ref(),
            &camera_frames,
            self.settings.canvas_width,
            self.settings.canvas_height,
        );
        let payload =
            ChannelPayload::media(ChannelKind::Video, None, media_codec::encode_wire(&frame));
        match codec::encode_line(&payload) {
            Ok(line) => self.registry(ChannelKind::Video).broadcast(line, None).await,
            Err(e) => {
                tracing::error!(conference = %self.id, error = %e, "failed to encode composited frame");
            }
        }
    }

    /// Drain at most one frame per sender, in sender order. The order is
    /// stable across ticks so a participant's tile keeps its grid position
    /// while membership changes around it.
    async fn drain_camera_frames(&self) -> Vec<RawFrame> {
        let mut pending: Vec<(ClientId, RawFrame)> = {
            let mut cameras = self.cameras.lock().await;
            cameras
                .iter_mut()
                .filter_map(|(id, buffer)| buffer.pop_front().map(|frame| (id.clone(), frame)))
                .collect()
        };
        pending.sort_by(|a, b| a.0.cmp(&b.0));
        pending.into_iter().map(|(_, frame)| frame).collect()
    }

    /// Disconnect one leaving client: close the named channel connections
    /// (all four channels) and drop its camera buffer.
    pub async fn quit(&self, client_id: &ClientId, cids: &HashMap<ChannelKind, ClientId>) {
        for kind in ChannelKind::ALL {
            if let Some(cid) = cids.get(&kind) {
                // Stop the read loop first so the socket's read half drops
                // and nothing sent after the quit gets relayed.
                if let Some(reader) = self.readers.lock().await.remove(&(kind, cid.clone())) {
                    reader.abort();
                }
                if self.registry(kind).remove(cid).await {
                    tracing::debug!(
                        conference = %self.id,
                        channel = %kind,
                        client = %cid,
                        "channel connection closed on quit"
                    );
                }
            }
        }
        if let Some(video_cid) = cids.get(&ChannelKind::Video) {
            self.cameras.lock().await.remove(video_cid);
        }
        tracing::info!(conference = %self.id, client = %client_id, "client left conference");
    }

    /// Tear the conference down: notify text clients, stop every task, and
    /// close every connection. Blocks until all tasks have confirmed
    /// stopped, so no compositor or listener outlives the conference.
    pub async fn cancel(&self) {
        if let Ok(line) = codec::encode_line(&ChannelPayload::cancel_sentinel()) {
            self.registry(ChannelKind::Text).broadcast(line, None).await;
        }
        // Let the sentinel drain before the connections drop.
        tokio::time::sleep(self.settings.cancel_flush_delay).await;

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().await);
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }

        let readers: Vec<JoinHandle<()>> = {
            let mut readers = self.readers.lock().await;
            readers.drain().map(|(_, handle)| handle).collect()
        };
        for reader in &readers {
            reader.abort();
        }
        for reader in readers {
            let _ = reader.await;
        }

        for kind in ChannelKind::ALL {
            self.registry(kind).clear().await;
        }
        self.cameras.lock().await.clear();
        *self.screen_share.lock().await = None;
        tracing::info!(conference = %self.id, "conference cancelled");
    }
}

/// Coarse wall-clock stamp for text payloads
fn wall_clock() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}
