//! Control-plane server
//!
//! The single well-known entry point. Clients create or join conferences
//! here and learn the per-channel port mapping; thereafter channel traffic
//! goes straight to the conference relay, and the control connection is
//! only used for lifecycle actions (quit/cancel) and control-path shares.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use rand::Rng;
use tokio::io::BufReader;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::ports::PortPool;
use crate::protocol::codec;
use crate::protocol::{ChannelKind, ClientId, ConferenceId, PortMap, Request, Response};
use crate::relay::ConferenceRelay;
use crate::server::config::ServerConfig;

/// The control-plane server and its conference table
pub struct ControlServer {
    config: ServerConfig,
    listener: TcpListener,
    conferences: RwLock<HashMap<ConferenceId, Arc<ConferenceRelay>>>,
    pool: Mutex<PortPool>,
}

impl ControlServer {
    /// Bind the control-plane listener.
    ///
    /// Failing to bind here is the one fatal startup error; everything
    /// after this point is contained per connection.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        tracing::info!(addr = %config.bind_addr, "control-plane server listening");

        let (start, end) = config.port_range;
        let pool = PortPool::new(start, end, config.bind_addr.ip());

        Ok(Self {
            config,
            listener,
            conferences: RwLock::new(HashMap::new()),
            pool: Mutex::new(pool),
        })
    }

    /// Address the control listener actually bound (relevant for port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of live conferences
    pub async fn conference_count(&self) -> usize {
        self.conferences.read().await.len()
    }

    /// Accept control connections forever
    pub async fn run(self: Arc<Self>) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.serve_control(socket, peer).await;
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept control connection");
                }
            }
        }
    }

    /// Request loop for one control connection. Protocol violations are
    /// answered with an error envelope and the connection stays open;
    /// only I/O failure or EOF ends the loop.
    async fn serve_control(self: Arc<Self>, socket: TcpStream, peer: SocketAddr) {
        if self.config.tcp_nodelay {
            let _ = socket.set_nodelay(true);
        }
        let client_id = ClientId::from_addr(&peer);
        tracing::info!(client = %client_id, "control connection opened");

        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        loop {
            match codec::read_message::<_, Request>(&mut reader).await {
                Ok(Some(request)) => {
                    if let Err(e) = self.dispatch(request, &client_id, &mut write).await {
                        tracing::debug!(client = %client_id, error = %e, "control reply failed");
                        break;
                    }
                }
                Ok(None) => break,
                Err(Error::Json(e)) => {
                    tracing::warn!(client = %client_id, error = %e, "invalid control request");
                    let reply = Response::error(format!("invalid request: {}", e));
                    if codec::write_message(&mut write, &reply).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(client = %client_id, error = %e, "control read failed");
                    break;
                }
            }
        }
        tracing::info!(client = %client_id, "control connection closed");
    }

    async fn dispatch(
        &self,
        request: Request,
        client_id: &ClientId,
        write: &mut OwnedWriteHalf,
    ) -> Result<()> {
        let outcome = match request {
            Request::Create => self.create(client_id).await,
            Request::Join { conference_id } => self.join(conference_id, client_id).await,
            Request::QuickJoin => self.quick_join(client_id).await,
            Request::Quit {
                conference_id,
                cids,
            } => self.quit(conference_id, client_id, cids).await,
            Request::Cancel { conference_id } => self.cancel(conference_id, client_id).await,
            Request::Share {
                conference_id,
                data_type,
                data,
            } => {
                // Successful shares are relayed without a control reply.
                match self.share(conference_id, data_type, data, client_id).await {
                    Ok(()) => return Ok(()),
                    Err(e) => Err(e),
                }
            }
        };

        let response = outcome.unwrap_or_else(|e| {
            tracing::warn!(client = %client_id, error = %e, "request rejected");
            Response::error(e.to_string())
        });
        codec::write_message(write, &response).await
    }

    /// Allocate ports, pick a fresh identity, and launch the relay. Any
    /// failure past allocation releases the ports; no partially
    /// constructed conference is ever left in the table.
    async fn create(&self, creator: &ClientId) -> Result<Response> {
        let ports = self.pool.lock().await.allocate(ChannelKind::ALL.len())?;
        let port_map = PortMap::from_slice(&ports).ok_or(Error::PortsExhausted)?;

        let mut table = self.conferences.write().await;
        let id = loop {
            let candidate = ConferenceId(rand::thread_rng().gen_range(10_000..=99_999));
            if !table.contains_key(&candidate) {
                break candidate;
            }
        };

        match ConferenceRelay::launch(
            id,
            port_map,
            creator.clone(),
            self.config.relay_settings(),
        )
        .await
        {
            Ok(relay) => {
                table.insert(id, relay);
                tracing::info!(conference = %id, creator = %creator, ports = ?ports, "conference created");
                Ok(Response::joined(id, port_map, creator.clone()))
            }
            Err(e) => {
                drop(table);
                self.pool.lock().await.release(&ports);
                Err(e)
            }
        }
    }

    async fn join(&self, id: ConferenceId, client_id: &ClientId) -> Result<Response> {
        let table = self.conferences.read().await;
        let relay = table.get(&id).ok_or(Error::ConferenceNotFound(id))?;
        tracing::info!(conference = %id, client = %client_id, "client joined");
        Ok(Response::joined(id, relay.ports(), client_id.clone()))
    }

    /// Join an arbitrary currently-active conference
    async fn quick_join(&self, client_id: &ClientId) -> Result<Response> {
        let table = self.conferences.read().await;
        let relay = table.values().next().ok_or(Error::NoActiveConference)?;
        tracing::info!(conference = %relay.id(), client = %client_id, "client quick-joined");
        Ok(Response::joined(relay.id(), relay.ports(), client_id.clone()))
    }

    async fn quit(
        &self,
        id: ConferenceId,
        client_id: &ClientId,
        cids: HashMap<ChannelKind, ClientId>,
    ) -> Result<Response> {
        let relay = {
            let table = self.conferences.read().await;
            Arc::clone(table.get(&id).ok_or(Error::ConferenceNotFound(id))?)
        };
        relay.quit(client_id, &cids).await;
        Ok(Response::ack(id))
    }

    /// Tear down a conference and return its ports to the pool.
    ///
    /// Creator-only, enforced against the requesting control connection's
    /// identity. The entry leaves the table before teardown starts, so a
    /// racing join sees either the live conference or not-found, never a
    /// half-cancelled one.
    async fn cancel(&self, id: ConferenceId, client_id: &ClientId) -> Result<Response> {
        let relay = {
            let mut table = self.conferences.write().await;
            let relay = table.get(&id).ok_or(Error::ConferenceNotFound(id))?;
            if relay.creator() != client_id {
                return Err(Error::NotCreator(id));
            }
            table.remove(&id).ok_or(Error::ConferenceNotFound(id))?
        };

        relay.cancel().await;
        self.pool.lock().await.release(&relay.ports().ports());
        tracing::info!(conference = %id, "conference removed and ports released");
        Ok(Response::ack(id))
    }

    /// Control-path share: relay a payload on behalf of a client whose
    /// channel traffic is multiplexed through its control connection.
    async fn share(
        &self,
        id: Option<ConferenceId>,
        data_type: ChannelKind,
        data: String,
        client_id: &ClientId,
    ) -> Result<()> {
        let id = id.ok_or_else(|| {
            Error::Protocol("share on the control connection requires conference_id".into())
        })?;
        let relay = {
            let table = self.conferences.read().await;
            Arc::clone(table.get(&id).ok_or(Error::ConferenceNotFound(id))?)
        };
        relay.broadcast_share(data_type, client_id, data).await
    }
}
