//! Per-channel client registry
//!
//! Each conference keeps one registry per data channel, mapping client
//! identity to the write half of its open connection. Broadcast snapshots
//! the membership and then writes, so entries can be inserted or removed
//! concurrently without blocking behind a slow recipient's socket; a failed
//! write evicts that one entry and delivery continues to the rest.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, RwLock};

use crate::protocol::{ChannelKind, ClientId};

type Writer = Arc<Mutex<OwnedWriteHalf>>;

/// Registry of connected clients for a single data channel
pub struct ChannelRegistry {
    kind: ChannelKind,
    clients: RwLock<HashMap<ClientId, Writer>>,
}

impl ChannelRegistry {
    pub fn new(kind: ChannelKind) -> Self {
        ChannelRegistry {
            kind,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Register a newly accepted connection's write half
    pub async fn insert(&self, client_id: ClientId, writer: OwnedWriteHalf) {
        let previous = self
            .clients
            .write()
            .await
            .insert(client_id.clone(), Arc::new(Mutex::new(writer)));
        if previous.is_some() {
            tracing::warn!(channel = %self.kind, client = %client_id, "replaced existing registry entry");
        }
    }

    /// Drop a client's connection. Returns whether an entry was present.
    /// Dropping the write half sends FIN, so the peer observes the close.
    pub async fn remove(&self, client_id: &ClientId) -> bool {
        self.clients.write().await.remove(client_id).is_some()
    }

    pub async fn contains(&self, client_id: &ClientId) -> bool {
        self.clients.read().await.contains_key(client_id)
    }

    /// Write one framed line to every registered client, optionally
    /// skipping the sender. A write failure closes and evicts that entry
    /// without aborting delivery to the remaining clients.
    pub async fn broadcast(&self, line: Bytes, exclude: Option<&ClientId>) {
        let snapshot: Vec<(ClientId, Writer)> = {
            let clients = self.clients.read().await;
            clients
                .iter()
                .filter(|(id, _)| exclude != Some(*id))
                .map(|(id, writer)| (id.clone(), Arc::clone(writer)))
                .collect()
        };

        for (client_id, writer) in snapshot {
            let result = {
                let mut writer = writer.lock().await;
                writer.write_all(&line).await
            };
            if let Err(e) = result {
                tracing::warn!(
                    channel = %self.kind,
                    client = %client_id,
                    error = %e,
                    "send failed, removing client"
                );
                self.clients.write().await.remove(&client_id);
            }
        }
    }

    /// Drop every connection and clear the registry
    pub async fn clear(&self) {
        self.clients.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    /// One accepted connection split for the registry, plus the client-side
    /// reader that observes what the registry sends.
    async fn connected_pair(
        listener: &TcpListener,
    ) -> (ClientId, OwnedWriteHalf, BufReader<TcpStream>) {
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, peer) = listener.accept().await.unwrap();
        let (_read, write) = server_side.into_split();
        (ClientId::from_addr(&peer), write, BufReader::new(client))
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = ChannelRegistry::new(ChannelKind::Text);

        let (sender_id, sender_writer, mut sender_rx) = connected_pair(&listener).await;
        let (other_id, other_writer, mut other_rx) = connected_pair(&listener).await;
        registry.insert(sender_id.clone(), sender_writer).await;
        registry.insert(other_id.clone(), other_writer).await;

        registry
            .broadcast(Bytes::from_static(b"hello\n"), Some(&sender_id))
            .await;

        let mut line = String::new();
        other_rx.read_line(&mut line).await.unwrap();
        assert_eq!(line, "hello\n");

        // The sender must not see its own message.
        let echo = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            sender_rx.read_line(&mut line),
        )
        .await;
        assert!(echo.is_err(), "sender received its own broadcast");
    }

    #[tokio::test]
    async fn test_broadcast_to_all_when_no_exclusion() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = ChannelRegistry::new(ChannelKind::Video);

        let (a_id, a_writer, mut a_rx) = connected_pair(&listener).await;
        let (b_id, b_writer, mut b_rx) = connected_pair(&listener).await;
        registry.insert(a_id, a_writer).await;
        registry.insert(b_id, b_writer).await;

        registry.broadcast(Bytes::from_static(b"frame\n"), None).await;

        for rx in [&mut a_rx, &mut b_rx] {
            let mut line = String::new();
            rx.read_line(&mut line).await.unwrap();
            assert_eq!(line, "frame\n");
        }
    }

    #[tokio::test]
    async fn test_dead_client_is_evicted_and_rest_still_delivered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = ChannelRegistry::new(ChannelKind::Audio);

        let (dead_id, dead_writer, dead_rx) = connected_pair(&listener).await;
        let (live_id, live_writer, mut live_rx) = connected_pair(&listener).await;
        registry.insert(dead_id.clone(), dead_writer).await;
        registry.insert(live_id.clone(), live_writer).await;

        // Keep the live client draining so broadcasts never stall on its
        // socket buffer while we hammer the dead one.
        let drain = tokio::spawn(async move {
            let mut sink = [0u8; 4096];
            while let Ok(n) = tokio::io::AsyncReadExt::read(&mut live_rx, &mut sink).await {
                if n == 0 {
                    break;
                }
            }
        });

        // Kill the first client's socket, then push enough data to force a
        // write error past any OS buffering.
        drop(dead_rx);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let chunk = Bytes::from(vec![b'x'; 64 * 1024]);
        for _ in 0..32 {
            registry.broadcast(chunk.clone(), None).await;
            if !registry.contains(&dead_id).await {
                break;
            }
        }

        assert!(!registry.contains(&dead_id).await, "dead client not evicted");
        assert!(registry.contains(&live_id).await);

        registry.clear().await;
        drain.await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = ChannelRegistry::new(ChannelKind::Screen);

        let (id, writer, mut rx) = connected_pair(&listener).await;
        registry.insert(id.clone(), writer).await;
        assert!(registry.remove(&id).await);
        assert!(!registry.remove(&id).await);

        // Dropping the write half sends FIN; the client reads EOF.
        let mut line = String::new();
        let n = rx.read_line(&mut line).await.unwrap();
        assert_eq!(n, 0);
    }
}
