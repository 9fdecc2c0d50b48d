//! Stream reader: the per-session worker that long-polls the cluster's
//! message feed and fans decoded messages into the connection engine.
//!
//! Reconnects transparently (carrying `lastseen` so the cluster replays
//! from the right id) on decode errors, stream idle, or transport loss.
//! Cluster pings update the registry and are never forwarded; `IRCToClient`
//! payloads go to the engine verbatim. On cancellation the task returns,
//! which drops its channel sender; the closed channel is the engine's
//! drain-complete signal.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::registry::ServerRegistry;
use super::session::SessionClient;
use super::wire::{ClusterMessage, MessageKind};

/// Reconnect when the stream delivers nothing for this long.
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Incremental decoder for a chunked stream of concatenated JSON objects.
///
/// Chunk boundaries are arbitrary: an object may arrive split across any
/// number of chunks, and one chunk may carry several objects.
#[derive(Debug, Default)]
pub struct JsonFrames {
    buf: BytesMut,
}

impl JsonFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk of body bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// The next complete object, `None` if more bytes are needed, or the
    /// decode error that poisons the stream.
    pub fn next_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>, serde_json::Error> {
        let mut iter = serde_json::Deserializer::from_slice(&self.buf).into_iter::<T>();
        match iter.next() {
            None => {
                // Nothing but whitespace left.
                self.buf.clear();
                Ok(None)
            }
            Some(Ok(value)) => {
                let consumed = iter.byte_offset();
                drop(iter);
                self.buf.advance(consumed);
                Ok(Some(value))
            }
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(e),
        }
    }
}

/// Spawn the stream reader for one session.
///
/// `inbound` carries `IRCToClient` payloads to the engine; `cancel` is the
/// engine's single-shot shutdown signal.
pub fn spawn(
    client: SessionClient,
    sessionid: String,
    registry: Arc<ServerRegistry>,
    inbound: mpsc::UnboundedSender<String>,
    cancel: oneshot::Receiver<()>,
    addr: SocketAddr,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(stream_task(client, sessionid, registry, inbound, cancel, addr))
}

async fn stream_task(
    client: SessionClient,
    sessionid: String,
    registry: Arc<ServerRegistry>,
    inbound: mpsc::UnboundedSender<String>,
    mut cancel: oneshot::Receiver<()>,
    addr: SocketAddr,
) {
    // Carried across reconnects so the cluster resumes instead of replaying
    // the whole session.
    let mut last_seen: u64 = 0;

    loop {
        let opened = tokio::select! {
            _ = &mut cancel => return,
            opened = client.stream(&sessionid, last_seen) => opened,
        };

        let (endpoint, resp) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                warn!(%addr, session = %sessionid, "could not open message stream: {e}");
                return;
            }
        };
        // The router already recorded `endpoint` as master: not because it
        // leads, but because it is reachable. The write path corrects this
        // via redirects.
        debug!(%addr, %endpoint, last_seen, "message stream open");

        let body = resp.bytes_stream();
        tokio::pin!(body);
        let mut frames = JsonFrames::new();

        'read: loop {
            let next = tokio::select! {
                _ = &mut cancel => return,
                next = tokio::time::timeout(STREAM_IDLE_TIMEOUT, body.next()) => next,
            };

            let chunk = match next {
                Err(_) => {
                    warn!(%addr, %endpoint, "no traffic on message stream for 60s, reconnecting");
                    registry.mark_failed(&endpoint);
                    break 'read;
                }
                Ok(None) => {
                    warn!(%addr, %endpoint, "message stream closed by server, reconnecting");
                    registry.mark_failed(&endpoint);
                    break 'read;
                }
                Ok(Some(Err(e))) => {
                    warn!(%addr, %endpoint, "message stream transport error: {e}");
                    registry.mark_failed(&endpoint);
                    break 'read;
                }
                Ok(Some(Ok(chunk))) => chunk,
            };

            frames.extend(&chunk);
            loop {
                let msg: ClusterMessage = match frames.next_frame() {
                    Ok(Some(msg)) => msg,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(%addr, %endpoint, "could not decode message stream: {e}");
                        registry.mark_failed(&endpoint);
                        break 'read;
                    }
                };

                last_seen = msg.id;
                match msg.kind {
                    Some(MessageKind::Ping) => {
                        if let (Some(servers), Some(master)) = (msg.servers, msg.current_master) {
                            if !servers.is_empty() {
                                debug!(%addr, ?servers, %master, "cluster membership update");
                                registry.update_membership(servers, master);
                            }
                        }
                    }
                    Some(MessageKind::IrcToClient) => {
                        if let Some(data) = msg.data {
                            debug!(%addr, %data, "<-cluster");
                            if inbound.send(data).is_err() {
                                // Engine is gone; nothing left to feed.
                                return;
                            }
                        }
                    }
                    None => {}
                }
            }
        }
        // The body stream drops here, closing the response before the
        // reconnect.
    }
}
