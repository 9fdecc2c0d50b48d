//! Per-connection engine — the state machine that owns one IRC socket and
//! one cluster session.
//!
//! In the running state it multiplexes three inputs: decoded IRC frames,
//! inbound cluster payloads, and a 60-second idle timer. IRC keep-alive
//! (PING/PONG) is answered locally so the liveness of the local hop never
//! depends on cluster latency; everything else is posted to the cluster
//! with the client's original bytes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::cluster::registry::ServerRegistry;
use crate::cluster::session::SessionClient;
use crate::cluster::stream;
use crate::irc::codec::{IrcCodec, RawLine};
use crate::irc::message::Message;

/// With no traffic in either direction for this long, send a PING; with no
/// PONG for another interval, the connection is dead.
const IDLE_INTERVAL: Duration = Duration::from_secs(60);

/// Parameter carried by locally synthesized PINGs.
const PING_TOKEN: &str = "robustirc.bridge";

/// Drive one IRC connection for its whole lifetime.
pub async fn handle_client(
    socket: TcpStream,
    addr: SocketAddr,
    client: SessionClient,
    registry: Arc<ServerRegistry>,
) {
    let mut framed = Framed::new(socket, IrcCodec);

    let session = match client.create().await {
        Ok(session) => session,
        Err(e) => {
            warn!(%addr, "could not create RobustIRC session: {e}");
            let error = Message {
                prefix: None,
                command: "ERROR".into(),
                params: vec![format!("Could not create RobustIRC session: {e}")],
            };
            let _ = framed.send(error).await;
            return;
        }
    };
    info!(%addr, session = %session.id, prefix = %session.prefix, "session created");

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<String>();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    // The reader owns `inbound_tx`; its drop on task exit is the
    // drain-complete signal.
    let _reader = stream::spawn(
        client.clone(),
        session.id.clone(),
        registry,
        inbound_tx,
        cancel_rx,
        addr,
    );

    let mut quitmsg = String::new();
    let mut ping_pending = false;
    let idle = tokio::time::sleep(IDLE_INTERVAL);
    tokio::pin!(idle);

    'running: loop {
        tokio::select! {
            frame = framed.next() => {
                idle.as_mut().reset(tokio::time::Instant::now() + IDLE_INTERVAL);
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        warn!(%addr, "client protocol error: {e}");
                        break 'running;
                    }
                    None => {
                        info!(%addr, "client closed connection");
                        break 'running;
                    }
                };
                debug!(%addr, raw = frame.raw.trim_end(), "<-irc");

                match frame.message.command.to_uppercase().as_str() {
                    "PONG" => {
                        debug!(%addr, "received PONG reply");
                        ping_pending = false;
                    }
                    "PING" => {
                        let pong = Message {
                            prefix: Some(session.prefix.clone()),
                            command: "PONG".into(),
                            params: frame.message.params.clone(),
                        };
                        if framed.send(pong).await.is_err() {
                            break 'running;
                        }
                    }
                    "QUIT" => {
                        quitmsg = frame.message.params.last().cloned().unwrap_or_default();
                        break 'running;
                    }
                    _ => {
                        // The original bytes go to the cluster. A failed post
                        // is logged; the connection stays up.
                        if let Err(e) = client.post(&session.id, frame.raw).await {
                            warn!(%addr, session = %session.id, "message could not be posted: {e}");
                        }
                    }
                }
            }

            payload = inbound_rx.recv() => {
                idle.as_mut().reset(tokio::time::Instant::now() + IDLE_INTERVAL);
                match payload {
                    Some(data) => {
                        debug!(%addr, %data, "->irc");
                        if framed.send(RawLine(data)).await.is_err() {
                            break 'running;
                        }
                    }
                    None => {
                        warn!(%addr, session = %session.id, "cluster stream ended");
                        break 'running;
                    }
                }
            }

            _ = &mut idle => {
                if ping_pending {
                    info!(%addr, "ping timeout");
                    quitmsg = "ping timeout".into();
                    break 'running;
                }
                let ping = Message {
                    prefix: Some(session.prefix.clone()),
                    command: "PING".into(),
                    params: vec![PING_TOKEN.into()],
                };
                if framed.send(ping).await.is_err() {
                    break 'running;
                }
                ping_pending = true;
                idle.as_mut().reset(tokio::time::Instant::now() + IDLE_INTERVAL);
            }
        }
    }

    // Draining: cancel the stream reader, then drain its channel to
    // completion. A late payload must not race with session deletion.
    let _ = cancel_tx.send(());
    while inbound_rx.recv().await.is_some() {}

    match client.delete(&session.id, &quitmsg).await {
        Ok(()) => info!(%addr, session = %session.id, "session deleted"),
        Err(e) => warn!(%addr, session = %session.id, "could not delete session: {e}"),
    }
}
