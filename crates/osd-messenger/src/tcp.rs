use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use osd_protocol::{Envelope, MessageBody, OsdCodec};
use osd_types::PeerAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::error::{MessengerError, MessengerResult};
use crate::traits::Messenger;

/// Outbound queue of encoded frames for one accepted connection.
type FrameSender = mpsc::UnboundedSender<Vec<u8>>;

struct Route {
    conn: u64,
    tx: FrameSender,
}

/// An envelope read off a connection, tagged with where its replies go.
struct Inbound {
    conn: u64,
    tx: FrameSender,
    envelope: Envelope,
}

/// Framed TCP messenger.
///
/// Each accepted connection gets a reader task and a writer task. Readers
/// forward decoded envelopes into a single [`Inbox`], so whoever drains the
/// inbox sees requests one at a time. When the inbox hands out an envelope,
/// its `source` address is bound to the connection it arrived on; replies
/// to that address are queued on that connection in send order. Binding at
/// hand-out rather than at read time keeps replies on the right connection
/// even when two connections announce the same address.
pub struct TcpMessenger {
    local: PeerAddr,
    codec: OsdCodec,
    bound: SocketAddr,
    routes: Mutex<HashMap<PeerAddr, Route>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Serial stream of inbound envelopes from every connection.
pub struct Inbox {
    messenger: Arc<TcpMessenger>,
    rx: mpsc::UnboundedReceiver<Inbound>,
    shutdown: watch::Receiver<bool>,
}

impl Inbox {
    /// Next inbound envelope, or `None` once the messenger is shut down.
    pub async fn recv(&mut self) -> Option<Envelope> {
        if *self.shutdown.borrow() {
            return None;
        }
        let inbound = tokio::select! {
            inbound = self.rx.recv() => inbound?,
            _ = self.shutdown.changed() => return None,
        };
        self.messenger
            .bind_route(inbound.envelope.source, inbound.conn, &inbound.tx);
        Some(inbound.envelope)
    }
}

impl TcpMessenger {
    /// Bind a listener and start accepting peers.
    pub async fn bind(
        bind_addr: SocketAddr,
        local: PeerAddr,
        codec: OsdCodec,
    ) -> MessengerResult<(Arc<Self>, Inbox)> {
        let listener = TcpListener::bind(bind_addr).await?;
        let bound = listener.local_addr()?;
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let messenger = Arc::new(Self {
            local,
            codec,
            bound,
            routes: Mutex::new(HashMap::new()),
            shutdown_tx,
        });
        tokio::spawn(Arc::clone(&messenger).accept_loop(listener, inbox_tx));
        info!(%bound, %local, "messenger listening");

        let inbox = Inbox {
            messenger: Arc::clone(&messenger),
            rx: inbox_rx,
            shutdown: shutdown_rx,
        };
        Ok((messenger, inbox))
    }

    /// Socket address actually bound (resolves port 0).
    pub fn bound_addr(&self) -> SocketAddr {
        self.bound
    }

    /// Peers that currently have a live route.
    pub fn connected_peers(&self) -> Vec<PeerAddr> {
        let routes = self.routes.lock().expect("lock poisoned");
        routes.keys().copied().collect()
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, inbox: mpsc::UnboundedSender<Inbound>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut next_conn = 0u64;
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        next_conn += 1;
                        debug!(%remote, conn = next_conn, "accepted connection");
                        let messenger = Arc::clone(&self);
                        tokio::spawn(messenger.serve_connection(next_conn, stream, inbox.clone()));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
                _ = shutdown.changed() => break,
            }
        }
        debug!("accept loop stopped");
    }

    async fn serve_connection(
        self: Arc<Self>,
        conn: u64,
        stream: TcpStream,
        inbox: mpsc::UnboundedSender<Inbound>,
    ) {
        let (mut reader, mut writer) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let codec = self.codec;

        // Frames are encoded by `send_message`; only a socket error ends this task.
        let mut writer_task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                writer.write_all(&frame).await?;
                writer.flush().await?;
            }
            Ok::<(), io::Error>(())
        });
        let mut writer_done = false;

        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            let frame = tokio::select! {
                frame = codec.read_frame(&mut reader) => frame,
                joined = &mut writer_task => {
                    writer_done = true;
                    log_writer_exit(conn, joined);
                    break;
                }
                _ = shutdown.changed() => break,
            };
            match frame {
                Ok(Some(envelope)) => {
                    let inbound = Inbound {
                        conn,
                        tx: tx.clone(),
                        envelope,
                    };
                    if inbox.send(inbound).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!(conn, "peer closed connection");
                    break;
                }
                Err(e) => {
                    warn!(conn, error = %e, "dropping connection after bad frame");
                    break;
                }
            }
        }

        self.unregister(conn);
        drop(tx);
        if !writer_done {
            log_writer_exit(conn, writer_task.await);
        }
    }

    /// Point `peer` at connection `conn`. A request whose connection has
    /// already gone clears the route instead, so its reply fails to send
    /// rather than landing on another connection.
    fn bind_route(&self, peer: PeerAddr, conn: u64, tx: &FrameSender) {
        let mut routes = self.routes.lock().expect("lock poisoned");
        if tx.is_closed() {
            routes.remove(&peer);
            return;
        }
        match routes.get(&peer) {
            Some(route) if route.conn == conn => {}
            _ => {
                debug!(%peer, conn, "route bound");
                routes.insert(
                    peer,
                    Route {
                        conn,
                        tx: tx.clone(),
                    },
                );
            }
        }
    }

    fn unregister(&self, conn: u64) {
        let mut routes = self.routes.lock().expect("lock poisoned");
        routes.retain(|_, route| route.conn != conn);
    }
}

fn log_writer_exit(conn: u64, joined: Result<io::Result<()>, JoinError>) {
    match joined {
        Ok(Ok(())) => debug!(conn, "writer finished"),
        Ok(Err(e)) => warn!(conn, error = %e, "write failed, closing connection"),
        Err(e) => warn!(conn, error = %e, "writer task aborted"),
    }
}

impl Messenger for TcpMessenger {
    fn local_addr(&self) -> PeerAddr {
        self.local
    }

    /// Encodes the frame before queueing it, so a reply too large for the
    /// codec comes back as [`MessengerError::Protocol`] and the connection
    /// stays usable.
    fn send_message(&self, body: MessageBody, dest: PeerAddr) -> MessengerResult<()> {
        if self.is_shut_down() {
            return Err(MessengerError::ShutDown);
        }
        let frame = self.codec.encode(&Envelope::new(self.local, body))?;
        let routes = self.routes.lock().expect("lock poisoned");
        let route = routes.get(&dest).ok_or(MessengerError::UnknownPeer(dest))?;
        route
            .tx
            .send(frame)
            .map_err(|_| MessengerError::Closed(dest.to_string()))
    }

    fn shutdown(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!(local = %self.local, "messenger shutting down");
        }
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

impl std::fmt::Debug for TcpMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpMessenger")
            .field("local", &self.local)
            .field("bound", &self.bound)
            .finish()
    }
}
