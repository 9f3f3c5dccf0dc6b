use super::codec::EnvelopeCodec;
use super::types::Envelope;
use crate::config::types::NodeInfo;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Inbound dispatch callback.
///
/// Invoked once per fully received envelope, on the receive task of the
/// connection it arrived on. The next envelope from that connection is not
/// read until the returned future completes, which is what gives per-link
/// FIFO processing.
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, envelope: Envelope, from: SocketAddr) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no route to {0}")]
    NoRoute(String),

    #[error("outbound queue for {0} is closed")]
    Closed(String),

    #[error("failed to bind listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("transport already started")]
    AlreadyStarted,

    #[error("transport shut down")]
    Shutdown,
}

enum LinkOutcome {
    /// Write failed; the link must be re-established.
    Broken,
    /// Queue closed or transport shut down; the link task exits.
    Closed,
}

/// Full-mesh TCP transport.
///
/// One listening socket accepts inbound links; every configured peer gets one
/// long-lived outbound link with its own FIFO queue. Routes are keyed by
/// `NodeInfo::id`.
pub struct Transport {
    pub local: NodeInfo,
    peers: Vec<NodeInfo>,
    routes: DashMap<i32, mpsc::UnboundedSender<Envelope>>,
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    connected: watch::Sender<usize>,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
}

impl Transport {
    /// Binds the listening port of `local` on all interfaces. Nothing runs until
    /// [`Transport::start`].
    pub async fn bind(
        local: NodeInfo,
        peers: Vec<NodeInfo>,
        reconnect_delay: Duration,
    ) -> Result<Arc<Self>, TransportError> {
        let listener = TcpListener::bind(("0.0.0.0", local.port))
            .await
            .map_err(|source| TransportError::Bind {
                port: local.port,
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind {
                port: local.port,
                source,
            })?;

        let (connected, _) = watch::channel(0usize);

        Ok(Arc::new(Self {
            local,
            peers,
            routes: DashMap::new(),
            listener: Mutex::new(Some(listener)),
            local_addr,
            connected,
            reconnect_delay,
            shutdown: CancellationToken::new(),
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peers(&self) -> &[NodeInfo] {
        &self.peers
    }

    /// Spawns the accept loop and one outbound link task per peer.
    pub fn start<H: MessageHandler>(self: &Arc<Self>, handler: Arc<H>) -> Result<(), TransportError> {
        let listener = self
            .listener
            .lock()
            .map_err(|_| TransportError::AlreadyStarted)?
            .take()
            .ok_or(TransportError::AlreadyStarted)?;

        info!(
            "Node {} listening on {} with {} peer(s)",
            self.local.id,
            self.local_addr,
            self.peers.len()
        );

        let _accept_handle = {
            let transport = self.clone();
            tokio::spawn(async move {
                transport.accept_loop(listener, handler).await;
            })
        };

        for peer in self.peers.iter().cloned() {
            let transport = self.clone();
            tokio::spawn(async move {
                transport.peer_link(peer).await;
            });
        }

        Ok(())
    }

    /// Queues `envelope` on the outbound link to `peer`.
    ///
    /// Fails with `NoRoute` when no link to `peer` was ever established. The
    /// message is dropped in that case; there is no retry at this layer.
    pub fn send(&self, peer: &NodeInfo, envelope: Envelope) -> Result<(), TransportError> {
        match self.routes.get(&peer.id) {
            Some(route) => {
                trace!("Queued {} for {}", envelope.kind, peer.address());
                route
                    .send(envelope)
                    .map_err(|_| TransportError::Closed(peer.address()))
            }
            None => {
                error!("No route to {} for {}", peer.address(), envelope.kind);
                Err(TransportError::NoRoute(peer.address()))
            }
        }
    }

    /// Resolves once every configured peer has had an outbound link established.
    pub async fn wait_for_routes(&self) -> Result<(), TransportError> {
        let target = self.peers.len();
        let mut connected = self.connected.subscribe();

        tokio::select! {
            _ = self.shutdown.cancelled() => Err(TransportError::Shutdown),
            res = connected.wait_for(|n| *n >= target) => {
                res.map(|_| ()).map_err(|_| TransportError::Shutdown)
            }
        }
    }

    /// Stops accepting, drops every outbound queue and ends all link tasks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.routes.clear();
    }

    async fn accept_loop<H: MessageHandler>(self: Arc<Self>, listener: TcpListener, handler: Arc<H>) {
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    debug!("Accepted connection from {}", addr);
                    let handler = handler.clone();
                    let shutdown = self.shutdown.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = shutdown.cancelled() => {}
                            _ = Self::receive_loop(stream, addr, handler) => {}
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn receive_loop<H: MessageHandler>(stream: TcpStream, addr: SocketAddr, handler: Arc<H>) {
        let mut frames = FramedRead::new(stream, EnvelopeCodec::new());

        while let Some(frame) = frames.next().await {
            match frame {
                Ok(envelope) => {
                    trace!("Received {} from {}", envelope.kind, addr);
                    handler.on_message(envelope, addr).await;
                }
                Err(e) => {
                    error!("Error handling client at {}: {}", addr, e);
                    return;
                }
            }
        }

        debug!("Connection from {} closed", addr);
    }

    /// Owns the outbound queue for `peer` for the lifetime of the transport.
    ///
    /// The queue survives reconnects: envelopes enqueued while the link is down
    /// are written once it is back. The envelope whose write failed is lost.
    async fn peer_link(self: Arc<Self>, peer: NodeInfo) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut unregistered = Some(tx);

        loop {
            let Some(stream) = self.connect_with_retry(&peer).await else {
                return;
            };

            if let Some(tx) = unregistered.take() {
                self.routes.insert(peer.id, tx);
                self.connected.send_modify(|n| *n += 1);
            }

            match self.drain_queue(&peer, stream, &mut rx).await {
                LinkOutcome::Broken => {
                    warn!("Re-establishing link to {}", peer.address());
                }
                LinkOutcome::Closed => {
                    debug!("Link to {} closed", peer.address());
                    return;
                }
            }
        }
    }

    /// Dials `peer` until it answers. `None` only on shutdown.
    async fn connect_with_retry(&self, peer: &NodeInfo) -> Option<TcpStream> {
        let addr = peer.address();

        loop {
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }
                    info!("Connected to {}", addr);
                    return Some(stream);
                }
                Err(e) => {
                    warn!("Retrying connection to {}: {}", addr, e);
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    async fn drain_queue(
        &self,
        peer: &NodeInfo,
        stream: TcpStream,
        rx: &mut mpsc::UnboundedReceiver<Envelope>,
    ) -> LinkOutcome {
        let mut sink = FramedWrite::new(stream, EnvelopeCodec::new());

        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => return LinkOutcome::Closed,
                next = rx.recv() => next,
            };

            let Some(envelope) = next else {
                return LinkOutcome::Closed;
            };

            let kind = envelope.kind;
            // `send` flushes, so each envelope hits the socket before the next is taken.
            if let Err(e) = sink.send(envelope).await {
                error!("Connection lost to {} ({} dropped): {}", peer.address(), kind, e);
                return LinkOutcome::Broken;
            }
            debug!("{} sent to {}", kind, peer.address());
        }
    }
}
