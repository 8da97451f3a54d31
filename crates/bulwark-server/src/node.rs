//! Router runtime: links, advertiser, and action execution.
//!
//! A [`Node`] wraps a sans-IO [`Router`] and gives it sockets. Inbound links
//! come from the accept loop; outbound links are opened lazily the first
//! time the router asks to send to a neighbor. Either way, one link per
//! neighbor ends up in the [`ConnectionManager`] and carries traffic in both
//! directions.
//!
//! Packets this node originates are signed and queued under one lock, after
//! their links are up, so every neighbor sees our sequence numbers in
//! increasing order. Packets produced while handling a received one never
//! wait on a dial: a missing link is opened by a separate task.

use std::{
    io,
    sync::{Arc, Mutex, PoisonError},
};

use bulwark_core::{
    Authenticator, Identity, KeyDirectory, Router, RouterAction, RouterError, Transport,
    TrustStore,
};
use bulwark_proto::{NodeId, Packet};
use bytes::Bytes;
use tokio::{
    io::AsyncRead,
    sync::broadcast,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    config::NodeConfig,
    connections::{ConnectionManager, FrameRead, Link, read_frame, write_frames},
    error::ServerError,
};

/// Deliveries buffered per subscriber before the slowest one lags.
const DELIVERY_CAPACITY: usize = 1024;

/// A running router.
pub struct Node<T: Transport> {
    config: NodeConfig,
    router: Router,
    transport: T,
    connections: ConnectionManager,
    deliveries: broadcast::Sender<Packet>,
    origin: Mutex<()>,
}

impl<T: Transport> Node<T> {
    /// Build a node. Nothing runs until [`Node::start`].
    ///
    /// The node's own key is preloaded into the trust store so it can verify
    /// its own traffic without consulting `directory`.
    pub fn new(
        config: NodeConfig,
        identity: Identity,
        directory: Arc<dyn KeyDirectory>,
        transport: T,
    ) -> Arc<Self> {
        let trust = TrustStore::new(directory);
        trust.preload(identity.node_id(), identity.verifying_key());

        let auth =
            Authenticator::new(identity, trust).with_initial_sequence(config.initial_sequence);
        let router = Router::new(auth, config.forwarding);
        let (deliveries, _) = broadcast::channel(DELIVERY_CAPACITY);

        Arc::new(Self {
            config,
            router,
            transport,
            connections: ConnectionManager::new(),
            deliveries,
            origin: Mutex::new(()),
        })
    }

    /// The routing core
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Live neighbor links
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Receive every FLOOD packet delivered to this node from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Packet> {
        self.deliveries.subscribe()
    }

    /// Spawn the accept loop and the advertiser.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            node = %self.config.node_id,
            interval = ?self.config.advertise_interval,
            mode = ?self.config.forwarding,
            "starting router"
        );

        let accept = {
            let node = Arc::clone(self);
            tokio::spawn(async move { node.accept_loop().await })
        };
        let advertise = {
            let node = Arc::clone(self);
            tokio::spawn(async move { node.advertise_loop().await })
        };

        vec![accept, advertise]
    }

    async fn accept_loop(self: Arc<Self>) {
        loop {
            match self.transport.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "accepted link");
                    self.spawn_link(stream, peer);
                },
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }

    async fn advertise_loop(self: Arc<Self>) {
        let mut ticker = interval(self.config.advertise_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.advertise().await;
        }
    }

    /// Send one round of route updates to every neighbor.
    pub async fn advertise(self: &Arc<Self>) {
        let targets: Vec<NodeId> = self
            .router
            .table()
            .advertisements()
            .into_iter()
            .filter(|(_, destinations)| !destinations.is_empty())
            .map(|(neighbor, _)| neighbor)
            .collect();
        self.connect_all(&targets).await;

        let _origin = self.lock_origin();
        match self.router.route_updates() {
            Ok(actions) => self.execute(actions),
            Err(e) => warn!(error = %e, "failed to build route updates"),
        }
    }

    /// Originate `count` FLOOD packets to `destination`.
    pub async fn flood(self: &Arc<Self>, destination: &str, count: usize) -> Result<(), ServerError> {
        if !self.router.is_local(destination) {
            self.connect_all(&self.router.table().neighbors()).await;
        }

        let _origin = self.lock_origin();
        for i in 0..count {
            let actions = self.router.originate_flood(destination, format!("hello {i}"))?;
            self.execute(actions);
        }
        Ok(())
    }

    /// Run one received packet through the router and execute the result.
    ///
    /// Rejections are logged and swallowed; one bad packet never affects the
    /// link it arrived on.
    pub async fn handle_packet(self: &Arc<Self>, packet: Packet, arrived_from: &str) {
        let packet_type = packet.packet_type;
        let source = packet.source.clone();

        match self.router.receive(packet, arrived_from).await {
            Ok(actions) => self.execute(actions),
            Err(RouterError::Authentication(e)) => {
                debug!(%source, %packet_type, from = arrived_from, "dropping packet: {e}");
            },
            Err(e) => {
                warn!(%source, %packet_type, from = arrived_from, "dropping packet: {e}");
            },
        }
    }

    /// Queue sends on live links and hand deliveries to subscribers.
    ///
    /// Never waits: a send with no usable link is passed to a background
    /// task that dials first.
    fn execute(self: &Arc<Self>, actions: Vec<RouterAction>) {
        for action in actions {
            match action {
                RouterAction::Send { to, packet } => {
                    let frame = match packet.encode() {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(peer = %to, packet_type = %packet.packet_type, "encode failed: {e}");
                            continue;
                        },
                    };

                    let frame = match self.connections.get(&to) {
                        Some(link) => match link.send(frame.clone()) {
                            Ok(()) => continue,
                            Err(_) => {
                                self.connections.deregister(&to, link.id());
                                frame
                            },
                        },
                        None => frame,
                    };

                    let node = Arc::clone(self);
                    let packet_type = packet.packet_type;
                    tokio::spawn(async move {
                        if let Err(e) = node.send(&to, frame).await {
                            warn!(peer = %to, %packet_type, "send failed: {e}");
                        }
                    });
                },
                RouterAction::Deliver(packet) => {
                    if self.deliveries.send(packet).is_err() {
                        debug!("delivered packet with no subscribers");
                    }
                },
            }
        }
    }

    async fn send(self: &Arc<Self>, to: &str, frame: Bytes) -> Result<(), ServerError> {
        let link = self.get_or_connect(to).await?;
        if link.send(frame.clone()).is_ok() {
            return Ok(());
        }

        // Writer already exited; drop the stale entry and dial once more.
        self.connections.deregister(to, link.id());
        self.get_or_connect(to).await?.send(frame)
    }

    /// Make sure a link to each of `peers` is up before originating traffic.
    async fn connect_all(self: &Arc<Self>, peers: &[NodeId]) {
        for peer in peers {
            if let Err(e) = self.get_or_connect(peer).await {
                warn!(peer = %peer, "{e}");
            }
        }
    }

    fn lock_origin(&self) -> std::sync::MutexGuard<'_, ()> {
        self.origin.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn get_or_connect(self: &Arc<Self>, peer: &str) -> Result<Link, ServerError> {
        if let Some(link) = self.connections.get(peer) {
            return Ok(link);
        }

        let stream = match timeout(self.config.connect_timeout, self.transport.connect(peer)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ServerError::Connect { peer: peer.to_string(), source }),
            Err(_) => {
                return Err(ServerError::Connect {
                    peer: peer.to_string(),
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                });
            },
        };

        debug!(peer, "opened link");
        Ok(self.spawn_link(stream, peer.to_string()))
    }

    fn spawn_link(self: &Arc<Self>, stream: T::Stream, peer: NodeId) -> Link {
        let (link, mut queue) = self.connections.register(&peer);
        let link_id = link.id();
        let (mut reader, mut writer) = tokio::io::split(stream);

        let writer_peer = peer.clone();
        tokio::spawn(async move {
            if let Err(e) = write_frames(&mut writer, &mut queue).await {
                debug!(peer = %writer_peer, "writer stopped: {e}");
            }
        });

        let node = Arc::clone(self);
        tokio::spawn(async move {
            node.read_loop(&mut reader, &peer).await;
            if node.connections.deregister(&peer, link_id) {
                debug!(peer = %peer, link_id, "link closed");
            }
        });

        link
    }

    async fn read_loop<R>(self: &Arc<Self>, reader: &mut R, peer: &str)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let packet = match timeout(self.config.idle_timeout, read_frame(reader)).await {
                Err(_) => {
                    debug!(peer, "link idle");
                    return;
                },
                Ok(Err(e)) => {
                    debug!(peer, "link failed: {e}");
                    return;
                },
                Ok(Ok(FrameRead::Closed)) => return,
                Ok(Ok(FrameRead::Malformed(e))) => {
                    warn!(peer, "discarding malformed packet: {e}");
                    continue;
                },
                Ok(Ok(FrameRead::Packet(packet))) => packet,
            };

            self.handle_packet(packet, peer).await;
        }
    }
}

impl<T: Transport> std::fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("config", &self.config)
            .field("router", &self.router)
            .field("links", &self.connections.peers())
            .finish_non_exhaustive()
    }
}
