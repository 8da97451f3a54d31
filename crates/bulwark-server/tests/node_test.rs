//! Node runtime tests over in-memory links.
//!
//! Inbound links are handed to the node through the transport's accept
//! queue. Outbound dials wait on a gate the test controls, which makes a
//! slow neighbor easy to stage.

use std::{io, sync::Arc, time::Duration};

use async_trait::async_trait;
use bulwark_core::{
    Authenticator, ForwardingMode, Identity, Router, StaticDirectory, Transport, TrustStore,
};
use bulwark_proto::{FrameHeader, MasterConfig, NodeId, Packet, PacketType};
use bulwark_server::{FrameRead, Node, NodeConfig, connections::read_frame};
use tokio::{
    io::{AsyncWriteExt, DuplexStream, duplex},
    sync::{Mutex, mpsc, watch},
    time::timeout,
};

const NODE: &str = "1.1.1.1";
const ALL: &[&str] = &["1.1.1.1", "2.2.2.2", "3.3.3.3"];
const WAIT: Duration = Duration::from_secs(5);

struct DuplexTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<(DuplexStream, NodeId)>>,
    dialed: std::sync::Mutex<Vec<(NodeId, DuplexStream)>>,
    dial_gate: watch::Receiver<bool>,
}

#[async_trait]
impl Transport for DuplexTransport {
    type Stream = DuplexStream;

    async fn accept(&self) -> io::Result<(DuplexStream, NodeId)> {
        match self.inbound.lock().await.recv().await {
            Some(link) => Ok(link),
            None => std::future::pending().await,
        }
    }

    async fn connect(&self, peer: &str) -> io::Result<DuplexStream> {
        let mut gate = self.dial_gate.clone();
        gate.wait_for(|open| *open).await.map_err(|_| io::Error::other("gate dropped"))?;

        let (near, far) = duplex(64 * 1024);
        self.dialed.lock().unwrap().push((peer.to_string(), far));
        Ok(near)
    }
}

struct Fixture {
    node: Arc<Node<DuplexTransport>>,
    inbound: mpsc::UnboundedSender<(DuplexStream, NodeId)>,
    dial_gate: watch::Sender<bool>,
}

fn identity(node_id: &str) -> Identity {
    let seed = node_id.bytes().fold(7u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
    Identity::from_secret(node_id, &[seed; 32])
}

fn directory() -> Arc<StaticDirectory> {
    Arc::new(StaticDirectory::from_records(ALL.iter().map(|n| identity(n).record())))
}

/// Started, unconfigured node for `1.1.1.1` with outbound dials held.
fn fixture() -> Fixture {
    let (inbound, accept_queue) = mpsc::unbounded_channel();
    let (dial_gate, gate) = watch::channel(false);
    let transport = DuplexTransport {
        inbound: Mutex::new(accept_queue),
        dialed: std::sync::Mutex::new(Vec::new()),
        dial_gate: gate,
    };

    let config =
        NodeConfig { advertise_interval: Duration::from_secs(3600), ..NodeConfig::new(NODE) };
    let node = Node::new(config, identity(NODE), directory(), transport);
    let _tasks = node.start();

    Fixture { node, inbound, dial_gate }
}

/// Install `neighbors`. Call after [`attach`] so the advertiser's first
/// round has already gone out with an empty table.
fn configure(fixture: &Fixture, neighbors: &[&str]) {
    let packet = MasterConfig {
        hosts: Vec::new(),
        neighbors: neighbors.iter().map(|n| (*n).to_string()).collect(),
    }
    .into_packet("master", NODE)
    .unwrap();
    fixture.node.router().dispatch(packet, "master").unwrap();
}

/// Hand the node an inbound link from `peer` and wait until it is live.
async fn attach(fixture: &Fixture, peer: &str) -> DuplexStream {
    let (near, far) = duplex(64 * 1024);
    fixture.inbound.send((near, peer.to_string())).unwrap();

    timeout(WAIT, async {
        while fixture.node.connections().get(peer).is_none() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    far
}

fn signed_flood(source: &str, destination: &str, sequence: u64) -> Vec<u8> {
    let packet = Packet::new(source, destination, PacketType::Flood, "hello 0", sequence);
    let signer = Authenticator::new(identity(source), TrustStore::new(directory()));
    signer.sign(packet).unwrap().encode().unwrap().to_vec()
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn originated_packets_pass_the_neighbors_replay_check() {
    let fixture = fixture();
    let mut peer3 = attach(&fixture, "3.3.3.3").await;
    configure(&fixture, &["2.2.2.2", "3.3.3.3"]);

    // Both wait on the dial to 2.2.2.2
    let advertise = {
        let node = Arc::clone(&fixture.node);
        tokio::spawn(async move { node.advertise().await })
    };
    settle().await;
    let flood = {
        let node = Arc::clone(&fixture.node);
        tokio::spawn(async move { node.flood("9.9.9.9", 1).await })
    };
    settle().await;

    fixture.dial_gate.send(true).unwrap();
    advertise.await.unwrap();
    flood.await.unwrap().unwrap();

    let receiver = Router::new(
        Authenticator::new(identity("3.3.3.3"), TrustStore::new(directory())),
        ForwardingMode::Forward,
    );
    let mut seen = Vec::new();
    while !seen.contains(&PacketType::Flood) {
        let FrameRead::Packet(packet) = timeout(WAIT, read_frame(&mut peer3)).await.unwrap().unwrap()
        else {
            panic!("expected a packet from {NODE}");
        };
        seen.push(packet.packet_type);
        receiver.receive(packet, NODE).await.unwrap();
    }

    assert!(seen.contains(&PacketType::RouteUpdate));
    assert_eq!(receiver.table().next_hop("2.2.2.2"), Some(NODE));
}

#[tokio::test]
async fn pending_dial_does_not_stall_the_link_it_was_triggered_from() {
    let fixture = fixture();
    let mut deliveries = fixture.node.subscribe();
    let mut peer3 = attach(&fixture, "3.3.3.3").await;
    configure(&fixture, &["2.2.2.2", "3.3.3.3"]);

    // Relaying the first needs a link to 2.2.2.2, which never opens
    peer3.write_all(&signed_flood("3.3.3.3", "9.9.9.9", 1)).await.unwrap();
    peer3.write_all(&signed_flood("3.3.3.3", NODE, 2)).await.unwrap();

    let delivered = timeout(WAIT, deliveries.recv()).await.unwrap().unwrap();
    assert_eq!(delivered.sequence, 2);
    assert!(fixture.node.connections().get("2.2.2.2").is_none());
}

#[tokio::test]
async fn malformed_frame_does_not_end_the_link() {
    let fixture = fixture();
    let mut deliveries = fixture.node.subscribe();
    let mut peer3 = attach(&fixture, "3.3.3.3").await;
    configure(&fixture, &["3.3.3.3"]);

    let garbage = b"\xffnot a packet";
    let header = FrameHeader::new(garbage.len()).unwrap();
    peer3.write_all(&header.to_bytes()).await.unwrap();
    peer3.write_all(garbage).await.unwrap();
    peer3.write_all(&signed_flood("3.3.3.3", NODE, 1)).await.unwrap();

    let delivered = timeout(WAIT, deliveries.recv()).await.unwrap().unwrap();
    assert_eq!(delivered.source, "3.3.3.3");
    assert!(fixture.node.connections().get("3.3.3.3").is_some());
}
