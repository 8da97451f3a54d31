//! Transport over turmoil's simulated TCP.

use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use async_trait::async_trait;
use bulwark_core::Transport;
use bulwark_proto::NodeId;
use turmoil::net::{TcpListener, TcpStream};

/// Simulated router socket. Peers are named by their simulated IP.
pub struct SimTransport {
    listener: TcpListener,
    port: u16,
}

impl SimTransport {
    /// Listen on `port` on the current simulated host.
    pub async fn bind(port: u16) -> io::Result<Self> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, port })
    }
}

#[async_trait]
impl Transport for SimTransport {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, NodeId)> {
        let (stream, addr) = self.listener.accept().await?;
        Ok((stream, addr.ip().to_string()))
    }

    async fn connect(&self, peer: &str) -> io::Result<TcpStream> {
        let ip: IpAddr = peer.parse().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("not an address: {peer}"))
        })?;
        TcpStream::connect(SocketAddr::new(ip, self.port)).await
    }
}
