//! TCP transport.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bulwark_core::Transport;
use bulwark_proto::NodeId;
use tokio::net::{TcpListener, TcpStream};

/// Listens on the router port and dials neighbors on the same port.
///
/// Inbound peers are identified by their IP address, which is also how
/// neighbors are named in configuration.
pub struct TcpTransport {
    listener: TcpListener,
    port: u16,
}

impl TcpTransport {
    /// Bind the listening socket. Neighbors are dialed on `addr`'s port.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, port: addr.port() })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, NodeId)> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((stream, addr.ip().to_string()))
    }

    async fn connect(&self, peer: &str) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((peer, self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
