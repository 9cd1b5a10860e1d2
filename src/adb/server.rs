use crate::adb::acceptor::{Acceptor, ConnectionHandler};
use crate::adb::session::Session;
use crate::config::{ServerConfig, DEFAULT_PORT};
use crate::device::responder::AdbResponder;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use log::*;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::net::TcpStream;

/// Starts a [`Session`] for every accepted connection
pub struct SessionFactory {
    responder: Arc<dyn AdbResponder>,
}

#[async_trait]
impl ConnectionHandler for SessionFactory {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        let session = Session::new(stream, Arc::clone(&self.responder));
        match session.run().await {
            Ok(()) => debug!("Session with {} finished", peer),
            Err(e) if e.is_disconnect() => debug!("{} disconnected", peer),
            Err(e) => warn!("Session with {} ended: {}", peer, e),
        }
    }
}

/// ADB host protocol server
pub struct AdbServer {
    acceptor: Acceptor<SessionFactory>,
}

impl AdbServer {
    /// Server on `127.0.0.1` and the default port
    pub fn new(responder: Arc<dyn AdbResponder>) -> Self {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT));
        Self::with_address(addr, responder)
    }

    pub fn with_address(addr: SocketAddr, responder: Arc<dyn AdbResponder>) -> Self {
        Self {
            acceptor: Acceptor::new(addr, SessionFactory { responder }),
        }
    }

    /// Server on the host and port from `config`
    pub fn from_config(config: &ServerConfig, responder: Arc<dyn AdbResponder>) -> Result<Self> {
        let host = if config.host == "localhost" {
            "127.0.0.1"
        } else {
            config.host.as_str()
        };
        let address = format!("{}:{}", host, config.port);
        let addr = address
            .to_socket_addrs()
            .map_err(|e| AdbError::InvalidAddress(format!("{}: {}", address, e)))?
            .next()
            .ok_or_else(|| AdbError::InvalidAddress(address.clone()))?;

        Ok(Self::with_address(addr, responder))
    }

    /// Bind and serve. Returns the bound address once connections can be made.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        self.acceptor.start().await
    }

    pub async fn stop(&mut self) {
        self.acceptor.stop().await
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor.local_addr()
    }

    pub fn is_running(&self) -> bool {
        self.acceptor.is_running()
    }
}
