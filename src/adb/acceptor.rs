use crate::error::{AdbError, Result};
use async_trait::async_trait;
use log::*;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// Backoff after a failed accept()
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// Serves one accepted connection
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr);
}

struct Running {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// TCP listener running one detached task per accepted connection
pub struct Acceptor<H> {
    addr: SocketAddr,
    handler: Arc<H>,
    running: Option<Running>,
}

impl<H: ConnectionHandler> Acceptor<H> {
    pub fn new(addr: SocketAddr, handler: H) -> Self {
        Self {
            addr,
            handler: Arc::new(handler),
            running: None,
        }
    }

    /// Bind and start accepting.
    ///
    /// Returns once the listening socket is bound, so connections made after
    /// this returns are never refused. Bind failures are returned here.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.running.is_some() {
            return Err(AdbError::AlreadyRunning);
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(
            self.addr,
            Arc::clone(&self.handler),
            ready_tx,
            shutdown_rx,
        ));

        let local_addr = match ready_rx.await {
            Ok(Ok(local_addr)) => local_addr,
            Ok(Err(source)) => {
                let _ = task.await;
                return Err(AdbError::Bind {
                    addr: self.addr,
                    source,
                });
            }
            Err(_) => return Err(AdbError::NotReady),
        };

        info!("Listening on {}", local_addr);
        self.running = Some(Running {
            local_addr,
            shutdown: shutdown_tx,
            task,
        });
        Ok(local_addr)
    }

    /// Close the listening socket and wait for the accept loop to exit.
    ///
    /// Connections already accepted keep running until they finish.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(());
        if let Err(e) = running.task.await {
            warn!("Accept loop on {} ended abnormally: {}", running.local_addr, e);
        }
        info!("Stopped listening on {}", running.local_addr);
    }

    /// Bound address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

async fn accept_loop<H: ConnectionHandler>(
    addr: SocketAddr,
    handler: Arc<H>,
    ready: oneshot::Sender<io::Result<SocketAddr>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let bound = TcpListener::bind(addr)
        .await
        .and_then(|listener| Ok((listener.local_addr()?, listener)));
    let (local_addr, listener) = match bound {
        Ok(bound) => bound,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(local_addr)).is_err() {
        return;
    }

    loop {
        tokio::select! {
            // Also fires when the acceptor is dropped without stop()
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        handler.handle(stream, peer).await;
                    });
                }
                Err(e) => {
                    warn!("Failed to accept connection on {}: {}", local_addr, e);
                    tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                }
            },
        }
    }

    debug!("Accept loop on {} exiting", local_addr);
}
