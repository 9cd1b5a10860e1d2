pub mod acceptor;
pub mod protocol;
pub mod server;
pub mod session;
pub mod sync;

pub use acceptor::{Acceptor, ConnectionHandler};
pub use protocol::HostCommand;
pub use server::AdbServer;
pub use session::Session;

// Re-export commonly used types
pub use crate::error::Result;
