use std::net::SocketAddr;
use thiserror::Error;

/// Failures answered with a host-level `FAIL`. The session keeps serving.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("'{0}' not connected")]
    NotConnected(String),

    #[error("no devices/emulators found")]
    NoDevices,

    #[error("no device selected")]
    NoDeviceSelected,

    #[error("device offline")]
    DeviceOffline,

    #[error("Reply too large: {0} bytes")]
    ReplyTooLarge(usize),
}

/// Failures answered with a sync `FAIL` inside a `sync:` transfer.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unknown sync id {0}")]
    UnknownId(String),

    #[error("Invalid file mode: {0}")]
    InvalidMode(String),

    #[error("Transfer aborted: {0}")]
    Aborted(String),

    #[error("{0}")]
    Device(#[from] DeviceError),
}

/// Errors reported by a device responder.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("{0}: No such file or directory")]
    NotFound(String),

    #[error("{0}: Permission denied")]
    PermissionDenied(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AdbError {
    #[error("ADB connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Server stopped before it was ready")]
    NotReady,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Sync failure: {0}")]
    Sync(#[from] SyncError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, AdbError>;

impl AdbError {
    /// Whether the peer closed or reset the connection
    pub fn is_disconnect(&self) -> bool {
        use std::io::ErrorKind;

        match self {
            AdbError::Io(e) => matches!(
                e.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
