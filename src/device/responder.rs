use crate::core::types::RemoteFile;
use crate::error::DeviceError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Registry of devices served by the host protocol.
///
/// Every session reads the registry concurrently and without locking on the
/// protocol side, so implementations must tolerate concurrent calls. The
/// device list may change between two calls; sessions never cache it across
/// commands.
pub trait AdbResponder: Send + Sync {
    /// Called with every host command before it is dispatched
    fn on_command(&self, _command: &str) {}

    /// Protocol version reported by `host:version`
    fn version(&self) -> u32;

    /// Known devices in registry order. Serials must be unique.
    ///
    /// Sessions keep only a weak handle to a selected device and look its
    /// serial up again here when that handle is gone, so returning freshly
    /// built `Arc`s on every call is fine.
    fn devices(&self) -> Vec<Arc<dyn AdbDeviceResponder>>;
}

/// A single device behind the host protocol.
///
/// Sessions targeting the same device may call these concurrently; a device
/// that needs ordering between operations has to serialize them itself.
#[async_trait]
pub trait AdbDeviceResponder: Send + Sync {
    fn serial(&self) -> &str;

    /// Device class label, e.g. `device` or `offline`
    fn device_type(&self) -> &str;

    /// Run `command`, streaming the client connection through `stdin` and
    /// `stdout` until the command completes.
    async fn shell(
        &self,
        command: &str,
        stdin: &mut (dyn AsyncRead + Unpin + Send),
        stdout: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<(), DeviceError>;

    /// Store a pushed file
    async fn file_pushed(
        &self,
        file: &RemoteFile,
        mode: u32,
        contents: Bytes,
    ) -> Result<(), DeviceError>;

    /// Contents of a file requested by a pull
    async fn file_pulled(&self, file: &RemoteFile) -> Result<Bytes, DeviceError>;
}

/// Find a device by exact serial match
pub fn find_device(
    responder: &dyn AdbResponder,
    serial: &str,
) -> Option<Arc<dyn AdbDeviceResponder>> {
    responder.devices().into_iter().find(|d| d.serial() == serial)
}
