use crate::adb::protocol::{encode_fail, encode_okay_data, read_command, HostCommand, OKAY};
use crate::adb::sync::{self, parse_send_target, SyncTransport};
use crate::core::types::{device_type, RemoteFile};
use crate::device::responder::{find_device, AdbDeviceResponder, AdbResponder};
use crate::error::{AdbError, ProtocolError, Result, SyncError};
use log::*;
use std::sync::{Arc, Weak};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};

enum Flow {
    Continue,
    Close,
}

/// Device chosen by `host:transport*`. The serial outlives the `Weak` so the
/// device can be looked up again if the registry handed out a fresh `Arc`.
struct Selection {
    serial: String,
    device: Weak<dyn AdbDeviceResponder>,
}

/// One client connection speaking the host protocol.
///
/// Commands are served one at a time until a `shell:`/`exec:` command hands
/// the connection over to the device, or until the peer goes away.
pub struct Session<S> {
    stream: BufStream<S>,
    responder: Arc<dyn AdbResponder>,
    selected: Option<Selection>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, responder: Arc<dyn AdbResponder>) -> Self {
        Self {
            stream: BufStream::new(stream),
            responder,
            selected: None,
        }
    }

    /// Serve commands until the session ends.
    ///
    /// Protocol failures are answered on the wire and do not end the session;
    /// any returned error is a transport failure.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let command = read_command(&mut self.stream).await?;
            debug!("Received command: {:?}", command);
            self.responder.on_command(&command);

            let flow = match HostCommand::parse(&command) {
                Ok(command) => self.dispatch(command).await,
                Err(e) => Err(e.into()),
            };

            match flow {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => {
                    self.stream.shutdown().await?;
                    return Ok(());
                }
                Err(AdbError::Protocol(e)) => {
                    debug!("Command {:?} failed: {}", command, e);
                    self.stream.write_all(&encode_fail(&e.to_string())).await?;
                }
                Err(e) => return Err(e),
            }

            self.stream.flush().await?;
        }
    }

    async fn dispatch(&mut self, command: HostCommand) -> Result<Flow> {
        match command {
            HostCommand::Version => {
                let version = format!("{:04x}", self.responder.version());
                self.write_okay_data(&version).await?;
            }
            HostCommand::TransportAny => {
                let device = self
                    .responder
                    .devices()
                    .into_iter()
                    .next()
                    .ok_or(ProtocolError::NoDevices)?;
                self.select(&device);
                self.stream.write_all(OKAY).await?;
            }
            HostCommand::Devices => {
                let listing: String = self
                    .responder
                    .devices()
                    .iter()
                    .map(|d| format!("{}\t{}\n", d.serial(), d.device_type()))
                    .collect();
                self.write_okay_data(&listing).await?;
            }
            HostCommand::Transport(serial) => {
                let device = find_device(self.responder.as_ref(), &serial)
                    .ok_or(ProtocolError::NotConnected(serial))?;
                self.select(&device);
                self.stream.write_all(OKAY).await?;
            }
            HostCommand::Sync => self.sync().await?,
            HostCommand::Shell(command) | HostCommand::Exec(command) => {
                self.shell(&command).await?;
                return Ok(Flow::Close);
            }
            HostCommand::GetState => {
                let device = match &self.selected {
                    Some(_) => self.selected_device()?,
                    None => self
                        .responder
                        .devices()
                        .into_iter()
                        .next()
                        .ok_or(ProtocolError::NoDevices)?,
                };
                self.write_okay_data(device.device_type()).await?;
            }
            // The subcommand is accepted but every query answers the type.
            HostCommand::HostSerial { serial, .. } => {
                let state = find_device(self.responder.as_ref(), &serial)
                    .map(|d| d.device_type().to_string())
                    .unwrap_or_else(|| device_type::UNKNOWN.to_string());
                self.write_okay_data(&state).await?;
            }
        }
        Ok(Flow::Continue)
    }

    fn select(&mut self, device: &Arc<dyn AdbDeviceResponder>) {
        debug!("Selected device {}", device.serial());
        self.selected = Some(Selection {
            serial: device.serial().to_string(),
            device: Arc::downgrade(device),
        });
    }

    /// The selected device, or `DeviceOffline` once its serial has left the
    /// registry
    fn selected_device(&self) -> std::result::Result<Arc<dyn AdbDeviceResponder>, ProtocolError> {
        let selection = self.selected.as_ref().ok_or(ProtocolError::NoDeviceSelected)?;
        selection
            .device
            .upgrade()
            .or_else(|| find_device(self.responder.as_ref(), &selection.serial))
            .ok_or(ProtocolError::DeviceOffline)
    }

    async fn write_okay_data(&mut self, payload: &str) -> Result<()> {
        let reply = encode_okay_data(payload)?;
        self.stream.write_all(&reply).await?;
        Ok(())
    }

    async fn shell(&mut self, command: &str) -> Result<()> {
        let device = self.selected_device()?;
        self.stream.write_all(OKAY).await?;
        self.stream.flush().await?;

        info!("Running shell command on {}: {}", device.serial(), command);
        let (mut stdin, mut stdout) = tokio::io::split(&mut self.stream);
        if let Err(e) = device.shell(command, &mut stdin, &mut stdout).await {
            warn!("Shell command {:?} on {} failed: {}", command, device.serial(), e);
        }
        stdout.flush().await?;
        Ok(())
    }

    async fn sync(&mut self) -> Result<()> {
        let device = self.selected_device()?;
        self.stream.write_all(OKAY).await?;
        self.stream.flush().await?;

        let mut transport = SyncTransport::new(&mut self.stream);
        match sync_transfer(&mut transport, device.as_ref()).await {
            Ok(()) => Ok(()),
            Err(AdbError::Sync(e)) => {
                debug!("Sync transfer on {} failed: {}", device.serial(), e);
                transport.send_fail(&e.to_string()).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Serve exactly one `SEND` or `RECV` request
async fn sync_transfer<S>(
    transport: &mut SyncTransport<'_, S>,
    device: &dyn AdbDeviceResponder,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (id, len) = transport.read_header().await?;
    match &id {
        sync::SEND => {
            let target = transport.read_path(len).await?;
            let contents = transport.read_chunks().await?;
            let (file, mode) = parse_send_target(&target)?;

            info!("Push {} ({} bytes, mode {:o}) to {}", file, contents.len(), mode, device.serial());
            device
                .file_pushed(&file, mode, contents)
                .await
                .map_err(SyncError::from)?;
            transport.send_status(sync::OKAY, 0).await?;
        }
        sync::RECV => {
            let file = RemoteFile::new(transport.read_path(len).await?);
            let contents = device.file_pulled(&file).await.map_err(SyncError::from)?;

            info!("Pull {} ({} bytes) from {}", file, contents.len(), device.serial());
            transport.send_stream(&contents).await?;
            transport.send_status(sync::DONE, 0).await?;
        }
        _ => {
            transport.skip(len).await?;
            return Err(SyncError::UnknownId(String::from_utf8_lossy(&id).into_owned()).into());
        }
    }
    Ok(())
}
