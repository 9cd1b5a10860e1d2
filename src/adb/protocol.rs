use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const OKAY: &[u8; 4] = b"OKAY";
pub const FAIL: &[u8; 4] = b"FAIL";

/// Largest payload a 4-hex-digit length prefix can describe
pub const MAX_PAYLOAD_LEN: usize = 0xffff;

/// Host command received from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// `host:version`
    Version,
    /// `host:transport-any`
    TransportAny,
    /// `host:devices`
    Devices,
    /// `host:transport:<serial>`
    Transport(String),
    /// `sync:`
    Sync,
    /// `shell:<command>`
    Shell(String),
    /// `exec:<command>`, raw variant of `shell:`
    Exec(String),
    /// `host:get-state`
    GetState,
    /// `host-serial:<serial>:<subcommand>`
    HostSerial { serial: String, subcommand: String },
}

impl HostCommand {
    pub fn parse(command: &str) -> Result<Self, ProtocolError> {
        match command {
            "host:version" => return Ok(Self::Version),
            "host:transport-any" => return Ok(Self::TransportAny),
            "host:devices" => return Ok(Self::Devices),
            "sync:" => return Ok(Self::Sync),
            "host:get-state" => return Ok(Self::GetState),
            _ => {}
        }

        if let Some(serial) = command.strip_prefix("host:transport:") {
            Ok(Self::Transport(serial.to_string()))
        } else if let Some(shell) = command.strip_prefix("shell:") {
            Ok(Self::Shell(shell.to_string()))
        } else if let Some(exec) = command.strip_prefix("exec:") {
            Ok(Self::Exec(exec.to_string()))
        } else if command.starts_with("host-serial:") {
            Self::parse_host_serial(command)
        } else {
            Err(ProtocolError::UnknownCommand(command.to_string()))
        }
    }

    // Trailing empty fields are dropped before counting, so
    // `host-serial:abc:` has two parts.
    fn parse_host_serial(command: &str) -> Result<Self, ProtocolError> {
        let mut parts: Vec<&str> = command.split(':').collect();
        while parts.last() == Some(&"") {
            parts.pop();
        }

        match parts.as_slice() {
            [_, serial, subcommand] => Ok(Self::HostSerial {
                serial: serial.to_string(),
                subcommand: subcommand.to_string(),
            }),
            _ => Err(ProtocolError::InvalidCommand(command.to_string())),
        }
    }
}

/// Parse a 4-digit ASCII hex length prefix
pub fn parse_hex_length(prefix: &[u8; 4]) -> io::Result<usize> {
    if !prefix.iter().all(u8::is_ascii_hexdigit) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid length prefix: {:?}", String::from_utf8_lossy(prefix)),
        ));
    }

    let text = std::str::from_utf8(prefix)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    usize::from_str_radix(text, 16).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Read one length-prefixed host command
pub async fn read_command<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<String> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await?;
    let len = parse_hex_length(&prefix)?;

    let mut command = vec![0u8; len];
    reader.read_exact(&mut command).await?;
    Ok(String::from_utf8_lossy(&command).into_owned())
}

/// `OKAY` followed by a length-prefixed payload
pub fn encode_okay_data(payload: &str) -> Result<BytesMut, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::ReplyTooLarge(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(8 + payload.len());
    buf.put_slice(OKAY);
    put_data(&mut buf, payload);
    Ok(buf)
}

/// `FAIL` followed by the length-prefixed message, truncated to fit the
/// length prefix
pub fn encode_fail(message: &str) -> BytesMut {
    let message = truncate_utf8(message, MAX_PAYLOAD_LEN);

    let mut buf = BytesMut::with_capacity(8 + message.len());
    buf.put_slice(FAIL);
    put_data(&mut buf, message);
    buf
}

fn put_data(buf: &mut BytesMut, payload: &str) {
    buf.put_slice(format!("{:04x}", payload.len()).as_bytes());
    buf.put_slice(payload.as_bytes());
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
