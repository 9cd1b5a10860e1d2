use crate::adb::sync::{CHUNK_SIZE, DATA, DONE, RECV, SEND};
use crate::error::Result;
use log::*;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Status a server answered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Okay,
    Fail(String),
}

/// Minimal host protocol client used to drive the server in tests
pub struct AdbClient<S> {
    stream: S,
}

impl AdbClient<TcpStream> {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        debug!("Connecting to address: {}", addr);
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AdbClient<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Send a length-prefixed command
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        let request = format!("{:04x}{}", command.len(), command);
        self.write_all(request.as_bytes()).await
    }

    /// Send raw bytes
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read exact number of bytes
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf).await?;
        Ok(())
    }

    /// Read `OKAY`, or `FAIL` and its message
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let mut status = [0u8; 4];
        self.stream.read_exact(&mut status).await?;
        match &status {
            b"OKAY" => Ok(Reply::Okay),
            b"FAIL" => Ok(Reply::Fail(self.read_data().await?)),
            other => panic!("Expected OKAY or FAIL. Got {:?}", String::from_utf8_lossy(other)),
        }
    }

    /// Send a command and read its status
    pub async fn command(&mut self, command: &str) -> Result<Reply> {
        self.send_command(command).await?;
        self.read_reply().await
    }

    /// Send a command expecting `OKAY` and a data reply
    pub async fn query(&mut self, command: &str) -> Result<String> {
        let reply = self.command(command).await?;
        assert_eq!(reply, Reply::Okay, "{} failed", command);
        self.read_data().await
    }

    /// Read a 4-hex-digit length prefix and its payload
    pub async fn read_data(&mut self) -> Result<String> {
        let mut len_bytes = [0u8; 4];
        self.stream.read_exact(&mut len_bytes).await?;
        let len = usize::from_str_radix(std::str::from_utf8(&len_bytes).unwrap(), 16).unwrap();

        let mut data = vec![0u8; len];
        self.stream.read_exact(&mut data).await?;
        Ok(String::from_utf8(data).unwrap())
    }

    /// Read until the server closes the connection
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.stream.read_to_end(&mut output).await?;
        Ok(output)
    }

    /// Push `data` to `target` (`path` or `path,mode`) inside an
    /// already-accepted `sync:`
    pub async fn push(&mut self, target: &str, data: &[u8]) -> Result<Reply> {
        self.send_sync_request(SEND, target).await?;
        for chunk in data.chunks(CHUNK_SIZE) {
            self.stream.write_all(DATA).await?;
            self.stream.write_all(&(chunk.len() as u32).to_le_bytes()).await?;
            self.stream.write_all(chunk).await?;
        }
        self.stream.write_all(DONE).await?;
        self.stream.write_all(&0u32.to_le_bytes()).await?;
        self.stream.flush().await?;

        self.read_sync_status().await
    }

    /// Pull `path` inside an already-accepted `sync:`
    pub async fn pull(&mut self, path: &str) -> Result<std::result::Result<Vec<u8>, String>> {
        self.send_sync_request(RECV, path).await?;

        let mut contents = Vec::new();
        loop {
            let (id, data) = self.read_sync_packet().await?;
            match &id {
                b"DATA" => contents.extend_from_slice(&data),
                b"DONE" => return Ok(Ok(contents)),
                b"FAIL" => return Ok(Err(String::from_utf8(data).unwrap())),
                other => panic!("Unexpected sync id {:?}", String::from_utf8_lossy(other)),
            }
        }
    }

    /// Send a sync request header and path
    pub async fn send_sync_request(&mut self, id: &[u8; 4], path: &str) -> Result<()> {
        self.stream.write_all(id).await?;
        self.stream.write_all(&(path.len() as u32).to_le_bytes()).await?;
        self.stream.write_all(path.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read `OKAY` + trailer, or `FAIL` + message
    pub async fn read_sync_status(&mut self) -> Result<Reply> {
        let mut header = [0u8; 8];
        self.stream.read_exact(&mut header).await?;
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        match &header[0..4] {
            b"OKAY" => Ok(Reply::Okay),
            b"FAIL" => {
                let mut message = vec![0u8; len as usize];
                self.stream.read_exact(&mut message).await?;
                Ok(Reply::Fail(String::from_utf8(message).unwrap()))
            }
            other => panic!("Unexpected sync status {:?}", String::from_utf8_lossy(other)),
        }
    }

    // DONE carries a trailer, not a length
    async fn read_sync_packet(&mut self) -> Result<([u8; 4], Vec<u8>)> {
        let mut header = [0u8; 8];
        self.stream.read_exact(&mut header).await?;

        let id = [header[0], header[1], header[2], header[3]];
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let mut data = Vec::new();
        if &id != b"DONE" && len > 0 {
            data.resize(len, 0);
            self.stream.read_exact(&mut data).await?;
        }
        Ok((id, data))
    }
}
