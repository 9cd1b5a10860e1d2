use crate::config::ServerConfig;
use crate::core::types::{device_type, RemoteFile};
use crate::device::responder::{AdbDeviceResponder, AdbResponder};
use crate::error::DeviceError;
use async_trait::async_trait;
use bytes::Bytes;
use log::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredFile {
    mode: u32,
    contents: Bytes,
}

/// Device whose filesystem is a map in memory and whose shell only knows a
/// handful of commands plus canned responses.
pub struct MemoryDevice {
    serial: String,
    device_type: String,
    shell_responses: HashMap<String, String>,
    files: Mutex<HashMap<String, StoredFile>>,
}

impl MemoryDevice {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            device_type: device_type::DEVICE.to_string(),
            shell_responses: HashMap::new(),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }

    pub fn with_shell_response(mut self, command: impl Into<String>, output: impl Into<String>) -> Self {
        self.shell_responses.insert(command.into(), output.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        self.files.get_mut().insert(
            path.into(),
            StoredFile {
                mode: crate::core::types::DEFAULT_FILE_MODE,
                contents: contents.into(),
            },
        );
        self
    }

    /// Mode a file was stored with
    pub async fn file_mode(&self, path: &str) -> Option<u32> {
        self.files.lock().await.get(path).map(|f| f.mode)
    }

    /// Stored contents of a file
    pub async fn file_contents(&self, path: &str) -> Option<Bytes> {
        self.files.lock().await.get(path).map(|f| f.contents.clone())
    }

    async fn run_shell(&self, command: &str) -> Vec<u8> {
        let command = command.trim();

        if let Some(output) = self.shell_responses.get(command) {
            return output.clone().into_bytes();
        }

        let (program, args) = match command.split_once(' ') {
            Some((program, args)) => (program, args.trim()),
            None => (command, ""),
        };

        match program {
            "echo" => format!("{}\n", args).into_bytes(),
            "cat" if !args.is_empty() => match self.files.lock().await.get(args) {
                Some(file) => file.contents.to_vec(),
                None => format!("cat: {}: No such file or directory\n", args).into_bytes(),
            },
            _ => format!("/system/bin/sh: {}: not found\n", program).into_bytes(),
        }
    }
}

#[async_trait]
impl AdbDeviceResponder for MemoryDevice {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn device_type(&self) -> &str {
        &self.device_type
    }

    async fn shell(
        &self,
        command: &str,
        _stdin: &mut (dyn AsyncRead + Unpin + Send),
        stdout: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<(), DeviceError> {
        debug!("[{}] shell: {}", self.serial, command);
        let output = self.run_shell(command).await;
        stdout.write_all(&output).await?;
        stdout.flush().await?;
        Ok(())
    }

    async fn file_pushed(
        &self,
        file: &RemoteFile,
        mode: u32,
        contents: Bytes,
    ) -> Result<(), DeviceError> {
        let path = file.path();
        if path.is_empty() || path.ends_with('/') {
            return Err(DeviceError::Rejected(format!("{}: Is a directory", path)));
        }

        debug!("[{}] stored {} ({} bytes, mode {:o})", self.serial, path, contents.len(), mode);
        self.files
            .lock()
            .await
            .insert(path.to_string(), StoredFile { mode, contents });
        Ok(())
    }

    async fn file_pulled(&self, file: &RemoteFile) -> Result<Bytes, DeviceError> {
        self.files
            .lock()
            .await
            .get(file.path())
            .map(|f| f.contents.clone())
            .ok_or_else(|| DeviceError::NotFound(file.path().to_string()))
    }
}

/// Registry holding a mutable list of devices
pub struct MemoryRegistry {
    version: u32,
    devices: RwLock<Vec<Arc<dyn AdbDeviceResponder>>>,
    commands_seen: AtomicU64,
}

impl MemoryRegistry {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            devices: RwLock::new(Vec::new()),
            commands_seen: AtomicU64::new(0),
        }
    }

    /// Build a registry of [`MemoryDevice`]s from the `[[devices]]` tables
    pub fn from_config(config: &ServerConfig) -> Self {
        let registry = Self::new(config.version);
        for device in &config.devices {
            let mut memory = MemoryDevice::new(&device.serial).with_type(&device.device_type);
            for (command, output) in &device.shell {
                memory = memory.with_shell_response(command, output);
            }
            registry.add_device(Arc::new(memory));
        }
        registry
    }

    pub fn with_device(self, device: Arc<dyn AdbDeviceResponder>) -> Self {
        self.add_device(device);
        self
    }

    /// Add a device, replacing any device with the same serial in place
    pub fn add_device(&self, device: Arc<dyn AdbDeviceResponder>) {
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        match devices.iter().position(|d| d.serial() == device.serial()) {
            Some(idx) => devices[idx] = device,
            None => devices.push(device),
        }
    }

    /// Remove a device. Returns false if no device had that serial.
    pub fn remove_device(&self, serial: &str) -> bool {
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        let before = devices.len();
        devices.retain(|d| d.serial() != serial);
        devices.len() != before
    }

    /// Number of host commands observed across all sessions
    pub fn commands_seen(&self) -> u64 {
        self.commands_seen.load(Ordering::Relaxed)
    }
}

impl AdbResponder for MemoryRegistry {
    fn on_command(&self, command: &str) {
        trace!("observed command: {}", command);
        self.commands_seen.fetch_add(1, Ordering::Relaxed);
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn devices(&self) -> Vec<Arc<dyn AdbDeviceResponder>> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
