use std::fmt;

/// Mode applied to pushed files when the client does not send one.
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Device-side path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteFile(String);

impl RemoteFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RemoteFile {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteFile {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Device class labels reported in `host:devices` and `host:get-state`
pub mod device_type {
    pub const DEVICE: &str = "device";
    pub const UNKNOWN: &str = "unknown";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_file_display() {
        let file = RemoteFile::from("/sdcard/x");
        assert_eq!(file.to_string(), "/sdcard/x");
        assert_eq!(file.path(), "/sdcard/x");
    }
}
