pub mod types;

pub use types::{device_type, RemoteFile, DEFAULT_FILE_MODE};
