pub mod memory;
pub mod responder;

pub use memory::{MemoryDevice, MemoryRegistry};
pub use responder::{find_device, AdbDeviceResponder, AdbResponder};
