use crate::adb::session::Session;
use crate::device::memory::{MemoryDevice, MemoryRegistry};
use crate::device::responder::AdbResponder;
use crate::error::Result;
use crate::testing::client::AdbClient;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

pub const TEST_VERSION: u32 = 0x20;

/// Registry with `ABC123` and `emulator-5554`, in that order
pub fn test_registry() -> Arc<MemoryRegistry> {
    Arc::new(
        MemoryRegistry::new(TEST_VERSION)
            .with_device(Arc::new(MemoryDevice::new("ABC123")))
            .with_device(Arc::new(
                MemoryDevice::new("emulator-5554")
                    .with_type("recovery")
                    .with_shell_response("getprop ro.product.model", "sdk_gphone64\n"),
            )),
    )
}

/// Run a session over an in-memory pipe and return the client end
pub fn start_session(
    responder: Arc<dyn AdbResponder>,
) -> (AdbClient<DuplexStream>, JoinHandle<Result<()>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let session = tokio::spawn(Session::new(server, responder).run());
    (AdbClient::new(client), session)
}

/// Deterministic pseudo-random payload
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}
