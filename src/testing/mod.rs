pub mod client;
pub mod fixtures;
