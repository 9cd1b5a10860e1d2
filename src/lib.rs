pub mod adb;
pub mod cli;
pub mod config;
pub mod core;
pub mod device;
pub mod error;

#[cfg(test)]
pub mod testing;
