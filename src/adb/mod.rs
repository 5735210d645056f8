// ADB module - device bridge for the updater.
// Two interchangeable transports reach the device through an ADB server:
// the pure Rust adb_client protocol and the `adb` command line tool.

pub mod backend;
pub mod error;
pub mod rust_impl;
pub mod shell;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export the main types and functions for easy access
pub use backend::{AdbBackend, BackendKind};
pub use error::{AdbError, AdbResult};
pub use types::{AdbClient, Device, ImageCapture};
