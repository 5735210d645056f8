use super::error::AdbResult;
use super::rust_impl::{RustAdb, resolve_server_address};
use super::shell::AdbShell;
use super::types::AdbClient;
use serde::Deserialize;
use std::time::Duration;

/// Which transport implementation talks to the ADB server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Rust,
    Shell,
}

pub enum AdbBackend {
    Shell(AdbShell),
    Rust(RustAdb),
}

impl AdbBackend {
    /// Open `serial` on the ADB server at `host:port`. The returned backend
    /// holds the device for the run and releases it on drop.
    pub async fn connect(
        kind: BackendKind,
        host: &str,
        port: u16,
        serial: &str,
        command_timeout: Duration,
    ) -> AdbResult<Self> {
        log::info!("Connecting to ADB server at {}:{} ({:?} backend)", host, port, kind);
        match kind {
            BackendKind::Rust => {
                let address = resolve_server_address(host, port)?;
                Ok(AdbBackend::Rust(
                    RustAdb::connect(address, serial, command_timeout).await?,
                ))
            }
            BackendKind::Shell => Ok(AdbBackend::Shell(
                AdbShell::connect(host, port, serial, command_timeout).await?,
            )),
        }
    }
}

impl AdbClient for AdbBackend {
    async fn shell(&self, args: &[&str]) -> AdbResult<String> {
        match self {
            AdbBackend::Shell(s) => s.shell(args).await,
            AdbBackend::Rust(r) => r.shell(args).await,
        }
    }

    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        match self {
            AdbBackend::Shell(s) => s.screen_capture_bytes().await,
            AdbBackend::Rust(r) => r.screen_capture_bytes().await,
        }
    }

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
        match self {
            AdbBackend::Shell(s) => s.tap(x, y).await,
            AdbBackend::Rust(r) => r.tap(x, y).await,
        }
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        match self {
            AdbBackend::Shell(s) => s.screen_dimensions(),
            AdbBackend::Rust(r) => r.screen_dimensions(),
        }
    }

    fn device_name(&self) -> &str {
        match self {
            AdbBackend::Shell(s) => s.device_name(),
            AdbBackend::Rust(r) => r.device_name(),
        }
    }
}
