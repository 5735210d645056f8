// https://crates.io/crates/adb_client
use super::error::{AdbError, AdbResult};
use super::types::{AdbClient, Device, parse_screen_size, tap_fits};
use adb_client::{ADBDeviceExt, ADBServer, ADBServerDevice};
use std::net::{Ipv4Addr, SocketAddrV4, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Talks to a device through an ADB server (`adb start-server`) over TCP.
pub struct RustAdb {
    device: Device,
    server_device: Arc<Mutex<ADBServerDevice>>,
    screen_x: u32,
    screen_y: u32,
    command_timeout: Duration,
}

/// Resolve `host:port` to the IPv4 socket address the ADB server protocol needs.
pub fn resolve_server_address(host: &str, port: u16) -> AdbResult<SocketAddrV4> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(SocketAddrV4::new(ip, port));
    }
    let unresolved = || AdbError::ServerAddress {
        host: host.to_string(),
        port,
    };
    (host, port)
        .to_socket_addrs()
        .map_err(|_| unresolved())?
        .find_map(|addr| match addr {
            std::net::SocketAddr::V4(v4) => Some(v4),
            std::net::SocketAddr::V6(_) => None,
        })
        .ok_or_else(unresolved)
}

impl RustAdb {
    pub async fn list_devices(address: SocketAddrV4) -> AdbResult<Vec<Device>> {
        let mut server = ADBServer::new(address);
        let device_list = tokio::task::spawn_blocking(move || server.devices())
            .await?
            .map_err(|source| AdbError::ServerUnreachable {
                address: address.to_string(),
                source,
            })?;
        Ok(device_list
            .into_iter()
            .map(|d| Device {
                name: d.identifier,
                transport_id: None,
            })
            .collect())
    }

    /// Connect to `serial` through the server at `address`. The serial must be
    /// listed by the server; nothing is auto-selected.
    pub async fn connect(
        address: SocketAddrV4,
        serial: &str,
        command_timeout: Duration,
    ) -> AdbResult<Self> {
        let devices = Self::list_devices(address).await?;
        if !devices.iter().any(|d| d.name == serial) {
            return Err(AdbError::DeviceNotFound {
                serial: serial.to_string(),
                available: devices.into_iter().map(|d| d.name).collect(),
            });
        }

        let mut server = ADBServer::new(address);
        let name = serial.to_string();
        let server_device = tokio::task::spawn_blocking(move || server.get_device_by_name(&name))
            .await?
            .map_err(|source| AdbError::ConnectionFailed {
                serial: serial.to_string(),
                source,
            })?;

        let mut adb = RustAdb {
            device: Device {
                name: serial.to_string(),
                transport_id: None,
            },
            server_device: Arc::new(Mutex::new(server_device)),
            screen_x: 0,
            screen_y: 0,
            command_timeout,
        };
        let size_output = adb.shell(&["wm", "size"]).await?;
        let (sx, sy) = parse_screen_size(&size_output).ok_or(AdbError::ScreenSizeParseFailed {
            output: size_output.clone(),
        })?;
        adb.screen_x = sx;
        adb.screen_y = sy;
        log::info!("📱 Connected to {} via ADB server {} ({}x{})", serial, address, sx, sy);
        Ok(adb)
    }

    /// Run a blocking `shell_command` on the device with the command timeout applied.
    async fn run_shell_bytes(&self, args: &[&str]) -> AdbResult<Vec<u8>> {
        let server_device = Arc::clone(&self.server_device);
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let command = owned.join(" ");

        // Wrap the blocking shell_command in spawn_blocking so timeout can work
        let task = tokio::task::spawn_blocking({
            let command = command.clone();
            move || -> AdbResult<Vec<u8>> {
                let mut out: Vec<u8> = Vec::new();
                let refs: Vec<&str> = owned.iter().map(|s| s.as_str()).collect();
                let mut dev = server_device.blocking_lock();
                dev.shell_command(&refs, &mut out)
                    .map_err(|source| AdbError::ShellCommandFailed { command, source })?;
                Ok(out)
            }
        });

        match tokio::time::timeout(self.command_timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(AdbError::Timeout {
                duration: self.command_timeout,
                description: format!("shell '{command}' (device may be disconnected)"),
            }),
        }
    }
}

impl AdbClient for RustAdb {
    async fn shell(&self, args: &[&str]) -> AdbResult<String> {
        let out = self.run_shell_bytes(args).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        self.run_shell_bytes(&["screencap", "-p"]).await
    }

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
        if !tap_fits(x, y, self.screen_x, self.screen_y) {
            return Err(AdbError::TapOutOfBounds {
                x,
                y,
                width: self.screen_x,
                height: self.screen_y,
            });
        }
        let xs = x.to_string();
        let ys = y.to_string();
        self.run_shell_bytes(&["input", "tap", &xs, &ys]).await?;
        Ok(())
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        (self.screen_x, self.screen_y)
    }

    fn device_name(&self) -> &str {
        &self.device.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_literal_ipv4() {
        let addr = resolve_server_address("127.0.0.1", 5037).unwrap();
        assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5037));
    }

    #[test]
    fn resolves_localhost_name() {
        let addr = resolve_server_address("localhost", 5037).unwrap();
        assert_eq!(addr.port(), 5037);
        assert!(addr.ip().is_loopback());
    }
}
