use super::error::{AdbError, AdbResult};
use super::types::{AdbClient, Device, parse_screen_size, tap_fits};
use std::time::Duration;
use tokio::process::Command;

/// Drives the `adb` binary from Android Platform Tools, pointed at the same
/// server the rust backend would use (`-H host -P port -s serial`).
pub struct AdbShell {
    pub device: Device,
    host: String,
    port: u16,
    pub screen_x: u32,
    pub screen_y: u32,
    command_timeout: Duration,
}

impl AdbShell {
    pub fn parse_devices(output: &str) -> Vec<Device> {
        output
            .lines()
            .skip(1)
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 2 && parts[1] == "device" {
                    let name = parts[0].to_string();
                    let transport_id = parts
                        .iter()
                        .find_map(|part| part.strip_prefix("transport_id:"))
                        .map(str::to_string);
                    Some(Device { name, transport_id })
                } else {
                    None
                }
            })
            .collect()
    }

    fn base_command(host: &str, port: u16) -> Command {
        let mut cmd = Command::new("adb");
        cmd.arg("-H").arg(host).arg("-P").arg(port.to_string());
        cmd.kill_on_drop(true);
        cmd
    }

    async fn output(
        mut cmd: Command,
        description: &str,
        timeout: Duration,
    ) -> AdbResult<Vec<u8>> {
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| AdbError::AdbBinaryUnavailable { source })?,
            Err(_) => {
                return Err(AdbError::Timeout {
                    duration: timeout,
                    description: format!("adb {description}"),
                });
            }
        };
        if !output.status.success() {
            return Err(AdbError::AdbProcessFailed {
                command: description.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    pub async fn list_devices(host: &str, port: u16, timeout: Duration) -> AdbResult<Vec<Device>> {
        let mut cmd = Self::base_command(host, port);
        cmd.arg("devices").arg("-l");
        let stdout = Self::output(cmd, "devices -l", timeout).await?;
        Ok(Self::parse_devices(&String::from_utf8_lossy(&stdout)))
    }

    pub async fn connect(
        host: &str,
        port: u16,
        serial: &str,
        command_timeout: Duration,
    ) -> AdbResult<Self> {
        let devices = Self::list_devices(host, port, command_timeout).await?;
        let device = devices
            .iter()
            .find(|d| d.name == serial)
            .cloned()
            .ok_or_else(|| AdbError::DeviceNotFound {
                serial: serial.to_string(),
                available: devices.iter().map(|d| d.name.clone()).collect(),
            })?;

        let mut adb = AdbShell {
            device,
            host: host.to_string(),
            port,
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
        log::info!(
            "📱 Connected to {} via adb binary at {}:{} ({}x{})",
            serial,
            host,
            port,
            sx,
            sy
        );
        if let Some(transport) = &adb.device.transport_id {
            log::debug!("{} uses transport {}", serial, transport);
        }
        Ok(adb)
    }

    fn device_command(&self) -> Command {
        let mut cmd = Self::base_command(&self.host, self.port);
        cmd.arg("-s").arg(&self.device.name);
        cmd
    }
}

impl AdbClient for AdbShell {
    async fn shell(&self, args: &[&str]) -> AdbResult<String> {
        let mut cmd = self.device_command();
        cmd.arg("shell").args(args);
        let description = format!("shell {}", args.join(" "));
        let stdout = Self::output(cmd, &description, self.command_timeout).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        // exec-out keeps the PNG stream binary-clean
        let mut cmd = self.device_command();
        cmd.arg("exec-out").arg("screencap").arg("-p");
        Self::output(cmd, "exec-out screencap -p", self.command_timeout).await
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
        self.shell(&["input", "tap", &xs, &ys]).await?;
        Ok(())
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        (self.screen_x, self.screen_y)
    }

    fn device_name(&self) -> &str {
        &self.device.name
    }
}
