// Core ADB types and traits
use super::error::{AdbError, AdbResult};
use crate::template_matching::Screenshot;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ImageCapture {
    pub bytes: Vec<u8>,
    pub duration_ms: u128,
}

#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct Device {
    pub name: String,
    pub transport_id: Option<String>,
}

/// Trait defining the device operations the automation needs (shell or rust
/// implementations). Package and input helpers are provided on top of `shell`.
#[allow(async_fn_in_trait)]
pub trait AdbClient {
    /// Run a shell command on the device and return its stdout.
    async fn shell(&self, args: &[&str]) -> AdbResult<String>;

    // Raw backend-specific capture (PNG bytes)
    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>>;

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()>;

    fn screen_dimensions(&self) -> (u32, u32);
    fn device_name(&self) -> &str;

    async fn screen_capture(&self) -> AdbResult<ImageCapture> {
        let start = std::time::Instant::now();
        let bytes = self.screen_capture_bytes().await?;
        Ok(ImageCapture {
            bytes,
            duration_ms: start.elapsed().as_millis(),
        })
    }

    /// Capture and decode a screenshot into the grayscale buffer the matcher uses.
    async fn screenshot(&self) -> AdbResult<Screenshot> {
        let cap = self.screen_capture().await?;
        log::debug!(
            "📸 Captured screenshot ({} bytes, {}ms)",
            cap.bytes.len(),
            cap.duration_ms
        );
        Screenshot::from_png_bytes(&cap.bytes).map_err(|source| AdbError::ScreenshotDecodeFailed {
            bytes: cap.bytes.len(),
            source,
        })
    }

    async fn is_installed(&self, package: &str) -> AdbResult<bool> {
        let out = self.shell(&["pm", "list", "packages", package]).await?;
        Ok(parse_package_list(&out).any(|p| p == package))
    }

    async fn uninstall(&self, package: &str) -> AdbResult<()> {
        let out = self.shell(&["pm", "uninstall", package]).await?;
        if out.contains("Success") {
            Ok(())
        } else {
            Err(AdbError::PackageCommandRejected {
                command: format!("pm uninstall {package}"),
                output: out.trim().to_string(),
            })
        }
    }

    /// Open the store listing so the install button can be pressed.
    async fn install_from_store(&self, package: &str) -> AdbResult<()> {
        let uri = format!("'market://details?id={package}'");
        self.shell(&["am", "start", "-a", "android.intent.action.VIEW", "-d", &uri])
            .await?;
        Ok(())
    }

    /// `--pct-syskeys 0` is needed on devices without hardware keys (emulators,
    /// containers).
    async fn launch_app(&self, package: &str) -> AdbResult<()> {
        self.shell(&["monkey", "--pct-syskeys", "0", "-p", package, "1"])
            .await?;
        Ok(())
    }

    async fn force_stop(&self, package: &str) -> AdbResult<()> {
        self.shell(&["am", "force-stop", package]).await?;
        Ok(())
    }

    async fn is_process_running(&self, package: &str) -> AdbResult<bool> {
        let out = self.shell(&["pidof", package]).await?;
        Ok(out.split_whitespace().any(|pid| pid.parse::<u32>().is_ok()))
    }

    async fn press_home(&self) -> AdbResult<()> {
        self.shell(&["input", "keyevent", "3"]).await?;
        Ok(())
    }

    /// Disable auto-rotate and pin the user rotation (0-3).
    async fn lock_rotation(&self, rotation: u8) -> AdbResult<()> {
        self.shell(&["settings", "put", "system", "accelerometer_rotation", "0"])
            .await?;
        let rotation = rotation.to_string();
        self.shell(&["settings", "put", "system", "user_rotation", &rotation])
            .await?;
        Ok(())
    }
}

/// Package names from `pm list packages` output (`package:<name>` lines).
pub fn parse_package_list(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
}

/// Whether a tap lands on a `width` x `height` display in either orientation.
/// `wm size` reports the natural orientation, not the pinned rotation.
pub fn tap_fits(x: u32, y: u32, width: u32, height: u32) -> bool {
    (x < width && y < height) || (x < height && y < width)
}

/// Parse `wm size` output. An override size wins over the physical one since
/// it is what screencap returns.
pub fn parse_screen_size(stdout: &str) -> Option<(u32, u32)> {
    let mut physical = None;
    let mut over = None;
    for line in stdout.lines() {
        let line = line.trim();
        let (slot, size_str) = if let Some(rest) = line.strip_prefix("Physical size: ") {
            (&mut physical, rest)
        } else if let Some(rest) = line.strip_prefix("Override size: ") {
            (&mut over, rest)
        } else {
            continue;
        };
        if let Some((w, h)) = size_str.trim().split_once('x')
            && let (Ok(x), Ok(y)) = (w.parse::<u32>(), h.parse::<u32>())
        {
            *slot = Some((x, y));
        }
    }
    over.or(physical)
}
