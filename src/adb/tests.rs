// Tests for the bridge layer: output parsing and the package/input helpers
// that every backend inherits from `AdbClient`.

use super::error::{AdbError, AdbResult};
use super::shell::AdbShell;
use super::types::{AdbClient, parse_package_list, parse_screen_size, tap_fits};
use std::sync::Mutex;

/// Records every shell command and answers from a fixed table.
struct ScriptedShell {
    commands: Mutex<Vec<String>>,
    replies: Vec<(&'static str, &'static str)>,
}

impl ScriptedShell {
    fn new(replies: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            replies,
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl AdbClient for ScriptedShell {
    async fn shell(&self, args: &[&str]) -> AdbResult<String> {
        let command = args.join(" ");
        self.commands.lock().unwrap().push(command.clone());
        Ok(self
            .replies
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix))
            .map(|(_, reply)| reply.to_string())
            .unwrap_or_default())
    }

    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        Ok(b"not a png".to_vec())
    }

    async fn tap(&self, _x: u32, _y: u32) -> AdbResult<()> {
        Ok(())
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        (2560, 1600)
    }

    fn device_name(&self) -> &str {
        "scripted"
    }
}

const PKG: &str = "com.bandainamcoent.idolmaster_gakuen";

// ============================================================
// OUTPUT PARSING
// ============================================================

#[test]
fn test_parse_devices_long_listing() {
    let out = "List of devices attached\n\
               emulator-5554          device product:sdk model:sdk device:generic transport_id:1\n\
               R58M123                unauthorized usb:1-1 transport_id:2\n\
               192.168.1.20:5555      device product:x model:y transport_id:3\n";
    let devices = AdbShell::parse_devices(out);
    assert_eq!(devices.len(), 2, "unauthorized devices are not usable");
    assert_eq!(devices[0].name, "emulator-5554");
    assert_eq!(devices[0].transport_id.as_deref(), Some("1"));
    assert_eq!(devices[1].name, "192.168.1.20:5555");
}

#[test]
fn test_parse_screen_size_physical() {
    assert_eq!(parse_screen_size("Physical size: 2560x1600\n"), Some((2560, 1600)));
}

#[test]
fn test_parse_screen_size_prefers_override() {
    let out = "Physical size: 1440x3040\nOverride size: 1080x2280\n";
    assert_eq!(parse_screen_size(out), Some((1080, 2280)));
}

#[test]
fn test_parse_screen_size_garbage() {
    assert_eq!(parse_screen_size("wm: not found"), None);
}

#[test]
fn test_tap_fits_either_orientation() {
    // wm size reports 1600x2560 natural; the screen is pinned to landscape
    assert!(tap_fits(1280, 800, 1600, 2560));
    assert!(tap_fits(2000, 1500, 1600, 2560));
    assert!(tap_fits(1500, 2000, 1600, 2560));
    assert!(!tap_fits(2000, 2000, 1600, 2560));
    assert!(!tap_fits(2560, 0, 1600, 2560));
}

#[test]
fn test_parse_package_list_exact_names() {
    let out = "package:com.example.a\r\npackage:com.example.ab\n";
    let names: Vec<&str> = parse_package_list(out).collect();
    assert_eq!(names, vec!["com.example.a", "com.example.ab"]);
}

// ============================================================
// PROVIDED HELPERS
// ============================================================

#[tokio::test]
async fn test_is_installed_requires_exact_match() {
    let shell = ScriptedShell::new(vec![(
        "pm list packages",
        "package:com.bandainamcoent.idolmaster_gakuen.beta\n",
    )]);
    assert!(!shell.is_installed(PKG).await.unwrap());

    let shell = ScriptedShell::new(vec![(
        "pm list packages",
        "package:com.bandainamcoent.idolmaster_gakuen\n",
    )]);
    assert!(shell.is_installed(PKG).await.unwrap());
}

#[tokio::test]
async fn test_uninstall_reports_rejection() {
    let shell = ScriptedShell::new(vec![("pm uninstall", "Failure [DELETE_FAILED_INTERNAL_ERROR]")]);
    let err = shell.uninstall(PKG).await.unwrap_err();
    assert!(matches!(err, AdbError::PackageCommandRejected { .. }));

    let shell = ScriptedShell::new(vec![("pm uninstall", "Success\n")]);
    assert!(shell.uninstall(PKG).await.is_ok());
}

#[tokio::test]
async fn test_process_running_parses_pidof() {
    let shell = ScriptedShell::new(vec![("pidof", "12345\n")]);
    assert!(shell.is_process_running(PKG).await.unwrap());

    let shell = ScriptedShell::new(vec![("pidof", "")]);
    assert!(!shell.is_process_running(PKG).await.unwrap());
}

#[tokio::test]
async fn test_store_and_launch_commands() {
    let shell = ScriptedShell::new(vec![]);
    shell.install_from_store(PKG).await.unwrap();
    shell.launch_app(PKG).await.unwrap();
    shell.lock_rotation(3).await.unwrap();

    let commands = shell.commands();
    assert_eq!(
        commands[0],
        format!("am start -a android.intent.action.VIEW -d 'market://details?id={PKG}'")
    );
    assert_eq!(commands[1], format!("monkey --pct-syskeys 0 -p {PKG} 1"));
    assert_eq!(commands[2], "settings put system accelerometer_rotation 0");
    assert_eq!(commands[3], "settings put system user_rotation 3");
}

#[tokio::test]
async fn test_screenshot_decode_failure_is_bridge_error() {
    let shell = ScriptedShell::new(vec![]);
    let err = shell.screenshot().await.unwrap_err();
    assert!(matches!(err, AdbError::ScreenshotDecodeFailed { bytes: 9, .. }));
}
