//! Shared test fixtures: synthetic screens, a template library built from
//! them, and a fake device that walks through the game's first-run screens.

use crate::adb::types::tap_fits;
use crate::adb::{AdbClient, AdbError, AdbResult};
use crate::game_automation::match_image::{
    Detector, ScreenSpec, Template, TemplateLibrary, create_default_screens,
};
use crate::game_automation::types::ScreenState;
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::sync::Mutex;

pub const SCREEN_W: u32 = 64;
pub const SCREEN_H: u32 = 48;
pub const PATCH: u32 = 12;
/// Where every screen's distinctive patch is drawn
pub const PATCH_AT: (u32, u32) = (24, 16);
pub const BACKGROUND: u8 = 40;
pub const PKG: &str = "com.bandainamcoent.idolmaster_gakuen";

/// Deterministic textured patch; different seeds do not correlate.
pub fn noise_patch(seed: u32, width: u32, height: u32) -> GrayImage {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(12_345);
    GrayImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        Luma([(state >> 16) as u8])
    })
}

pub fn paste_on_canvas(
    width: u32,
    height: u32,
    background: u8,
    patches: &[(&GrayImage, u32, u32)],
) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(width, height, Luma([background]));
    for (patch, x, y) in patches {
        image::imageops::replace(&mut canvas, *patch, *x as i64, *y as i64);
    }
    canvas
}

/// The reference patch standing for `state`.
pub fn patch_for(state: ScreenState) -> GrayImage {
    noise_patch(100 + state as u32, PATCH, PATCH)
}

/// What the device shows for `state`; `None` is the launcher.
pub fn screen_showing(state: Option<ScreenState>) -> GrayImage {
    match state {
        Some(ScreenState::CreditsScreen) => {
            GrayImage::from_pixel(SCREEN_W, SCREEN_H, Luma([250]))
        }
        Some(ScreenState::Unknown) | None => paste_on_canvas(SCREEN_W, SCREEN_H, BACKGROUND, &[]),
        Some(state) => {
            let patch = patch_for(state);
            paste_on_canvas(
                SCREEN_W,
                SCREEN_H,
                BACKGROUND,
                &[(&patch, PATCH_AT.0, PATCH_AT.1)],
            )
        }
    }
}

/// A screen table with synthetic patches in place of asset files.
pub fn library_for(specs: Vec<ScreenSpec>) -> TemplateLibrary {
    let templates = specs
        .into_iter()
        .map(|spec| {
            let image = match spec.detector {
                Detector::Brightness => None,
                Detector::Template { .. } => Some(patch_for(spec.state)),
            };
            Template { spec, image }
        })
        .collect();
    TemplateLibrary::new(templates)
}

pub fn test_library() -> TemplateLibrary {
    library_for(create_default_screens(0.8))
}

pub fn png_bytes(image: &GrayImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

#[derive(Debug)]
pub struct FakeState {
    pub screen: Option<ScreenState>,
    pub installed: bool,
    pub running: bool,
    /// Screenshots the loading art stays up after launch
    pub loading_polls: u32,
    /// Screenshots until a store download completes; `None` never completes
    pub download_polls: Option<u32>,
    pub reject_uninstall: bool,
    /// `monkey` starts nothing
    pub launch_fails: bool,
    /// Taps on this screen are ignored
    pub frozen_on: Option<ScreenState>,
    /// Where the last first-run button leads
    pub after_move_forward: ScreenState,
    /// Taps the in-game data download needs before MoveForward shows
    pub data_download_taps: u32,
    /// What `wm size` would say; taps are bounds-checked against it
    pub reported_size: (u32, u32),
    pub commands: Vec<String>,
    pub taps: Vec<(u32, u32)>,
    pub screenshots: u32,
}

/// Emulates the store and the game's first-run screens in response to the
/// shell commands and taps the controller sends.
pub struct FakeDevice {
    pub state: Mutex<FakeState>,
}

impl FakeDevice {
    pub fn new(installed: bool) -> Self {
        Self {
            state: Mutex::new(FakeState {
                screen: None,
                installed,
                running: false,
                loading_polls: 1,
                download_polls: Some(3),
                reject_uninstall: false,
                launch_fails: false,
                frozen_on: None,
                after_move_forward: ScreenState::GameRunning,
                data_download_taps: 0,
                reported_size: (SCREEN_W, SCREEN_H),
                commands: Vec::new(),
                taps: Vec::new(),
                screenshots: 0,
            }),
        }
    }

    pub fn with(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn taps(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().taps.clone()
    }
}

impl AdbClient for FakeDevice {
    async fn shell(&self, args: &[&str]) -> AdbResult<String> {
        let command = args.join(" ");
        let mut s = self.state.lock().unwrap();
        s.commands.push(command.clone());
        let reply = if command.starts_with("pm list packages") {
            if s.screen == Some(ScreenState::Downloading) {
                tick_download(&mut s);
            }
            if s.installed {
                format!("package:{PKG}\n")
            } else {
                String::new()
            }
        } else if command.starts_with("pm uninstall") {
            if s.installed && !s.reject_uninstall {
                s.installed = false;
                s.running = false;
                "Success\n".to_string()
            } else {
                "Failure [DELETE_FAILED_INTERNAL_ERROR]\n".to_string()
            }
        } else if command.contains("market://details") {
            s.screen = Some(ScreenState::PlayStoreInstallPrompt);
            String::new()
        } else if command.starts_with("monkey") {
            if s.installed && !s.launch_fails {
                s.running = true;
                s.screen = Some(ScreenState::Loading);
            }
            String::new()
        } else if command.starts_with("am force-stop") {
            s.running = false;
            s.screen = None;
            String::new()
        } else if command.starts_with("pidof") {
            if s.running { "4242\n".to_string() } else { String::new() }
        } else if command == "input keyevent 3" {
            s.screen = None;
            String::new()
        } else {
            String::new()
        };
        Ok(reply)
    }

    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        let mut guard = self.state.lock().unwrap();
        let s = &mut *guard;
        s.screenshots += 1;
        let shown = s.screen;
        match shown {
            Some(ScreenState::Downloading) => tick_download(s),
            Some(ScreenState::Loading) => {
                if s.loading_polls == 0 {
                    s.screen = Some(ScreenState::Setup);
                } else {
                    s.loading_polls -= 1;
                }
            }
            _ => {}
        }
        Ok(png_bytes(&screen_showing(shown)))
    }

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
        let mut guard = self.state.lock().unwrap();
        let s = &mut *guard;
        let (width, height) = s.reported_size;
        if !tap_fits(x, y, width, height) {
            return Err(AdbError::TapOutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        s.taps.push((x, y));
        if s.screen.is_some() && s.screen == s.frozen_on {
            return Ok(());
        }
        s.screen = match s.screen {
            Some(ScreenState::PlayStoreInstallPrompt) => Some(ScreenState::Downloading),
            Some(ScreenState::Setup) => Some(ScreenState::Consent),
            Some(ScreenState::Consent) => Some(ScreenState::Agree),
            Some(ScreenState::Agree) => Some(ScreenState::AgreeAll),
            Some(ScreenState::AgreeAll) if s.data_download_taps > 0 => Some(ScreenState::Unknown),
            Some(ScreenState::AgreeAll) => Some(ScreenState::MoveForward),
            Some(ScreenState::Unknown) => {
                s.data_download_taps = s.data_download_taps.saturating_sub(1);
                if s.data_download_taps == 0 {
                    Some(ScreenState::MoveForward)
                } else {
                    Some(ScreenState::Unknown)
                }
            }
            Some(ScreenState::MoveForward) => Some(s.after_move_forward),
            other => other,
        };
        Ok(())
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        self.state.lock().unwrap().reported_size
    }

    fn device_name(&self) -> &str {
        "fake-5554"
    }
}

/// One step of a store download; the package appears when it runs out.
fn tick_download(s: &mut FakeState) {
    if let Some(left) = s.download_polls.as_mut() {
        if *left == 0 {
            s.installed = true;
            s.screen = None;
        } else {
            *left -= 1;
        }
    }
}
