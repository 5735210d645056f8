// Types and enums for the updater run
use serde::Deserialize;
use std::fmt;

/// Which known screen the device is showing, as far as pixels can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenState {
    Setup,
    Loading,
    PlayStoreInstallPrompt,
    Downloading,
    Consent,
    Agree,
    AgreeAll,
    MoveForward,
    CreditsScreen,
    GameRunning,
    Unknown,
}

impl ScreenState {
    /// Every recognisable state, `Unknown` excluded.
    pub const KNOWN: [ScreenState; 10] = [
        ScreenState::Setup,
        ScreenState::Loading,
        ScreenState::PlayStoreInstallPrompt,
        ScreenState::Downloading,
        ScreenState::Consent,
        ScreenState::Agree,
        ScreenState::AgreeAll,
        ScreenState::MoveForward,
        ScreenState::CreditsScreen,
        ScreenState::GameRunning,
    ];
}

impl fmt::Display for ScreenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One step of the fixed run pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RunStage {
    Prepare,
    Uninstall,
    Install,
    WaitForDownload,
    Launch,
    NavigateConsent,
    NavigateAgree,
    NavigateAgreeAll,
    NavigateMoveForward,
    WaitGameRunning,
}

impl RunStage {
    pub const ALL: [RunStage; 10] = [
        RunStage::Prepare,
        RunStage::Uninstall,
        RunStage::Install,
        RunStage::WaitForDownload,
        RunStage::Launch,
        RunStage::NavigateConsent,
        RunStage::NavigateAgree,
        RunStage::NavigateAgreeAll,
        RunStage::NavigateMoveForward,
        RunStage::WaitGameRunning,
    ];

    /// Screen states this stage polls for. Their templates must load when
    /// the stage is enabled.
    pub fn required_states(self) -> &'static [ScreenState] {
        match self {
            RunStage::Prepare | RunStage::Uninstall => &[],
            RunStage::Install => &[ScreenState::PlayStoreInstallPrompt],
            RunStage::WaitForDownload => &[ScreenState::Downloading],
            RunStage::Launch => &[ScreenState::Loading, ScreenState::Setup],
            RunStage::NavigateConsent => &[ScreenState::Consent],
            RunStage::NavigateAgree => &[ScreenState::Agree],
            RunStage::NavigateAgreeAll => &[ScreenState::AgreeAll],
            RunStage::NavigateMoveForward => &[ScreenState::MoveForward],
            RunStage::WaitGameRunning => &[ScreenState::GameRunning, ScreenState::CreditsScreen],
        }
    }

    /// The screen a navigation stage waits for before tapping.
    pub fn navigation_target(self) -> Option<ScreenState> {
        match self {
            RunStage::NavigateConsent => Some(ScreenState::Consent),
            RunStage::NavigateAgree => Some(ScreenState::Agree),
            RunStage::NavigateAgreeAll => Some(ScreenState::AgreeAll),
            RunStage::NavigateMoveForward => Some(ScreenState::MoveForward),
            _ => None,
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where to press once a screen has been recognised.
/// In YAML: `{kind: template_center}` or `{kind: fixed, x: 1280, y: 1400}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TapTarget {
    /// Centre of the matched template rectangle
    TemplateCenter,
    /// Centre of the screenshot, in its current rotation
    ScreenCenter,
    /// A calibrated absolute point
    Fixed { x: u32, y: u32 },
    /// Recognise only, never tap
    None,
}
