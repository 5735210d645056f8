// Top-level run error and its process exit code
use crate::adb::AdbError;
use crate::config::ConfigError;
use crate::game_automation::match_image::AssetError;
use crate::game_automation::types::{RunStage, ScreenState};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("ADB error: {0}")]
    Bridge(#[from] AdbError),

    #[error("{stage} timed out after {:.1}s, last screen {last_state}", elapsed.as_secs_f32())]
    StageTimeout {
        stage: RunStage,
        last_state: ScreenState,
        elapsed: Duration,
    },

    #[error("Unexpected device: {0}")]
    UnexpectedDevice(String),

    #[error("Stopped during {stage}")]
    Cancelled { stage: RunStage },
}

impl AutomationError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AutomationError::Config(_) => 2,
            AutomationError::Asset(_) => 3,
            AutomationError::Bridge(_) => 4,
            AutomationError::StageTimeout { .. } => 5,
            AutomationError::UnexpectedDevice(_) => 6,
            AutomationError::Cancelled { .. } => 130,
        }
    }
}
