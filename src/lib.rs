pub mod adb;
pub mod config;
pub mod error;
pub mod game_automation;
pub mod template_matching;

#[cfg(test)]
pub(crate) mod testing;

pub use adb::{AdbBackend, AdbClient};
pub use config::Config;
pub use error::AutomationError;
pub use game_automation::{RunController, RunReport};
