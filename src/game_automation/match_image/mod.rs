//! Screen recognition for the updater
//!
//! The declared screen table (`config`), its loaded reference images
//! (`template`) and the classifier that turns a screenshot into one
//! `ScreenState` (`detector`).

pub mod config;
pub mod detector;
pub mod template;


// Re-export main types and functions
pub use config::{Detector, ScreenOverride, ScreenSpec, create_default_screens};
pub use detector::{Classification, ScreenClassifier, ScreenScore};
pub use template::{AssetError, Template, TemplateLibrary};
