/// Template matching module for locating reference images in screenshots
///
/// This module provides:
/// - Zero-mean normalized cross-correlation scoring in 0.0-1.0
/// - Optional multi-scale search keeping the globally best placement
/// - Optional search regions and a downscale factor to bound the cost
/// - Screenshot decoding into the grayscale buffer every comparison uses
pub mod matcher;
pub mod types;

pub use matcher::{PreparedScreen, TemplateMatcher};
pub use types::{MatchResult, Screenshot, SearchRegion};
