//! Template loading: the screen table joined with its reference images.

use super::config::{Detector, ScreenSpec};
use crate::game_automation::types::ScreenState;
use image::GrayImage;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Template image for {state} not found: {path:?}")]
    Missing { state: ScreenState, path: PathBuf },

    #[error("Failed to load template {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Template {path:?} is a single flat colour and can never correlate")]
    Flat { path: PathBuf },
}

/// One recognisable screen: its table entry plus the decoded reference image
/// (none for brightness detection).
#[derive(Debug, Clone)]
pub struct Template {
    pub spec: ScreenSpec,
    pub image: Option<GrayImage>,
}

impl Template {
    pub fn state(&self) -> ScreenState {
        self.spec.state
    }

    /// Load the reference image a template-detected spec points at.
    pub fn load(spec: ScreenSpec, assets_dir: &Path) -> Result<Self, AssetError> {
        let asset = match &spec.detector {
            Detector::Brightness => return Ok(Self { spec, image: None }),
            Detector::Template { asset } => asset.clone(),
        };
        let path = assets_dir.join(&asset);
        if !path.is_file() {
            return Err(AssetError::Missing {
                state: spec.state,
                path,
            });
        }
        let gray = image::open(&path)
            .map_err(|source| AssetError::Decode {
                path: path.clone(),
                source,
            })?
            .to_luma8();
        let raw = gray.as_raw();
        if raw.first().is_none_or(|first| raw.iter().all(|p| p == first)) {
            return Err(AssetError::Flat { path });
        }
        log::debug!(
            "Loaded template {} for {} ({}x{})",
            path.display(),
            spec.state,
            gray.width(),
            gray.height()
        );
        Ok(Self {
            spec,
            image: Some(gray),
        })
    }
}

/// Every template the classifier scores, ordered by precedence. Immutable
/// once loaded.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: Vec<Template>,
}

impl TemplateLibrary {
    pub fn new(mut templates: Vec<Template>) -> Self {
        templates.sort_by_key(|t| t.spec.precedence);
        Self { templates }
    }

    /// Load the whole table from `assets_dir`. A template that fails to load
    /// is fatal when its state is in `required`, otherwise it is left out of
    /// the library with a warning.
    pub fn load(
        assets_dir: &Path,
        specs: Vec<ScreenSpec>,
        required: &BTreeSet<ScreenState>,
    ) -> Result<Self, AssetError> {
        let mut templates = Vec::with_capacity(specs.len());
        for spec in specs {
            let state = spec.state;
            match Template::load(spec, assets_dir) {
                Ok(template) => templates.push(template),
                Err(e) if required.contains(&state) => return Err(e),
                Err(e) => log::warn!("⚠️ Skipping template for {}: {}", state, e),
            }
        }
        let library = Self::new(templates);
        log::info!(
            "Loaded {} screen templates from {}",
            library.count(),
            assets_dir.display()
        );
        Ok(library)
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn get(&self, state: ScreenState) -> Option<&Template> {
        self.templates.iter().find(|t| t.state() == state)
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }
}
