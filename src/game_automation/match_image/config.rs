//! The declared screen table: how each screen state is recognised, how it
//! ranks against the others, and where to tap once it is seen.

use crate::game_automation::types::{ScreenState, TapTarget};
use crate::template_matching::SearchRegion;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Mean luma (0-255) above which the white credits splash is assumed.
pub const CREDITS_MIN_BRIGHTNESS: f32 = 200.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Detector {
    /// Reference image file, relative to the assets directory
    Template { asset: String },
    /// Whole-screen mean luma / 255 is the score
    Brightness,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSpec {
    pub state: ScreenState,
    pub detector: Detector,
    /// Score at or above which the screen counts as active (0.0 to 1.0)
    pub threshold: f32,
    /// Lower rank wins when several screens are active at once
    pub precedence: u32,
    pub tap: TapTarget,
    /// Template scale factors to try; empty means 1.0 only
    pub scales: Vec<f32>,
    pub region: Option<SearchRegion>,
    /// Navigation wait bound for this screen, overriding the stage default
    pub timeout: Option<Duration>,
}

/// Per-state overrides read from the `screens:` section of the config.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenOverride {
    pub asset: Option<String>,
    pub threshold: Option<f32>,
    pub precedence: Option<u32>,
    pub tap: Option<TapTarget>,
    pub scales: Option<Vec<f32>>,
    pub region: Option<SearchRegion>,
    /// Seconds
    pub timeout: Option<u64>,
}

fn template(
    state: ScreenState,
    asset: &str,
    precedence: u32,
    tap: TapTarget,
    threshold: f32,
) -> ScreenSpec {
    ScreenSpec {
        state,
        detector: Detector::Template {
            asset: asset.to_string(),
        },
        threshold,
        precedence,
        tap,
        scales: Vec::new(),
        region: None,
        timeout: None,
    }
}

/// Built-in table. Precedence puts later, more specific screens first: a
/// visible agreement button outranks the loading art behind it, and the plain
/// brightness test ranks last.
pub fn create_default_screens(default_threshold: f32) -> Vec<ScreenSpec> {
    use ScreenState::*;
    let t = default_threshold;
    vec![
        template(GameRunning, "gakuen_home.png", 0, TapTarget::None, t),
        template(MoveForward, "gakuen_move_forward.png", 1, TapTarget::TemplateCenter, t),
        template(AgreeAll, "gakuen_agree_all.png", 2, TapTarget::TemplateCenter, t),
        template(Agree, "gakuen_agree.png", 3, TapTarget::TemplateCenter, t),
        template(Consent, "gakuen_consent.png", 4, TapTarget::TemplateCenter, t),
        template(Setup, "gakuen_setup.png", 5, TapTarget::ScreenCenter, t),
        template(Loading, "gakuen_loading.png", 6, TapTarget::None, t),
        template(Downloading, "playstore_downloading.png", 7, TapTarget::None, t),
        template(PlayStoreInstallPrompt, "playstore_install.png", 8, TapTarget::TemplateCenter, t),
        ScreenSpec {
            state: CreditsScreen,
            detector: Detector::Brightness,
            threshold: CREDITS_MIN_BRIGHTNESS / 255.0,
            precedence: 9,
            tap: TapTarget::None,
            scales: Vec::new(),
            region: None,
            timeout: None,
        },
    ]
}

/// Apply config overrides on top of the built-in table.
pub fn apply_overrides(
    mut screens: Vec<ScreenSpec>,
    overrides: &BTreeMap<ScreenState, ScreenOverride>,
) -> Vec<ScreenSpec> {
    for spec in &mut screens {
        let Some(o) = overrides.get(&spec.state) else {
            continue;
        };
        if let Some(asset) = &o.asset {
            spec.detector = Detector::Template {
                asset: asset.clone(),
            };
        }
        if let Some(threshold) = o.threshold {
            spec.threshold = threshold;
        }
        if let Some(precedence) = o.precedence {
            spec.precedence = precedence;
        }
        if let Some(tap) = o.tap {
            spec.tap = tap;
        }
        if let Some(scales) = &o.scales {
            spec.scales = scales.clone();
        }
        if o.region.is_some() {
            spec.region = o.region;
        }
        if let Some(secs) = o.timeout {
            spec.timeout = Some(Duration::from_secs(secs));
        }
    }
    screens.sort_by_key(|s| s.precedence);
    screens
}

/// Table consistency problems, described for the config error.
pub fn validate_screens(screens: &[ScreenSpec]) -> Result<(), String> {
    let mut seen: BTreeMap<u32, ScreenState> = BTreeMap::new();
    for spec in screens {
        if !(spec.threshold > 0.0 && spec.threshold <= 1.0) {
            return Err(format!(
                "screens.{:?}.threshold must be in (0, 1], got {}",
                spec.state, spec.threshold
            ));
        }
        if let Some(bad) = spec.scales.iter().find(|s| !(**s > 0.0) || !s.is_finite()) {
            return Err(format!(
                "screens.{:?}.scales must be positive, got {}",
                spec.state, bad
            ));
        }
        if let Some(region) = &spec.region
            && !region.is_valid()
        {
            return Err(format!("screens.{:?}.region has zero size", spec.state));
        }
        if let Some(other) = seen.insert(spec.precedence, spec.state) {
            return Err(format!(
                "screens {:?} and {:?} share precedence {}; ranks must be unique",
                other, spec.state, spec.precedence
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid_and_complete() {
        let screens = create_default_screens(0.8);
        assert!(validate_screens(&screens).is_ok());
        for state in ScreenState::KNOWN {
            assert!(screens.iter().any(|s| s.state == state), "{state} missing");
        }
    }

    #[test]
    fn overrides_replace_fields_and_resort() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            ScreenState::CreditsScreen,
            ScreenOverride {
                asset: Some("credits.png".to_string()),
                precedence: Some(100),
                timeout: Some(15),
                ..Default::default()
            },
        );
        overrides.insert(
            ScreenState::Consent,
            ScreenOverride {
                threshold: Some(0.9),
                tap: Some(TapTarget::Fixed { x: 1280, y: 1400 }),
                ..Default::default()
            },
        );
        let screens = apply_overrides(create_default_screens(0.8), &overrides);

        let credits = screens.last().unwrap();
        assert_eq!(credits.state, ScreenState::CreditsScreen);
        assert_eq!(
            credits.detector,
            Detector::Template {
                asset: "credits.png".to_string()
            }
        );
        assert_eq!(credits.timeout, Some(Duration::from_secs(15)));

        let consent = screens.iter().find(|s| s.state == ScreenState::Consent).unwrap();
        assert_eq!(consent.threshold, 0.9);
        assert_eq!(consent.tap, TapTarget::Fixed { x: 1280, y: 1400 });
    }

    #[test]
    fn duplicate_precedence_is_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            ScreenState::Agree,
            ScreenOverride {
                precedence: Some(2),
                ..Default::default()
            },
        );
        let screens = apply_overrides(create_default_screens(0.8), &overrides);
        let err = validate_screens(&screens).unwrap_err();
        assert!(err.contains("precedence 2"), "{err}");
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let mut screens = create_default_screens(0.8);
        screens[0].threshold = 1.5;
        assert!(validate_screens(&screens).is_err());
    }
}
