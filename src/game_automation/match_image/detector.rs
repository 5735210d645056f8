//! Screen state classification over the template library

use super::config::Detector;
use super::template::TemplateLibrary;
use crate::game_automation::types::ScreenState;
use crate::template_matching::{MatchResult, Screenshot, TemplateMatcher};

/// How one library entry scored against one screenshot.
#[derive(Debug, Clone)]
pub struct ScreenScore {
    pub state: ScreenState,
    pub score: f32,
    pub threshold: f32,
    pub precedence: u32,
    /// Template placement; `None` for brightness detection
    pub matched: Option<MatchResult>,
}

impl ScreenScore {
    pub fn is_active(&self) -> bool {
        self.score >= self.threshold
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub state: ScreenState,
    /// All entries, in precedence order
    pub scores: Vec<ScreenScore>,
    /// Size of the classified screenshot. Taps use this frame, which follows
    /// the current rotation.
    pub width: u32,
    pub height: u32,
    pub processing_time_ms: u128,
}

impl Classification {
    pub fn active(&self) -> impl Iterator<Item = &ScreenScore> {
        self.scores.iter().filter(|s| s.is_active())
    }

    pub fn is_ambiguous(&self) -> bool {
        self.active().count() > 1
    }

    /// Entry that decided `state`, if any.
    pub fn winner(&self) -> Option<&ScreenScore> {
        self.active().next()
    }

    pub fn score_of(&self, state: ScreenState) -> Option<&ScreenScore> {
        self.scores.iter().find(|s| s.state == state)
    }

    pub fn center(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }
}

/// Decides which known screen a screenshot shows.
pub struct ScreenClassifier {
    library: TemplateLibrary,
    matcher: TemplateMatcher,
}

impl ScreenClassifier {
    pub fn new(library: TemplateLibrary, matcher: TemplateMatcher) -> Self {
        Self { library, matcher }
    }

    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }

    /// Score every entry; the active entry with the lowest precedence rank
    /// wins, `Unknown` when none is active. Pure: no device interaction.
    pub fn classify(&self, screenshot: &Screenshot) -> Classification {
        let start_time = std::time::Instant::now();
        let prepared = self.matcher.prepare(screenshot);

        let scores: Vec<ScreenScore> = self
            .library
            .templates()
            .iter()
            .map(|template| {
                let spec = &template.spec;
                let (score, matched) = match (&spec.detector, &template.image) {
                    (Detector::Template { .. }, Some(image)) => {
                        let m = self.matcher.best_match(
                            &prepared,
                            image,
                            &spec.scales,
                            spec.region.as_ref(),
                        );
                        (m.score, Some(m))
                    }
                    (Detector::Brightness, _) => (screenshot.mean_luma() / 255.0, None),
                    (Detector::Template { .. }, None) => (0.0, None),
                };
                ScreenScore {
                    state: spec.state,
                    score,
                    threshold: spec.threshold,
                    precedence: spec.precedence,
                    matched,
                }
            })
            .collect();

        let mut result = Classification {
            state: ScreenState::Unknown,
            scores,
            width: screenshot.width(),
            height: screenshot.height(),
            processing_time_ms: 0,
        };
        if let Some(winner) = result.winner() {
            result.state = winner.state;
        }
        result.processing_time_ms = start_time.elapsed().as_millis();

        if result.is_ambiguous() {
            let active: Vec<String> = result
                .active()
                .map(|s| format!("{}={:.3}", s.state, s.score))
                .collect();
            log::warn!(
                "⚠️ Ambiguous screen: [{}] all above threshold, chose {} by precedence",
                active.join(", "),
                result.state
            );
        }
        log_scores(&result);
        result
    }
}

fn log_scores(result: &Classification) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let summary: Vec<String> = result
        .scores
        .iter()
        .map(|s| format!("{}:{:.3}/{:.2}", s.state, s.score, s.threshold))
        .collect();
    log::debug!(
        "🔍 Classified as {} in {}ms [{}]",
        result.state,
        result.processing_time_ms,
        summary.join(" ")
    );
}
