/// Template matching implementation
///
/// Zero-mean normalized cross-correlation (the `TM_CCOEFF_NORMED` metric).
/// `imageproc` provides the raw cross-correlation surface; window sums and
/// sums of squares come from integral tables so each position costs O(1)
/// beyond the correlation itself.
use super::types::{MatchResult, Screenshot, SearchRegion};
use image::GrayImage;
use image::imageops::{self, FilterType};
use imageproc::template_matching::{MatchTemplateMethod, match_template};

/// Summed-area tables of pixel values and squared pixel values.
struct IntegralTables {
    stride: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl IntegralTables {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sum_sq = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let p = image.as_raw()[y * w + x] as u64;
                row += p;
                row_sq += p * p;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sum_sq[(y + 1) * stride + x + 1] = sum_sq[y * stride + x + 1] + row_sq;
            }
        }
        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    /// (sum, sum of squares) over the `w`x`h` window with top-left (x, y).
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (u64, u64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |t: &[u64], x: usize, y: usize| t[y * self.stride + x];
        let s = at(&self.sum, x1, y1) + at(&self.sum, x0, y0)
            - at(&self.sum, x0, y1)
            - at(&self.sum, x1, y0);
        let sq = at(&self.sum_sq, x1, y1) + at(&self.sum_sq, x0, y0)
            - at(&self.sum_sq, x0, y1)
            - at(&self.sum_sq, x1, y0);
        (s, sq)
    }
}

/// A screenshot reduced to matching resolution, reusable across every
/// template of one classification cycle.
pub struct PreparedScreen {
    image: GrayImage,
    tables: IntegralTables,
    factor: u32,
    full_width: u32,
    full_height: u32,
}

/// Finds the best placement of a template in a screenshot.
#[derive(Debug, Clone)]
pub struct TemplateMatcher {
    downscale: u32,
}

impl TemplateMatcher {
    /// `downscale` shrinks both images by this integer factor before matching.
    pub fn new(downscale: u32) -> Self {
        Self {
            downscale: downscale.max(1),
        }
    }

    pub fn prepare(&self, screenshot: &Screenshot) -> PreparedScreen {
        let image = shrink(screenshot.gray(), self.downscale);
        let tables = IntegralTables::new(&image);
        PreparedScreen {
            image,
            tables,
            factor: self.downscale,
            full_width: screenshot.width(),
            full_height: screenshot.height(),
        }
    }

    /// One-shot form of [`TemplateMatcher::best_match`].
    pub fn match_template(
        &self,
        screenshot: &Screenshot,
        template: &GrayImage,
        scales: &[f32],
        region: Option<&SearchRegion>,
    ) -> MatchResult {
        self.best_match(&self.prepare(screenshot), template, scales, region)
    }

    /// Best (location, scale) over `scales` (1.0 when empty). Scales whose
    /// template does not fit the search area are skipped; if none fit the
    /// result is [`MatchResult::no_match`].
    pub fn best_match(
        &self,
        screen: &PreparedScreen,
        template: &GrayImage,
        scales: &[f32],
        region: Option<&SearchRegion>,
    ) -> MatchResult {
        let factor = screen.factor;
        let area = region
            .copied()
            .unwrap_or_else(|| SearchRegion::full_screen(screen.full_width, screen.full_height))
            .clip_to_screen(screen.full_width, screen.full_height);
        // Search area in matching resolution
        let (ax, ay) = (area.x / factor, area.y / factor);
        let aw = (area.width / factor).min(screen.image.width().saturating_sub(ax));
        let ah = (area.height / factor).min(screen.image.height().saturating_sub(ay));
        if aw == 0 || ah == 0 {
            return MatchResult::no_match();
        }
        let search = imageops::crop_imm(&screen.image, ax, ay, aw, ah).to_image();

        let default_scales = [1.0f32];
        let scales = if scales.is_empty() {
            &default_scales[..]
        } else {
            scales
        };

        let mut best = MatchResult::no_match();
        for &scale in scales {
            let tw = ((template.width() as f32 * scale) / factor as f32).round() as u32;
            let th = ((template.height() as f32 * scale) / factor as f32).round() as u32;
            if tw == 0 || th == 0 || tw > aw || th > ah {
                log::trace!(
                    "Skipping scale {:.2}: template {}x{} vs search area {}x{}",
                    scale,
                    tw,
                    th,
                    aw,
                    ah
                );
                continue;
            }
            let scaled = if tw == template.width() && th == template.height() {
                template.clone()
            } else {
                imageops::resize(template, tw, th, FilterType::Triangle)
            };

            if let Some((x, y, score)) = zncc_peak(&search, &scaled, &screen.tables, ax, ay)
                && (best.width == 0 || score > best.score)
            {
                best = MatchResult {
                    score,
                    x: (ax + x) * factor,
                    y: (ay + y) * factor,
                    scale,
                    width: (template.width() as f32 * scale).round() as u32,
                    height: (template.height() as f32 * scale).round() as u32,
                };
            }
        }
        best
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new(1)
    }
}

fn shrink(image: &GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 {
        return image.clone();
    }
    let w = (image.width() / factor).max(1);
    let h = (image.height() / factor).max(1);
    imageops::resize(image, w, h, FilterType::Triangle)
}

/// Highest-scoring position of `template` inside `search`, whose top-left sits
/// at (`ox`, `oy`) of the image `tables` was built from. Row-major scan with a
/// strict comparison, so the first of equal peaks wins.
fn zncc_peak(
    search: &GrayImage,
    template: &GrayImage,
    tables: &IntegralTables,
    ox: u32,
    oy: u32,
) -> Option<(u32, u32, f32)> {
    let (tw, th) = template.dimensions();
    let n = (tw as u64) * (th as u64);
    let (t_sum, t_sq) = template
        .as_raw()
        .iter()
        .fold((0u64, 0u64), |(s, q), &p| (s + p as u64, q + (p as u64) * (p as u64)));
    let t_var = (n as u128) * (t_sq as u128) - (t_sum as u128) * (t_sum as u128);

    let cross = match_template(search, template, MatchTemplateMethod::CrossCorrelation);

    let mut best: Option<(u32, u32, f32)> = None;
    for y in 0..cross.height() {
        for x in 0..cross.width() {
            let (i_sum, i_sq) = tables.window(ox + x, oy + y, tw, th);
            let i_var = (n as u128) * (i_sq as u128) - (i_sum as u128) * (i_sum as u128);
            let score = if i_var == 0 || t_var == 0 {
                0.0
            } else {
                let cc = cross.get_pixel(x, y)[0] as f64;
                let num = n as f64 * cc - i_sum as f64 * t_sum as f64;
                let den = ((i_var as f64) * (t_var as f64)).sqrt();
                (num / den).clamp(0.0, 1.0) as f32
            };
            if best.is_none_or(|(_, _, s)| score > s) {
                best = Some((x, y, score));
            }
        }
    }
    best
}
