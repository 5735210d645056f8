/// Template matching data types
use image::GrayImage;
use serde::Deserialize;

/// One decoded screen capture. Grayscale because every comparison happens in
/// luma; nothing is carried from one capture to the next.
#[derive(Clone, Debug)]
pub struct Screenshot {
    gray: GrayImage,
}

impl Screenshot {
    pub fn from_gray(gray: GrayImage) -> Self {
        Self { gray }
    }

    /// Decode a screencap (PNG, or anything `image` recognises).
    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self {
            gray: img.to_luma8(),
        })
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Mean luma in [0, 255]. Zero for an empty image.
    pub fn mean_luma(&self) -> f32 {
        let pixels = self.gray.as_raw();
        if pixels.is_empty() {
            return 0.0;
        }
        let total: u64 = pixels.iter().map(|&p| p as u64).sum();
        (total as f64 / pixels.len() as f64) as f32
    }
}

/// Rectangle of the screenshot a template is searched in, full-resolution
/// screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SearchRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SearchRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full_screen(screen_width: u32, screen_height: u32) -> Self {
        Self::new(0, 0, screen_width, screen_height)
    }

    /// Clip region to screen boundaries
    pub fn clip_to_screen(mut self, screen_width: u32, screen_height: u32) -> Self {
        self.x = self.x.min(screen_width);
        self.y = self.y.min(screen_height);
        self.width = self.width.min(screen_width - self.x);
        self.height = self.height.min(screen_height - self.y);
        self
    }

    /// Check if this region is valid (non-zero dimensions)
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Best placement of one template in one screenshot.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    /// Zero-mean normalized correlation clamped to 0.0-1.0
    pub score: f32,
    /// Top-left X in full-resolution screenshot coordinates
    pub x: u32,
    /// Top-left Y in full-resolution screenshot coordinates
    pub y: u32,
    /// Template scale factor that produced the score
    pub scale: f32,
    /// Matched template size at `scale`, full resolution
    pub width: u32,
    pub height: u32,
}

impl MatchResult {
    /// The "nothing fits" result: scores below every usable threshold.
    pub fn no_match() -> Self {
        Self {
            score: 0.0,
            x: 0,
            y: 0,
            scale: 1.0,
            width: 0,
            height: 0,
        }
    }

    pub fn is_match(&self, threshold: f32) -> bool {
        self.width > 0 && self.score >= threshold
    }

    /// Centre of the matched rectangle, where a button press should land.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}
