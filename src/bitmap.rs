//! Pixel grid and weighted-RGB binarization.

use image::{Rgba, RgbaImage};

use crate::error::TraceError;

/// ITU-R BT.709 luma weights.
const LUMA_R: f64 = 0.2126;
const LUMA_G: f64 = 0.7152;
const LUMA_B: f64 = 0.0722;

/// Boolean foreground grid, row-major, origin at the top-left, y down.
///
/// Immutable once built. The contour tracer works on its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Bitmap {
    /// Build a grid by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> bool,
    ) -> Result<Self, TraceError> {
        check_dimensions(width, height)?;
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Ok(Bitmap { width, height, data })
    }

    /// Build a grid from text rows: `#` or `X` is foreground, anything else
    /// is background. Short rows are padded with background.
    pub fn from_rows(rows: &[&str]) -> Result<Self, TraceError> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        let grid: Vec<Vec<bool>> = rows
            .iter()
            .map(|r| r.chars().map(|c| c == '#' || c == 'X').collect())
            .collect();
        Self::from_fn(width, height, |x, y| {
            grid[y as usize].get(x as usize).copied().unwrap_or(false)
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at (x, y). Out-of-bounds reads are background.
    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Number of foreground pixels.
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|&&set| set).count()
    }
}

/// Convert an RGBA pixel grid into a foreground grid.
///
/// Each pixel's BT.709 luminance is composited over white by its alpha;
/// the pixel is foreground when that value is below `1 - threshold`.
/// So `threshold = 0` keeps everything that is not pure white, and
/// `threshold = 1` keeps nothing.
pub fn binarize(pixels: &RgbaImage, threshold: f64) -> Result<Bitmap, TraceError> {
    let (w, h) = pixels.dimensions();
    check_dimensions(w, h)?;
    let cutoff = 1.0 - threshold;
    Bitmap::from_fn(w, h, |x, y| luminance(pixels.get_pixel(x, y)) < cutoff)
}

/// Alpha-composited (over white) BT.709 luminance in [0, 1].
pub fn luminance(pixel: &Rgba<u8>) -> f64 {
    let [r, g, b, a] = pixel.0;
    let luma = (LUMA_R * r as f64 + LUMA_G * g as f64 + LUMA_B * b as f64) / 255.0;
    let alpha = a as f64 / 255.0;
    alpha * luma + (1.0 - alpha)
}

fn check_dimensions(width: u32, height: u32) -> Result<(), TraceError> {
    if width == 0 || height == 0 {
        return Err(TraceError::InvalidImage(format!(
            "{}x{} pixel grid has no area",
            width, height
        )));
    }
    // Lattice coordinates run to width/height inclusive and are stored as i32.
    if width >= i32::MAX as u32 || height >= i32::MAX as u32 {
        return Err(TraceError::InvalidImage(format!(
            "{}x{} pixel grid is too large",
            width, height
        )));
    }
    Ok(())
}
