use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops, GrayImage, ImageFormat, Luma};

use crate::{encoder::Symbology, error::ValidationError};

use super::{encode_modules, Renderer};

const WHITE: Luma<u8> = Luma([255]);
const BLACK: Luma<u8> = Luma([0]);

/// Grayscale bar renderer. All sizes are pixels.
#[derive(Debug, Clone, Copy)]
pub struct PngRenderer {
    pub module_width: u32,
    pub bar_height: u32,
    pub margin: u32,
}

impl Default for PngRenderer {
    fn default() -> Self {
        Self {
            module_width: 2,
            bar_height: 100,
            margin: 10,
        }
    }
}

impl Renderer for PngRenderer {
    fn render(&self, value: &str, symbology: Symbology) -> Result<GrayImage, ValidationError> {
        let modules = encode_modules(value, symbology)?;
        let module_width = self.module_width.max(1);
        let width = modules.len() as u32 * module_width + 2 * self.margin;
        let height = self.bar_height + 2 * self.margin;

        let mut image = GrayImage::from_pixel(width, height, WHITE);
        for (index, &bar) in modules.iter().enumerate() {
            if !bar {
                continue;
            }
            let x0 = self.margin + index as u32 * module_width;
            for x in x0..x0 + module_width {
                for y in self.margin..self.margin + self.bar_height {
                    image.put_pixel(x, y, BLACK);
                }
            }
        }

        Ok(image)
    }
}

/// Largest print sheet, in pixels (256 MiB of grayscale).
pub const MAX_SHEET_PIXELS: u64 = 1 << 28;

/// `copies` renderings stacked vertically, `gap` pixels apart. Fails when the
/// sheet would exceed [`MAX_SHEET_PIXELS`].
pub fn print_sheet(label: &GrayImage, copies: u32, gap: u32) -> Result<GrayImage> {
    let copies = copies.max(1);
    let (width, height) = label.dimensions();
    let sheet_height = copies
        .checked_mul(height)
        .zip((copies - 1).checked_mul(gap))
        .and_then(|(labels, gaps)| labels.checked_add(gaps))
        .filter(|&total| u64::from(width) * u64::from(total) <= MAX_SHEET_PIXELS)
        .ok_or_else(|| {
            anyhow!("{copies} copies of a {width}x{height} label do not fit on one print sheet")
        })?;

    let mut sheet = GrayImage::from_pixel(width, sheet_height, WHITE);
    let stride = i64::from(height) + i64::from(gap);
    for copy in 0..copies {
        imageops::replace(&mut sheet, label, 0, i64::from(copy) * stride);
    }
    Ok(sheet)
}

pub fn save_png(image: &GrayImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write barcode image to {}", path.display()))
}
