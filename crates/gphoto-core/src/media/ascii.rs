//! Terminal preview of decoded images as luminance-mapped text.

use std::fmt;
use std::path::Path;

use fast_image_resize as fir;

/// Glyphs ordered from darkest to brightest.
pub const PALETTE: &[u8] = b" .:-=+*#%@";

pub const DEFAULT_WIDTH: u32 = 80;

/// Narrower frames cannot hold the border plus any glyphs.
pub const MIN_WIDTH: u32 = 8;
pub const MAX_WIDTH: u32 = 1000;

/// A bordered character grid ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    pub lines: Vec<String>,
    /// Size of the decoded source image; `None` for the placeholder.
    pub source_size: Option<(u32, u32)>,
}

impl RenderedFrame {
    pub fn is_placeholder(&self) -> bool {
        self.source_size.is_none()
    }
}

impl fmt::Display for RenderedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AsciiRenderer {
    width: u32,
}

impl Default for AsciiRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH)
    }
}

impl AsciiRenderer {
    pub fn new(width: u32) -> Self {
        Self {
            width: width.clamp(MIN_WIDTH, MAX_WIDTH),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Terminal cells are roughly twice as tall as wide.
    fn rows(&self) -> u32 {
        self.width / 2
    }

    fn glyph_columns(&self) -> u32 {
        self.width - 4
    }

    /// Renders `image` at the configured width.
    ///
    /// Falls back to the placeholder if the image cannot be resampled.
    pub fn render(&self, image: &image::DynamicImage) -> RenderedFrame {
        match self.resample(image) {
            Ok(pixels) => {
                let columns = self.glyph_columns() as usize;
                let rows = pixels.chunks_exact(columns * 3).map(|row| {
                    row.chunks_exact(3)
                        .map(|px| glyph(px[0], px[1], px[2]))
                        .collect()
                });
                RenderedFrame {
                    lines: self.frame(rows),
                    source_size: Some((image.width(), image.height())),
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "resize failed, rendering placeholder");
                self.placeholder()
            }
        }
    }

    /// Decodes `bytes` and renders them, or the placeholder if decoding fails.
    pub fn render_bytes(&self, bytes: &[u8]) -> RenderedFrame {
        match image::load_from_memory(bytes) {
            Ok(image) => self.render(&image),
            Err(err) => {
                tracing::debug!(error = %err, "unsupported image, rendering placeholder");
                self.placeholder()
            }
        }
    }

    /// Reads and renders the file at `path`, or the placeholder if that fails.
    pub fn render_file(&self, path: &Path) -> RenderedFrame {
        match std::fs::read(path) {
            Ok(bytes) => self.render_bytes(&bytes),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cannot read image");
                self.placeholder()
            }
        }
    }

    /// Checkerboard-like shading with the same dimensions as a real frame.
    pub fn placeholder(&self) -> RenderedFrame {
        let columns = self.glyph_columns() as usize;
        let rows = (0..self.rows() as usize).map(|i| {
            (0..columns)
                .map(|j| match i + j {
                    n if n % 3 == 0 => '█',
                    n if n % 2 == 0 => '▓',
                    _ => '░',
                })
                .collect::<String>()
        });
        RenderedFrame {
            lines: self.frame(rows),
            source_size: None,
        }
    }

    fn resample(&self, image: &image::DynamicImage) -> Result<Vec<u8>, String> {
        if image.width() == 0 || image.height() == 0 {
            return Err("empty image".to_string());
        }

        let src = image.to_rgb8();
        let (src_w, src_h) = src.dimensions();
        let src_image =
            fir::images::Image::from_vec_u8(src_w, src_h, src.into_raw(), fir::PixelType::U8x3)
                .map_err(|e| format!("resize: {e}"))?;

        let mut dst_image =
            fir::images::Image::new(self.glyph_columns(), self.rows(), fir::PixelType::U8x3);
        let options = fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
        fir::Resizer::new()
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| format!("resize: {e}"))?;

        Ok(dst_image.into_vec())
    }

    /// Wraps rows in a box border, padding each to the inner width.
    fn frame(&self, rows: impl Iterator<Item = String>) -> Vec<String> {
        let inner = (self.width - 2) as usize;
        let horizontal = "─".repeat(inner);

        let mut lines = vec![format!("┌{horizontal}┐")];
        for row in rows {
            let padding = inner.saturating_sub(row.chars().count());
            lines.push(format!("│{row}{}│", " ".repeat(padding)));
        }
        lines.push(format!("└{horizontal}┘"));
        lines
    }
}

/// Maps an RGB pixel onto the palette by Rec. 601 luminance.
fn glyph(r: u8, g: u8, b: u8) -> char {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    let last = PALETTE.len() - 1;
    let index = (weighted as usize * last / 255_000).min(last);
    char::from(PALETTE[index])
}
