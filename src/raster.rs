use anyhow::{bail, ensure, Context};

use crate::Pixel;

/// An axis-aligned rectangle, `min` inclusive and `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}
impl Rect {
    /// Builds a rectangle from two corners, swapping coordinates so that `min <= max`.
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.min_x..self.max_x).contains(&x) && (self.min_y..self.max_y).contains(&y)
    }

    /// Whether `self` lies entirely inside `other`.
    pub fn is_within(&self, other: &Rect) -> bool {
        self.min_x >= other.min_x
            && self.min_y >= other.min_y
            && self.max_x <= other.max_x
            && self.max_y <= other.max_y
    }
}

/// How the bytes of a [`Raster`] map to colors.
///
/// 16-bit samples are stored big-endian. Alpha is never premultiplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorModel {
    Gray8,
    Gray16,
    GrayAlpha8,
    GrayAlpha16,
    Rgb8,
    Rgb16,
    Rgba8,
    Rgba16,
    /// One byte per pixel, indexing into the palette.
    Paletted(Vec<Pixel>),
}
impl ColorModel {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Gray8 | Self::Paletted(_) => 1,
            Self::Gray16 | Self::GrayAlpha8 => 2,
            Self::Rgb8 => 3,
            Self::GrayAlpha16 | Self::Rgba8 => 4,
            Self::Rgb16 => 6,
            Self::Rgba16 => 8,
        }
    }
}

/// A decoded image: pixel samples in row-major order covering `bounds`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    bounds: Rect,
    color: ColorModel,
    samples: Vec<u8>,
}
impl Raster {
    pub fn new(bounds: Rect, color: ColorModel, samples: Vec<u8>) -> anyhow::Result<Self> {
        let (width, height) = (bounds.width(), bounds.height());
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(color.bytes_per_pixel()))
            .with_context(|| format!("a {width}x{height} image is too large"))?;
        ensure!(
            samples.len() == expected,
            "expected {expected} bytes of pixel data for a {width}x{height} image, found {}",
            samples.len()
        );
        if let ColorModel::Paletted(palette) = &color {
            ensure!(
                (1..=256).contains(&palette.len()),
                "palette must hold between 1 and 256 colors, found {}",
                palette.len()
            );
            if let Some(index) = samples.iter().find(|&&i| i as usize >= palette.len()) {
                bail!(
                    "palette index {index} is out of range for a {}-color palette",
                    palette.len()
                );
            }
        }
        Ok(Self {
            bounds,
            color,
            samples,
        })
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn width(&self) -> u32 {
        self.bounds.width()
    }

    pub fn height(&self) -> u32 {
        self.bounds.height()
    }

    pub fn color(&self) -> &ColorModel {
        &self.color
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Bytes of the pixel at `(x, y)`, in the coordinate space of [`Raster::bounds`].
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if !self.bounds.contains(x, y) {
            return None;
        }
        let bpp = self.color.bytes_per_pixel();
        let offset = ((y - self.bounds.min_y) as usize * self.width() as usize
            + (x - self.bounds.min_x) as usize)
            * bpp;
        self.samples.get(offset..offset + bpp)
    }

    /// The pixel at `(x, y)` converted to 8-bit RGBA. 16-bit samples keep their high byte.
    pub fn rgba(&self, x: u32, y: u32) -> Option<Pixel> {
        let px = self.pixel(x, y)?;
        let pixel = match &self.color {
            ColorModel::Gray8 => Pixel::grey(px[0], u8::MAX),
            ColorModel::Gray16 => Pixel::grey(px[0], u8::MAX),
            ColorModel::GrayAlpha8 => Pixel::grey(px[0], px[1]),
            ColorModel::GrayAlpha16 => Pixel::grey(px[0], px[2]),
            ColorModel::Rgb8 => Pixel::opaque(px[0], px[1], px[2]),
            ColorModel::Rgb16 => Pixel::opaque(px[0], px[2], px[4]),
            ColorModel::Rgba8 => Pixel::new(px[0], px[1], px[2], px[3]),
            ColorModel::Rgba16 => Pixel::new(px[0], px[2], px[4], px[6]),
            ColorModel::Paletted(palette) => *palette.get(px[0] as usize)?,
        };
        Some(pixel)
    }
}
