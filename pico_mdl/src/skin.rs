//! Palette conversion of skins.

use image::RgbaImage;
use rgb::RGB8;

/// A 256 colour palette in the `palette.lmp` layout: 768 bytes of RGB triplets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<RGB8>,
    transparent: Option<u8>,
}

impl Palette {
    pub const SIZE: usize = 768;

    /// Returns `None` unless `bytes` is exactly [`Palette::SIZE`] bytes long.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }

        Some(Self {
            colors: bytes
                .chunks_exact(3)
                .map(|c| RGB8::new(c[0], c[1], c[2]))
                .collect(),
            transparent: None,
        })
    }

    /// A palette whose entry `i` is the gray `i`.
    #[must_use]
    pub fn grayscale() -> Self {
        Self {
            colors: (0..=255).map(|i| RGB8::new(i, i, i)).collect(),
            transparent: None,
        }
    }

    /// Makes `index` fully transparent when converting.
    #[must_use]
    pub fn with_transparent_index(mut self, index: u8) -> Self {
        self.transparent = Some(index);
        self
    }

    #[must_use]
    pub fn color(&self, index: u8) -> RGB8 {
        self.colors[usize::from(index)]
    }

    /// Converts palette indexes to an image.
    ///
    /// Returns `None` if `indexes` doesn't hold exactly `width * height` entries.
    #[must_use]
    pub fn to_image(&self, width: u32, height: u32, indexes: &[u8]) -> Option<RgbaImage> {
        let len = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        if indexes.len() != len {
            return None;
        }

        let pixels = indexes
            .iter()
            .flat_map(|&index| {
                let color = self.color(index);
                let alpha = if self.transparent == Some(index) { 0 } else { 255 };
                [color.r, color.g, color.b, alpha]
            })
            .collect();

        RgbaImage::from_raw(width, height, pixels)
    }
}
