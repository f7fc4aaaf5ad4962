//! Straight-alpha RGBA colors with components in `[0, 1]`.
//!
//! Colors are written into the vertex stream unpremultiplied; the quad
//! shader premultiplies before blending.

use serde::{Deserialize, Serialize};

/// Alpha below which a quad contributes nothing visible and is skipped.
pub const MIN_VISIBLE_ALPHA: f32 = 1.0 / 255.0;

/// A straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Builds a color from 8-bit channels.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }

    /// Builds a color from a packed `0xRRGGBBAA` value.
    pub fn from_hex(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_be_bytes();
        Self::from_rgba8(r, g, b, a)
    }

    /// Builds a color from a JSON-style `[r, g, b, a]` array.
    ///
    /// Returns `None` unless the slice has exactly four entries.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        match values {
            [r, g, b, a] => Some(Self::rgba(*r, *g, *b, *a)),
            _ => None,
        }
    }

    /// Returns a copy with `alpha` replaced.
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self { a: alpha, ..self }
    }

    /// Clamps every channel into `[0, 1]`. NaN channels become 0.
    pub fn clamped(self) -> Self {
        let clamp = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self::rgba(clamp(self.r), clamp(self.g), clamp(self.b), clamp(self.a))
    }

    /// Whether this color is too transparent to produce visible output.
    pub fn is_invisible(&self) -> bool {
        self.a < MIN_VISIBLE_ALPHA
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl std::ops::Mul for Color {
    type Output = Color;

    /// Component-wise modulation.
    fn mul(self, rhs: Color) -> Color {
        Color::rgba(
            self.r * rhs.r,
            self.g * rhs.g,
            self.b * rhs.b,
            self.a * rhs.a,
        )
    }
}
