//! 2D affine transforms stored as 3x3 matrices.
//!
//! `Transform2d` wraps a column-major `glam::Mat3`: element order matches
//! what `glUniformMatrix3fv` expects with `transpose = false`, and the
//! translation lives in the third column (`cols[6]`, `cols[7]`).
//!
//! Mutating operations post-multiply (`self = self * op`), so a chain like
//! `translate(5, 0).scale(2, 1)` scales a point first and translates it
//! second. All mutators return `&mut Self` for chaining.

use glam::{Mat3, Vec2};
use serde::{Deserialize, Serialize};

use crate::error::CompositorError;

/// Determinants with a magnitude at or below this are treated as singular.
pub const SINGULAR_EPSILON: f32 = 1e-10;

/// A 2D affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2d {
    mat: Mat3,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform2d {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        mat: Mat3::IDENTITY,
    };

    /// Returns a new identity transform.
    pub fn new() -> Self {
        Self::IDENTITY
    }

    /// Builds a transform from nine column-major values.
    pub fn from_cols_array(values: &[f32; 9]) -> Self {
        Self {
            mat: Mat3::from_cols_array(values),
        }
    }

    /// Pixel-space to clip-space projection for a `width` x `height` viewport.
    ///
    /// Maps `(0, 0)` to the top-left corner `(-1, 1)` and `(width, height)`
    /// to the bottom-right corner `(1, -1)`. Degenerate sizes are clamped to 1.
    pub fn orthographic(width: f32, height: f32) -> Self {
        let w = if width > 0.0 { width } else { 1.0 };
        let h = if height > 0.0 { height } else { 1.0 };
        Self::from_cols_array(&[2.0 / w, 0.0, 0.0, 0.0, -2.0 / h, 0.0, -1.0, 1.0, 1.0])
    }

    /// Resets this transform to the identity.
    pub fn identity(&mut self) -> &mut Self {
        self.mat = Mat3::IDENTITY;
        self
    }

    /// Post-multiplies by `other` (`self = self * other`).
    pub fn multiply(&mut self, other: &Transform2d) -> &mut Self {
        self.mat *= other.mat;
        self
    }

    /// Applies a translation in the current local frame.
    pub fn translate(&mut self, x: f32, y: f32) -> &mut Self {
        self.mat *= Mat3::from_translation(Vec2::new(x, y));
        self
    }

    /// Applies a non-uniform scale in the current local frame.
    pub fn scale(&mut self, x: f32, y: f32) -> &mut Self {
        self.mat *= Mat3::from_scale(Vec2::new(x, y));
        self
    }

    /// Applies a rotation of `angle` radians in the current local frame.
    ///
    /// With a y-down projection, positive angles turn clockwise on screen.
    pub fn rotate(&mut self, angle: f32) -> &mut Self {
        if angle != 0.0 {
            self.mat *= Mat3::from_angle(angle);
        }
        self
    }

    /// Inverts this transform in place.
    ///
    /// # Errors
    ///
    /// Returns `CompositorError::SingularTransform` when the determinant is
    /// non-finite or within [`SINGULAR_EPSILON`] of zero. The transform is
    /// left unchanged in that case.
    pub fn invert(&mut self) -> Result<&mut Self, CompositorError> {
        self.mat = self.inverse()?.mat;
        Ok(self)
    }

    /// Returns the inverse without modifying `self`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Transform2d::invert`].
    pub fn inverse(&self) -> Result<Transform2d, CompositorError> {
        let determinant = self.mat.determinant();
        if !determinant.is_finite() || determinant.abs() <= SINGULAR_EPSILON {
            return Err(CompositorError::SingularTransform { determinant });
        }
        Ok(Self {
            mat: self.mat.inverse(),
        })
    }

    /// Maps a point through this transform.
    pub fn transform_point(&self, x: f32, y: f32) -> Vec2 {
        self.mat.transform_point2(Vec2::new(x, y))
    }

    /// Whether this is exactly the identity.
    pub fn is_identity(&self) -> bool {
        self.mat == Mat3::IDENTITY
    }

    /// The determinant of the 3x3 matrix.
    pub fn determinant(&self) -> f32 {
        self.mat.determinant()
    }

    /// Column-major values, ready for a `mat3` uniform upload.
    pub fn to_cols_array(&self) -> [f32; 9] {
        self.mat.to_cols_array()
    }

    /// The translation component.
    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.mat.z_axis.x, self.mat.z_axis.y)
    }
}
