//! Error types for the compositor core.

use thiserror::Error;

use crate::shader::ShaderError;
use crate::texture::TextureId;

/// Why a texture was refused before it reached a texture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TextureRejection {
    /// The context cannot sample non-power-of-two textures.
    #[error("dimensions are not powers of two")]
    NotPowerOfTwo,

    /// One side is larger than the context's maximum texture size.
    #[error("exceeds the maximum texture size of {max}")]
    TooLarge { max: u32 },

    /// Width or height is zero.
    #[error("width and height must be non-zero")]
    ZeroSized,

    /// The pixel buffer length does not equal `width * height * 4`.
    #[error("pixel buffer length {actual} does not match {expected} bytes of RGBA8")]
    PixelDataMismatch { expected: usize, actual: usize },
}

/// Errors produced by compositor operations.
#[derive(Debug, Error)]
pub enum CompositorError {
    /// A transform had a (near-)zero determinant and could not be inverted.
    #[error("singular transform: determinant {determinant} cannot be inverted")]
    SingularTransform { determinant: f32 },

    /// More quads were appended to a vertex stream than it can hold.
    #[error("vertex stream capacity of {capacity} quads exceeded")]
    CapacityExceeded { capacity: usize },

    /// A texture was refused by the current GPU context.
    #[error("texture {id} ({width}x{height}) unsupported: {reason}")]
    UnsupportedTexture {
        id: TextureId,
        width: u32,
        height: u32,
        reason: TextureRejection,
    },

    /// A shader failed to compile, link, or match its expected schema.
    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// The GPU context refused to allocate a resource.
    #[error("gpu error: {0}")]
    Gpu(String),

    /// A configuration value was out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// GPU objects were deleted and a later rebuild failed; call `reset` again.
    #[error("gpu resources are lost until the next successful reset")]
    ContextLost,
}

impl CompositorError {
    /// Whether a frame driver can skip the offending object and keep going.
    ///
    /// Singular transforms and rejected textures only affect the object
    /// that produced them; everything else leaves the compositor unusable
    /// for the rest of the frame.
    pub fn is_per_object(&self) -> bool {
        matches!(
            self,
            CompositorError::SingularTransform { .. } | CompositorError::UnsupportedTexture { .. }
        )
    }
}
