//! Texture handles, dimension checks, and the CPU-side texture registry.
//!
//! The registry keeps the RGBA8 source of every texture it uploads, so a
//! renderer recovering from a lost context can call
//! [`TextureRegistry::restore_all`] after `Compositor::reset`.
//!
//! Pixels are premultiplied by alpha on registration, matching the
//! premultiplied blend factors in [`crate::blend`].

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CompositorError, TextureRejection};
use crate::gpu::{GpuCapabilities, GpuContext};

/// Stable identifier for a texture, chosen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureId(pub u32);

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A texture as referenced by draw commands: id plus dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Texture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    pub fn new(id: TextureId, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    /// Checks this texture's dimensions against `caps`.
    ///
    /// # Errors
    ///
    /// Returns `CompositorError::UnsupportedTexture` naming the first failed check.
    pub fn validate(&self, caps: &GpuCapabilities) -> Result<(), CompositorError> {
        validate_dimensions(self.width, self.height, caps).map_err(|reason| {
            CompositorError::UnsupportedTexture {
                id: self.id,
                width: self.width,
                height: self.height,
                reason,
            }
        })
    }
}

/// Checks that a `width` x `height` texture can be sampled on a context with `caps`.
pub fn validate_dimensions(
    width: u32,
    height: u32,
    caps: &GpuCapabilities,
) -> Result<(), TextureRejection> {
    if width == 0 || height == 0 {
        return Err(TextureRejection::ZeroSized);
    }
    if width > caps.max_texture_size || height > caps.max_texture_size {
        return Err(TextureRejection::TooLarge {
            max: caps.max_texture_size,
        });
    }
    if caps.requires_power_of_two && !(width.is_power_of_two() && height.is_power_of_two()) {
        return Err(TextureRejection::NotPowerOfTwo);
    }
    Ok(())
}

struct TextureEntry {
    texture: Texture,
    pixels: Vec<u8>,
}

/// Owns the CPU copy of every uploaded texture.
#[derive(Default)]
pub struct TextureRegistry {
    next_id: u32,
    entries: BTreeMap<TextureId, TextureEntry>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates, premultiplies, and uploads a straight-alpha RGBA8 image,
    /// returning its handle.
    ///
    /// # Errors
    ///
    /// `UnsupportedTexture` if the dimensions or pixel length are rejected
    /// (logged at warn level), or `Gpu` if the upload fails. No id is
    /// consumed on failure.
    pub fn register<G: GpuContext + ?Sized>(
        &mut self,
        gpu: &mut G,
        width: u32,
        height: u32,
        mut pixels: Vec<u8>,
    ) -> Result<Texture, CompositorError> {
        let texture = Texture::new(TextureId(self.next_id), width, height);
        let expected = width as usize * height as usize * 4;
        let checked = if pixels.len() == expected {
            validate_dimensions(width, height, &gpu.capabilities())
        } else {
            Err(TextureRejection::PixelDataMismatch {
                expected,
                actual: pixels.len(),
            })
        };
        if let Err(reason) = checked {
            warn!("rejecting texture {width}x{height}: {reason}");
            return Err(CompositorError::UnsupportedTexture {
                id: texture.id,
                width,
                height,
                reason,
            });
        }

        premultiply_rgba8(&mut pixels);
        gpu.upload_texture(texture.id, width, height, &pixels)
            .map_err(CompositorError::Gpu)?;
        self.next_id += 1;
        self.entries.insert(texture.id, TextureEntry { texture, pixels });
        debug!("registered texture {} ({width}x{height})", texture.id);
        Ok(texture)
    }

    /// Deletes the GPU texture and forgets the CPU copy.
    ///
    /// Returns `false` if `id` was not registered.
    pub fn unregister<G: GpuContext + ?Sized>(&mut self, gpu: &mut G, id: TextureId) -> bool {
        if self.entries.remove(&id).is_none() {
            return false;
        }
        gpu.delete_texture(id);
        true
    }

    /// Re-uploads every registered texture under its existing id.
    ///
    /// Returns the number of textures restored.
    ///
    /// # Errors
    ///
    /// Stops at the first upload failure and returns `CompositorError::Gpu`.
    pub fn restore_all<G: GpuContext + ?Sized>(&self, gpu: &mut G) -> Result<usize, CompositorError> {
        for entry in self.entries.values() {
            let Texture { id, width, height } = entry.texture;
            gpu.upload_texture(id, width, height, &entry.pixels)
                .map_err(CompositorError::Gpu)?;
        }
        debug!("restored {} textures", self.entries.len());
        Ok(self.entries.len())
    }

    pub fn get(&self, id: TextureId) -> Option<Texture> {
        self.entries.get(&id).map(|e| e.texture)
    }

    /// The premultiplied RGBA8 copy of a registered texture.
    pub fn pixels(&self, id: TextureId) -> Option<&[u8]> {
        self.entries.get(&id).map(|e| e.pixels.as_slice())
    }

    /// Registered textures in id order.
    pub fn textures(&self) -> impl Iterator<Item = Texture> + '_ {
        self.entries.values().map(|e| e.texture)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Multiplies the color channels of straight-alpha RGBA8 pixels by their
/// alpha, rounding to nearest. A fully transparent texel becomes all zeros.
pub fn premultiply_rgba8(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

/// Builds a two-color RGBA8 checkerboard with `cell`-pixel squares.
///
/// Handy as a placeholder texture and in tests.
pub fn checkerboard(width: u32, height: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    let cell = cell.max(1);
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let even = ((x / cell) + (y / cell)) % 2 == 0;
            pixels.extend_from_slice(if even { &a } else { &b });
        }
    }
    pixels
}
