//! The GPU binding the compositor drives.
//!
//! [`GpuContext`] is the narrow set of calls a batching compositor needs:
//! programs and reflection, buffers and attribute pointers, textures bound
//! to units, draw calls, and framebuffer state. Two implementations ship:
//! [`headless::HeadlessGpu`], which records every call for tests and the
//! CLI, and `glow::GlowGpu` (feature `render`), which forwards to a live
//! WebGL2 / OpenGL context.
//!
//! Resources are addressed through small `Copy` handles minted by the
//! backend. Texture ids are the exception: the caller picks them so they
//! stay stable across a context loss and re-upload.

pub mod headless;

#[cfg(feature = "render")]
pub mod glow;

use serde::{Deserialize, Serialize};

use crate::blend::BlendMode;
use crate::shader::{GlslType, ShaderError};
use crate::texture::TextureId;

/// A linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// A GPU buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// A resolved uniform location within one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformId(pub u32);

/// Which binding point a buffer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// `ARRAY_BUFFER`, vertex attributes.
    Vertex,
    /// `ELEMENT_ARRAY_BUFFER`, u16 indices.
    Index,
}

/// How a buffer's contents are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    Static,
    /// Rewritten every batch.
    Stream,
}

/// Primitive topology for a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Limits reported by the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuCapabilities {
    /// Texture units usable by the fragment stage.
    pub max_texture_units: usize,
    /// Largest texture side the context accepts.
    pub max_texture_size: u32,
    /// Whether textures must have power-of-two sides (WebGL1-class contexts).
    pub requires_power_of_two: bool,
}

impl Default for GpuCapabilities {
    /// The guaranteed WebGL2 minimums.
    fn default() -> Self {
        Self {
            max_texture_units: 16,
            max_texture_size: 2048,
            requires_power_of_two: false,
        }
    }
}

/// An attribute or uniform reported by program reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVariable {
    /// Name without any trailing `[0]`.
    pub name: String,
    pub ty: GlslType,
    /// Array length; 1 for scalars.
    pub size: usize,
}

/// A value for [`GpuContext::set_uniform`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    Mat3(&'a [f32; 9]),
    Vec4([f32; 4]),
    Int(i32),
    IntArray(&'a [i32]),
}

/// The calls a compositor issues against a GPU context.
///
/// Methods that allocate return `Err(String)` with the driver's message;
/// everything else is fire-and-forget, as GL itself is.
pub trait GpuContext {
    fn capabilities(&self) -> GpuCapabilities;

    // --- programs ---

    /// Compiles and links a program.
    ///
    /// # Errors
    ///
    /// Returns `ShaderError::CompileError` or `ShaderError::LinkError` with
    /// the driver log.
    fn create_program(&mut self, vertex_src: &str, fragment_src: &str)
        -> Result<ProgramId, ShaderError>;
    fn delete_program(&mut self, program: ProgramId);
    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveVariable>;
    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveVariable>;
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32>;
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformId>;
    fn use_program(&mut self, program: ProgramId);
    /// Sets a uniform on the program currently in use.
    fn set_uniform(&mut self, uniform: UniformId, value: UniformValue<'_>);

    // --- buffers ---

    /// Creates a buffer and binds it to `target`.
    fn create_buffer(&mut self, target: BufferTarget) -> Result<BufferId, String>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId);
    fn delete_buffer(&mut self, buffer: BufferId);
    /// Replaces the whole store of the buffer bound to `target`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    /// Allocates `size` zeroed bytes for the buffer bound to `target`.
    fn buffer_storage(&mut self, target: BufferTarget, size: usize, usage: BufferUsage);
    /// Overwrites a sub-range of the buffer bound to `target`.
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);
    /// Points a float attribute at the bound vertex buffer and enables it.
    fn vertex_attrib_pointer(&mut self, location: u32, components: usize, stride: usize, offset: usize);
    fn disable_vertex_attrib(&mut self, location: u32);

    // --- textures ---

    /// Creates (or re-creates) the GPU texture for `id` from premultiplied
    /// RGBA8 pixels.
    ///
    /// Leaves texture unit bindings as they were before the call.
    fn upload_texture(&mut self, id: TextureId, width: u32, height: u32, rgba: &[u8])
        -> Result<(), String>;
    fn delete_texture(&mut self, id: TextureId);
    /// Activates `unit` and binds the texture for `id` to it.
    fn bind_texture(&mut self, unit: usize, id: TextureId);

    // --- drawing and framebuffer state ---

    /// Draws `count` u16 indices from the bound index buffer.
    fn draw_elements(&mut self, mode: DrawMode, count: usize);
    fn draw_arrays(&mut self, mode: DrawMode, first: usize, count: usize);
    fn set_blend_mode(&mut self, mode: BlendMode);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&mut self, rgba: [f32; 4]);
    fn clear(&mut self);
}
