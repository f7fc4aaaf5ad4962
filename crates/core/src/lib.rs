#![deny(unsafe_code)]
//! Quad batching compositor for WebGL2 / OpenGL.
//!
//! Textured quads are transformed on the CPU, packed into a shared vertex
//! stream, and drawn with one indexed call per batch. Each batch samples
//! from several texture units at once, so sprites from different textures
//! still share a draw call. The GPU sits behind the [`GpuContext`] trait:
//! [`HeadlessGpu`] records calls for tests and offline runs, and
//! `GlowGpu` (feature `render`) drives a live context.
//!
//! # Module overview
//!
//! - [`transform`] -- 2D affine matrices with chainable operations.
//! - [`vertex`] -- The interleaved vertex layout and the batch stream.
//! - [`units`] -- Texture-to-unit assignment for one batch.
//! - [`shader`] -- Built-in shaders and schema-checked program bindings.
//! - [`compositor`] -- The batching state machine.
//! - [`gpu`] -- The GPU trait and its backends.

pub mod blend;
pub mod color;
pub mod compositor;
pub mod config;
pub mod draw;
pub mod error;
pub mod gpu;
pub mod shader;
pub mod texture;
pub mod transform;
pub mod units;
pub mod vertex;

pub use blend::BlendMode;
pub use color::Color;
pub use compositor::{BatchState, Compositor, CompositorStats};
pub use config::CompositorConfig;
pub use draw::{DrawCommand, Drawable, Rect, UvRect};
pub use error::{CompositorError, TextureRejection};
pub use glam::Vec2;
pub use gpu::headless::HeadlessGpu;
pub use gpu::{DrawMode, GpuCapabilities, GpuContext};
pub use shader::{ShaderBinding, ShaderError, ShaderSchema};
pub use texture::{Texture, TextureId, TextureRegistry};
pub use transform::Transform2d;
pub use vertex::{VertexLayout, VertexStream};

#[cfg(feature = "render")]
pub use gpu::glow::GlowGpu;
