//! Vertex layouts, the CPU-side quad stream, and the static index pattern.
//!
//! A quad vertex is nine floats: position (2), color (4), texture unit (1),
//! region UV (2). Four vertices make a quad; six u16 indices draw it as two
//! triangles sharing the `1-2` edge.

use glam::Vec2;

use crate::color::Color;
use crate::error::CompositorError;
use crate::gpu::{BufferTarget, GpuContext};
use crate::shader::GlslType;

pub const FLOATS_PER_VERTEX: usize = 9;
pub const VERTICES_PER_QUAD: usize = 4;
pub const INDICES_PER_QUAD: usize = 6;
pub const FLOATS_PER_QUAD: usize = FLOATS_PER_VERTEX * VERTICES_PER_QUAD;

/// Default quads per batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 16_000;

/// Largest accepted batch size; every vertex index of a full batch fits in u16.
pub const MAX_BATCH_SIZE_LIMIT: usize = (u16::MAX as usize + 1) / VERTICES_PER_QUAD - 1;

/// One float attribute within a vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub ty: GlslType,
    pub components: usize,
    /// Offset in floats from the start of the vertex.
    pub offset: usize,
}

/// An interleaved float vertex layout.
#[derive(Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub attributes: &'static [VertexAttribute],
    /// Vertex size in floats.
    pub stride: usize,
}

impl VertexLayout {
    pub fn attribute(&self, name: &str) -> Option<&'static VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn stride_bytes(&self) -> usize {
        self.stride * std::mem::size_of::<f32>()
    }
}

/// Textured quad vertices.
pub const QUAD_LAYOUT: VertexLayout = VertexLayout {
    attributes: &[
        VertexAttribute {
            name: "aVertex",
            ty: GlslType::Vec2,
            components: 2,
            offset: 0,
        },
        VertexAttribute {
            name: "aColor",
            ty: GlslType::Vec4,
            components: 4,
            offset: 2,
        },
        VertexAttribute {
            name: "aTexture",
            ty: GlslType::Float,
            components: 1,
            offset: 6,
        },
        VertexAttribute {
            name: "aRegion",
            ty: GlslType::Vec2,
            components: 2,
            offset: 7,
        },
    ],
    stride: FLOATS_PER_VERTEX,
};

/// Untextured primitive vertices; color comes from a uniform.
pub const PRIMITIVE_LAYOUT: VertexLayout = VertexLayout {
    attributes: &[VertexAttribute {
        name: "aVertex",
        ty: GlslType::Vec2,
        components: 2,
        offset: 0,
    }],
    stride: 2,
};

/// Index data for `quads` quads: `0,1,2, 2,1,3` offset by four per quad.
///
/// `quads` must not exceed [`MAX_BATCH_SIZE_LIMIT`].
pub fn quad_indices(quads: usize) -> Vec<u16> {
    let mut indices = Vec::with_capacity(quads * INDICES_PER_QUAD);
    for quad in 0..quads {
        let base = (quad * VERTICES_PER_QUAD) as u16;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }
    indices
}

/// Fixed-capacity CPU staging buffer for quad vertices.
///
/// Storage is allocated once; [`VertexStream::reset`] only rewinds the
/// write cursor.
#[derive(Debug)]
pub struct VertexStream {
    data: Vec<f32>,
    quads: usize,
    capacity: usize,
}

impl VertexStream {
    /// Allocates room for `capacity` quads.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity * FLOATS_PER_QUAD],
            quads: 0,
            capacity,
        }
    }

    /// Writes one quad's four vertices at the cursor.
    ///
    /// # Errors
    ///
    /// Returns `CompositorError::CapacityExceeded` if the stream is full.
    /// Nothing is written in that case.
    pub fn append_quad(
        &mut self,
        corners: [Vec2; 4],
        color: Color,
        unit: usize,
        uvs: [Vec2; 4],
    ) -> Result<(), CompositorError> {
        if self.is_full() {
            return Err(CompositorError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let start = self.quads * FLOATS_PER_QUAD;
        let rows = self.data[start..start + FLOATS_PER_QUAD].chunks_exact_mut(FLOATS_PER_VERTEX);
        for ((row, pos), uv) in rows.zip(corners).zip(uvs) {
            row.copy_from_slice(&[
                pos.x, pos.y, color.r, color.g, color.b, color.a, unit as f32, uv.x, uv.y,
            ]);
        }
        self.quads += 1;
        Ok(())
    }

    /// Rewinds to empty without releasing storage.
    pub fn reset(&mut self) {
        self.quads = 0;
    }

    /// Copies the written range into the bound vertex buffer at offset 0.
    pub fn upload_to<G: GpuContext + ?Sized>(&self, gpu: &mut G) {
        gpu.buffer_sub_data(BufferTarget::Vertex, 0, bytemuck::cast_slice(self.written()));
    }

    /// Floats written since the last reset.
    pub fn written(&self) -> &[f32] {
        &self.data[..self.quads * FLOATS_PER_QUAD]
    }

    /// Number of quads written.
    pub fn len(&self) -> usize {
        self.quads
    }

    pub fn is_empty(&self) -> bool {
        self.quads == 0
    }

    pub fn is_full(&self) -> bool {
        self.quads >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size in bytes of a GPU buffer that can hold a full stream.
    pub fn byte_capacity(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}
