//! The batching compositor.
//!
//! Textured quads accumulate in a CPU-side [`VertexStream`] and go to the
//! GPU as one indexed draw call per batch. A batch ends when the stream is
//! full, when every texture unit is taken and a new texture arrives, when
//! the shader, blend mode, or projection changes, when untextured
//! primitives are drawn, or when the caller flushes at the end of a frame.
//!
//! Draw calls leave in exactly the order geometry was submitted.

use std::collections::HashSet;

use glam::Vec2;
use log::{debug, error, trace, warn};
use serde::Serialize;

use crate::blend::BlendMode;
use crate::color::Color;
use crate::config::CompositorConfig;
use crate::draw::{DrawCommand, Rect, UvRect};
use crate::error::CompositorError;
use crate::gpu::{
    BufferId, BufferTarget, BufferUsage, DrawMode, GpuCapabilities, GpuContext, UniformValue,
};
use crate::shader::{
    quad_fragment_shader, ShaderBinding, COLOR_UNIFORM, PRIMITIVE_FRAGMENT_SHADER,
    PRIMITIVE_SCHEMA, PRIMITIVE_VERTEX_SHADER, PROJECTION_UNIFORM, QUAD_SCHEMA,
    QUAD_VERTEX_SHADER, SAMPLER_UNIFORM,
};
use crate::texture::{Texture, TextureId, TextureRegistry};
use crate::transform::Transform2d;
use crate::units::{TextureUnitTable, UnitBinding};
use crate::vertex::{quad_indices, VertexStream, FLOATS_PER_QUAD, INDICES_PER_QUAD, QUAD_LAYOUT};

/// Whether quads are waiting for a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Accumulating,
}

/// Counters accumulated since the last [`Compositor::take_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompositorStats {
    pub draw_calls: usize,
    /// Quad batches sent to the GPU.
    pub flushes: usize,
    /// Quads written to the stream.
    pub quads: usize,
    /// Quads dropped because they were fully transparent.
    pub transparent_quads: usize,
    /// Quads refused because their texture was unsupported.
    pub rejected_quads: usize,
    pub texture_binds: usize,
    pub shader_switches: usize,
    pub blend_switches: usize,
    pub primitive_vertices: usize,
}

impl CompositorStats {
    /// Adds every counter of `other` into `self`.
    pub fn accumulate(&mut self, other: &CompositorStats) {
        self.draw_calls += other.draw_calls;
        self.flushes += other.flushes;
        self.quads += other.quads;
        self.transparent_quads += other.transparent_quads;
        self.rejected_quads += other.rejected_quads;
        self.texture_binds += other.texture_binds;
        self.shader_switches += other.shader_switches;
        self.blend_switches += other.blend_switches;
        self.primitive_vertices += other.primitive_vertices;
    }
}

const QUAD_BYTES: usize = FLOATS_PER_QUAD * std::mem::size_of::<f32>();

/// GPU objects owned by a compositor, rebuilt on [`Compositor::reset`].
struct GpuResources {
    quad_shader: ShaderBinding,
    primitive_shader: ShaderBinding,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    primitive_buffer: BufferId,
}

impl GpuResources {
    fn create<G: GpuContext>(
        gpu: &mut G,
        max_batch_size: usize,
        texture_units: usize,
    ) -> Result<Self, CompositorError> {
        let quad_shader = ShaderBinding::new(
            gpu,
            QUAD_VERTEX_SHADER,
            &quad_fragment_shader(texture_units),
            QUAD_SCHEMA,
        )?;
        let primitive_shader = ShaderBinding::new(
            gpu,
            PRIMITIVE_VERTEX_SHADER,
            PRIMITIVE_FRAGMENT_SHADER,
            PRIMITIVE_SCHEMA,
        )
        .inspect_err(|_| gpu.delete_program(quad_shader.program()))?;

        let index_buffer = gpu
            .create_buffer(BufferTarget::Index)
            .map_err(CompositorError::Gpu)?;
        let indices = quad_indices(max_batch_size);
        gpu.buffer_data(
            BufferTarget::Index,
            bytemuck::cast_slice(&indices),
            BufferUsage::Static,
        );

        let vertex_buffer = gpu
            .create_buffer(BufferTarget::Vertex)
            .map_err(CompositorError::Gpu)?;
        gpu.buffer_storage(
            BufferTarget::Vertex,
            max_batch_size * QUAD_BYTES,
            BufferUsage::Stream,
        );

        let primitive_buffer = gpu
            .create_buffer(BufferTarget::Vertex)
            .map_err(CompositorError::Gpu)?;

        Ok(Self {
            quad_shader,
            primitive_shader,
            vertex_buffer,
            index_buffer,
            primitive_buffer,
        })
    }

    fn delete<G: GpuContext>(&self, gpu: &mut G) {
        gpu.delete_program(self.quad_shader.program());
        gpu.delete_program(self.primitive_shader.program());
        gpu.delete_buffer(self.vertex_buffer);
        gpu.delete_buffer(self.index_buffer);
        gpu.delete_buffer(self.primitive_buffer);
    }
}

/// Batches textured quads and primitives into as few draw calls as possible.
pub struct Compositor<G: GpuContext> {
    gpu: G,
    config: CompositorConfig,
    caps: GpuCapabilities,
    texture_units: usize,
    sampler_units: Vec<i32>,
    stream: VertexStream,
    units: TextureUnitTable,
    resources: GpuResources,
    /// Set while `resources` refers to deleted objects.
    lost: bool,
    active: Option<ShaderBinding>,
    projection: Transform2d,
    viewport: Option<[i32; 4]>,
    color: Color,
    blend_mode: BlendMode,
    primitive_scratch: Vec<f32>,
    rejected: HashSet<TextureId>,
    stats: CompositorStats,
}

impl<G: GpuContext> Compositor<G> {
    /// Builds the shaders, buffers, and static index data on `gpu`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for out-of-range settings, `Shader` if a built-in
    /// shader fails to compile, link, or validate, and `Gpu` if a buffer
    /// cannot be created.
    pub fn new(mut gpu: G, config: CompositorConfig) -> Result<Self, CompositorError> {
        config.validate()?;
        let caps = gpu.capabilities();
        let texture_units = config.resolve_texture_units(caps.max_texture_units);
        let resources = GpuResources::create(&mut gpu, config.max_batch_size, texture_units)?;
        debug!(
            "compositor ready: batch {} quads, {texture_units} texture units",
            config.max_batch_size
        );

        let mut compositor = Self {
            gpu,
            caps,
            texture_units,
            sampler_units: (0..texture_units as i32).collect(),
            stream: VertexStream::new(config.max_batch_size),
            units: TextureUnitTable::new(texture_units),
            resources,
            lost: false,
            active: None,
            projection: Transform2d::IDENTITY,
            viewport: None,
            color: Color::WHITE,
            blend_mode: config.blend_mode,
            primitive_scratch: Vec::new(),
            rejected: HashSet::new(),
            stats: CompositorStats::default(),
            config,
        };
        compositor.apply_gpu_state();
        Ok(compositor)
    }

    fn apply_gpu_state(&mut self) {
        self.gpu.clear_color(self.config.clear_color);
        self.gpu.set_blend_mode(self.blend_mode);
        if let Some([x, y, w, h]) = self.viewport {
            self.gpu.viewport(x, y, w, h);
        }
        let quad = self.resources.quad_shader.clone();
        self.use_shader(&quad);
    }

    // --- shaders and projection ---

    /// Makes `shader` current, flushing pending quads if it differs from
    /// the active one.
    ///
    /// The projection and, for quad shaders, the sampler array are uploaded
    /// on activation. Compile and link failures surface earlier, from
    /// [`ShaderBinding::new`].
    /// Does nothing while GPU resources are lost.
    pub fn use_shader(&mut self, shader: &ShaderBinding) {
        if self.lost {
            return;
        }
        if self.active.as_ref().map(ShaderBinding::program) == Some(shader.program()) {
            return;
        }
        self.flush();

        let buffer = if *shader.layout() == QUAD_LAYOUT {
            self.resources.vertex_buffer
        } else {
            self.resources.primitive_buffer
        };
        self.gpu.bind_buffer(BufferTarget::Vertex, buffer);

        if let Some(previous) = &self.active {
            for (_, location) in previous.attributes() {
                if !shader.attributes().iter().any(|(_, l)| l == location) {
                    self.gpu.disable_vertex_attrib(*location);
                }
            }
        }
        shader.activate(&mut self.gpu);

        if let Some(uniform) = shader.uniform(PROJECTION_UNIFORM) {
            let matrix = self.projection.to_cols_array();
            self.gpu.set_uniform(uniform, UniformValue::Mat3(&matrix));
        }
        if let Some(uniform) = shader.uniform(SAMPLER_UNIFORM) {
            self.gpu
                .set_uniform(uniform, UniformValue::IntArray(&self.sampler_units));
        }

        debug!("shader switched to {:?}", shader.program());
        self.stats.shader_switches += 1;
        self.active = Some(shader.clone());
    }

    fn ensure_layout(&mut self, quad: bool) {
        let active_is_quad = self
            .active
            .as_ref()
            .map(|s| *s.layout() == QUAD_LAYOUT);
        if active_is_quad != Some(quad) {
            let shader = if quad {
                self.resources.quad_shader.clone()
            } else {
                self.resources.primitive_shader.clone()
            };
            self.use_shader(&shader);
        }
    }

    /// Sets the projection for subsequent draws.
    ///
    /// Pending quads are flushed first so they keep the projection they
    /// were queued under.
    pub fn set_projection(&mut self, projection: &Transform2d) {
        self.flush();
        self.projection = *projection;
        if let Some(uniform) = self
            .active
            .as_ref()
            .and_then(|s| s.uniform(PROJECTION_UNIFORM))
        {
            let matrix = projection.to_cols_array();
            self.gpu.set_uniform(uniform, UniformValue::Mat3(&matrix));
        }
    }

    /// Sets the GL viewport, flushing pending quads first.
    ///
    /// The viewport is re-applied after [`Compositor::reset`].
    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.flush();
        self.viewport = Some([x, y, width, height]);
        self.gpu.viewport(x, y, width, height);
    }

    /// Sets the viewport to `width` x `height` with a matching pixel projection.
    pub fn resize(&mut self, width: u32, height: u32) {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        self.set_viewport(0, 0, w, h);
        self.set_projection(&Transform2d::orthographic(width as f32, height as f32));
    }

    // --- global state ---

    /// Sets the color every subsequent quad tint and primitive is multiplied by.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Switches blend mode, flushing first when it actually changes.
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        if mode == self.blend_mode {
            return;
        }
        self.flush();
        debug!("blend mode {} -> {mode}", self.blend_mode);
        self.gpu.set_blend_mode(mode);
        self.blend_mode = mode;
        self.stats.blend_switches += 1;
    }

    /// Sets the color [`Compositor::clear`] fills the framebuffer with.
    pub fn clear_color(&mut self, color: Color) {
        self.config.clear_color = color.to_array();
        self.gpu.clear_color(self.config.clear_color);
    }

    /// Clears the framebuffer. Pending quads are unaffected.
    pub fn clear(&mut self) {
        self.gpu.clear();
    }

    // --- quads ---

    /// Queues a textured quad covering `dest`, mapped through `transform`.
    ///
    /// Quads whose combined alpha (`tint * color`) is below 1/255 are
    /// dropped silently.
    ///
    /// # Errors
    ///
    /// `UnsupportedTexture` if the texture cannot be sampled on this
    /// context; nothing is queued and the batch is unaffected.
    /// `ContextLost` after a failed [`Compositor::reset`].
    pub fn add_quad(
        &mut self,
        texture: &Texture,
        transform: &Transform2d,
        dest: Rect,
        uv: UvRect,
        tint: Color,
    ) -> Result<(), CompositorError> {
        if self.lost {
            return Err(CompositorError::ContextLost);
        }
        let color = tint * self.color;
        if color.is_invisible() {
            self.stats.transparent_quads += 1;
            return Ok(());
        }
        self.check_texture(texture)?;

        self.ensure_layout(true);
        if self.stream.is_full() {
            self.flush();
        }
        let unit = self.bind_unit(texture.id);

        let mut corners = dest.corners();
        if !transform.is_identity() {
            for corner in &mut corners {
                *corner = transform.transform_point(corner.x, corner.y);
            }
        }
        let uvs = uv.corners();

        if let Err(err) = self.stream.append_quad(corners, color, unit, uvs) {
            debug_assert!(false, "{err}");
            error!("{err}; flushing and retrying");
            self.flush();
            let unit = self.bind_unit(texture.id);
            self.stream.append_quad(corners, color, unit, uvs)?;
        }
        trace!("quad texture={} unit={unit} at {:?}", texture.id, corners[0]);
        self.stats.quads += 1;
        Ok(())
    }

    fn check_texture(&mut self, texture: &Texture) -> Result<(), CompositorError> {
        texture.validate(&self.caps).inspect_err(|err| {
            if self.rejected.insert(texture.id) {
                warn!("{err}; skipping its quads");
            }
            self.stats.rejected_quads += 1;
        })
    }

    /// Checks that `command` would be accepted, without queuing anything.
    ///
    /// Lets a caller validate every command of an object before submitting
    /// any of them. A refused texture counts toward `rejected_quads` here
    /// instead of in [`Compositor::add_quad`].
    ///
    /// # Errors
    ///
    /// `UnsupportedTexture` for a quad whose texture cannot be sampled, and
    /// `ContextLost` after a failed [`Compositor::reset`].
    pub fn check(&mut self, command: &DrawCommand) -> Result<(), CompositorError> {
        if self.lost {
            return Err(CompositorError::ContextLost);
        }
        match command {
            DrawCommand::Quad { texture, .. } => self.check_texture(texture),
            DrawCommand::Primitive { .. } => Ok(()),
        }
    }

    fn bind_unit(&mut self, texture: TextureId) -> usize {
        let binding = match self.units.bind(texture) {
            UnitBinding::Exhausted => {
                debug!("all {} texture units in use, flushing", self.texture_units);
                self.flush();
                self.units.bind(texture)
            }
            other => other,
        };
        if let UnitBinding::Assigned {
            unit,
            needs_bind: true,
        } = binding
        {
            self.gpu.bind_texture(unit, texture);
            self.stats.texture_binds += 1;
        }
        binding.unit().unwrap_or(0)
    }

    /// Sends pending quads as one indexed draw call. Does nothing when idle.
    pub fn flush(&mut self) {
        if self.stream.is_empty() {
            return;
        }
        let quads = self.stream.len();
        self.gpu
            .bind_buffer(BufferTarget::Vertex, self.resources.vertex_buffer);
        self.stream.upload_to(&mut self.gpu);
        self.gpu
            .bind_buffer(BufferTarget::Index, self.resources.index_buffer);
        self.gpu
            .draw_elements(DrawMode::Triangles, quads * INDICES_PER_QUAD);

        self.stream.reset();
        self.units.reset();
        self.stats.flushes += 1;
        self.stats.draw_calls += 1;
        debug!("flushed {quads} quads");
    }

    // --- primitives ---

    /// Draws untextured geometry immediately in the current color.
    ///
    /// Pending quads are flushed first. At most `vertex_count` points are
    /// used. Nothing is drawn while GPU resources are lost.
    pub fn draw_vertices(
        &mut self,
        mode: DrawMode,
        points: &[Vec2],
        vertex_count: usize,
        transform: &Transform2d,
    ) {
        self.flush();
        let count = vertex_count.min(points.len());
        if self.lost || count == 0 || self.color.is_invisible() {
            return;
        }
        self.ensure_layout(false);

        if let Some(uniform) = self
            .active
            .as_ref()
            .and_then(|s| s.uniform(COLOR_UNIFORM))
        {
            self.gpu
                .set_uniform(uniform, UniformValue::Vec4(self.color.to_array()));
        }

        self.primitive_scratch.clear();
        let identity = transform.is_identity();
        for p in &points[..count] {
            let q = if identity {
                *p
            } else {
                transform.transform_point(p.x, p.y)
            };
            self.primitive_scratch.extend_from_slice(&[q.x, q.y]);
        }
        self.gpu
            .bind_buffer(BufferTarget::Vertex, self.resources.primitive_buffer);
        self.gpu.buffer_data(
            BufferTarget::Vertex,
            bytemuck::cast_slice(&self.primitive_scratch),
            BufferUsage::Stream,
        );
        self.gpu.draw_arrays(mode, 0, count);

        self.stats.draw_calls += 1;
        self.stats.primitive_vertices += count;
        trace!("primitive {mode:?} with {count} vertices");
    }

    /// Executes one draw command.
    ///
    /// # Errors
    ///
    /// Propagates `add_quad` errors for quad commands, and `ContextLost`
    /// for primitives after a failed [`Compositor::reset`].
    pub fn submit(&mut self, command: &DrawCommand) -> Result<(), CompositorError> {
        match command {
            DrawCommand::Quad {
                texture,
                transform,
                dest,
                uv,
                tint,
            } => self.add_quad(texture, transform, *dest, *uv, *tint),
            DrawCommand::Primitive {
                mode,
                points,
                color,
                transform,
            } => {
                if self.lost {
                    return Err(CompositorError::ContextLost);
                }
                let global = self.color;
                self.color = *color * global;
                self.draw_vertices(*mode, points, points.len(), transform);
                self.color = global;
                Ok(())
            }
        }
    }

    // --- lifecycle ---

    /// Rebuilds every GPU-side object, as after a lost context.
    ///
    /// Pending quads are discarded. Textures are not re-uploaded here; pass
    /// the registry to [`Compositor::restore`] for that.
    ///
    /// # Errors
    ///
    /// Same as [`Compositor::new`]. On failure the compositor stays lost:
    /// quads and primitives are refused until a later `reset` succeeds.
    pub fn reset(&mut self) -> Result<(), CompositorError> {
        self.stream.reset();
        self.units.invalidate();
        self.rejected.clear();
        if !self.lost {
            self.resources.delete(&mut self.gpu);
            self.lost = true;
        }
        self.active = None;

        self.caps = self.gpu.capabilities();
        self.resources =
            GpuResources::create(&mut self.gpu, self.config.max_batch_size, self.texture_units)
                .inspect_err(|e| error!("compositor reset failed: {e}"))?;
        self.lost = false;
        self.apply_gpu_state();
        debug!("compositor reset");
        Ok(())
    }

    /// Resets and re-uploads every texture in `registry`.
    ///
    /// Returns the number of textures restored.
    ///
    /// # Errors
    ///
    /// Errors from [`Compositor::reset`] or the re-upload.
    pub fn restore(&mut self, registry: &TextureRegistry) -> Result<usize, CompositorError> {
        self.reset()?;
        registry.restore_all(&mut self.gpu)
    }

    /// Deletes a texture, flushing first if the pending batch samples it.
    pub fn release_texture(&mut self, registry: &mut TextureRegistry, id: TextureId) -> bool {
        if self.units.unit_of(id).is_some() {
            self.flush();
        }
        self.units.forget(id);
        self.rejected.remove(&id);
        registry.unregister(&mut self.gpu, id)
    }

    // --- accessors ---

    /// `Accumulating` while quads are waiting for a flush.
    pub fn state(&self) -> BatchState {
        if self.stream.is_empty() {
            BatchState::Idle
        } else {
            BatchState::Accumulating
        }
    }

    /// Whether a failed [`Compositor::reset`] left the GPU objects deleted.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Quads queued since the last flush.
    pub fn pending_quads(&self) -> usize {
        self.stream.len()
    }

    /// The staging stream holding the pending batch.
    pub fn stream(&self) -> &VertexStream {
        &self.stream
    }

    /// Counters since the last [`Compositor::take_stats`].
    pub fn stats(&self) -> &CompositorStats {
        &self.stats
    }

    /// Returns the counters and starts new ones.
    pub fn take_stats(&mut self) -> CompositorStats {
        std::mem::take(&mut self.stats)
    }

    /// The built-in textured quad shader.
    pub fn quad_shader(&self) -> &ShaderBinding {
        &self.resources.quad_shader
    }

    /// The built-in untextured primitive shader.
    pub fn primitive_shader(&self) -> &ShaderBinding {
        &self.resources.primitive_shader
    }

    /// The shader draws currently go through, if any.
    pub fn active_shader(&self) -> Option<&ShaderBinding> {
        self.active.as_ref()
    }

    pub fn projection(&self) -> &Transform2d {
        &self.projection
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Texture units in use after clamping to the context's limit.
    pub fn texture_units(&self) -> usize {
        self.texture_units
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    /// Direct access to the context. Calls made through it bypass batching.
    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    /// Consumes the compositor and returns the GPU context.
    pub fn into_gpu(self) -> G {
        self.gpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::{GpuCall, HeadlessGpu, RecordedUniform};
    use crate::gpu::GpuCapabilities;
    use crate::shader::{quad_fragment_shader, QUAD_SCHEMA, QUAD_VERTEX_SHADER};
    use crate::vertex::FLOATS_PER_VERTEX;

    fn tex(id: u32) -> Texture {
        Texture::new(TextureId(id), 64, 64)
    }

    fn compositor(max_batch_size: usize, units: usize) -> Compositor<HeadlessGpu> {
        let config = CompositorConfig {
            max_batch_size,
            max_texture_units: Some(units),
            ..CompositorConfig::default()
        };
        let mut c = Compositor::new(HeadlessGpu::new(), config).unwrap();
        c.gpu_mut().clear_calls();
        c.take_stats();
        c
    }

    /// Queues a 1x1 quad at `x`, so each quad's texture can be read back
    /// from its first vertex position.
    fn quad_at(c: &mut Compositor<HeadlessGpu>, texture: Texture, x: f32) {
        c.add_quad(
            &texture,
            &Transform2d::IDENTITY,
            Rect::new(x, 0.0, 1.0, 1.0),
            UvRect::FULL,
            Color::WHITE,
        )
        .unwrap();
    }

    fn element_draws(gpu: &HeadlessGpu) -> Vec<usize> {
        gpu.calls()
            .iter()
            .filter_map(|c| match c {
                GpuCall::DrawElements { count, .. } => Some(*count),
                _ => None,
            })
            .collect()
    }

    // --- construction ---

    #[test]
    fn new_uploads_static_indices_and_activates_quad_shader() {
        let c = Compositor::new(
            HeadlessGpu::new(),
            CompositorConfig {
                max_batch_size: 3,
                max_texture_units: Some(4),
                ..CompositorConfig::default()
            },
        )
        .unwrap();
        let gpu = c.gpu();
        assert_eq!(gpu.bound_indices(), quad_indices(3));
        assert_eq!(gpu.current_program(), Some(c.quad_shader().program()));
        let sampler = c.quad_shader().uniform(SAMPLER_UNIFORM).unwrap();
        assert_eq!(
            gpu.uniform_value(sampler),
            Some(&RecordedUniform::IntArray(vec![0, 1, 2, 3]))
        );
        assert_eq!(c.state(), BatchState::Idle);
        assert_eq!(c.texture_units(), 4);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = CompositorConfig {
            max_batch_size: 0,
            ..CompositorConfig::default()
        };
        let err = Compositor::new(HeadlessGpu::new(), config).err().unwrap();
        assert!(matches!(err, CompositorError::InvalidConfig(_)));
    }

    #[test]
    fn new_propagates_shader_link_failure() {
        let mut gpu = HeadlessGpu::new();
        gpu.fail_next_link("attribute aVertex exceeds limits");
        let err = Compositor::new(gpu, CompositorConfig::default())
            .err()
            .unwrap();
        assert!(
            matches!(err, CompositorError::Shader(crate::shader::ShaderError::LinkError(_))),
            "got {err:?}"
        );
    }

    #[test]
    fn texture_units_clamp_to_gpu_capabilities() {
        let gpu = HeadlessGpu::with_capabilities(GpuCapabilities {
            max_texture_units: 8,
            ..GpuCapabilities::default()
        });
        let config = CompositorConfig {
            max_texture_units: Some(32),
            ..CompositorConfig::default()
        };
        let c = Compositor::new(gpu, config).unwrap();
        assert_eq!(c.texture_units(), 8);
    }

    // --- batching ---

    #[test]
    fn quads_accumulate_without_gpu_upload() {
        let mut c = compositor(10, 4);
        quad_at(&mut c, tex(1), 0.0);
        quad_at(&mut c, tex(1), 1.0);
        assert_eq!(c.state(), BatchState::Accumulating);
        assert_eq!(c.pending_quads(), 2);
        assert!(element_draws(c.gpu()).is_empty());
        assert_eq!(
            c.gpu().calls_matching(|call| matches!(call, GpuCall::BufferSubData { .. })),
            0
        );
    }

    #[test]
    fn batch_overflow_flushes_exactly_once_per_full_batch() {
        let mut c = compositor(4, 4);
        for i in 0..5 {
            quad_at(&mut c, tex(1), i as f32);
        }
        assert_eq!(element_draws(c.gpu()), vec![4 * 6]);
        assert_eq!(c.pending_quads(), 1);
        c.flush();
        assert_eq!(element_draws(c.gpu()), vec![24, 6]);
        assert_eq!(c.stats().flushes, 2);
        assert_eq!(c.stats().quads, 5);
    }

    #[test]
    fn flush_is_idempotent_when_idle() {
        let mut c = compositor(4, 4);
        c.flush();
        c.flush();
        assert!(c.gpu().calls().is_empty());
        quad_at(&mut c, tex(1), 0.0);
        c.flush();
        let calls = c.gpu().calls().len();
        c.flush();
        assert_eq!(c.gpu().calls().len(), calls);
    }

    #[test]
    fn flush_uploads_written_range_then_draws() {
        let mut c = compositor(8, 4);
        quad_at(&mut c, tex(1), 0.0);
        quad_at(&mut c, tex(1), 1.0);
        c.flush();
        let calls = c.gpu().calls();
        let sub = calls
            .iter()
            .position(|call| {
                *call
                    == GpuCall::BufferSubData {
                        target: BufferTarget::Vertex,
                        offset: 0,
                        len: 2 * FLOATS_PER_QUAD * 4,
                    }
            })
            .unwrap();
        let draw = calls
            .iter()
            .position(|call| matches!(call, GpuCall::DrawElements { count: 12, .. }))
            .unwrap();
        assert!(sub < draw);
        assert_eq!(c.state(), BatchState::Idle);
    }

    #[test]
    fn capacity_and_unit_pressure_flush_once_with_one_pending() {
        // batch of 2, two units: A, B, A
        let mut c = compositor(2, 2);
        quad_at(&mut c, tex(1), 0.0);
        quad_at(&mut c, tex(2), 1.0);
        quad_at(&mut c, tex(1), 2.0);
        assert_eq!(c.stats().flushes, 1);
        assert_eq!(c.pending_quads(), 1);
    }

    #[test]
    fn exhausted_units_flush_and_restart_at_unit_zero() {
        let mut c = compositor(100, 2);
        quad_at(&mut c, tex(1), 0.0);
        quad_at(&mut c, tex(2), 1.0);
        quad_at(&mut c, tex(3), 2.0);

        let draws = c.gpu().draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].units[..2], [Some(TextureId(1)), Some(TextureId(2))]);
        assert_eq!(c.pending_quads(), 1);
        // texture 3 took unit 0 in the new batch
        assert_eq!(c.stream().written()[6], 0.0);
    }

    #[test]
    fn same_texture_keeps_its_unit_within_a_batch() {
        let mut c = compositor(100, 4);
        for (i, id) in [5, 6, 5, 7, 6, 5].into_iter().enumerate() {
            quad_at(&mut c, tex(id), i as f32);
        }
        let units: Vec<f32> = c
            .stream()
            .written()
            .chunks(FLOATS_PER_QUAD)
            .map(|q| q[6])
            .collect();
        assert_eq!(units, vec![0.0, 1.0, 0.0, 2.0, 1.0, 0.0]);
        assert_eq!(c.stats().texture_binds, 3);
    }

    #[test]
    fn texture_resident_on_same_unit_is_not_rebound_after_flush() {
        let mut c = compositor(1, 4);
        quad_at(&mut c, tex(1), 0.0);
        quad_at(&mut c, tex(1), 1.0);
        quad_at(&mut c, tex(1), 2.0);
        assert_eq!(c.stats().flushes, 2);
        assert_eq!(
            c.gpu()
                .calls_matching(|call| matches!(call, GpuCall::BindTexture { .. })),
            1
        );
    }

    #[test]
    fn draw_order_follows_submission_order() {
        let mut c = compositor(100, 1);
        quad_at(&mut c, tex(1), 0.0);
        quad_at(&mut c, tex(2), 1.0);
        c.flush();
        let draws = c.gpu().draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].units[0], Some(TextureId(1)));
        assert_eq!(draws[1].units[0], Some(TextureId(2)));

        let mut multi = compositor(100, 4);
        quad_at(&mut multi, tex(1), 0.0);
        quad_at(&mut multi, tex(2), 1.0);
        multi.flush();
        let vertices = &multi.gpu().draws()[0].vertices;
        assert_eq!(vertices[0], 0.0);
        assert_eq!(vertices[FLOATS_PER_QUAD], 1.0);
    }

    // --- vertex content ---

    #[test]
    fn identity_transform_writes_dest_corners_directly() {
        let mut c = compositor(10, 4);
        c.add_quad(
            &tex(1),
            &Transform2d::IDENTITY,
            Rect::new(10.0, 20.0, 4.0, 2.0),
            UvRect::new(0.0, 0.0, 0.5, 0.5),
            Color::WHITE,
        )
        .unwrap();
        let positions: Vec<(f32, f32, f32, f32)> = c
            .stream()
            .written()
            .chunks(FLOATS_PER_VERTEX)
            .map(|v| (v[0], v[1], v[7], v[8]))
            .collect();
        assert_eq!(
            positions,
            vec![
                (10.0, 20.0, 0.0, 0.0),
                (14.0, 20.0, 0.5, 0.0),
                (10.0, 22.0, 0.0, 0.5),
                (14.0, 22.0, 0.5, 0.5),
            ]
        );
    }

    #[test]
    fn transform_is_applied_to_every_corner() {
        let mut c = compositor(10, 4);
        let mut t = Transform2d::new();
        t.translate(100.0, 50.0).scale(2.0, 2.0);
        c.add_quad(
            &tex(1),
            &t,
            Rect::new(0.0, 0.0, 1.0, 1.0),
            UvRect::FULL,
            Color::WHITE,
        )
        .unwrap();
        let written = c.stream().written();
        assert_eq!(&written[0..2], &[100.0, 50.0]);
        assert_eq!(&written[27..29], &[102.0, 52.0]);
    }

    #[test]
    fn vertex_color_is_tint_times_global_color() {
        let mut c = compositor(10, 4);
        c.set_color(Color::rgba(1.0, 0.5, 1.0, 0.5));
        c.add_quad(
            &tex(1),
            &Transform2d::IDENTITY,
            Rect::new(0.0, 0.0, 1.0, 1.0),
            UvRect::FULL,
            Color::rgba(0.5, 1.0, 1.0, 1.0),
        )
        .unwrap();
        assert_eq!(&c.stream().written()[2..6], &[0.5, 0.5, 1.0, 0.5]);
    }

    #[test]
    fn transparent_quads_are_skipped() {
        let mut c = compositor(10, 4);
        c.add_quad(
            &tex(1),
            &Transform2d::IDENTITY,
            Rect::new(0.0, 0.0, 1.0, 1.0),
            UvRect::FULL,
            Color::WHITE.with_alpha(0.0),
        )
        .unwrap();
        assert_eq!(c.pending_quads(), 0);
        assert_eq!(c.stats().transparent_quads, 1);
        assert!(c.gpu().calls().is_empty());
    }

    // --- texture rejection ---

    #[test]
    fn unsupported_texture_is_refused_without_touching_batch() {
        let gpu = HeadlessGpu::with_capabilities(GpuCapabilities {
            requires_power_of_two: true,
            ..GpuCapabilities::default()
        });
        let mut c = Compositor::new(gpu, CompositorConfig::default()).unwrap();
        quad_at(&mut c, tex(1), 0.0);
        let npot = Texture::new(TextureId(2), 100, 64);
        let err = c
            .add_quad(
                &npot,
                &Transform2d::IDENTITY,
                Rect::new(0.0, 0.0, 1.0, 1.0),
                UvRect::FULL,
                Color::WHITE,
            )
            .unwrap_err();
        assert!(err.is_per_object());
        assert_eq!(c.pending_quads(), 1);
        assert_eq!(c.stats().rejected_quads, 1);
    }

    // --- state changes ---

    #[test]
    fn draw_vertices_flushes_pending_quads_first() {
        let mut c = compositor(10, 4);
        quad_at(&mut c, tex(1), 0.0);
        let points = [Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0)];
        c.draw_vertices(DrawMode::Lines, &points, 2, &Transform2d::IDENTITY);

        let draws = c.gpu().draws();
        assert_eq!(draws.len(), 2);
        assert!(draws[0].indexed);
        assert!(!draws[1].indexed);
        assert_eq!(draws[1].program, Some(c.primitive_shader().program()));
        assert_eq!(draws[1].vertices, vec![0.0, 0.0, 5.0, 5.0]);
        assert_eq!(c.state(), BatchState::Idle);
    }

    #[test]
    fn draw_vertices_sets_color_uniform_and_clamps_count() {
        let mut c = compositor(10, 4);
        c.set_color(Color::rgba(1.0, 0.0, 0.0, 1.0));
        let points = [Vec2::ZERO, Vec2::X, Vec2::Y];
        let mut t = Transform2d::new();
        t.translate(10.0, 0.0);
        c.draw_vertices(DrawMode::TriangleFan, &points, 10, &t);

        let uniform = c.primitive_shader().uniform(COLOR_UNIFORM).unwrap();
        assert_eq!(
            c.gpu().uniform_value(uniform),
            Some(&RecordedUniform::Vec4([1.0, 0.0, 0.0, 1.0]))
        );
        let draw = &c.gpu().draws()[0];
        assert_eq!(draw.count, 3);
        assert_eq!(draw.vertices, vec![10.0, 0.0, 11.0, 0.0, 10.0, 1.0]);
        assert_eq!(c.stats().primitive_vertices, 3);
    }

    #[test]
    fn quads_after_primitives_switch_back_to_quad_shader() {
        let mut c = compositor(10, 4);
        c.draw_vertices(
            DrawMode::Lines,
            &[Vec2::ZERO, Vec2::ONE],
            2,
            &Transform2d::IDENTITY,
        );
        quad_at(&mut c, tex(1), 0.0);
        c.flush();
        let draws = c.gpu().draws();
        assert_eq!(draws[1].program, Some(c.quad_shader().program()));
        assert_eq!(draws[1].vertices.len(), FLOATS_PER_QUAD);
        assert_eq!(c.stats().shader_switches, 2);
    }

    #[test]
    fn use_shader_flushes_only_when_shader_changes() {
        let mut c = compositor(10, 4);
        quad_at(&mut c, tex(1), 0.0);
        let same = c.quad_shader().clone();
        c.use_shader(&same);
        assert_eq!(c.pending_quads(), 1);

        let custom = ShaderBinding::new(
            c.gpu_mut(),
            QUAD_VERTEX_SHADER,
            &quad_fragment_shader(4),
            QUAD_SCHEMA,
        )
        .unwrap();
        c.use_shader(&custom);
        assert_eq!(c.pending_quads(), 0);
        assert_eq!(element_draws(c.gpu()), vec![6]);

        // quads keep using a custom quad-layout shader
        quad_at(&mut c, tex(1), 0.0);
        c.flush();
        assert_eq!(c.gpu().draws()[1].program, Some(custom.program()));
    }

    #[test]
    fn set_projection_flushes_and_uploads_uniform() {
        let mut c = compositor(10, 4);
        quad_at(&mut c, tex(1), 0.0);
        let ortho = Transform2d::orthographic(640.0, 480.0);
        c.set_projection(&ortho);
        assert_eq!(c.pending_quads(), 0);
        let uniform = c.quad_shader().uniform(PROJECTION_UNIFORM).unwrap();
        assert_eq!(
            c.gpu().uniform_value(uniform),
            Some(&RecordedUniform::Mat3(ortho.to_cols_array()))
        );

        // the primitive shader picks it up on activation
        c.draw_vertices(DrawMode::Points, &[Vec2::ZERO], 1, &Transform2d::IDENTITY);
        let prim = c.primitive_shader().uniform(PROJECTION_UNIFORM).unwrap();
        assert_eq!(
            c.gpu().uniform_value(prim),
            Some(&RecordedUniform::Mat3(ortho.to_cols_array()))
        );
    }

    #[test]
    fn resize_sets_viewport_and_pixel_projection() {
        let mut c = compositor(10, 4);
        c.resize(800, 600);
        assert!(c.gpu().calls().contains(&GpuCall::Viewport {
            x: 0,
            y: 0,
            width: 800,
            height: 600
        }));
        assert_eq!(*c.projection(), Transform2d::orthographic(800.0, 600.0));
    }

    #[test]
    fn blend_change_flushes_and_same_mode_is_noop() {
        let mut c = compositor(10, 4);
        quad_at(&mut c, tex(1), 0.0);
        c.set_blend_mode(BlendMode::Normal);
        assert_eq!(c.pending_quads(), 1);
        c.set_blend_mode(BlendMode::Additive);
        assert_eq!(c.pending_quads(), 0);
        quad_at(&mut c, tex(1), 0.0);
        c.flush();
        let draws = c.gpu().draws();
        assert_eq!(draws[0].blend, BlendMode::Normal);
        assert_eq!(draws[1].blend, BlendMode::Additive);
        assert_eq!(c.stats().blend_switches, 1);
    }

    #[test]
    fn clear_does_not_touch_pending_quads() {
        let mut c = compositor(10, 4);
        quad_at(&mut c, tex(1), 0.0);
        c.clear_color(Color::BLACK);
        c.clear();
        assert_eq!(c.pending_quads(), 1);
        assert!(c.gpu().calls().contains(&GpuCall::ClearColor([0.0, 0.0, 0.0, 1.0])));
        assert_eq!(c.gpu().calls().last(), Some(&GpuCall::Clear));
    }

    // --- draw commands ---

    #[test]
    fn submit_primitive_modulates_and_restores_global_color() {
        let mut c = compositor(10, 4);
        c.set_color(Color::rgba(1.0, 1.0, 1.0, 0.5));
        c.submit(&DrawCommand::Primitive {
            mode: DrawMode::LineLoop,
            points: vec![Vec2::ZERO, Vec2::X, Vec2::ONE],
            color: Color::rgba(0.0, 1.0, 0.0, 1.0),
            transform: Transform2d::IDENTITY,
        })
        .unwrap();
        let uniform = c.primitive_shader().uniform(COLOR_UNIFORM).unwrap();
        assert_eq!(
            c.gpu().uniform_value(uniform),
            Some(&RecordedUniform::Vec4([0.0, 1.0, 0.0, 0.5]))
        );
        assert_eq!(c.color(), Color::rgba(1.0, 1.0, 1.0, 0.5));
    }

    #[test]
    fn submit_quad_matches_add_quad() {
        let mut c = compositor(10, 4);
        c.submit(&DrawCommand::Quad {
            texture: tex(3),
            transform: Transform2d::IDENTITY,
            dest: Rect::new(1.0, 2.0, 3.0, 4.0),
            uv: UvRect::FULL,
            tint: Color::WHITE,
        })
        .unwrap();
        assert_eq!(c.pending_quads(), 1);
        assert_eq!(&c.stream().written()[0..2], &[1.0, 2.0]);
    }

    // --- lifecycle ---

    #[test]
    fn reset_rebuilds_gpu_objects_after_context_loss() {
        let mut registry = TextureRegistry::new();
        let mut c = compositor(10, 4);
        let texture = registry.register(c.gpu_mut(), 2, 2, vec![255; 16]).unwrap();
        quad_at(&mut c, texture, 0.0);

        c.gpu_mut().lose_context();
        let restored = c.restore(&registry).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(c.pending_quads(), 0);
        assert!(c.gpu().has_texture(texture.id));
        assert_eq!(c.gpu().bound_indices(), quad_indices(10));

        quad_at(&mut c, texture, 0.0);
        c.flush();
        let draw = c.gpu().draws().last().unwrap();
        assert_eq!(draw.units[0], Some(texture.id));
        assert_eq!(draw.vertices.len(), FLOATS_PER_QUAD);
    }

    #[test]
    fn failed_reset_refuses_draws_until_a_reset_succeeds() {
        let mut c = compositor(10, 4);
        let old = c.quad_shader().program();
        c.gpu_mut().fail_next_link("attribute aVertex exceeds limits");
        assert!(c.reset().is_err());
        assert!(c.is_lost());

        let err = c
            .add_quad(
                &tex(1),
                &Transform2d::IDENTITY,
                Rect::new(0.0, 0.0, 1.0, 1.0),
                UvRect::FULL,
                Color::WHITE,
            )
            .unwrap_err();
        assert!(matches!(err, CompositorError::ContextLost));
        assert!(!err.is_per_object());
        c.draw_vertices(DrawMode::Lines, &[Vec2::ZERO, Vec2::ONE], 2, &Transform2d::IDENTITY);
        let primitive = DrawCommand::Primitive {
            mode: DrawMode::Points,
            points: vec![Vec2::ZERO],
            color: Color::WHITE,
            transform: Transform2d::IDENTITY,
        };
        assert!(matches!(c.submit(&primitive), Err(CompositorError::ContextLost)));
        c.flush();
        assert!(c.gpu().draws().is_empty());

        // the old objects are deleted once, not again on the retry
        c.reset().unwrap();
        assert!(!c.is_lost());
        assert_eq!(
            c.gpu()
                .calls_matching(|call| *call == GpuCall::DeleteProgram(old)),
            1
        );
        quad_at(&mut c, tex(1), 0.0);
        c.flush();
        assert_eq!(c.gpu().draws().len(), 1);
        assert_eq!(c.gpu().draws()[0].program, Some(c.quad_shader().program()));
    }

    #[test]
    fn check_refuses_unsupported_texture_without_queuing() {
        let gpu = HeadlessGpu::with_capabilities(GpuCapabilities {
            requires_power_of_two: true,
            ..GpuCapabilities::default()
        });
        let mut c = Compositor::new(gpu, CompositorConfig::default()).unwrap();
        let quad = |texture| DrawCommand::Quad {
            texture,
            transform: Transform2d::IDENTITY,
            dest: Rect::new(0.0, 0.0, 1.0, 1.0),
            uv: UvRect::FULL,
            tint: Color::WHITE,
        };
        assert!(c.check(&quad(tex(1))).is_ok());
        let err = c.check(&quad(Texture::new(TextureId(2), 100, 64))).unwrap_err();
        assert!(err.is_per_object());
        assert_eq!(c.pending_quads(), 0);
        assert_eq!(c.stats().rejected_quads, 1);
    }

    #[test]
    fn release_texture_flushes_batch_that_uses_it() {
        let mut registry = TextureRegistry::new();
        let mut c = compositor(10, 4);
        let texture = registry.register(c.gpu_mut(), 1, 1, vec![0; 4]).unwrap();
        quad_at(&mut c, texture, 0.0);
        assert!(c.release_texture(&mut registry, texture.id));
        assert_eq!(c.stats().flushes, 1);
        assert!(!c.gpu().has_texture(texture.id));
        assert!(registry.is_empty());
    }

    #[test]
    fn take_stats_resets_counters() {
        let mut c = compositor(10, 4);
        quad_at(&mut c, tex(1), 0.0);
        c.flush();
        let stats = c.take_stats();
        assert_eq!(stats.quads, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(*c.stats(), CompositorStats::default());

        let mut total = CompositorStats::default();
        total.accumulate(&stats);
        total.accumulate(&stats);
        assert_eq!(total.quads, 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_quad_is_drawn_once_with_its_own_texture(
                batch in 1usize..12,
                units in 1usize..5,
                ids in proptest::collection::vec(0u32..8, 0..80),
            ) {
                let mut c = compositor(batch, units);
                for (i, id) in ids.iter().enumerate() {
                    // x encodes the submission index, y the texture id
                    c.add_quad(
                        &tex(*id),
                        &Transform2d::IDENTITY,
                        Rect::new(i as f32, *id as f32, 1.0, 1.0),
                        UvRect::FULL,
                        Color::WHITE,
                    ).unwrap();
                }
                c.flush();

                let mut drawn = Vec::new();
                for draw in c.gpu().draws() {
                    prop_assert!(draw.count <= batch * INDICES_PER_QUAD);
                    for quad in draw.vertices.chunks(FLOATS_PER_QUAD) {
                        let unit = quad[6] as usize;
                        prop_assert!(unit < units);
                        prop_assert_eq!(draw.units[unit], Some(TextureId(quad[1] as u32)));
                        drawn.push(quad[0] as usize);
                    }
                }
                prop_assert_eq!(drawn, (0..ids.len()).collect::<Vec<_>>());
            }
        }
    }
}
