//! `GpuContext` over a live `glow::Context`.
//!
//! glow hands out opaque object handles; this backend keeps them in maps
//! keyed by the crate's small `Copy` ids so the compositor never touches
//! GL types. A single vertex array object is created up front and stays
//! bound, so attribute pointers behave the same on WebGL2 and desktop GL.

use std::collections::HashMap;

use glow::HasContext;
use log::{debug, warn};

use crate::blend::{BlendFactor, BlendMode};
use crate::gpu::{
    ActiveVariable, BufferId, BufferTarget, BufferUsage, DrawMode, GpuCapabilities, GpuContext,
    ProgramId, UniformId, UniformValue,
};
use crate::shader::{format_shader_error, GlslType, ShaderError};
use crate::texture::TextureId;

/// Compiles a single shader stage.
///
/// # Errors
///
/// Returns `ShaderError::CompileError` with the numbered source and the
/// driver's info log.
#[allow(unsafe_code)]
pub fn compile_shader(
    gl: &glow::Context,
    shader_type: u32,
    source: &str,
) -> Result<glow::Shader, ShaderError> {
    let stage = match shader_type {
        glow::VERTEX_SHADER => "vertex",
        glow::FRAGMENT_SHADER => "fragment",
        _ => "unknown",
    };

    // SAFETY: glow wraps raw GL calls as unsafe. shader_type is a valid
    // stage constant and the shader is deleted on the failure path.
    unsafe {
        let shader = gl
            .create_shader(shader_type)
            .map_err(|log| ShaderError::CompileError {
                stage: stage.to_string(),
                log,
            })?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if gl.get_shader_compile_status(shader) {
            Ok(shader)
        } else {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            Err(ShaderError::CompileError {
                stage: stage.to_string(),
                log: format_shader_error(source, &log),
            })
        }
    }
}

/// Compiles both stages and links them. Stage objects are released
/// whether or not linking succeeds.
///
/// # Errors
///
/// `CompileError` for either stage, or `LinkError` with the program log.
#[allow(unsafe_code)]
pub fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program, ShaderError> {
    let vertex = compile_shader(gl, glow::VERTEX_SHADER, vertex_src)?;
    let fragment = match compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src) {
        Ok(f) => f,
        Err(e) => {
            // SAFETY: vertex is a live handle from compile_shader.
            unsafe { gl.delete_shader(vertex) };
            return Err(e);
        }
    };

    // SAFETY: both stage handles are live. The program keeps its own copy
    // of the linked code, so detaching and deleting the stages is sound.
    let result = unsafe {
        match gl.create_program() {
            Ok(program) => {
                gl.attach_shader(program, vertex);
                gl.attach_shader(program, fragment);
                gl.link_program(program);
                gl.detach_shader(program, vertex);
                gl.detach_shader(program, fragment);
                if gl.get_program_link_status(program) {
                    Ok(program)
                } else {
                    let log = gl.get_program_info_log(program);
                    gl.delete_program(program);
                    Err(ShaderError::LinkError(log))
                }
            }
            Err(log) => Err(ShaderError::LinkError(log)),
        }
    };
    // SAFETY: see above.
    unsafe {
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);
    }
    result
}

/// Maps a GL type enum to the shader types the compositor checks.
pub fn glsl_type_from_gl(gl_type: u32) -> Option<GlslType> {
    match gl_type {
        glow::FLOAT => Some(GlslType::Float),
        glow::FLOAT_VEC2 => Some(GlslType::Vec2),
        glow::FLOAT_VEC3 => Some(GlslType::Vec3),
        glow::FLOAT_VEC4 => Some(GlslType::Vec4),
        glow::INT => Some(GlslType::Int),
        glow::FLOAT_MAT3 => Some(GlslType::Mat3),
        glow::SAMPLER_2D => Some(GlslType::Sampler2D),
        _ => None,
    }
}

pub fn draw_mode_to_gl(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Points => glow::POINTS,
        DrawMode::Lines => glow::LINES,
        DrawMode::LineStrip => glow::LINE_STRIP,
        DrawMode::LineLoop => glow::LINE_LOOP,
        DrawMode::Triangles => glow::TRIANGLES,
        DrawMode::TriangleStrip => glow::TRIANGLE_STRIP,
        DrawMode::TriangleFan => glow::TRIANGLE_FAN,
    }
}

pub fn blend_factor_to_gl(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::One => glow::ONE,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => glow::DST_COLOR,
    }
}

fn buffer_target_to_gl(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Vertex => glow::ARRAY_BUFFER,
        BufferTarget::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn buffer_usage_to_gl(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::Static => glow::STATIC_DRAW,
        BufferUsage::Stream => glow::STREAM_DRAW,
    }
}

/// Reflection reports arrays as `name[0]`.
fn strip_array_suffix(name: &str) -> &str {
    name.strip_suffix("[0]").unwrap_or(name)
}

fn clamp_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Uniform locations keyed by program and name.
///
/// Asking twice for the same uniform returns the same id, and deleting a
/// program drops its entries.
struct UniformTable<L> {
    ids: HashMap<(ProgramId, String), UniformId>,
    locations: HashMap<UniformId, L>,
    next: u32,
}

impl<L> UniformTable<L> {
    fn new() -> Self {
        Self {
            ids: HashMap::new(),
            locations: HashMap::new(),
            next: 1,
        }
    }

    fn resolve(
        &mut self,
        program: ProgramId,
        name: &str,
        locate: impl FnOnce() -> Option<L>,
    ) -> Option<UniformId> {
        if let Some(id) = self.ids.get(&(program, name.to_owned())) {
            return Some(*id);
        }
        let location = locate()?;
        let id = UniformId(self.next);
        self.next += 1;
        self.ids.insert((program, name.to_owned()), id);
        self.locations.insert(id, location);
        Some(id)
    }

    fn location(&self, id: UniformId) -> Option<&L> {
        self.locations.get(&id)
    }

    fn remove_program(&mut self, program: ProgramId) {
        let locations = &mut self.locations;
        self.ids.retain(|(owner, _), id| {
            if *owner == program {
                locations.remove(id);
                false
            } else {
                true
            }
        });
    }

    fn len(&self) -> usize {
        self.locations.len()
    }
}

/// A live WebGL2 / OpenGL ES 3 context.
pub struct GlowGpu {
    gl: glow::Context,
    vertex_array: Option<glow::VertexArray>,
    programs: HashMap<ProgramId, glow::Program>,
    buffers: HashMap<BufferId, glow::Buffer>,
    uniforms: UniformTable<glow::UniformLocation>,
    textures: HashMap<TextureId, glow::Texture>,
    units: Vec<Option<TextureId>>,
    active_unit: usize,
    next_program: u32,
    next_buffer: u32,
}

impl GlowGpu {
    /// Wraps `gl`, creating the shared vertex array object.
    ///
    /// # Errors
    ///
    /// Returns the driver message if the vertex array cannot be created.
    #[allow(unsafe_code)]
    pub fn new(gl: glow::Context) -> Result<Self, String> {
        // SAFETY: creating and binding a VAO on a live context.
        let vertex_array = unsafe {
            let vao = gl.create_vertex_array()?;
            gl.bind_vertex_array(Some(vao));
            gl.enable(glow::BLEND);
            vao
        };
        let version = gl.version();
        debug!(
            "GL {}.{} (embedded: {}) {}",
            version.major, version.minor, version.is_embedded, version.vendor_info
        );

        let mut gpu = Self {
            gl,
            vertex_array: Some(vertex_array),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            uniforms: UniformTable::new(),
            textures: HashMap::new(),
            units: Vec::new(),
            active_unit: 0,
            next_program: 1,
            next_buffer: 1,
        };
        gpu.units = vec![None; gpu.capabilities().max_texture_units];
        Ok(gpu)
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Releases every object this backend created and returns the context.
    #[allow(unsafe_code)]
    pub fn into_gl(mut self) -> glow::Context {
        // SAFETY: every handle below was created on this context and is
        // dropped from the maps as it is deleted.
        unsafe {
            for (_, program) in self.programs.drain() {
                self.gl.delete_program(program);
            }
            for (_, buffer) in self.buffers.drain() {
                self.gl.delete_buffer(buffer);
            }
            for (_, texture) in self.textures.drain() {
                self.gl.delete_texture(texture);
            }
            if let Some(vao) = self.vertex_array.take() {
                self.gl.bind_vertex_array(None);
                self.gl.delete_vertex_array(vao);
            }
        }
        self.gl
    }

    #[allow(unsafe_code)]
    fn select_unit(&mut self, unit: usize) {
        if self.active_unit != unit {
            // SAFETY: unit is below the reported unit count.
            unsafe {
                self.gl
                    .active_texture(glow::TEXTURE0 + u32::try_from(unit).unwrap_or(0));
            }
            self.active_unit = unit;
        }
    }
}

impl GpuContext for GlowGpu {
    #[allow(unsafe_code)]
    fn capabilities(&self) -> GpuCapabilities {
        // SAFETY: plain integer queries on a live context.
        let (units, size) = unsafe {
            (
                self.gl.get_parameter_i32(glow::MAX_TEXTURE_IMAGE_UNITS),
                self.gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE),
            )
        };
        let version = self.gl.version();
        GpuCapabilities {
            max_texture_units: usize::try_from(units).unwrap_or(1).max(1),
            max_texture_size: u32::try_from(size).unwrap_or(0),
            requires_power_of_two: version.is_embedded && version.major < 3,
        }
    }

    // --- programs ---

    fn create_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramId, ShaderError> {
        let program = compile_program(&self.gl, vertex_src, fragment_src)?;
        let id = ProgramId(self.next_program);
        self.next_program += 1;
        self.programs.insert(id, program);
        Ok(id)
    }

    #[allow(unsafe_code)]
    fn delete_program(&mut self, program: ProgramId) {
        self.uniforms.remove_program(program);
        if let Some(handle) = self.programs.remove(&program) {
            // SAFETY: handle was created on this context.
            unsafe { self.gl.delete_program(handle) };
        }
    }

    #[allow(unsafe_code)]
    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveVariable> {
        let Some(&handle) = self.programs.get(&program) else {
            return Vec::new();
        };
        // SAFETY: reflection queries on a linked program.
        unsafe {
            (0..self.gl.get_active_attributes(handle))
                .filter_map(|i| self.gl.get_active_attribute(handle, i))
                .filter_map(|a| {
                    Some(ActiveVariable {
                        name: strip_array_suffix(&a.name).to_string(),
                        ty: glsl_type_from_gl(a.atype)?,
                        size: usize::try_from(a.size).unwrap_or(1),
                    })
                })
                .collect()
        }
    }

    #[allow(unsafe_code)]
    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveVariable> {
        let Some(&handle) = self.programs.get(&program) else {
            return Vec::new();
        };
        // SAFETY: reflection queries on a linked program.
        unsafe {
            (0..self.gl.get_active_uniforms(handle))
                .filter_map(|i| self.gl.get_active_uniform(handle, i))
                .filter_map(|u| {
                    Some(ActiveVariable {
                        name: strip_array_suffix(&u.name).to_string(),
                        ty: glsl_type_from_gl(u.utype)?,
                        size: usize::try_from(u.size).unwrap_or(1),
                    })
                })
                .collect()
        }
    }

    #[allow(unsafe_code)]
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        let handle = *self.programs.get(&program)?;
        // SAFETY: location query on a linked program.
        unsafe { self.gl.get_attrib_location(handle, name) }
    }

    #[allow(unsafe_code)]
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformId> {
        let handle = *self.programs.get(&program)?;
        let gl = &self.gl;
        // SAFETY: location query on a linked program.
        self.uniforms.resolve(program, name, || unsafe {
            gl.get_uniform_location(handle, name)
        })
    }

    #[allow(unsafe_code)]
    fn use_program(&mut self, program: ProgramId) {
        let handle = self.programs.get(&program).copied();
        if handle.is_none() {
            warn!("use_program on unknown {program:?}");
        }
        // SAFETY: handle is None or a live program.
        unsafe { self.gl.use_program(handle) };
    }

    #[allow(unsafe_code)]
    fn set_uniform(&mut self, uniform: UniformId, value: UniformValue<'_>) {
        let location = self.uniforms.location(uniform);
        // SAFETY: the location belongs to the program in use; a missing
        // location is a no-op in GL.
        unsafe {
            match value {
                UniformValue::Mat3(m) => self.gl.uniform_matrix_3_f32_slice(location, false, m),
                UniformValue::Vec4([r, g, b, a]) => self.gl.uniform_4_f32(location, r, g, b, a),
                UniformValue::Int(i) => self.gl.uniform_1_i32(location, i),
                UniformValue::IntArray(values) => self.gl.uniform_1_i32_slice(location, values),
            }
        }
    }

    // --- buffers ---

    #[allow(unsafe_code)]
    fn create_buffer(&mut self, target: BufferTarget) -> Result<BufferId, String> {
        // SAFETY: buffer creation on a live context.
        let buffer = unsafe { self.gl.create_buffer()? };
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(id, buffer);
        self.bind_buffer(target, id);
        Ok(id)
    }

    #[allow(unsafe_code)]
    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        let handle = self.buffers.get(&buffer).copied();
        // SAFETY: handle is None or a live buffer.
        unsafe { self.gl.bind_buffer(buffer_target_to_gl(target), handle) };
    }

    #[allow(unsafe_code)]
    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(handle) = self.buffers.remove(&buffer) {
            // SAFETY: handle was created on this context.
            unsafe { self.gl.delete_buffer(handle) };
        }
    }

    #[allow(unsafe_code)]
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        // SAFETY: writes into the buffer bound to target.
        unsafe {
            self.gl.buffer_data_u8_slice(
                buffer_target_to_gl(target),
                data,
                buffer_usage_to_gl(usage),
            );
        }
    }

    #[allow(unsafe_code)]
    fn buffer_storage(&mut self, target: BufferTarget, size: usize, usage: BufferUsage) {
        // SAFETY: allocates storage for the buffer bound to target.
        unsafe {
            self.gl.buffer_data_size(
                buffer_target_to_gl(target),
                clamp_i32(size),
                buffer_usage_to_gl(usage),
            );
        }
    }

    #[allow(unsafe_code)]
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        // SAFETY: the compositor sized the store for a full batch.
        unsafe {
            self.gl
                .buffer_sub_data_u8_slice(buffer_target_to_gl(target), clamp_i32(offset), data);
        }
    }

    #[allow(unsafe_code)]
    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        components: usize,
        stride: usize,
        offset: usize,
    ) {
        // SAFETY: describes float data in the bound ARRAY_BUFFER.
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                location,
                clamp_i32(components),
                glow::FLOAT,
                false,
                clamp_i32(stride),
                clamp_i32(offset),
            );
            self.gl.enable_vertex_attrib_array(location);
        }
    }

    #[allow(unsafe_code)]
    fn disable_vertex_attrib(&mut self, location: u32) {
        // SAFETY: location came from a program on this context.
        unsafe { self.gl.disable_vertex_attrib_array(location) };
    }

    // --- textures ---

    #[allow(unsafe_code)]
    fn upload_texture(
        &mut self,
        id: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), String> {
        let w = i32::try_from(width).map_err(|e| e.to_string())?;
        let h = i32::try_from(height).map_err(|e| e.to_string())?;
        if let Some(old) = self.textures.remove(&id) {
            // SAFETY: old was created on this context.
            unsafe { self.gl.delete_texture(old) };
        }
        let restore = self
            .units
            .get(self.active_unit)
            .copied()
            .flatten()
            .and_then(|t| self.textures.get(&t).copied());

        // SAFETY: uploads width * height RGBA8 texels, which the registry
        // has checked against rgba.len(). The previous binding on the
        // active unit is put back afterwards.
        let texture = unsafe {
            let texture = self.gl.create_texture()?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            for (param, value) in [
                (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
                (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
                (glow::TEXTURE_MIN_FILTER, glow::LINEAR),
                (glow::TEXTURE_MAG_FILTER, glow::LINEAR),
            ] {
                self.gl.tex_parameter_i32(glow::TEXTURE_2D, param, value as i32);
            }
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                w,
                h,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(rgba)),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, restore);
            texture
        };
        self.textures.insert(id, texture);
        Ok(())
    }

    #[allow(unsafe_code)]
    fn delete_texture(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.remove(&id) {
            // SAFETY: texture was created on this context.
            unsafe { self.gl.delete_texture(texture) };
        }
        for unit in self.units.iter_mut().filter(|u| **u == Some(id)) {
            *unit = None;
        }
    }

    #[allow(unsafe_code)]
    fn bind_texture(&mut self, unit: usize, id: TextureId) {
        self.select_unit(unit);
        let handle = self.textures.get(&id).copied();
        if handle.is_none() {
            warn!("binding texture {id} that was never uploaded");
        }
        // SAFETY: handle is None or a live texture.
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, handle) };
        if let Some(slot) = self.units.get_mut(unit) {
            *slot = Some(id);
        }
    }

    // --- drawing and framebuffer state ---

    #[allow(unsafe_code)]
    fn draw_elements(&mut self, mode: DrawMode, count: usize) {
        // SAFETY: the bound index buffer holds at least count u16 indices.
        unsafe {
            self.gl
                .draw_elements(draw_mode_to_gl(mode), clamp_i32(count), glow::UNSIGNED_SHORT, 0);
        }
    }

    #[allow(unsafe_code)]
    fn draw_arrays(&mut self, mode: DrawMode, first: usize, count: usize) {
        // SAFETY: the bound vertex buffer holds first + count vertices.
        unsafe {
            self.gl
                .draw_arrays(draw_mode_to_gl(mode), clamp_i32(first), clamp_i32(count));
        }
    }

    #[allow(unsafe_code)]
    fn set_blend_mode(&mut self, mode: BlendMode) {
        let (src, dst) = mode.factors();
        // SAFETY: fixed-function state change.
        unsafe {
            self.gl
                .blend_func(blend_factor_to_gl(src), blend_factor_to_gl(dst));
        }
    }

    #[allow(unsafe_code)]
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        // SAFETY: fixed-function state change.
        unsafe { self.gl.viewport(x, y, width, height) };
    }

    #[allow(unsafe_code)]
    fn clear_color(&mut self, [r, g, b, a]: [f32; 4]) {
        // SAFETY: fixed-function state change.
        unsafe { self.gl.clear_color(r, g, b, a) };
    }

    #[allow(unsafe_code)]
    fn clear(&mut self) {
        // SAFETY: clears the bound framebuffer.
        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::BLEND_MODES;

    #[test]
    fn glow_gpu_exposes_expected_api() {
        fn _assert_api(gpu: GlowGpu) {
            let _gl: &glow::Context = gpu.gl();
            let _ctx: &dyn GpuContext = &gpu;
            let _raw: glow::Context = gpu.into_gl();
        }
    }

    #[test]
    fn gl_types_map_to_glsl_types() {
        assert_eq!(glsl_type_from_gl(glow::FLOAT_MAT3), Some(GlslType::Mat3));
        assert_eq!(glsl_type_from_gl(glow::SAMPLER_2D), Some(GlslType::Sampler2D));
        assert_eq!(glsl_type_from_gl(glow::FLOAT), Some(GlslType::Float));
        assert_eq!(glsl_type_from_gl(glow::SAMPLER_CUBE), None);
    }

    #[test]
    fn array_uniform_names_lose_their_index() {
        assert_eq!(strip_array_suffix("uSampler[0]"), "uSampler");
        assert_eq!(strip_array_suffix("uColor"), "uColor");
    }

    #[test]
    fn every_blend_mode_maps_to_gl_factors() {
        for mode in BLEND_MODES {
            let (src, dst) = mode.factors();
            assert_ne!(blend_factor_to_gl(src), 0, "{mode}");
            assert_ne!(blend_factor_to_gl(dst), 0, "{mode}");
        }
        assert_eq!(
            blend_factor_to_gl(BlendMode::Normal.factors().1),
            glow::ONE_MINUS_SRC_ALPHA
        );
    }

    #[test]
    fn draw_modes_map_to_gl_primitives() {
        assert_eq!(draw_mode_to_gl(DrawMode::Triangles), glow::TRIANGLES);
        assert_eq!(draw_mode_to_gl(DrawMode::LineLoop), glow::LINE_LOOP);
        assert_eq!(draw_mode_to_gl(DrawMode::TriangleFan), glow::TRIANGLE_FAN);
    }

    // --- uniform table ---

    #[test]
    fn uniform_ids_are_reused_per_program_and_name() {
        let mut table = UniformTable::new();
        let a = table.resolve(ProgramId(1), "uColor", || Some(10));
        assert_eq!(table.resolve(ProgramId(1), "uColor", || Some(11)), a);
        let b = table.resolve(ProgramId(2), "uColor", || Some(20));
        assert_ne!(a, b);
        assert_eq!(table.resolve(ProgramId(1), "uMissing", || None), None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.location(a.unwrap()), Some(&10));
    }

    #[test]
    fn deleting_a_program_drops_its_uniforms() {
        let mut table = UniformTable::new();
        // repeated rebuilds, as after each context restore
        for program in 1..=5 {
            let id = table.resolve(ProgramId(program), "uProjectionMatrix", || Some(program));
            table.resolve(ProgramId(program), "uProjectionMatrix", || Some(program));
            table.remove_program(ProgramId(program));
            assert_eq!(table.location(id.unwrap()), None);
        }
        assert_eq!(table.len(), 0);
        assert!(table.ids.is_empty());
    }

    #[test]
    #[ignore = "requires GL context"]
    fn compositor_draws_through_glow() {
        // Would test: a Compositor<GlowGpu> flushes one batch per texture
        // group against a real WebGL2 context.
    }

    #[test]
    #[ignore = "requires GL context"]
    fn upload_texture_preserves_unit_binding() {
        // Would test: the texture bound on the active unit is unchanged
        // after upload_texture.
    }
}
