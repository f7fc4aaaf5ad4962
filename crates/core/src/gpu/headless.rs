//! A GPU context that records calls instead of rendering.
//!
//! `HeadlessGpu` keeps enough state to behave like a driver from the
//! compositor's point of view: buffers hold their bytes, texture units
//! remember what is bound, and programs are "reflected" by scanning their
//! `in` / `uniform` declarations. Every draw snapshots the geometry and
//! unit bindings it would have used, which is what tests and the CLI's
//! statistics inspect.

use std::collections::HashMap;

use crate::blend::BlendMode;
use crate::gpu::{
    ActiveVariable, BufferId, BufferTarget, BufferUsage, DrawMode, GpuCapabilities, GpuContext,
    ProgramId, UniformId, UniformValue,
};
use crate::shader::{format_shader_error, GlslType, ShaderError};
use crate::texture::TextureId;

/// An owned copy of a uniform value.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Mat3([f32; 9]),
    Vec4([f32; 4]),
    Int(i32),
    IntArray(Vec<i32>),
}

impl From<UniformValue<'_>> for RecordedUniform {
    fn from(value: UniformValue<'_>) -> Self {
        match value {
            UniformValue::Mat3(m) => RecordedUniform::Mat3(*m),
            UniformValue::Vec4(v) => RecordedUniform::Vec4(v),
            UniformValue::Int(i) => RecordedUniform::Int(i),
            UniformValue::IntArray(a) => RecordedUniform::IntArray(a.to_vec()),
        }
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(ProgramId),
    SetUniform {
        uniform: UniformId,
        value: RecordedUniform,
    },
    CreateBuffer {
        target: BufferTarget,
        buffer: BufferId,
    },
    BindBuffer {
        target: BufferTarget,
        buffer: BufferId,
    },
    DeleteBuffer(BufferId),
    BufferData {
        target: BufferTarget,
        len: usize,
        usage: BufferUsage,
    },
    BufferStorage {
        target: BufferTarget,
        size: usize,
        usage: BufferUsage,
    },
    BufferSubData {
        target: BufferTarget,
        offset: usize,
        len: usize,
    },
    VertexAttribPointer {
        location: u32,
        components: usize,
        stride: usize,
        offset: usize,
    },
    DisableVertexAttrib(u32),
    UploadTexture {
        id: TextureId,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureId),
    BindTexture {
        unit: usize,
        texture: TextureId,
    },
    DrawElements {
        mode: DrawMode,
        count: usize,
    },
    DrawArrays {
        mode: DrawMode,
        first: usize,
        count: usize,
    },
    SetBlendMode(BlendMode),
    Viewport {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    ClearColor([f32; 4]),
    Clear,
}

/// What a single draw call would have rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub mode: DrawMode,
    pub program: Option<ProgramId>,
    /// Element count for indexed draws, vertex count otherwise.
    pub count: usize,
    pub indexed: bool,
    /// The vertex floats the draw consumed, in stream order.
    pub vertices: Vec<f32>,
    /// Texture bound on each unit at draw time.
    pub units: Vec<Option<TextureId>>,
    pub blend: BlendMode,
}

#[derive(Debug, Clone)]
struct HeadlessProgram {
    attributes: Vec<ActiveVariable>,
    uniforms: Vec<(ActiveVariable, UniformId)>,
}

/// A recording, state-tracking stand-in for a GL context.
#[derive(Debug)]
pub struct HeadlessGpu {
    caps: GpuCapabilities,
    calls: Vec<GpuCall>,
    draws: Vec<DrawRecord>,
    programs: HashMap<ProgramId, HeadlessProgram>,
    current_program: Option<ProgramId>,
    uniform_values: HashMap<UniformId, RecordedUniform>,
    buffers: HashMap<BufferId, Vec<u8>>,
    bound_vertex: Option<BufferId>,
    bound_index: Option<BufferId>,
    vertex_stride: usize,
    textures: HashMap<TextureId, (u32, u32)>,
    units: Vec<Option<TextureId>>,
    blend: BlendMode,
    next_program: u32,
    next_buffer: u32,
    next_uniform: u32,
    link_failure: Option<String>,
}

impl Default for HeadlessGpu {
    fn default() -> Self {
        Self::with_capabilities(GpuCapabilities::default())
    }
}

impl HeadlessGpu {
    /// A context with the WebGL2 minimum capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(caps: GpuCapabilities) -> Self {
        Self {
            caps,
            calls: Vec::new(),
            draws: Vec::new(),
            programs: HashMap::new(),
            current_program: None,
            uniform_values: HashMap::new(),
            buffers: HashMap::new(),
            bound_vertex: None,
            bound_index: None,
            vertex_stride: 0,
            textures: HashMap::new(),
            units: vec![None; caps.max_texture_units],
            blend: BlendMode::Normal,
            next_program: 1,
            next_buffer: 1,
            next_uniform: 1,
            link_failure: None,
        }
    }

    /// Makes the next `create_program` fail to link with `log`.
    pub fn fail_next_link(&mut self, log: impl Into<String>) {
        self.link_failure = Some(log.into());
    }

    /// Drops every GPU-side object, as a lost context would.
    ///
    /// Recorded calls and draws are kept.
    pub fn lose_context(&mut self) {
        self.programs.clear();
        self.current_program = None;
        self.uniform_values.clear();
        self.buffers.clear();
        self.bound_vertex = None;
        self.bound_index = None;
        self.textures.clear();
        self.units.iter_mut().for_each(|u| *u = None);
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    /// Number of recorded calls for which `pred` holds.
    pub fn calls_matching(&self, pred: impl Fn(&GpuCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
        self.draws.clear();
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn has_texture(&self, id: TextureId) -> bool {
        self.textures.contains_key(&id)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Texture currently bound on `unit`.
    pub fn bound_texture(&self, unit: usize) -> Option<TextureId> {
        self.units.get(unit).copied().flatten()
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    /// Last value set for `uniform`.
    pub fn uniform_value(&self, uniform: UniformId) -> Option<&RecordedUniform> {
        self.uniform_values.get(&uniform)
    }

    /// Contents of the index buffer currently bound, as u16.
    pub fn bound_indices(&self) -> Vec<u16> {
        self.bound_index
            .and_then(|b| self.buffers.get(&b))
            .map(|bytes| bytemuck::pod_collect_to_vec(bytes.as_slice()))
            .unwrap_or_default()
    }

    fn record(&mut self, call: GpuCall) {
        self.calls.push(call);
    }

    fn bound(&self, target: BufferTarget) -> Option<BufferId> {
        match target {
            BufferTarget::Vertex => self.bound_vertex,
            BufferTarget::Index => self.bound_index,
        }
    }

    fn bound_store(&mut self, target: BufferTarget) -> Option<&mut Vec<u8>> {
        let buffer = self.bound(target)?;
        self.buffers.get_mut(&buffer)
    }

    fn snapshot_vertices(&self, float_count: usize) -> Vec<f32> {
        let bytes = self
            .bound_vertex
            .and_then(|b| self.buffers.get(&b))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let len = (float_count * 4).min(bytes.len() - bytes.len() % 4);
        bytemuck::pod_collect_to_vec(&bytes[..len])
    }

    fn push_draw(&mut self, mode: DrawMode, count: usize, indexed: bool, vertices: Vec<f32>) {
        self.draws.push(DrawRecord {
            mode,
            program: self.current_program,
            count,
            indexed,
            vertices,
            units: self.units.clone(),
            blend: self.blend,
        });
    }
}

/// Scans declarations of the form `<qualifier> <type> <name>[<n>];`.
fn declarations(source: &str, qualifier: &str) -> Vec<ActiveVariable> {
    source
        .lines()
        .filter_map(|line| {
            let mut tokens = line.trim().trim_end_matches(';').split_whitespace();
            if tokens.next()? != qualifier {
                return None;
            }
            let ty = GlslType::from_glsl_name(tokens.next()?)?;
            let declared = tokens.next()?;
            let (name, size) = match declared.split_once('[') {
                Some((name, rest)) => (name, rest.trim_end_matches(']').parse().ok()?),
                None => (declared, 1),
            };
            Some(ActiveVariable {
                name: name.to_string(),
                ty,
                size,
            })
        })
        .collect()
}

fn check_entry_point(stage: &str, source: &str) -> Result<(), ShaderError> {
    if source.contains("void main") {
        Ok(())
    } else {
        Err(ShaderError::CompileError {
            stage: stage.to_string(),
            log: format_shader_error(source, "ERROR: 0:0: 'main' : missing entry point"),
        })
    }
}

impl GpuContext for HeadlessGpu {
    fn capabilities(&self) -> GpuCapabilities {
        self.caps
    }

    fn create_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramId, ShaderError> {
        check_entry_point("vertex", vertex_src)?;
        check_entry_point("fragment", fragment_src)?;
        if let Some(log) = self.link_failure.take() {
            return Err(ShaderError::LinkError(log));
        }

        let program = ProgramId(self.next_program);
        self.next_program += 1;

        let mut uniforms: Vec<(ActiveVariable, UniformId)> = Vec::new();
        for var in declarations(vertex_src, "uniform")
            .into_iter()
            .chain(declarations(fragment_src, "uniform"))
        {
            if uniforms.iter().any(|(u, _)| u.name == var.name) {
                continue;
            }
            uniforms.push((var, UniformId(self.next_uniform)));
            self.next_uniform += 1;
        }
        self.programs.insert(
            program,
            HeadlessProgram {
                attributes: declarations(vertex_src, "in"),
                uniforms,
            },
        );
        self.record(GpuCall::CreateProgram(program));
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.record(GpuCall::DeleteProgram(program));
    }

    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveVariable> {
        self.programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveVariable> {
        self.programs
            .get(&program)
            .map(|p| p.uniforms.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default()
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        let position = self
            .programs
            .get(&program)?
            .attributes
            .iter()
            .position(|a| a.name == name)?;
        u32::try_from(position).ok()
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformId> {
        self.programs
            .get(&program)?
            .uniforms
            .iter()
            .find(|(v, _)| v.name == name)
            .map(|(_, id)| *id)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
        self.record(GpuCall::UseProgram(program));
    }

    fn set_uniform(&mut self, uniform: UniformId, value: UniformValue<'_>) {
        let value = RecordedUniform::from(value);
        self.uniform_values.insert(uniform, value.clone());
        self.record(GpuCall::SetUniform { uniform, value });
    }

    fn create_buffer(&mut self, target: BufferTarget) -> Result<BufferId, String> {
        let buffer = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(buffer, Vec::new());
        self.record(GpuCall::CreateBuffer { target, buffer });
        self.bind_buffer(target, buffer);
        Ok(buffer)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        match target {
            BufferTarget::Vertex => self.bound_vertex = Some(buffer),
            BufferTarget::Index => self.bound_index = Some(buffer),
        }
        self.record(GpuCall::BindBuffer { target, buffer });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        if self.bound_vertex == Some(buffer) {
            self.bound_vertex = None;
        }
        if self.bound_index == Some(buffer) {
            self.bound_index = None;
        }
        self.record(GpuCall::DeleteBuffer(buffer));
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        if let Some(store) = self.bound_store(target) {
            *store = data.to_vec();
        }
        self.record(GpuCall::BufferData {
            target,
            len: data.len(),
            usage,
        });
    }

    fn buffer_storage(&mut self, target: BufferTarget, size: usize, usage: BufferUsage) {
        if let Some(store) = self.bound_store(target) {
            *store = vec![0; size];
        }
        self.record(GpuCall::BufferStorage {
            target,
            size,
            usage,
        });
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        if let Some(store) = self.bound_store(target) {
            let end = offset + data.len();
            if store.len() < end {
                store.resize(end, 0);
            }
            store[offset..end].copy_from_slice(data);
        }
        self.record(GpuCall::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
    }

    fn vertex_attrib_pointer(&mut self, location: u32, components: usize, stride: usize, offset: usize) {
        self.vertex_stride = stride;
        self.record(GpuCall::VertexAttribPointer {
            location,
            components,
            stride,
            offset,
        });
    }

    fn disable_vertex_attrib(&mut self, location: u32) {
        self.record(GpuCall::DisableVertexAttrib(location));
    }

    fn upload_texture(&mut self, id: TextureId, width: u32, height: u32, _rgba: &[u8]) -> Result<(), String> {
        self.textures.insert(id, (width, height));
        self.record(GpuCall::UploadTexture { id, width, height });
        Ok(())
    }

    fn delete_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
        for unit in self.units.iter_mut().filter(|u| **u == Some(id)) {
            *unit = None;
        }
        self.record(GpuCall::DeleteTexture(id));
    }

    fn bind_texture(&mut self, unit: usize, texture: TextureId) {
        if let Some(slot) = self.units.get_mut(unit) {
            *slot = Some(texture);
        }
        self.record(GpuCall::BindTexture { unit, texture });
    }

    fn draw_elements(&mut self, mode: DrawMode, count: usize) {
        let floats_per_vertex = self.vertex_stride / 4;
        let vertices = self.snapshot_vertices(count / 6 * 4 * floats_per_vertex);
        self.push_draw(mode, count, true, vertices);
        self.record(GpuCall::DrawElements { mode, count });
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: usize, count: usize) {
        let floats_per_vertex = self.vertex_stride / 4;
        let all = self.snapshot_vertices((first + count) * floats_per_vertex);
        let vertices = all.get(first * floats_per_vertex..).unwrap_or_default().to_vec();
        self.push_draw(mode, count, false, vertices);
        self.record(GpuCall::DrawArrays { mode, first, count });
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
        self.record(GpuCall::SetBlendMode(mode));
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GpuCall::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.record(GpuCall::ClearColor(rgba));
    }

    fn clear(&mut self) {
        self.record(GpuCall::Clear);
    }
}
