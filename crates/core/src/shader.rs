//! Shader sources, static schemas, and validated shader bindings.
//!
//! A [`ShaderSchema`] declares up front which attributes (via a
//! [`VertexLayout`]) and uniforms a program must expose, with their GLSL
//! types. [`ShaderBinding::new`] compiles the program and checks the
//! schema against the driver's reflection, so a mismatched shader fails
//! at load time instead of drawing garbage.

use log::debug;
use thiserror::Error;

use crate::gpu::{ActiveVariable, GpuContext, ProgramId, UniformId};
use crate::vertex::{VertexAttribute, VertexLayout, PRIMITIVE_LAYOUT, QUAD_LAYOUT};

pub const PROJECTION_UNIFORM: &str = "uProjectionMatrix";
pub const SAMPLER_UNIFORM: &str = "uSampler";
pub const COLOR_UNIFORM: &str = "uColor";

/// Errors that can occur while building a shader binding.
#[derive(Debug, Clone, Error)]
pub enum ShaderError {
    /// A shader stage failed to compile.
    #[error("shader compile error ({stage}):\n{log}")]
    CompileError {
        /// The shader stage that failed ("vertex" or "fragment").
        stage: String,
        /// Driver info log, prefixed with the numbered source.
        log: String,
    },
    /// A program failed to link.
    #[error("shader link error:\n{0}")]
    LinkError(String),
    /// A declared attribute or uniform has a different type in the program.
    #[error("shader schema mismatch for '{name}': expected {expected}, found {found}")]
    SchemaMismatch {
        name: String,
        expected: GlslType,
        found: GlslType,
    },
    /// A declared attribute is not active in the linked program.
    #[error("shader is missing attribute '{0}'")]
    MissingAttribute(String),
    /// A declared uniform is not active in the linked program.
    #[error("shader is missing uniform '{0}'")]
    MissingUniform(String),
}

/// GLSL types the compositor's schemas can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Mat3,
    Sampler2D,
}

impl GlslType {
    pub fn glsl_name(self) -> &'static str {
        match self {
            GlslType::Float => "float",
            GlslType::Vec2 => "vec2",
            GlslType::Vec3 => "vec3",
            GlslType::Vec4 => "vec4",
            GlslType::Int => "int",
            GlslType::Mat3 => "mat3",
            GlslType::Sampler2D => "sampler2D",
        }
    }

    pub fn from_glsl_name(name: &str) -> Option<Self> {
        match name {
            "float" => Some(GlslType::Float),
            "vec2" => Some(GlslType::Vec2),
            "vec3" => Some(GlslType::Vec3),
            "vec4" => Some(GlslType::Vec4),
            "int" => Some(GlslType::Int),
            "mat3" => Some(GlslType::Mat3),
            "sampler2D" => Some(GlslType::Sampler2D),
            _ => None,
        }
    }
}

impl std::fmt::Display for GlslType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// A uniform a schema requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSpec {
    pub name: &'static str,
    pub ty: GlslType,
}

/// The attributes and uniforms a program must expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderSchema {
    pub layout: &'static VertexLayout,
    pub uniforms: &'static [UniformSpec],
}

/// Schema for textured quad shaders.
pub const QUAD_SCHEMA: ShaderSchema = ShaderSchema {
    layout: &QUAD_LAYOUT,
    uniforms: &[
        UniformSpec {
            name: PROJECTION_UNIFORM,
            ty: GlslType::Mat3,
        },
        UniformSpec {
            name: SAMPLER_UNIFORM,
            ty: GlslType::Sampler2D,
        },
    ],
};

/// Schema for solid-color primitive shaders.
pub const PRIMITIVE_SCHEMA: ShaderSchema = ShaderSchema {
    layout: &PRIMITIVE_LAYOUT,
    uniforms: &[
        UniformSpec {
            name: PROJECTION_UNIFORM,
            ty: GlslType::Mat3,
        },
        UniformSpec {
            name: COLOR_UNIFORM,
            ty: GlslType::Vec4,
        },
    ],
};

/// A linked program whose interface matched its schema.
#[derive(Debug, Clone)]
pub struct ShaderBinding {
    program: ProgramId,
    schema: ShaderSchema,
    attributes: Vec<(&'static VertexAttribute, u32)>,
    uniforms: Vec<(&'static str, UniformId)>,
}

impl ShaderBinding {
    /// Compiles, links, and validates a program against `schema`.
    ///
    /// The program is deleted again if validation fails.
    ///
    /// # Errors
    ///
    /// Compile and link failures from the GPU, or `SchemaMismatch`,
    /// `MissingAttribute`, `MissingUniform` when the program's interface
    /// disagrees with the schema.
    pub fn new<G: GpuContext + ?Sized>(
        gpu: &mut G,
        vertex_src: &str,
        fragment_src: &str,
        schema: ShaderSchema,
    ) -> Result<Self, ShaderError> {
        let program = gpu.create_program(vertex_src, fragment_src)?;
        match Self::resolve(gpu, program, schema) {
            Ok(binding) => {
                debug!(
                    "shader {:?} bound: {} attributes, {} uniforms",
                    program,
                    binding.attributes.len(),
                    binding.uniforms.len()
                );
                Ok(binding)
            }
            Err(e) => {
                gpu.delete_program(program);
                Err(e)
            }
        }
    }

    fn resolve<G: GpuContext + ?Sized>(
        gpu: &mut G,
        program: ProgramId,
        schema: ShaderSchema,
    ) -> Result<Self, ShaderError> {
        let active_attributes = gpu.active_attributes(program);
        let mut attributes = Vec::with_capacity(schema.layout.attributes.len());
        for attr in schema.layout.attributes {
            check_type(&active_attributes, attr.name, attr.ty)
                .ok_or_else(|| ShaderError::MissingAttribute(attr.name.to_string()))??;
            let location = gpu
                .attribute_location(program, attr.name)
                .ok_or_else(|| ShaderError::MissingAttribute(attr.name.to_string()))?;
            attributes.push((attr, location));
        }

        let active_uniforms = gpu.active_uniforms(program);
        let mut uniforms = Vec::with_capacity(schema.uniforms.len());
        for spec in schema.uniforms {
            check_type(&active_uniforms, spec.name, spec.ty)
                .ok_or_else(|| ShaderError::MissingUniform(spec.name.to_string()))??;
            let location = gpu
                .uniform_location(program, spec.name)
                .ok_or_else(|| ShaderError::MissingUniform(spec.name.to_string()))?;
            uniforms.push((spec.name, location));
        }

        Ok(Self {
            program,
            schema,
            attributes,
            uniforms,
        })
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn schema(&self) -> ShaderSchema {
        self.schema
    }

    pub fn layout(&self) -> &'static VertexLayout {
        self.schema.layout
    }

    /// Resolved `(attribute, location)` pairs in layout order.
    pub fn attributes(&self) -> &[(&'static VertexAttribute, u32)] {
        &self.attributes
    }

    pub fn uniform(&self, name: &str) -> Option<UniformId> {
        self.uniforms
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, id)| *id)
    }

    /// Makes this program current and points its attributes at the
    /// vertex buffer currently bound.
    pub fn activate<G: GpuContext + ?Sized>(&self, gpu: &mut G) {
        gpu.use_program(self.program);
        let stride = self.schema.layout.stride_bytes();
        for (attr, location) in &self.attributes {
            gpu.vertex_attrib_pointer(
                *location,
                attr.components,
                stride,
                attr.offset * std::mem::size_of::<f32>(),
            );
        }
    }
}

/// `None` when `name` is not active, `Some(Err)` on a type mismatch.
fn check_type(
    active: &[ActiveVariable],
    name: &str,
    expected: GlslType,
) -> Option<Result<(), ShaderError>> {
    let found = active.iter().find(|v| v.name == name)?;
    if found.ty == expected {
        Some(Ok(()))
    } else {
        Some(Err(ShaderError::SchemaMismatch {
            name: name.to_string(),
            expected,
            found: found.ty,
        }))
    }
}

/// Formats a shader compilation error for human-readable debugging.
///
/// Prepends right-aligned line numbers to each line of `source`, then
/// appends the driver's error `log`.
pub fn format_shader_error(source: &str, log: &str) -> String {
    let width = source.lines().count().max(1).to_string().len();
    let numbered = source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}: {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    match (numbered.is_empty(), log.is_empty()) {
        (true, _) => log.to_string(),
        (false, true) => numbered,
        (false, false) => format!("{numbered}\n\n{log}"),
    }
}

// --- built-in sources ---

/// Vertex shader for textured quads.
pub const QUAD_VERTEX_SHADER: &str = "#version 300 es
precision highp float;

in vec2 aVertex;
in vec4 aColor;
in float aTexture;
in vec2 aRegion;

uniform mat3 uProjectionMatrix;

out vec4 vColor;
out float vTexture;
out vec2 vRegion;

void main() {
    gl_Position = vec4((uProjectionMatrix * vec3(aVertex, 1.0)).xy, 0.0, 1.0);
    vColor = vec4(aColor.rgb * aColor.a, aColor.a);
    vTexture = aTexture;
    vRegion = aRegion;
}
";

/// Fragment shader for textured quads sampling from `units` texture units.
///
/// Sampler arrays may only be indexed by constant expressions, so the unit
/// is selected through one branch per slot. Texels are expected to be
/// premultiplied already; see [`crate::texture::premultiply_rgba8`].
pub fn quad_fragment_shader(units: usize) -> String {
    let units = units.max(1);
    let mut src = format!(
        "#version 300 es
precision mediump float;

uniform sampler2D uSampler[{units}];

in vec4 vColor;
in float vTexture;
in vec2 vRegion;

out vec4 fragColor;

void main() {{
    int unit = int(vTexture + 0.5);
    vec4 texel;
"
    );
    for unit in 0..units {
        let branch = match unit {
            0 if units == 1 => "    ".to_string(),
            0 => format!("    if (unit == {unit}) "),
            u if u + 1 == units => "    else ".to_string(),
            _ => format!("    else if (unit == {unit}) "),
        };
        src.push_str(&format!(
            "{branch}{{ texel = texture(uSampler[{unit}], vRegion); }}\n"
        ));
    }
    src.push_str("    fragColor = texel * vColor;\n}\n");
    src
}

/// Vertex shader for solid-color primitives.
pub const PRIMITIVE_VERTEX_SHADER: &str = "#version 300 es
precision highp float;

in vec2 aVertex;

uniform mat3 uProjectionMatrix;

void main() {
    gl_Position = vec4((uProjectionMatrix * vec3(aVertex, 1.0)).xy, 0.0, 1.0);
}
";

/// Fragment shader for solid-color primitives.
pub const PRIMITIVE_FRAGMENT_SHADER: &str = "#version 300 es
precision mediump float;

uniform vec4 uColor;

out vec4 fragColor;

void main() {
    fragColor = vec4(uColor.rgb * uColor.a, uColor.a);
}
";
