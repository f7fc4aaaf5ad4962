//! Named, seeded demo scenes.
//!
//! Each scene stresses a different batch boundary: `grid` a single
//! texture, `atlas-churn` texture-unit exhaustion, `mixed` the switch
//! between quads and primitives, `degenerate` objects that must be
//! skipped or culled without disturbing the rest of the frame.

use std::f32::consts::TAU;

use log::debug;
use serde::Serialize;
use serde_json::Value;
use spritebatch_core::config::{param_u64, param_usize};
use spritebatch_core::texture::checkerboard;
use spritebatch_core::{
    Color, Compositor, CompositorError, DrawCommand, Drawable, GpuContext, Rect, Texture,
    TextureRegistry, Transform2d, UvRect, Vec2,
};
use thiserror::Error;

use crate::camera::Camera2d;
use crate::frame::{render_frame, FrameReport};
use crate::prng::Xorshift64;
use crate::shape::Shape;
use crate::sprite::Sprite;

/// All scene names, in listing order.
pub const SCENE_NAMES: &[&str] = &["grid", "atlas-churn", "mixed", "degenerate"];

/// Textures cycled through by `atlas-churn`; more than any GPU has units.
const CHURN_TEXTURES: usize = 40;

/// Errors raised while building or running a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unknown scene: {0}")]
    UnknownScene(String),

    #[error("invalid scene parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Compositor(#[from] CompositorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneKind {
    Grid,
    AtlasChurn,
    Mixed,
    Degenerate,
}

impl SceneKind {
    /// Looks a scene up by its listed name.
    ///
    /// # Errors
    ///
    /// `UnknownScene` for anything not in [`SCENE_NAMES`].
    pub fn from_name(name: &str) -> Result<Self, SceneError> {
        match name {
            "grid" => Ok(SceneKind::Grid),
            "atlas-churn" => Ok(SceneKind::AtlasChurn),
            "mixed" => Ok(SceneKind::Mixed),
            "degenerate" => Ok(SceneKind::Degenerate),
            _ => Err(SceneError::UnknownScene(name.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SceneKind::Grid => "grid",
            SceneKind::AtlasChurn => "atlas-churn",
            SceneKind::Mixed => "mixed",
            SceneKind::Degenerate => "degenerate",
        }
    }

    pub fn list() -> &'static [&'static str] {
        SCENE_NAMES
    }
}

/// Size and seed of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SceneParams {
    /// Number of objects.
    pub count: usize,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            count: 1000,
            seed: 42,
            width: 800,
            height: 600,
        }
    }
}

impl SceneParams {
    /// Reads `count`, `seed`, `width`, `height`, keeping defaults for
    /// anything missing or mistyped.
    pub fn from_json(params: &Value) -> Self {
        let d = Self::default();
        Self {
            count: param_usize(params, "count", d.count),
            seed: param_u64(params, "seed", d.seed),
            width: u32::try_from(param_u64(params, "width", u64::from(d.width))).unwrap_or(d.width),
            height: u32::try_from(param_u64(params, "height", u64::from(d.height)))
                .unwrap_or(d.height),
        }
    }

    /// # Errors
    ///
    /// `InvalidParams` for a zero-sized viewport.
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.width == 0 || self.height == 0 {
            return Err(SceneError::InvalidParams(format!(
                "viewport must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// One object of a scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    Sprite(Sprite),
    Shape(Shape),
}

impl Drawable for SceneObject {
    fn transform(&self) -> Transform2d {
        match self {
            SceneObject::Sprite(s) => s.transform(),
            SceneObject::Shape(s) => s.transform(),
        }
    }

    fn local_bounds(&self) -> Rect {
        match self {
            SceneObject::Sprite(s) => s.local_bounds(),
            SceneObject::Shape(s) => s.local_bounds(),
        }
    }

    fn collect_draw_commands(&self, out: &mut Vec<DrawCommand>) {
        match self {
            SceneObject::Sprite(s) => s.collect_draw_commands(out),
            SceneObject::Shape(s) => s.collect_draw_commands(out),
        }
    }
}

/// A built scene: its textures, objects, and camera.
pub struct Scene {
    kind: SceneKind,
    params: SceneParams,
    camera: Camera2d,
    textures: TextureRegistry,
    palette: Vec<Texture>,
    objects: Vec<SceneObject>,
    rng: Xorshift64,
}

impl Scene {
    /// Builds scene `name`, uploading its textures to `gpu`.
    ///
    /// # Errors
    ///
    /// `UnknownScene`, `InvalidParams`, or a texture upload failure.
    pub fn build<G: GpuContext + ?Sized>(
        name: &str,
        params: SceneParams,
        gpu: &mut G,
    ) -> Result<Self, SceneError> {
        let kind = SceneKind::from_name(name)?;
        params.validate()?;

        let texture_count = match kind {
            SceneKind::Grid => 1,
            SceneKind::AtlasChurn => CHURN_TEXTURES,
            SceneKind::Mixed | SceneKind::Degenerate => 4,
        };
        let mut textures = TextureRegistry::new();
        let mut palette = Vec::with_capacity(texture_count);
        for i in 0..texture_count {
            let shade = (i * 37 % 256) as u8;
            let pixels = checkerboard(32, 32, 8, [255, shade, 64, 255], [shade, 32, 255, 255]);
            palette.push(textures.register(gpu, 32, 32, pixels)?);
        }

        let mut scene = Self {
            kind,
            params,
            camera: Camera2d::new(params.width as f32, params.height as f32),
            textures,
            palette,
            objects: Vec::with_capacity(params.count),
            rng: Xorshift64::new(params.seed),
        };
        scene.populate();
        debug!(
            "scene {} built: {} objects, {} textures",
            kind.name(),
            scene.objects.len(),
            scene.textures.len()
        );
        Ok(scene)
    }

    fn populate(&mut self) {
        let (w, h) = (self.params.width as f32, self.params.height as f32);
        let count = self.params.count;
        let columns = (count as f32).sqrt().ceil().max(1.0) as usize;
        let cell = Vec2::new(w / columns as f32, h / columns as f32);

        for i in 0..count {
            let grid_pos = Vec2::new(
                (i % columns) as f32 * cell.x + cell.x / 2.0,
                (i / columns) as f32 * cell.y + cell.y / 2.0,
            );
            let kind = self.kind;
            let object = match kind {
                SceneKind::Grid => SceneObject::Sprite(
                    Sprite::new(self.palette[0])
                        .with_size(cell.x * 0.8, cell.y * 0.8)
                        .with_position(grid_pos.x, grid_pos.y),
                ),
                SceneKind::AtlasChurn => {
                    let texture = self.palette[self.rng.index(self.palette.len())];
                    let size = self.rng.range(8.0, 24.0);
                    SceneObject::Sprite(
                        Sprite::new(texture)
                            .with_size(size, size)
                            .with_position(self.rng.range(0.0, w), self.rng.range(0.0, h))
                            .with_rotation(self.rng.range(0.0, TAU)),
                    )
                }
                SceneKind::Mixed if i % 4 == 3 => SceneObject::Shape(self.shape_at(i, grid_pos, cell)),
                SceneKind::Mixed => {
                    let texture = self.palette[i % self.palette.len()];
                    let region = UvRect::from_pixels(0.0, 0.0, 16.0, 16.0, texture.width, texture.height);
                    SceneObject::Sprite(
                        Sprite::new(texture)
                            .with_size(cell.x * 0.7, cell.y * 0.7)
                            .with_region(region)
                            .with_position(grid_pos.x, grid_pos.y)
                            .with_tint(Color::rgba(1.0, 1.0, 1.0, self.rng.range(0.5, 1.0))),
                    )
                }
                SceneKind::Degenerate => SceneObject::Sprite(self.degenerate_at(i, grid_pos, cell)),
            };
            self.objects.push(object);
        }
    }

    fn shape_at(&mut self, i: usize, pos: Vec2, cell: Vec2) -> Shape {
        let mut t = Transform2d::new();
        t.translate(pos.x, pos.y);
        let half = cell * 0.35;
        let color = Color::rgba(self.rng.next_f32(), self.rng.next_f32(), 1.0, 1.0);
        let shape = match (i / 4) % 3 {
            0 => Shape::rect(Rect::new(-half.x, -half.y, half.x * 2.0, half.y * 2.0), false),
            1 => Shape::polygon(
                vec![
                    Vec2::new(0.0, -half.y),
                    Vec2::new(half.x, half.y),
                    Vec2::new(-half.x, half.y),
                ],
                true,
            ),
            _ => Shape::line(Vec2::new(-half.x, 0.0), Vec2::new(half.x, 0.0)),
        };
        shape.with_color(color).with_transform(t)
    }

    fn degenerate_at(&mut self, i: usize, pos: Vec2, cell: Vec2) -> Sprite {
        let texture = self.palette[i % self.palette.len()];
        let sprite = Sprite::new(texture)
            .with_size(cell.x * 0.8, cell.y * 0.8)
            .with_position(pos.x, pos.y);
        match i % 5 {
            // collapses to a line: cannot be inverted
            0 => sprite.with_scale(0.0, 1.0),
            1 => sprite.with_tint(Color::TRANSPARENT),
            2 => sprite.with_position(
                -10.0 * self.params.width as f32,
                self.rng.range(0.0, self.params.height as f32),
            ),
            _ => sprite,
        }
    }

    /// Advances animation to `frame`.
    ///
    /// Grid sprites spin; `atlas-churn` reassigns a share of textures so
    /// the unit assignment changes every frame.
    pub fn update(&mut self, frame: usize) {
        let angle = frame as f32 * 0.05;
        match self.kind {
            SceneKind::Grid | SceneKind::Mixed => {
                for (i, object) in self.objects.iter_mut().enumerate() {
                    if let SceneObject::Sprite(sprite) = object {
                        sprite.rotation = angle + i as f32 * 0.01;
                    }
                }
            }
            SceneKind::AtlasChurn => {
                for object in &mut self.objects {
                    if let SceneObject::Sprite(sprite) = object {
                        if self.rng.chance(0.25) {
                            sprite.texture = self.palette[self.rng.index(self.palette.len())];
                        }
                        sprite.rotation += 0.02;
                    }
                }
            }
            SceneKind::Degenerate => {}
        }
    }

    /// Renders the current state as one frame.
    ///
    /// # Errors
    ///
    /// Errors from [`render_frame`].
    pub fn render<G: GpuContext>(
        &self,
        compositor: &mut Compositor<G>,
    ) -> Result<FrameReport, CompositorError> {
        render_frame(compositor, &self.camera, &self.objects)
    }

    pub fn kind(&self) -> SceneKind {
        self.kind
    }

    pub fn params(&self) -> &SceneParams {
        &self.params
    }

    pub fn camera(&self) -> &Camera2d {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2d {
        &mut self.camera
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }
}
