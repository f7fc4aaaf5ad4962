//! Textured sprites.

use spritebatch_core::{Color, DrawCommand, Drawable, Rect, Texture, Transform2d, UvRect, Vec2};

/// A textured rectangle placed by position, rotation, and scale.
///
/// The anchor is the normalized point of the sprite that sits on
/// `position`; `(0.5, 0.5)` centers it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub texture: Texture,
    pub size: Vec2,
    pub anchor: Vec2,
    pub region: UvRect,
    pub tint: Color,
    pub flip_x: bool,
    pub flip_y: bool,
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Sprite {
    /// A centered sprite at the origin, sized to its texture.
    pub fn new(texture: Texture) -> Self {
        Self {
            texture,
            size: Vec2::new(texture.width as f32, texture.height as f32),
            anchor: Vec2::splat(0.5),
            region: UvRect::FULL,
            tint: Color::WHITE,
            flip_x: false,
            flip_y: false,
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Vec2::new(width, height);
        self
    }

    pub fn with_anchor(mut self, x: f32, y: f32) -> Self {
        self.anchor = Vec2::new(x, y);
        self
    }

    /// Samples only `region` of the texture.
    pub fn with_region(mut self, region: UvRect) -> Self {
        self.region = region;
        self
    }

    pub fn with_tint(mut self, tint: Color) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32) -> Self {
        self.scale = Vec2::new(x, y);
        self
    }

    pub fn flipped(mut self, x: bool, y: bool) -> Self {
        self.flip_x = x;
        self.flip_y = y;
        self
    }

    fn uv(&self) -> UvRect {
        let mut uv = self.region;
        if self.flip_x {
            uv = uv.flipped_x();
        }
        if self.flip_y {
            uv = uv.flipped_y();
        }
        uv
    }
}

impl Drawable for Sprite {
    fn transform(&self) -> Transform2d {
        let mut t = Transform2d::new();
        t.translate(self.position.x, self.position.y)
            .rotate(self.rotation)
            .scale(self.scale.x, self.scale.y);
        t
    }

    fn local_bounds(&self) -> Rect {
        Rect::new(
            -self.anchor.x * self.size.x,
            -self.anchor.y * self.size.y,
            self.size.x,
            self.size.y,
        )
    }

    fn collect_draw_commands(&self, out: &mut Vec<DrawCommand>) {
        out.push(DrawCommand::Quad {
            texture: self.texture,
            transform: self.transform(),
            dest: self.local_bounds(),
            uv: self.uv(),
            tint: self.tint,
        });
    }
}
