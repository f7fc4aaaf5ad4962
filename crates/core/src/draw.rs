//! Flat draw commands and the trait scene objects implement to emit them.
//!
//! A scene walks its objects, each appends [`DrawCommand`]s in paint order,
//! and the compositor consumes the list through `Compositor::submit`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::gpu::DrawMode;
use crate::texture::Texture;
use crate::transform::Transform2d;

/// An axis-aligned rectangle in local space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Corners in quad vertex order: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [Vec2; 4] {
        let (x0, y0) = (self.x, self.y);
        let (x1, y1) = (self.x + self.width, self.y + self.height);
        [
            Vec2::new(x0, y0),
            Vec2::new(x1, y0),
            Vec2::new(x0, y1),
            Vec2::new(x1, y1),
        ]
    }

    /// Smallest rectangle containing every point, or `None` for no points.
    pub fn bounding(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self::new(min.x, min.y, max.x - min.x, max.y - min.y))
    }

    /// Whether the two rectangles overlap or touch.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.x + other.width
            && other.x <= self.x + self.width
            && self.y <= other.y + other.height
            && other.y <= self.y + self.height
    }
}

/// A texture sub-region in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

impl UvRect {
    /// The whole texture.
    pub const FULL: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(u0: f32, v0: f32, u1: f32, v1: f32) -> Self {
        Self { u0, v0, u1, v1 }
    }

    /// Region of a `texture_width` x `texture_height` atlas given in pixels.
    pub fn from_pixels(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        texture_width: u32,
        texture_height: u32,
    ) -> Self {
        let tw = texture_width.max(1) as f32;
        let th = texture_height.max(1) as f32;
        Self::new(x / tw, y / th, (x + width) / tw, (y + height) / th)
    }

    pub fn flipped_x(self) -> Self {
        Self::new(self.u1, self.v0, self.u0, self.v1)
    }

    pub fn flipped_y(self) -> Self {
        Self::new(self.u0, self.v1, self.u1, self.v0)
    }

    /// UVs matching [`Rect::corners`] order.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.u0, self.v0),
            Vec2::new(self.u1, self.v0),
            Vec2::new(self.u0, self.v1),
            Vec2::new(self.u1, self.v1),
        ]
    }
}

/// One unit of work for the compositor, in paint order.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// A textured quad.
    Quad {
        texture: Texture,
        transform: Transform2d,
        dest: Rect,
        uv: UvRect,
        tint: Color,
    },
    /// Untextured geometry in a single color.
    Primitive {
        mode: DrawMode,
        points: Vec<Vec2>,
        color: Color,
        transform: Transform2d,
    },
}

/// Something that can be drawn by emitting draw commands.
pub trait Drawable {
    /// Local-to-world transform.
    fn transform(&self) -> Transform2d;

    /// Extent in local space, used for visibility culling.
    fn local_bounds(&self) -> Rect;

    /// Appends this object's commands to `out` in paint order.
    fn collect_draw_commands(&self, out: &mut Vec<DrawCommand>);
}
