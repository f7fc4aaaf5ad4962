//! Untextured shapes drawn through the primitive path.
//!
//! Every shape becomes a single `DrawCommand::Primitive`, so it ends the
//! current quad batch when submitted.

use spritebatch_core::{Color, DrawCommand, DrawMode, Drawable, Rect, Transform2d, Vec2};

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Rect { rect: Rect, filled: bool },
    /// Outline or fan-filled polygon through `points` in order.
    Polygon { points: Vec<Vec2>, filled: bool },
    Line { from: Vec2, to: Vec2 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub color: Color,
    pub transform: Transform2d,
}

impl Shape {
    pub fn rect(rect: Rect, filled: bool) -> Self {
        Self::from_kind(ShapeKind::Rect { rect, filled })
    }

    pub fn polygon(points: Vec<Vec2>, filled: bool) -> Self {
        Self::from_kind(ShapeKind::Polygon { points, filled })
    }

    pub fn line(from: Vec2, to: Vec2) -> Self {
        Self::from_kind(ShapeKind::Line { from, to })
    }

    fn from_kind(kind: ShapeKind) -> Self {
        Self {
            kind,
            color: Color::WHITE,
            transform: Transform2d::IDENTITY,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_transform(mut self, transform: Transform2d) -> Self {
        self.transform = transform;
        self
    }

    /// Topology and points of the primitive this shape draws.
    pub fn geometry(&self) -> (DrawMode, Vec<Vec2>) {
        match &self.kind {
            ShapeKind::Rect { rect, filled: true } => (DrawMode::TriangleStrip, rect.corners().to_vec()),
            ShapeKind::Rect { rect, filled: false } => {
                let [tl, tr, bl, br] = rect.corners();
                (DrawMode::LineLoop, vec![tl, tr, br, bl])
            }
            ShapeKind::Polygon { points, filled } => {
                let mode = if *filled {
                    DrawMode::TriangleFan
                } else {
                    DrawMode::LineLoop
                };
                (mode, points.clone())
            }
            ShapeKind::Line { from, to } => (DrawMode::Lines, vec![*from, *to]),
        }
    }
}

impl Drawable for Shape {
    fn transform(&self) -> Transform2d {
        self.transform
    }

    fn local_bounds(&self) -> Rect {
        let (_, points) = self.geometry();
        Rect::bounding(points).unwrap_or_default()
    }

    fn collect_draw_commands(&self, out: &mut Vec<DrawCommand>) {
        let (mode, points) = self.geometry();
        if points.is_empty() {
            return;
        }
        out.push(DrawCommand::Primitive {
            mode,
            points,
            color: self.color,
            transform: self.transform,
        });
    }
}
