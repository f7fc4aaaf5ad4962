//! A 2D camera over a pixel viewport.

use spritebatch_core::{CompositorError, Rect, Transform2d, Vec2};

/// Looks at `position` (the world point shown at the viewport center),
/// magnified by `zoom` and turned by `rotation` radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2d {
    pub position: Vec2,
    pub zoom: f32,
    pub rotation: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl Camera2d {
    /// An unzoomed camera whose view matches the viewport pixels.
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            position: Vec2::new(viewport_width / 2.0, viewport_height / 2.0),
            zoom: 1.0,
            rotation: 0.0,
            viewport_width,
            viewport_height,
        }
    }

    /// Maps viewport pixels to world coordinates.
    pub fn transform(&self) -> Transform2d {
        let inv_zoom = self.zoom.recip();
        let mut t = Transform2d::new();
        t.translate(self.position.x, self.position.y)
            .rotate(self.rotation)
            .scale(inv_zoom, inv_zoom)
            .translate(-self.viewport_width / 2.0, -self.viewport_height / 2.0);
        t
    }

    /// Maps world coordinates to viewport pixels.
    ///
    /// # Errors
    ///
    /// `SingularTransform` when `zoom` is zero or not finite.
    pub fn view(&self) -> Result<Transform2d, CompositorError> {
        self.transform().inverse()
    }

    /// World-space bounds of what the viewport shows.
    pub fn visible_bounds(&self) -> Rect {
        let t = self.transform();
        let screen = Rect::new(0.0, 0.0, self.viewport_width, self.viewport_height);
        Rect::bounding(screen.corners().map(|c| t.transform_point(c.x, c.y))).unwrap_or_default()
    }

    /// Projection for a frame: pixels to clip space after the view.
    ///
    /// # Errors
    ///
    /// Same as [`Camera2d::view`].
    pub fn projection(&self) -> Result<Transform2d, CompositorError> {
        let view = self.view()?;
        let mut projection = Transform2d::orthographic(self.viewport_width, self.viewport_height);
        projection.multiply(&view);
        Ok(projection)
    }
}
