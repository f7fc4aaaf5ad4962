//! Drives one frame of drawables through a compositor.
//!
//! Per-object failures (a singular transform, an unsupported texture) skip
//! that object and the frame continues. Anything else aborts the frame.

use log::debug;
use serde::Serialize;
use spritebatch_core::{
    Compositor, CompositorError, CompositorStats, DrawCommand, Drawable, GpuContext, Rect,
};

use crate::camera::Camera2d;

/// What happened to the objects of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    /// Objects whose commands were all submitted.
    pub submitted: usize,
    /// Objects outside the camera's view.
    pub culled: usize,
    /// Objects dropped by a per-object error.
    pub skipped: usize,
    pub stats: CompositorStats,
}

impl FrameReport {
    /// Adds `other`'s counts and stats into `self`.
    pub fn accumulate(&mut self, other: &FrameReport) {
        self.submitted += other.submitted;
        self.culled += other.culled;
        self.skipped += other.skipped;
        self.stats.accumulate(&other.stats);
    }
}

/// Whether any part of `drawable` can land inside `view` (world space).
///
/// The view rectangle is mapped into the object's local space through the
/// inverse of its transform and tested against its local bounds.
///
/// # Errors
///
/// `SingularTransform` if the object's transform cannot be inverted.
pub fn is_visible<D: Drawable + ?Sized>(drawable: &D, view: &Rect) -> Result<bool, CompositorError> {
    let inverse = drawable.transform().inverse()?;
    let local_view = Rect::bounding(
        view.corners()
            .map(|c| inverse.transform_point(c.x, c.y)),
    )
    .unwrap_or_default();
    Ok(local_view.intersects(&drawable.local_bounds()))
}

/// Renders `drawables` in order as seen by `camera`, then flushes.
///
/// The quad shader is made current, the camera projection is set once,
/// and the framebuffer is cleared before anything is submitted. Every
/// command of an object is checked before the first is submitted, so a
/// skipped object leaves nothing behind in the batch. The returned stats
/// cover this frame only.
///
/// # Errors
///
/// `SingularTransform` when the camera itself cannot be inverted, and any
/// error that is not per-object.
pub fn render_frame<G: GpuContext, D: Drawable>(
    compositor: &mut Compositor<G>,
    camera: &Camera2d,
    drawables: &[D],
) -> Result<FrameReport, CompositorError> {
    let projection = camera.projection()?;
    let view = camera.visible_bounds();

    compositor.take_stats();
    let quad = compositor.quad_shader().clone();
    compositor.use_shader(&quad);
    compositor.set_projection(&projection);
    compositor.clear();

    let mut report = FrameReport::default();
    let mut commands: Vec<DrawCommand> = Vec::new();
    for (index, drawable) in drawables.iter().enumerate() {
        match is_visible(drawable, &view) {
            Ok(true) => {}
            Ok(false) => {
                report.culled += 1;
                continue;
            }
            Err(e) => {
                debug!("object {index} skipped: {e}");
                report.skipped += 1;
                continue;
            }
        }

        commands.clear();
        drawable.collect_draw_commands(&mut commands);
        match commands.iter().try_for_each(|c| compositor.check(c)) {
            Ok(()) => {}
            Err(e) if e.is_per_object() => {
                debug!("object {index} skipped: {e}");
                report.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        }
        for command in &commands {
            compositor.submit(command)?;
        }
        report.submitted += 1;
    }

    compositor.flush();
    report.stats = compositor.take_stats();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use crate::sprite::Sprite;
    use spritebatch_core::gpu::headless::HeadlessGpu;
    use spritebatch_core::{
        Color, CompositorConfig, GpuCapabilities, Texture, TextureId, Transform2d, UvRect, Vec2,
    };

    fn compositor() -> Compositor<HeadlessGpu> {
        Compositor::new(HeadlessGpu::new(), CompositorConfig::default()).unwrap()
    }

    fn sprite(id: u32, x: f32, y: f32) -> Sprite {
        Sprite::new(Texture::new(TextureId(id), 16, 16)).with_position(x, y)
    }

    #[test]
    fn visible_sprites_are_drawn_in_one_batch() {
        let mut c = compositor();
        let camera = Camera2d::new(320.0, 240.0);
        let sprites = vec![sprite(1, 10.0, 10.0), sprite(2, 50.0, 50.0), sprite(1, 90.0, 90.0)];
        let report = render_frame(&mut c, &camera, &sprites).unwrap();
        assert_eq!(report.submitted, 3);
        assert_eq!(report.stats.quads, 3);
        assert_eq!(report.stats.flushes, 1);
        assert_eq!(c.pending_quads(), 0);
    }

    #[test]
    fn offscreen_objects_are_culled() {
        let mut c = compositor();
        let camera = Camera2d::new(100.0, 100.0);
        let sprites = vec![sprite(1, 50.0, 50.0), sprite(1, 500.0, 50.0), sprite(1, -40.0, 50.0)];
        let report = render_frame(&mut c, &camera, &sprites).unwrap();
        assert_eq!(report.submitted, 1);
        assert_eq!(report.culled, 2);
        assert_eq!(report.stats.quads, 1);
    }

    #[test]
    fn sprite_overlapping_the_edge_is_kept() {
        let mut c = compositor();
        let camera = Camera2d::new(100.0, 100.0);
        // centered at x = 105, extends 8 px back into view
        let report = render_frame(&mut c, &camera, &[sprite(1, 105.0, 50.0)]).unwrap();
        assert_eq!(report.submitted, 1);
    }

    #[test]
    fn singular_and_unsupported_objects_are_skipped() {
        let gpu = HeadlessGpu::with_capabilities(GpuCapabilities {
            requires_power_of_two: true,
            ..GpuCapabilities::default()
        });
        let mut c = Compositor::new(gpu, CompositorConfig::default()).unwrap();
        let camera = Camera2d::new(100.0, 100.0);
        let npot = Sprite::new(Texture::new(TextureId(9), 12, 16)).with_position(50.0, 50.0);
        let sprites = vec![
            sprite(1, 20.0, 20.0),
            sprite(1, 30.0, 30.0).with_scale(0.0, 0.0),
            npot,
            sprite(1, 40.0, 40.0),
        ];
        let report = render_frame(&mut c, &camera, &sprites).unwrap();
        assert_eq!(report.submitted, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.stats.quads, 2);
        assert_eq!(report.stats.rejected_quads, 1);
    }

    /// Two quads side by side, each with its own texture.
    struct Pair(Texture, Texture);

    impl Drawable for Pair {
        fn transform(&self) -> Transform2d {
            Transform2d::IDENTITY
        }

        fn local_bounds(&self) -> Rect {
            Rect::new(0.0, 0.0, 32.0, 16.0)
        }

        fn collect_draw_commands(&self, out: &mut Vec<DrawCommand>) {
            for (i, texture) in [self.0, self.1].into_iter().enumerate() {
                out.push(DrawCommand::Quad {
                    texture,
                    transform: Transform2d::IDENTITY,
                    dest: Rect::new(i as f32 * 16.0, 0.0, 16.0, 16.0),
                    uv: UvRect::FULL,
                    tint: Color::WHITE,
                });
            }
        }
    }

    #[test]
    fn skipped_object_leaves_no_partial_commands() {
        let gpu = HeadlessGpu::with_capabilities(GpuCapabilities {
            requires_power_of_two: true,
            ..GpuCapabilities::default()
        });
        let mut c = Compositor::new(gpu, CompositorConfig::default()).unwrap();
        let camera = Camera2d::new(100.0, 100.0);
        let good = Texture::new(TextureId(1), 16, 16);
        let npot = Texture::new(TextureId(2), 12, 16);
        let report = render_frame(&mut c, &camera, &[Pair(good, npot)]).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.submitted, 0);
        assert_eq!(report.stats.quads, 0);
        assert!(c.gpu().draws().is_empty());
    }

    #[test]
    fn lost_compositor_fails_the_frame() {
        let mut c = compositor();
        c.gpu_mut().fail_next_link("out of memory");
        assert!(c.reset().is_err());
        let err = render_frame(&mut c, &Camera2d::new(100.0, 100.0), &[sprite(1, 50.0, 50.0)])
            .unwrap_err();
        assert!(matches!(err, CompositorError::ContextLost));
    }

    #[test]
    fn zero_zoom_camera_fails_the_frame() {
        let mut c = compositor();
        let mut camera = Camera2d::new(100.0, 100.0);
        camera.zoom = 0.0;
        let err = render_frame(&mut c, &camera, &[sprite(1, 0.0, 0.0)]).unwrap_err();
        assert!(matches!(err, CompositorError::SingularTransform { .. }));
    }

    #[test]
    fn shapes_split_quad_batches_in_paint_order() {
        let mut c = compositor();
        let camera = Camera2d::new(100.0, 100.0);
        let mut t = Transform2d::new();
        t.translate(10.0, 10.0);
        let line = Shape::line(Vec2::ZERO, Vec2::new(20.0, 0.0)).with_transform(t);
        let sprites = [sprite(1, 20.0, 20.0)];

        let first = render_frame(&mut c, &camera, &sprites).unwrap();
        let second = render_frame(&mut c, &camera, &[line]).unwrap();
        assert_eq!(first.stats.draw_calls, 1);
        assert_eq!(second.stats.draw_calls, 1);
        assert_eq!(second.stats.primitive_vertices, 2);

        let draws = c.gpu().draws();
        let last = draws.last().unwrap();
        assert!(!last.indexed);
    }

    #[test]
    fn frame_sets_camera_projection() {
        let mut c = compositor();
        let camera = Camera2d::new(640.0, 480.0);
        render_frame(&mut c, &camera, &[sprite(1, 1.0, 1.0)]).unwrap();
        assert_eq!(*c.projection(), camera.projection().unwrap());
    }

    #[test]
    fn reports_accumulate() {
        let mut total = FrameReport::default();
        let frame = FrameReport {
            submitted: 2,
            culled: 1,
            skipped: 0,
            stats: CompositorStats {
                quads: 2,
                ..CompositorStats::default()
            },
        };
        total.accumulate(&frame);
        total.accumulate(&frame);
        assert_eq!(total.submitted, 4);
        assert_eq!(total.culled, 2);
        assert_eq!(total.stats.quads, 4);
    }
}
