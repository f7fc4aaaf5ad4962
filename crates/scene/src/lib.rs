#![deny(unsafe_code)]
//! The draw-command producer side of the spritebatch compositor.
//!
//! Sprites and shapes implement `Drawable`; [`frame::render_frame`] feeds
//! them to a `Compositor` in paint order behind a [`camera::Camera2d`];
//! [`registry::Scene`] builds named, seeded demo scenes for the CLI and
//! for benchmarks of batching behavior.

pub mod camera;
pub mod frame;
pub mod prng;
pub mod registry;
pub mod shape;
pub mod sprite;

pub use camera::Camera2d;
pub use frame::{render_frame, FrameReport};
pub use prng::Xorshift64;
pub use registry::{Scene, SceneError, SceneKind, SceneObject, SceneParams, SCENE_NAMES};
pub use shape::{Shape, ShapeKind};
pub use sprite::Sprite;
