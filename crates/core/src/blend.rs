//! Blend modes the compositor can switch between.
//!
//! Every mode maps to a fixed-function `blendFunc` pair. The quad and
//! primitive shaders emit premultiplied color, so the source factor is
//! `One` rather than `SrcAlpha`.

use serde::{Deserialize, Serialize};

/// A fixed-function blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    One,
    OneMinusSrcAlpha,
    OneMinusSrcColor,
    DstColor,
}

/// How a batch is composited onto the framebuffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

/// Every blend mode, in declaration order.
pub const BLEND_MODES: &[BlendMode] = &[
    BlendMode::Normal,
    BlendMode::Additive,
    BlendMode::Multiply,
    BlendMode::Screen,
];

impl BlendMode {
    /// The `(source, destination)` factors for this mode.
    pub fn factors(self) -> (BlendFactor, BlendFactor) {
        match self {
            BlendMode::Normal => (BlendFactor::One, BlendFactor::OneMinusSrcAlpha),
            BlendMode::Additive => (BlendFactor::One, BlendFactor::One),
            BlendMode::Multiply => (BlendFactor::DstColor, BlendFactor::OneMinusSrcAlpha),
            BlendMode::Screen => (BlendFactor::One, BlendFactor::OneMinusSrcColor),
        }
    }

    /// Parses a snake_case mode name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "normal" => Some(BlendMode::Normal),
            "additive" => Some(BlendMode::Additive),
            "multiply" => Some(BlendMode::Multiply),
            "screen" => Some(BlendMode::Screen),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Additive => "additive",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
        }
    }
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
