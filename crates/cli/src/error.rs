//! CLI errors and their exit codes.
//!
//! - 0:  success
//! - 2:  clap argument error (before our code runs)
//! - 10: compositor or scene failure
//! - 11: I/O error (reading the config file)
//! - 12: input error (bad config, bad scene parameters)
//! - 13: serialization error

use spritebatch_core::CompositorError;
use spritebatch_scene::SceneError;
use std::fmt;

/// Errors produced by CLI operations, each mapped to a distinct exit code.
#[derive(Debug)]
pub enum CliError {
    /// Compositor setup, frame rendering, or scene lookup failed (exit 10).
    Scene(SceneError),

    /// The config file could not be read (exit 11).
    Io(String),

    /// Bad config values or scene parameters (exit 12).
    Input(String),

    /// The report could not be serialized (exit 13).
    Serialization(String),
}

impl CliError {
    /// Maps this error to the process exit code listed in the module docs.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Scene(_) => 10,
            CliError::Io(_) => 11,
            CliError::Input(_) => 12,
            CliError::Serialization(_) => 13,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Scene(e) => write!(f, "{e}"),
            CliError::Io(msg) | CliError::Input(msg) | CliError::Serialization(msg) => {
                write!(f, "{msg}")
            }
        }
    }
}

impl From<SceneError> for CliError {
    fn from(e: SceneError) -> Self {
        match e {
            SceneError::InvalidParams(msg) => CliError::Input(msg),
            SceneError::Compositor(inner) => CliError::from(inner),
            other => CliError::Scene(other),
        }
    }
}

impl From<CompositorError> for CliError {
    fn from(e: CompositorError) -> Self {
        match e {
            CompositorError::InvalidConfig(msg) => CliError::Input(format!("invalid config: {msg}")),
            other => CliError::Scene(SceneError::Compositor(other)),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_scene_exit_code_is_10() {
        let err = CliError::from(SceneError::UnknownScene("foo".into()));
        assert_eq!(err.exit_code(), 10);
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn io_error_exit_code_is_11() {
        assert_eq!(CliError::Io("read failed".into()).exit_code(), 11);
    }

    #[test]
    fn invalid_params_route_to_input() {
        let err = CliError::from(SceneError::InvalidParams("0x0".into()));
        assert_eq!(err.exit_code(), 12);
    }

    #[test]
    fn invalid_config_routes_to_input() {
        let err = CliError::from(CompositorError::InvalidConfig("max_batch_size".into()));
        assert_eq!(err.exit_code(), 12);
        assert!(err.to_string().contains("max_batch_size"));
    }

    #[test]
    fn wrapped_invalid_config_also_routes_to_input() {
        let err = CliError::from(SceneError::Compositor(CompositorError::InvalidConfig(
            "x".into(),
        )));
        assert_eq!(err.exit_code(), 12);
    }

    #[test]
    fn other_compositor_errors_exit_10() {
        let err = CliError::from(CompositorError::SingularTransform { determinant: 0.0 });
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn serde_json_error_routes_to_serialization() {
        let bad = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        assert_eq!(CliError::from(bad).exit_code(), 13);
    }
}
