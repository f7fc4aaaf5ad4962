#![deny(unsafe_code)]
//! CLI binary for the spritebatch compositor.
//!
//! Subcommands:
//! - `run <scene>`: render a demo scene for N frames on the headless GPU
//!   and report batching statistics
//! - `list`: print available scenes

mod error;
mod logging;

use clap::{Parser, Subcommand};
use error::CliError;
use logging::{init_logging, LoggingConfig};
use spritebatch_core::{Compositor, CompositorConfig, HeadlessGpu};
use spritebatch_scene::{FrameReport, Scene, SceneKind, SceneParams};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "spritebatch", about = "Quad batching compositor CLI")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Log batching decisions at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a scene for N frames and report batching statistics.
    Run {
        /// Scene name (see `list`).
        scene: String,

        /// Number of objects in the scene.
        #[arg(short, long, default_value_t = 1000)]
        count: usize,

        /// Number of frames to render.
        #[arg(short, long, default_value_t = 60)]
        frames: usize,

        /// PRNG seed for deterministic scenes.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Viewport width in pixels.
        #[arg(short = 'W', long, default_value_t = 800)]
        width: u32,

        /// Viewport height in pixels.
        #[arg(short = 'H', long, default_value_t = 600)]
        height: u32,

        /// Quads per batch (overrides the config file).
        #[arg(long)]
        max_batch_size: Option<usize>,

        /// Texture units per batch (overrides the config file).
        #[arg(long)]
        max_texture_units: Option<usize>,

        /// Compositor config as a JSON file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List available scenes.
    List,
}

/// Reads the config file if given, then applies flag overrides.
fn load_config(
    path: Option<&Path>,
    max_batch_size: Option<usize>,
    max_texture_units: Option<usize>,
) -> Result<CompositorConfig, CliError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CliError::Io(format!("cannot read {}: {e}", path.display())))?;
            CompositorConfig::from_json_str(&text)?
        }
        None => CompositorConfig::default(),
    };
    if let Some(size) = max_batch_size {
        config.max_batch_size = size;
    }
    if max_texture_units.is_some() {
        config.max_texture_units = max_texture_units;
    }
    config.validate()?;
    Ok(config)
}

/// Renders `frames` frames of the scene and sums the per-frame reports.
fn run_scene(
    name: &str,
    params: SceneParams,
    config: CompositorConfig,
    frames: usize,
) -> Result<FrameReport, CliError> {
    let mut gpu = HeadlessGpu::new();
    let mut scene = Scene::build(name, params, &mut gpu)?;
    let mut compositor = Compositor::new(gpu, config)?;
    compositor.resize(params.width, params.height);

    let mut total = FrameReport::default();
    for frame in 0..frames {
        scene.update(frame);
        let report = scene.render(&mut compositor)?;
        log::debug!(
            "frame {frame}: {} draw calls, {} quads",
            report.stats.draw_calls,
            report.stats.quads
        );
        total.accumulate(&report);
        // the recording GPU keeps every call otherwise
        compositor.gpu_mut().clear_calls();
    }
    Ok(total)
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::List => {
            let scenes = SceneKind::list();
            if cli.json {
                let info = serde_json::json!({ "scenes": scenes });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Scenes:");
                for name in scenes {
                    println!("  {name}");
                }
            }
        }
        Command::Run {
            scene,
            count,
            frames,
            seed,
            width,
            height,
            max_batch_size,
            max_texture_units,
            config,
        } => {
            let config = load_config(config.as_deref(), max_batch_size, max_texture_units)?;
            let params = SceneParams {
                count,
                seed,
                width,
                height,
            };
            let total = run_scene(&scene, params, config.clone(), frames)?;

            if cli.json {
                let info = serde_json::json!({
                    "scene": scene,
                    "params": params,
                    "frames": frames,
                    "config": config,
                    "totals": total,
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                let s = &total.stats;
                println!("{scene}: {count} objects, {frames} frames, seed {seed}");
                println!("  quads          {}", s.quads);
                println!("  draw calls     {}", s.draw_calls);
                println!("  flushes        {}", s.flushes);
                println!("  texture binds  {}", s.texture_binds);
                println!("  shader switches {}", s.shader_switches);
                println!("  primitive verts {}", s.primitive_vertices);
                println!("  transparent    {}", s.transparent_quads);
                println!(
                    "  objects        {} submitted, {} culled, {} skipped",
                    total.submitted, total.culled, total.skipped
                );
                if frames > 0 {
                    println!(
                        "  per frame      {:.1} draw calls",
                        s.draw_calls as f64 / frames as f64
                    );
                }
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(LoggingConfig::from_verbosity(cli.verbose));
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // --- config loading ---

    #[test]
    fn load_config_defaults_without_file() {
        let config = load_config(None, None, None).unwrap();
        assert_eq!(config, CompositorConfig::default());
    }

    #[test]
    fn flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_batch_size": 64, "max_texture_units": 4}}"#).unwrap();
        let config = load_config(Some(file.path()), Some(32), None).unwrap();
        assert_eq!(config.max_batch_size, 32);
        assert_eq!(config.max_texture_units, Some(4));
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("absent.json").as_path()), None, None).unwrap_err();
        assert_eq!(err.exit_code(), 11);
    }

    #[test]
    fn malformed_config_is_input_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"blend_mode": "overlay"}}"#).unwrap();
        let err = load_config(Some(file.path()), None, None).unwrap_err();
        assert_eq!(err.exit_code(), 12);
    }

    #[test]
    fn out_of_range_override_is_input_error() {
        let err = load_config(None, Some(0), None).unwrap_err();
        assert_eq!(err.exit_code(), 12);
    }

    // --- scene runs ---

    fn small(count: usize) -> SceneParams {
        SceneParams {
            count,
            seed: 1,
            width: 320,
            height: 240,
        }
    }

    #[test]
    fn run_scene_accumulates_frames() {
        let total = run_scene("grid", small(25), CompositorConfig::default(), 3).unwrap();
        assert_eq!(total.submitted, 75);
        assert_eq!(total.stats.quads, 75);
        assert_eq!(total.stats.draw_calls, 3);
    }

    #[test]
    fn small_batches_raise_draw_calls() {
        let config = CompositorConfig {
            max_batch_size: 10,
            ..CompositorConfig::default()
        };
        let total = run_scene("grid", small(25), config, 1).unwrap();
        assert_eq!(total.stats.draw_calls, 3);
    }

    #[test]
    fn unknown_scene_exits_10() {
        let err = run_scene("nope", small(1), CompositorConfig::default(), 1).unwrap_err();
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "spritebatch",
            "--json",
            "run",
            "atlas-churn",
            "--count",
            "10",
            "--max-texture-units",
            "2",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Run {
                scene,
                count,
                max_texture_units,
                ..
            } => {
                assert_eq!(scene, "atlas-churn");
                assert_eq!(count, 10);
                assert_eq!(max_texture_units, Some(2));
            }
            Command::List => panic!("expected run"),
        }
    }
}
