//! hopipe
//!
//! Reconstructs the manipulated object of one camera in a recorded
//! hand-object RGB-D sequence.
//!
//! Runs online tracking over every frame, refines the surface globally, and
//! post-processes the extracted mesh into
//! `<seq>/data_processing/bundlesdf/one_video/<serial>/mesh/`.

mod app;

use clap::Parser;
use std::path::PathBuf;

/// hopipe - one-video hand-object reconstruction
#[derive(Parser, Debug)]
#[command(name = "hopipe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sequence folder containing color/, depth/, mask/ and calibration/
    #[arg(long)]
    sequence_folder: PathBuf,

    /// Camera serial to reconstruct
    #[arg(long)]
    serial: String,

    /// Show the engine GUI (0 or 1)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    use_gui: u8,

    /// Log verbosity: 0 warn, 1 info, 2 debug, 3+ trace
    #[arg(long, default_value_t = 2)]
    debug_level: i64,

    /// Tracking config template
    #[arg(long, default_value = "configs/config_ho3d.yml")]
    tracking_template: PathBuf,

    /// Reconstruction config template
    #[arg(long, default_value = "configs/config.yml")]
    reconstruction_template: PathBuf,

    /// Command run for global refinement, split on whitespace; the staged
    /// config paths are appended
    #[arg(long)]
    engine_command: Option<String>,

    /// Enable the Tracy profiler layer
    #[cfg(feature = "tracy")]
    #[arg(long)]
    tracy: bool,
}

fn main() {
    let args = Args::parse();

    #[cfg(feature = "tracy")]
    let logging = app::LoggingConfig {
        enable_tracy: args.tracy,
        ..app::LoggingConfig::from_debug_level(args.debug_level)
    };
    #[cfg(not(feature = "tracy"))]
    let logging = app::LoggingConfig::from_debug_level(args.debug_level);

    let command = args
        .engine_command
        .as_deref()
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    let builder = app::AppBuilder::new(args.sequence_folder, args.serial)
        .with_gui(args.use_gui == 1)
        .with_debug_level(args.debug_level)
        .with_templates(args.tracking_template, args.reconstruction_template)
        .with_engine_command(command)
        .with_logging(logging);

    if let Err(e) = builder.run() {
        eprintln!("hopipe error: {}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
