//! Application setup: logging and a builder that wires the reader, the
//! engine factory and the phase controller together.

use hopipe_capture::{FrameExportFactory, HoPipeReader, ReaderError};
use hopipe_recon::{PipelineError, RunOptions, RunOutcome, run_one_video};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to open sequence: {0}")]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl LoggingConfig {
    /// 0 warn, 1 info, 2 debug, 3 and above trace.
    pub fn from_debug_level(debug_level: i64) -> Self {
        let level = match debug_level {
            i64::MIN..=0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            level: level.to_string(),
            ..Self::default()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

/// Builder for configuring and running one reconstruction.
pub struct AppBuilder {
    sequence_folder: PathBuf,
    serial: String,
    use_gui: bool,
    debug_level: i64,
    tracking_template: PathBuf,
    reconstruction_template: PathBuf,
    engine_command: Vec<String>,
    logging: LoggingConfig,
}

impl AppBuilder {
    pub fn new(sequence_folder: impl Into<PathBuf>, serial: impl Into<String>) -> Self {
        Self {
            sequence_folder: sequence_folder.into(),
            serial: serial.into(),
            use_gui: true,
            debug_level: 2,
            tracking_template: PathBuf::from("configs/config_ho3d.yml"),
            reconstruction_template: PathBuf::from("configs/config.yml"),
            engine_command: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn with_gui(mut self, use_gui: bool) -> Self {
        self.use_gui = use_gui;
        self
    }

    /// Verbosity forwarded to the tracking engine.
    pub fn with_debug_level(mut self, level: i64) -> Self {
        self.debug_level = level;
        self
    }

    pub fn with_templates(mut self, tracking: impl Into<PathBuf>, reconstruction: impl Into<PathBuf>) -> Self {
        self.tracking_template = tracking.into();
        self.reconstruction_template = reconstruction.into();
        self
    }

    pub fn with_engine_command(mut self, command: Vec<String>) -> Self {
        self.engine_command = command;
        self
    }

    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    fn run_options(&self) -> RunOptions {
        RunOptions::new(&self.tracking_template, &self.reconstruction_template)
            .with_gui(self.use_gui)
            .with_debug_level(self.debug_level)
            .with_seed(0)
    }

    /// Run the reconstruction.
    pub fn run(self) -> Result<(), AppError> {
        self.init_logging();

        info!(
            "Reconstructing serial {} of {}",
            self.serial,
            self.sequence_folder.display()
        );
        let reader = HoPipeReader::open(&self.sequence_folder)?;
        let factory = FrameExportFactory::new().with_command(self.engine_command.clone());

        match run_one_video(&reader, &self.serial, &factory, self.run_options())? {
            RunOutcome::Skipped { mask_dir } => {
                println!("Mask folder {} does not exist, skip...", mask_dir.display());
            }
            RunOutcome::Completed {
                out_dir,
                frames,
                artifacts,
            } => {
                info!("Processed {} frames into {}", frames, out_dir.display());
                println!("{}", artifacts.smoothed.display());
            }
        }
        Ok(())
    }

    fn init_logging(&self) {
        #[cfg(feature = "tracy")]
        {
            if self.logging.enable_tracy {
                use tracing_subscriber::Layer;
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;
                tracing_subscriber::registry()
                    .with(tracing_tracy::TracyLayer::default())
                    .with(
                        tracing_subscriber::fmt::layer().with_filter(
                            tracing_subscriber::EnvFilter::try_from_default_env()
                                .unwrap_or_else(|_| self.logging.level.clone().into()),
                        ),
                    )
                    .init();
                return;
            }
        }

        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_level_mapping() {
        assert_eq!(LoggingConfig::from_debug_level(-1).level, "warn");
        assert_eq!(LoggingConfig::from_debug_level(0).level, "warn");
        assert_eq!(LoggingConfig::from_debug_level(1).level, "info");
        assert_eq!(LoggingConfig::from_debug_level(2).level, "debug");
        assert_eq!(LoggingConfig::from_debug_level(7).level, "trace");
    }

    #[test]
    fn test_run_options_follow_builder() {
        let options = AppBuilder::new("/seq", "cam0")
            .with_gui(false)
            .with_debug_level(3)
            .with_templates("t.yml", "r.yml")
            .run_options();
        assert!(!options.use_gui);
        assert_eq!(options.debug_level, 3);
        assert_eq!(options.tracking_template, PathBuf::from("t.yml"));
        assert_eq!(options.reconstruction_template, PathBuf::from("r.yml"));
    }
}
