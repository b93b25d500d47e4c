//! Staging of the tracking and reconstruction configs into the output tree.
//!
//! The online phase stages both configs once. Global refinement takes the
//! staged files as required inputs and re-reads them from disk, so it can run
//! as a separate process against an existing output directory.

use super::overrides::{self, DEPTH_FAR_KEY, ERODE_MASK_KEY};
use super::{ConfigDocument, ConfigError, Override};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tracking config file name inside the output directory.
pub const TRACKING_CONFIG_FILE: &str = "config_bundletrack.yml";
/// Online reconstruction config file name inside the output directory.
pub const RECONSTRUCTION_CONFIG_FILE: &str = "config_nerf.yml";
/// Global refinement config file name inside the experiment directory.
pub const GLOBAL_CONFIG_FILE: &str = "config.yml";

/// Tracking parameters, frozen once staged.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    document: ConfigDocument,
    depth_far: f64,
    erode_mask: u32,
    debug_dir: PathBuf,
}

impl TrackingConfig {
    /// Validate the typed fields the pipeline itself relies on.
    pub fn from_document(document: ConfigDocument) -> Result<Self, ConfigError> {
        let depth_far = document.f64_at(DEPTH_FAR_KEY)?;
        let erode_mask = document.u32_at(ERODE_MASK_KEY)?;
        let debug_dir = PathBuf::from(document.str_at("debug_dir")?);
        Ok(Self {
            document,
            depth_far,
            erode_mask,
            debug_dir,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_document(ConfigDocument::load(path)?)
    }

    /// File this config was loaded from or staged to.
    pub fn path(&self) -> &Path {
        self.document.source()
    }

    /// Far depth clip in scene units.
    pub fn depth_far(&self) -> f64 {
        self.depth_far
    }

    /// Side of the square erosion element applied to masks; 0 disables it.
    pub fn erode_mask(&self) -> u32 {
        self.erode_mask
    }

    pub fn debug_dir(&self) -> &Path {
        &self.debug_dir
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }
}

/// Implicit-surface fitting parameters, frozen once staged.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionConfig {
    document: ConfigDocument,
    far: f64,
    datadir: PathBuf,
}

impl ReconstructionConfig {
    pub fn from_document(document: ConfigDocument) -> Result<Self, ConfigError> {
        let far = document.f64_at("far")?;
        let datadir = PathBuf::from(document.str_at("datadir")?);
        Ok(Self {
            document,
            far,
            datadir,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_document(ConfigDocument::load(path)?)
    }

    pub fn path(&self) -> &Path {
        self.document.source()
    }

    pub fn far(&self) -> f64 {
        self.far
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }
}

/// Writes phase configs into one run's output directory.
#[derive(Debug, Clone)]
pub struct ConfigStager {
    out_dir: PathBuf,
}

impl ConfigStager {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Apply `overrides` to the template at `base_path` and write
    /// `config_bundletrack.yml`.
    pub fn stage_tracking_config(
        &self,
        base_path: impl AsRef<Path>,
        overrides: &[Override],
    ) -> Result<TrackingConfig, ConfigError> {
        let staged = ConfigDocument::load(base_path)?.with_overrides(overrides)?;
        let config = TrackingConfig::from_document(staged)?;
        let path = self.out_dir.join(TRACKING_CONFIG_FILE);
        info!(
            "Staged tracking config {} (zfar {}, erode_mask {})",
            path.display(),
            config.depth_far,
            config.erode_mask
        );
        Ok(TrackingConfig {
            document: config.document.write(&path)?,
            ..config
        })
    }

    /// Apply `overrides` plus `far = far_clip` to the template at `base_path`
    /// and write `config_nerf.yml`. `far_clip` should come from the staged
    /// tracking config so both phases agree on the valid depth range.
    pub fn stage_reconstruction_config(
        &self,
        base_path: impl AsRef<Path>,
        overrides: &[Override],
        far_clip: f64,
    ) -> Result<ReconstructionConfig, ConfigError> {
        let mut all = overrides.to_vec();
        all.push(Override::new("far", far_clip));

        let staged = ConfigDocument::load(base_path)?.with_overrides(&all)?;
        let config = ReconstructionConfig::from_document(staged)?;
        let path = self.out_dir.join(RECONSTRUCTION_CONFIG_FILE);
        info!(
            "Staged reconstruction config {} (far {}, datadir {})",
            path.display(),
            config.far,
            config.datadir.display()
        );
        Ok(ReconstructionConfig {
            document: config.document.write(&path)?,
            ..config
        })
    }
}

/// The staged files global refinement needs from the online phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalRefinementInputs {
    pub out_dir: PathBuf,
    pub tracking_config: PathBuf,
    pub reconstruction_config: PathBuf,
}

impl GlobalRefinementInputs {
    /// Inputs at their standard locations under `out_dir`.
    pub fn from_output_dir(out_dir: impl Into<PathBuf>) -> Self {
        let out_dir = out_dir.into();
        Self {
            tracking_config: out_dir.join(TRACKING_CONFIG_FILE),
            reconstruction_config: out_dir.join(RECONSTRUCTION_CONFIG_FILE),
            out_dir,
        }
    }

    /// Re-read both staged configs and derive the global refinement config,
    /// written to `<datadir>/config.yml`.
    ///
    /// The tracking config is only rewritten when its `debug_dir` no longer
    /// points at `out_dir`, e.g. after the output tree was moved.
    pub fn stage(&self) -> Result<(TrackingConfig, ReconstructionConfig), ConfigError> {
        let mut tracking = TrackingConfig::load(&self.tracking_config)?;
        if tracking.debug_dir() != self.out_dir {
            warn!(
                "Tracking debug_dir {} does not match {}, restaging",
                tracking.debug_dir().display(),
                self.out_dir.display()
            );
            let relocated = tracking.document().with_overrides(&[Override::new(
                "debug_dir",
                format!("{}/", self.out_dir.display()),
            )])?;
            tracking = TrackingConfig::from_document(relocated.write(&self.tracking_config)?)?;
        }

        let online = ReconstructionConfig::load(&self.reconstruction_config)?;
        let global = ReconstructionConfig::from_document(
            online
                .document()
                .with_overrides(&overrides::global_refinement_overrides(&self.out_dir))?,
        )?;

        std::fs::create_dir_all(global.datadir()).map_err(|source| ConfigError::Write {
            path: global.datadir().to_path_buf(),
            source,
        })?;
        let path = global.datadir().join(GLOBAL_CONFIG_FILE);
        info!("Staged global refinement config {}", path.display());
        let global = ReconstructionConfig {
            document: global.document.write(&path)?,
            ..global
        };

        Ok((tracking, global))
    }
}
