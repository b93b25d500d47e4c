//! YAML config documents with strict, ordered key-path overrides.

use super::ConfigError;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single `dotted.key.path = value` override.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub key: String,
    pub value: Value,
}

impl Override {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A parsed YAML mapping together with the file it came from.
///
/// Documents are never edited in place: [`ConfigDocument::with_overrides`]
/// returns a new document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    source: PathBuf,
    root: Mapping,
}

impl ConfigDocument {
    /// Read and parse a YAML file whose top level is a mapping.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse YAML text; `source` is only used in error messages.
    pub fn parse(text: &str, source: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let source = source.into();
        let value: Value = serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
            path: source.clone(),
            source: e,
        })?;
        match value {
            Value::Mapping(root) => Ok(Self { source, root }),
            _ => Err(ConfigError::NotAMapping { path: source }),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Look up a dotted key path.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        parts.try_fold(self.root.get(first)?, |node, part| node.as_mapping()?.get(part))
    }

    /// Apply overrides in order. Every key path must already exist; a missing
    /// key fails the whole call and no document is produced.
    pub fn with_overrides(&self, overrides: &[Override]) -> Result<Self, ConfigError> {
        let mut root = self.root.clone();
        for o in overrides {
            let slot = lookup_mut(&mut root, &o.key).ok_or_else(|| ConfigError::MissingKey {
                key: o.key.clone(),
                path: self.source.clone(),
            })?;
            debug!(key = %o.key, "override {:?} -> {:?}", slot, o.value);
            *slot = o.value.clone();
        }
        Ok(Self {
            source: self.source.clone(),
            root,
        })
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    /// Serialize to `path`, replacing any previous file, and rebind the
    /// document to that path.
    pub fn write(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = self.to_yaml()?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            source: path.to_path_buf(),
            root: self.root,
        })
    }

    pub(crate) fn f64_at(&self, key: &str) -> Result<f64, ConfigError> {
        self.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.invalid(key, "a number"))
    }

    pub(crate) fn u32_at(&self, key: &str) -> Result<u32, ConfigError> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| self.invalid(key, "a non-negative integer"))
    }

    pub(crate) fn str_at(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid(key, "a string"))
    }

    fn invalid(&self, key: &str, expected: &'static str) -> ConfigError {
        ConfigError::InvalidValue {
            key: key.to_string(),
            path: self.source.clone(),
            expected,
        }
    }
}

fn lookup_mut<'a>(root: &'a mut Mapping, key: &str) -> Option<&'a mut Value> {
    let mut parts = key.split('.');
    let first = parts.next()?;
    parts.try_fold(root.get_mut(first)?, |node, part| node.as_mapping_mut()?.get_mut(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\
SPDLOG: 1
erode_mask: 0
depth_processing:
  zfar: 1.0
  percentile: 90
";

    fn doc() -> ConfigDocument {
        ConfigDocument::parse(TEMPLATE, "template.yml").unwrap()
    }

    #[test]
    fn test_get_nested() {
        let d = doc();
        assert_eq!(d.get("depth_processing.percentile"), Some(&Value::from(90)));
        assert!(d.get("depth_processing.missing").is_none());
        assert!(d.get("erode_mask.nested").is_none());
    }

    #[test]
    fn test_overrides_apply_in_order() {
        let d = doc()
            .with_overrides(&[
                Override::new("erode_mask", 3),
                Override::new("depth_processing.zfar", 2),
                Override::new("erode_mask", 5),
            ])
            .unwrap();
        assert_eq!(d.u32_at("erode_mask").unwrap(), 5);
        assert_eq!(d.f64_at("depth_processing.zfar").unwrap(), 2.0);
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let err = doc()
            .with_overrides(&[Override::new("ransac.inlier_dist", 0.01)])
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { ref key, .. } if key == "ransac.inlier_dist"));
    }

    #[test]
    fn test_overrides_leave_original_untouched() {
        let d = doc();
        let _ = d.with_overrides(&[Override::new("SPDLOG", 4)]).unwrap();
        assert_eq!(d.get("SPDLOG"), Some(&Value::from(1)));
    }

    #[test]
    fn test_non_mapping_rejected() {
        assert!(matches!(
            ConfigDocument::parse("- 1\n- 2\n", "list.yml"),
            Err(ConfigError::NotAMapping { .. })
        ));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        assert!(matches!(
            ConfigDocument::parse("a: [1, 2\n", "bad.yml"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_typed_accessor_rejects_wrong_type() {
        assert!(matches!(
            doc().str_at("erode_mask"),
            Err(ConfigError::InvalidValue { expected: "a string", .. })
        ));
    }
}
