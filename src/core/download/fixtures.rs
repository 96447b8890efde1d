//! Local files standing in for photo downloads (non-production only).

use crate::config::RunCapabilities;
use crate::error::{FixtureError, Result, ValidationError};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Extensions tried, in order, for `{photo_id}.{ext}`
pub const FIXTURE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A directory of `{photo_id}.{jpg,jpeg,png}` files
#[derive(Debug, Clone)]
pub struct FixtureSource {
    dir: PathBuf,
    strict: bool,
}

impl FixtureSource {
    pub fn new(dir: impl Into<PathBuf>, strict: bool) -> Self {
        Self {
            dir: dir.into(),
            strict,
        }
    }

    /// The run's fixture directory, if fixture bytes are enabled for it
    pub fn for_run(capabilities: &RunCapabilities) -> Option<Self> {
        capabilities
            .fixture_bytes_dir
            .as_ref()
            .map(|dir| Self::new(dir, capabilities.fixture_bytes_strict))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up fixture bytes for a photo.
    ///
    /// `Ok(None)` means "fall through to the network", which strict mode
    /// never allows.
    pub fn load(&self, photo_id: &str) -> Result<Option<Vec<u8>>> {
        if is_path_like(photo_id) {
            return Err(ValidationError::PathLikeId.into());
        }

        for extension in FIXTURE_EXTENSIONS {
            let candidate = self.dir.join(format!("{photo_id}.{extension}"));
            if candidate.is_file() {
                let bytes = fs::read(&candidate).map_err(|source| FixtureError::Io {
                    photo_id: photo_id.to_string(),
                    source,
                })?;
                return Ok(Some(bytes));
            }
        }

        if self.strict {
            return Err(FixtureError::Missing {
                photo_id: photo_id.to_string(),
            }
            .into());
        }
        Ok(None)
    }
}

/// Ids that could escape the fixture directory
pub fn is_path_like(photo_id: &str) -> bool {
    if photo_id.is_empty() || photo_id.contains('/') || photo_id.contains('\\') {
        return true;
    }
    let mut components = Path::new(photo_id).components();
    !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == photo_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use tempfile::tempdir;

    #[test]
    fn path_like_ids() {
        for id in ["../etc/passwd", "a/b", "a\\b", "..", ".", ""] {
            assert!(is_path_like(id), "{id:?} should be path-like");
        }
        for id in ["photo-1", "AF1Qip_abc", "img.2024"] {
            assert!(!is_path_like(id), "{id:?} should be accepted");
        }
    }

    #[test]
    fn loads_first_matching_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("p1.png"), b"png-bytes").unwrap();
        let source = FixtureSource::new(dir.path(), true);

        assert_eq!(source.load("p1").unwrap(), Some(b"png-bytes".to_vec()));
    }

    #[test]
    fn missing_fixture_falls_through_when_lenient() {
        let dir = tempdir().unwrap();
        let source = FixtureSource::new(dir.path(), false);
        assert_eq!(source.load("absent").unwrap(), None);
    }

    #[test]
    fn missing_fixture_fails_when_strict() {
        let dir = tempdir().unwrap();
        let source = FixtureSource::new(dir.path(), true);
        let err = source.load("absent").unwrap_err();
        assert!(matches!(err, EngineError::Fixture(FixtureError::Missing { .. })));
        assert!(err.to_string().contains("absent.jpg"));
    }

    #[test]
    fn traversal_is_rejected_before_lookup() {
        let dir = tempdir().unwrap();
        let source = FixtureSource::new(dir.path(), false);
        let err = source.load("../secret").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::PathLikeId)
        ));
    }
}
