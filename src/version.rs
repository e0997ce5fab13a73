//! Version identifier loading

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors reading the version file
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("version file not found: {0}")]
    NotFound(PathBuf),

    #[error("version file is empty: {0}")]
    Empty(PathBuf),

    #[error("failed to read version file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The release version, read once at pipeline start.
///
/// Only non-emptiness is checked; the string is embedded verbatim into the
/// expected executable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version(String);

impl Version {
    /// Read and trim the version file
    pub fn from_file(path: &Path) -> Result<Self, VersionError> {
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => VersionError::NotFound(path.to_path_buf()),
            _ => VersionError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty(path.to_path_buf()));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
