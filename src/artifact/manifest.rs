//! Distribution manifest (dist_manifest.json)
//!
//! Lists every file in an assembled distribution with its size and SHA-256,
//! bound together by `dist_root_sha256`, the SHA-256 of the JCS
//! canonicalization of the entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::platform::Platform;

pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_ID: &str = "monke-dist/dist_manifest@1";

/// Manifest file name inside the output directory
pub const MANIFEST_FILE: &str = "dist_manifest.json";

/// A single file in the distribution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistEntry {
    /// Path relative to the output directory, `/`-separated
    pub path: String,

    pub size: u64,

    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistManifest {
    pub schema_version: u32,

    pub schema_id: String,

    pub created_at: DateTime<Utc>,

    pub app_name: String,

    pub version: String,

    pub platform: Platform,

    /// Sorted by path
    pub entries: Vec<DistEntry>,

    /// SHA-256 of JCS(entries)
    pub dist_root_sha256: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("JCS canonicalization error: {0}")]
    JcsError(String),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Path is not within output directory: {0}")]
    PathNotInRoot(String),
}

impl DistManifest {
    pub fn compute_root_sha256(entries: &[DistEntry]) -> Result<String, ManifestError> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(&entries.to_vec())
            .map_err(|e| ManifestError::JcsError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&jcs_bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Hash every regular file under `output_dir`.
    ///
    /// `exclude` holds top-level names (relative to `output_dir`) skipped
    /// entirely, directories included. The manifest file itself is always
    /// skipped.
    pub fn collect_entries(
        output_dir: &Path,
        exclude: &[PathBuf],
    ) -> Result<Vec<DistEntry>, ManifestError> {
        let excluded: HashSet<&Path> = exclude.iter().map(PathBuf::as_path).collect();
        let mut entries: BTreeMap<String, DistEntry> = BTreeMap::new();

        let walker = WalkDir::new(output_dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .path()
                    .strip_prefix(output_dir)
                    .map(|rel| !excluded.contains(rel))
                    .unwrap_or(true)
            });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let rel_path = path
                .strip_prefix(output_dir)
                .map_err(|_| ManifestError::PathNotInRoot(path.display().to_string()))?;
            if rel_path == Path::new(MANIFEST_FILE) {
                continue;
            }

            let rel = rel_path
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let mut contents = Vec::new();
            File::open(path)?.read_to_end(&mut contents)?;

            let sha256 = {
                let mut hasher = Sha256::new();
                hasher.update(&contents);
                hex::encode(hasher.finalize())
            };

            entries.insert(
                rel.clone(),
                DistEntry {
                    path: rel,
                    size: contents.len() as u64,
                    sha256,
                },
            );
        }

        Ok(entries.into_values().collect())
    }

    pub fn from_directory(
        output_dir: &Path,
        exclude: &[PathBuf],
        app_name: &str,
        version: &str,
        platform: Platform,
    ) -> Result<Self, ManifestError> {
        let entries = Self::collect_entries(output_dir, exclude)?;
        let dist_root_sha256 = Self::compute_root_sha256(&entries)?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            app_name: app_name.to_string(),
            version: version.to_string(),
            platform,
            entries,
            dist_root_sha256,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), ManifestError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let json = fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    /// Check `dist_root_sha256` against the entries
    pub fn verify_root(&self) -> Result<bool, ManifestError> {
        Ok(Self::compute_root_sha256(&self.entries)? == self.dist_root_sha256)
    }

    /// Entries whose file is missing or differs on disk
    pub fn changed_entries(&self, output_dir: &Path) -> Result<Vec<String>, ManifestError> {
        let mut changed = Vec::new();
        for entry in &self.entries {
            let full_path = output_dir.join(&entry.path);
            match fs::read(&full_path) {
                Ok(contents) => {
                    let mut hasher = Sha256::new();
                    hasher.update(&contents);
                    if hex::encode(hasher.finalize()) != entry.sha256 {
                        changed.push(entry.path.clone());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => changed.push(entry.path.clone()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(changed)
    }
}
