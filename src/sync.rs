//! Asset synchronization
//!
//! Mirrors the files a [`SelectionRule`] picks out of a source tree into a
//! destination tree, preserving relative directory structure. Every run
//! recopies everything: there is no timestamp or hash comparison, and an
//! existing destination file is overwritten.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use asset_select::{Locator, SelectError, SelectionRule, WalkItem};
use tracing::{debug, info};

/// Errors for synchronization. None are retried and nothing is rolled back.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Select(#[from] SelectError),

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What one synchronization run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files copied, relative to the source root, in walk order
    pub copied: Vec<PathBuf>,
    /// Total bytes copied
    pub bytes: u64,
    /// Directories created under the destination (those that already existed are not counted)
    pub dirs_created: usize,
}

impl SyncReport {
    pub fn files(&self) -> usize {
        self.copied.len()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: SyncReport) {
        self.copied.extend(other.copied);
        self.bytes += other.bytes;
        self.dirs_created += other.dirs_created;
    }
}

/// Copies selected files from one tree into another
pub struct Synchronizer {
    locator: Locator,
    dest_root: PathBuf,
    create_empty_dirs: bool,
}

impl Synchronizer {
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>, rule: SelectionRule) -> Self {
        Self {
            locator: Locator::new(source_root, rule),
            dest_root: dest_root.into(),
            create_empty_dirs: false,
        }
    }

    /// Mirror every walked source directory, even those without a selected file
    pub fn create_empty_dirs(mut self, enabled: bool) -> Self {
        self.create_empty_dirs = enabled;
        self
    }

    pub fn source_root(&self) -> &Path {
        self.locator.root()
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Copy every selected file. Stops at the first failure.
    pub fn run(&self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        for item in self.locator.walk() {
            match item? {
                WalkItem::Directory(rel_dir) => {
                    if self.create_empty_dirs {
                        self.ensure_dir(&self.dest_root.join(rel_dir), &mut report)?;
                    }
                }
                WalkItem::Asset(file) => {
                    let target_dir = self.dest_root.join(&file.rel_dir);
                    self.ensure_dir(&target_dir, &mut report)?;

                    let rel_path = file.rel_path();
                    let from = self.locator.root().join(&rel_path);
                    let to = target_dir.join(&file.file_name);

                    let bytes = fs::copy(&from, &to).map_err(|source| SyncError::Copy {
                        from: from.clone(),
                        to: to.clone(),
                        source,
                    })?;
                    debug!(from = %from.display(), to = %to.display(), bytes, "copied asset");

                    report.bytes += bytes;
                    report.copied.push(rel_path);
                }
            }
        }

        info!(
            source = %self.locator.root().display(),
            files = report.files(),
            bytes = report.bytes,
            "synchronized assets"
        );

        Ok(report)
    }

    fn ensure_dir(&self, dir: &Path, report: &mut SyncReport) -> Result<(), SyncError> {
        if dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|source| SyncError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        report.dirs_created += 1;
        Ok(())
    }
}
