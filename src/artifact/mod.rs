//! Artifact assembly
//!
//! Copies the compiled executable and its shared libraries out of the build
//! workspace into the distribution root, then applies the workspace cleanup
//! policy. The distribution manifest lives in [`manifest`].

mod cleanup;
mod manifest;

pub use cleanup::{reclaim_workspace, CleanupPolicy, UnknownCleanupPolicy};
pub use manifest::{DistEntry, DistManifest, ManifestError, MANIFEST_FILE, SCHEMA_ID, SCHEMA_VERSION};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use asset_select::{Locator, SelectError, SelectionRule};
use tracing::{debug, info};

use crate::platform::Platform;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("expected build artifact not found: {path}")]
    MissingArtifact { path: PathBuf },

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to scan build output: {0}")]
    Scan(#[from] SelectError),
}

/// Files placed into the distribution root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledArtifacts {
    /// Destination of the executable
    pub executable: PathBuf,
    /// Destinations of the copied libraries, in walk order
    pub libraries: Vec<PathBuf>,
}

/// Collects build outputs for one application and platform
pub struct ArtifactAssembler {
    app_name: String,
    platform: Platform,
}

impl ArtifactAssembler {
    pub fn new(app_name: impl Into<String>, platform: Platform) -> Self {
        Self {
            app_name: app_name.into(),
            platform,
        }
    }

    /// Path the build is expected to leave the executable at
    pub fn expected_executable(&self, workspace: &Path, configuration: &str, version: &str) -> PathBuf {
        workspace
            .join(configuration)
            .join(self.platform.versioned_executable(&self.app_name, version))
    }

    /// Copy `<workspace>/<configuration>/<app>_v<version><suffix>` to
    /// `<output_dir>/<app><suffix>`, then every library under
    /// `<workspace>/<configuration>` into `output_dir`, flattened.
    ///
    /// Libraries sharing a file name overwrite each other; the last one
    /// walked wins.
    pub fn assemble(
        &self,
        output_dir: &Path,
        workspace: &Path,
        configuration: &str,
        version: &str,
    ) -> Result<AssembledArtifacts, ArtifactError> {
        let source = self.expected_executable(workspace, configuration, version);
        if !source.is_file() {
            return Err(ArtifactError::MissingArtifact { path: source });
        }

        let executable = output_dir.join(self.platform.dist_executable(&self.app_name));
        copy_file(&source, &executable)?;
        info!(
            from = %source.display(),
            to = %executable.display(),
            "copied executable"
        );

        let build_dir = workspace.join(configuration);
        let rule = SelectionRule::extensions([self.platform.library_extension()]);
        let locator = Locator::new(&build_dir, rule);

        let mut libraries = Vec::new();
        for file in locator.files() {
            let file = file?;
            let from = build_dir.join(file.rel_path());
            let to = output_dir.join(&file.file_name);
            copy_file(&from, &to)?;
            debug!(from = %from.display(), to = %to.display(), "copied library");
            libraries.push(to);
        }

        info!(
            libraries = libraries.len(),
            extension = self.platform.library_extension(),
            "copied libraries"
        );

        Ok(AssembledArtifacts {
            executable,
            libraries,
        })
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<u64, ArtifactError> {
    fs::copy(from, to).map_err(|source| ArtifactError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_workspace(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join("build").join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, *file).unwrap();
        }
        dir
    }

    #[test]
    fn test_assembles_executable_and_libraries() {
        let dir = create_workspace(&[
            "Release/monke_v0.0.1.exe",
            "Release/engine.dll",
            "Release/deps/AUDIO.DLL",
            "Release/monke.pdb",
        ]);
        let out = dir.path();

        let assembled = ArtifactAssembler::new("monke", Platform::Windows)
            .assemble(out, &out.join("build"), "Release", "0.0.1")
            .unwrap();

        assert_eq!(assembled.executable, out.join("monke.exe"));
        assert_eq!(
            fs::read_to_string(out.join("monke.exe")).unwrap(),
            "Release/monke_v0.0.1.exe"
        );
        assert!(out.join("engine.dll").is_file());
        assert!(out.join("AUDIO.DLL").is_file());
        assert!(!out.join("monke.pdb").exists());
        assert_eq!(assembled.libraries.len(), 2);
    }

    #[test]
    fn test_missing_executable() {
        let dir = create_workspace(&["Release/monke_v0.0.2.exe", "Release/engine.dll"]);
        let out = dir.path();

        let err = ArtifactAssembler::new("monke", Platform::Windows)
            .assemble(out, &out.join("build"), "Release", "0.0.1")
            .unwrap_err();

        match err {
            ArtifactError::MissingArtifact { path } => {
                assert!(path.ends_with("build/Release/monke_v0.0.1.exe"));
            }
            other => panic!("expected MissingArtifact, got {:?}", other),
        }
        assert!(!out.join("monke.exe").exists());
        assert!(!out.join("engine.dll").exists());
    }

    #[test]
    fn test_linux_naming() {
        let dir = create_workspace(&["Release/monke_v1.0", "Release/libengine.so", "Release/engine.dll"]);
        let out = dir.path();

        let assembled = ArtifactAssembler::new("monke", Platform::Linux)
            .assemble(out, &out.join("build"), "Release", "1.0")
            .unwrap();

        assert_eq!(assembled.executable, out.join("monke"));
        assert_eq!(assembled.libraries, vec![out.join("libengine.so")]);
        assert!(!out.join("engine.dll").exists());
    }

    #[test]
    fn test_other_configuration() {
        let dir = create_workspace(&["Debug/monke_v0.0.1.exe", "Release/monke_v0.0.1.exe"]);
        let out = dir.path();

        let assembler = ArtifactAssembler::new("monke", Platform::Windows);
        assembler
            .assemble(out, &out.join("build"), "Debug", "0.0.1")
            .unwrap();

        assert_eq!(
            fs::read_to_string(out.join("monke.exe")).unwrap(),
            "Debug/monke_v0.0.1.exe"
        );
    }
}
