//! Typed packaging configuration

use asset_select::SelectionRule;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use super::defaults;
use super::ConfigError;
use crate::artifact::{CleanupPolicy, MANIFEST_FILE};
use crate::build::BuildSettings;

/// One asset source tree and the rule that selects files out of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSource {
    /// Tree root, relative to the project root unless absolute
    pub root: PathBuf,

    /// Selected extensions (case-insensitive)
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Selected literal file names
    #[serde(default)]
    pub names: Vec<String>,

    /// Mirror every walked directory, even ones with no selected file
    #[serde(default)]
    pub create_empty_dirs: bool,
}

impl AssetSource {
    pub fn rule(&self) -> SelectionRule {
        SelectionRule::new(&self.extensions, self.names.iter().cloned())
    }
}

/// Everything the pipeline needs that is not part of a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagerConfig {
    /// Application name; also the build target
    pub app_name: String,

    /// Root against which relative paths resolve; build tool working directory
    pub project_root: PathBuf,

    /// Version file
    pub version_file: PathBuf,

    /// What to do with the build workspace after assembly
    pub cleanup: CleanupPolicy,

    /// Write dist_manifest.json into the output directory
    pub manifest: bool,

    pub project_assets: AssetSource,

    pub engine_assets: AssetSource,

    pub build: BuildSettings,
}

impl Default for PackagerConfig {
    fn default() -> Self {
        Self {
            app_name: defaults::APP_NAME.to_string(),
            project_root: PathBuf::from("."),
            version_file: PathBuf::from(defaults::VERSION_FILE),
            cleanup: CleanupPolicy::default(),
            manifest: true,
            project_assets: AssetSource {
                root: PathBuf::from(defaults::PROJECT_ASSET_ROOT),
                extensions: to_strings(defaults::PROJECT_ASSET_EXTENSIONS),
                names: Vec::new(),
                create_empty_dirs: true,
            },
            engine_assets: AssetSource {
                root: PathBuf::from(defaults::ENGINE_ASSET_ROOT),
                extensions: to_strings(defaults::ENGINE_ASSET_EXTENSIONS),
                names: to_strings(defaults::ENGINE_ASSET_NAMES),
                create_empty_dirs: false,
            },
            build: BuildSettings::default(),
        }
    }
}

impl PackagerConfig {
    /// Default configuration rooted at `project_root`
    pub fn rooted_at(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn version_path(&self) -> PathBuf {
        self.resolve(&self.version_file)
    }

    pub fn project_asset_root(&self) -> PathBuf {
        self.resolve(&self.project_assets.root)
    }

    pub fn engine_asset_root(&self) -> PathBuf {
        self.resolve(&self.engine_assets.root)
    }

    /// Default output directory: `dist/<app-name>`
    pub fn default_output_dir(&self) -> PathBuf {
        PathBuf::from("dist").join(&self.app_name)
    }

    /// Check values that deserialization alone does not constrain
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "app_name must not be empty".to_string(),
            ));
        }
        if self.app_name.contains(['/', '\\']) {
            return Err(ConfigError::ValidationError(format!(
                "app_name must not contain path separators: {}",
                self.app_name
            )));
        }
        if self.build.jobs == 0 || self.build.jobs > 1024 {
            return Err(ConfigError::ValidationError(format!(
                "build.jobs must be in [1, 1024], got {}",
                self.build.jobs
            )));
        }
        self.validate_workspace_dir()?;
        if self.build.configuration.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "build.configuration must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl PackagerConfig {
    /// The workspace is removed wholesale on cleanup, so it must name a
    /// dedicated directory strictly below the output directory.
    fn validate_workspace_dir(&self) -> Result<(), ConfigError> {
        let dir = &self.build.workspace_dir;
        let invalid = |reason: &str| {
            Err(ConfigError::ValidationError(format!(
                "build.workspace_dir {}: {}",
                reason,
                dir.display()
            )))
        };

        if dir.as_os_str().is_empty() {
            return invalid("must not be empty");
        }
        if !dir.components().all(|c| matches!(c, Component::Normal(_))) {
            return invalid("must be a relative path without '.' or '..'");
        }
        let first = dir.components().next().map(|c| c.as_os_str());
        if first == Some(OsStr::new(defaults::OUTPUT_ASSET_DIR))
            || first == Some(OsStr::new(MANIFEST_FILE))
        {
            return invalid("must not overlap the packaged output");
        }
        Ok(())
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_builtin_layer() {
        let from_layer: PackagerConfig =
            serde_json::from_value(defaults::builtin_layer()).unwrap();
        assert_eq!(from_layer, PackagerConfig::default());
    }

    #[test]
    fn test_default_rules() {
        let config = PackagerConfig::default();

        let project = config.project_assets.rule();
        assert!(project.matches("level.dat"));
        assert!(project.matches("Master.bank"));
        assert!(!project.matches("shader.spv"));

        let engine = config.engine_assets.rule();
        assert!(engine.matches("pbr.frag.spv"));
        assert!(engine.matches("skybox.dat"));
        assert!(!engine.matches("level.dat"));
    }

    #[test]
    fn test_resolve_paths() {
        let config = PackagerConfig::rooted_at("/work/monke");
        assert_eq!(config.version_path(), PathBuf::from("/work/monke/VERSION"));
        assert_eq!(
            config.engine_asset_root(),
            PathBuf::from("/work/monke/third_party/vultron/Vultron/assets")
        );
        assert_eq!(config.default_output_dir(), PathBuf::from("dist/monke"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PackagerConfig::default();
        assert!(config.validate().is_ok());

        config.build.jobs = 0;
        assert!(config.validate().is_err());

        let mut config = PackagerConfig::default();
        config.app_name = "bin/monke".to_string();
        assert!(config.validate().is_err());

        let mut config = PackagerConfig::default();
        config.build.workspace_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_workspace_dir_must_stay_below_output() {
        for dir in [".", "..", "./build", "build/../..", "/tmp/build"] {
            let mut config = PackagerConfig::default();
            config.build.workspace_dir = PathBuf::from(dir);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("build.workspace_dir"), "{}", dir);
        }
    }

    #[test]
    fn test_workspace_dir_must_not_overlap_output() {
        for dir in ["assets", "assets/build", "dist_manifest.json"] {
            let mut config = PackagerConfig::default();
            config.build.workspace_dir = PathBuf::from(dir);
            assert!(config.validate().is_err(), "{}", dir);
        }

        let mut config = PackagerConfig::default();
        config.build.workspace_dir = PathBuf::from("scratch/cmake");
        assert!(config.validate().is_ok());
    }
}
