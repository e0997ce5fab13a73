//! Packaging pipeline
//!
//! Runs one build request end to end:
//! - check the configuration, asset trees and version identifier
//! - prepare the output directory
//! - synchronize project and engine assets
//! - configure and compile
//! - assemble the executable and libraries
//! - reclaim the build workspace and write the distribution manifest
//!
//! Every step runs only after the previous one succeeded. The first error
//! aborts the run; nothing is retried or rolled back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use asset_select::SelectError;

use crate::artifact::{
    reclaim_workspace, ArtifactAssembler, ArtifactError, CleanupPolicy, DistManifest,
    ManifestError, MANIFEST_FILE,
};
use crate::build::{BuildError, BuildOrchestrator, StepRecord, ToolRunner};
use crate::config::{defaults, AssetSource, ConfigError, PackagerConfig};
use crate::failure::FailureKind;
use crate::platform::Platform;
use crate::prompt::{Confirm, TerminalPrompt};
use crate::sync::{SyncError, SyncReport, Synchronizer};
use crate::version::{Version, VersionError};

/// Asset directory inside the output directory
pub const ASSETS_DIR: &str = defaults::OUTPUT_ASSET_DIR;

pub const SUMMARY_SCHEMA_VERSION: u32 = 1;

pub const SUMMARY_SCHEMA_ID: &str = "monke-dist/package_summary@1";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("asset source tree not found: {0}")]
    MissingAssetRoot(PathBuf),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("failed to remove build workspace {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write distribution manifest: {0}")]
    Manifest(#[from] ManifestError),
}

impl PipelineError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PipelineError::Config(_) | PipelineError::MissingAssetRoot(_) => FailureKind::Config,
            PipelineError::Version(VersionError::Io { .. }) => FailureKind::Io,
            PipelineError::Version(_) => FailureKind::Config,
            PipelineError::Sync(SyncError::Select(SelectError::MissingRoot(_))) => {
                FailureKind::Config
            }
            PipelineError::Sync(SyncError::Select(_)) => FailureKind::Io,
            PipelineError::Sync(_) => FailureKind::Copy,
            PipelineError::Build(BuildError::Workspace { .. }) => FailureKind::Io,
            PipelineError::Build(_) => FailureKind::BuildTool,
            PipelineError::Artifact(ArtifactError::MissingArtifact { .. }) => {
                FailureKind::MissingArtifact
            }
            PipelineError::Artifact(ArtifactError::Copy { .. }) => FailureKind::Copy,
            PipelineError::Artifact(ArtifactError::Scan(_)) => FailureKind::Io,
            PipelineError::OutputDir { .. }
            | PipelineError::Cleanup { .. }
            | PipelineError::Manifest(_) => FailureKind::Io,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.failure_kind().exit_code()
    }

    /// Captured build-tool output, when the failure came from the build tool
    pub fn tool_output(&self) -> &[String] {
        match self {
            PipelineError::Build(e) => e.output(),
            _ => &[],
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// One packaging invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub output_dir: PathBuf,

    /// Without this only the output directory is created and the version read
    pub build: bool,

    pub platform: Platform,

    /// Publishing was asked for; recorded, never acted on
    pub publish: bool,

    /// Overrides the configured build configuration
    pub configuration: Option<String>,

    /// Overrides the configured cleanup policy
    pub cleanup: Option<CleanupPolicy>,
}

impl BuildRequest {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            build: false,
            platform: Platform::default(),
            publish: false,
            configuration: None,
            cleanup: None,
        }
    }

    pub fn build(mut self, build: bool) -> Self {
        self.build = build;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = Some(cleanup);
        self
    }
}

/// What a packaging run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSummary {
    pub schema_version: u32,

    pub schema_id: String,

    pub created_at: DateTime<Utc>,

    pub app_name: String,

    pub version: String,

    pub platform: Platform,

    pub output_dir: PathBuf,

    pub built: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,

    pub project_assets: usize,

    pub engine_assets: usize,

    pub asset_bytes: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    pub libraries: Vec<PathBuf>,

    pub build_steps: Vec<StepRecord>,

    pub workspace_removed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist_root_sha256: Option<String>,

    pub publish_requested: bool,

    pub duration_ms: u64,
}

impl PackageSummary {
    fn new(config: &PackagerConfig, request: &BuildRequest, version: &Version) -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            schema_id: SUMMARY_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            app_name: config.app_name.clone(),
            version: version.to_string(),
            platform: request.platform,
            output_dir: request.output_dir.clone(),
            built: request.build,
            configuration: None,
            project_assets: 0,
            engine_assets: 0,
            asset_bytes: 0,
            executable: None,
            libraries: Vec::new(),
            build_steps: Vec::new(),
            workspace_removed: false,
            dist_root_sha256: None,
            publish_requested: request.publish,
            duration_ms: 0,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Multi-line report for a terminal
    pub fn human(&self) -> String {
        let mut lines = vec![format!(
            "{} {} ({}) -> {}",
            self.app_name,
            self.version,
            self.platform,
            self.output_dir.display()
        )];

        if !self.built {
            lines.push("  build not requested; output directory prepared".to_string());
        } else {
            lines.push(format!(
                "  assets: {} project, {} engine ({} bytes)",
                self.project_assets, self.engine_assets, self.asset_bytes
            ));
            if let Some(ref exe) = self.executable {
                lines.push(format!("  executable: {}", exe.display()));
            }
            lines.push(format!("  libraries: {}", self.libraries.len()));
            lines.push(format!(
                "  workspace: {}",
                if self.workspace_removed { "removed" } else { "kept" }
            ));
            if let Some(ref hash) = self.dist_root_sha256 {
                lines.push(format!("  manifest: {}", hash));
            }
        }
        if self.publish_requested {
            lines.push("  publish requested: no publisher configured, skipped".to_string());
        }
        lines.push(format!("  took {} ms", self.duration_ms));

        lines.join("\n")
    }
}

pub struct Pipeline {
    config: PackagerConfig,
    runner: Arc<dyn ToolRunner>,
    confirm: Box<dyn Confirm>,
}

impl Pipeline {
    /// Pipeline that asks cleanup questions on the terminal
    pub fn new(config: PackagerConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            config,
            runner,
            confirm: Box::new(TerminalPrompt),
        }
    }

    pub fn with_confirm(mut self, confirm: Box<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn config(&self) -> &PackagerConfig {
        &self.config
    }

    pub fn run(&self, request: &BuildRequest) -> PipelineResult<PackageSummary> {
        let start = Instant::now();
        let output_dir = &request.output_dir;

        // Every configuration check happens before the output is touched
        self.config.validate()?;
        if request.build {
            for root in [self.config.project_asset_root(), self.config.engine_asset_root()] {
                if !root.is_dir() {
                    return Err(PipelineError::MissingAssetRoot(root));
                }
            }
        }
        let version = Version::from_file(&self.config.version_path())?;

        self.prepare_output(output_dir, request.build)?;
        info!(version = %version, platform = %request.platform, "packaging");

        let mut summary = PackageSummary::new(&self.config, request, &version);

        if request.build {
            self.package(request, &version, &mut summary)?;
        } else {
            info!("build not requested, nothing to package");
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Clear (when building) then create the output directory
    fn prepare_output(&self, output_dir: &Path, clear: bool) -> PipelineResult<()> {
        let io_err = |source| PipelineError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        };

        if clear && output_dir.exists() {
            info!(output = %output_dir.display(), "clearing output directory");
            fs::remove_dir_all(output_dir).map_err(io_err)?;
        }
        if !output_dir.exists() {
            fs::create_dir_all(output_dir).map_err(io_err)?;
        }
        Ok(())
    }

    fn package(
        &self,
        request: &BuildRequest,
        version: &Version,
        summary: &mut PackageSummary,
    ) -> PipelineResult<()> {
        let output_dir = &request.output_dir;
        let assets_dir = output_dir.join(ASSETS_DIR);
        fs::create_dir_all(&assets_dir).map_err(|source| PipelineError::OutputDir {
            path: assets_dir.clone(),
            source,
        })?;

        let project = self.sync_assets(&self.config.project_assets, &assets_dir)?;
        let engine = self.sync_assets(&self.config.engine_assets, &assets_dir)?;
        summary.project_assets = project.files();
        summary.engine_assets = engine.files();
        summary.asset_bytes = project.bytes + engine.bytes;

        let configuration = request
            .configuration
            .clone()
            .unwrap_or_else(|| self.config.build.configuration.clone());

        let orchestrator = BuildOrchestrator::new(
            self.config.build.clone(),
            self.config.app_name.clone(),
            self.config.project_root.clone(),
            Arc::clone(&self.runner),
        );
        let outcome = orchestrator.run(output_dir, version.as_str(), &configuration)?;
        summary.build_steps = outcome.steps;
        summary.configuration = Some(configuration);

        let assembled = ArtifactAssembler::new(self.config.app_name.clone(), request.platform)
            .assemble(
                output_dir,
                &outcome.workspace,
                &outcome.configuration,
                version.as_str(),
            )?;
        summary.executable = Some(assembled.executable);
        summary.libraries = assembled.libraries;

        let policy = request.cleanup.unwrap_or(self.config.cleanup);
        summary.workspace_removed = reclaim_workspace(&outcome.workspace, policy, self.confirm.as_ref())
            .map_err(|source| PipelineError::Cleanup {
                path: outcome.workspace.clone(),
                source,
            })?;

        if self.config.manifest {
            let manifest = DistManifest::from_directory(
                output_dir,
                &[self.config.build.workspace_dir.clone()],
                &self.config.app_name,
                version.as_str(),
                request.platform,
            )?;
            manifest.write_to_file(&output_dir.join(MANIFEST_FILE))?;
            info!(
                entries = manifest.entries.len(),
                dist_root_sha256 = %manifest.dist_root_sha256,
                "wrote distribution manifest"
            );
            summary.dist_root_sha256 = Some(manifest.dist_root_sha256);
        }

        info!(output = %output_dir.display(), "package complete");
        Ok(())
    }

    fn sync_assets(&self, assets: &AssetSource, dest: &Path) -> PipelineResult<SyncReport> {
        let report = Synchronizer::new(self.config.resolve(&assets.root), dest, assets.rule())
            .create_empty_dirs(assets.create_empty_dirs)
            .run()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{RecordingRunner, ScriptedStep};
    use crate::prompt::FixedAnswer;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("VERSION"), "0.0.1\n").unwrap();
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("assets/intro.dat"), "intro").unwrap();
        fs::create_dir_all(root.join("third_party/vultron/Vultron/assets/shaders")).unwrap();
        fs::write(
            root.join("third_party/vultron/Vultron/assets/shaders/mesh.spv"),
            "spirv",
        )
        .unwrap();
        dir
    }

    fn pipeline(root: &Path, runner: Arc<RecordingRunner>) -> Pipeline {
        Pipeline::new(PackagerConfig::rooted_at(root), runner).with_confirm(Box::new(FixedAnswer(true)))
    }

    #[test]
    fn test_failure_kinds() {
        let err = PipelineError::MissingAssetRoot(PathBuf::from("assets"));
        assert_eq!(err.exit_code(), 10);

        let err = PipelineError::Build(BuildError::StepFailed {
            step: crate::build::BuildStep::Compile,
            code: Some(2),
            output: vec!["boom".to_string()],
        });
        assert_eq!(err.failure_kind(), FailureKind::BuildTool);
        assert_eq!(err.tool_output(), &["boom".to_string()]);

        let err = PipelineError::Artifact(ArtifactError::MissingArtifact {
            path: PathBuf::from("build/Release/monke_v0.0.1.exe"),
        });
        assert_eq!(err.exit_code(), 70);

        let err = PipelineError::Version(VersionError::NotFound(PathBuf::from("VERSION")));
        assert_eq!(err.failure_kind(), FailureKind::Config);
    }

    #[test]
    fn test_missing_asset_root_checked_before_clearing() {
        let dir = project();
        fs::remove_dir_all(dir.path().join("assets")).unwrap();
        let out = dir.path().join("dist/monke");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("keep.txt"), "previous").unwrap();

        let runner = Arc::new(RecordingRunner::new());
        let err = pipeline(dir.path(), runner.clone())
            .run(&BuildRequest::new(&out).build(true))
            .unwrap_err();

        assert!(matches!(err, PipelineError::MissingAssetRoot(_)));
        assert!(out.join("keep.txt").exists());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_missing_version_keeps_previous_output() {
        let dir = project();
        fs::remove_file(dir.path().join("VERSION")).unwrap();
        let out = dir.path().join("dist/monke");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("monke.exe"), "previous release").unwrap();

        let runner = Arc::new(RecordingRunner::new());
        let err = pipeline(dir.path(), runner.clone())
            .run(&BuildRequest::new(&out).build(true))
            .unwrap_err();

        assert!(matches!(err, PipelineError::Version(VersionError::NotFound(_))));
        assert_eq!(
            fs::read_to_string(out.join("monke.exe")).unwrap(),
            "previous release"
        );
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_invalid_workspace_dir_keeps_previous_output() {
        let dir = project();
        let out = dir.path().join("dist/monke");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("monke.exe"), "previous release").unwrap();

        let mut config = PackagerConfig::rooted_at(dir.path());
        config.build.workspace_dir = PathBuf::from(".");
        let runner = Arc::new(RecordingRunner::new());
        let err = Pipeline::new(config, runner.clone())
            .with_confirm(Box::new(FixedAnswer(true)))
            .run(&BuildRequest::new(&out).build(true).cleanup(CleanupPolicy::Delete))
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::Config);
        assert!(out.join("monke.exe").is_file());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_compile_failure_skips_assembly() {
        let dir = project();
        let out = dir.path().join("dist/monke");
        let runner = Arc::new(RecordingRunner::new());
        runner.push(ScriptedStep::success());
        runner.push(ScriptedStep::failure(1, &["link error"]));

        let err = pipeline(dir.path(), runner.clone())
            .run(&BuildRequest::new(&out).build(true))
            .unwrap_err();

        assert_eq!(err.exit_code(), 50);
        assert!(out.join("assets/intro.dat").exists());
        assert!(!out.join("monke.exe").exists());
        assert!(!out.join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_summary_human_without_build() {
        let dir = project();
        let out = dir.path().join("dist/monke");
        let runner = Arc::new(RecordingRunner::new());

        let summary = pipeline(dir.path(), runner)
            .run(&BuildRequest::new(&out))
            .unwrap();

        let text = summary.human();
        assert!(text.contains("monke 0.0.1 (windows)"));
        assert!(text.contains("build not requested"));
    }
}
