//! Build orchestration
//!
//! Drives the native build tool in two blocking phases:
//! - configure: generate build files into the workspace, in distribution mode
//! - compile: build the application target at fixed parallelism
//!
//! A failing configure step prevents the compile step from running, and a
//! failing compile step surfaces as an error so artifact assembly never runs.
//! There is no timeout: a hung build tool hangs the pipeline.

mod runner;

pub use runner::{Invocation, ProcessRunner, RecordingRunner, ScriptedStep, ToolOutput, ToolRunner};

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::defaults;

/// Lines of build-tool output kept in a failure report
pub const OUTPUT_TAIL_LINES: usize = 60;

/// Build-tool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Build tool executable
    pub program: String,

    /// Source directory handed to configure, relative to the project root
    pub source_dir: PathBuf,

    /// Workspace directory, relative to the output directory
    pub workspace_dir: PathBuf,

    /// Build configuration (e.g. Release)
    pub configuration: String,

    /// Parallel compile jobs
    pub jobs: u32,

    /// Asset directory value passed to each asset-dir define
    pub asset_dir: String,

    /// Cache variables receiving `asset_dir`
    pub asset_dir_defines: Vec<String>,

    /// Cache variable set to ON for distribution mode
    pub dist_define: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            program: defaults::BUILD_PROGRAM.to_string(),
            source_dir: PathBuf::from("."),
            workspace_dir: PathBuf::from(defaults::WORKSPACE_DIR),
            configuration: defaults::CONFIGURATION.to_string(),
            jobs: defaults::JOBS,
            asset_dir: defaults::BUILD_ASSET_DIR.to_string(),
            asset_dir_defines: defaults::ASSET_DIR_DEFINES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            dist_define: defaults::DIST_DEFINE.to_string(),
        }
    }
}

/// The two build phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStep {
    Configure,
    Compile,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStep::Configure => f.write_str("configure"),
            BuildStep::Compile => f.write_str("compile"),
        }
    }
}

/// Build errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to create build workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{step} step could not start `{program}`: {source}")]
    Spawn {
        step: BuildStep,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{step} step failed ({})", describe_exit(.code))]
    StepFailed {
        step: BuildStep,
        code: Option<i32>,
        /// Tail of the combined tool output
        output: Vec<String>,
    },
}

impl BuildError {
    /// Captured tool output for the failing step, if any
    pub fn output(&self) -> &[String] {
        match self {
            BuildError::StepFailed { output, .. } => output,
            _ => &[],
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// A finished build step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: BuildStep,
    pub command: String,
    pub duration_ms: u64,
}

/// What a successful build left behind
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Absolute path of the build workspace
    pub workspace: PathBuf,
    pub configuration: String,
    pub steps: Vec<StepRecord>,
}

/// Runs configure then compile through a [`ToolRunner`]
pub struct BuildOrchestrator {
    settings: BuildSettings,
    target: String,
    project_root: PathBuf,
    runner: Arc<dyn ToolRunner>,
}

impl BuildOrchestrator {
    /// `target` is the application name; the tool runs with `project_root` as its working directory
    pub fn new(
        settings: BuildSettings,
        target: impl Into<String>,
        project_root: impl Into<PathBuf>,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            settings,
            target: target.into(),
            project_root: project_root.into(),
            runner,
        }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Workspace location for an output directory
    pub fn workspace_for(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.settings.workspace_dir)
    }

    /// Arguments of the configure step
    pub fn configure_args(&self, workspace: &Path) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            self.settings.source_dir.to_string_lossy().into_owned(),
            "-B".to_string(),
            workspace.to_string_lossy().into_owned(),
        ];
        for define in &self.settings.asset_dir_defines {
            args.push(format!("-D{}={}", define, self.settings.asset_dir));
        }
        args.push(format!("-D{}=ON", self.settings.dist_define));
        args
    }

    /// Arguments of the compile step
    pub fn compile_args(&self, workspace: &Path, configuration: &str) -> Vec<String> {
        vec![
            "--build".to_string(),
            workspace.to_string_lossy().into_owned(),
            "--config".to_string(),
            configuration.to_string(),
            "--target".to_string(),
            self.target.clone(),
            "-j".to_string(),
            self.settings.jobs.to_string(),
        ]
    }

    /// Create the workspace under `output_dir`, then configure and compile.
    pub fn run(
        &self,
        output_dir: &Path,
        version: &str,
        configuration: &str,
    ) -> Result<BuildOutcome, BuildError> {
        let workspace = self.workspace_for(output_dir);
        fs::create_dir_all(&workspace).map_err(|source| BuildError::Workspace {
            path: workspace.clone(),
            source,
        })?;
        // The tool runs from the project root, so hand it an absolute workspace path
        let workspace = dunce::canonicalize(&workspace).map_err(|source| BuildError::Workspace {
            path: workspace.clone(),
            source,
        })?;

        info!(
            target_name = %self.target,
            version,
            configuration,
            workspace = %workspace.display(),
            "building"
        );

        let configure = self.run_step(BuildStep::Configure, self.configure_args(&workspace))?;
        let compile = self.run_step(
            BuildStep::Compile,
            self.compile_args(&workspace, configuration),
        )?;

        Ok(BuildOutcome {
            workspace,
            configuration: configuration.to_string(),
            steps: vec![configure, compile],
        })
    }

    fn run_step(&self, step: BuildStep, args: Vec<String>) -> Result<StepRecord, BuildError> {
        let invocation =
            Invocation::new(self.settings.program.clone(), args).in_dir(&self.project_root);
        let command = invocation.to_string();
        debug!(%step, %command, "running build tool");

        let start = Instant::now();
        let result = self
            .runner
            .run(&invocation)
            .map_err(|source| BuildError::Spawn {
                step,
                program: self.settings.program.clone(),
                source,
            })?;

        if !result.success {
            let skip = result.output.len().saturating_sub(OUTPUT_TAIL_LINES);
            return Err(BuildError::StepFailed {
                step,
                code: result.code,
                output: result.output.into_iter().skip(skip).collect(),
            });
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(%step, duration_ms, "build step finished");

        Ok(StepRecord {
            step,
            command,
            duration_ms,
        })
    }
}
