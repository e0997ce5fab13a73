//! Build workspace cleanup

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use crate::prompt::{Confirm, PromptError};

/// What happens to the build workspace once the artifacts are assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    Keep,
    Delete,
    /// Ask the operator; keep when nobody can answer
    #[default]
    Prompt,
}

impl CleanupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupPolicy::Keep => "keep",
            CleanupPolicy::Delete => "delete",
            CleanupPolicy::Prompt => "prompt",
        }
    }
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown cleanup policy '{0}' (expected keep, delete or prompt)")]
pub struct UnknownCleanupPolicy(pub String);

impl FromStr for CleanupPolicy {
    type Err = UnknownCleanupPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep" => Ok(CleanupPolicy::Keep),
            "delete" => Ok(CleanupPolicy::Delete),
            "prompt" => Ok(CleanupPolicy::Prompt),
            other => Err(UnknownCleanupPolicy(other.to_string())),
        }
    }
}

/// Apply `policy` to the workspace. Returns true when it was removed.
///
/// A prompt that cannot be shown or answered keeps the workspace.
pub fn reclaim_workspace(
    workspace: &Path,
    policy: CleanupPolicy,
    confirm: &dyn Confirm,
) -> io::Result<bool> {
    if !workspace.exists() {
        return Ok(false);
    }

    let remove = match policy {
        CleanupPolicy::Keep => false,
        CleanupPolicy::Delete => true,
        CleanupPolicy::Prompt => {
            let question = format!("Remove build workspace {}?", workspace.display());
            match confirm.confirm(&question) {
                Ok(answer) => answer,
                Err(PromptError::NotInteractive(_)) => {
                    warn!(
                        workspace = %workspace.display(),
                        "no terminal to confirm cleanup, keeping build workspace"
                    );
                    false
                }
                Err(e) => {
                    warn!(error = %e, "cleanup prompt failed, keeping build workspace");
                    false
                }
            }
        }
    };

    if remove {
        fs::remove_dir_all(workspace)?;
        info!(workspace = %workspace.display(), "removed build workspace");
    } else {
        info!(workspace = %workspace.display(), "kept build workspace");
    }

    Ok(remove)
}
