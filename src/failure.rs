//! Failure taxonomy and stable exit codes

use serde::{Deserialize, Serialize};

/// Categorizes why a packaging run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Bad configuration, missing version file or asset tree
    Config,
    /// Copying assets or artifacts failed
    Copy,
    /// Configure or compile did not succeed
    BuildTool,
    /// The build did not produce the expected executable
    MissingArtifact,
    /// Any other filesystem failure
    Io,
}

impl FailureKind {
    /// Stable process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            FailureKind::Config => 10,
            FailureKind::Copy => 30,
            FailureKind::BuildTool => 50,
            FailureKind::MissingArtifact => 70,
            FailureKind::Io => 1,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::Config => "configuration error",
            FailureKind::Copy => "copy failed",
            FailureKind::BuildTool => "build tool failed",
            FailureKind::MissingArtifact => "build artifact missing",
            FailureKind::Io => "I/O error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let kinds = [
            FailureKind::Config,
            FailureKind::Copy,
            FailureKind::BuildTool,
            FailureKind::MissingArtifact,
            FailureKind::Io,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| k.exit_code()).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_serialization() {
        assert_eq!(
            serde_json::to_string(&FailureKind::MissingArtifact).unwrap(),
            "\"MISSING_ARTIFACT\""
        );
    }
}
