//! Target platform table
//!
//! Maps each supported platform to the executable suffix and dynamic-library
//! extension the native build produces for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target platform for a packaged release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Windows,
    Linux,
    Macos,
}

impl Platform {
    /// Suffix appended to executable names (including the dot, or empty)
    pub fn executable_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            Platform::Linux | Platform::Macos => "",
        }
    }

    /// Extension of dynamic libraries (including the dot)
    pub fn library_extension(&self) -> &'static str {
        match self {
            Platform::Windows => ".dll",
            Platform::Linux => ".so",
            Platform::Macos => ".dylib",
        }
    }

    /// Name of the compiled, versioned executable: `{app}_v{version}{suffix}`
    pub fn versioned_executable(&self, app_name: &str, version: &str) -> String {
        format!("{}_v{}{}", app_name, version, self.executable_suffix())
    }

    /// Stable name of the executable inside the distribution: `{app}{suffix}`
    pub fn dist_executable(&self, app_name: &str) -> String {
        format!("{}{}", app_name, self.executable_suffix())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Macos => "macos",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown platform names
#[derive(Debug, thiserror::Error)]
#[error("unknown platform '{0}' (expected windows, linux or macos)")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::Macos),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_table() {
        assert_eq!(Platform::Windows.executable_suffix(), ".exe");
        assert_eq!(Platform::Windows.library_extension(), ".dll");
        assert_eq!(Platform::Linux.executable_suffix(), "");
        assert_eq!(Platform::Linux.library_extension(), ".so");
        assert_eq!(Platform::Macos.executable_suffix(), "");
        assert_eq!(Platform::Macos.library_extension(), ".dylib");
    }

    #[test]
    fn test_executable_names() {
        assert_eq!(
            Platform::Windows.versioned_executable("monke", "1.2.3"),
            "monke_v1.2.3.exe"
        );
        assert_eq!(Platform::Windows.dist_executable("monke"), "monke.exe");
        assert_eq!(
            Platform::Linux.versioned_executable("monke", "0.0.1"),
            "monke_v0.0.1"
        );
        assert_eq!(Platform::Macos.dist_executable("monke"), "monke");
    }

    #[test]
    fn test_default_is_windows() {
        assert_eq!(Platform::default(), Platform::Windows);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Linux".parse::<Platform>().unwrap(), Platform::Linux);
        assert_eq!("macos".parse::<Platform>().unwrap(), Platform::Macos);
        assert!("amiga".parse::<Platform>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Platform::Macos).unwrap();
        assert_eq!(json, "\"macos\"");
    }
}
