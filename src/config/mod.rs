//! Configuration merge system
//!
//! Three layers, last wins:
//! 1. Built-in defaults
//! 2. Repo config (dist.toml)
//! 3. CLI flags

pub mod defaults;
mod effective;
mod merge;
mod packager;

pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};
pub use packager::{AssetSource, PackagerConfig};

/// Default repo config file name
pub const REPO_CONFIG_FILE: &str = "dist.toml";
