//! monke-dist - release packaging
//!
//! Assembles a distributable directory for a compiled application: the
//! versioned executable, its shared libraries, and the asset payload drawn
//! from the project and engine source trees.

pub mod artifact;
pub mod build;
pub mod config;
pub mod failure;
pub mod pipeline;
pub mod platform;
pub mod prompt;
pub mod sync;
pub mod version;

pub use failure::FailureKind;
pub use pipeline::{BuildRequest, PackageSummary, Pipeline, PipelineError};
pub use platform::Platform;
pub use version::Version;
