//! Built-in packaging defaults (layer 1)
//!
//! Hardcoded defaults for every configuration value.

use serde_json::Value;

use crate::artifact::CleanupPolicy;

/// Application (and build target) name
pub const APP_NAME: &str = "monke";

/// Version file, relative to the project root
pub const VERSION_FILE: &str = "VERSION";

/// Project asset tree, relative to the project root
pub const PROJECT_ASSET_ROOT: &str = "assets";

/// Extensions of project assets
pub const PROJECT_ASSET_EXTENSIONS: &[&str] = &[".dat", ".bank"];

/// Engine asset tree, relative to the project root
pub const ENGINE_ASSET_ROOT: &str = "third_party/vultron/Vultron/assets";

/// Compiled shader binaries
pub const ENGINE_ASSET_EXTENSIONS: &[&str] = &[".spv"];

/// Auxiliary engine data files copied by name
pub const ENGINE_ASSET_NAMES: &[&str] = &["brdf.dat", "skybox.dat"];

/// Native build tool
pub const BUILD_PROGRAM: &str = "cmake";

/// Asset directory inside the output directory
pub const OUTPUT_ASSET_DIR: &str = "assets";

/// Build workspace, relative to the output directory
pub const WORKSPACE_DIR: &str = "build";

/// Build configuration
pub const CONFIGURATION: &str = "Release";

/// Parallel compile jobs
pub const JOBS: u32 = 32;

/// Asset directory handed to the build system
pub const BUILD_ASSET_DIR: &str = "./assets";

/// Cache variables that receive the asset directory
pub const ASSET_DIR_DEFINES: &[&str] = &["MK_ASSET_DIR", "VLT_ASSET_DIR"];

/// Cache variable that switches the build into distribution mode
pub const DIST_DEFINE: &str = "MK_DIST";

/// Built-in defaults as a mergeable layer
pub fn builtin_layer() -> Value {
    serde_json::json!({
        "app_name": APP_NAME,
        "project_root": ".",
        "version_file": VERSION_FILE,
        "cleanup": CleanupPolicy::default().as_str(),
        "manifest": true,
        "project_assets": {
            "root": PROJECT_ASSET_ROOT,
            "extensions": PROJECT_ASSET_EXTENSIONS,
            "names": [],
            "create_empty_dirs": true
        },
        "engine_assets": {
            "root": ENGINE_ASSET_ROOT,
            "extensions": ENGINE_ASSET_EXTENSIONS,
            "names": ENGINE_ASSET_NAMES,
            "create_empty_dirs": false
        },
        "build": {
            "program": BUILD_PROGRAM,
            "source_dir": ".",
            "workspace_dir": WORKSPACE_DIR,
            "configuration": CONFIGURATION,
            "jobs": JOBS,
            "asset_dir": BUILD_ASSET_DIR,
            "asset_dir_defines": ASSET_DIR_DEFINES,
            "dist_define": DIST_DEFINE
        }
    })
}
