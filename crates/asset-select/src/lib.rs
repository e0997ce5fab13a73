//! Asset selection for release packaging.
//!
//! A [`SelectionRule`] decides which files count as assets by extension or by
//! literal file name. A [`Locator`] walks a source tree and lazily yields the
//! files a rule selects, relative to the tree's root.

mod locate;
mod rule;

pub use locate::{AssetFile, AssetFiles, Locator, SelectError, Walk, WalkItem};
pub use rule::SelectionRule;
