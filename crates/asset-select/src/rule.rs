//! Selection rule types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Extension and literal-name allow-lists.
///
/// Extensions are stored lower-case with a leading dot, so `"SPV"`, `".spv"`
/// and `".Spv"` all normalize to `".spv"`. Names match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRule", into = "RawRule")]
pub struct SelectionRule {
    extensions: BTreeSet<String>,
    names: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
struct RawRule {
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    names: Vec<String>,
}

impl From<RawRule> for SelectionRule {
    fn from(raw: RawRule) -> Self {
        SelectionRule::new(raw.extensions, raw.names)
    }
}

impl From<SelectionRule> for RawRule {
    fn from(rule: SelectionRule) -> Self {
        RawRule {
            extensions: rule.extensions.into_iter().collect(),
            names: rule.names.into_iter().collect(),
        }
    }
}

impl SelectionRule {
    /// Build a rule from extension and name lists.
    pub fn new<E, N>(extensions: E, names: N) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .filter_map(|e| normalize_extension(e.as_ref()))
                .collect(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Rule that selects by extension only.
    pub fn extensions<E>(extensions: E) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self::new(extensions, Vec::<String>::new())
    }

    /// Add literal file names to the rule.
    pub fn with_names<N>(mut self, names: N) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether a file name is selected.
    pub fn matches(&self, file_name: &str) -> bool {
        if self.names.contains(file_name) {
            return true;
        }
        match Path::new(file_name).extension() {
            Some(ext) => {
                let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.extensions.contains(&ext)
            }
            None => false,
        }
    }

    /// Normalized extensions, sorted.
    pub fn extension_list(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Literal names, sorted.
    pub fn name_list(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// True when the rule can never select anything.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && self.names.is_empty()
    }
}

fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!(".{}", trimmed.to_lowercase()))
    }
}
