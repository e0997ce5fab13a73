//! Lazy asset discovery over a directory tree.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::SelectionRule;

/// Errors raised while walking a source tree.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("asset root does not exist or is not a directory: {0}")]
    MissingRoot(PathBuf),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("path is not within asset root: {0}")]
    OutsideRoot(PathBuf),
}

/// A selected file, addressed relative to the walked root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// Directory containing the file, relative to the root (empty for the root itself)
    pub rel_dir: PathBuf,
    /// Bare file name, exactly as stored on disk
    pub file_name: OsString,
}

impl AssetFile {
    /// Path relative to the root.
    pub fn rel_path(&self) -> PathBuf {
        self.rel_dir.join(&self.file_name)
    }
}

/// One step of a walk: a visited directory or a selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkItem {
    Directory(PathBuf),
    Asset(AssetFile),
}

/// Walks `root` and applies a [`SelectionRule`] to every file.
///
/// Nothing is opened; only names are inspected. Directory symlinks are not
/// descended into; a symlink to a file counts as that file.
/// Order follows the underlying directory walk and is not stable across
/// platforms.
#[derive(Debug, Clone)]
pub struct Locator {
    root: PathBuf,
    rule: SelectionRule,
}

impl Locator {
    pub fn new(root: impl Into<PathBuf>, rule: SelectionRule) -> Self {
        Self {
            root: root.into(),
            rule,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rule(&self) -> &SelectionRule {
        &self.rule
    }

    /// Every visited directory plus every selected file.
    pub fn walk(&self) -> Walk<'_> {
        let (inner, pending) = if self.root.is_dir() {
            (Some(WalkDir::new(&self.root).follow_links(false).into_iter()), None)
        } else {
            (None, Some(SelectError::MissingRoot(self.root.clone())))
        };
        Walk {
            root: &self.root,
            rule: &self.rule,
            inner,
            pending,
        }
    }

    /// Selected files only.
    pub fn files(&self) -> AssetFiles<'_> {
        AssetFiles { walk: self.walk() }
    }
}

/// Iterator returned by [`Locator::walk`].
pub struct Walk<'a> {
    root: &'a Path,
    rule: &'a SelectionRule,
    inner: Option<walkdir::IntoIter>,
    pending: Option<SelectError>,
}

impl Walk<'_> {
    fn relative(&self, path: &Path) -> Result<PathBuf, SelectError> {
        path.strip_prefix(self.root)
            .map(Path::to_path_buf)
            .map_err(|_| SelectError::OutsideRoot(path.to_path_buf()))
    }
}

impl Iterator for Walk<'_> {
    type Item = Result<WalkItem, SelectError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }

        loop {
            let entry = match self.inner.as_mut()?.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            let file_type = entry.file_type();

            if file_type.is_dir() {
                return Some(self.relative(entry.path()).map(WalkItem::Directory));
            }

            let is_file = file_type.is_file()
                || (file_type.is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }

            // Match on the lossy name; keep the real one for the path
            if !self.rule.matches(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let file_name = entry.file_name().to_os_string();

            let parent = entry.path().parent().unwrap_or(self.root);
            return Some(self.relative(parent).map(|rel_dir| {
                WalkItem::Asset(AssetFile { rel_dir, file_name })
            }));
        }
    }
}

/// Iterator returned by [`Locator::files`].
pub struct AssetFiles<'a> {
    walk: Walk<'a>,
}

impl Iterator for AssetFiles<'_> {
    type Item = Result<AssetFile, SelectError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walk.next()? {
                Ok(WalkItem::Asset(file)) => return Some(Ok(file)),
                Ok(WalkItem::Directory(_)) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn create_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("top.dat"), "top").unwrap();
        fs::write(root.join("notes.txt"), "skip").unwrap();
        fs::create_dir_all(root.join("audio/banks")).unwrap();
        fs::write(root.join("audio/banks/Master.BANK"), "bank").unwrap();
        fs::write(root.join("audio/readme.md"), "skip").unwrap();
        fs::create_dir_all(root.join("levels/a/b/c")).unwrap();
        fs::write(root.join("levels/a/b/c/deep.dat"), "deep").unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();

        dir
    }

    fn selected(locator: &Locator) -> BTreeSet<PathBuf> {
        locator.files().map(|f| f.unwrap().rel_path()).collect()
    }

    #[test]
    fn test_files_selected_at_any_depth() {
        let dir = create_tree();
        let locator = Locator::new(dir.path(), SelectionRule::extensions([".dat", ".bank"]));

        let expected: BTreeSet<PathBuf> = [
            PathBuf::from("top.dat"),
            PathBuf::from("audio/banks/Master.BANK"),
            PathBuf::from("levels/a/b/c/deep.dat"),
        ]
        .into_iter()
        .collect();

        assert_eq!(selected(&locator), expected);
    }

    #[test]
    fn test_root_files_have_empty_rel_dir() {
        let dir = create_tree();
        let locator = Locator::new(dir.path(), SelectionRule::extensions([".dat"]));

        let top = locator
            .files()
            .map(Result::unwrap)
            .find(|f| f.file_name == "top.dat")
            .unwrap();
        assert_eq!(top.rel_dir, PathBuf::new());
    }

    #[test]
    fn test_names_select_without_extension_match() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("ibl")).unwrap();
        fs::write(dir.path().join("ibl/brdf.dat"), "lut").unwrap();
        fs::write(dir.path().join("ibl/other.dat"), "x").unwrap();
        fs::write(dir.path().join("shader.frag.spv"), "spv").unwrap();

        let rule = SelectionRule::extensions([".spv"]).with_names(["brdf.dat"]);
        let locator = Locator::new(dir.path(), rule);

        let expected: BTreeSet<PathBuf> = [
            PathBuf::from("ibl/brdf.dat"),
            PathBuf::from("shader.frag.spv"),
        ]
        .into_iter()
        .collect();
        assert_eq!(selected(&locator), expected);
    }

    #[test]
    fn test_walk_reports_every_directory() {
        let dir = create_tree();
        let locator = Locator::new(dir.path(), SelectionRule::extensions([".dat"]));

        let dirs: BTreeSet<PathBuf> = locator
            .walk()
            .filter_map(|item| match item.unwrap() {
                WalkItem::Directory(d) => Some(d),
                WalkItem::Asset(_) => None,
            })
            .collect();

        assert!(dirs.contains(&PathBuf::new()));
        assert!(dirs.contains(&PathBuf::from("empty")));
        assert!(dirs.contains(&PathBuf::from("audio/banks")));
        assert!(dirs.contains(&PathBuf::from("levels/a/b/c")));
    }

    #[test]
    fn test_missing_root_is_reported_once() {
        let dir = TempDir::new().unwrap();
        let locator = Locator::new(dir.path().join("nope"), SelectionRule::extensions([".dat"]));

        let mut files = locator.files();
        assert!(matches!(files.next(), Some(Err(SelectError::MissingRoot(_)))));
        assert!(files.next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_symlinks_selected_dir_symlinks_not_followed() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real.dat"), "x").unwrap();
        symlink("real.dat", dir.path().join("link.dat")).unwrap();
        symlink("missing.dat", dir.path().join("dangling.dat")).unwrap();
        fs::create_dir_all(dir.path().join("pack")).unwrap();
        fs::write(dir.path().join("pack/inner.dat"), "y").unwrap();
        symlink("pack", dir.path().join("pack_link")).unwrap();

        let locator = Locator::new(dir.path(), SelectionRule::extensions([".dat"]));

        let expected: BTreeSet<PathBuf> = [
            PathBuf::from("link.dat"),
            PathBuf::from("pack/inner.dat"),
            PathBuf::from("real.dat"),
        ]
        .into_iter()
        .collect();
        assert_eq!(selected(&locator), expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_keep_their_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let name = OsStr::from_bytes(b"lvl\xff.dat");
        fs::write(dir.path().join(name), "level").unwrap();

        let locator = Locator::new(dir.path(), SelectionRule::extensions([".dat"]));
        let files: Vec<AssetFile> = locator.files().map(Result::unwrap).collect();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, name);
        assert!(dir.path().join(files[0].rel_path()).is_file());
    }
}
