//! Listing files already present in the output tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use gitops_core::paths::KUSTOMIZATION;
use gitops_core::{Error, Result};
use tracing::{debug, warn};

/// Capability to list files already present under a directory of the tree.
pub trait FileLister {
    /// Paths of every file below `dir`, relative to it, excluding the
    /// composition index directly inside `dir`. A missing directory lists
    /// as empty.
    fn list(&self, dir: &str) -> Result<BTreeSet<String>>;
}

/// Lists files on the local filesystem below a root directory.
#[derive(Debug, Clone)]
pub struct FsLister {
    root: PathBuf,
}

impl FsLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scan_directory(&self, base: &Path, dir: &Path, files: &mut BTreeSet<String>) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|source| Error::Listing {
            path: dir.display().to_string(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| Error::Listing {
                path: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| Error::Listing {
                path: path.display().to_string(),
                source,
            })?;
            if file_type.is_dir() {
                self.scan_directory(base, &path, files)?;
            } else if file_type.is_symlink() && path.is_dir() {
                warn!(path = %path.display(), "Skipping symlinked directory");
            } else if let Ok(relative) = path.strip_prefix(base) {
                let relative: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.insert(relative.join("/"));
            }
        }
        Ok(())
    }
}

impl FileLister for FsLister {
    fn list(&self, dir: &str) -> Result<BTreeSet<String>> {
        let base = self.root.join(dir);
        if !base.is_dir() {
            debug!(dir = %dir, "Directory not present, nothing listed");
            return Ok(BTreeSet::new());
        }

        let mut files = BTreeSet::new();
        self.scan_directory(&base, &base, &mut files)?;
        files.remove(KUSTOMIZATION);

        debug!(dir = %dir, count = files.len(), "Listed existing files");
        Ok(files)
    }
}

/// In-memory lister keyed by full repository-relative file path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLister {
    files: BTreeSet<String>,
}

impl MemoryLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.files.insert(path.into());
        self
    }
}

impl FromIterator<String> for MemoryLister {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl FileLister for MemoryLister {
    fn list(&self, dir: &str) -> Result<BTreeSet<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .files
            .iter()
            .filter_map(|f| f.strip_prefix(&prefix))
            .filter(|f| *f != KUSTOMIZATION)
            .map(str::to_string)
            .collect())
    }
}

/// Wraps a lister and counts how often each directory is listed.
#[derive(Debug, Default)]
pub struct RecordingLister<L> {
    inner: L,
    calls: std::sync::Mutex<BTreeMap<String, usize>>,
}

impl<L: FileLister> RecordingLister<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            calls: Default::default(),
        }
    }

    /// How many times each directory was listed.
    pub fn calls(&self) -> BTreeMap<String, usize> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl<L: FileLister> FileLister for RecordingLister<L> {
    fn list(&self, dir: &str) -> Result<BTreeSet<String>> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(dir.to_string()).or_default() += 1;
        }
        self.inner.list(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_lister_recurses_and_skips_index() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("environments/dev/env/base");
        std::fs::create_dir_all(base.join("routes")).unwrap();
        std::fs::write(base.join("kustomization.yaml"), "resources: []").unwrap();
        std::fs::write(base.join("volume.yaml"), "kind: PersistentVolumeClaim").unwrap();
        std::fs::write(base.join("routes/kustomization.yaml"), "").unwrap();
        std::fs::write(base.join("routes/01-route.yaml"), "kind: Route").unwrap();

        let files = FsLister::new(tmp.path())
            .list("environments/dev/env/base")
            .unwrap();
        let files: Vec<&str> = files.iter().map(String::as_str).collect();
        assert_eq!(
            files,
            vec!["routes/01-route.yaml", "routes/kustomization.yaml", "volume.yaml"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_fs_lister_skips_symlinked_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("environments/dev/env/base");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("volume.yaml"), "kind: PersistentVolumeClaim").unwrap();
        std::os::unix::fs::symlink(&base, base.join("loop")).unwrap();
        std::os::unix::fs::symlink(base.join("volume.yaml"), base.join("linked.yaml")).unwrap();

        let files = FsLister::new(tmp.path())
            .list("environments/dev/env/base")
            .unwrap();
        let files: Vec<&str> = files.iter().map(String::as_str).collect();
        assert_eq!(files, vec!["linked.yaml", "volume.yaml"]);
    }

    #[test]
    fn test_fs_lister_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let files = FsLister::new(tmp.path()).list("environments/nope").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_memory_lister_filters_by_dir() {
        let lister = MemoryLister::new()
            .with_file("environments/dev/env/base/kustomization.yaml")
            .with_file("environments/dev/env/base/extra.yaml")
            .with_file("environments/dev/env/base-other/x.yaml")
            .with_file("environments/prod/env/base/y.yaml");

        let files = lister.list("environments/dev/env/base").unwrap();
        assert_eq!(files, BTreeSet::from(["extra.yaml".to_string()]));
    }

    #[test]
    fn test_recording_lister_counts_calls() {
        let lister = RecordingLister::new(MemoryLister::new());
        lister.list("a").unwrap();
        lister.list("a").unwrap();
        assert_eq!(lister.calls()["a"], 2);
    }
}
