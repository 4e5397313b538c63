//! A registry of molds, each backed by a directory on disk.

use crate::identifier;
use moldserve_api::{Registry, ServeError, ServeResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Registry mapping mold ids (`package/mold`) to the directories holding
/// their templates and scripts.
#[derive(Debug, Clone)]
pub struct MoldRegistry {
    name: String,
    molds: BTreeMap<String, PathBuf>,
}

impl MoldRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            molds: BTreeMap::new(),
        }
    }

    pub fn with_mold(mut self, mold_id: &str, dir: impl Into<PathBuf>) -> Self {
        self.add_mold(mold_id, dir);
        self
    }

    /// Register a single mold. Redundant separators in the id are collapsed.
    pub fn add_mold(&mut self, mold_id: &str, dir: impl Into<PathBuf>) {
        let mold_id = identifier::join_segments(mold_id);
        self.molds.insert(mold_id, dir.into());
    }

    /// Register every immediate subdirectory of `dir` as a mold of
    /// `package`. Hidden directories are skipped.
    pub fn add_package(&mut self, package: &str, dir: &Path) -> std::io::Result<usize> {
        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            self.add_mold(&format!("{}/{}", package, name), entry.path());
            count += 1;
        }
        debug!(
            "Registered {} molds for package '{}' in registry '{}'",
            count, package, self.name
        );
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.molds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.molds.is_empty()
    }

    /// Find the longest mold id that `relative_path` lies under.
    ///
    /// A mold id only matches at a segment boundary: `pkg/a` covers
    /// `pkg/a/index.js` but not `pkg/ab/index.js`.
    fn lookup<'a>(&'a self, relative_path: &'a str) -> Option<(&'a Path, &'a str)> {
        let mut best_match: Option<(&str, &Path, &str)> = None;

        for (mold_id, dir) in &self.molds {
            let Some(rest) = relative_path.strip_prefix(mold_id.as_str()) else {
                continue;
            };
            let remainder = if rest.is_empty() {
                rest
            } else if let Some(stripped) = rest.strip_prefix('/') {
                stripped
            } else {
                continue;
            };
            match &best_match {
                Some((best_id, _, _)) if best_id.len() >= mold_id.len() => {}
                _ => best_match = Some((mold_id.as_str(), dir.as_path(), remainder)),
            }
        }

        best_match.map(|(_, dir, remainder)| (dir, remainder))
    }
}

impl Registry for MoldRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn iter_records(&self) -> Vec<(String, PathBuf)> {
        self.molds
            .iter()
            .map(|(id, dir)| (id.clone(), dir.clone()))
            .collect()
    }

    fn verify_path(&self, relative_path: &str) -> ServeResult<PathBuf> {
        let (dir, remainder) = self.lookup(relative_path).ok_or_else(|| {
            ServeError::not_found(format!("no mold registered for '{}'", relative_path))
        })?;

        if remainder.is_empty() {
            return Err(ServeError::not_found(format!(
                "'{}' names a mold, not a file",
                relative_path
            )));
        }

        let mut target = dir.to_path_buf();
        for segment in remainder.split('/') {
            if matches!(segment, "" | "." | "..") || segment.contains('\\') {
                return Err(ServeError::not_found(format!(
                    "template at '{}' not found",
                    relative_path
                )));
            }
            target.push(segment);
        }

        if target.is_file() {
            Ok(target)
        } else {
            Err(ServeError::not_found(format!(
                "template at '{}' not found",
                relative_path
            )))
        }
    }
}
