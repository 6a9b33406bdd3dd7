use crate::config::ALWAYS_EXCLUDED_DIRS;
use crate::error::GuardError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Finds the source files scanned by the in-process checkers.
pub struct FileFinder {
    include_globs: Option<GlobSet>,
    exclude_globs: Option<GlobSet>,
}

impl FileFinder {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, GuardError> {
        let include_globs = Self::build_globset(include)?;
        let exclude_globs = Self::build_globset(exclude)?;

        Ok(Self {
            include_globs,
            exclude_globs,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>, GuardError> {
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                GuardError::config(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }

        let globset = builder
            .build()
            .map_err(|e| GuardError::config(format!("Failed to build globset: {}", e)))?;

        Ok(Some(globset))
    }

    /// Checks a root-relative path against the include/exclude patterns.
    pub fn should_ignore(&self, relative: &Path) -> bool {
        if relative
            .components()
            .any(|c| ALWAYS_EXCLUDED_DIRS.iter().any(|d| c.as_os_str() == *d))
        {
            return true;
        }

        if self
            .exclude_globs
            .as_ref()
            .is_some_and(|excludes| excludes.is_match(relative))
        {
            return true;
        }

        self.include_globs
            .as_ref()
            .is_some_and(|includes| !includes.is_match(relative))
    }

    /// Walks `root` and returns matching files, sorted.
    ///
    /// Always-excluded directories are pruned before descent, so large
    /// dependency trees are never walked.
    pub fn discover_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded_dir(entry))
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                !self.should_ignore(relative)
            })
            .map(|entry| entry.into_path())
            .collect();

        files.sort();
        files.dedup();

        debug!("Discovered {} files under {}", files.len(), root.display());
        files
    }
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| ALWAYS_EXCLUDED_DIRS.contains(&name))
}
