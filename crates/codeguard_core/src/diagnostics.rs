//! Diagnostics already computed by the host editor.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::issue::Issue;

/// Read access to the editor's current diagnostics.
///
/// Reads must be cheap: the save gate calls this on every save and never
/// spawns a process.
pub trait EditorDiagnostics: Send + Sync {
    /// Diagnostics for one file, keyed by root-relative path.
    fn diagnostics_for(&self, file: &Path) -> Vec<Issue>;

    /// Every diagnostic currently known.
    fn all(&self) -> Vec<Issue>;
}

/// [`EditorDiagnostics`] held in memory, pushed by the host.
#[derive(Debug, Default)]
pub struct InMemoryDiagnostics {
    by_file: RwLock<HashMap<PathBuf, Vec<Issue>>>,
}

impl InMemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the diagnostics of one file.
    pub fn set(&self, file: impl Into<PathBuf>, issues: Vec<Issue>) {
        let file = file.into();
        let mut by_file = self.by_file.write();
        if issues.is_empty() {
            by_file.remove(&file);
        } else {
            by_file.insert(file, issues);
        }
    }

    /// Drops every diagnostic.
    pub fn clear(&self) {
        self.by_file.write().clear();
    }
}

impl EditorDiagnostics for InMemoryDiagnostics {
    fn diagnostics_for(&self, file: &Path) -> Vec<Issue> {
        self.by_file.read().get(file).cloned().unwrap_or_default()
    }

    fn all(&self) -> Vec<Issue> {
        let by_file = self.by_file.read();
        let mut files: Vec<&PathBuf> = by_file.keys().collect();
        files.sort();
        files
            .into_iter()
            .flat_map(|f| by_file[f].iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Severity, Source};

    #[test]
    fn test_set_replace_and_clear() {
        let diags = InMemoryDiagnostics::new();
        let issue = Issue::new(Source::Lint, Severity::Medium, "x").at("a.ts", 1, 1);
        diags.set("a.ts", vec![issue.clone(), issue.clone()]);
        diags.set("b.ts", vec![issue.clone()]);
        assert_eq!(diags.diagnostics_for(Path::new("a.ts")).len(), 2);
        assert_eq!(diags.all().len(), 3);

        diags.set("a.ts", vec![]);
        assert!(diags.diagnostics_for(Path::new("a.ts")).is_empty());

        diags.clear();
        assert!(diags.all().is_empty());
    }
}
