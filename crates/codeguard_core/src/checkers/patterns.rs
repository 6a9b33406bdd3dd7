//! Competing line patterns for text-only tool output.
//!
//! Patterns are ordered from most to least specific. The pattern with the
//! most matches wins; a tie goes to the earlier pattern. Taking the first
//! pattern that matches at all would let a loose pattern that fires on a
//! few noisy log lines beat a precise one.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ANSI regex"));

/// Removes terminal color sequences.
pub(crate) fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// A diagnostic extracted by a line pattern.
///
/// Named groups: `file`, `line`, `col`, `level`, `code`, `message`. Only
/// `message` is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawDiagnostic {
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
    pub level: Option<String>,
    pub code: Option<String>,
    pub message: String,
}

impl RawDiagnostic {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let text = |name: &str| caps.name(name).map(|m| m.as_str().trim().to_string());
        let number = |name: &str| {
            caps.name(name)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };
        Self {
            file: text("file").filter(|f| !f.is_empty()),
            line: number("line"),
            column: number("col"),
            level: text("level"),
            code: text("code").filter(|c| !c.is_empty()),
            message: text("message").unwrap_or_default(),
        }
    }
}

/// The winning pattern and what it extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PatternMatch {
    pub pattern: &'static str,
    pub diagnostics: Vec<RawDiagnostic>,
}

pub(crate) struct PatternSet {
    patterns: Vec<(&'static str, Regex)>,
}

impl PatternSet {
    /// Compiles a fixed pattern table.
    ///
    /// Only called from `LazyLock` initializers over literal patterns.
    pub fn new(specs: &[(&'static str, &str)]) -> Self {
        let patterns = specs
            .iter()
            .map(|(name, pattern)| {
                let regex = Regex::new(pattern)
                    .unwrap_or_else(|e| panic!("invalid built-in pattern {name}: {e}"));
                (*name, regex)
            })
            .collect();
        Self { patterns }
    }

    /// Applies every pattern and returns the one with the most matches.
    pub fn best(&self, text: &str) -> Option<PatternMatch> {
        let mut best: Option<PatternMatch> = None;
        for (name, regex) in &self.patterns {
            let diagnostics: Vec<RawDiagnostic> = regex
                .captures_iter(text)
                .map(|caps| RawDiagnostic::from_captures(&caps))
                .filter(|d| !d.message.is_empty())
                .collect();
            let better = best
                .as_ref()
                .is_none_or(|b| diagnostics.len() > b.diagnostics.len());
            if !diagnostics.is_empty() && better {
                best = Some(PatternMatch {
                    pattern: name,
                    diagnostics,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set() -> PatternSet {
        PatternSet::new(&[
            (
                "positional",
                r"(?m)^(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+): (?P<message>.+)$",
            ),
            ("loose", r"(?m)^(?P<level>error)\b(?P<message>.*)$"),
        ])
    }

    #[test]
    fn test_greatest_match_count_wins() {
        let text = "error one\nerror two\nsrc/a.ts:1:2: real problem\n";
        let best = set().best(text).unwrap();
        assert_eq!(best.pattern, "loose");
        assert_eq!(best.diagnostics.len(), 2);
    }

    #[test]
    fn test_tie_goes_to_more_specific_pattern() {
        let text = "error noise\nsrc/a.ts:1:2: real problem\n";
        let best = set().best(text).unwrap();
        assert_eq!(best.pattern, "positional");
        let d = &best.diagnostics[0];
        assert_eq!(d.file.as_deref(), Some("src/a.ts"));
        assert_eq!((d.line, d.column), (1, 2));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(set().best("all good\n"), None);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[96msrc/a.ts\x1b[0m:1"), "src/a.ts:1");
    }
}
