use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use rayon::prelude::*;
use regex::Regex;

use super::{CheckContext, CheckOutcome, Checker, read_source};
use crate::error::GuardError;
use crate::issue::{BusinessConcern, Source, Suppression, SuppressionKind};

// Directive patterns are written in the subset of syntax shared by the
// `regex` crate and POSIX ERE so hook scripts can reuse them with `grep -E`.

const TS_PREFIX: &str = r"(//|/\*|^[[:space:]]*\*)[[:space:]]*@ts-";
const LINT_PREFIX: &str = r"(//|/\*)[[:space:]]*eslint-disable(-next-line|-line)?";
const WORD_END: &str = r"([^[:alnum:]_]|$)";
/// Directive tail naming no rule, or only `*`, optionally followed by a
/// `-- description`.
const BLANKET_LINT_TAIL: &str =
    r"([[:space:]][[:space:],]*(\*[[:space:],]*)?((\*/)*[[:space:]]*|--.*))?$";

static TS_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "{TS_PREFIX}(?P<kind>ignore|expect-error|nocheck){WORD_END}"
    ))
    .expect("valid ts directive regex")
});

static LINT_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{LINT_PREFIX}(?P<rest>([[:space:]].*)?)$"))
        .expect("valid lint directive regex")
});

/// POSIX ERE matching a line that [`scan_text`] reports as a flagged
/// suppression.
pub(crate) fn flagged_suppression_pattern() -> String {
    format!("{TS_PREFIX}(ignore|nocheck){WORD_END}|{LINT_PREFIX}{BLANKET_LINT_TAIL}")
}

static CONCERN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?://|/\*|^\s*\*|#)\s*(?P<marker>TODO|FIXME|HACK|XXX)\b:?\s*(?P<text>.*)$")
        .expect("valid marker regex")
});

fn strip_comment_end(text: &str) -> &str {
    text.trim().trim_end_matches("*/").trim()
}

/// Rules named by a lint directive, without its `-- reason` description.
fn directive_rules(rest: &str) -> Option<String> {
    let rules = strip_comment_end(rest)
        .split("--")
        .next()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>();
    (!rules.is_empty()).then(|| rules.join(", "))
}

/// Scans one file's text for suppression directives and concern markers.
pub fn scan_text(file: &Path, text: &str) -> (Vec<Suppression>, Vec<BusinessConcern>) {
    let mut suppressions = Vec::new();
    let mut concerns = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_no = index as u32 + 1;

        if let Some(caps) = TS_DIRECTIVE.captures(line) {
            let kind = match &caps["kind"] {
                "expect-error" => SuppressionKind::ExpectError,
                "nocheck" => SuppressionKind::DisableFile,
                _ => SuppressionKind::IgnoreLine,
            };
            suppressions.push(Suppression::new(file, line_no, kind, None));
        }

        if let Some(caps) = LINT_DIRECTIVE.captures(line) {
            // Group 2 is the `-line` / `-next-line` variant.
            let kind = if caps.get(2).is_some() {
                SuppressionKind::DisableRule
            } else {
                SuppressionKind::DisableFile
            };
            let rules = directive_rules(caps.name("rest").map_or("", |m| m.as_str()));
            suppressions.push(Suppression::new(file, line_no, kind, rules));
        }

        if let Some(caps) = CONCERN_MARKER.captures(line) {
            concerns.push(BusinessConcern {
                file: file.to_path_buf(),
                line: line_no,
                marker: caps["marker"].to_string(),
                text: strip_comment_end(&caps["text"]).to_string(),
            });
        }
    }

    (suppressions, concerns)
}

/// Scans project sources for suppressions and TODO-style markers.
pub struct SuppressionChecker;

#[async_trait]
impl Checker for SuppressionChecker {
    fn name(&self) -> &'static str {
        "suppression-scan"
    }

    fn source(&self) -> Source {
        Source::Lint
    }

    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, GuardError> {
        let scan_ctx = ctx.clone();
        let (suppressions, concerns) = tokio::task::spawn_blocking(move || {
            scan_ctx
                .files
                .par_iter()
                .filter_map(|path| {
                    let text = read_source(path)?;
                    Some(scan_text(&scan_ctx.normalize_path(path), &text))
                })
                .reduce(
                    || (Vec::new(), Vec::new()),
                    |(mut s, mut c), (s2, c2)| {
                        s.extend(s2);
                        c.extend(c2);
                        (s, c)
                    },
                )
        })
        .await
        .map_err(|e| GuardError::Internal(format!("suppression scan failed: {}", e)))?;

        let mut outcome = CheckOutcome {
            suppressions,
            concerns,
            ..Default::default()
        };
        outcome
            .suppressions
            .sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        outcome
            .concerns
            .sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const SOURCE: &str = r#"import { a } from './a';
// @ts-ignore
const x: number = 'nope';
// @ts-expect-error: legacy API returns string
const y: number = legacy();
/* eslint-disable */
console.log(x); // eslint-disable-line no-console
// eslint-disable-next-line no-explicit-any, no-unsafe-call -- generated code
run(y as any);
// eslint-disable-next-line
run();
const s = "// @ts-ignore inside a string is still a comment marker to a line scanner";
// TODO: handle the retry case
/* FIXME remove once the API is fixed */
// todo lowercase is not a marker
"#;

    fn scan() -> (Vec<Suppression>, Vec<BusinessConcern>) {
        scan_text(Path::new("src/a.ts"), SOURCE)
    }

    #[test]
    fn test_suppression_kinds_and_lines() {
        let (suppressions, _) = scan();
        let kinds: Vec<(u32, SuppressionKind)> =
            suppressions.iter().map(|s| (s.line, s.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (2, SuppressionKind::IgnoreLine),
                (4, SuppressionKind::ExpectError),
                (6, SuppressionKind::DisableFile),
                (7, SuppressionKind::DisableRule),
                (8, SuppressionKind::DisableRule),
                (10, SuppressionKind::DisableRule),
                (12, SuppressionKind::IgnoreLine),
            ]
        );
    }

    #[test]
    fn test_blanket_suppressions_are_flagged() {
        let (suppressions, _) = scan();
        let flagged: Vec<u32> = suppressions
            .iter()
            .filter(|s| s.should_flag)
            .map(|s| s.line)
            .collect();
        assert_eq!(flagged, vec![2, 6, 10, 12]);
    }

    #[test]
    fn test_directive_rules_drop_description() {
        let (suppressions, _) = scan();
        let rule = suppressions.iter().find(|s| s.line == 8).unwrap().rule.clone();
        assert_eq!(rule.as_deref(), Some("no-explicit-any, no-unsafe-call"));
    }

    #[test]
    fn test_concern_markers() {
        let (_, concerns) = scan();
        assert_eq!(concerns.len(), 2);
        assert_eq!(concerns[0].marker, "TODO");
        assert_eq!(concerns[0].text, "handle the retry case");
        assert_eq!(concerns[1].marker, "FIXME");
        assert_eq!(concerns[1].text, "remove once the API is fixed");
    }

    #[test]
    fn test_plain_code_has_no_suppressions() {
        let (suppressions, concerns) = scan_text(Path::new("b.ts"), "const todo = 1;\n");
        assert!(suppressions.is_empty());
        assert!(concerns.is_empty());
    }

    #[rstest]
    #[case("// @ts-ignore", true)]
    #[case("const x = 1; // @ts-ignore", true)]
    #[case("// @ts-expect-error: legacy", false)]
    #[case("// @ts-nocheck", true)]
    #[case("const s = \"@ts-ignore in a string\";", false)]
    #[case(" * @ts-ignore", true)]
    #[case("// @ts-ignored", false)]
    #[case("/* eslint-disable */", true)]
    #[case("/* eslint-disable no-console */", false)]
    #[case("// eslint-disable-next-line", true)]
    #[case("// eslint-disable-next-line -- reason", true)]
    #[case("// eslint-disable-next-line no-console -- reason", false)]
    #[case("// eslint-disable-line *", true)]
    #[case("// eslint-disable-line *, no-console", false)]
    #[case("// eslint-disable-line * -- generated", true)]
    #[case("/* eslint-disable-next-line --*/", true)]
    #[case("// eslint-disable--foo", false)]
    #[case("const eslint = \"eslint-disable\";", false)]
    fn test_flagged_pattern_agrees_with_scan(#[case] line: &str, #[case] flagged: bool) {
        let (suppressions, _) = scan_text(Path::new("a.ts"), line);
        let scanned = suppressions.iter().any(|s| s.should_flag);
        let pattern = Regex::new(&flagged_suppression_pattern()).unwrap();
        assert_eq!(scanned, flagged, "scan_text on {line:?}");
        assert_eq!(pattern.is_match(line), flagged, "pattern on {line:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_flagged_pattern_agrees_with_grep() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, SOURCE).unwrap();

        let output = std::process::Command::new("grep")
            .arg("-c")
            .arg("-E")
            .arg(flagged_suppression_pattern())
            .arg(&path)
            .output()
            .unwrap();
        let counted: usize = String::from_utf8_lossy(&output.stdout).trim().parse().unwrap();

        let (suppressions, _) = scan();
        assert_eq!(counted, suppressions.iter().filter(|s| s.should_flag).count());
    }
}
