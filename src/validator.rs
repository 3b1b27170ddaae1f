//! Structural validation of marker blocks.
//!
//! Runs over raw lines, independently of hashing. Every problem in a file is
//! collected; nothing here aborts the scan of other files.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{DocPolicy, Limits};
use crate::parser::BlockParser;
use crate::syntax::LanguageSyntax;
use crate::types::{Block, LineIndex, LineNumber, ScopeType};

/// How much a validation issue matters downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks task creation for the file.
    Error,
    /// Informational only.
    #[allow(dead_code, reason = "reserved level, no check emits it yet")]
    Info,
    /// Surfaced, not blocking.
    Warning,
}

impl fmt::Display for Severity {
    /// Fixed-width uppercase label for text output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Error => "ERROR  ",
            Self::Info => "INFO   ",
            Self::Warning => "WARNING",
        };
        return f.write_str(label);
    }
}

/// A structural problem found in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// Only whitespace between the markers.
    #[error("empty {scope} block - no code between markers")]
    EmptyBlock {
        /// Scope type of the block.
        scope: ScopeType,
    },

    /// A definition-bearing block without a definition line.
    #[error("{scope} block has no {scope} definition line")]
    MissingDefinition {
        /// Scope type of the block.
        scope: ScopeType,
    },

    /// End marker with no open start of its type.
    #[error("orphaned {scope} end marker - no matching start")]
    OrphanedEnd {
        /// Scope type of the marker.
        scope: ScopeType,
    },

    /// Block longer than the configured limit.
    #[error("very large {scope} block ({lines} lines) - verify markers are correct")]
    OversizedBlock {
        /// Distance between the marker lines.
        lines: u32,
        /// Scope type of the block.
        scope: ScopeType,
    },

    /// Comment block that straddles a definition boundary.
    #[error("comment block crosses scope boundary - {detail}")]
    ScopeCrossing {
        /// Which boundary was crossed.
        detail: String,
    },

    /// Start marker never closed.
    #[error("unmatched {scope} start marker - missing end")]
    UnmatchedStart {
        /// Scope type of the marker.
        scope: ScopeType,
    },

    /// A definition line whose identifier cannot be extracted.
    #[error("{scope} definition `{definition}` has no valid identifier")]
    UnparsableName {
        /// The offending definition line, trimmed.
        definition: String,
        /// Scope type of the block.
        scope: ScopeType,
    },

    /// Marker indented deeper than module/class level.
    #[error("marker has unusual indentation ({indent} columns) - markers should typically be at module/class level")]
    UnusualIndentation {
        /// Leading whitespace width.
        indent: usize,
    },
}

impl IssueKind {
    /// Severity is a property of the kind, never chosen per call site.
    pub const fn severity(&self) -> Severity {
        return match self {
            Self::EmptyBlock { .. }
            | Self::MissingDefinition { .. }
            | Self::OrphanedEnd { .. }
            | Self::ScopeCrossing { .. }
            | Self::UnmatchedStart { .. }
            | Self::UnparsableName { .. } => Severity::Error,
            Self::OversizedBlock { .. } | Self::UnusualIndentation { .. } => Severity::Warning,
        };
    }
}

/// One issue, tied to a file and usually a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// File the issue was found in.
    pub file: PathBuf,
    /// What is wrong.
    #[serde(flatten)]
    pub kind: IssueKind,
    /// Marker line the issue points at.
    pub line: Option<LineNumber>,
    /// Derived from `kind`.
    pub severity: Severity,
}

impl ValidationIssue {
    /// Build an issue, deriving severity from the kind.
    fn new(file: &Path, line: Option<LineNumber>, kind: IssueKind) -> Self {
        let severity = kind.severity();
        return Self { file: file.to_path_buf(), kind, line, severity };
    }
}

impl fmt::Display for ValidationIssue {
    /// `SEVERITY file:line: message`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self.line {
            None => write!(f, "{} {}: {}", self.severity, self.file.display(), self.kind),
            Some(line) => write!(f, "{} {}:{line}: {}", self.severity, self.file.display(), self.kind),
        };
    }
}

/// Result of validating one file: the blocks that parsed, plus every issue.
#[derive(Debug, Default)]
pub struct Validation {
    /// Blocks that parsed cleanly.
    pub blocks: Vec<Block>,
    /// All issues, ordered by line.
    pub issues: Vec<ValidationIssue>,
}

impl Validation {
    /// Whether any issue blocks downstream work.
    pub fn has_errors(&self) -> bool {
        return has_errors(&self.issues);
    }
}

/// Structural checks for one language.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    /// Oversize and indentation thresholds.
    limits: &'a Limits,
    /// Definition-resolving parser.
    parser: BlockParser<'a>,
    /// Marker and definition patterns.
    syntax: &'a LanguageSyntax,
}

impl<'a> Validator<'a> {
    /// Bind a validator to a language and thresholds.
    pub const fn new(syntax: &'a LanguageSyntax, limits: &'a Limits, policy: &'a DocPolicy) -> Self {
        return Self { limits, parser: BlockParser::new(syntax, policy), syntax };
    }

    /// Run every check and parse the blocks.
    pub fn validate(&self, file: &Path, content: &str) -> Validation {
        let lines: Vec<&str> = content.lines().collect();
        let mut issues = Vec::new();

        self.check_balanced_markers(file, &lines, &mut issues);
        self.check_orphaned_ends(file, &lines, &mut issues);
        self.check_indentation(file, &lines, &mut issues);
        self.check_comment_scope(file, &lines, &mut issues);

        let outcome = self.parser.detect_blocks(content);
        for rejected in outcome.rejected {
            issues.push(ValidationIssue::new(file, Some(rejected.line), rejected.problem));
        }
        for block in &outcome.blocks {
            let span = block.start_line.distance_to(block.end_line);
            if span > self.limits.max_block_lines {
                issues.push(ValidationIssue::new(
                    file,
                    Some(block.start_line),
                    IssueKind::OversizedBlock { lines: span, scope: block.scope_type },
                ));
            }
        }

        issues.sort_by_key(|i| return i.line);
        for issue in &issues {
            tracing::debug!(file = %file.display(), issue = %issue.kind, "validation issue");
        }
        return Validation { blocks: outcome.blocks, issues };
    }

    /// Every start marker must be closed by an end marker of its type.
    fn check_balanced_markers(&self, file: &Path, lines: &[&str], issues: &mut Vec<ValidationIssue>) {
        for scope in ScopeType::ALL {
            let mut open: Vec<LineIndex> = Vec::new();
            for (i, line) in lines.iter().enumerate() {
                if self.syntax.markers.is_start(scope, line) {
                    open.push(LineIndex(i));
                } else if self.syntax.markers.is_end(scope, line) {
                    open.pop();
                }
            }
            for start in open {
                issues.push(ValidationIssue::new(
                    file,
                    Some(start.to_line_number()),
                    IssueKind::UnmatchedStart { scope },
                ));
            }
        }
    }

    /// A comment block must live entirely inside or outside a definition.
    fn check_comment_scope(&self, file: &Path, lines: &[&str], issues: &mut Vec<ValidationIssue>) {
        for (start, end) in self.comment_pairs(lines) {
            let start_line = lines.get(start.0).copied().unwrap_or("");
            let end_line = lines.get(end.0).copied().unwrap_or("");
            let start_indent = indentation(start_line);
            let end_indent = indentation(end_line);

            if start_indent != end_indent {
                let detail = format!(
                    "start at line {} (indent {start_indent}) and end at line {} (indent {end_indent}) differ",
                    start.to_line_number(),
                    end.to_line_number(),
                );
                issues.push(ValidationIssue::new(
                    file,
                    Some(start.to_line_number()),
                    IssueKind::ScopeCrossing { detail },
                ));
                continue;
            }

            let between = lines.get(start.next().0..end.0).unwrap_or(&[]);
            let crossing = between.iter().enumerate().find(|(_, line)| {
                return self.syntax.is_definition(line.trim()) && indentation(line) <= start_indent;
            });
            if let Some((offset, line)) = crossing {
                let at = LineIndex(start.next().0.saturating_add(offset)).to_line_number();
                let head = line.trim().split('(').next().unwrap_or("").trim();
                let detail = format!(
                    "starts at line {}, encounters `{head}` at line {at}, ends at line {}",
                    start.to_line_number(),
                    end.to_line_number(),
                );
                issues.push(ValidationIssue::new(
                    file,
                    Some(start.to_line_number()),
                    IssueKind::ScopeCrossing { detail },
                ));
            }
        }
    }

    /// Markers should sit at module or class depth.
    fn check_indentation(&self, file: &Path, lines: &[&str], issues: &mut Vec<ValidationIssue>) {
        for (i, line) in lines.iter().enumerate() {
            if !self.syntax.markers.is_marker(line) {
                continue;
            }
            let indent = indentation(line);
            let tabs = line.chars().take(indent).filter(|c| return *c == '\t').count();
            if indent > self.limits.max_marker_indent || tabs > 2 {
                issues.push(ValidationIssue::new(
                    file,
                    Some(LineIndex(i).to_line_number()),
                    IssueKind::UnusualIndentation { indent },
                ));
            }
        }
    }

    /// An end marker with nothing open of its type is orphaned.
    fn check_orphaned_ends(&self, file: &Path, lines: &[&str], issues: &mut Vec<ValidationIssue>) {
        for scope in ScopeType::ALL {
            let mut open = 0_usize;
            for (i, line) in lines.iter().enumerate() {
                if self.syntax.markers.is_start(scope, line) {
                    open = open.saturating_add(1);
                } else if self.syntax.markers.is_end(scope, line) {
                    if open == 0 {
                        issues.push(ValidationIssue::new(
                            file,
                            Some(LineIndex(i).to_line_number()),
                            IssueKind::OrphanedEnd { scope },
                        ));
                    } else {
                        open = open.saturating_sub(1);
                    }
                }
            }
        }
    }

    /// Matched comment marker pairs, innermost first.
    fn comment_pairs(&self, lines: &[&str]) -> Vec<(LineIndex, LineIndex)> {
        let mut open: Vec<LineIndex> = Vec::new();
        let mut pairs = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if self.syntax.markers.is_start(ScopeType::Comment, line) {
                open.push(LineIndex(i));
            } else if self.syntax.markers.is_end(ScopeType::Comment, line)
                && let Some(start) = open.pop()
            {
                pairs.push((start, LineIndex(i)));
            }
        }
        return pairs;
    }
}

/// Whether any issue is an error.
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    return issues.iter().any(|i| return i.severity == Severity::Error);
}

/// Width of the leading whitespace, in characters.
fn indentation(line: &str) -> usize {
    return line.chars().take_while(|c| return c.is_whitespace()).count();
}

/// One-line count of errors and warnings.
pub fn summary(issues: &[ValidationIssue]) -> String {
    if issues.is_empty() {
        return "all markers valid".to_string();
    }
    let errors = issues.iter().filter(|i| return i.severity == Severity::Error).count();
    let warnings = issues.iter().filter(|i| return i.severity == Severity::Warning).count();
    let mut parts = Vec::new();
    if errors > 0 {
        parts.push(format!("{errors} error(s)"));
    }
    if warnings > 0 {
        parts.push(format!("{warnings} warning(s)"));
    }
    return parts.join(", ");
}
