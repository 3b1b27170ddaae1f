//! Marker block parser.
//!
//! Scans lines for start markers, pairs each with its end marker (same-type
//! nesting aware), then resolves the definition name and any existing
//! documentation inside the block. Blocks that fail the definition
//! requirement are returned as rejections, not silently dropped, so the
//! validator can report every problem in the file at once.

use std::collections::HashMap;

use crate::config::DocPolicy;
use crate::markers::MarkerKind;
use crate::syntax::{DefinitionLine, DocPlacement, LanguageSyntax};
use crate::types::{Block, LineIndex, LineNumber, ScopeType};
use crate::validator::IssueKind;

/// Everything the parser found in one file.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Well-formed blocks in start-marker order.
    pub blocks: Vec<Block>,
    /// Matched marker pairs that could not become blocks.
    pub rejected: Vec<RejectedBlock>,
}

/// A matched marker pair that failed definition or content checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedBlock {
    /// Start marker line.
    pub line: LineNumber,
    /// Why the block was rejected.
    pub problem: IssueKind,
}

/// Keyword-line block parser for one language.
#[derive(Debug, Clone, Copy)]
pub struct BlockParser<'a> {
    /// Placeholder and minimum-length rules for existing documentation.
    policy: &'a DocPolicy,
    /// Marker and definition patterns.
    syntax: &'a LanguageSyntax,
}

impl<'a> BlockParser<'a> {
    /// Extract every block from `content`.
    ///
    /// A start marker without a matching end marker yields nothing here; the
    /// validator reports it as an unmatched start.
    pub fn detect_blocks(&self, content: &str) -> ParseOutcome {
        let lines: Vec<&str> = content.lines().collect();
        let mut outcome = ParseOutcome::default();
        let mut seen_names: HashMap<(ScopeType, String), u32> = HashMap::new();

        for (i, line) in lines.iter().enumerate() {
            let Some(marker) = self.syntax.markers.classify(line) else {
                continue;
            };
            if marker.kind != MarkerKind::Start {
                continue;
            }
            let start = LineIndex(i);
            let Some(end) = self.find_matching_end(&lines, start, marker.scope) else {
                tracing::debug!(line = %start.to_line_number(), scope = %marker.scope, "start marker without end");
                continue;
            };

            let inner = lines.get(start.next().0..end.0).unwrap_or(&[]);
            match self.analyze_block(marker.scope, inner, start.to_line_number()) {
                Err(problem) => {
                    outcome.rejected.push(RejectedBlock { line: start.to_line_number(), problem });
                },
                Ok((name, existing_documentation)) => {
                    let scope_name = disambiguate(&mut seen_names, marker.scope, name);
                    tracing::debug!(
                        scope = %marker.scope,
                        name = %scope_name,
                        start = %start.to_line_number(),
                        end = %end.to_line_number(),
                        "block"
                    );
                    outcome.blocks.push(Block {
                        end_line: end.to_line_number(),
                        existing_documentation,
                        raw_text: inner.join("\n"),
                        scope_name,
                        scope_type: marker.scope,
                        start_line: start.to_line_number(),
                    });
                },
            }
        }

        return outcome;
    }

    /// Bind a parser to a language and documentation policy.
    pub const fn new(syntax: &'a LanguageSyntax, policy: &'a DocPolicy) -> Self {
        return Self { policy, syntax };
    }

    /// Resolve the scope name and existing documentation of a matched block.
    ///
    /// # Errors
    ///
    /// Returns the structural problem when the block is empty, or when a
    /// definition-bearing block has no definition line or no valid identifier.
    fn analyze_block(
        &self,
        scope: ScopeType,
        inner: &[&str],
        start_line: LineNumber,
    ) -> Result<(String, Option<String>), IssueKind> {
        if inner.iter().all(|l| return l.trim().is_empty()) {
            return Err(IssueKind::EmptyBlock { scope });
        }

        if !scope.requires_definition() {
            let docs = self.comment_block_documentation(inner);
            return Ok((format!("block_{start_line}"), docs));
        }
        let Some(rule) = self.syntax.definition_rule(scope) else {
            return Err(IssueKind::MissingDefinition { scope });
        };

        for (offset, line) in inner.iter().enumerate() {
            let trimmed = line.trim();
            match rule.classify(trimmed) {
                None => {},
                Some(DefinitionLine::Unnamed) => {
                    return Err(IssueKind::UnparsableName { definition: trimmed.to_string(), scope });
                },
                Some(DefinitionLine::Named(name)) => {
                    let docs = self.definition_documentation(inner, offset);
                    return Ok((name, docs));
                },
            }
        }

        return Err(IssueKind::MissingDefinition { scope });
    }

    /// Comment lines inside a comment block, introducers stripped.
    fn comment_block_documentation(&self, inner: &[&str]) -> Option<String> {
        let introducer = self.syntax.comment;
        let texts: Vec<&str> = inner
            .iter()
            .map(|l| return l.trim())
            .filter(|t| return t.starts_with(introducer) && !self.syntax.markers.is_marker(t))
            .map(|t| return t.trim_start_matches(|c| return introducer.contains(c)).trim())
            .filter(|t| return !t.is_empty())
            .collect();
        return self.policy.accept(&texts.join("\n"));
    }

    /// Documentation attached to the definition at `def_offset`, per the language's placement.
    fn definition_documentation(&self, inner: &[&str], def_offset: usize) -> Option<String> {
        let text = match self.syntax.doc_placement {
            DocPlacement::AfterDefinition { quotes } => self.docs_after(inner, def_offset, quotes),
            DocPlacement::BeforeDefinition { prefixes } => docs_before(inner, def_offset, prefixes),
        }?;
        return self.policy.accept(&text);
    }

    /// Quoted literal or comment run directly after the definition line.
    fn docs_after(&self, inner: &[&str], def_offset: usize, quotes: &[&str]) -> Option<String> {
        let following = inner.get(def_offset.saturating_add(1)..).unwrap_or(&[]);
        let mut rest = following.iter().map(|l| return l.trim()).skip_while(|t| return t.is_empty());
        let first = rest.next()?;

        if let Some(quote) = quotes.iter().find(|q| return first.contains(**q)) {
            return quoted_literal(first, rest, quote);
        }

        let introducer = self.syntax.comment;
        if first.starts_with(introducer) && !self.syntax.markers.is_marker(first) {
            let run: Vec<&str> = std::iter::once(first)
                .chain(rest.take_while(|t| return t.starts_with(introducer) && !self.syntax.markers.is_marker(t)))
                .map(|t| return t.trim_start_matches(|c| return introducer.contains(c)).trim())
                .collect();
            return Some(run.join("\n"));
        }

        return None;
    }

    /// Walk forward from `start` to the end marker that closes it.
    /// Nested start markers of the same type deepen the search; other types are ignored.
    fn find_matching_end(&self, lines: &[&str], start: LineIndex, scope: ScopeType) -> Option<LineIndex> {
        let mut depth = 1_u32;
        let after = lines.get(start.next().0..)?;
        for (offset, line) in after.iter().enumerate() {
            if self.syntax.markers.is_start(scope, line) {
                depth = depth.saturating_add(1);
            } else if self.syntax.markers.is_end(scope, line) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(LineIndex(start.next().0.saturating_add(offset)));
                }
            }
        }
        return None;
    }
}

/// Give repeated names within one scope type a `@n` occurrence suffix.
fn disambiguate(seen: &mut HashMap<(ScopeType, String), u32>, scope: ScopeType, name: String) -> String {
    let count = seen.entry((scope, name.clone())).or_insert(0);
    *count = count.saturating_add(1);
    if *count == 1 {
        return name;
    }
    return format!("{name}@{count}");
}

/// Doc-comment run directly above the definition line, attributes skipped.
fn docs_before(inner: &[&str], def_offset: usize, prefixes: &[&str]) -> Option<String> {
    let above = inner.get(..def_offset).unwrap_or(&[]);
    let mut collected: Vec<&str> = Vec::new();
    for line in above.iter().rev().map(|l| return l.trim()) {
        if line.starts_with("#[") {
            continue;
        }
        let Some(text) = prefixes.iter().find_map(|p| return line.strip_prefix(*p)) else {
            break;
        };
        collected.push(text.trim());
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    return Some(collected.join("\n"));
}

/// Text between the first and last occurrence of `quote`, spanning lines until it closes.
fn quoted_literal<'l>(first: &'l str, rest: impl Iterator<Item = &'l str>, quote: &str) -> Option<String> {
    let mut literal = vec![first];
    if first.matches(quote).count() < 2 {
        let mut closed = false;
        for line in rest {
            literal.push(line);
            if line.contains(quote) {
                closed = true;
                break;
            }
        }
        if !closed {
            return None;
        }
    }
    let joined = literal.join("\n");
    let (_, after_open) = joined.split_once(quote)?;
    let (body, _) = after_open.rsplit_once(quote)?;
    return Some(body.trim().to_string());
}
