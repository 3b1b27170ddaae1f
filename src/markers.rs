//! Marker line recognition.
//!
//! A marker is a full comment line `<comment> @<tag>-start` or
//! `<comment> @<tag>-end`. Patterns are compiled once per language and
//! borrowed by the parser, validator, and normalizer.

use regex::Regex;

use crate::error::Error;
use crate::types::ScopeType;

/// Which side of a block a marker line opens or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// `@<tag>-end`.
    End,
    /// `@<tag>-start`.
    Start,
}

/// A recognised marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    /// Start or end.
    pub kind: MarkerKind,
    /// Scope type the tag belongs to.
    pub scope: ScopeType,
}

/// Compiled start/end pair for one tag.
#[derive(Debug)]
struct MarkerPair {
    /// Matches the end marker line.
    end: Regex,
    /// Matches the start marker line.
    start: Regex,
}

impl MarkerPair {
    /// Compile the pair for `scope` under the given comment introducer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if the generated regex is invalid.
    fn compile(comment: &str, scope: ScopeType) -> Result<Self, Error> {
        let comment = regex::escape(comment);
        let tag = regex::escape(scope.tag());
        return Ok(Self {
            end: Regex::new(&format!(r"^\s*{comment}\s*@{tag}-end\s*$"))?,
            start: Regex::new(&format!(r"^\s*{comment}\s*@{tag}-start\s*$"))?,
        });
    }
}

/// Immutable marker patterns for every scope type of one language.
#[derive(Debug)]
pub struct MarkerPatterns {
    /// `@llm-class` pair.
    class: MarkerPair,
    /// `@llm-comm` pair.
    comment: MarkerPair,
    /// `@llm-doc` pair.
    method: MarkerPair,
    /// `@llm-module` pair.
    module: MarkerPair,
}

impl MarkerPatterns {
    /// Recognise a marker line, if it is one.
    pub fn classify(&self, line: &str) -> Option<Marker> {
        for scope in ScopeType::ALL {
            let pair = self.pair(scope);
            if pair.start.is_match(line) {
                return Some(Marker { kind: MarkerKind::Start, scope });
            }
            if pair.end.is_match(line) {
                return Some(Marker { kind: MarkerKind::End, scope });
            }
        }
        return None;
    }

    /// Whether `line` is the end marker for `scope`.
    pub fn is_end(&self, scope: ScopeType, line: &str) -> bool {
        return self.pair(scope).end.is_match(line);
    }

    /// Whether `line` is any start or end marker.
    pub fn is_marker(&self, line: &str) -> bool {
        return self.classify(line).is_some();
    }

    /// Whether `line` is the start marker for `scope`.
    pub fn is_start(&self, scope: ScopeType, line: &str) -> bool {
        return self.pair(scope).start.is_match(line);
    }

    /// Compile all four marker pairs for a comment introducer such as `#` or `//`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if any generated regex is invalid.
    pub fn new(comment: &str) -> Result<Self, Error> {
        return Ok(Self {
            class: MarkerPair::compile(comment, ScopeType::Class)?,
            comment: MarkerPair::compile(comment, ScopeType::Comment)?,
            method: MarkerPair::compile(comment, ScopeType::Method)?,
            module: MarkerPair::compile(comment, ScopeType::Module)?,
        });
    }

    /// The compiled pair for a scope type.
    const fn pair(&self, scope: ScopeType) -> &MarkerPair {
        return match scope {
            ScopeType::Class => &self.class,
            ScopeType::Comment => &self.comment,
            ScopeType::Method => &self.method,
            ScopeType::Module => &self.module,
        };
    }
}
