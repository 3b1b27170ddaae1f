/// Core domain types for docmark blocks, hashes, and change reports.
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A SHA-256 content fingerprint: 64 hex chars, always lowercase.
/// Newtype prevents mixing with arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(
    /// The hex-encoded SHA-256 digest string.
    pub String,
);

impl fmt::Display for ContentHash {
    /// Print the raw hex digest.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

/// Zero-based index into the in-memory line vector.
///
/// Only ever produced by enumerating lines of a file; convert with
/// [`LineIndex::to_line_number`] before anything leaves the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineIndex(
    /// Position in the `lines()` vector.
    pub usize,
);

impl LineIndex {
    /// The index of the following line.
    pub const fn next(self) -> Self {
        return Self(self.0.saturating_add(1));
    }

    /// External, one-based line number for this index.
    pub fn to_line_number(self) -> LineNumber {
        let one_based = self.0.saturating_add(1);
        return LineNumber(u32::try_from(one_based).unwrap_or(u32::MAX));
    }
}

/// One-based line number as shown to users, stored in the lockfile, and printed in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineNumber(
    /// The one-based line number.
    pub u32,
);

impl LineNumber {
    /// Line distance from `self` forward to `end`; zero when `end` is not after `self`.
    pub const fn distance_to(self, end: Self) -> u32 {
        return end.0.saturating_sub(self.0);
    }

    /// Internal, zero-based index for this line number.
    pub fn to_index(self) -> LineIndex {
        let zero_based = self.0.saturating_sub(1);
        return LineIndex(usize::try_from(zero_based).unwrap_or(usize::MAX));
    }
}

impl fmt::Display for LineNumber {
    /// Print the bare number, honouring width and alignment.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return fmt::Display::fmt(&self.0, f);
    }
}

/// Classification of a marker-delimited block. Closed set; each variant
/// knows its marker tag and whether it needs a definition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    /// Class, struct, enum, or trait documentation (`@llm-class`).
    Class,
    /// Free-standing comment span (`@llm-comm`); no definition line.
    Comment,
    /// Function or method documentation (`@llm-doc`).
    Method,
    /// Module-level documentation (`@llm-module`).
    Module,
}

impl ScopeType {
    /// All scope types, in the order the change detector compares levels.
    pub const ALL: [Self; 4] = [Self::Module, Self::Class, Self::Method, Self::Comment];

    /// Lowercase label used in messages.
    pub const fn label(self) -> &'static str {
        return match self {
            Self::Class => "class",
            Self::Comment => "comment",
            Self::Method => "method",
            Self::Module => "module",
        };
    }

    /// Whether blocks of this type must enclose a named definition line.
    pub const fn requires_definition(self) -> bool {
        return match self {
            Self::Class | Self::Method | Self::Module => true,
            Self::Comment => false,
        };
    }

    /// Marker tag without the `@` sigil or the `-start`/`-end` suffix.
    pub const fn tag(self) -> &'static str {
        return match self {
            Self::Class => "llm-class",
            Self::Comment => "llm-comm",
            Self::Method => "llm-doc",
            Self::Module => "llm-module",
        };
    }
}

impl fmt::Display for ScopeType {
    /// Print the lowercase label.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.label());
    }
}

/// Granularity of a stored or computed hash: the whole file, or one scope type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashLevel {
    /// Class blocks.
    Class,
    /// Comment blocks.
    Comment,
    /// Whole-file hash, independent of block boundaries.
    File,
    /// Method blocks.
    Method,
    /// Module blocks.
    Module,
}

impl HashLevel {
    /// Stable sort rank: file first, then the scope levels in comparison order.
    pub const fn rank(self) -> u8 {
        return match self {
            Self::File => 0,
            Self::Module => 1,
            Self::Class => 2,
            Self::Method => 3,
            Self::Comment => 4,
        };
    }
}

impl From<ScopeType> for HashLevel {
    /// Every scope type has its own hash level.
    fn from(scope: ScopeType) -> Self {
        return match scope {
            ScopeType::Class => Self::Class,
            ScopeType::Comment => Self::Comment,
            ScopeType::Method => Self::Method,
            ScopeType::Module => Self::Module,
        };
    }
}

impl fmt::Display for HashLevel {
    /// Print the lowercase level name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Class => "class",
            Self::Comment => "comment",
            Self::File => "file",
            Self::Method => "method",
            Self::Module => "module",
        };
        return f.write_str(label);
    }
}

/// Scope a change report speaks for. `None` means "nothing to regenerate".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportScope {
    /// Class-level changes.
    Class,
    /// Comment-level changes.
    Comment,
    /// The file has never been seen; everything is new.
    File,
    /// Method-level changes.
    Method,
    /// Module-level changes.
    Module,
    /// Nothing tracked changed.
    None,
}

impl From<ScopeType> for ReportScope {
    /// Level reports use the scope type they compared.
    fn from(scope: ScopeType) -> Self {
        return match scope {
            ScopeType::Class => Self::Class,
            ScopeType::Comment => Self::Comment,
            ScopeType::Method => Self::Method,
            ScopeType::Module => Self::Module,
        };
    }
}

impl fmt::Display for ReportScope {
    /// Print the uppercase scope name used in text output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Class => "CLASS",
            Self::Comment => "COMMENT",
            Self::File => "FILE",
            Self::Method => "METHOD",
            Self::Module => "MODULE",
            Self::None => "NONE",
        };
        return f.pad(label);
    }
}

/// A parsed, marker-delimited documentable region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Line of the end marker.
    pub end_line: LineNumber,
    /// Real documentation already present, or `None` when absent or a placeholder.
    pub existing_documentation: Option<String>,
    /// Verbatim text strictly between the marker lines.
    pub raw_text: String,
    /// Definition identifier, or `block_<start_line>` for comment blocks.
    pub scope_name: String,
    /// Which marker pair delimits this block.
    pub scope_type: ScopeType,
    /// Line of the start marker.
    pub start_line: LineNumber,
}

impl Block {
    /// Whether `other` lies strictly inside this block's markers.
    pub fn strictly_contains(&self, other: &Self) -> bool {
        return other.start_line > self.start_line && other.end_line < self.end_line;
    }
}

/// A fingerprint for one scope of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeHash {
    /// SHA-256 of the normalized text.
    pub content_hash: ContentHash,
    /// Last line covered (end marker for blocks, last line for the file).
    pub line_end: LineNumber,
    /// First line covered (start marker for blocks, 1 for the file).
    pub line_start: LineNumber,
    /// Scope identifier; the file path for file-level hashes.
    pub scope_name: String,
    /// Level this hash belongs to.
    pub scope_type: HashLevel,
}

/// Outcome of one detection pass at one scope level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    /// Scope names whose hash differs from the stored one.
    pub changed_items: Vec<String>,
    /// File the report is about.
    pub file_path: PathBuf,
    /// Scope names with no stored counterpart.
    pub new_items: Vec<String>,
    /// Human-readable explanation.
    pub reason: String,
    /// Level the report speaks for.
    pub scope: ReportScope,
    /// Scope names whose hash matches the stored one.
    pub unchanged_items: Vec<String>,
}

impl ChangeReport {
    /// Whether this report asks for regeneration work.
    pub const fn has_work(&self) -> bool {
        return !self.changed_items.is_empty() || !self.new_items.is_empty();
    }
}
