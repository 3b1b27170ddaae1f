/// Keyword-line syntax tables, resolved by file extension.
use std::path::Path;

use regex::Regex;

use crate::error::Error;
use crate::markers::MarkerPatterns;
use crate::types::ScopeType;

/// Outer and inner doc-comment prefixes. These are `#[doc]` attributes, not comments.
const RUST_DOC_PREFIXES: &[&str] = &["///", "//!"];

/// Optional visibility prefix shared by Rust item rules.
const RUST_VIS: &str = r"(?:pub(?:\([^)]*\))?\s+)?";

/// Where a language keeps the documentation of a definition.
#[derive(Debug, Clone, Copy)]
pub enum DocPlacement {
    /// A quoted literal, or a run of comment lines, directly after the definition line.
    AfterDefinition {
        /// Quote delimiters that open and close a multi-line literal.
        quotes: &'static [&'static str],
    },
    /// A run of doc-comment lines directly above the definition line.
    BeforeDefinition {
        /// Line prefixes that mark doc comments.
        prefixes: &'static [&'static str],
    },
}

/// Result of testing a line against a definition rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionLine {
    /// The line is a definition and its identifier was extracted.
    Named(String),
    /// The line starts like a definition but carries no valid identifier.
    Unnamed,
}

/// Prefix and name regexes for one kind of definition.
#[derive(Debug)]
pub struct DefinitionRule {
    /// Captures the identifier in group 1.
    name: Regex,
    /// Matches any line that is a definition of this kind.
    prefix: Regex,
}

impl DefinitionRule {
    /// Classify an already-trimmed line. `None` when it is not a definition at all.
    pub fn classify(&self, trimmed: &str) -> Option<DefinitionLine> {
        if !self.prefix.is_match(trimmed) {
            return None;
        }
        let name = self
            .name
            .captures(trimmed)
            .and_then(|caps| return caps.get(1))
            .map(|m| return m.as_str().to_string());
        return Some(name.map_or(DefinitionLine::Unnamed, DefinitionLine::Named));
    }

    /// Compile a rule from its two patterns.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if either regex is invalid.
    fn new(prefix: &str, name: &str) -> Result<Self, Error> {
        return Ok(Self { name: Regex::new(name)?, prefix: Regex::new(prefix)? });
    }
}

/// Everything the parser, validator, and normalizer need to know about one language.
#[derive(Debug)]
pub struct LanguageSyntax {
    /// Class/struct/trait definitions.
    class: DefinitionRule,
    /// Line comment introducer.
    pub comment: &'static str,
    /// Where existing documentation lives.
    pub doc_placement: DocPlacement,
    /// Line prefixes that look like comments but carry documentation.
    doc_prefixes: &'static [&'static str],
    /// Marker patterns under this language's comment introducer.
    pub markers: MarkerPatterns,
    /// Function/method definitions.
    method: DefinitionRule,
    /// Module definitions.
    module: DefinitionRule,
    /// Short language name for logs.
    pub name: &'static str,
}

impl LanguageSyntax {
    /// The definition rule a scope type requires, or `None` for comment blocks.
    pub const fn definition_rule(&self, scope: ScopeType) -> Option<&DefinitionRule> {
        return match scope {
            ScopeType::Class => Some(&self.class),
            ScopeType::Comment => None,
            ScopeType::Method => Some(&self.method),
            ScopeType::Module => Some(&self.module),
        };
    }

    /// Whether a trimmed line opens any kind of definition (a new scope).
    pub fn is_definition(&self, trimmed: &str) -> bool {
        return [&self.module, &self.class, &self.method]
            .into_iter()
            .any(|rule| return rule.prefix.is_match(trimmed));
    }

    /// Whether a trimmed line is documentation rather than a plain comment.
    pub fn is_doc_line(&self, trimmed: &str) -> bool {
        return self.doc_prefixes.iter().any(|p| return trimmed.starts_with(p));
    }

    /// Python: `#` comments, `class`/`def` keywords, docstrings after the definition.
    /// Python has no module keyword, so module blocks name themselves with `# module: <name>`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if a built-in regex fails to compile.
    pub fn python() -> Result<Self, Error> {
        return Ok(Self {
            class: DefinitionRule::new(r"^class\s", r"^class\s+([A-Za-z_]\w*)\s*[(:\[]")?,
            comment: "#",
            doc_placement: DocPlacement::AfterDefinition { quotes: &[r#"""""#, "'''"] },
            doc_prefixes: &[],
            markers: MarkerPatterns::new("#")?,
            method: DefinitionRule::new(
                r"^(?:async\s+)?def\s",
                r"^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*[(\[]",
            )?,
            module: DefinitionRule::new(
                r"^#\s*module:",
                r"^#\s*module:\s*([A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*)\s*$",
            )?,
            name: "python",
        });
    }

    /// Rust: `//` comments, item keywords, doc comments above the definition.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if a built-in regex fails to compile.
    pub fn rust() -> Result<Self, Error> {
        let fn_prefix = format!(
            r#"^{RUST_VIS}(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s"#
        );
        let fn_name = format!(r"{fn_prefix}+([A-Za-z_]\w*)\s*[<(]");
        let item_prefix = format!(r"^{RUST_VIS}(?:struct|enum|trait|union)\s");
        let item_name = format!(r"{item_prefix}+([A-Za-z_]\w*)\b");
        let mod_prefix = format!(r"^{RUST_VIS}mod\s");
        let mod_name = format!(r"{mod_prefix}+([A-Za-z_]\w*)\s*[{{;]");

        return Ok(Self {
            class: DefinitionRule::new(&item_prefix, &item_name)?,
            comment: "//",
            doc_placement: DocPlacement::BeforeDefinition { prefixes: RUST_DOC_PREFIXES },
            doc_prefixes: RUST_DOC_PREFIXES,
            markers: MarkerPatterns::new("//")?,
            method: DefinitionRule::new(&fn_prefix, &fn_name)?,
            module: DefinitionRule::new(&mod_prefix, &mod_name)?,
            name: "rust",
        });
    }
}

/// All supported languages, compiled once per run.
#[derive(Debug)]
pub struct SyntaxRegistry {
    /// `.py` files.
    python: LanguageSyntax,
    /// `.rs` files.
    rust: LanguageSyntax,
}

impl SyntaxRegistry {
    /// Map a file extension to its syntax table.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedLanguage` for unknown extensions.
    pub fn for_path(&self, path: &Path) -> Result<&LanguageSyntax, Error> {
        let ext = path.extension().and_then(|e| return e.to_str()).unwrap_or("");

        return match ext {
            "py" | "pyi" => Ok(&self.python),
            "rs" => Ok(&self.rust),
            _ => Err(Error::UnsupportedLanguage { ext: ext.to_string() }),
        };
    }

    /// Whether the path has an extension with a syntax table.
    pub fn is_supported(&self, path: &Path) -> bool {
        return self.for_path(path).is_ok();
    }

    /// Compile every built-in language.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if a built-in regex fails to compile.
    pub fn new() -> Result<Self, Error> {
        return Ok(Self { python: LanguageSyntax::python()?, rust: LanguageSyntax::rust()? });
    }
}
