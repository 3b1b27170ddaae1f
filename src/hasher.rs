/// Comment- and whitespace-insensitive content hashing at file and block level.
use std::path::Path;

use sha2::{Digest as _, Sha256};

use crate::syntax::LanguageSyntax;
use crate::types::{Block, CodeHash, ContentHash, HashLevel, LineIndex, LineNumber, ScopeType};

/// Current hashes for one file, grouped by level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedHashes {
    /// Class block hashes in block order.
    pub classes: Vec<CodeHash>,
    /// Comment block hashes in block order.
    pub comments: Vec<CodeHash>,
    /// Whole-file hash.
    pub file: CodeHash,
    /// Method block hashes in block order.
    pub methods: Vec<CodeHash>,
    /// Module block hashes in block order.
    pub modules: Vec<CodeHash>,
}

impl ComputedHashes {
    /// Every hash row, file first, then module, class, method, comment.
    pub fn all_rows(&self) -> impl Iterator<Item = &CodeHash> {
        return std::iter::once(&self.file)
            .chain(ScopeType::ALL.into_iter().flat_map(|scope| return self.level(scope)));
    }

    /// Hashes for one scope level.
    pub fn level(&self, scope: ScopeType) -> &[CodeHash] {
        return match scope {
            ScopeType::Class => &self.classes,
            ScopeType::Comment => &self.comments,
            ScopeType::Method => &self.methods,
            ScopeType::Module => &self.modules,
        };
    }

    /// Every block scope name, level by level.
    pub fn scope_names(&self) -> Vec<String> {
        return ScopeType::ALL
            .into_iter()
            .flat_map(|scope| return self.level(scope))
            .map(|h| return h.scope_name.clone())
            .collect();
    }

    /// Mutable access used while grouping.
    fn level_mut(&mut self, scope: ScopeType) -> &mut Vec<CodeHash> {
        return match scope {
            ScopeType::Class => &mut self.classes,
            ScopeType::Comment => &mut self.comments,
            ScopeType::Method => &mut self.methods,
            ScopeType::Module => &mut self.modules,
        };
    }
}

/// Normalizes and hashes text under one language's comment and marker rules.
#[derive(Debug, Clone, Copy)]
pub struct Hasher<'a> {
    /// Comment introducer and marker patterns.
    syntax: &'a LanguageSyntax,
}

impl<'a> Hasher<'a> {
    /// Hash every level of a file in one pass.
    ///
    /// The file hash covers the whole content regardless of block boundaries.
    /// Each block hash covers only the block's own lines: lines belonging to
    /// blocks nested strictly inside it are left out, so a method edit never
    /// shows up as a change of its enclosing class.
    pub fn calculate_all_hashes(&self, file_path: &Path, content: &str, blocks: &[Block]) -> ComputedHashes {
        let line_count = content.lines().count().max(1);
        let mut hashes = ComputedHashes {
            classes: Vec::new(),
            comments: Vec::new(),
            file: CodeHash {
                content_hash: self.hash(content),
                line_end: LineIndex(line_count.saturating_sub(1)).to_line_number(),
                line_start: LineNumber(1),
                scope_name: file_path.display().to_string(),
                scope_type: HashLevel::File,
            },
            methods: Vec::new(),
            modules: Vec::new(),
        };

        for block in blocks {
            let nested: Vec<&Block> = blocks.iter().filter(|b| return block.strictly_contains(b)).collect();
            let own = own_block_content(block, &nested);
            hashes.level_mut(block.scope_type).push(CodeHash {
                content_hash: self.hash(&own),
                line_end: block.end_line,
                line_start: block.start_line,
                scope_name: block.scope_name.clone(),
                scope_type: HashLevel::from(block.scope_type),
            });
        }

        tracing::debug!(
            file = %file_path.display(),
            blocks = blocks.len(),
            file_hash = %hashes.file.content_hash,
            "computed hashes"
        );
        return hashes;
    }

    /// SHA-256 of the normalized text.
    pub fn hash(&self, text: &str) -> ContentHash {
        let digest = Sha256::digest(self.normalize(text).as_bytes());
        return ContentHash(format!("{digest:x}"));
    }

    /// Bind a hasher to a language.
    pub const fn new(syntax: &'a LanguageSyntax) -> Self {
        return Self { syntax };
    }

    /// Strip trailing comments and surrounding whitespace from every line,
    /// drop lines left empty, join the rest with `\n`.
    ///
    /// Marker lines are kept (trimmed) so wrapping code in a new marker pair
    /// is a visible change. Doc-comment lines are kept the same way: they are
    /// the documentation. Normalizing twice is the same as normalizing once.
    pub fn normalize(&self, text: &str) -> String {
        let mut lines = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if self.syntax.markers.is_marker(trimmed) || self.syntax.is_doc_line(trimmed) {
                lines.push(trimmed);
                continue;
            }
            let code = strip_trailing_comment(line, self.syntax.comment).trim();
            if !code.is_empty() {
                lines.push(code);
            }
        }
        return lines.join("\n");
    }
}

/// Lines of `block.raw_text` that are not covered by any nested block.
fn own_block_content(block: &Block, nested: &[&Block]) -> String {
    if nested.is_empty() {
        return block.raw_text.clone();
    }
    let first_inner = block.start_line.to_index().next();
    return block
        .raw_text
        .split('\n')
        .enumerate()
        .filter(|(offset, _)| {
            let line = LineIndex(first_inner.0.saturating_add(*offset)).to_line_number();
            return !nested.iter().any(|n| return n.start_line <= line && line <= n.end_line);
        })
        .map(|(_, text)| return text)
        .collect::<Vec<_>>()
        .join("\n");
}

/// Cut a line at the first comment introducer not preceded by a backslash.
fn strip_trailing_comment<'l>(line: &'l str, introducer: &str) -> &'l str {
    for (at, _) in line.match_indices(introducer) {
        let Some(before) = line.get(..at) else {
            continue;
        };
        if !before.ends_with('\\') {
            return before;
        }
    }
    return line;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, reason = "test assertions")]
mod tests {
    use super::*;

    fn python() -> LanguageSyntax {
        return LanguageSyntax::python().unwrap();
    }

    fn block(scope_type: ScopeType, name: &str, start: u32, end: u32, raw: &str) -> Block {
        return Block {
            end_line: LineNumber(end),
            existing_documentation: None,
            raw_text: raw.to_string(),
            scope_name: name.to_string(),
            scope_type,
            start_line: LineNumber(start),
        };
    }

    #[test]
    fn normalize_strips_comments_whitespace_and_blank_lines() {
        let py = python();
        let hasher = Hasher::new(&py);
        let text = "  def f(x):   # entry point\n\n\n        return x  \n# full comment\n";
        assert_eq!(hasher.normalize(text), "def f(x):\nreturn x");
    }

    #[test]
    fn normalize_is_a_projection() {
        let py = python();
        let hasher = Hasher::new(&py);
        let samples = [
            "a = 1 # c\n\n  b = '\\#' # real\n",
            "\\## heading\n    # @llm-doc-start\ncode",
            "",
            "#\n#\n   \n",
            "x = \"#\" \\ # tail",
        ];
        for sample in samples {
            let once = hasher.normalize(sample);
            assert_eq!(hasher.normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn rust_doc_comments_are_hashed_plain_comments_are_not() {
        let rs = LanguageSyntax::rust().unwrap();
        let hasher = Hasher::new(&rs);
        let text = "    /// Area of the circle.\n    //! crate docs\n    // scratch note\n    fn area() {} // tail\n";
        assert_eq!(hasher.normalize(text), "/// Area of the circle.\n//! crate docs\nfn area() {}");
        assert_eq!(hasher.normalize(&hasher.normalize(text)), hasher.normalize(text));
        assert_ne!(hasher.hash("/// Old docs.\nfn f() {}"), hasher.hash("/// New docs.\nfn f() {}"));
        assert_eq!(hasher.hash("// old\nfn f() {}"), hasher.hash("// new\nfn f() {}"));
    }

    #[test]
    fn escaped_introducer_is_kept() {
        assert_eq!(strip_trailing_comment(r"a = '\#' # note", "#"), r"a = '\#' ");
        assert_eq!(strip_trailing_comment("let u = 1; // why", "//"), "let u = 1; ");
    }

    #[test]
    fn marker_lines_survive_normalization() {
        let py = python();
        let hasher = Hasher::new(&py);
        let bare = "def f():\n    pass\n";
        let marked = "# @llm-doc-start\ndef f():\n    pass\n# @llm-doc-end\n";
        assert_ne!(hasher.hash(bare), hasher.hash(marked));
        assert_eq!(hasher.normalize("   #   @llm-doc-end  "), "#   @llm-doc-end");
    }

    #[test]
    fn cosmetic_edits_keep_hash_token_edits_change_it() {
        let py = python();
        let hasher = Hasher::new(&py);
        let original = "def bar(self):\n    return 1  # one\n";
        let cosmetic = "\n\ndef bar(self):   \n\n        return 1  # the number one\n\n";
        let semantic = "def bar(self):\n    return 2  # one\n";
        assert_eq!(hasher.hash(original), hasher.hash(cosmetic));
        assert_ne!(hasher.hash(original), hasher.hash(semantic));
        assert_eq!(hasher.hash(original).0.len(), 64);
    }

    #[test]
    fn nested_blocks_are_excluded_from_parent_hash() {
        let py = python();
        let hasher = Hasher::new(&py);
        // 1 class-start, 2 class Foo, 3 doc, 4 doc-start, 5 def bar, 6 body, 7 doc-end, 8 class-end
        let class_raw = "class Foo:\n    \"\"\"Foo docs.\"\"\"\n    # @llm-doc-start\n    def bar(self):\n        pass\n    # @llm-doc-end";
        let method_raw = "    def bar(self):\n        pass";
        let edited_class_raw = class_raw.replace("pass", "return 1");
        let edited_method_raw = method_raw.replace("pass", "return 1");

        let before = vec![
            block(ScopeType::Class, "Foo", 1, 8, class_raw),
            block(ScopeType::Method, "bar", 4, 7, method_raw),
        ];
        let after = vec![
            block(ScopeType::Class, "Foo", 1, 8, &edited_class_raw),
            block(ScopeType::Method, "bar", 4, 7, &edited_method_raw),
        ];

        let h1 = hasher.calculate_all_hashes(Path::new("a.py"), "", &before);
        let h2 = hasher.calculate_all_hashes(Path::new("a.py"), "", &after);
        assert_eq!(h1.classes[0].content_hash, h2.classes[0].content_hash);
        assert_ne!(h1.methods[0].content_hash, h2.methods[0].content_hash);
    }

    #[test]
    fn groups_by_level_and_covers_whole_file() {
        let py = python();
        let hasher = Hasher::new(&py);
        let blocks = vec![
            block(ScopeType::Module, "pkg", 1, 3, "# module: pkg"),
            block(ScopeType::Comment, "block_4", 4, 6, "x = 1"),
        ];
        let hashes = hasher.calculate_all_hashes(Path::new("m.py"), "l1\nl2\nl3\nl4\nl5\nl6\n", &blocks);
        assert_eq!(hashes.file.scope_type, HashLevel::File);
        assert_eq!(hashes.file.line_end, LineNumber(6));
        assert_eq!(hashes.modules.len(), 1);
        assert_eq!(hashes.comments.len(), 1);
        assert_eq!(hashes.scope_names(), vec!["pkg".to_string(), "block_4".to_string()]);
        assert_eq!(hashes.all_rows().count(), 3);
    }
}
