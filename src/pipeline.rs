//! Per-file pipeline: size gate, validation, detection, store refresh.

use std::path::Path;

use crate::config::Config;
use crate::detector::ChangeDetector;
use crate::error::Error;
use crate::store::HashStore;
use crate::syntax::SyntaxRegistry;
use crate::types::{Block, ChangeReport};
use crate::validator::{ValidationIssue, Validator, has_errors};

/// Validated blocks and every structural issue for one file.
#[derive(Debug, Default)]
pub struct FileAnalysis {
    /// Parsed blocks; empty whenever `issues` holds an error.
    pub blocks: Vec<Block>,
    /// Errors and warnings, ordered by line.
    pub issues: Vec<ValidationIssue>,
}

impl FileAnalysis {
    /// Whether the file is excluded from detection.
    pub fn has_errors(&self) -> bool {
        return has_errors(&self.issues);
    }
}

/// What one processed file produced.
#[derive(Debug)]
pub struct FileOutcome {
    /// Validation result the reports were computed from.
    pub analysis: FileAnalysis,
    /// Change reports; empty when validation failed.
    pub reports: Vec<ChangeReport>,
}

/// Whether processing may write the hash store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Compare only; stored rows stay as they are.
    ReadOnly,
    /// Replace the file's rows after detection.
    Update,
}

/// Runs files through validation and detection under one configuration.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    /// Limits and documentation policy.
    config: &'a Config,
    /// Syntax tables by extension.
    registry: &'a SyntaxRegistry,
}

impl<'a> Pipeline<'a> {
    /// Gate on size, then validate. A file with any error carries no blocks.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileTooLarge` above the configured limit,
    /// or `Error::UnsupportedLanguage` for an unknown extension.
    pub fn analyze_file(&self, path: &Path, content: &str) -> Result<FileAnalysis, Error> {
        let size_bytes = u64::try_from(content.len()).unwrap_or(u64::MAX);
        let max_bytes = self.config.limits.max_file_bytes;
        if size_bytes > max_bytes {
            return Err(Error::FileTooLarge { file: path.to_path_buf(), max_bytes, size_bytes });
        }

        let syntax = self.registry.for_path(path)?;
        let validation = Validator::new(syntax, &self.config.limits, &self.config.docs).validate(path, content);
        if validation.has_errors() {
            return Ok(FileAnalysis { blocks: Vec::new(), issues: validation.issues });
        }
        return Ok(FileAnalysis { blocks: validation.blocks, issues: validation.issues });
    }

    /// Bind a pipeline to a configuration and syntax registry.
    pub const fn new(config: &'a Config, registry: &'a SyntaxRegistry) -> Self {
        return Self { config, registry };
    }

    /// Analyze, detect, and (in `Update` mode) replace the file's stored rows.
    ///
    /// A file with structural errors yields no reports and leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns errors from [`Pipeline::analyze_file`] and propagates store failures.
    pub fn process_file<S: HashStore + ?Sized>(
        &self,
        store: &mut S,
        path: &Path,
        content: &str,
        mode: StoreMode,
    ) -> Result<FileOutcome, Error> {
        let analysis = self.analyze_file(path, content)?;
        if analysis.has_errors() {
            tracing::warn!(
                file = %path.display(),
                issues = analysis.issues.len(),
                "structural errors, skipping change detection"
            );
            return Ok(FileOutcome { analysis, reports: Vec::new() });
        }

        let syntax = self.registry.for_path(path)?;
        let detector = ChangeDetector::new(syntax);
        let detection = detector.detect(store, path, content, &analysis.blocks)?;
        if mode == StoreMode::Update {
            ChangeDetector::update_stored_hashes(store, path, &detection.hashes)?;
        }

        tracing::info!(
            file = %path.display(),
            language = syntax.name,
            blocks = analysis.blocks.len(),
            reports = detection.reports.len(),
            "processed"
        );
        return Ok(FileOutcome { analysis, reports: detection.reports });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::ReportScope;
    use crate::validator::IssueKind;

    const GOOD: &str = "\
# @llm-doc-start
def run():
    return 1
# @llm-doc-end
";

    const CROSSING: &str = "\
def work():
    # @llm-comm-start
    x = 1
# @llm-comm-end
# @llm-doc-start
def run():
    return 1
# @llm-doc-end
";

    fn with_pipeline<T>(config: &Config, f: impl FnOnce(Pipeline<'_>) -> T) -> T {
        let registry = SyntaxRegistry::new().unwrap();
        return f(Pipeline::new(config, &registry));
    }

    #[test]
    fn erroring_file_has_no_blocks_and_leaves_store_alone() {
        let config = Config::scan_everything_by_default();
        let mut store = MemoryStore::default();
        let outcome = with_pipeline(&config, |p| {
            return p.process_file(&mut store, Path::new("w.py"), CROSSING, StoreMode::Update).unwrap();
        });
        assert!(outcome.analysis.blocks.is_empty());
        assert!(outcome.reports.is_empty());
        assert!(matches!(outcome.analysis.issues[0].kind, IssueKind::ScopeCrossing { .. }));
        assert!(store.rows(Path::new("w.py")).is_empty());
    }

    #[test]
    fn read_only_mode_does_not_persist() {
        let config = Config::scan_everything_by_default();
        let mut store = MemoryStore::default();
        with_pipeline(&config, |p| {
            let first = p.process_file(&mut store, Path::new("r.py"), GOOD, StoreMode::ReadOnly).unwrap();
            assert_eq!(first.reports[0].scope, ReportScope::File);
            let second = p.process_file(&mut store, Path::new("r.py"), GOOD, StoreMode::Update).unwrap();
            assert_eq!(second.reports[0].scope, ReportScope::File);
            let third = p.process_file(&mut store, Path::new("r.py"), GOOD, StoreMode::Update).unwrap();
            assert_eq!(third.reports[0].scope, ReportScope::None);
        });
        assert_eq!(store.rows(Path::new("r.py")).len(), 2);
    }

    #[test]
    fn oversized_content_is_refused() {
        let mut config = Config::scan_everything_by_default();
        config.limits.max_file_bytes = 8;
        let result = with_pipeline(&config, |p| return p.analyze_file(Path::new("big.py"), GOOD));
        assert!(matches!(result, Err(Error::FileTooLarge { max_bytes: 8, .. })));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let config = Config::scan_everything_by_default();
        let result = with_pipeline(&config, |p| return p.analyze_file(Path::new("notes.txt"), GOOD));
        assert!(matches!(result, Err(Error::UnsupportedLanguage { .. })));
    }

    #[test]
    fn warnings_do_not_block_detection() {
        let mut config = Config::scan_everything_by_default();
        config.limits.max_block_lines = 1;
        let analysis = with_pipeline(&config, |p| return p.analyze_file(Path::new("w.py"), GOOD).unwrap());
        assert_eq!(analysis.blocks.len(), 1);
        assert!(!analysis.has_errors());
        assert!(matches!(analysis.issues[0].kind, IssueKind::OversizedBlock { lines: 3, .. }));
    }
}
