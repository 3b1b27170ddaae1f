//! CLI commands for docmark: scan, check, validate, blocks.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;

use crate::config::Config;
use crate::diagnostics;
use crate::error::Error;
use crate::pipeline::{FileAnalysis, Pipeline, StoreMode};
use crate::scanner::{self, SourceFile};
use crate::store::{HashLockfile, HashStore};
use crate::syntax::SyntaxRegistry;
use crate::types::{Block, ChangeReport, ReportScope};
use crate::validator::{self, ValidationIssue};

/// How results are printed on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One pretty-printed JSON document.
    Json,
    /// Aligned human-readable lines.
    Text,
}

/// Everything printed for one file.
#[derive(Debug, Serialize)]
struct FileResult {
    /// Parsed blocks; only filled by `blocks`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<Block>,
    /// Store key of the file.
    file: PathBuf,
    /// Structural issues.
    issues: Vec<ValidationIssue>,
    /// Change reports; empty for `validate` or when the file had errors.
    reports: Vec<ChangeReport>,
    /// Why the file was not processed at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<String>,
}

impl FileResult {
    /// A result for a file that was gated out before validation.
    fn skipped(file: &Path, e: &Error) -> Self {
        return Self {
            blocks: Vec::new(),
            file: file.to_path_buf(),
            issues: Vec::new(),
            reports: Vec::new(),
            skipped: Some(e.to_string()),
        };
    }

    /// Whether the file counts towards the structural-error exit code.
    fn failed(&self) -> bool {
        return self.skipped.is_some() || validator::has_errors(&self.issues);
    }

    /// Whether any report asks for regeneration.
    fn has_work(&self) -> bool {
        return self.reports.iter().any(ChangeReport::has_work);
    }

    /// Wrap an analysis with its reports.
    fn new(file: &Path, analysis: FileAnalysis, reports: Vec<ChangeReport>) -> Self {
        return Self { blocks: Vec::new(), file: file.to_path_buf(), issues: analysis.issues, reports, skipped: None };
    }
}

/// Config, syntax tables, and selected sources for one invocation.
struct Workspace {
    /// Loaded `.docmark.toml`.
    config: Config,
    /// Compiled language tables.
    registry: SyntaxRegistry,
    /// Project root; every store key is relative to it.
    root: PathBuf,
}

impl Workspace {
    /// Load config and compile syntax tables for the current directory.
    ///
    /// # Errors
    ///
    /// Returns config or pattern errors.
    fn open() -> Result<Self, Error> {
        let root = PathBuf::from(".");
        let config = Config::load(&root)?;
        let registry = SyntaxRegistry::new()?;
        return Ok(Self { config, registry, root });
    }

    /// Files selected by `paths`, or the whole project when empty.
    ///
    /// # Errors
    ///
    /// Returns scanner errors for bad explicit paths.
    fn sources(&self, paths: &[PathBuf]) -> Result<Vec<SourceFile>, Error> {
        return scanner::collect_sources(&self.root, paths, &self.config, &self.registry);
    }

    /// Hash store configured for this project.
    ///
    /// # Errors
    ///
    /// Returns store read or corruption errors.
    fn store(&self) -> Result<HashLockfile, Error> {
        return HashLockfile::open(&self.root.join(&self.config.store));
    }
}

/// Print the parsed blocks of a single file. A file with structural errors
/// lists its issues instead of blocks.
///
/// # Errors
///
/// Returns errors from config loading, reading, or an unsupported extension.
pub fn blocks(file: &Path, format: OutputFormat) -> Result<ExitCode, Error> {
    let workspace = Workspace::open()?;
    let sources = workspace.sources(&[file.to_path_buf()])?;
    let pipeline = Pipeline::new(&workspace.config, &workspace.registry);

    let mut results = Vec::new();
    for source in &sources {
        let content = source.read()?;
        let mut analysis = pipeline.analyze_file(&source.relative, &content)?;
        let blocks = std::mem::take(&mut analysis.blocks);
        let mut result = FileResult::new(&source.relative, analysis, Vec::new());
        result.blocks = blocks;
        results.push(result);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            for result in &results {
                print_blocks_text(result);
            }
        },
    }

    return Ok(exit_code(&results, false));
}

/// Validate, detect, and report, without touching the hash store.
///
/// # Errors
///
/// Returns config, scanner, or store errors.
pub fn check(paths: &[PathBuf], format: OutputFormat) -> Result<ExitCode, Error> {
    let results = run_detection(paths, StoreMode::ReadOnly)?;
    print_detection(&results, format)?;
    return Ok(exit_code(&results, true));
}

/// Exit code: 2 if any file failed, else 1 if `work_fails` and any report has work, else 0.
fn exit_code(results: &[FileResult], work_fails: bool) -> ExitCode {
    if results.iter().any(FileResult::failed) {
        return ExitCode::from(2);
    } else if work_fails && results.iter().any(FileResult::has_work) {
        return ExitCode::from(1);
    } else {
        return ExitCode::SUCCESS;
    }
}

/// Print blocks and issues for one file as text.
fn print_blocks_text(result: &FileResult) {
    println!("{}", result.file.display());
    for block in &result.blocks {
        let docs = if block.existing_documentation.is_some() { "documented" } else { "undocumented" };
        println!(
            "  {:<8} {:<28} {:>5}-{:<5} {docs}",
            block.scope_type.label(),
            block.scope_name,
            block.start_line,
            block.end_line,
        );
    }
    for issue in &result.issues {
        println!("  {issue}");
    }
    return;
}

/// Print detection results in the requested format.
///
/// # Errors
///
/// Returns `Error::Json` if JSON serialization fails.
fn print_detection(results: &[FileResult], format: OutputFormat) -> Result<(), Error> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    for result in results {
        if let Some(reason) = &result.skipped {
            println!("SKIPPED {}: {reason}", result.file.display());
            continue;
        }
        for issue in &result.issues {
            println!("{issue}");
        }
        for report in &result.reports {
            print_report_text(report);
        }
    }

    let failed = results.iter().filter(|r| return r.failed()).count();
    let with_work = results.iter().filter(|r| return r.has_work()).count();
    println!();
    println!("{} file(s): {with_work} with changes, {failed} with errors", results.len());
    return Ok(());
}

/// `SCOPE   file: reason`, then the non-empty item lists.
fn print_report_text(report: &ChangeReport) {
    println!("{:<7} {}: {}", report.scope, report.file_path.display(), report.reason);
    if report.scope == ReportScope::None {
        return;
    }
    for (label, items) in [("changed", &report.changed_items), ("new", &report.new_items)] {
        if !items.is_empty() {
            println!("        {label}: {}", items.join(", "));
        }
    }
    return;
}

/// Run every selected file through the pipeline against the project store.
///
/// Files gated out by size or language are reported as skipped; store
/// failures abort the run.
/// A full-project update also drops rows of files the walk no longer finds.
///
/// # Errors
///
/// Returns config, scanner, or store errors.
fn run_detection(paths: &[PathBuf], mode: StoreMode) -> Result<Vec<FileResult>, Error> {
    let workspace = Workspace::open()?;
    let sources = workspace.sources(paths)?;
    let mut store = workspace.store()?;
    let pipeline = Pipeline::new(&workspace.config, &workspace.registry);

    let mut results = Vec::new();
    for source in &sources {
        results.push(process_source(&pipeline, &mut store, source, mode)?);
    }

    if mode == StoreMode::Update {
        if paths.is_empty() {
            let visited: Vec<&Path> = sources.iter().map(|s| return s.relative.as_path()).collect();
            for file in store.retain_files(&visited)? {
                tracing::info!(file = %file.display(), "dropping hashes of a file no longer in the project");
            }
        }
        store.commit()?;
    }
    return Ok(results);
}

/// Process one file, turning per-file failures into a skipped result.
///
/// # Errors
///
/// Propagates store failures.
fn process_source<S: HashStore + ?Sized>(
    pipeline: &Pipeline<'_>,
    store: &mut S,
    source: &SourceFile,
    mode: StoreMode,
) -> Result<FileResult, Error> {
    let content = match source.read() {
        Err(e) => {
            tracing::warn!(file = %source.relative.display(), error = %e, "unreadable, skipping");
            return Ok(FileResult::skipped(&source.relative, &e));
        },
        Ok(content) => content,
    };

    return match pipeline.process_file(store, &source.relative, &content, mode) {
        Err(e @ (Error::FileTooLarge { .. } | Error::UnsupportedLanguage { .. })) => {
            tracing::warn!(file = %source.relative.display(), error = %e, "skipping");
            diagnostics::print_error(&e);
            Ok(FileResult::skipped(&source.relative, &e))
        },
        Err(e) => Err(e),
        Ok(outcome) => Ok(FileResult::new(&source.relative, outcome.analysis, outcome.reports)),
    };
}

/// Validate, detect, report, and persist refreshed hashes.
///
/// # Errors
///
/// Returns config, scanner, or store errors.
pub fn scan(paths: &[PathBuf], format: OutputFormat) -> Result<ExitCode, Error> {
    let results = run_detection(paths, StoreMode::Update)?;
    print_detection(&results, format)?;
    return Ok(exit_code(&results, false));
}

/// Structural validation only.
///
/// # Errors
///
/// Returns config or scanner errors.
pub fn validate(paths: &[PathBuf], format: OutputFormat) -> Result<ExitCode, Error> {
    let workspace = Workspace::open()?;
    let sources = workspace.sources(paths)?;
    let pipeline = Pipeline::new(&workspace.config, &workspace.registry);

    let mut results = Vec::new();
    for source in &sources {
        let analyzed = source.read().and_then(|content| return pipeline.analyze_file(&source.relative, &content));
        match analyzed {
            Err(e) => {
                tracing::warn!(file = %source.relative.display(), error = %e, "skipping");
                results.push(FileResult::skipped(&source.relative, &e));
            },
            Ok(analysis) => results.push(FileResult::new(&source.relative, analysis, Vec::new())),
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            let mut all_issues = Vec::new();
            for result in &results {
                if let Some(reason) = &result.skipped {
                    println!("SKIPPED {}: {reason}", result.file.display());
                }
                for issue in &result.issues {
                    println!("{issue}");
                }
                all_issues.extend(result.issues.iter().cloned());
            }
            println!("{} file(s): {}", results.len(), validator::summary(&all_issues));
        },
    }

    return Ok(exit_code(&results, false));
}
