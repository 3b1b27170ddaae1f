use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::Error;
use crate::syntax::SyntaxRegistry;

/// A source file selected for processing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path to open.
    pub disk_path: PathBuf,
    /// Path relative to the project root; the hash store key.
    pub relative: PathBuf,
}

impl SourceFile {
    /// Read the file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read.
    pub fn read(&self) -> Result<String, Error> {
        return Ok(std::fs::read_to_string(&self.disk_path)?);
    }
}

/// Collect the source files to process, sorted and deduplicated.
///
/// With no `paths`, walks `root` and keeps supported files that pass the
/// config's include/exclude filters. Explicit directories are walked the same
/// way; explicit files bypass the filters but must have a supported extension.
/// Hidden directories are never entered. Store keys are relative to the
/// canonical root, so `src/a.py`, `./src/a.py` and an absolute spelling of
/// the same file all share one key.
///
/// # Errors
///
/// Returns `Error::Io` if `root` cannot be resolved,
/// `Error::FileNotFound` for a missing explicit path,
/// or `Error::UnsupportedLanguage` for an explicit file with an unknown extension.
pub fn collect_sources(
    root: &Path,
    paths: &[PathBuf],
    config: &Config,
    registry: &SyntaxRegistry,
) -> Result<Vec<SourceFile>, Error> {
    let canonical_root = std::fs::canonicalize(root)?;
    let mut sources = Vec::new();

    if paths.is_empty() {
        walk_directory(&canonical_root, root, config, registry, &mut sources);
    }

    for path in paths {
        let disk_path = if path.is_absolute() { path.clone() } else { root.join(path) };
        if !disk_path.exists() {
            return Err(Error::FileNotFound { path: path.clone() });
        }
        if disk_path.is_dir() {
            walk_directory(&canonical_root, &disk_path, config, registry, &mut sources);
            continue;
        }
        registry.for_path(&disk_path)?;
        sources.push(SourceFile { relative: relative_to(&canonical_root, &disk_path), disk_path });
    }

    sources.sort_by(|a, b| return a.relative.cmp(&b.relative).then_with(|| return a.disk_path.cmp(&b.disk_path)));
    sources.dedup_by(|a, b| return a.relative == b.relative);
    tracing::debug!(count = sources.len(), "source files selected");
    return Ok(sources);
}

/// Hidden entries other than the walk root itself.
fn is_hidden(entry: &DirEntry) -> bool {
    return entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| return name.starts_with('.'));
}

/// `path` resolved and made relative to the canonical `root`; as given when it lies outside.
fn relative_to(root: &Path, path: &Path) -> PathBuf {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| return path.to_path_buf());
    return resolved.strip_prefix(root).map_or_else(|_| return path.to_path_buf(), Path::to_path_buf);
}

/// Walk `dir`, keeping supported files the config wants scanned. `root` is canonical.
fn walk_directory(root: &Path, dir: &Path, config: &Config, registry: &SyntaxRegistry, out: &mut Vec<SourceFile>) {
    let walker = WalkDir::new(dir).follow_links(false).into_iter().filter_entry(|e| return !is_hidden(e));
    for entry in walker {
        let entry = match entry {
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            },
            Ok(entry) => entry,
        };
        if !entry.file_type().is_file() || !registry.is_supported(entry.path()) {
            continue;
        }
        let relative = relative_to(root, entry.path());
        let key = relative.to_string_lossy().replace('\\', "/");
        if !config.should_scan(&key) {
            tracing::debug!(file = %key, "excluded by config");
            continue;
        }
        out.push(SourceFile { disk_path: entry.path().to_path_buf(), relative });
    }
}
