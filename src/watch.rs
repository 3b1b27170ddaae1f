//! File watcher: runs `check` on startup, then re-runs on source changes.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};

use crate::commands::{self, OutputFormat};
use crate::config::CONFIG_FILE;
use crate::diagnostics;
use crate::error::Error;
use crate::syntax::SyntaxRegistry;

/// Debounce delay between filesystem events and re-check.
const DEBOUNCE_MS: u64 = 100;

/// Create a filesystem watcher that signals when a relevant path changes.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be created.
fn create_watcher(
    tx: crossbeam_channel::Sender<()>,
    registry: SyntaxRegistry,
    root: PathBuf,
) -> Result<notify::RecommendedWatcher, Error> {
    let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)
            )
            && event.paths.iter().any(|p| return is_relevant(&registry, &root, p))
        {
            let _ = tx.send(());
        }
    })?;
    return Ok(watcher);
}

/// Source files in a supported language outside hidden directories, or the config file.
fn is_relevant(registry: &SyntaxRegistry, root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let hidden = relative.components().any(|c| {
        return c.as_os_str().to_str().is_some_and(|s| return s.starts_with('.') && s != "." && s != "..");
    });
    let is_config = path.file_name().is_some_and(|name| return name == CONFIG_FILE);
    return is_config || (!hidden && registry.is_supported(path));
}

/// Entry point for the watch command.
///
/// Runs an initial check, then watches the project tree and re-checks on changes.
///
/// # Errors
///
/// Returns errors from syntax compilation or watcher setup.
pub fn run(paths: &[PathBuf], format: OutputFormat) -> Result<ExitCode, Error> {
    let root = PathBuf::from(".");

    eprintln!("watch: initial check");
    let mut last_code = run_check(paths, format);

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx, SyntaxRegistry::new()?, std::fs::canonicalize(&root)?)?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    eprintln!("watch: monitoring {}, press Ctrl+C to stop", root.display());

    while rx.recv().is_ok() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while rx.recv_timeout(debounce).is_ok() {}
        eprintln!("watch: change detected, re-checking...");
        last_code = run_check(paths, format);
    }

    return Ok(last_code);
}

/// Run check once and print result. Returns the exit code from check.
fn run_check(paths: &[PathBuf], format: OutputFormat) -> ExitCode {
    return match commands::check(paths, format) {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3_u8)
        },
    };
}
