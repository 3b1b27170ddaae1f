use std::path::Path;

use crate::config::CONFIG_FILE;
use crate::error::Error;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened, why, and how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::FileNotFound { path } => render_file_not_found(path),
        Error::FileTooLarge { file, max_bytes, size_bytes } => render_file_too_large(file, *size_bytes, *max_bytes),
        Error::StoreCorrupt { reason } => render_store_corrupt(reason),
        Error::TomlDe(inner) => render_invalid_config(&inner.to_string()),
        Error::UnsupportedLanguage { ext } => render_unsupported_language(ext),
        Error::Io(_)
        | Error::Json(_)
        | Error::Logging { .. }
        | Error::Pattern(_)
        | Error::TomlSer(_)
        | Error::Watch(_) => render_generic(e),
    };
}

fn render_file_not_found(path: &Path) -> String {
    return format!(
        "\
# Error: File Not Found

`{}` does not exist.

## Fix

Pass a path relative to the project root, or omit paths to scan everything.
",
        path.display()
    );
}

fn render_file_too_large(file: &Path, size_bytes: u64, max_bytes: u64) -> String {
    return format!(
        "\
# Error: File Too Large

`{}` is {size_bytes} bytes (max {max_bytes}).

## Fix

Exclude it in `{CONFIG_FILE}`, or raise the limit:

    [limits]
    max_file_bytes = {size_bytes}
",
        file.display()
    );
}

fn render_generic(e: &Error) -> String {
    return format!(
        "\
# Error

{e}
"
    );
}

fn render_invalid_config(detail: &str) -> String {
    return format!(
        "\
# Error: Invalid TOML

{detail}

## Fix

Check `{CONFIG_FILE}` and the hash store for typos or unknown keys.
"
    );
}

fn render_store_corrupt(reason: &str) -> String {
    return format!(
        "\
# Error: Hash Store Corrupt

{reason}

## Fix

Delete the hash store and rescan; every file will be reported as new:

    docmark scan
"
    );
}

fn render_unsupported_language(ext: &str) -> String {
    return format!(
        "\
# Error: Unsupported Language

No marker syntax for `.{ext}` files.

## Supported extensions

- `.py`, `.pyi` - Python
- `.rs` - Rust
"
    );
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn too_large_suggests_limit() {
        let md = render_error(&Error::FileTooLarge {
            file: PathBuf::from("gen/huge.py"),
            max_bytes: 10,
            size_bytes: 42,
        });
        assert!(md.starts_with("# Error: File Too Large"));
        assert!(md.contains("max_file_bytes = 42"));
    }

    #[test]
    fn unsupported_language_lists_extensions() {
        let md = render_error(&Error::UnsupportedLanguage { ext: "txt".to_string() });
        assert!(md.contains("`.txt`"));
        assert!(md.contains("`.rs` - Rust"));
    }

    #[test]
    fn store_corruption_points_at_rescan() {
        let md = render_error(&Error::StoreCorrupt { reason: "rows not sorted".to_string() });
        assert!(md.contains("rows not sorted"));
        assert!(md.contains("docmark scan"));
    }
}
