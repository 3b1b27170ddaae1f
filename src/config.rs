use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Config file name looked up in the project root.
pub const CONFIG_FILE: &str = ".docmark.toml";

/// Default hash store location, relative to the project root.
const DEFAULT_STORE: &str = ".docmark.lock";

/// Project configuration loaded from `.docmark.toml`.
/// Include/exclude patterns are path prefixes applied to source files.
#[derive(Debug, Clone)]
pub struct Config {
    /// Existing-documentation policy.
    pub docs: DocPolicy,
    /// Path prefixes skipped even when included.
    exclude: Vec<String>,
    /// Path prefixes to scan; empty scans everything.
    include: Vec<String>,
    /// Structural thresholds.
    pub limits: Limits,
    /// Hash store path, relative to the project root.
    pub store: PathBuf,
}

/// What counts as "real" documentation already present in a block.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocPolicy {
    /// Shorter text (in characters, after trimming) is treated as absent.
    pub min_length: usize,
    /// Case-insensitive phrases that mark text as a placeholder.
    pub placeholders: Vec<String>,
}

impl DocPolicy {
    /// Return the trimmed text when it is real documentation, `None` otherwise.
    pub fn accept(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_length {
            return None;
        }
        let lower = trimmed.to_lowercase();
        if self.placeholders.iter().any(|p| return lower.contains(&p.to_lowercase())) {
            return None;
        }
        return Some(trimmed.to_string());
    }
}

impl Default for DocPolicy {
    /// Five characters minimum and the usual placeholder phrases.
    fn default() -> Self {
        let placeholders = [
            "to_do",
            "todo",
            "fixme",
            "to do",
            "to_review",
            "to review",
            "placeholder",
            "add description",
            "description here",
        ];
        return Self {
            min_length: 5,
            placeholders: placeholders.iter().map(|p| return (*p).to_string()).collect(),
        };
    }
}

/// Thresholds for structural warnings and the file-size gate.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Blocks spanning more lines than this get a warning.
    pub max_block_lines: u32,
    /// Files larger than this are refused.
    pub max_file_bytes: u64,
    /// Marker lines indented deeper than this get a warning.
    pub max_marker_indent: usize,
}

impl Default for Limits {
    /// 200-line blocks, 16 MiB files, 8 columns of marker indentation.
    fn default() -> Self {
        return Self { max_block_lines: 200, max_file_bytes: 16_777_216, max_marker_indent: 8 };
    }
}

/// Raw TOML structure for `.docmark.toml`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DocmarkTomlConfig {
    /// `[docs]` table.
    #[serde(default)]
    docs: DocPolicy,
    /// Exclude prefixes.
    #[serde(default)]
    exclude: Vec<String>,
    /// Include prefixes.
    #[serde(default)]
    include: Vec<String>,
    /// `[limits]` table.
    #[serde(default)]
    limits: Limits,
    /// Store path override.
    store: Option<PathBuf>,
}

impl Config {
    /// Load config from `.docmark.toml` in the given root directory.
    /// Returns a default that scans everything if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::scan_everything_by_default());
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };

        return Self::parse(&content);
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: DocmarkTomlConfig = toml::from_str(content)?;
        return Ok(Self {
            docs: raw.docs,
            exclude: raw.exclude,
            include: raw.include,
            limits: raw.limits,
            store: raw.store.unwrap_or_else(|| return PathBuf::from(DEFAULT_STORE)),
        });
    }

    /// Default config that includes everything and excludes nothing.
    pub fn scan_everything_by_default() -> Self {
        return Self {
            docs: DocPolicy::default(),
            exclude: Vec::new(),
            include: Vec::new(),
            limits: Limits::default(),
            store: PathBuf::from(DEFAULT_STORE),
        };
    }

    /// Check whether a source file path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.store, PathBuf::from(".docmark.lock"));
        assert_eq!(config.limits.max_block_lines, 200);
        assert_eq!(config.docs.min_length, 5);
        assert!(config.should_scan("anything/at/all.py"));
    }

    #[test]
    fn include_then_exclude() {
        let config = Config::parse(
            r#"
include = ["src/"]
exclude = ["src/vendor/"]
store = "state/hashes.lock"

[limits]
max_block_lines = 50
"#,
        )
        .unwrap();
        assert!(config.should_scan("src/app.py"));
        assert!(!config.should_scan("src/vendor/lib.py"));
        assert!(!config.should_scan("tests/test_app.py"));
        assert_eq!(config.limits.max_block_lines, 50);
        assert_eq!(config.limits.max_marker_indent, 8);
        assert_eq!(config.store, PathBuf::from("state/hashes.lock"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(Config::parse("colour = \"red\""), Err(Error::TomlDe(_))));
    }

    #[test]
    fn doc_policy_rejects_placeholders_case_insensitively() {
        let policy = DocPolicy::default();
        assert_eq!(policy.accept("  Parse the input file.  ").as_deref(), Some("Parse the input file."));
        assert_eq!(policy.accept("FIXME: write this"), None);
        assert_eq!(policy.accept("Add Description"), None);
        assert_eq!(policy.accept("ok"), None);
    }
}
