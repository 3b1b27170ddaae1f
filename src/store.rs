//! Hash store: the only state that survives between runs.
//!
//! Rows are keyed by (file, level, scope name). The shipped store is a TOML
//! lockfile mutated in memory and replaced atomically on commit.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{CodeHash, ContentHash, HashLevel, LineNumber, ScopeType};

/// One persisted hash row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredHash {
    /// Fingerprint of the normalized scope text.
    pub content_hash: ContentHash,
    /// Source file the row belongs to.
    pub file_path: PathBuf,
    /// Last line of the scope when it was hashed.
    pub line_end: LineNumber,
    /// First line of the scope when it was hashed.
    pub line_start: LineNumber,
    /// Scope identifier; the file path for the file-level row.
    pub scope_name: String,
    /// Level the row belongs to.
    pub scope_type: HashLevel,
    /// When the row was written.
    pub updated_at: DateTime<Utc>,
}

impl StoredHash {
    /// Build a row for `file` from a freshly computed hash.
    fn from_computed(file: &Path, hash: &CodeHash, now: DateTime<Utc>) -> Self {
        return Self {
            content_hash: hash.content_hash.clone(),
            file_path: file.to_path_buf(),
            line_end: hash.line_end,
            line_start: hash.line_start,
            scope_name: hash.scope_name.clone(),
            scope_type: hash.scope_type,
            updated_at: now,
        };
    }

    /// Sort key: file, then level rank, then scope name.
    fn key(&self) -> (&Path, u8, &str) {
        return (self.file_path.as_path(), self.scope_type.rank(), self.scope_name.as_str());
    }
}

/// Stored rows for one file, grouped by level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredHashes {
    /// The whole-file row, when present.
    file: Option<ContentHash>,
    /// Scope name to hash, per block level.
    levels: HashMap<HashLevel, HashMap<String, ContentHash>>,
}

impl StoredHashes {
    /// Stored whole-file hash.
    pub const fn file_hash(&self) -> Option<&ContentHash> {
        return self.file.as_ref();
    }

    /// Group rows by level.
    fn from_rows<'r>(rows: impl IntoIterator<Item = &'r StoredHash>) -> Self {
        let mut grouped = Self::default();
        for row in rows {
            if row.scope_type == HashLevel::File {
                grouped.file = Some(row.content_hash.clone());
            } else {
                grouped
                    .levels
                    .entry(row.scope_type)
                    .or_default()
                    .insert(row.scope_name.clone(), row.content_hash.clone());
            }
        }
        return grouped;
    }

    /// Whether the store knows nothing about the file.
    pub fn is_empty(&self) -> bool {
        return self.file.is_none() && self.levels.values().all(HashMap::is_empty);
    }

    /// Stored hash of one scope, if any.
    pub fn lookup(&self, scope: ScopeType, name: &str) -> Option<&ContentHash> {
        return self.levels.get(&HashLevel::from(scope)).and_then(|level| return level.get(name));
    }

    /// Stored scope names at one level, sorted.
    pub fn names(&self, scope: ScopeType) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .levels
            .get(&HashLevel::from(scope))
            .map(|level| return level.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        return names;
    }
}

/// Read/write contract for persisted hashes.
///
/// Implementations must make `replace_hashes` observable as a single step:
/// a reader never sees a file with zero rows between delete and insert.
pub trait HashStore {
    /// Drop every row for `file`.
    ///
    /// # Errors
    ///
    /// Implementations propagate their storage failures.
    fn delete_hashes(&mut self, file: &Path) -> Result<(), Error>;

    /// Every row for `file`, grouped by level.
    ///
    /// # Errors
    ///
    /// Implementations propagate their storage failures.
    fn get_hashes(&self, file: &Path) -> Result<StoredHashes, Error>;

    /// Upsert rows for `file` on (level, scope name).
    ///
    /// # Errors
    ///
    /// Implementations propagate their storage failures.
    fn insert_hashes<'h>(&mut self, file: &Path, rows: &mut dyn Iterator<Item = &'h CodeHash>) -> Result<(), Error>;

    /// Delete then insert, so removed scopes leave no rows behind.
    ///
    /// # Errors
    ///
    /// Propagates failures from either step.
    fn replace_hashes<'h>(&mut self, file: &Path, rows: &mut dyn Iterator<Item = &'h CodeHash>) -> Result<(), Error> {
        self.delete_hashes(file)?;
        return self.insert_hashes(file, rows);
    }

    /// Drop the rows of every stored file not listed in `keep`. Returns the dropped files.
    ///
    /// # Errors
    ///
    /// Propagates failures from listing or deleting.
    fn retain_files(&mut self, keep: &[&Path]) -> Result<Vec<PathBuf>, Error> {
        let mut dropped = Vec::new();
        for file in self.stored_files()? {
            if !keep.contains(&file.as_path()) {
                self.delete_hashes(&file)?;
                dropped.push(file);
            }
        }
        return Ok(dropped);
    }

    /// Every file with at least one row, sorted.
    ///
    /// # Errors
    ///
    /// Implementations propagate their storage failures.
    fn stored_files(&self) -> Result<Vec<PathBuf>, Error>;
}

/// On-disk layout of the lockfile.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LockfileDocument {
    /// Rows sorted by (file, level, scope name).
    #[serde(default)]
    hashes: Vec<StoredHash>,
}

/// TOML lockfile store. Mutations stay in memory until [`HashLockfile::commit`].
#[derive(Debug)]
pub struct HashLockfile {
    /// Whether rows changed since load.
    dirty: bool,
    /// Lockfile location.
    path: PathBuf,
    /// All rows, kept sorted.
    rows: Vec<StoredHash>,
}

impl HashLockfile {
    /// Serialize and atomically replace the lockfile. No-op when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` if serialization fails,
    /// or `Error::Io` if the temp file cannot be written or renamed.
    pub fn commit(&mut self) -> Result<(), Error> {
        if !self.dirty {
            tracing::debug!(path = %self.path.display(), "hash store unchanged, not writing");
            return Ok(());
        }
        let content = self.serialize()?;
        let dir = self
            .path
            .parent()
            .filter(|p| return !p.as_os_str().is_empty())
            .unwrap_or_else(|| return Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| return Error::Io(e.error))?;

        self.dirty = false;
        tracing::info!(path = %self.path.display(), rows = self.rows.len(), "hash store written");
        return Ok(());
    }

    /// Load the lockfile at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` for read failures other than not-found,
    /// `Error::TomlDe` if the content is invalid TOML,
    /// or `Error::StoreCorrupt` if rows are unsorted or duplicated.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let rows = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no hash store yet, starting empty");
                Vec::new()
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(content) => Self::parse(&content)?,
        };
        return Ok(Self { dirty: false, path: path.to_path_buf(), rows });
    }

    /// Parse lockfile rows from TOML content.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the content is not valid TOML,
    /// or `Error::StoreCorrupt` if rows are not strictly sorted.
    pub fn parse(content: &str) -> Result<Vec<StoredHash>, Error> {
        let document: LockfileDocument = toml::from_str(content)?;
        enforce_row_ordering(&document.hashes)?;
        return Ok(document.hashes);
    }

    /// Serialize rows to TOML.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` if serialization fails.
    pub fn serialize(&self) -> Result<String, Error> {
        let document = LockfileDocument { hashes: self.rows.clone() };
        return Ok(toml::to_string_pretty(&document)?);
    }
}

impl HashStore for HashLockfile {
    fn delete_hashes(&mut self, file: &Path) -> Result<(), Error> {
        let before = self.rows.len();
        self.rows.retain(|row| return row.file_path != file);
        if self.rows.len() != before {
            self.dirty = true;
        }
        return Ok(());
    }

    fn get_hashes(&self, file: &Path) -> Result<StoredHashes, Error> {
        return Ok(StoredHashes::from_rows(self.rows.iter().filter(|row| return row.file_path == file)));
    }

    fn insert_hashes<'h>(&mut self, file: &Path, rows: &mut dyn Iterator<Item = &'h CodeHash>) -> Result<(), Error> {
        let now = Utc::now();
        for hash in rows {
            let row = StoredHash::from_computed(file, hash, now);
            match self.rows.binary_search_by(|probe| return probe.key().cmp(&row.key())) {
                Err(at) => self.rows.insert(at, row),
                Ok(at) => {
                    if let Some(slot) = self.rows.get_mut(at) {
                        *slot = row;
                    }
                },
            }
            self.dirty = true;
        }
        return Ok(());
    }

    fn stored_files(&self) -> Result<Vec<PathBuf>, Error> {
        let mut files: Vec<PathBuf> = self.rows.iter().map(|row| return row.file_path.clone()).collect();
        files.dedup();
        return Ok(files);
    }
}

/// Validate that rows are strictly sorted by (file, level, scope name).
///
/// # Errors
///
/// Returns `Error::StoreCorrupt` if any adjacent pair is out of order or equal.
fn enforce_row_ordering(rows: &[StoredHash]) -> Result<(), Error> {
    for pair in rows.windows(2) {
        let (Some(first), Some(second)) = (pair.first(), pair.get(1)) else {
            continue;
        };
        if first.key() >= second.key() {
            return Err(Error::StoreCorrupt {
                reason: format!(
                    "rows not sorted: {} {} {} >= {} {} {}",
                    first.file_path.display(),
                    first.scope_type,
                    first.scope_name,
                    second.file_path.display(),
                    second.scope_type,
                    second.scope_name,
                ),
            });
        }
    }
    return Ok(());
}

/// Store that never touches disk.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Rows per file.
    files: HashMap<PathBuf, Vec<StoredHash>>,
}

#[cfg(test)]
impl MemoryStore {
    /// Rows for one file, in insertion order.
    pub fn rows(&self, file: &Path) -> &[StoredHash] {
        return self.files.get(file).map(Vec::as_slice).unwrap_or_default();
    }
}

#[cfg(test)]
impl HashStore for MemoryStore {
    fn delete_hashes(&mut self, file: &Path) -> Result<(), Error> {
        self.files.remove(file);
        return Ok(());
    }

    fn get_hashes(&self, file: &Path) -> Result<StoredHashes, Error> {
        return Ok(StoredHashes::from_rows(self.rows(file)));
    }

    fn insert_hashes<'h>(&mut self, file: &Path, rows: &mut dyn Iterator<Item = &'h CodeHash>) -> Result<(), Error> {
        let now = Utc::now();
        let stored = self.files.entry(file.to_path_buf()).or_default();
        for hash in rows {
            let row = StoredHash::from_computed(file, hash, now);
            stored.retain(|existing| return existing.key() != row.key());
            stored.push(row);
        }
        return Ok(());
    }

    fn stored_files(&self) -> Result<Vec<PathBuf>, Error> {
        let mut files: Vec<PathBuf> = self.files.keys().cloned().collect();
        files.sort();
        return Ok(files);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, reason = "test assertions")]
mod tests {
    use super::*;

    fn hash(level: HashLevel, name: &str, digest: &str) -> CodeHash {
        return CodeHash {
            content_hash: ContentHash(digest.to_string()),
            line_end: LineNumber(9),
            line_start: LineNumber(1),
            scope_name: name.to_string(),
            scope_type: level,
        };
    }

    fn sample() -> Vec<CodeHash> {
        return vec![
            hash(HashLevel::File, "a.py", "f0"),
            hash(HashLevel::Method, "run", "m1"),
            hash(HashLevel::Class, "Foo", "c1"),
        ];
    }

    #[test]
    fn missing_lockfile_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = HashLockfile::open(&dir.path().join(".docmark.lock")).unwrap();
        assert_eq!(store.rows.len(), 0);
        assert!(store.get_hashes(Path::new("a.py")).unwrap().is_empty());
    }

    #[test]
    fn commit_then_reopen_keeps_sorted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("hashes.lock");
        let mut store = HashLockfile::open(&path).unwrap();
        store.insert_hashes(Path::new("b.py"), &mut sample().iter()).unwrap();
        store.insert_hashes(Path::new("a.py"), &mut sample().iter()).unwrap();
        store.commit().unwrap();

        let reopened = HashLockfile::open(&path).unwrap();
        assert_eq!(reopened.rows.len(), 6);
        let files: Vec<String> = reopened.rows.iter().map(|r| return r.file_path.display().to_string()).collect();
        assert_eq!(files, vec!["a.py", "a.py", "a.py", "b.py", "b.py", "b.py"]);
        let levels: Vec<HashLevel> = reopened.rows.iter().take(3).map(|r| return r.scope_type).collect();
        assert_eq!(levels, vec![HashLevel::File, HashLevel::Class, HashLevel::Method]);

        let grouped = reopened.get_hashes(Path::new("a.py")).unwrap();
        assert_eq!(grouped.file_hash(), Some(&ContentHash("f0".to_string())));
        assert_eq!(grouped.lookup(ScopeType::Class, "Foo"), Some(&ContentHash("c1".to_string())));
        assert_eq!(grouped.names(ScopeType::Method), vec!["run"]);
    }

    #[test]
    fn replace_removes_stale_scopes() {
        let mut store = HashLockfile { dirty: false, path: PathBuf::from("unused.lock"), rows: Vec::new() };
        store.insert_hashes(Path::new("a.py"), &mut sample().iter()).unwrap();
        let renamed = [hash(HashLevel::File, "a.py", "f1"), hash(HashLevel::Method, "walk", "m2")];
        store.replace_hashes(Path::new("a.py"), &mut renamed.iter()).unwrap();

        let grouped = store.get_hashes(Path::new("a.py")).unwrap();
        assert_eq!(grouped.lookup(ScopeType::Method, "run"), None);
        assert_eq!(grouped.lookup(ScopeType::Class, "Foo"), None);
        assert_eq!(grouped.names(ScopeType::Method), vec!["walk"]);
        assert_eq!(store.rows.len(), 2);
    }

    #[test]
    fn insert_upserts_on_key() {
        let mut store = HashLockfile { dirty: false, path: PathBuf::from("unused.lock"), rows: Vec::new() };
        store.insert_hashes(Path::new("a.py"), &mut sample().iter()).unwrap();
        let updated = [hash(HashLevel::Method, "run", "m9")];
        store.insert_hashes(Path::new("a.py"), &mut updated.iter()).unwrap();
        assert_eq!(store.rows.len(), 3);
        let grouped = store.get_hashes(Path::new("a.py")).unwrap();
        assert_eq!(grouped.lookup(ScopeType::Method, "run"), Some(&ContentHash("m9".to_string())));
    }

    #[test]
    fn retain_files_drops_unlisted_files_only() {
        let mut store = HashLockfile { dirty: false, path: PathBuf::from("unused.lock"), rows: Vec::new() };
        for file in ["a.py", "gone.py", "src/lib.rs"] {
            store.insert_hashes(Path::new(file), &mut sample().iter()).unwrap();
        }
        store.dirty = false;
        assert_eq!(store.stored_files().unwrap().len(), 3);

        let dropped = store.retain_files(&[Path::new("a.py"), Path::new("src/lib.rs")]).unwrap();
        assert_eq!(dropped, vec![PathBuf::from("gone.py")]);
        assert_eq!(store.stored_files().unwrap(), vec![PathBuf::from("a.py"), PathBuf::from("src/lib.rs")]);
        assert!(store.dirty);
        assert!(store.get_hashes(Path::new("gone.py")).unwrap().is_empty());
    }

    #[test]
    fn unsorted_lockfile_is_corrupt() {
        let content = r#"
[[hashes]]
content_hash = "m1"
file_path = "a.py"
line_end = 4
line_start = 2
scope_name = "run"
scope_type = "method"
updated_at = "2026-01-01T00:00:00Z"

[[hashes]]
content_hash = "f0"
file_path = "a.py"
line_end = 9
line_start = 1
scope_name = "a.py"
scope_type = "file"
updated_at = "2026-01-01T00:00:00Z"
"#;
        assert!(matches!(HashLockfile::parse(content), Err(Error::StoreCorrupt { .. })));
    }

    #[test]
    fn unchanged_store_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".docmark.lock");
        let mut store = HashLockfile::open(&path).unwrap();
        store.commit().unwrap();
        assert!(!path.exists());
    }
}
