//! Hierarchical change detection against the hash store.
//!
//! The whole-file hash is the first gate. Only when it moved are the four
//! block levels compared, each on its own: a class-level change never hides
//! a method-level one.

use std::collections::HashSet;
use std::path::Path;

use crate::error::Error;
use crate::hasher::{ComputedHashes, Hasher};
use crate::store::{HashStore, StoredHashes};
use crate::syntax::LanguageSyntax;
use crate::types::{Block, ChangeReport, ReportScope, ScopeType};

/// Reports for one file, plus the hashes they were computed from.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Freshly computed hashes, ready for [`ChangeDetector::update_stored_hashes`].
    pub hashes: ComputedHashes,
    /// Zero or more reports; see [`ChangeDetector::detect`].
    pub reports: Vec<ChangeReport>,
}

/// Per-level classification of current scope names.
#[derive(Debug, Default)]
struct LevelDiff {
    /// Present in both with a different hash.
    changed: Vec<String>,
    /// Present only in the current file.
    new: Vec<String>,
    /// Present only in the store.
    removed: Vec<String>,
    /// Present in both with the same hash.
    unchanged: Vec<String>,
}

impl LevelDiff {
    /// `N class(s) modified | N new class(s)`.
    fn reason(&self, scope: ScopeType) -> String {
        let mut parts = Vec::new();
        if !self.changed.is_empty() {
            parts.push(format!("{} {}(s) modified", self.changed.len(), scope.label()));
        }
        if !self.new.is_empty() {
            parts.push(format!("{} new {}(s)", self.new.len(), scope.label()));
        }
        return parts.join(" | ");
    }
}

/// Compares current hashes with stored ones.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector<'a> {
    /// Normalizer for the file's language.
    hasher: Hasher<'a>,
}

impl<'a> ChangeDetector<'a> {
    /// Detect what changed in `file` since its hashes were last stored.
    ///
    /// - no stored rows: one `File` report listing every scope as new;
    /// - same file hash: one `None` report, everything unchanged;
    /// - otherwise one report per level with new or changed scopes, or a
    ///   single `None` "formatting-only change" report when there are none.
    ///
    /// Every report lists every unchanged scope across all levels.
    ///
    /// # Errors
    ///
    /// Propagates `HashStore::get_hashes` failures.
    pub fn detect<S: HashStore + ?Sized>(
        &self,
        store: &S,
        file: &Path,
        content: &str,
        blocks: &[Block],
    ) -> Result<Detection, Error> {
        let hashes = self.hasher.calculate_all_hashes(file, content, blocks);
        let stored = store.get_hashes(file)?;

        if stored.is_empty() {
            let report = ChangeReport {
                changed_items: Vec::new(),
                file_path: file.to_path_buf(),
                new_items: hashes.scope_names(),
                reason: "new file".to_string(),
                scope: ReportScope::File,
                unchanged_items: Vec::new(),
            };
            tracing::debug!(file = %file.display(), new = report.new_items.len(), "new file");
            return Ok(Detection { hashes, reports: vec![report] });
        }

        if stored.file_hash() == Some(&hashes.file.content_hash) {
            let report = unchanged_report(file, hashes.scope_names(), "file hash unchanged");
            tracing::debug!(file = %file.display(), "file hash unchanged");
            return Ok(Detection { hashes, reports: vec![report] });
        }

        let diffs: Vec<(ScopeType, LevelDiff)> = ScopeType::ALL
            .into_iter()
            .map(|scope| return (scope, compare_level(&hashes, &stored, scope)))
            .collect();
        let unchanged_everywhere: Vec<String> =
            diffs.iter().flat_map(|(_, diff)| return diff.unchanged.iter().cloned()).collect();

        let mut reports = Vec::new();
        for (scope, diff) in diffs {
            if !diff.removed.is_empty() {
                tracing::debug!(file = %file.display(), %scope, removed = ?diff.removed, "scopes removed");
            }
            if diff.changed.is_empty() && diff.new.is_empty() {
                continue;
            }
            let reason = diff.reason(scope);
            tracing::debug!(file = %file.display(), %scope, %reason, "level changed");
            reports.push(ChangeReport {
                changed_items: diff.changed,
                file_path: file.to_path_buf(),
                new_items: diff.new,
                reason,
                scope: ReportScope::from(scope),
                unchanged_items: unchanged_everywhere.clone(),
            });
        }

        if reports.is_empty() {
            tracing::debug!(file = %file.display(), "file hash moved but no tracked scope did");
            reports.push(unchanged_report(file, unchanged_everywhere, "formatting-only change"));
        }

        return Ok(Detection { hashes, reports });
    }

    /// Bind a detector to a language.
    pub const fn new(syntax: &'a LanguageSyntax) -> Self {
        return Self { hasher: Hasher::new(syntax) };
    }

    /// Replace every stored row of `file` with the freshly computed ones.
    ///
    /// Called after every scan, whatever the reports said, so a
    /// formatting-only diff is absorbed instead of reported again.
    ///
    /// # Errors
    ///
    /// Propagates `HashStore::replace_hashes` failures.
    pub fn update_stored_hashes<S: HashStore + ?Sized>(
        store: &mut S,
        file: &Path,
        hashes: &ComputedHashes,
    ) -> Result<(), Error> {
        store.replace_hashes(file, &mut hashes.all_rows())?;
        tracing::debug!(file = %file.display(), rows = hashes.all_rows().count(), "stored hashes replaced");
        return Ok(());
    }
}

/// Classify one level's current scope names against the store.
fn compare_level(hashes: &ComputedHashes, stored: &StoredHashes, scope: ScopeType) -> LevelDiff {
    let mut diff = LevelDiff::default();
    let current = hashes.level(scope);
    for hash in current {
        match stored.lookup(scope, &hash.scope_name) {
            None => diff.new.push(hash.scope_name.clone()),
            Some(old) if *old == hash.content_hash => diff.unchanged.push(hash.scope_name.clone()),
            Some(_) => diff.changed.push(hash.scope_name.clone()),
        }
    }
    let present: HashSet<&str> = current.iter().map(|h| return h.scope_name.as_str()).collect();
    diff.removed = stored
        .names(scope)
        .into_iter()
        .filter(|name| return !present.contains(name))
        .map(str::to_string)
        .collect();
    return diff;
}

/// A `None`-scope report: nothing to regenerate.
fn unchanged_report(file: &Path, unchanged_items: Vec<String>, reason: &str) -> ChangeReport {
    return ChangeReport {
        changed_items: Vec::new(),
        file_path: file.to_path_buf(),
        new_items: Vec::new(),
        reason: reason.to_string(),
        scope: ReportScope::None,
        unchanged_items,
    };
}
