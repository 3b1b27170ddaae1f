use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use serde_json::Value;

/// Copy a fixture tree into a fresh temp dir so runs never share a hash store.
fn fixture(name: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    copy_tree(&Path::new("tests/fixtures").join(name), dir.path());
    dir
}

fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}

fn docmark(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docmark"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

/// `(scope, changed_items, new_items)` for every report of one file.
fn reports_for(results: &Value, file: &str) -> Vec<(String, Vec<String>, Vec<String>)> {
    let strings = |v: &Value| -> Vec<String> {
        v.as_array().unwrap().iter().map(|s| s.as_str().unwrap().to_string()).collect()
    };
    results
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["file"].as_str().unwrap().replace('\\', "/") == file)
        .flat_map(|r| r["reports"].as_array().unwrap().clone())
        .map(|rep| {
            (rep["scope"].as_str().unwrap().to_string(), strings(&rep["changed_items"]), strings(&rep["new_items"]))
        })
        .collect()
}

#[test]
fn scan_then_check_is_clean() {
    let dir = fixture("shapes");

    let scan = docmark(dir.path(), &["scan", "--format", "json"]);
    assert_eq!(scan.status.code(), Some(0), "scan failed: {}", String::from_utf8_lossy(&scan.stderr));
    assert!(dir.path().join(".docmark.lock").exists(), "hash store not created");

    let results = json(&scan);
    assert_eq!(results.as_array().unwrap().len(), 2, "notes.txt must not be scanned");
    let py = reports_for(&results, "src/shapes.py");
    assert_eq!(py.len(), 1);
    assert_eq!(py[0].0, "file");
    assert_eq!(py[0].2, vec!["shapes", "Circle", "Square", "area", "perimeter", "scale", "block_16"]);
    let rs = reports_for(&results, "src/lib.rs");
    assert_eq!(rs[0].2, vec!["geometry", "Circle", "area"]);

    let check = docmark(dir.path(), &["check"]);
    assert_eq!(check.status.code(), Some(0), "check failed: {}", stdout(&check));
    assert!(stdout(&check).contains("file hash unchanged"));
}

#[test]
fn method_edit_is_reported_until_rescanned() {
    let dir = fixture("shapes");
    assert_eq!(docmark(dir.path(), &["scan"]).status.code(), Some(0));

    let source = dir.path().join("src/shapes.py");
    let content = std::fs::read_to_string(&source).unwrap();
    std::fs::write(&source, content.replace("return 4 * self.side", "return self.side * 4")).unwrap();

    let check = docmark(dir.path(), &["check", "--format", "json"]);
    assert_eq!(check.status.code(), Some(1));
    let py = reports_for(&json(&check), "src/shapes.py");
    assert_eq!(py, vec![("method".to_string(), vec!["perimeter".to_string()], Vec::new())]);

    // check never writes, so the change is still pending
    assert_eq!(docmark(dir.path(), &["check"]).status.code(), Some(1));

    let scan = docmark(dir.path(), &["scan"]);
    assert_eq!(scan.status.code(), Some(0));
    assert!(stdout(&scan).contains("METHOD"));
    assert!(stdout(&scan).contains("changed: perimeter"));

    assert_eq!(docmark(dir.path(), &["check"]).status.code(), Some(0));
}

#[test]
fn absolute_path_check_matches_the_walked_key() {
    let dir = fixture("shapes");
    assert_eq!(docmark(dir.path(), &["scan"]).status.code(), Some(0));

    let absolute = dir.path().join("src/shapes.py");
    let check = docmark(dir.path(), &["check", absolute.to_str().unwrap(), "--format", "json"]);
    assert_eq!(check.status.code(), Some(0), "{}", stdout(&check));
    let py = reports_for(&json(&check), "src/shapes.py");
    assert_eq!(py, vec![("none".to_string(), Vec::new(), Vec::new())]);
}

#[test]
fn full_scan_forgets_deleted_files() {
    let dir = fixture("shapes");
    assert_eq!(docmark(dir.path(), &["scan"]).status.code(), Some(0));
    let lockfile = dir.path().join(".docmark.lock");
    assert!(std::fs::read_to_string(&lockfile).unwrap().contains("src/lib.rs"));

    std::fs::remove_file(dir.path().join("src/lib.rs")).unwrap();
    assert_eq!(docmark(dir.path(), &["scan", "src/shapes.py"]).status.code(), Some(0));
    assert!(std::fs::read_to_string(&lockfile).unwrap().contains("src/lib.rs"), "explicit paths never prune");

    assert_eq!(docmark(dir.path(), &["scan"]).status.code(), Some(0));
    let store = std::fs::read_to_string(&lockfile).unwrap();
    assert!(!store.contains("src/lib.rs"));
    assert!(store.contains("src/shapes.py"));
}

#[test]
fn comment_only_edit_changes_nothing() {
    let dir = fixture("shapes");
    assert_eq!(docmark(dir.path(), &["scan"]).status.code(), Some(0));

    let source = dir.path().join("src/shapes.py");
    let content = std::fs::read_to_string(&source).unwrap();
    let edited = content.replace("# math.pi keeps results stable across platforms", "# use math.pi");
    std::fs::write(&source, edited.replace("        return 4 * self.side", "        return 4 * self.side   \n\n")).unwrap();

    let check = docmark(dir.path(), &["check"]);
    assert_eq!(check.status.code(), Some(0), "{}", stdout(&check));
}

#[test]
fn structural_errors_exit_2_and_skip_the_store() {
    let dir = fixture("broken");

    let validate = docmark(dir.path(), &["validate"]);
    assert_eq!(validate.status.code(), Some(2));
    let out = stdout(&validate);
    assert!(out.contains("src/report.py:2: comment block crosses scope boundary"), "{out}");
    assert!(out.contains("src/report.py:13: class block has no class definition line"), "{out}");
    assert!(out.contains("2 error(s)"), "{out}");

    let scan = docmark(dir.path(), &["scan"]);
    assert_eq!(scan.status.code(), Some(2));
    assert!(!dir.path().join(".docmark.lock").exists(), "erroring file must not be stored");
}

#[test]
fn blocks_lists_nested_regions() {
    let dir = fixture("shapes");
    let output = docmark(dir.path(), &["blocks", "src/shapes.py", "--format", "json"]);
    assert_eq!(output.status.code(), Some(0));

    let results = json(&output);
    let blocks = results[0]["blocks"].as_array().unwrap();
    let summary: Vec<(String, String, u64, u64)> = blocks
        .iter()
        .map(|b| {
            (
                b["scope_type"].as_str().unwrap().to_string(),
                b["scope_name"].as_str().unwrap().to_string(),
                b["start_line"].as_u64().unwrap(),
                b["end_line"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("module".to_string(), "shapes".to_string(), 1, 42),
            ("class".to_string(), "Circle".to_string(), 7, 22),
            ("method".to_string(), "area".to_string(), 14, 21),
            ("comment".to_string(), "block_16".to_string(), 16, 19),
            ("class".to_string(), "Square".to_string(), 25, 41),
            ("method".to_string(), "perimeter".to_string(), 31, 34),
            ("method".to_string(), "scale".to_string(), 36, 39),
        ]
    );
    assert_eq!(blocks[1]["existing_documentation"], "A circle described by its radius.");
    assert_eq!(blocks[4]["existing_documentation"], Value::Null);
}

#[test]
fn malformed_config_is_an_error() {
    let dir = fixture("shapes");
    std::fs::write(dir.path().join(".docmark.toml"), "colour = \"red\"\n").unwrap();

    let scan = docmark(dir.path(), &["scan"]);
    assert_eq!(scan.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&scan.stderr).contains("Invalid TOML"));
    assert!(!dir.path().join(".docmark.lock").exists());
}

#[test]
fn config_store_path_and_excludes_apply() {
    let dir = fixture("shapes");
    std::fs::write(dir.path().join(".docmark.toml"), "exclude = [\"src/lib.rs\"]\nstore = \"state/hashes.lock\"\n")
        .unwrap();

    let scan = docmark(dir.path(), &["scan", "--format", "json"]);
    assert_eq!(scan.status.code(), Some(0));
    assert_eq!(json(&scan).as_array().unwrap().len(), 1);
    let store = std::fs::read_to_string(dir.path().join("state/hashes.lock")).unwrap();
    assert!(store.contains("scope_name = \"perimeter\""));
    assert!(!store.contains("lib.rs"));
}
