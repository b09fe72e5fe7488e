use anyhow::Result;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use swapscout::progress::NullProgress;
use swapscout::scan::PatternMatcher;
use swapscout::{FileScanner, SearchSpec, TextSubstitutor};
use tempfile::tempdir;

fn scanner() -> FileScanner {
    FileScanner::new(NonZeroUsize::new(4).unwrap())
}

fn create_test_files(
    dir: &tempfile::TempDir,
    file_count: usize,
    lines_per_file: usize,
) -> Result<()> {
    for i in 0..file_count {
        let file_path = dir.path().join(format!("test_{}.txt", i));
        let mut file = File::create(file_path)?;
        for j in 0..lines_per_file {
            writeln!(file, "Line {} in file {}: old_name is used here", j, i)?;
            writeln!(file, "Another line {} in file {}: nothing special", j, i)?;
        }
    }
    Ok(())
}

#[test]
fn test_extension_filter_scenario() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.txt"), "Hello foo foo")?;
    fs::write(dir.path().join("b.md"), "foo")?;

    let spec = SearchSpec::new("foo").with_extensions(vec![".txt".to_string()]);
    let scan = scanner().scan(dir.path(), &spec, &NullProgress)?;
    let summary = TextSubstitutor::new("foo", "bar", false)?.apply_all(
        dir.path(),
        &scan.matches,
        false,
        &NullProgress,
    );

    assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "Hello bar bar");
    assert_eq!(fs::read_to_string(dir.path().join("b.md"))?, "foo");
    assert_eq!(summary.files_changed, 1);
    assert_eq!(summary.total_replacements, 2);
    Ok(())
}

#[test]
fn test_excluded_files_never_match() -> Result<()> {
    let dir = tempdir()?;
    for sub in ["node_modules/lib", "dist", "build", "__pycache__", "src", ".next"] {
        fs::create_dir_all(dir.path().join(sub))?;
        fs::write(dir.path().join(sub).join("file.js"), "needle")?;
    }
    fs::write(dir.path().join("src/notes.md"), "needle")?;

    let spec = SearchSpec::new("needle").with_extensions(vec!["js".to_string()]);
    let scan = scanner().scan(dir.path(), &spec, &NullProgress)?;
    let found: HashSet<PathBuf> = scan.matches.iter().map(|m| m.relative.clone()).collect();
    assert_eq!(found, HashSet::from([PathBuf::from("src/file.js")]));
    Ok(())
}

#[test]
fn test_scan_halts_at_max_files() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 20, 2)?;

    let scan = scanner().scan(
        dir.path(),
        &SearchSpec::new("old_name").with_max_files(7),
        &NullProgress,
    )?;
    assert_eq!(scan.candidates, 7);
    assert_eq!(scan.matches.len(), 7);
    assert!(scan.truncated);
    Ok(())
}

#[test]
fn test_dry_run_never_changes_bytes() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 5, 10)?;
    let before: Vec<Vec<u8>> = (0..5)
        .map(|i| fs::read(dir.path().join(format!("test_{}.txt", i))))
        .collect::<std::io::Result<_>>()?;

    let scan = scanner().scan(dir.path(), &SearchSpec::new("old_name"), &NullProgress)?;
    let summary = TextSubstitutor::new("old_name", "new_name", false)?.apply_all(
        dir.path(),
        &scan.matches,
        true,
        &NullProgress,
    );
    assert_eq!(summary.files_changed, 5);
    assert_eq!(summary.total_replacements, 50);

    for (i, bytes) in before.iter().enumerate() {
        assert_eq!(&fs::read(dir.path().join(format!("test_{}.txt", i)))?, bytes);
    }
    Ok(())
}

#[test]
fn test_round_trip_restores_original() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("code.rs");
    let original = "fn old_name() {}\nlet x = old_name();\n";
    fs::write(&path, original)?;

    TextSubstitutor::new("old_name", "new_name", false)?.apply(&path, false)?;
    assert_eq!(
        fs::read_to_string(&path)?,
        "fn new_name() {}\nlet x = new_name();\n"
    );
    TextSubstitutor::new("new_name", "old_name", false)?.apply(&path, false)?;
    assert_eq!(fs::read_to_string(&path)?, original);
    Ok(())
}

#[test]
fn test_occurrence_count_ignores_mode() -> Result<()> {
    let dir = tempdir()?;
    let content = "Foo foo FOO f.o foo";
    let literal_count = PatternMatcher::literal("foo")?.count(content);
    assert_eq!(literal_count, 4);

    for (search, is_regex) in [("foo", false), ("foo", true), ("f.o", true)] {
        let path = dir.path().join("count.txt");
        fs::write(&path, content)?;
        let result = TextSubstitutor::new(search, "bar", is_regex)?.apply(&path, true)?;
        assert!(result.changed);
        assert_eq!(
            result.occurrences,
            PatternMatcher::literal(search)?.count(content),
            "search {:?} regex {}",
            search,
            is_regex
        );
    }
    Ok(())
}

#[test]
fn test_regex_substitution_across_tree() -> Result<()> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("src"))?;
    fs::write(dir.path().join("src/a.rs"), "let Version = 1;\nlet VERSION2 = 2;")?;

    let spec = SearchSpec::new(r"version(\d*)").regex(true);
    let scan = scanner().scan(dir.path(), &spec, &NullProgress)?;
    assert_eq!(scan.matches.len(), 1);

    let summary = TextSubstitutor::new(r"version(\d*)", "release$1", true)?.apply_all(
        dir.path(),
        &scan.matches,
        false,
        &NullProgress,
    );
    assert_eq!(summary.files_changed, 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("src/a.rs"))?,
        "let release = 1;\nlet release2 = 2;"
    );
    Ok(())
}
