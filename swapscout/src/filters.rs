/// Candidate filtering for the file scanner.
///
/// Every check here operates on the path *relative to the scan root*, and the
/// checks run in a fixed order:
///
/// 1. any dot-prefixed path segment excludes the file,
/// 2. any configured exclusion substring excludes the file,
/// 3. when an extension filter is set, the file's final suffix must be in it.
///
/// The predicates are plain functions rather than a trait so the walker can
/// apply them cheaply to every directory entry.
use std::path::{Component, Path};

/// Checks if any segment of the path is hidden (starts with a dot)
pub fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(segment) => segment.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Checks if the path contains any of the excluded substrings
pub fn is_excluded(relative: &Path, exclude_dirs: &[String]) -> bool {
    let path_str = relative.to_string_lossy().replace('\\', "/");
    exclude_dirs
        .iter()
        .filter(|excluded| !excluded.is_empty())
        .any(|excluded| path_str.contains(excluded.as_str()))
}

/// Checks if a file has one of the allowed suffixes.
///
/// Entries may be written with or without the leading dot. The comparison is
/// exact, so `.TXT` does not satisfy a `.txt` filter.
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    match extensions {
        None => true,
        Some(exts) if exts.is_empty() => true,
        Some(exts) => match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext_str) => exts
                .iter()
                .any(|e| e.strip_prefix('.').unwrap_or(e) == ext_str),
            None => false,
        },
    }
}

/// Determines if a file should become a scan candidate
pub fn should_include_file(
    relative: &Path,
    extensions: &Option<Vec<String>>,
    exclude_dirs: &[String],
) -> bool {
    !is_hidden(relative)
        && !is_excluded(relative, exclude_dirs)
        && has_valid_extension(relative, extensions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new(".git/config")));
        assert!(is_hidden(Path::new("src/.cache/data.txt")));
        assert!(is_hidden(Path::new(".env")));
        assert!(!is_hidden(Path::new("src/main.rs")));
        assert!(!is_hidden(Path::new("docs/v1.2/notes.md")));
    }

    #[test]
    fn test_is_excluded() {
        let exclude = vec!["node_modules".to_string(), "build".to_string()];
        assert!(is_excluded(Path::new("web/node_modules/a.js"), &exclude));
        assert!(is_excluded(Path::new("build/out.txt"), &exclude));
        // Substring semantics, not whole-segment semantics
        assert!(is_excluded(Path::new("src/rebuild.rs"), &exclude));
        assert!(!is_excluded(Path::new("src/main.rs"), &exclude));
        assert!(!is_excluded(Path::new("src/main.rs"), &[String::new()]));
    }

    #[test]
    fn test_has_valid_extension() {
        let extensions = Some(vec![".txt".to_string(), "rs".to_string()]);
        assert!(has_valid_extension(Path::new("a.txt"), &extensions));
        assert!(has_valid_extension(Path::new("src/lib.rs"), &extensions));
        assert!(!has_valid_extension(Path::new("b.md"), &extensions));
        assert!(!has_valid_extension(Path::new("A.TXT"), &extensions));
        assert!(!has_valid_extension(Path::new("Makefile"), &extensions));
        assert!(has_valid_extension(Path::new("archive.tar.txt"), &extensions));

        assert!(has_valid_extension(Path::new("Makefile"), &None));
        assert!(has_valid_extension(Path::new("b.md"), &Some(vec![])));
    }

    #[test]
    fn test_should_include_file() {
        let extensions = Some(vec![".txt".to_string()]);
        let exclude = vec!["dist".to_string()];

        assert!(should_include_file(Path::new("a.txt"), &extensions, &exclude));
        assert!(!should_include_file(Path::new("b.md"), &extensions, &exclude));
        assert!(!should_include_file(Path::new("dist/a.txt"), &extensions, &exclude));
        assert!(!should_include_file(Path::new(".hidden/a.txt"), &extensions, &exclude));
    }
}
