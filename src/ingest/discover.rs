//! File discovery and ignore handling for sync.
//!
//! Besides explicit `--file`/`--dir` paths, discovery knows the default agent
//! memory layout: a `MEMORY.md` at the workspace root plus a `memory/`
//! directory of markdown notes. Patterns from a `.clawbrain-ignore` file in
//! the base directory are honored alongside CLI excludes.

use std::collections::HashSet;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use regex::Regex;

/// Name of the per-workspace ignore file.
pub const IGNORE_FILE: &str = ".clawbrain-ignore";

/// TTL for the canonical memory file's sync marker: 7 days. Even an
/// unchanged file is re-synced after a week, which catches corrupted
/// markers and (vanishingly unlikely) hash collisions.
pub const MEMORY_MD_TTL_SECONDS: u64 = 604_800;

const SYNC_KEY_PREFIX: &str = "sync:";

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date pattern"));

/// Redis key tracking a file's sync state.
pub fn sync_key(path: &Path) -> String {
    format!("{SYNC_KEY_PREFIX}{}", path.display())
}

/// Whether the filename is `memory.md` in any letter case. The canonical
/// memory file is the one mutable source; everything else is treated as
/// immutable once ingested.
pub fn is_memory_md(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case("memory.md"))
}

/// Whether the filename carries today's date (`YYYY-MM-DD`). Today's daily
/// journal is still being appended to, so ingesting it now would freeze a
/// half-written day.
pub fn is_today_daily_file(path: &Path) -> bool {
    let Some(base) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    let Some(found) = DATE_PATTERN.find(base) else {
        return false;
    };
    found.as_str() == chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Read ignore patterns from `.clawbrain-ignore` under the base path.
/// Missing file means no patterns. Blank lines and `#` comments are
/// dropped.
pub fn load_ignore_patterns(base: &Path) -> Vec<String> {
    let Ok(contents) = std::fs::read_to_string(base.join(IGNORE_FILE)) else {
        return Vec::new();
    };
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

/// Whether a path matches any ignore pattern. A pattern is tried against
/// the base filename and the full path; a pattern containing a separator is
/// also tried as a path suffix, so `memory/scratch.md` matches
/// `/workspace/memory/scratch.md`.
pub fn is_ignored(path: &Path, patterns: &[String]) -> bool {
    let options = MatchOptions {
        require_literal_separator: true,
        ..Default::default()
    };
    let base = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let full = path.to_string_lossy();

    for raw in patterns {
        let Ok(pattern) = Pattern::new(raw) else {
            continue;
        };
        if pattern.matches_with(base, options) || pattern.matches_with(&full, options) {
            return true;
        }
        if raw.contains(MAIN_SEPARATOR) {
            let suffix = format!("{MAIN_SEPARATOR}{raw}");
            if full.ends_with(&suffix) {
                return true;
            }
        }
    }
    false
}

/// Find the markdown files to sync. Explicit files are taken as-is;
/// explicit directories contribute their non-recursive `*.md` entries. With
/// no explicit paths, the default layout applies: the first of `MEMORY.md` /
/// `memory.md` at the base (never both, to guard against case-insensitive
/// filesystems producing phantom duplicates) plus every `*.md` under
/// `<base>/memory/`. Returns canonical absolute paths, deduplicated.
pub fn discover_files(
    base: &Path,
    files: &[PathBuf],
    dirs: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for file in files {
        add_file(file, &mut seen, &mut result);
    }
    for dir in dirs {
        for entry in markdown_in(dir)? {
            add_file(&entry, &mut seen, &mut result);
        }
    }

    if files.is_empty() && dirs.is_empty() {
        for name in ["MEMORY.md", "memory.md"] {
            let candidate = base.join(name);
            if candidate.exists() {
                add_file(&candidate, &mut seen, &mut result);
                break;
            }
        }
        let memory_dir = base.join("memory");
        if memory_dir.is_dir() {
            for entry in markdown_in(&memory_dir)? {
                add_file(&entry, &mut seen, &mut result);
            }
        }
    }

    Ok(result)
}

/// Non-recursive `*.md` glob over one directory.
fn markdown_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.md");
    let pattern = pattern.to_string_lossy();
    let paths = glob::glob(&pattern).with_context(|| format!("glob {pattern}"))?;
    Ok(paths.filter_map(|entry| entry.ok()).collect())
}

/// Canonicalize and record a path. Missing paths and non-files are skipped
/// silently; canonical form also collapses aliases of the same file.
fn add_file(path: &Path, seen: &mut HashSet<PathBuf>, result: &mut Vec<PathBuf>) {
    let Ok(abs) = path.canonicalize() else {
        return;
    };
    if !abs.is_file() {
        return;
    }
    if seen.insert(abs.clone()) {
        result.push(abs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn sync_key_prefixes_the_path() {
        assert_eq!(
            sync_key(Path::new("/workspace/MEMORY.md")),
            "sync:/workspace/MEMORY.md"
        );
    }

    #[test]
    fn memory_md_detection_is_case_insensitive() {
        assert!(is_memory_md(Path::new("/a/MEMORY.md")));
        assert!(is_memory_md(Path::new("/a/memory.md")));
        assert!(is_memory_md(Path::new("Memory.Md")));
        assert!(!is_memory_md(Path::new("/a/memory/notes.md")));
        assert!(!is_memory_md(Path::new("/a/MEMORY.txt")));
    }

    #[test]
    fn todays_daily_file_is_detected() {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        assert!(is_today_daily_file(Path::new(&format!("/m/{today}.md"))));
        assert!(is_today_daily_file(Path::new(&format!(
            "/m/journal-{today}-notes.md"
        ))));
        assert!(!is_today_daily_file(Path::new("/m/2020-01-01.md")));
        assert!(!is_today_daily_file(Path::new("/m/notes.md")));
    }

    #[test]
    fn ignore_file_parsing_drops_comments_and_blanks() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(IGNORE_FILE),
            "# comment\n\nscratch.md\n  *.tmp.md  \n#another\nmemory/private.md\n",
        )
        .unwrap();
        let patterns = load_ignore_patterns(dir.path());
        assert_eq!(patterns, vec!["scratch.md", "*.tmp.md", "memory/private.md"]);
    }

    #[test]
    fn missing_ignore_file_means_no_patterns() {
        let dir = tempdir().unwrap();
        assert!(load_ignore_patterns(dir.path()).is_empty());
    }

    #[test]
    fn ignore_matches_basename_fullpath_and_suffix() {
        let patterns: Vec<String> = vec![
            "scratch.md".into(),
            "*.draft.md".into(),
            "memory/private.md".into(),
        ];
        assert!(is_ignored(Path::new("/w/scratch.md"), &patterns));
        assert!(is_ignored(Path::new("/w/deep/notes.draft.md"), &patterns));
        assert!(is_ignored(Path::new("/w/memory/private.md"), &patterns));
        assert!(!is_ignored(Path::new("/w/memory/public.md"), &patterns));
        assert!(!is_ignored(Path::new("/w/notes.md"), &patterns));
        // Suffix matching anchors at a separator: "private.md" inside a
        // different directory does not match the path-qualified pattern.
        assert!(!is_ignored(Path::new("/w/other/private.md"), &patterns));
    }

    #[test]
    fn no_patterns_ignores_nothing() {
        assert!(!is_ignored(Path::new("/w/notes.md"), &[]));
    }

    #[test]
    fn explicit_file_is_discovered() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.md");
        fs::write(&file, "content").unwrap();

        let found = discover_files(dir.path(), &[file.clone()], &[]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("notes.md"));
        assert!(found[0].is_absolute());
    }

    #[test]
    fn explicit_dir_contributes_markdown_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join("c.txt"), "c").unwrap();

        let found = discover_files(dir.path(), &[], &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.extension().unwrap() == "md"));
    }

    #[test]
    fn default_layout_finds_memory_md_and_memory_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("MEMORY.md"), "root memory").unwrap();
        fs::create_dir(dir.path().join("memory")).unwrap();
        fs::write(dir.path().join("memory/project.md"), "notes").unwrap();
        fs::write(dir.path().join("memory/skip.txt"), "not markdown").unwrap();

        let found = discover_files(dir.path(), &[], &[]).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.ends_with("MEMORY.md")));
        assert!(found.iter().any(|p| p.ends_with("project.md")));
    }

    #[test]
    fn default_layout_takes_only_one_memory_md_variant() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("MEMORY.md"), "upper").unwrap();
        // On a case-sensitive filesystem this is a second file; on a
        // case-insensitive one it aliases the first. Either way only one
        // may be ingested.
        let _ = fs::write(dir.path().join("memory.md"), "lower");

        let found = discover_files(dir.path(), &[], &[]).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn duplicate_explicit_paths_collapse() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.md");
        fs::write(&file, "content").unwrap();

        let found =
            discover_files(dir.path(), &[file.clone(), file.clone()], &[]).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn missing_files_are_skipped_silently() {
        let dir = tempdir().unwrap();
        let found = discover_files(
            dir.path(),
            &[dir.path().join("does-not-exist.md")],
            &[],
        )
        .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn empty_workspace_discovers_nothing() {
        let dir = tempdir().unwrap();
        let found = discover_files(dir.path(), &[], &[]).unwrap();
        assert!(found.is_empty());
    }
}
