//! Desktop-entry validation for launcher plugins.
//!
//! A launcher item is usable when its descriptor parses as an INI-style
//! desktop entry and the first word of its `Exec` line resolves to an
//! executable. Malformed descriptors are tolerated as soft diagnostics
//! rather than hard failures, matching long-standing panel behavior
//! (see https://bugzilla.xfce.org/show_bug.cgi?id=14597).

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::debug;

use crate::source::FileSource;

const MAIN_SECTION: &str = "Desktop Entry";

/// Check whether the descriptor at `rel` (relative to `source`) points at a
/// runnable application.
///
/// Absent or unreadable files are a silent `false`; a file that fails to
/// parse records a diagnostic on `errors` and still returns `false`.
pub fn check_desktop(source: &dyn FileSource, rel: &str, errors: &mut Vec<String>) -> bool {
    let Ok(Some(bytes)) = source.open(rel) else {
        return false;
    };
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            errors.push(format!("error parsing desktop file `{rel}`"));
            return false;
        }
    };
    let entry = match parse_entry(&text) {
        Ok(entry) => entry,
        Err(e) => {
            debug!(file = %rel, error = %e, "malformed desktop entry");
            errors.push(format!("error parsing desktop file `{rel}`"));
            return false;
        }
    };
    let Some(exec) = entry.get(MAIN_SECTION, "Exec") else {
        return false;
    };
    exec_resolves(exec)
}

/// True iff the first shell word of `exec` is an absolute path that exists
/// or a name that resolves through `PATH`. Empty or unsplittable `Exec`
/// lines are false without a diagnostic.
pub fn exec_resolves(exec: &str) -> bool {
    let exec = exec.trim();
    if exec.is_empty() {
        return false;
    }
    let Some(words) = shlex::split(exec) else {
        return false;
    };
    let Some(program) = words.first() else {
        return false;
    };
    let program = Path::new(program);
    if program.is_absolute() {
        return program.exists();
    }
    find_in_path(program).is_some()
}

fn find_in_path(program: &Path) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

struct DesktopEntry {
    sections: HashMap<String, HashMap<String, String>>,
}

impl DesktopEntry {
    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }
}

/// Minimal desktop-entry (INI) parser: `[Section]` headers, `Key=Value`
/// pairs, `#`/`;` comments. Anything else is a parse error.
fn parse_entry(text: &str) -> Result<DesktopEntry> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(rest) = line.strip_prefix('[') {
            let Some(name) = rest.strip_suffix(']') else {
                bail!("unterminated section header on line {}", lineno + 1);
            };
            current = Some(name.to_string());
        } else if let Some((key, value)) = line.split_once('=') {
            let Some(section) = current.as_deref() else {
                bail!("key outside any section on line {}", lineno + 1);
            };
            sections
                .entry(section.to_string())
                .or_default()
                .insert(key.trim_end().to_string(), value.trim_start().to_string());
        } else {
            bail!("malformed line {}", lineno + 1);
        }
    }

    Ok(DesktopEntry { sections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DirSource;
    use std::fs;

    fn source_with(files: &[(&str, &str)]) -> (tempfile::TempDir, DirSource) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let source = DirSource::new(dir.path());
        (dir, source)
    }

    #[test]
    fn test_valid_desktop_with_absolute_exec() {
        let (_dir, source) = source_with(&[(
            "launcher-1/sh.desktop",
            "[Desktop Entry]\nName=Shell\nExec=/bin/sh -c 'echo hi'\n",
        )]);
        let mut errors = Vec::new();
        assert!(check_desktop(&source, "launcher-1/sh.desktop", &mut errors));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_valid_desktop_with_path_lookup() {
        let (_dir, source) = source_with(&[(
            "launcher-1/sh.desktop",
            "[Desktop Entry]\nExec=sh\n",
        )]);
        let mut errors = Vec::new();
        assert!(check_desktop(&source, "launcher-1/sh.desktop", &mut errors));
    }

    #[test]
    fn test_unresolvable_executable_is_false() {
        let (_dir, source) = source_with(&[(
            "launcher-1/x.desktop",
            "[Desktop Entry]\nExec=definitely-not-a-real-binary-4127\n",
        )]);
        let mut errors = Vec::new();
        assert!(!check_desktop(&source, "launcher-1/x.desktop", &mut errors));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_file_is_silent_false() {
        let (_dir, source) = source_with(&[]);
        let mut errors = Vec::new();
        assert!(!check_desktop(&source, "launcher-1/gone.desktop", &mut errors));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_parse_failure_records_diagnostic() {
        let (_dir, source) = source_with(&[(
            "launcher-1/bad.desktop",
            "[Desktop Entry\nExec=/bin/sh\n",
        )]);
        let mut errors = Vec::new();
        assert!(!check_desktop(&source, "launcher-1/bad.desktop", &mut errors));
        assert_eq!(
            errors,
            vec!["error parsing desktop file `launcher-1/bad.desktop`".to_string()]
        );
    }

    #[test]
    fn test_missing_exec_is_silent_false() {
        let (_dir, source) = source_with(&[(
            "launcher-1/noexec.desktop",
            "[Desktop Entry]\nName=Nothing\n",
        )]);
        let mut errors = Vec::new();
        assert!(!check_desktop(&source, "launcher-1/noexec.desktop", &mut errors));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_whitespace_exec_is_silent_false() {
        assert!(!exec_resolves("   "));
        assert!(!exec_resolves(""));
    }

    #[test]
    fn test_unbalanced_quotes_in_exec_is_false() {
        assert!(!exec_resolves("/bin/sh 'unterminated"));
    }

    #[test]
    fn test_quoted_absolute_path_is_resolved() {
        assert!(exec_resolves("'/bin/sh' --version"));
    }

    #[test]
    fn test_comments_and_extra_sections_are_tolerated() {
        let (_dir, source) = source_with(&[(
            "launcher-1/full.desktop",
            "# a comment\n[Desktop Entry]\nExec=/bin/sh\n; another\n[Desktop Action New]\nExec=/bin/sh -c x\n",
        )]);
        let mut errors = Vec::new();
        assert!(check_desktop(&source, "launcher-1/full.desktop", &mut errors));
        assert!(errors.is_empty());
    }
}
