//! Resolution of git's rename notation in numstat paths
//!
//! With rename detection on, `git log --numstat` reports a moved file as either
//! `prefix{old => new}suffix` (shared leading/trailing components factored out)
//! or `old/full/path => new/full/path` when nothing is shared.

use regex::Regex;
use std::sync::LazyLock;

const ARROW: &str = " => ";

static BRACE_RENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>[^{}]*)\{(?P<old>[^{}]*) => (?P<new>[^{}]*)\}(?P<suffix>[^{}]*)$")
        .expect("brace rename pattern is valid")
});

/// Which side of a rename to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameSide {
    /// Post-rename path: current identity of the file
    After,
    /// Pre-rename path: used to follow history across the move
    Before,
}

impl RenameSide {
    fn pick<'a>(self, old: &'a str, new: &'a str) -> &'a str {
        match self {
            RenameSide::After => new,
            RenameSide::Before => old,
        }
    }
}

/// Resolve `path` to one side of a rename. Paths without rename notation are
/// returned unchanged, and so is malformed brace notation (with a warning).
pub fn normalize_rename(path: &str, side: RenameSide) -> String {
    if !path.contains(ARROW) {
        return path.to_string();
    }

    let opens = path.matches('{').count();
    let closes = path.matches('}').count();

    if opens == 0 && closes == 0 {
        return match path.split_once(ARROW) {
            Some((old, new)) => side.pick(old, new).to_string(),
            None => path.to_string(),
        };
    }

    if opens != 1 || closes != 1 {
        tracing::warn!(
            "Unexpected rename notation ({} '{{', {} '}}'), keeping path as-is: {}",
            opens,
            closes,
            path
        );
        return path.to_string();
    }

    let Some(caps) = BRACE_RENAME.captures(path) else {
        tracing::warn!("Malformed brace rename, keeping path as-is: {}", path);
        return path.to_string();
    };

    let prefix = &caps["prefix"];
    let suffix = &caps["suffix"];
    let chosen = side.pick(&caps["old"], &caps["new"]);

    if chosen.is_empty() {
        // `a/{x => }/b` becomes `a/b`, `{x => }/b` becomes `b`
        let suffix = if prefix.is_empty() || prefix.ends_with('/') {
            suffix.strip_prefix('/').unwrap_or(suffix)
        } else {
            suffix
        };
        let joined = format!("{}{}", prefix, suffix);
        match joined.strip_suffix('/') {
            Some(trimmed) if suffix.is_empty() => trimmed.to_string(),
            _ => joined,
        }
    } else {
        format!("{}{}{}", prefix, chosen, suffix)
    }
}

/// Post-rename path
pub fn rename_after(path: &str) -> String {
    normalize_rename(path, RenameSide::After)
}

/// Pre-rename path
pub fn rename_before(path: &str) -> String {
    normalize_rename(path, RenameSide::Before)
}
