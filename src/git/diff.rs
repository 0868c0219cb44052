//! Classification of `git diff --numstat -z` output
//!
//! With `-z` git terminates every record with NUL instead of newline and stops
//! quoting paths. An ordinary change is one token, `added\tdeleted\tpath`. A
//! rename or copy is three tokens: `added\tdeleted\t` (empty path), then the
//! pre-image path, then the post-image path.

use crate::error::FormatError;
use serde::{Deserialize, Serialize};

/// One logical diff unit between two revisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub file_path: String,
    /// Source path of a rename/copy, empty otherwise
    pub pre_image_path: String,
    pub is_rename_copy: bool,
}

/// Split a raw `-z` blob into tokens, dropping the empty tail after the final NUL
pub fn split_diff_output(raw: &str) -> Vec<String> {
    let mut tokens: Vec<String> = raw.split('\0').map(String::from).collect();
    while tokens.last().is_some_and(|t| t.is_empty() || t == "\n") {
        tokens.pop();
    }
    tokens
}

fn parse_count(value: &str) -> u64 {
    value.trim().parse().unwrap_or(0)
}

/// Classify NUL-separated numstat tokens into [`DiffEntry`] values
pub fn classify_diff_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<DiffEntry>, FormatError> {
    if tokens.is_empty() {
        tracing::info!("No files changed");
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut cursor = 0;

    while cursor < tokens.len() {
        let token = tokens[cursor].as_ref();
        let parts: Vec<&str> = token.split('\t').collect();
        let [added, deleted, path] = parts.as_slice() else {
            return Err(FormatError::MalformedDiffToken {
                index: cursor,
                token: token.to_string(),
            });
        };

        if path.is_empty() {
            let (Some(pre_image), Some(post_image)) = (tokens.get(cursor + 1), tokens.get(cursor + 2))
            else {
                return Err(FormatError::TruncatedRename {
                    index: cursor,
                    token: token.to_string(),
                });
            };
            entries.push(DiffEntry {
                lines_added: parse_count(added),
                lines_deleted: parse_count(deleted),
                file_path: post_image.as_ref().to_string(),
                pre_image_path: pre_image.as_ref().to_string(),
                is_rename_copy: true,
            });
            cursor += 3;
        } else {
            entries.push(DiffEntry {
                lines_added: parse_count(added),
                lines_deleted: parse_count(deleted),
                file_path: path.to_string(),
                pre_image_path: String::new(),
                is_rename_copy: false,
            });
            cursor += 1;
        }
    }

    tracing::debug!(
        "Classified {} diff tokens into {} entries",
        tokens.len(),
        entries.len()
    );
    Ok(entries)
}
