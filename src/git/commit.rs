//! Commit records and the fixed-schema parsers that build them

use super::rename::rename_after;
use crate::error::{FormatError, LogSource};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Field count of a root-commit header, including the leading empty field
const ROOT_HEADER_FIELDS: usize = 7;
/// Field count of a header that carries a parent list
const HEADER_FIELDS_WITH_PARENTS: usize = 8;

/// Separator of the CSV records the commits are eventually written into
const CSV_SEPARATOR: char = ',';

/// Header of one commit from the sentinel-delimited log format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHeader {
    pub short_hash: String,
    pub author_date: DateTime<FixedOffset>,
    pub author_name: String,
    pub committer_name: String,
    pub committer_date: DateTime<FixedOffset>,
    /// First line of the message, with CSV separators replaced
    pub subject: String,
    /// Parent hashes in order; empty for a root commit
    pub parents: Vec<String>,
}

impl CommitHeader {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// One numstat line: lines added/deleted for a single path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub path: String,
}

/// A commit header and the file changes reported under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitWithFiles {
    pub header: CommitHeader,
    pub files: Vec<FileChange>,
}

impl CommitWithFiles {
    pub fn lines_added(&self) -> u64 {
        self.files.iter().map(|f| f.lines_added).sum()
    }

    pub fn lines_deleted(&self) -> u64 {
        self.files.iter().map(|f| f.lines_deleted).sum()
    }
}

/// Lightweight record from the comma-joined history format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitCompact {
    pub sha: String,
    pub date: String,
    pub author: String,
    pub subject: String,
    pub repo: String,
}

/// Replace characters that would split the subject in an enclosing CSV record
pub fn sanitize_subject(subject: &str) -> String {
    subject.replace(CSV_SEPARATOR, ";")
}

fn parse_date(value: &str, origin: &LogSource) -> Result<DateTime<FixedOffset>, FormatError> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|e| FormatError::InvalidDate {
        value: value.to_string(),
        reason: e.to_string(),
        origin: origin.clone(),
    })
}

/// Non-numeric counts (git prints `-` for binary files) count as zero
fn parse_count(value: &str) -> u64 {
    value.trim().parse().unwrap_or(0)
}

/// Parse a header line of the form
/// `S hash S author-date S author S committer S committer-date S subject [S parents]`
pub fn parse_commit_header(
    line: &str,
    sentinel: &str,
    origin: &LogSource,
) -> Result<CommitHeader, FormatError> {
    let mut fields: Vec<&str> = line.split(sentinel).collect();
    // An empty `%p` leaves a dangling sentinel at the end of a root commit's header
    if fields.len() > ROOT_HEADER_FIELDS && fields.last().is_some_and(|f| f.trim().is_empty()) {
        fields.pop();
    }

    let parents = match fields.len() {
        ROOT_HEADER_FIELDS => Vec::new(),
        HEADER_FIELDS_WITH_PARENTS => fields[7].split_whitespace().map(String::from).collect(),
        actual => {
            return Err(FormatError::FieldCount {
                line: line.to_string(),
                actual,
                origin: origin.clone(),
            });
        }
    };

    // fields[0] is the empty string before the leading sentinel
    Ok(CommitHeader {
        short_hash: fields[1].trim().to_string(),
        author_date: parse_date(fields[2], origin)?,
        author_name: fields[3].to_string(),
        committer_name: fields[4].to_string(),
        committer_date: parse_date(fields[5], origin)?,
        subject: sanitize_subject(fields[6]),
        parents,
    })
}

/// Parse one `added\tdeleted\tpath` numstat line
pub fn parse_file_change(line: &str, origin: &LogSource) -> Result<FileChange, FormatError> {
    let parts: Vec<&str> = line.split('\t').collect();
    let [added, deleted, path] = parts.as_slice() else {
        return Err(FormatError::MalformedFileLine {
            line: line.to_string(),
            origin: origin.clone(),
        });
    };

    Ok(FileChange {
        lines_added: parse_count(added),
        lines_deleted: parse_count(deleted),
        path: rename_after(path),
    })
}

/// Turn one segmented buffer (header line first) into a [`CommitWithFiles`]
pub fn parse_commit_buffer(
    lines: &[String],
    sentinel: &str,
    origin: &LogSource,
) -> Result<CommitWithFiles, FormatError> {
    let Some((header_line, file_lines)) = lines.split_first() else {
        return Err(FormatError::FieldCount {
            line: String::new(),
            actual: 0,
            origin: origin.clone(),
        });
    };

    let header = parse_commit_header(header_line, sentinel, origin)?;
    let files = file_lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_file_change(line, origin))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CommitWithFiles { header, files })
}

/// Parse `sha,date,author,subject` where the subject may itself contain commas.
///
/// The subject starts right after the third comma, located by summing the
/// lengths of the first three fields rather than re-joining a naive split.
pub fn parse_compact_line(line: &str, repo: &str) -> Result<CommitCompact, FormatError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 4 {
        return Err(FormatError::CompactLine(line.to_string()));
    }

    let subject_start = fields[0].len() + fields[1].len() + fields[2].len() + 3;

    Ok(CommitCompact {
        sha: fields[0].to_string(),
        date: fields[1].to_string(),
        author: fields[2].to_string(),
        subject: line[subject_start..].to_string(),
        repo: repo.to_string(),
    })
}
