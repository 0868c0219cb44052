//! Language-level diff statistics from `cloc --git --diff --json`
//!
//! cloc groups its diff report by bucket (`added`, `removed`, `modified`,
//! `same`), each bucket mapping a language name to file, blank, comment and
//! code counts. The totals live in a top-level `SUM` object keyed by bucket.
//! This module pivots that into one
//! [`LanguageDiff`] per language and flags added/removed pairs that look like
//! code moved between files rather than written or deleted.

use crate::config::ClocConfig;
use crate::error::{ChurnError, FormatError, LogSource, Result};
use crate::git::history::validate_ref;
use crate::process::{CommandRunner, CommandSpec};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;


/// Counts for one language in one bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDiffStat {
    pub n_files: u64,
    pub blank: u64,
    pub comment: u64,
    pub code: u64,
    /// Identical added and removed counts: probably moved, not rewritten
    pub possible_cut_paste: bool,
}

/// The four cloc buckets of one language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDiff {
    pub added: LanguageDiffStat,
    pub removed: LanguageDiffStat,
    pub modified: LanguageDiffStat,
    pub same: LanguageDiffStat,
}

/// Per-language statistics plus the `SUM` totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDiffReport {
    pub languages: BTreeMap<String, LanguageDiff>,
    pub sum: LanguageDiff,
}

impl LanguageDiffReport {
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Run the cut-paste classifier over every language
    pub fn apply_cut_paste(&mut self) {
        for diff in self.languages.values_mut() {
            classify_cut_paste(&mut diff.added, &mut diff.removed);
        }
    }

    /// Languages flagged as a likely cut-and-paste
    pub fn cut_paste_languages(&self) -> impl Iterator<Item = &str> {
        self.languages
            .iter()
            .filter(|(_, diff)| diff.added.possible_cut_paste)
            .map(|(name, _)| name.as_str())
    }
}

/// Flag an added/removed pair with identical non-trivial counts.
///
/// Both sides receive the same flag. A pair without comment or blank lines is
/// never flagged.
pub fn classify_cut_paste(added: &mut LanguageDiffStat, removed: &mut LanguageDiffStat) {
    let possible = added.code == removed.code
        && added.blank == removed.blank
        && added.comment == removed.comment
        && added.n_files == removed.n_files
        && added.code > 0
        && added.comment != 0
        && added.blank != 0;

    added.possible_cut_paste = possible;
    removed.possible_cut_paste = possible;
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct ClocCounts {
    #[serde(rename = "nFiles", default)]
    n_files: u64,
    #[serde(default)]
    blank: u64,
    #[serde(default)]
    comment: u64,
    #[serde(default)]
    code: u64,
}

impl From<ClocCounts> for LanguageDiffStat {
    fn from(counts: ClocCounts) -> Self {
        Self {
            n_files: counts.n_files,
            blank: counts.blank,
            comment: counts.comment,
            code: counts.code,
            possible_cut_paste: false,
        }
    }
}

/// One bucket, keeping track of keys that appeared more than once
#[derive(Debug, Default)]
struct LanguageTable {
    entries: BTreeMap<String, ClocCounts>,
    duplicates: Vec<String>,
}

impl<'de> Deserialize<'de> for LanguageTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = LanguageTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of language names to cloc counts")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = LanguageTable::default();
                while let Some((key, counts)) = map.next_entry::<String, ClocCounts>()? {
                    if table.entries.insert(key.clone(), counts).is_some() {
                        table.duplicates.push(key);
                    }
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// The `SUM` object: one totals row per bucket
#[derive(Debug, Default, Deserialize)]
struct SumTable {
    #[serde(default)]
    added: ClocCounts,
    #[serde(default)]
    removed: ClocCounts,
    #[serde(default)]
    modified: ClocCounts,
    #[serde(default)]
    same: ClocCounts,
}

impl From<SumTable> for LanguageDiff {
    fn from(sum: SumTable) -> Self {
        Self {
            added: sum.added.into(),
            removed: sum.removed.into(),
            modified: sum.modified.into(),
            same: sum.same.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClocDiffOutput {
    added: Option<LanguageTable>,
    removed: Option<LanguageTable>,
    modified: Option<LanguageTable>,
    same: Option<LanguageTable>,
    #[serde(rename = "SUM")]
    sum: Option<SumTable>,
}

#[derive(Clone, Copy)]
enum Bucket {
    Added,
    Removed,
    Modified,
    Same,
}

impl Bucket {
    fn slot(self, diff: &mut LanguageDiff) -> &mut LanguageDiffStat {
        match self {
            Bucket::Added => &mut diff.added,
            Bucket::Removed => &mut diff.removed,
            Bucket::Modified => &mut diff.modified,
            Bucket::Same => &mut diff.same,
        }
    }
}

/// Parse cloc's diff JSON into a report with cut-paste flags applied
pub fn parse_language_diff(
    json: &str,
    origin: &LogSource,
) -> std::result::Result<LanguageDiffReport, FormatError> {
    let output: ClocDiffOutput = serde_json::from_str(json).map_err(|e| FormatError::Json {
        reason: e.to_string(),
        origin: origin.clone(),
    })?;

    let Some(sum) = output.sum else {
        return Err(FormatError::MissingSum(origin.clone()));
    };

    let buckets = [
        (Bucket::Added, output.added),
        (Bucket::Removed, output.removed),
        (Bucket::Modified, output.modified),
        (Bucket::Same, output.same),
    ];

    let mut report = LanguageDiffReport {
        languages: BTreeMap::new(),
        sum: sum.into(),
    };

    for (bucket, table) in buckets {
        let Some(table) = table else {
            continue;
        };
        if let Some(key) = table.duplicates.into_iter().next() {
            return Err(FormatError::DuplicateKey {
                key,
                origin: origin.clone(),
            });
        }

        for (language, counts) in table.entries {
            *bucket.slot(report.languages.entry(language).or_default()) = counts.into();
        }
    }

    report.apply_cut_paste();
    tracing::debug!(
        "Parsed language diff with {} languages from {}",
        report.languages.len(),
        origin
    );
    Ok(report)
}

/// Read a saved cloc diff report; a missing file yields an empty report
pub async fn read_language_diff_file(path: &Path) -> Result<LanguageDiffReport> {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("Language diff {} not found, treating as empty", path.display());
            return Ok(LanguageDiffReport::default());
        }
        Err(e) => return Err(e.into()),
    };

    Ok(parse_language_diff(&json, &LogSource::File(path.to_path_buf()))?)
}

/// Runs `cloc` against two revisions of a repository
#[derive(Clone)]
pub struct LanguageDiffer {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl LanguageDiffer {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &ClocConfig) -> Self {
        Self {
            runner,
            program: config.program.clone(),
        }
    }

    pub fn command(&self, repo: &Path, from: &str, to: &str) -> Result<CommandSpec> {
        validate_ref(from)?;
        validate_ref(to)?;
        Ok(CommandSpec::new(&self.program)
            .current_dir(repo)
            .args(["--git", "--diff", "--json", "--quiet", from, to]))
    }

    /// Language statistics between `from` and `to`; no output means no changes
    pub async fn diff(&self, repo: &Path, from: &str, to: &str) -> Result<LanguageDiffReport> {
        let spec = self.command(repo, from, to)?;
        let json = self.runner.run(&spec).await?;
        if json.trim().is_empty() {
            tracing::info!("No language changes between {} and {}", from, to);
            return Ok(LanguageDiffReport::default());
        }
        parse_language_diff(&json, &LogSource::Stream).map_err(ChurnError::from)
    }
}
