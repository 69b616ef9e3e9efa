//! Splitting a diff into logical change units.
//!
//! The model is asked for a JSON array of units. Its answer is extracted,
//! repaired and parsed; anything unusable degrades to a heuristic grouping of
//! the file names mentioned in the answer. Malformed model output is never an
//! error for the caller, only a failed completion call is.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::commit::analysis::analyze_diff;
use crate::commit::prompt::build_split_prompt;
use crate::error::BackendError;
use crate::git::DiffSummary;
use crate::llm::{CompletionBackend, extract_json_from_text, repair_trailing_commas};

/// Share of common words at which two explanations count as the same.
pub const DUPLICATE_THRESHOLD: f64 = 0.7;

static FILE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w\-./]+\.\w+").expect("file token regex is valid"));

/// A group of files the model considers one coherent change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalChangeUnit {
    pub name: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub should_split: bool,
}

impl LogicalChangeUnit {
    pub fn fingerprint(&self) -> UnitFingerprint {
        UnitFingerprint::new(&self.files)
    }

    /// The change description handed to the message generator.
    pub fn description(&self) -> String {
        format!(
            "# {}\n\n{}\n\nFiles changed: {}",
            self.name,
            self.explanation,
            self.files.join(", ")
        )
    }
}

/// Order-independent identity of a unit's file set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitFingerprint(Vec<String>);

impl UnitFingerprint {
    pub fn new(files: &[String]) -> Self {
        let mut files = files.to_vec();
        files.sort();
        files.dedup();
        Self(files)
    }
}

/// Units produced for one diff, and why the heuristic was used if it was.
#[derive(Debug, Clone, Default)]
pub struct SplitOutcome {
    pub units: Vec<LogicalChangeUnit>,
    pub fallback_reason: Option<String>,
}

/// Analyze `diff`, then split it.
pub async fn split_changes(
    diff: &str,
    backend: &dyn CompletionBackend,
) -> Result<SplitOutcome, BackendError> {
    let analysis = analyze_diff(diff, backend).await?;
    split_changes_with_analysis(diff, &analysis, backend).await
}

/// Split `diff` using an analysis the caller already has.
///
/// Units are restricted to files present in the diff and deduplicated,
/// keeping the first occurrence.
pub async fn split_changes_with_analysis(
    diff: &str,
    analysis: &str,
    backend: &dyn CompletionBackend,
) -> Result<SplitOutcome, BackendError> {
    let prompt = build_split_prompt(diff, analysis);
    debug!("Split prompt length: {} chars", prompt.len());

    let raw = backend.complete(&prompt).await?;
    debug!("Raw split response: {}", raw);

    let (units, fallback_reason) = match parse_logical_units(&raw) {
        Ok(units) => (units, None),
        Err(reason) => {
            warn!("Failed to parse logical units: {}", reason);
            (create_fallback_units(&raw), Some(reason))
        }
    };

    let known = DiffSummary::parse(diff).file_paths();
    let units = dedup_units(retain_known_files(units, &known));

    Ok(SplitOutcome {
        units,
        fallback_reason,
    })
}

/// Parse a model answer into units.
///
/// Takes the first balanced `[...]` span, removes trailing commas and
/// deserializes it. A missing array, invalid JSON, or a unit without a name
/// or files is an error carrying the reason.
pub fn parse_logical_units(raw: &str) -> Result<Vec<LogicalChangeUnit>, String> {
    let json = extract_json_from_text(raw).ok_or_else(|| "no JSON array in response".to_string())?;
    let json = repair_trailing_commas(json);

    let units: Vec<LogicalChangeUnit> =
        serde_json::from_str(&json).map_err(|e| format!("invalid JSON: {e}"))?;

    if let Some(idx) = units
        .iter()
        .position(|u| u.name.trim().is_empty() || u.files.is_empty())
    {
        return Err(format!("unit {} has no name or no files", idx + 1));
    }

    Ok(units)
}

/// Group file-like tokens in `text` by extension, one unit per extension.
///
/// Extensions keep the order in which they first appear. Every unit is marked
/// `should_split` when there is more than one group.
pub fn create_fallback_units(text: &str) -> Vec<LogicalChangeUnit> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for token in FILE_TOKEN.find_iter(text).map(|m| m.as_str()) {
        let ext = token.rsplit('.').next().unwrap_or(token).to_string();
        match groups.iter_mut().find(|(e, _)| *e == ext) {
            Some((_, files)) => {
                if !files.iter().any(|f| f == token) {
                    files.push(token.to_string());
                }
            }
            None => groups.push((ext, vec![token.to_string()])),
        }
    }

    let should_split = groups.len() > 1;
    groups
        .into_iter()
        .map(|(ext, files)| {
            let upper = ext.to_uppercase();
            LogicalChangeUnit {
                name: format!("{upper} Files Update"),
                files,
                explanation: format!("Changes to {upper} files"),
                should_split,
            }
        })
        .collect()
}

/// Whether two explanations share at least [`DUPLICATE_THRESHOLD`] of the
/// larger word set (lowercased, whitespace-split).
pub fn similar_explanations(a: &str, b: &str) -> bool {
    let words_a: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let words_b: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();

    let larger = words_a.len().max(words_b.len());
    if larger == 0 {
        return true;
    }

    let common = words_a.intersection(&words_b).count();
    common as f64 / larger as f64 >= DUPLICATE_THRESHOLD
}

/// Drop units whose file set equals an earlier unit's and whose explanation
/// is similar to it.
pub fn dedup_units(units: Vec<LogicalChangeUnit>) -> Vec<LogicalChangeUnit> {
    let mut kept: Vec<LogicalChangeUnit> = Vec::with_capacity(units.len());

    for unit in units {
        let fingerprint = unit.fingerprint();
        let duplicate = kept.iter().any(|existing| {
            existing.fingerprint() == fingerprint
                && similar_explanations(&existing.explanation, &unit.explanation)
        });
        if duplicate {
            debug!("Dropping duplicate unit '{}'", unit.name);
        } else {
            kept.push(unit);
        }
    }

    kept
}

/// Restrict each unit to files that appear in `known`, dropping units left
/// empty. With no known files the units pass through untouched.
///
/// `./`, `a/` and `b/` prefixes are tolerated when matching.
pub fn retain_known_files(
    units: Vec<LogicalChangeUnit>,
    known: &[String],
) -> Vec<LogicalChangeUnit> {
    if known.is_empty() {
        return units;
    }

    units
        .into_iter()
        .filter_map(|mut unit| {
            let mut files: Vec<String> = Vec::with_capacity(unit.files.len());
            for file in &unit.files {
                match resolve_known(file, known) {
                    Some(path) if !files.iter().any(|f| f == path) => files.push(path.to_string()),
                    Some(_) => {}
                    None => warn!("Unit '{}' names {} which is not in the diff", unit.name, file),
                }
            }
            if files.is_empty() {
                debug!("Dropping unit '{}' with no files from the diff", unit.name);
                return None;
            }
            unit.files = files;
            Some(unit)
        })
        .collect()
}

fn resolve_known<'a>(file: &str, known: &'a [String]) -> Option<&'a str> {
    let file = file.trim();
    let stripped = ["./", "a/", "b/"]
        .iter()
        .find_map(|prefix| file.strip_prefix(prefix));

    known
        .iter()
        .find(|k| k.as_str() == file || Some(k.as_str()) == stripped)
        .map(String::as_str)
}
