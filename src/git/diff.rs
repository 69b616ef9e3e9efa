//! Parsing of unified diff text produced by `git diff`.

use std::fmt;

/// Maximum files detailed in a change description.
pub const MAX_DESCRIBED_FILES: usize = 10;

/// Maximum added lines shown per file in a change description.
pub const MAX_LINES_PER_FILE: usize = 5;

/// Added lines longer than this are shortened in descriptions.
const MAX_LINE_WIDTH: usize = 80;

/// Status of a changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "Added"),
            FileStatus::Modified => write!(f, "Modified"),
            FileStatus::Deleted => write!(f, "Deleted"),
            FileStatus::Renamed => write!(f, "Renamed"),
        }
    }
}

/// A file touched by the diff.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
    /// Content of `+` lines, without the marker and trimmed.
    pub added_lines: Vec<String>,
    pub deletions: usize,
}

impl ChangedFile {
    /// Extension including the dot, or `None` for extensionless files.
    pub fn extension(&self) -> Option<&str> {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        name.rfind('.')
            .filter(|&idx| idx > 0)
            .map(|idx| &name[idx..])
    }
}

/// Structured view of a diff.
#[derive(Debug, Clone)]
pub struct DiffSummary {
    pub diff_text: String,
    pub changed_files: Vec<ChangedFile>,
    pub additions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    /// Parse `git diff` output. Files appear in diff order.
    pub fn parse(diff_text: &str) -> Self {
        let mut changed_files: Vec<ChangedFile> = Vec::new();
        let mut additions = 0usize;
        let mut deletions = 0usize;

        for line in diff_text.lines() {
            if let Some(rest) = line.strip_prefix("diff --git ") {
                changed_files.push(ChangedFile {
                    path: parse_header_path(rest),
                    status: FileStatus::Modified,
                    added_lines: Vec::new(),
                    deletions: 0,
                });
                continue;
            }

            let Some(current) = changed_files.last_mut() else {
                continue;
            };

            if line.starts_with("new file mode") {
                current.status = FileStatus::Added;
            } else if line.starts_with("deleted file mode") {
                current.status = FileStatus::Deleted;
            } else if let Some(to) = line.strip_prefix("rename to ") {
                current.status = FileStatus::Renamed;
                current.path = unquote_path(to);
            } else if line.starts_with("+++") || line.starts_with("---") {
                // file headers, not content
            } else if let Some(added) = line.strip_prefix('+') {
                additions += 1;
                current.added_lines.push(added.trim().to_string());
            } else if line.starts_with('-') {
                deletions += 1;
                current.deletions += 1;
            }
        }

        Self {
            diff_text: diff_text.to_string(),
            changed_files,
            additions,
            deletions,
        }
    }

    /// Paths of all changed files, in diff order.
    pub fn file_paths(&self) -> Vec<String> {
        self.changed_files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Extract the new-side path from the remainder of a `diff --git` header.
///
/// `a/src/x.rs b/src/x.rs` → `src/x.rs`. Git wraps paths with unusual
/// characters in C-style quotes (`"b/caf\303\251.md"`); those are decoded.
fn parse_header_path(rest: &str) -> String {
    if rest.contains('"') {
        let (old, remainder) = take_header_token(rest);
        let (new, _) = take_header_token(remainder.trim_start());
        let path = if new.is_empty() { old } else { new };
        return strip_side_prefix(&path).to_string();
    }
    if let Some(idx) = rest.find(" b/") {
        return rest[idx + 3..].to_string();
    }
    let first = rest.split(' ').next().unwrap_or(rest);
    first.strip_prefix("a/").unwrap_or(first).to_string()
}

fn strip_side_prefix(path: &str) -> &str {
    path.strip_prefix("b/")
        .or_else(|| path.strip_prefix("a/"))
        .unwrap_or(path)
}

/// Split one path token off a header, decoding it if quoted.
fn take_header_token(s: &str) -> (String, &str) {
    if s.starts_with('"') {
        let mut escaped = false;
        for (idx, c) in s.char_indices().skip(1) {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => return (unquote_path(&s[..=idx]), &s[idx + 1..]),
                _ => escaped = false,
            }
        }
        return (unquote_path(s), "");
    }
    match s.find(' ') {
        Some(idx) => (s[..idx].to_string(), &s[idx + 1..]),
        None => (s.to_string(), ""),
    }
}

/// Decode a path as git prints it with `core.quotePath`.
///
/// Unquoted input is returned as is. Octal escapes are raw bytes, so a
/// multi-byte UTF-8 name arrives as several `\ooo` groups.
fn unquote_path(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };

    let bytes = inner.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let next = bytes[i + 1];
        let octal = &bytes[i + 1..bytes.len().min(i + 4)];
        if octal.len() == 3 && octal.iter().all(|b| (b'0'..=b'7').contains(b)) {
            let value = octal
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            out.push(value as u8);
            i += 4;
            continue;
        }
        out.push(match next {
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            other => other,
        });
        i += 2;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Build the change description for the single-message flow.
///
/// Starts with a `Files changed:` line (the first [`MAX_DESCRIBED_FILES`]
/// paths) and then shows up to [`MAX_LINES_PER_FILE`] added lines for each of
/// those files, with counts for whatever was left out.
pub fn describe_changes(summary: &DiffSummary) -> String {
    let paths = summary.file_paths();
    let shown = &paths[..paths.len().min(MAX_DESCRIBED_FILES)];

    let mut description = format!("Files changed: {}\n", shown.join(", "));
    if paths.len() > MAX_DESCRIBED_FILES {
        description.push_str(&format!(
            "(and {} more files)\n",
            paths.len() - MAX_DESCRIBED_FILES
        ));
    }

    for file in summary.changed_files.iter().take(MAX_DESCRIBED_FILES) {
        if file.added_lines.is_empty() {
            continue;
        }

        description.push_str(&format!("\nFile: {}\n", file.path));
        for line in file.added_lines.iter().take(MAX_LINES_PER_FILE) {
            description.push_str(&format!("  + {}\n", shorten(line)));
        }
        if file.added_lines.len() > MAX_LINES_PER_FILE {
            description.push_str(&format!(
                "  ... and {} more changes\n",
                file.added_lines.len() - MAX_LINES_PER_FILE
            ));
        }
    }

    description
}

fn shorten(line: &str) -> String {
    if line.chars().count() <= MAX_LINE_WIDTH {
        return line.to_string();
    }
    let head: String = line.chars().take(MAX_LINE_WIDTH - 3).collect();
    format!("{head}...")
}
