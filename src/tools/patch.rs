//! SEARCH/REPLACE patches and diff previews
//!
//! A patch body is a sequence of hunks:
//!
//! ```text
//! <<<<<<< SEARCH
//! exact existing text
//! =======
//! replacement text
//! >>>>>>> REPLACE
//! ```
//!
//! Hunks apply in order, each to the first occurrence of its SEARCH text in
//! the result of the previous hunk.

use crate::errors::{AgentError, Result};
use similar::TextDiff;

const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
const DIVIDER_MARKER: &str = "=======";
const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

/// One SEARCH/REPLACE pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub search: String,
    pub replace: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HunkState {
    Outside,
    Search,
    Replace,
}

/// Parse a patch body into hunks
pub fn parse_hunks(body: &str) -> Result<Vec<Hunk>> {
    let mut hunks = Vec::new();
    let mut state = HunkState::Outside;
    let mut search: Vec<&str> = Vec::new();
    let mut replace: Vec<&str> = Vec::new();

    for (idx, line) in body.lines().enumerate() {
        let marker = line.trim_end();
        match (state, marker) {
            (HunkState::Outside, SEARCH_MARKER) => state = HunkState::Search,
            (HunkState::Outside, _) => {
                if !marker.trim().is_empty() {
                    return Err(AgentError::PatchError(format!(
                        "line {}: text outside a SEARCH/REPLACE hunk",
                        idx + 1
                    )));
                }
            }
            (HunkState::Search, DIVIDER_MARKER) => state = HunkState::Replace,
            (HunkState::Search, _) => search.push(line),
            (HunkState::Replace, REPLACE_MARKER) => {
                hunks.push(Hunk {
                    search: search.join("\n"),
                    replace: replace.join("\n"),
                });
                search.clear();
                replace.clear();
                state = HunkState::Outside;
            }
            (HunkState::Replace, _) => replace.push(line),
        }
    }

    if state != HunkState::Outside {
        return Err(AgentError::PatchError("unterminated hunk".to_string()));
    }
    if hunks.is_empty() {
        return Err(AgentError::PatchError("no SEARCH/REPLACE hunks found".to_string()));
    }
    Ok(hunks)
}

/// Apply a patch body to `original`
pub fn apply_patch(original: &str, body: &str) -> Result<String> {
    let mut current = original.to_string();

    for (idx, hunk) in parse_hunks(body)?.iter().enumerate() {
        if hunk.search.is_empty() {
            if current.trim().is_empty() {
                current = hunk.replace.clone();
                continue;
            }
            return Err(AgentError::PatchError(format!(
                "hunk {} has an empty SEARCH section",
                idx + 1
            )));
        }

        if !current.contains(&hunk.search) {
            let first_line = hunk.search.lines().next().unwrap_or("").trim();
            return Err(AgentError::PatchError(format!(
                "hunk {}: SEARCH text not found (starting with `{}`)",
                idx + 1,
                first_line
            )));
        }
        current = current.replacen(&hunk.search, &hunk.replace, 1);
    }

    Ok(current)
}

/// Unified diff of `old` → `new` for previews
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", path), &format!("b/{}", path))
        .to_string()
}
