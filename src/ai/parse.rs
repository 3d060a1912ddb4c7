//! Reply parsing and the offline line extractor

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use super::Candidate;
use crate::error::AiError;
use crate::keys::{normalize_keys, parse_keys};

/// Bracket positions tried before giving up on a reply
const MAX_ARRAY_ATTEMPTS: usize = 64;

/// Byte range of the first balanced `[...]` in `text` that is valid JSON.
///
/// Brackets inside string literals are ignored, so prose and markdown
/// fences around the array do not matter. The search stops at the first
/// bracket that never closes and after [`MAX_ARRAY_ATTEMPTS`] candidates.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = 0;
    for _ in 0..MAX_ARRAY_ATTEMPTS {
        let open = start + text[start..].find('[')?;
        // Every later bracket sits inside this unclosed one
        let close = balanced_end(bytes, open)?;
        let slice = &text[open..=close];
        if serde_json::from_str::<Vec<serde_json::Value>>(slice).is_ok() {
            return Some(slice);
        }
        start = open + 1;
    }
    log::debug!("No JSON array within {} bracket candidates", MAX_ARRAY_ATTEMPTS);
    None
}

fn balanced_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Deserialize)]
struct RawCandidate {
    #[serde(default, alias = "name", alias = "action")]
    title: Option<String>,
    #[serde(default, alias = "shortcut", alias = "keybinding", alias = "key")]
    keys: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Turn a model reply into candidates.
///
/// Entries without a title or keys, and entries that are not objects, are
/// dropped. Keys are normalized.
pub fn parse_candidates(reply: &str) -> Result<Vec<Candidate>, AiError> {
    let array = extract_json_array(reply).ok_or_else(|| AiError::Parse {
        reason: "reply contains no JSON array".to_string(),
        raw: reply.to_string(),
    })?;

    let values: Vec<serde_json::Value> =
        serde_json::from_str(array).map_err(|e| AiError::Parse {
            reason: e.to_string(),
            raw: reply.to_string(),
        })?;

    let candidates = values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawCandidate>(v).ok())
        .filter_map(|raw| {
            let title = raw.title?.trim().to_string();
            let keys = raw.keys?.trim().to_string();
            if title.is_empty() || keys.is_empty() {
                return None;
            }
            Some(Candidate {
                title,
                keys: normalize_keys(&keys),
                description: raw.description.filter(|d| !d.trim().is_empty()),
                category: raw.category.filter(|c| !c.trim().is_empty()),
            })
        })
        .collect();
    Ok(candidates)
}

struct LinePatterns {
    keys_first: Regex,
    title_first: Regex,
    heading: Regex,
}

const KEYS: &str = r"(?:[⌃⌥⇧⌘]+\s*[^\s⌃⌥⇧⌘]+|(?i:(?:cmd|command|ctrl|control|alt|opt|option|shift|meta|super|win)\s*[+\-]\s*)+[^\s+]+)";

fn patterns() -> Option<&'static LinePatterns> {
    static PATTERNS: OnceLock<Option<LinePatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let keys_first =
                Regex::new(&format!(r"^\s*(?:[-*•]\s+)?({KEYS})(?:\s*[-–—:]\s*|\s+)(\S.*?)\s*$")).ok()?;
            let title_first =
                Regex::new(&format!(r"^\s*(?:[-*•]\s+)?(\S.*?)(?:\s*[:–—\-]\s*|\t+|\s{{2,}})({KEYS})\s*$")).ok()?;
            let heading = Regex::new(r"^\s*(?:#{1,6}\s+(.+?)|([^:⌘⌃⌥⇧]+):)\s*$").ok()?;
            Some(LinePatterns {
                keys_first,
                title_first,
                heading,
            })
        })
        .as_ref()
}

/// Extract candidates from plain text, one shortcut per line.
///
/// Understands `⌘⇧N  New Window`, `Cmd+Shift+N - New Window` and
/// `New Window: Ctrl+N`. Markdown headings and lone `Name:` lines set the
/// category of the lines that follow.
pub fn parse_shortcut_lines(text: &str) -> Vec<Candidate> {
    let Some(p) = patterns() else {
        log::error!("Shortcut line patterns failed to compile");
        return Vec::new();
    };

    let mut category: Option<String> = None;
    let mut out = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let parsed = p
            .keys_first
            .captures(line)
            .map(|c| (c[2].to_string(), c[1].to_string()))
            .or_else(|| {
                p.title_first
                    .captures(line)
                    .map(|c| (c[1].to_string(), c[2].to_string()))
            });

        match parsed {
            Some((title, keys)) if parse_keys(&keys).is_some() => {
                let title = title.trim().trim_end_matches([':', '-', '.']).trim();
                if title.is_empty() {
                    continue;
                }
                out.push(Candidate {
                    title: title.to_string(),
                    keys: normalize_keys(&keys),
                    description: None,
                    category: category.clone(),
                });
            }
            _ => {
                if let Some(c) = p.heading.captures(line) {
                    let name = c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().trim());
                    category = name.filter(|n| !n.is_empty()).map(str::to_string);
                }
            }
        }
    }
    out
}
