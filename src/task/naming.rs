//! File and folder name templating
//!
//! Patterns mix literal text with `%` tokens:
//!
//! | token | value |
//! |---|---|
//! | `%y` / `%yy` | year, four or two digits |
//! | `%mo` / `%mon` | month number / month name |
//! | `%d` `%h` `%mi` `%s` `%ms` | day, hour, minute, second, millisecond |
//! | `%unix` | unix timestamp |
//! | `%t` / `%pn` | window title / process name |
//! | `%width` / `%height` | image size |
//! | `%ra{n}` / `%rn{n}` | random alphanumeric / digits, `n` defaults to 8 |
//! | `%guid` | random UUID |
//!
//! Unknown tokens are kept verbatim.

use chrono::{DateTime, Datelike, Local, Timelike};
use uuid::Uuid;

use super::metadata::TaskMetadata;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DEFAULT_RANDOM_LEN: usize = 8;
const MAX_TITLE_LEN: usize = 64;

// Longest first so `%mon` wins over `%mo` and `%ms` over `%m...`.
const TOKENS: &[&str] = &[
    "height", "width", "guid", "unix", "mon", "yy", "mo", "mi", "ms", "pn", "ra", "rn", "y", "d",
    "h", "s", "t",
];

/// Expands name patterns against a timestamp and task metadata
pub struct NameParser<'a> {
    now: DateTime<Local>,
    metadata: Option<&'a TaskMetadata>,
}

impl<'a> NameParser<'a> {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: &'a TaskMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Expand `pattern` into a string safe to use as a single file name
    pub fn file_name(&self, pattern: &str) -> String {
        sanitize_file_name(&self.expand(pattern))
    }

    pub fn expand(&self, pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() + 16);
        let mut rest = pattern;

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            match TOKENS.iter().find(|token| after.starts_with(**token)) {
                Some(token) => {
                    let mut tail = &after[token.len()..];
                    let arg = parse_length_arg(&mut tail);
                    out.push_str(&self.value(token, arg));
                    rest = tail;
                }
                None => {
                    out.push('%');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }

    fn value(&self, token: &str, arg: Option<usize>) -> String {
        let now = &self.now;
        match token {
            "y" => format!("{:04}", now.year()),
            "yy" => format!("{:02}", now.year() % 100),
            "mo" => format!("{:02}", now.month()),
            "mon" => now.format("%B").to_string(),
            "d" => format!("{:02}", now.day()),
            "h" => format!("{:02}", now.hour()),
            "mi" => format!("{:02}", now.minute()),
            "s" => format!("{:02}", now.second()),
            "ms" => format!("{:03}", now.timestamp_subsec_millis()),
            "unix" => now.timestamp().to_string(),
            "guid" => Uuid::new_v4().to_string(),
            "ra" => random_string(arg.unwrap_or(DEFAULT_RANDOM_LEN), ALPHANUMERIC),
            "rn" => random_string(arg.unwrap_or(DEFAULT_RANDOM_LEN), b"0123456789"),
            "t" => self
                .metadata
                .and_then(|m| m.window_title.as_deref())
                .map(|t| t.chars().take(MAX_TITLE_LEN).collect())
                .unwrap_or_default(),
            "pn" => self
                .metadata
                .and_then(|m| m.process_name.clone())
                .unwrap_or_default(),
            "width" => self
                .metadata
                .and_then(|m| m.image_width)
                .map(|w| w.to_string())
                .unwrap_or_default(),
            "height" => self
                .metadata
                .and_then(|m| m.image_height)
                .map(|h| h.to_string())
                .unwrap_or_default(),
            other => format!("%{other}"),
        }
    }
}

/// Parses an optional `{n}` suffix and advances `tail` past it
fn parse_length_arg(tail: &mut &str) -> Option<usize> {
    let inner = tail.strip_prefix('{')?;
    let end = inner.find('}')?;
    let value = inner[..end].parse().ok()?;
    *tail = &inner[end + 1..];
    Some(value)
}

fn random_string(len: usize, alphabet: &[u8]) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        for byte in Uuid::new_v4().as_bytes() {
            if out.len() == len {
                break;
            }
            out.push(alphabet[*byte as usize % alphabet.len()] as char);
        }
    }
    out
}

/// Replace characters that are invalid in file names on common platforms
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}
