//! LIST response parser.
//!
//! Each line is offered to four recognisers in a fixed order and the first
//! match wins:
//! 1. **Unix-style** (`ls -l`): `drwxr-xr-x 2 owner group 4096 Jun 12 12:00 name`
//! 2. **Windows/IIS-style**: `06-12-23  12:00PM  <DIR>  name` or `... 2048 name`
//! 3. **Minimal Unix**: a `d`/`-` type marker, anything, then a trailing name
//! 4. **Fallback**: last whitespace token is the name; directory-ness is a
//!    guess governed by [`FallbackPolicy`] and flagged as heuristic
//!
//! Parsing never fails. Blank lines, `total N` summaries and FTP reply
//! lines (`226 Transfer complete`) are skipped before the recognisers run.
//! Any other line reaches rule 4 and becomes a heuristic entry, so stray
//! server chatter shows up as a fallback-flagged name. `.` and `..` are
//! never emitted, and a bad numeric field becomes size 0.

use crate::ftpsync::types::{FallbackPolicy, ListingEntry, ListingFormat};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNIX_RE: Regex = Regex::new(
        r"(?x)
        ^([dlcbps-])([rwxsStT-]{9})[+@.]?\s+   # type + permissions (+ ACL marker)
        (\d+)\s+                                # link count
        (\S+)\s+                                # owner
        (\S+)\s+                                # group
        (\d+)\s+                                # size
        (\w{3}\s+\d{1,2}\s+[\d:]+)\s+           # date
        (.+)$                                   # name (possibly `-> target`)
        ",
    )
    .expect("unix listing pattern");

    static ref WINDOWS_RE: Regex = Regex::new(
        r"(?x)
        ^(\d{2}-\d{2}-\d{2,4})\s+               # date
        (\d{1,2}:\d{2}(?:[AaPp][Mm])?)\s+       # time
        (<DIR>|\d+)\s+                          # size or <DIR>
        (.+)$                                   # name
        ",
    )
    .expect("windows listing pattern");

    static ref MINIMAL_RE: Regex =
        Regex::new(r"^([d-])\S+\s+(?:.*\s)?(\S+)$").expect("minimal listing pattern");

    static ref TOTAL_RE: Regex = Regex::new(r"(?i)^total\s+\d+$").expect("total pattern");

    /// A three-digit reply code followed by a space, a dash or nothing.
    static ref REPLY_RE: Regex = Regex::new(r"^[1-5]\d{2}(?:[ -]|$)").expect("reply pattern");
}

/// Stateless multi-format listing decoder.
///
/// Browsing and download planning share one instance so the fallback guess
/// is applied identically on both paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingParser {
    fallback: FallbackPolicy,
}

impl ListingParser {
    pub fn new(fallback: FallbackPolicy) -> Self {
        Self { fallback }
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Parse a full LIST response body.
    pub fn parse_text(&self, raw: &str) -> Vec<ListingEntry> {
        self.parse(raw.lines())
    }

    /// Parse a sequence of listing lines.
    pub fn parse<I, S>(&self, lines: I) -> Vec<ListingEntry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter_map(|line| self.parse_line(line.as_ref()))
            .collect()
    }

    /// Parse a single line. `None` for blank, summary and reply lines, `.`
    /// and `..`.
    pub fn parse_line(&self, line: &str) -> Option<ListingEntry> {
        let line = line.trim();
        if line.is_empty() || TOTAL_RE.is_match(line) || REPLY_RE.is_match(line) {
            return None;
        }

        let entry = parse_unix(line)
            .or_else(|| parse_windows(line))
            .or_else(|| parse_minimal(line))
            .or_else(|| self.parse_fallback(line))?;

        if entry.name.is_empty() || entry.name == "." || entry.name == ".." {
            return None;
        }
        Some(entry)
    }

    // ─── Rule 4 ──────────────────────────────────────────────────────

    fn parse_fallback(&self, line: &str) -> Option<ListingEntry> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let name = clean_name(parts.last()?);
        let is_directory = match self.fallback {
            FallbackPolicy::LeadingMarker => parts.first().map_or(false, |t| t.starts_with('d')),
            FallbackPolicy::NoExtension => !name.contains('.'),
            FallbackPolicy::AlwaysFile => false,
        };
        Some(entry(name, is_directory, 0, String::new(), ListingFormat::Fallback))
    }
}

/// Parse a LIST body with the default fallback policy.
pub fn parse_listing(raw: &str) -> Vec<ListingEntry> {
    ListingParser::default().parse_text(raw)
}

fn clean_name(raw: &str) -> String {
    raw.replace('\r', "").trim().to_string()
}

fn parse_size(raw: &str) -> u64 {
    raw.parse::<u64>().unwrap_or(0)
}

fn entry(
    name: String,
    is_directory: bool,
    size_bytes: u64,
    raw_date: String,
    format: ListingFormat,
) -> ListingEntry {
    ListingEntry {
        name,
        is_directory,
        size_bytes: if is_directory { 0 } else { size_bytes },
        raw_date,
        format,
        permissions: None,
        link_target: None,
    }
}

// ─── Rule 1: Unix-style ──────────────────────────────────────────────

/// ```text
/// drwxr-xr-x   2 user group  4096 Jan  1 12:00 dirname
/// -rw-r--r--   1 user group  1234 Jan  1  2025 file.txt
/// lrwxrwxrwx   1 user group    42 Jan  1 12:00 link -> target
/// ```
fn parse_unix(line: &str) -> Option<ListingEntry> {
    let caps = UNIX_RE.captures(line)?;

    let type_char = caps.get(1)?.as_str();
    let perms = format!("{}{}", type_char, caps.get(2)?.as_str());
    let size = parse_size(caps.get(6)?.as_str());
    let date = caps.get(7)?.as_str().to_string();
    let name_raw = clean_name(caps.get(8)?.as_str());

    let is_directory = type_char == "d";
    let (name, link_target) = match (type_char, name_raw.find(" -> ")) {
        ("l", Some(pos)) => (
            name_raw[..pos].trim().to_string(),
            Some(name_raw[pos + 4..].trim().to_string()),
        ),
        _ => (name_raw, None),
    };

    let mut e = entry(name, is_directory, size, date, ListingFormat::Unix);
    e.permissions = Some(perms);
    e.link_target = link_target;
    Some(e)
}

// ─── Rule 2: Windows/IIS-style ───────────────────────────────────────

/// ```text
/// 06-12-23  12:00PM       <DIR> photos
/// 06-12-23  12:00PM        2048 readme.txt
/// ```
fn parse_windows(line: &str) -> Option<ListingEntry> {
    let caps = WINDOWS_RE.captures(line)?;

    let date = format!("{} {}", caps.get(1)?.as_str(), caps.get(2)?.as_str());
    let size_or_dir = caps.get(3)?.as_str();
    let name = clean_name(caps.get(4)?.as_str());

    let is_directory = size_or_dir == "<DIR>";
    let size = if is_directory { 0 } else { parse_size(size_or_dir) };
    Some(entry(name, is_directory, size, date, ListingFormat::Windows))
}

// ─── Rule 3: minimal Unix ────────────────────────────────────────────

fn parse_minimal(line: &str) -> Option<ListingEntry> {
    let caps = MINIMAL_RE.captures(line)?;
    let is_directory = caps.get(1)?.as_str() == "d";
    let name = clean_name(caps.get(2)?.as_str());
    Some(entry(name, is_directory, 0, String::new(), ListingFormat::Minimal))
}
