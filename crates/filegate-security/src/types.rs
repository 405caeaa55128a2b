//! Type signatures, detection results and screening verdicts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Broad file category. Closed set: every branch of the threat assessment
/// matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Archive,
    Executable,
    Script,
    Text,
    Audio,
    Video,
    Unknown,
}

impl FileCategory {
    /// Categories users open without expecting code to run.
    pub fn is_conventionally_safe(self) -> bool {
        match self {
            FileCategory::Image
            | FileCategory::Document
            | FileCategory::Text
            | FileCategory::Audio
            | FileCategory::Video => true,
            FileCategory::Archive
            | FileCategory::Executable
            | FileCategory::Script
            | FileCategory::Unknown => false,
        }
    }

    /// Plain text under this category's extensions is not a mismatch.
    pub fn accepts_plain_text(self) -> bool {
        match self {
            FileCategory::Text | FileCategory::Script => true,
            FileCategory::Image
            | FileCategory::Document
            | FileCategory::Archive
            | FileCategory::Executable
            | FileCategory::Audio
            | FileCategory::Video
            | FileCategory::Unknown => false,
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileCategory::Image => "image",
            FileCategory::Document => "document",
            FileCategory::Archive => "archive",
            FileCategory::Executable => "executable",
            FileCategory::Script => "script",
            FileCategory::Text => "text",
            FileCategory::Audio => "audio",
            FileCategory::Video => "video",
            FileCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Byte pattern anchored at `offset`; `None` bytes are wildcards.
///
/// Text form: optional `@<offset>:` followed by hex pairs, `??` for a
/// wildcard, whitespace ignored. `52494646 ???????? 57454250` is RIFF/WEBP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MagicPattern {
    offset: usize,
    bytes: Vec<Option<u8>>,
}

impl MagicPattern {
    pub fn exact(offset: usize, bytes: &[u8]) -> Self {
        Self {
            offset,
            bytes: bytes.iter().copied().map(Some).collect(),
        }
    }

    pub fn masked(offset: usize, bytes: &[Option<u8>]) -> Self {
        Self {
            offset,
            bytes: bytes.to_vec(),
        }
    }

    /// Parse the text form.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let (offset, hex_part) = match text.strip_prefix('@') {
            Some(rest) => {
                let (off, hex_part) = rest
                    .split_once(':')
                    .ok_or_else(|| format!("pattern '{}' is missing ':' after offset", text))?;
                let offset = off
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("pattern '{}' has an invalid offset", text))?;
                (offset, hex_part)
            }
            None => (0, text),
        };
        let digits: String = hex_part.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(format!("pattern '{}' must be whole hex bytes", text));
        }
        let mut bytes = Vec::with_capacity(digits.len() / 2);
        for pair in digits.as_bytes().chunks(2) {
            if pair == b"??" {
                bytes.push(None);
                continue;
            }
            let decoded = hex::decode(pair)
                .map_err(|_| format!("pattern '{}' contains non-hex characters", text))?;
            bytes.push(decoded.first().copied());
        }
        Ok(Self { offset, bytes })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Index just past the last byte this pattern inspects.
    pub fn end(&self) -> usize {
        self.offset + self.bytes.len()
    }

    /// Number of non-wildcard bytes.
    pub fn concrete_len(&self) -> usize {
        self.bytes.iter().filter(|b| b.is_some()).count()
    }

    pub fn matches(&self, buf: &[u8]) -> bool {
        match buf.get(self.offset..self.end()) {
            Some(window) => window
                .iter()
                .zip(&self.bytes)
                .all(|(actual, expected)| expected.map_or(true, |e| e == *actual)),
            None => false,
        }
    }
}

impl fmt::Display for MagicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset > 0 {
            write!(f, "@{}:", self.offset)?;
        }
        for b in &self.bytes {
            match b {
                Some(b) => write!(f, "{:02X}", b)?,
                None => f.write_str("??")?,
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for MagicPattern {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MagicPattern> for String {
    fn from(value: MagicPattern) -> Self {
        value.to_string()
    }
}

/// A registry entry identifying one file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSignature {
    pub type_tag: String,
    pub mime: String,
    /// Any matching pattern identifies the type. Empty for formats found
    /// only by content heuristics.
    #[serde(default)]
    pub patterns: Vec<MagicPattern>,
    /// When non-empty, one of these must also occur in the sampled bytes.
    /// Used to tell ZIP-based formats apart.
    #[serde(default)]
    pub content_markers: Vec<String>,
    /// When non-empty, some ZIP local-header entry name in the sample must
    /// start with one of these prefixes.
    #[serde(default)]
    pub zip_entries: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    pub category: FileCategory,
    #[serde(default)]
    pub is_executable: bool,
    #[serde(default)]
    pub description: String,
}

impl TypeSignature {
    pub fn new(type_tag: &str, mime: &str, category: FileCategory, description: &str) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            mime: mime.to_string(),
            patterns: Vec::new(),
            content_markers: Vec::new(),
            zip_entries: Vec::new(),
            extensions: Vec::new(),
            category,
            is_executable: matches!(category, FileCategory::Executable),
            description: description.to_string(),
        }
    }

    pub fn magic(mut self, bytes: &[u8]) -> Self {
        self.patterns.push(MagicPattern::exact(0, bytes));
        self
    }

    pub fn magic_at(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.patterns.push(MagicPattern::exact(offset, bytes));
        self
    }

    pub fn pattern(mut self, pattern: MagicPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn markers(mut self, markers: &[&str]) -> Self {
        self.content_markers = markers.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn zip_entries(mut self, prefixes: &[&str]) -> Self {
        self.zip_entries = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.extensions = exts.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn executable(mut self) -> Self {
        self.is_executable = true;
        self
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Magic patterns, content markers and ZIP entry prefixes against a
    /// sampled prefix. All three must hold.
    pub fn matches_content(&self, buf: &[u8]) -> bool {
        if !self.patterns.iter().any(|p| p.matches(buf)) {
            return false;
        }
        let markers_ok = self.content_markers.is_empty()
            || self
                .content_markers
                .iter()
                .any(|m| contains_subslice(buf, m.as_bytes()));
        let entries_ok = self.zip_entries.is_empty()
            || zip_entry_names(buf).any(|name| {
                self.zip_entries
                    .iter()
                    .any(|prefix| name.starts_with(prefix.as_bytes()))
            });
        markers_ok && entries_ok
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_LOCAL_HEADER_LEN: usize = 30;

/// Entry names of every complete local file header in `buf`.
fn zip_entry_names(buf: &[u8]) -> impl Iterator<Item = &[u8]> {
    buf.windows(ZIP_LOCAL_HEADER.len())
        .enumerate()
        .filter(|(_, w)| *w == ZIP_LOCAL_HEADER)
        .filter_map(move |(at, _)| {
            let len_bytes = buf.get(at + 26..at + 28)?;
            let name_len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
            let start = at + ZIP_LOCAL_HEADER_LEN;
            buf.get(start..start + name_len)
        })
}

/// One stored ZIP local file entry.
#[cfg(test)]
pub(crate) fn zip_local_entry(name: &str, data: &[u8]) -> Vec<u8> {
    let mut out = ZIP_LOCAL_HEADER.to_vec();
    out.extend_from_slice(&[0x14, 0x00, 0x00, 0x00, 0x00, 0x00]);
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(data);
    out
}

/// Concatenated stored entries, enough for signature sniffing.
#[cfg(test)]
pub(crate) fn zip_sample(entries: &[(&str, &[u8])]) -> Vec<u8> {
    entries
        .iter()
        .flat_map(|(name, data)| zip_local_entry(name, data))
        .collect()
}

/// Outcome of content-based type detection for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detected_type: String,
    pub mime: String,
    pub category: FileCategory,
    pub is_executable: bool,
    /// Lowercase, without the dot.
    pub declared_extension: Option<String>,
    pub extension_match: bool,
    /// In `[0, 1]`; 0 for unknown content.
    pub confidence: f32,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ExtensionMismatch,
    ExecutableDisguised,
    SuspiciousPattern,
    UnknownType,
    IoError,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::ExtensionMismatch => "extension_mismatch",
            IssueKind::ExecutableDisguised => "executable_disguised",
            IssueKind::SuspiciousPattern => "suspicious_pattern",
            IssueKind::UnknownType => "unknown_type",
            IssueKind::IoError => "io_error",
        };
        f.write_str(s)
    }
}

/// `Info` is only used for "content type unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl ScreeningIssue {
    pub fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    None,
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub const ALL: [ThreatLevel; 4] = [
        ThreatLevel::None,
        ThreatLevel::Low,
        ThreatLevel::Medium,
        ThreatLevel::High,
    ];

    /// Worst severity present: error -> high, warning -> medium, info -> low.
    pub fn from_issues(issues: &[ScreeningIssue]) -> Self {
        match issues.iter().map(|i| i.severity).max() {
            Some(Severity::Error) => ThreatLevel::High,
            Some(Severity::Warning) => ThreatLevel::Medium,
            Some(Severity::Info) => ThreatLevel::Low,
            None => ThreatLevel::None,
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreatLevel::None => "none",
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// Which checks `screen` runs. All on, strict off by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenOptions {
    pub check_extension_mismatch: bool,
    pub check_executable_content: bool,
    pub check_suspicious_patterns: bool,
    /// Any issue at all fails the file.
    pub strict_mode: bool,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            check_extension_mismatch: true,
            check_executable_content: true,
            check_suspicious_patterns: true,
            strict_mode: false,
        }
    }
}

impl ScreenOptions {
    pub fn strict() -> Self {
        Self {
            strict_mode: true,
            ..Self::default()
        }
    }
}

/// Screening verdict for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub file_path: PathBuf,
    pub declared_extension: Option<String>,
    pub detected_type: String,
    pub issues: Vec<ScreeningIssue>,
    pub threat_level: ThreatLevel,
    pub passed: bool,
}

impl ScreeningResult {
    /// Derives `threat_level` and `passed` from `issues`.
    pub fn new(
        file_path: PathBuf,
        declared_extension: Option<String>,
        detected_type: String,
        issues: Vec<ScreeningIssue>,
        strict_mode: bool,
    ) -> Self {
        let threat_level = ThreatLevel::from_issues(&issues);
        let passed = if strict_mode {
            issues.is_empty()
        } else {
            !issues.iter().any(|i| i.severity == Severity::Error)
        };
        Self {
            file_path,
            declared_extension,
            detected_type,
            issues,
            threat_level,
            passed,
        }
    }

    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    pub fn issue(&self, kind: IssueKind) -> Option<&ScreeningIssue> {
        self.issues.iter().find(|i| i.kind == kind)
    }

    /// Whether the detected type tag or the declared extension is listed.
    /// Case-insensitive; a leading dot on list entries is ignored.
    pub fn matches_type<S: AsRef<str>>(&self, allowed: &[S]) -> bool {
        allowed.iter().any(|t| {
            let t = t.as_ref().trim_start_matches('.');
            t.eq_ignore_ascii_case(&self.detected_type)
                || self
                    .declared_extension
                    .as_deref()
                    .is_some_and(|ext| t.eq_ignore_ascii_case(ext))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_pattern_parse_and_display() {
        let p = MagicPattern::parse("52494646 ???????? 57454250").unwrap();
        assert_eq!(p.offset(), 0);
        assert_eq!(p.end(), 12);
        assert_eq!(p.concrete_len(), 8);
        assert_eq!(p.to_string(), "52494646????????57454250");
        assert!(p.matches(b"RIFF\x10\x00\x00\x00WEBPVP8 "));
        assert!(!p.matches(b"RIFF\x10\x00\x00\x00WAVEfmt "));
        assert!(!p.matches(b"RIFF"));

        let tar = MagicPattern::parse("@257:7573746172").unwrap();
        assert_eq!(tar.offset(), 257);
        assert_eq!(tar.to_string(), "@257:7573746172");

        for bad in ["", "4", "ZZ", "@x:00", "@4"] {
            assert!(MagicPattern::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_threat_level_from_issues() {
        let info = ScreeningIssue::new(IssueKind::UnknownType, Severity::Info, "unknown");
        let warn = ScreeningIssue::new(IssueKind::ExtensionMismatch, Severity::Warning, "w");
        let err = ScreeningIssue::new(IssueKind::SuspiciousPattern, Severity::Error, "e");
        assert_eq!(ThreatLevel::from_issues(&[]), ThreatLevel::None);
        assert_eq!(ThreatLevel::from_issues(&[info.clone()]), ThreatLevel::Low);
        assert_eq!(
            ThreatLevel::from_issues(&[info.clone(), warn.clone()]),
            ThreatLevel::Medium
        );
        assert_eq!(ThreatLevel::from_issues(&[warn, err, info]), ThreatLevel::High);
    }

    #[test]
    fn test_passed_respects_strict_mode() {
        let warn = ScreeningIssue::new(IssueKind::SuspiciousPattern, Severity::Warning, "dots");
        let lenient = ScreeningResult::new(
            PathBuf::from("a.b.c.d.e.f"),
            Some("f".into()),
            "TEXT".into(),
            vec![warn.clone()],
            false,
        );
        assert!(lenient.passed);
        assert_eq!(lenient.threat_level, ThreatLevel::Medium);

        let strict = ScreeningResult::new(
            PathBuf::from("a.b.c.d.e.f"),
            Some("f".into()),
            "TEXT".into(),
            vec![warn],
            true,
        );
        assert!(!strict.passed);
    }

    #[test]
    fn test_screen_options_serde_defaults() {
        let opts: ScreenOptions = serde_json::from_str(r#"{"strict_mode": true}"#).unwrap();
        assert!(opts.strict_mode);
        assert!(opts.check_extension_mismatch);
        assert!(opts.check_executable_content);
        assert!(opts.check_suspicious_patterns);
    }

    #[test]
    fn test_zip_entries_match_name_prefix_only() {
        let sig = TypeSignature::new("DOCX", "a/b", FileCategory::Document, "")
            .magic(b"PK\x03\x04")
            .markers(&["[Content_Types].xml"])
            .zip_entries(&["word/"]);

        let docx = zip_sample(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", b"<w:document/>"),
        ]);
        assert!(sig.matches_content(&docx));

        let nested = zip_sample(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("com/acme/password/Main.class", b"\xCA\xFE\xBA\xBE"),
        ]);
        assert!(!sig.matches_content(&nested));

        let no_content_types = zip_sample(&[("word/document.xml", b"<w:document/>")]);
        assert!(!sig.matches_content(&no_content_types));

        // Name length pointing past the sample is ignored.
        let mut cut = zip_local_entry("word/document.xml", b"");
        cut.truncate(35);
        assert!(zip_entry_names(&cut).next().is_none());
    }
}
