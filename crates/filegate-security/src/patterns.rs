//! Filename spoofing checks: double extensions, bidi overrides, control
//! and invisible characters, excessive dots.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{IssueKind, ScreeningIssue, Severity};

/// More dots than this in one name is flagged.
pub const MAX_DOTS: usize = 4;

/// Explicit-direction formatting characters used to reverse displayed text.
const BIDI_CONTROLS: &[char] = &[
    '\u{200E}', '\u{200F}', '\u{061C}', '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}',
    '\u{2066}', '\u{2067}', '\u{2068}', '\u{2069}',
];

const INVISIBLE_CHARS: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

fn double_extension_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\.(pdf|docx?|xlsx?|pptx?|txt|rtf|odt|csv|jpe?g|png|gif|bmp|tiff?|webp|svg|mp3|mp4|wav|avi|mov|mkv|zip|rar|html?)[\s.]*\.(exe|bat|cmd|scr|pif|com|msi|sh|js|vbs|ps1|jar|lnk)$",
        )
        .ok()
    })
    .as_ref()
}

fn codepoint(c: char) -> String {
    format!("U+{:04X}", c as u32)
}

/// Every suspicious-pattern issue for `file_name` (a bare name, not a path).
pub fn check_filename(file_name: &str) -> Vec<ScreeningIssue> {
    let mut issues = Vec::new();
    // Windows drops trailing dots and spaces, so `a.pdf.exe. ` runs as `.exe`.
    let effective = file_name.trim_end_matches(|c: char| c == '.' || c == ' ');

    let double = double_extension_regex().and_then(|re| re.captures(effective));
    if let Some(caps) = &double {
        let visible = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
        let hidden = caps.get(2).map_or("", |m| m.as_str()).to_lowercase();
        issues.push(
            ScreeningIssue::new(
                IssueKind::SuspiciousPattern,
                Severity::Error,
                format!(
                    "Double extension: .{} file ends in executable extension .{}",
                    visible, hidden
                ),
            )
            .with_detail("pattern", "double_extension")
            .with_detail("hiddenExecutable", format!(".{}", hidden)),
        );
    } else {
        let exts: Vec<&str> = effective
            .trim_start_matches('.')
            .split('.')
            .skip(1)
            .filter(|s| !s.is_empty())
            .collect();
        if exts.len() >= 3 {
            issues.push(
                ScreeningIssue::new(
                    IssueKind::SuspiciousPattern,
                    Severity::Warning,
                    format!("Multiple extensions: .{}", exts.join(".")),
                )
                .with_detail("pattern", "multiple_extensions")
                .with_detail("extensions", format!(".{}", exts.join("."))),
            );
        }
    }

    if let Some(c) = file_name.chars().find(|c| c.is_ascii_control()) {
        issues.push(
            ScreeningIssue::new(
                IssueKind::SuspiciousPattern,
                Severity::Error,
                format!("Control character {} in filename", codepoint(c)),
            )
            .with_detail("pattern", "control_character")
            .with_detail("codepoint", codepoint(c)),
        );
    }

    if let Some(c) = file_name.chars().find(|c| BIDI_CONTROLS.contains(c)) {
        issues.push(
            ScreeningIssue::new(
                IssueKind::SuspiciousPattern,
                Severity::Error,
                format!(
                    "Unicode bidirectional override {} in filename can disguise its real extension",
                    codepoint(c)
                ),
            )
            .with_detail("pattern", "bidi_override")
            .with_detail("codepoint", codepoint(c)),
        );
    }

    if let Some(c) = file_name.chars().find(|c| INVISIBLE_CHARS.contains(c)) {
        issues.push(
            ScreeningIssue::new(
                IssueKind::SuspiciousPattern,
                Severity::Warning,
                format!("Invisible character {} in filename", codepoint(c)),
            )
            .with_detail("pattern", "invisible_character")
            .with_detail("codepoint", codepoint(c)),
        );
    }

    let dots = file_name.matches('.').count();
    if dots > MAX_DOTS {
        issues.push(
            ScreeningIssue::new(
                IssueKind::SuspiciousPattern,
                Severity::Warning,
                format!("Excessive dots in filename ({})", dots),
            )
            .with_detail("pattern", "excessive_dots")
            .with_detail("dots", dots.to_string()),
        );
    }

    issues
}
