//! Content heuristics for formats without magic bytes.
//!
//! Order: shebang, JSON, XML/HTML/SVG, CSS, Markdown, then plain text.

use std::sync::OnceLock;

use regex::Regex;

/// A heuristic hit: registry tag and confidence.
pub(crate) type Heuristic = (&'static str, f32);

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Share of control characters above which content is treated as binary.
const MAX_CONTROL_RATIO: f32 = 0.10;

pub(crate) fn detect(buf: &[u8], truncated: bool) -> Option<Heuristic> {
    let buf = buf.strip_prefix(UTF8_BOM).unwrap_or(buf);
    if let Some(tag) = shebang_interpreter(buf) {
        return Some((tag, 0.85));
    }
    let text = as_text(buf, truncated)?;
    let trimmed = text.trim_start();

    if let Some(confidence) = json_confidence(trimmed, truncated) {
        return Some(("JSON", confidence));
    }
    if let Some(tag) = markup_tag(trimmed) {
        return Some((tag, 0.7));
    }
    if css_regex().is_some_and(|re| re.is_match(strip_css_comments(trimmed))) {
        return Some(("CSS", 0.5));
    }
    if markdown_regex().is_some_and(|re| re.is_match(text)) {
        return Some(("MARKDOWN", 0.5));
    }
    Some(("TEXT", 0.3))
}

/// Map a `#!` line to a script tag.
fn shebang_interpreter(buf: &[u8]) -> Option<&'static str> {
    let rest = buf.strip_prefix(b"#!")?;
    let line_end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
    let line = std::str::from_utf8(&rest[..line_end]).ok()?;
    let mut tokens = line.split_whitespace();
    let mut program = basename(tokens.next()?);
    if program == "env" {
        program = tokens
            .find(|t| !t.starts_with('-') && !t.contains('='))
            .map(basename)
            .unwrap_or("");
    }
    let name = program.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    let tag = match name {
        "sh" | "bash" | "zsh" | "ksh" | "dash" | "ash" | "fish" | "csh" | "tcsh" => "SHELL",
        "python" | "pypy" => "PYTHON",
        "node" | "nodejs" | "deno" | "bun" => "JAVASCRIPT",
        "perl" => "PERL",
        "ruby" => "RUBY",
        "php" => "PHP",
        _ => "SCRIPT",
    };
    Some(tag)
}

fn basename(program: &str) -> &str {
    program.rsplit('/').next().unwrap_or(program)
}

/// UTF-8 text without NULs and with few control characters. A multi-byte
/// sequence cut off by the read window is tolerated.
fn as_text(buf: &[u8], truncated: bool) -> Option<&str> {
    if buf.is_empty() || buf.contains(&0) {
        return None;
    }
    let text = match std::str::from_utf8(buf) {
        Ok(text) => text,
        Err(e) if truncated && e.error_len().is_none() => {
            std::str::from_utf8(&buf[..e.valid_up_to()]).ok()?
        }
        Err(_) => return None,
    };
    let total = text.chars().count();
    let control = text
        .chars()
        .filter(|&c| c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0C' | '\x1B'))
        .count();
    if total == 0 || control as f32 / total as f32 > MAX_CONTROL_RATIO {
        return None;
    }
    Some(text)
}

fn json_confidence(trimmed: &str, truncated: bool) -> Option<f32> {
    let mut chars = trimmed.chars();
    let open = chars.next()?;
    if open != '{' && open != '[' {
        return None;
    }
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(0.8);
    }
    if !truncated {
        return None;
    }
    // The window cut a larger document; accept when the opening looks like JSON.
    let next = chars.find(|c| !c.is_whitespace())?;
    let plausible = match open {
        '{' => next == '"' || next == '}',
        _ => matches!(next, '{' | '[' | '"' | ']' | '-' | '0'..='9' | 't' | 'f' | 'n'),
    };
    plausible.then_some(0.6)
}

fn markup_tag(trimmed: &str) -> Option<&'static str> {
    let head: String = trimmed.chars().take(1024).collect::<String>().to_ascii_lowercase();
    if head.starts_with("<?xml") {
        return Some(if head.contains("<svg") { "SVG" } else { "XML" });
    }
    if head.starts_with("<svg") {
        return Some("SVG");
    }
    if ["<!doctype html", "<html", "<head", "<body"]
        .iter()
        .any(|p| head.starts_with(p))
    {
        return Some("HTML");
    }
    if head.starts_with("<!doctype") {
        return Some(if head.contains("<svg") { "SVG" } else { "XML" });
    }
    None
}

fn strip_css_comments(mut text: &str) -> &str {
    while let Some(rest) = text.strip_prefix("/*") {
        match rest.find("*/") {
            Some(end) => text = rest[end + 2..].trim_start(),
            None => return "",
        }
    }
    text
}

fn css_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:@(?:charset|import|media|font-face|keyframes|supports|namespace|layer)\b|[a-zA-Z.#*:\[][^{};()=]*\{[^{}]*?[a-zA-Z-]+\s*:[^{};]+[;}])",
        )
        .ok()
    })
    .as_ref()
}

fn markdown_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,6}[ \t]+\S|\[[^\]\n]+\]\([^)\s]+\)").ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shebang_interpreters() {
        assert_eq!(detect(b"#!/bin/sh\necho hi\n", false), Some(("SHELL", 0.85)));
        assert_eq!(detect(b"#!/usr/bin/env python3\nprint()\n", false).unwrap().0, "PYTHON");
        assert_eq!(
            detect(b"#!/usr/bin/env -S node --harmony\n", false).unwrap().0,
            "JAVASCRIPT"
        );
        assert_eq!(detect(b"#!/usr/bin/python3.11\n", false).unwrap().0, "PYTHON");
        assert_eq!(detect(b"#!/usr/bin/perl -w\n", false).unwrap().0, "PERL");
        assert_eq!(detect(b"#!/opt/bin/awk -f\n", false).unwrap().0, "SCRIPT");
        assert_eq!(detect(b"\xEF\xBB\xBF#!/bin/bash\n", false).unwrap().0, "SHELL");
    }

    #[test]
    fn test_json() {
        assert_eq!(detect(br#"{"a": [1, 2]}"#, false), Some(("JSON", 0.8)));
        assert_eq!(detect(b"  [1, 2, 3]\n", false), Some(("JSON", 0.8)));
        assert_eq!(detect(br#"{"a": [1, 2"#, true), Some(("JSON", 0.6)));
        // INI section headers are not JSON.
        assert_eq!(detect(b"[section]\nkey = value\n", true).unwrap().0, "TEXT");
        assert_ne!(detect(br#"{"a": [1, 2"#, false).unwrap().0, "JSON");
    }

    #[test]
    fn test_markup() {
        assert_eq!(detect(b"<?xml version=\"1.0\"?><root/>", false), Some(("XML", 0.7)));
        assert_eq!(
            detect(b"<?xml version=\"1.0\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\"/>", false)
                .unwrap()
                .0,
            "SVG"
        );
        assert_eq!(detect(b"<!DOCTYPE html><html></html>", false).unwrap().0, "HTML");
        assert_eq!(detect(b"  <html lang=\"en\">", false).unwrap().0, "HTML");
    }

    #[test]
    fn test_css_and_markdown() {
        assert_eq!(detect(b"body { margin: 0; }\n", false), Some(("CSS", 0.5)));
        assert_eq!(
            detect(b"/* theme */\n.btn, #main > a { color: red }\n", false).unwrap().0,
            "CSS"
        );
        assert_eq!(detect(b"@import url(base.css);\n", false).unwrap().0, "CSS");
        assert_eq!(detect(b"function f() { return 1; }\n", false).unwrap().0, "TEXT");
        assert_eq!(detect(b"# Title\n\nSome text.\n", false), Some(("MARKDOWN", 0.5)));
        assert_eq!(detect(b"see [docs](https://x.org)\n", false).unwrap().0, "MARKDOWN");
    }

    #[test]
    fn test_text_and_binary() {
        assert_eq!(detect(b"just some words\n", false), Some(("TEXT", 0.3)));
        assert_eq!(detect(b"", false), None);
        assert_eq!(detect(b"abc\x00def", false), None);
        assert_eq!(detect(b"\x01\x02\x03\x04abc", false), None);
        assert_eq!(detect(b"\xC3\x28 invalid utf8", false), None);
        // A multi-byte character split by the read window.
        assert_eq!(detect(b"caf\xC3", true).unwrap().0, "TEXT");
        assert_eq!(detect(b"caf\xC3", false), None);
    }
}
