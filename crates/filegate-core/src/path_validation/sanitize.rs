//! Request sanitization and lexical normalization.
//!
//! Runs before any filesystem access. Rejects inputs whose structure only
//! appears after decoding (percent-encoding, Unicode look-alike separators)
//! and inputs naming Windows device files; everything else is passed on with
//! backslashes folded to `/`.

use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Longest request accepted, in bytes.
pub const MAX_PATH_LEN: usize = 4096;

/// Percent-decoding rounds tried before giving up (covers triple encoding).
const MAX_DECODE_ROUNDS: usize = 4;

/// Characters that render like a slash but are not one.
const LOOKALIKE_SEPARATORS: &[char] = &[
    '\u{2215}', // DIVISION SLASH
    '\u{2044}', // FRACTION SLASH
    '\u{2216}', // SET MINUS
    '\u{29F5}', // REVERSE SOLIDUS OPERATOR
    '\u{29F8}', // BIG SOLIDUS
    '\u{29F9}', // BIG REVERSE SOLIDUS
    '\u{FF0F}', // FULLWIDTH SOLIDUS
    '\u{FF3C}', // FULLWIDTH REVERSE SOLIDUS
    '\u{FE68}', // SMALL REVERSE SOLIDUS
];

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "CONIN$", "CONOUT$", "COM1", "COM2", "COM3", "COM4", "COM5",
    "COM6", "COM7", "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7",
    "LPT8", "LPT9",
];

/// Validate a raw request and return it with `/` as the only separator.
///
/// The returned string is the literal request: decoded or Unicode-folded
/// forms are only used to detect hidden structure, never to open files.
pub fn sanitize_request(requested: &str) -> Result<String, &'static str> {
    if requested.trim().is_empty() {
        return Err("empty path");
    }
    if requested.len() > MAX_PATH_LEN {
        return Err("path too long");
    }
    if requested.contains('\0') {
        return Err("null byte in path");
    }

    let literal = requested.replace('\\', "/");
    let literal_shape = PathShape::of(&literal);

    let folded = fold_lookalikes(&literal);
    if PathShape::of(&folded) != literal_shape {
        return Err("Unicode look-alike path characters");
    }

    let decoded = fold_lookalikes(&percent_decode_fully(&literal));
    if decoded.contains('\0') {
        return Err("encoded null byte in path");
    }
    if PathShape::of(&decoded) != literal_shape {
        return Err("encoded path separator or traversal sequence");
    }

    if literal.starts_with("//") {
        return Err("UNC or device namespace path");
    }
    if literal
        .split('/')
        .any(|segment| is_reserved_device_name(segment))
    {
        return Err("reserved device name");
    }

    Ok(literal)
}

/// Collapse `.` and `..` without touching the filesystem.
///
/// `..` that would climb above the start of a relative path is dropped, as is
/// `..` at the root of an absolute path. This is a second line of defense;
/// containment is decided on the canonical path.
pub fn normalize_lexical(path: &str) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in Path::new(path).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                }
            }
            Component::Normal(name) => {
                out.push(name);
                depth += 1;
            }
        }
    }
    out
}

/// Separator count and `..` segment count: the structure an attacker would
/// try to smuggle through an encoding.
#[derive(Debug, PartialEq, Eq)]
struct PathShape {
    separators: usize,
    parent_segments: usize,
}

impl PathShape {
    fn of(path: &str) -> Self {
        Self {
            separators: path.matches('/').count(),
            parent_segments: path.split('/').filter(|s| s.trim() == "..").count(),
        }
    }
}

/// NFKC-normalize and map look-alike separators to `/`.
fn fold_lookalikes(s: &str) -> String {
    s.nfkc()
        .map(|c| {
            if c == '\\' || LOOKALIKE_SEPARATORS.contains(&c) {
                '/'
            } else {
                c
            }
        })
        .collect()
}

fn percent_decode_fully(s: &str) -> String {
    let mut current = s.to_string();
    for _ in 0..MAX_DECODE_ROUNDS {
        let decoded = urlencoding::decode_binary(current.as_bytes());
        let decoded = String::from_utf8_lossy(&decoded).replace('\\', "/");
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

/// `CON`, `nul.txt`, `Com1 ` and friends.
fn is_reserved_device_name(segment: &str) -> bool {
    let stem = segment.split('.').next().unwrap_or(segment);
    let stem = stem.trim_end_matches([' ', '.']);
    RESERVED_DEVICE_NAMES
        .iter()
        .any(|name| stem.eq_ignore_ascii_case(name))
}
