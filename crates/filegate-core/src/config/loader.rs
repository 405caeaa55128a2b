//! Environment loading helpers.
//!
//! Keeps the primary-then-alias fallback chain in one place so callers never
//! repeat `or_else` ladders.

use std::env;
use std::path::PathBuf;

/// Deprecated variable -> recommended variable.
const DEPRECATED_PAIRS: &[(&str, &str)] = &[
    ("FILEMGR_ALLOWED_DIRS", "FILEGATE_ALLOWED_ROOTS"),
    ("FILEMGR_AUDIT_LOG", "FILEGATE_AUDIT_LOG"),
    ("FILEMGR_QUIET", "FILEGATE_QUIET"),
    ("FILEMGR_LOG_LEVEL", "FILEGATE_LOG_LEVEL"),
    ("FILEMGR_CACHE_DIR", "FILEGATE_CACHE_DIR"),
];

fn warn_deprecated_env_vars() {
    use std::sync::Once;
    static WARNED: Once = Once::new();
    WARNED.call_once(|| {
        let hints: Vec<String> = DEPRECATED_PAIRS
            .iter()
            .filter(|(deprecated, recommended)| {
                env::var(deprecated).is_ok() && env::var(recommended).is_err()
            })
            .map(|(deprecated, recommended)| format!("{} → {}", deprecated, recommended))
            .collect();
        if !hints.is_empty() {
            tracing::warn!(
                "[DEPRECATED] the following variables are deprecated, please migrate:\n   {}",
                hints.join("\n   ")
            );
        }
    });
}

/// Load `.env` from the current directory without overriding existing vars.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let path = env::current_dir()
            .map(|d| d.join(".env"))
            .unwrap_or_else(|_| PathBuf::from(".env"));
        if let Ok(content) = std::fs::read_to_string(&path) {
            for (key, value) in parse_dotenv(&content) {
                if env::var(&key).is_err() {
                    env::set_var(&key, &value);
                }
            }
        }
        warn_deprecated_env_vars();
    });
}

/// Parse `KEY=value` lines. Comments, blank lines and surrounding quotes are
/// stripped; an inline `#` ends the value unless the value is quoted.
pub(crate) fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

/// Read the primary variable or the first set alias, falling back to `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Like [`env_or`] but returns `None` when unset (blank counts as unset).
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => parse_bool(s),
        None => default,
    }
}

fn parse_bool(s: &str) -> bool {
    !matches!(
        s.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// OS path-list variable (`std::env::split_paths`), empty entries dropped.
pub fn env_paths(primary: &str, aliases: &[&str]) -> Vec<PathBuf> {
    env_optional(primary, aliases)
        .map(|raw| {
            env::split_paths(&raw)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv_quotes_and_comments() {
        let pairs = parse_dotenv(
            "# comment\nA=1\nB = \"two words\"\nC='x' \nD=plain # trailing\n\nbroken line\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two words".to_string()),
                ("C".to_string(), "x".to_string()),
                ("D".to_string(), "plain".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_bool_values() {
        for v in ["0", "false", "No", " off "] {
            assert!(!parse_bool(v), "{v}");
        }
        for v in ["1", "true", "yes", "anything"] {
            assert!(parse_bool(v), "{v}");
        }
    }
}
