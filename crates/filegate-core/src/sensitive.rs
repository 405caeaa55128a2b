//! Sensitive-name policy.
//!
//! Name-only, fail-fast check run before any content is read. Matching is
//! case-insensitive, separator-agnostic (`/` or `\`), and applied after
//! percent-decoding and Unicode compatibility folding, so `ID_RSA`,
//! `..%2f.ssh%2fid_rsa` and `C:\etc\shadow` all match.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// Exact file names (lowercase).
const SENSITIVE_BASENAMES: &[&str] = &[
    // OS credential stores
    "passwd",
    "shadow",
    "gshadow",
    "master.passwd",
    "sudoers",
    // SSH key material
    "id_rsa",
    "id_rsa.pub",
    "id_dsa",
    "id_dsa.pub",
    "id_ecdsa",
    "id_ecdsa.pub",
    "id_ed25519",
    "id_ed25519.pub",
    "authorized_keys",
    "authorized_keys2",
    "known_hosts",
    // Environment files
    ".env",
    // Secrets
    "credentials.json",
    "credentials",
    "secrets.json",
    "secret.json",
    "secrets.yaml",
    "secrets.yml",
    "client_secret.json",
    "application_default_credentials.json",
    "accesstokens.json",
    "azureprofile.json",
    ".netrc",
    "_netrc",
    ".pgpass",
    ".git-credentials",
    ".npmrc",
    ".pypirc",
    ".htpasswd",
];

/// Path tails (lowercase, `/`-separated) that are sensitive wherever they sit.
const SENSITIVE_PATH_SUFFIXES: &[&str] = &[
    "etc/passwd",
    "etc/shadow",
    "etc/gshadow",
    "etc/sudoers",
    "system32/config/sam",
    "system32/config/system",
    "system32/config/security",
    "repair/sam",
    ".aws/config",
    ".kube/config",
    ".docker/config.json",
    ".ssh/config",
];

/// Directories whose entire contents are off limits.
const SENSITIVE_DIRECTORIES: &[&str] = &[".ssh", ".gnupg", ".aws", ".azure", ".gcloud"];

/// Key and certificate-store extensions.
const SENSITIVE_EXTENSIONS: &[&str] = &[
    "pem", "key", "p12", "pfx", "jks", "keystore", "ppk", "kdbx", "asc", "gpg",
];

/// Suffixes editors and admins leave on copies of the files above.
const BACKUP_SUFFIXES: &[&str] = &[".bak", ".backup", ".old", ".orig", ".save", ".swp", "~"];

fn generated_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^\.env\..+$",
            r"^service[-_]?account.*\.json$",
            r"^.*credentials.*\.(json|ya?ml|xml|ini)$",
            r"^.*secrets?\.(json|ya?ml|toml|env)$",
            r"^gcloud.*\.json$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Catalog of sensitive names, extensible with extra exact names.
#[derive(Debug, Clone, Default)]
pub struct SensitiveNameMatcher {
    extra_basenames: Vec<String>,
}

impl SensitiveNameMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also treat these exact file names as sensitive.
    pub fn with_extra_basenames<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_basenames
            .extend(names.into_iter().map(|n| n.as_ref().to_lowercase()));
        self
    }

    pub fn is_sensitive(&self, path_or_name: &str) -> bool {
        let canonical = canonical_form(path_or_name);
        let trimmed = canonical.trim_end_matches('/');
        if trimmed.is_empty() {
            return false;
        }
        let without_backup = strip_backup_suffixes(trimmed);
        let hit = [trimmed, without_backup]
            .iter()
            .any(|candidate| self.matches_catalog(candidate));
        if hit {
            tracing::debug!(name = %path_or_name.escape_debug(), "sensitive name matched");
        }
        hit
    }

    fn matches_catalog(&self, path: &str) -> bool {
        let basename = path.rsplit('/').next().unwrap_or(path);

        if SENSITIVE_BASENAMES.contains(&basename)
            || self.extra_basenames.iter().any(|n| n == basename)
        {
            return true;
        }
        if SENSITIVE_PATH_SUFFIXES
            .iter()
            .any(|suffix| path == *suffix || path.ends_with(&format!("/{}", suffix)))
        {
            return true;
        }
        if path
            .split('/')
            .any(|segment| SENSITIVE_DIRECTORIES.contains(&segment))
        {
            return true;
        }
        if let Some((stem, ext)) = basename.rsplit_once('.') {
            if !stem.is_empty() && SENSITIVE_EXTENSIONS.contains(&ext) {
                return true;
            }
        }
        generated_patterns().iter().any(|re| re.is_match(basename))
    }
}

/// Shorthand for the built-in catalog.
pub fn is_sensitive_name(path_or_name: &str) -> bool {
    static DEFAULT: OnceLock<SensitiveNameMatcher> = OnceLock::new();
    DEFAULT
        .get_or_init(SensitiveNameMatcher::new)
        .is_sensitive(path_or_name)
}

/// Percent-decode (bounded), NFKC-fold, lowercase, `\` -> `/`, collapse
/// repeated separators.
fn canonical_form(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..4 {
        let decoded = urlencoding::decode_binary(current.as_bytes());
        let decoded = String::from_utf8_lossy(&decoded).into_owned();
        if decoded == current {
            break;
        }
        current = decoded;
    }
    let folded: String = current
        .nfkc()
        .filter(|c| !c.is_control() && !is_invisible(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c == '\\' { '/' } else { c })
        .collect();
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2069}' | '\u{FEFF}'
    )
}

fn strip_backup_suffixes(path: &str) -> &str {
    let mut current = path;
    loop {
        let stripped = BACKUP_SUFFIXES
            .iter()
            .find_map(|suffix| current.strip_suffix(suffix))
            .filter(|rest| !rest.is_empty() && !rest.ends_with('/'));
        match stripped {
            Some(rest) => current = rest,
            None => return current,
        }
    }
}
