//! Domain-grouped configuration structs, loaded from the environment.

use super::env_keys::{cache as cache_keys, gate as gate_keys, observability as obv_keys};
use super::loader::{env_bool, env_optional, env_or, env_paths};
use std::path::PathBuf;

/// Gate configuration: containment roots, relative base, extra signatures.
///
/// Built once at startup and passed explicitly to the gate; tests construct
/// it directly instead of going through the environment.
#[derive(Debug, Clone, Default)]
pub struct GateConfig {
    pub allowed_roots: Vec<PathBuf>,
    /// Base directory for relative requests; `None` means the process cwd.
    pub base_dir: Option<PathBuf>,
    pub signatures_file: Option<PathBuf>,
    /// Default for `ScreenOptions::strict_mode`.
    pub strict: bool,
}

impl GateConfig {
    /// Load from environment (also reads `.env`).
    ///
    /// With no roots configured the current directory is the only root.
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let mut allowed_roots = env_paths(
            gate_keys::FILEGATE_ALLOWED_ROOTS,
            gate_keys::ALLOWED_ROOTS_ALIASES,
        );
        if allowed_roots.is_empty() {
            allowed_roots.push(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        }
        Self {
            allowed_roots,
            base_dir: env_optional(gate_keys::FILEGATE_BASE_DIR, &[]).map(PathBuf::from),
            signatures_file: env_optional(gate_keys::FILEGATE_SIGNATURES_FILE, &[])
                .map(PathBuf::from),
            strict: env_bool(gate_keys::FILEGATE_STRICT, gate_keys::STRICT_ALIASES, false),
        }
    }

    pub fn with_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            allowed_roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Observability: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::FILEGATE_QUIET, obv_keys::QUIET_ALIASES, false),
                log_level: env_or(
                    obv_keys::FILEGATE_LOG_LEVEL,
                    obv_keys::LOG_LEVEL_ALIASES,
                    || "filegate=info".to_string(),
                ),
                log_json: env_bool(obv_keys::FILEGATE_LOG_JSON, obv_keys::LOG_JSON_ALIASES, false),
                audit_log: env_optional(obv_keys::FILEGATE_AUDIT_LOG, obv_keys::AUDIT_LOG_ALIASES),
            }
        })
    }
}

/// Detection cache location and lifetime.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub const DEFAULT_TTL_SECS: u64 = 300;

    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let cache_dir = env_optional(cache_keys::FILEGATE_CACHE_DIR, cache_keys::CACHE_DIR_ALIASES)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::cache_dir()
                    .or_else(dirs::home_dir)
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("filegate")
            });
        let ttl_secs = env_optional(cache_keys::FILEGATE_CACHE_TTL_SECS, &[])
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(Self::DEFAULT_TTL_SECS);
        Self {
            cache_dir,
            ttl_secs,
        }
    }
}
