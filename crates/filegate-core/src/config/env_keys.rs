//! Environment variable key constants and aliases.
//!
//! Primary variables use the `FILEGATE_*` prefix; `FILEMGR_*` names from the
//! host service are accepted as aliases.

/// Containment and screening
pub mod gate {
    /// OS path-list (`:` on Unix, `;` on Windows) of allowed root directories.
    pub const FILEGATE_ALLOWED_ROOTS: &str = "FILEGATE_ALLOWED_ROOTS";
    pub const ALLOWED_ROOTS_ALIASES: &[&str] = &["FILEMGR_ALLOWED_DIRS"];

    /// Base directory relative requests are joined onto. Defaults to the cwd.
    pub const FILEGATE_BASE_DIR: &str = "FILEGATE_BASE_DIR";

    /// YAML file with additional type signatures.
    pub const FILEGATE_SIGNATURES_FILE: &str = "FILEGATE_SIGNATURES_FILE";

    /// Strict screening: any issue fails the file.
    pub const FILEGATE_STRICT: &str = "FILEGATE_STRICT";
    pub const STRICT_ALIASES: &[&str] = &["FILEMGR_STRICT_MODE"];
}

/// Observability and logging
pub mod observability {
    pub const FILEGATE_QUIET: &str = "FILEGATE_QUIET";
    pub const QUIET_ALIASES: &[&str] = &["FILEMGR_QUIET"];

    pub const FILEGATE_LOG_LEVEL: &str = "FILEGATE_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["FILEMGR_LOG_LEVEL"];

    pub const FILEGATE_LOG_JSON: &str = "FILEGATE_LOG_JSON";
    pub const LOG_JSON_ALIASES: &[&str] = &[];

    pub const FILEGATE_AUDIT_LOG: &str = "FILEGATE_AUDIT_LOG";
    pub const AUDIT_LOG_ALIASES: &[&str] = &["FILEMGR_AUDIT_LOG"];
}

/// Detection cache
pub mod cache {
    pub const FILEGATE_CACHE_DIR: &str = "FILEGATE_CACHE_DIR";
    pub const CACHE_DIR_ALIASES: &[&str] = &["FILEMGR_CACHE_DIR"];

    /// Seconds a cached detection stays valid. Default 300.
    pub const FILEGATE_CACHE_TTL_SECS: &str = "FILEGATE_CACHE_TTL_SECS";
}
