pub mod config;
pub mod error;
pub mod observability;
pub mod path_validation;
pub mod scan_cache;
pub mod sensitive;

pub use error::{GateError, Result};
pub use path_validation::{PathContainment, ResolvedPath};
pub use sensitive::{is_sensitive_name, SensitiveNameMatcher};
