//! Unified configuration layer.
//!
//! All environment reads are centralised here; gate components receive
//! explicit config structs and never call `std::env::var` themselves.
//!
//! - `loader`: env_or, env_optional, env_bool, env_paths helpers
//! - `schema`: GateConfig, ObservabilityConfig, CacheConfig
//! - `env_keys`: key constants (with legacy aliases)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_paths, load_dotenv};
pub use schema::{CacheConfig, GateConfig, ObservabilityConfig};
