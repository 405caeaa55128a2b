//! Content-aware file screening.
//!
//! [`SignatureClassifier`] identifies what a file actually is from its
//! leading bytes, [`FileScreener`] turns that and the file name into a
//! threat verdict, and [`FileGate`] composes both with path containment and
//! the sensitive-name policy from `filegate-core`.

pub mod classifier;
pub mod gate;
mod heuristics;
pub mod patterns;
pub mod report;
pub mod screening;
pub mod signature_file;
pub mod signatures;
pub mod types;

pub use classifier::{declared_extension, SignatureClassifier};
pub use gate::{FileGate, GateDecision};
pub use report::{
    format_report, format_screening_result, format_screening_result_compact,
    format_screening_result_json, generate_report, ScreeningReport,
};
pub use screening::{allows, FileScreener};
pub use signature_file::SignatureFile;
pub use signatures::{SignatureRegistry, UNKNOWN_TYPE};
pub use types::{
    DetectionResult, FileCategory, IssueKind, MagicPattern, ScreenOptions, ScreeningIssue,
    ScreeningResult, Severity, ThreatLevel, TypeSignature,
};
