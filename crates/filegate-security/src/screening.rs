//! Threat assessment over detection results and file names.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use filegate_core::{ResolvedPath, Result};

use crate::classifier::{declared_extension, SignatureClassifier};
use crate::patterns::check_filename;
use crate::signatures::UNKNOWN_TYPE;
use crate::types::{
    DetectionResult, IssueKind, ScreenOptions, ScreeningIssue, ScreeningResult, Severity,
    ThreatLevel,
};

/// Extensions commonly used to disguise executables. Executable content
/// under any of these is an error even when the extension check is off.
pub const MASQUERADE_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "jpg", "jpeg", "png", "gif",
];

/// Combines type detection and filename checks into a pass/fail verdict.
#[derive(Debug, Clone)]
pub struct FileScreener {
    classifier: Arc<SignatureClassifier>,
}

impl Default for FileScreener {
    fn default() -> Self {
        Self::new(Arc::new(SignatureClassifier::new()))
    }
}

impl FileScreener {
    pub fn new(classifier: Arc<SignatureClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &SignatureClassifier {
        &self.classifier
    }

    /// Screen a contained file. I/O failures yield a failed, high-threat result.
    pub fn screen(&self, path: &ResolvedPath, opts: &ScreenOptions) -> ScreeningResult {
        let detection = self.classifier.analyze_file(path);
        self.assess(path.as_path(), detection, opts)
    }

    /// Screen a path that has not been through containment.
    pub fn screen_path(&self, path: &Path, opts: &ScreenOptions) -> ScreeningResult {
        let detection = self.classifier.analyze_path(path);
        self.assess(path, detection, opts)
    }

    /// Screen in-memory content uploaded under `file_name`.
    pub fn screen_bytes(&self, file_name: &str, bytes: &[u8], opts: &ScreenOptions) -> ScreeningResult {
        let detection = self.classifier.analyze_bytes(file_name, bytes);
        self.assess(Path::new(file_name), Ok(detection), opts)
    }

    /// Screen with a detection computed earlier (e.g. from a cache).
    pub fn screen_detection(
        &self,
        path: &Path,
        detection: DetectionResult,
        opts: &ScreenOptions,
    ) -> ScreeningResult {
        self.assess(path, Ok(detection), opts)
    }

    /// Screen each path independently; one failure does not stop the rest.
    pub fn screen_batch(&self, paths: &[ResolvedPath], opts: &ScreenOptions) -> Vec<ScreeningResult> {
        paths.iter().map(|p| self.screen(p, opts)).collect()
    }

    /// [`allows`] over a default screening of `path`.
    pub fn is_allowed(&self, path: &ResolvedPath, allowed_types: Option<&[&str]>) -> bool {
        allows(&self.screen(path, &ScreenOptions::default()), allowed_types)
    }

    fn assess(
        &self,
        path: &Path,
        detection: Result<DetectionResult>,
        opts: &ScreenOptions,
    ) -> ScreeningResult {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let detection = match detection {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "screening could not read file");
                let issue = ScreeningIssue::new(IssueKind::IoError, Severity::Error, e.to_string());
                return ScreeningResult::new(
                    path.to_path_buf(),
                    declared_extension(&file_name),
                    UNKNOWN_TYPE.to_string(),
                    vec![issue],
                    opts.strict_mode,
                );
            }
        };

        let issues = collect_issues(&file_name, &detection, opts);
        let result = ScreeningResult::new(
            PathBuf::from(path),
            detection.declared_extension.clone(),
            detection.detected_type.clone(),
            issues,
            opts.strict_mode,
        );
        tracing::debug!(
            path = %path.display(),
            detected = %result.detected_type,
            threat = %result.threat_level,
            passed = result.passed,
            "screened file"
        );
        result
    }
}

fn collect_issues(file_name: &str, det: &DetectionResult, opts: &ScreenOptions) -> Vec<ScreeningIssue> {
    let mut issues = Vec::new();
    let declared = det.declared_extension.as_deref().unwrap_or("");

    if opts.check_extension_mismatch && !det.extension_match {
        if det.is_executable {
            issues.push(disguised_issue(det, declared));
        } else {
            issues.push(
                ScreeningIssue::new(
                    IssueKind::ExtensionMismatch,
                    Severity::Warning,
                    format!(
                        "File extension .{} does not match detected type {}",
                        declared, det.detected_type
                    ),
                )
                .with_detail("declaredExtension", declared)
                .with_detail("detectedType", det.detected_type.as_str()),
            );
        }
    }

    if opts.check_executable_content
        && det.is_executable
        && MASQUERADE_EXTENSIONS.contains(&declared)
        && !issues.iter().any(|i| i.kind == IssueKind::ExecutableDisguised)
    {
        issues.push(disguised_issue(det, declared));
    }

    if opts.check_suspicious_patterns {
        issues.extend(check_filename(file_name));
    }

    if det.detected_type == UNKNOWN_TYPE && issues.is_empty() {
        issues.push(ScreeningIssue::new(
            IssueKind::UnknownType,
            Severity::Info,
            "Content type could not be determined",
        ));
    }
    issues
}

fn disguised_issue(det: &DetectionResult, declared: &str) -> ScreeningIssue {
    ScreeningIssue::new(
        IssueKind::ExecutableDisguised,
        Severity::Error,
        format!(
            "Executable content ({}) disguised as .{} file",
            det.detected_type, declared
        ),
    )
    .with_detail("declaredExtension", declared)
    .with_detail("detectedType", det.detected_type.as_str())
}

/// Passed and below medium threat and, when `allowed_types` is given, the
/// detected type tag or the declared extension is listed. The list never
/// overrides a threat verdict.
pub fn allows<S: AsRef<str>>(result: &ScreeningResult, allowed_types: Option<&[S]>) -> bool {
    if !result.passed || result.threat_level >= ThreatLevel::Medium {
        return false;
    }
    allowed_types.map_or(true, |allowed| result.matches_type(allowed))
}
