//! The composed gate: containment, sensitive-name policy, then screening.
//!
//! A request is refused as soon as one stage denies it. Every denial and
//! every failed screening is reported to the configured [`AuditSink`].

use std::sync::Arc;

use anyhow::Context;
use filegate_core::config::GateConfig;
use filegate_core::info_log;
use filegate_core::observability::{AuditEvent, AuditSink, JsonlAuditSink, NoopAuditSink};
use filegate_core::scan_cache::DetectionCache;
use filegate_core::{GateError, PathContainment, ResolvedPath, Result, SensitiveNameMatcher};

use crate::classifier::SignatureClassifier;
use crate::screening::FileScreener;
use crate::signature_file::SignatureFile;
use crate::types::{DetectionResult, ScreenOptions, ScreeningResult};

const SENSITIVE_REASON: &str = "sensitive file";

/// Verdict for a read request that passed containment.
#[derive(Debug, Clone)]
pub enum GateDecision {
    Allowed {
        path: ResolvedPath,
        screening: ScreeningResult,
    },
    Blocked {
        path: ResolvedPath,
        screening: ScreeningResult,
    },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed { .. })
    }

    pub fn path(&self) -> &ResolvedPath {
        match self {
            GateDecision::Allowed { path, .. } | GateDecision::Blocked { path, .. } => path,
        }
    }

    pub fn screening(&self) -> &ScreeningResult {
        match self {
            GateDecision::Allowed { screening, .. } | GateDecision::Blocked { screening, .. } => {
                screening
            }
        }
    }

    /// The path, only if access was allowed.
    pub fn into_allowed_path(self) -> Option<ResolvedPath> {
        match self {
            GateDecision::Allowed { path, .. } => Some(path),
            GateDecision::Blocked { .. } => None,
        }
    }
}

pub struct FileGate {
    containment: PathContainment,
    sensitive: SensitiveNameMatcher,
    screener: FileScreener,
    options: ScreenOptions,
    audit: Arc<dyn AuditSink>,
}

impl FileGate {
    /// Gate with the built-in catalogue, default options and no audit log.
    pub fn new(containment: PathContainment) -> Self {
        Self {
            containment,
            sensitive: SensitiveNameMatcher::new(),
            screener: FileScreener::default(),
            options: ScreenOptions::default(),
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Build from configuration: roots, base, custom signatures (explicit
    /// or discovered in the base directory), strict mode and the audit log.
    pub fn from_config(config: &GateConfig) -> anyhow::Result<Self> {
        let containment =
            PathContainment::from_config(config).context("Failed to set up allowed roots")?;

        let mut classifier = SignatureClassifier::new();
        let signatures = config
            .signatures_file
            .clone()
            .or_else(|| SignatureFile::discover(containment.base()));
        if let Some(path) = signatures {
            let count = classifier.load_signature_file(&path)?;
            info_log!("Loaded {} custom signature(s) from {}", count, path.display());
        }

        let audit: Arc<dyn AuditSink> = match JsonlAuditSink::from_env() {
            Some(sink) => Arc::new(sink),
            None => Arc::new(NoopAuditSink),
        };

        Ok(Self::new(containment)
            .with_screener(FileScreener::new(Arc::new(classifier)))
            .with_options(ScreenOptions {
                strict_mode: config.strict,
                ..ScreenOptions::default()
            })
            .with_audit_sink(audit))
    }

    pub fn with_screener(mut self, screener: FileScreener) -> Self {
        self.screener = screener;
        self
    }

    pub fn with_options(mut self, options: ScreenOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_sensitive_matcher(mut self, matcher: SensitiveNameMatcher) -> Self {
        self.sensitive = matcher;
        self
    }

    pub fn containment(&self) -> &PathContainment {
        &self.containment
    }

    pub fn screener(&self) -> &FileScreener {
        &self.screener
    }

    pub fn options(&self) -> &ScreenOptions {
        &self.options
    }

    /// Containment plus sensitive-name policy, no content read. Suitable
    /// for writes, moves and listings.
    pub fn resolve(&self, requested: &str) -> Result<ResolvedPath> {
        let resolved = self.resolve_inner(requested);
        if let Err(e) = &resolved {
            self.record_denial(requested, e);
        }
        resolved
    }

    /// Full read check: [`resolve`](Self::resolve) then content screening
    /// with the gate's options.
    pub fn authorize_read(&self, requested: &str) -> Result<GateDecision> {
        self.authorize_read_with(requested, &self.options)
    }

    pub fn authorize_read_with(&self, requested: &str, opts: &ScreenOptions) -> Result<GateDecision> {
        let path = self.resolve(requested)?;
        let screening = self.screener.screen(&path, opts);
        Ok(self.decide(path, screening))
    }

    /// As [`authorize_read_with`](Self::authorize_read_with), reusing a cached
    /// detection while the file's size and mtime are unchanged.
    ///
    /// The file is always opened through [`ResolvedPath::open_read`] and the
    /// key is taken from the opened handle, so a cache hit never vouches for
    /// a swapped-in symlink or replaced file.
    pub fn authorize_read_cached(
        &self,
        requested: &str,
        opts: &ScreenOptions,
        cache: &mut DetectionCache,
    ) -> Result<GateDecision> {
        let path = self.resolve(requested)?;
        let detection = path.open_read().and_then(|file| {
            let meta = file
                .metadata()
                .map_err(|e| GateError::io(format!("cannot stat {}: {}", path, e)))?;
            let key = DetectionCache::fingerprint_with(path.as_path(), &meta);
            if let Some(hit) = cache.get::<DetectionResult>(&key) {
                return Ok(hit);
            }
            let detection = self.screener.classifier().analyze_opened(&path, file)?;
            cache.insert(&key, &detection);
            Ok(detection)
        });
        let screening = match detection {
            Ok(detection) => self.screener.screen_detection(path.as_path(), detection, opts),
            // Re-run so the failure is reported the same way as uncached reads.
            Err(_) => self.screener.screen(&path, opts),
        };
        Ok(self.decide(path, screening))
    }

    fn decide(&self, path: ResolvedPath, screening: ScreeningResult) -> GateDecision {
        if screening.passed {
            info_log!(
                "Allowed {} ({}, threat {})",
                path,
                screening.detected_type,
                screening.threat_level
            );
            return GateDecision::Allowed { path, screening };
        }
        tracing::warn!(
            path = %path,
            detected = %screening.detected_type,
            threat = %screening.threat_level,
            "file failed screening"
        );
        self.audit.record(&AuditEvent::ScreeningFailed {
            path: path.to_string(),
            threat_level: screening.threat_level.to_string(),
            issue_kinds: screening.issues.iter().map(|i| i.kind.to_string()).collect(),
        });
        GateDecision::Blocked { path, screening }
    }

    fn resolve_inner(&self, requested: &str) -> Result<ResolvedPath> {
        if self.sensitive.is_sensitive(requested) {
            return Err(GateError::access_denied(SENSITIVE_REASON));
        }
        let path = self.containment.resolve(requested)?;
        // A symlink or alias inside the root can still land on a sensitive target.
        if self
            .sensitive
            .is_sensitive(&path.relative_to_root().to_string_lossy())
        {
            return Err(GateError::access_denied(SENSITIVE_REASON));
        }
        Ok(path)
    }

    fn record_denial(&self, requested: &str, err: &GateError) {
        let reason = match err {
            GateError::AccessDenied { reason } => reason.clone(),
            other => other.to_string(),
        };
        self.audit.record(&AuditEvent::AccessDenied {
            requested: requested.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl AuditSink for RecordingSink {
        fn record(&self, event: &AuditEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn fixture() -> (TempDir, FileGate, Arc<RecordingSink>) {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/report.pdf"), b"%PDF-1.7\n").unwrap();
        let mut pe = b"MZ\x90\x00".to_vec();
        pe.resize(64, 0);
        fs::write(root.join("docs/invoice.pdf"), pe).unwrap();
        fs::write(root.join(".env"), b"TOKEN=x\n").unwrap();
        fs::write(dir.path().join("outside.txt"), b"secret\n").unwrap();

        let sink = Arc::new(RecordingSink::default());
        let containment = PathContainment::new([&root]).unwrap().with_base(&root).unwrap();
        let gate = FileGate::new(containment).with_audit_sink(sink.clone());
        (dir, gate, sink)
    }

    #[test]
    fn test_benign_file_is_allowed() {
        let (_dir, gate, sink) = fixture();
        let decision = gate.authorize_read("docs/report.pdf").unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.screening().detected_type, "PDF");
        assert!(decision.into_allowed_path().unwrap().as_path().ends_with("docs/report.pdf"));
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_masquerade_is_blocked_and_audited() {
        let (_dir, gate, sink) = fixture();
        let decision = gate.authorize_read("docs/invoice.pdf").unwrap();
        assert!(!decision.is_allowed());
        assert!(decision.path().as_path().ends_with("docs/invoice.pdf"));
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            AuditEvent::ScreeningFailed { threat_level, issue_kinds, .. } => {
                assert_eq!(threat_level, "high");
                assert!(issue_kinds.contains(&"executable_disguised".to_string()));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_traversal_is_denied_and_audited() {
        let (dir, gate, sink) = fixture();
        let outside = dir.path().join("outside.txt");
        let requested = outside.to_str().unwrap();
        let err = gate.authorize_read(requested).unwrap_err();
        assert!(err.is_access_denied());
        assert!(!err.to_string().contains("outside"));

        // Leading `..` cannot climb out of the base; the parent must exist.
        assert!(gate.authorize_read("../../elsewhere/outside.txt").is_err());

        let events = sink.events.lock().unwrap();
        assert_eq!(
            events[0],
            AuditEvent::AccessDenied {
                requested: requested.to_string(),
                reason: "path escapes allowed roots".into(),
            }
        );
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_sensitive_names_are_denied_before_resolution() {
        let (_dir, gate, sink) = fixture();
        for requested in [".env", "docs/../.env", "missing/.ssh/id_rsa", "..%2f.ssh%2fid_rsa"] {
            let err = gate.resolve(requested).unwrap_err();
            assert!(err.is_access_denied(), "{requested}");
        }
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| matches!(
            e,
            AuditEvent::AccessDenied { reason, .. } if reason == SENSITIVE_REASON
        )));
    }

    #[cfg(unix)]
    #[test]
    fn test_alias_to_sensitive_file_is_denied() {
        let (dir, gate, _sink) = fixture();
        std::os::unix::fs::symlink(dir.path().join("root/.env"), dir.path().join("root/notes"))
            .unwrap();
        let err = gate.resolve("notes").unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_strict_options_block_warnings() {
        let (dir, gate, _sink) = fixture();
        fs::write(dir.path().join("root/photo.gif"), b"\x89PNG\r\n\x1A\n\x00\x00").unwrap();
        assert!(gate.authorize_read("photo.gif").unwrap().is_allowed());
        let gate = gate.with_options(ScreenOptions::strict());
        assert!(!gate.authorize_read("photo.gif").unwrap().is_allowed());
    }

    #[test]
    fn test_cached_reads_reuse_detection() {
        let (dir, gate, _sink) = fixture();
        let mut cache = DetectionCache::in_dir(&dir.path().join("cache"), 300);

        let first = gate
            .authorize_read_cached("docs/report.pdf", &ScreenOptions::default(), &mut cache)
            .unwrap();
        assert!(first.is_allowed());
        assert_eq!(cache.len(), 1);

        let again = gate
            .authorize_read_cached("docs/report.pdf", &ScreenOptions::default(), &mut cache)
            .unwrap();
        assert_eq!(again.screening(), first.screening());

        let blocked = gate
            .authorize_read_cached("docs/invoice.pdf", &ScreenOptions::default(), &mut cache)
            .unwrap();
        assert!(!blocked.is_allowed());
        assert_eq!(cache.len(), 2);
        cache.save().unwrap();
    }

    #[test]
    fn test_cached_reads_still_open_the_file() {
        let (dir, gate, _sink) = fixture();
        let mut cache = DetectionCache::in_dir(&dir.path().join("cache"), 300);
        let warm = gate
            .authorize_read_cached("docs/report.pdf", &ScreenOptions::default(), &mut cache)
            .unwrap();
        assert!(warm.is_allowed());

        fs::remove_file(dir.path().join("root/docs/report.pdf")).unwrap();
        let decision = gate
            .authorize_read_cached("docs/report.pdf", &ScreenOptions::default(), &mut cache)
            .unwrap();
        assert!(!decision.is_allowed());
        assert!(decision.screening().has_issue(crate::types::IssueKind::IoError));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_from_config_discovers_signature_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(".filegate-signatures.yaml"),
            "signatures:\n  - type_tag: ACME\n    mime: application/x-acme\n    patterns: [\"41434D45\"]\n    extensions: [acme]\n    category: document\n",
        )
        .unwrap();
        fs::write(dir.path().join("plan.acme"), b"ACME data").unwrap();

        let mut config = GateConfig::with_roots([dir.path()]);
        config.base_dir = Some(dir.path().to_path_buf());
        config.strict = true;
        let gate = FileGate::from_config(&config).unwrap();
        assert!(gate.options().strict_mode);

        let decision = gate.authorize_read("plan.acme").unwrap();
        assert_eq!(decision.screening().detected_type, "ACME");
        assert!(decision.is_allowed());
    }
}
