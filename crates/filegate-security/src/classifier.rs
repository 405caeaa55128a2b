//! Content-based file type detection.
//!
//! `SignatureClassifier` reads a bounded prefix of a file, matches it against
//! the ordered [`SignatureRegistry`], falls back to text heuristics, and
//! compares the result with the extension the file name declares.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;
use filegate_core::{GateError, ResolvedPath, Result};

use crate::heuristics;
use crate::signature_file::SignatureFile;
use crate::signatures::{unknown_signature, SignatureRegistry, UNKNOWN_TYPE};
use crate::types::{DetectionResult, FileCategory, TypeSignature};

/// Minimum number of bytes sampled from each file.
pub const DEFAULT_SAMPLE_LEN: usize = 8192;

/// Extension the file name claims, lowercased and without the dot.
///
/// Trailing dots and spaces are ignored (Windows strips them) and purely
/// numeric version suffixes are skipped, so `libfoo.so.1.2` declares `so`.
/// Dotfiles such as `.bashrc` declare nothing.
pub fn declared_extension(file_name: &str) -> Option<String> {
    let name = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name)
        .trim_end_matches(|c: char| c == '.' || c == ' ');
    let name = name.strip_prefix('.').unwrap_or(name);
    // The first segment is the stem and never counts.
    name.split('.')
        .skip(1)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .find(|s| !s.is_empty() && !s.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_lowercase)
}

#[derive(Debug, Clone, Default)]
pub struct SignatureClassifier {
    registry: SignatureRegistry,
}

impl SignatureClassifier {
    /// Classifier over the built-in catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: SignatureRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    /// Register a custom signature at the end of the registry.
    pub fn add_signature(&mut self, sig: TypeSignature) -> Result<()> {
        let tag = sig.type_tag.clone();
        self.registry.register(sig)?;
        tracing::debug!(type_tag = %tag, "registered signature");
        Ok(())
    }

    /// Register a custom signature ahead of `anchor`.
    pub fn add_signature_before(&mut self, anchor: &str, sig: TypeSignature) -> Result<()> {
        let tag = sig.type_tag.clone();
        self.registry.register_before(anchor, sig)?;
        tracing::debug!(type_tag = %tag, anchor, "registered signature");
        Ok(())
    }

    /// Load and register every entry of a YAML signature file.
    pub fn load_signature_file(&mut self, path: &Path) -> anyhow::Result<usize> {
        let file = SignatureFile::load_from_file(path)?;
        file.apply(self)
            .with_context(|| format!("Invalid signature in {}", path.display()))
    }

    /// Bytes sampled per file: enough for every registered pattern.
    pub fn sample_len(&self) -> usize {
        self.registry.longest_pattern().max(DEFAULT_SAMPLE_LEN)
    }

    /// Type of `bytes`; the `UNKNOWN` sentinel when nothing matches.
    pub fn detect_type(&self, bytes: &[u8]) -> &TypeSignature {
        let (bytes, truncated) = self.window(bytes);
        self.classify(bytes, truncated).0
    }

    /// Full detection over in-memory content.
    pub fn analyze_bytes(&self, file_name: &str, bytes: &[u8]) -> DetectionResult {
        let (bytes, truncated) = self.window(bytes);
        let (sig, confidence) = self.classify(bytes, truncated);
        self.build_result(file_name, sig, confidence)
    }

    /// Detection over the first [`sample_len`](Self::sample_len) bytes of `reader`.
    pub fn analyze_reader<R: Read>(&self, file_name: &str, reader: R) -> io::Result<DetectionResult> {
        let limit = self.sample_len();
        let mut sample = Vec::with_capacity(limit + 1);
        // One byte past the window tells us whether the file was truncated.
        reader.take(limit as u64 + 1).read_to_end(&mut sample)?;
        Ok(self.analyze_bytes(file_name, &sample))
    }

    /// Detection for a path that has not been through containment.
    pub fn analyze_path(&self, path: &Path) -> Result<DetectionResult> {
        let file = File::open(path)
            .map_err(|e| GateError::io(format!("cannot open {}: {}", path.display(), e)))?;
        let name = file_name_of(path);
        self.analyze_reader(&name, file)
            .map_err(|e| GateError::io(format!("cannot read {}: {}", path.display(), e)))
    }

    /// Detection for a contained path. The file is opened without
    /// following a swapped-in symlink.
    pub fn analyze_file(&self, path: &ResolvedPath) -> Result<DetectionResult> {
        let file = path.open_read()?;
        self.analyze_opened(path, file)
    }

    /// Detection over a handle obtained from [`ResolvedPath::open_read`].
    pub fn analyze_opened(&self, path: &ResolvedPath, file: File) -> Result<DetectionResult> {
        let name = file_name_of(path.as_path());
        self.analyze_reader(&name, file)
            .map_err(|e| GateError::io(format!("cannot read {}: {}", path, e)))
    }

    fn window<'a>(&self, bytes: &'a [u8]) -> (&'a [u8], bool) {
        let limit = self.sample_len();
        if bytes.len() > limit {
            (&bytes[..limit], true)
        } else {
            (bytes, false)
        }
    }

    fn classify(&self, bytes: &[u8], truncated: bool) -> (&TypeSignature, f32) {
        if let Some(sig) = self.registry.match_magic(bytes) {
            return (sig, magic_confidence(sig));
        }
        if let Some((tag, confidence)) = heuristics::detect(bytes, truncated) {
            if let Some(sig) = self.registry.get(tag) {
                return (sig, confidence);
            }
        }
        (unknown_signature(), 0.0)
    }

    fn build_result(&self, file_name: &str, sig: &TypeSignature, confidence: f32) -> DetectionResult {
        let declared = declared_extension(file_name);
        let extension_match = declared
            .as_deref()
            .map_or(true, |ext| self.extension_matches(sig, ext));

        let mut warnings = Vec::new();
        if let (false, Some(ext)) = (extension_match, declared.as_deref()) {
            warnings.push(self.mismatch_warning(sig, ext));
        }
        if sig.type_tag == UNKNOWN_TYPE {
            warnings.push("Content type could not be determined".to_string());
        }

        DetectionResult {
            detected_type: sig.type_tag.clone(),
            mime: sig.mime.clone(),
            category: sig.category,
            is_executable: sig.is_executable,
            declared_extension: declared,
            extension_match,
            confidence,
            warnings,
        }
    }

    fn extension_matches(&self, sig: &TypeSignature, ext: &str) -> bool {
        if sig.type_tag == UNKNOWN_TYPE || sig.extensions.is_empty() || sig.has_extension(ext) {
            return true;
        }
        // Text saved under another text or script extension, or one script
        // language under another's extension, is not a disguise.
        match self.registry.lookup_extension(ext).map(|d| d.category) {
            Some(declared) => match sig.category {
                FileCategory::Text => declared.accepts_plain_text(),
                FileCategory::Script => declared == FileCategory::Script,
                _ => false,
            },
            None => false,
        }
    }

    fn mismatch_warning(&self, sig: &TypeSignature, ext: &str) -> String {
        let declared_category = self.registry.lookup_extension(ext).map(|d| d.category);
        if sig.is_executable && declared_category.is_some_and(FileCategory::is_conventionally_safe) {
            format!(
                "CRITICAL: executable content ({}) disguised as .{} file",
                sig.type_tag, ext
            )
        } else if sig.is_executable {
            format!(
                "WARNING: executable content ({}) declared as .{}",
                sig.type_tag, ext
            )
        } else {
            format!(
                "Extension mismatch: .{} but content is {} ({})",
                ext, sig.type_tag, sig.description
            )
        }
    }
}

fn magic_confidence(sig: &TypeSignature) -> f32 {
    if sig.is_executable {
        return 0.95;
    }
    let longest = sig.patterns.iter().map(|p| p.concrete_len()).max().unwrap_or(0);
    if longest >= 4 || !sig.content_markers.is_empty() {
        0.9
    } else {
        0.8
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
