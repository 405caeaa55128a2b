//! Custom signatures loaded from YAML.
//!
//! Example `.filegate-signatures.yaml`:
//! ```yaml
//! signatures:
//!   - type_tag: ACME
//!     mime: application/x-acme
//!     patterns: ["41434D45??01", "@512:41434D45"]
//!     extensions: [acme]
//!     category: document
//!     description: Acme project file
//!   - type_tag: PDFA
//!     mime: application/pdf
//!     patterns: ["255044462D"]
//!     content_markers: ["pdfaid:part"]
//!     extensions: [pdf]
//!     category: document
//!     before: PDF
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::SignatureClassifier;
use crate::types::TypeSignature;

/// File names looked up by [`SignatureFile::discover`], in order.
pub const SIGNATURE_FILE_NAMES: &[&str] = &[
    ".filegate-signatures.yaml",
    ".filegate-signatures.yml",
    "filegate-signatures.yaml",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEntry {
    #[serde(flatten)]
    pub signature: TypeSignature,
    /// Register ahead of this type instead of at the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SignatureFile {
    #[serde(default)]
    pub signatures: Vec<SignatureEntry>,
}

impl SignatureFile {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read signature file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse signature file: {}", path.display()))
    }

    /// First recognized signature file in `dir`, if any.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        SIGNATURE_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    /// Register every entry, in file order. All or nothing: when any entry
    /// is rejected the classifier is left as it was.
    pub fn apply(self, classifier: &mut SignatureClassifier) -> filegate_core::Result<usize> {
        let count = self.signatures.len();
        let mut staged = classifier.clone();
        for entry in self.signatures {
            match entry.before {
                Some(anchor) => staged.add_signature_before(&anchor, entry.signature)?,
                None => staged.add_signature(entry.signature)?,
            }
        }
        *classifier = staged;
        Ok(count)
    }
}
