//! Ordered signature registry.
//!
//! Detection walks the registry front to back and the first entry whose
//! patterns (and content markers) match wins, so specific formats are
//! registered before the generic containers they are built on: the
//! Office/OpenDocument/JAR/APK entries precede ZIP, HEIC/AVIF/M4A precede MP4.
//! Among the ZIP formats the executable packages (APK, JAR) come first.

use std::sync::OnceLock;

use filegate_core::{GateError, Result};

use crate::types::{FileCategory, MagicPattern, TypeSignature};

pub const UNKNOWN_TYPE: &str = "UNKNOWN";

/// Patterns may not inspect bytes past this offset.
pub const MAX_SIGNATURE_SPAN: usize = 4096;

const MAX_TAG_LEN: usize = 32;

/// Sentinel returned when nothing in the registry or the heuristics matches.
pub fn unknown_signature() -> &'static TypeSignature {
    static UNKNOWN: OnceLock<TypeSignature> = OnceLock::new();
    UNKNOWN.get_or_init(|| {
        TypeSignature::new(
            UNKNOWN_TYPE,
            "application/octet-stream",
            FileCategory::Unknown,
            "Unrecognized content",
        )
    })
}

#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    entries: Vec<TypeSignature>,
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SignatureRegistry {
    pub fn builtin() -> Self {
        Self {
            entries: builtin_signatures(),
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeSignature> {
        self.entries.iter()
    }

    pub fn get(&self, type_tag: &str) -> Option<&TypeSignature> {
        self.entries
            .iter()
            .find(|s| s.type_tag.eq_ignore_ascii_case(type_tag))
    }

    /// First entry claiming `ext` (case-insensitive, leading dot optional).
    pub fn lookup_extension(&self, ext: &str) -> Option<&TypeSignature> {
        let ext = ext.trim_start_matches('.');
        self.entries.iter().find(|s| s.has_extension(ext))
    }

    /// Whether any executable entry claims `ext`.
    pub fn is_executable_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.entries
            .iter()
            .any(|s| s.is_executable && s.has_extension(ext))
    }

    /// First entry whose magic patterns and content markers match `buf`.
    pub fn match_magic(&self, buf: &[u8]) -> Option<&TypeSignature> {
        self.entries.iter().find(|s| s.matches_content(buf))
    }

    /// Bytes needed to evaluate every pattern.
    pub fn longest_pattern(&self) -> usize {
        self.entries
            .iter()
            .flat_map(|s| s.patterns.iter())
            .map(MagicPattern::end)
            .max()
            .unwrap_or(0)
    }

    /// Validate and add `sig`. An entry with the same tag is replaced in
    /// place; otherwise the signature goes to the end.
    pub fn register(&mut self, sig: TypeSignature) -> Result<()> {
        let sig = normalize(sig)?;
        match self.position(&sig.type_tag) {
            Some(idx) => self.entries[idx] = sig,
            None => self.entries.push(sig),
        }
        Ok(())
    }

    /// Validate and insert `sig` immediately before `anchor`, so it takes
    /// precedence over it. An existing entry with the same tag is removed first.
    pub fn register_before(&mut self, anchor: &str, sig: TypeSignature) -> Result<()> {
        let sig = normalize(sig)?;
        if sig.type_tag.eq_ignore_ascii_case(anchor) {
            return Err(GateError::invalid_signature(format!(
                "{} cannot be registered before itself",
                sig.type_tag
            )));
        }
        if self.position(anchor).is_none() {
            return Err(GateError::invalid_signature(format!(
                "anchor type {} is not registered",
                anchor
            )));
        }
        if let Some(existing) = self.position(&sig.type_tag) {
            self.entries.remove(existing);
        }
        let idx = self.position(anchor).unwrap_or(self.entries.len());
        self.entries.insert(idx, sig);
        Ok(())
    }

    fn position(&self, type_tag: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|s| s.type_tag.eq_ignore_ascii_case(type_tag))
    }
}

fn normalize(mut sig: TypeSignature) -> Result<TypeSignature> {
    sig.type_tag = sig.type_tag.trim().to_ascii_uppercase();
    sig.mime = sig.mime.trim().to_ascii_lowercase();
    sig.extensions = sig
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .collect();
    if sig.category == FileCategory::Executable {
        sig.is_executable = true;
    }
    validate_signature(&sig)?;
    Ok(sig)
}

/// Structural checks for externally supplied signatures.
pub fn validate_signature(sig: &TypeSignature) -> Result<()> {
    let tag = &sig.type_tag;
    if tag.is_empty() || tag.len() > MAX_TAG_LEN {
        return Err(GateError::invalid_signature(format!(
            "type tag must be 1-{} characters",
            MAX_TAG_LEN
        )));
    }
    if !tag
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(GateError::invalid_signature(format!(
            "type tag {} may only contain A-Z, 0-9, '_' and '-'",
            tag
        )));
    }
    if tag == UNKNOWN_TYPE {
        return Err(GateError::invalid_signature("UNKNOWN is reserved"));
    }
    if sig.category == FileCategory::Unknown {
        return Err(GateError::invalid_signature(format!(
            "{}: category 'unknown' is reserved",
            tag
        )));
    }
    let mime_ok = sig
        .mime
        .split_once('/')
        .map(|(top, sub)| {
            !top.is_empty()
                && !sub.is_empty()
                && !sub.contains('/')
                && !sig.mime.chars().any(char::is_whitespace)
        })
        .unwrap_or(false);
    if !mime_ok {
        return Err(GateError::invalid_signature(format!(
            "{}: '{}' is not a type/subtype MIME string",
            tag, sig.mime
        )));
    }
    if sig.patterns.is_empty() {
        return Err(GateError::invalid_signature(format!(
            "{}: at least one magic pattern is required",
            tag
        )));
    }
    for pattern in &sig.patterns {
        if pattern.concrete_len() == 0 {
            return Err(GateError::invalid_signature(format!(
                "{}: pattern {} has no concrete bytes",
                tag, pattern
            )));
        }
        if pattern.end() > MAX_SIGNATURE_SPAN {
            return Err(GateError::invalid_signature(format!(
                "{}: pattern {} reaches past byte {}",
                tag, pattern, MAX_SIGNATURE_SPAN
            )));
        }
    }
    if sig.content_markers.iter().any(|m| m.is_empty()) {
        return Err(GateError::invalid_signature(format!(
            "{}: content markers must not be empty",
            tag
        )));
    }
    if sig.zip_entries.iter().any(|e| e.is_empty()) {
        return Err(GateError::invalid_signature(format!(
            "{}: zip entry prefixes must not be empty",
            tag
        )));
    }
    for ext in &sig.extensions {
        let ok = !ext.is_empty()
            && ext
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '+'));
        if !ok {
            return Err(GateError::invalid_signature(format!(
                "{}: invalid extension '{}'",
                tag, ext
            )));
        }
    }
    Ok(())
}

fn riff(form: &[u8; 4]) -> MagicPattern {
    let mut bytes = vec![Some(b'R'), Some(b'I'), Some(b'F'), Some(b'F'), None, None, None, None];
    bytes.extend(form.iter().copied().map(Some));
    MagicPattern::masked(0, &bytes)
}

fn ftyp(brand: &[u8; 4]) -> MagicPattern {
    let mut bytes = vec![None, None, None, None, Some(b'f'), Some(b't'), Some(b'y'), Some(b'p')];
    bytes.extend(brand.iter().copied().map(Some));
    MagicPattern::masked(0, &bytes)
}

/// The built-in catalogue, in precedence order.
pub fn builtin_signatures() -> Vec<TypeSignature> {
    use FileCategory::*;

    vec![
        // ====================================================================
        // Executables
        // ====================================================================
        TypeSignature::new("ELF", "application/x-executable", Executable, "ELF executable or shared object")
            .magic(b"\x7FELF")
            .extensions(&["elf", "so", "o", "ko", "bin", "out", "axf", "prx", "run"]),
        TypeSignature::new("EXE", "application/x-msdownload", Executable, "Windows PE/DOS executable")
            .magic(b"MZ")
            .extensions(&["exe", "dll", "sys", "scr", "com", "cpl", "ocx", "efi", "drv", "pif"]),
        TypeSignature::new("MACHO", "application/x-mach-binary", Executable, "Mach-O executable")
            .magic(b"\xFE\xED\xFA\xCE")
            .magic(b"\xFE\xED\xFA\xCF")
            .magic(b"\xCE\xFA\xED\xFE")
            .magic(b"\xCF\xFA\xED\xFE")
            .extensions(&["dylib", "bundle", "macho"]),
        TypeSignature::new("MACHO_FAT", "application/x-mach-binary", Executable, "Mach-O universal binary or Java class file")
            .magic(b"\xCA\xFE\xBA\xBE")
            .extensions(&["dylib", "bundle", "class"]),
        TypeSignature::new("WASM", "application/wasm", Executable, "WebAssembly module")
            .magic(b"\x00asm")
            .extensions(&["wasm"]),
        TypeSignature::new("DEX", "application/vnd.android.dex", Executable, "Dalvik executable")
            .magic(b"dex\n")
            .extensions(&["dex"]),
        TypeSignature::new("LNK", "application/x-ms-shortcut", Executable, "Windows shell link")
            .magic(b"\x4C\x00\x00\x00\x01\x14\x02\x00")
            .extensions(&["lnk"]),
        // ====================================================================
        // Documents
        // ====================================================================
        TypeSignature::new("PDF", "application/pdf", Document, "PDF document")
            .magic(b"%PDF-")
            .extensions(&["pdf"]),
        TypeSignature::new("RTF", "application/rtf", Document, "Rich Text Format document")
            .magic(b"{\\rtf")
            .extensions(&["rtf"]),
        TypeSignature::new("OLE2", "application/x-ole-storage", Document, "Legacy Office compound document")
            .magic(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1")
            .extensions(&["doc", "xls", "ppt", "msg", "msi", "dot", "xlt", "pot", "vsd"]),
        // ZIP-based formats, told apart by entry names near the start.
        // Executable packages come first: any ZIP carrying their manifests
        // is runnable whatever else it contains.
        TypeSignature::new("APK", "application/vnd.android.package-archive", Executable, "Android application package")
            .magic(b"PK\x03\x04")
            .markers(&["AndroidManifest.xml", "classes.dex"])
            .extensions(&["apk", "aab"]),
        TypeSignature::new("JAR", "application/java-archive", Executable, "Java archive")
            .magic(b"PK\x03\x04")
            .markers(&["META-INF/MANIFEST.MF"])
            .extensions(&["jar", "war", "ear"]),
        TypeSignature::new("DOCX", "application/vnd.openxmlformats-officedocument.wordprocessingml.document", Document, "Word document")
            .magic(b"PK\x03\x04")
            .markers(&["[Content_Types].xml"])
            .zip_entries(&["word/"])
            .extensions(&["docx", "docm", "dotx"]),
        TypeSignature::new("XLSX", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", Document, "Excel workbook")
            .magic(b"PK\x03\x04")
            .markers(&["[Content_Types].xml"])
            .zip_entries(&["xl/"])
            .extensions(&["xlsx", "xlsm", "xltx"]),
        TypeSignature::new("PPTX", "application/vnd.openxmlformats-officedocument.presentationml.presentation", Document, "PowerPoint presentation")
            .magic(b"PK\x03\x04")
            .markers(&["[Content_Types].xml"])
            .zip_entries(&["ppt/"])
            .extensions(&["pptx", "pptm", "potx"]),
        TypeSignature::new("ODT", "application/vnd.oasis.opendocument.text", Document, "OpenDocument text")
            .magic(b"PK\x03\x04")
            .markers(&["application/vnd.oasis.opendocument.text"])
            .extensions(&["odt"]),
        TypeSignature::new("ODS", "application/vnd.oasis.opendocument.spreadsheet", Document, "OpenDocument spreadsheet")
            .magic(b"PK\x03\x04")
            .markers(&["application/vnd.oasis.opendocument.spreadsheet"])
            .extensions(&["ods"]),
        TypeSignature::new("ODP", "application/vnd.oasis.opendocument.presentation", Document, "OpenDocument presentation")
            .magic(b"PK\x03\x04")
            .markers(&["application/vnd.oasis.opendocument.presentation"])
            .extensions(&["odp"]),
        TypeSignature::new("EPUB", "application/epub+zip", Document, "EPUB e-book")
            .magic(b"PK\x03\x04")
            .markers(&["application/epub+zip"])
            .extensions(&["epub"]),
        // ====================================================================
        // Images
        // ====================================================================
        TypeSignature::new("PNG", "image/png", Image, "PNG image")
            .magic(b"\x89PNG\r\n\x1A\n")
            .extensions(&["png"]),
        TypeSignature::new("JPEG", "image/jpeg", Image, "JPEG image")
            .magic(b"\xFF\xD8\xFF")
            .extensions(&["jpg", "jpeg", "jpe", "jfif"]),
        TypeSignature::new("GIF", "image/gif", Image, "GIF image")
            .magic(b"GIF87a")
            .magic(b"GIF89a")
            .extensions(&["gif"]),
        TypeSignature::new("WEBP", "image/webp", Image, "WebP image")
            .pattern(riff(b"WEBP"))
            .extensions(&["webp"]),
        TypeSignature::new("TIFF", "image/tiff", Image, "TIFF image")
            .magic(b"II*\x00")
            .magic(b"MM\x00*")
            .extensions(&["tif", "tiff"]),
        TypeSignature::new("HEIC", "image/heic", Image, "HEIF/HEIC image")
            .pattern(ftyp(b"heic"))
            .pattern(ftyp(b"heix"))
            .pattern(ftyp(b"mif1"))
            .extensions(&["heic", "heif"]),
        TypeSignature::new("AVIF", "image/avif", Image, "AVIF image")
            .pattern(ftyp(b"avif"))
            .extensions(&["avif"]),
        TypeSignature::new("ICO", "image/x-icon", Image, "Windows icon")
            .magic(b"\x00\x00\x01\x00")
            .extensions(&["ico"]),
        TypeSignature::new("BMP", "image/bmp", Image, "Bitmap image")
            .pattern(MagicPattern::masked(
                0,
                &[Some(b'B'), Some(b'M'), None, None, None, None, Some(0), Some(0), Some(0), Some(0)],
            ))
            .extensions(&["bmp", "dib"]),
        // ====================================================================
        // Audio
        // ====================================================================
        TypeSignature::new("MP3", "audio/mpeg", Audio, "MP3 audio")
            .magic(b"ID3")
            .magic(b"\xFF\xFB")
            .magic(b"\xFF\xF3")
            .magic(b"\xFF\xF2")
            .extensions(&["mp3"]),
        TypeSignature::new("FLAC", "audio/flac", Audio, "FLAC audio")
            .magic(b"fLaC")
            .extensions(&["flac"]),
        TypeSignature::new("OGG", "audio/ogg", Audio, "Ogg container")
            .magic(b"OggS")
            .extensions(&["ogg", "oga", "ogv", "opus"]),
        TypeSignature::new("WAV", "audio/wav", Audio, "WAVE audio")
            .pattern(riff(b"WAVE"))
            .extensions(&["wav"]),
        TypeSignature::new("M4A", "audio/mp4", Audio, "MPEG-4 audio")
            .pattern(ftyp(b"M4A "))
            .extensions(&["m4a"]),
        // ====================================================================
        // Video
        // ====================================================================
        TypeSignature::new("AVI", "video/x-msvideo", Video, "AVI video")
            .pattern(riff(b"AVI "))
            .extensions(&["avi"]),
        TypeSignature::new("MKV", "video/x-matroska", Video, "Matroska/WebM video")
            .magic(b"\x1A\x45\xDF\xA3")
            .extensions(&["mkv", "webm", "mka"]),
        TypeSignature::new("MP4", "video/mp4", Video, "MPEG-4/QuickTime video")
            .pattern(MagicPattern::masked(
                0,
                &[None, None, None, None, Some(b'f'), Some(b't'), Some(b'y'), Some(b'p')],
            ))
            .extensions(&["mp4", "m4v", "mov", "3gp", "3g2"]),
        // ====================================================================
        // Archives
        // ====================================================================
        TypeSignature::new("ZIP", "application/zip", Archive, "ZIP archive")
            .magic(b"PK\x03\x04")
            .magic(b"PK\x05\x06")
            .magic(b"PK\x07\x08")
            .extensions(&["zip", "zipx"]),
        TypeSignature::new("GZIP", "application/gzip", Archive, "gzip compressed data")
            .magic(b"\x1F\x8B")
            .extensions(&["gz", "tgz"]),
        TypeSignature::new("BZIP2", "application/x-bzip2", Archive, "bzip2 compressed data")
            .magic(b"BZh")
            .extensions(&["bz2", "tbz2", "tbz"]),
        TypeSignature::new("XZ", "application/x-xz", Archive, "xz compressed data")
            .magic(b"\xFD7zXZ\x00")
            .extensions(&["xz", "txz"]),
        TypeSignature::new("ZSTD", "application/zstd", Archive, "Zstandard compressed data")
            .magic(b"\x28\xB5\x2F\xFD")
            .extensions(&["zst", "tzst"]),
        TypeSignature::new("7Z", "application/x-7z-compressed", Archive, "7-Zip archive")
            .magic(b"7z\xBC\xAF\x27\x1C")
            .extensions(&["7z"]),
        TypeSignature::new("RAR", "application/vnd.rar", Archive, "RAR archive")
            .magic(b"Rar!\x1A\x07")
            .extensions(&["rar"]),
        TypeSignature::new("CAB", "application/vnd.ms-cab-compressed", Archive, "Microsoft cabinet")
            .magic(b"MSCF")
            .extensions(&["cab"]),
        TypeSignature::new("TAR", "application/x-tar", Archive, "POSIX tar archive")
            .magic_at(257, b"ustar")
            .extensions(&["tar"]),
        // ====================================================================
        // Scripts (shebang heuristics; PHP also has an opening tag)
        // ====================================================================
        TypeSignature::new("PHP", "application/x-httpd-php", Script, "PHP script")
            .magic(b"<?php")
            .extensions(&["php", "phtml", "php3", "php4", "php5", "phar"])
            .executable(),
        TypeSignature::new("SHELL", "application/x-sh", Script, "Shell script")
            .extensions(&["sh", "bash", "zsh", "ksh", "csh", "command", "fish"])
            .executable(),
        TypeSignature::new("PYTHON", "text/x-python", Script, "Python script")
            .extensions(&["py", "pyw", "pyz"])
            .executable(),
        TypeSignature::new("JAVASCRIPT", "text/javascript", Script, "JavaScript source")
            .extensions(&["js", "mjs", "cjs", "ts", "jsx", "tsx"])
            .executable(),
        TypeSignature::new("PERL", "text/x-perl", Script, "Perl script")
            .extensions(&["pl", "pm", "cgi"])
            .executable(),
        TypeSignature::new("RUBY", "text/x-ruby", Script, "Ruby script")
            .extensions(&["rb"])
            .executable(),
        TypeSignature::new("BATCH", "application/x-bat", Script, "Windows batch file")
            .extensions(&["bat", "cmd"])
            .executable(),
        TypeSignature::new("SCRIPT", "text/x-script", Script, "Script with an unrecognized interpreter")
            .executable(),
        // ====================================================================
        // Text formats (content heuristics)
        // ====================================================================
        TypeSignature::new("JSON", "application/json", Text, "JSON data")
            .extensions(&["json", "geojson", "jsonl", "ndjson", "ipynb"]),
        TypeSignature::new("SVG", "image/svg+xml", Image, "SVG image")
            .extensions(&["svg", "svgz"]),
        TypeSignature::new("XML", "application/xml", Text, "XML document")
            .extensions(&["xml", "xsd", "xsl", "xslt", "plist", "rss", "atom"]),
        TypeSignature::new("HTML", "text/html", Text, "HTML document")
            .extensions(&["html", "htm", "xhtml"]),
        TypeSignature::new("CSS", "text/css", Text, "CSS stylesheet")
            .extensions(&["css", "scss", "less"]),
        TypeSignature::new("MARKDOWN", "text/markdown", Text, "Markdown document")
            .extensions(&["md", "markdown", "mdx"]),
        TypeSignature::new("TEXT", "text/plain", Text, "Plain text")
            .extensions(&[
                "txt", "text", "log", "csv", "tsv", "ini", "cfg", "conf", "yaml", "yml", "toml",
                "rst", "sql", "env",
            ]),
    ]
}
