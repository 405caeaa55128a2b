//! Traversal fuzz harness.
//!
//! Generates adversarial path payloads from a seeded LCG and checks the
//! containment invariant: whenever `resolve` succeeds, the returned path is
//! canonical and lies inside the allowed root. Failures must be
//! `AccessDenied`, never a panic or another error kind.

use super::*;
use std::fs;

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }
    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 17
    }
    fn next_range(&mut self, max: usize) -> usize {
        (self.next_u64() as usize) % max
    }
    fn next_bool(&mut self) -> bool {
        self.next_u64() % 2 == 0
    }
}

/// Encoded and look-alike forms of `../`.
const TRAVERSAL_VARIANTS: &[&str] = &[
    "../",
    "..\\",
    "..%2f",
    "..%2F",
    "%2e%2e/",
    "%2e%2e%2f",
    "%2E%2E%5C",
    "%252e%252e%252f",
    "%25252e%25252e%25252f",
    "..%c0%af",
    "..%255c",
    "..\u{2215}",
    "..\u{2044}",
    "..\u{FF0F}",
    "..\u{FF3C}",
    "\u{FF0E}\u{FF0E}/",
    "\u{2025}/",
    ".\u{200B}./",
    "....//",
    "..;/",
    "./../",
];

const SEGMENTS: &[&str] = &[
    ".",
    "..",
    "docs",
    "report.pdf",
    "etc",
    "passwd",
    "shadow",
    "windows",
    "system32",
    "escape",
    "allowed-evil",
    "secret.txt",
    "CON",
    "nul.txt",
    "LPT1",
    "aux",
    "nul\0byte",
    "%00",
    "file%00.pdf",
    "\u{202E}fdp.exe",
    "\u{FF0E}\u{FF0E}",
    "%2e%2e",
    "..%2f",
    "\\",
    "/",
];

const PREFIXES: &[&str] = &[
    "",
    "/",
    "\\",
    "\\\\server\\share\\",
    "//server/share/",
    "\\\\?\\C:\\",
    "//./",
    "C:\\",
    "C:/",
    "file:///",
    "~/",
];

fn generate_payload(rng: &mut Lcg) -> String {
    let mut path = String::new();
    path.push_str(PREFIXES[rng.next_range(PREFIXES.len())]);
    let depth = rng.next_range(12) + 1;
    for i in 0..depth {
        if rng.next_range(3) == 0 {
            path.push_str(TRAVERSAL_VARIANTS[rng.next_range(TRAVERSAL_VARIANTS.len())]);
            continue;
        }
        if i > 0 && !path.ends_with('/') && !path.ends_with('\\') {
            path.push(if rng.next_bool() { '/' } else { '\\' });
        }
        path.push_str(SEGMENTS[rng.next_range(SEGMENTS.len())]);
    }
    path
}

/// `../` repeated `depth` times in every variant, ending at a real target.
fn depth_payloads() -> Vec<String> {
    let targets = [
        "etc/passwd",
        "allowed-evil/secret.txt",
        "windows\\system32\\config\\sam",
    ];
    let mut out = Vec::new();
    for variant in TRAVERSAL_VARIANTS {
        for depth in 1..=8 {
            for target in targets {
                out.push(format!("{}{}", variant.repeat(depth), target));
                out.push(format!("docs/{}{}", variant.repeat(depth), target));
            }
        }
    }
    out
}

fn fixture() -> (tempfile::TempDir, PathContainment, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let allowed = tmp.path().join("allowed");
    fs::create_dir_all(allowed.join("docs")).unwrap();
    fs::write(allowed.join("docs").join("report.pdf"), b"%PDF-1.4").unwrap();
    let evil = tmp.path().join("allowed-evil");
    fs::create_dir_all(&evil).unwrap();
    fs::write(evil.join("secret.txt"), b"secret").unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink(&evil, allowed.join("escape")).unwrap();

    let gate = PathContainment::new([&allowed])
        .unwrap()
        .with_base(&allowed)
        .unwrap();
    let root = gate.roots()[0].clone();
    (tmp, gate, root)
}

fn assert_contained(gate: &PathContainment, root: &Path, input: &str) -> bool {
    match gate.resolve(input) {
        Ok(resolved) => {
            let p = resolved.as_path();
            assert!(
                is_within(root, p),
                "containment violated\ninput: {:?}\nresolved: {:?}\nroot: {:?}",
                input,
                p,
                root
            );
            let canonical_anchor = if p.exists() {
                p.canonicalize().unwrap()
            } else {
                p.parent().unwrap().canonicalize().unwrap().join(p.file_name().unwrap())
            };
            assert_eq!(canonical_anchor, p, "non-canonical result for {:?}", input);
            assert!(
                !p.starts_with(root.parent().unwrap().join("allowed-evil")),
                "sibling reached for {:?}",
                input
            );
            true
        }
        Err(e) => {
            assert!(e.is_access_denied(), "unexpected error {:?} for {:?}", e, input);
            false
        }
    }
}

#[test]
fn fuzz_random_payloads_stay_contained() {
    let (_tmp, gate, root) = fixture();
    let mut rng = Lcg::new(0x5eed_f11e);
    let mut accepted = 0;
    for _ in 0..1500 {
        let input = generate_payload(&mut rng);
        if assert_contained(&gate, &root, &input) {
            accepted += 1;
        }
    }
    // Benign-looking payloads must still get through; an all-deny gate
    // would pass the invariant trivially.
    assert!(accepted > 0);
}

#[test]
fn fuzz_traversal_depth_variants_never_escape() {
    let (_tmp, gate, root) = fixture();
    let payloads = depth_payloads();
    assert!(payloads.len() >= 1000);
    for input in &payloads {
        assert_contained(&gate, &root, input);
    }
}

#[test]
fn fuzz_absolute_outside_targets_are_denied() {
    let (tmp, gate, root) = fixture();
    let evil = tmp.path().join("allowed-evil").join("secret.txt");
    let evil = evil.to_str().unwrap();
    for input in [
        evil.to_string(),
        evil.replace('/', "\\"),
        format!("{}/../allowed-evil/secret.txt", root.display()),
        format!("{}/docs/../../allowed-evil/secret.txt", root.display()),
        "/etc/passwd".to_string(),
        "/etc/shadow".to_string(),
    ] {
        assert!(gate.resolve(&input).is_err(), "{input}");
    }
}

#[test]
fn fuzz_benign_paths_resolve() {
    let (_tmp, gate, root) = fixture();
    for input in [
        "docs/report.pdf",
        "./docs/report.pdf",
        "docs//report.pdf",
        "docs\\report.pdf",
        "docs/./../docs/report.pdf",
        "docs/upload%20name.pdf",
        "docs/résumé.pdf",
    ] {
        assert!(assert_contained(&gate, &root, input), "{input}");
    }
}
