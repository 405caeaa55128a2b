//! Tests for path containment.

use super::*;
use std::fs;

/// `<tmp>/allowed` as the only root and base, plus a sibling `<tmp>/allowed-other`.
fn fixture() -> (tempfile::TempDir, PathContainment) {
    let tmp = tempfile::tempdir().unwrap();
    let allowed = tmp.path().join("allowed");
    fs::create_dir_all(allowed.join("docs")).unwrap();
    fs::write(allowed.join("docs").join("report.pdf"), b"%PDF-1.7").unwrap();
    fs::create_dir_all(tmp.path().join("allowed-other")).unwrap();
    fs::write(tmp.path().join("allowed-other").join("file"), b"secret").unwrap();
    let containment = PathContainment::new([&allowed])
        .unwrap()
        .with_base(&allowed)
        .unwrap();
    (tmp, containment)
}

#[test]
fn test_resolve_existing_file() {
    let (_tmp, gate) = fixture();
    let resolved = gate.resolve("docs/report.pdf").unwrap();
    assert!(resolved.as_path().is_absolute());
    assert_eq!(resolved.relative_to_root(), Path::new("docs/report.pdf"));
    assert_eq!(resolved.root(), gate.roots()[0].as_path());
    assert_eq!(resolved.file_name(), Some("report.pdf"));
}

#[test]
fn test_resolve_root_itself() {
    let (_tmp, gate) = fixture();
    let resolved = gate.resolve(".").unwrap();
    assert_eq!(resolved.as_path(), gate.roots()[0].as_path());
    assert_eq!(resolved.relative_to_root(), Path::new(""));
}

#[test]
fn test_traversal_is_denied() {
    let (_tmp, gate) = fixture();
    let err = gate.resolve("../../../etc/passwd").unwrap_err();
    assert!(err.is_access_denied());
    assert!(gate.resolve("docs/../../../../etc/passwd").is_err());
    assert!(gate.resolve("/etc/passwd").is_err());
}

#[test]
fn test_sibling_root_prefix_is_denied() {
    let (tmp, gate) = fixture();
    let sibling = tmp.path().join("allowed-other").join("file");
    let err = gate.resolve(sibling.to_str().unwrap()).unwrap_err();
    assert_eq!(err, GateError::access_denied("path escapes allowed roots"));
    assert!(gate.resolve("../allowed-other/file").is_err());
}

#[test]
fn test_is_within_requires_separator_boundary() {
    assert!(is_within(Path::new("/allowed"), Path::new("/allowed")));
    assert!(is_within(Path::new("/allowed"), Path::new("/allowed/x/y")));
    assert!(is_within(Path::new("/allowed/"), Path::new("/allowed/x")));
    assert!(!is_within(Path::new("/allowed"), Path::new("/allowed-evil")));
    assert!(!is_within(Path::new("/allowed"), Path::new("/allowed-evil/x")));
    assert!(!is_within(Path::new("/allowed"), Path::new("/")));
    assert!(is_within(Path::new("/"), Path::new("/anything")));
}

#[test]
fn test_missing_leaf_resolves_against_parent() {
    let (_tmp, gate) = fixture();
    let resolved = gate.resolve("docs/new-upload.txt").unwrap();
    assert!(!resolved.exists());
    assert!(resolved.as_path().ends_with("docs/new-upload.txt"));
    assert!(resolved.as_path().starts_with(gate.roots()[0].as_path()));
}

#[test]
fn test_missing_ancestor_chain_fails_closed() {
    let (_tmp, gate) = fixture();
    let err = gate.resolve("nope/deeper/file.txt").unwrap_err();
    assert_eq!(err, GateError::access_denied("parent directory does not exist"));
}

#[test]
fn test_denial_does_not_leak_resolved_path() {
    let (tmp, gate) = fixture();
    let err = gate.resolve("../allowed-other/file").unwrap_err();
    let shown = err.to_string();
    assert!(!shown.contains(tmp.path().to_str().unwrap()));
}

#[test]
fn test_hostile_inputs_are_denied() {
    let (_tmp, gate) = fixture();
    for input in [
        "",
        "docs/report.pdf\0.txt",
        "%2e%2e%2f%2e%2e%2fetc%2fpasswd",
        "%252e%252e%252fetc",
        "..\u{2215}..\u{2215}etc",
        "docs/CON",
        "\\\\evil-host\\share\\file",
    ] {
        let err = gate.resolve(input).unwrap_err();
        assert!(err.is_access_denied(), "{input:?}");
    }
    let long = "a/".repeat(MAX_PATH_LEN);
    assert!(gate.resolve(&long).is_err());
}

#[test]
fn test_multiple_roots() {
    let tmp = tempfile::tempdir().unwrap();
    let first = tmp.path().join("first");
    let second = tmp.path().join("second");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();
    fs::write(second.join("b.txt"), b"b").unwrap();

    let gate = PathContainment::new([&first, &second]).unwrap();
    let resolved = gate.resolve(second.join("b.txt").to_str().unwrap()).unwrap();
    assert_eq!(resolved.root(), second.canonicalize().unwrap().as_path());
    assert!(gate.resolve(tmp.path().to_str().unwrap()).is_err());
}

#[test]
fn test_resolve_is_idempotent() {
    let (_tmp, gate) = fixture();
    let a = gate.resolve("docs/./report.pdf").unwrap();
    let b = gate.resolve("docs/./report.pdf").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_missing_root_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let err = PathContainment::new([tmp.path().join("absent")]).unwrap_err();
    assert!(matches!(err, GateError::Io { .. }));
    assert!(PathContainment::new(Vec::<PathBuf>::new()).is_err());
}

#[test]
fn test_resolve_path_one_shot() {
    let (tmp, _gate) = fixture();
    let allowed = tmp.path().join("allowed");
    let file = allowed.join("docs").join("report.pdf");
    assert!(resolve_path(file.to_str().unwrap(), &[&allowed]).is_ok());
    let outside = tmp.path().join("allowed-other").join("file");
    assert!(resolve_path(outside.to_str().unwrap(), &[&allowed]).is_err());
}

#[test]
fn test_resolve_path_bad_roots_are_denied() {
    let tmp = tempfile::tempdir().unwrap();
    let err = resolve_path("report.pdf", &Vec::<PathBuf>::new()).unwrap_err();
    assert!(err.is_access_denied());
    let err = resolve_path("report.pdf", &[tmp.path().join("absent")]).unwrap_err();
    assert!(err.is_access_denied());
    assert!(!err.to_string().contains("absent"));
}

#[test]
fn test_open_read_reads_content() {
    use std::io::Read;
    let (_tmp, gate) = fixture();
    let resolved = gate.resolve("docs/report.pdf").unwrap();
    let mut buf = Vec::new();
    resolved.open_read().unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"%PDF-1.7");

    let missing = gate.resolve("docs/missing.pdf").unwrap();
    assert!(matches!(missing.open_read().unwrap_err(), GateError::Io { .. }));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_symlink_escape_is_denied() {
        let (tmp, gate) = fixture();
        let allowed = tmp.path().join("allowed");
        symlink(tmp.path().join("allowed-other"), allowed.join("escape")).unwrap();
        assert!(gate.resolve("escape/file").is_err());
        assert!(gate.resolve("escape/new-file").is_err());
    }

    #[test]
    fn test_symlink_inside_root_is_followed() {
        let (tmp, gate) = fixture();
        let allowed = tmp.path().join("allowed");
        symlink(allowed.join("docs"), allowed.join("alias")).unwrap();
        let resolved = gate.resolve("alias/report.pdf").unwrap();
        assert_eq!(resolved.relative_to_root(), Path::new("docs/report.pdf"));
    }

    #[test]
    fn test_dangling_symlink_is_denied() {
        let (tmp, gate) = fixture();
        let allowed = tmp.path().join("allowed");
        symlink(tmp.path().join("allowed-other").join("gone"), allowed.join("dangling")).unwrap();
        let err = gate.resolve("dangling").unwrap_err();
        assert_eq!(err, GateError::access_denied("dangling symbolic link"));
    }

    #[test]
    fn test_open_read_refuses_swapped_symlink() {
        let (tmp, gate) = fixture();
        let allowed = tmp.path().join("allowed");
        let resolved = gate.resolve("docs/report.pdf").unwrap();

        fs::remove_file(allowed.join("docs").join("report.pdf")).unwrap();
        symlink(
            tmp.path().join("allowed-other").join("file"),
            allowed.join("docs").join("report.pdf"),
        )
        .unwrap();

        let err = resolved.open_read().unwrap_err();
        assert!(err.is_access_denied());
    }
}
