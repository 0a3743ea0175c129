use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use extgate_install::{ErrorKind, InstallerConfig, Installer, Outcome, Upload};
use tempfile::{TempDir, tempdir};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

struct Site {
    _dir: TempDir,
    root: PathBuf,
    installer: Installer,
}

impl Site {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let installer = Installer::new(InstallerConfig::rooted_at(&root)).unwrap();
        Self {
            _dir: dir,
            root,
            installer,
        }
    }

    /// Write a zip where a web server would leave an upload.
    fn upload(&self, original_name: &str, files: &[(&str, &str)]) -> Upload {
        let incoming = self.root.join("incoming");
        std::fs::create_dir_all(&incoming).unwrap();
        let path = incoming.join(format!("php{}", files.len()));

        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap();

        let size = std::fs::metadata(&path).unwrap().len();
        Upload::new(original_name, path, size)
    }

    fn extensions(&self) -> PathBuf {
        self.root.join("extensions")
    }

    fn is_empty(&self, dir: &str) -> bool {
        let path = self.root.join(dir);
        !path.exists() || std::fs::read_dir(path).unwrap().next().is_none()
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn theme_upload_end_to_end() {
    let site = Site::new();
    let mut upload = site.upload(
        "theme.zip",
        &[
            ("theme/extension.json", r#"{"slug":"theme","name":"Theme","version":"1.0"}"#),
            ("theme/style.css", "body{margin}"),
        ],
    );
    let original = upload.temp_path.clone();

    let result = site.installer.install(&mut upload, Some("theme"));
    assert_eq!(Outcome::from(&result), Outcome { success: true, code: None });
    let report = result.unwrap();

    assert_eq!(report.slug, "theme");
    assert_eq!(report.path, site.extensions().join("theme"));
    assert_eq!(report.file_count, 2);
    assert!(!report.normalized);
    assert_eq!(report.sha256.len(), 64);
    assert_eq!(report.manifest.version(), Some("1.0"));
    assert_eq!(read(&report.path.join("style.css")), "body{margin}");

    assert!(!original.exists());
    assert!(site.is_empty("tmp"));
    assert!(site.is_empty("staging"));
}

#[test]
fn manifest_slug_is_used_when_none_is_expected() {
    let site = Site::new();
    let mut upload = site.upload("gallery-v3.ZIP", &[("extension.json", r#"{"slug":"gallery"}"#)]);

    let report = site.installer.install(&mut upload, None).unwrap();
    assert_eq!(report.path, site.extensions().join("gallery"));
}

#[test]
fn nested_folder_is_rehomed_and_cleaned_up() {
    let site = Site::new();
    let mut upload = site.upload(
        "download.zip",
        &[
            ("my_ext-2.0.1/extension.json", r#"{"slug":"my_ext"}"#),
            ("my_ext-2.0.1/js/app.js", "init()"),
        ],
    );

    let report = site.installer.install(&mut upload, Some("my_ext")).unwrap();

    assert!(report.normalized);
    assert_eq!(read(&report.path.join("js/app.js")), "init()");
    assert!(site.is_empty("tmp"));
    assert!(site.is_empty("staging"));
}

#[test]
fn wrong_extension_never_reaches_the_sandbox() {
    let site = Site::new();
    let mut upload = site.upload("theme.exe", &[("extension.json", r#"{"slug":"theme"}"#)]);
    let original = upload.temp_path.clone();

    let err = site.installer.install(&mut upload, Some("theme")).unwrap_err();

    assert_eq!(err.code(), "invalid_extension");
    assert_eq!(err.kind(), ErrorKind::InputRejection);
    assert!(original.exists());
    assert!(site.is_empty("tmp"));
}

#[test]
fn traversal_upload_leaves_no_trace() {
    let site = Site::new();
    let mut upload = site.upload(
        "evil.zip",
        &[
            ("extension.json", r#"{"slug":"evil"}"#),
            ("../../escaped.txt", "pwned"),
        ],
    );

    let result = site.installer.install(&mut upload, Some("evil"));
    let outcome = Outcome::from(&result);

    assert_eq!(outcome, Outcome { success: false, code: Some("path_traversal") });
    assert_eq!(result.unwrap_err().kind(), ErrorKind::StructuralViolation);
    assert!(site.is_empty("tmp"));
    assert!(site.is_empty("staging"));
    assert!(site.is_empty("extensions"));
    assert!(!site.root.join("escaped.txt").exists());
}

#[test]
fn expected_slug_must_match_manifest() {
    let site = Site::new();
    let mut upload = site.upload("other.zip", &[("extension.json", r#"{"slug":"other"}"#)]);

    let err = site.installer.install(&mut upload, Some("myext")).unwrap_err();
    assert_eq!(err.code(), "slug_mismatch");
    assert!(site.is_empty("tmp"));
}

#[test]
fn reinstall_keeps_first_copy() {
    let site = Site::new();
    let mut first = site.upload(
        "a.zip",
        &[("extension.json", r#"{"slug":"myext"}"#), ("v.txt", "1")],
    );
    site.installer.install(&mut first, None).unwrap();

    let mut second = site.upload(
        "b.zip",
        &[("extension.json", r#"{"slug":"myext"}"#), ("v.txt", "2"), ("x.txt", "x")],
    );
    let err = site.installer.install(&mut second, None).unwrap_err();

    assert_eq!(err.code(), "already_installed");
    assert_eq!(read(&site.extensions().join("myext/v.txt")), "1");
    assert!(!site.extensions().join("myext/x.txt").exists());
    assert!(site.is_empty("staging"));
    assert!(site.is_empty("tmp"));
}
