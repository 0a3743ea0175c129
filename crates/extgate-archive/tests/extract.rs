use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use extgate_archive::{ExtractionLimits, extract_safe, normalize};
use tempfile::{TempDir, tempdir};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    fn staging(&self) -> PathBuf {
        self.root.join("staging")
    }

    fn dest(&self) -> PathBuf {
        self.root.join("extensions")
    }

    fn zip(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let path = self.root.join(name);
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (entry, data) in files {
            if entry.ends_with('/') {
                writer.add_directory(*entry, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*entry, SimpleFileOptions::default()).unwrap();
                writer.write_all(data.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
        path
    }

    fn install(&self, zip: &Path, slug: &str) -> Result<PathBuf, &'static str> {
        extract_safe(zip, slug, &self.dest(), &self.staging(), &ExtractionLimits::default())
            .map(|installed| installed.path)
            .map_err(|e| e.code())
    }

    fn files_under(&self, dir: &Path) -> usize {
        if !dir.exists() {
            return 0;
        }
        walkdir(dir)
    }
}

fn walkdir(dir: &Path) -> usize {
    let mut count = 0;
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        count += 1;
        if entry.file_type().unwrap().is_dir() {
            count += walkdir(&entry.path());
        }
    }
    count
}

const MANIFEST: &str = r#"{"slug":"myext","name":"My Ext","version":"1.0.0"}"#;

#[test]
fn installs_package_with_root_manifest() {
    let fx = Fixture::new();
    let zip = fx.zip(
        "myext.zip",
        &[
            ("extension.json", MANIFEST),
            ("assets/", ""),
            ("assets/app.js", "console.log(1)"),
        ],
    );

    let path = fx.install(&zip, "myext").unwrap();

    assert_eq!(path, fx.dest().join("myext"));
    assert!(path.join("extension.json").is_file());
    assert_eq!(std::fs::read(path.join("assets/app.js")).unwrap(), b"console.log(1)");
    assert_eq!(fx.files_under(&fx.staging()), 0);
}

#[cfg(unix)]
#[test]
fn installed_modes() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    let zip = fx.zip("m.zip", &[("extension.json", MANIFEST)]);
    let path = fx.install(&zip, "myext").unwrap();

    let dir_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    let file_mode = std::fs::metadata(path.join("extension.json"))
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(dir_mode, 0o755);
    assert_eq!(file_mode, 0o644);
}

#[test]
fn traversal_entries_leave_nothing_behind() {
    for evil in ["../evil.txt", "/etc/evil", "C:/evil.txt", "assets/../../evil.txt"] {
        let fx = Fixture::new();
        let zip = fx.zip(
            "evil.zip",
            &[("extension.json", MANIFEST), (evil, "owned")],
        );

        assert_eq!(fx.install(&zip, "myext"), Err("path_traversal"), "{evil}");
        assert_eq!(fx.files_under(&fx.staging()), 0);
        assert_eq!(fx.files_under(&fx.dest()), 0);
        assert!(!fx.root.join("evil.txt").exists());
    }
}

#[test]
fn symlink_entry_is_rejected_before_any_write() {
    let fx = Fixture::new();
    let path = fx.root.join("link.zip");
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    writer
        .start_file("extension.json", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(MANIFEST.as_bytes()).unwrap();
    writer
        .add_symlink("passwd", "/etc/passwd", SimpleFileOptions::default())
        .unwrap();
    writer.finish().unwrap();

    assert_eq!(fx.install(&path, "myext"), Err("symlink_detected"));
    assert!(!fx.staging().exists());
    assert!(!fx.dest().exists());
}

#[test]
fn too_many_files() {
    let fx = Fixture::new();
    let names: Vec<String> = (0..500).map(|i| format!("f/{i}.txt")).collect();
    let mut files = vec![("extension.json", MANIFEST)];
    files.extend(names.iter().map(|n| (n.as_str(), "")));
    let zip = fx.zip("many.zip", &files);

    assert_eq!(fx.install(&zip, "myext"), Err("too_many_files"));
    assert!(!fx.staging().exists());
}

#[test]
fn too_large() {
    let fx = Fixture::new();
    let big = "\0".repeat(9 * 1024 * 1024);
    let zip = fx.zip(
        "big.zip",
        &[("extension.json", MANIFEST), ("blob.bin", big.as_str())],
    );

    assert_eq!(fx.install(&zip, "myext"), Err("too_large"));
    assert!(!fx.staging().exists());
}

#[test]
fn manifest_identity() {
    let fx = Fixture::new();
    let zip = fx.zip("other.zip", &[("extension.json", r#"{"slug":"other"}"#)]);
    assert_eq!(fx.install(&zip, "myext"), Err("slug_mismatch"));

    let zip = fx.zip("none.zip", &[("readme.md", "hello")]);
    assert_eq!(fx.install(&zip, "myext"), Err("missing_manifest"));

    assert_eq!(fx.install(&zip, "My Ext"), Err("invalid_slug"));
    assert_eq!(fx.files_under(&fx.dest()), 0);
}

#[test]
fn case_variant_manifest_cannot_replace_the_checked_one() {
    let fx = Fixture::new();
    let root = fx.zip(
        "root.zip",
        &[
            ("EXTENSION.JSON", r#"{"slug":"myext"}"#),
            ("extension.json", r#"{"slug":"evil"}"#),
        ],
    );
    assert_eq!(fx.install(&root, "myext"), Err("path_traversal"));

    let nested = fx.zip(
        "nested.zip",
        &[
            ("myext/extension.json", r#"{"slug":"myext"}"#),
            ("myext/Extension.json", r#"{"slug":"evil"}"#),
        ],
    );
    assert_eq!(fx.install(&nested, "myext"), Err("path_traversal"));

    assert_eq!(fx.files_under(&fx.staging()), 0);
    assert_eq!(fx.files_under(&fx.dest()), 0);
}

#[test]
fn second_install_of_same_slug_is_refused() {
    let fx = Fixture::new();
    let first = fx.zip(
        "v1.zip",
        &[("extension.json", MANIFEST), ("version.txt", "1")],
    );
    let second = fx.zip(
        "v2.zip",
        &[("extension.json", MANIFEST), ("version.txt", "2"), ("new.txt", "n")],
    );

    let path = fx.install(&first, "myext").unwrap();
    assert_eq!(fx.install(&second, "myext"), Err("already_installed"));

    assert_eq!(std::fs::read(path.join("version.txt")).unwrap(), b"1");
    assert!(!path.join("new.txt").exists());
    assert_eq!(fx.files_under(&fx.staging()), 0);
}

#[test]
fn package_folder_named_after_slug_installs_flat() {
    let fx = Fixture::new();
    let zip = fx.zip(
        "theme.zip",
        &[
            ("theme/extension.json", r#"{"slug":"theme"}"#),
            ("theme/style.css", "body{margin}"),
        ],
    );

    let normalized = normalize(&zip, &ExtractionLimits::default()).unwrap();
    assert!(!normalized.rewritten);

    let installed = extract_safe(
        &normalized.path,
        &normalized.slug,
        &fx.dest(),
        &fx.staging(),
        &ExtractionLimits::default(),
    )
    .unwrap();

    assert_eq!(installed.file_count, 2);
    assert_eq!(installed.total_bytes, 16 + 12);
    assert!(installed.path.join("extension.json").is_file());
    assert_eq!(std::fs::read(installed.path.join("style.css")).unwrap(), b"body{margin}");
}

#[test]
fn rehomed_package_installs_under_declared_slug() {
    let fx = Fixture::new();
    let zip = fx.zip(
        "download.zip",
        &[
            ("my_ext-1.2/extension.json", r#"{"slug":"my_ext"}"#),
            ("my_ext-1.2/lib/main.js", "export {}"),
        ],
    );

    let normalized = normalize(&zip, &ExtractionLimits::default()).unwrap();
    assert!(normalized.rewritten);
    assert_eq!(normalized.canonical_slug, "my-ext");

    let installed = extract_safe(
        &normalized.path,
        &normalized.slug,
        &fx.dest(),
        &fx.staging(),
        &ExtractionLimits::default(),
    )
    .unwrap();

    assert_eq!(installed.path, fx.dest().join("my_ext"));
    assert!(installed.path.join("lib/main.js").is_file());
    normalized.remove_rewritten().unwrap();
}
