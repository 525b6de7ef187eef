//! Site registry error-message, atomic-write-safety, and init integration tests.
//! Storage: ~/.postalgic/sites/<site>.yaml

use std::fs;
use std::path::PathBuf;

use assert_fs::prelude::*;
use postalgic_core::{
    registry,
    types::{
        GitConfig, LocalArchiveConfig, ObjectStoreConfig, SftpConfig, SiteName, TargetConfig,
        TargetEntry, TargetName,
    },
    RegistryError,
};
use predicates::prelude::predicate;

fn blog() -> SiteName {
    SiteName::from("myblog")
}

fn every_target() -> Vec<TargetEntry> {
    vec![
        TargetEntry {
            name: TargetName::from("s3"),
            config: TargetConfig::ObjectStore(ObjectStoreConfig {
                bucket: "blog-bucket".to_string(),
                region: "eu-west-1".to_string(),
                distribution_id: Some("E123ABC".to_string()),
                access_key_id: None,
                secret_access_key: None,
                endpoint: None,
            }),
        },
        TargetEntry {
            name: TargetName::from("pages"),
            config: TargetConfig::Git(GitConfig {
                repository_url: "https://example.com/me/me.github.io.git".to_string(),
                branch: "gh-pages".to_string(),
                author_name: "Me".to_string(),
                author_email: "me@example.com".to_string(),
            }),
        },
        TargetEntry {
            name: TargetName::from("host"),
            config: TargetConfig::Sftp(SftpConfig {
                host: "example.com".to_string(),
                port: 2222,
                username: "deploy".to_string(),
                password: None,
                private_key_path: Some(PathBuf::from("/home/me/.ssh/id_ed25519")),
                private_key_passphrase: None,
                remote_path: "/var/www/blog".to_string(),
            }),
        },
        TargetEntry {
            name: TargetName::from("zip"),
            config: TargetConfig::LocalArchive(LocalArchiveConfig {
                output_path: PathBuf::from("/tmp/blog.zip"),
            }),
        },
    ]
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_site_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = registry::load_site_at(home.path(), &blog()).unwrap_err();
    assert!(matches!(err, RegistryError::SiteNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("site not found"));
    assert!(err.to_string().contains("myblog.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".postalgic").join("sites");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("myblog.yaml"), b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = registry::load_site_at(home.path(), &blog()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("myblog.yaml"), "must contain file path, got: {msg}");
}

#[test]
fn unknown_target_type_is_a_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".postalgic").join("sites");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(
        dir.join("myblog.yaml"),
        "name: myblog\noutput_dir: /out\ncreated_at: 2026-01-01T00:00:00Z\nupdated_at: 2026-01-01T00:00:00Z\ntargets:\n  - name: ftp\n    type: ftp\n    host: example.com\n",
    )
    .expect("write");

    let err = registry::load_site_at(home.path(), &blog()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::init_site_at(home.path(), blog(), PathBuf::from("/out")).expect("init");

    let yaml_path = registry::site_path_at(home.path(), &blog());
    let original_bytes = fs::read(&yaml_path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = yaml_path.with_file_name("myblog.yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    let current_bytes = fs::read(&yaml_path).expect("read after crash");
    assert_eq!(original_bytes, current_bytes, "original must be unchanged after crash");

    // The orphan must not be picked up as a site.
    let sites = registry::list_sites_at(home.path()).expect("list");
    assert_eq!(sites.len(), 1);
}

// ---------------------------------------------------------------------------
// 3. Init and targets
// ---------------------------------------------------------------------------

#[test]
fn init_creates_site_yaml_with_0600() {
    let home = assert_fs::TempDir::new().expect("home tempdir");
    registry::init_site_at(home.path(), blog(), PathBuf::from("/out")).expect("init");

    home.child(".postalgic/sites/myblog.yaml")
        .assert(predicate::path::exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let yaml_path = registry::site_path_at(home.path(), &blog());
        let mode = fs::metadata(&yaml_path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

#[test]
fn every_target_kind_survives_save_and_load() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::init_site_at(home.path(), blog(), PathBuf::from("/out")).expect("init");
    for entry in every_target() {
        registry::add_target_at(home.path(), &blog(), entry).expect("add target");
    }

    let loaded = registry::load_site_at(home.path(), &blog()).expect("load");
    assert_eq!(loaded.targets, every_target());
}

#[test]
fn remove_target_keeps_others() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::init_site_at(home.path(), blog(), PathBuf::from("/out")).expect("init");
    for entry in every_target() {
        registry::add_target_at(home.path(), &blog(), entry).expect("add target");
    }

    let site = registry::remove_target_at(home.path(), &blog(), &TargetName::from("pages"))
        .expect("remove");
    let names: Vec<_> = site.targets.iter().map(|t| t.name.0.as_str()).collect();
    assert_eq!(names, vec!["s3", "host", "zip"]);
}

#[test]
fn list_is_sorted_and_deterministic() {
    let home = assert_fs::TempDir::new().expect("tempdir");

    // Register beta before alpha intentionally
    registry::init_site_at(home.path(), SiteName::from("beta"), PathBuf::from("/b")).expect("beta");
    registry::init_site_at(home.path(), SiteName::from("alpha"), PathBuf::from("/a")).expect("alpha");

    let list = registry::list_sites_at(home.path()).expect("list");
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].name, SiteName::from("alpha"));
    assert_eq!(list[1].name, SiteName::from("beta"));
}

#[test]
fn site_client_id_override_wins() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut site =
        registry::init_site_at(home.path(), blog(), PathBuf::from("/out")).expect("init");
    let machine = registry::effective_client_id_at(home.path(), &site).expect("machine id");
    assert_eq!(machine, registry::client_id_at(home.path()).expect("client id"));

    site.client_id = Some("phone".into());
    let overridden = registry::effective_client_id_at(home.path(), &site).expect("override");
    assert_eq!(overridden.0, "phone");
}
