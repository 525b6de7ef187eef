//! Per-site YAML registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.postalgic/
//!   client-id           (stable identifier written into control files)
//!   sites/
//!     <site_name>.yaml  (one file per site — mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::RegistryError;
use crate::types::{ClientId, PublishSettings, SiteConfig, SiteName, TargetEntry, TargetName};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.postalgic/`
pub fn postalgic_root(home: &Path) -> PathBuf {
    home.join(".postalgic")
}

/// `<home>/.postalgic/sites/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn sites_dir_at(home: &Path) -> Result<PathBuf, RegistryError> {
    let dir = postalgic_root(home).join("sites");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.postalgic/sites/<site>.yaml` — pure, no I/O.
pub fn site_path_at(home: &Path, site: &SiteName) -> PathBuf {
    postalgic_root(home)
        .join("sites")
        .join(format!("{}.yaml", site.0))
}

/// Site and target names become file names; keep them boring.
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load a single site from `<home>/.postalgic/sites/<site>.yaml`.
///
/// Returns `RegistryError::SiteNotFound` if absent,
/// `RegistryError::Parse` (with path + line context) if malformed YAML.
pub fn load_site_at(home: &Path, site: &SiteName) -> Result<SiteConfig, RegistryError> {
    let path = site_path_at(home, site);
    if !path.exists() {
        return Err(RegistryError::SiteNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })
}

/// `load_site_at` convenience wrapper.
pub fn load_site(site: &SiteName) -> Result<SiteConfig, RegistryError> {
    load_site_at(&home()?, site)
}

/// Return every registered site, sorted by name.
///
/// Ignores leftover `.tmp` files from interrupted saves.
pub fn list_sites_at(home: &Path) -> Result<Vec<SiteConfig>, RegistryError> {
    let dir = postalgic_root(home).join("sites");
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut entries: Vec<_> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut sites = Vec::new();
    for entry in entries {
        let fname = entry.file_name();
        if !fname.to_string_lossy().ends_with(".yaml") {
            continue;
        }
        let contents = std::fs::read_to_string(entry.path())?;
        let site: SiteConfig = serde_yaml::from_str(&contents).map_err(|e| {
            RegistryError::Parse { path: entry.path(), source: e }
        })?;
        sites.push(site);
    }
    Ok(sites)
}

/// `list_sites_at` convenience wrapper.
pub fn list_sites() -> Result<Vec<SiteConfig>, RegistryError> {
    list_sites_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a site to `<home>/.postalgic/sites/<site>.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem).
pub fn save_site_at(home: &Path, site: &SiteConfig) -> Result<(), RegistryError> {
    validate_name(&site.name.0)?;
    sites_dir_at(home)?;
    let path = site_path_at(home, &site.name);
    let tmp_path = path.with_file_name(format!("{}.yaml.tmp", site.name.0));

    let yaml = serde_yaml::to_string(site)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_site_at` convenience wrapper.
pub fn save_site(site: &SiteConfig) -> Result<(), RegistryError> {
    save_site_at(&home()?, site)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Register `name` publishing from `output_dir`.
///
/// Idempotent: if the site already exists, loads and returns it unchanged.
pub fn init_site_at(
    home: &Path,
    name: SiteName,
    output_dir: PathBuf,
) -> Result<SiteConfig, RegistryError> {
    validate_name(&name.0)?;
    if site_path_at(home, &name).exists() {
        return load_site_at(home, &name);
    }

    let now = Utc::now();
    let site = SiteConfig {
        name,
        output_dir,
        client_id: None,
        settings: PublishSettings::default(),
        targets: vec![],
        created_at: now,
        updated_at: now,
    };
    save_site_at(home, &site)?;
    Ok(site)
}

/// `init_site_at` convenience wrapper.
pub fn init_site(name: SiteName, output_dir: PathBuf) -> Result<SiteConfig, RegistryError> {
    init_site_at(&home()?, name, output_dir)
}

// ---------------------------------------------------------------------------
// 5. Targets
// ---------------------------------------------------------------------------

/// Add `entry` to `site`, replacing any target with the same name.
pub fn add_target_at(
    home: &Path,
    site: &SiteName,
    entry: TargetEntry,
) -> Result<SiteConfig, RegistryError> {
    validate_name(&entry.name.0)?;
    let mut config = load_site_at(home, site)?;
    match config.targets.iter_mut().find(|t| t.name == entry.name) {
        Some(existing) => *existing = entry,
        None => config.targets.push(entry),
    }
    config.updated_at = Utc::now();
    save_site_at(home, &config)?;
    Ok(config)
}

/// `add_target_at` convenience wrapper.
pub fn add_target(site: &SiteName, entry: TargetEntry) -> Result<SiteConfig, RegistryError> {
    add_target_at(&home()?, site, entry)
}

/// Remove the target called `target` from `site`.
pub fn remove_target_at(
    home: &Path,
    site: &SiteName,
    target: &TargetName,
) -> Result<SiteConfig, RegistryError> {
    let mut config = load_site_at(home, site)?;
    let before = config.targets.len();
    config.targets.retain(|t| &t.name != target);
    if config.targets.len() == before {
        return Err(RegistryError::TargetNotFound {
            site: site.0.clone(),
            target: target.0.clone(),
        });
    }
    config.updated_at = Utc::now();
    save_site_at(home, &config)?;
    Ok(config)
}

/// `remove_target_at` convenience wrapper.
pub fn remove_target(site: &SiteName, target: &TargetName) -> Result<SiteConfig, RegistryError> {
    remove_target_at(&home()?, site, target)
}

// ---------------------------------------------------------------------------
// 6. Client identity
// ---------------------------------------------------------------------------

/// Read `<home>/.postalgic/client-id`, creating it on first use.
///
/// Format: `<hostname>-<8 hex chars>`.
pub fn client_id_at(home: &Path) -> Result<ClientId, RegistryError> {
    let root = postalgic_root(home);
    let path = root.join("client-id");
    if path.exists() {
        let stored = std::fs::read_to_string(&path)?;
        let stored = stored.trim();
        if !stored.is_empty() {
            return Ok(ClientId::from(stored));
        }
    }

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "postalgic".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let id = format!("{host}-{}", &suffix[..8]);

    if !root.exists() {
        std::fs::create_dir_all(&root)?;
        set_dir_permissions(&root)?;
    }
    let tmp = root.join("client-id.tmp");
    std::fs::write(&tmp, format!("{id}\n"))?;
    std::fs::rename(&tmp, &path)?;
    Ok(ClientId::from(id))
}

/// `client_id_at` convenience wrapper.
pub fn client_id() -> Result<ClientId, RegistryError> {
    client_id_at(&home()?)
}

/// The client id recorded for publishes of `site`: the per-site override,
/// else the machine-wide id.
pub fn effective_client_id_at(home: &Path, site: &SiteConfig) -> Result<ClientId, RegistryError> {
    match &site.client_id {
        Some(id) => Ok(id.clone()),
        None => client_id_at(home),
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LocalArchiveConfig, TargetConfig};
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    fn blog() -> SiteName {
        SiteName::from("myblog")
    }

    fn archive_target(name: &str, path: &str) -> TargetEntry {
        TargetEntry {
            name: TargetName::from(name),
            config: TargetConfig::LocalArchive(LocalArchiveConfig {
                output_path: PathBuf::from(path),
            }),
        }
    }

    #[test]
    fn site_path_is_correct() {
        let home = make_home();
        let path = site_path_at(home.path(), &blog());
        assert!(path.ends_with(".postalgic/sites/myblog.yaml"));
    }

    #[test]
    fn sites_dir_created_with_perms() {
        let home = make_home();
        let dir = sites_dir_at(home.path()).expect("sites_dir_at");
        assert!(dir.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }
    }

    #[test]
    fn init_then_load_roundtrip() {
        let home = make_home();
        let site = init_site_at(home.path(), blog(), PathBuf::from("/srv/out")).expect("init");
        let loaded = load_site_at(home.path(), &blog()).expect("load");
        assert_eq!(loaded, site);
    }

    #[test]
    fn init_is_idempotent() {
        let home = make_home();
        let first = init_site_at(home.path(), blog(), PathBuf::from("/a")).expect("init");
        let second = init_site_at(home.path(), blog(), PathBuf::from("/b")).expect("init again");
        assert_eq!(second.output_dir, first.output_dir);
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = make_home();
        init_site_at(home.path(), blog(), PathBuf::from("/a")).expect("init");
        let tmp = site_path_at(home.path(), &blog()).with_file_name("myblog.yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    fn add_target_replaces_same_name() {
        let home = make_home();
        init_site_at(home.path(), blog(), PathBuf::from("/a")).expect("init");
        add_target_at(home.path(), &blog(), archive_target("zip", "/tmp/one.zip")).expect("add");
        let site = add_target_at(home.path(), &blog(), archive_target("zip", "/tmp/two.zip"))
            .expect("replace");
        assert_eq!(site.targets.len(), 1);
        assert_eq!(site.targets[0], archive_target("zip", "/tmp/two.zip"));
    }

    #[test]
    fn remove_unknown_target_errors() {
        let home = make_home();
        init_site_at(home.path(), blog(), PathBuf::from("/a")).expect("init");
        let err = remove_target_at(home.path(), &blog(), &TargetName::from("nope")).unwrap_err();
        assert!(matches!(err, RegistryError::TargetNotFound { .. }));
    }

    #[test]
    fn load_missing_site_returns_not_found() {
        let home = make_home();
        let err = load_site_at(home.path(), &blog()).unwrap_err();
        assert!(matches!(err, RegistryError::SiteNotFound { .. }));
    }

    #[test]
    fn list_sites_empty_when_none() {
        let home = make_home();
        assert!(list_sites_at(home.path()).expect("list").is_empty());
    }

    #[test]
    fn client_id_is_stable() {
        let home = make_home();
        let first = client_id_at(home.path()).expect("first");
        let second = client_id_at(home.path()).expect("second");
        assert_eq!(first, second);
        assert!(first.0.len() > 9);
    }

    #[test]
    fn invalid_names_rejected() {
        assert!(validate_name("my-blog_2.0").is_ok());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name("with space").is_err());
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(RegistryError::HomeNotFound.to_string().contains("home directory"));
    }
}
