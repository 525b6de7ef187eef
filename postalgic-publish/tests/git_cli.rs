//! Git publishing through the `git` executable against a local bare remote.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;

use postalgic_core::{diff, hash_site, ClientId, FileManifest, GitConfig, RemoteHashRecord, SuppressionRule};
use postalgic_publish::git::{GitCli, GitPublisher};
use postalgic_publish::{publish, NoProgress, PublishPhase, PublishRequest, Publisher};
use tempfile::TempDir;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
}

fn bare_remote() -> Option<TempDir> {
    let dir = TempDir::new().unwrap();
    git(&["init", "--quiet", "--bare", dir.path().to_str()?])?;
    Some(dir)
}

fn reject_pushes(remote: &Path, rejecting: bool) {
    let hook = remote.join("hooks/pre-receive");
    if rejecting {
        fs::write(&hook, "#!/bin/sh\nexit 1\n").unwrap();
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();
    } else {
        fs::remove_file(&hook).unwrap();
    }
}

fn config(remote: &Path) -> GitConfig {
    GitConfig {
        repository_url: remote.display().to_string(),
        branch: "gh-pages".into(),
        author_name: "Me".into(),
        author_email: "me@example.com".into(),
    }
}

/// Publish `site` the way a sync does: baseline from the remote record.
async fn sync<P: Publisher>(
    publisher: &mut P,
    site: &Path,
) -> Result<postalgic_publish::PublishResult, postalgic_publish::PublishFailure> {
    publisher.connect().await.unwrap();
    let previous = publisher
        .fetch_remote_hashes()
        .await
        .unwrap()
        .map(|r| r.file_hashes)
        .unwrap_or_else(FileManifest::new);
    let manifest = hash_site(site, &[]).unwrap();
    let changes = diff(&previous, &manifest);
    let record = RemoteHashRecord::new(manifest.clone(), ClientId::from("laptop"));
    publish(
        publisher,
        PublishRequest {
            site_dir: site,
            manifest: &manifest,
            changes: Some(&changes),
            record: Some(&record),
            suppression: &SuppressionRule::default(),
        },
        &NoProgress,
    )
    .await
}

#[tokio::test]
async fn rejected_first_push_is_retried_in_full() {
    let Some(remote) = bare_remote() else {
        eprintln!("git not available; skipping");
        return;
    };
    let site = TempDir::new().unwrap();
    fs::write(site.path().join("index.html"), "home").unwrap();
    fs::write(site.path().join("about.html"), "about").unwrap();
    let work = TempDir::new().unwrap();
    let workdir = work.path().join("checkout");

    reject_pushes(remote.path(), true);
    let mut first = GitPublisher::new(GitCli::default(), config(remote.path()), workdir.clone(), vec![]);
    let failure = sync(&mut first, site.path()).await.unwrap_err();
    assert_eq!(failure.phase, PublishPhase::Finalizing);
    assert_eq!(failure.partial.committed, Some(true));

    reject_pushes(remote.path(), false);
    let mut second = GitPublisher::new(GitCli::default(), config(remote.path()), workdir, vec![]);
    second.connect().await.unwrap();
    assert!(second.fetch_remote_hashes().await.unwrap().is_none());
    assert!(second.list_remote().await.unwrap().is_empty());

    let result = sync(&mut second, site.path()).await.unwrap();
    assert_eq!(result.uploaded, 2);
    assert_eq!(result.committed, Some(true));

    let remote_dir = remote.path().to_str().unwrap();
    let heads = git(&["ls-remote", "--heads", remote_dir, "gh-pages"]).unwrap();
    assert!(!heads.trim().is_empty());
    let tree = git(&["--git-dir", remote_dir, "ls-tree", "-r", "--name-only", "gh-pages"]).unwrap();
    let files: Vec<&str> = tree.lines().collect();
    assert_eq!(files, vec![".postalgic/hashes.json", "about.html", "index.html"]);
}

#[tokio::test]
async fn existing_remote_branch_is_checked_out_clean() {
    let Some(remote) = bare_remote() else {
        eprintln!("git not available; skipping");
        return;
    };
    let site = TempDir::new().unwrap();
    fs::write(site.path().join("index.html"), "home").unwrap();
    let work = TempDir::new().unwrap();

    let mut laptop =
        GitPublisher::new(GitCli::default(), config(remote.path()), work.path().join("laptop"), vec![]);
    sync(&mut laptop, site.path()).await.unwrap();

    let mut desktop =
        GitPublisher::new(GitCli::default(), config(remote.path()), work.path().join("desktop"), vec![]);
    desktop.connect().await.unwrap();
    let record = desktop.fetch_remote_hashes().await.unwrap().unwrap();
    assert_eq!(record.published_by, ClientId::from("laptop"));

    let result = sync(&mut desktop, site.path()).await.unwrap();
    assert!(!result.changed);
}
