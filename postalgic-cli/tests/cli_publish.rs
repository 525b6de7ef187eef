use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn postalgic_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("postalgic"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG");
    cmd
}

struct Fixture {
    home: TempDir,
    out: TempDir,
    bundles: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            home: TempDir::new().expect("home"),
            out: TempDir::new().expect("out"),
            bundles: TempDir::new().expect("bundles"),
        };
        fs::write(fixture.out.path().join("index.html"), "<h1>home</h1>").expect("index");
        fs::write(fixture.out.path().join("about.html"), "<h1>about</h1>").expect("about");
        fs::write(fixture.out.path().join("rss.xml"), "<rss/>").expect("rss");
        fixture
    }

    fn cmd(&self) -> Command {
        postalgic_cmd(self.home.path())
    }

    fn zip(&self) -> std::path::PathBuf {
        self.bundles.path().join("blog.zip")
    }

    fn register(&self) {
        self.cmd()
            .arg("init")
            .arg("blog")
            .arg(self.out.path())
            .assert()
            .success()
            .stdout(contains("Registered site 'blog'"));
        self.cmd()
            .args(["target", "add", "blog", "bundle", "archive", "--output"])
            .arg(self.zip())
            .assert()
            .success()
            .stdout(contains("Added local_archive target 'bundle'"));
    }
}

#[test]
fn init_writes_site_yaml() {
    let f = Fixture::new();
    f.register();

    let yaml = f.home.path().join(".postalgic/sites/blog.yaml");
    let content = fs::read_to_string(yaml).expect("site yaml");
    assert!(content.contains("name: blog"));
    assert!(content.contains("type: local_archive"));

    f.cmd()
        .args(["site", "list"])
        .assert()
        .success()
        .stdout(contains("blog").and(contains("bundle (local_archive)")));
}

#[test]
fn dry_run_lists_changes_without_writing() {
    let f = Fixture::new();
    f.register();

    f.cmd()
        .args(["publish", "blog", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run] bundle: 3 to upload, 0 to delete").and(contains("+ index.html")));

    assert!(predicate::path::missing().eval(f.zip().as_path()));
    assert!(!f.home.path().join(".postalgic/hashes/blog/bundle.json").exists());
}

#[test]
fn publish_then_status_and_diff() {
    let f = Fixture::new();
    f.register();

    f.cmd()
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(contains("\"never_published\""));

    f.cmd()
        .args(["publish", "blog"])
        .assert()
        .success()
        .stdout(contains("bundle: 3 uploaded, 0 deleted"));
    assert!(predicate::path::is_file().eval(f.zip().as_path()));
    assert!(f.home.path().join(".postalgic/hashes/blog/bundle.json").is_file());

    f.cmd()
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(contains("\"current\"").and(contains("\"pending\": 0")));

    f.cmd()
        .args(["diff", "blog"])
        .assert()
        .success()
        .stdout(contains("No differences for 'bundle'."));

    fs::write(f.out.path().join("about.html"), "<h1>about me</h1>").expect("edit");
    fs::remove_file(f.out.path().join("index.html")).expect("remove");

    f.cmd()
        .args(["diff", "blog", "--target", "bundle"])
        .assert()
        .success()
        .stdout(contains("+ about.html").and(contains("- index.html")));

    f.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("PENDING").and(contains("1 to upload, 1 to delete")));
}

#[test]
fn feed_only_churn_is_reported_as_suppressed() {
    let f = Fixture::new();
    f.register();
    f.cmd().args(["publish", "blog"]).assert().success();

    fs::write(f.out.path().join("rss.xml"), "<rss>new</rss>").expect("rss");

    f.cmd()
        .args(["diff", "blog"])
        .assert()
        .success()
        .stdout(contains("No differences for 'bundle'.").and(contains("~ rss.xml (suppressed)")));
    f.cmd()
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(contains("\"suppressed\""));
}

#[test]
fn removing_a_target_clears_its_hash_state() {
    let f = Fixture::new();
    f.register();
    f.cmd().args(["publish", "blog"]).assert().success();
    let hashes = f.home.path().join(".postalgic/hashes/blog/bundle.json");
    assert!(hashes.exists());

    f.cmd()
        .args(["target", "remove", "blog", "bundle"])
        .assert()
        .success()
        .stdout(contains("Removed target 'bundle'"));
    assert!(!hashes.exists());

    f.cmd()
        .args(["publish", "blog", "--target", "bundle"])
        .assert()
        .failure()
        .stderr(contains("bundle"));
}

#[test]
fn unknown_site_fails() {
    let home = TempDir::new().expect("home");
    postalgic_cmd(home.path())
        .args(["publish", "nope"])
        .assert()
        .failure()
        .stderr(contains("publish failed for 'nope'"));
}

#[test]
fn failing_target_makes_publish_exit_nonzero() {
    let f = Fixture::new();
    f.register();
    // Archive output inside a regular file cannot be created.
    let blocker = f.bundles.path().join("blocker");
    fs::write(&blocker, "not a directory").expect("blocker");
    f.cmd()
        .args(["target", "add", "blog", "broken", "archive", "--output"])
        .arg(blocker.join("blog.zip"))
        .assert()
        .success();

    f.cmd()
        .args(["publish", "blog"])
        .assert()
        .failure()
        .stdout(contains("bundle: 3 uploaded").and(contains("✗ broken")))
        .stderr(contains("publish failed for target(s): broken"));
}
