//! Two clients with separate homes publishing to the same bucket.

use std::fs;
use std::path::Path;

use postalgic_core::{registry, ClientId, SiteConfig, SiteName, TargetName};
use postalgic_publish::memory::MemoryObjectStore;
use postalgic_publish::object_store::ObjectStorePublisher;
use postalgic_publish::NoProgress;
use postalgic_sync::{hash_store, publish_target, BaselineSource, PublishOptions, PublishReport};
use tempfile::TempDir;

struct Client {
    home: TempDir,
    out: TempDir,
    site: SiteConfig,
}

impl Client {
    fn new(id: &str, files: &[(&str, &str)]) -> Self {
        let home = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for (path, body) in files {
            write(out.path(), path, body);
        }
        let mut site =
            registry::init_site_at(home.path(), SiteName::from("blog"), out.path().to_path_buf())
                .unwrap();
        site.client_id = Some(ClientId::from(id));
        Self { home, out, site }
    }

    async fn publish(&self, store: &MemoryObjectStore, options: PublishOptions) -> PublishReport {
        let mut publisher = ObjectStorePublisher::new(store.clone(), &self.site.settings);
        publish_target(
            self.home.path(),
            &self.site,
            &TargetName::from("prod"),
            &mut publisher,
            options,
            &NoProgress,
        )
        .await
        .unwrap()
    }
}

fn write(root: &Path, path: &str, body: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, body).unwrap();
}

const SITE: [(&str, &str); 5] = [
    ("index.html", "home"),
    ("about.html", "about"),
    ("posts/a.html", "a"),
    ("posts/b.html", "b"),
    ("css/site.css", "body{}"),
];

#[tokio::test]
async fn second_client_diffs_against_the_remote_record_only() {
    let store = MemoryObjectStore::default();
    let phone = Client::new("phone", &SITE);
    let report = phone.publish(&store, PublishOptions::default()).await;
    assert_eq!(report.result.unwrap().uploaded, 5);

    // The server regenerates independently: one edit, one removal, one new post.
    let server = Client::new("server", &SITE);
    write(server.out.path(), "posts/a.html", "a, revised");
    fs::remove_file(server.out.path().join("posts/b.html")).unwrap();
    write(server.out.path(), "posts/c.html", "c");
    assert!(hash_store::load_at(server.home.path(), &server.site.name, &TargetName::from("prod"))
        .unwrap()
        .is_none());
    store.reset_calls();

    let report = server.publish(&store, PublishOptions::default()).await;

    assert_eq!(report.changes.modified, vec!["posts/a.html", "posts/c.html"]);
    assert_eq!(report.changes.deleted, vec!["posts/b.html"]);
    assert!(matches!(
        report.previous_source,
        BaselineSource::RemoteRecord { ref published_by, .. } if published_by == &ClientId::from("phone")
    ));
    let result = report.result.unwrap();
    assert_eq!((result.uploaded, result.deleted), (2, 1));
    assert_eq!(store.calls().lists, 0);
}

#[tokio::test]
async fn stale_client_sees_the_other_clients_publish() {
    let store = MemoryObjectStore::default();
    let phone = Client::new("phone", &SITE);
    phone.publish(&store, PublishOptions::default()).await;

    let server = Client::new("server", &SITE);
    write(server.out.path(), "index.html", "home, redesigned");
    server.publish(&store, PublishOptions::default()).await;

    // The phone still has the old index.html; the remote record says it
    // changed, so a phone publish would bring the old version back.
    let report = phone
        .publish(
            &store,
            PublishOptions {
                dry_run: true,
                ..PublishOptions::default()
            },
        )
        .await;
    assert_eq!(report.changes.modified, vec!["index.html"]);
    assert!(report.changes.deleted.is_empty());
    assert!(matches!(
        report.previous_source,
        BaselineSource::RemoteRecord { ref published_by, .. } if published_by == &ClientId::from("server")
    ));
}
