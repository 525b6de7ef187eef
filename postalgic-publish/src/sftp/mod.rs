//! SFTP document root.
//!
//! Files are written one at a time; parent directories are created lazily
//! and remembered for the rest of the publish so each directory is checked
//! at most once. The session is blocking, so every call runs on tokio's
//! blocking pool.

mod ssh;

pub use ssh::Ssh2Transport;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use postalgic_core::{FileManifest, RemoteHashRecord, CONTROL_FILE_PATH};

use crate::error::{PublishError, PublishFailure};
use crate::phase::PublishPhase;
use crate::progress::{ProgressReporter, StepCounter};
use crate::publisher::{read_site_file, Capabilities, Publisher, TransferPlan, UNKNOWN_HASH};
use crate::result::PublishResult;

/// Blocking file operations on an SFTP session. Paths are absolute remote
/// paths with `/` separators.
pub trait SftpTransport {
    fn describe(&self) -> String;

    fn connect(&mut self) -> Result<(), PublishError>;

    /// `Ok(false)` when the path does not exist.
    fn is_dir(&mut self, path: &str) -> Result<bool, PublishError>;

    fn mkdir(&mut self, path: &str) -> Result<(), PublishError>;

    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), PublishError>;

    /// `Ok(None)` when the file does not exist.
    fn read_file(&mut self, path: &str) -> Result<Option<Vec<u8>>, PublishError>;

    fn remove_file(&mut self, path: &str) -> Result<(), PublishError>;

    /// Every regular file under `root`, relative to it.
    fn list_files(&mut self, root: &str) -> Result<Vec<String>, PublishError>;
}

/// The transport together with the directories known to exist on it. All
/// access goes through the blocking pool.
struct Remote<T> {
    transport: T,
    root: String,
    known_dirs: HashSet<String>,
}

impl<T: SftpTransport> Remote<T> {
    fn new(transport: T, remote_root: &str) -> Self {
        let trimmed = remote_root.trim_end_matches('/');
        Self {
            transport,
            root: if trimmed.is_empty() && remote_root.starts_with('/') {
                "/".to_string()
            } else {
                trimmed.to_string()
            },
            known_dirs: HashSet::new(),
        }
    }

    fn path(&self, key: &str) -> String {
        match self.root.as_str() {
            "" => key.to_string(),
            "/" => format!("/{key}"),
            root => format!("{root}/{key}"),
        }
    }

    /// Create every missing ancestor directory of output `key`.
    fn ensure_parents(&mut self, key: &str) -> Result<(), PublishError> {
        let Some((parent, _)) = key.rsplit_once('/') else {
            return Ok(());
        };
        let mut prefix = String::new();
        for part in parent.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            let dir = self.path(&prefix);
            if self.known_dirs.contains(&dir) {
                continue;
            }
            if !self.transport.is_dir(&dir)? {
                self.transport
                    .mkdir(&dir)
                    .map_err(|e| PublishError::Structural {
                        path: dir.clone(),
                        message: e.to_string(),
                    })?;
                tracing::debug!(dir = %dir, "created remote directory");
            }
            self.known_dirs.insert(dir);
        }
        Ok(())
    }

    fn upload(&mut self, key: &str, contents: &[u8]) -> Result<(), PublishError> {
        self.ensure_parents(key)?;
        let path = self.path(key);
        self.transport.write_file(&path, contents)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SftpPublisher<T> {
    remote: Arc<Mutex<Remote<T>>>,
    description: String,
}

impl<T: SftpTransport + Send + 'static> SftpPublisher<T> {
    pub fn new(transport: T, remote_root: &str) -> Self {
        let remote = Remote::new(transport, remote_root);
        let description = format!("{}:{}", remote.transport.describe(), remote.root);
        Self {
            remote: Arc::new(Mutex::new(remote)),
            description,
        }
    }

    /// Run `op` on the blocking pool with exclusive use of the session.
    async fn blocking<R, F>(&self, op: F) -> Result<R, PublishError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Remote<T>) -> Result<R, PublishError> + Send + 'static,
    {
        let remote = Arc::clone(&self.remote);
        tokio::task::spawn_blocking(move || {
            let mut remote = lock(&remote);
            op(&mut remote)
        })
        .await
        .map_err(|e| PublishError::Connection {
            target: self.description.clone(),
            message: format!("sftp worker stopped: {e}"),
        })?
    }
}

impl<T: SftpTransport + Send + 'static> Publisher for SftpPublisher<T> {
    fn describe(&self) -> String {
        self.description.clone()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            remote_hashes: true,
            remote_listing: true,
            transactional: false,
        }
    }

    async fn connect(&mut self) -> Result<(), PublishError> {
        self.blocking(|remote| remote.transport.connect()).await
    }

    async fn fetch_remote_hashes(&mut self) -> Result<Option<RemoteHashRecord>, PublishError> {
        let bytes = self
            .blocking(|remote| {
                let path = remote.path(CONTROL_FILE_PATH);
                remote.transport.read_file(&path)
            })
            .await?;
        match bytes {
            Some(bytes) => Ok(Some(RemoteHashRecord::from_json_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_remote(&mut self) -> Result<FileManifest, PublishError> {
        let keys = self
            .blocking(|remote| {
                let root = remote.root.clone();
                remote.transport.list_files(&root)
            })
            .await?;
        Ok(keys.into_iter().map(|key| (key, UNKNOWN_HASH)).collect())
    }

    async fn apply(
        &mut self,
        plan: TransferPlan<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<PublishResult, PublishFailure> {
        let changes = plan.changes;
        let mut steps = StepCounter::new(
            progress,
            changes.len() + usize::from(plan.record.is_some()),
        );
        let mut result = PublishResult {
            total: plan.manifest.len(),
            changed: true,
            ..PublishResult::default()
        };
        lock(&self.remote).known_dirs.clear();

        for key in &changes.modified {
            let written = match read_site_file(plan.site_dir, key).await {
                Ok(contents) => {
                    let owned = key.clone();
                    self.blocking(move |remote| remote.upload(&owned, &contents))
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(error) = written {
                let remaining = changes.len() - result.uploaded;
                return Err(PublishFailure::new(
                    PublishPhase::Transferring,
                    result,
                    remaining,
                    error,
                ));
            }
            result.uploaded += 1;
            steps.advance(&format!("uploaded {key}"));
        }

        for key in &changes.deleted {
            let owned = key.clone();
            let removed = self
                .blocking(move |remote| {
                    let path = remote.path(&owned);
                    remote.transport.remove_file(&path)
                })
                .await;
            if let Err(error) = removed {
                let remaining = changes.deleted.len() - result.deleted;
                return Err(PublishFailure::new(
                    PublishPhase::Transferring,
                    result,
                    remaining,
                    error,
                ));
            }
            result.deleted += 1;
            steps.advance(&format!("deleted {key}"));
        }

        if let Some(record) = plan.record {
            let written = match record.to_json_bytes() {
                Ok(bytes) => {
                    self.blocking(move |remote| remote.upload(CONTROL_FILE_PATH, &bytes))
                        .await
                }
                Err(e) => Err(e.into()),
            };
            if let Err(error) = written {
                return Err(PublishFailure::new(PublishPhase::Finalizing, result, 0, error));
            }
            steps.advance("wrote control file");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::thread::{self, ThreadId};

    use super::*;
    use crate::memory::MemorySftp;

    #[test]
    fn remote_paths_join_under_the_root() {
        let remote = Remote::new(MemorySftp::default(), "/var/www/");
        assert_eq!(remote.path("a/b.html"), "/var/www/a/b.html");
        let root = Remote::new(MemorySftp::default(), "/");
        assert_eq!(root.path("index.html"), "/index.html");
    }

    #[test]
    fn parents_are_checked_once_per_publish() {
        let sftp = MemorySftp::default();
        let mut remote = Remote::new(sftp.clone(), "/www");
        remote.ensure_parents("posts/2024/a.html").unwrap();
        remote.ensure_parents("posts/2024/b.html").unwrap();
        remote.ensure_parents("posts/c.html").unwrap();
        remote.ensure_parents("index.html").unwrap();

        let calls = sftp.calls();
        assert_eq!(calls.dir_checks, 2);
        assert_eq!(calls.mkdirs, vec!["/www/posts", "/www/posts/2024"]);
    }

    #[test]
    fn mkdir_failure_is_structural() {
        let sftp = MemorySftp::default();
        sftp.fail_mkdir("/www/locked");
        let mut remote = Remote::new(sftp, "/www");
        let err = remote.ensure_parents("locked/a.html").unwrap_err();
        assert!(matches!(err, PublishError::Structural { ref path, .. } if path == "/www/locked"));
    }

    /// Records the thread of every transport call.
    #[derive(Clone, Default)]
    struct ThreadTracking {
        inner: MemorySftp,
        threads: Arc<Mutex<Vec<ThreadId>>>,
    }

    impl ThreadTracking {
        fn seen(&self) {
            self.threads.lock().unwrap().push(thread::current().id());
        }
    }

    impl SftpTransport for ThreadTracking {
        fn describe(&self) -> String {
            self.inner.describe()
        }
        fn connect(&mut self) -> Result<(), PublishError> {
            self.seen();
            self.inner.connect()
        }
        fn is_dir(&mut self, path: &str) -> Result<bool, PublishError> {
            self.seen();
            self.inner.is_dir(path)
        }
        fn mkdir(&mut self, path: &str) -> Result<(), PublishError> {
            self.seen();
            self.inner.mkdir(path)
        }
        fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), PublishError> {
            self.seen();
            self.inner.write_file(path, contents)
        }
        fn read_file(&mut self, path: &str) -> Result<Option<Vec<u8>>, PublishError> {
            self.seen();
            self.inner.read_file(path)
        }
        fn remove_file(&mut self, path: &str) -> Result<(), PublishError> {
            self.seen();
            self.inner.remove_file(path)
        }
        fn list_files(&mut self, root: &str) -> Result<Vec<String>, PublishError> {
            self.seen();
            self.inner.list_files(root)
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn transport_calls_stay_off_the_runtime_thread() {
        let site = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(site.path().join("posts")).unwrap();
        std::fs::write(site.path().join("posts/a.html"), "a").unwrap();
        let manifest = postalgic_core::hash_site(site.path(), &[]).unwrap();
        let changes = postalgic_core::diff(&FileManifest::new(), &manifest);
        let record = RemoteHashRecord::new(manifest.clone(), postalgic_core::ClientId::from("ci"));

        let transport = ThreadTracking::default();
        let mut publisher = SftpPublisher::new(transport.clone(), "/www");
        publisher.connect().await.unwrap();
        assert!(publisher.fetch_remote_hashes().await.unwrap().is_none());
        let result = publisher
            .apply(
                TransferPlan {
                    site_dir: site.path(),
                    manifest: &manifest,
                    changes: &changes,
                    record: Some(&record),
                },
                &crate::progress::NoProgress,
            )
            .await
            .unwrap();

        assert_eq!(result.uploaded, 1);
        assert!(transport.inner.file("/www/posts/a.html").is_some());
        let runtime_thread = thread::current().id();
        let threads = transport.threads.lock().unwrap();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }
}
