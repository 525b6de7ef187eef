//! In-memory transports for tests.
//!
//! Every fake is a cheap handle over shared state, so a test can keep one
//! clone for assertions while the publisher owns another, and two publishers
//! can share the same "remote" to simulate separate clients.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use postalgic_core::{hash_file, GitConfig};
use walkdir::WalkDir;

use crate::error::{io_err, Operation, PublishError};
use crate::git::GitBackend;
use crate::headers::ObjectHeaders;
use crate::object_store::{EdgeCache, ObjectStore};
use crate::sftp::SftpTransport;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

/// Requests seen by a [`MemoryObjectStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStoreCalls {
    pub access_checks: usize,
    pub gets: usize,
    /// Keys in the order their uploads completed.
    pub puts: Vec<String>,
    /// Size of each bulk-delete request.
    pub delete_batches: Vec<usize>,
    pub lists: usize,
}

#[derive(Debug, Default)]
struct Bucket {
    objects: BTreeMap<String, StoredObject>,
    calls: ObjectStoreCalls,
    unreachable: bool,
    failing_put: Option<String>,
    failing_delete_batch: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    bucket: Arc<Mutex<Bucket>>,
}

impl MemoryObjectStore {
    /// Place an object without recording a call.
    pub fn seed(&self, key: &str, body: &[u8]) {
        lock(&self.bucket).objects.insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                content_type: "application/octet-stream".into(),
                cache_control: String::new(),
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        lock(&self.bucket).objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.bucket).objects.keys().cloned().collect()
    }

    pub fn calls(&self) -> ObjectStoreCalls {
        lock(&self.bucket).calls.clone()
    }

    pub fn reset_calls(&self) {
        lock(&self.bucket).calls = ObjectStoreCalls::default();
    }

    /// Reject access checks as if the bucket were unreachable.
    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.bucket).unreachable = unreachable;
    }

    /// Fail every upload of `key`.
    pub fn fail_put(&self, key: &str) {
        lock(&self.bucket).failing_put = Some(key.to_string());
    }

    /// Fail the `index`-th (0-based) delete batch from now on.
    pub fn fail_delete_batch(&self, index: usize) {
        lock(&self.bucket).failing_delete_batch = Some(index);
    }

    pub fn clear_failures(&self) {
        let mut bucket = lock(&self.bucket);
        bucket.unreachable = false;
        bucket.failing_put = None;
        bucket.failing_delete_batch = None;
    }
}

impl ObjectStore for MemoryObjectStore {
    fn location(&self) -> String {
        "memory://bucket".to_string()
    }

    async fn check_access(&self) -> Result<(), PublishError> {
        let mut bucket = lock(&self.bucket);
        bucket.calls.access_checks += 1;
        if bucket.unreachable {
            return Err(PublishError::Connection {
                target: self.location(),
                message: "bucket unreachable".into(),
            });
        }
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, PublishError> {
        let mut bucket = lock(&self.bucket);
        bucket.calls.gets += 1;
        Ok(bucket.objects.get(key).map(|o| o.body.clone()))
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<(), PublishError> {
        let mut bucket = lock(&self.bucket);
        if bucket.failing_put.as_deref() == Some(key) {
            return Err(PublishError::transfer(Operation::Upload, key, "injected failure"));
        }
        bucket.calls.puts.push(key.to_string());
        bucket.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: headers.content_type.to_string(),
                cache_control: headers.cache_control.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), PublishError> {
        let mut bucket = lock(&self.bucket);
        if bucket.failing_delete_batch == Some(bucket.calls.delete_batches.len()) {
            let first = keys.first().map(String::as_str).unwrap_or_default();
            return Err(PublishError::transfer(Operation::Delete, first, "injected failure"));
        }
        bucket.calls.delete_batches.push(keys.len());
        for key in keys {
            bucket.objects.remove(key);
        }
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, PublishError> {
        let mut bucket = lock(&self.bucket);
        bucket.calls.lists += 1;
        Ok(bucket.objects.keys().cloned().collect())
    }
}

#[derive(Debug, Default)]
struct Distribution {
    requests: Vec<Vec<String>>,
    failing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEdgeCache {
    distribution: Arc<Mutex<Distribution>>,
}

impl MemoryEdgeCache {
    /// Path lists of every accepted invalidation request, in order.
    pub fn requests(&self) -> Vec<Vec<String>> {
        lock(&self.distribution).requests.clone()
    }

    /// Reject invalidation requests while `failing` is set.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.distribution).failing = failing;
    }
}

impl EdgeCache for MemoryEdgeCache {
    async fn invalidate(&self, paths: &[String]) -> Result<(), PublishError> {
        let mut distribution = lock(&self.distribution);
        if distribution.failing {
            let first = paths.first().map(String::as_str).unwrap_or("/");
            return Err(PublishError::transfer(Operation::Invalidate, first, "injected failure"));
        }
        distribution.requests.push(paths.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SFTP
// ---------------------------------------------------------------------------

/// Requests seen by a [`MemorySftp`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SftpCalls {
    pub connects: usize,
    pub dir_checks: usize,
    pub mkdirs: Vec<String>,
    pub writes: Vec<String>,
    pub removes: Vec<String>,
}

#[derive(Debug, Default)]
struct SftpServer {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    calls: SftpCalls,
    failing_mkdir: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySftp {
    server: Arc<Mutex<SftpServer>>,
}

impl MemorySftp {
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.server).files.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        lock(&self.server).files.keys().cloned().collect()
    }

    pub fn calls(&self) -> SftpCalls {
        lock(&self.server).calls.clone()
    }

    pub fn fail_mkdir(&self, path: &str) {
        lock(&self.server).failing_mkdir = Some(path.to_string());
    }
}

impl SftpTransport for MemorySftp {
    fn describe(&self) -> String {
        "memory-sftp".to_string()
    }

    fn connect(&mut self) -> Result<(), PublishError> {
        lock(&self.server).calls.connects += 1;
        Ok(())
    }

    fn is_dir(&mut self, path: &str) -> Result<bool, PublishError> {
        let mut server = lock(&self.server);
        server.calls.dir_checks += 1;
        Ok(server.dirs.contains(path))
    }

    fn mkdir(&mut self, path: &str) -> Result<(), PublishError> {
        let mut server = lock(&self.server);
        if server.failing_mkdir.as_deref() == Some(path) {
            return Err(PublishError::transfer(Operation::CreateDir, path, "permission denied"));
        }
        server.calls.mkdirs.push(path.to_string());
        server.dirs.insert(path.to_string());
        Ok(())
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), PublishError> {
        let mut server = lock(&self.server);
        server.calls.writes.push(path.to_string());
        server.files.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn read_file(&mut self, path: &str) -> Result<Option<Vec<u8>>, PublishError> {
        Ok(lock(&self.server).files.get(path).cloned())
    }

    fn remove_file(&mut self, path: &str) -> Result<(), PublishError> {
        let mut server = lock(&self.server);
        server.calls.removes.push(path.to_string());
        server.files.remove(path);
        Ok(())
    }

    fn list_files(&mut self, root: &str) -> Result<Vec<String>, PublishError> {
        let prefix = format!("{}/", root.trim_end_matches('/'));
        Ok(lock(&self.server)
            .files
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

/// Operations seen by a [`RecordingGit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitCalls {
    pub checkouts: usize,
    /// Messages of the commits actually created.
    pub commits: Vec<String>,
    /// `commit_all` calls that found nothing to commit.
    pub empty_commits: usize,
    pub pushes: usize,
}

#[derive(Debug, Default)]
struct GitState {
    committed: BTreeMap<String, String>,
    calls: GitCalls,
    rejecting_push: bool,
}

/// A [`GitBackend`] without a remote: "committed" is a snapshot of the
/// worktree contents, compared on each commit to detect changes.
#[derive(Debug, Clone, Default)]
pub struct RecordingGit {
    state: Arc<Mutex<GitState>>,
}

impl RecordingGit {
    pub fn calls(&self) -> GitCalls {
        lock(&self.state).calls.clone()
    }

    /// Reject pushes while `rejecting` is set.
    pub fn reject_push(&self, rejecting: bool) {
        lock(&self.state).rejecting_push = rejecting;
    }

    /// Paths in the last commit.
    pub fn committed_paths(&self) -> Vec<String> {
        lock(&self.state).committed.keys().cloned().collect()
    }
}

/// Every file in `workdir` except `.git`, with content hashes.
fn snapshot(workdir: &Path) -> Result<BTreeMap<String, String>, PublishError> {
    let mut files = BTreeMap::new();
    let walker = WalkDir::new(workdir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(workdir).to_path_buf();
            io_err(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(workdir)
            .map_err(|e| io_err(entry.path(), std::io::Error::other(e.to_string())))?;
        let key: Vec<_> = rel.iter().map(|c| c.to_string_lossy()).collect();
        files.insert(key.join("/"), hash_file(entry.path())?);
    }
    Ok(files)
}

impl GitBackend for RecordingGit {
    async fn checkout(&mut self, _workdir: &Path, _config: &GitConfig) -> Result<(), PublishError> {
        lock(&self.state).calls.checkouts += 1;
        Ok(())
    }

    async fn commit_all(
        &mut self,
        workdir: &Path,
        _config: &GitConfig,
        message: &str,
    ) -> Result<bool, PublishError> {
        let current = snapshot(workdir)?;
        let mut state = lock(&self.state);
        if current == state.committed {
            state.calls.empty_commits += 1;
            return Ok(false);
        }
        state.committed = current;
        state.calls.commits.push(message.to_string());
        Ok(true)
    }

    async fn push(&mut self, _workdir: &Path, config: &GitConfig) -> Result<(), PublishError> {
        let mut state = lock(&self.state);
        if state.rejecting_push {
            return Err(PublishError::transfer(
                Operation::Push,
                &config.branch,
                "remote rejected",
            ));
        }
        state.calls.pushes += 1;
        Ok(())
    }
}
