//! Persistence for `AppData`
//!
//! The local JSON file is the source of truth and is written on every save.
//! An optional remote copy (a GitHub gist, driven through the `gh` CLI) is
//! pushed at most once per flush interval unless a flush is forced. The
//! push can be handed off to another thread with [`Store::save_deferred`].

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::model::AppData;

/// Error type for persistence
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Remote { message: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Parse(e) => write!(f, "Failed to parse goals file: {}", e),
            StoreError::Remote { message } => write!(f, "Remote sync failed: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Parse(e)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

// =============================================================================
// Remote
// =============================================================================

/// A single remote document holding the serialized `AppData`
pub trait RemoteStore: Send + Sync {
    /// Current remote contents, or `None` when the document is empty
    fn pull(&self) -> Result<Option<String>>;
    fn push(&self, contents: &str) -> Result<()>;
}

/// Gist-backed remote using `gh api`, so authentication is whatever `gh` has
pub struct GistRemote {
    gist_id: String,
    filename: String,
}

impl GistRemote {
    pub fn new(gist_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            gist_id: gist_id.into(),
            filename: filename.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("/gists/{}", self.gist_id)
    }

    /// Request body for updating our one file
    fn patch_body(&self, contents: &str) -> String {
        serde_json::json!({
            "files": { &self.filename: { "content": contents } }
        })
        .to_string()
    }

    /// Pull our file's contents out of a `GET /gists/{id}` response
    fn file_contents(&self, response: &str) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct GistFile {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct GistResponse {
            #[serde(default)]
            files: std::collections::HashMap<String, GistFile>,
        }

        let resp: GistResponse = serde_json::from_str(response).map_err(|e| StoreError::Remote {
            message: format!("unexpected gist response: {}", e),
        })?;
        Ok(resp
            .files
            .get(&self.filename)
            .and_then(|f| f.content.clone())
            .filter(|c| !c.trim().is_empty()))
    }
}

impl RemoteStore for GistRemote {
    fn pull(&self) -> Result<Option<String>> {
        let output = Command::new("gh").args(["api", &self.endpoint()]).output()?;
        if !output.status.success() {
            return Err(StoreError::Remote {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        self.file_contents(&String::from_utf8_lossy(&output.stdout))
    }

    fn push(&self, contents: &str) -> Result<()> {
        let mut child = Command::new("gh")
            .args(["api", "--method", "PATCH", &self.endpoint(), "--input", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(self.patch_body(contents).as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(StoreError::Remote {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// No remote configured, or the flush interval has not elapsed
    Skipped,
    Flushed,
    /// The local write stood; only the remote copy is behind
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub remote: RemoteOutcome,
}

const PULL_FAILED: &str = "remote copy could not be read at startup; not overwriting it";

/// A remote push taken off the saving thread. Hand the outcome back
/// through [`Store::finish_push`].
pub struct PendingPush {
    remote: Arc<dyn RemoteStore>,
    contents: String,
}

impl PendingPush {
    pub fn run(self) -> RemoteOutcome {
        match self.remote.push(&self.contents) {
            Ok(()) => {
                tracing::info!("flushed to remote");
                RemoteOutcome::Flushed
            }
            Err(e) => {
                tracing::warn!("remote flush failed: {}", e);
                RemoteOutcome::Failed(e.to_string())
            }
        }
    }
}

pub struct Store {
    path: PathBuf,
    remote: Option<Arc<dyn RemoteStore>>,
    flush_interval: Duration,
    /// Start of the last push, successful or not
    last_attempt: Option<Instant>,
    push_in_flight: bool,
    /// `load` fell back past an unreadable remote; pushing could clobber it
    pull_failed: bool,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>, remote: Option<Box<dyn RemoteStore>>, flush_interval: Duration) -> Self {
        Self {
            path: path.into(),
            remote: remote.map(Arc::from),
            flush_interval,
            last_attempt: None,
            push_in_flight: false,
            pull_failed: false,
        }
    }

    /// Store configured from `config.toml` and the data path discovery rules
    pub fn from_config(config: &crate::config::Config) -> Self {
        let remote = config.sync.gist_id.as_ref().map(|id| {
            Box::new(GistRemote::new(id.clone(), config.sync.filename.clone())) as Box<dyn RemoteStore>
        });
        Self::open(crate::config::data_path(), remote, config.sync.flush_interval())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Local file if present, else the remote copy, else an empty forest
    pub fn load(&mut self) -> Result<AppData> {
        if self.path.exists() {
            let contents = fs::read_to_string(&self.path)?;
            return Ok(serde_json::from_str(&contents)?);
        }
        if let Some(remote) = &self.remote {
            match remote.pull() {
                Ok(Some(contents)) => {
                    self.pull_failed = false;
                    tracing::info!(path = %self.path.display(), "seeding local data from remote");
                    return Ok(serde_json::from_str(&contents)?);
                }
                Ok(None) => self.pull_failed = false,
                Err(e) => {
                    self.pull_failed = true;
                    tracing::warn!("remote pull failed: {}", e);
                }
            }
        }
        Ok(AppData::default())
    }

    /// Write the local file only
    pub fn save_local(&self, data: &AppData) -> Result<()> {
        self.write_local(data).map(|_| ())
    }

    fn write_local(&self, data: &AppData) -> Result<String> {
        let contents = serde_json::to_string_pretty(data)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, &contents)?;
        tracing::debug!(path = %self.path.display(), goals = data.goals.len(), "saved");
        Ok(contents)
    }

    pub fn save(&mut self, data: &AppData, force_remote_flush: bool) -> Result<SaveReport> {
        self.save_at(data, force_remote_flush, Instant::now())
    }

    /// Write locally, then push remotely when due, waiting for the push.
    /// Only the local write can fail.
    pub fn save_at(&mut self, data: &AppData, force_remote_flush: bool, now: Instant) -> Result<SaveReport> {
        let remote = match self.save_deferred(data, force_remote_flush, now)? {
            Some(push) => {
                let outcome = push.run();
                self.finish_push(&outcome);
                outcome
            }
            None if force_remote_flush && self.pull_failed => RemoteOutcome::Failed(PULL_FAILED.to_string()),
            None => RemoteOutcome::Skipped,
        };
        Ok(SaveReport { remote })
    }

    /// Write locally now and return the remote push when one is due, for
    /// the caller to run wherever it likes. Unforced pushes wait for the
    /// flush interval since the last attempt and for any push in flight.
    pub fn save_deferred(&mut self, data: &AppData, force_remote_flush: bool, now: Instant) -> Result<Option<PendingPush>> {
        let contents = self.write_local(data)?;

        let Some(remote) = &self.remote else {
            return Ok(None);
        };
        if self.pull_failed {
            tracing::warn!("{}", PULL_FAILED);
            return Ok(None);
        }
        let due = match self.last_attempt {
            _ if force_remote_flush => true,
            _ if self.push_in_flight => false,
            Some(at) => now.duration_since(at) >= self.flush_interval,
            None => true,
        };
        if !due {
            return Ok(None);
        }

        self.last_attempt = Some(now);
        self.push_in_flight = true;
        Ok(Some(PendingPush {
            remote: Arc::clone(remote),
            contents,
        }))
    }

    /// Record the end of a push started by [`Store::save_deferred`]
    pub fn finish_push(&mut self, outcome: &RemoteOutcome) {
        self.push_in_flight = false;
        tracing::debug!(?outcome, "remote push finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Goal, Node};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct FakeRemote {
        pushes: Arc<Mutex<Vec<String>>>,
        stored: Option<String>,
        fail: bool,
        fail_pull: bool,
    }

    impl RemoteStore for FakeRemote {
        fn pull(&self) -> Result<Option<String>> {
            if self.fail_pull {
                return Err(StoreError::Remote {
                    message: "offline".into(),
                });
            }
            Ok(self.stored.clone())
        }

        fn push(&self, contents: &str) -> Result<()> {
            if self.fail {
                return Err(StoreError::Remote {
                    message: "offline".into(),
                });
            }
            self.pushes.lock().unwrap().push(contents.to_string());
            Ok(())
        }
    }

    fn sample() -> AppData {
        let mut data = AppData::default();
        data.goals.push(Goal {
            root: Node::new_task("Run a marathon", ""),
            created_at: "2025-01-01T00:00:00+00:00".into(),
            week: None,
            duration: None,
            tags: vec![],
        });
        data
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(dir.path().join("goals.json"), None, Duration::from_secs(300));
        let data = store.load().unwrap();
        assert!(data.goals.is_empty());
        assert_eq!(data.tags.len(), 4);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("goals.json");
        let mut store = Store::open(&path, None, Duration::from_secs(300));
        let report = store.save(&sample(), false).unwrap();
        assert_eq!(report.remote, RemoteOutcome::Skipped);
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("goals.json");
        fs::write(&path, "{ not json").unwrap();
        let mut store = Store::open(&path, None, Duration::from_secs(300));
        assert!(matches!(store.load(), Err(StoreError::Parse(_))));
    }

    #[test]
    fn test_remote_flush_is_time_boxed() {
        let dir = TempDir::new().unwrap();
        let remote = FakeRemote::default();
        let pushes = remote.pushes.clone();
        let mut store = Store::open(
            dir.path().join("goals.json"),
            Some(Box::new(remote)),
            Duration::from_secs(300),
        );
        let t0 = Instant::now();
        let data = sample();

        assert_eq!(store.save_at(&data, false, t0).unwrap().remote, RemoteOutcome::Flushed);
        assert_eq!(
            store.save_at(&data, false, t0 + Duration::from_secs(10)).unwrap().remote,
            RemoteOutcome::Skipped
        );
        assert_eq!(
            store.save_at(&data, true, t0 + Duration::from_secs(20)).unwrap().remote,
            RemoteOutcome::Flushed
        );
        assert_eq!(
            store.save_at(&data, false, t0 + Duration::from_secs(320)).unwrap().remote,
            RemoteOutcome::Flushed
        );
        assert_eq!(pushes.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_remote_failure_keeps_local_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("goals.json");
        let remote = FakeRemote {
            fail: true,
            ..Default::default()
        };
        let mut store = Store::open(&path, Some(Box::new(remote)), Duration::from_secs(300));
        let report = store.save(&sample(), true).unwrap();
        assert!(matches!(report.remote, RemoteOutcome::Failed(_)));
        assert_eq!(store.load().unwrap(), sample());

        // a failed push waits out the interval like a successful one
        let again = store.save(&sample(), false).unwrap();
        assert_eq!(again.remote, RemoteOutcome::Skipped);
    }

    #[test]
    fn test_deferred_push_runs_off_the_saving_call() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("goals.json");
        let remote = FakeRemote::default();
        let pushes = remote.pushes.clone();
        let mut store = Store::open(&path, Some(Box::new(remote)), Duration::from_secs(300));
        let t0 = Instant::now();

        let push = store.save_deferred(&sample(), false, t0).unwrap().unwrap();
        assert!(path.exists());
        assert!(pushes.lock().unwrap().is_empty());

        // nothing else is scheduled while that push is out
        let later = t0 + Duration::from_secs(400);
        assert!(store.save_deferred(&sample(), false, later).unwrap().is_none());

        let outcome = std::thread::spawn(move || push.run()).join().unwrap();
        assert_eq!(outcome, RemoteOutcome::Flushed);
        store.finish_push(&outcome);
        assert_eq!(pushes.lock().unwrap().len(), 1);
        assert!(store.save_deferred(&sample(), false, later).unwrap().is_some());
    }

    #[test]
    fn test_save_local_never_pushes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("goals.json");
        let remote = FakeRemote::default();
        let pushes = remote.pushes.clone();
        let store = Store::open(&path, Some(Box::new(remote)), Duration::from_secs(300));
        store.save_local(&sample()).unwrap();
        assert!(path.exists());
        assert!(pushes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_pull_blocks_pushes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("goals.json");
        let remote = FakeRemote {
            fail_pull: true,
            ..Default::default()
        };
        let pushes = remote.pushes.clone();
        let mut store = Store::open(&path, Some(Box::new(remote)), Duration::from_secs(300));

        let data = store.load().unwrap();
        assert!(data.goals.is_empty());

        let forced = store.save(&data, true).unwrap();
        assert!(matches!(forced.remote, RemoteOutcome::Failed(_)));
        assert_eq!(store.save(&data, false).unwrap().remote, RemoteOutcome::Skipped);
        assert!(pushes.lock().unwrap().is_empty());
        // the local file is still written
        assert_eq!(store.load().unwrap(), data);
    }

    #[test]
    fn test_load_seeds_from_remote() {
        let dir = TempDir::new().unwrap();
        let remote = FakeRemote {
            stored: Some(serde_json::to_string(&sample()).unwrap()),
            ..Default::default()
        };
        let mut store = Store::open(dir.path().join("goals.json"), Some(Box::new(remote)), Duration::from_secs(300));
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_gist_file_contents() {
        let gist = GistRemote::new("abc", "goals.json");
        let resp = r#"{"id":"abc","files":{"goals.json":{"content":"{\"goals\":[]}"},"other.md":{"content":"x"}}}"#;
        assert_eq!(gist.file_contents(resp).unwrap().as_deref(), Some("{\"goals\":[]}"));

        let empty = r#"{"files":{"goals.json":{"content":"  "}}}"#;
        assert_eq!(gist.file_contents(empty).unwrap(), None);
        assert!(gist.file_contents("nope").is_err());
    }

    #[test]
    fn test_gist_patch_body() {
        let gist = GistRemote::new("abc", "goals.json");
        let body: serde_json::Value = serde_json::from_str(&gist.patch_body("{}")).unwrap();
        assert_eq!(body["files"]["goals.json"]["content"], "{}");
        assert_eq!(gist.endpoint(), "/gists/abc");
    }
}
