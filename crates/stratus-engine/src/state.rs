//! State management for provisioned resources
//!
//! Manages the `.stratus/state.json` file which holds the record of every
//! resource the CLI has provisioned, keyed by `kind:name`.

use crate::attrs::ResourceRecord;
use crate::backend::ResourceKind;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stratus";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// State key for a resource
pub fn state_key(kind: ResourceKind, name: &str) -> String {
    format!("{}:{}", kind, name)
}

/// All stored records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by kind:name
    pub resources: BTreeMap<String, StoredResource>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the record of a resource
    pub fn set_record(&mut self, kind: ResourceKind, name: &str, record: ResourceRecord) {
        let key = state_key(kind, name);
        let now = Utc::now();
        match self.resources.get_mut(&key) {
            Some(existing) => {
                existing.record = record;
                existing.updated_at = now;
            }
            None => {
                self.resources.insert(
                    key,
                    StoredResource {
                        kind,
                        record,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        self.updated_at = now;
    }

    /// Remove a resource
    pub fn remove(&mut self, kind: ResourceKind, name: &str) -> Option<StoredResource> {
        let result = self.resources.remove(&state_key(kind, name));
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<&StoredResource> {
        self.resources.get(&state_key(kind, name))
    }

    /// Records stored for one backend tag
    pub fn by_backend<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = (&'a String, &'a StoredResource)> {
        self.resources
            .iter()
            .filter(move |(_, r)| r.record.backend_tag() == Some(tag))
    }
}

/// Stored record of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResource {
    pub kind: ResourceKind,

    /// Flat record as produced by the engine
    pub record: ResourceRecord,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(EngineError::State(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    ///
    /// The lock file is created atomically, so of two concurrent callers only
    /// one wins. Locks older than one hour are considered stale and taken
    /// over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();
        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&lock_info)?;

        if !create_lock_file(&lock_path, &content).await? {
            let held = read_lock(&lock_path).await?;
            let age = Utc::now().signed_duration_since(held.acquired_at);
            if age.num_hours() < 1 {
                return Err(EngineError::Lock(format!(
                    "State is locked by {} (pid {}) since {}",
                    held.holder, held.pid, held.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", held.holder);
            match fs::remove_file(&lock_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            if !create_lock_file(&lock_path, &content).await? {
                return Err(EngineError::Lock(
                    "State lock was taken over by another process".to_string(),
                ));
            }
        }

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Create the lock file only if absent; `false` when another holder has it
async fn create_lock_file(path: &Path, content: &str) -> Result<bool> {
    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    Ok(true)
}

/// Read the current holder; a lock still being written counts as fresh
async fn read_lock(path: &Path) -> Result<LockInfo> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&content).unwrap_or_else(|_| LockInfo {
        holder: "another process".to_string(),
        pid: 0,
        acquired_at: Utc::now(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    #[serde(default)]
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, tag: &str) -> ResourceRecord {
        let mut record = ResourceRecord::new();
        record.set("id", id);
        record.set("type", tag);
        record.set("public_ip", true);
        record
    }

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.set_record(ResourceKind::Instance, "web", record("stratus-rg/web", "azure"));
        state.set_record(ResourceKind::Bucket, "assets", record("assets", "aws"));

        manager.save(&state).await.unwrap();
        manager.save(&state).await.unwrap();
        assert!(temp_dir.path().join(".stratus/state.json.backup").exists());

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.resources.len(), 2);
        let web = loaded.get(ResourceKind::Instance, "web").unwrap();
        assert_eq!(web.record, record("stratus-rg/web", "azure"));
        assert_eq!(loaded.by_backend("aws").count(), 1);
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_newer_version_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.version = STATE_VERSION + 1;
        manager.save(&state).await.unwrap();

        assert!(matches!(manager.load().await, Err(EngineError::State(_))));
    }

    #[tokio::test]
    async fn test_set_record_keeps_created_at() {
        let mut state = GlobalState::new();
        state.set_record(ResourceKind::Secret, "token", record("token", "gcp"));
        let created = state.get(ResourceKind::Secret, "token").unwrap().created_at;

        state.set_record(ResourceKind::Secret, "token", record("token-2", "gcp"));
        let stored = state.get(ResourceKind::Secret, "token").unwrap();
        assert_eq!(stored.created_at, created);
        assert_eq!(stored.record.id(), Some("token-2"));

        assert!(state.remove(ResourceKind::Secret, "token").is_some());
        assert!(state.get(ResourceKind::Secret, "token").is_none());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(EngineError::Lock(_))
        ));

        lock.release().await.unwrap();
        let again = manager.acquire_lock().await.unwrap();
        drop(again);
        assert!(!temp_dir.path().join(".stratus/lock.json").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lock_has_one_winner() {
        let temp_dir = tempdir().unwrap();
        let managers: Vec<StateManager> =
            (0..4).map(|_| StateManager::new(temp_dir.path())).collect();

        let (a, b, c, d) = tokio::join!(
            managers[0].acquire_lock(),
            managers[1].acquire_lock(),
            managers[2].acquire_lock(),
            managers[3].acquire_lock(),
        );
        let results = [a, b, c, d];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, EngineError::Lock(_)))
        );
    }

    #[tokio::test]
    async fn test_stale_lock_is_taken_over() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        manager.ensure_state_dir().await.unwrap();

        let stale = LockInfo {
            holder: "build-01".to_string(),
            pid: 42,
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(
            temp_dir.path().join(".stratus/lock.json"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let lock = manager.acquire_lock().await.unwrap();
        let content = std::fs::read_to_string(temp_dir.path().join(".stratus/lock.json")).unwrap();
        let held: LockInfo = serde_json::from_str(&content).unwrap();
        assert_eq!(held.pid, std::process::id());
        lock.release().await.unwrap();
    }
}
