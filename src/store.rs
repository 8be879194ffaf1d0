//! Durable session store
//!
//! All sessions live in one JSON document keyed by stringified user id. Reads
//! are served from memory; every mutation rewrites the whole document before
//! returning.

use crate::state_machine::{Session, SessionData, SessionPatch, Step};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Session store at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize sessions: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Session store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One session as it appears on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSession {
    /// `null` until the first step is stored
    #[serde(default)]
    state: Option<Step>,
    #[serde(default)]
    data: SessionData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

struct StoreInner {
    path: PathBuf,
    sessions: BTreeMap<String, StoredSession>,
}

impl StoreInner {
    /// Rewrite the whole document: write a sibling temp file, sync, rename over
    fn flush(&self) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&self.sessions)?;
        let tmp_path = tmp_path(&self.path);

        let io_err = |source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        };
        let mut file = File::create(&tmp_path).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Thread-safe handle to the session store
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl SessionStore {
    /// Load the snapshot at `path`. A missing file is an empty store; an
    /// unreadable or malformed one is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut sessions: BTreeMap<String, StoredSession> = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        // Sessions written before timestamps existed start their idle clock now
        let now = Utc::now();
        for session in sessions.values_mut() {
            session.updated_at.get_or_insert(now);
        }

        tracing::info!(path = %path.display(), sessions = sessions.len(), "Loaded session store");

        Ok(Self {
            inner: Arc::new(Mutex::new(StoreInner { path, sessions })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current step and data; unknown users get the default session
    pub fn get(&self, user_id: u64) -> Session {
        let inner = self.lock();
        match inner.sessions.get(&user_id.to_string()) {
            Some(stored) => Session {
                step: stored.state.unwrap_or_default(),
                data: stored.data.clone(),
            },
            None => Session::default(),
        }
    }

    pub fn set_step(&self, user_id: u64, step: Step) -> StoreResult<()> {
        self.mutate(user_id, |session| session.state = Some(step))
    }

    /// Shallow-merge `patch` into the stored data and return the result
    pub fn set_data(&self, user_id: u64, patch: SessionPatch) -> StoreResult<SessionData> {
        self.mutate(user_id, |session| {
            session.data.merge(patch);
            session.data.clone()
        })
    }

    /// Clear all data and store `step`, in one write
    pub fn reset(&self, user_id: u64, step: Step) -> StoreResult<()> {
        self.mutate(user_id, |session| {
            session.data = SessionData::default();
            session.state = Some(step);
        })
    }

    /// Apply `f` to the user's session and flush. On a failed flush the
    /// in-memory session is restored so memory never runs ahead of disk.
    fn mutate<R>(&self, user_id: u64, f: impl FnOnce(&mut StoredSession) -> R) -> StoreResult<R> {
        let mut inner = self.lock();
        let key = user_id.to_string();
        let previous = inner.sessions.get(&key).cloned();

        let session = inner.sessions.entry(key.clone()).or_default();
        let out = f(session);
        session.updated_at = Some(Utc::now());

        if let Err(e) = inner.flush() {
            match previous {
                Some(previous) => {
                    inner.sessions.insert(key, previous);
                }
                None => {
                    inner.sessions.remove(&key);
                }
            }
            return Err(e);
        }
        Ok(out)
    }

    /// Drop sessions untouched for longer than `ttl`, with a single rewrite.
    /// Returns how many were removed.
    pub fn evict_idle(&self, ttl: Duration, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut inner = self.lock();
        let cutoff = now - ttl;
        let before = inner.sessions.clone();

        inner
            .sessions
            .retain(|_, session| session.updated_at.is_none_or(|at| at >= cutoff));
        let removed = before.len() - inner.sessions.len();
        if removed == 0 {
            return Ok(0);
        }

        if let Err(e) = inner.flush() {
            inner.sessions = before;
            return Err(e);
        }
        Ok(removed)
    }

    /// Final flush on shutdown
    pub fn close(&self) -> StoreResult<()> {
        let inner = self.lock();
        inner.flush()?;
        tracing::info!(sessions = inner.sessions.len(), "Session store closed");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Keep the store locked until the returned guard is dropped
    #[cfg(test)]
    pub fn hold_lock(&self) -> impl Sized + '_ {
        self.lock()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
