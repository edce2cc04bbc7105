//! Session registry and per-session ingestion state machine.
//!
//! Each session is an independently lockable unit: the store's map lock is only taken to look
//! up, insert or remove an entry, and a session's own lock is only taken to read or swap its
//! state. No lock is held while embedding or generating.
//!
//! State machine:
//!
//! ```text
//! empty ──ingest──▶ ingesting ──ok──▶ ready
//!                      │   ▲            │
//!                      │   └──ingest────┤
//!                      └──error──▶ failed ──ingest──▶ ingesting
//! ```
//!
//! Every ingestion takes a new epoch. Only the ingestion holding the current epoch may resolve
//! the session, so a slow build that was overtaken by a newer upload is discarded.

use crate::index::VectorIndex;
use crate::processing::PipelineError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const MAX_SESSION_ID_LEN: usize = 128;

/// Lifecycle state of a session, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created but never ingested.
    Empty,
    /// An ingestion is building the index.
    Ingesting,
    /// The index is complete and queryable.
    Ready,
    /// The last ingestion failed.
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Empty => "empty",
            Self::Ingesting => "ingesting",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
enum SessionState {
    Empty,
    Ingesting { epoch: u64 },
    Ready { index: Arc<VectorIndex> },
    Failed { reason: String },
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        match self {
            Self::Empty => SessionStatus::Empty,
            Self::Ingesting { .. } => SessionStatus::Ingesting,
            Self::Ready { .. } => SessionStatus::Ready,
            Self::Failed { .. } => SessionStatus::Failed,
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    document_id: Option<String>,
    updated_at: OffsetDateTime,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: String,
    /// Document most recently submitted to the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Current lifecycle state.
    pub state: SessionStatus,
    /// Indexed chunk count when ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    /// Failure reason when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Last state change, RFC 3339.
    pub updated_at: String,
}

/// Isolated ingestion/query context bound to one document.
#[derive(Debug)]
pub struct Session {
    id: String,
    epochs: AtomicU64,
    inner: RwLock<SessionInner>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            epochs: AtomicU64::new(0),
            inner: RwLock::new(SessionInner {
                state: SessionState::Empty,
                document_id: None,
                updated_at: OffsetDateTime::now_utc(),
            }),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SessionStatus {
        self.read().state.status()
    }

    /// Move the session to `ingesting` for a new document.
    ///
    /// The returned guard must be resolved with [`IngestGuard::complete`] or
    /// [`IngestGuard::fail`]; dropping it unresolved marks the session failed.
    pub fn begin_ingest(self: &Arc<Self>, document_id: &str) -> IngestGuard {
        // Allocated under the write lock so the published epoch is always the newest.
        let epoch = {
            let mut inner = self.write();
            let epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;
            inner.state = SessionState::Ingesting { epoch };
            inner.document_id = Some(document_id.to_string());
            inner.updated_at = OffsetDateTime::now_utc();
            epoch
        };
        tracing::debug!(session_id = %self.id, document_id, epoch, "Session ingesting");
        IngestGuard {
            session: Arc::clone(self),
            epoch,
            resolved: false,
        }
    }

    /// Handle to the ready index.
    ///
    /// Fails with `SessionNotReady` while empty or ingesting and with `IngestionFailed` after a
    /// failed ingestion.
    pub fn ready_index(&self) -> Result<Arc<VectorIndex>, PipelineError> {
        let inner = self.read();
        match &inner.state {
            SessionState::Ready { index } => Ok(Arc::clone(index)),
            SessionState::Failed { reason } => Err(PipelineError::IngestionFailed {
                session_id: self.id.clone(),
                reason: reason.clone(),
            }),
            state => Err(PipelineError::SessionNotReady {
                session_id: self.id.clone(),
                state: state.status(),
            }),
        }
    }

    /// Point-in-time view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.read();
        let (chunk_count, error) = match &inner.state {
            SessionState::Ready { index } => (Some(index.len()), None),
            SessionState::Failed { reason } => (None, Some(reason.clone())),
            _ => (None, None),
        };
        SessionSnapshot {
            session_id: self.id.clone(),
            document_id: inner.document_id.clone(),
            state: inner.state.status(),
            chunk_count,
            error,
            updated_at: inner
                .updated_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string()),
        }
    }

    fn resolve(&self, epoch: u64, next: SessionState) -> bool {
        let mut inner = self.write();
        let current = matches!(
            inner.state,
            SessionState::Ingesting { epoch: active } if active == epoch
        );
        if current {
            inner.state = next;
            inner.updated_at = OffsetDateTime::now_utc();
        }
        current
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to resolve one ingestion of a session.
#[derive(Debug)]
pub struct IngestGuard {
    session: Arc<Session>,
    epoch: u64,
    resolved: bool,
}

impl IngestGuard {
    /// Epoch of this ingestion.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Publish the finished index and mark the session ready.
    ///
    /// Fails with `IngestionFailed` when a newer ingestion started in the meantime; the index is
    /// discarded in that case.
    pub fn complete(mut self, index: VectorIndex) -> Result<(), PipelineError> {
        self.resolved = true;
        let chunks = index.len();
        let next = SessionState::Ready {
            index: Arc::new(index),
        };
        if self.session.resolve(self.epoch, next) {
            tracing::debug!(session_id = %self.session.id, epoch = self.epoch, chunks, "Session ready");
            Ok(())
        } else {
            tracing::warn!(
                session_id = %self.session.id,
                epoch = self.epoch,
                "Discarding index superseded by a newer ingestion"
            );
            Err(PipelineError::IngestionFailed {
                session_id: self.session.id.clone(),
                reason: "superseded by a newer ingestion".to_string(),
            })
        }
    }

    /// Mark the session failed with `reason`.
    pub fn fail(mut self, reason: impl Into<String>) {
        self.resolved = true;
        self.mark_failed(reason.into());
    }

    fn mark_failed(&self, reason: String) {
        let next = SessionState::Failed { reason };
        if self.session.resolve(self.epoch, next) {
            tracing::debug!(session_id = %self.session.id, epoch = self.epoch, "Session failed");
        }
    }
}

impl Drop for IngestGuard {
    fn drop(&mut self) {
        if !self.resolved {
            self.mark_failed("ingestion aborted before completion".to_string());
        }
    }
}

/// Registry mapping session identifiers to sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a session.
    pub fn get(&self, session_id: &str) -> Result<Arc<Session>, PipelineError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
            .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))
    }

    /// Look up a session, registering an empty one when absent.
    pub fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        if let Ok(session) = self.get(session_id) {
            return session;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Session::new(session_id.to_string()))),
        )
    }

    /// Drop a session and its index.
    ///
    /// Ingestions already running against the session finish into the detached session and are
    /// never visible again.
    pub fn remove(&self, session_id: &str) -> Result<(), PipelineError> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))
    }

    /// Snapshots of every session ordered by identifier.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let mut snapshots: Vec<_> = sessions.iter().map(|session| session.snapshot()).collect();
        snapshots.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        snapshots
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Check that a session identifier is 1–128 characters of `[A-Za-z0-9_.-]`.
pub fn validate_session_id(session_id: &str) -> Result<(), PipelineError> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidParameter(format!(
            "session id must be 1-{MAX_SESSION_ID_LEN} characters of [A-Za-z0-9_.-], got '{session_id}'"
        )))
    }
}
