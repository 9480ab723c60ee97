//! Shared set of live sessions.
//!
//! Every session task holds a clone of the same [`Registry`]. Membership is
//! kept in a map keyed by a monotonically increasing [`SessionId`], so
//! iteration always visits sessions in the order they joined. Readers take
//! a snapshot of the handles they need while holding the lock and deliver
//! after releasing it.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::{Mutex, mpsc};

pub type SessionId = u64;

/// Cheap, cloneable reference to one session's outbound queue.
///
/// The queue is unbounded: lines for a peer that stops reading pile up
/// until it disconnects.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    name: Arc<str>,
    outbound: mpsc::UnboundedSender<String>,
}

/// The session's writer has gone away; the line was not queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClosed {
    pub id: SessionId,
}

impl fmt::Display for SessionClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {} is closed", self.id)
    }
}

impl std::error::Error for SessionClosed {}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        name: impl Into<Arc<str>>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            outbound,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues a plaintext line for this session's writer, which encodes it.
    pub fn send(&self, line: impl Into<String>) -> Result<(), SessionClosed> {
        self.outbound
            .send(line.into())
            .map_err(|_| SessionClosed { id: self.id })
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    sessions: Mutex<BTreeMap<SessionId, SessionHandle>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> SessionId {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Adds a session. Display names are not required to be unique.
    pub async fn register(&self, handle: SessionHandle) {
        let mut sessions = self.inner.sessions.lock().await;
        sessions.insert(handle.id(), handle);
    }

    pub async fn unregister(&self, id: SessionId) -> Option<SessionHandle> {
        let mut sessions = self.inner.sessions.lock().await;
        sessions.remove(&id)
    }

    /// Every registered session except `exclude`, in join order.
    pub async fn snapshot_except(&self, exclude: SessionId) -> Vec<SessionHandle> {
        let sessions = self.inner.sessions.lock().await;
        sessions
            .values()
            .filter(|session| session.id() != exclude)
            .cloned()
            .collect()
    }

    /// First session in join order whose name equals `name`.
    ///
    /// Names may repeat; later sessions sharing a name are unreachable by
    /// lookup while the earlier one stays registered.
    pub async fn find_by_name(&self, name: &str) -> Option<SessionHandle> {
        let sessions = self.inner.sessions.lock().await;
        sessions
            .values()
            .find(|session| session.name() == name)
            .cloned()
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.inner.sessions.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn names(&self) -> Vec<String> {
        let sessions = self.inner.sessions.lock().await;
        sessions
            .values()
            .map(|session| session.name().to_string())
            .collect()
    }
}
