//! Per-identity conversation state with idle expiry.
//!
//! The [`SessionStore`] trait is the only way the bot touches conversation
//! state; [`MemorySessionStore`] is the in-process implementation. Sessions
//! live in memory only and are lost on restart.
//!
//! Expiry is enforced twice: a deferred timer clears the session once the
//! idle window passes, and [`SessionStore::get`] independently treats a
//! session whose `last_activity` is older than the window as absent. The
//! timer keeps memory bounded; the read-side check keeps `get` correct even
//! if a timer is late.

use crate::channel::{Attachment, Identity};
use crate::expiry::ExpiryTimers;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

/// What a session is mid-flight on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    AwaitingImage,
    AwaitingMergeInputs,
    AwaitingCompressInput,
}

impl Activity {
    pub fn is_idle(self) -> bool {
        self == Activity::Idle
    }
}

/// One sender's conversation state.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub activity: Activity,
    /// Attachments collected so far; only non-empty while merging.
    pub buffer: Vec<Attachment>,
    pub last_activity: Instant,
}

impl Session {
    fn fresh(identity: Identity, activity: Activity) -> Self {
        Self {
            identity,
            activity,
            buffer: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.identity.clone(),
            activity: self.activity,
            buffered: self.buffer.len(),
            buffered_bytes: self.buffer.iter().map(Attachment::len).sum(),
            idle_secs: self.idle_for().as_secs(),
        }
    }
}

/// Serialisable summary of a [`Session`], without attachment payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub identity: Identity,
    pub activity: Activity,
    pub buffered: usize,
    pub buffered_bytes: usize,
    pub idle_secs: u64,
}

/// Failures of [`SessionStore::append`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No active session for '{0}'")]
    NoSession(Identity),

    #[error("Buffer for '{identity}' is full ({capacity} attachments)")]
    BufferFull { identity: Identity, capacity: usize },
}

/// Backing store for conversation state.
///
/// Only [`crate::bot::PdfBot`] mutates sessions, and only through these
/// methods, so an implementation backed by an external cache can replace
/// [`MemorySessionStore`] without touching routing.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Replace any session for `identity` with a fresh one in `activity`,
    /// empty buffer, refreshed timestamp, and (re)arm its expiry.
    async fn begin(&self, identity: &Identity, activity: Activity) -> Session;

    /// The live session for `identity`, or `None` if absent or expired.
    /// An expired session is cleared as a side effect.
    async fn get(&self, identity: &Identity) -> Option<Session>;

    /// Remove the session and cancel its expiry. Idempotent.
    async fn clear(&self, identity: &Identity);

    /// Append to the session's buffer and refresh its timestamp.
    /// Returns the new buffer length.
    async fn append(&self, identity: &Identity, attachment: Attachment)
        -> Result<usize, SessionError>;

    /// The session's buffer, or empty if there is no session.
    async fn buffer_of(&self, identity: &Identity) -> Vec<Attachment>;

    /// Every live session, for diagnostics.
    async fn snapshots(&self) -> Vec<SessionSnapshot>;
}

struct Entry {
    session: Session,
    generation: u64,
}

type EntryMap = Arc<Mutex<HashMap<Identity, Entry>>>;

fn lock(map: &Mutex<HashMap<Identity, Entry>>) -> MutexGuard<'_, HashMap<Identity, Entry>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory [`SessionStore`].
///
/// Uses a `std::sync::Mutex` because every operation is a synchronous map
/// update; the lock is never held across an `.await`. Must be used from
/// within a Tokio runtime (expiry timers are spawned tasks).
pub struct MemorySessionStore {
    entries: EntryMap,
    timers: ExpiryTimers<Identity>,
    idle_timeout: Duration,
    buffer_capacity: usize,
}

impl MemorySessionStore {
    pub fn new(idle_timeout: Duration, buffer_capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            timers: ExpiryTimers::new(),
            idle_timeout,
            buffer_capacity,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Number of stored sessions, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arm the expiry timer for `identity`. Caller holds the entries lock.
    fn arm(&self, identity: &Identity) -> u64 {
        let entries = Arc::clone(&self.entries);
        let key = identity.clone();
        self.timers.arm(identity.clone(), self.idle_timeout, move |generation| {
            let mut map = lock(&entries);
            if map.get(&key).is_some_and(|e| e.generation == generation) {
                map.remove(&key);
                info!(identity = %key, "session expired");
            }
        })
    }

    fn is_expired(&self, session: &Session) -> bool {
        session.idle_for() > self.idle_timeout
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn begin(&self, identity: &Identity, activity: Activity) -> Session {
        let session = Session::fresh(identity.clone(), activity);
        let mut map = lock(&self.entries);
        let generation = self.arm(identity);
        let replaced = map.insert(
            identity.clone(),
            Entry {
                session: session.clone(),
                generation,
            },
        );
        info!(
            %identity,
            ?activity,
            replaced = ?replaced.map(|e| e.session.activity),
            "session started"
        );
        session
    }

    async fn get(&self, identity: &Identity) -> Option<Session> {
        {
            let map = lock(&self.entries);
            match map.get(identity) {
                None => return None,
                Some(entry) if !self.is_expired(&entry.session) => {
                    return Some(entry.session.clone())
                }
                Some(_) => {}
            }
        }
        debug!(%identity, "session found past idle window");
        self.clear(identity).await;
        None
    }

    async fn clear(&self, identity: &Identity) {
        let removed = lock(&self.entries).remove(identity);
        self.timers.cancel(identity);
        if let Some(entry) = removed {
            info!(%identity, activity = ?entry.session.activity, "session cleared");
        }
    }

    async fn append(
        &self,
        identity: &Identity,
        attachment: Attachment,
    ) -> Result<usize, SessionError> {
        let mut map = lock(&self.entries);
        let live = map
            .get(identity)
            .is_some_and(|e| !self.is_expired(&e.session));
        if !live {
            return Err(SessionError::NoSession(identity.clone()));
        }
        if map
            .get(identity)
            .is_some_and(|e| e.session.buffer.len() >= self.buffer_capacity)
        {
            return Err(SessionError::BufferFull {
                identity: identity.clone(),
                capacity: self.buffer_capacity,
            });
        }

        let generation = self.arm(identity);
        let entry = map
            .get_mut(identity)
            .ok_or_else(|| SessionError::NoSession(identity.clone()))?;
        entry.generation = generation;
        entry.session.buffer.push(attachment);
        entry.session.last_activity = Instant::now();
        let len = entry.session.buffer.len();
        debug!(%identity, buffered = len, "attachment buffered");
        Ok(len)
    }

    async fn buffer_of(&self, identity: &Identity) -> Vec<Attachment> {
        self.get(identity)
            .await
            .map(|s| s.buffer)
            .unwrap_or_default()
    }

    async fn snapshots(&self) -> Vec<SessionSnapshot> {
        let mut out: Vec<SessionSnapshot> = lock(&self.entries)
            .values()
            .filter(|e| !self.is_expired(&e.session))
            .map(|e| e.session.snapshot())
            .collect();
        out.sort_by(|a, b| a.identity.cmp(&b.identity));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_secs(300);

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(IDLE, 2)
    }

    fn pdf(tag: u8) -> Attachment {
        Attachment::new("application/pdf", vec![b'%', b'P', b'D', b'F', tag])
    }

    #[tokio::test(start_paused = true)]
    async fn unseen_identity_has_no_session() {
        let s = store();
        assert!(s.get(&"nobody".into()).await.is_none());
        assert!(s.buffer_of(&"nobody".into()).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn begin_twice_keeps_only_latest() {
        let s = store();
        let id: Identity = "alice".into();
        s.begin(&id, Activity::AwaitingMergeInputs).await;
        s.append(&id, pdf(1)).await.unwrap();
        s.begin(&id, Activity::AwaitingImage).await;

        let session = s.get(&id).await.expect("session");
        assert_eq!(session.activity, Activity::AwaitingImage);
        assert!(session.buffer.is_empty());
        assert_eq!(s.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn get_returns_none_after_idle_window() {
        let s = store();
        let id: Identity = "bob".into();
        s.begin(&id, Activity::AwaitingCompressInput).await;

        tokio::time::advance(IDLE - Duration::from_secs(1)).await;
        assert!(s.get(&id).await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(s.get(&id).await.is_none());
        assert!(s.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_clears_session_without_reads() {
        let s = store();
        let id: Identity = "carol".into();
        s.begin(&id, Activity::AwaitingImage).await;
        assert_eq!(s.len(), 1);

        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;
        assert!(s.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rebegin_rearms_timer() {
        let s = store();
        let id: Identity = "dave".into();
        s.begin(&id, Activity::AwaitingImage).await;
        tokio::time::sleep(Duration::from_secs(200)).await;
        s.begin(&id, Activity::AwaitingMergeInputs).await;

        // The first timer would have fired at 300s.
        tokio::time::sleep(Duration::from_secs(200)).await;
        let session = s.get(&id).await.expect("newer session must survive");
        assert_eq!(session.activity, Activity::AwaitingMergeInputs);

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert!(s.get(&id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn append_refreshes_timestamp() {
        let s = store();
        let id: Identity = "erin".into();
        s.begin(&id, Activity::AwaitingMergeInputs).await;
        tokio::time::sleep(Duration::from_secs(250)).await;
        assert_eq!(s.append(&id, pdf(1)).await, Ok(1));

        tokio::time::sleep(Duration::from_secs(250)).await;
        assert_eq!(s.buffer_of(&id).await, vec![pdf(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn append_without_session_fails() {
        let s = store();
        let id: Identity = "frank".into();
        assert_eq!(
            s.append(&id, pdf(1)).await,
            Err(SessionError::NoSession(id.clone()))
        );
        assert!(s.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn append_respects_capacity() {
        let s = store();
        let id: Identity = "gina".into();
        s.begin(&id, Activity::AwaitingMergeInputs).await;
        assert_eq!(s.append(&id, pdf(1)).await, Ok(1));
        assert_eq!(s.append(&id, pdf(2)).await, Ok(2));
        assert!(matches!(
            s.append(&id, pdf(3)).await,
            Err(SessionError::BufferFull { capacity: 2, .. })
        ));
        assert_eq!(s.buffer_of(&id).await, vec![pdf(1), pdf(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_is_idempotent() {
        let s = store();
        let id: Identity = "hank".into();
        s.begin(&id, Activity::AwaitingImage).await;
        s.clear(&id).await;
        s.clear(&id).await;
        assert!(s.get(&id).await.is_none());
        assert!(s.timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn identities_do_not_share_state() {
        let s = store();
        let a: Identity = "a".into();
        let b: Identity = "b".into();
        s.begin(&a, Activity::AwaitingMergeInputs).await;
        s.begin(&b, Activity::AwaitingCompressInput).await;
        s.append(&a, pdf(1)).await.unwrap();
        s.clear(&b).await;

        assert_eq!(s.buffer_of(&a).await.len(), 1);
        assert!(s.get(&b).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_omit_payloads() {
        let s = store();
        let id: Identity = "ivy".into();
        s.begin(&id, Activity::AwaitingMergeInputs).await;
        s.append(&id, pdf(9)).await.unwrap();

        let snaps = s.snapshots().await;
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].buffered, 1);
        assert_eq!(snaps[0].buffered_bytes, 5);
        let json = serde_json::to_string(&snaps[0]).unwrap();
        assert!(json.contains("\"awaiting_merge_inputs\""), "got: {json}");
    }
}
