/*
[INPUT]:  Verified wallet address and optional session file path
[OUTPUT]: Session lookup, expiry status, and authentication gate notifications
[POS]:    Auth layer - session lifecycle and persistence
[UPDATE]: When changing session lifetime or storage format
*/

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::http::Result;

/// How long a verified session stays valid without re-signing
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Stored session data with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub address: String,
    pub authenticated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Precondition gate consumed by the streaming client.
///
/// Connections are only opened while `is_authenticated()` holds; `watch()`
/// reports changes so a logout can tear the stream down.
pub trait AuthGate: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn watch(&self) -> watch::Receiver<bool>;
}

/// Pending expiry for the active session
#[derive(Debug, Default)]
struct Expiry {
    generation: u64,
    task: Option<AbortHandle>,
}

/// Thread-safe session store.
///
/// Inside a tokio runtime the gate closes on its own once the active
/// session reaches `expires_at`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    data: Arc<RwLock<Option<SessionData>>>,
    gate: Arc<watch::Sender<bool>>,
    expiry: Arc<Mutex<Expiry>>,
    path: Option<PathBuf>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an in-memory store
    pub fn new() -> Self {
        let (gate, _rx) = watch::channel(false);
        Self {
            data: Arc::new(RwLock::new(None)),
            gate: Arc::new(gate),
            expiry: Arc::new(Mutex::new(Expiry::default())),
            path: None,
            ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECONDS),
        }
    }

    /// Create a store that persists to `path` as JSON
    pub fn with_file(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::new()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a freshly verified address and persist it
    pub fn set_authenticated(&self, address: String) -> Result<SessionData> {
        let now = Utc::now();
        let session = SessionData {
            address,
            authenticated_at: now,
            expires_at: now + self.ttl,
        };

        self.persist(&session)?;
        self.replace(Some(session.clone()));
        Ok(session)
    }

    /// Load a persisted session, discarding it if expired or unreadable.
    ///
    /// Returns the restored session if one is valid.
    pub fn restore(&self) -> Option<SessionData> {
        let path = self.path.as_ref()?;
        let content = fs::read_to_string(path).ok()?;
        let session = match serde_json::from_str::<SessionData>(&content) {
            Ok(session) => session,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding unreadable session file");
                let _ = fs::remove_file(path);
                return None;
            }
        };

        if session.is_expired_at(Utc::now()) {
            info!(address = %session.address, "stored session expired");
            let _ = fs::remove_file(path);
            return None;
        }

        debug!(address = %session.address, expires_at = %session.expires_at, "session restored");
        self.replace(Some(session.clone()));
        Some(session)
    }

    /// Get session data if available
    pub fn session(&self) -> Option<SessionData> {
        self.data.read().ok().and_then(|guard| guard.clone())
    }

    pub fn address(&self) -> Option<String> {
        self.session().map(|session| session.address)
    }

    /// Check if the session is missing or expired
    pub fn is_expired(&self) -> bool {
        match self.session() {
            Some(session) => session.is_expired_at(Utc::now()),
            None => true,
        }
    }

    /// Clear the session in memory and on disk
    pub fn clear(&self) -> Result<()> {
        self.replace(None);
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn replace(&self, session: Option<SessionData>) {
        let mut expiry = self
            .expiry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        expiry.generation += 1;
        if let Some(task) = expiry.task.take() {
            task.abort();
        }

        let expires_at = session
            .as_ref()
            .filter(|session| !session.is_expired_at(Utc::now()))
            .map(|session| session.expires_at);
        apply(&self.data, &self.gate, session);

        if let Some(expires_at) = expires_at {
            expiry.task = self.arm_expiry(expires_at, expiry.generation);
        }
    }

    /// Schedule the gate to close at `expires_at`; a no-op outside a runtime
    fn arm_expiry(&self, expires_at: DateTime<Utc>, generation: u64) -> Option<AbortHandle> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let remaining = (expires_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        let data = Arc::downgrade(&self.data);
        let gate = Arc::downgrade(&self.gate);
        let expiry = Arc::downgrade(&self.expiry);

        let task = runtime.spawn(async move {
            tokio::time::sleep(remaining).await;
            expire(&data, &gate, &expiry, generation);
        });
        Some(task.abort_handle())
    }

    fn persist(&self, session: &SessionData) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, serde_json::to_vec_pretty(session)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }
}

fn apply(
    data: &RwLock<Option<SessionData>>,
    gate: &watch::Sender<bool>,
    session: Option<SessionData>,
) {
    let authenticated = session
        .as_ref()
        .is_some_and(|session| !session.is_expired_at(Utc::now()));
    if let Ok(mut guard) = data.write() {
        *guard = session;
    }
    gate.send_if_modified(|current| {
        let changed = *current != authenticated;
        *current = authenticated;
        changed
    });
}

fn expire(
    data: &Weak<RwLock<Option<SessionData>>>,
    gate: &Weak<watch::Sender<bool>>,
    expiry: &Weak<Mutex<Expiry>>,
    generation: u64,
) {
    let (Some(data), Some(gate), Some(expiry)) = (data.upgrade(), gate.upgrade(), expiry.upgrade())
    else {
        return;
    };
    let mut expiry = expiry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if expiry.generation != generation {
        return;
    }
    expiry.task = None;

    let address = data
        .read()
        .ok()
        .and_then(|guard| guard.as_ref().map(|session| session.address.clone()));
    info!(address = ?address, "session expired; closing authentication gate");
    apply(&data, &gate, None);
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGate for SessionStore {
    fn is_authenticated(&self) -> bool {
        !self.is_expired()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.gate.subscribe()
    }
}
