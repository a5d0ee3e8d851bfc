use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{Profile, Session};

/// Storage key holding the bearer credential.
pub const TOKEN_KEY: &str = "userToken";
/// Storage key holding the last-known profile.
pub const PROFILE_KEY: &str = "userData";

/// On-disk layout of the session file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "userToken", default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(rename = "userData", default, skip_serializing_if = "Option::is_none")]
    profile: Option<Profile>,
}

/// Outcome of the protected-route check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Allowed(String),
    RedirectToLogin,
}

/// Owns the bearer credential and cached profile.
///
/// Cloning is cheap; all clones share the same session. The persistent
/// variant mirrors every change into a JSON file so a later process starts
/// already logged in.
#[derive(Clone, Debug)]
pub struct SessionStore {
    current: Arc<RwLock<Option<Session>>>,
    path: Option<Arc<PathBuf>>,
}

impl SessionStore {
    /// Session kept only for the lifetime of this process.
    pub fn in_memory() -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            path: None,
        }
    }

    /// Session backed by the JSON file at `path`, loading any stored credential.
    ///
    /// A missing file means "logged out". An unreadable document is logged and
    /// treated the same way so a corrupt file never blocks a fresh login.
    pub fn persistent(path: &Path) -> Result<Self> {
        let stored = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<StoredSession>(&contents) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Ignoring unreadable session file {}: {e}", path.display());
                    StoredSession::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => StoredSession::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        let session = stored.token.map(|credential| Session {
            credential,
            profile: stored.profile,
        });
        if session.is_some() {
            debug!("Restored session from {}", path.display());
        }

        Ok(Self {
            current: Arc::new(RwLock::new(session)),
            path: Some(Arc::new(path.to_path_buf())),
        })
    }

    /// Store a freshly issued credential and profile.
    pub fn establish(&self, session: Session) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        self.persist();
    }

    /// Local teardown. Never touches the network and never fails.
    pub fn logout(&self) {
        if self.take().is_some() {
            info!("Logged out");
        }
    }

    /// Teardown triggered by a 401 from the server.
    pub fn expire(&self) {
        if self.take().is_some() {
            warn!("Session expired or unauthorized, credential cleared");
        }
    }

    pub fn current_credential(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.credential.clone())
    }

    pub fn profile(&self) -> Option<Profile> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|s| s.profile.clone())
    }

    /// Update the cached profile. Ignored when logged out.
    pub fn replace_profile(&self, profile: Profile) {
        {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            match guard.as_mut() {
                Some(session) => session.profile = Some(profile),
                None => return,
            }
        }
        self.persist();
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_credential().is_some()
    }

    /// Protected-route check, performed before any gated view loads data.
    pub fn gate(&self) -> Gate {
        match self.current_credential() {
            Some(credential) => Gate::Allowed(credential),
            None => Gate::RedirectToLogin,
        }
    }

    fn take(&self) -> Option<Session> {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.persist();
        previous
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = self.write_file(path) {
            warn!("Failed to persist session to {}: {e:#}", path.display());
        }
    }

    fn write_file(&self, path: &Path) -> Result<()> {
        let stored = {
            let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                Some(session) => StoredSession {
                    token: Some(session.credential.clone()),
                    profile: session.profile.clone(),
                },
                None => StoredSession::default(),
            }
        };

        if stored.token.is_none() {
            return match std::fs::remove_file(path) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    Err(e).with_context(|| format!("failed to remove {}", path.display()))
                }
                _ => Ok(()),
            };
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(&stored).context("failed to serialize session")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
