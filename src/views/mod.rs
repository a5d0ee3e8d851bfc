//! One view model per screen.
//!
//! Each view performs its initial load on mount, then keeps its data fresh
//! through a [`crate::freshness::Subscription`]. Data lives in [`Remote`]
//! cells which keep the last good value when a refresh fails and ignore
//! anything that arrives after the view is gone.

pub mod bets;
pub mod history;
pub mod home;
pub mod sidebar;
pub mod wallet;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::ClientError;
use crate::session::{Gate, SessionStore};

pub use bets::{BetRow, BetsView};
pub use history::{HistorySummary, TossHistoryView};
pub use home::{CardState, HomeView, MatchCard, SideStake};
pub use sidebar::{SidebarSnapshot, SidebarView};
pub use wallet::{LedgerEntry, WalletView};

/// Last known value of one remote collection plus its load status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteState<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    /// Whether the last failure was transient (no response arrived).
    pub retryable: bool,
    pub loading: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Shared, possibly stale copy of server data.
#[derive(Debug)]
pub struct Remote<T> {
    state: Arc<Mutex<RemoteState<T>>>,
    detached: Arc<AtomicBool>,
    changes: Arc<watch::Sender<u64>>,
}

impl<T> Clone for Remote<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            detached: Arc::clone(&self.detached),
            changes: Arc::clone(&self.changes),
        }
    }
}

impl<T: Clone> Default for Remote<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Remote<T> {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(RemoteState {
                data: None,
                error: None,
                retryable: false,
                loading: true,
                updated_at: None,
            })),
            detached: Arc::new(AtomicBool::new(false)),
            changes: Arc::new(changes),
        }
    }

    /// Record a fetch result. Returns `false` when the view is already gone.
    ///
    /// Failures keep the previous data and only set the error message.
    pub fn apply(&self, result: Result<T, ClientError>) -> bool {
        if self.is_detached() {
            return false;
        }
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.loading = false;
            match result {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                    state.retryable = false;
                    state.updated_at = Some(Utc::now());
                }
                Err(e) => {
                    state.retryable = e.is_retryable();
                    state.error = Some(e.to_string());
                }
            }
        }
        self.changes.send_modify(|generation| *generation += 1);
        true
    }

    /// Await `fetch`, record its result, and hand back the error for logging.
    pub async fn load<Fut>(&self, fetch: Fut) -> Result<(), ClientError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let result = fetch.await;
        let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
        self.apply(result);
        outcome
    }

    pub fn snapshot(&self) -> RemoteState<T> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn data(&self) -> Option<T> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .data
            .clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .error
            .clone()
    }

    /// Receiver that changes every time a result is applied.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Stop accepting results. Called when the owning view unmounts.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }
}

/// Protected-route check shared by every view mount.
pub(crate) fn require_session(session: &SessionStore) -> Result<(), ClientError> {
    match session.gate() {
        Gate::Allowed(_) => Ok(()),
        Gate::RedirectToLogin => Err(ClientError::Auth(None)),
    }
}

/// Initial loads surface only auth failures; anything else is already in the cell.
pub(crate) fn only_auth(result: Result<(), ClientError>) -> Result<(), ClientError> {
    match result {
        Err(e) if e.is_auth() => Err(e),
        _ => Ok(()),
    }
}
