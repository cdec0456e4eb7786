//! Database URLs, the session factory and its pool bounds

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use super::embedded::{Backend, EmbeddedSession, SharedBackend};
use super::{SessionError, SessionResult};
use crate::config::StoreConfig;
use crate::persistence;

/// Where a database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUrl {
    /// `memory:<name>`: private to the factory, gone when it is dropped
    Memory(String),
    /// `plocal:<dir>`: WAL files under `dir`
    Plocal(PathBuf),
}

impl FromStr for StoreUrl {
    type Err = SessionError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let (scheme, location) = url
            .split_once(':')
            .ok_or_else(|| SessionError::InvalidUrl(url.to_string()))?;
        if location.is_empty() {
            return Err(SessionError::InvalidUrl(url.to_string()));
        }

        match scheme {
            "memory" => Ok(StoreUrl::Memory(location.to_string())),
            "plocal" => Ok(StoreUrl::Plocal(PathBuf::from(location))),
            _ => Err(SessionError::UnsupportedUrl(url.to_string())),
        }
    }
}

impl fmt::Display for StoreUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreUrl::Memory(name) => write!(f, "memory:{}", name),
            StoreUrl::Plocal(dir) => write!(f, "plocal:{}", dir.display()),
        }
    }
}

/// A claimed pool slot, released on drop
#[derive(Debug)]
pub struct PoolPermit {
    active: Arc<AtomicUsize>,
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Opens a database and hands out sessions on it, at most `pool_max` at once
pub struct GraphFactory {
    url: StoreUrl,
    backend: SharedBackend,
    active: Arc<AtomicUsize>,
    max_sessions: usize,
}

impl GraphFactory {
    /// Open (or create) the database named by `config.url`.
    ///
    /// `plocal:` databases are rebuilt from their WAL before the first
    /// session is handed out.
    pub fn open(config: &StoreConfig) -> SessionResult<Self> {
        if config.pool_min == 0 || config.pool_min > config.pool_max {
            return Err(SessionError::InvalidPool {
                min: config.pool_min,
                max: config.pool_max,
            });
        }
        if config.username.trim().is_empty() {
            return Err(SessionError::Connection("user name must not be empty".to_string()));
        }

        let url: StoreUrl = config.url.parse()?;
        let backend = match &url {
            StoreUrl::Memory(_) => Backend::in_memory(),
            StoreUrl::Plocal(dir) => {
                let (store, wal) = persistence::recover(dir)?;
                Backend::durable(store, wal)
            }
        };

        info!(
            "Opened database {} as {} (pool {}..{})",
            url, config.username, config.pool_min, config.pool_max
        );

        Ok(Self {
            url,
            backend: Arc::new(Mutex::new(backend)),
            active: Arc::new(AtomicUsize::new(0)),
            max_sessions: config.pool_max,
        })
    }

    pub fn url(&self) -> &StoreUrl {
        &self.url
    }

    /// Claim a pool slot and open a session on it
    pub fn session(&self) -> SessionResult<EmbeddedSession> {
        let max = self.max_sessions;
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .map_err(|_| SessionError::PoolExhausted(max))?;

        let permit = PoolPermit {
            active: Arc::clone(&self.active),
        };
        Ok(EmbeddedSession::new(Arc::clone(&self.backend), Some(permit)))
    }

    /// Number of sessions currently open
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}
