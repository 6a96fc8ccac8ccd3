//! Access token ownership
//!
//! [`SessionStore`] is the single owner of the session token. It mirrors the
//! token between memory and a [`TokenStorage`] backend and publishes every
//! change on a `watch` channel so the view shell can switch screens.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info};

/// Whether a token is currently held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

/// Persistence for a single token
pub trait TokenStorage {
    fn load(&self) -> Result<Option<String>>;
    fn store(&mut self, token: &str) -> Result<()>;
    fn remove(&mut self) -> Result<()>;
}

impl<T: TokenStorage + ?Sized> TokenStorage for Box<T> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn store(&mut self, token: &str) -> Result<()> {
        (**self).store(token)
    }

    fn remove(&mut self) -> Result<()> {
        (**self).remove()
    }
}

/// Token kept in a file, one line, nothing else
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading token from {}", self.path.display()))?;
        let token = content.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    fn store(&mut self, token: &str) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)
            .with_context(|| format!("writing token to {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

/// Token kept only in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStorage {
    token: Option<String>,
}

impl MemoryTokenStorage {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.token.clone())
    }

    fn store(&mut self, token: &str) -> Result<()> {
        self.token = Some(token.to_string());
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        self.token = None;
        Ok(())
    }
}

pub struct SessionStore<S: TokenStorage> {
    storage: S,
    token: Option<String>,
    initialized: bool,
    state_tx: watch::Sender<AuthState>,
}

impl<S: TokenStorage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            storage,
            token: None,
            initialized: false,
            state_tx,
        }
    }

    /// Reads the persisted token once. Later calls return the same answer
    /// without touching storage.
    pub fn init(&mut self) -> Result<Option<String>> {
        if !self.initialized {
            self.token = self.storage.load()?;
            self.initialized = true;
            debug!(found = self.token.is_some(), "session store initialized");
            self.publish();
        }
        Ok(self.token.clone())
    }

    pub fn set(&mut self, token: &str) -> Result<()> {
        self.storage.store(token)?;
        self.token = Some(token.to_string());
        self.initialized = true;
        info!("session token saved");
        self.publish();
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.storage.remove()?;
        self.token = None;
        self.initialized = true;
        info!("session token cleared");
        self.publish();
        Ok(())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn state(&self) -> AuthState {
        if self.token.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    /// Memory storage that counts loads
    struct CountingStorage {
        inner: MemoryTokenStorage,
        loads: Cell<usize>,
    }

    impl TokenStorage for CountingStorage {
        fn load(&self) -> Result<Option<String>> {
            self.loads.set(self.loads.get() + 1);
            self.inner.load()
        }
        fn store(&mut self, token: &str) -> Result<()> {
            self.inner.store(token)
        }
        fn remove(&mut self) -> Result<()> {
            self.inner.remove()
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut store = SessionStore::new(CountingStorage {
            inner: MemoryTokenStorage::with_token("abc"),
            loads: Cell::new(0),
        });
        assert_eq!(store.init().unwrap().as_deref(), Some("abc"));
        assert_eq!(store.init().unwrap().as_deref(), Some("abc"));
        assert_eq!(store.storage().loads.get(), 1);
        assert_eq!(store.state(), AuthState::Authenticated);
    }

    #[test]
    fn test_set_and_clear_keep_storage_in_sync() {
        let mut store = SessionStore::new(MemoryTokenStorage::default());
        assert_eq!(store.init().unwrap(), None);
        store.set("t1").unwrap();
        assert_eq!(store.token(), Some("t1"));
        assert_eq!(store.storage().load().unwrap().as_deref(), Some("t1"));
        store.clear().unwrap();
        assert_eq!(store.token(), None);
        assert_eq!(store.storage().load().unwrap(), None);
    }

    #[test]
    fn test_subscribers_see_transitions() {
        let mut store = SessionStore::new(MemoryTokenStorage::default());
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow_and_update(), AuthState::Unauthenticated);
        store.set("t").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AuthState::Authenticated);
        store.clear().unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("token");
        let mut storage = FileTokenStorage::new(&path);
        assert_eq!(storage.load().unwrap(), None);
        storage.store("secret-token").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("secret-token"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        storage.remove().unwrap();
        assert!(!path.exists());
        // Removing again is fine.
        storage.remove().unwrap();
    }

    #[test]
    fn test_file_store_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token");
        {
            let mut store = SessionStore::new(FileTokenStorage::new(&path));
            store.init().unwrap();
            store.set("persisted").unwrap();
        }
        let mut store = SessionStore::new(FileTokenStorage::new(&path));
        assert_eq!(store.init().unwrap().as_deref(), Some("persisted"));
    }
}
