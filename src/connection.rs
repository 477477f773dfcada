//! Connections and the connection cache.
//!
//! A [`Connection`] is one logical database inside an open
//! [`DocumentStore`]. The [`ConnectionRegistry`] hands out shared connections
//! keyed by the hash of their options, and shares one open store per database
//! file between all connections on that file:
//!
//! ```text
//! Collection::connect()
//!     └── ConnectionRegistry::connect(options)
//!             ├── options_hash(options)   ← identity
//!             ├── cached and open?  → Arc<Connection>
//!             ├── store for this file still alive?  → reuse it
//!             └── otherwise open the file
//! ```
//!
//! The registry holds a single async lock for both maps, so concurrent
//! callers never open the same file twice.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock, Weak};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::config::ConnectionOptions;
use crate::error::{ModelDBError, Result, StorageError};
use crate::storage::{open_store, DocumentStore};

/// Returns the canonical JSON text of a value.
///
/// Object keys are sorted recursively and no whitespace is emitted, so two
/// values that differ only in key order produce the same text.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

/// Returns the identity hash of a connection-option mapping.
///
/// Two mappings denote the same connection if and only if their hashes are
/// equal.
///
/// ```rust
/// use modeldb::options_hash;
/// use serde_json::json;
///
/// let hash = options_hash(&json!({"c": "c", "a": "a", "b": {"e": "e", "d": "d"}}));
/// assert_eq!(hash, r#"{"a":"a","b":{"d":"d","e":"e"},"c":"c"}"#);
/// ```
pub fn options_hash(options: &Value) -> String {
    canonical_json(options)
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sorted(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// One logical database of an open document store.
///
/// Closing a connection releases its store handle; operations still holding
/// a handle finish first, and the file is released once the last one drops
/// it.
pub struct Connection {
    hash: String,
    options: ConnectionOptions,
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
}

impl Connection {
    /// Opens the store described by `options`.
    ///
    /// This blocks on file I/O; async callers go through
    /// [`ConnectionRegistry::connect`].
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the store cannot be
    /// opened.
    #[instrument(skip(options), fields(path = %options.path.display(), db = %options.db))]
    pub fn open(options: &ConnectionOptions) -> Result<Self> {
        options.validate()?;
        let hash = options.hash()?;
        let store = open_store(options)?;

        info!("Connection opened");
        Ok(Self {
            hash,
            options: options.clone(),
            store: RwLock::new(Some(Arc::from(store))),
        })
    }

    /// Creates a connection on a store that is already open.
    pub(crate) fn on_store(options: &ConnectionOptions, store: Arc<dyn DocumentStore>) -> Result<Self> {
        Ok(Self {
            hash: options.hash()?,
            options: options.clone(),
            store: RwLock::new(Some(store)),
        })
    }

    /// Returns the identity hash of this connection's options.
    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Returns the options this connection was opened with.
    #[inline]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Returns true until [`close`](Self::close) is called.
    pub fn is_open(&self) -> bool {
        self.store
            .read()
            .map(|store| store.is_some())
            .unwrap_or(false)
    }

    /// Returns a handle to the open store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionClosed`] after the connection was
    /// closed.
    pub fn store(&self) -> Result<Arc<dyn DocumentStore>> {
        let guard = self
            .store
            .read()
            .map_err(|_| ModelDBError::runtime("Connection lock poisoned"))?;

        guard
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| StorageError::ConnectionClosed(self.options.db.clone()).into())
    }

    /// Closes the connection. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let closed = self
            .store
            .write()
            .map_err(|_| ModelDBError::runtime("Connection lock poisoned"))?
            .take();

        if closed.is_some() {
            info!(path = %self.options.path.display(), db = %self.options.db, "Connection closed");
        }
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.options.path)
            .field("db", &self.options.db)
            .field("open", &self.is_open())
            .finish()
    }
}

static GLOBAL: OnceLock<Arc<ConnectionRegistry>> = OnceLock::new();

/// Cache of open connections keyed by option hash.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<String, Arc<Connection>>,
    stores: HashMap<PathBuf, Weak<dyn DocumentStore>>,
}

impl fmt::Debug for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryState")
            .field("connections", &self.connections.len())
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry, creating it on first use.
    pub fn global() -> Arc<ConnectionRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ConnectionRegistry::new())))
    }

    /// Returns the connection for `options`, opening it if needed.
    ///
    /// A cached connection that was closed in the meantime is replaced.
    /// Connections on the same file share one store, whatever their `db`;
    /// the file is opened only when no live handle to it is left.
    #[instrument(skip(self, options), fields(path = %options.path.display(), db = %options.db))]
    pub async fn connect(&self, options: &ConnectionOptions) -> Result<Arc<Connection>> {
        options.validate()?;
        let hash = options.hash()?;
        let mut state = self.state.lock().await;

        if let Some(connection) = state.connections.get(&hash) {
            if connection.is_open() {
                debug!("Reusing cached connection");
                return Ok(Arc::clone(connection));
            }
        }

        let path = store_path(&options.path)?;
        let live = state.stores.get(&path).and_then(Weak::upgrade);
        let store = match live {
            Some(store) => {
                debug!("Reusing open store");
                store
            }
            None => {
                let owned = options.clone();
                let store: Arc<dyn DocumentStore> =
                    Arc::from(tokio::task::spawn_blocking(move || open_store(&owned)).await??);
                state.stores.insert(path, Arc::downgrade(&store));
                store
            }
        };

        let connection = Arc::new(Connection::on_store(options, store)?);
        state.connections.insert(hash, Arc::clone(&connection));
        info!("Connection opened");

        Ok(connection)
    }

    /// Closes every cached connection and empties the cache.
    ///
    /// Safe to call when nothing was ever opened.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let count = state.connections.len();

        for (_, connection) in state.connections.drain() {
            connection.close()?;
        }
        state.stores.retain(|_, store| store.strong_count() > 0);

        if count > 0 {
            info!(count, "Connections closed");
        }
        Ok(())
    }

    /// Returns the number of cached connections that are still open.
    pub async fn open_count(&self) -> usize {
        self.state
            .lock()
            .await
            .connections
            .values()
            .filter(|connection| connection.is_open())
            .count()
    }
}

/// Returns the absolute form of a database path, used to share stores.
fn store_path(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
