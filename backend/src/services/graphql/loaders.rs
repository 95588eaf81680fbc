//! Request-scoped batch loaders
//!
//! Loaders solve the N+1 problem for relationship fields: instead of one
//! `GetUser` per borrower, every key requested while the resolver tree is
//! being polled is collected into a batch window and fetched with a single
//! `BatchGetUsers` call.
//!
//! # Architecture
//!
//! The per-entity fetchers ([`BookLoader`], [`UserLoader`]) implement
//! async-graphql's [`Loader`] trait. [`BatchLoader`] drives them:
//!
//! 1. `load(key)` looks the key up in the request cache. A hit returns the
//!    window future that already fetched (or is fetching) it.
//! 2. A miss appends the key to the open window, creating the window if none
//!    is open. Duplicate keys never reach the window twice.
//! 3. The window future keeps yielding to the scheduler until a full pass
//!    adds no keys, waits the configured delay (then settles again), and only
//!    then closes the window and issues exactly one batch call with the keys
//!    in first-registration order. Long sibling lists are polled over several
//!    passes.
//! 4. Results are matched by key. Keys the backend did not return resolve to
//!    `None`. A failed batch is logged and resolves every key of the window
//!    to `None`.
//!
//! A `BatchLoader` lives inside a [`LoaderRegistry`](super::LoaderRegistry)
//! that is built for one GraphQL request and dropped with it.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_graphql::dataloader::Loader;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;

use crate::services::rpc::{BookRecord, BookServiceClient, RpcError, UserRecord, UserServiceClient};

type WindowResult<V> = Arc<HashMap<String, V>>;
type WindowFuture<V> = Shared<BoxFuture<'static, WindowResult<V>>>;

/// Keys waiting for the next dispatch
struct OpenWindow<V> {
    id: u64,
    keys: Vec<String>,
    future: WindowFuture<V>,
}

struct LoaderState<V> {
    /// Every key seen in this request, mapped to the window that fetches it
    cache: HashMap<String, WindowFuture<V>>,
    open: Option<OpenWindow<V>>,
    next_window: u64,
}

struct Inner<L: Loader<String>> {
    entity: &'static str,
    loader: L,
    delay: Duration,
    state: Mutex<LoaderState<L::Value>>,
    dispatches: AtomicUsize,
}

/// Batching, memoizing loader for one entity type within one request
pub struct BatchLoader<L: Loader<String>> {
    inner: Arc<Inner<L>>,
}

impl<L> BatchLoader<L>
where
    L: Loader<String>,
    L::Error: Display,
{
    pub fn new(entity: &'static str, loader: L, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entity,
                loader,
                delay,
                state: Mutex::new(LoaderState {
                    cache: HashMap::new(),
                    open: None,
                    next_window: 0,
                }),
                dispatches: AtomicUsize::new(0),
            }),
        }
    }

    pub fn entity(&self) -> &'static str {
        self.inner.entity
    }

    /// Load one entity. `None` means the backend has no such key or the
    /// batch carrying it failed.
    pub async fn load(&self, key: &str) -> Option<L::Value> {
        let window = self.enqueue(key);
        window.await.get(key).cloned()
    }

    /// Load several entities, one slot per requested key in request order.
    ///
    /// All keys are registered before anything is awaited, so they share one
    /// window.
    pub async fn load_many<I, K>(&self, keys: I) -> Vec<Option<L::Value>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let pending: Vec<(String, WindowFuture<L::Value>)> = keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref().to_string();
                let window = self.enqueue(&key);
                (key, window)
            })
            .collect();

        futures::future::join_all(
            pending
                .into_iter()
                .map(|(key, window)| async move { window.await.get(&key).cloned() }),
        )
        .await
    }

    /// Number of batch calls this loader has issued
    pub fn dispatch_count(&self) -> usize {
        self.inner.dispatches.load(Ordering::SeqCst)
    }

    /// Number of distinct keys requested so far
    pub fn cached_keys(&self) -> usize {
        self.inner.state.lock().cache.len()
    }

    fn enqueue(&self, key: &str) -> WindowFuture<L::Value> {
        let mut state = self.inner.state.lock();

        if let Some(window) = state.cache.get(key) {
            tracing::trace!(entity = self.inner.entity, key, "Loader cache hit");
            return window.clone();
        }

        let window = match state.open.as_mut() {
            Some(open) => {
                open.keys.push(key.to_string());
                open.future.clone()
            }
            None => {
                let id = state.next_window;
                state.next_window += 1;
                let future = dispatch(Arc::downgrade(&self.inner), id).boxed().shared();
                state.open = Some(OpenWindow {
                    id,
                    keys: vec![key.to_string()],
                    future: future.clone(),
                });
                future
            }
        };

        state.cache.insert(key.to_string(), window.clone());
        window
    }
}

/// Yield until the window stops growing across a full pass of the scheduler.
///
/// Returns `false` once the owning request is gone.
async fn settle<L: Loader<String>>(inner: &Weak<Inner<L>>, window_id: u64) -> bool {
    let mut seen = 0;
    loop {
        tokio::task::yield_now().await;

        let Some(inner) = inner.upgrade() else {
            return false;
        };
        let pending = inner
            .state
            .lock()
            .open
            .as_ref()
            .filter(|open| open.id == window_id)
            .map_or(0, |open| open.keys.len());
        if pending == seen {
            return true;
        }
        seen = pending;
    }
}

/// Body of a window future: wait for the current burst, close the window,
/// fetch.
async fn dispatch<L>(weak: Weak<Inner<L>>, window_id: u64) -> WindowResult<L::Value>
where
    L: Loader<String>,
    L::Error: Display,
{
    // The registry was dropped with its request; nobody is left to serve.
    if !settle(&weak, window_id).await {
        return Arc::new(HashMap::new());
    }

    let delay = match weak.upgrade() {
        Some(inner) => inner.delay,
        None => return Arc::new(HashMap::new()),
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
        if !settle(&weak, window_id).await {
            return Arc::new(HashMap::new());
        }
    }

    let Some(inner) = weak.upgrade() else {
        return Arc::new(HashMap::new());
    };

    let keys = {
        let mut state = inner.state.lock();
        state
            .open
            .take_if(|open| open.id == window_id)
            .map(|open| open.keys)
            .unwrap_or_default()
    };
    if keys.is_empty() {
        return Arc::new(HashMap::new());
    }

    inner.dispatches.fetch_add(1, Ordering::SeqCst);
    tracing::debug!(
        entity = inner.entity,
        window = window_id,
        key_count = keys.len(),
        "Dispatching batch of {} {} keys",
        keys.len(),
        inner.entity
    );

    match inner.loader.load(&keys).await {
        Ok(values) => {
            tracing::debug!(
                entity = inner.entity,
                window = window_id,
                found = values.len(),
                missing = keys.len().saturating_sub(values.len()),
                "Batch load complete"
            );
            Arc::new(values)
        }
        Err(e) => {
            tracing::warn!(
                entity = inner.entity,
                window = window_id,
                key_count = keys.len(),
                error = %e,
                "Batch load failed, resolving window to absent"
            );
            Arc::new(HashMap::new())
        }
    }
}

// ============================================================================
// Entity fetchers
// ============================================================================

/// Batched book lookups against the book service
pub struct BookLoader {
    client: Arc<dyn BookServiceClient>,
}

impl BookLoader {
    pub fn new(client: Arc<dyn BookServiceClient>) -> Self {
        Self { client }
    }
}

impl Loader<String> for BookLoader {
    type Value = BookRecord;
    type Error = Arc<RpcError>;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, Self::Value>, Self::Error> {
        let books = self.client.get_books(keys).await.map_err(Arc::new)?;
        Ok(books.into_iter().map(|b| (b.id.clone(), b)).collect())
    }
}

/// Batched user lookups against the user service
pub struct UserLoader {
    client: Arc<dyn UserServiceClient>,
}

impl UserLoader {
    pub fn new(client: Arc<dyn UserServiceClient>) -> Self {
        Self { client }
    }
}

impl Loader<String> for UserLoader {
    type Value = UserRecord;
    type Error = Arc<RpcError>;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, Self::Value>, Self::Error> {
        let users = self.client.get_users(keys).await.map_err(Arc::new)?;
        Ok(users.into_iter().map(|u| (u.id.clone(), u)).collect())
    }
}
