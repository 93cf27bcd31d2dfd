use log::{debug, warn};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot, Notify};
use tokio::task::JoinHandle;

use super::keys::QueryKey;
use crate::error::CommandError;

/// Source of "now" for freshness checks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// What a consumer sees for one key
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub status: QueryStatus,
    pub error: Option<CommandError>,
    /// A fetch for this key is running
    pub is_fetching: bool,
}

impl<T> QueryState<T> {
    fn pending(is_fetching: bool) -> Self {
        Self {
            data: None,
            status: QueryStatus::Pending,
            error: None,
            is_fetching,
        }
    }

    fn failed(error: CommandError) -> Self {
        Self {
            data: None,
            status: QueryStatus::Error,
            error: Some(error),
            is_fetching: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn into_result(self) -> Result<Option<T>, CommandError> {
        match self.error {
            Some(err) if self.status == QueryStatus::Error => Err(err),
            _ => Ok(self.data),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryOptions {
    /// Age after which cached data is refetched on read
    pub stale_time: Duration,
}

impl QueryOptions {
    pub fn stale_after(stale_time: Duration) -> Self {
        Self { stale_time }
    }
}

type CachedValue = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct Entry {
    value: Option<CachedValue>,
    fetched_at: Option<Instant>,
    invalidated: bool,
    /// Outcome of the most recent fetch when it failed
    error: Option<CommandError>,
    in_flight: usize,
}

impl Entry {
    fn is_fresh(&self, now: Instant, stale_time: Duration) -> bool {
        match (&self.value, self.fetched_at) {
            (Some(_), Some(at)) => !self.invalidated && now.saturating_duration_since(at) < stale_time,
            _ => false,
        }
    }

    fn state<T: Clone + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        let data = match self.value.as_ref().map(|value| downcast::<T>(key, value)) {
            Some(Ok(data)) => Some(data),
            Some(Err(err)) => return QueryState::failed(err),
            None => None,
        };
        let status = match (&data, &self.error) {
            (_, Some(_)) => QueryStatus::Error,
            (Some(_), None) => QueryStatus::Success,
            (None, None) => QueryStatus::Pending,
        };
        QueryState {
            data,
            status,
            error: self.error.clone(),
            is_fetching: self.in_flight > 0,
        }
    }
}

fn downcast<T: Clone + 'static>(key: &QueryKey, value: &CachedValue) -> Result<T, CommandError> {
    value.downcast_ref::<T>().cloned().ok_or_else(|| {
        CommandError::internal(format!(
            "cache entry {} holds a different type than {}",
            key,
            std::any::type_name::<T>()
        ))
    })
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<QueryKey>,
    background: AtomicUsize,
    idle: Notify,
}

/// Decrements the background task count when a spawned fetch ends
struct TaskGuard(Arc<Inner>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.0.background.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Key-addressed cache of backend reads.
///
/// Cheap to clone; clones share one cache. The entry map is only locked for
/// short synchronous sections, never across an await.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entries().len())
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

enum Lookup {
    Fresh,
    Stale { revalidate: bool },
    Missing,
}

impl QueryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                clock,
                events,
                background: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> Instant {
        self.inner.clock.now()
    }

    /// Read `key`, fetching when there is no data and revalidating in the
    /// background when the data is stale.
    pub async fn query<T, F, Fut>(&self, key: QueryKey, fetch: F, options: QueryOptions) -> QueryState<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CommandError>> + Send + 'static,
    {
        let now = self.now();
        let lookup = {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_default();
            if entry.is_fresh(now, options.stale_time) {
                Lookup::Fresh
            } else if entry.value.is_some() {
                let revalidate = entry.in_flight == 0;
                if revalidate {
                    entry.in_flight += 1;
                }
                Lookup::Stale { revalidate }
            } else {
                entry.in_flight += 1;
                Lookup::Missing
            }
        };

        match lookup {
            Lookup::Fresh => {
                debug!("cache hit {}", key);
                self.peek(&key)
            }
            Lookup::Stale { revalidate } => {
                if revalidate {
                    debug!("cache stale {}, revalidating", key);
                    self.spawn_fetch(key.clone(), fetch, None);
                }
                self.peek(&key)
            }
            Lookup::Missing => {
                debug!("cache miss {}", key);
                // Dropping this future does not cancel the fetch
                let _ = self.spawn_fetch(key.clone(), fetch, None).await;
                self.peek(&key)
            }
        }
    }

    /// Current state of `key` without fetching
    pub fn peek<T: Clone + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        match self.entries().get(key) {
            Some(entry) => entry.state(key),
            None => QueryState::pending(false),
        }
    }

    /// Warm `key` in the background unless it holds data younger than
    /// `stale_time`.
    pub fn prefetch<T, F, Fut>(&self, key: QueryKey, fetch: F, stale_time: Duration) -> Option<JoinHandle<()>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CommandError>> + Send + 'static,
    {
        let now = self.now();
        {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_default();
            if entry.is_fresh(now, stale_time) {
                debug!("prefetch skipped, {} is fresh", key);
                return None;
            }
            entry.in_flight += 1;
        }
        debug!("prefetching {}", key);
        Some(self.spawn_fetch(key, fetch, None))
    }

    /// Fresh data for `key`, fetching and waiting when the cache cannot
    /// provide it. Never returns stale data.
    pub async fn ensure_data<T, F, Fut>(&self, key: QueryKey, fetch: F, options: QueryOptions) -> Result<T, CommandError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CommandError>> + Send + 'static,
    {
        let now = self.now();
        {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_default();
            if entry.is_fresh(now, options.stale_time) {
                if let Some(value) = &entry.value {
                    debug!("cache hit {}", key);
                    return downcast(&key, value);
                }
            }
            entry.in_flight += 1;
        }

        debug!("ensuring {}", key);
        let (reply, result) = oneshot::channel();
        self.spawn_fetch(key.clone(), fetch, Some(reply));
        result.await.unwrap_or_else(|_| {
            Err(CommandError::internal(format!("fetch for {} did not finish", key)))
        })
    }

    /// Mark every entry under `prefix` stale. Running fetches are not
    /// cancelled. Returns the number of entries marked.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let marked: Vec<QueryKey> = {
            let mut entries = self.entries();
            entries
                .iter_mut()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, entry)| {
                    entry.invalidated = true;
                    key.clone()
                })
                .collect()
        };
        debug!("invalidated {} entries under {}", marked.len(), prefix);
        for key in &marked {
            self.notify(key);
        }
        marked.len()
    }

    /// Notifications of keys whose entry changed. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.inner.events.subscribe()
    }

    /// Wait until every background fetch spawned so far has finished
    pub async fn settle(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.inner.background.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Run `fetch` on its own task so it completes even when the caller
    /// goes away. `reply` receives the result once it is stored.
    fn spawn_fetch<T, F, Fut>(
        &self,
        key: QueryKey,
        fetch: F,
        reply: Option<oneshot::Sender<Result<T, CommandError>>>,
    ) -> JoinHandle<()>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CommandError>> + Send + 'static,
    {
        self.inner.background.fetch_add(1, Ordering::AcqRel);
        let guard = TaskGuard(Arc::clone(&self.inner));
        let cache = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let result = fetch().await;
            match reply {
                Some(reply) => {
                    cache.complete(&key, result.clone());
                    // The caller may have been dropped
                    let _ = reply.send(result);
                }
                None => cache.complete(&key, result),
            }
        })
    }

    /// Record a finished fetch. Later completions overwrite earlier ones.
    fn complete<T: Send + Sync + 'static>(&self, key: &QueryKey, result: Result<T, CommandError>) {
        let now = self.now();
        {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_default();
            entry.in_flight = entry.in_flight.saturating_sub(1);
            match result {
                Ok(value) => {
                    entry.value = Some(Arc::new(value));
                    entry.fetched_at = Some(now);
                    entry.invalidated = false;
                    entry.error = None;
                }
                Err(err) => {
                    warn!("fetch for {} failed: {}", key, err);
                    entry.error = Some(err);
                }
            }
        }
        self.notify(key);
    }

    fn notify(&self, key: &QueryKey) {
        // No receivers is fine
        let _ = self.inner.events.send(key.clone());
    }
}
