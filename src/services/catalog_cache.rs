//! In-memory catalog cache with TTL and single-flight loading.
//!
//! Fresh entries are served straight from the entry map. On a miss, at most
//! one load per key runs at a time: later callers attach to the running load
//! and all of them observe its outcome. Loads run on their own task, so a
//! caller that stops waiting does not cancel the load for anyone else.
//! A failed load never touches the existing entry.

use futures::future::{BoxFuture, FutureExt, Shared};
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{AccountRecord, CacheKey, ParsedCatalog};
use crate::services::m3u_parser::M3UParser;
use crate::services::source::{FetchError, PlaylistSource};

lazy_static! {
    static ref CACHE_HITS: IntCounter =
        register_int_counter!("catalog_cache_hits_total", "Catalog requests served from cache").unwrap();
    static ref CACHE_MISSES: IntCounter =
        register_int_counter!("catalog_cache_misses_total", "Catalog requests that started a load").unwrap();
    static ref CACHE_WAITS: IntCounter =
        register_int_counter!("catalog_cache_waits_total", "Catalog requests that joined an in-flight load").unwrap();
    static ref CATALOG_LOADS: IntCounter =
        register_int_counter!("catalog_loads_total", "Successful catalog loads").unwrap();
    static ref LOAD_FAILURES: IntCounter =
        register_int_counter!("catalog_load_failures_total", "Failed catalog loads").unwrap();
}

pub type LoadResult = Result<Arc<ParsedCatalog>, FetchError>;

type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

struct CacheEntry {
    catalog: Arc<ParsedCatalog>,
    created_at: Instant,
}

/// Entry map and in-flight map, shared with running loads
#[derive(Default)]
struct CacheState {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    in_flight: Mutex<HashMap<CacheKey, SharedLoad>>,
}

impl CacheState {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<CacheKey, SharedLoad>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh(&self, key: &CacheKey, ttl: Duration) -> Option<Arc<ParsedCatalog>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.created_at.elapsed() < ttl)
            .map(|entry| Arc::clone(&entry.catalog))
    }

    fn store(&self, key: CacheKey, catalog: Arc<ParsedCatalog>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key,
            CacheEntry {
                catalog,
                created_at: Instant::now(),
            },
        );
    }
}

/// Releases the in-flight marker when a load ends, including on panic.
/// Dropped after the entry is stored so waiters never miss both.
struct InFlightGuard {
    state: Arc<CacheState>,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.in_flight().remove(&self.key);
    }
}

/// Snapshot for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
}

/// Keyed catalog cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CatalogCache {
    source: Arc<dyn PlaylistSource>,
    parser: M3UParser,
    ttl: Duration,
    state: Arc<CacheState>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn PlaylistSource>, parser: M3UParser, ttl: Duration) -> Self {
        Self {
            source,
            parser,
            ttl,
            state: Arc::new(CacheState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached catalog for this account's source, loading it if
    /// absent or older than the TTL
    pub async fn get_or_load(&self, account: &AccountRecord) -> LoadResult {
        let key = CacheKey::for_account(account);

        if let Some(catalog) = self.state.fresh(&key, self.ttl) {
            CACHE_HITS.inc();
            tracing::debug!(key = %key, account = %account.username, "catalog cache hit");
            return Ok(catalog);
        }

        self.join_or_start(key, account).await
    }

    pub fn stats(&self) -> CacheStats {
        let in_flight = self.state.in_flight().len();
        let entries = self
            .state
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        CacheStats { entries, in_flight }
    }

    fn join_or_start(&self, key: CacheKey, account: &AccountRecord) -> SharedLoad {
        let mut in_flight = self.state.in_flight();

        if let Some(load) = in_flight.get(&key) {
            CACHE_WAITS.inc();
            tracing::info!(key = %key, account = %account.username, "waiting for in-flight catalog load");
            return load.clone();
        }

        // A load may have completed between the lock-free miss and here
        if let Some(catalog) = self.state.fresh(&key, self.ttl) {
            CACHE_HITS.inc();
            return futures::future::ready(Ok(catalog)).boxed().shared();
        }

        CACHE_MISSES.inc();
        tracing::info!(key = %key, account = %account.username, "catalog cache miss, loading");

        let load = self.spawn_load(key.clone(), account.clone());
        in_flight.insert(key, load.clone());
        load
    }

    /// Must be called with the in-flight lock held so the guard cannot
    /// release the marker before it is inserted
    fn spawn_load(&self, key: CacheKey, account: AccountRecord) -> SharedLoad {
        let source = Arc::clone(&self.source);
        let parser = self.parser;
        let state = Arc::clone(&self.state);

        let handle = tokio::spawn(async move {
            let _guard = InFlightGuard {
                state: Arc::clone(&state),
                key: key.clone(),
            };
            let started = Instant::now();

            let result = load_catalog(source.as_ref(), parser, &account).await;
            match result {
                Ok(ref catalog) => {
                    state.store(key.clone(), Arc::clone(catalog));
                    CATALOG_LOADS.inc();
                    tracing::info!(
                        key = %key,
                        entries = catalog.total_entries(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "catalog cached"
                    );
                }
                Err(ref e) => {
                    LOAD_FAILURES.inc();
                    tracing::warn!(key = %key, error = %e, "catalog load failed");
                }
            }
            result
        });

        handle
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(FetchError::FetchFailed(format!("catalog load aborted: {}", e)))
                })
            })
            .boxed()
            .shared()
    }
}

async fn load_catalog(
    source: &dyn PlaylistSource,
    parser: M3UParser,
    account: &AccountRecord,
) -> LoadResult {
    let text = source.resolve(account).await?;
    tracing::info!(chars = text.len(), "parsing playlist");

    let catalog = tokio::task::spawn_blocking(move || parser.parse(&text))
        .await
        .map_err(|e| FetchError::FetchFailed(format!("playlist parse aborted: {}", e)))?;

    Ok(Arc::new(catalog))
}
