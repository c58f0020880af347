//! Request pipeline: cache lookup, device fetch, parse, encode, store.
//!
//! [`ProgramGateway::handle`] never fails. Fetch errors are rendered into
//! the payload's `status` field with `valid = false`, so every caller gets a
//! well-formed JSON document.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::cache::{CacheKey, ResponseCache};
use crate::config::RelayConfig;
use crate::fetcher::FetcherFactory;
use crate::program::{encode, parse};

/// Outcome of one device round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub raw_text: String,
    pub succeeded: bool,
    pub status: String,
}

impl FetchResult {
    pub fn success(raw_text: String) -> Self {
        Self {
            raw_text,
            succeeded: true,
            status: "ok".to_string(),
        }
    }

    pub fn failure(status: String) -> Self {
        Self {
            raw_text: String::new(),
            succeeded: false,
            status,
        }
    }

    /// A result is valid when the fetch succeeded and produced visible text.
    /// The status wording plays no part.
    pub fn is_valid(&self) -> bool {
        self.succeeded && !self.raw_text.trim().is_empty()
    }
}

type FlightMap = Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>;

/// Removes a key's flight lock from the map once no other request holds it.
struct FlightRelease<'a> {
    flights: &'a FlightMap,
    key: &'a CacheKey,
    flight: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for FlightRelease<'_> {
    fn drop(&mut self) {
        let mut map = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        // Two references left means the map and us: nobody else is waiting.
        if map
            .get(self.key)
            .is_some_and(|f| Arc::ptr_eq(f, &self.flight) && Arc::strong_count(f) <= 2)
        {
            map.remove(self.key);
        }
    }
}

/// Serves program payloads for `(port, address)` pairs.
pub struct ProgramGateway {
    cache: Arc<ResponseCache>,
    factory: Arc<dyn FetcherFactory>,
    command: String,
    /// Per-key fetch locks; `None` when coalescing is off.
    flights: Option<FlightMap>,
}

impl ProgramGateway {
    pub fn new(
        cache: Arc<ResponseCache>,
        factory: Arc<dyn FetcherFactory>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            factory,
            command: command.into(),
            flights: None,
        }
    }

    /// Build a gateway with a fresh cache sized from `config`.
    pub fn from_config(config: &RelayConfig, factory: Arc<dyn FetcherFactory>) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache_ttl()));
        Self::new(cache, factory, config.command.clone()).with_coalescing(config.coalesce_fetches)
    }

    /// Let concurrent misses on one key share a single device fetch.
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.flights = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Return the serialized payload for the device at `address:port`.
    pub async fn handle(&self, port: u64, address: &str) -> String {
        let key = CacheKey::new(port, address);
        let now = Instant::now();

        if let Some(cached) = self.cache.get(&key, now) {
            info!(port, address, "Returning cached program");
            return cached;
        }

        let Some(flights) = &self.flights else {
            return self.fetch_and_store(key, now).await;
        };

        let flight = flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        // Declared before the lock guard so it drops after it, also when the
        // request future is dropped mid-fetch.
        let release = FlightRelease {
            flights,
            key: &key,
            flight,
        };
        let _guard = release.flight.lock().await;

        // Another request may have filled the cache while we waited.
        match self.cache.get(&key, Instant::now()) {
            Some(cached) => {
                info!(port, address, "Returning program fetched by concurrent request");
                cached
            }
            None => self.fetch_and_store(key.clone(), now).await,
        }
    }

    async fn fetch_and_store(&self, key: CacheKey, now: Instant) -> String {
        let result = self.fetch(&key).await;
        let valid = result.is_valid();
        let payload = encode(parse(&result.raw_text), valid, &result.status);
        self.cache.put(key, now, payload.clone(), valid);
        payload
    }

    async fn fetch(&self, key: &CacheKey) -> FetchResult {
        let (port, address) = (key.port, key.address.as_str());
        info!(port, address, "Connecting to device");
        let fetcher = self.factory.fetcher(port, address);
        match fetcher.send_command(&self.command).await {
            Ok(text) => {
                info!(port, address, bytes = text.len(), "Retrieved program from device");
                FetchResult::success(text)
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(port, address, category = e.category(), error = %e, "Device fetch failed");
                } else {
                    error!(port, address, category = e.category(), error = %e, "Device fetch failed");
                }
                FetchResult::failure(e.to_string())
            }
        }
    }
}
