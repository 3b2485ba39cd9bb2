//! Per-(name, record type) record store with TTL freshness.
//!
//! Stale entries are pruned lazily when their bucket is next read. Concurrent
//! misses on the same bucket may both reach the network; both results are
//! kept.

use conduit_dns_domain::DomainError;
use dashmap::DashMap;
use hickory_proto::rr::{Name, Record, RecordType};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    record: Record,
    inserted: Instant,
}

impl Entry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted) <= Duration::from_secs(self.record.ttl() as u64)
    }
}

type BucketKey = (Name, RecordType);

pub struct RecordCache {
    buckets: DashMap<BucketKey, Vec<Entry>>,
    clock: Arc<dyn Clock>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            clock,
        }
    }

    fn key(name: &Name, record_type: RecordType) -> BucketKey {
        let mut name = name.to_lowercase();
        name.set_fqdn(true);
        (name, record_type)
    }

    /// Adds `record` to the bucket; earlier records of the bucket are kept.
    pub fn store(&self, name: &Name, record_type: RecordType, record: Record) {
        let entry = Entry {
            record,
            inserted: self.clock.now(),
        };
        self.buckets
            .entry(Self::key(name, record_type))
            .or_default()
            .push(entry);
    }

    /// Fresh records of one bucket; stale ones are dropped on the way.
    pub fn lookup(&self, name: &Name, record_type: RecordType) -> Vec<Record> {
        self.read_bucket(name, record_type, None)
    }

    /// Reads a bucket, keeping entries stored at or after `stored_since`
    /// even when their TTL has already run out.
    fn read_bucket(
        &self,
        name: &Name,
        record_type: RecordType,
        stored_since: Option<Instant>,
    ) -> Vec<Record> {
        let key = Self::key(name, record_type);
        let now = self.clock.now();

        let Some(mut bucket) = self.buckets.get_mut(&key) else {
            return Vec::new();
        };
        bucket.retain(|entry| {
            entry.is_fresh(now) || stored_since.is_some_and(|since| entry.inserted >= since)
        });
        let records: Vec<Record> = bucket.iter().map(|entry| entry.record.clone()).collect();
        let emptied = bucket.is_empty();
        drop(bucket);

        if emptied {
            self.buckets.remove_if(&key, |_, entries| entries.is_empty());
        }
        records
    }

    /// Fresh records for every type, calling `on_miss` for the types that
    /// have none and reading their bucket again afterwards.
    ///
    /// Records stored by `on_miss` are returned once even when their TTL is
    /// zero; later reads treat them as stale.
    ///
    /// `on_miss` is expected to `store` what it finds. Its error aborts the
    /// fetch; records it stored for other types stay cached.
    pub async fn fetch<F, Fut>(
        &self,
        name: &Name,
        record_types: &[RecordType],
        mut on_miss: F,
    ) -> Result<Vec<Record>, DomainError>
    where
        F: FnMut(Name, RecordType) -> Fut,
        Fut: Future<Output = Result<(), DomainError>>,
    {
        let mut records = Vec::new();

        for &record_type in record_types {
            let mut found = self.lookup(name, record_type);

            if found.is_empty() {
                debug!(name = %name, record_type = %record_type, "Cache miss");
                let missed_at = self.clock.now();
                on_miss(name.clone(), record_type).await?;
                // What the miss just stored is returned even if already expired.
                found = self.read_bucket(name, record_type, Some(missed_at));
            }

            records.extend(found);
        }

        Ok(records)
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&self) {
        self.buckets.clear();
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}
