//! # RocksDB Store Adapter
//!
//! Durable implementation of every store port on a pessimistic
//! `TransactionDB`.
//!
//! ## Key layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `enroll:count` | committed record count, u64 big-endian |
//! | `enroll:email:{email}` | JSON [`EnrollmentRecord`] |
//! | `enroll:pos:{position:020}` | email holding that position |
//! | `rl:{scope prefix}:{identity}` | JSON [`WindowLog`]: window width and admission instants (ms) |
//! | `evt:{event id}` | claim time, RFC 3339 |
//!
//! Every read that feeds a write goes through `get_for_update`, so two
//! transactions touching the same key serialize on its lock. Conflicts
//! (`Busy`, `TimedOut`, `TryAgain`) are retried a bounded number of times.
//!
//! Windows are only pruned when their own key is hit, so idle keys are
//! deleted by a sweep that runs at most once per
//! [`SWEEP_INTERVAL`](crate::domain::rate_limit::SWEEP_INTERVAL).
//!
//! All RocksDB calls are blocking and run on `spawn_blocking`. The spawned
//! task finishes its transaction even if the awaiting request is dropped.

use crate::domain::entities::{EnrollmentRecord, NewEnrollment};
use crate::domain::errors::StoreError;
use crate::domain::rate_limit::{SweepSchedule, WindowLog, WindowState};
use crate::ports::{EnrollmentStore, ProcessedEventStore, RateLimitStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    Direction, ErrorKind, IteratorMode, MultiThreaded, Options, Transaction, TransactionDB,
    TransactionDBOptions, TransactionOptions, WriteOptions,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type Db = TransactionDB<MultiThreaded>;

const COUNT_KEY: &[u8] = b"enroll:count";
const WINDOW_PREFIX: &[u8] = b"rl:";

/// RocksDB configuration.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// fsync on commit (default: true for durability)
    pub sync_writes: bool,
    /// How long a transaction waits for a row lock (default: 500ms)
    pub lock_timeout: Duration,
    /// Commit attempts before reporting contention (default: 5)
    pub max_attempts: u32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/intake".to_string(),
            sync_writes: true,
            lock_timeout: Duration::from_millis(500),
            max_attempts: 5,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
            ..Default::default()
        }
    }
}

/// RocksDB-backed store implementing all store ports.
pub struct RocksDbStore {
    db: Arc<Db>,
    config: Arc<RocksDbConfig>,
    sweep: SweepSchedule,
}

impl RocksDbStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(config.lock_timeout.as_millis() as i64);

        let db = Db::open(&opts, &txn_opts, &config.path)
            .map_err(|e| StoreError::io(format!("Failed to open RocksDB: {e}")))?;

        info!(path = %config.path, "RocksDB store opened");

        Ok(Self {
            db: Arc::new(db),
            config: Arc::new(config),
            sweep: SweepSchedule::default(),
        })
    }

    /// Delete every rate-limit window that is idle at `now_ms`.
    ///
    /// Candidates are found with a plain scan, then re-checked under row
    /// locks so a window hit in between is kept.
    pub async fn sweep_idle_windows(&self, now_ms: u64) -> Result<usize, StoreError> {
        let idle = self
            .read(move |db| {
                let mut keys = Vec::new();
                for item in db.iterator(IteratorMode::From(WINDOW_PREFIX, Direction::Forward)) {
                    let (key, value) = item.map_err(map_err)?;
                    if !key.starts_with(WINDOW_PREFIX) {
                        break;
                    }
                    if window_is_idle(&value, now_ms) {
                        keys.push(key.to_vec());
                    }
                }
                Ok(keys)
            })
            .await?;

        if idle.is_empty() {
            return Ok(0);
        }

        self.transact(move |txn| {
            let mut removed = 0;
            for key in &idle {
                if let Some(value) = txn.get_for_update(key, true).map_err(map_err)? {
                    if window_is_idle(&value, now_ms) {
                        txn.delete(key).map_err(map_err)?;
                        removed += 1;
                    }
                }
            }
            Ok(removed)
        })
        .await
    }

    /// Run `op` in a transaction on the blocking pool, retrying conflicts.
    async fn transact<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: Fn(&Transaction<'_, Db>) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || run_transaction(&db, &config, op))
            .await
            .map_err(|e| StoreError::io(format!("store task failed: {e}")))?
    }

    async fn read<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Db) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StoreError::io(format!("store task failed: {e}")))?
    }
}

fn run_transaction<T, F>(db: &Db, config: &RocksDbConfig, op: F) -> Result<T, StoreError>
where
    F: Fn(&Transaction<'_, Db>) -> Result<T, StoreError>,
{
    let mut write_opts = WriteOptions::default();
    write_opts.set_sync(config.sync_writes);
    let txn_opts = TransactionOptions::default();

    let mut attempt = 0;
    loop {
        attempt += 1;
        let txn = db.transaction_opt(&write_opts, &txn_opts);
        let result = op(&txn).and_then(|value| txn.commit().map(|()| value).map_err(map_err));

        match result {
            Err(StoreError::Contention { message }) if attempt < config.max_attempts => {
                debug!(attempt, message = %message, "Transaction conflict, retrying");
            }
            other => return other,
        }
    }
}

fn map_err(e: rocksdb::Error) -> StoreError {
    match e.kind() {
        ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain => StoreError::Contention {
            message: e.to_string(),
        },
        _ => StoreError::io(e.to_string()),
    }
}

fn email_key(email: &str) -> Vec<u8> {
    format!("enroll:email:{email}").into_bytes()
}

fn position_key(position: u64) -> Vec<u8> {
    format!("enroll:pos:{position:020}").into_bytes()
}

fn window_key(key: &str) -> Vec<u8> {
    format!("rl:{key}").into_bytes()
}

/// Undecodable values count as idle so they cannot pin a key forever.
fn window_is_idle(value: &[u8], now_ms: u64) -> bool {
    serde_json::from_slice::<WindowLog>(value).map_or(true, |log| log.is_idle(now_ms))
}

fn event_key(event_id: &str) -> Vec<u8> {
    format!("evt:{event_id}").into_bytes()
}

fn decode_count(bytes: Option<Vec<u8>>) -> Result<u64, StoreError> {
    match bytes {
        None => Ok(0),
        Some(bytes) => {
            let raw: [u8; 8] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| StoreError::serialization("count is not 8 bytes"))?;
            Ok(u64::from_be_bytes(raw))
        }
    }
}

#[async_trait]
impl RateLimitStore for RocksDbStore {
    async fn hit(
        &self,
        key: &str,
        now_ms: u64,
        limit: u32,
        window: Duration,
    ) -> Result<WindowState, StoreError> {
        let key = window_key(key);
        let state = self
            .transact(move |txn| {
                let mut log: WindowLog = match txn.get_for_update(&key, true).map_err(map_err)? {
                    Some(bytes) => serde_json::from_slice(&bytes)?,
                    None => WindowLog::default(),
                };
                let state = log.hit(now_ms, limit, window);
                if log.entries.is_empty() {
                    txn.delete(&key).map_err(map_err)?;
                } else {
                    txn.put(&key, serde_json::to_vec(&log)?).map_err(map_err)?;
                }
                Ok(state)
            })
            .await?;

        if self.sweep.due(now_ms) {
            match self.sweep_idle_windows(now_ms).await {
                Ok(0) => {}
                Ok(swept) => debug!(swept, "Expired idle rate-limit windows"),
                Err(e) => warn!(error = %e, "Rate-limit window sweep failed"),
            }
        }
        Ok(state)
    }
}

#[async_trait]
impl EnrollmentStore for RocksDbStore {
    async fn insert_next(
        &self,
        enrollment: NewEnrollment,
        created_at: DateTime<Utc>,
    ) -> Result<EnrollmentRecord, StoreError> {
        self.transact(move |txn| {
            let email_key = email_key(enrollment.email());
            if txn.get_for_update(&email_key, true).map_err(map_err)?.is_some() {
                return Err(StoreError::Duplicate {
                    key: enrollment.email().to_string(),
                });
            }

            let count = decode_count(txn.get_for_update(COUNT_KEY, true).map_err(map_err)?)?;
            let position = count + 1;
            let record = enrollment.clone().into_record(position, created_at);

            txn.put(&email_key, serde_json::to_vec(&record)?).map_err(map_err)?;
            txn.put(position_key(position), record.email.as_bytes())
                .map_err(map_err)?;
            txn.put(COUNT_KEY, position.to_be_bytes()).map_err(map_err)?;
            Ok(record)
        })
        .await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.read(|db| decode_count(db.get(COUNT_KEY).map_err(map_err)?))
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<EnrollmentRecord>, StoreError> {
        let key = email_key(email);
        self.read(move |db| match db.get(&key).map_err(map_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        })
        .await
    }
}

#[async_trait]
impl ProcessedEventStore for RocksDbStore {
    async fn claim(&self, event_id: &str, claimed_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let key = event_key(event_id);
        let stamp = claimed_at.to_rfc3339();
        self.transact(move |txn| {
            if txn.get_for_update(&key, true).map_err(map_err)?.is_some() {
                return Ok(false);
            }
            txn.put(&key, stamp.as_bytes()).map_err(map_err)?;
            Ok(true)
        })
        .await
    }

    async fn release(&self, event_id: &str) -> Result<(), StoreError> {
        let key = event_key(event_id);
        self.transact(move |txn| txn.delete(&key).map_err(map_err))
            .await
    }

    async fn is_processed(&self, event_id: &str) -> Result<bool, StoreError> {
        let key = event_key(event_id);
        self.read(move |db| Ok(db.get(&key).map_err(map_err)?.is_some()))
            .await
    }
}
