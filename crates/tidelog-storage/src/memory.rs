//! In-memory log store
//!
//! [`InMemoryLogStore`] keeps every log in one keyspace behind a single
//! lock, so each trait call is atomic across all the logs it touches. The
//! keyspace may also hold plain values; touching one as a log yields a
//! per-log [`StoreError::WrongType`].
//!
//! Blocking reads park on a `watch` channel that is bumped after every
//! append, then re-run the query until data arrives or the deadline passes.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tidelog_core::{
    AppendRequest, Clock, Entry, LogBatch, LogInfo, LogStore, Position, RangeQuery, ReadBatch,
    StoreError, SystemClock, TrimPolicy, WritePosition,
};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::trim::Trimmer;

/// One key of the keyspace
#[derive(Debug)]
enum Slot {
    Log(LogState),
    Value(Bytes),
}

#[derive(Debug, Default)]
struct LogState {
    /// Retained entries, ascending by position
    entries: VecDeque<Entry>,
    /// Last position ever assigned, survives trimming
    last_generated: Position,
    /// Largest position evicted by trimming
    max_deleted: Option<Position>,
    /// Entries ever appended
    entries_added: u64,
}

impl LogState {
    fn select(&self, query: &RangeQuery, reverse: bool) -> Vec<Entry> {
        let limit = query.count.unwrap_or(usize::MAX);
        let matching = |entry: &&Entry| query.contains(entry.position);
        if reverse {
            self.entries
                .iter()
                .rev()
                .filter(matching)
                .take(limit)
                .cloned()
                .collect()
        } else {
            self.entries
                .iter()
                .filter(matching)
                .take(limit)
                .cloned()
                .collect()
        }
    }

    fn push(&mut self, entry: Entry) {
        self.last_generated = entry.position;
        self.entries_added += 1;
        self.entries.push_back(entry);
    }

    fn evict(&mut self, count: usize) {
        for _ in 0..count {
            match self.entries.pop_front() {
                Some(evicted) => self.max_deleted = Some(evicted.position),
                None => break,
            }
        }
    }
}

/// Pick the position for one append given the log's last assigned position
fn assign_position(
    log: &str,
    requested: WritePosition,
    last: Position,
    now_millis: u64,
) -> Result<Position, StoreError> {
    match requested {
        WritePosition::Auto => {
            if now_millis > last.millis {
                Ok(Position::new(now_millis, 0))
            } else {
                last.successor()
                    .ok_or_else(|| StoreError::PositionNotIncreasing {
                        log: log.to_string(),
                        position: last,
                        last,
                    })
            }
        }
        WritePosition::At(position) if position.is_beginning() => Err(StoreError::ZeroPosition {
            log: log.to_string(),
            position,
        }),
        WritePosition::At(position) if position <= last => {
            Err(StoreError::PositionNotIncreasing {
                log: log.to_string(),
                position,
                last,
            })
        }
        WritePosition::At(position) => Ok(position),
    }
}

/// In-process multi-log store
///
/// Auto-assigned positions come from the store's [`Clock`], so tests can
/// drive them with a manual clock.
#[derive(Debug)]
pub struct InMemoryLogStore<C = SystemClock> {
    keyspace: RwLock<HashMap<String, Slot>>,
    /// Bumped after every successful append
    changes: watch::Sender<u64>,
    closed: AtomicBool,
    trimmer: Trimmer,
    clock: C,
}

impl Default for InMemoryLogStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLogStore<SystemClock> {
    /// Create an empty store on the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> InMemoryLogStore<C> {
    /// Create an empty store on a custom clock
    pub fn with_clock(clock: C) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            keyspace: RwLock::new(HashMap::new()),
            changes,
            closed: AtomicBool::new(false),
            trimmer: Trimmer::default(),
            clock,
        }
    }

    /// Use a custom trimmer
    pub fn with_trimmer(mut self, trimmer: Trimmer) -> Self {
        self.trimmer = trimmer;
        self
    }

    /// Get the trimmer
    pub fn trimmer(&self) -> &Trimmer {
        &self.trimmer
    }

    /// Store a plain (non-log) value, replacing whatever the key held
    pub fn set_value(&self, key: impl Into<String>, value: impl Into<Bytes>) -> Result<(), StoreError> {
        let mut keyspace = self.write()?;
        keyspace.insert(key.into(), Slot::Value(value.into()));
        Ok(())
    }

    /// Take the store offline; every later call fails with `Unavailable`
    ///
    /// Readers blocked in `read_after` wake up and fail too.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.changes.send_modify(|version| *version += 1);
        debug!("Store closed");
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::unavailable("store is closed"));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Slot>>, StoreError> {
        self.ensure_open()?;
        self.keyspace
            .read()
            .map_err(|_| StoreError::unavailable("keyspace lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Slot>>, StoreError> {
        self.ensure_open()?;
        self.keyspace
            .write()
            .map_err(|_| StoreError::unavailable("keyspace lock poisoned"))
    }

    fn now_millis(&self) -> u64 {
        self.clock.now_utc().timestamp_millis().max(0) as u64
    }

    fn query(&self, queries: &[RangeQuery], reverse: bool) -> Result<Vec<LogBatch>, StoreError> {
        let keyspace = self.read()?;
        let batch = queries
            .iter()
            .map(|query| match keyspace.get(&query.log) {
                Some(Slot::Log(state)) => LogBatch::new(&query.log, state.select(query, reverse)),
                Some(Slot::Value(_)) => {
                    LogBatch::failed(&query.log, StoreError::WrongType(query.log.clone()))
                }
                None => LogBatch::empty(&query.log),
            })
            .collect();
        Ok(batch)
    }

    fn append(
        &self,
        requests: &[AppendRequest],
        trim: Option<TrimPolicy>,
    ) -> Result<Vec<Position>, StoreError> {
        let mut keyspace = self.write()?;
        let now = self.now_millis();

        // Validate and assign every position before touching any log
        let mut staged: HashMap<&str, Position> = HashMap::new();
        let mut positions = Vec::with_capacity(requests.len());
        for request in requests {
            let log = request.log.as_str();
            if log.is_empty() {
                return Err(StoreError::UnknownLog(request.log.clone()));
            }
            let last = match staged.get(log) {
                Some(position) => *position,
                None => match keyspace.get(log) {
                    Some(Slot::Log(state)) => state.last_generated,
                    Some(Slot::Value(_)) => return Err(StoreError::WrongType(request.log.clone())),
                    None => Position::BEGINNING,
                },
            };
            let position = assign_position(log, request.position, last, now)?;
            staged.insert(log, position);
            positions.push(position);
        }

        for (request, position) in requests.iter().zip(&positions) {
            let slot = match keyspace.entry(request.log.clone()) {
                MapEntry::Occupied(occupied) => occupied.into_mut(),
                MapEntry::Vacant(vacant) => vacant.insert(Slot::Log(LogState::default())),
            };
            let Slot::Log(state) = slot else {
                continue;
            };
            state.push(
                Entry::new(*position, request.payload.clone()).with_metadata(request.metadata.clone()),
            );
            if let Some(policy) = trim {
                let excess = self.trimmer.excess(state.entries.len(), policy);
                if excess > 0 {
                    trace!(log = %request.log, excess, "Trimming log");
                    state.evict(excess);
                }
            }
        }

        Ok(positions)
    }
}

#[async_trait]
impl<C: Clock + 'static> LogStore for InMemoryLogStore<C> {
    async fn read_after(
        &self,
        cursors: &[(String, Position)],
        count: usize,
        block: Option<Duration>,
    ) -> Result<ReadBatch, StoreError> {
        let queries: Vec<RangeQuery> = cursors
            .iter()
            .map(|(log, cursor)| RangeQuery::after(log.clone(), *cursor, count.max(1)))
            .collect();
        let deadline = block.map(|timeout| tokio::time::Instant::now() + timeout);

        // Subscribe before the first query so no append can slip between
        // the check and the wait
        let mut changes = self.changes.subscribe();
        loop {
            // Only entries end the wait; per-log errors ride along with them
            // or with the timeout
            let batch = self.query(&queries, false)?;
            let ready = batch.iter().any(|b| !b.is_empty());
            if ready || block == Some(Duration::ZERO) {
                trace!(logs = cursors.len(), "Read completed");
                return Ok(batch);
            }

            let changed = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, changes.changed()).await {
                        Ok(changed) => changed,
                        Err(_) => {
                            trace!(logs = cursors.len(), "Read timed out");
                            return Ok(batch);
                        }
                    }
                }
                None => changes.changed().await,
            };
            if changed.is_err() {
                return Err(StoreError::unavailable("store dropped"));
            }
        }
    }

    async fn range_batch(
        &self,
        queries: &[RangeQuery],
        reverse: bool,
    ) -> Result<Vec<LogBatch>, StoreError> {
        self.query(queries, reverse)
    }

    async fn append_batch(
        &self,
        requests: &[AppendRequest],
        trim: Option<TrimPolicy>,
    ) -> Result<Vec<Position>, StoreError> {
        if requests.is_empty() {
            self.ensure_open()?;
            return Ok(Vec::new());
        }
        let positions = self.append(requests, trim)?;
        debug!(entries = positions.len(), "Appended batch");
        self.changes.send_modify(|version| *version += 1);
        Ok(positions)
    }

    async fn len(&self, log: &str) -> Result<usize, StoreError> {
        let keyspace = self.read()?;
        match keyspace.get(log) {
            Some(Slot::Log(state)) => Ok(state.entries.len()),
            Some(Slot::Value(_)) => Err(StoreError::WrongType(log.to_string())),
            None => Ok(0),
        }
    }

    async fn info(&self, log: &str) -> Result<Option<LogInfo>, StoreError> {
        let keyspace = self.read()?;
        match keyspace.get(log) {
            Some(Slot::Log(state)) => Ok(Some(LogInfo {
                name: log.to_string(),
                length: state.entries.len(),
                first_entry: state.entries.front().cloned(),
                last_entry: state.entries.back().cloned(),
                last_generated: state.last_generated,
                max_deleted: state.max_deleted,
                entries_added: state.entries_added,
            })),
            Some(Slot::Value(_)) => Err(StoreError::WrongType(log.to_string())),
            None => Ok(None),
        }
    }

    async fn logs(&self) -> Result<Vec<String>, StoreError> {
        let keyspace = self.read()?;
        let mut names: Vec<String> = keyspace
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Log(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, logs: &[String]) -> Result<usize, StoreError> {
        let mut keyspace = self.write()?;
        let removed = logs.iter().filter(|log| keyspace.remove(*log).is_some()).count();
        debug!(requested = logs.len(), removed, "Deleted logs");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tidelog_core::{Bound, ManualClock};

    use super::*;

    const T0: i64 = 1_650_811_721_065;

    fn store() -> InMemoryLogStore<ManualClock> {
        InMemoryLogStore::with_clock(ManualClock::from_millis(T0))
    }

    fn cursors(list: &[(&str, Position)]) -> Vec<(String, Position)> {
        list.iter().map(|(log, p)| (log.to_string(), *p)).collect()
    }

    fn all(log: &str) -> RangeQuery {
        RangeQuery {
            log: log.to_string(),
            start: Bound::Inclusive(Position::BEGINNING),
            end: Bound::Inclusive(Position::END),
            count: None,
        }
    }

    #[tokio::test]
    async fn test_auto_positions_increase_within_one_millisecond() {
        let store = store();
        let positions = store
            .append_batch(
                &[
                    AppendRequest::new("cam", "a"),
                    AppendRequest::new("cam", "b"),
                    AppendRequest::new("mic", "c"),
                ],
                None,
            )
            .await
            .unwrap();

        let now = T0 as u64;
        assert_eq!(
            positions,
            vec![
                Position::new(now, 0),
                Position::new(now, 1),
                Position::new(now, 0)
            ]
        );
    }

    #[tokio::test]
    async fn test_auto_position_follows_explicit_future_position() {
        let store = store();
        let future = Position::new(T0 as u64 + 10_000, 4);
        store
            .append_batch(&[AppendRequest::new("cam", "a").at(future)], None)
            .await
            .unwrap();
        let positions = store
            .append_batch(&[AppendRequest::new("cam", "b")], None)
            .await
            .unwrap();
        assert_eq!(positions, vec![Position::new(T0 as u64 + 10_000, 5)]);
    }

    #[tokio::test]
    async fn test_explicit_positions_must_increase() {
        let store = store();
        store
            .append_batch(&[AppendRequest::new("cam", "a").at(Position::new(5, 0))], None)
            .await
            .unwrap();

        let err = store
            .append_batch(&[AppendRequest::new("cam", "b").at(Position::new(5, 0))], None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::PositionNotIncreasing {
                log: "cam".into(),
                position: Position::new(5, 0),
                last: Position::new(5, 0),
            }
        );

        let err = store
            .append_batch(&[AppendRequest::new("new", "c").at(Position::BEGINNING)], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ZeroPosition { .. }));
    }

    #[tokio::test]
    async fn test_append_batch_is_all_or_nothing() {
        let store = store();
        store.set_value("plain", "not a log").unwrap();

        let err = store
            .append_batch(
                &[
                    AppendRequest::new("cam", "ok"),
                    AppendRequest::new("plain", "bad"),
                ],
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::WrongType("plain".into()));
        assert_eq!(store.len("cam").await.unwrap(), 0);
        assert!(store.logs().await.unwrap().is_empty());

        let err = store
            .append_batch(&[AppendRequest::new("", "x")], None)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::UnknownLog(String::new()));
    }

    #[tokio::test]
    async fn test_read_after_is_exclusive_and_ordered() {
        let store = store();
        let positions = store
            .append_batch(
                &[
                    AppendRequest::new("a", "1"),
                    AppendRequest::new("a", "2"),
                    AppendRequest::new("a", "3"),
                ],
                None,
            )
            .await
            .unwrap();

        let batch = store
            .read_after(&cursors(&[("a", positions[0]), ("missing", Position::BEGINNING)]), 10, Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].log, "a");
        let payloads: Vec<_> = batch[0].entries.iter().map(|e| e.payload.clone()).collect();
        assert_eq!(payloads, vec![Bytes::from("2"), Bytes::from("3")]);
        assert!(batch[1].is_empty());
    }

    #[tokio::test]
    async fn test_read_after_from_beginning_respects_count() {
        let store = store();
        for payload in ["1", "2", "3"] {
            store
                .append_batch(&[AppendRequest::new("a", payload)], None)
                .await
                .unwrap();
        }
        let batch = store
            .read_after(&cursors(&[("a", Position::BEGINNING)]), 2, Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(batch[0].entries.len(), 2);
        assert_eq!(batch[0].entries[0].payload, Bytes::from("1"));
    }

    #[tokio::test]
    async fn test_wrong_type_is_reported_per_log() {
        let store = store();
        store.set_value("plain", "x").unwrap();
        store
            .append_batch(&[AppendRequest::new("a", "1")], None)
            .await
            .unwrap();

        let batch = store
            .read_after(
                &cursors(&[("plain", Position::BEGINNING), ("a", Position::BEGINNING)]),
                1,
                Some(Duration::ZERO),
            )
            .await
            .unwrap();
        assert_eq!(batch[0].error, Some(StoreError::WrongType("plain".into())));
        assert_eq!(batch[1].entries.len(), 1);
        assert!(batch[1].error.is_none());
    }

    #[tokio::test]
    async fn test_wrong_type_does_not_end_a_blocking_read() {
        let store = store();
        store.set_value("plain", "x").unwrap();
        let cursors = cursors(&[("plain", Position::BEGINNING), ("a", Position::BEGINNING)]);

        let mut read = tokio_test::task::spawn(store.read_after(&cursors, 1, None));
        tokio_test::assert_pending!(read.poll());

        store
            .append_batch(&[AppendRequest::new("a", "1")], None)
            .await
            .unwrap();
        assert!(read.is_woken());
        let batch = tokio_test::assert_ready_ok!(read.poll());
        assert_eq!(batch[0].error, Some(StoreError::WrongType("plain".into())));
        assert_eq!(batch[1].entries.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_type_alone_waits_for_timeout() {
        let store = store();
        store.set_value("plain", "x").unwrap();

        let started = std::time::Instant::now();
        let batch = store
            .read_after(
                &cursors(&[("plain", Position::BEGINNING)]),
                1,
                Some(Duration::from_millis(30)),
            )
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(batch[0].error, Some(StoreError::WrongType("plain".into())));
    }

    #[tokio::test]
    async fn test_blocking_read_times_out_empty() {
        let store = store();
        let batch = store
            .read_after(&cursors(&[("a", Position::BEGINNING)]), 1, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(batch, vec![LogBatch::empty("a")]);
    }

    #[tokio::test]
    async fn test_blocking_read_wakes_on_append() {
        let store = Arc::new(store());
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .read_after(&cursors(&[("a", Position::BEGINNING)]), 1, None)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        store
            .append_batch(&[AppendRequest::new("a", "wake")], None)
            .await
            .unwrap();

        let batch = reader.await.unwrap().unwrap();
        assert_eq!(batch[0].entries[0].payload, Bytes::from("wake"));
    }

    #[tokio::test]
    async fn test_close_fails_calls_and_wakes_readers() {
        let store = Arc::new(store());
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .read_after(&cursors(&[("a", Position::BEGINNING)]), 1, None)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.close();

        let err = reader.await.unwrap().unwrap_err();
        assert!(err.is_fatal());
        assert!(store.logs().await.unwrap_err().is_fatal());
        assert!(store
            .append_batch(&[AppendRequest::new("a", "x")], None)
            .await
            .unwrap_err()
            .is_fatal());
    }

    #[tokio::test]
    async fn test_range_and_reverse_range() {
        let store = store();
        for (i, payload) in ["1", "2", "3", "4"].iter().enumerate() {
            store
                .append_batch(
                    &[AppendRequest::new("a", *payload).at(Position::new(10 + i as u64, 0))],
                    None,
                )
                .await
                .unwrap();
        }

        let forward = store
            .range_batch(
                &[RangeQuery {
                    log: "a".into(),
                    start: Bound::Exclusive(Position::new(10, 0)),
                    end: Bound::Inclusive(Position::new(12, 0)),
                    count: None,
                }],
                false,
            )
            .await
            .unwrap();
        let positions: Vec<_> = forward[0].entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![Position::new(11, 0), Position::new(12, 0)]);

        let mut newest = all("a");
        newest.count = Some(2);
        let reverse = store.range_batch(&[newest], true).await.unwrap();
        let positions: Vec<_> = reverse[0].entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![Position::new(13, 0), Position::new(12, 0)]);
    }

    #[tokio::test]
    async fn test_exact_trim_keeps_max_len() {
        let store = store();
        for _ in 0..5 {
            store
                .append_batch(&[AppendRequest::new("a", "x")], Some(TrimPolicy::exact(3)))
                .await
                .unwrap();
        }
        let info = store.info("a").await.unwrap().unwrap();
        assert_eq!(info.length, 3);
        assert_eq!(info.entries_added, 5);
        assert_eq!(info.max_deleted, Some(Position::new(T0 as u64, 1)));
        assert_eq!(info.last_generated, Position::new(T0 as u64, 4));
    }

    #[tokio::test]
    async fn test_approximate_trim_evicts_nodes() {
        let store = store().with_trimmer(Trimmer::new(4));
        let policy = Some(TrimPolicy::approximate(10));
        for _ in 0..13 {
            store
                .append_batch(&[AppendRequest::new("a", "x")], policy)
                .await
                .unwrap();
        }
        assert_eq!(store.len("a").await.unwrap(), 13);

        store
            .append_batch(&[AppendRequest::new("a", "x")], policy)
            .await
            .unwrap();
        assert_eq!(store.len("a").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_logs_info_and_delete() {
        let store = store();
        store.set_value("plain", "x").unwrap();
        store
            .append_batch(
                &[AppendRequest::new("b", "1"), AppendRequest::new("a", "2")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(store.logs().await.unwrap(), vec!["a", "b"]);
        assert!(store.info("missing").await.unwrap().is_none());
        assert_eq!(
            store.info("plain").await.unwrap_err(),
            StoreError::WrongType("plain".into())
        );
        let info = store.info("a").await.unwrap().unwrap();
        assert_eq!(info.first_entry, info.last_entry);

        let removed = store
            .delete(&["a".into(), "missing".into(), "plain".into()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.logs().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_metadata_is_stored() {
        let store = store();
        let mut metadata = tidelog_core::Metadata::new();
        metadata.insert("time_sync".into(), Bytes::from("1650811721.065"));
        store
            .append_batch(
                &[AppendRequest::new("a", "x").with_metadata(metadata.clone())],
                None,
            )
            .await
            .unwrap();
        let batch = store.range_batch(&[all("a")], false).await.unwrap();
        assert_eq!(batch[0].entries[0].metadata, metadata);
    }
}
