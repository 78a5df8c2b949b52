//! Read engine
//!
//! Turns a [`CursorTable`] into one multi-log store query and advances the
//! table from whatever the store returns.
//!
//! Two policies:
//!
//! - [`ReadPolicy::Ordered`]: everything after each cursor, oldest first, as
//!   one blocking multi-log read
//! - [`ReadPolicy::Latest`]: the newest entries after each cursor from a
//!   non-blocking reverse scan, falling back to the ordered read when the
//!   scan finds nothing in any log

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidelog_core::{
    Bound, CursorTable, LogBatch, LogInfo, Position, RangeQuery, ReadBatch, SharedStore,
    batch_is_empty, batch_len,
};
use tracing::{debug, instrument, trace};

use crate::error::{EngineError, EngineResult};

/// How a read selects entries after each cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPolicy {
    /// Every entry after the cursor, in position order
    #[default]
    Ordered,
    /// Only the most recent entries after the cursor, skipping older ones
    Latest,
}

impl ReadPolicy {
    /// Policy selected by a `latest` flag
    pub fn from_latest(latest: bool) -> Self {
        if latest {
            ReadPolicy::Latest
        } else {
            ReadPolicy::Ordered
        }
    }
}

/// One-log range scan parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    /// Lower edge
    pub start: Position,
    /// Upper edge, always inclusive
    pub end: Position,
    /// Maximum entries (`None` = all)
    pub count: Option<usize>,
    /// Whether `start` itself may be returned
    pub inclusive: bool,
}

impl Default for RangeSpec {
    fn default() -> Self {
        Self {
            start: Position::BEGINNING,
            end: Position::END,
            count: None,
            inclusive: true,
        }
    }
}

impl RangeSpec {
    fn to_query(self, log: &str) -> RangeQuery {
        RangeQuery {
            log: log.to_string(),
            start: Bound::lower(self.start, self.inclusive),
            end: Bound::Inclusive(self.end),
            count: self.count,
        }
    }
}

/// Cursor-driven reader over a shared store
#[derive(Clone)]
pub struct ReadEngine {
    store: SharedStore,
}

impl std::fmt::Debug for ReadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadEngine").finish_non_exhaustive()
    }
}

impl ReadEngine {
    /// Create a reader over the given store
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Read up to `count` entries per log after the cursors and advance them
    ///
    /// `block` bounds how long an ordered read waits for data: `None` waits
    /// indefinitely, `Some(Duration::ZERO)` returns at once. The returned
    /// batch has one element per cursor, in cursor order, each ascending by
    /// position. Per-log store failures are attached to their element.
    #[instrument(skip(self, cursor), fields(logs = cursor.len()))]
    pub async fn read(
        &self,
        cursor: &mut CursorTable,
        policy: ReadPolicy,
        count: usize,
        block: Option<Duration>,
    ) -> EngineResult<ReadBatch> {
        if count == 0 {
            return Err(EngineError::invalid("count must be at least 1"));
        }

        let batch = match policy {
            ReadPolicy::Ordered => self.read_ordered(cursor, count, block).await?,
            ReadPolicy::Latest => match self.read_newest(cursor, count).await? {
                Some(batch) => batch,
                None => {
                    trace!("Reverse scan empty, falling back to blocking read");
                    self.read_ordered(cursor, count, block).await?
                }
            },
        };

        let moved = cursor.advance(&batch);
        debug!(entries = batch_len(&batch), moved, "Read batch");
        Ok(batch)
    }

    async fn read_ordered(
        &self,
        cursor: &CursorTable,
        count: usize,
        block: Option<Duration>,
    ) -> EngineResult<ReadBatch> {
        let batch = self.store.read_after(cursor.as_slice(), count, block).await?;
        Self::check_shape(cursor.len(), batch.len())?;
        Ok(batch)
    }

    /// Non-blocking reverse scan; `None` when no log has anything new
    ///
    /// Per-log errors alone do not count as news; the blocking fallback
    /// reports them.
    async fn read_newest(
        &self,
        cursor: &CursorTable,
        count: usize,
    ) -> EngineResult<Option<ReadBatch>> {
        let queries: Vec<RangeQuery> = cursor
            .iter()
            .map(|(log, position)| RangeQuery::after(log, position, count))
            .collect();
        let mut batch = self.store.range_batch(&queries, true).await?;
        Self::check_shape(queries.len(), batch.len())?;

        if batch_is_empty(&batch) {
            return Ok(None);
        }
        for log_batch in &mut batch {
            log_batch.entries.reverse();
        }
        Ok(Some(batch))
    }

    fn check_shape(expected: usize, actual: usize) -> EngineResult<()> {
        if expected != actual {
            return Err(EngineError::ResultCountMismatch { expected, actual });
        }
        Ok(())
    }

    /// Entries of one log between two positions, oldest first
    #[instrument(skip(self))]
    pub async fn range(&self, log: &str, spec: RangeSpec) -> EngineResult<LogBatch> {
        self.scan(log, spec, false).await
    }

    /// Entries of one log between two positions, newest first
    #[instrument(skip(self))]
    pub async fn rev_range(&self, log: &str, spec: RangeSpec) -> EngineResult<LogBatch> {
        self.scan(log, spec, true).await
    }

    async fn scan(&self, log: &str, spec: RangeSpec, reverse: bool) -> EngineResult<LogBatch> {
        let mut batch = self.store.range_batch(&[spec.to_query(log)], reverse).await?;
        let log_batch = batch
            .pop()
            .ok_or(EngineError::ResultCountMismatch {
                expected: 1,
                actual: 0,
            })?;
        match log_batch.error {
            Some(e) => Err(e.into()),
            None => Ok(log_batch),
        }
    }

    /// Number of entries in a log
    pub async fn len(&self, log: &str) -> EngineResult<usize> {
        Ok(self.store.len(log).await?)
    }

    /// Summary of a log, `None` if it does not exist
    pub async fn info(&self, log: &str) -> EngineResult<Option<LogInfo>> {
        Ok(self.store.info(log).await?)
    }

    /// Names of all logs
    pub async fn logs(&self) -> EngineResult<Vec<String>> {
        Ok(self.store.logs().await?)
    }

    /// Delete logs, returning how many existed
    #[instrument(skip(self))]
    pub async fn delete(&self, logs: &[String]) -> EngineResult<usize> {
        let removed = self.store.delete(logs).await?;
        debug!(removed, "Deleted logs");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tidelog_core::{AppendRequest, LogStore, ManualClock, StoreError};
    use tidelog_storage::InMemoryLogStore;

    use super::*;

    fn setup() -> (Arc<InMemoryLogStore<ManualClock>>, ReadEngine) {
        let store = Arc::new(InMemoryLogStore::with_clock(ManualClock::from_millis(
            1_650_811_721_065,
        )));
        let engine = ReadEngine::new(store.clone());
        (store, engine)
    }

    async fn fill(store: &InMemoryLogStore<ManualClock>, log: &str, payloads: &[&str]) -> Vec<Position> {
        let requests: Vec<_> = payloads
            .iter()
            .map(|p| AppendRequest::new(log, p.to_string()))
            .collect();
        store.append_batch(&requests, None).await.unwrap()
    }

    fn payloads(batch: &LogBatch) -> Vec<String> {
        batch
            .entries
            .iter()
            .map(|e| String::from_utf8_lossy(&e.payload).into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_ordered_read_returns_everything_after_cursor() {
        let (store, engine) = setup();
        let positions = fill(&store, "a", &["1", "2", "3"]).await;

        let mut cursor = CursorTable::from_positions([("a", positions[0])]);
        let batch = engine
            .read(&mut cursor, ReadPolicy::Ordered, 10, Some(Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(payloads(&batch[0]), vec!["2", "3"]);
        assert_eq!(cursor.get("a"), Some(positions[2]));
    }

    #[tokio::test]
    async fn test_latest_read_skips_to_newest() {
        let (store, engine) = setup();
        let positions = fill(&store, "a", &["1", "2", "3", "4"]).await;

        let mut cursor = CursorTable::from_positions([("a", Position::BEGINNING)]);
        let batch = engine
            .read(&mut cursor, ReadPolicy::Latest, 2, Some(Duration::ZERO))
            .await
            .unwrap();

        // Newest two, delivered oldest first
        assert_eq!(payloads(&batch[0]), vec!["3", "4"]);
        assert_eq!(cursor.get("a"), Some(positions[3]));

        // Nothing new: the fallback read does not block
        let batch = engine
            .read(&mut cursor, ReadPolicy::Latest, 2, Some(Duration::ZERO))
            .await
            .unwrap();
        assert!(batch_is_empty(&batch));
        assert_eq!(cursor.get("a"), Some(positions[3]));
    }

    #[tokio::test]
    async fn test_latest_read_falls_back_to_blocking_read() {
        let (store, engine) = setup();
        let mut cursor = CursorTable::from_positions([("a", Position::BEGINNING)]);

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                store
                    .append_batch(&[AppendRequest::new("a", "late")], None)
                    .await
                    .unwrap()
            })
        };

        let batch = engine
            .read(&mut cursor, ReadPolicy::Latest, 1, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        let written = writer.await.unwrap();

        assert_eq!(payloads(&batch[0]), vec!["late"]);
        assert_eq!(cursor.get("a"), Some(written[0]));
    }

    #[tokio::test]
    async fn test_per_log_failure_does_not_discard_other_logs() {
        let (store, engine) = setup();
        store.set_value("plain", "x").unwrap();
        fill(&store, "a", &["1"]).await;

        let mut cursor =
            CursorTable::from_positions([("plain", Position::BEGINNING), ("a", Position::BEGINNING)]);
        for policy in [ReadPolicy::Ordered, ReadPolicy::Latest] {
            let mut cursor = cursor.clone();
            let batch = engine
                .read(&mut cursor, policy, 5, Some(Duration::ZERO))
                .await
                .unwrap();
            assert_eq!(batch[0].error, Some(StoreError::WrongType("plain".into())));
            assert_eq!(payloads(&batch[1]), vec!["1"]);
        }
        engine
            .read(&mut cursor, ReadPolicy::Ordered, 5, Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(cursor.get("plain"), Some(Position::BEGINNING));
    }

    #[tokio::test]
    async fn test_zero_count_is_rejected() {
        let (_store, engine) = setup();
        let mut cursor = CursorTable::from_positions([("a", Position::BEGINNING)]);
        let err = engine
            .read(&mut cursor, ReadPolicy::Ordered, 0, Some(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_range_inclusive_and_exclusive() {
        let (store, engine) = setup();
        let positions = fill(&store, "a", &["1", "2", "3"]).await;

        let inclusive = RangeSpec {
            start: positions[1],
            ..RangeSpec::default()
        };
        let batch = engine.range("a", inclusive).await.unwrap();
        assert_eq!(payloads(&batch), vec!["2", "3"]);

        let exclusive = RangeSpec {
            inclusive: false,
            ..inclusive
        };
        let batch = engine.range("a", exclusive).await.unwrap();
        assert_eq!(payloads(&batch), vec!["3"]);

        let newest = RangeSpec {
            count: Some(1),
            ..RangeSpec::default()
        };
        let batch = engine.rev_range("a", newest).await.unwrap();
        assert_eq!(payloads(&batch), vec!["3"]);
    }

    #[tokio::test]
    async fn test_range_surfaces_wrong_type() {
        let (store, engine) = setup();
        store.set_value("plain", "x").unwrap();
        let err = engine.range("plain", RangeSpec::default()).await.unwrap_err();
        assert_eq!(err, EngineError::Store(StoreError::WrongType("plain".into())));
    }

    #[tokio::test]
    async fn test_len_info_logs_delete() {
        let (store, engine) = setup();
        fill(&store, "a", &["1", "2"]).await;
        fill(&store, "b", &["3"]).await;

        assert_eq!(engine.len("a").await.unwrap(), 2);
        assert_eq!(engine.logs().await.unwrap(), vec!["a", "b"]);
        assert_eq!(engine.info("b").await.unwrap().unwrap().length, 1);
        assert_eq!(engine.delete(&["a".into()]).await.unwrap(), 1);
        assert_eq!(engine.len("a").await.unwrap(), 0);
    }

    #[test]
    fn test_policy_from_latest() {
        assert_eq!(ReadPolicy::from_latest(true), ReadPolicy::Latest);
        assert_eq!(ReadPolicy::from_latest(false), ReadPolicy::Ordered);
    }
}
