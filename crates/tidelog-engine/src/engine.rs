//! Engine facade and command dispatch

use std::time::Duration;

use tidelog_core::{AppendRequest, Clock, CursorTable, SharedStore};
use tracing::{debug, instrument};

use crate::command::{BatchView, Command, CommandReply, InfoView, RangeArgs};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::reader::{ReadEngine, ReadPolicy, RangeSpec};
use crate::writer::WriteEngine;

/// Read and write engines sharing one store handle and configuration
#[derive(Debug, Clone)]
pub struct Engine {
    reader: ReadEngine,
    writer: WriteEngine,
    config: EngineConfig,
}

impl Engine {
    /// Create both engines over the given store
    pub fn new(store: SharedStore, config: EngineConfig) -> Self {
        Self {
            reader: ReadEngine::new(store.clone()),
            writer: WriteEngine::new(store, config),
            config,
        }
    }

    /// Get the read engine
    pub fn reader(&self) -> &ReadEngine {
        &self.reader
    }

    /// Get the write engine
    pub fn writer(&self) -> &WriteEngine {
        &self.writer
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one command
    ///
    /// `clock` resolves `"$"` cursors in `READ`.
    #[instrument(skip(self, clock), fields(cmd = command.name()))]
    pub async fn execute<C: Clock>(&self, command: Command, clock: &C) -> EngineResult<CommandReply> {
        let reply = match command {
            Command::Read {
                cursors,
                latest,
                count,
                block_ms,
            } => {
                let mut cursor = CursorTable::init(cursors, "", clock);
                let count = count.unwrap_or(self.config.default_count);
                let block = Duration::from_millis(block_ms.unwrap_or(0));
                let batch = self
                    .reader
                    .read(&mut cursor, ReadPolicy::from_latest(latest), count, Some(block))
                    .await?;
                CommandReply::Read {
                    batch: batch.iter().map(BatchView::from).collect(),
                    cursor: cursor.as_slice().to_vec(),
                }
            }
            Command::Add { entries } => {
                let requests: Vec<AppendRequest> = entries.into_iter().map(Into::into).collect();
                let positions = self.writer.append_batch(&requests).await?;
                CommandReply::Added { positions }
            }
            Command::Range(args) => {
                let spec = Self::range_spec(&args)?;
                let batch = self.reader.range(&args.log, spec).await?;
                CommandReply::Range {
                    batch: BatchView::from(&batch),
                }
            }
            Command::RevRange(args) => {
                let spec = Self::range_spec(&args)?;
                let batch = self.reader.rev_range(&args.log, spec).await?;
                CommandReply::Range {
                    batch: BatchView::from(&batch),
                }
            }
            Command::Len { log } => {
                let length = self.reader.len(&log).await?;
                CommandReply::Len { log, length }
            }
            Command::Info { log } => {
                let info = self.reader.info(&log).await?;
                CommandReply::Info {
                    info: info.as_ref().map(InfoView::from),
                }
            }
            Command::Logs => CommandReply::Logs {
                logs: self.reader.logs().await?,
            },
            Command::Delete { logs } => CommandReply::Deleted {
                deleted: self.reader.delete(&logs).await?,
            },
        };
        debug!("Command executed");
        Ok(reply)
    }

    fn range_spec(args: &RangeArgs) -> EngineResult<RangeSpec> {
        if args.count == Some(0) {
            return Err(EngineError::invalid("count must be at least 1"));
        }
        Ok(RangeSpec {
            start: args.start_position()?,
            end: args.end_position()?,
            count: args.count,
            inclusive: args.inclusive,
        })
    }
}

impl Command {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Read { .. } => "READ",
            Command::Add { .. } => "ADD",
            Command::Range(_) => "RANGE",
            Command::RevRange(_) => "REVRANGE",
            Command::Len { .. } => "LEN",
            Command::Info { .. } => "INFO",
            Command::Logs => "LOGS",
            Command::Delete { .. } => "DELETE",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tidelog_core::{ManualClock, Position, PositionSpec, StoreError};
    use tidelog_storage::InMemoryLogStore;

    use super::*;
    use crate::command::parse_command;

    const T0: i64 = 1_650_811_721_065;

    fn setup() -> (Engine, ManualClock) {
        let clock = ManualClock::from_millis(T0);
        let store = Arc::new(InMemoryLogStore::with_clock(clock.clone()));
        (Engine::new(store, EngineConfig::default()), clock)
    }

    async fn run(engine: &Engine, clock: &ManualClock, json: &str) -> EngineResult<serde_json::Value> {
        let command = parse_command(json)?;
        let reply = engine.execute(command, clock).await?;
        Ok(serde_json::to_value(reply).unwrap())
    }

    #[test]
    fn test_parse_every_command() {
        let cases = [
            (r#"{"cmd":"READ","cursors":[["a","0"],["b","$"]]}"#, "READ"),
            (r#"{"cmd":"ADD","entries":[{"log":"a","payload":"x"}]}"#, "ADD"),
            (r#"{"cmd":"RANGE","log":"a"}"#, "RANGE"),
            (r#"{"cmd":"REVRANGE","log":"a","count":3}"#, "REVRANGE"),
            (r#"{"cmd":"LEN","log":"a"}"#, "LEN"),
            (r#"{"cmd":"INFO","log":"a"}"#, "INFO"),
            (r#"{"cmd":"LOGS"}"#, "LOGS"),
            (r#"{"cmd":"DELETE","logs":["a"]}"#, "DELETE"),
        ];
        for (json, name) in cases {
            assert_eq!(parse_command(json).unwrap().name(), name);
        }
    }

    #[test]
    fn test_parse_read_cursor_specs() {
        let command = parse_command(r#"{"cmd":"READ","cursors":[["a","0"],["b","$"],["c","5-1"]]}"#)
            .unwrap();
        let Command::Read { cursors, latest, .. } = command else {
            panic!("expected READ");
        };
        assert!(!latest);
        assert_eq!(
            cursors,
            vec![
                ("a".to_string(), PositionSpec::Beginning),
                ("b".to_string(), PositionSpec::Now),
                ("c".to_string(), PositionSpec::At(Position::new(5, 1))),
            ]
        );
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let err = parse_command(r#"{"cmd":"FLUSHALL"}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidCommand(_)));
        assert!(parse_command(r#"{"cmd":"READ","cursors":[["a","*"]]}"#).is_err());
    }

    #[tokio::test]
    async fn test_add_then_read() {
        let (engine, clock) = setup();
        let added = run(
            &engine,
            &clock,
            r#"{"cmd":"ADD","entries":[{"log":"a","payload":"x"},{"log":"a","payload":"y","metadata":{"k":"v"}}]}"#,
        )
        .await
        .unwrap();
        assert_eq!(added["reply"], "added");
        assert_eq!(added["positions"][1], format!("{T0}-1"));

        let read = run(&engine, &clock, r#"{"cmd":"READ","cursors":[["a","0"]],"count":10}"#)
            .await
            .unwrap();
        assert_eq!(read["batch"][0]["entries"][0]["payload"], "x");
        assert_eq!(read["batch"][0]["entries"][1]["metadata"]["k"], "v");
        assert_eq!(read["cursor"][0][1], format!("{T0}-1"));
    }

    #[tokio::test]
    async fn test_read_from_now_sees_nothing_older() {
        let (engine, clock) = setup();
        run(&engine, &clock, r#"{"cmd":"ADD","entries":[{"log":"a","payload":"old"}]}"#)
            .await
            .unwrap();
        clock.advance(Duration::from_millis(5));

        let read = run(&engine, &clock, r#"{"cmd":"READ","cursors":[["a","$"]]}"#)
            .await
            .unwrap();
        assert_eq!(read["batch"][0]["entries"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_range_commands() {
        let (engine, clock) = setup();
        run(
            &engine,
            &clock,
            r#"{"cmd":"ADD","entries":[{"log":"a","payload":"1","position":"10-0"},{"log":"a","payload":"2","position":"20-0"},{"log":"a","payload":"3","position":"30-0"}]}"#,
        )
        .await
        .unwrap();

        let range = run(&engine, &clock, r#"{"cmd":"RANGE","log":"a","start":"10","end":"20","inclusive":false}"#)
            .await
            .unwrap();
        assert_eq!(range["batch"]["entries"].as_array().unwrap().len(), 1);
        assert_eq!(range["batch"]["entries"][0]["payload"], "2");

        let rev = run(&engine, &clock, r#"{"cmd":"REVRANGE","log":"a","count":2}"#)
            .await
            .unwrap();
        assert_eq!(rev["batch"]["entries"][0]["payload"], "3");
        assert_eq!(rev["batch"]["entries"][1]["payload"], "2");

        let err = run(&engine, &clock, r#"{"cmd":"RANGE","log":"a","start":"abc"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Position(_)));
    }

    #[tokio::test]
    async fn test_len_info_logs_delete_commands() {
        let (engine, clock) = setup();
        run(&engine, &clock, r#"{"cmd":"ADD","entries":[{"log":"a","payload":"x"},{"log":"b","payload":"y"}]}"#)
            .await
            .unwrap();

        let len = run(&engine, &clock, r#"{"cmd":"LEN","log":"a"}"#).await.unwrap();
        assert_eq!(len["length"], 1);

        let info = run(&engine, &clock, r#"{"cmd":"INFO","log":"a"}"#).await.unwrap();
        assert_eq!(info["info"]["entries_added"], 1);
        assert_eq!(info["info"]["last_entry"]["payload"], "x");

        let missing = run(&engine, &clock, r#"{"cmd":"INFO","log":"zzz"}"#).await.unwrap();
        assert!(missing["info"].is_null());

        let logs = run(&engine, &clock, r#"{"cmd":"LOGS"}"#).await.unwrap();
        assert_eq!(logs["logs"], serde_json::json!(["a", "b"]));

        let deleted = run(&engine, &clock, r#"{"cmd":"DELETE","logs":["a","zzz"]}"#)
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], 1);
    }

    #[tokio::test]
    async fn test_add_rejects_stale_position() {
        let (engine, clock) = setup();
        run(&engine, &clock, r#"{"cmd":"ADD","entries":[{"log":"a","payload":"x","position":"10-0"}]}"#)
            .await
            .unwrap();
        let err = run(&engine, &clock, r#"{"cmd":"ADD","entries":[{"log":"a","payload":"y","position":"9-0"}]}"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Store(StoreError::PositionNotIncreasing { .. })
        ));
    }
}
