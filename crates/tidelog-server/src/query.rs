//! Query parameters of the data routes

use std::time::Duration;

use serde::Deserialize;
use tidelog_core::PositionSpec;
use tidelog_engine::{EngineConfig, ReadPolicy};
use tidelog_session::{PullOptions, PushOptions};

use crate::error::{ServerError, ServerResult};

/// Split a `a+b+c` path segment into log names
pub fn split_logs(log_ids: &str) -> ServerResult<Vec<String>> {
    let logs: Vec<String> = log_ids.split('+').map(str::to_string).collect();
    if logs.iter().any(String::is_empty) {
        return Err(ServerError::bad_request(format!("empty log name in {log_ids:?}")));
    }
    Ok(logs)
}

/// Pair each log with its start position
///
/// `last_entry_id` is either one value for every log or one `+`-separated
/// value per log. A space separates too, since an unescaped `+` in a query
/// string decodes to one.
pub fn cursor_seed(logs: &[String], last_entry_id: &str) -> ServerResult<Vec<(String, PositionSpec)>> {
    let specs = last_entry_id
        .split(['+', ' '])
        .map(str::parse::<PositionSpec>)
        .collect::<Result<Vec<_>, _>>()?;

    match specs.as_slice() {
        [spec] => Ok(logs.iter().map(|log| (log.clone(), *spec)).collect()),
        _ if specs.len() == logs.len() => Ok(logs.iter().cloned().zip(specs).collect()),
        _ => Err(ServerError::bad_request(format!(
            "{} start positions for {} logs",
            specs.len(),
            logs.len()
        ))),
    }
}

/// `GET /data/{log_ids}/pull`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PullQuery {
    pub last_entry_id: String,
    /// Milliseconds one read may wait; 0 waits indefinitely
    pub block: Option<u64>,
    pub latest: bool,
    pub max_fps: Option<f64>,
    pub ack: bool,
    pub prefix: String,
    pub device_id: Option<String>,
    pub keep_device_id: Option<bool>,
    pub count: usize,
    pub header: bool,
}

impl Default for PullQuery {
    fn default() -> Self {
        Self {
            last_entry_id: "$".to_string(),
            block: None,
            latest: false,
            max_fps: None,
            ack: false,
            prefix: String::new(),
            device_id: None,
            keep_device_id: None,
            count: 1,
            header: true,
        }
    }
}

impl PullQuery {
    /// Session options, filling gaps from the engine defaults
    pub fn options(&self, engine: &EngineConfig) -> PullOptions {
        let block = match self.block {
            None => Some(engine.default_block()),
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        };
        PullOptions {
            latest: self.latest,
            count: self.count,
            block,
            max_fps: self.max_fps,
            ack: self.ack,
            header: self.header,
        }
    }
}

/// `GET /data/{log_ids}/push`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushQuery {
    pub ack: bool,
    pub prefix: String,
    pub device_id: Option<String>,
    pub header: bool,
}

impl Default for PushQuery {
    fn default() -> Self {
        Self {
            ack: false,
            prefix: String::new(),
            device_id: None,
            header: true,
        }
    }
}

impl PushQuery {
    pub fn options(&self) -> PushOptions {
        PushOptions {
            ack: self.ack,
            header: self.header,
        }
    }
}

/// `GET /data/{log_ids}` and `POST /data/{log_id}`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataQuery {
    /// Start position(s); `*` returns the newest `count` entries
    pub last_entry_id: String,
    pub count: usize,
    pub prefix: String,
    pub device_id: Option<String>,
    pub keep_device_id: Option<bool>,
}

impl Default for DataQuery {
    fn default() -> Self {
        Self {
            last_entry_id: "*".to_string(),
            count: 1,
            prefix: String::new(),
            device_id: None,
            keep_device_id: None,
        }
    }
}

impl DataQuery {
    /// Cursor seed and read policy for a one-shot read
    pub fn plan(&self, logs: &[String]) -> ServerResult<(Vec<(String, PositionSpec)>, ReadPolicy)> {
        if self.count == 0 {
            return Err(ServerError::bad_request("count must be at least 1"));
        }
        if self.last_entry_id == "*" {
            let seed = logs
                .iter()
                .map(|log| (log.clone(), PositionSpec::Beginning))
                .collect();
            return Ok((seed, ReadPolicy::Latest));
        }
        Ok((cursor_seed(logs, &self.last_entry_id)?, ReadPolicy::Ordered))
    }
}
