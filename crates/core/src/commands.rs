//! Inbound client commands.
//!
//! Commands arrive as JSON text frames tagged by `type`, with the command's
//! fields alongside the tag:
//!
//! ```json
//! {"type": "benchmark_start", "sizes": [10, 100], "iterations": 2, "config": {}}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Upper bound on leaves accepted for a single tree build.
pub const MAX_ITEM_COUNT: u64 = 1_000_000;

/// Upper bound on distinct sizes in one benchmark sweep.
pub const MAX_BENCHMARK_SIZES: usize = 64;

/// Upper bound on iterations per size in one benchmark sweep.
pub const MAX_BENCHMARK_ITERATIONS: u32 = 1_000;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    MerkleComputeStart(MerkleComputeStart),
    BenchmarkStart(BenchmarkStart),
    SubscribeMetrics,
    UnsubscribeMetrics,
    CancelJob(CancelJob),
    ConfigUpdate(Map<String, Value>),
    Message(IncomingMessage),
}

impl ClientCommand {
    /// Parse a text frame into a command.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MerkleComputeStart {
    pub item_count: u64,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl MerkleComputeStart {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.item_count == 0 {
            return Err(CoreError::Validation(
                "itemCount must be at least 1".to_string(),
            ));
        }
        if self.item_count > MAX_ITEM_COUNT {
            return Err(CoreError::Validation(format!(
                "itemCount must not exceed {MAX_ITEM_COUNT}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkStart {
    pub sizes: Vec<u64>,
    pub iterations: u32,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl BenchmarkStart {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.sizes.is_empty() {
            return Err(CoreError::Validation(
                "sizes must contain at least one entry".to_string(),
            ));
        }
        if self.sizes.len() > MAX_BENCHMARK_SIZES {
            return Err(CoreError::Validation(format!(
                "sizes must not contain more than {MAX_BENCHMARK_SIZES} entries"
            )));
        }
        if self.sizes.contains(&0) {
            return Err(CoreError::Validation(
                "every size must be at least 1".to_string(),
            ));
        }
        if self.iterations == 0 || self.iterations > MAX_BENCHMARK_ITERATIONS {
            return Err(CoreError::Validation(format!(
                "iterations must be between 1 and {MAX_BENCHMARK_ITERATIONS}"
            )));
        }
        Ok(())
    }
}

/// Stop a running job without a terminal event.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CancelJob {
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub text: String,
    #[serde(default)]
    pub sender_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_benchmark_start() {
        let cmd = ClientCommand::parse(
            r#"{"type":"benchmark_start","sizes":[10,100],"iterations":2,"config":{"gpu":0}}"#,
        )
        .unwrap();

        assert_matches!(cmd, ClientCommand::BenchmarkStart(start) => {
            assert_eq!(start.sizes, vec![10, 100]);
            assert_eq!(start.iterations, 2);
            assert_eq!(start.config["gpu"], 0);
        });
    }

    #[test]
    fn merkle_config_defaults_to_empty() {
        let cmd = ClientCommand::parse(r#"{"type":"merkle_compute_start","itemCount":8}"#).unwrap();

        assert_matches!(cmd, ClientCommand::MerkleComputeStart(start) => {
            assert_eq!(start.item_count, 8);
            assert!(start.config.is_empty());
        });
    }

    #[test]
    fn parses_unit_commands() {
        assert_eq!(
            ClientCommand::parse(r#"{"type":"subscribe_metrics"}"#).unwrap(),
            ClientCommand::SubscribeMetrics
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"unsubscribe_metrics"}"#).unwrap(),
            ClientCommand::UnsubscribeMetrics
        );
    }

    #[test]
    fn parses_cancel_job() {
        let cmd = ClientCommand::parse(r#"{"type":"cancel_job","jobId":"abc"}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::CancelJob(CancelJob {
                job_id: "abc".into()
            })
        );
    }

    #[test]
    fn config_update_keeps_arbitrary_keys_without_tag() {
        let cmd =
            ClientCommand::parse(r#"{"type":"config_update","theme":"dark","refreshMs":500}"#)
                .unwrap();

        assert_matches!(cmd, ClientCommand::ConfigUpdate(values) => {
            assert_eq!(values.len(), 2);
            assert_eq!(values["theme"], "dark");
            assert_eq!(values["refreshMs"], 500);
        });
    }

    #[test]
    fn rejects_unknown_and_malformed_commands() {
        assert!(ClientCommand::parse(r#"{"type":"format_disk"}"#).is_err());
        assert!(ClientCommand::parse(r#"{"type":"benchmark_start","sizes":"ten"}"#).is_err());
        assert!(ClientCommand::parse("not json").is_err());
    }

    #[test]
    fn merkle_validation_bounds() {
        let start = |item_count| MerkleComputeStart {
            item_count,
            config: Map::new(),
        };

        assert_matches!(start(0).validate(), Err(CoreError::Validation(_)));
        assert!(start(1).validate().is_ok());
        assert!(start(MAX_ITEM_COUNT).validate().is_ok());
        assert_matches!(start(MAX_ITEM_COUNT + 1).validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn benchmark_validation_bounds() {
        let start = |sizes: Vec<u64>, iterations| BenchmarkStart {
            sizes,
            iterations,
            config: Map::new(),
        };

        assert!(start(vec![10, 100], 2).validate().is_ok());
        assert_matches!(start(vec![], 2).validate(), Err(CoreError::Validation(_)));
        assert_matches!(start(vec![10, 0], 2).validate(), Err(CoreError::Validation(_)));
        assert_matches!(start(vec![10], 0).validate(), Err(CoreError::Validation(_)));
        assert_matches!(
            start(vec![1; MAX_BENCHMARK_SIZES + 1], 1).validate(),
            Err(CoreError::Validation(_))
        );
    }
}
