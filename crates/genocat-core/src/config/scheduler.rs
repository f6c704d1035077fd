//! Batch-scheduler configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum allowed probe timeout.
const MAX_PROBE_TIMEOUT_MS: u64 = 30_000;

/// SGE batch-scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Queue used when no other queue claims the tool.
    pub default_queue: String,
    /// All queues the scheduler may submit to.
    #[serde(default)]
    pub available_queues: Vec<String>,
    /// Per-queue settings, keyed by queue name.
    #[serde(default)]
    pub queues: HashMap<String, QueueConfig>,
    /// Submission binary.
    #[serde(default = "default_qsub")]
    pub qsub_binary: String,
    /// Active-queue probe binary.
    #[serde(default = "default_qstat")]
    pub qstat_binary: String,
    /// Post-mortem probe binary.
    #[serde(default = "default_qacct")]
    pub qacct_binary: String,
    /// Timeout for status probes, in milliseconds (capped at 30 s).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Settings of one scheduler queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Tools routed to this queue.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl SchedulerConfig {
    /// Select the queue for a tool.
    ///
    /// Non-default queues are scanned in configuration order and each queue
    /// whose tool list contains the tool (case-insensitive) overwrites the
    /// selection, so the last match wins. This mirrors the historical
    /// behavior and is pinned by test; do not "fix" it to first-match.
    pub fn queue_for_tool(&self, tool: &str) -> &str {
        let mut selected = self.default_queue.as_str();
        for queue in &self.available_queues {
            if queue.eq_ignore_ascii_case(&self.default_queue) {
                continue;
            }
            if let Some(cfg) = self.queues.get(queue) {
                if cfg.tools.iter().any(|t| t.eq_ignore_ascii_case(tool)) {
                    selected = queue.as_str();
                }
            }
        }
        selected
    }

    /// Probe timeout, capped at the 30 s maximum.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.min(MAX_PROBE_TIMEOUT_MS))
    }
}

fn default_qsub() -> String {
    "qsub".to_string()
}

fn default_qstat() -> String {
    "qstat".to_string()
}

fn default_qacct() -> String {
    "qacct".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(queues: &[(&str, &[&str])]) -> SchedulerConfig {
        SchedulerConfig {
            default_queue: "default.q".to_string(),
            available_queues: queues.iter().map(|(q, _)| q.to_string()).collect(),
            queues: queues
                .iter()
                .map(|(q, tools)| {
                    (
                        q.to_string(),
                        QueueConfig {
                            tools: tools.iter().map(|t| t.to_string()).collect(),
                        },
                    )
                })
                .collect(),
            qsub_binary: default_qsub(),
            qstat_binary: default_qstat(),
            qacct_binary: default_qacct(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }

    #[test]
    fn test_default_queue_when_no_tool_matches() {
        let cfg = config(&[("fast.q", &["bwa"])]);
        assert_eq!(cfg.queue_for_tool("gatk"), "default.q");
    }

    #[test]
    fn test_tool_match_is_case_insensitive() {
        let cfg = config(&[("fast.q", &["BWA"])]);
        assert_eq!(cfg.queue_for_tool("bwa"), "fast.q");
    }

    #[test]
    fn test_queue_selection_last_match_wins() {
        // Two non-default queues claim the same tool; the scan overwrites
        // earlier matches, so the later queue is selected.
        let cfg = config(&[("fast.q", &["bwa"]), ("slow.q", &["bwa"])]);
        assert_eq!(cfg.queue_for_tool("bwa"), "slow.q");
    }

    #[test]
    fn test_default_queue_tools_are_ignored() {
        let mut cfg = config(&[("fast.q", &["bwa"])]);
        cfg.available_queues.insert(0, "default.q".to_string());
        cfg.queues.insert(
            "default.q".to_string(),
            QueueConfig {
                tools: vec!["bwa".to_string()],
            },
        );
        assert_eq!(cfg.queue_for_tool("bwa"), "fast.q");
    }

    #[test]
    fn test_probe_timeout_is_capped() {
        let mut cfg = config(&[]);
        cfg.probe_timeout_ms = 120_000;
        assert_eq!(cfg.probe_timeout(), Duration::from_millis(30_000));
    }
}
