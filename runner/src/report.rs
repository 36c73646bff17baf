//! JSON report shaped for the charting consumer: per-iteration outcomes plus
//! labeled sub-phase durations.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// One labeled duration, e.g. a pod scheduling sub-phase.
#[derive(Clone, Debug, Serialize)]
pub struct ChartEntry {
    /// Chart label.
    pub label: String,
    /// Seconds.
    pub duration_secs: f64,
}

impl ChartEntry {
    /// Entry from a measured duration.
    pub fn new(label: impl Into<String>, duration: Duration) -> Self {
        Self {
            label: label.into(),
            duration_secs: duration.as_secs_f64(),
        }
    }
}

/// Outcome of one iteration.
#[derive(Debug, Serialize)]
pub struct IterationReport {
    /// 1-based iteration number.
    pub iteration: u64,
    /// Wall-clock length of the iteration.
    pub duration_secs: f64,
    /// Failure reason, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sub-phase durations the scenario measured.
    pub additive: Vec<ChartEntry>,
}

impl IterationReport {
    /// A successful iteration with its measured sub-phases.
    pub fn success(iteration: u64, duration: Duration, additive: Vec<ChartEntry>) -> Self {
        Self {
            iteration,
            duration_secs: duration.as_secs_f64(),
            error: None,
            additive,
        }
    }

    /// A failed iteration and its recorded reason.
    pub fn failure(iteration: u64, duration: Duration, error: String) -> Self {
        Self {
            iteration,
            duration_secs: duration.as_secs_f64(),
            error: Some(error),
            additive: Vec::new(),
        }
    }
}

/// Whole-run report.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Scenario that was driven.
    pub scenario: String,
    /// RFC 3339 start of the run phase.
    pub started_at: String,
    /// RFC 3339 end of the run phase.
    pub finished_at: String,
    /// Per-iteration outcomes, in order.
    pub iterations: Vec<IterationReport>,
}

impl Report {
    /// Write the report to `path`, or stdout when none was given.
    pub fn write(&self, path: Option<&Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        match path {
            Some(path) => fs::write(path, json)?,
            None => println!("{json}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn failed_iterations_carry_their_reason() {
        let report = Report {
            scenario: "create-and-delete-pod".to_owned(),
            started_at: "1970-01-01T00:00:00+00:00".to_owned(),
            finished_at: "1970-01-01T00:01:00+00:00".to_owned(),
            iterations: vec![
                IterationReport::success(
                    1,
                    Duration::from_secs(5),
                    vec![ChartEntry::new("pod_create", Duration::from_secs(5))],
                ),
                IterationReport::failure(2, Duration::from_secs(30), "timed out".to_owned()),
            ],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["iterations"][0].get("error"), None);
        assert_eq!(json["iterations"][1]["error"], "timed out");
        assert_eq!(json["iterations"][0]["additive"][0]["label"], "pod_create");
        assert_eq!(
            json["iterations"][0]["additive"][0]["duration_secs"]
                .as_f64()
                .unwrap(),
            5.0
        );
    }
}
