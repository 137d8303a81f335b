//! Evaluation diagnostics: per-node timing, cache reuse and output size.
//!
//! Timing goes through the [`Clock`] trait so the library never reads
//! the system clock itself; the CLI plugs in `std::time::Instant` and
//! tests use a fixed clock.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::operators::OperatorKind;
use crate::types::Dimensions;

/// Source of timestamps for diagnostics.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that always reports zero elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClock;

impl Clock for NoopClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics for one node of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDiagnostics {
    /// Node index in the pipe.
    pub index: usize,
    /// Node name.
    pub name: String,
    /// Operator kind.
    pub kind: OperatorKind,
    /// Whether the node was enabled.
    pub enabled: bool,
    /// Whether the output came from the incremental cache.
    pub reused: bool,
    /// Time spent computing this node (zero when reused).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Output image size.
    pub output: Dimensions,
}

/// Totals for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Number of nodes in the pipe.
    pub node_count: usize,
    /// Nodes that were enabled.
    pub enabled_count: usize,
    /// Nodes served from the cache.
    pub reused_count: usize,
    /// Final image size.
    pub output: Dimensions,
    /// Final pixel count.
    pub pixel_count: u64,
}

/// Diagnostics collected from one pipe evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDiagnostics {
    /// Source image size.
    pub source: Dimensions,
    /// Whether the source was HDR.
    pub source_hdr: bool,
    /// One entry per node, in evaluation order.
    pub nodes: Vec<NodeDiagnostics>,
    /// Wall-clock duration of the whole evaluation.
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Totals.
    pub summary: EvaluationSummary,
}

impl EvaluationDiagnostics {
    /// Assemble diagnostics and compute the summary.
    #[must_use]
    pub fn new(
        source: Dimensions,
        source_hdr: bool,
        nodes: Vec<NodeDiagnostics>,
        total_duration: Duration,
    ) -> Self {
        let output = nodes.last().map_or(source, |n| n.output);
        let summary = EvaluationSummary {
            node_count: nodes.len(),
            enabled_count: nodes.iter().filter(|n| n.enabled).count(),
            reused_count: nodes.iter().filter(|n| n.reused).count(),
            output,
            pixel_count: output.pixel_count(),
        };
        Self {
            source,
            source_hdr,
            nodes,
            total_duration,
            summary,
        }
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Evaluation Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Source: {} {} ({} pixels)",
            self.source,
            if self.source_hdr { "HDR" } else { "SDR" },
            self.source.pixel_count(),
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<4} {:<16} {:<14} {:>10} {:>9}  {}",
            "#", "Node", "Kind", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for node in &self.nodes {
            let ms = duration_ms(node.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let state = match (node.enabled, node.reused) {
                (false, _) => "disabled",
                (true, true) => "cached",
                (true, false) => "computed",
            };
            lines.push(format!(
                "{:<4} {:<16} {:<14} {ms:>8.3}ms {pct:>8.1}%  {state} -> {}",
                node.index, node.name, node.kind, node.output,
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Nodes: {} ({} enabled, {} cached)  |  Output: {}",
            self.summary.node_count,
            self.summary.enabled_count,
            self.summary.reused_count,
            self.summary.output,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn node(index: usize, name: &str, enabled: bool, reused: bool, ms: u64) -> NodeDiagnostics {
        NodeDiagnostics {
            index,
            name: name.to_owned(),
            kind: OperatorKind::Exposure,
            enabled,
            reused,
            duration: Duration::from_millis(ms),
            output: Dimensions {
                width: 64,
                height: 36,
            },
        }
    }

    fn sample() -> EvaluationDiagnostics {
        EvaluationDiagnostics::new(
            Dimensions {
                width: 64,
                height: 48,
            },
            true,
            vec![
                node(0, "exposure", true, false, 10),
                node(1, "contrast", false, false, 0),
                node(2, "tonecurve", true, true, 0),
            ],
            Duration::from_millis(12),
        )
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn summary_counts() {
        let diag = sample();
        assert_eq!(diag.summary.node_count, 3);
        assert_eq!(diag.summary.enabled_count, 2);
        assert_eq!(diag.summary.reused_count, 1);
        assert_eq!(diag.summary.pixel_count, 64 * 36);
    }

    #[test]
    fn summary_of_empty_pipe_is_source() {
        let src = Dimensions {
            width: 5,
            height: 7,
        };
        let diag = EvaluationDiagnostics::new(src, false, Vec::new(), Duration::ZERO);
        assert_eq!(diag.summary.output, src);
    }

    #[test]
    fn report_lists_every_node() {
        let report = sample().report();
        assert!(report.contains("Pipeline Evaluation Report"));
        assert!(report.contains("64x48 HDR"));
        assert!(report.contains("exposure"));
        assert!(report.contains("disabled"));
        assert!(report.contains("cached"));
    }

    #[test]
    fn serde_round_trip_uses_seconds() {
        let diag = sample();
        let value = serde_json::to_value(&diag).unwrap();
        assert!((value["total_duration"].as_f64().unwrap() - 0.012).abs() < 1e-9);
        let back: EvaluationDiagnostics = serde_json::from_value(value).unwrap();
        assert_eq!(back.summary, diag.summary);
        assert_eq!(back.nodes.len(), 3);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<EvaluationDiagnostics>(value).is_err());
    }

    #[test]
    fn noop_clock_reports_zero() {
        let clock = NoopClock;
        assert_eq!(clock.elapsed(&clock.now()), Duration::ZERO);
    }
}
