use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Qualitative bucket for human-readable reporting. Has no effect on cache behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitRateGrade {
    Good,
    Fair,
    NeedsImprovement,
}

impl HitRateGrade {
    #[must_use]
    pub fn from_rate(hit_rate: f64) -> Self {
        if hit_rate > 0.8 {
            HitRateGrade::Good
        } else if hit_rate < 0.6 {
            HitRateGrade::NeedsImprovement
        } else {
            HitRateGrade::Fair
        }
    }
}

/// Point-in-time stats snapshot handed to a [`TelemetrySink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub source: String,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub size: u64,
    pub hit_rate: f64,
    pub grade: HitRateGrade,
    pub captured_at: String,
}

impl StatsReport {
    #[must_use]
    pub fn new(source: &str, hits: u64, misses: u64, sets: u64, evictions: u64, size: u64) -> Self {
        let hit_rate = crate::utils::num::ratio(hits, misses);
        Self {
            source: source.to_string(),
            hits,
            misses,
            sets,
            evictions,
            size,
            hit_rate,
            grade: HitRateGrade::from_rate(hit_rate),
            captured_at: now_ts(),
        }
    }
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Receives periodic stats snapshots for observability.
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, report: &StatsReport);
}

/// Writes each report as one JSON line to the `tiercache::metrics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn publish(&self, report: &StatsReport) {
        match serde_json::to_string(report) {
            Ok(line) => log::info!(target: "tiercache::metrics", "{line}"),
            Err(e) => log::warn!("telemetry: failed to encode report for {}: {e}", report.source),
        }
    }
}

/// Keeps reports in memory; handy for tests and hosts that poll.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    reports: Arc<RwLock<Vec<StatsReport>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reports(&self) -> Vec<StatsReport> {
        self.reports.read().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<StatsReport> {
        self.reports.read().last().cloned()
    }
}

impl TelemetrySink for MemorySink {
    fn publish(&self, report: &StatsReport) {
        self.reports.write().push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grades_follow_thresholds() {
        assert_eq!(HitRateGrade::from_rate(0.95), HitRateGrade::Good);
        assert_eq!(HitRateGrade::from_rate(0.8), HitRateGrade::Fair);
        assert_eq!(HitRateGrade::from_rate(0.6), HitRateGrade::Fair);
        assert_eq!(HitRateGrade::from_rate(0.59), HitRateGrade::NeedsImprovement);
        assert_eq!(HitRateGrade::from_rate(0.0), HitRateGrade::NeedsImprovement);
    }

    #[test]
    fn report_derives_hit_rate() {
        let r = StatsReport::new("api", 80, 20, 5, 1, 4);
        assert!((r.hit_rate - 0.8).abs() < 1e-9);
        assert_eq!(r.grade, HitRateGrade::Fair);
        let empty = StatsReport::new("api", 0, 0, 0, 0, 0);
        assert_eq!(empty.hit_rate, 0.0);
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.publish(&StatsReport::new("a", 1, 0, 1, 0, 1));
        sink.publish(&StatsReport::new("b", 0, 1, 0, 0, 0));
        let all = sink.reports();
        assert_eq!(all.len(), 2);
        assert_eq!(sink.last().map(|r| r.source), Some("b".to_string()));
    }

    #[test]
    fn report_serializes_grade_in_snake_case() {
        let r = StatsReport::new("x", 9, 1, 0, 0, 0);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["grade"], "good");
    }
}
