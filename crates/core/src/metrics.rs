//! Telemetry snapshots and the sources that produce them.
//!
//! [`SyntheticMetrics`] draws GPU-like figures at random so the feed works on
//! hosts without any accelerator. Real collectors implement
//! [`MetricsSource`] and plug into the publisher the same way.

use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};

/// One telemetry sample.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub gpu_utilization: f64,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub temperature_celsius: f64,
    pub power_draw_watts: f64,
    pub fan_speed_percent: f64,
    /// Wall-clock time of the sample in epoch milliseconds.
    pub timestamp: i64,
    /// Source-specific figures, flattened into the record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Produces independent snapshots; no sample depends on the previous one.
pub trait MetricsSource: Send + Sync {
    fn sample(&self, timestamp: i64) -> MetricsSnapshot;
}

/// Memory size reported by the synthetic source (24 GiB card).
const SYNTHETIC_MEMORY_TOTAL_MB: u64 = 24_576;

#[derive(Debug, Clone)]
pub struct SyntheticMetrics {
    memory_total_mb: u64,
}

impl Default for SyntheticMetrics {
    fn default() -> Self {
        Self {
            memory_total_mb: SYNTHETIC_MEMORY_TOTAL_MB,
        }
    }
}

impl MetricsSource for SyntheticMetrics {
    fn sample(&self, timestamp: i64) -> MetricsSnapshot {
        let mut rng = rand::rng();
        let memory_share: f64 = rng.random_range(0.30..0.95);

        let mut extra = Map::new();
        extra.insert(
            "hashRateMhs".into(),
            Value::from(round2(rng.random_range(800.0..1_200.0))),
        );

        MetricsSnapshot {
            gpu_utilization: round2(rng.random_range(40.0..100.0)),
            memory_used_mb: (self.memory_total_mb as f64 * memory_share) as u64,
            memory_total_mb: self.memory_total_mb,
            temperature_celsius: round2(rng.random_range(55.0..85.0)),
            power_draw_watts: round2(rng.random_range(150.0..350.0)),
            fan_speed_percent: round2(rng.random_range(30.0..90.0)),
            timestamp,
            extra,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Hands out strictly increasing epoch-millisecond timestamps, even when the
/// wall clock stalls or steps backwards between samples.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Option<i64>,
}

impl MonotonicClock {
    pub fn now(&mut self) -> i64 {
        self.next_after(chrono::Utc::now().timestamp_millis())
    }

    /// Return `wall_ms`, or one past the previous value if `wall_ms` would
    /// not be strictly greater.
    pub fn next_after(&mut self, wall_ms: i64) -> i64 {
        let next = match self.last {
            Some(last) if wall_ms <= last => last + 1,
            _ => wall_ms,
        };
        self.last = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_samples_are_in_plausible_ranges() {
        let source = SyntheticMetrics::default();
        for _ in 0..200 {
            let s = source.sample(1);
            assert!((40.0..=100.0).contains(&s.gpu_utilization));
            assert!(s.memory_used_mb < s.memory_total_mb);
            assert!((55.0..=85.0).contains(&s.temperature_celsius));
            assert!(s.extra.contains_key("hashRateMhs"));
            assert_eq!(s.timestamp, 1);
        }
    }

    #[test]
    fn snapshot_serializes_extra_fields_inline() {
        let json = serde_json::to_value(SyntheticMetrics::default().sample(1_700_000_000_000))
            .unwrap();

        assert_eq!(json["timestamp"], 1_700_000_000_000_i64);
        assert!(json["gpuUtilization"].is_number());
        assert!(json["hashRateMhs"].is_number());
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn clock_is_strictly_increasing() {
        let mut clock = MonotonicClock::default();

        assert_eq!(clock.next_after(1_000), 1_000);
        assert_eq!(clock.next_after(1_000), 1_001);
        assert_eq!(clock.next_after(900), 1_002);
        assert_eq!(clock.next_after(5_000), 5_000);
    }
}
