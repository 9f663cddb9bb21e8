//! Prometheus-compatible station counters
//!
//! One registry per station instance. Counters are relaxed atomics so the
//! frame loop never waits on a reader.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Frame-time samples kept for percentile calculation
const FRAME_HISTORY: usize = 600;

#[derive(Debug)]
pub struct StationMetrics {
    // Occupancy
    pub entries_accepted: AtomicU64,
    pub entries_rejected: AtomicU64,
    pub evictions: AtomicU64,
    pub exits: AtomicU64,
    pub exits_ignored: AtomicU64,

    // Replication
    pub sync_requests: AtomicU64,
    pub sync_captures: AtomicU64,
    pub sync_applied: AtomicU64,
    pub sync_stale_dropped: AtomicU64,
    pub ownership_transfers: AtomicU64,
    pub ownership_reclaims: AtomicU64,

    // Notifications
    pub events_delivered: AtomicU64,
    pub informant_failures: AtomicU64,

    // Frames (microseconds)
    pub frames_composed: AtomicU64,
    pub frames_skipped: AtomicU64,
    pub frame_time_us: AtomicU64,
    pub frame_time_p95_us: AtomicU64,

    start_time: Instant,
    frame_history: RwLock<VecDeque<u64>>,
}

impl StationMetrics {
    pub fn new() -> Self {
        Self {
            entries_accepted: AtomicU64::new(0),
            entries_rejected: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            exits: AtomicU64::new(0),
            exits_ignored: AtomicU64::new(0),
            sync_requests: AtomicU64::new(0),
            sync_captures: AtomicU64::new(0),
            sync_applied: AtomicU64::new(0),
            sync_stale_dropped: AtomicU64::new(0),
            ownership_transfers: AtomicU64::new(0),
            ownership_reclaims: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            informant_failures: AtomicU64::new(0),
            frames_composed: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            frame_time_us: AtomicU64::new(0),
            frame_time_p95_us: AtomicU64::new(0),
            start_time: Instant::now(),
            frame_history: RwLock::new(VecDeque::with_capacity(FRAME_HISTORY)),
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Record how long one seat update took and refresh the p95
    pub fn record_frame_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.frame_time_us.store(us, Ordering::Relaxed);

        let mut history = self.frame_history.write();
        history.push_back(us);
        while history.len() > FRAME_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();
            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            self.frame_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("station_entries_accepted_total", "Entry attempts that seated the candidate", "counter",
            Self::get(&self.entries_accepted));
        metric!("station_entries_rejected_total", "Entry attempts lost to a lower-id occupant", "counter",
            Self::get(&self.entries_rejected));
        metric!("station_evictions_total", "Occupants displaced by a lower-id candidate", "counter",
            Self::get(&self.evictions));
        metric!("station_exits_total", "Occupant exits", "counter",
            Self::get(&self.exits));
        metric!("station_exits_ignored_total", "Exit attempts from non-occupants", "counter",
            Self::get(&self.exits_ignored));

        metric!("station_sync_requests_total", "Serialization requests issued as authority", "counter",
            Self::get(&self.sync_requests));
        metric!("station_sync_captures_total", "Offsets captured before serialization", "counter",
            Self::get(&self.sync_captures));
        metric!("station_sync_applied_total", "Replicated offsets applied", "counter",
            Self::get(&self.sync_applied));
        metric!("station_sync_stale_dropped_total", "Replicated offsets dropped while authoritative", "counter",
            Self::get(&self.sync_stale_dropped));
        metric!("station_ownership_transfers_total", "Ownership transfer notifications", "counter",
            Self::get(&self.ownership_transfers));
        metric!("station_ownership_reclaims_total", "Ownership requested back by the seated local participant", "counter",
            Self::get(&self.ownership_reclaims));

        metric!("station_events_delivered_total", "Informant deliveries", "counter",
            Self::get(&self.events_delivered));
        metric!("station_informant_failures_total", "Informant deliveries that failed", "counter",
            Self::get(&self.informant_failures));

        metric!("station_frames_composed_total", "Frames that produced a seat transform", "counter",
            Self::get(&self.frames_composed));
        metric!("station_frames_skipped_total", "Frames with no seat effect", "counter",
            Self::get(&self.frames_skipped));
        metric!("station_frame_time_microseconds", "Last seat update time", "gauge",
            Self::get(&self.frame_time_us));
        metric!("station_frame_time_p95_microseconds", "95th percentile seat update time", "gauge",
            Self::get(&self.frame_time_p95_us));
        metric!("station_uptime_seconds", "Station uptime", "counter",
            self.uptime_seconds());

        output
    }

    /// Counter snapshot as JSON
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "occupancy": {
                "entries_accepted": Self::get(&self.entries_accepted),
                "entries_rejected": Self::get(&self.entries_rejected),
                "evictions": Self::get(&self.evictions),
                "exits": Self::get(&self.exits),
                "exits_ignored": Self::get(&self.exits_ignored),
            },
            "replication": {
                "sync_requests": Self::get(&self.sync_requests),
                "sync_captures": Self::get(&self.sync_captures),
                "sync_applied": Self::get(&self.sync_applied),
                "sync_stale_dropped": Self::get(&self.sync_stale_dropped),
                "ownership_transfers": Self::get(&self.ownership_transfers),
                "ownership_reclaims": Self::get(&self.ownership_reclaims),
            },
            "events": {
                "delivered": Self::get(&self.events_delivered),
                "informant_failures": Self::get(&self.informant_failures),
            },
            "frames": {
                "composed": Self::get(&self.frames_composed),
                "skipped": Self::get(&self.frames_skipped),
                "time_us": Self::get(&self.frame_time_us),
                "time_p95_us": Self::get(&self.frame_time_p95_us),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for StationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = StationMetrics::new();
        assert_eq!(StationMetrics::get(&metrics.entries_accepted), 0);
        assert_eq!(StationMetrics::get(&metrics.frame_time_p95_us), 0);
    }

    #[test]
    fn test_record_frame_time() {
        let metrics = StationMetrics::new();
        for i in 1..=20 {
            metrics.record_frame_time(Duration::from_micros(i * 10));
        }
        assert_eq!(StationMetrics::get(&metrics.frame_time_us), 200);
        assert!(StationMetrics::get(&metrics.frame_time_p95_us) >= 190);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = StationMetrics::new();
        StationMetrics::incr(&metrics.evictions);

        let output = metrics.to_prometheus();
        assert!(output.contains("# TYPE station_evictions_total counter"));
        assert!(output.contains("station_evictions_total 1\n"));
    }

    #[test]
    fn test_json_format() {
        let metrics = StationMetrics::new();
        StationMetrics::incr(&metrics.sync_applied);

        let parsed: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(parsed["replication"]["sync_applied"], 1);
    }
}
