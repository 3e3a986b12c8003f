//! Per-channel round-trip timing statistics.
//!
//! Four independent groups — local command, remote command, transmit, and
//! receive — each record a send timestamp keyed by sequence byte, then fold
//! the elapsed time into a running min/max/sum/count summary once the
//! matching response or acknowledgement arrives.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The four statistics groups tracked per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    LocalCommand,
    RemoteCommand,
    Transmit,
    Receive,
}

const GROUPS: [Group; 4] = [
    Group::LocalCommand,
    Group::RemoteCommand,
    Group::Transmit,
    Group::Receive,
];

#[derive(Debug, Default)]
struct Summary {
    min: Option<Duration>,
    max: Option<Duration>,
    sum: Duration,
    count: u64,
}

impl Summary {
    fn record(&mut self, elapsed: Duration) {
        self.min = Some(self.min.map_or(elapsed, |m| m.min(elapsed)));
        self.max = Some(self.max.map_or(elapsed, |m| m.max(elapsed)));
        self.sum += elapsed;
        self.count += 1;
    }

    fn mean(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as u32)
        }
    }
}

/// A human-readable summary of one group, as emitted at session close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupReport {
    pub group: Group,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    pub mean: Option<Duration>,
    pub count: u64,
}

/// Tracks in-flight send timestamps and summarised round-trip times for all
/// four groups.
#[derive(Debug, Default)]
pub struct Stats {
    pending: HashMap<(Group, u8), Instant>,
    summary: HashMap<Group, Summary>,
}

impl Stats {
    /// Creates a fresh set of statistics, with every group initialised
    /// identically regardless of whether it ever records a sample.
    pub fn new() -> Self {
        let mut summary = HashMap::new();
        for group in GROUPS {
            summary.insert(group, Summary::default());
        }
        Stats {
            pending: HashMap::new(),
            summary,
        }
    }

    /// Records that `group`/`seq` was just sent at `now`.
    pub fn record_send(&mut self, group: Group, seq: u8, now: Instant) {
        self.pending.insert((group, seq), now);
    }

    /// Records that `group`/`seq`'s matching response/ack arrived at `now`,
    /// folding the elapsed time into the group's running summary. A no-op
    /// if no send was recorded for this `(group, seq)` pair.
    pub fn record_recv(&mut self, group: Group, seq: u8, now: Instant) {
        if let Some(sent) = self.pending.remove(&(group, seq)) {
            let elapsed = now.saturating_duration_since(sent);
            self.summary.entry(group).or_default().record(elapsed);
        }
    }

    /// Produces the final min/max/mean/count report for every group, in a
    /// fixed order, for emission as diagnostics at session close.
    pub fn summarize(&self) -> Vec<GroupReport> {
        GROUPS
            .iter()
            .map(|&group| {
                let s = self.summary.get(&group);
                GroupReport {
                    group,
                    min: s.and_then(|s| s.min),
                    max: s.and_then(|s| s.max),
                    mean: s.and_then(|s| s.mean()),
                    count: s.map_or(0, |s| s.count),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn all_four_groups_initialised() {
        let stats = Stats::new();
        let reports = stats.summarize();
        assert_eq!(reports.len(), 4);
        for r in &reports {
            assert_eq!(r.count, 0);
            assert!(r.min.is_none());
        }
    }

    #[test]
    fn records_round_trip() {
        let mut stats = Stats::new();
        let t0 = Instant::now();
        stats.record_send(Group::Transmit, 7, t0);
        let t1 = t0 + Duration::from_millis(50);
        stats.record_recv(Group::Transmit, 7, t1);

        let report = stats
            .summarize()
            .into_iter()
            .find(|r| r.group == Group::Transmit)
            .unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.min, Some(Duration::from_millis(50)));
        assert_eq!(report.max, Some(Duration::from_millis(50)));
        assert_eq!(report.mean, Some(Duration::from_millis(50)));
    }

    #[test]
    fn unmatched_recv_is_ignored() {
        let mut stats = Stats::new();
        stats.record_recv(Group::Receive, 3, Instant::now());
        let report = stats
            .summarize()
            .into_iter()
            .find(|r| r.group == Group::Receive)
            .unwrap();
        assert_eq!(report.count, 0);
    }

    #[test]
    fn min_max_track_across_samples() {
        let mut stats = Stats::new();
        let t0 = Instant::now();
        stats.record_send(Group::LocalCommand, 1, t0);
        stats.record_recv(Group::LocalCommand, 1, t0 + Duration::from_millis(10));
        stats.record_send(Group::LocalCommand, 2, t0);
        stats.record_recv(Group::LocalCommand, 2, t0 + Duration::from_millis(200));

        let report = stats
            .summarize()
            .into_iter()
            .find(|r| r.group == Group::LocalCommand)
            .unwrap();
        assert_eq!(report.count, 2);
        assert_eq!(report.min, Some(Duration::from_millis(10)));
        assert_eq!(report.max, Some(Duration::from_millis(200)));
    }
}
