//! Per-match notification timers.
//!
//! Every match gets up to three timers (15 minutes out, 5 minutes out, kick
//! off). Timers are plain task records in a min-heap; the runtime sleeps until
//! [`NotificationScheduler::next_deadline`] and drains what is due. New match
//! data always replaces the whole schedule, so a stale timer from an earlier
//! push can never fire next to a fresh one.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::{debug, info};

use crate::matches::MatchRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NotificationKind {
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "live")]
    Live,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 3] = [
        NotificationKind::FifteenMinutes,
        NotificationKind::FiveMinutes,
        NotificationKind::Live,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::FifteenMinutes => "15min",
            NotificationKind::FiveMinutes => "5min",
            NotificationKind::Live => "live",
        }
    }

    /// How long before the start time this kind fires.
    pub fn lead_time(&self) -> Duration {
        match self {
            NotificationKind::FifteenMinutes => Duration::minutes(15),
            NotificationKind::FiveMinutes => Duration::minutes(5),
            NotificationKind::Live => Duration::zero(),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn timer_key(kind: NotificationKind, match_id: &str) -> String {
    format!("{}-{}", kind, match_id)
}

/// One pending notification. Field order gives the heap its ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ScheduledTask {
    pub fire_at: DateTime<Utc>,
    pub kind: NotificationKind,
    pub match_id: String,
}

impl ScheduledTask {
    pub fn key(&self) -> String {
        timer_key(self.kind, &self.match_id)
    }
}

#[derive(Debug, Default)]
pub struct NotificationScheduler {
    matches: Vec<MatchRecord>,
    queue: BinaryHeap<Reverse<ScheduledTask>>,
    /// timer key → task; mirrors `queue` one to one
    pending: HashMap<String, ScheduledTask>,
}

impl NotificationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every pending timer and forget the match list.
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            debug!("Cancelling {} pending notification timers", self.pending.len());
        }
        self.queue.clear();
        self.pending.clear();
        self.matches.clear();
    }

    /// Replace the schedule with timers for `matches`. Only fire times
    /// strictly after `now` are kept, and only the first record for a given
    /// match id is scheduled. Returns how many timers are pending.
    pub fn rebuild(&mut self, matches: Vec<MatchRecord>, now: DateTime<Utc>) -> usize {
        self.reset();

        let mut seen: HashSet<&str> = HashSet::new();
        for record in &matches {
            if !seen.insert(record.id.as_str()) {
                debug!("Duplicate match {} ignored", record.id);
                continue;
            }
            let Some(start) = record.start_time() else {
                debug!(
                    "Match {} has unreadable start time '{}', no timers",
                    record.id, record.match_time
                );
                continue;
            };
            for kind in NotificationKind::ALL {
                let Some(fire_at) = start.checked_sub_signed(kind.lead_time()) else {
                    debug!("Match {} start time out of range for {} timer", record.id, kind);
                    continue;
                };
                if fire_at <= now {
                    continue;
                }
                let task = ScheduledTask {
                    fire_at,
                    kind,
                    match_id: record.id.clone(),
                };
                self.pending.insert(task.key(), task.clone());
                self.queue.push(Reverse(task));
            }
        }

        self.matches = matches;
        info!(
            "Scheduled {} notification timers for {} matches",
            self.pending.len(),
            self.matches.len()
        );
        self.pending.len()
    }

    /// Pending timers, earliest first.
    pub fn list_pending(&self) -> Vec<ScheduledTask> {
        let mut tasks: Vec<ScheduledTask> = self.pending.values().cloned().collect();
        tasks.sort();
        tasks
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.queue.peek().map(|Reverse(task)| task.fire_at)
    }

    /// Remove and return every task due at or before `now`, earliest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<ScheduledTask> {
        let mut due = Vec::new();
        while let Some(Reverse(task)) = self.queue.peek() {
            if task.fire_at > now {
                break;
            }
            if let Some(Reverse(task)) = self.queue.pop() {
                self.pending.remove(&task.key());
                due.push(task);
            }
        }
        due
    }

    pub fn match_record(&self, match_id: &str) -> Option<&MatchRecord> {
        self.matches.iter().find(|m| m.id == match_id)
    }
}
