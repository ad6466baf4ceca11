//! The worker's event loop.
//!
//! One task owns the [`NotificationScheduler`]. Host messages and sync
//! signals arrive over a channel, the feed is polled on a fixed interval, and
//! the loop sleeps until the next timer is due. Every path that produces match
//! data ends in the same `rebuild`, and a rebuild always runs to completion
//! before the next event is looked at.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::message::{WorkerMessage, SYNC_MATCH_CHECK};
use super::Worker;
use crate::matches::{parse_match_list, MatchFeed, MatchRecord};
use crate::notify::{
    match_notification, MatchAlertStyle, Notification, NotificationCenter, NotificationScheduler,
    ScheduledTask,
};

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A message posted by the host page
    Message(WorkerMessage),
    /// A background-sync signal carrying its registration tag
    Sync(String),
}

/// Cloneable front door to the running loop.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerEvent>,
    pending: watch::Receiver<Vec<ScheduledTask>>,
}

impl WorkerHandle {
    pub async fn post(&self, event: WorkerEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("worker loop has stopped"))
    }

    /// Snapshot of the pending timers as of the last loop iteration.
    pub fn pending(&self) -> Vec<ScheduledTask> {
        self.pending.borrow().clone()
    }
}

pub(crate) struct WorkerLoop {
    worker: Worker,
    feed: Arc<dyn MatchFeed>,
    center: NotificationCenter,
    style: MatchAlertStyle,
    scheduler: NotificationScheduler,
    pending_tx: watch::Sender<Vec<ScheduledTask>>,
}

/// Spawn the event loop and return a handle to it.
pub fn start_worker_loop(
    worker: Worker,
    feed: Arc<dyn MatchFeed>,
    center: NotificationCenter,
    style: MatchAlertStyle,
    poll_interval: Duration,
) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(256);
    let (pending_tx, pending) = watch::channel(Vec::new());

    let event_loop = WorkerLoop::new(worker, feed, center, style, pending_tx);
    tokio::spawn(event_loop.run(rx, poll_interval));

    WorkerHandle { tx, pending }
}

impl WorkerLoop {
    pub(crate) fn new(
        worker: Worker,
        feed: Arc<dyn MatchFeed>,
        center: NotificationCenter,
        style: MatchAlertStyle,
        pending_tx: watch::Sender<Vec<ScheduledTask>>,
    ) -> Self {
        WorkerLoop {
            worker,
            feed,
            center,
            style,
            scheduler: NotificationScheduler::new(),
            pending_tx,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<WorkerEvent>, poll_interval: Duration) {
        info!(
            "Worker loop started (feed={}, poll every {:?})",
            self.feed.name(),
            poll_interval
        );

        let mut poll = tokio::time::interval(poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let wake = self
                .scheduler
                .next_deadline()
                .map(|at| (at - Utc::now()).to_std().unwrap_or_default());

            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        info!("Worker channel closed, stopping loop");
                        break;
                    }
                },
                _ = poll.tick() => self.refresh_from_feed().await,
                _ = sleep_or_never(wake) => self.fire_due(Utc::now()).await,
            }
        }
    }

    pub(crate) async fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Message(WorkerMessage::SkipWaiting) => {
                self.worker.skip_waiting().await;
            }
            WorkerEvent::Message(WorkerMessage::UpdateMatches { matches }) => {
                let matches = parse_match_list(&matches);
                info!("Received {} matches from the page", matches.len());
                self.rebuild(matches, Utc::now());
            }
            WorkerEvent::Message(WorkerMessage::ShowNotification { title, body, icon }) => {
                let mut notification = Notification::new(title).icon(icon);
                notification.body = body;
                self.center.show(notification).await;
            }
            WorkerEvent::Sync(tag) if tag == SYNC_MATCH_CHECK => {
                debug!("Background sync '{}'", tag);
                self.refresh_from_feed().await;
            }
            WorkerEvent::Sync(tag) => {
                debug!("Ignoring background sync '{}'", tag);
            }
        }
    }

    /// Re-fetch the feed and rebuild. On failure the current schedule stays.
    pub(crate) async fn refresh_from_feed(&mut self) {
        match self.feed.fetch_matches().await {
            Ok(matches) => {
                info!("Fetched {} matches from {}", matches.len(), self.feed.name());
                self.rebuild(matches, Utc::now());
            }
            Err(e) => warn!("Match refresh from {} failed: {:#}", self.feed.name(), e),
        }
    }

    pub(crate) fn rebuild(&mut self, matches: Vec<MatchRecord>, now: DateTime<Utc>) {
        self.scheduler.rebuild(matches, now);
        debug!("{} timers pending after rebuild", self.scheduler.pending_count());
        self.publish();
    }

    /// Show a notification for every timer due at `now`.
    pub(crate) async fn fire_due(&mut self, now: DateTime<Utc>) {
        for task in self.scheduler.take_due(now) {
            let Some(record) = self.scheduler.match_record(&task.match_id) else {
                warn!("Timer {} has no match record", task.key());
                continue;
            };
            let notification = match_notification(record, task.kind, &self.style);
            self.center.show(notification).await;
        }
        self.publish();
    }

    fn publish(&self) {
        self.pending_tx.send_replace(self.scheduler.list_pending());
    }
}

async fn sleep_or_never(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::network::fake::FakeNetwork;
    use crate::cache::{CacheManager, CacheStorage};
    use crate::notify::NotificationKind;
    use crate::worker::{ClientRegistry, WorkerState};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::sync::Mutex;
    use url::Url;

    /// Feed that returns a scripted result and counts calls.
    struct ScriptedFeed {
        result: Mutex<Option<Vec<MatchRecord>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedFeed {
        fn new(result: Option<Vec<MatchRecord>>) -> Self {
            ScriptedFeed {
                result: Mutex::new(result),
                calls: Mutex::new(0),
            }
        }

        fn set(&self, result: Option<Vec<MatchRecord>>) {
            *self.result.lock().unwrap() = result;
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl MatchFeed for ScriptedFeed {
        async fn fetch_matches(&self) -> Result<Vec<MatchRecord>> {
            *self.calls.lock().unwrap() += 1;
            match self.result.lock().unwrap().clone() {
                Some(matches) => Ok(matches),
                None => anyhow::bail!("feed returned non-JSON body"),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn record(id: &str, start: DateTime<Utc>) -> MatchRecord {
        MatchRecord {
            id: id.into(),
            team1: "India".into(),
            team2: "Sri Lanka".into(),
            match_time: start.to_rfc3339(),
        }
    }

    fn build(
        feed: Arc<ScriptedFeed>,
        defer: bool,
    ) -> (WorkerLoop, NotificationCenter, watch::Receiver<Vec<ScheduledTask>>) {
        let origin = Url::parse("https://cricstreamzone.netlify.app").unwrap();
        let cache = CacheManager::new(CacheStorage::new(), "cricstreamzone-v1", &origin, &[])
            .unwrap();
        let worker = Worker::new(cache, ClientRegistry::new(), Arc::new(FakeNetwork::new()), defer);
        let center = NotificationCenter::new();
        let style = MatchAlertStyle {
            icon: "icon.png".into(),
            page_url: "/".into(),
        };
        let (pending_tx, pending_rx) = watch::channel(Vec::new());
        let event_loop = WorkerLoop::new(worker, feed, center.clone(), style, pending_tx);
        (event_loop, center, pending_rx)
    }

    #[tokio::test]
    async fn test_update_matches_message_rebuilds_schedule() {
        let feed = Arc::new(ScriptedFeed::new(None));
        let (mut event_loop, _center, pending) = build(feed, false);
        let start = Utc::now() + ChronoDuration::hours(1);

        event_loop
            .handle_event(WorkerEvent::Message(WorkerMessage::UpdateMatches {
                matches: vec![json!({
                    "Match": "5",
                    "Team1": "India",
                    "Team2": "Sri Lanka",
                    "MatchTime": start.to_rfc3339(),
                })],
            }))
            .await;

        let pending = pending.borrow().clone();
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|t| t.match_id == "5"));
    }

    #[tokio::test]
    async fn test_sync_signal_refetches_feed() {
        let start = Utc::now() + ChronoDuration::hours(2);
        let feed = Arc::new(ScriptedFeed::new(Some(vec![record("9", start)])));
        let (mut event_loop, _center, pending) = build(feed.clone(), false);

        event_loop
            .handle_event(WorkerEvent::Sync("periodic-cleanup".into()))
            .await;
        assert_eq!(feed.calls(), 0);

        event_loop
            .handle_event(WorkerEvent::Sync(SYNC_MATCH_CHECK.into()))
            .await;
        assert_eq!(feed.calls(), 1);
        assert_eq!(pending.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_schedule() {
        let start = Utc::now() + ChronoDuration::hours(2);
        let feed = Arc::new(ScriptedFeed::new(Some(vec![record("9", start)])));
        let (mut event_loop, _center, pending) = build(feed.clone(), false);

        event_loop.refresh_from_feed().await;
        let before = pending.borrow().clone();

        feed.set(None);
        event_loop.refresh_from_feed().await;
        assert_eq!(*pending.borrow(), before);
        assert_eq!(before.len(), 3);
    }

    #[tokio::test]
    async fn test_fire_due_shows_match_notifications() {
        let feed = Arc::new(ScriptedFeed::new(None));
        let (mut event_loop, center, pending) = build(feed, false);
        let now = Utc::now();
        let start = now + ChronoDuration::minutes(20);
        event_loop.rebuild(vec![record("3", start)], now);

        event_loop
            .fire_due(start - ChronoDuration::minutes(5))
            .await;

        let shown = center.list().await;
        let tags: Vec<_> = shown
            .iter()
            .filter_map(|d| d.notification.tag.clone())
            .collect();
        assert_eq!(tags, vec!["match-3-15min".to_string(), "match-3-5min".to_string()]);
        let left = pending.borrow().clone();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].kind, NotificationKind::Live);
    }

    #[tokio::test]
    async fn test_show_notification_message() {
        let feed = Arc::new(ScriptedFeed::new(None));
        let (mut event_loop, center, _pending) = build(feed, false);

        event_loop
            .handle_event(WorkerEvent::Message(WorkerMessage::ShowNotification {
                title: "Toss won by India".into(),
                body: Some("India elect to bat".into()),
                icon: None,
            }))
            .await;

        let shown = center.list().await;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].notification.title, "Toss won by India");
        assert_eq!(shown[0].notification.tag.as_deref(), Some("notification-1"));
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates() {
        let feed = Arc::new(ScriptedFeed::new(None));
        let (mut event_loop, _center, _pending) = build(feed, true);
        event_loop.worker.install().await.unwrap();
        assert_eq!(event_loop.worker.state().await, WorkerState::Installed);

        event_loop
            .handle_event(WorkerEvent::Message(WorkerMessage::SkipWaiting))
            .await;
        assert_eq!(event_loop.worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_handle_reports_pending_from_running_loop() {
        let start = Utc::now() + ChronoDuration::hours(1);
        let feed = Arc::new(ScriptedFeed::new(Some(vec![record("1", start)])));
        let origin = Url::parse("https://cricstreamzone.netlify.app").unwrap();
        let cache = CacheManager::new(CacheStorage::new(), "v", &origin, &[]).unwrap();
        let worker = Worker::new(cache, ClientRegistry::new(), Arc::new(FakeNetwork::new()), false);
        let style = MatchAlertStyle {
            icon: "icon.png".into(),
            page_url: "/".into(),
        };

        let handle = start_worker_loop(
            worker,
            feed,
            NotificationCenter::new(),
            style,
            Duration::from_secs(1800),
        );

        // First poll tick fires immediately; wait for it to publish.
        let mut rx = handle.pending.clone();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|p| !p.is_empty()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.pending().len(), 3);
    }
}
