//! Attention-flag polling and the local mirror it feeds.
//!
//! The poller is an explicit service object with a start/stop lifecycle,
//! owned by the session root and injected where needed.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::message::Message;
use crate::model::{NotificationEntry, NotificationLevel};
use crate::service::NotificationService;

/// Local mirror of the server's attention flags, keyed by (project, task).
/// At most one active entry per task.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    entries: HashMap<(String, String), NotificationEntry>,
}

impl NotificationCenter {
    /// Swap in a fresh poll. Returns the Critical entries that were not
    /// present before, so the caller can chime once per new flag.
    pub fn replace_all(&mut self, entries: Vec<NotificationEntry>) -> Vec<NotificationEntry> {
        let mut fresh_critical = Vec::new();
        let mut next = HashMap::new();
        for entry in entries {
            let key = (entry.project_id.clone(), entry.task_id.clone());
            if entry.level == NotificationLevel::Critical && !self.entries.contains_key(&key) {
                fresh_critical.push(entry.clone());
            }
            next.insert(key, entry);
        }
        self.entries = next;
        fresh_critical
    }

    pub fn lookup(&self, project_id: &str, task_id: &str) -> Option<&NotificationEntry> {
        self.entries
            .get(&(project_id.to_string(), task_id.to_string()))
    }

    /// Optimistic local removal; the remote dismiss runs separately and the
    /// local state may transiently diverge until the next poll
    pub fn remove(&mut self, project_id: &str, task_id: &str) -> Option<NotificationEntry> {
        self.entries
            .remove(&(project_id.to_string(), task_id.to_string()))
    }

    /// Most recent entry, for the jump-to-notification key
    pub fn latest(&self) -> Option<&NotificationEntry> {
        self.entries.values().max_by_key(|e| e.timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fixed-interval poller thread feeding `NotificationsLoaded` messages into
/// the update loop. Torn down with `stop()` when the session ends.
pub struct NotificationPoller {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl NotificationPoller {
    pub fn start(
        service: Arc<dyn NotificationService>,
        tx: Sender<Message>,
        interval: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || loop {
            // Polling is best-effort; a failed poll just waits for the next tick
            if let Ok(entries) = service.list_all_hooks() {
                if tx.send(Message::NotificationsLoaded(entries)).is_err() {
                    break;
                }
            }
            match stop_rx.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the poller and wait for it to exit; no messages arrive after
    /// this returns
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NotificationPoller {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ServiceError, ServiceResult};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::channel;

    fn entry(task_id: &str, level: NotificationLevel) -> NotificationEntry {
        NotificationEntry {
            project_id: "p1".to_string(),
            task_id: task_id.to_string(),
            level,
            message: "agent finished".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_replace_all_reports_only_new_criticals() {
        let mut center = NotificationCenter::default();

        let fresh = center.replace_all(vec![
            entry("t1", NotificationLevel::Critical),
            entry("t2", NotificationLevel::Notice),
        ]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].task_id, "t1");
        assert_eq!(center.len(), 2);

        // The same critical again is no longer "new"
        let fresh = center.replace_all(vec![
            entry("t1", NotificationLevel::Critical),
            entry("t3", NotificationLevel::Critical),
        ]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].task_id, "t3");
        assert!(center.lookup("p1", "t2").is_none());
    }

    #[test]
    fn test_remove_is_local_only() {
        let mut center = NotificationCenter::default();
        center.replace_all(vec![entry("t1", NotificationLevel::Warn)]);

        assert!(center.remove("p1", "t1").is_some());
        assert!(center.lookup("p1", "t1").is_none());
        assert!(center.remove("p1", "t1").is_none());
    }

    struct CountingService {
        polls: AtomicUsize,
    }

    impl NotificationService for CountingService {
        fn list_all_hooks(&self) -> ServiceResult<Vec<NotificationEntry>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![entry("t1", NotificationLevel::Notice)])
        }

        fn dismiss_hook(&self, _project_id: &str, _task_id: &str) -> ServiceResult<()> {
            Err(ServiceError::Transport("not used".to_string()))
        }
    }

    #[test]
    fn test_poller_delivers_then_stops_cleanly() {
        let service = Arc::new(CountingService {
            polls: AtomicUsize::new(0),
        });
        let (tx, rx) = channel();

        let poller =
            NotificationPoller::start(service.clone(), tx, Duration::from_millis(10));
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(first, Message::NotificationsLoaded(ref e) if e.len() == 1));

        poller.stop();
        // Thread is joined; drain whatever was buffered and confirm silence
        while rx.try_recv().is_ok() {}
        assert!(rx.try_recv().is_err());
        assert!(service.polls.load(Ordering::SeqCst) >= 1);
    }
}
