//! User-visible notices.
//!
//! `Banner` is the headless counterpart of a transient status banner: success
//! and error notices are published to a watch channel for display surfaces
//! (control API, logs) and auto-dismissed after a fixed delay. A full notice
//! history is kept so callers can inspect what was shown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

const DISMISS_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Clone)]
pub struct Banner {
    current: Arc<watch::Sender<Option<Notice>>>,
    history: Arc<Mutex<Vec<Notice>>>,
    seq: Arc<AtomicU64>,
    dismiss_after: Duration,
}

impl Default for Banner {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            current: Arc::new(tx),
            history: Arc::new(Mutex::new(Vec::new())),
            seq: Arc::new(AtomicU64::new(0)),
            dismiss_after: DISMISS_AFTER,
        }
    }
}

impl Banner {
    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.publish(Notice {
            kind: NoticeKind::Success,
            message,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.publish(Notice {
            kind: NoticeKind::Error,
            message,
        });
    }

    /// Watch the currently displayed notice. `None` means dismissed.
    pub fn subscribe(&self) -> watch::Receiver<Option<Notice>> {
        self.current.subscribe()
    }

    pub fn history(&self) -> Vec<Notice> {
        self.history.lock().unwrap().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|n| n.kind == NoticeKind::Error)
            .map(|n| n.message.clone())
    }

    fn publish(&self, notice: Notice) {
        self.history.lock().unwrap().push(notice.clone());
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.current.send(Some(notice));

        // Dismiss unless a newer notice has replaced this one in the meantime.
        let current = Arc::clone(&self.current);
        let counter = Arc::clone(&self.seq);
        let dismiss_after = self.dismiss_after;
        tokio::spawn(async move {
            tokio::time::sleep(dismiss_after).await;
            if counter.load(Ordering::SeqCst) == seq {
                let _ = current.send(None);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_notice_auto_dismisses() {
        let banner = Banner::default();
        let mut rx = banner.subscribe();

        banner.error("Call error: something broke");
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|n| n.kind),
            Some(NoticeKind::Error)
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_notice_survives_older_dismiss() {
        let banner = Banner::default();
        let rx = banner.subscribe();

        banner.error("first");
        tokio::time::sleep(Duration::from_secs(3)).await;
        banner.success("second");
        // First notice's dismiss timer fires now, second must stay visible.
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(
            rx.borrow().as_ref().map(|n| n.message.clone()),
            Some("second".to_string())
        );
        assert_eq!(banner.history().len(), 2);
    }

    #[tokio::test]
    async fn test_last_error_skips_successes() {
        let banner = Banner::default();
        banner.error("boom");
        banner.success("fine");
        assert_eq!(banner.last_error(), Some("boom".to_string()));
    }
}
