//! Notifications
//!
//! The notifier contract: showing an alert never blocks the monitor loop,
//! and every shown alert reports exactly one dismissal, whether the user
//! closed it or it timed out.

use crate::monitor::ControlEvent;
use crate::tracker::Alert;
use anyhow::Result;
use chrono::Local;
use crossbeam_channel::{after, bounded, select, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Alerts close by themselves after this long
pub const AUTO_DISMISS: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    User,
    Timeout,
}

/// One-shot dismissal handle for a displayed alert.
///
/// Clones share the same flag; only the first `dismiss` reaches the monitor.
#[derive(Debug, Clone)]
pub struct Dismissal {
    id: String,
    fired: Arc<AtomicBool>,
    sender: Sender<ControlEvent>,
}

impl Dismissal {
    pub fn new(id: impl Into<String>, sender: Sender<ControlEvent>) -> Self {
        Self {
            id: id.into(),
            fired: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns false if this alert was already dismissed
    pub fn dismiss(&self, reason: DismissReason) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!("Alert for {} dismissed ({:?})", self.id, reason);
        if self
            .sender
            .send(ControlEvent::Dismissed {
                id: self.id.clone(),
                reason,
            })
            .is_err()
        {
            debug!("Monitor already stopped, dismissal of {} dropped", self.id);
        }
        true
    }

    #[cfg(test)]
    pub fn is_dismissed(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// True if both handles belong to the same displayed alert
    pub fn same_alert(&self, other: &Dismissal) -> bool {
        Arc::ptr_eq(&self.fired, &other.fired)
    }
}

/// Presentation side of an alert
pub trait Notifier: Send {
    /// Posts the alert for display and returns immediately
    fn notify(&self, alert: &Alert, message: &str, dismissal: Dismissal) -> Result<()>;
}

struct PendingAlert {
    dismissal: Dismissal,
    cancel: Sender<()>,
}

/// Prints alerts to the console; `dismiss_all` is the user's close button
#[derive(Clone)]
pub struct ConsoleNotifier {
    pending: Arc<Mutex<HashMap<String, PendingAlert>>>,
    timeout: Duration,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::with_timeout(AUTO_DISMISS)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Closes every open alert, returns how many were open
    pub fn dismiss_all(&self) -> usize {
        let drained: Vec<PendingAlert> = self.pending.lock().drain().map(|(_, p)| p).collect();
        let mut count = 0;
        for alert in drained {
            let _ = alert.cancel.try_send(());
            if alert.dismissal.dismiss(DismissReason::User) {
                count += 1;
            }
        }
        count
    }

    /// Drops the open entry for this alert without reporting a dismissal
    fn forget(&self, dismissal: &Dismissal) {
        let mut pending = self.pending.lock();
        if pending
            .get(dismissal.id())
            .is_some_and(|p| p.dismissal.same_alert(dismissal))
        {
            pending.remove(dismissal.id());
        }
    }

    #[cfg(test)]
    pub fn open_alerts(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, alert: &Alert, message: &str, dismissal: Dismissal) -> Result<()> {
        println!();
        println!("{}", "═".repeat(60));
        println!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        println!("(type 'd' + Enter to close)");
        println!("{}", "═".repeat(60));
        info!("Alert shown for {}: {}", alert.id, message);

        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        {
            let mut pending = self.pending.lock();
            if let Some(old) = pending.insert(
                alert.id.clone(),
                PendingAlert {
                    dismissal: dismissal.clone(),
                    cancel: cancel_tx,
                },
            ) {
                warn!("Replacing open alert for {}", alert.id);
                let _ = old.cancel.try_send(());
                old.dismissal.dismiss(DismissReason::User);
            }
        }

        // Auto-dismiss, cancelled when the user closes first
        let notifier = self.clone();
        let timeout = self.timeout;
        let handle = dismissal.clone();
        let spawned = thread::Builder::new()
            .name("alert-timeout".to_string())
            .spawn(move || {
                select! {
                    recv(cancel_rx) -> _ => {}
                    recv(after(timeout)) -> _ => {
                        notifier.forget(&dismissal);
                        dismissal.dismiss(DismissReason::Timeout);
                    }
                }
            });

        if let Err(e) = spawned {
            self.forget(&handle);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn alert() -> Alert {
        Alert {
            id: "QQ.exe".to_string(),
            display_names: vec!["qq".to_string()],
            run_seconds: 7200.0,
        }
    }

    #[test]
    fn default_timeout_is_five_seconds() {
        assert_eq!(AUTO_DISMISS, Duration::from_secs(5));
        assert_eq!(ConsoleNotifier::new().timeout, Duration::from_secs(5));
    }

    #[test]
    fn forget_leaves_newer_alert_alone() {
        let (tx, rx) = unbounded();
        let notifier = ConsoleNotifier::with_timeout(Duration::from_secs(60));
        let stale = Dismissal::new("QQ.exe", tx.clone());
        let current = Dismissal::new("QQ.exe", tx);
        notifier
            .notify(&alert(), "take a break", current.clone())
            .unwrap();

        notifier.forget(&stale);
        assert_eq!(notifier.open_alerts(), 1);

        notifier.forget(&current);
        assert_eq!(notifier.open_alerts(), 0);
        assert_eq!(notifier.dismiss_all(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dismissal_fires_once() {
        let (tx, rx) = unbounded();
        let dismissal = Dismissal::new("QQ.exe", tx);
        let clone = dismissal.clone();

        assert!(dismissal.dismiss(DismissReason::User));
        assert!(!clone.dismiss(DismissReason::Timeout));
        assert!(clone.is_dismissed());

        assert_eq!(
            rx.try_recv().unwrap(),
            ControlEvent::Dismissed {
                id: "QQ.exe".to_string(),
                reason: DismissReason::User
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn console_alert_times_out() {
        let (tx, rx) = unbounded();
        let notifier = ConsoleNotifier::with_timeout(Duration::from_millis(50));
        notifier
            .notify(&alert(), "take a break", Dismissal::new("QQ.exe", tx))
            .unwrap();
        assert_eq!(notifier.open_alerts(), 1);

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            event,
            ControlEvent::Dismissed {
                id: "QQ.exe".to_string(),
                reason: DismissReason::Timeout
            }
        );
        assert_eq!(notifier.open_alerts(), 0);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn user_close_cancels_the_timeout() {
        let (tx, rx) = unbounded();
        let notifier = ConsoleNotifier::with_timeout(Duration::from_millis(100));
        notifier
            .notify(&alert(), "take a break", Dismissal::new("QQ.exe", tx))
            .unwrap();

        assert_eq!(notifier.dismiss_all(), 1);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            ControlEvent::Dismissed {
                id: "QQ.exe".to_string(),
                reason: DismissReason::User
            }
        );
        // Nothing more once the timeout would have elapsed
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(notifier.dismiss_all(), 0);
    }
}
