//! Monitor Loop
//!
//! The single background thread that owns the run tracker. Everything else
//! talks to it through `ControlEvent`s.

use crate::message::format_message;
use crate::notification::{DismissReason, Dismissal, Notifier};
use crate::registry::TargetRegistry;
use crate::snapshot::ProcessSource;
use crate::tracker::RunTracker;
use anyhow::Result;
use crossbeam_channel::{at, select, unbounded, Receiver, Sender};
use std::collections::{BTreeSet, HashSet};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fallback wait when the interval does not fit in an `Instant`
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Next tick time, saturating for huge intervals
fn next_deadline(now: Instant, interval: Duration) -> Instant {
    now.checked_add(interval)
        .or_else(|| now.checked_add(MAX_WAIT))
        .unwrap_or(now)
}

/// Events delivered to the monitor loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Hotkey / console toggle
    ToggleMonitoring,
    /// An alert window closed
    Dismissed { id: String, reason: DismissReason },
    Shutdown,
}

pub struct MonitorSettings {
    pub check_interval: Duration,
    pub trigger_duration: Duration,
    pub suppress_duration: Duration,
    pub alert_message_template: String,
}

pub struct Monitor<S, N> {
    tracker: RunTracker,
    source: S,
    notifier: N,
    check_interval: Duration,
    template: String,
    events_tx: Sender<ControlEvent>,
    events_rx: Receiver<ControlEvent>,
}

impl<S: ProcessSource, N: Notifier> Monitor<S, N> {
    pub fn new(
        settings: MonitorSettings,
        registry: &TargetRegistry,
        targets: &BTreeSet<String>,
        source: S,
        notifier: N,
    ) -> Self {
        let mut tracker = RunTracker::new(
            settings.trigger_duration,
            settings.suppress_duration,
            Instant::now(),
        );
        for exe in targets {
            tracker.add_target(exe.clone(), registry.display_names_for(exe).to_vec());
        }

        let (events_tx, events_rx) = unbounded();
        Self {
            tracker,
            source,
            notifier,
            check_interval: settings.check_interval,
            template: settings.alert_message_template,
            events_tx,
            events_rx,
        }
    }

    /// Sender for hotkey, notifier and shutdown events
    pub fn sender(&self) -> Sender<ControlEvent> {
        self.events_tx.clone()
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &RunTracker {
        &self.tracker
    }

    /// Takes one snapshot and raises any due alerts
    pub fn tick(&mut self) {
        if !self.tracker.is_monitoring() {
            return;
        }

        let running = match self.source.running_process_names() {
            Ok(names) => names,
            Err(e) => {
                warn!("Process snapshot failed, treating as empty: {:#}", e);
                HashSet::new()
            }
        };

        for alert in self.tracker.tick(&running, Instant::now()) {
            let message = format_message(&self.template, alert.primary_name(), alert.run_seconds);
            let dismissal = Dismissal::new(alert.id.clone(), self.events_tx.clone());
            if let Err(e) = self.notifier.notify(&alert, &message, dismissal) {
                error!("Could not show alert for {}: {:#}", alert.id, e);
                self.tracker.notification_failed(&alert.id);
            }
        }
    }

    /// Applies one control event; returns false on shutdown
    pub fn handle_event(&mut self, event: ControlEvent) -> bool {
        match event {
            ControlEvent::ToggleMonitoring => {
                let enabled = self.tracker.toggle(Instant::now());
                let status = if enabled { "enabled" } else { "paused" };
                info!("Monitoring {}", status);
                println!("Monitoring {}", status);
            }
            ControlEvent::Dismissed { id, reason } => {
                if self.tracker.dismissed(&id, Instant::now()) {
                    debug!("Alert for {} closed ({:?})", id, reason);
                } else {
                    debug!("Dismissal for unknown target {} ignored", id);
                }
            }
            ControlEvent::Shutdown => return false,
        }
        true
    }

    /// Runs until `Shutdown` arrives. The first tick is immediate.
    pub fn run(mut self) {
        info!(
            "Monitoring {:?} every {:?}",
            self.tracker.target_ids().collect::<Vec<_>>(),
            self.check_interval
        );

        let events = self.events_rx.clone();
        let mut deadline = Instant::now();
        loop {
            select! {
                recv(events) -> event => {
                    // The loop holds its own sender, so this never disconnects
                    let Ok(event) = event else { break };
                    if !self.handle_event(event) {
                        break;
                    }
                }
                recv(at(deadline)) -> _ => {
                    self.tick();
                    deadline = next_deadline(Instant::now(), self.check_interval);
                }
            }
        }

        info!("Monitor loop ended");
    }

    /// Starts the loop on its own thread
    pub fn spawn(self) -> Result<(Sender<ControlEvent>, thread::JoinHandle<()>)>
    where
        S: 'static,
        N: 'static,
    {
        let sender = self.sender();
        let handle = thread::Builder::new()
            .name("monitor".to_string())
            .spawn(move || self.run())?;
        Ok((sender, handle))
    }
}
