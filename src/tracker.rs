//! Run Tracker
//!
//! Per-target continuous-run state machine. Owned by the monitor loop,
//! so nothing here is shared or locked.
//!
//! All timestamps live on an [`ActiveClock`] that stops while monitoring
//! is paused: a paused interval counts as zero width for both the run
//! timers and the suppression window.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Monotonic clock that only advances while monitoring is enabled
#[derive(Debug, Clone)]
pub struct ActiveClock {
    origin: Instant,
    paused_total: Duration,
    paused_at: Option<Instant>,
}

impl ActiveClock {
    pub fn new(origin: Instant) -> Self {
        Self {
            origin,
            paused_total: Duration::ZERO,
            paused_at: None,
        }
    }

    /// Active time elapsed since `origin` as seen at `at`
    pub fn now(&self, at: Instant) -> Duration {
        let end = self.paused_at.unwrap_or(at);
        end.saturating_duration_since(self.origin)
            .saturating_sub(self.paused_total)
    }

    pub fn pause(&mut self, at: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(at);
        }
    }

    pub fn resume(&mut self, at: Instant) {
        if let Some(since) = self.paused_at.take() {
            self.paused_total += at.saturating_duration_since(since);
        }
    }
}

/// Timing state of one monitored executable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// Start of the current continuous run (active-clock time)
    pub continuous_start: Option<Duration>,
    /// Last dismissal (active-clock time), `None` = never
    pub last_alert: Option<Duration>,
    pub notification_pending: bool,
}

#[derive(Debug, Clone)]
struct Target {
    display_names: Vec<String>,
    state: RunState,
}

/// Emitted once a continuous run crosses the trigger duration
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: String,
    pub display_names: Vec<String>,
    pub run_seconds: f64,
}

impl Alert {
    /// First alias, or the executable name
    pub fn primary_name(&self) -> &str {
        self.display_names
            .first()
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}

pub struct RunTracker {
    targets: BTreeMap<String, Target>,
    trigger_duration: Duration,
    suppress_duration: Duration,
    clock: ActiveClock,
    monitoring: bool,
}

impl RunTracker {
    pub fn new(trigger_duration: Duration, suppress_duration: Duration, origin: Instant) -> Self {
        Self {
            targets: BTreeMap::new(),
            trigger_duration,
            suppress_duration,
            clock: ActiveClock::new(origin),
            monitoring: true,
        }
    }

    /// Starts tracking an executable with a fresh `RunState`
    pub fn add_target(&mut self, id: impl Into<String>, display_names: Vec<String>) {
        self.targets.insert(
            id.into(),
            Target {
                display_names,
                state: RunState::default(),
            },
        );
    }

    pub fn target_ids(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub fn state(&self, id: &str) -> Option<&RunState> {
        self.targets.get(id).map(|t| &t.state)
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn set_monitoring(&mut self, enabled: bool, at: Instant) {
        if enabled == self.monitoring {
            return;
        }
        self.monitoring = enabled;
        if enabled {
            self.clock.resume(at);
        } else {
            self.clock.pause(at);
        }
    }

    /// Flips monitoring and returns the new state
    pub fn toggle(&mut self, at: Instant) -> bool {
        self.set_monitoring(!self.monitoring, at);
        self.monitoring
    }

    /// Advances every target against one process snapshot
    pub fn tick(&mut self, running: &HashSet<String>, at: Instant) -> Vec<Alert> {
        if !self.monitoring {
            return Vec::new();
        }

        let now = self.clock.now(at);
        let mut alerts = Vec::new();

        for (id, target) in self.targets.iter_mut() {
            let state = &mut target.state;

            if !running.contains(id) {
                if state.continuous_start.take().is_some() {
                    debug!("{} stopped, run reset", id);
                }
                continue;
            }

            let Some(start) = state.continuous_start else {
                debug!("{} started running", id);
                state.continuous_start = Some(now);
                continue;
            };

            let elapsed = now.saturating_sub(start);
            if elapsed < self.trigger_duration {
                continue;
            }

            let suppressed = state
                .last_alert
                .is_some_and(|last| now.saturating_sub(last) < self.suppress_duration);

            if suppressed || state.notification_pending {
                continue;
            }

            info!("{} running for {:.1}s, raising alert", id, elapsed.as_secs_f64());
            state.notification_pending = true;
            state.continuous_start = None;
            alerts.push(Alert {
                id: id.clone(),
                display_names: target.display_names.clone(),
                run_seconds: elapsed.as_secs_f64(),
            });
        }

        alerts
    }

    /// Notification for `id` was closed (by the user or by timeout)
    pub fn dismissed(&mut self, id: &str, at: Instant) -> bool {
        let now = self.clock.now(at);
        match self.targets.get_mut(id) {
            Some(target) => {
                target.state.last_alert = Some(now);
                target.state.notification_pending = false;
                true
            }
            None => false,
        }
    }

    /// The notifier could not show the alert; release the pending flag only
    pub fn notification_failed(&mut self, id: &str) {
        if let Some(target) = self.targets.get_mut(id) {
            target.state.notification_pending = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXE: &str = "QQ.exe";

    struct Harness {
        tracker: RunTracker,
        t0: Instant,
    }

    impl Harness {
        fn new(trigger: u64, suppress: u64) -> Self {
            let t0 = Instant::now();
            let mut tracker = RunTracker::new(
                Duration::from_secs(trigger),
                Duration::from_secs(suppress),
                t0,
            );
            tracker.add_target(EXE, vec!["qq".to_string()]);
            Self { tracker, t0 }
        }

        fn at(&self, secs: u64) -> Instant {
            self.t0 + Duration::from_secs(secs)
        }

        fn tick(&mut self, secs: u64, running: bool) -> Vec<Alert> {
            let snapshot: HashSet<String> = if running {
                [EXE.to_string(), "explorer.exe".to_string()].into()
            } else {
                ["explorer.exe".to_string()].into()
            };
            let at = self.at(secs);
            self.tracker.tick(&snapshot, at)
        }

        /// Ticks once per second over `range`, collecting (second, alert)
        fn run(&mut self, range: std::ops::RangeInclusive<u64>, running: bool) -> Vec<(u64, Alert)> {
            let mut out = Vec::new();
            for s in range {
                for alert in self.tick(s, running) {
                    out.push((s, alert));
                }
            }
            out
        }

        fn dismiss(&mut self, secs: u64) {
            let at = self.at(secs);
            assert!(self.tracker.dismissed(EXE, at));
        }
    }

    #[test]
    fn absent_target_never_alerts() {
        let mut h = Harness::new(2, 2);
        assert!(h.run(0..=100, false).is_empty());
        assert_eq!(h.tracker.state(EXE), Some(&RunState::default()));
    }

    #[test]
    fn continuous_run_alerts_once_at_threshold() {
        let mut h = Harness::new(10, 0);
        let alerts = h.run(0..=15, true);

        assert_eq!(alerts.len(), 1);
        let (second, alert) = &alerts[0];
        assert_eq!(*second, 10);
        assert_eq!(alert.id, EXE);
        assert_eq!(alert.primary_name(), "qq");
        assert_eq!(alert.run_seconds, 10.0);

        let state = h.tracker.state(EXE).unwrap();
        assert!(state.notification_pending);
        // Run restarted right after the alert
        assert_eq!(state.continuous_start, Some(Duration::from_secs(11)));
    }

    #[test]
    fn run_seconds_is_actual_elapsed() {
        let mut h = Harness::new(10, 0);
        assert!(h.tick(0, true).is_empty());
        assert!(h.tick(7, true).is_empty());
        let alerts = h.tick(13, true);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].run_seconds, 13.0);
    }

    #[test]
    fn pending_notification_blocks_further_alerts() {
        let mut h = Harness::new(2, 0);
        assert_eq!(h.run(0..=2, true).len(), 1);
        // Never dismissed: the run keeps growing but nothing fires
        assert!(h.run(3..=20, true).is_empty());

        h.dismiss(20);
        let alerts = h.run(21..=21, true);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].1.run_seconds, 18.0);
    }

    #[test]
    fn suppression_window_after_dismissal() {
        let mut h = Harness::new(2, 10);
        assert_eq!(h.run(0..=2, true).len(), 1);
        h.dismiss(3);

        // New run starts at 4, reaches trigger at 6, but suppressed until 13
        assert!(h.run(4..=12, true).is_empty());
        let alerts = h.run(13..=20, true);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, 13);
        assert_eq!(alerts[0].1.run_seconds, 9.0);
    }

    #[test]
    fn disappearing_resets_the_run() {
        let mut h = Harness::new(5, 0);
        assert!(h.run(0..=4, true).is_empty());
        assert!(h.tick(5, false).is_empty());
        assert_eq!(h.tracker.state(EXE).unwrap().continuous_start, None);

        // Back at 6: clock restarts there, trigger at 11
        assert!(h.run(6..=10, true).is_empty());
        let alerts = h.run(11..=11, true);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].1.run_seconds, 5.0);
    }

    #[test]
    fn paused_interval_has_zero_width() {
        let mut h = Harness::new(10, 0);
        assert!(h.run(0..=4, true).is_empty());

        let at = h.at(4);
        assert!(!h.tracker.toggle(at));
        let before = h.tracker.state(EXE).cloned();

        // Ticks while paused change nothing, even with the process gone
        assert!(h.run(5..=100, false).is_empty());
        assert!(h.run(5..=100, true).is_empty());
        assert_eq!(h.tracker.state(EXE).cloned(), before);

        let at = h.at(100);
        assert!(h.tracker.toggle(at));
        // 4s of active run so far; 6 more needed
        assert!(h.run(101..=105, true).is_empty());
        let alerts = h.run(106..=106, true);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].1.run_seconds, 10.0);
    }

    #[test]
    fn dismissal_while_paused_uses_frozen_time() {
        let mut h = Harness::new(1, 10);
        assert_eq!(h.run(0..=1, true).len(), 1);

        let at = h.at(2);
        h.tracker.set_monitoring(false, at);
        h.dismiss(50);
        let at = h.at(60);
        h.tracker.set_monitoring(true, at);

        // Dismissed at active time 2, so suppression lasts until active 12 (= wall 70)
        assert!(h.run(61..=69, true).is_empty());
        assert_eq!(h.run(70..=70, true).len(), 1);
    }

    #[test]
    fn zero_trigger_alerts_on_second_observation() {
        let mut h = Harness::new(0, 0);
        assert!(h.tick(0, true).is_empty());
        let alerts = h.tick(1, true);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].run_seconds, 1.0);
    }

    #[test]
    fn failed_notification_does_not_touch_last_alert() {
        let mut h = Harness::new(1, 100);
        assert_eq!(h.run(0..=1, true).len(), 1);
        h.tracker.notification_failed(EXE);

        let state = h.tracker.state(EXE).unwrap();
        assert!(!state.notification_pending);
        assert_eq!(state.last_alert, None);
        assert_eq!(h.run(2..=3, true).len(), 1);
    }

    #[test]
    fn unknown_dismissal_is_ignored() {
        let mut h = Harness::new(1, 1);
        let at = h.at(1);
        assert!(!h.tracker.dismissed("Steam.exe", at));
    }

    #[test]
    fn targets_are_independent() {
        let t0 = Instant::now();
        let mut tracker = RunTracker::new(Duration::from_secs(3), Duration::ZERO, t0);
        tracker.add_target("A.exe", vec!["a".to_string()]);
        tracker.add_target("B.exe", vec!["b".to_string(), "bee".to_string()]);

        let both: HashSet<String> = ["A.exe".to_string(), "B.exe".to_string()].into();
        let only_b: HashSet<String> = ["B.exe".to_string()].into();

        let mut fired = Vec::new();
        for s in 0..=5 {
            let snapshot = if s == 2 { &only_b } else { &both };
            for alert in tracker.tick(snapshot, t0 + Duration::from_secs(s)) {
                fired.push((s, alert.id));
            }
        }
        assert_eq!(fired, vec![(3, "B.exe".to_string())]);
        assert_eq!(tracker.target_ids().collect::<Vec<_>>(), ["A.exe", "B.exe"]);
    }
}
