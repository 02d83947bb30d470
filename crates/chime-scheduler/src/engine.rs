use std::time::Duration;

use chime_core::reminder::Notification;
use chrono::{Days, NaiveDateTime};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, LocalClock},
    evaluate::FallbackPolicy,
    store::{Fired, ReminderStore},
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub fired: Vec<Fired>,
    /// The daily reset ran during this tick.
    pub rolled_over: bool,
}

/// Drives the reminder store on a fixed tick until told to stop.
pub struct SchedulerEngine<C: Clock = LocalClock> {
    store: ReminderStore,
    policy: FallbackPolicy,
    clock: C,
    tick_interval: Duration,
    /// If set, every fire is sent here for delivery to the event sink.
    fired_tx: Option<mpsc::Sender<Notification>>,
    /// Rollover instant (date + rollover time) most recently applied.
    last_rollover: Option<NaiveDateTime>,
}

impl SchedulerEngine<LocalClock> {
    /// Create an engine on the local wall clock.
    ///
    /// Pass `Some(tx)` to receive a [`Notification`] for every fire. The
    /// sender is non-blocking (`try_send`) so the tick loop is never stalled
    /// by a slow sink.
    pub fn new(
        store: ReminderStore,
        policy: FallbackPolicy,
        tick_interval: Duration,
        fired_tx: Option<mpsc::Sender<Notification>>,
    ) -> Self {
        Self::with_clock(store, policy, tick_interval, fired_tx, LocalClock)
    }
}

impl<C: Clock> SchedulerEngine<C> {
    pub fn with_clock(
        store: ReminderStore,
        policy: FallbackPolicy,
        tick_interval: Duration,
        fired_tx: Option<mpsc::Sender<Notification>>,
        clock: C,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
            tick_interval,
            fired_tx,
            last_rollover: None,
        }
    }

    pub fn store(&self) -> &ReminderStore {
        &self.store
    }

    /// Main loop. Ticks every `tick_interval` until `shutdown` carries `true`
    /// or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        info!(
            reminders = self.store.len(),
            tick_ms = self.tick_interval.as_millis() as u64,
            "scheduler engine started"
        );

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one tick against the engine's clock.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        self.tick_at(now)
    }

    /// Run one tick as if the wall clock read `now`.
    pub fn tick_at(&mut self, now: NaiveDateTime) -> TickOutcome {
        let fired = self.store.step_all(now, &self.policy);
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        for f in &fired {
            info!(reminder = %f.name, trigger = %f.trigger, "showing reminder notification");
            self.forward(Notification::for_reminder(
                &f.name,
                f.trigger.as_str(),
                stamp.clone(),
            ));
        }

        let rolled_over = self.maybe_rollover(now);
        TickOutcome { fired, rolled_over }
    }

    // Failures here are per notification: log and move on to the next record.
    fn forward(&self, notification: Notification) {
        let Some(ref tx) = self.fired_tx else {
            return;
        };
        if let Err(e) = tx.try_send(notification) {
            let reminder = match &e {
                mpsc::error::TrySendError::Full(n) | mpsc::error::TrySendError::Closed(n) => {
                    n.reminder.clone()
                }
            };
            warn!(%reminder, "delivery channel full or closed, notification dropped");
        }
    }

    /// Reset every record once per rollover instant.
    ///
    /// The reset catches up when no tick landed between the rollover time and
    /// midnight (coarse ticks, or the machine slept through it): the latest
    /// instant at or before `now` may be yesterday's.
    fn maybe_rollover(&mut self, now: NaiveDateTime) -> bool {
        let Some(due) = latest_rollover(now, &self.policy) else {
            return false;
        };
        let last = match self.last_rollover {
            Some(last) => last,
            // First tick: only today's instant counts, nothing before startup.
            None if now.time() >= self.policy.rollover.as_naive_time() => NaiveDateTime::MIN,
            None => due,
        };
        self.last_rollover = Some(last.max(due));
        if last >= due {
            return false;
        }
        let acknowledged = self.store.reset_all();
        info!(
            date = %due.date(),
            late = now.date() != due.date(),
            acknowledged,
            "daily rollover: task flags reset"
        );
        debug!(reminders = self.store.len(), "rollover complete");
        true
    }
}

/// The most recent rollover instant at or before `now`.
fn latest_rollover(now: NaiveDateTime, policy: &FallbackPolicy) -> Option<NaiveDateTime> {
    let at = policy.rollover.as_naive_time();
    let date = if now.time() >= at {
        now.date()
    } else {
        now.date().checked_sub_days(Days::new(1))?
    };
    Some(date.and_time(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::evaluate::Trigger;
    use chime_core::reminder::ReminderDef;
    use chrono::NaiveDate;

    fn mon(hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn store() -> ReminderStore {
        ReminderStore::from_definitions(&[ReminderDef {
            name: "standup".to_string(),
            days: vec!["monday".to_string()],
            time: "09:00".to_string(),
            url: None,
        }])
    }

    fn quiet_policy() -> FallbackPolicy {
        FallbackPolicy {
            hourly_safety_net: false,
            ..FallbackPolicy::default()
        }
    }

    #[test]
    fn tick_forwards_notification_for_each_fire() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut engine = SchedulerEngine::with_clock(
            store(),
            quiet_policy(),
            Duration::from_secs(1),
            Some(tx),
            ManualClock::new(mon(9, 1)),
        );

        let outcome = engine.tick();
        assert_eq!(outcome.fired.len(), 1);
        assert_eq!(outcome.fired[0].trigger, Trigger::Scheduled);

        let n = rx.try_recv().unwrap();
        assert_eq!(n.title, "standup");
        assert_eq!(n.body, "Reminder: standup");
        assert_eq!(n.trigger, "scheduled");
        assert_eq!(n.fired_at, "2024-01-01 09:01:00");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_channel_does_not_stall_or_lose_state() {
        let (tx, _rx) = mpsc::channel(1);
        let store = ReminderStore::from_definitions(&[
            ReminderDef {
                name: "a".to_string(),
                days: vec!["monday".to_string()],
                time: "09:00".to_string(),
                url: None,
            },
            ReminderDef {
                name: "b".to_string(),
                days: vec!["monday".to_string()],
                time: "09:00".to_string(),
                url: None,
            },
        ]);
        let mut engine = SchedulerEngine::with_clock(
            store.clone(),
            quiet_policy(),
            Duration::from_secs(1),
            Some(tx),
            ManualClock::new(mon(9, 0)),
        );
        let outcome = engine.tick();
        assert_eq!(outcome.fired.len(), 2);
        assert!(store.snapshot().iter().all(|r| r.fire_count == 1));
    }

    #[test]
    fn rollover_runs_once_per_date() {
        let store = store();
        let mut engine = SchedulerEngine::with_clock(
            store.clone(),
            quiet_policy(),
            Duration::from_secs(1),
            None,
            ManualClock::new(mon(23, 58)),
        );
        store.mark_done("standup").unwrap();

        assert!(!engine.tick_at(mon(23, 58)).rolled_over);
        assert!(engine.tick_at(mon(23, 59)).rolled_over);
        assert!(!store.get("standup").unwrap().completed);

        store.mark_done("standup").unwrap();
        let later = mon(23, 59) + chrono::Duration::seconds(30);
        assert!(!engine.tick_at(later).rolled_over);
        assert!(store.get("standup").unwrap().completed);
    }

    #[test]
    fn rollover_catches_up_when_the_window_was_missed() {
        let store = store();
        let mut engine = SchedulerEngine::with_clock(
            store.clone(),
            quiet_policy(),
            Duration::from_secs(60),
            None,
            ManualClock::new(mon(22, 0)),
        );
        store.mark_done("standup").unwrap();

        assert!(!engine.tick_at(mon(22, 0)).rolled_over);
        // Suspended from Monday evening until Wednesday morning.
        let wed = NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        assert!(engine.tick_at(wed).rolled_over);
        assert!(!store.get("standup").unwrap().completed);
        assert!(!engine.tick_at(wed + chrono::Duration::minutes(1)).rolled_over);
    }

    #[test]
    fn first_tick_before_rollover_does_not_reset() {
        let store = store();
        let mut engine = SchedulerEngine::with_clock(
            store.clone(),
            quiet_policy(),
            Duration::from_secs(1),
            None,
            ManualClock::new(mon(0, 30)),
        );
        store.mark_done("standup").unwrap();
        assert!(!engine.tick_at(mon(0, 30)).rolled_over);
        assert!(store.get("standup").unwrap().completed);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let (tx, mut rx) = mpsc::channel(64);
        let engine = SchedulerEngine::with_clock(
            store(),
            quiet_policy(),
            Duration::from_millis(10),
            Some(tx),
            ManualClock::new(mon(9, 5)),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(engine.run(shutdown_rx));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.reminder, "standup");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn run_stops_when_shutdown_sender_is_dropped() {
        let engine = SchedulerEngine::with_clock(
            store(),
            quiet_policy(),
            Duration::from_millis(10),
            None,
            ManualClock::new(mon(8, 0)),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(engine.run(shutdown_rx));
        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
