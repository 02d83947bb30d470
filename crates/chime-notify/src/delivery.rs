//! Delivery task: hands scheduler-fired reminders to the event sink.

use std::sync::Arc;

use chime_core::reminder::Notification;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::sink::EventSink;

/// Background task that receives fired reminders and surfaces them through
/// `sink`.
///
/// Each notification is delivered on its own task, so one hung notifier
/// cannot hold up the queue behind it. When the channel closes, in-flight
/// deliveries are awaited. When `shutdown` carries `true`, queued
/// notifications are dropped and in-flight ones are aborted.
pub async fn run_delivery(
    sink: Arc<dyn EventSink>,
    mut rx: mpsc::Receiver<Notification>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(pending = rx.len(), in_flight = in_flight.len(), "delivery task stopping");
                    in_flight.abort_all();
                    return;
                }
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            next = rx.recv() => {
                let Some(notification) = next else { break };
                let sink = Arc::clone(&sink);
                in_flight.spawn(async move { deliver(sink.as_ref(), &notification).await });
            }
        }
    }
    while !in_flight.is_empty() {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    in_flight.abort_all();
                    return;
                }
            }
            _ = in_flight.join_next() => {}
        }
    }
    info!("delivery task exiting (channel closed)");
}

async fn deliver(sink: &dyn EventSink, n: &Notification) {
    debug!(reminder = %n.reminder, trigger = %n.trigger, sink = sink.name(), "delivering reminder");
    match sink.notify(&n.title, &n.body).await {
        Ok(()) => debug!(reminder = %n.reminder, "reminder delivered"),
        Err(e) => warn!(
            reminder = %n.reminder,
            sink = sink.name(),
            error = %e,
            "reminder delivery FAILED"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(String, String)>>,
        fail: bool,
        /// Title whose delivery never completes.
        hang_on: Option<&'static str>,
    }

    #[async_trait]
    impl EventSink for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
            if self.hang_on.is_some_and(|h| h == title) {
                std::future::pending::<()>().await;
            }
            self.seen
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            if self.fail {
                return Err(NotifyError::SpawnFailed {
                    program: "recording".to_string(),
                    reason: "configured to fail".to_string(),
                });
            }
            Ok(())
        }
    }

    fn notification(name: &str) -> Notification {
        Notification::for_reminder(name, "scheduled", "2024-01-01 09:00:00".to_string())
    }

    #[tokio::test]
    async fn delivers_everything_before_channel_closes() {
        let sink = Arc::new(Recording::default());
        let (tx, rx) = mpsc::channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);
        tx.send(notification("standup")).await.unwrap();
        tx.send(notification("retro")).await.unwrap();
        drop(tx);

        run_delivery(sink.clone(), rx, stop_rx).await;

        let mut seen = sink.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("retro".to_string(), "Reminder: retro".to_string()),
                ("standup".to_string(), "Reminder: standup".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failures_do_not_stop_delivery() {
        let sink = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let (tx, rx) = mpsc::channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);
        tx.send(notification("a")).await.unwrap();
        tx.send(notification("b")).await.unwrap();
        drop(tx);

        run_delivery(sink.clone(), rx, stop_rx).await;
        assert_eq!(sink.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn hung_notifier_does_not_block_later_reminders() {
        let sink = Arc::new(Recording {
            hang_on: Some("stuck"),
            ..Recording::default()
        });
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_delivery(sink.clone(), rx, stop_rx));

        tx.send(notification("stuck")).await.unwrap();
        tx.send(notification("standup")).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while sink.seen.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(sink.seen.lock().unwrap()[0].0, "standup");

        // Stop aborts the delivery that never finished.
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn stop_drops_queued_notifications() {
        let sink = Arc::new(Recording::default());
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send(true).unwrap();
        tx.send(notification("late")).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), run_delivery(sink.clone(), rx, stop_rx))
            .await
            .unwrap();
        assert!(sink.seen.lock().unwrap().is_empty());
    }
}
