//! Relays coordinator notifications to the log.

use questline_progress::ProgressCoordinator;
use questline_progress::domain::events::ProgressNotification;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Subscribes to the coordinator's notifications and logs each one until
/// the channel closes.
pub fn spawn_notification_logger(coordinator: &ProgressCoordinator) -> JoinHandle<()> {
    let mut rx = coordinator.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(notification) => log_notification(&notification),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_notification(notification: &ProgressNotification) {
    let summary = notification.summary();
    tracing::info!(
        event_type = notification.event_type(),
        actor_id = %summary.actor_id,
        quest_id = %summary.quest_id,
        quest = summary.quest_name.as_str(),
        progress = summary.progress,
        required = summary.required_amount,
        "Progress notification"
    );
}
