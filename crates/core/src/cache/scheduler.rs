use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::ActivityCaches;

/// Drains expired cache entries on a fixed tick until the returned handle is aborted.
pub fn spawn_expiry_sweeper(caches: Arc<ActivityCaches>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = caches.sweep();
            if report.total() > 0 {
                debug!(
                    event_name = "engine.cache.sweep",
                    messages = report.messages,
                    threads = report.threads,
                    reaction_cooldowns = report.reaction_cooldowns,
                    event_debounce = report.event_debounce,
                    "expired activity entries removed"
                );
            }
        }
    })
}
