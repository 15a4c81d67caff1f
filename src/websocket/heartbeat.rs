use std::time::Duration;
use tokio::task::JoinHandle;

use super::session::SessionCommand;
use super::RoomRegistry;

/// Periodic liveness probe across all open sessions.
///
/// Each tick runs two strikes: a session that never answered the previous
/// tick's ping is terminated; every survivor has its alive flag cleared and
/// is pinged again. A silent session is therefore reaped no later than two
/// intervals after it stops responding, and never on a single missed probe.
pub struct LivenessMonitor;

impl LivenessMonitor {
    /// Spawn the recurring probe task. The returned handle cancels it.
    pub fn spawn(registry: RoomRegistry, interval: Duration) -> MonitorHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick fires immediately; skip it so freshly accepted
            // sessions get a full interval before their first probe
            ticker.tick().await;
            loop {
                ticker.tick().await;
                Self::probe(&registry).await;
            }
        });
        MonitorHandle { task }
    }

    /// One probe cycle. Public so tests can drive ticks synchronously
    /// instead of waiting on the timer.
    pub async fn probe(registry: &RoomRegistry) {
        for handle in registry.sessions().await {
            if !handle.is_alive() {
                tracing::info!(session_id = %handle.id, "terminating unresponsive session");
                handle.send(SessionCommand::Close);
                registry.remove_session(handle.id).await;
                continue;
            }

            handle.set_alive(false);
            if !handle.send(SessionCommand::Ping) {
                // channel gone: the socket task already exited
                registry.remove_session(handle.id).await;
            }
        }
    }
}

/// Cancellation handle for the monitor task. Dropping it without calling
/// `shutdown` leaves the task running for the life of the process.
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn shutdown(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
