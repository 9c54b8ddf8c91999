use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{connection::Outbound, registry::ConnectionRegistry};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub pinged: usize,
    pub evicted: usize,
}

/// Pings every connection once per interval and evicts those that did not
/// answer the previous ping.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    registry: ConnectionRegistry,
    interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(registry: ConnectionRegistry, interval: Duration) -> Self {
        Self { registry, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for connection in self.registry.snapshot() {
            let session_id = connection.session_id();
            if !connection.begin_ping() {
                debug!(session_id, "no pong since last ping; evicting");
                self.registry.remove(session_id);
                report.evicted += 1;
                continue;
            }

            match connection.deliver(Outbound::Ping) {
                Ok(()) => report.pinged += 1,
                Err(err) => {
                    debug!(session_id, error = %err, "ping not deliverable; evicting");
                    self.registry.remove(session_id);
                    report.evicted += 1;
                }
            }
        }

        report
    }

    /// Sweep on a fixed interval until `shutdown` fires. The first sweep
    /// happens one full interval after spawning.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = self.sweep();
                        if report.evicted > 0 {
                            info!(
                                evicted = report.evicted,
                                pinged = report.pinged,
                                "heartbeat evicted unresponsive clients"
                            );
                        }
                    }
                }
            }
            debug!("heartbeat monitor stopped");
        })
    }
}
