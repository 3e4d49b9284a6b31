//! Periodic keepalive task

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::handle::SessionInner;

/// Control handle for a running keepalive task
pub(crate) struct KeepaliveHandle {
    period: watch::Sender<Duration>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl KeepaliveHandle {
    /// Start sending keepalives every `period`, first one a full period from now
    pub(crate) fn spawn(session: Weak<SessionInner>, period: Duration) -> Self {
        let (period_tx, period_rx) = watch::channel(period);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_keepalive(session, period_rx, cancel.clone()));

        Self {
            period: period_tx,
            cancel,
            task,
        }
    }

    /// Change the period; the next keepalive is one new period from now
    pub(crate) fn set_period(&self, period: Duration) {
        self.period.send_replace(period);
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub(crate) fn stop(self) {
        self.cancel.cancel();
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_keepalive(
    session: Weak<SessionInner>,
    mut period_rx: watch::Receiver<Duration>,
    cancel: CancellationToken,
) {
    let mut ticks = ticker(*period_rx.borrow_and_update());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Keepalive stopped");
                break;
            }
            changed = period_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let period = *period_rx.borrow_and_update();
                debug!("Keepalive period set to {:?}", period);
                ticks = ticker(period);
            }
            _ = ticks.tick() => {
                let Some(session) = session.upgrade() else {
                    break;
                };
                if let Err(e) = session.keep_alive().await {
                    warn!("Keepalive failed, stopping: {}", e);
                    break;
                }
            }
        }
    }
}
