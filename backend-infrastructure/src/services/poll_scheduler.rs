use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use backend_application::commands::ingest_for_device;
use backend_application::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub devices: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_busy: usize,
}

/// Periodically ingests every online device.
pub struct PollScheduler;

impl PollScheduler {
    pub fn start(state: AppState) -> PollSchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval = Duration::from_secs(state.config.poll_interval_seconds.max(1));
        let grace = Duration::from_secs(state.config.shutdown_grace_seconds);
        info!(
            interval_seconds = interval.as_secs(),
            max_concurrent = state.config.max_concurrent_polls,
            "poll scheduler started"
        );
        let task = tokio::spawn(run_loop(state, interval, shutdown_rx));
        PollSchedulerHandle {
            shutdown: shutdown_tx,
            task,
            grace,
        }
    }
}

pub struct PollSchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    grace: Duration,
}

impl PollSchedulerHandle {
    /// Stops scheduling new sweeps and waits up to the grace period for the
    /// current one. Runs still going after that are aborted and their
    /// transactions roll back.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        match tokio::time::timeout(self.grace, &mut self.task).await {
            Ok(Ok(())) => info!("poll scheduler stopped"),
            Ok(Err(err)) => warn!("poll scheduler task ended abnormally: {}", err),
            Err(_) => {
                warn!(
                    grace_seconds = self.grace.as_secs(),
                    "poll sweep still running after grace period, aborting"
                );
                self.task.abort();
            }
        }
    }
}

async fn run_loop(state: AppState, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        poll_once(&state, &shutdown).await;
    }
}

/// One sweep over the online devices. A failing device never stops the others.
pub async fn poll_once(state: &AppState, shutdown: &watch::Receiver<bool>) -> SweepReport {
    let devices = match state.device_registry.online_devices().await {
        Ok(devices) => devices,
        Err(err) => {
            warn!("poll sweep skipped, device list unavailable: {}", err);
            return SweepReport::default();
        }
    };
    state.metrics.record_sweep();

    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let skipped_busy = AtomicUsize::new(0);
    let limit = state.config.max_concurrent_polls.max(1);

    stream::iter(devices.iter())
        .for_each_concurrent(limit, |device| {
            let succeeded = &succeeded;
            let failed = &failed;
            let skipped_busy = &skipped_busy;
            async move {
                if *shutdown.borrow() {
                    return;
                }
                if state.device_locks.is_busy(device.id).await {
                    debug!(device_id = %device.id, "device already ingesting, skipped");
                    skipped_busy.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                match ingest_for_device(state, device.id).await {
                    Ok(_) => {
                        succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        debug!(device_id = %device.id, "poll left device for next sweep: {}", err);
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        })
        .await;

    let report = SweepReport {
        devices: devices.len(),
        succeeded: succeeded.into_inner(),
        failed: failed.into_inner(),
        skipped_busy: skipped_busy.into_inner(),
    };
    debug!(
        devices = report.devices,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped_busy = report.skipped_busy,
        "poll sweep finished"
    );
    report
}
