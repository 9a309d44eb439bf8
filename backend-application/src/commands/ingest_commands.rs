use std::time::Duration;

use anyhow::Context;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ingest::{collect_device_user_ids, history_window, plan_batch, punch_span};
use crate::{AppError, AppState};
use backend_domain::{
    resolve_batch, AttendanceEvent, CommittedBatch, Device, DeviceId, DeviceUnavailable, EntryExitPolicy,
    IngestSummary, RawPunch, StudentDayHistory, StudentId,
};

/// Pulls, classifies and stores the punches buffered on one device.
///
/// Safe to repeat: stored punches are recognised by their dedup key and
/// counted as `skipped_duplicate`. Runs for the same device are serialised.
pub async fn ingest_for_device(state: &AppState, device_id: DeviceId) -> Result<IngestSummary, AppError> {
    let _guard = state.device_locks.acquire(device_id).await;
    let run_id = Uuid::new_v4();
    debug!(%run_id, device_id = %device_id, "ingestion started");

    match run_ingest(state, device_id).await {
        Ok(summary) => {
            state.metrics.record_ingest(&summary);
            info!(
                %run_id,
                device_id = %device_id,
                inserted = summary.inserted,
                skipped_duplicate = summary.skipped_duplicate,
                unmatched = summary.unmatched,
                total = summary.total,
                "ingestion finished"
            );
            Ok(summary)
        }
        Err(err) => {
            state.metrics.record_ingest_failure();
            warn!(%run_id, device_id = %device_id, "ingestion failed: {}", err);
            Err(err)
        }
    }
}

async fn run_ingest(state: &AppState, device_id: DeviceId) -> Result<IngestSummary, AppError> {
    let device = state
        .device_registry
        .get_device(device_id)
        .await
        .map_err(|err| {
            error!("failed to load device {}: {}", device_id, err);
            AppError::Internal(err)
        })?
        .ok_or_else(|| AppError::NotFound(format!("device {}", device_id)))?;

    let punches = fetch_punches(state, &device).await?;
    let Some((first, last)) = punch_span(&punches) else {
        return Ok(IngestSummary::default());
    };

    let policy = EntryExitPolicy::from(&state.config);
    let device_user_ids = collect_device_user_ids(&punches);
    let matches = resolve_batch(state.student_directory.as_ref(), device.school_id, &device_user_ids)
        .await
        .context("student resolution failed")?;

    let existing = state
        .attendance_repo
        .existing_keys(device.id, first, last)
        .await
        .context("dedup lookup failed")?;

    let mut student_ids = matches.values().flatten().copied().collect::<Vec<StudentId>>();
    student_ids.sort_unstable();
    student_ids.dedup();
    let history = if student_ids.is_empty() {
        StudentDayHistory::default()
    } else {
        let (from, to) = history_window(first, last, policy.timezone);
        let prior = state
            .attendance_repo
            .student_history(&student_ids, from, to)
            .await
            .context("history lookup failed")?;
        StudentDayHistory::from_punches(prior)
    };

    let plan = plan_batch(&device, punches, &matches, &existing, history, &policy);
    let committed = if plan.staged.is_empty() {
        CommittedBatch::default()
    } else {
        state
            .attendance_repo
            .commit_batch(&plan.staged)
            .await
            .context("attendance batch rolled back")?
    };
    if committed.conflicts > 0 {
        info!(
            device_id = %device.id,
            conflicts = committed.conflicts,
            "concurrent writer already stored some punches"
        );
    }

    let summary = IngestSummary {
        inserted: committed.inserted.len(),
        skipped_duplicate: plan.skipped_duplicate + committed.conflicts,
        unmatched: committed
            .inserted
            .iter()
            .filter(|event| event.student_id.is_none())
            .count(),
        total: plan.total,
    };

    fan_out(state, &committed.inserted).await;
    Ok(summary)
}

async fn fetch_punches(state: &AppState, device: &Device) -> Result<Vec<RawPunch>, DeviceUnavailable> {
    let limit = Duration::from_secs(state.config.device_fetch_timeout_seconds.max(1));
    match timeout(limit, state.log_source.fetch_logs(device)).await {
        Ok(result) => result,
        Err(_) => Err(DeviceUnavailable::new(
            device.id,
            format!("fetch timed out after {}s", limit.as_secs()),
        )),
    }
}

/// Post-commit, best effort. Nothing here can fail the ingestion.
async fn fan_out(state: &AppState, events: &[AttendanceEvent]) {
    let mut deliveries = 0;
    for event in events {
        deliveries += state.stream_hub.publish(event).await;
    }
    if deliveries == 0 && !events.is_empty() {
        debug!("no live subscribers for {} new records", events.len());
    }
    state.metrics.record_published(deliveries);
}
