// Pure batch planning: dedup, classification and staging for one device batch.
// Punches are processed strictly in ascending `occurred_at` order. The
// `history` passed in holds what storage already knows for the batch's days;
// punches accepted earlier in the same batch are threaded through it, so no
// storage lookups happen mid-loop.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, Utc};

use backend_domain::{
    local_date, local_day_bounds, DedupKey, Device, EntryExitPolicy, EventType, NewAttendanceRecord, RawPunch,
    StudentDayHistory, StudentId,
};

#[derive(Debug, Default)]
pub struct BatchPlan {
    pub staged: Vec<NewAttendanceRecord>,
    /// Already stored, repeated within the batch, or inside the duplicate window.
    pub skipped_duplicate: usize,
    pub total: usize,
}

impl BatchPlan {
    pub fn unmatched(&self) -> usize {
        self.staged.iter().filter(|record| record.is_unmatched()).count()
    }
}

/// Chronological with a stable tie-break so identical inputs always plan identically.
pub fn sort_punches(punches: &mut [RawPunch]) {
    punches.sort_by(|a, b| {
        a.occurred_at
            .cmp(&b.occurred_at)
            .then_with(|| a.device_user_id.cmp(&b.device_user_id))
    });
}

pub fn collect_device_user_ids(punches: &[RawPunch]) -> HashSet<String> {
    punches
        .iter()
        .map(|punch| punch.device_user_id.clone())
        .collect()
}

/// Earliest and latest punch instants.
pub fn punch_span(punches: &[RawPunch]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = punches.iter().map(|punch| punch.occurred_at).min()?;
    let last = punches.iter().map(|punch| punch.occurred_at).max()?;
    Some((first, last))
}

/// Whole local days covering the span, as `[from, to)` in UTC.
pub fn history_window(
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    timezone: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let (from, _) = local_day_bounds(local_date(first, timezone), timezone);
    let (_, to) = local_day_bounds(local_date(last, timezone), timezone);
    (from, to)
}

pub fn plan_batch(
    device: &Device,
    mut punches: Vec<RawPunch>,
    matches: &HashMap<String, Option<StudentId>>,
    existing: &HashSet<DedupKey>,
    mut history: StudentDayHistory,
    policy: &EntryExitPolicy,
) -> BatchPlan {
    let mut plan = BatchPlan {
        total: punches.len(),
        ..BatchPlan::default()
    };
    sort_punches(&mut punches);

    let mut seen = HashSet::with_capacity(punches.len());
    for punch in punches {
        let key = DedupKey::new(device.id, &punch.device_user_id, punch.occurred_at);
        if existing.contains(&key) || !seen.insert(key) {
            plan.skipped_duplicate += 1;
            continue;
        }

        let student_id = matches.get(&punch.device_user_id).copied().flatten();
        let event_type = policy.determine_from_previous(&mut history, student_id, punch.occurred_at);
        if event_type == EventType::Duplicate {
            plan.skipped_duplicate += 1;
            continue;
        }

        plan.staged.push(NewAttendanceRecord {
            school_id: device.school_id,
            device_id: device.id,
            device_user_id: punch.device_user_id,
            student_id,
            event_type,
            occurred_at: punch.occurred_at,
            raw_payload: punch.raw_payload,
        });
    }
    plan
}
