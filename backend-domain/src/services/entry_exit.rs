// Entry/exit determination.
// Classification only ever looks backwards: the previous accepted punch of the
// same student on the same local calendar day decides whether a new punch is an
// entry, an exit or an accidental re-tap. Nothing already accepted is revised.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::entities::{PriorPunch, RuntimeConfig, StudentPunch};
use crate::utils::{default_timezone, local_date};
use crate::value_objects::{EventType, StudentId};

const DEFAULT_DUPLICATE_WINDOW_MINUTES: i64 = 30;

/// Stateless classification rules.
///
/// Rules, in order: no student is `Unknown`; no previous punch today is `In`;
/// a punch inside the duplicate window of the previous one is `Duplicate`;
/// otherwise the previous direction flips.
pub fn determine(
    student_id: Option<StudentId>,
    occurred_at: DateTime<Utc>,
    previous: Option<&PriorPunch>,
    duplicate_window: Duration,
    timezone: FixedOffset,
) -> EventType {
    if student_id.is_none() {
        return EventType::Unknown;
    }
    let day = local_date(occurred_at, timezone);
    let Some(prev) = previous.filter(|prev| local_date(prev.occurred_at, timezone) == day) else {
        return EventType::In;
    };
    if occurred_at - prev.occurred_at < duplicate_window {
        return EventType::Duplicate;
    }
    match prev.event_type {
        EventType::In => EventType::Out,
        _ => EventType::In,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryExitPolicy {
    pub duplicate_window: Duration,
    pub timezone: FixedOffset,
}

impl Default for EntryExitPolicy {
    fn default() -> Self {
        Self {
            duplicate_window: Duration::minutes(DEFAULT_DUPLICATE_WINDOW_MINUTES),
            timezone: default_timezone(),
        }
    }
}

impl From<&RuntimeConfig> for EntryExitPolicy {
    fn from(config: &RuntimeConfig) -> Self {
        let duplicate_window = i64::try_from(config.duplicate_window_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .unwrap_or_else(|| Duration::minutes(DEFAULT_DUPLICATE_WINDOW_MINUTES));
        Self {
            duplicate_window,
            timezone: config.timezone,
        }
    }
}

impl EntryExitPolicy {
    pub fn new(duplicate_window: Duration, timezone: FixedOffset) -> Self {
        Self {
            duplicate_window,
            timezone,
        }
    }

    pub fn determine(
        &self,
        student_id: Option<StudentId>,
        occurred_at: DateTime<Utc>,
        previous: Option<&PriorPunch>,
    ) -> EventType {
        determine(student_id, occurred_at, previous, self.duplicate_window, self.timezone)
    }

    /// Batch variant: classify against `history` and, when the punch is kept as
    /// an entry or exit, record it so the next punch of that student sees it.
    ///
    /// Must be called in ascending `occurred_at` order per student.
    pub fn determine_from_previous(
        &self,
        history: &mut StudentDayHistory,
        student_id: Option<StudentId>,
        occurred_at: DateTime<Utc>,
    ) -> EventType {
        let Some(student) = student_id else {
            return EventType::Unknown;
        };
        let event_type = self.determine(Some(student), occurred_at, history.previous_for(student, occurred_at));
        if matches!(event_type, EventType::In | EventType::Out) {
            history.accept(
                student,
                PriorPunch {
                    occurred_at,
                    event_type,
                },
            );
        }
        event_type
    }
}

/// Accepted punches per student, seeded from storage and extended as a batch
/// is classified. Each list stays sorted by `occurred_at`.
#[derive(Debug, Default, Clone)]
pub struct StudentDayHistory {
    punches: HashMap<StudentId, Vec<PriorPunch>>,
}

impl StudentDayHistory {
    pub fn from_punches(punches: impl IntoIterator<Item = StudentPunch>) -> Self {
        let mut history = Self::default();
        for StudentPunch { student_id, punch } in punches {
            history.accept(student_id, punch);
        }
        history
    }

    /// Latest accepted punch at or before `at`.
    // A late punch from another gate is judged against what came before it, not against later taps.
    pub fn previous_for(&self, student_id: StudentId, at: DateTime<Utc>) -> Option<&PriorPunch> {
        let list = self.punches.get(&student_id)?;
        let idx = list.partition_point(|punch| punch.occurred_at <= at);
        idx.checked_sub(1).and_then(|i| list.get(i))
    }

    pub fn accept(&mut self, student_id: StudentId, punch: PriorPunch) {
        let list = self.punches.entry(student_id).or_default();
        let idx = list.partition_point(|existing| existing.occurred_at <= punch.occurred_at);
        list.insert(idx, punch);
    }

    pub fn len(&self, student_id: StudentId) -> usize {
        self.punches.get(&student_id).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const STUDENT: StudentId = StudentId(7);

    fn policy() -> EntryExitPolicy {
        EntryExitPolicy::new(Duration::minutes(30), FixedOffset::east_opt(3 * 3600).expect("offset"))
    }

    // Local wall clock at +03:00.
    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        FixedOffset::east_opt(3 * 3600)
            .expect("offset")
            .with_ymd_and_hms(2024, 3, day, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn prior(occurred_at: DateTime<Utc>, event_type: EventType) -> PriorPunch {
        PriorPunch {
            occurred_at,
            event_type,
        }
    }

    #[test]
    fn unresolved_student_is_unknown() {
        let prev = prior(at(11, 7, 0), EventType::In);
        assert_eq!(policy().determine(None, at(11, 9, 0), Some(&prev)), EventType::Unknown);
    }

    #[test]
    fn first_tap_of_the_day_is_in() {
        assert_eq!(policy().determine(Some(STUDENT), at(11, 7, 30), None), EventType::In);
    }

    #[test]
    fn retap_inside_window_is_duplicate() {
        let prev = prior(at(11, 7, 30), EventType::In);
        assert_eq!(policy().determine(Some(STUDENT), at(11, 7, 45), Some(&prev)), EventType::Duplicate);
    }

    #[test]
    fn tap_exactly_at_window_edge_flips_direction() {
        let prev = prior(at(11, 7, 30), EventType::In);
        assert_eq!(policy().determine(Some(STUDENT), at(11, 8, 0), Some(&prev)), EventType::Out);
    }

    #[test]
    fn direction_alternates_after_window() {
        let prev_in = prior(at(11, 7, 30), EventType::In);
        let prev_out = prior(at(11, 12, 0), EventType::Out);
        assert_eq!(policy().determine(Some(STUDENT), at(11, 16, 0), Some(&prev_in)), EventType::Out);
        assert_eq!(policy().determine(Some(STUDENT), at(11, 13, 0), Some(&prev_out)), EventType::In);
    }

    #[test]
    fn previous_from_another_local_day_is_ignored() {
        let prev = prior(at(10, 23, 59), EventType::In);
        assert_eq!(policy().determine(Some(STUDENT), at(11, 0, 1), Some(&prev)), EventType::In);
    }

    #[test]
    fn day_boundary_uses_local_midnight_not_utc() {
        // 20:30 and 21:30 UTC are the same UTC day but straddle local midnight at +03:00.
        let before = Utc.with_ymd_and_hms(2024, 3, 10, 20, 30, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 10, 21, 30, 0).unwrap();
        let prev = prior(before, EventType::In);
        assert_eq!(policy().determine(Some(STUDENT), after, Some(&prev)), EventType::In);

        let utc_policy = EntryExitPolicy::new(Duration::minutes(30), FixedOffset::east_opt(0).expect("utc"));
        assert_eq!(utc_policy.determine(Some(STUDENT), after, Some(&prev)), EventType::Out);
    }

    #[test]
    fn batch_variant_threads_previous_forward() {
        let policy = policy();
        let mut history = StudentDayHistory::default();
        let taps = [at(11, 7, 30), at(11, 7, 45), at(11, 16, 0), at(11, 16, 10), at(11, 17, 0)];
        let kinds = taps
            .iter()
            .map(|tap| policy.determine_from_previous(&mut history, Some(STUDENT), *tap))
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                EventType::In,
                EventType::Duplicate,
                EventType::Out,
                EventType::Duplicate,
                EventType::In,
            ]
        );
        assert_eq!(history.len(STUDENT), 3);
    }

    #[test]
    fn batch_variant_is_deterministic() {
        let policy = policy();
        let taps = [at(11, 6, 0), at(11, 6, 20), at(11, 9, 0), at(11, 9, 5), at(11, 15, 0)];
        let run = || {
            let mut history = StudentDayHistory::default();
            taps.iter()
                .map(|tap| policy.determine_from_previous(&mut history, Some(STUDENT), *tap))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn history_picks_latest_at_or_before() {
        let mut history = StudentDayHistory::from_punches([
            StudentPunch {
                student_id: STUDENT,
                punch: prior(at(11, 16, 0), EventType::Out),
            },
            StudentPunch {
                student_id: STUDENT,
                punch: prior(at(11, 7, 0), EventType::In),
            },
        ]);
        let prev = history.previous_for(STUDENT, at(11, 12, 0)).expect("previous");
        assert_eq!(prev.event_type, EventType::In);
        assert!(history.previous_for(STUDENT, at(11, 6, 0)).is_none());
        assert!(history.previous_for(StudentId(99), at(11, 12, 0)).is_none());

        history.accept(STUDENT, prior(at(11, 12, 30), EventType::Out));
        let prev = history.previous_for(STUDENT, at(11, 13, 0)).expect("previous");
        assert_eq!(prev.occurred_at, at(11, 12, 30));
    }

    #[test]
    fn unknown_punch_does_not_enter_history() {
        let policy = policy();
        let mut history = StudentDayHistory::default();
        assert_eq!(policy.determine_from_previous(&mut history, None, at(11, 7, 0)), EventType::Unknown);
        assert_eq!(policy.determine_from_previous(&mut history, Some(STUDENT), at(11, 7, 5)), EventType::In);
    }

    #[test]
    fn policy_reads_runtime_config() {
        let config = RuntimeConfig {
            duplicate_window_minutes: 5,
            ..RuntimeConfig::default()
        };
        let policy = EntryExitPolicy::from(&config);
        assert_eq!(policy.duplicate_window, Duration::minutes(5));
        assert_eq!(policy.timezone.local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn out_of_range_window_falls_back_to_default() {
        let config = RuntimeConfig {
            duplicate_window_minutes: 200_000_000_000_000,
            ..RuntimeConfig::default()
        };
        let policy = EntryExitPolicy::from(&config);
        assert_eq!(policy.duplicate_window, Duration::minutes(30));

        let config = RuntimeConfig {
            duplicate_window_minutes: u64::MAX,
            ..RuntimeConfig::default()
        };
        assert_eq!(EntryExitPolicy::from(&config).duplicate_window, Duration::minutes(30));
    }
}
