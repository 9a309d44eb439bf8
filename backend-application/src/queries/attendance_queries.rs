use chrono::{FixedOffset, NaiveDate};
use tracing::error;

use crate::{AppError, AppState};
use backend_domain::{
    local_day_bounds, parse_date, today, AttendanceEvent, AttendanceFilter, AttendanceQuery, AttendanceStats,
    ClassId, DeviceId, EventType, PagedResult, SchoolId, StatsQuery, StudentId, StudentTimeline,
    StudentTimelineQuery, TimelineEntry,
};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

pub async fn list_attendance(
    state: &AppState,
    query: AttendanceQuery,
) -> Result<PagedResult<AttendanceEvent>, AppError> {
    let filter = build_filter(query, state.config.timezone)?;
    let page = state
        .attendance_repo
        .list_events(&filter)
        .await
        .map_err(|err| {
            error!("failed to list attendance: {}", err);
            AppError::Internal(err)
        })?;
    Ok(page)
}

pub async fn attendance_stats(state: &AppState, query: StatsQuery) -> Result<AttendanceStats, AppError> {
    let school_id = require_school(query.school_id)?;
    let date = resolve_date(query.date.as_deref(), state.config.timezone)?;
    let (from, to) = local_day_bounds(date, state.config.timezone);

    let counts = state
        .attendance_repo
        .day_counts(school_id, from, to)
        .await
        .map_err(|err| {
            error!("failed to count attendance: {}", err);
            AppError::Internal(err)
        })?;
    let active_students = state
        .student_directory
        .count_active_students(school_id)
        .await
        .map_err(AppError::Internal)?;

    Ok(AttendanceStats {
        date,
        total_events: counts.total_events,
        checked_in: counts.checked_in,
        checked_out: counts.checked_out,
        active_students,
        present_rate: present_rate(counts.students_checked_in, active_students),
    })
}

pub async fn student_timeline(
    state: &AppState,
    student_id: i64,
    query: StudentTimelineQuery,
) -> Result<StudentTimeline, AppError> {
    if student_id <= 0 {
        return Err(AppError::BadRequest("student_id must be positive".to_string()));
    }
    let student_id = StudentId(student_id);
    let timezone = state.config.timezone;
    let date = resolve_date(query.date.as_deref(), timezone)?;

    let student = state
        .student_directory
        .find_student(student_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("student {}", student_id)))?;

    let (from, to) = local_day_bounds(date, timezone);
    let events = state
        .attendance_repo
        .student_events(student_id, from, to)
        .await
        .map_err(|err| {
            error!("failed to load timeline for student {}: {}", student_id, err);
            AppError::Internal(err)
        })?;

    Ok(build_timeline(student_id, student.full_name, date, events, timezone))
}

pub fn build_filter(query: AttendanceQuery, timezone: FixedOffset) -> Result<AttendanceFilter, AppError> {
    let school_id = require_school(query.school_id)?;
    let date = resolve_date(query.date.as_deref(), timezone)?;
    let (from, to) = local_day_bounds(date, timezone);

    let event_type = match query.event_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let parsed = raw
                .parse::<EventType>()
                .map_err(AppError::BadRequest)?;
            if !parsed.is_persistable() {
                return Err(AppError::BadRequest(
                    "event_type must be IN, OUT or UNKNOWN".to_string(),
                ));
            }
            Some(parsed)
        }
    };

    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(AppError::BadRequest("page must be >= 1".to_string()));
    }
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    Ok(AttendanceFilter {
        school_id,
        from,
        to,
        student_id: positive_id(query.student_id, "student_id")?.map(StudentId),
        class_id: positive_id(query.class_id, "class_id")?.map(ClassId),
        device_id: positive_id(query.device_id, "device_id")?.map(DeviceId),
        event_type,
        page,
        page_size,
    })
}

/// Percentage of active students with at least one entry, two decimals.
pub fn present_rate(students_checked_in: u64, active_students: u64) -> f64 {
    if active_students == 0 {
        return 0.0;
    }
    let rate = students_checked_in as f64 / active_students as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// Sum of every IN -> OUT gap. An IN still open at the end of the day adds nothing.
pub fn in_school_seconds(events: &[AttendanceEvent]) -> i64 {
    let mut open = None;
    let mut total = 0;
    for event in events {
        match event.event_type {
            EventType::In => {
                if open.is_none() {
                    open = Some(event.occurred_at);
                }
            }
            EventType::Out => {
                if let Some(entered) = open.take() {
                    total += (event.occurred_at - entered).num_seconds();
                }
            }
            _ => {}
        }
    }
    total
}

pub fn build_timeline(
    student_id: StudentId,
    student_name: String,
    date: NaiveDate,
    mut events: Vec<AttendanceEvent>,
    timezone: FixedOffset,
) -> StudentTimeline {
    events.sort_by_key(|event| event.occurred_at);
    let total_duration_seconds = in_school_seconds(&events);
    let currently_in = events
        .iter()
        .rev()
        .find(|event| matches!(event.event_type, EventType::In | EventType::Out))
        .is_some_and(|event| event.event_type == EventType::In);
    let entries = events
        .into_iter()
        .map(|event| TimelineEntry {
            local_time: event
                .occurred_at
                .with_timezone(&timezone)
                .format("%H:%M:%S")
                .to_string(),
            event,
        })
        .collect();

    StudentTimeline {
        student_id,
        student_name,
        date,
        entries,
        total_duration_seconds,
        currently_in,
    }
}

fn require_school(school_id: Option<i64>) -> Result<SchoolId, AppError> {
    match school_id {
        Some(id) if id > 0 => Ok(SchoolId(id)),
        Some(_) => Err(AppError::BadRequest("school_id must be positive".to_string())),
        None => Err(AppError::BadRequest("school_id is required".to_string())),
    }
}

fn resolve_date(date: Option<&str>, timezone: FixedOffset) -> Result<NaiveDate, AppError> {
    match date.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => parse_date(raw).map_err(|err| AppError::BadRequest(format!("invalid date: {}", err))),
        None => Ok(today(timezone)),
    }
}

fn positive_id(value: Option<i64>, field: &str) -> Result<Option<i64>, AppError> {
    match value {
        Some(id) if id <= 0 => Err(AppError::BadRequest(format!("{} must be positive", field))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_domain::RecordId;
    use chrono::{DateTime, TimeZone, Utc};

    fn nairobi() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).expect("offset")
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        nairobi()
            .with_ymd_and_hms(2024, 3, 11, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn event(id: i64, event_type: EventType, occurred_at: DateTime<Utc>) -> AttendanceEvent {
        AttendanceEvent {
            id: RecordId(id),
            school_id: SchoolId(1),
            device_id: DeviceId(2),
            device_name: Some("Gate".to_string()),
            device_user_id: "5".to_string(),
            student_id: Some(StudentId(50)),
            student_name: Some("Amina Odhiambo".to_string()),
            admission_number: Some("ADM-050".to_string()),
            class_id: Some(ClassId(3)),
            class_name: Some("Form 2B".to_string()),
            event_type,
            occurred_at,
            created_at: occurred_at,
        }
    }

    #[test]
    fn filter_defaults_and_clamps() {
        let filter = build_filter(
            AttendanceQuery {
                school_id: Some(1),
                date: Some("2024-03-11".to_string()),
                page_size: Some(5000),
                ..AttendanceQuery::default()
            },
            nairobi(),
        )
        .expect("filter");
        assert_eq!(filter.page, 1);
        assert_eq!(filter.page_size, MAX_PAGE_SIZE);
        assert_eq!(filter.from, at(0, 0));
        assert!(filter.event_type.is_none());

        let filter = build_filter(
            AttendanceQuery {
                school_id: Some(1),
                ..AttendanceQuery::default()
            },
            nairobi(),
        )
        .expect("filter");
        assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn filter_rejects_malformed_input() {
        let bad = [
            AttendanceQuery::default(),
            AttendanceQuery {
                school_id: Some(1),
                date: Some("11-03-2024".to_string()),
                ..AttendanceQuery::default()
            },
            AttendanceQuery {
                school_id: Some(1),
                event_type: Some("DUPLICATE".to_string()),
                ..AttendanceQuery::default()
            },
            AttendanceQuery {
                school_id: Some(1),
                event_type: Some("sideways".to_string()),
                ..AttendanceQuery::default()
            },
            AttendanceQuery {
                school_id: Some(1),
                page: Some(0),
                ..AttendanceQuery::default()
            },
            AttendanceQuery {
                school_id: Some(1),
                student_id: Some(-4),
                ..AttendanceQuery::default()
            },
        ];
        for query in bad {
            match build_filter(query, nairobi()) {
                Err(AppError::BadRequest(_)) => {}
                other => panic!("expected bad request, got {:?}", other.map(|f| f.page)),
            }
        }
    }

    #[test]
    fn event_type_filter_is_case_insensitive() {
        let filter = build_filter(
            AttendanceQuery {
                school_id: Some(1),
                event_type: Some("out".to_string()),
                ..AttendanceQuery::default()
            },
            nairobi(),
        )
        .expect("filter");
        assert_eq!(filter.event_type, Some(EventType::Out));
    }

    #[test]
    fn present_rate_rounds_and_handles_empty_school() {
        assert_eq!(present_rate(0, 0), 0.0);
        assert_eq!(present_rate(1, 3), 33.33);
        assert_eq!(present_rate(40, 40), 100.0);
    }

    #[test]
    fn duration_sums_in_out_pairs_only() {
        let events = vec![
            event(1, EventType::In, at(7, 30)),
            event(2, EventType::Out, at(12, 0)),
            event(3, EventType::In, at(13, 0)),
            event(4, EventType::Out, at(16, 0)),
            event(5, EventType::In, at(17, 0)),
        ];
        assert_eq!(in_school_seconds(&events), (4 * 3600 + 30 * 60) + 3 * 3600);
    }

    #[test]
    fn timeline_orders_entries_and_reports_presence() {
        let events = vec![
            event(2, EventType::Out, at(16, 0)),
            event(1, EventType::In, at(7, 30)),
        ];
        let timeline = build_timeline(
            StudentId(50),
            "Amina Odhiambo".to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 11).expect("date"),
            events,
            nairobi(),
        );
        assert_eq!(timeline.entries[0].local_time, "07:30:00");
        assert_eq!(timeline.entries[1].local_time, "16:00:00");
        assert_eq!(timeline.total_duration_seconds, 8 * 3600 + 30 * 60);
        assert!(!timeline.currently_in);
    }
}
