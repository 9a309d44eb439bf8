// Student matching: terminal user ids -> student ids, one lookup per batch

use std::collections::{HashMap, HashSet};

use crate::ports::StudentDirectory;
use crate::value_objects::{SchoolId, StudentId};

/// Terminals store user ids as decimal strings; anything else can never match.
pub fn parse_device_user_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<i64>().ok()
}

/// Every input id appears in the result, mapped to `None` when unmatched or malformed.
pub async fn resolve_batch(
    directory: &dyn StudentDirectory,
    school_id: SchoolId,
    device_user_ids: &HashSet<String>,
) -> anyhow::Result<HashMap<String, Option<StudentId>>> {
    let parsed = device_user_ids
        .iter()
        .map(|raw| (raw.clone(), parse_device_user_id(raw)))
        .collect::<Vec<_>>();

    let mut numeric = parsed.iter().filter_map(|(_, id)| *id).collect::<Vec<_>>();
    numeric.sort_unstable();
    numeric.dedup();

    let found = if numeric.is_empty() {
        HashMap::new()
    } else {
        directory.find_by_device_user_ids(school_id, &numeric).await?
    };

    Ok(parsed
        .into_iter()
        .map(|(raw, id)| {
            let student = id.and_then(|id| found.get(&id).copied());
            (raw, student)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::entities::StudentSummary;

    #[derive(Default)]
    struct FakeDirectory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StudentDirectory for FakeDirectory {
        async fn find_by_device_user_ids(
            &self,
            school_id: SchoolId,
            device_user_ids: &[i64],
        ) -> anyhow::Result<HashMap<i64, StudentId>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(device_user_ids
                .iter()
                .filter(|id| school_id == SchoolId(1) && **id < 100)
                .map(|id| (*id, StudentId(*id * 10)))
                .collect())
        }

        async fn count_active_students(&self, _school_id: SchoolId) -> anyhow::Result<u64> {
            Ok(0)
        }

        async fn find_student(&self, _student_id: StudentId) -> anyhow::Result<Option<StudentSummary>> {
            Ok(None)
        }
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parse_rejects_non_numeric() {
        assert_eq!(parse_device_user_id("42"), Some(42));
        assert_eq!(parse_device_user_id(" 0042 "), Some(42));
        assert_eq!(parse_device_user_id("A12"), None);
        assert_eq!(parse_device_user_id("-3"), None);
        assert_eq!(parse_device_user_id(""), None);
        assert_eq!(parse_device_user_id("99999999999999999999999"), None);
    }

    #[tokio::test]
    async fn every_identifier_is_a_key() {
        let directory = FakeDirectory::default();
        let result = resolve_batch(&directory, SchoolId(1), &ids(&["5", "9999", "abc"]))
            .await
            .expect("resolve");
        assert_eq!(result.len(), 3);
        assert_eq!(result["5"], Some(StudentId(50)));
        assert_eq!(result["9999"], None);
        assert_eq!(result["abc"], None);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scoped_to_school() {
        let directory = FakeDirectory::default();
        let result = resolve_batch(&directory, SchoolId(2), &ids(&["5"])).await.expect("resolve");
        assert_eq!(result["5"], None);
    }

    #[tokio::test]
    async fn skips_lookup_when_nothing_is_numeric() {
        let directory = FakeDirectory::default();
        let result = resolve_batch(&directory, SchoolId(1), &ids(&["x", "y"])).await.expect("resolve");
        assert!(result.values().all(Option::is_none));
        assert_eq!(directory.calls.load(Ordering::SeqCst), 0);
    }
}
