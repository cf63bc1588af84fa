use super::types::ReviewVersion;

/// Newest first.
pub fn all_versions(mut chronological: Vec<ReviewVersion>) -> Vec<ReviewVersion> {
    chronological.sort_by_key(|v| std::cmp::Reverse(v.version_number));
    chronological
}

pub fn current_version_number(versions: &[ReviewVersion]) -> Option<usize> {
    match versions.len() {
        0 => None,
        n => Some(n),
    }
}

/// Version `n` counted from 1 in the order they were recorded.
pub fn get_version(chronological: &[ReviewVersion], n: i64) -> Option<&ReviewVersion> {
    if n < 1 {
        return None;
    }
    chronological.get(usize::try_from(n - 1).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn versions(count: i32) -> Vec<ReviewVersion> {
        (1..=count)
            .map(|n| ReviewVersion {
                id: n as i64,
                review_id: 1,
                version_number: n,
                review_data: json!({"data": n}),
                recorded_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_all_versions_newest_first() {
        let listed = all_versions(versions(3));
        let numbers: Vec<i32> = listed.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
        assert!(all_versions(Vec::new()).is_empty());
    }

    #[test]
    fn test_current_version_number() {
        assert_eq!(current_version_number(&[]), None);
        assert_eq!(current_version_number(&versions(2)), Some(2));
    }

    #[test]
    fn test_get_version_bounds() {
        let recorded = versions(3);
        assert_eq!(get_version(&recorded, 1).map(|v| v.version_number), Some(1));
        assert_eq!(get_version(&recorded, 3).map(|v| v.review_data.clone()), Some(json!({"data": 3})));
        assert!(get_version(&recorded, 0).is_none());
        assert!(get_version(&recorded, -1).is_none());
        assert!(get_version(&recorded, 4).is_none());
    }
}
