//! Station matching over free-text ride labels
//!
//! Pure functions: case-insensitive substring containment against start/end
//! labels. Missing labels never match. Deterministic over (dataset, keyword),
//! so results are safe to memoize.

use crate::models::MonthlyDataset;

/// Row subsets for one station keyword over one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationMatch {
    /// Indices of rows that started at the station.
    pub starts: Vec<usize>,
    /// Indices of rows that ended at the station.
    pub ends: Vec<usize>,
    /// Rows matching the start and end predicates simultaneously, evaluated
    /// as one combined predicate over the full dataset rather than a set
    /// intersection of the two subsets.
    pub round_trips: usize,
}

fn label_matches(label: Option<&str>, needle: &str) -> bool {
    label
        .map(|l| l.to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Partition a dataset's rows into started-here / ended-here subsets.
pub fn match_station(dataset: &MonthlyDataset, keyword: &str) -> StationMatch {
    let needle = keyword.to_lowercase();
    let mut matched = StationMatch::default();

    for (i, row) in dataset.rows.iter().enumerate() {
        let starts_here = label_matches(row.start.as_deref(), &needle);
        let ends_here = label_matches(row.end.as_deref(), &needle);

        if starts_here {
            matched.starts.push(i);
        }
        if ends_here {
            matched.ends.push(i);
        }
        if starts_here && ends_here {
            matched.round_trips += 1;
        }
    }

    matched
}

/// Count of rides starting at the station: the cheap partial computation
/// used by the trend builder instead of a full aggregate.
pub fn start_count(dataset: &MonthlyDataset, keyword: &str) -> usize {
    let needle = keyword.to_lowercase();
    dataset
        .rows
        .iter()
        .filter(|row| label_matches(row.start.as_deref(), &needle))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fingerprint, Month, RideEvent};

    fn dataset(rows: Vec<RideEvent>) -> MonthlyDataset {
        MonthlyDataset {
            month: "2025-06".parse::<Month>().unwrap(),
            columns: Vec::new(),
            rows,
            fingerprint: Fingerprint::default(),
        }
    }

    fn ride(start: Option<&str>, end: Option<&str>) -> RideEvent {
        RideEvent {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            user_id: "u".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_case_insensitive_substring_match() {
        let ds = dataset(vec![
            ride(Some("HELIOPOLIS Main Gate"), Some("Alf Maskan")),
            ride(Some("heliopolis west"), None),
            ride(Some("Haroun"), Some("Heliopolis")),
        ]);

        let m = match_station(&ds, "Heliopolis");
        assert_eq!(m.starts, vec![0, 1]);
        assert_eq!(m.ends, vec![2]);
        assert_eq!(m.round_trips, 0);
    }

    #[test]
    fn test_missing_labels_never_match() {
        let ds = dataset(vec![ride(None, None), ride(Some("X"), None)]);
        let m = match_station(&ds, "x");
        assert_eq!(m.starts, vec![1]);
        assert!(m.ends.is_empty());
    }

    #[test]
    fn test_round_trip_is_combined_predicate() {
        let ds = dataset(vec![
            ride(Some("Haroun North"), Some("Haroun South")),
            ride(Some("Haroun"), Some("Elsewhere")),
            ride(Some("Elsewhere"), Some("Haroun")),
        ]);

        let m = match_station(&ds, "haroun");
        assert_eq!(m.starts.len(), 2);
        assert_eq!(m.ends.len(), 2);
        assert_eq!(m.round_trips, 1);
        assert!(m.round_trips <= m.starts.len().min(m.ends.len()));
    }

    #[test]
    fn test_overlapping_keywords_counted_independently() {
        let ds = dataset(vec![ride(Some("Alf Maskan Gate"), None)]);

        // "Maskan" is a substring of "Alf Maskan"; the ride belongs to both.
        assert_eq!(match_station(&ds, "Alf Maskan").starts.len(), 1);
        assert_eq!(match_station(&ds, "Maskan").starts.len(), 1);
    }

    #[test]
    fn test_start_count_matches_full_match() {
        let ds = dataset(vec![
            ride(Some("A"), Some("B")),
            ride(Some("ab"), None),
            ride(None, Some("a")),
        ]);
        assert_eq!(start_count(&ds, "a"), 2);
        assert_eq!(start_count(&ds, "a"), match_station(&ds, "a").starts.len());
    }
}
