//! End-to-end tests for the dashboard service over a real directory tree

use metroboard_core::error::CoreError;
use metroboard_core::export::comparison_to_csv;
use metroboard_core::{Dashboard, Month};
use std::sync::Arc;
use tempfile::tempdir;

const HEADER: &str = "Start,End,User Id,Signup Local Date,Start Date Local,Duration,Rating";

fn month(s: &str) -> Month {
    s.parse().unwrap()
}

fn payload(rows: &[&str]) -> Vec<u8> {
    let mut body = String::from(HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    body.push('\n');
    body.into_bytes()
}

#[tokio::test]
async fn test_full_month_lifecycle() {
    let dir = tempdir().unwrap();
    let dashboard = Dashboard::with_root(dir.path());

    // "Heliopolis" is one of the seeded default stations.
    let m = month("2025-06");
    let rows = dashboard
        .upload_month(
            m,
            &payload(&[
                "هليوبوليس gate 1,downtown,u1,2025-06-02,2025-06-05 08:10:00,12.5,5",
                "هليوبوليس gate 2,هليوبوليس gate 1,u1,2025-06-02,2025-06-06 18:00:00,9,4",
                "downtown,هليوبوليس gate 1,u2,2024-01-15,2025-06-07 10:00:00,20,3",
            ]),
        )
        .await
        .unwrap();
    assert_eq!(rows, 3);
    assert_eq!(dashboard.uploaded_months(), vec![m]);

    let report = dashboard.get_metrics("Heliopolis", m, false).await.unwrap();
    let snap = report.current.unwrap();
    assert_eq!(snap.starts, 2);
    assert_eq!(snap.ends, 2);
    assert_eq!(snap.round_trips, 1);
    assert_eq!(snap.unique_riders, 1);
    assert_eq!(snap.new_signups, 1);
    assert_eq!(snap.new_signup_pct, 100.0);
    assert_eq!(snap.avg_duration, Some((12.5 + 9.0) / 2.0));
    assert_eq!(snap.avg_rating, Some(4.5));
    assert_eq!(snap.positive_rating_pct, Some(100.0));

    let series = dashboard.trend("Heliopolis").await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series.points[0].starts, 2);

    dashboard.delete_month(m).await.unwrap();
    assert!(dashboard.uploaded_months().is_empty());
    assert!(dashboard
        .get_metrics("Heliopolis", m, false)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_rejected_upload_preserves_previous_dataset() {
    let dir = tempdir().unwrap();
    let dashboard = Dashboard::with_root(dir.path());
    dashboard.add_station("Stop", "kw").await.unwrap();

    let m = month("2025-06");
    dashboard
        .upload_month(m, &payload(&["kw a,other,u1,,,5,4"]))
        .await
        .unwrap();

    // Missing every required column.
    let err = dashboard
        .upload_month(m, b"Wrong,Header\n1,2\n")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DatasetInvalid { .. }));

    // The original upload still answers queries.
    let report = dashboard.get_metrics("Stop", m, false).await.unwrap();
    assert_eq!(report.current.unwrap().starts, 1);
}

#[tokio::test]
async fn test_stations_and_data_survive_service_restart() {
    let dir = tempdir().unwrap();
    let m = month("2025-06");

    {
        let dashboard = Dashboard::with_root(dir.path());
        dashboard.add_station("Persisted", "pkw").await.unwrap();
        dashboard
            .upload_month(m, &payload(&["pkw a,other,u1,,,5,4"]))
            .await
            .unwrap();
    }

    let reopened = Dashboard::with_root(dir.path());
    let names: Vec<String> = reopened.stations().into_iter().map(|s| s.name).collect();
    assert!(names.contains(&"Persisted".to_string()));

    let report = reopened.get_metrics("Persisted", m, false).await.unwrap();
    assert_eq!(report.current.unwrap().starts, 1);
}

#[tokio::test]
async fn test_default_registry_is_seeded() {
    let dir = tempdir().unwrap();
    let dashboard = Dashboard::with_root(dir.path());

    let stations = dashboard.stations();
    assert_eq!(stations.len(), 6);
    assert!(stations.iter().any(|s| s.name == "Heliopolis"));
}

#[tokio::test]
async fn test_concurrent_reads_share_one_dataset_parse() {
    let dir = tempdir().unwrap();
    let dashboard = Arc::new(Dashboard::with_root(dir.path()));
    dashboard.add_station("A-Stop", "alpha").await.unwrap();
    dashboard.add_station("B-Stop", "beta").await.unwrap();

    let m = month("2025-06");
    dashboard
        .upload_month(
            m,
            &payload(&["alpha x,other,u1,,,5,4", "beta y,other,u2,,,7,3"]),
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for station in ["A-Stop", "B-Stop"] {
        for _ in 0..8 {
            let dash = Arc::clone(&dashboard);
            handles.push(tokio::spawn(async move {
                dash.get_metrics(station, m, false).await
            }));
        }
    }

    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.current.unwrap().starts, 1);
    }
}

#[tokio::test]
async fn test_overlapping_keywords_count_independently() {
    let dir = tempdir().unwrap();
    let dashboard = Dashboard::with_root(dir.path());
    dashboard.add_station("Short", "mall").await.unwrap();
    dashboard.add_station("Long", "city mall").await.unwrap();

    let m = month("2025-06");
    dashboard
        .upload_month(
            m,
            &payload(&["city mall north,other,u1,,,5,4", "old mall,other,u2,,,6,3"]),
        )
        .await
        .unwrap();

    let short = dashboard.get_metrics("Short", m, false).await.unwrap();
    let long = dashboard.get_metrics("Long", m, false).await.unwrap();
    assert_eq!(short.current.unwrap().starts, 2);
    assert_eq!(long.current.unwrap().starts, 1);
}

#[tokio::test]
async fn test_comparison_export_round_trip() {
    let dir = tempdir().unwrap();
    let dashboard = Dashboard::with_root(dir.path());
    dashboard.add_station("Stop", "kw").await.unwrap();

    let m = month("2025-06");
    dashboard
        .upload_month(m, &payload(&["kw a,other,u1,,,10,4", "kw b,other,u2,,,20,5"]))
        .await
        .unwrap();

    let table = dashboard.comparison_table(m).await.unwrap();
    let csv = comparison_to_csv(&table).unwrap();

    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Station,Total Starts,Total Riders,Avg Duration,Avg Rating,Heavy Users"
    );
    assert_eq!(lines.next().unwrap(), "Stop,2,2,15.0,4.50,0");
}

#[tokio::test]
async fn test_events_fire_for_each_mutation() {
    let dir = tempdir().unwrap();
    let dashboard = Dashboard::with_root(dir.path());
    let mut rx = dashboard.event_bus().subscribe();

    let m = month("2025-06");
    dashboard.add_station("Evented", "ev").await.unwrap();
    dashboard
        .upload_month(m, &payload(&["ev a,other,u1,,,5,4"]))
        .await
        .unwrap();
    dashboard.delete_month(m).await.unwrap();

    use metroboard_core::DataEvent;
    assert!(matches!(rx.recv().await.unwrap(), DataEvent::StationAdded(n) if n == "Evented"));
    assert!(matches!(rx.recv().await.unwrap(), DataEvent::DatasetUploaded(got) if got == m));
    assert!(matches!(rx.recv().await.unwrap(), DataEvent::DatasetDeleted(got) if got == m));
}
