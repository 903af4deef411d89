// Integration tests: HTTP and WebSocket endpoints

use axum_test::TestServer;
use diskfree::models::{CycleReport, LocalVolume, SizeSample, Trend, Volume, VolumeClass, VolumeReport};
use diskfree::preferences::{Preferences, PreferencesStore};
use diskfree::report_hub::{ReportHub, ReportSink};
use diskfree::routes;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

struct TestApp {
    hub: Arc<ReportHub>,
    preferences: Arc<PreferencesStore>,
    _dir: tempfile::TempDir,
}

fn test_app() -> (axum::Router, TestApp) {
    let dir = tempfile::TempDir::new().unwrap();
    let hub = Arc::new(ReportHub::new(8));
    let preferences = Arc::new(PreferencesStore::new(
        dir.path().join("Preferences.json"),
        Preferences::default(),
    ));
    let app = routes::app(
        hub.clone(),
        preferences.clone(),
        Arc::new(AtomicUsize::new(0)),
    );
    (
        app,
        TestApp {
            hub,
            preferences,
            _dir: dir,
        },
    )
}

/// Build TestServer with http_transport (required for WebSocket tests).
fn test_server_with_http() -> (TestServer, TestApp) {
    let (app, state) = test_app();
    let server = TestServer::builder().http_transport().build(app);
    (server, state)
}

fn local_report(timestamp: f64) -> CycleReport {
    let sample = SizeSample::new(300, 300, 1000, timestamp);
    CycleReport {
        class: VolumeClass::Local,
        timestamp,
        volumes: vec![VolumeReport {
            key: "Data".into(),
            volume: Volume::Local(LocalVolume {
                name: "Data".into(),
                mount_point: PathBuf::from("/"),
                user_visible_mount_point: PathBuf::from("/"),
                is_internal: true,
                is_ejectable: false,
                is_browsable: true,
            }),
            selected: false,
            latest: Some(sample),
            history: vec![sample],
            trend: Trend::Flat,
            change_bytes_per_sec: 0.0,
        }],
        span_seconds: 0.0,
    }
}

#[tokio::test]
async fn test_version_endpoint() {
    let (app, _state) = test_app();
    let server = TestServer::new(app);
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("diskfree"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_volumes_endpoint_returns_latest_reports() {
    let (app, state) = test_app();
    let server = TestServer::new(app);

    let empty: Vec<CycleReport> = server.get("/api/volumes").await.json();
    assert!(empty.is_empty());

    state.hub.publish(local_report(10.0));
    state.hub.publish(local_report(14.0));

    let reports: Vec<CycleReport> = server.get("/api/volumes").await.json();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].timestamp, 14.0);
    assert_eq!(reports[0].volumes[0].key, "Data");
}

#[tokio::test]
async fn test_volume_class_endpoint() {
    let (app, state) = test_app();
    let server = TestServer::new(app);

    server
        .get("/api/volumes/network")
        .await
        .assert_status_not_found();

    state.hub.publish(local_report(10.0));
    let response = server.get("/api/volumes/local").await;
    response.assert_status_ok();
    let report: CycleReport = response.json();
    assert_eq!(report.class, VolumeClass::Local);
}

#[tokio::test]
async fn test_preferences_endpoint() {
    let (app, _state) = test_app();
    let server = TestServer::new(app);
    let json: serde_json::Value = server.get("/api/preferences").await.json();
    assert_eq!(json["localPollIntervalSeconds"], 4);
    assert_eq!(json["lowSpaceErrorThresholdGigs"], 20);
}

#[tokio::test]
async fn test_selection_updates_and_persists_preferences() {
    let (app, state) = test_app();
    let server = TestServer::new(app);

    let response = server
        .post("/api/selection")
        .json(&serde_json::json!({ "class": "local", "key": "Data", "selected": true }))
        .await;
    response.assert_status_ok();
    let prefs: Preferences = response.json();
    assert!(prefs.is_selected(VolumeClass::Local, "Data"));
    assert!(state.preferences.current().is_selected(VolumeClass::Local, "Data"));

    let saved = PreferencesStore::load(state.preferences.path()).await.current();
    assert!(saved.is_selected(VolumeClass::Local, "Data"));

    server
        .post("/api/selection")
        .json(&serde_json::json!({ "class": "local", "key": "Data", "selected": false }))
        .await
        .assert_status_ok();
    assert!(!state.preferences.current().is_selected(VolumeClass::Local, "Data"));
}

#[tokio::test]
async fn test_selection_rejects_unknown_class() {
    let (app, _state) = test_app();
    let server = TestServer::new(app);
    let response = server
        .post("/api/selection")
        .json(&serde_json::json!({ "class": "floppy", "key": "A", "selected": true }))
        .await;
    assert!(response.status_code().is_client_error());
}

// --- WebSocket tests (require http_transport + ws feature) ---

async fn receive_message_of_type(
    ws: &mut axum_test::TestWebSocket,
    kind: &str,
) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    loop {
        let text = ws.receive_text().await;
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&text)
            && v["type"] == kind
        {
            return v;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} message",
            kind
        );
    }
}

#[tokio::test]
async fn test_ws_volumes_sends_snapshot_then_reports() {
    let (server, state) = test_server_with_http();
    state.hub.publish(local_report(10.0));

    let mut ws = server
        .get_websocket("/ws/volumes")
        .await
        .into_websocket()
        .await;
    let snapshot = receive_message_of_type(&mut ws, "snapshot").await;
    assert_eq!(snapshot["reports"][0]["timestamp"], 10.0);

    let hub = state.hub.clone();
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        hub.publish(local_report(42.0));
    });
    let msg = receive_message_of_type(&mut ws, "report").await;
    let report: CycleReport = serde_json::from_value(msg["report"].clone()).unwrap();
    assert_eq!(report.timestamp, 42.0);
    assert_eq!(report.volumes[0].latest.unwrap().free_bytes(), 300);
}
