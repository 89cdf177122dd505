use std::fs;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mal_predictions_terminal::provider::{ProviderConfig, spawn_provider};
use mal_predictions_terminal::state::{
    AppState, Delta, HydratedRecord, ProviderCommand, RefreshStatus, Season, apply_delta,
};

fn scratch_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("mal_provider_{tag}_{}_{nanos}", std::process::id()))
}

fn closed_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local listener");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    drop(listener);
    base
}

fn start() -> (mpsc::Sender<ProviderCommand>, Receiver<Delta>) {
    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    spawn_provider(
        tx,
        cmd_rx,
        ProviderConfig {
            jikan_base: closed_base(),
            fetch_parallelism: Some(2),
        },
    );
    (cmd_tx, rx)
}

fn next_delta(rx: &Receiver<Delta>) -> Delta {
    rx.recv_timeout(Duration::from_secs(30))
        .expect("worker should answer")
}

#[test]
fn refresh_logs_then_finishes_with_its_generation() {
    let (cmd_tx, rx) = start();
    let mut state = AppState::new();
    state.api_base = closed_base();
    state.generation = 6;

    cmd_tx.send(state.begin_refresh()).expect("worker alive");

    match next_delta(&rx) {
        Delta::Log(line) => {
            assert!(line.starts_with("[INFO] Refresh #7"));
            assert!(line.contains("/season/2025/fall/predictions"));
        }
        other => panic!("expected a log line first, got {other:?}"),
    }

    let finished = next_delta(&rx);
    let Delta::RefreshFinished { generation, result } = &finished else {
        panic!("expected refresh result, got {finished:?}");
    };
    assert_eq!(*generation, 7);
    assert!(result.is_err());

    apply_delta(&mut state, finished);
    assert_eq!(state.status, RefreshStatus::Error);
    assert!(state.error_message.is_some());
}

#[test]
fn export_into_unwritable_dir_reports_failure() {
    let (cmd_tx, rx) = start();
    let blocker = scratch_path("blocker");
    fs::write(&blocker, "not a directory").expect("create blocking file");
    let dir = blocker.join("exports");

    cmd_tx
        .send(ProviderCommand::ExportCsv {
            dir: dir.clone(),
            year: "2025".to_string(),
            season: Season::Fall,
            rows: vec![HydratedRecord {
                mal_id: Some(1),
                ..HydratedRecord::default()
            }],
        })
        .expect("worker alive");

    let delta = next_delta(&rx);
    let _ = fs::remove_file(&blocker);
    match delta {
        Delta::ExportFailed { path, error } => {
            assert_eq!(
                PathBuf::from(path),
                dir.join("predictions_2025_fall.csv")
            );
            assert!(error.contains("create export dir"));
        }
        other => panic!("expected export failure, got {other:?}"),
    }
}

#[test]
fn export_success_reports_path_and_rows() {
    let (cmd_tx, rx) = start();
    let dir = scratch_path("ok");
    let mut state = AppState::new();
    state.export_dir = dir.clone();
    state.season = Season::Winter;
    state.records = vec![HydratedRecord::default(), HydratedRecord::default()];

    cmd_tx.send(state.export_command()).expect("worker alive");

    let delta = next_delta(&rx);
    let Delta::ExportFinished { path, rows } = &delta else {
        panic!("expected export success, got {delta:?}");
    };
    assert_eq!(*rows, 2);
    assert_eq!(PathBuf::from(path), dir.join("predictions_2025_winter.csv"));

    apply_delta(&mut state, delta.clone());
    assert!(state.last_export.is_some());
    let _ = fs::remove_dir_all(&dir);
}
