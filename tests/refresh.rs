use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;

use mal_predictions_terminal::hydrate::{hydrate_records, refresh_predictions};
use mal_predictions_terminal::predictions_fetch::{HttpStatusError, parse_predictions_json};
use mal_predictions_terminal::state::{
    AppState, Delta, PredictionRecord, ProviderCommand, RefreshStatus, Season, apply_delta,
};

const TWO_ROW_PAYLOAD: &str = r#"[
  {"mal_id":1,"title":"A","pred_score":8.6},
  {"mal_id":2,"title":"B","pred_score":7.1,"image_url":"http://x/b.png"}
]"#;

#[test]
fn only_rows_without_image_trigger_lookup() {
    for cover in [Some("http://covers/a.webp".to_string()), None] {
        let calls = Mutex::new(Vec::new());
        let rows = refresh_predictions(
            || parse_predictions_json(TWO_ROW_PAYLOAD),
            None,
            |mal_id| {
                calls.lock().expect("calls lock").push(mal_id);
                cover.clone()
            },
        )
        .expect("refresh should succeed");

        assert_eq!(calls.into_inner().expect("calls lock"), vec![1]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].image_url, cover);
        assert_eq!(rows[1].image_url.as_deref(), Some("http://x/b.png"));
    }
}

#[test]
fn fetch_error_skips_hydration() {
    let calls = AtomicUsize::new(0);
    let result = refresh_predictions(
        || Err(HttpStatusError { status: 503 }.into()),
        None,
        |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        },
    );
    let err = result.expect_err("refresh should fail");
    assert_eq!(
        err.downcast_ref::<HttpStatusError>(),
        Some(&HttpStatusError { status: 503 })
    );
    assert_eq!(err.to_string(), "HTTP 503");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn hydration_keeps_order_and_resolves_every_gap() {
    let records = (1..=40u64)
        .map(|id| PredictionRecord {
            mal_id: Some(id),
            title: Some(format!("t{id}")),
            image_url: None,
            ..PredictionRecord::default()
        })
        .collect::<Vec<_>>();
    let calls = AtomicUsize::new(0);
    let rows = hydrate_records(records, Some(4), |id| {
        calls.fetch_add(1, Ordering::SeqCst);
        (id % 2 == 0).then(|| format!("cover-{id}"))
    });

    assert_eq!(calls.load(Ordering::SeqCst), 40);
    let ids = rows.iter().filter_map(|r| r.mal_id).collect::<Vec<_>>();
    assert_eq!(ids, (1..=40).collect::<Vec<_>>());
    assert_eq!(rows[0].image_url, None);
    assert_eq!(rows[1].image_url.as_deref(), Some("cover-2"));
}

#[test]
fn structured_images_collapse_without_lookup() {
    let raw = r#"[
      {"mal_id":3,"image_url":{"images":{"jpg":{"image_url":"j.jpg"}}}},
      {"mal_id":4,"image_url":{"images":{}}},
      {"image_url":""}
    ]"#;
    let calls = AtomicUsize::new(0);
    let rows = refresh_predictions(
        || parse_predictions_json(raw),
        None,
        |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some("never".to_string())
        },
    )
    .expect("refresh should succeed");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(rows[0].image_url.as_deref(), Some("j.jpg"));
    assert_eq!(rows[1].image_url, None);
    assert_eq!(rows[2].image_url, None);
}

#[test]
fn empty_cover_from_lookup_becomes_none() {
    let raw = r#"[{"mal_id":9,"title":"x"}]"#;
    let rows = refresh_predictions(|| parse_predictions_json(raw), None, |_| Some(String::new()))
        .expect("refresh should succeed");
    assert_eq!(rows[0].image_url, None);
}

fn refresh_generation(state: &mut AppState) -> u64 {
    match state.begin_refresh() {
        ProviderCommand::Refresh { generation, .. } => generation,
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn refresh_command_carries_current_inputs() {
    let mut state = AppState::new();
    state.api_base = " http://predict.local:9000/ ".to_string();
    state.year = "2024".to_string();
    state.season = Season::Spring;
    match state.begin_refresh() {
        ProviderCommand::Refresh {
            generation,
            api_base,
            year,
            season,
        } => {
            assert_eq!(generation, 1);
            assert_eq!(api_base, "http://predict.local:9000/");
            assert_eq!(year, "2024");
            assert_eq!(season, Season::Spring);
        }
        other => panic!("unexpected command {other:?}"),
    }
    assert_eq!(state.status, RefreshStatus::Loading);
    assert_eq!(
        state.predictions_url(),
        "http://predict.local:9000/season/2024/spring/predictions"
    );
}

#[test]
fn failed_refresh_clears_rows_and_sets_error() {
    let mut state = AppState::new();
    let first = refresh_generation(&mut state);
    let rows = refresh_predictions(|| parse_predictions_json(TWO_ROW_PAYLOAD), None, |_| None)
        .expect("refresh should succeed");
    apply_delta(
        &mut state,
        Delta::RefreshFinished {
            generation: first,
            result: Ok(rows),
        },
    );
    assert_eq!(state.status, RefreshStatus::Idle);
    assert_eq!(state.records.len(), 2);
    assert!(state.last_refreshed.is_some());

    for status in [400u16, 404, 500, 503] {
        let generation = refresh_generation(&mut state);
        let err = refresh_predictions(
            || Err(HttpStatusError { status }.into()),
            None,
            |_| None,
        )
        .expect_err("refresh should fail");
        apply_delta(
            &mut state,
            Delta::RefreshFinished {
                generation,
                result: Err(format!("{err:#}")),
            },
        );
        assert_eq!(state.status, RefreshStatus::Error);
        assert!(state.records.is_empty());
        assert_eq!(state.error_message, Some(format!("HTTP {status}")));
    }

    // The next refresh clears the banner while loading.
    refresh_generation(&mut state);
    assert_eq!(state.error_message, None);
    assert_eq!(state.status, RefreshStatus::Loading);
}

#[test]
fn stale_generation_is_dropped() {
    let mut state = AppState::new();
    let first = refresh_generation(&mut state);
    let second = refresh_generation(&mut state);
    assert!(second > first);

    let fresh = refresh_predictions(|| parse_predictions_json(TWO_ROW_PAYLOAD), None, |_| None)
        .expect("refresh should succeed");
    apply_delta(
        &mut state,
        Delta::RefreshFinished {
            generation: second,
            result: Ok(fresh),
        },
    );
    apply_delta(
        &mut state,
        Delta::RefreshFinished {
            generation: first,
            result: Err(anyhow!("connection reset").to_string()),
        },
    );

    assert_eq!(state.status, RefreshStatus::Idle);
    assert_eq!(state.records.len(), 2);
    assert_eq!(state.error_message, None);
    assert!(state.logs.iter().any(|line| line.contains("stale")));
}
