//! Two POST /orchestrator/run calls against the same closed candle must
//! produce exactly one run report: the second call is a no-op replay.
//! Skips if no test database is configured.

use std::sync::Arc;

use bytes::Bytes;
use fxt_daemon::{routes, state::AppState};
use fxt_schemas::Micros;
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn second_run_against_same_candle_is_a_noop_replay() -> anyhow::Result<()> {
    let url = match std::env::var(fxt_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = PgPoolOptions::new().max_connections(4).connect(&url).await?;
    fxt_db::migrate(&pool).await?;
    fxt_testkit::truncate_all(&pool).await?;
    fxt_testkit::seed_account(&pool, Uuid::nil(), Micros::new(10_000_000_000), 30).await?;
    fxt_testkit::seed_permissive_risk_limits(&pool, Uuid::nil()).await?;

    let app_state = Arc::new(AppState::new(pool, fxt_testkit::sample_config()));
    let router = routes::build_router(app_state);

    let ingest_resp = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/v1/candles/admin/ingest")
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(ingest_resp.status(), 200);

    let run1 = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/orchestrator/run")
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(run1.status(), 200);
    let body: Bytes = run1.into_body().collect().await?.to_bytes();
    let run1_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(run1_json["newly_processed"].as_bool().unwrap());
    let run_id_1 = run1_json["report"]["run_id"].clone();

    let run2 = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/orchestrator/run")
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(run2.status(), 200);
    let body: Bytes = run2.into_body().collect().await?.to_bytes();
    let run2_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(!run2_json["newly_processed"].as_bool().unwrap());
    assert_eq!(run2_json["report"]["run_id"], run_id_1);

    let runs_resp = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/orchestrator/runs")
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(runs_resp.status(), 200);
    let body: Bytes = runs_resp.into_body().collect().await?.to_bytes();
    let runs_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(runs_json.as_array().unwrap().len(), 1);

    Ok(())
}
