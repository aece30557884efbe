//! Ingest through the HTTP surface, then read the candle back via the
//! latest/integrity endpoints. Skips if no test database is configured.

use std::sync::Arc;

use bytes::Bytes;
use fxt_daemon::{routes, state::AppState};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

#[tokio::test]
async fn ingest_then_latest_then_integrity() -> anyhow::Result<()> {
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
    let body: Bytes = ingest_resp.into_body().collect().await?.to_bytes();
    let ingest_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(ingest_json["written"].as_u64().unwrap() > 0);
    assert!(ingest_json["report"]["is_complete"].as_bool().unwrap());

    let latest_resp = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/v1/candles/latest")
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(latest_resp.status(), 200);
    let body: Bytes = latest_resp.into_body().collect().await?.to_bytes();
    let latest_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(!latest_json["candle"].is_null());

    let integrity_resp = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/v1/candles/integrity?days=1")
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(integrity_resp.status(), 200);

    Ok(())
}
