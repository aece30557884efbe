//! Seed an account, ingest candles, place a paper order through the HTTP
//! surface, and confirm the next-open fill rule: the order stays `NEW`
//! against its own candle and only fills once a later candle exists and an
//! orchestrator cycle runs against it. Skips if no test database is
//! configured.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use fxt_daemon::{routes, state::AppState};
use fxt_schemas::Micros;
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn paper_order_stays_new_until_the_next_candle_fills_it() -> anyhow::Result<()> {
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
    let t0: DateTime<Utc> = latest_json["candle"]["open_time"].as_str().unwrap().parse()?;

    let order_body = serde_json::json!({
        "symbol": "EURUSD",
        "side": "buy",
        "qty": 1000,
        "idempotency_key": "test-order-1",
    });
    let order_resp = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/paper/order")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(serde_json::to_vec(&order_body)?))?,
        )
        .await?;
    assert_eq!(order_resp.status(), 200);
    let body: Bytes = order_resp.into_body().collect().await?.to_bytes();
    let order_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(!order_json["filled"].as_bool().unwrap());
    assert_eq!(order_json["order"]["status"], "new");
    let order_id = order_json["order"]["id"].clone();

    // Resubmitting the same idempotency key before any later candle exists
    // must return the same still-unfilled order, never a second one.
    let order_resp_2 = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/paper/order")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(serde_json::to_vec(&order_body)?))?,
        )
        .await?;
    assert_eq!(order_resp_2.status(), 200);
    let body: Bytes = order_resp_2.into_body().collect().await?.to_bytes();
    let order_json_2: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(!order_json_2["filled"].as_bool().unwrap());
    assert_eq!(order_json_2["order"]["id"], order_id);

    // Running an orchestrator cycle against t0 itself must not fill the
    // order — only a later candle's open can.
    let t0_query = t0.to_rfc3339_opts(SecondsFormat::Secs, true);
    let run_at_t0 = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri(format!("/orchestrator/run?candle_ts={t0_query}"))
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(run_at_t0.status(), 200);
    let body: Bytes = run_at_t0.into_body().collect().await?.to_bytes();
    let run_at_t0_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(run_at_t0_json["report"]["fill"].is_null());

    let t1 = t0 + Duration::seconds(300);
    let t1_query = t1.to_rfc3339_opts(SecondsFormat::Secs, true);
    let backfill_body = serde_json::json!({ "start": t1_query, "end": t1_query });
    let backfill_resp = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/v1/candles/admin/backfill")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(serde_json::to_vec(&backfill_body)?))?,
        )
        .await?;
    assert_eq!(backfill_resp.status(), 200);

    let order_still_new = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri(format!("/paper/orders/{}", order_id.as_str().unwrap()))
                .body(axum::body::Body::empty())?,
        )
        .await?;
    let body: Bytes = order_still_new.into_body().collect().await?.to_bytes();
    let order_still_new_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(order_still_new_json["status"], "new");

    let run_at_t1 = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri(format!("/orchestrator/run?candle_ts={t1_query}"))
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(run_at_t1.status(), 200);
    let body: Bytes = run_at_t1.into_body().collect().await?.to_bytes();
    let run_at_t1_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(!run_at_t1_json["report"]["fill"].is_null());

    let order_filled = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri(format!("/paper/orders/{}", order_id.as_str().unwrap()))
                .body(axum::body::Body::empty())?,
        )
        .await?;
    let body: Bytes = order_filled.into_body().collect().await?.to_bytes();
    let order_filled_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(order_filled_json["status"], "filled");

    let status_resp = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/v7/account/status")
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(status_resp.status(), 200);
    let body: Bytes = status_resp.into_body().collect().await?.to_bytes();
    let status_json: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(!status_json["positions"].as_array().unwrap().is_empty());

    Ok(())
}
