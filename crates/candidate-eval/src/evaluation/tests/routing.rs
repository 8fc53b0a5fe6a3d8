use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::evaluation::router::{evaluation_router, update_criteria_handler};
use crate::evaluation::{EvaluationContext, EvaluationCriteria};

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn router() -> (Router, Arc<crate::evaluation::EvaluationEngine<MemoryAudit>>) {
    let (engine, _audit, _clock) = build_engine();
    let engine = Arc::new(engine);
    (evaluation_router(engine.clone()), engine)
}

#[tokio::test]
async fn evaluate_route_returns_decision() {
    let (router, engine) = router();
    let body = json!({
        "candidate": breakthrough_candidate("c-http"),
        "evaluation_id": "eval-http",
        "attributes": { "source": "generator-3" }
    });

    let response = router
        .oneshot(json_request("POST", "/api/v1/evaluations", &body))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["result"], "eureka_promote");
    assert_eq!(payload["evaluation_id"], "eval-http");
    assert_eq!(payload["origin"], "primary");
    assert_eq!(payload["eureka_detected"], true);
    assert_eq!(engine.eureka_ids(), vec!["c-http".to_string()]);
}

#[tokio::test]
async fn evaluate_route_rejects_unparseable_json() {
    let (router, engine) = router();

    let response = router
        .oneshot(
            Request::post("/api/v1/evaluations")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(engine.statistics().total_evaluations, 0);
}

#[tokio::test]
async fn invalid_criteria_are_unprocessable() {
    let (engine, _audit, _clock) = build_engine();
    let engine = Arc::new(engine);

    let response = update_criteria_handler::<MemoryAudit>(
        State(engine.clone()),
        axum::Json(EvaluationCriteria {
            ttl_secs: 0,
            ..criteria()
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.contains("ttl")));
    assert_eq!(*engine.criteria(), criteria());
}

#[tokio::test]
async fn criteria_routes_read_and_replace() {
    let (router, engine) = router();
    let updated = EvaluationCriteria {
        adopt_threshold: 0.8,
        ..criteria()
    };

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/v1/evaluations/criteria",
            &serde_json::to_value(&updated).expect("criteria serialize"),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(get("/api/v1/evaluations/criteria"))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["adopt_threshold"], 0.8);
    assert_eq!(engine.criteria().adopt_threshold, 0.8);
}

#[tokio::test]
async fn statistics_route_reports_engine_totals() {
    let (router, engine) = router();
    engine.evaluate(&adoptable_candidate("c-1"), None, &EvaluationContext::default());

    let response = router
        .oneshot(get("/api/v1/evaluations/statistics"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total_evaluations"], 1);
    assert_eq!(payload["adoption_rate"], 1.0);
    assert_eq!(payload["ledger_size"], 1);
}

#[tokio::test]
async fn recent_route_honours_limit() {
    let (router, engine) = router();
    engine.evaluate(&weak_candidate("c-first"), None, &EvaluationContext::default());
    engine.evaluate(&weak_candidate("c-second"), None, &EvaluationContext::default());

    let response = router
        .oneshot(get("/api/v1/evaluations/recent?limit=1"))
        .await
        .expect("route executes");

    let payload = read_json_body(response).await;
    let entries = payload.as_array().expect("array payload");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["candidate_id"], "c-second");
}

#[tokio::test]
async fn rank_route_orders_candidates() {
    let (router, engine) = router();
    let body = json!({
        "candidates": [weak_candidate("c-low"), breakthrough_candidate("c-high")]
    });

    let response = router
        .oneshot(json_request("POST", "/api/v1/evaluations/rank", &body))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["ranked"][0]["candidate_id"], "c-high");
    assert_eq!(payload["ranked"][0]["rank"], 1);
    assert_eq!(payload["ranked"][1]["candidate_id"], "c-low");
    assert_eq!(engine.statistics().total_evaluations, 0);
}
