use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::audit::AuditSink;
use super::criteria::EvaluationCriteria;
use super::domain::{Candidate, EvaluationContext, EvaluationId};
use super::service::EvaluationEngine;
use crate::error::AppError;

const DEFAULT_RECENT_LIMIT: usize = 20;

/// Body accepted by the evaluation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationRequest {
    pub candidate: Candidate,
    #[serde(default)]
    pub current_performance: Option<f64>,
    #[serde(default)]
    pub evaluation_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankRequest {
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub current_performance: Option<f64>,
}

/// Router builder exposing the engine to adoption pipelines and audit tooling.
pub fn evaluation_router<A>(engine: Arc<EvaluationEngine<A>>) -> Router
where
    A: AuditSink + 'static,
{
    Router::new()
        .route("/api/v1/evaluations", post(evaluate_handler::<A>))
        .route("/api/v1/evaluations/recent", get(recent_handler::<A>))
        .route(
            "/api/v1/evaluations/statistics",
            get(statistics_handler::<A>),
        )
        .route(
            "/api/v1/evaluations/criteria",
            get(criteria_handler::<A>).put(update_criteria_handler::<A>),
        )
        .route("/api/v1/evaluations/rank", post(rank_handler::<A>))
        .with_state(engine)
}

pub(crate) async fn evaluate_handler<A>(
    State(engine): State<Arc<EvaluationEngine<A>>>,
    Json(request): Json<EvaluationRequest>,
) -> Response
where
    A: AuditSink + 'static,
{
    let EvaluationRequest {
        candidate,
        current_performance,
        evaluation_id,
        attributes,
    } = request;
    let context = EvaluationContext {
        evaluation_id: evaluation_id.map(EvaluationId),
        attributes,
    };

    // Waiting on a busy evaluation id blocks, so keep it off the async workers.
    let outcome = tokio::task::spawn_blocking(move || {
        engine.evaluate(&candidate, current_performance, &context)
    })
    .await;

    match outcome {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(err) => {
            error!(error = %err, "evaluation task aborted");
            let payload = json!({ "error": "evaluation task aborted" });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn recent_handler<A>(
    State(engine): State<Arc<EvaluationEngine<A>>>,
    Query(query): Query<RecentQuery>,
) -> Response
where
    A: AuditSink + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    (StatusCode::OK, Json(engine.recent_decisions(limit))).into_response()
}

pub(crate) async fn statistics_handler<A>(State(engine): State<Arc<EvaluationEngine<A>>>) -> Response
where
    A: AuditSink + 'static,
{
    (StatusCode::OK, Json(engine.statistics())).into_response()
}

pub(crate) async fn criteria_handler<A>(State(engine): State<Arc<EvaluationEngine<A>>>) -> Response
where
    A: AuditSink + 'static,
{
    let criteria = engine.criteria();
    (StatusCode::OK, Json(criteria.as_ref().clone())).into_response()
}

pub(crate) async fn update_criteria_handler<A>(
    State(engine): State<Arc<EvaluationEngine<A>>>,
    Json(criteria): Json<EvaluationCriteria>,
) -> Response
where
    A: AuditSink + 'static,
{
    match engine.update_criteria(criteria) {
        Ok(()) => {
            let current = engine.criteria();
            (StatusCode::OK, Json(current.as_ref().clone())).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

pub(crate) async fn rank_handler<A>(
    State(engine): State<Arc<EvaluationEngine<A>>>,
    Json(request): Json<RankRequest>,
) -> Response
where
    A: AuditSink + 'static,
{
    let ranking = engine.rank(&request.candidates, request.current_performance);
    (StatusCode::OK, Json(ranking)).into_response()
}
