use candidate_eval::config::EngineSettings;
use candidate_eval::error::AppError;
use candidate_eval::evaluation::{AuditSink, EvaluationEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Engine wired with the configured ledger bounds, cleanup cadence, and lock wait.
pub(crate) fn build_engine<A>(
    audit: Arc<A>,
    settings: &EngineSettings,
) -> Result<EvaluationEngine<A>, AppError>
where
    A: AuditSink + 'static,
{
    Ok(EvaluationEngine::new(audit, settings.criteria())?.with_settings(settings))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub(crate) fn parse_score(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|err| format!("failed to parse '{raw}' as a number ({err})"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("'{raw}' must be a finite number"))
    }
}
