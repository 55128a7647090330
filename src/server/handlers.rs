//! HTTP request handlers

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::inference::Prediction;
use crate::schema::{
    self, allowed_values, base_columns, fields_from_json, ColumnRole, CustomerRecord,
};

use super::error::{Result, ServerError};
use super::state::AppState;

/// Upper bound of the tenure input on the form
const MAX_FORM_TENURE: u32 = 72;

// ============================================================================
// Inference
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub label: u8,
    pub probability: f64,
    pub verdict: String,
}

impl From<Prediction> for PredictResponse {
    fn from(p: Prediction) -> Self {
        Self {
            label: p.label,
            probability: p.probability,
            verdict: p.verdict(),
        }
    }
}

/// Score one record given as a flat JSON object
pub async fn api_predict(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<PredictResponse>> {
    let object = body
        .as_object()
        .ok_or_else(|| ServerError::BadRequest("expected a JSON object of customer fields".to_string()))?;

    let prediction = state.engine.score_json(object)?;
    info!(
        label = prediction.label,
        probability = prediction.probability,
        "Scored record"
    );
    Ok(Json(prediction.into()))
}

#[derive(Debug, Deserialize)]
pub struct BatchPredictRequest {
    pub records: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Score several records; fails as a whole when any record is invalid
pub async fn api_predict_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchPredictRequest>,
) -> Result<Json<serde_json::Value>> {
    if request.records.is_empty() {
        return Err(ServerError::BadRequest("records array is empty".to_string()));
    }

    let records = request
        .records
        .iter()
        .enumerate()
        .map(|(i, object)| {
            CustomerRecord::from_fields(&fields_from_json(object))
                .map_err(|e| ServerError::Unprocessable(format!("record {}: {}", i, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let predictions: Vec<PredictResponse> = state
        .engine
        .score_batch(&records)?
        .into_iter()
        .map(PredictResponse::from)
        .collect();

    info!(count = predictions.len(), "Scored batch");
    Ok(Json(json!({
        "predictions": predictions,
        "count": predictions.len(),
    })))
}

// ============================================================================
// Model and system
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.engine.stats();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_id": state.engine.metadata().model_id,
        "uptime_secs": state.uptime_secs(),
        "predictions": stats.total_predictions,
        "errors": stats.error_count,
        "avg_latency_ms": stats.avg_latency_ms,
    }))
}

pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let metadata = state.engine.metadata();
    Json(json!({
        "metadata": metadata,
        "top_features": state
            .engine
            .pipeline()
            .ranked_importances()
            .into_iter()
            .take(10)
            .map(|(name, importance)| json!({ "feature": name, "importance": importance }))
            .collect::<Vec<_>>(),
    }))
}

/// Input columns accepted by the scoring endpoints
pub async fn schema_info() -> Json<serde_json::Value> {
    let columns: Vec<serde_json::Value> = base_columns()
        .map(|spec| {
            json!({
                "name": spec.name,
                "role": spec.role,
                "allowed_values": allowed_values(spec.name),
            })
        })
        .collect();
    Json(json!({
        "schema_version": schema::SCHEMA_VERSION,
        "columns": columns,
    }))
}

// ============================================================================
// HTML form
// ============================================================================

pub async fn serve_index() -> Html<String> {
    Html(render_page(None))
}

/// Score a form submission and render the verdict, or the error, above the form
pub async fn predict_form(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    match state.engine.score_fields(&fields) {
        Ok(prediction) => {
            info!(label = prediction.label, probability = prediction.probability, "Scored form");
            (StatusCode::OK, Html(render_page(Some(Ok(prediction.verdict())))))
        }
        Err(e) => {
            let err = ServerError::from(e);
            warn!(error = %err, "Form submission rejected");
            (err.status(), Html(render_page(Some(Err(err.public_message())))))
        }
    }
}

fn render_page(outcome: Option<std::result::Result<String, String>>) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"UTF-8\"><title>Churn Prediction</title></head>\n<body>\n<h1>Churn Prediction</h1>\n",
    );

    match outcome {
        Some(Ok(verdict)) => {
            let _ = writeln!(page, "<p id=\"result\">{}</p>", escape_html(&verdict));
        }
        Some(Err(message)) => {
            let _ = writeln!(page, "<p id=\"error\">Error: {}</p>", escape_html(&message));
        }
        None => {}
    }

    page.push_str("<form method=\"post\" action=\"/predict\">\n");
    for spec in base_columns() {
        let _ = write!(page, "<p><label for=\"{0}\">{0}</label> ", spec.name);
        match (spec.role, spec.name) {
            (_, "SeniorCitizen") => {
                let _ = write!(
                    page,
                    "<select id=\"{0}\" name=\"{0}\"><option value=\"No\">No</option><option value=\"Yes\">Yes</option></select>",
                    spec.name
                );
            }
            (_, "tenure") => {
                let _ = write!(
                    page,
                    "<input id=\"{0}\" name=\"{0}\" type=\"number\" min=\"0\" max=\"{1}\" step=\"1\" value=\"0\" required>",
                    spec.name, MAX_FORM_TENURE
                );
            }
            (ColumnRole::Numeric, _) => {
                let _ = write!(
                    page,
                    "<input id=\"{0}\" name=\"{0}\" type=\"number\" min=\"0\" step=\"0.01\" value=\"0\" required>",
                    spec.name
                );
            }
            _ => {
                let _ = write!(page, "<select id=\"{0}\" name=\"{0}\">", spec.name);
                for value in allowed_values(spec.name) {
                    let _ = write!(page, "<option value=\"{0}\">{0}</option>", escape_html(value));
                }
                page.push_str("</select>");
            }
        }
        page.push_str("</p>\n");
    }
    page.push_str("<p><button type=\"submit\">Predict</button></p>\n</form>\n</body>\n</html>\n");
    page
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
