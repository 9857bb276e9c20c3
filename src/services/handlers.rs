//! HTTP handlers: health probes, model info, and the two prediction routes.
//!
//! Endpoints:
//! - GET  /           : greeting
//! - GET  /health     : status + uptime
//! - GET  /healthz    : liveness probe
//! - GET  /readyz     : readiness probe
//! - GET  /model      : loaded model summary
//! - GET  /metrics    : Prometheus counters
//! - POST /predict    : JSON features (vector or named map), single or batch
//! - POST /predict_tab: tab-separated upload (`tab_data` field or `tab_file`)

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{AgingWellError, Result};
use crate::ml::{
    argmax, predict_with_confidence, resolve_features, ClassLabel, FeatureInput, ModelSummary,
    PredictionResult,
};
use crate::services::state::AppState;
use crate::services::status::{
    format_confidence, missing_columns_message, NutritionStatus, MISSING_TAB_INPUT,
    STATUS_BAD_REQUEST, STATUS_SERVER_ERROR,
};
use crate::services::tabular::TabularData;

// ── Request / Response types ─────────────────────────────────────

/// POST /predict body: exactly one of `features` or `rows`.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub features: Option<FeatureInput>,
    #[serde(default)]
    pub rows: Option<Vec<FeatureInput>>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    #[serde(flatten)]
    pub result: PredictionResult,
    pub risk_level: NutritionStatus,
    pub status: &'static str,
    pub recommendation: &'static str,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        let risk = NutritionStatus::from_label(&result.class_label);
        Self {
            result,
            risk_level: risk,
            status: risk.display_text(),
            recommendation: risk.recommendation(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchPredictResponse {
    pub predictions: Vec<PredictResponse>,
}

/// POST /predict_tab response; error responses share the first three fields.
#[derive(Debug, Serialize)]
pub struct TabResponse {
    pub status: String,
    pub confidence: String,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<NutritionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_label: Option<ClassLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
}

impl From<PredictionResult> for TabResponse {
    fn from(result: PredictionResult) -> Self {
        let risk = NutritionStatus::from_label(&result.class_label);
        Self {
            status: risk.display_text().to_string(),
            confidence: format_confidence(result.confidence),
            recommendation: risk.recommendation().to_string(),
            risk_level: Some(risk),
            class_label: Some(result.class_label),
            probabilities: Some(result.probabilities),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TabForm {
    #[serde(default)]
    pub tab_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub docs: &'static str,
}

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{ "error", "detail" }`
    Json,
    /// `{ "status", "confidence": "0%", "recommendation" }`
    Tab,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
    pub envelope: Envelope,
}

impl ApiError {
    pub fn from_error(err: AgingWellError, envelope: Envelope) -> Self {
        let status = if err.is_request_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let detail = match envelope {
            Envelope::Json => err.to_string(),
            Envelope::Tab => format!("Error: {err}"),
        };
        Self {
            status,
            detail,
            envelope,
        }
    }

    pub fn bad_request(detail: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
            envelope,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let client_error = self.status.is_client_error();
        match self.envelope {
            Envelope::Json => {
                let body = ErrorBody {
                    error: if client_error {
                        "bad_request"
                    } else {
                        "internal_error"
                    },
                    detail: self.detail,
                };
                (self.status, Json(body)).into_response()
            }
            Envelope::Tab => {
                let body = TabResponse {
                    status: if client_error {
                        STATUS_BAD_REQUEST
                    } else {
                        STATUS_SERVER_ERROR
                    }
                    .to_string(),
                    confidence: "0%".to_string(),
                    recommendation: self.detail,
                    risk_level: None,
                    class_label: None,
                    probabilities: None,
                };
                (self.status, Json(body)).into_response()
            }
        }
    }
}

fn reject(state: &AppState, err: ApiError) -> Response {
    let client_error = err.status.is_client_error();
    state.metrics.record_error(client_error);
    if client_error {
        warn!(status = %err.status, detail = %err.detail, "prediction request rejected");
    } else {
        error!(status = %err.status, detail = %err.detail, "prediction request failed");
    }
    err.into_response()
}

// ── Prediction ───────────────────────────────────────────────────

fn classify(state: &AppState, input: &FeatureInput) -> Result<PredictionResult> {
    let features = resolve_features(&state.model, input)?;
    let result = predict_with_confidence(&state.model, &features)?;
    state
        .metrics
        .record_prediction(argmax(&result.probabilities));
    Ok(result)
}

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    state.metrics.inc_json_requests();

    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let err = ApiError {
                status: rejection.status(),
                detail: rejection.body_text(),
                envelope: Envelope::Json,
            };
            return reject(&state, err);
        }
    };

    match (req.features, req.rows) {
        (Some(features), None) => match classify(&state, &features) {
            Ok(result) => Json(PredictResponse::from(result)).into_response(),
            Err(e) => reject(&state, ApiError::from_error(e, Envelope::Json)),
        },
        (None, Some(rows)) => {
            let results: Result<Vec<PredictResponse>> = rows
                .iter()
                .enumerate()
                .map(|(i, input)| {
                    classify(&state, input)
                        .map(PredictResponse::from)
                        .map_err(|e| e.in_row(i))
                })
                .collect();
            match results {
                Ok(predictions) => Json(BatchPredictResponse { predictions }).into_response(),
                Err(e) => reject(&state, ApiError::from_error(e, Envelope::Json)),
            }
        }
        _ => reject(
            &state,
            ApiError::bad_request(
                "body must carry exactly one of `features` or `rows`",
                Envelope::Json,
            ),
        ),
    }
}

/// POST /predict_tab
pub async fn predict_tab(State(state): State<AppState>, request: Request) -> Response {
    state.metrics.inc_tab_requests();

    let data = match read_tab_payload(&state, request).await {
        Ok(Some(data)) => data,
        Ok(None) => {
            return reject(
                &state,
                ApiError::bad_request(MISSING_TAB_INPUT, Envelope::Tab),
            )
        }
        Err(e) => return reject(&state, ApiError::from_error(e, Envelope::Tab)),
    };

    match classify_tab(&state, &data) {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => reject(&state, e),
    }
}

fn classify_tab(state: &AppState, data: &[u8]) -> std::result::Result<TabResponse, ApiError> {
    let to_api = |e: AgingWellError| ApiError::from_error(e, Envelope::Tab);

    let table = TabularData::parse(data).map_err(to_api)?;
    let required = &state.service.required_columns;
    if !table.missing_columns(required).is_empty() {
        return Err(ApiError::bad_request(
            missing_columns_message(required),
            Envelope::Tab,
        ));
    }
    if table.is_empty() {
        return Err(ApiError::bad_request(
            "Error: tab data has no rows",
            Envelope::Tab,
        ));
    }
    if table.len() > 1 {
        debug!(rows = table.len(), "tab upload has several rows; classifying the first");
    }

    let named = table
        .named_row(0, state.model.feature_order())
        .map_err(to_api)?;
    let result = classify(state, &FeatureInput::Named(named)).map_err(to_api)?;
    Ok(TabResponse::from(result))
}

/// Pull the tab-separated text out of the request.
///
/// Accepts multipart (`tab_data` text field preferred over `tab_file`),
/// urlencoded forms (`tab_data`), and raw `text/*` bodies. `Ok(None)` means
/// no data was supplied.
async fn read_tab_payload(state: &AppState, request: Request) -> Result<Option<Vec<u8>>> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| AgingWellError::InvalidInput(e.body_text()))?;

        let mut tab_data = None;
        let mut tab_file = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AgingWellError::InvalidInput(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "tab_data" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AgingWellError::InvalidInput(e.body_text()))?;
                    if !text.trim().is_empty() {
                        tab_data = Some(text.into_bytes());
                    }
                }
                "tab_file" => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AgingWellError::InvalidInput(e.body_text()))?;
                    if !bytes.is_empty() {
                        tab_file = Some(bytes.to_vec());
                    }
                }
                _ => {}
            }
        }
        return Ok(tab_data.or(tab_file));
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<TabForm>::from_request(request, state)
            .await
            .map_err(|e| AgingWellError::InvalidInput(e.body_text()))?;
        return Ok(form
            .tab_data
            .filter(|s| !s.trim().is_empty())
            .map(String::into_bytes));
    }

    if content_type.starts_with("text/") {
        let bytes = axum::body::to_bytes(request.into_body(), state.service.max_body_bytes)
            .await
            .map_err(|e| AgingWellError::InvalidInput(e.to_string()))?;
        return Ok((!bytes.is_empty()).then(|| bytes.to_vec()));
    }

    Ok(None)
}

// ── Info / health ────────────────────────────────────────────────

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "AgingWell AI prediction service is ready",
        docs: "/model",
    })
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_loaded: true,
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Liveness probe - is the process alive?
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe. The server never starts without a model, so once it
/// answers it is ready.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /model
pub async fn model_summary(State(state): State<AppState>) -> Json<ModelSummary> {
    Json(state.model.summary())
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(state.uptime_seconds()),
    )
}
