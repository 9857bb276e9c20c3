use agingwell::{
    config::ServiceConfig,
    create_router,
    ml::{ActivationPolicy, ModelArtifact},
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::path::Path;
use tower::ServiceExt;

const MALNOURISHED: &str = "ขาดสารอาหาร";
const AT_RISK: &str = "เสี่ยงขาดสารอาหาร";
const NORMAL: &str = "ปกติ";

fn fixture_model() -> ModelArtifact {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/nn_export.json");
    ModelArtifact::from_file(path, ActivationPolicy::Strict).expect("fixture model loads")
}

fn app() -> Router {
    create_router(AppState::new(fixture_model(), ServiceConfig::default()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: Body,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(ct) = content_type {
        builder = builder.header("content-type", ct);
    }
    let request = builder.body(body).expect("failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    (status, String::from_utf8_lossy(&bytes).to_string())
}

async fn send_json(app: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let (status, body) = send(
        app,
        Method::POST,
        uri,
        Some("application/json"),
        Body::from(payload.to_string()),
    )
    .await;
    let value = serde_json::from_str(&body).unwrap_or(Value::String(body));
    (status, value)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, Method::GET, uri, None, Body::empty()).await;
    (status, serde_json::from_str(&body).expect("json body"))
}

#[tokio::test]
async fn health_and_root() {
    let app = app();

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_loaded"], true);

    let (status, body) = get_json(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let (status, _) = send(&app, Method::GET, "/healthz", None, Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/readyz", None, Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn model_summary_describes_fixture() {
    let (status, body) = get_json(&app(), "/model").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["n_features_in"], 2);
    assert_eq!(body["classes"], json!([0, 1, 2]));
    assert_eq!(
        body["feature_order"],
        json!(["Meals_per_day", "Food_Intake_Percentage"])
    );
    assert_eq!(body["layers"][0], json!({ "inputs": 2, "outputs": 3 }));
}

#[tokio::test]
async fn predict_vector() {
    let (status, body) = send_json(&app(), "/predict", json!({ "features": [0.0, 0.0] })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["class_label"], 2);
    assert_eq!(body["risk_level"], "malnourished");
    assert_eq!(body["status"], MALNOURISHED);

    let probs: Vec<f64> = body["probabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert_eq!(probs.len(), 3);
    assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    assert_eq!(body["confidence"].as_f64().unwrap(), probs[2]);
}

#[tokio::test]
async fn predict_named_features() {
    let payload = json!({
        "features": { "Meals_per_day": 3, "Food_Intake_Percentage": 90 }
    });
    let (status, body) = send_json(&app(), "/predict", payload).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["class_label"], 0);
    assert_eq!(body["status"], NORMAL);
    assert!(body["confidence"].as_f64().unwrap() > 0.99);
}

#[tokio::test]
async fn predict_batch_keeps_row_order() {
    let payload = json!({
        "rows": [
            [0.0, 0.0],
            { "Meals_per_day": 3, "Food_Intake_Percentage": 90 },
            [2.0, 40.0]
        ]
    });
    let (status, body) = send_json(&app(), "/predict", payload).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let labels: Vec<i64> = body["predictions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["class_label"].as_i64().unwrap())
        .collect();
    assert_eq!(labels, vec![2, 0, 1]);
}

#[tokio::test]
async fn predict_rejects_wrong_feature_count() {
    let (status, body) = send_json(&app(), "/predict", json!({ "features": [1.0, 2.0, 3.0] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("expected 2, got 3"));
}

#[tokio::test]
async fn predict_batch_error_names_row() {
    let payload = json!({ "rows": [[1.0, 2.0], [1.0]] });
    let (status, body) = send_json(&app(), "/predict", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Row 1:"));
}

#[tokio::test]
async fn predict_requires_exactly_one_input() {
    let app = app();
    let (status, _) = send_json(&app, "/predict", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let both = json!({ "features": [0.0, 0.0], "rows": [[0.0, 0.0]] });
    let (status, _) = send_json(&app, "/predict", both).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn predict_rejects_non_numeric_features() {
    let (status, body) =
        send_json(&app(), "/predict", json!({ "features": ["three", 40] })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn predict_tab_form_field() {
    // Meals_per_day\tFood_Intake_Percentage\n2\t40
    let form = "tab_data=Meals_per_day%09Food_Intake_Percentage%0A2%0940";
    let (status, body) = send(
        &app(),
        Method::POST,
        "/predict_tab",
        Some("application/x-www-form-urlencoded"),
        Body::from(form),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], AT_RISK);
    assert_eq!(body["class_label"], 1);
    let confidence = body["confidence"].as_str().unwrap();
    assert!(confidence.ends_with('%'));
    assert!(!body["recommendation"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn predict_tab_multipart_file() {
    let boundary = "agingwell-test-boundary";
    let tsv = "Name\tMeals_per_day\tFood_Intake_Percentage\nSomchai\t0\t0\nMali\t3\t90\n";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"tab_file\"; filename=\"sample.tsv\"\r\n\
         Content-Type: text/tab-separated-values\r\n\r\n\
         {tsv}\r\n\
         --{boundary}--\r\n"
    );
    let (status, body) = send(
        &app(),
        Method::POST,
        "/predict_tab",
        Some(&format!("multipart/form-data; boundary={boundary}")),
        Body::from(body),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    // Only the first data row is classified.
    assert_eq!(body["status"], MALNOURISHED);
    assert_eq!(body["risk_level"], "malnourished");
}

#[tokio::test]
async fn predict_tab_raw_text_body() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/predict_tab",
        Some("text/tab-separated-values"),
        Body::from("Meals_per_day\tFood_Intake_Percentage\n3\t90\n"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], NORMAL);
}

#[tokio::test]
async fn predict_tab_missing_columns() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/predict_tab",
        Some("text/plain"),
        Body::from("Meals_per_day\n3\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "ผิดพลาด");
    assert_eq!(body["confidence"], "0%");
    assert!(body["recommendation"]
        .as_str()
        .unwrap()
        .contains("Food_Intake_Percentage"));
    assert!(body.get("class_label").is_none());
}

#[tokio::test]
async fn predict_tab_without_data() {
    let (status, body) = send(&app(), Method::POST, "/predict_tab", None, Body::empty()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["recommendation"], "กรุณาส่ง tab_data หรืออัปโหลดไฟล์");

    let (status, _) = send(
        &app(),
        Method::POST,
        "/predict_tab",
        Some("application/x-www-form-urlencoded"),
        Body::from("tab_data="),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn predict_tab_non_numeric_cell() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/predict_tab",
        Some("text/plain"),
        Body::from("Meals_per_day\tFood_Intake_Percentage\nthree\t40\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert!(body["recommendation"]
        .as_str()
        .unwrap()
        .starts_with("Error:"));
}

#[tokio::test]
async fn metrics_count_requests() {
    let app = app();
    send_json(&app, "/predict", json!({ "features": [0.0, 0.0] })).await;
    send_json(&app, "/predict", json!({ "features": [1.0] })).await;

    let (status, text) = send(&app, Method::GET, "/metrics", None, Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("agingwell_requests_total{endpoint=\"predict\"} 2"));
    assert!(text.contains("agingwell_request_errors_total{kind=\"client\"} 1"));
    assert!(text.contains("agingwell_predictions_total{class=\"2\"} 1"));
}

#[tokio::test]
async fn overflowing_features_are_rejected() {
    let app = app();
    let (status, body) =
        send_json(&app, "/predict", json!({ "features": [1.5e308, 1.5e308] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Non-finite activation"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/predict_tab",
        Some("text/plain"),
        Body::from("Meals_per_day\tFood_Intake_Percentage\n1.5e308\t1.5e308\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["confidence"], "0%");
    assert!(!body["recommendation"].as_str().unwrap().contains("NaN"));
}
