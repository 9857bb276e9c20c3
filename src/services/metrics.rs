use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Request and prediction counters for the `/metrics` endpoint
pub struct Metrics {
    /// Requests to `/predict`
    pub json_requests: AtomicU64,
    /// Requests to `/predict_tab`
    pub tab_requests: AtomicU64,
    /// Successful predictions, all classes
    pub predictions: AtomicU64,
    /// Requests failed with a client error
    pub request_errors: AtomicU64,
    /// Requests failed with a server error
    pub internal_errors: AtomicU64,
    /// Successful predictions per output index
    per_class: Vec<AtomicU64>,
    class_names: Vec<String>,
}

impl Metrics {
    pub fn new(class_names: Vec<String>) -> Self {
        Self {
            json_requests: AtomicU64::new(0),
            tab_requests: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            request_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            per_class: class_names.iter().map(|_| AtomicU64::new(0)).collect(),
            class_names,
        }
    }

    pub fn inc_json_requests(&self) {
        self.json_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tab_requests(&self) {
        self.tab_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prediction(&self, class_index: Option<usize>) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        if let Some(counter) = class_index.and_then(|i| self.per_class.get(i)) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self, request_error: bool) {
        if request_error {
            self.request_errors.fetch_add(1, Ordering::Relaxed);
        } else {
            self.internal_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn class_count(&self, class_index: usize) -> u64 {
        self.per_class
            .get(class_index)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Prometheus text exposition
    pub fn render(&self, uptime_seconds: u64) -> String {
        let mut out = format!(
            r#"# HELP agingwell_up Service is serving predictions
# TYPE agingwell_up gauge
agingwell_up 1

# HELP agingwell_uptime_seconds Uptime in seconds
# TYPE agingwell_uptime_seconds counter
agingwell_uptime_seconds {}

# HELP agingwell_requests_total Prediction requests by endpoint
# TYPE agingwell_requests_total counter
agingwell_requests_total{{endpoint="predict"}} {}
agingwell_requests_total{{endpoint="predict_tab"}} {}

# HELP agingwell_request_errors_total Failed prediction requests by kind
# TYPE agingwell_request_errors_total counter
agingwell_request_errors_total{{kind="client"}} {}
agingwell_request_errors_total{{kind="server"}} {}

# HELP agingwell_predictions_total Successful predictions by class
# TYPE agingwell_predictions_total counter
"#,
            uptime_seconds,
            self.json_requests.load(Ordering::Relaxed),
            self.tab_requests.load(Ordering::Relaxed),
            self.request_errors.load(Ordering::Relaxed),
            self.internal_errors.load(Ordering::Relaxed),
        );
        for (name, counter) in self.class_names.iter().zip(&self.per_class) {
            let _ = writeln!(
                out,
                "agingwell_predictions_total{{class=\"{}\"}} {}",
                name.replace('"', "\\\""),
                counter.load(Ordering::Relaxed)
            );
        }
        out
    }
}
