use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::{AgingWellError, Result};
use crate::services::handlers;
use crate::services::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.service.max_body_bytes);

    Router::new()
        .route("/", get(handlers::root))
        // Health endpoints
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::liveness))
        .route("/readyz", get(handlers::readiness))
        .route("/metrics", get(handlers::metrics))
        // Model endpoints
        .route("/model", get(handlers::model_summary))
        .route("/predict", post(handlers::predict))
        .route("/predict_tab", post(handlers::predict_tab))
        .with_state(state)
        .layer(body_limit)
        .layer(cors)
}

/// Prediction HTTP server
pub struct PredictionServer {
    state: AppState,
    host: String,
    port: u16,
}

impl PredictionServer {
    pub fn new(state: AppState, host: impl Into<String>, port: u16) -> Self {
        Self {
            state,
            host: host.into(),
            port,
        }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind((self.host.as_str(), self.port)).await?;
        let addr: SocketAddr = listener.local_addr()?;
        info!("Starting prediction server on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AgingWellError::Internal(format!("Prediction server error: {}", e)))?;

        info!("Prediction server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::ml::{ActivationPolicy, ModelArtifact};

    fn state() -> AppState {
        let model = ModelArtifact::from_json_str(
            r#"{"coefs": [[[1.0, 0.0], [0.0, 1.0]]]}"#,
            ActivationPolicy::Legacy,
        )
        .unwrap();
        AppState::new(model, ServiceConfig::default())
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let server = PredictionServer::new(state(), "127.0.0.1", 0);
        server.run(async {}).await.unwrap();
    }
}
