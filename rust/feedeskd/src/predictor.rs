//! HTTP surface of the risk assessment: `POST /poverty-predictor`.
//!
//! Success is `{"success": true, "analysis": {...}}`. Every failure, whether
//! a bad body, a missing key or an upstream error, is a 500 with
//! `{"success": false, "error": "..."}`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::risk::{GatewayClient, RiskError, RiskRequest};

pub struct PredictorState {
    pub gateway: GatewayClient,
}

impl IntoResponse for RiskError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ])
        .max_age(Duration::from_secs(60 * 60))
}

pub fn router(state: Arc<PredictorState>) -> Router {
    Router::new()
        .route("/poverty-predictor", post(predict_handler))
        .route("/", post(predict_handler))
        .route("/healthz", get(health_handler))
        .method_not_allowed_fallback(method_not_allowed)
        .layer(cors())
        .with_state(state)
}

async fn predict_handler(State(state): State<Arc<PredictorState>>, body: Bytes) -> Response {
    let result = async {
        let req = RiskRequest::from_json(&body)?;
        info!(
            income = req.income,
            education = ?req.education,
            employment = ?req.employment,
            household_size = req.household_size,
            location = ?req.location,
            health_access = ?req.health_access,
            "poverty prediction request"
        );
        state.gateway.assess(&req).await
    }
    .await;

    match result {
        Ok(analysis) => (
            StatusCode::OK,
            Json(json!({ "success": true, "analysis": analysis })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "poverty prediction failed");
            e.into_response()
        }
    }
}

async fn method_not_allowed(method: Method) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": format!("Method {method} not allowed") })),
    )
        .into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    if config.api_key.is_none() {
        warn!("no gateway API key configured; every assessment will fail");
    }
    let state = Arc::new(PredictorState {
        gateway: GatewayClient::from_config(&config),
    });
    let app = router(state);

    let address = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("poverty-predictor listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("poverty-predictor shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
