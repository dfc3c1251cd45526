//! API server: serves the REST surface and the Prometheus exporter.

use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use surgirec_core::config::AppConfig;
use surgirec_policy::PolicyEngine;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// HTTP front end over a loaded [`PolicyEngine`].
pub struct ApiServer {
    config: AppConfig,
    engine: Arc<PolicyEngine>,
}

impl ApiServer {
    pub fn new(config: AppConfig, engine: Arc<PolicyEngine>) -> Self {
        Self { config, engine }
    }

    /// Build the application router with all routes and middleware.
    pub fn router(&self) -> Router {
        let state = AppState {
            engine: self.engine.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        Router::new()
            // Recommendation endpoints
            .route("/v1/recommend", post(rest::handle_recommend))
            .route("/v1/policy", get(rest::handle_policy_info))
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self.router();

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
