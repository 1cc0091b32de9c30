use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use seminar_hub_core::SeminarService;

use crate::auth::TokenValidator;
use crate::{seminars, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    service: SeminarService,
    tokens: Arc<TokenValidator>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, service: SeminarService, auth_secret: &[u8]) -> Self {
        Self {
            metrics,
            service,
            tokens: Arc::new(TokenValidator::new(auth_secret)),
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn service(&self) -> &SeminarService {
        &self.service
    }

    pub fn tokens(&self) -> &TokenValidator {
        &self.tokens
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/categories", get(seminars::categories))
        .route("/seminars", get(seminars::list_all).post(seminars::create))
        .route("/seminars/joined", get(seminars::joined))
        .route("/seminars/new", get(seminars::create_form))
        .route("/seminars/:id", get(seminars::details))
        .route(
            "/seminars/:id/edit",
            get(seminars::edit_form).post(seminars::edit),
        )
        .route(
            "/seminars/:id/delete",
            get(seminars::delete_confirmation).post(seminars::delete),
        )
        .route("/seminars/:id/join", post(seminars::join))
        .route(
            "/seminars/:id/leave",
            get(seminars::leave).post(seminars::leave),
        )
        .layer(middleware::from_fn(telemetry::track_requests))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
