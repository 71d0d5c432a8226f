//! HTTP surface: the grid endpoint plus liveness and metrics.
//!
//! Each grid request acquires its own store connection inside the handler and
//! drops it on return, whichever way the handler exits.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tracing::{error, info_span, warn, Instrument};

use crate::error::{GridError, GridResult};
use crate::executor::{autocomplete_tags, read_page};
use crate::metrics::GridMetrics;
use crate::mutation::{apply_mutation, MutationOutcome};
use crate::registry::ColumnRegistry;
use crate::request::{parse_mutation, parse_read, GridRead, Params};
use crate::store::{ConnectionSource, StoreConnection};

/// Shared, read-only handler state.
#[derive(Clone)]
pub struct GridState {
    source: Arc<dyn ConnectionSource>,
    registry: Arc<ColumnRegistry>,
    metrics: Arc<GridMetrics>,
}

impl GridState {
    pub fn new(
        source: Arc<dyn ConnectionSource>,
        registry: Arc<ColumnRegistry>,
        metrics: Arc<GridMetrics>,
    ) -> Self {
        Self {
            source,
            registry,
            metrics,
        }
    }

    async fn acquire(&self) -> GridResult<Box<dyn StoreConnection>> {
        self.source.acquire().await.map_err(|err| {
            error!(error = %err, "acquire store connection failed");
            GridError::QueryFailed(err)
        })
    }

    fn reject(&self, err: GridError) -> Response {
        if err.is_client_error() {
            self.metrics.record_client_reject();
            warn!(error = %err, "grid request rejected");
        } else {
            self.metrics.record_query_failure();
        }
        err.into_response()
    }
}

impl IntoResponse for GridError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            (StatusCode::BAD_REQUEST, format!("{self}\n")).into_response()
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error\n").into_response()
        }
    }
}

/// Builds the router serving the grid at `route`.
pub fn router(state: GridState, route: &str) -> Router {
    Router::new()
        .route(route, get(read_grid).post(write_grid))
        .route("/live", get(live))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

async fn read_grid(State(state): State<GridState>, Query(params): Query<Params>) -> Response {
    async {
        match serve_read(&state, &params).await {
            Ok(response) => response,
            Err(err) => state.reject(err),
        }
    }
    .instrument(info_span!("grid_read", table = %state.registry.table()))
    .await
}

async fn serve_read(state: &GridState, params: &Params) -> GridResult<Response> {
    let read = parse_read(&state.registry, params);
    let mut conn = state.acquire().await?;
    match read {
        GridRead::Autocomplete { term } => {
            let tags = autocomplete_tags(conn.as_mut(), &state.registry, &term).await?;
            state.metrics.record_autocomplete();
            Ok(Json(tags).into_response())
        }
        GridRead::Page(request) => {
            let started = Instant::now();
            let page = read_page(conn.as_mut(), &state.registry, &request).await?;
            state.metrics.record_read(page.rows.len(), started.elapsed());
            Ok(Json(page).into_response())
        }
    }
}

async fn write_grid(State(state): State<GridState>, Form(form): Form<Params>) -> Response {
    async {
        match serve_write(&state, &form).await {
            Ok(response) => response,
            Err(err) => state.reject(err),
        }
    }
    .instrument(info_span!("grid_write", table = %state.registry.table()))
    .await
}

async fn serve_write(state: &GridState, form: &Params) -> GridResult<Response> {
    let mutation = parse_mutation(form)?;
    let mut conn = state.acquire().await?;
    let outcome = apply_mutation(conn.as_mut(), &state.registry, mutation.clone()).await?;
    state.metrics.record_mutation(&mutation);
    Ok(match outcome {
        MutationOutcome::Applied => StatusCode::OK.into_response(),
        MutationOutcome::Written(value) => value.into_response(),
    })
}

async fn live() -> &'static str {
    "live\n"
}

async fn render_metrics(State(state): State<GridState>) -> String {
    state.metrics.render_text()
}
