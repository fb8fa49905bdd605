use crate::catalog::{CatalogSource, JsonCatalog};
use crate::config::Config;
use crate::pipeline::{CategoryFilter, Pagination, DEFAULT_PAGE_SIZE};
use crate::shelf::Shelf;
use crate::tmdb::{PosterSearch, TmdbClient};
use anyhow::{anyhow, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub shelf: Arc<Shelf>,
}

impl AppState {
    pub fn new(catalog: Arc<dyn CatalogSource>, search: Arc<dyn PosterSearch>) -> Self {
        Self {
            shelf: Arc::new(Shelf::new(catalog, search)),
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let catalog: Arc<dyn CatalogSource> =
        Arc::new(JsonCatalog::load(config.catalog_path.as_deref())?);
    let search: Arc<dyn PosterSearch> = Arc::new(TmdbClient::new(&config.tmdb)?);
    info!(
        "TMDB search via {} (language {}, include_adult {})",
        config.tmdb.base_url, config.tmdb.language, config.tmdb.include_adult
    );

    let app = build_router(AppState::new(catalog, search));

    info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/:id", delete(delete_movie))
        .route("/movies/:id/like", post(like_movie))
        .route("/movies/:id/unlike", post(unlike_movie))
        .route("/movies/:id/dislike", post(dislike_movie))
        .route("/movies/:id/undislike", post(undislike_movie))
        .route("/categories", get(list_categories))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({"status": "error", "message": message}))).into_response()
}

/// Reads `page`, `page_size` and any number of `category` values.
/// Missing pagination values default to the first page of four.
pub fn parse_page_query(params: &[(String, String)]) -> Result<(Pagination, Option<CategoryFilter>)> {
    let mut page: u32 = 1;
    let mut page_size: u32 = DEFAULT_PAGE_SIZE;
    let mut categories = Vec::new();

    for (key, value) in params {
        match key.as_str() {
            "page" => {
                page = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("page must be a positive integer, got '{}'", value))?;
            }
            "page_size" => {
                page_size = value.trim().parse().map_err(|_| {
                    anyhow!("page_size must be a positive integer, got '{}'", value)
                })?;
            }
            "category" if !value.is_empty() => categories.push(value.clone()),
            _ => {}
        }
    }

    let pagination = Pagination::new(page, page_size)?;
    let filter = (!categories.is_empty()).then(|| CategoryFilter::new(categories));
    Ok((pagination, filter))
}

async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let (pagination, filter) = match parse_page_query(&params) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Rejecting page request: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match state.shelf.build_page(pagination, filter.as_ref()).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => {
            error!("Failed to build page: {:?}", e);
            error_response(StatusCode::BAD_GATEWAY, format!("{:#}", e))
        }
    }
}

async fn list_categories(State(state): State<AppState>) -> Response {
    match state.shelf.categories().await {
        Ok(categories) => Json(categories).into_response(),
        Err(e) => {
            error!("Failed to list categories: {:?}", e);
            error_response(StatusCode::BAD_GATEWAY, format!("{:#}", e))
        }
    }
}

async fn delete_movie(State(state): State<AppState>, Path(id): Path<i64>) -> StatusCode {
    state.shelf.delete(id).await;
    StatusCode::NO_CONTENT
}

async fn like_movie(State(state): State<AppState>, Path(id): Path<i64>) -> StatusCode {
    state.shelf.like(id).await;
    StatusCode::NO_CONTENT
}

async fn unlike_movie(State(state): State<AppState>, Path(id): Path<i64>) -> StatusCode {
    state.shelf.unlike(id).await;
    StatusCode::NO_CONTENT
}

async fn dislike_movie(State(state): State<AppState>, Path(id): Path<i64>) -> StatusCode {
    state.shelf.dislike(id).await;
    StatusCode::NO_CONTENT
}

async fn undislike_movie(State(state): State<AppState>, Path(id): Path<i64>) -> StatusCode {
    state.shelf.undislike(id).await;
    StatusCode::NO_CONTENT
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
