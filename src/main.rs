use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cms_api::config::AppConfig;
use cms_api::database;
use cms_api::handlers;
use cms_api::resources::{Article, Product, Program, Project, Staff};
use cms_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    info!(environment = ?config.environment, port = config.server.port, "starting cms-api");

    let pool = database::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    database::migrate(&pool)
        .await
        .context("failed to run migrations")?;

    let port = config.server.port;
    let state = AppState::new(pool, config);
    state
        .uploads
        .ensure_dir()
        .await
        .context("failed to create upload directory")?;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!(port, "listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let uploads_dir = state.uploads.dir().to_path_buf();
    let public_prefix = state.config.uploads.public_prefix.clone();
    // Slack above the upload ceiling so the multipart framing itself never
    // trips the body limit; oversized files are rejected with a 400 instead.
    let body_limit = state.config.uploads.max_bytes + 1024 * 1024;

    let api = Router::new()
        .nest("/auth", handlers::auth::routes(state.clone()))
        .nest("/articles", handlers::resource::routes::<Article>(state.clone()))
        .nest("/staff", handlers::resource::routes::<Staff>(state.clone()))
        .nest("/projects", handlers::resource::routes::<Project>(state.clone()))
        .nest("/programs", handlers::resource::routes::<Program>(state.clone()))
        .nest("/products", handlers::resource::routes::<Product>(state.clone()))
        .nest("/letters", handlers::letters::routes(state.clone()));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .nest_service(&public_prefix, ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&state.config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - liveness probe. Always 200; the database field reports
/// reachability without failing the endpoint.
async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match database::health_check(&state.pool).await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(error = %e, "database health check failed");
            "unreachable"
        }
    };
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "database": database,
        }
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    if parsed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(parsed)
    }
}
