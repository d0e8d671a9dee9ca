//! Community Forms
//!
//! Backend for a membership portal whose applications (zakat, loans, welfare
//! requests) are admin-defined forms rather than hard-coded screens.
//!
//! ## Features
//!
//! - **Form definitions**: versioned forms with ordered, typed fields
//! - **Submissions**: schema-checked member submissions with an approval workflow
//! - **Audit trail**: one append-only entry per submission change
//! - **Reporting**: CSV export and status statistics

mod audit;
mod codec;
mod config;
mod db;
mod error;
mod export;
mod forms;
mod handlers;
mod models;
mod repository;
mod submissions;
mod validation;
mod workflow;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use handlers::middleware::{require_admin, resolve_actor, security_headers};
use handlers::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "community_forms=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Community Forms");
    tracing::info!("Environment: {:?}", config.environment);

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    if let Err(e) = db::purge_stale_rows(&pool).await {
        tracing::warn!("Failed to purge stale sessions: {}", e);
    }

    if let Some(admin) = &config.bootstrap_admin {
        if handlers::ensure_admin_user(&pool, &admin.username, &admin.email, &admin.password)
            .await?
        {
            tracing::info!("Created admin account {}", admin.username);
        }
    }

    // Create application state
    let state = AppState::new(
        pool,
        config.page_defaults(),
        config.is_production(),
        config.session_expiry_hours,
    );

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    let admin = middleware::from_fn(require_admin);

    // Build API routes
    let api_routes = Router::new()
        // Form definitions
        .route(
            "/forms",
            post(handlers::create_form)
                .route_layer(admin.clone())
                .get(handlers::list_forms),
        )
        .route("/forms/by-type/:form_type", get(handlers::get_form_by_type))
        .route(
            "/forms/:form_id",
            axum::routing::put(handlers::update_form)
                .delete(handlers::delete_form)
                .route_layer(admin.clone())
                .get(handlers::get_form),
        )
        // Submissions
        .route(
            "/submissions",
            get(handlers::list_submissions)
                .route_layer(admin.clone())
                .post(handlers::create_submission),
        )
        .route(
            "/submissions/export",
            get(handlers::export_submissions).route_layer(admin.clone()),
        )
        .route(
            "/submissions/stats",
            get(handlers::submission_stats).route_layer(admin.clone()),
        )
        .route(
            "/submissions/:submission_id",
            get(handlers::get_submission)
                .patch(handlers::update_submission)
                .delete(handlers::delete_submission),
        )
        // Audit trail
        .route(
            "/audit-logs",
            get(handlers::list_audit_logs).route_layer(admin.clone()),
        )
        // Admin authentication
        .route("/admin/login", post(handlers::admin_login))
        .route("/admin/logout", post(handlers::admin_logout))
        .route(
            "/admin/me",
            get(handlers::get_current_admin).route_layer(admin),
        )
        .layer(middleware::from_fn_with_state(state.clone(), resolve_actor));

    // Build main router
    let app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(cors)
        .with_state(state);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
