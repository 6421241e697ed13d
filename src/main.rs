//! Merchant Payment Server - Main Application Entry Point
//!
//! REST API for the merchant payment transaction lifecycle: idempotent
//! payment creation with a per-merchant velocity fraud check, and
//! asynchronous provider callbacks that finalize each transaction with an
//! append-only audit trail.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing; optional HMAC
//!   signatures on the public callback endpoint
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool and run migrations
//! 3. Seed the bootstrap API key if the key table is empty
//! 4. Build the payment engine over the Postgres store
//! 5. Build the HTTP router and start serving

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;
mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::services::payment_engine::PaymentEngine;
use crate::services::velocity::VelocityGuard;
use crate::state::AppState;
use crate::store::postgres::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Seed the first API key so the management surface is reachable
    if let Some(raw_key) = &config.bootstrap_api_key {
        seed_bootstrap_key(&pool, raw_key).await?;
    }

    // The Postgres store serves as both the merchant directory and the
    // transaction store behind the engine's boundary traits
    let pg_store = Arc::new(PgStore::new(pool.clone()));
    let engine = Arc::new(PaymentEngine::new(
        pg_store.clone(),
        pg_store,
        VelocityGuard::new(
            config.velocity_max_events,
            Duration::from_secs(config.velocity_window_secs),
        ),
        config.max_payment_amount,
    ));

    let app_state = AppState {
        pool,
        engine,
        callback_secret: config.callback_secret.clone(),
    };

    // Create authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        // Payment routes
        .route("/api/v1/payments", post(handlers::payments::create_payment))
        .route(
            "/api/v1/payments/{id}",
            get(handlers::payments::get_payment),
        )
        .route(
            "/api/v1/payments/merchant/{merchant_id}",
            get(handlers::payments::list_merchant_payments),
        )
        // Merchant management routes
        .route(
            "/api/v1/merchants",
            post(handlers::merchants::create_merchant),
        )
        .route("/api/v1/merchants", get(handlers::merchants::list_merchants))
        .route(
            "/api/v1/merchants/{id}",
            get(handlers::merchants::get_merchant),
        )
        .route(
            "/api/v1/merchants/{id}",
            put(handlers::merchants::update_merchant),
        )
        .route(
            "/api/v1/merchants/{id}",
            delete(handlers::merchants::delete_merchant),
        )
        .route(
            "/api/v1/merchants/{id}/status",
            patch(handlers::merchants::update_merchant_status),
        )
        // Key issuance
        .route("/api/v1/auth/api-keys", post(handlers::auth::create_api_key))
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes: health probe, and the provider callback which is
        // verified by HMAC signature instead of an API key
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/payments/callback",
            post(handlers::payments::payment_callback),
        )
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(app_state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests, handling them concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}

/// Insert the configured bootstrap key into an empty `api_keys` table.
///
/// Only the hash is stored. A non-empty table means provisioning already
/// happened and the bootstrap value is ignored.
async fn seed_bootstrap_key(pool: &db::DbPool, raw_key: &str) -> Result<(), sqlx::Error> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_keys")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    sqlx::query("INSERT INTO api_keys (key_hash, client_name) VALUES ($1, 'bootstrap')")
        .bind(middleware::auth::hash_api_key(raw_key))
        .execute(pool)
        .await?;

    tracing::info!("Bootstrap API key seeded");
    Ok(())
}
