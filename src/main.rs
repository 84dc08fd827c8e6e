//! Babel: knowledge-graph explorer web server.
//!
//! This is the main entry point: it warms the graph cache, assembles the
//! router, and serves the explorer.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use babel::{handlers, library, store, AppState, BIND_ENV, DEFAULT_BIND};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("babel=info")),
        )
        .init();

    let state = Arc::new(AppState::new());

    // Warm the parsed-graph cache before serving.
    match store::reconcile(&state.db, &state.data_dir) {
        Ok(stats) => info!(
            parsed = stats.parsed,
            unchanged = stats.unchanged,
            removed = stats.removed,
            failed = stats.failed,
            "graph cache reconciled"
        ),
        Err(e) => warn!(error = %e, "graph cache reconcile failed"),
    }

    let books = library::available_books(&state.data_dir);
    info!(
        count = books.len(),
        data_dir = %state.data_dir.display(),
        "library scanned"
    );
    for book in &books {
        info!(id = %book.id, title = %book.title, "book available");
    }
    if state.client.is_some() {
        info!("GraphRAG backend configured");
    } else {
        info!("GraphRAG backend not configured; queries will return a fallback answer");
    }

    let app = Router::new()
        // Explorer page
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        // Library
        .route("/api/books", get(handlers::api_books))
        .route("/api/books/{book_id}/graph", get(handlers::api_book_graph))
        .route("/api/graph/remote", get(handlers::api_remote_graph))
        // Query & highlighting
        .route("/api/query", post(handlers::api_query))
        .route("/api/highlight/clear", post(handlers::api_clear))
        .route("/api/highlight/stats", get(handlers::api_stats))
        .with_state(state);

    let bind = std::env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .expect("Failed to bind server address");

    info!(address = %bind, "explorer running");

    axum::serve(listener, app).await.expect("Server error");
}
