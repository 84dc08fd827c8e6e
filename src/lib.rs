//! Babel, an interactive knowledge-graph explorer.
//!
//! The server ingests per-book GraphML knowledge graphs, proxies
//! natural-language queries to a remote GraphRAG backend, and turns the
//! search path the backend returns into a highlight/dim overlay on the
//! loaded graph. The application is organized into the following modules:
//!
//! - `models`: graph, search-path, and wire data structures
//! - `highlight`: the search-path highlight state transformer
//! - `annotate`: entity highlighting inside answer text
//! - `graphml`: GraphML ingestion
//! - `library`: the on-disk book catalog
//! - `store`: sled-backed cache of parsed graphs
//! - `graphrag`: client for the remote GraphRAG/reconciliation service
//! - `url_guard`: backend URL validation
//! - `handlers`: HTTP route handlers
//! - `templates`: the explorer page

use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

pub mod annotate;
pub mod graphml;
pub mod graphrag;
pub mod handlers;
pub mod highlight;
pub mod library;
pub mod models;
pub mod store;
pub mod templates;
pub mod url_guard;

// ============================================================================
// Configuration
// ============================================================================

pub const DEFAULT_DATA_DIR: &str = "library";
pub const DB_PATH: &str = ".babel_db";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

pub const DATA_DIR_ENV: &str = "BABEL_DATA_DIR";
pub const BIND_ENV: &str = "BABEL_BIND";
pub const GRAPHRAG_URL_ENV: &str = "GRAPHRAG_API_URL";
pub const ALLOW_PRIVATE_BACKEND_ENV: &str = "BABEL_ALLOW_PRIVATE_BACKEND";

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

// ============================================================================
// Session
// ============================================================================

/// The graph currently on screen and its highlighter. One per server: the
/// explorer is a single-screen tool, and the last caller wins by design.
#[derive(Default)]
pub struct SessionGraph {
    pub graph: Option<GraphData>,
    pub highlighter: GraphHighlighter,
    /// Book id when a book graph is loaded; `None` for the galaxy view.
    pub source: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

pub struct AppState {
    pub data_dir: PathBuf,
    pub db: sled::Db,
    pub client: Option<graphrag::Client>,
    pub session: Mutex<SessionGraph>,
}

impl AppState {
    pub fn new() -> Self {
        let data_dir = PathBuf::from(
            std::env::var(DATA_DIR_ENV).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
        );
        std::fs::create_dir_all(&data_dir).ok();

        let db = sled::open(DB_PATH).expect("Failed to open database");

        let client = match std::env::var(GRAPHRAG_URL_ENV) {
            Ok(raw) => {
                let allow_private = env_flag(ALLOW_PRIVATE_BACKEND_ENV);
                match url_guard::validate_backend_url(&raw, allow_private) {
                    Ok(url) => Some(graphrag::Client::new(url)),
                    Err(e) => {
                        warn!(url = %raw, error = %e, "rejecting configured GraphRAG backend");
                        None
                    }
                }
            }
            Err(_) => None,
        };

        Self::with_parts(data_dir, db, client)
    }

    /// Assemble state from explicit parts (tests construct it this way).
    pub fn with_parts(
        data_dir: PathBuf,
        db: sled::Db,
        client: Option<graphrag::Client>,
    ) -> Self {
        Self {
            data_dir,
            db,
            client,
            session: Mutex::new(SessionGraph::default()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// Re-export commonly used types
pub use annotate::{render_answer, EntityMatcher, EntityRef};
pub use graphml::{parse_graphml, sample_graph, GraphmlError};
pub use graphrag::GraphRagError;
pub use highlight::{
    base_color, base_color_rgb, dimmed_color, highlight_color, intelligence_color,
    GraphHighlighter, HighlightStats,
};
pub use library::{available_books, graphml_path, is_valid_book_id};
pub use models::{
    Book, CommunityRef, EntityType, GraphData, GraphEdge, GraphNode, GraphStats, QueryMode,
    QueryOutcome, QueryRequest, RemoteGraph, SearchEntity, SearchPath, SearchRelation,
};
pub use store::{load_graph, reconcile, ReconcileStats};
pub use url_guard::{validate_backend_url, UrlGuardError};
