//! HTTP route handlers for the explorer.
//!
//! The session model is deliberately simple: one graph is "loaded" at a time
//! (a book's GraphML or the remote galaxy view) and owns a highlighter.
//! Queries are proxied to the GraphRAG backend, the returned search path is
//! applied to the session graph, and the annotated answer plus the updated
//! graph travel back in one response. Concurrent callers are not a supported
//! scenario: the last caller wins, matching the single-screen UI.

use crate::annotate::{self, EntityRef};
use crate::graphml;
use crate::graphrag::{self, GraphRagError};
use crate::highlight::GraphHighlighter;
use crate::library;
use crate::models::{EntityType, GraphData, GraphNode, QueryOutcome, QueryRequest, SearchPath};
use crate::store;
use crate::templates;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Fallback answer when the backend is unreachable or misbehaves (the UI
/// shows it verbatim, so it is user-facing French, not an error dump).
const FALLBACK_ANSWER: &str =
    "Désolé, une erreur s'est produite lors du traitement de votre question. Veuillez réessayer.";
const EMPTY_ANSWER: &str = "Pas de réponse disponible";

// ============================================================================
// Pages
// ============================================================================

pub async fn index() -> Html<String> {
    Html(templates::explorer_page())
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let backend = match &state.client {
        Some(client) => client.health().await,
        None => false,
    };
    Json(json!({ "status": "ok", "backend_reachable": backend }))
}

// ============================================================================
// Library
// ============================================================================

pub async fn api_books(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let books = library::available_books(&state.data_dir);
    Json(json!({ "books": books }))
}

pub async fn api_book_graph(
    Path(book_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let graph = match store::load_graph(&state.db, &state.data_dir, &book_id) {
        Ok(Some(graph)) => graph,
        Ok(None) => {
            warn!(%book_id, "no graph data for book, serving sample graph");
            graphml::sample_graph()
        }
        Err(e) => {
            warn!(%book_id, error = %e, "failed to load book graph, serving sample graph");
            graphml::sample_graph()
        }
    };

    let stats = graph.stats();
    {
        let mut session = state.session.lock().expect("session lock");
        session.graph = Some(graph.clone());
        session.highlighter = GraphHighlighter::new();
        session.source = Some(book_id.clone());
    }

    Json(json!({
        "book_id": book_id,
        "nodes": graph.nodes,
        "links": graph.edges,
        "stats": stats,
    }))
    .into_response()
}

// ============================================================================
// Remote Galaxy View
// ============================================================================

#[derive(Deserialize)]
pub struct RemoteGraphParams {
    pub limit: Option<usize>,
}

pub async fn api_remote_graph(
    Query(params): Query<RemoteGraphParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let client = match &state.client {
        Some(client) => client,
        None => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "GraphRAG backend is not configured",
            );
        }
    };

    let limit = params.limit.unwrap_or(graphrag::DEFAULT_NODE_LIMIT);
    let remote = match client.remote_graph(limit).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!(error = %e, "failed to load remote graph");
            return error_response(StatusCode::BAD_GATEWAY, &e.to_string());
        }
    };

    let graph = remote.normalize();
    let stats = graph.stats();
    {
        let mut session = state.session.lock().expect("session lock");
        session.graph = Some(graph.clone());
        session.highlighter = GraphHighlighter::new();
        session.source = None;
    }

    Json(json!({
        "nodes": graph.nodes,
        "links": graph.edges,
        "stats": stats,
    }))
    .into_response()
}

// ============================================================================
// Query
// ============================================================================

pub async fn api_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "query is required");
    }
    let mode = request.mode.unwrap_or_default();

    // Snapshot what the backend call needs, then release the lock: the
    // session mutex must never be held across an await.
    let (source, visible_ids) = {
        let session = state.session.lock().expect("session lock");
        let source = request.book_id.clone().or_else(|| session.source.clone());
        let visible: Vec<String> = session
            .graph
            .as_ref()
            .map(|g| {
                g.nodes
                    .iter()
                    .filter(|n| n.visible)
                    .map(|n| n.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        (source, visible)
    };

    let remote = match &state.client {
        Some(client) => match source.as_deref() {
            Some(book_id) => client.query(Some(book_id), &query, mode).await,
            None => client.reconciled_query(&query, &visible_ids, mode).await,
        },
        None => Err(GraphRagError::Transport(
            "GraphRAG backend is not configured".to_string(),
        )),
    };

    let (answer, search_path, context, error) = match remote {
        Ok(response) => {
            let answer = response
                .answer_text()
                .unwrap_or(EMPTY_ANSWER)
                .to_string();
            (answer, response.search_path, response.context, None)
        }
        Err(e) => {
            warn!(error = %e, "GraphRAG query failed");
            (FALLBACK_ANSWER.to_string(), None, None, Some(e.to_string()))
        }
    };

    // Apply the overlay and collect the graph to return. The graph is taken
    // out of the session so the highlighter can be borrowed mutably.
    let mut session = state.session.lock().expect("session lock");
    let (nodes, edges) = match (session.graph.take(), &search_path) {
        (Some(graph), Some(path)) if !path.is_empty() => {
            let (nodes, edges) =
                session
                    .highlighter
                    .apply_search_path(&graph.nodes, &graph.edges, path);
            session.graph = Some(GraphData {
                nodes: nodes.clone(),
                edges: edges.clone(),
            });
            (nodes, edges)
        }
        (Some(graph), _) => {
            let result = (graph.nodes.clone(), graph.edges.clone());
            session.graph = Some(graph);
            result
        }
        (None, _) => (Vec::new(), Vec::new()),
    };
    let stats = session.highlighter.stats();
    drop(session);

    let entities = search_path
        .as_ref()
        .map(|path| entity_refs_from_path(path, &nodes))
        .unwrap_or_default();
    let answer_html = annotate::render_answer(&answer, entities);

    Json(QueryOutcome {
        query,
        answer,
        answer_html,
        search_path,
        context,
        nodes,
        edges,
        stats,
        timestamp: Utc::now(),
        error,
    })
    .into_response()
}

/// Entities the annotator should look for in the answer, colors synced with
/// the (already highlighted) graph nodes. Path entities missing from the
/// graph still participate, with the score-based fallback color.
pub fn entity_refs_from_path(path: &SearchPath, nodes: &[GraphNode]) -> Vec<EntityRef> {
    path.entities
        .iter()
        .map(|entity| {
            let node = nodes.iter().find(|n| n.id == entity.id);
            EntityRef {
                id: entity.id.clone(),
                entity_type: node.map(|n| n.entity_type).unwrap_or_else(|| {
                    entity
                        .entity_type
                        .as_deref()
                        .map(EntityType::parse)
                        .unwrap_or_default()
                }),
                color: node.map(|n| n.color.clone()),
                score: entity.score,
                description: entity
                    .description
                    .clone()
                    .or_else(|| node.and_then(|n| n.description.clone())),
            }
        })
        .collect()
}

// ============================================================================
// Highlight Control
// ============================================================================

pub async fn api_clear(State(state): State<Arc<AppState>>) -> Response {
    let mut session = state.session.lock().expect("session lock");
    let (nodes, edges) = match session.graph.take() {
        Some(graph) => {
            let (nodes, edges) = session
                .highlighter
                .clear_highlight(&graph.nodes, &graph.edges);
            session.graph = Some(GraphData {
                nodes: nodes.clone(),
                edges: edges.clone(),
            });
            (nodes, edges)
        }
        None => (Vec::new(), Vec::new()),
    };
    let stats = session.highlighter.stats();
    drop(session);

    Json(json!({
        "nodes": nodes,
        "links": edges,
        "stats": stats,
    }))
    .into_response()
}

pub async fn api_stats(State(state): State<Arc<AppState>>) -> Response {
    let session = state.session.lock().expect("session lock");
    Json(session.highlighter.stats()).into_response()
}

// ============================================================================
// Helpers
// ============================================================================

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::base_color_rgb;
    use crate::models::{SearchEntity, SearchPath};

    fn node(id: &str, entity_type: EntityType) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            label: id.to_string(),
            entity_type,
            description: Some(format!("description de {}", id)),
            color: base_color_rgb(entity_type),
            size: 8.0,
            visible: true,
            x: None,
            y: None,
            degree: 1,
            centrality_score: 0.0,
            highlighted: false,
            dimmed: false,
            search_order: None,
            search_score: None,
        }
    }

    #[test]
    fn entity_refs_sync_colors_from_graph_nodes() {
        let nodes = vec![node("cosette", EntityType::Person)];
        let path = SearchPath {
            entities: vec![SearchEntity {
                id: "cosette".to_string(),
                score: 0.7,
                order: 0,
                entity_type: None,
                description: None,
            }],
            relations: vec![],
            communities: vec![],
        };

        let refs = entity_refs_from_path(&path, &nodes);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].entity_type, EntityType::Person);
        assert_eq!(refs[0].color.as_deref(), Some("rgb(255, 107, 107)"));
        assert_eq!(refs[0].description.as_deref(), Some("description de cosette"));
    }

    #[test]
    fn entity_refs_fall_back_for_unknown_ids() {
        let path = SearchPath {
            entities: vec![SearchEntity {
                id: "fantine".to_string(),
                score: 0.4,
                order: 1,
                entity_type: Some("Personnes".to_string()),
                description: Some("mentionnée par le backend".to_string()),
            }],
            relations: vec![],
            communities: vec![],
        };

        let refs = entity_refs_from_path(&path, &[]);
        assert_eq!(refs[0].entity_type, EntityType::Person);
        assert_eq!(refs[0].color, None);
        assert_eq!(
            refs[0].description.as_deref(),
            Some("mentionnée par le backend")
        );
    }
}
