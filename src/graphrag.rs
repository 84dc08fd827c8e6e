//! Client for the remote GraphRAG / reconciliation service.
//!
//! The heavy lifting (retrieval, entity extraction, answer synthesis)
//! happens in an external service reached over HTTP. This client wraps the
//! handful of endpoints the explorer needs: per-book query, reconciled query
//! against the currently visible nodes, the galaxy-view node/relationship
//! dumps, and a health probe.

use crate::models::{
    QueryMode, RemoteGraph, RemoteNode, RemoteQueryResponse, RemoteRelationship,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Answer synthesis can be slow; graph dumps are not.
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_NODE_LIMIT: usize = 300;
pub const DEFAULT_RELATIONSHIP_LIMIT: usize = 800;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum GraphRagError {
    /// Transport-level failure (connect, timeout, TLS).
    Transport(String),
    /// Non-success HTTP status from the backend.
    Status(u16),
    /// Response body did not decode as expected.
    Decode(String),
    /// Backend answered but reported a failure itself.
    Backend(String),
}

impl std::fmt::Display for GraphRagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphRagError::Transport(msg) => write!(f, "GraphRAG transport error: {}", msg),
            GraphRagError::Status(code) => write!(f, "GraphRAG backend returned HTTP {}", code),
            GraphRagError::Decode(msg) => write!(f, "GraphRAG response decode error: {}", msg),
            GraphRagError::Backend(msg) => write!(f, "GraphRAG backend error: {}", msg),
        }
    }
}

impl std::error::Error for GraphRagError {}

// ============================================================================
// Wire Wrappers
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct NodesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    nodes: Vec<RemoteNode>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RelationshipsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    relationships: Vec<RemoteRelationship>,
    #[serde(default)]
    filtered: bool,
    #[serde(default)]
    limit_applied: Option<usize>,
    #[serde(default)]
    error: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

pub struct Client {
    base_url: Url,
    http: reqwest::Client,
}

impl Client {
    /// `base_url` is assumed validated by `url_guard`. A missing trailing
    /// slash would make `Url::join` drop the last path segment, so one is
    /// appended here.
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, GraphRagError> {
        self.base_url
            .join(path)
            .map_err(|e| GraphRagError::Transport(e.to_string()))
    }

    /// Ask the backend a natural-language question about one book.
    pub async fn query(
        &self,
        book_id: Option<&str>,
        query: &str,
        mode: QueryMode,
    ) -> Result<RemoteQueryResponse, GraphRagError> {
        let url = self.endpoint("query")?;
        let mut body = serde_json::json!({
            "query": query,
            "mode": mode.as_str(),
        });
        if let Some(id) = book_id {
            body["book_id"] = serde_json::Value::String(id.to_string());
        }

        debug!(%url, book_id, "submitting GraphRAG query");
        let response = self
            .http
            .post(url)
            .timeout(QUERY_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphRagError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GraphRagError::Status(response.status().as_u16()));
        }

        let parsed: RemoteQueryResponse = response
            .json()
            .await
            .map_err(|e| GraphRagError::Decode(e.to_string()))?;

        if !parsed.success && parsed.answer_text().is_none() {
            return Err(GraphRagError::Backend(
                parsed
                    .error
                    .clone()
                    .unwrap_or_else(|| "backend reported failure".to_string()),
            ));
        }
        Ok(parsed)
    }

    /// Reconciled query: the backend restricts retrieval to the nodes the
    /// user currently has on screen.
    pub async fn reconciled_query(
        &self,
        query: &str,
        visible_node_ids: &[String],
        mode: QueryMode,
    ) -> Result<RemoteQueryResponse, GraphRagError> {
        let url = self.endpoint("query/reconciled")?;
        let body = serde_json::json!({
            "query": query,
            "visible_node_ids": visible_node_ids,
            "mode": mode.as_str(),
        });

        let response = self
            .http
            .post(url)
            .timeout(QUERY_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphRagError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GraphRagError::Status(response.status().as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| GraphRagError::Decode(e.to_string()))
    }

    async fn nodes(&self, limit: usize) -> Result<Vec<RemoteNode>, GraphRagError> {
        let url = self.endpoint("nodes")?;
        let response = self
            .http
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| GraphRagError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GraphRagError::Status(response.status().as_u16()));
        }
        let parsed: NodesResponse = response
            .json()
            .await
            .map_err(|e| GraphRagError::Decode(e.to_string()))?;
        if !parsed.success {
            return Err(GraphRagError::Backend(
                parsed.error.unwrap_or_else(|| "nodes fetch failed".to_string()),
            ));
        }
        Ok(parsed.nodes)
    }

    async fn relationships(
        &self,
        node_ids: &[String],
        limit: usize,
    ) -> Result<Vec<RemoteRelationship>, GraphRagError> {
        let url = self.endpoint("relationships")?;
        let body = serde_json::json!({
            "node_ids": node_ids,
            "limit": limit,
        });
        let response = self
            .http
            .post(url)
            .timeout(FETCH_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphRagError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GraphRagError::Status(response.status().as_u16()));
        }
        let parsed: RelationshipsResponse = response
            .json()
            .await
            .map_err(|e| GraphRagError::Decode(e.to_string()))?;
        if !parsed.success {
            return Err(GraphRagError::Backend(
                parsed
                    .error
                    .unwrap_or_else(|| "relationships fetch failed".to_string()),
            ));
        }
        if parsed.filtered {
            debug!(limit = ?parsed.limit_applied, "relationship list was truncated by the backend");
        }
        Ok(parsed.relationships)
    }

    /// The galaxy view: every node the backend will give us, plus the
    /// relationships among them.
    pub async fn remote_graph(&self, node_limit: usize) -> Result<RemoteGraph, GraphRagError> {
        let nodes = self.nodes(node_limit).await?;
        if nodes.is_empty() {
            return Ok(RemoteGraph::default());
        }
        let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let relationships = self
            .relationships(&ids, DEFAULT_RELATIONSHIP_LIMIT)
            .await?;
        debug!(
            nodes = nodes.len(),
            relationships = relationships.len(),
            "remote graph loaded"
        );
        Ok(RemoteGraph {
            nodes,
            relationships,
        })
    }

    pub async fn health(&self) -> bool {
        match self.endpoint("health") {
            Ok(url) => matches!(
                self.http
                    .get(url)
                    .timeout(Duration::from_secs(5))
                    .send()
                    .await,
                Ok(resp) if resp.status().is_success()
            ),
            Err(_) => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_a_trailing_slash() {
        let client = Client::new(Url::parse("https://rag.example.org/api/v1").unwrap());
        assert_eq!(
            client.endpoint("query").unwrap().as_str(),
            "https://rag.example.org/api/v1/query"
        );

        let client = Client::new(Url::parse("https://rag.example.org").unwrap());
        assert_eq!(
            client.endpoint("health").unwrap().as_str(),
            "https://rag.example.org/health"
        );
    }

    #[test]
    fn errors_format_for_logs() {
        assert_eq!(
            GraphRagError::Status(502).to_string(),
            "GraphRAG backend returned HTTP 502"
        );
        assert!(GraphRagError::Backend("boom".into())
            .to_string()
            .contains("boom"));
    }
}
