//! Data models for the graph explorer.
//!
//! This module contains the core data structures used throughout the
//! application: the visual graph (nodes, edges), the search path returned by
//! the GraphRAG backend, the remote reconciliation wire shapes, and the
//! request/response types of our own HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::highlight::{base_color_rgb, HighlightStats};

// ============================================================================
// Entity Types
// ============================================================================

/// Entity categories of the knowledge graph. Display labels (and the wire
/// form) are the French plurals used by the corpus; parsing is tolerant of
/// the variants that show up in GraphML exports and backend payloads
/// (English singular, upper-case, quoted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Person,
    Place,
    Event,
    Concept,
    Organization,
    Book,
    Other,
}

impl EntityType {
    pub fn parse(label: &str) -> Self {
        let cleaned = label.trim().trim_matches('"').to_lowercase();
        match cleaned.as_str() {
            "personnes" | "personne" | "person" | "people" | "character" => EntityType::Person,
            "lieux" | "lieu" | "place" | "location" | "geo" => EntityType::Place,
            "événements" | "événement" | "evenements" | "evenement" | "event" => EntityType::Event,
            "concepts" | "concept" | "theme" | "thème" => EntityType::Concept,
            "organisations" | "organisation" | "organization" | "org" => EntityType::Organization,
            "livres" | "livre" | "book" => EntityType::Book,
            _ => EntityType::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Person => "Personnes",
            EntityType::Place => "Lieux",
            EntityType::Event => "Événements",
            EntityType::Concept => "Concepts",
            EntityType::Organization => "Organisations",
            EntityType::Book => "Livres",
            EntityType::Other => "Autres",
        }
    }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self {
        EntityType::parse(&s)
    }
}

impl From<EntityType> for String {
    fn from(t: EntityType) -> Self {
        t.label().to_string()
    }
}

impl Default for EntityType {
    fn default() -> Self {
        EntityType::Other
    }
}

// ============================================================================
// Visual Graph
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
    pub size: f64,
    pub visible: bool,
    /// Positions are owned by the client-side force simulation; they
    /// round-trip untouched when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    pub degree: usize,
    pub centrality_score: f64,
    #[serde(default)]
    pub highlighted: bool,
    #[serde(default)]
    pub dimmed: bool,
    #[serde(rename = "searchOrder", default, skip_serializing_if = "Option::is_none")]
    pub search_order: Option<u32>,
    #[serde(rename = "searchScore", default, skip_serializing_if = "Option::is_none")]
    pub search_score: Option<f64>,
}

/// Edge endpoints are always plain string node ids. Any other shape the wire
/// may carry (numeric ids, embedded node objects) is resolved at the loading
/// boundary, never inside the transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relation: String,
    pub weight: f64,
    #[serde(default)]
    pub highlighted: bool,
    #[serde(default)]
    pub dimmed: bool,
    #[serde(rename = "traversalOrder", default, skip_serializing_if = "Option::is_none")]
    pub traversal_order: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    #[serde(rename = "links")]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
}

impl GraphData {
    pub fn stats(&self) -> GraphStats {
        let total_nodes = self.nodes.len();
        let total_edges = self.edges.len();
        let total_degree: usize = self.nodes.iter().map(|n| n.degree).sum();
        let avg_degree = if total_nodes > 0 {
            total_degree as f64 / total_nodes as f64
        } else {
            0.0
        };
        let max_degree = self.nodes.iter().map(|n| n.degree).max().unwrap_or(0);
        GraphStats {
            total_nodes,
            total_edges,
            avg_degree,
            max_degree,
        }
    }
}

// ============================================================================
// Node Sizing
// ============================================================================

pub const NODE_BASE_SIZE: f64 = 6.0;
pub const NODE_MAX_SIZE: f64 = 24.0;

/// Visual weight of a node from its connectivity. Applied once at the loading
/// boundary; the highlighter later scales whatever this produced.
pub fn node_size(degree: usize, centrality_score: f64) -> f64 {
    (NODE_BASE_SIZE + (degree as f64).sqrt() * 2.0 + centrality_score * 4.0).min(NODE_MAX_SIZE)
}

// ============================================================================
// Search Path
// ============================================================================

/// Ordered record of the entities and relations the backend traversed to
/// answer a query. Ids that do not exist in the loaded graph are tolerated
/// everywhere and simply never highlighted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPath {
    #[serde(default)]
    pub entities: Vec<SearchEntity>,
    #[serde(default)]
    pub relations: Vec<SearchRelation>,
    #[serde(default)]
    pub communities: Vec<CommunityRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntity {
    pub id: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub order: u32,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRelation {
    pub source: String,
    pub target: String,
    #[serde(rename = "traversalOrder", default)]
    pub traversal_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityRef {
    pub id: String,
    #[serde(default)]
    pub relevance: f64,
}

impl SearchPath {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

// ============================================================================
// Remote Reconciliation Wire Shapes
// ============================================================================

/// Node as served by the reconciliation service (Neo4j-flavored).
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteNode {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub degree: usize,
    #[serde(default)]
    pub centrality_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRelationship {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub rel_type: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteGraph {
    #[serde(default)]
    pub nodes: Vec<RemoteNode>,
    #[serde(default)]
    pub relationships: Vec<RemoteRelationship>,
}

fn property_str(props: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    props.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

impl RemoteGraph {
    /// Normalize the Neo4j-flavored payload into the visual graph model:
    /// string ids everywhere, palette color from the entity type, size from
    /// connectivity. This is the single place remote shapes are resolved.
    pub fn normalize(self) -> GraphData {
        let nodes = self
            .nodes
            .into_iter()
            .map(|n| {
                let entity_type = property_str(&n.properties, "entity_type")
                    .or_else(|| n.labels.first().cloned())
                    .map(|t| EntityType::parse(&t))
                    .unwrap_or_default();
                let label = property_str(&n.properties, "name")
                    .or_else(|| property_str(&n.properties, "label"))
                    .unwrap_or_else(|| prettify_id(&n.id));
                GraphNode {
                    label,
                    entity_type,
                    description: property_str(&n.properties, "description"),
                    color: base_color_rgb(entity_type),
                    size: node_size(n.degree, n.centrality_score),
                    visible: true,
                    x: None,
                    y: None,
                    degree: n.degree,
                    centrality_score: n.centrality_score,
                    highlighted: false,
                    dimmed: false,
                    search_order: None,
                    search_score: None,
                    id: n.id,
                }
            })
            .collect();

        let edges = self
            .relationships
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let weight = r
                    .properties
                    .get("weight")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.5);
                let relation = property_str(&r.properties, "description").unwrap_or(r.rel_type);
                GraphEdge {
                    id: if r.id.is_empty() {
                        format!("{}-{}-{}", r.source, r.target, i)
                    } else {
                        r.id
                    },
                    source: r.source,
                    target: r.target,
                    relation,
                    weight,
                    highlighted: false,
                    dimmed: false,
                    traversal_order: None,
                }
            })
            .collect();

        GraphData { nodes, edges }
    }
}

/// "la_vallee_sans_hommes" → "La Vallee Sans Hommes"
pub fn prettify_id(id: &str) -> String {
    id.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Library Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

// ============================================================================
// Query Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Local,
    Global,
}

impl Default for QueryMode {
    fn default() -> Self {
        QueryMode::Local
    }
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Local => "local",
            QueryMode::Global => "global",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub book_id: Option<String>,
    #[serde(default)]
    pub mode: Option<QueryMode>,
}

/// Raw response of the remote GraphRAG service. Older deployments put the
/// answer under `result`; both are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteQueryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(rename = "searchPath", alias = "search_path", default)]
    pub search_path: Option<SearchPath>,
    #[serde(default)]
    pub context: Option<QueryContext>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RemoteQueryResponse {
    pub fn answer_text(&self) -> Option<&str> {
        self.answer.as_deref().or(self.result.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default)]
    pub visible_nodes_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// What our own `/api/query` route returns: the answer in raw and annotated
/// form, the search path, and the session graph with highlight states applied.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub query: String,
    pub answer: String,
    pub answer_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_path: Option<SearchPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<QueryContext>,
    pub nodes: Vec<GraphNode>,
    #[serde(rename = "links")]
    pub edges: Vec<GraphEdge>,
    pub stats: HighlightStats,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
