//! Search-path highlighting for the loaded graph.
//!
//! When the GraphRAG backend answers a query it returns the path it traversed
//! (entities and relations, in order). This module turns that path into
//! visual states on the graph: path members are highlighted (brightened,
//! enlarged), everything else is dimmed (darkened, shrunk), and the whole
//! overlay can be undone exactly.
//!
//! `GraphHighlighter` is a plain value owned by whoever holds the graph;
//! there is no shared instance. It never mutates its inputs; both operations
//! return fresh node/edge collections.

use crate::models::{EntityType, GraphEdge, GraphNode, SearchEntity, SearchPath, SearchRelation};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

// ============================================================================
// Palette
// ============================================================================

pub fn base_color(entity_type: EntityType) -> (u8, u8, u8) {
    match entity_type {
        EntityType::Person => (255, 107, 107),
        EntityType::Place => (78, 205, 196),
        EntityType::Event => (69, 183, 209),
        EntityType::Concept => (150, 206, 180),
        EntityType::Organization => (254, 202, 87),
        EntityType::Book => (255, 159, 243),
        EntityType::Other => (168, 168, 168),
    }
}

pub fn base_color_rgb(entity_type: EntityType) -> String {
    let (r, g, b) = base_color(entity_type);
    format!("rgb({}, {}, {})", r, g, b)
}

// ============================================================================
// Color Formulas
// ============================================================================

/// Color of a highlighted node: the type's base color brightened toward white
/// in proportion to the relevance score. The 0.2 floor keeps zero-score
/// entities visibly brighter than dimmed neighbors.
pub fn highlight_color(entity_type: EntityType, score: f64) -> String {
    let intensity = (score * 0.8 + 0.2).min(1.0);
    let (r, g, b) = base_color(entity_type);
    let lift = |c: u8| ((c as f64 + (255.0 - c as f64) * intensity * 0.3).floor()).min(255.0) as u8;
    format!("rgb({}, {}, {})", lift(r), lift(g), lift(b))
}

/// Score-scaled entity color used where no graph-synced color is available
/// (e.g. entity mentions inside answer text). Scales channel intensity and
/// adds a flat brightness boost.
pub fn intelligence_color(entity_type: EntityType, score: f64) -> String {
    let (r, g, b) = base_color(entity_type);
    let mult = 0.7 + score * 0.6;
    let boost = score * 50.0;
    let scale = |c: u8| ((c as f64 * mult + boost).floor()).min(255.0) as u8;
    format!("rgb({}, {}, {})", scale(r), scale(g), scale(b))
}

/// Muted version of a color for dimmed elements. Only `rgb(r, g, b)` strings
/// are understood; anything else passes through unchanged.
pub fn dimmed_color(color: &str) -> String {
    match parse_rgb(color) {
        Some((r, g, b)) => format!(
            "rgb({}, {}, {})",
            (r as f64 * 0.3).floor() as u8,
            (g as f64 * 0.3).floor() as u8,
            (b as f64 * 0.3).floor() as u8
        ),
        None => color.to_string(),
    }
}

fn parse_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let inner = color.trim().strip_prefix("rgb(")?.strip_suffix(')')?;
    let mut channels = inner.split(',').map(|p| p.trim().parse::<u8>().ok());
    let r = channels.next()??;
    let g = channels.next()??;
    let b = channels.next()??;
    if channels.next().is_some() {
        return None;
    }
    Some((r, g, b))
}

// ============================================================================
// Size Scaling
// ============================================================================

const HIGHLIGHT_SIZE_FACTOR: f64 = 1.5;
const HIGHLIGHT_SIZE_FLOOR: f64 = 12.0;
const DIM_SIZE_FACTOR: f64 = 0.7;
const DIM_SIZE_FLOOR: f64 = 4.0;

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightStats {
    pub highlighted_node_count: usize,
    pub highlighted_edge_count: usize,
    pub total_snapshotted_nodes: usize,
    pub total_snapshotted_edges: usize,
}

// ============================================================================
// Snapshots
// ============================================================================

#[derive(Debug, Clone)]
struct NodeSnapshot {
    color: String,
    size: f64,
}

#[derive(Debug, Clone)]
struct EdgeSnapshot {
    highlighted: bool,
    dimmed: bool,
}

// ============================================================================
// Highlighter
// ============================================================================

#[derive(Debug, Default)]
pub struct GraphHighlighter {
    node_snapshots: HashMap<String, NodeSnapshot>,
    edge_snapshots: HashMap<String, EdgeSnapshot>,
    highlighted_nodes: HashSet<String>,
    highlighted_edges: HashSet<String>,
}

impl GraphHighlighter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the pre-highlight visual attributes of every element, keyed
    /// by id. A repeat apply without an intervening clear overwrites the
    /// previous snapshot, so a later clear restores to the overwritten state
    /// rather than the pristine one. Known quirk, kept as observable behavior.
    fn store_snapshots(&mut self, nodes: &[GraphNode], edges: &[GraphEdge]) {
        for node in nodes {
            self.node_snapshots.insert(
                node.id.clone(),
                NodeSnapshot {
                    color: node.color.clone(),
                    size: node.size,
                },
            );
        }
        for edge in edges {
            self.edge_snapshots.insert(
                edge.id.clone(),
                EdgeSnapshot {
                    highlighted: edge.highlighted,
                    dimmed: edge.dimmed,
                },
            );
        }
    }

    /// Apply a search path as a visual overlay. Path entities are highlighted
    /// and stamped with their order/score; every other node is dimmed. An
    /// edge is highlighted when the path contains it in either direction, or
    /// when both of its endpoints are highlighted (incidental connection
    /// between retained entities); otherwise it is dimmed.
    ///
    /// Ids the loaded graph does not contain are skipped silently; the
    /// overlay just has fewer highlights.
    pub fn apply_search_path(
        &mut self,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
        path: &SearchPath,
    ) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        self.store_snapshots(nodes, edges);

        let entity_map: HashMap<&str, &SearchEntity> =
            path.entities.iter().map(|e| (e.id.as_str(), e)).collect();

        // Relation keys in both directions, so storage direction need not
        // match traversal direction.
        let mut relation_map: HashMap<String, &SearchRelation> = HashMap::new();
        for rel in &path.relations {
            relation_map.insert(format!("{}-{}", rel.source, rel.target), rel);
            relation_map.insert(format!("{}-{}", rel.target, rel.source), rel);
        }

        debug!(
            entities = path.entities.len(),
            relations = path.relations.len(),
            "applying search path overlay"
        );

        let mut out_nodes = Vec::with_capacity(nodes.len());
        for node in nodes {
            let mut n = node.clone();
            if let Some(entity) = entity_map.get(node.id.as_str()) {
                self.highlighted_nodes.insert(node.id.clone());
                n.highlighted = true;
                n.dimmed = false;
                n.search_order = Some(entity.order);
                n.search_score = Some(entity.score);
                n.color = highlight_color(node.entity_type, entity.score);
                n.size = (node.size * HIGHLIGHT_SIZE_FACTOR).max(HIGHLIGHT_SIZE_FLOOR);
            } else {
                n.highlighted = false;
                n.dimmed = true;
                n.color = dimmed_color(&node.color);
                n.size = (node.size * DIM_SIZE_FACTOR).max(DIM_SIZE_FLOOR);
            }
            out_nodes.push(n);
        }

        let mut out_edges = Vec::with_capacity(edges.len());
        for edge in edges {
            let mut e = edge.clone();
            let forward = format!("{}-{}", edge.source, edge.target);
            let reverse = format!("{}-{}", edge.target, edge.source);

            if let Some(rel) = relation_map
                .get(&forward)
                .or_else(|| relation_map.get(&reverse))
            {
                self.highlighted_edges.insert(edge.id.clone());
                e.highlighted = true;
                e.dimmed = false;
                e.traversal_order = Some(rel.traversal_order);
            } else if self.highlighted_nodes.contains(&edge.source)
                && self.highlighted_nodes.contains(&edge.target)
            {
                // Incidental connection: both endpoints retained by the
                // search even though this edge was not traversed.
                self.highlighted_edges.insert(edge.id.clone());
                e.highlighted = true;
                e.dimmed = false;
            } else {
                e.highlighted = false;
                e.dimmed = true;
            }
            out_edges.push(e);
        }

        debug!(
            nodes = self.highlighted_nodes.len(),
            edges = self.highlighted_edges.len(),
            "search path overlay applied"
        );

        (out_nodes, out_edges)
    }

    /// Undo the overlay. Elements with a snapshot get their color and size
    /// back exactly; elements without one (added since the last apply) only
    /// have their highlight flags and search stamps reset. All internal
    /// bookkeeping is cleared afterward, so the next apply starts clean.
    pub fn clear_highlight(
        &mut self,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        debug!("clearing search path overlay");

        let mut out_nodes = Vec::with_capacity(nodes.len());
        for node in nodes {
            let mut n = node.clone();
            if let Some(snap) = self.node_snapshots.get(&node.id) {
                n.color = snap.color.clone();
                n.size = snap.size;
            }
            n.highlighted = false;
            n.dimmed = false;
            n.search_order = None;
            n.search_score = None;
            out_nodes.push(n);
        }

        let mut out_edges = Vec::with_capacity(edges.len());
        for edge in edges {
            let mut e = edge.clone();
            // Edge snapshots only hold the flags, which are reset either way.
            e.highlighted = false;
            e.dimmed = false;
            e.traversal_order = None;
            out_edges.push(e);
        }

        self.node_snapshots.clear();
        self.edge_snapshots.clear();
        self.highlighted_nodes.clear();
        self.highlighted_edges.clear();

        (out_nodes, out_edges)
    }

    pub fn stats(&self) -> HighlightStats {
        HighlightStats {
            highlighted_node_count: self.highlighted_nodes.len(),
            highlighted_edge_count: self.highlighted_edges.len(),
            total_snapshotted_nodes: self.node_snapshots.len(),
            total_snapshotted_edges: self.edge_snapshots.len(),
        }
    }
}

#[cfg(test)]
#[path = "highlight_test.rs"]
mod highlight_test;
