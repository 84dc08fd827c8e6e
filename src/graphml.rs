//! GraphML ingestion.
//!
//! Book graphs arrive as GraphML exports (one
//! `graph_chunk_entity_relation.graphml` per book). This module parses them
//! into the visual graph model: node attributes carry the entity type and a
//! description, edge attributes carry the relation description and a weight.
//! Key declarations are honored when present; the conventional d0–d3 ids are
//! accepted as a fallback for exports that omit them.

use crate::highlight::base_color_rgb;
use crate::models::{node_size, prettify_id, EntityType, GraphData, GraphEdge, GraphNode};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone)]
pub enum GraphmlError {
    /// The document is not well-formed XML.
    Xml(String),
    /// Parsed fine but contained no nodes at all.
    EmptyGraph,
}

impl std::fmt::Display for GraphmlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphmlError::Xml(msg) => write!(f, "Invalid GraphML: {}", msg),
            GraphmlError::EmptyGraph => write!(f, "GraphML document contains no nodes"),
        }
    }
}

impl std::error::Error for GraphmlError {}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Default)]
struct RawNode {
    id: String,
    entity_type: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default)]
struct RawEdge {
    source: String,
    target: String,
    relation: Option<String>,
    weight: Option<f64>,
}

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Resolve a `<data key="…">` to the attribute it carries, preferring the
/// document's own `<key>` declarations over the conventional ids.
fn data_field<'a>(keys: &'a HashMap<String, String>, key: &'a str) -> &'a str {
    match keys.get(key).map(|s| s.as_str()) {
        Some(name) => name,
        None => match key {
            "d0" => "entity_type",
            "d1" => "description",
            "d2" => "description",
            "d3" => "weight",
            other => other,
        },
    }
}

pub fn parse_graphml(content: &str) -> Result<GraphData, GraphmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // key id → declared attr.name
    let mut keys: HashMap<String, String> = HashMap::new();

    let mut nodes: Vec<RawNode> = Vec::new();
    let mut edges: Vec<RawEdge> = Vec::new();
    let mut current_node: Option<RawNode> = None;
    let mut current_edge: Option<RawEdge> = None;
    let mut current_data_key: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"key" => {
                    if let (Some(id), Some(name)) = (attr(e, "id"), attr(e, "attr.name")) {
                        keys.insert(id, name);
                    }
                }
                b"node" => {
                    current_node = Some(RawNode {
                        id: attr(e, "id").unwrap_or_default(),
                        ..Default::default()
                    });
                }
                b"edge" => {
                    current_edge = Some(RawEdge {
                        source: attr(e, "source").unwrap_or_default(),
                        target: attr(e, "target").unwrap_or_default(),
                        ..Default::default()
                    });
                }
                b"data" => {
                    current_data_key = attr(e, "key");
                }
                _ => {}
            },
            // Self-closing elements never see a matching End event.
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"key" => {
                    if let (Some(id), Some(name)) = (attr(e, "id"), attr(e, "attr.name")) {
                        keys.insert(id, name);
                    }
                }
                b"node" => {
                    if let Some(id) = attr(e, "id") {
                        if !id.is_empty() {
                            nodes.push(RawNode {
                                id,
                                ..Default::default()
                            });
                        }
                    }
                }
                b"edge" => {
                    let (source, target) = (
                        attr(e, "source").unwrap_or_default(),
                        attr(e, "target").unwrap_or_default(),
                    );
                    if !source.is_empty() && !target.is_empty() {
                        edges.push(RawEdge {
                            source,
                            target,
                            ..Default::default()
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref t)) => {
                let text = t
                    .unescape()
                    .map_err(|err| GraphmlError::Xml(err.to_string()))?
                    .into_owned();
                if let Some(ref key) = current_data_key {
                    let field = data_field(&keys, key);
                    if let Some(ref mut node) = current_node {
                        match field {
                            "entity_type" => node.entity_type = Some(text),
                            "description" => node.description = Some(text),
                            _ => {}
                        }
                    } else if let Some(ref mut edge) = current_edge {
                        match field {
                            "description" => edge.relation = Some(text),
                            "weight" => edge.weight = text.trim().parse().ok(),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"node" => {
                    if let Some(node) = current_node.take() {
                        if !node.id.is_empty() {
                            nodes.push(node);
                        }
                    }
                }
                b"edge" => {
                    if let Some(edge) = current_edge.take() {
                        if !edge.source.is_empty() && !edge.target.is_empty() {
                            edges.push(edge);
                        }
                    }
                }
                b"data" => {
                    current_data_key = None;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(GraphmlError::Xml(err.to_string())),
        }
    }

    if nodes.is_empty() {
        return Err(GraphmlError::EmptyGraph);
    }

    Ok(build_graph(nodes, edges))
}

/// Assemble the visual graph: degrees from edge incidence, palette colors,
/// connectivity-based sizes, prettified labels.
fn build_graph(raw_nodes: Vec<RawNode>, raw_edges: Vec<RawEdge>) -> GraphData {
    let mut degrees: HashMap<&str, usize> = HashMap::new();
    for edge in &raw_edges {
        *degrees.entry(edge.source.as_str()).or_insert(0) += 1;
        *degrees.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    let nodes: Vec<GraphNode> = raw_nodes
        .iter()
        .map(|raw| {
            let entity_type = raw
                .entity_type
                .as_deref()
                .map(EntityType::parse)
                .unwrap_or_default();
            let degree = *degrees.get(raw.id.as_str()).unwrap_or(&0);
            GraphNode {
                id: raw.id.clone(),
                label: prettify_id(&raw.id),
                entity_type,
                description: raw.description.clone(),
                color: base_color_rgb(entity_type),
                size: node_size(degree, 0.0),
                visible: true,
                x: None,
                y: None,
                degree,
                centrality_score: 0.0,
                highlighted: false,
                dimmed: false,
                search_order: None,
                search_score: None,
            }
        })
        .collect();

    let edges: Vec<GraphEdge> = raw_edges
        .into_iter()
        .enumerate()
        .map(|(i, raw)| GraphEdge {
            id: format!("{}-{}-{}", raw.source, raw.target, i),
            source: raw.source,
            target: raw.target,
            relation: raw.relation.unwrap_or_else(|| "lié à".to_string()),
            weight: raw.weight.unwrap_or(0.5),
            highlighted: false,
            dimmed: false,
            traversal_order: None,
        })
        .collect();

    GraphData { nodes, edges }
}

// ============================================================================
// Sample Graph
// ============================================================================

/// Built-in stand-in served when a book has no parseable GraphML, so the
/// explorer always has something to draw.
pub fn sample_graph() -> GraphData {
    let raw_nodes = vec![
        RawNode {
            id: "protagoniste".to_string(),
            entity_type: Some("Personnes".to_string()),
            description: Some("Personnage principal du livre".to_string()),
        },
        RawNode {
            id: "lieu_principal".to_string(),
            entity_type: Some("Lieux".to_string()),
            description: Some("Lieu central de l'action".to_string()),
        },
        RawNode {
            id: "theme_central".to_string(),
            entity_type: Some("Concepts".to_string()),
            description: Some("Thème principal de l'œuvre".to_string()),
        },
        RawNode {
            id: "antagoniste".to_string(),
            entity_type: Some("Personnes".to_string()),
            description: Some("Force d'opposition".to_string()),
        },
        RawNode {
            id: "symbole".to_string(),
            entity_type: Some("Concepts".to_string()),
            description: Some("Élément symbolique important".to_string()),
        },
    ];
    let raw_edges = vec![
        RawEdge {
            source: "protagoniste".to_string(),
            target: "lieu_principal".to_string(),
            relation: Some("se trouve dans".to_string()),
            weight: Some(0.8),
        },
        RawEdge {
            source: "protagoniste".to_string(),
            target: "theme_central".to_string(),
            relation: Some("explore".to_string()),
            weight: Some(0.9),
        },
        RawEdge {
            source: "protagoniste".to_string(),
            target: "antagoniste".to_string(),
            relation: Some("affronte".to_string()),
            weight: Some(0.7),
        },
        RawEdge {
            source: "theme_central".to_string(),
            target: "symbole".to_string(),
            relation: Some("symbolisé par".to_string()),
            weight: Some(0.6),
        },
    ];
    build_graph(raw_nodes, raw_edges)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <key id="d0" for="node" attr.name="entity_type" attr.type="string"/>
  <key id="d1" for="node" attr.name="description" attr.type="string"/>
  <key id="d2" for="edge" attr.name="description" attr.type="string"/>
  <key id="d3" for="edge" attr.name="weight" attr.type="double"/>
  <graph edgedefault="undirected">
    <node id="jean_valjean">
      <data key="d0">"PERSON"</data>
      <data key="d1">Ancien forçat devenu maire</data>
    </node>
    <node id="paris">
      <data key="d0">Lieux</data>
      <data key="d1">Capitale où se noue l'intrigue</data>
    </node>
    <node id="redemption">
      <data key="d0">Concepts</data>
    </node>
    <edge source="jean_valjean" target="paris">
      <data key="d2">s'installe à</data>
      <data key="d3">0.9</data>
    </edge>
    <edge source="jean_valjean" target="redemption">
      <data key="d2">incarne</data>
    </edge>
  </graph>
</graphml>"#;

    #[test]
    fn parses_nodes_with_types_and_descriptions() {
        let graph = parse_graphml(FIXTURE).unwrap();
        assert_eq!(graph.nodes.len(), 3);

        let valjean = &graph.nodes[0];
        assert_eq!(valjean.id, "jean_valjean");
        assert_eq!(valjean.label, "Jean Valjean");
        assert_eq!(valjean.entity_type, EntityType::Person);
        assert_eq!(
            valjean.description.as_deref(),
            Some("Ancien forçat devenu maire")
        );
        assert_eq!(valjean.color, base_color_rgb(EntityType::Person));
        assert_eq!(valjean.degree, 2);

        let paris = &graph.nodes[1];
        assert_eq!(paris.entity_type, EntityType::Place);
        assert_eq!(paris.degree, 1);
    }

    #[test]
    fn parses_edges_with_relation_and_weight() {
        let graph = parse_graphml(FIXTURE).unwrap();
        assert_eq!(graph.edges.len(), 2);

        let first = &graph.edges[0];
        assert_eq!(first.source, "jean_valjean");
        assert_eq!(first.target, "paris");
        assert_eq!(first.relation, "s'installe à");
        assert_eq!(first.weight, 0.9);

        // Missing weight falls back to the neutral default.
        assert_eq!(graph.edges[1].weight, 0.5);
        assert_eq!(graph.edges[1].relation, "incarne");
    }

    #[test]
    fn conventional_key_ids_work_without_declarations() {
        let xml = r#"<graphml><graph>
            <node id="a"><data key="d0">Personnes</data></node>
            <node id="b"/>
            <edge source="a" target="b"><data key="d3">0.25</data></edge>
        </graph></graphml>"#;
        let graph = parse_graphml(xml).unwrap();
        assert_eq!(graph.nodes[0].entity_type, EntityType::Person);
        assert_eq!(graph.nodes[1].entity_type, EntityType::Other);
        assert_eq!(graph.edges[0].weight, 0.25);
    }

    #[test]
    fn unparseable_weight_falls_back() {
        let xml = r#"<graphml><graph>
            <node id="a"/><node id="b"/>
            <edge source="a" target="b"><data key="d3">lourd</data></edge>
        </graph></graphml>"#;
        let graph = parse_graphml(xml).unwrap();
        assert_eq!(graph.edges[0].weight, 0.5);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_graphml("<graphml><node id="),
            Err(GraphmlError::Xml(_))
        ));
    }

    #[test]
    fn empty_document_is_an_error() {
        assert!(matches!(
            parse_graphml("<graphml><graph></graph></graphml>"),
            Err(GraphmlError::EmptyGraph)
        ));
    }

    #[test]
    fn sample_graph_is_consistent() {
        let graph = sample_graph();
        assert_eq!(graph.nodes.len(), 5);
        assert_eq!(graph.edges.len(), 4);

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &graph.edges {
            assert!(ids.contains(&edge.source.as_str()));
            assert!(ids.contains(&edge.target.as_str()));
        }
        assert_eq!(graph.nodes[0].entity_type, EntityType::Person);
        assert!(graph.nodes.iter().all(|n| n.size >= 6.0));
    }
}
