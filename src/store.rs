//! Sled-backed cache of parsed book graphs.
//!
//! GraphML exports run to megabytes and the explorer reloads graphs on every
//! book switch, so parses are cached in a sled tree keyed by book id together
//! with a hash of the source file. A cached row is served as long as the file
//! on disk still hashes the same; `reconcile` warms the cache for the whole
//! library at startup and drops rows whose book vanished.

use crate::graphml;
use crate::library;
use crate::models::GraphData;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const GRAPHS_TREE: &str = "graphs";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CachedGraph {
    content_hash: String,
    graph: GraphData,
}

#[derive(Debug, Default)]
pub struct ReconcileStats {
    pub parsed: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub failed: usize,
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Loading
// ============================================================================

/// Load a book's graph, from cache when fresh, re-parsing when the GraphML
/// file changed. `Ok(None)` means the book has no data file at all.
pub fn load_graph(
    db: &sled::Db,
    data_dir: &Path,
    book_id: &str,
) -> Result<Option<GraphData>, String> {
    let path = match library::graphml_path(data_dir, book_id) {
        Some(p) => p,
        None => return Ok(None),
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    let hash = content_hash(&content);

    let tree = db.open_tree(GRAPHS_TREE).map_err(|e| e.to_string())?;
    if let Ok(Some(data)) = tree.get(book_id.as_bytes()) {
        if let Ok(cached) = serde_json::from_slice::<CachedGraph>(&data) {
            if cached.content_hash == hash {
                debug!(book_id, "graph served from cache");
                return Ok(Some(cached.graph));
            }
        }
    }

    let graph = graphml::parse_graphml(&content).map_err(|e| e.to_string())?;
    let row = CachedGraph {
        content_hash: hash,
        graph,
    };
    let json = serde_json::to_vec(&row).map_err(|e| e.to_string())?;
    tree.insert(book_id.as_bytes(), json)
        .map_err(|e| e.to_string())?;
    debug!(book_id, nodes = row.graph.nodes.len(), "graph parsed and cached");

    Ok(Some(row.graph))
}

// ============================================================================
// Reconcile
// ============================================================================

/// Warm the cache for every available book and drop rows for books that no
/// longer exist on disk. Parsing runs in parallel; sled writes stay
/// sequential.
pub fn reconcile(db: &sled::Db, data_dir: &Path) -> Result<ReconcileStats, String> {
    use rayon::prelude::*;

    let tree = db.open_tree(GRAPHS_TREE).map_err(|e| e.to_string())?;
    let books = library::available_books(data_dir);

    // Parallel: hash, staleness check, parse where needed.
    let updates: Vec<(String, Option<CachedGraph>)> = books
        .par_iter()
        .filter_map(|book| {
            let path = library::graphml_path(data_dir, &book.id)?;
            let content = fs::read_to_string(&path).ok()?;
            let hash = content_hash(&content);

            let fresh = match tree.get(book.id.as_bytes()) {
                Ok(Some(data)) => serde_json::from_slice::<CachedGraph>(&data)
                    .map(|cached| cached.content_hash == hash)
                    .unwrap_or(false),
                _ => false,
            };
            if fresh {
                return None;
            }

            match graphml::parse_graphml(&content) {
                Ok(graph) => Some((
                    book.id.clone(),
                    Some(CachedGraph {
                        content_hash: hash,
                        graph,
                    }),
                )),
                Err(e) => {
                    warn!(book_id = %book.id, error = %e, "failed to parse book graph");
                    Some((book.id.clone(), None))
                }
            }
        })
        .collect();

    let mut stats = ReconcileStats::default();
    for (book_id, row) in &updates {
        match row {
            Some(row) => {
                let json = serde_json::to_vec(row).map_err(|e| e.to_string())?;
                tree.insert(book_id.as_bytes(), json)
                    .map_err(|e| e.to_string())?;
                stats.parsed += 1;
            }
            None => stats.failed += 1,
        }
    }
    stats.unchanged = books.len() - updates.len();

    // Drop cache rows for vanished books.
    let stale: Vec<sled::IVec> = tree
        .iter()
        .filter_map(|r| r.ok())
        .filter(|(k, _)| {
            let id = String::from_utf8_lossy(k);
            !books.iter().any(|b| b.id == id)
        })
        .map(|(k, _)| k)
        .collect();
    stats.removed = stale.len();
    for key in stale {
        tree.remove(&key).map_err(|e| e.to_string())?;
    }

    Ok(stats)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    const XML: &str = r#"<graphml><graph>
        <node id="a"><data key="d0">Personnes</data></node>
        <node id="b"><data key="d0">Lieux</data></node>
        <edge source="a" target="b"><data key="d2">visite</data></edge>
    </graph></graphml>"#;

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("babel-store-{}-{}", tag, nanos));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn temp_db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn write_book(data_dir: &Path, id: &str, xml: &str) {
        let dir = data_dir.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(library::GRAPHML_FILENAME), xml).unwrap();
    }

    #[test]
    fn load_parses_and_then_serves_from_cache() {
        let dir = scratch_dir("load");
        let db = temp_db();
        write_book(&dir, "villa_triste_modiano", XML);

        let first = load_graph(&db, &dir, "villa_triste_modiano").unwrap().unwrap();
        assert_eq!(first.nodes.len(), 2);

        // Second load hits the cache row written by the first.
        let second = load_graph(&db, &dir, "villa_triste_modiano").unwrap().unwrap();
        assert_eq!(second.nodes.len(), 2);
        assert_eq!(second.edges[0].relation, "visite");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn changed_file_is_reparsed() {
        let dir = scratch_dir("stale");
        let db = temp_db();
        write_book(&dir, "policeman_decoin", XML);

        let _ = load_graph(&db, &dir, "policeman_decoin").unwrap().unwrap();

        let extended = XML.replace(
            r#"<node id="b"><data key="d0">Lieux</data></node>"#,
            r#"<node id="b"><data key="d0">Lieux</data></node><node id="c"/>"#,
        );
        write_book(&dir, "policeman_decoin", &extended);

        let reloaded = load_graph(&db, &dir, "policeman_decoin").unwrap().unwrap();
        assert_eq!(reloaded.nodes.len(), 3);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_book_is_none_not_error() {
        let dir = scratch_dir("missing");
        let db = temp_db();
        assert!(load_graph(&db, &dir, "nowhere").unwrap().is_none());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn reconcile_warms_and_prunes() {
        let dir = scratch_dir("reconcile");
        let db = temp_db();
        write_book(&dir, "villa_triste_modiano", XML);
        write_book(&dir, "peau_bison_frison", XML);
        write_book(&dir, "chien_blanc_gary", "not xml at all <<<");

        let stats = reconcile(&db, &dir).unwrap();
        assert_eq!(stats.parsed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.removed, 0);

        // Nothing changed: second pass is all cache hits.
        let stats = reconcile(&db, &dir).unwrap();
        assert_eq!(stats.parsed, 0);
        assert_eq!(stats.unchanged, 2);

        // Remove a book; its row goes away.
        fs::remove_dir_all(dir.join("villa_triste_modiano")).unwrap();
        let stats = reconcile(&db, &dir).unwrap();
        assert_eq!(stats.removed, 1);

        fs::remove_dir_all(&dir).unwrap();
    }
}
