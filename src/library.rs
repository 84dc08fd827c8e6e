//! The book library: which graphs exist on disk.
//!
//! Each book lives in `<data_dir>/<book_id>/` with its GraphML export inside.
//! A fixed catalog supplies titles and authors for the known corpus; book
//! directories that are not in the catalog (freshly ingested datasets, e.g.
//! the civic corpus) are still listed, with a title derived from the id.

use crate::models::{prettify_id, Book};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const GRAPHML_FILENAME: &str = "graph_chunk_entity_relation.graphml";

/// The known corpus: (directory id, title, author).
const CATALOG: &[(&str, &str, &str)] = &[
    ("vallee_sans_hommes_frison", "La Vallée sans hommes", "Frison"),
    ("racines_ciel_gary", "Les Racines du ciel", "Romain Gary"),
    ("policeman_decoin", "Policeman", "Decoin"),
    ("a_rebours_huysmans", "À rebours", "Huysmans"),
    ("chien_blanc_gary", "Chien blanc", "Romain Gary"),
    ("peau_bison_frison", "Peau de bison", "Frison"),
    ("tilleul_soir_anglade", "Le Tilleul du soir", "Anglade"),
    ("villa_triste_modiano", "Villa triste", "Modiano"),
];

/// Book ids double as directory names; reject anything that could walk out
/// of the data directory.
pub fn is_valid_book_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Path to a book's GraphML file, if the id is sane and the file exists.
pub fn graphml_path(data_dir: &Path, book_id: &str) -> Option<PathBuf> {
    if !is_valid_book_id(book_id) {
        return None;
    }
    let path = data_dir.join(book_id).join(GRAPHML_FILENAME);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

/// Books that actually have data: catalog entries first (catalog order),
/// then any uncataloged directories found on disk, by id.
pub fn available_books(data_dir: &Path) -> Vec<Book> {
    let mut books: Vec<Book> = CATALOG
        .iter()
        .filter(|(id, _, _)| graphml_path(data_dir, id).is_some())
        .map(|(id, title, author)| Book {
            id: id.to_string(),
            title: title.to_string(),
            author: Some(author.to_string()),
        })
        .collect();

    let mut discovered: Vec<Book> = WalkDir::new(data_dir)
        .min_depth(2)
        .max_depth(2)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == GRAPHML_FILENAME)
        .filter_map(|e| {
            let dir = e.path().parent()?.file_name()?.to_str()?.to_string();
            if !is_valid_book_id(&dir) || CATALOG.iter().any(|(id, _, _)| *id == dir) {
                return None;
            }
            Some(Book {
                title: prettify_id(&dir),
                id: dir,
                author: None,
            })
        })
        .collect();
    discovered.sort_by(|a, b| a.id.cmp(&b.id));
    books.extend(discovered);

    books
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("babel-library-{}-{}", tag, nanos));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn add_book(data_dir: &Path, id: &str) {
        let book_dir = data_dir.join(id);
        fs::create_dir_all(&book_dir).unwrap();
        fs::write(book_dir.join(GRAPHML_FILENAME), "<graphml/>").unwrap();
    }

    #[test]
    fn rejects_traversal_ids() {
        assert!(!is_valid_book_id(""));
        assert!(!is_valid_book_id(".."));
        assert!(!is_valid_book_id("../etc"));
        assert!(!is_valid_book_id("a/b"));
        assert!(!is_valid_book_id("a\\b"));
        assert!(is_valid_book_id("villa_triste_modiano"));
        assert!(is_valid_book_id("grand-debat-2019"));
    }

    #[test]
    fn lists_catalog_books_with_data_only() {
        let dir = scratch_dir("catalog");
        add_book(&dir, "villa_triste_modiano");
        add_book(&dir, "policeman_decoin");
        // Directory without the GraphML file: not available.
        fs::create_dir_all(dir.join("chien_blanc_gary")).unwrap();

        let books = available_books(&dir);
        let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["policeman_decoin", "villa_triste_modiano"]);
        assert_eq!(books[0].author.as_deref(), Some("Decoin"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn discovers_uncataloged_books_with_derived_titles() {
        let dir = scratch_dir("discover");
        add_book(&dir, "villa_triste_modiano");
        add_book(&dir, "grand_debat");

        let books = available_books(&dir);
        let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["villa_triste_modiano", "grand_debat"]);

        let civic = &books[1];
        assert_eq!(civic.title, "Grand Debat");
        assert_eq!(civic.author, None);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn graphml_path_requires_existing_file() {
        let dir = scratch_dir("paths");
        add_book(&dir, "peau_bison_frison");

        assert!(graphml_path(&dir, "peau_bison_frison").is_some());
        assert!(graphml_path(&dir, "villa_triste_modiano").is_none());
        assert!(graphml_path(&dir, "../peau_bison_frison").is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_data_dir_lists_nothing() {
        let dir = std::env::temp_dir().join("babel-library-definitely-missing");
        assert!(available_books(&dir).is_empty());
    }
}
