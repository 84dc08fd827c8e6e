//! Answer annotation: entity highlighting inside query answers.
//!
//! The GraphRAG backend answers in markdown-ish French prose. This module
//! renders that text to HTML with every known entity mention wrapped in a
//! colored span (synced with the node colors in the graph view), plus just
//! enough block handling for the shape of those answers: headers, lists,
//! blockquotes, bold, and the backend's habit of emitting a bare capitalized
//! place name as a section header.

use crate::highlight::intelligence_color;
use crate::models::EntityType;
use regex::Regex;
use std::collections::HashMap;

// ============================================================================
// Entity References
// ============================================================================

/// An entity known to the current session, as far as text matching cares:
/// its id is also its display name in prose.
#[derive(Debug, Clone)]
pub struct EntityRef {
    pub id: String,
    pub entity_type: EntityType,
    /// Graph-synced color; when absent the score-based fallback is used.
    pub color: Option<String>,
    pub score: f64,
    pub description: Option<String>,
}

impl EntityRef {
    fn color(&self) -> String {
        self.color
            .clone()
            .unwrap_or_else(|| intelligence_color(self.entity_type, self.score))
    }
}

// ============================================================================
// Tokenization
// ============================================================================

/// French function words that must never become match keys on their own.
const STOP_WORDS: &[&str] = &[
    "le", "la", "les", "de", "du", "des", "un", "une", "et", "ou", "est", "sont", "dans", "sur",
    "avec", "pour", "par", "ce", "cette", "ces", "son", "sa", "ses", "qui", "que", "dont", "où",
    "il", "elle", "ils", "elles", "nous", "vous", "au", "aux", "se", "ne", "pas", "plus", "tout",
    "tous", "toute", "toutes",
];

/// Short contractions (d', l', qu'…) that survive tokenization as bare stems.
const CONTRACTIONS: &[&str] = &["d", "l", "qu", "n", "m", "t", "s"];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token) || CONTRACTIONS.contains(&token)
}

/// Splits an entity id into the tokens worth matching on their own:
/// lowercase, ASCII-alphanumeric runs, longer than two characters, not a
/// stop word.
fn meaningful_tokens(id: &str) -> Vec<String> {
    let lowered = id.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| t.len() > 2 && !is_stop_word(t))
        .map(|t| t.to_string())
        .collect()
}

// ============================================================================
// Entity Matcher
// ============================================================================

/// Compiled matcher over a set of entities: one alternation regex, longest
/// key first, with explicit boundary checks (the regex crate has no
/// lookahead, so the trailing boundary is verified by hand).
pub struct EntityMatcher {
    entities: Vec<EntityRef>,
    lookup: HashMap<String, usize>,
    pattern: Option<Regex>,
}

impl EntityMatcher {
    pub fn new(entities: Vec<EntityRef>) -> Self {
        let mut lookup: HashMap<String, usize> = HashMap::new();

        for (i, entity) in entities.iter().enumerate() {
            // Full name always maps to its own entity, even when names repeat.
            lookup.insert(entity.id.to_lowercase(), i);
            // Individual tokens only claim keys nobody holds yet.
            for token in meaningful_tokens(&entity.id) {
                lookup.entry(token).or_insert(i);
            }
        }

        let pattern = if lookup.is_empty() {
            None
        } else {
            let mut keys: Vec<&String> = lookup.keys().collect();
            // Longest first so overlapping keys resolve to the longest match;
            // the alternation is tried left to right.
            keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            let alternation = keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"(?i)(?:^|\s)({})", alternation)).ok()
        };

        Self {
            entities,
            lookup,
            pattern,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    /// Entity mentions in one line as `(start, end, entity index)` byte
    /// ranges. A candidate only counts when followed by whitespace, end of
    /// line, or sentence punctuation: "Maison" must not fire inside
    /// "Maisons-Alfort".
    fn find_mentions(&self, line: &str) -> Vec<(usize, usize, usize)> {
        let re = match &self.pattern {
            Some(re) => re,
            None => return Vec::new(),
        };

        let mut mentions = Vec::new();
        let mut at = 0;
        while at <= line.len() {
            let caps = match re.captures_at(line, at) {
                Some(c) => c,
                None => break,
            };
            let m = caps.get(1).expect("alternation group");
            let (start, end) = (m.start(), m.end());

            let boundary_ok = match line[end..].chars().next() {
                None => true,
                Some(c) => c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '!' | '?'),
            };

            if boundary_ok {
                if let Some(&idx) = self.lookup.get(&line[start..end].to_lowercase()) {
                    mentions.push((start, end, idx));
                }
                at = end;
            } else {
                // Embedded in a longer word; resume just past the candidate start.
                at = start
                    + line[start..]
                        .chars()
                        .next()
                        .map(|c| c.len_utf8())
                        .unwrap_or(1);
            }
        }
        mentions
    }

    /// One line of prose → HTML with entity spans and inline bold, all text
    /// escaped.
    fn render_line(&self, line: &str) -> String {
        let mentions = self.find_mentions(line);
        if mentions.is_empty() {
            return render_inline(line);
        }

        let mut html = String::new();
        let mut last = 0;
        for (start, end, idx) in mentions {
            if start > last {
                html.push_str(&render_inline(&line[last..start]));
            }
            let entity = &self.entities[idx];
            html.push_str(&format!(
                r#"<span class="entity" style="color: {}" title="{}: {}">{}</span>"#,
                entity.color(),
                entity.entity_type.label(),
                html_escape(&entity.id),
                html_escape(&line[start..end]),
            ));
            last = end;
        }
        if last < line.len() {
            html.push_str(&render_inline(&line[last..]));
        }
        html
    }
}

// ============================================================================
// Inline Rendering
// ============================================================================

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escapes text and renders `**bold**` runs.
fn render_inline(text: &str) -> String {
    let mut html = String::new();
    let mut rest = text;
    loop {
        let Some(open) = rest.find("**") else {
            html.push_str(&html_escape(rest));
            break;
        };
        let Some(close) = rest[open + 2..].find("**") else {
            html.push_str(&html_escape(rest));
            break;
        };
        if close == 0 {
            // "****": nothing to embolden, keep literal.
            html.push_str(&html_escape(&rest[..open + 2]));
            rest = &rest[open + 2..];
            continue;
        }
        html.push_str(&html_escape(&rest[..open]));
        html.push_str("<strong>");
        html.push_str(&html_escape(&rest[open + 2..open + 2 + close]));
        html.push_str("</strong>");
        rest = &rest[open + 2 + close + 2..];
    }
    html
}

// ============================================================================
// Block Rendering
// ============================================================================

/// Bare capitalized short line, e.g. a commune name the backend emits as a
/// section header between paragraphs.
fn is_section_header(line: &str) -> bool {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[A-ZÀ-Ü][a-zà-ÿ]+(?:[-'\s][A-Za-zÀ-ÿ]+)*$").expect("section header pattern")
    });

    let len = line.chars().count();
    !line.contains(':')
        && !line.ends_with('.')
        && !line.ends_with(',')
        && len > 2
        && len < 50
        && re.is_match(line)
}

fn header_text(line: &str, marker: &str) -> Option<String> {
    line.strip_prefix(marker)
        .map(|rest| rest.trim_start().to_string())
        .filter(|text| !text.is_empty())
}

fn list_item_text(line: &str) -> Option<String> {
    let rest = line.strip_prefix('-').or_else(|| line.strip_prefix('*'))?;
    let trimmed = rest.strip_prefix(' ')?.trim_start();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn numbered_item_text(line: &str) -> Option<(String, String)> {
    let digits_end = line.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let rest = line[digits_end..].strip_prefix(". ")?;
    if rest.trim().is_empty() {
        return None;
    }
    Some((line[..digits_end].to_string(), rest.trim().to_string()))
}

/// Render a backend answer to HTML, weaving entity spans through every block.
pub fn render_answer(text: &str, entities: Vec<EntityRef>) -> String {
    let matcher = EntityMatcher::new(entities);
    let mut html = String::new();
    let mut list_items: Vec<String> = Vec::new();

    fn flush_list(html: &mut String, items: &mut Vec<String>) {
        if !items.is_empty() {
            html.push_str("<ul class=\"answer-list\">");
            for item in items.drain(..) {
                html.push_str(&item);
            }
            html.push_str("</ul>");
        }
    }

    for raw_line in text.lines() {
        let line = raw_line.trim();

        let bullet = list_item_text(line);
        let numbered = numbered_item_text(line);
        if bullet.is_none() && numbered.is_none() {
            flush_list(&mut html, &mut list_items);
        }

        // Longer header markers first: "#### x" must not render as an h1.
        if let Some(text) = header_text(line, "####") {
            html.push_str(&format!("<h4>{}</h4>", matcher.render_line(&text)));
        } else if let Some(text) = header_text(line, "###") {
            html.push_str(&format!("<h3>{}</h3>", matcher.render_line(&text)));
        } else if let Some(text) = header_text(line, "##") {
            html.push_str(&format!("<h2>{}</h2>", matcher.render_line(&text)));
        } else if let Some(text) = header_text(line, "#") {
            html.push_str(&format!("<h1>{}</h1>", matcher.render_line(&text)));
        } else if let Some(text) = header_text(line, ">") {
            html.push_str(&format!(
                "<blockquote>{}</blockquote>",
                matcher.render_line(&text)
            ));
        } else if let Some(item) = bullet {
            list_items.push(format!("<li>{}</li>", matcher.render_line(&item)));
        } else if let Some((number, item)) = numbered {
            list_items.push(format!(
                "<li><span class=\"list-number\">{}.</span> {}</li>",
                number,
                matcher.render_line(&item)
            ));
        } else if line.is_empty() {
            html.push_str("<div class=\"answer-break\"></div>");
        } else if is_section_header(line) {
            html.push_str(&format!(
                "<div class=\"section-header\">{}</div>",
                matcher.render_line(line)
            ));
        } else {
            html.push_str(&format!("<p>{}</p>", matcher.render_line(line)));
        }
    }

    flush_list(&mut html, &mut list_items);
    html
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, entity_type: EntityType) -> EntityRef {
        EntityRef {
            id: id.to_string(),
            entity_type,
            color: Some("rgb(255, 107, 107)".to_string()),
            score: 0.8,
            description: None,
        }
    }

    #[test]
    fn full_name_match_is_case_insensitive() {
        let html = render_answer(
            "On retrouve JEAN VALJEAN dans Paris.",
            vec![entity("Jean Valjean", EntityType::Person)],
        );
        assert!(html.contains(r#"<span class="entity""#));
        assert!(html.contains(">JEAN VALJEAN</span>"));
    }

    #[test]
    fn meaningful_token_matches_alone() {
        let html = render_answer(
            "Le destin de Valjean bascule.",
            vec![entity("Jean Valjean", EntityType::Person)],
        );
        assert!(html.contains(">Valjean</span>"));
    }

    #[test]
    fn stop_words_and_short_tokens_never_match() {
        let html = render_answer(
            "La ville est dans le roman.",
            vec![entity("La Maison du Berger", EntityType::Place)],
        );
        // "la", "du" are stop words; only "maison"/"berger" are keys and
        // neither occurs here.
        assert!(!html.contains("<span"));
    }

    #[test]
    fn match_requires_word_boundary() {
        let entities = vec![entity("Maison", EntityType::Place)];
        let embedded = render_answer("Le quartier de Maisons-Alfort.", entities.clone());
        assert!(!embedded.contains("<span"));

        let punctuated = render_answer("Il rentre à la Maison.", entities);
        assert!(punctuated.contains(">Maison</span>"));
    }

    #[test]
    fn longest_key_wins_on_overlap() {
        let entities = vec![
            entity("Jean", EntityType::Person),
            entity("Jean Valjean", EntityType::Person),
        ];
        let html = render_answer("Voici Jean Valjean.", entities);
        assert!(html.contains(">Jean Valjean</span>"));
    }

    #[test]
    fn explicit_color_wins_over_fallback() {
        let mut e = entity("Cosette", EntityType::Person);
        e.color = Some("rgb(1, 2, 3)".to_string());
        let html = render_answer("Cosette chante.", vec![e]);
        assert!(html.contains("color: rgb(1, 2, 3)"));

        let mut uncolored = entity("Cosette", EntityType::Person);
        uncolored.color = None;
        let html = render_answer("Cosette chante.", vec![uncolored]);
        assert!(html.contains(&format!(
            "color: {}",
            intelligence_color(EntityType::Person, 0.8)
        )));
    }

    #[test]
    fn headers_lists_and_quotes_render() {
        let text = "# Titre\n## Sous-titre\n- premier\n- second\n1. un\n> citation\n\ntexte";
        let html = render_answer(text, vec![]);
        assert!(html.contains("<h1>Titre</h1>"));
        assert!(html.contains("<h2>Sous-titre</h2>"));
        assert!(html.contains("<li>premier</li>"));
        assert!(html.contains(r#"<span class="list-number">1.</span> un"#));
        assert!(html.contains("<blockquote>citation</blockquote>"));
        assert!(html.contains(r#"<div class="answer-break">"#));
        assert!(html.contains("<p>texte</p>"));
    }

    #[test]
    fn h4_is_not_mistaken_for_h1() {
        let html = render_answer("#### Détail", vec![]);
        assert!(html.contains("<h4>Détail</h4>"));
        assert!(!html.contains("<h1>"));
    }

    #[test]
    fn standalone_capitalized_line_becomes_section_header() {
        let html = render_answer("Aix-en-Provence\nLa suite du texte ici.", vec![]);
        assert!(html.contains(r#"<div class="section-header">Aix-en-Provence</div>"#));

        // Trailing period keeps it a paragraph.
        let html = render_answer("Aix-en-Provence.", vec![]);
        assert!(!html.contains("section-header"));
    }

    #[test]
    fn inline_bold_renders_and_text_is_escaped() {
        let html = render_answer("Un **mot fort** et <script>.", vec![]);
        assert!(html.contains("<strong>mot fort</strong>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn entity_inside_list_item_is_highlighted() {
        let html = render_answer(
            "- Valjean apparaît ici",
            vec![entity("Jean Valjean", EntityType::Person)],
        );
        assert!(html.contains("<li>"));
        assert!(html.contains(">Valjean</span>"));
    }

    #[test]
    fn consecutive_mentions_both_match() {
        let entities = vec![
            entity("Cosette", EntityType::Person),
            entity("Marius", EntityType::Person),
        ];
        let html = render_answer("Cosette Marius", entities);
        assert!(html.contains(">Cosette</span>"));
        assert!(html.contains(">Marius</span>"));
    }

    #[test]
    fn no_entities_renders_plain_markdown() {
        let html = render_answer("Seulement du texte.", vec![]);
        assert_eq!(html, "<p>Seulement du texte.</p>");
    }
}
