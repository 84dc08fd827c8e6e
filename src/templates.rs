//! HTML templates for the explorer page.
//!
//! One server-rendered page: book selector, query bar, the D3 force graph,
//! the annotated answer panel, and a debug panel showing the search path.
//! All CSS and JS is embedded; D3 v7 comes from the CDN.

// ============================================================================
// CSS
// ============================================================================

pub const STYLE: &str = r#"
:root {
    --bg: #0d1117;
    --panel: #161b22;
    --border: #30363d;
    --fg: #e6edf3;
    --muted: #8b949e;
    --accent: #d4a72c;
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
    background: var(--bg);
    color: var(--fg);
    line-height: 1.6;
}

header {
    padding: 1rem 1.5rem;
    border-bottom: 1px solid var(--border);
}
header h1 { font-size: 1.3rem; font-weight: 400; letter-spacing: 0.03em; }
header p { color: var(--muted); font-size: 0.85rem; }

.layout {
    display: grid;
    grid-template-columns: 1fr 380px;
    gap: 1rem;
    padding: 1rem 1.5rem;
    height: calc(100vh - 90px);
}

.graph-panel {
    position: relative;
    border: 1px solid var(--border);
    border-radius: 6px;
    background: #010409;
    overflow: hidden;
}
.graph-panel svg { width: 100%; height: 100%; }

.graph-status {
    position: absolute;
    top: 8px;
    left: 10px;
    font-size: 0.78rem;
    color: var(--muted);
    pointer-events: none;
}

.side-panel {
    display: flex;
    flex-direction: column;
    gap: 1rem;
    overflow-y: auto;
}

.controls {
    display: flex;
    flex-direction: column;
    gap: 0.5rem;
    padding: 0.75rem;
    border: 1px solid var(--border);
    border-radius: 6px;
    background: var(--panel);
}
.controls select, .controls input {
    width: 100%;
    padding: 0.45rem 0.6rem;
    background: var(--bg);
    color: var(--fg);
    border: 1px solid var(--border);
    border-radius: 4px;
    font-size: 0.9rem;
}
.controls .row { display: flex; gap: 0.5rem; }
.controls button {
    padding: 0.45rem 0.9rem;
    background: var(--accent);
    color: #000;
    border: none;
    border-radius: 4px;
    cursor: pointer;
    font-weight: 600;
    font-size: 0.85rem;
}
.controls button.secondary { background: var(--panel); color: var(--muted); border: 1px solid var(--border); }
.controls button:disabled { opacity: 0.5; cursor: wait; }
.mode-toggle { display: flex; gap: 0.35rem; font-size: 0.78rem; }
.mode-toggle button { padding: 0.2rem 0.6rem; font-weight: 400; }
.mode-toggle button.inactive { background: var(--bg); color: var(--muted); border: 1px solid var(--border); }

.answer-panel, .debug-panel {
    padding: 0.85rem;
    border: 1px solid var(--border);
    border-radius: 6px;
    background: var(--panel);
    font-size: 0.88rem;
}
.answer-panel h2, .debug-panel h2 {
    font-size: 0.8rem;
    text-transform: uppercase;
    letter-spacing: 0.06em;
    color: var(--muted);
    margin-bottom: 0.5rem;
}
.answer-panel .entity {
    background: #0a0a0a;
    padding: 1px 5px;
    border-radius: 3px;
    font-weight: 500;
    cursor: default;
}
.answer-panel h1 { font-size: 1.05rem; margin: 0.6rem 0 0.3rem; color: var(--fg); }
.answer-panel h3, .answer-panel h4 { font-size: 0.95rem; margin: 0.5rem 0 0.25rem; }
.answer-panel p { margin-bottom: 0.5rem; color: #c9d1d9; }
.answer-panel blockquote {
    border-left: 3px solid var(--accent);
    padding-left: 0.7rem;
    margin: 0.5rem 0;
    font-style: italic;
    color: var(--muted);
}
.answer-panel .answer-list { margin: 0.4rem 0 0.4rem 1.2rem; }
.answer-panel .list-number { color: var(--accent); font-weight: 600; }
.answer-panel .section-header {
    margin: 0.7rem 0 0.3rem;
    font-weight: 600;
    border-left: 2px solid var(--accent);
    padding-left: 0.5rem;
}
.answer-panel .answer-break { height: 0.5rem; }

.debug-panel .path-item {
    display: flex;
    justify-content: space-between;
    padding: 0.25rem 0.4rem;
    background: var(--bg);
    border-radius: 3px;
    margin-bottom: 0.25rem;
    font-size: 0.8rem;
}
.debug-panel .path-item .score { color: var(--muted); }
.debug-panel .stats { color: var(--muted); font-size: 0.78rem; margin-top: 0.4rem; }

.kg-tooltip {
    position: absolute;
    background: var(--panel);
    border: 1px solid var(--border);
    border-radius: 6px;
    padding: 0.5rem 0.7rem;
    font-size: 0.8rem;
    pointer-events: none;
    max-width: 280px;
    z-index: 10;
}
.kg-tooltip .title { font-weight: 600; }
.kg-tooltip .type { color: var(--muted); font-size: 0.72rem; }
"#;

// ============================================================================
// Base Layout
// ============================================================================

pub fn base_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
{body}
</body>
</html>"#,
        title = title,
        style = STYLE,
        body = body,
    )
}

// ============================================================================
// Explorer Page
// ============================================================================

pub fn explorer_page() -> String {
    let body = format!(
        r#"<header>
    <h1>Bibliothèque de Babel</h1>
    <p>Exploration interactive des connexions entre les livres</p>
</header>
<div class="layout">
    <div class="graph-panel">
        <div class="graph-status" id="graph-status">Aucun graphe chargé</div>
        <svg id="graph"></svg>
    </div>
    <div class="side-panel">
        <div class="controls">
            <select id="book-select">
                <option value="">— Choisir un livre —</option>
                <option value="__galaxy__">Vue galaxie (graphe complet)</option>
            </select>
            <input type="text" id="query-input" placeholder="Explorez le graphe avec une question…">
            <div class="row">
                <button id="query-btn">Explorer</button>
                <button id="clear-btn" class="secondary">Effacer</button>
            </div>
            <div class="mode-toggle">
                <span>Mode :</span>
                <button id="mode-local">local</button>
                <button id="mode-global" class="inactive">global</button>
            </div>
        </div>
        <div class="answer-panel" id="answer-panel" style="display:none">
            <h2>Réponse</h2>
            <div id="answer-body"></div>
        </div>
        <div class="debug-panel" id="debug-panel" style="display:none">
            <h2>Chemin de recherche</h2>
            <div id="path-entities"></div>
            <div id="path-relations"></div>
            <div class="stats" id="path-stats"></div>
        </div>
    </div>
</div>
{script}"#,
        script = graph_script(),
    );
    base_html("Bibliothèque de Babel", &body)
}

// ============================================================================
// Graph JS
// ============================================================================

/// The D3 force-graph engine. Colors, sizes, and highlight/dim states are
/// computed server-side; the script only draws what it is given and restyles
/// in place when a query response carries updated nodes/links.
fn graph_script() -> String {
    let engine = r#"
(function() {
    const svg = d3.select('#graph');
    const status = document.getElementById('graph-status');
    let simulation = null;
    let nodeSel = null, linkSel = null, labelSel = null;
    let currentBook = null;
    let mode = 'local';

    function setStatus(text) { status.textContent = text; }

    function dims() {
        const el = document.querySelector('.graph-panel');
        return { width: el.clientWidth, height: el.clientHeight };
    }

    // ---- rendering -------------------------------------------------------

    function render(graph) {
        svg.selectAll('*').remove();
        const { width, height } = dims();
        const root = svg.append('g');

        svg.call(d3.zoom()
            .scaleExtent([0.2, 6])
            .on('zoom', (event) => root.attr('transform', event.transform)));

        linkSel = root.append('g')
            .selectAll('line')
            .data(graph.links, d => d.id)
            .join('line')
            .attr('stroke', '#30363d')
            .attr('stroke-width', d => Math.max(0.6, d.weight * 2));

        nodeSel = root.append('g')
            .selectAll('circle')
            .data(graph.nodes, d => d.id)
            .join('circle')
            .attr('r', d => d.size / 2)
            .attr('fill', d => d.color)
            .attr('stroke', '#010409')
            .attr('stroke-width', 1)
            .call(drag())
            .on('mouseenter', showTooltip)
            .on('mouseleave', hideTooltip);

        labelSel = root.append('g')
            .selectAll('text')
            .data(graph.nodes, d => d.id)
            .join('text')
            .text(d => d.label)
            .attr('font-size', 9)
            .attr('fill', '#8b949e')
            .attr('text-anchor', 'middle');

        if (simulation) simulation.stop();
        simulation = d3.forceSimulation(graph.nodes)
            .force('link', d3.forceLink(graph.links)
                .id(d => d.id)
                .distance(70)
                .strength(d => Math.min(1, d.weight)))
            .force('charge', d3.forceManyBody().strength(-120))
            .force('center', d3.forceCenter(width / 2, height / 2))
            .force('collide', d3.forceCollide().radius(d => d.size / 2 + 3))
            .on('tick', () => {
                linkSel
                    .attr('x1', d => d.source.x).attr('y1', d => d.source.y)
                    .attr('x2', d => d.target.x).attr('y2', d => d.target.y);
                nodeSel.attr('cx', d => d.x).attr('cy', d => d.y);
                labelSel.attr('x', d => d.x).attr('y', d => d.y - d.size / 2 - 4);
            });

        setStatus(graph.nodes.length + ' entités · ' + graph.links.length + ' relations');
    }

    // Restyle in place: the force layout keeps its positions, only colors,
    // sizes and opacities change with the server-computed states.
    function restyle(graph) {
        if (!nodeSel) { render(graph); return; }
        const nodeById = new Map(graph.nodes.map(n => [n.id, n]));
        const linkById = new Map(graph.links.map(l => [l.id, l]));

        nodeSel.each(function(d) {
            const fresh = nodeById.get(d.id);
            if (!fresh) return;
            d.color = fresh.color;
            d.size = fresh.size;
            d.highlighted = fresh.highlighted;
            d.dimmed = fresh.dimmed;
        });
        nodeSel
            .attr('fill', d => d.color)
            .attr('r', d => d.size / 2)
            .attr('opacity', d => d.dimmed ? 0.45 : 1);
        labelSel.attr('opacity', d => d.dimmed ? 0.3 : 1);
        linkSel.each(function(d) {
            const fresh = linkById.get(d.id);
            if (!fresh) return;
            d.highlighted = fresh.highlighted;
            d.dimmed = fresh.dimmed;
        });
        linkSel
            .attr('stroke', d => d.highlighted ? '#d4a72c' : '#30363d')
            .attr('stroke-width', d => d.highlighted ? 2.5 : Math.max(0.6, d.weight * 2))
            .attr('opacity', d => d.dimmed ? 0.2 : 1);
    }

    function drag() {
        return d3.drag()
            .on('start', (event, d) => {
                if (!event.active) simulation.alphaTarget(0.3).restart();
                d.fx = d.x; d.fy = d.y;
            })
            .on('drag', (event, d) => { d.fx = event.x; d.fy = event.y; })
            .on('end', (event, d) => {
                if (!event.active) simulation.alphaTarget(0);
                d.fx = null; d.fy = null;
            });
    }

    // ---- tooltip ---------------------------------------------------------

    let tooltip = null;
    function showTooltip(event, d) {
        hideTooltip();
        tooltip = document.createElement('div');
        tooltip.className = 'kg-tooltip';
        const desc = d.description ? '<div>' + escapeHtml(d.description) + '</div>' : '';
        tooltip.innerHTML = '<div class="title">' + escapeHtml(d.label) + '</div>'
            + '<div class="type">' + escapeHtml(d.type) + ' · degré ' + d.degree + '</div>' + desc;
        document.querySelector('.graph-panel').appendChild(tooltip);
        tooltip.style.left = (event.offsetX + 14) + 'px';
        tooltip.style.top = (event.offsetY + 14) + 'px';
    }
    function hideTooltip() {
        if (tooltip) { tooltip.remove(); tooltip = null; }
    }
    function escapeHtml(s) {
        return String(s).replace(/[&<>"']/g, c => ({
            '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'
        })[c]);
    }

    // ---- data loading ----------------------------------------------------

    async function loadBooks() {
        try {
            const resp = await fetch('/api/books');
            const data = await resp.json();
            const select = document.getElementById('book-select');
            for (const book of data.books) {
                const option = document.createElement('option');
                option.value = book.id;
                option.textContent = book.title + (book.author ? ' — ' + book.author : '');
                select.appendChild(option);
            }
        } catch (err) {
            console.error('Erreur lors du chargement des livres:', err);
        }
    }

    async function loadGraph(bookId) {
        setStatus('Chargement du graphe…');
        const url = bookId === '__galaxy__' ? '/api/graph/remote' : '/api/books/' + encodeURIComponent(bookId) + '/graph';
        try {
            const resp = await fetch(url);
            if (!resp.ok) {
                const data = await resp.json().catch(() => ({}));
                setStatus(data.error || 'Graphe indisponible');
                return;
            }
            const graph = await resp.json();
            currentBook = bookId === '__galaxy__' ? null : bookId;
            render(graph);
            resetPanels();
        } catch (err) {
            console.error('Erreur lors du chargement du graphe:', err);
            setStatus('Graphe indisponible');
        }
    }

    // ---- querying --------------------------------------------------------

    async function submitQuery() {
        const input = document.getElementById('query-input');
        const button = document.getElementById('query-btn');
        const query = input.value.trim();
        if (!query) return;
        button.disabled = true;
        button.textContent = 'Analyse…';
        try {
            const resp = await fetch('/api/query', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ query: query, book_id: currentBook, mode: mode })
            });
            const outcome = await resp.json();
            showAnswer(outcome);
            if (outcome.nodes && outcome.nodes.length) {
                restyle({ nodes: outcome.nodes, links: outcome.links });
            }
        } catch (err) {
            console.error('Erreur lors de la requête:', err);
        } finally {
            button.disabled = false;
            button.textContent = 'Explorer';
        }
    }

    function showAnswer(outcome) {
        const panel = document.getElementById('answer-panel');
        panel.style.display = 'block';
        document.getElementById('answer-body').innerHTML = outcome.answer_html;

        const debug = document.getElementById('debug-panel');
        const path = outcome.search_path;
        if (path && (path.entities.length || path.relations.length)) {
            debug.style.display = 'block';
            document.getElementById('path-entities').innerHTML = path.entities.slice(0, 8)
                .map(e => '<div class="path-item"><span>' + escapeHtml(e.id) + '</span>'
                    + '<span class="score">' + Math.round(e.score * 100) + '%</span></div>')
                .join('');
            document.getElementById('path-relations').innerHTML = path.relations.slice(0, 8)
                .map(r => '<div class="path-item"><span>' + escapeHtml(r.source) + ' → ' + escapeHtml(r.target) + '</span></div>')
                .join('');
            const s = outcome.stats;
            document.getElementById('path-stats').textContent =
                s.highlightedNodeCount + ' nœuds et ' + s.highlightedEdgeCount + ' liens en surbrillance';
        } else {
            debug.style.display = 'none';
        }
    }

    async function clearHighlight() {
        try {
            const resp = await fetch('/api/highlight/clear', { method: 'POST' });
            const graph = await resp.json();
            if (graph.nodes && graph.nodes.length) {
                restyle(graph);
            }
            resetPanels();
        } catch (err) {
            console.error('Erreur lors de la réinitialisation:', err);
        }
    }

    function resetPanels() {
        document.getElementById('answer-panel').style.display = 'none';
        document.getElementById('debug-panel').style.display = 'none';
    }

    // ---- wiring ----------------------------------------------------------

    document.getElementById('book-select').addEventListener('change', (event) => {
        if (event.target.value) loadGraph(event.target.value);
    });
    document.getElementById('query-btn').addEventListener('click', submitQuery);
    document.getElementById('query-input').addEventListener('keydown', (event) => {
        if (event.key === 'Enter') submitQuery();
    });
    document.getElementById('clear-btn').addEventListener('click', clearHighlight);
    document.getElementById('mode-local').addEventListener('click', () => setMode('local'));
    document.getElementById('mode-global').addEventListener('click', () => setMode('global'));

    function setMode(next) {
        mode = next;
        document.getElementById('mode-local').className = next === 'local' ? '' : 'inactive';
        document.getElementById('mode-global').className = next === 'global' ? '' : 'inactive';
    }

    loadBooks();
})();
"#;

    format!(
        "<script src=\"https://d3js.org/d3.v7.min.js\"></script>\n<script>{}</script>",
        engine
    )
}
