// src/locate/dom.rs

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use super::RawTable;
use crate::text::normalize_ws;

const MAX_COLSPAN: usize = 64;

/// HTML-only tags. SGML text submissions use `<PAGE>`, `<S>`, `<C>` and `<TABLE>`.
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(?:html|body|p|div|br|span|font)\b[^>]*>").expect("html tag regex should compile")
});

/// Whether a submission is HTML rather than SGML-wrapped plain text.
pub fn looks_like_html(raw: &str) -> bool {
    HTML_TAG_RE.is_match(raw)
}

/// Every `<table>` element in document order.
pub fn table_elements(doc: &Html) -> Vec<ElementRef<'_>> {
    let selector = Selector::parse("table").expect("table selector should be valid");
    doc.select(&selector).collect()
}

/// True when the table wraps another table (page-layout scaffolding).
pub fn has_nested_table(table: &ElementRef) -> bool {
    table
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().name() == "table")
}

/// Direct `<tr>` children, looking through `thead`/`tbody`/`tfoot` but not into nested tables.
fn direct_rows<'a>(table: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn direct_cells<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

fn span_attr(cell: &ElementRef, name: &str) -> usize {
    cell.value()
        .attr(name)
        .map(|s| s.trim().chars().take_while(char::is_ascii_digit).collect::<String>())
        .and_then(|d| d.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

/// Text of an element with entities decoded, a line break at `<br>` and a
/// blank line at block boundaries, so values stacked inside one cell stay
/// separable and paragraphs stay apart.
pub fn element_text(el: &ElementRef) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => match e.name() {
                "br" => out.push('\n'),
                "p" | "div" | "tr" | "li" | "td" | "th" | "table" | "h1" | "h2" | "h3" | "h4" | "h5"
                | "h6" => out.push_str("\n\n"),
                _ => {}
            },
            _ => {}
        }
    }
    out
}

/// Text of every `<pre>` block, whitespace kept as rendered.
pub fn preformatted_text(doc: &Html) -> String {
    let selector = Selector::parse("pre").expect("pre selector should be valid");
    doc.select(&selector)
        .map(|pre| pre.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Whitespace-collapsed text of the whole element.
pub fn flat_text(el: &ElementRef) -> String {
    normalize_ws(&element_text(el))
}

/// Build the rectangular cell grid of one `<table>`, expanding `colspan` and
/// `rowspan` by copying the cell text into every covered slot.
pub fn raw_table(index: usize, table: &ElementRef) -> RawTable {
    let rows = direct_rows(table);
    let mut grid: Vec<Vec<Option<String>>> = vec![Vec::new(); rows.len()];

    for (r, row) in rows.iter().enumerate() {
        let mut c = 0usize;
        for cell in direct_cells(row) {
            let text = element_text(&cell).trim().to_string();
            let colspan = span_attr(&cell, "colspan").min(MAX_COLSPAN);
            let rowspan = span_attr(&cell, "rowspan").min(rows.len() - r);

            // skip slots already claimed by a rowspan from above
            while grid[r].get(c).map_or(false, Option::is_some) {
                c += 1;
            }
            for dr in 0..rowspan {
                let target = &mut grid[r + dr];
                if target.len() < c + colspan {
                    target.resize(c + colspan, None);
                }
                for slot in &mut target[c..c + colspan] {
                    if slot.is_none() {
                        *slot = Some(text.clone());
                    }
                }
            }
            c += colspan;
        }
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let rows = grid
        .into_iter()
        .map(|row| {
            let mut row: Vec<String> = row.into_iter().map(Option::unwrap_or_default).collect();
            row.resize(width, String::new());
            row
        })
        .collect();

    let caption = table
        .children()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "caption")
        .map(|e| flat_text(&e));

    RawTable {
        index,
        caption,
        rows,
    }
}
