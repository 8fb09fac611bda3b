//! Row extraction from rendered listing HTML
//!
//! Cell text is rebuilt the way a browser's `innerText` reports it: runs of
//! whitespace collapse to one space, and `<br>` or block-level boundaries
//! become line breaks. The normalizer relies on those line breaks to split
//! composite cells.

use crate::record::RawRow;
use crate::{RenderError, RenderResult};
use scraper::{ElementRef, Html, Node, Selector};

/// Elements that start a new line in rendered text
const BLOCK_ELEMENTS: &[&str] = &[
    "div", "p", "li", "ul", "ol", "tr", "table", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Parses every row matching `row_selector` out of a page's HTML
///
/// # Example
///
/// ```
/// use bpom_harvester::render::parse_rows;
///
/// let html = "<table><tbody><tr><td>Obat</td><td>REG1<br>Terbit: 2020-01-01</td>\
///     <td>A</td><td>B</td></tr></tbody></table>";
/// let rows = parse_rows(html, "table tbody tr").unwrap();
/// assert_eq!(rows[0].registration.as_deref(), Some("REG1\nTerbit: 2020-01-01"));
/// ```
pub fn parse_rows(html: &str, row_selector: &str) -> RenderResult<Vec<RawRow>> {
    let rows = Selector::parse(row_selector)
        .map_err(|e| RenderError::Script(format!("bad row selector '{}': {:?}", row_selector, e)))?;
    let cells = Selector::parse("td")
        .map_err(|e| RenderError::Script(format!("bad cell selector: {:?}", e)))?;

    let document = Html::parse_document(html);

    Ok(document
        .select(&rows)
        .map(|row| RawRow::from_cells(row.select(&cells).map(|cell| cell_text(&cell))))
        .collect())
}

/// Returns the rendered text of a cell
fn cell_text(cell: &ElementRef<'_>) -> String {
    let mut raw = String::new();

    for node in cell.descendants() {
        match node.value() {
            Node::Text(text) => push_collapsed(&mut raw, text),
            Node::Element(element) => {
                let name = element.name();
                if name == "br" || BLOCK_ELEMENTS.contains(&name) {
                    raw.push('\n');
                }
            }
            _ => {}
        }
    }

    raw.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Appends `text` with every whitespace run, newlines included, folded to one space
fn push_collapsed(out: &mut String, text: &str) {
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
}
