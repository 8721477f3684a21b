//! Structured extraction from HTML: tables, lists, selector-driven field
//! maps, and embedded JSON-LD. Parsing is synchronous and self-contained;
//! callers fetch the page first. Every returned string is sanitized.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};

use crate::error::ResearchError;
use crate::text::clean_cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    Table,
    List,
    Fields,
    JsonLd,
    Auto,
}

impl ExtractMode {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "table" => Some(Self::Table),
            "list" => Some(Self::List),
            "fields" => Some(Self::Fields),
            "json-ld" => Some(Self::JsonLd),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::List => "list",
            Self::Fields => "fields",
            Self::JsonLd => "json-ld",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TableData {
    pub caption: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ListData {
    pub title: Option<String>,
    pub items: Vec<String>,
    pub nested: bool,
}

/// Run one extraction mode and return its JSON payload.
pub fn run(
    html: &str,
    mode: ExtractMode,
    selectors: Option<&BTreeMap<String, String>>,
    max_items: usize,
) -> Result<Value, ResearchError> {
    match mode {
        ExtractMode::Table => Ok(json!({
            "kind": "table",
            "tables": extract_tables(html, max_items),
        })),
        ExtractMode::List => Ok(json!({
            "kind": "list",
            "lists": extract_lists(html, max_items),
        })),
        ExtractMode::Fields => {
            let selectors = selectors.ok_or_else(|| {
                ResearchError::invalid("extract_type 'fields' requires a `selectors` map")
            })?;
            Ok(json!({
                "kind": "fields",
                "fields": extract_fields(html, selectors)?,
            }))
        }
        ExtractMode::JsonLd => Ok(json!({
            "kind": "json-ld",
            "documents": extract_json_ld(html),
        })),
        ExtractMode::Auto => Ok(extract_auto(html)),
    }
}

pub fn extract_tables(html: &str, max_tables: usize) -> Vec<TableData> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let caption_sel = Selector::parse("caption").unwrap();
    let thead_th_sel = Selector::parse("thead th").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let td_sel = Selector::parse("td").unwrap();

    let mut tables = Vec::new();
    for table in document.select(&table_sel).take(max_tables) {
        let caption = table
            .select(&caption_sel)
            .next()
            .map(|c| clean_cell(&element_text(c)))
            .filter(|c| !c.is_empty());

        // Header row: <thead> cells, else <th>s of the first row.
        let mut headers: Vec<String> = table
            .select(&thead_th_sel)
            .map(|th| clean_cell(&element_text(th)))
            .collect();
        let body_rows: Vec<ElementRef> = table.select(&tr_sel).collect();
        if headers.is_empty() {
            if let Some(first) = body_rows.first() {
                headers = first
                    .select(&th_sel)
                    .map(|th| clean_cell(&element_text(th)))
                    .collect();
            }
        }
        if headers.is_empty() {
            continue;
        }

        let rows = body_rows
            .iter()
            .filter_map(|row| {
                let cells: Vec<String> = row
                    .select(&td_sel)
                    .map(|td| clean_cell(&element_text(td)))
                    .collect();
                // Ragged rows (and the header row itself) are dropped.
                if cells.len() != headers.len() {
                    return None;
                }
                Some(headers.iter().cloned().zip(cells).collect())
            })
            .collect();

        tables.push(TableData {
            caption,
            headers,
            rows,
        });
    }
    tables
}

pub fn extract_lists(html: &str, max_lists: usize) -> Vec<ListData> {
    let document = Html::parse_document(html);
    let list_sel = Selector::parse("ul, ol, dl").unwrap();

    let mut lists = Vec::new();
    for list in document.select(&list_sel).take(max_lists) {
        let items = match list.value().name() {
            "dl" => definition_items(list),
            _ => direct_list_items(list),
        };
        if items.is_empty() {
            continue;
        }
        lists.push(ListData {
            title: preceding_heading(list),
            nested: has_nested_list(list),
            items,
        });
    }
    lists
}

pub fn extract_fields(
    html: &str,
    selectors: &BTreeMap<String, String>,
) -> Result<Map<String, Value>, ResearchError> {
    let document = Html::parse_document(html);
    let mut fields = Map::new();

    for (name, css) in selectors {
        let selector = Selector::parse(css).map_err(|_| {
            ResearchError::invalid(format!("invalid CSS selector for field '{name}': {css}"))
        })?;
        let matches: Vec<String> = document
            .select(&selector)
            .map(|el| clean_cell(&element_text(el)))
            .collect();
        let value = match matches.len() {
            0 => Value::Null,
            1 => Value::String(matches.into_iter().next().unwrap()),
            _ => Value::Array(matches.into_iter().map(Value::String).collect()),
        };
        fields.insert(name.clone(), value);
    }
    Ok(fields)
}

/// Every `<script type="application/ld+json">` block that parses; malformed
/// blocks are skipped silently.
pub fn extract_json_ld(html: &str) -> Vec<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();

    document
        .select(&selector)
        .filter_map(|script| {
            let raw: String = script.text().collect();
            serde_json::from_str(&raw).ok()
        })
        .map(sanitize_value)
        .collect()
}

/// JSON-LD first (highest signal), then up to three tables and three lists.
pub fn extract_auto(html: &str) -> Value {
    let mut out = Map::new();
    out.insert("kind".into(), Value::String("auto".into()));

    let json_ld = extract_json_ld(html);
    if !json_ld.is_empty() {
        out.insert("json_ld".into(), Value::Array(json_ld));
    }
    let tables = extract_tables(html, 3);
    if !tables.is_empty() {
        out.insert("tables".into(), serde_json::to_value(tables).unwrap_or_default());
    }
    let lists = extract_lists(html, 3);
    if !lists.is_empty() {
        out.insert("lists".into(), serde_json::to_value(lists).unwrap_or_default());
    }
    Value::Object(out)
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn element_text(el: ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Direct-child `<li>` items only; nested list items belong to their own list.
fn direct_list_items(list: ElementRef) -> Vec<String> {
    list.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .map(|li| clean_cell(&element_text(li)))
        .filter(|item| !item.is_empty())
        .collect()
}

/// `<dl>` children as `"term: definition"` pairs.
fn definition_items(list: ElementRef) -> Vec<String> {
    let mut items = Vec::new();
    let mut term: Option<String> = None;
    for child in list.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "dt" => term = Some(clean_cell(&element_text(child))),
            "dd" => {
                let definition = clean_cell(&element_text(child));
                match term.take() {
                    Some(t) if !t.is_empty() => items.push(format!("{t}: {definition}")),
                    _ => items.push(definition),
                }
            }
            _ => {}
        }
    }
    items.into_iter().filter(|i| !i.is_empty()).collect()
}

/// Nearest heading element among preceding siblings.
fn preceding_heading(list: ElementRef) -> Option<String> {
    const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];
    list.prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| HEADINGS.contains(&el.value().name()))
        .map(|el| clean_cell(&element_text(el)))
        .filter(|t| !t.is_empty())
}

fn has_nested_list(list: ElementRef) -> bool {
    let nested_sel = Selector::parse("ul, ol").unwrap();
    list.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .any(|li| li.select(&nested_sel).next().is_some())
}

/// Recursively sanitize every string in a JSON-LD document.
fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(clean_cell(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (clean_cell(&k), sanitize_value(v)))
                .collect(),
        ),
        other => other,
    }
}
