//! HTML and text extraction for portal pages.
//!
//! Every selector and pattern that depends on the portal's markup lives
//! here, so a change in the portal's pages only touches this module.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Rejection reason the portal shows in an inline `alert("...")`
static ALERT_REASON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"alert\("(?P<reason>[^"]*?)"\)"#).expect("alert pattern is valid")
});

/// Session attribute embedded in the post-login page's logout link
static ATTRIBUTE_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ATTRIBUTE_UUID=(\w+)&CSRFHW=").expect("attribute uuid pattern is valid")
});

/// Action URL and named input values of an HTML form
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlForm {
    pub action: String,
    pub fields: BTreeMap<String, String>,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Named inputs under `root` that carry a value. Inputs without a value
/// attribute (typically the blank username/password boxes) are skipped.
fn named_inputs(root: ElementRef<'_>) -> BTreeMap<String, String> {
    let Some(input_sel) = selector("input[name]") else {
        return BTreeMap::new();
    };
    root.select(&input_sel)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value")?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().replace('\\', "")
}

/// Extract the first form matching `css` (for example `form` or
/// `form#formulario`). Returns `None` when no such form or no action exists.
pub fn extract_form(html: &str, css: &str) -> Option<HtmlForm> {
    let document = Html::parse_document(html);
    let form_sel = selector(css)?;
    let form = document.select(&form_sel).next()?;
    let action = form.value().attr("action")?.trim().to_string();
    Some(HtmlForm {
        action,
        fields: named_inputs(form),
    })
}

/// Named input values anywhere in the page
pub fn extract_inputs(html: &str) -> BTreeMap<String, String> {
    let document = Html::parse_document(html);
    named_inputs(document.root_element())
}

/// Cell texts of every row of `table#<id>` that has `<td>` cells.
/// Header-only rows are skipped.
pub fn extract_table(html: &str, id: &str) -> Option<Vec<Vec<String>>> {
    let document = Html::parse_document(html);
    let table_sel = selector(&format!("table#{}", id))?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let table = document.select(&table_sel).next()?;
    let rows = table
        .select(&row_sel)
        .map(|row| row.select(&cell_sel).map(cell_text).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect();
    Some(rows)
}

/// Rejection reason from the last inline script on a failed-login page
pub fn alert_reason(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let script_sel = selector("script")?;
    let script = document.select(&script_sel).last()?;
    let text: String = script.text().collect();
    ALERT_REASON
        .captures(&text)
        .and_then(|caps| caps.name("reason"))
        .map(|m| m.as_str().to_string())
}

/// Attribute UUID from anywhere in a successful login response
pub fn attribute_uuid(body: &str) -> Option<String> {
    ATTRIBUTE_UUID
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
