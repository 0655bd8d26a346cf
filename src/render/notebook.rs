//! Jupyter notebook to HTML conversion
//!
//! Notebooks are downloaded as JSON rather than rendered by a browser. This
//! module turns the `.ipynb` document into a self-contained HTML page:
//! markdown cells through pulldown-cmark, code cells and their text outputs
//! as escaped `<pre>` blocks.

use super::html::escape_html;
use super::RenderError;
use pulldown_cmark::{html, Parser};
use serde_json::Value;

/// Converts notebook JSON into an HTML document
///
/// The document title comes from `metadata.title`, then from the first
/// markdown heading, and defaults to "Notebook".
///
/// # Errors
///
/// Returns `RenderError::Notebook` if the text is not JSON or has no `cells`
/// array.
pub fn convert_notebook_to_html(text: &str) -> Result<String, RenderError> {
    let notebook: Value =
        serde_json::from_str(text).map_err(|e| RenderError::Notebook(e.to_string()))?;

    let cells = notebook
        .get("cells")
        .and_then(Value::as_array)
        .ok_or_else(|| RenderError::Notebook("missing cells array".to_string()))?;

    let mut body = String::new();
    let mut first_heading = None;

    for cell in cells {
        let source = joined_text(cell.get("source"));

        match cell.get("cell_type").and_then(Value::as_str) {
            Some("markdown") => {
                if first_heading.is_none() {
                    first_heading = source
                        .lines()
                        .find_map(|line| line.trim().strip_prefix('#'))
                        .map(|heading| heading.trim_start_matches('#').trim().to_string())
                        .filter(|heading| !heading.is_empty());
                }
                body.push_str("<div class=\"cell markdown\">\n");
                html::push_html(&mut body, Parser::new(&source));
                body.push_str("</div>\n");
            }
            Some("code") => {
                body.push_str("<div class=\"cell code\">\n<pre class=\"input\"><code>");
                body.push_str(&escape_html(&source));
                body.push_str("</code></pre>\n");
                for output in cell
                    .get("outputs")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    if let Some(text) = output_text(output) {
                        body.push_str("<pre class=\"output\">");
                        body.push_str(&escape_html(&text));
                        body.push_str("</pre>\n");
                    }
                }
                body.push_str("</div>\n");
            }
            _ => {
                body.push_str("<pre class=\"cell raw\">");
                body.push_str(&escape_html(&source));
                body.push_str("</pre>\n");
            }
        }
    }

    let title = notebook
        .get("metadata")
        .and_then(|m| m.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(first_heading)
        .unwrap_or_else(|| "Notebook".to_string());

    Ok(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(&title),
        body
    ))
}

/// Notebook text fields are either a string or a list of line strings
fn joined_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(lines)) => lines.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

fn output_text(output: &Value) -> Option<String> {
    if let Some(text) = output.get("text") {
        return Some(joined_text(Some(text)));
    }

    output
        .get("data")
        .and_then(|data| data.get("text/plain"))
        .map(|text| joined_text(Some(text)))
}
