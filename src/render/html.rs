//! HTML helpers shared by the renderers
//!
//! This module handles:
//! - Extracting the page title and raw link targets from rendered HTML
//! - Preparing a loaded page for export (base href, page size)
//! - Composing several pages into one merged document

use super::{MergePart, PageSize};
use scraper::{Html, Selector};
use url::Url;

/// A rendered page held by a session
///
/// Only the markup is stored. `scraper::Html` is not `Send`, so the document
/// is re-parsed on each extraction instead of being kept alive across awaits.
#[derive(Debug, Clone)]
pub struct PageDocument {
    /// URL the markup was loaded from (after redirects)
    pub url: Url,

    /// Rendered markup
    pub html: String,
}

impl PageDocument {
    pub fn new(url: Url, html: String) -> Self {
        Self { url, html }
    }

    /// Returns the page title
    ///
    /// Uses the `<title>` element, falling back to the first `<h1>` heading.
    /// Whitespace runs are collapsed; sanitizing for file names happens at
    /// naming time.
    pub fn title(&self) -> Option<String> {
        let document = Html::parse_document(&self.html);
        first_text(&document, "title").or_else(|| first_text(&document, "h1"))
    }

    /// Returns the raw `href` values of every followable anchor
    ///
    /// # Link Extraction Rules
    ///
    /// **Include:**
    /// - `<a href="...">` anywhere in the document
    ///
    /// **Exclude:**
    /// - `<a href="..." download>`
    /// - Empty hrefs and same-page fragments (`#section`)
    ///
    /// Resolution against the page URL and scheme filtering are left to
    /// [`crate::url::join`].
    pub fn hrefs(&self) -> Vec<String> {
        let document = Html::parse_document(&self.html);
        let mut hrefs = Vec::new();

        if let Ok(a_selector) = Selector::parse("a[href]") {
            for element in document.select(&a_selector) {
                // Skip if it has the download attribute
                if element.value().attr("download").is_some() {
                    continue;
                }

                if let Some(href) = element.value().attr("href") {
                    let href = href.trim();
                    if href.is_empty() || href.starts_with('#') {
                        continue;
                    }
                    hrefs.push(href.to_string());
                }
            }
        }

        hrefs
    }

    /// Returns the inner markup of `<body>`, or the whole document if it has none
    pub fn body_html(&self) -> String {
        let document = Html::parse_document(&self.html);
        match Selector::parse("body") {
            Ok(selector) => document
                .select(&selector)
                .next()
                .map(|body| body.inner_html())
                .unwrap_or_else(|| self.html.clone()),
            Err(_) => self.html.clone(),
        }
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escapes text for inclusion in HTML element content or attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Prepares a loaded page for standalone export
///
/// Injects a `<base href>` so relative assets resolve against the original
/// URL, and an `@page` rule carrying the requested page size.
pub fn export_html(page: &PageDocument, page_size: PageSize) -> String {
    let head_extra = format!(
        "<base href=\"{}\"><style>@page {{ size: {}; }}</style>",
        escape_html(page.url.as_str()),
        page_size.css_name()
    );

    match find_ascii_case_insensitive(&page.html, "<head>") {
        Some(pos) => {
            let insert_at = pos + "<head>".len();
            format!(
                "{}{}{}",
                &page.html[..insert_at],
                head_extra,
                &page.html[insert_at..]
            )
        }
        None => format!("<head>{}</head>{}", head_extra, page.html),
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Composes several exported pages into one HTML document
///
/// Each part becomes a section with its own anchor, preceded by a table of
/// contents. Sections start on a new printed page.
pub fn compose_merged(parts: &[MergePart], page_size: PageSize) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Merged document</title>\n");
    html.push_str(&format!(
        "<style>@page {{ size: {}; }} section.part {{ page-break-before: always; }}</style>\n",
        page_size.css_name()
    ));
    html.push_str("</head>\n<body>\n<nav>\n<h1>Contents</h1>\n<ol>\n");

    for (index, part) in parts.iter().enumerate() {
        html.push_str(&format!(
            "<li><a href=\"#part-{}\">{}</a></li>\n",
            index + 1,
            escape_html(&part.title)
        ));
    }
    html.push_str("</ol>\n</nav>\n");

    for (index, part) in parts.iter().enumerate() {
        html.push_str(&format!(
            "<section class=\"part\" id=\"part-{}\">\n<p class=\"source\">{}</p>\n{}\n</section>\n",
            index + 1,
            escape_html(&part.url),
            part.body_html
        ));
    }

    html.push_str("</body>\n</html>\n");
    html
}
