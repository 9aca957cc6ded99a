// src/extract.rs
//! Page text extraction: flat visible text of a document, no structure kept.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};

/// Elements whose content is never rendered.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start and end a line of text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "table", "section", "article", "header",
    "footer", "nav", "aside", "main", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
    "pre", "form", "dd", "dt", "dl", "hr", "figure", "figcaption", "caption", "thead",
    "tbody", "tfoot", "fieldset", "address", "details", "summary",
];

/// Table cells are separated from their neighbours on the same row.
const CELL_TAGS: &[&str] = &["td", "th"];

/// Collect the text of `<body>` (or the whole document when there is none).
/// Headings, hidden elements and everything else collapse into plain lines.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    match Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
    {
        Some(body) => collect_text(body, &mut raw),
        None => collect_text(document.root_element(), &mut raw),
    }

    raw.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef, out: &mut String) {
    for node in element.children() {
        if let Some(el) = ElementRef::wrap(node) {
            let tag = el.value().name();
            if SKIP_TAGS.contains(&tag) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&tag);
            if block {
                out.push('\n');
            }
            collect_text(el, out);
            if block {
                out.push('\n');
            } else if CELL_TAGS.contains(&tag) {
                out.push('\t');
            }
        } else if let Some(text) = node.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Fetch a page for extraction. Non-2xx is an error.
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .with_context(|| format!("fetching {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!("fetching {url}: HTTP {status}"));
    }
    resp.text().await.with_context(|| format!("reading body of {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_body_and_skips_scripts() {
        let html = r#"
            <html>
              <head><title>Ignored title</title><style>p{color:red}</style></head>
              <body>
                <h1>Insulin   basics</h1>
                <p>Metformin is <b>common</b>.</p>
                <script>var x = "not text";</script>
                <div hidden>hidden still counts</div>
              </body>
            </html>"#;
        let text = extract_text(html);
        assert_eq!(
            text,
            "Insulin basics\nMetformin is common.\nhidden still counts"
        );
    }

    #[test]
    fn table_cells_stay_separate_words() {
        let html = "<table><tr><th>Drug</th><th>Use</th></tr>\
                    <tr><td>insulin</td><td>pump</td></tr></table>";
        assert_eq!(extract_text(html), "Drug Use\ninsulin pump");
    }

    #[test]
    fn rules_and_figures_break_lines() {
        let html = "<body>glucose<hr>meter<figure>chart<figcaption>HbA1c</figcaption></figure></body>";
        assert_eq!(extract_text(html), "glucose\nmeter\nchart\nHbA1c");
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(extract_text("<p>A &amp; B&nbsp;C</p>"), "A & B C");
    }

    #[test]
    fn fragment_without_body_still_extracts() {
        assert_eq!(extract_text("just text"), "just text");
    }

    #[test]
    fn empty_document_is_empty() {
        assert_eq!(extract_text(""), "");
        assert_eq!(extract_text("<html><body>  </body></html>"), "");
    }
}
