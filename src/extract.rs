//! Text extraction from HTML and PDF sources.
//!
//! Produces clean linear text for chunking: non-visible and boilerplate
//! elements are dropped, a heading and the content that follows it stay in one
//! block, and whitespace is normalized.

use crate::error::{AifaqError, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

/// Elements whose content never reaches the corpus.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "form", "template", "svg",
    "iframe", "head",
];

/// Elements that flow inside a line instead of starting a new one.
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "dfn", "em", "i", "kbd", "mark",
    "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var", "wbr",
    "label", "font",
];

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Content roots tried, in order, for ReadTheDocs-style pages.
pub const DOCS_CONTENT_ROOTS: &[&str] = &[
    "main#main-content",
    "div[role=\"main\"]",
    "main",
    "article",
    "div.document",
];

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}\f\v]+").unwrap());
static EDGE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" ?\n ?").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Text and title extracted from an HTML page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedHtml {
    pub title: Option<String>,
    pub text: String,
}

/// Collapse horizontal whitespace, squeeze blank-line runs to a single blank
/// line and trim the whole text.
pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = EDGE_WS.replace_all(&text, "\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Extract linear text from a full HTML page.
pub fn extract_html(html: &str) -> ExtractedHtml {
    extract_html_within(html, &["body"])
}

/// Extract text from the first element matching one of `roots`, falling back
/// to `<body>` and then the document root.
pub fn extract_html_within(html: &str, roots: &[&str]) -> ExtractedHtml {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| normalize_inline(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let root = roots
        .iter()
        .chain(std::iter::once(&"body"))
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut collector = BlockCollector::default();
    collector.walk(root);
    collector.flush();

    ExtractedHtml {
        title,
        text: normalize_whitespace(&collector.into_sections()),
    }
}

/// Extract one text per page from a PDF byte stream.
///
/// Pages that contain no text yield an empty string so page numbers stay aligned.
pub fn extract_pdf_pages(bytes: &[u8], source_id: &str) -> Result<Vec<String>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| {
        AifaqError::Extraction {
            source_id: source_id.to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(pages.iter().map(|p| normalize_whitespace(p)).collect())
}

fn normalize_inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A line of visible text, remembering whether it came from a heading.
#[derive(Debug)]
struct Line {
    text: String,
    heading: bool,
}

#[derive(Default)]
struct BlockCollector {
    lines: Vec<Line>,
    current: String,
}

impl BlockCollector {
    fn walk(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        if SKIP_TAGS.contains(&name) {
            return;
        }

        if HEADING_TAGS.contains(&name) {
            self.flush();
            let text = normalize_inline(&element.text().collect::<String>());
            if !text.is_empty() {
                self.lines.push(Line { text, heading: true });
            }
            return;
        }

        if name == "br" {
            self.flush();
            return;
        }

        let inline = INLINE_TAGS.contains(&name);
        if !inline {
            self.flush();
        }

        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    self.current.push_str(text);
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.walk(child_el);
                    }
                }
                _ => {}
            }
        }

        if !inline {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let text = normalize_inline(&self.current);
        self.current.clear();
        if !text.is_empty() {
            self.lines.push(Line { text, heading: false });
        }
    }

    /// Group lines into blocks: each heading opens a block holding the lines
    /// up to the next heading. Blocks are separated by a blank line.
    fn into_sections(self) -> String {
        let mut sections: Vec<String> = Vec::new();
        let mut current = String::new();

        for line in self.lines {
            if line.heading && !current.is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(&line.text);
        }
        if !current.is_empty() {
            sections.push(current);
        }

        sections.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let raw = "  Hello \t  world  \n\n\n\n  Next   paragraph \r\n";
        assert_eq!(normalize_whitespace(raw), "Hello world\n\nNext paragraph");
    }

    #[test]
    fn test_normalize_keeps_single_blank_line() {
        assert_eq!(normalize_whitespace("a\n\nb\nc"), "a\n\nb\nc");
    }

    #[test]
    fn test_boilerplate_removed() {
        let html = r#"
            <html>
              <head><title>About us</title><style>body { color: red }</style></head>
              <body>
                <header>Site logo</header>
                <nav><a href="/">Home</a> <a href="/faq">FAQ</a></nav>
                <script>var tracking = 1;</script>
                <p>We help founders build enduring companies.</p>
                <form><input name="q"/>Search</form>
                <noscript>Enable JavaScript</noscript>
                <footer>Copyright 2024</footer>
              </body>
            </html>
        "#;

        let extracted = extract_html(html);
        assert_eq!(extracted.title.as_deref(), Some("About us"));
        assert_eq!(extracted.text, "We help founders build enduring companies.");
    }

    #[test]
    fn test_heading_grouped_with_following_content() {
        let html = r#"
            <body>
              <h2>Mission</h2>
              <p>Globalize Silicon Valley.</p>
              <p>Support <b>idea-stage</b> founders.</p>
              <h2>Programs</h2>
              <div>Four-month accelerator.</div>
            </body>
        "#;

        let text = extract_html(html).text;
        assert_eq!(
            text,
            "Mission\nGlobalize Silicon Valley.\nSupport idea-stage founders.\n\nPrograms\nFour-month accelerator."
        );
    }

    #[test]
    fn test_inline_elements_stay_on_one_line() {
        let text = extract_html("<p>Apply <a href='/apply'>here</a> today.</p>").text;
        assert_eq!(text, "Apply here today.");
    }

    #[test]
    fn test_docs_content_root_preferred() {
        let html = r#"
            <body>
              <div class="sidebar">Table of contents</div>
              <div role="main"><h1>Install</h1><p>Run the installer.</p></div>
            </body>
        "#;

        let text = extract_html_within(html, DOCS_CONTENT_ROOTS).text;
        assert_eq!(text, "Install\nRun the installer.");
    }

    #[test]
    fn test_empty_page_yields_empty_text() {
        let extracted = extract_html("<html><body><script>x()</script></body></html>");
        assert!(extracted.text.is_empty());
        assert!(extracted.title.is_none());
    }

    #[test]
    fn test_malformed_pdf_is_extraction_error() {
        let result = extract_pdf_pages(b"not a pdf", "broken.pdf");
        assert!(matches!(result, Err(AifaqError::Extraction { .. })));
    }
}
