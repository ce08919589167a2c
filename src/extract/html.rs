//! Main-content extraction from HTML pages
//!
//! Paragraph-scoring pass in the style of Readability: paragraphs vote for
//! their parent and grandparent, containers are weighted by class/id hints
//! and penalised by link density. When no container wins, common content
//! selectors are tried, then the whole body minus page chrome.

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;

use super::clean_whitespace;
use crate::error::{Error, Result};

/// Minimum text length for a scored container to be accepted
const MIN_ARTICLE_CHARS: usize = 250;

/// Minimum text length for a fallback selector or the body
const MIN_FALLBACK_CHARS: usize = 200;

/// Paragraphs shorter than this do not vote
const MIN_PARAGRAPH_CHARS: usize = 25;

const FALLBACK_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".content",
    "#content",
];

/// Elements never counted as content
const CHROME_SELECTOR: &str = "script, style, noscript, nav, footer, header, aside, form, .sidebar, .nav, .menu";

const POSITIVE_HINTS: &[&str] = &[
    "article", "body", "content", "entry", "main", "page", "post", "text", "blog", "story",
];

const NEGATIVE_HINTS: &[&str] = &[
    "comment", "footer", "sidebar", "nav", "menu", "share", "social", "related", "promo",
    "banner", "sponsor", "advert", "popup", "widget",
];

/// Extracted page content
#[derive(Debug, Clone, PartialEq)]
pub struct WebPage {
    pub title: String,
    pub content: String,
    pub site_name: Option<String>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::internal(format!("bad selector {}: {:?}", css, e)))
}

/// Extract title and main text from an HTML document
pub fn extract_web_page(html: &str) -> Result<WebPage> {
    let document = Html::parse_document(html);
    let chrome = selector(CHROME_SELECTOR)?;

    let title = page_title(&document)?;
    let site_name = meta_content(&document, "og:site_name")?;

    let content = match best_candidate(&document, &chrome)? {
        Some(text) => text,
        None => fallback_content(&document, &chrome)?
            .ok_or_else(|| Error::fetch("Could not extract content from this page"))?,
    };

    Ok(WebPage {
        title: title.unwrap_or_else(|| "Untitled".to_string()),
        content,
        site_name,
    })
}

fn page_title(document: &Html) -> Result<Option<String>> {
    let title_sel = selector("title")?;
    let title = document
        .select(&title_sel)
        .next()
        .map(|t| clean_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    match title {
        Some(t) => Ok(Some(t)),
        None => meta_content(document, "og:title"),
    }
}

fn meta_content(document: &Html, property: &str) -> Result<Option<String>> {
    let sel = selector(&format!("meta[property=\"{}\"]", property))?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(clean_whitespace)
        .filter(|s| !s.is_empty()))
}

/// Visible text under `root`, skipping chrome subtrees
fn visible_text(root: ElementRef, chrome: &Selector) -> String {
    let mut out = String::new();
    collect_text(root, chrome, &mut out);
    clean_whitespace(&out)
}

fn collect_text(element: ElementRef, chrome: &Selector, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if !chrome.matches(&child_el) {
                        collect_text(child_el, chrome, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn inside_chrome(element: ElementRef, chrome: &Selector) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| chrome.matches(&ancestor))
}

/// Weight from class and id hints
fn class_weight(element: ElementRef) -> f64 {
    let value = element.value();
    let hints = format!(
        "{} {}",
        value.attr("class").unwrap_or_default(),
        value.attr("id").unwrap_or_default()
    )
    .to_lowercase();

    let mut weight = 0.0;
    if NEGATIVE_HINTS.iter().any(|h| hints.contains(h)) {
        weight -= 25.0;
    }
    if POSITIVE_HINTS.iter().any(|h| hints.contains(h)) {
        weight += 25.0;
    }
    weight
}

fn tag_weight(element: ElementRef) -> f64 {
    match element.value().name() {
        "article" | "main" => 10.0,
        "div" | "section" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "ol" | "ul" | "dl" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    }
}

fn link_density(element: ElementRef, chrome: &Selector, links: &Selector) -> f64 {
    let total = visible_text(element, chrome).chars().count();
    if total == 0 {
        return 1.0;
    }
    let linked: usize = element
        .select(links)
        .map(|a| clean_whitespace(&a.text().collect::<String>()).chars().count())
        .sum();
    (linked as f64 / total as f64).min(1.0)
}

fn best_candidate(document: &Html, chrome: &Selector) -> Result<Option<String>> {
    let paragraphs = selector("p, pre, td, blockquote")?;
    let links = selector("a")?;

    let mut scores = HashMap::new();

    for paragraph in document.select(&paragraphs) {
        if inside_chrome(paragraph, chrome) {
            continue;
        }
        let text = clean_whitespace(&paragraph.text().collect::<String>());
        let len = text.chars().count();
        if len < MIN_PARAGRAPH_CHARS {
            continue;
        }

        let score = 1.0 + text.matches(',').count() as f64 + (len as f64 / 100.0).min(3.0);

        let mut ancestors = paragraph.ancestors().filter_map(ElementRef::wrap);
        if let Some(parent) = ancestors.next() {
            *scores
                .entry(parent.id())
                .or_insert_with(|| tag_weight(parent) + class_weight(parent)) += score;

            if let Some(grandparent) = ancestors.next() {
                *scores
                    .entry(grandparent.id())
                    .or_insert_with(|| tag_weight(grandparent) + class_weight(grandparent)) +=
                    score / 2.0;
            }
        }
    }

    let best = scores
        .into_iter()
        .filter_map(|(id, score)| {
            let element = document.tree.get(id).and_then(ElementRef::wrap)?;
            let adjusted = score * (1.0 - link_density(element, chrome, &links));
            Some((element, adjusted))
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(best
        .map(|(element, _)| visible_text(element, chrome))
        .filter(|text| text.chars().count() >= MIN_ARTICLE_CHARS))
}

fn fallback_content(document: &Html, chrome: &Selector) -> Result<Option<String>> {
    for css in FALLBACK_SELECTORS {
        let sel = selector(css)?;
        if let Some(element) = document.select(&sel).next() {
            let text = clean_whitespace(&element.text().collect::<String>());
            if text.chars().count() > MIN_FALLBACK_CHARS {
                return Ok(Some(text));
            }
        }
    }

    let body = selector("body")?;
    Ok(document
        .select(&body)
        .next()
        .map(|b| visible_text(b, chrome))
        .filter(|text| text.chars().count() > MIN_FALLBACK_CHARS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(n: usize) -> String {
        format!(
            "<p>Paragraph {} explains ownership, borrowing, and lifetimes in enough detail to count as real content for the reader.</p>",
            n
        )
    }

    #[test]
    fn test_picks_article_over_navigation() {
        let body: String = (0..5).map(paragraph).collect();
        let html = format!(
            r#"<html><head><title>Rust Ownership</title>
            <meta property="og:site_name" content="Rust Blog"></head>
            <body>
              <nav><a href="/">Home</a> <a href="/about">About</a></nav>
              <div class="post-body">{}</div>
              <footer>Copyright footer text</footer>
            </body></html>"#,
            body
        );

        let page = extract_web_page(&html).unwrap();
        assert_eq!(page.title, "Rust Ownership");
        assert_eq!(page.site_name.as_deref(), Some("Rust Blog"));
        assert!(page.content.starts_with("Paragraph 0 explains"));
        assert!(!page.content.contains("Home"));
        assert!(!page.content.contains("Copyright"));
    }

    #[test]
    fn test_falls_back_to_body_without_chrome() {
        // No paragraphs: only the body fallback can succeed
        let text = "word ".repeat(60);
        let html = format!(
            "<html><body><header>Site header</header><span>{}</span><script>var x = 1;</script></body></html>",
            text
        );

        let page = extract_web_page(&html).unwrap();
        assert_eq!(page.title, "Untitled");
        assert!(page.content.starts_with("word word"));
        assert!(!page.content.contains("Site header"));
        assert!(!page.content.contains("var x"));
    }

    #[test]
    fn test_too_little_content_is_an_error() {
        let html = "<html><head><title>Empty</title></head><body><p>Short.</p></body></html>";
        let err = extract_web_page(html).unwrap_err();
        assert_eq!(err.to_string(), "Could not extract content from this page");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let body: String = (0..4).map(paragraph).collect();
        let html = format!("<html><body><article>\n\n{}\n\n</article></body></html>", body);
        let page = extract_web_page(&html).unwrap();
        assert!(!page.content.contains('\n'));
        assert!(!page.content.contains("  "));
    }
}
