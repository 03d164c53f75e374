use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};

const SKIPPED_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

pub fn clean_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    clean_text(&out)
}

/// Whitespace-normalised text of the whole document, without script or style bodies.
pub fn document_text(document: &Html) -> String {
    inner_text(document.root_element())
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

pub fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).find_map(|node| non_empty(inner_text(node)))
}

pub fn first_attr(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .find_map(|el| el.value().attr(attr))
        .and_then(|value| non_empty(value.trim().to_string()))
}

pub fn absolute_url(base: &Url, href: Option<String>) -> Option<String> {
    let href = href?;
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
}

pub fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}
