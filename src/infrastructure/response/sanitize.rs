//! Allow-list sanitizer for markup produced by the model or the local note formatter.

use crate::domain::error::{AppError, Result};
use lol_html::{comments, element, rewrite_str, RewriteStrSettings};
use once_cell::sync::Lazy;
use regex::Regex;

const ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "ul", "ol", "li", "strong", "em", "b", "i", "u",
    "br", "hr", "blockquote", "code", "pre", "span", "div", "table", "thead", "tbody", "tr", "th",
    "td", "a",
];

/// Removed together with everything inside them.
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "head", "title",
];

const VOID_TAGS: &[&str] = &["br", "hr"];

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)\b[^>]*?(/?)>").unwrap());

/// Checks the URL a browser would see: entities decoded, whitespace and controls removed.
fn is_safe_href(raw: &str) -> bool {
    let decoded = html_escape::decode_html_entities(raw);
    let href: String = decoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();

    let head_end = href.find(['/', '?', '#']).unwrap_or(href.len());
    let head = &href[..head_end];
    // A leftover `&` is an entity the decoder did not resolve and may hide a colon.
    if head.contains('&') {
        return false;
    }
    match head.find(':') {
        Some(colon) => SAFE_SCHEMES.contains(&head[..colon].to_ascii_lowercase().as_str()),
        None => true,
    }
}

/// Strip everything outside the allow-list and return markup with balanced tags.
pub fn sanitize_html(html: &str) -> Result<String> {
    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("*", |el| {
                    let tag = el.tag_name().to_ascii_lowercase();
                    if DROPPED_TAGS.contains(&tag.as_str()) {
                        el.remove();
                        return Ok(());
                    }
                    if !ALLOWED_TAGS.contains(&tag.as_str()) {
                        el.remove_and_keep_content();
                        return Ok(());
                    }

                    let names: Vec<String> = el.attributes().iter().map(|a| a.name()).collect();
                    for name in names {
                        let keep = name == "class" || (tag == "a" && name == "href");
                        if !keep {
                            el.remove_attribute(&name);
                        }
                    }
                    if let Some(href) = el.get_attribute("href") {
                        if !is_safe_href(&href) {
                            el.remove_attribute("href");
                        }
                    }
                    Ok(())
                }),
                comments!("*", |c| {
                    c.remove();
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| AppError::ParseError(format!("Failed to sanitize markup: {}", e)))?;

    Ok(balance_tags(&rewritten))
}

/// Drop closing tags with no matching opener and close whatever is left open.
fn balance_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut open: Vec<String> = Vec::new();
    let mut last = 0;

    for caps in TAG_PATTERN.captures_iter(html) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        out.push_str(&html[last..whole.start()]);
        last = whole.end();

        let closing = caps.get(1).map_or(false, |m| !m.as_str().is_empty());
        let self_closing = caps.get(3).map_or(false, |m| !m.as_str().is_empty());
        let tag = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();

        if VOID_TAGS.contains(&tag.as_str()) || self_closing {
            if !closing {
                out.push_str(whole.as_str());
            }
            continue;
        }

        if !closing {
            open.push(tag);
            out.push_str(whole.as_str());
            continue;
        }

        if let Some(pos) = open.iter().rposition(|t| *t == tag) {
            while open.len() > pos + 1 {
                if let Some(inner) = open.pop() {
                    out.push_str(&format!("</{}>", inner));
                }
            }
            open.pop();
            out.push_str(whole.as_str());
        }
    }

    out.push_str(&html[last..]);
    while let Some(tag) = open.pop() {
        out.push_str(&format!("</{}>", tag));
    }
    out
}
