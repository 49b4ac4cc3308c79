use itertools::Itertools;
use scraper::{ElementRef, Html, Node};

pub const DEFAULT_MAX_CHARS: usize = 15_000;

const STRIPPED_TAGS: [&str; 14] = [
    "script", "style", "noscript", "nav", "footer", "iframe", "frame", "frameset", "embed",
    "object", "svg", "meta", "link", "template",
];

/// Flattens rendered markup into model-ready text: non-content elements are
/// dropped, links become `text (Link: href)`, whitespace collapses to single
/// spaces and the result is cut to `max_chars` characters.
///
/// Input that does not open with a tag is taken as already flattened and is
/// only collapsed and cut, so entities decoded on the first pass stay as is.
pub fn normalize(html: &str, max_chars: usize) -> String {
    let collapsed = match is_markup(html) {
        true => {
            let document = Html::parse_document(html);
            let mut raw = String::with_capacity(html.len() / 2);
            walk(document.root_element(), &mut raw);
            collapse_whitespace(&raw)
        }
        false => collapse_whitespace(html),
    };

    match collapsed.chars().count() > max_chars {
        true => collapsed
            .chars()
            .take(max_chars)
            .collect::<String>()
            .trim_end()
            .to_string(),
        false => collapsed,
    }
}

fn is_markup(input: &str) -> bool {
    let mut chars = input.trim_start().chars();
    chars.next() == Some('<')
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '!' || c == '/' || c == '?')
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

fn walk(element: ElementRef, out: &mut String) {
    let name = element.value().name();
    if STRIPPED_TAGS.contains(&name) {
        return;
    }

    if name == "a" {
        let mut inner = String::new();
        walk_children(element, &mut inner);
        let inner = collapse_whitespace(&inner);

        match element
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|h| !h.is_empty())
        {
            Some(href) => out.push_str(&format!(" {} (Link: {}) ", inner, href)),
            None => out.push_str(&format!(" {} ", inner)),
        }
        return;
    }

    walk_children(element, out);
}

fn walk_children(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    walk(child, out);
                }
            }
            _ => {}
        }
    }
}
