use regex::{NoExpand, Regex, RegexBuilder};

use crate::tree::TocNode;

/// Serialise `forest` as a `<div>` wrapping nested `<ul>` lists.
pub fn render_forest(forest: &[TocNode], container_class: &str) -> String {
    let mut html = format!(
        "<div class=\"{}\">\n<ul>\n",
        html_escape::encode_double_quoted_attribute(container_class)
    );
    for node in forest {
        push_item(&mut html, node);
    }
    html.push_str("</ul>\n</div>\n");
    html
}

fn push_item(html: &mut String, node: &TocNode) {
    html.push_str("<li>");
    if !node.text().is_empty() {
        html.push_str("<a href=\"#");
        html.push_str(&html_escape::encode_double_quoted_attribute(node.anchor()));
        html.push_str("\">");
        html.push_str(&html_escape::encode_text(node.text()));
        html.push_str("</a>");
    }
    if !node.children().is_empty() {
        html.push_str("<ul>\n");
        for child in node.children() {
            push_item(html, child);
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</li>\n");
}

/// Case-insensitive matcher for a literal placeholder token.
#[derive(Debug, Clone)]
pub struct Placeholder {
    literal: String,
    pattern: Regex,
}

impl Placeholder {
    pub fn new(literal: &str) -> Self {
        let pattern = RegexBuilder::new(&regex::escape(literal))
            .case_insensitive(true)
            .build()
            .expect("escaped literal is always a valid pattern");
        Self {
            literal: literal.to_string(),
            pattern,
        }
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn occurs_in(&self, markup: &str) -> bool {
        self.pattern.is_match(markup)
    }

    /// Replace every occurrence in `markup` with `replacement`.
    ///
    /// Occurrences inside `replacement` itself are neutralised first so the
    /// result never contains the placeholder again.
    pub fn substitute(&self, markup: &str, replacement: &str) -> String {
        let neutral = self.neutralize(replacement);
        self.pattern
            .replace_all(markup, NoExpand(&neutral))
            .into_owned()
    }

    fn neutralize(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let found = &caps[0];
                let mut chars = found.chars();
                match chars.next() {
                    Some(first) => format!("&#{};{}", u32::from(first), chars.as_str()),
                    None => String::new(),
                }
            })
            .into_owned()
    }
}
