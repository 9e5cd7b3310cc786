use std::fmt;
use std::ops::Range;

use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;
use serde::Serialize;

use crate::error::LevelError;

/// Tag body up to the closing `>`; quoted attribute values may contain `>`.
const TAG_BODY: &str = r#"(?:"[^"]*"|'[^']*'|[^'">])*"#;

/// Elements whose content is text, never markup.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

lazy_static! {
    static ref OPEN_TAG: Regex = Regex::new(&format!(r"(?i)<h([1-6])(\s{TAG_BODY})?>")).unwrap();
    static ref CLOSE_TAG: Regex = Regex::new(r"(?i)</h[1-6]\s*>").unwrap();
    // Comments and raw-text elements; unterminated ones run to the end of input.
    static ref OPAQUE: Regex = {
        let mut alternatives = vec![r"<!--.*?(?:-->|\z)".to_owned()];
        alternatives.extend(
            RAW_TEXT_ELEMENTS
                .iter()
                .map(|name| format!(r"<{name}\b{TAG_BODY}>.*?(?:</{name}\s*>|\z)")),
        );
        Regex::new(&format!("(?is){}", alternatives.join("|"))).unwrap()
    };
    static ref ATTRIBUTE: Regex = Regex::new(
        r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#
    )
    .unwrap();
    static ref TAG: Regex = Regex::new(&format!("<{TAG_BODY}>")).unwrap();
}

/// Nominal heading depth, `h1` through `h6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    pub const MIN: HeadingLevel = HeadingLevel(1);
    pub const MAX: HeadingLevel = HeadingLevel(6);

    pub fn new(value: u8) -> Result<Self, LevelError> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(HeadingLevel(value))
        } else {
            Err(LevelError::OutOfRange(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The next deeper level, or `None` past `h6`.
    pub fn deeper(self) -> Option<HeadingLevel> {
        HeadingLevel::new(self.0 + 1).ok()
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = LevelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        HeadingLevel::new(value)
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// One heading found in the source markup, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadingRecord {
    pub level: HeadingLevel,
    pub text: String,
    pub anchor: String,
}

impl HeadingRecord {
    pub fn new(level: HeadingLevel, text: impl Into<String>, anchor: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            anchor: anchor.into(),
        }
    }
}

/// Source of headings for a markup fragment.
pub trait HeadingExtractor {
    fn extract(&self, markup: &str) -> Vec<HeadingRecord>;
}

impl<F> HeadingExtractor for F
where
    F: Fn(&str) -> Vec<HeadingRecord>,
{
    fn extract(&self, markup: &str) -> Vec<HeadingRecord> {
        self(markup)
    }
}

/// Scans rendered HTML for `<h1>`..`<h6>` elements.
///
/// A heading ends at the first closing heading tag of any level, at the next
/// opening heading tag, or at the end of input, which mirrors how HTML parsers
/// recover from mismatched heading tags. Comments and the bodies of
/// `script`, `style`, `textarea` and `title` elements are never scanned.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupExtractor;

impl HeadingExtractor for MarkupExtractor {
    fn extract(&self, markup: &str) -> Vec<HeadingRecord> {
        let opaque: Vec<Range<usize>> = OPAQUE.find_iter(markup).map(|m| m.range()).collect();
        let mut headings = Vec::new();
        let mut cursor = 0usize;

        while let Some(open) = first_outside(&OPEN_TAG, markup, cursor, &opaque) {
            let tag = open.range();
            let Some(caps) = OPEN_TAG.captures_at(markup, tag.start) else {
                break;
            };

            let Some(level) = caps
                .get(1)
                .and_then(|digit| digit.as_str().parse::<u8>().ok())
                .and_then(|value| HeadingLevel::new(value).ok())
            else {
                cursor = tag.end;
                continue;
            };

            let (inner_end, resume) = heading_end(markup, tag.end, &opaque);
            if inner_end == markup.len() && resume == markup.len() {
                trace!("{level} at byte {} has no closing tag", tag.start);
            }

            let attributes = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            headings.push(HeadingRecord {
                level,
                text: inner_text(&markup[tag.end..inner_end]),
                anchor: id_attribute(attributes),
            });
            cursor = resume;
        }

        debug!("extracted {} heading(s)", headings.len());
        headings
    }
}

/// First match of `pattern` at or after `start` that does not begin inside an opaque region.
fn first_outside<'m>(
    pattern: &Regex,
    markup: &'m str,
    start: usize,
    opaque: &[Range<usize>],
) -> Option<regex::Match<'m>> {
    let mut from = start;
    while let Some(found) = pattern.find_at(markup, from) {
        match opaque.iter().find(|range| range.contains(&found.start())) {
            Some(range) => from = range.end.max(found.end()),
            None => return Some(found),
        }
    }
    None
}

/// Returns the end of the heading content and the offset to resume scanning from.
fn heading_end(markup: &str, content_start: usize, opaque: &[Range<usize>]) -> (usize, usize) {
    let close = first_outside(&CLOSE_TAG, markup, content_start, opaque);
    let next_open = first_outside(&OPEN_TAG, markup, content_start, opaque);

    match (close, next_open) {
        (Some(close), Some(open)) if open.start() < close.start() => (open.start(), open.start()),
        (Some(close), _) => (close.start(), close.end()),
        (None, Some(open)) => (open.start(), open.start()),
        (None, None) => (markup.len(), markup.len()),
    }
}

fn inner_text(fragment: &str) -> String {
    let visible = OPAQUE.replace_all(fragment, "");
    let without_tags = TAG.replace_all(&visible, "");
    html_escape::decode_html_entities(&without_tags).into_owned()
}

fn id_attribute(attributes: &str) -> String {
    ATTRIBUTE
        .captures_iter(attributes)
        .find(|caps| caps[1].eq_ignore_ascii_case("id"))
        .and_then(|caps| caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4)))
        .map(|value| html_escape::decode_html_entities(value.as_str()).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(value: u8) -> HeadingLevel {
        HeadingLevel::new(value).unwrap()
    }

    #[test]
    fn rejects_levels_outside_h1_to_h6() {
        assert_eq!(HeadingLevel::new(0), Err(LevelError::OutOfRange(0)));
        assert_eq!(HeadingLevel::try_from(7), Err(LevelError::OutOfRange(7)));
        assert_eq!(level(6).deeper(), None);
        assert_eq!(level(2).deeper(), Some(level(3)));
    }

    #[test]
    fn extracts_headings_in_document_order() {
        let html = r#"<h1 id="title">Title</h1>
<p>intro</p>
<H3 class="x" ID='deep'>Deep <em>dive</em></H3>
<h2>No id</h2>"#;

        let headings = MarkupExtractor.extract(html);
        assert_eq!(
            headings,
            vec![
                HeadingRecord::new(level(1), "Title", "title"),
                HeadingRecord::new(level(3), "Deep dive", "deep"),
                HeadingRecord::new(level(2), "No id", ""),
            ]
        );
    }

    #[test]
    fn decodes_entities_in_text_and_anchor() {
        let headings = MarkupExtractor.extract(r#"<h2 id="a&amp;b">Fish &amp; Chips</h2>"#);
        assert_eq!(headings[0].text, "Fish & Chips");
        assert_eq!(headings[0].anchor, "a&b");
    }

    #[test]
    fn accepts_unquoted_ids_and_ignores_similar_attributes() {
        let headings = MarkupExtractor.extract(r#"<h2 data-id="nope" id=plain>X</h2>"#);
        assert_eq!(headings[0].anchor, "plain");
    }

    #[test]
    fn skips_headings_inside_comments() {
        let html = "<!-- <h2 id=\"old\">Old</h2> -->\n<h2 id=\"new\">New</h2>";
        let headings = MarkupExtractor.extract(html);
        assert_eq!(headings, vec![HeadingRecord::new(level(2), "New", "new")]);
    }

    #[test]
    fn recovers_from_mismatched_and_unclosed_tags() {
        let html = "<h2 id=\"a\">A</h3><h2 id=\"b\">B<h3 id=\"c\">C";
        let headings = MarkupExtractor.extract(html);
        assert_eq!(
            headings,
            vec![
                HeadingRecord::new(level(2), "A", "a"),
                HeadingRecord::new(level(2), "B", "b"),
                HeadingRecord::new(level(3), "C", "c"),
            ]
        );
    }

    #[test]
    fn quoted_attribute_values_may_contain_angle_brackets() {
        let html = r#"<h2 title="a>b" id="x">Hello <em class='c>d'>world</em></h2>"#;
        let headings = MarkupExtractor.extract(html);
        assert_eq!(headings, vec![HeadingRecord::new(level(2), "Hello world", "x")]);
    }

    #[test]
    fn id_inside_another_attribute_value_is_not_the_anchor() {
        let headings = MarkupExtractor.extract(r#"<h2 title="see id=wrong" ID="right">X</h2>"#);
        assert_eq!(headings[0].anchor, "right");
    }

    #[test]
    fn heading_tags_inside_a_comment_do_not_end_the_heading() {
        let html = "<h2 id=\"a\">A<!-- </h2><h3>old</h3> --> tail</h2><h2 id=\"b\">B</h2>";
        let headings = MarkupExtractor.extract(html);
        assert_eq!(
            headings,
            vec![
                HeadingRecord::new(level(2), "A tail", "a"),
                HeadingRecord::new(level(2), "B", "b"),
            ]
        );
    }

    #[test]
    fn skips_headings_inside_raw_text_elements() {
        let html = "<script>var s = '<h2 id=\"z\">Z</h2>';</script>\
<style>/* <h3>css</h3> */</style>\
<textarea><h4>draft</h4></textarea>\
<h1>T</h1>";
        let headings = MarkupExtractor.extract(html);
        assert_eq!(headings, vec![HeadingRecord::new(level(1), "T", "")]);
    }

    #[test]
    fn unterminated_comment_hides_the_rest_of_the_input() {
        let html = "<h2 id=\"a\">A</h2><!-- <h2 id=\"b\">B</h2>";
        let headings = MarkupExtractor.extract(html);
        assert_eq!(headings, vec![HeadingRecord::new(level(2), "A", "a")]);
    }

    #[test]
    fn does_not_match_header_or_hr_tags() {
        let html = "<header><hr><h7>x</h7></header>";
        assert!(MarkupExtractor.extract(html).is_empty());
    }

    #[test]
    fn closures_act_as_extractors() {
        let fixed = |_: &str| vec![HeadingRecord::new(level(1), "Only", "only")];
        assert_eq!(fixed.extract("ignored").len(), 1);
    }
}
