//! Reconstruction of the heading outline from a flat, document-order list.

use std::mem;

use serde::Serialize;

use crate::heading::{HeadingLevel, HeadingRecord};

/// One entry of the table of contents.
///
/// Synthetic nodes have no level, text or anchor; they hold headings that have
/// no parent at the level being partitioned (for example an `h3` directly
/// below an `h1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocNode {
    level: Option<HeadingLevel>,
    text: String,
    anchor: String,
    children: Vec<TocNode>,
}

impl TocNode {
    fn from_record(record: &HeadingRecord) -> Self {
        Self {
            level: Some(record.level),
            text: record.text.clone(),
            anchor: record.anchor.clone(),
            children: Vec::new(),
        }
    }

    fn synthetic() -> Self {
        Self {
            level: None,
            text: String::new(),
            anchor: String::new(),
            children: Vec::new(),
        }
    }

    pub fn level(&self) -> Option<HeadingLevel> {
        self.level
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    pub fn children(&self) -> &[TocNode] {
        &self.children
    }

    pub fn is_synthetic(&self) -> bool {
        self.level.is_none()
    }

    pub(crate) fn into_children(self) -> Vec<TocNode> {
        self.children
    }
}

/// Build the outline forest for `headings`.
///
/// Headings are partitioned at `h1` boundaries; each chunk's trailing
/// headings are then partitioned at `h2`, and so on down to `h6`. Headings
/// preceding the first boundary at a level are grouped under a synthetic node.
pub fn build_forest(headings: &[HeadingRecord]) -> Vec<TocNode> {
    let nodes = headings.iter().map(TocNode::from_record).collect();
    partition(nodes, HeadingLevel::MIN)
}

fn partition(nodes: Vec<TocNode>, level: HeadingLevel) -> Vec<TocNode> {
    let mut forest = Vec::new();
    let mut current: Option<TocNode> = None;

    for node in nodes {
        if node.level == Some(level) {
            if let Some(done) = current.take() {
                forest.push(settle(done, level));
            }
            current = Some(node);
        } else {
            current
                .get_or_insert_with(TocNode::synthetic)
                .children
                .push(node);
        }
    }

    if let Some(done) = current {
        forest.push(settle(done, level));
    }

    forest
}

// A synthetic node is only ever created to receive a child, so it is never
// emitted empty.
fn settle(mut node: TocNode, level: HeadingLevel) -> TocNode {
    if node.children.is_empty() {
        return node;
    }
    if let Some(next) = level.deeper() {
        let provisional = mem::take(&mut node.children);
        node.children = partition(provisional, next);
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(level: u8, text: &str, anchor: &str) -> HeadingRecord {
        HeadingRecord::new(HeadingLevel::new(level).unwrap(), text, anchor)
    }

    fn texts(nodes: &[TocNode]) -> Vec<&str> {
        nodes.iter().map(TocNode::text).collect()
    }

    #[test]
    fn nests_standard_outline() {
        let forest = build_forest(&[
            heading(1, "Title", "t"),
            heading(2, "A", "a"),
            heading(3, "A.1", "a1"),
            heading(2, "B", "b"),
        ]);

        assert_eq!(texts(&forest), vec!["Title"]);
        let title = &forest[0];
        assert_eq!(texts(title.children()), vec!["A", "B"]);
        assert_eq!(texts(title.children()[0].children()), vec!["A.1"]);
        assert!(title.children()[1].children().is_empty());
    }

    #[test]
    fn skipped_level_gets_synthetic_parent() {
        let forest = build_forest(&[heading(1, "Title", "t"), heading(3, "Sub", "s")]);

        let title = &forest[0];
        assert_eq!(title.children().len(), 1);
        let synthetic = &title.children()[0];
        assert!(synthetic.is_synthetic());
        assert_eq!(synthetic.text(), "");
        assert_eq!(synthetic.anchor(), "");
        assert_eq!(texts(synthetic.children()), vec!["Sub"]);
    }

    #[test]
    fn leading_deeper_heading_is_grouped_before_first_boundary() {
        let forest = build_forest(&[heading(2, "X", "x"), heading(1, "Y", "y")]);

        assert_eq!(forest.len(), 2);
        assert!(forest[0].is_synthetic());
        assert_eq!(texts(forest[0].children()), vec!["X"]);
        assert_eq!(forest[1].text(), "Y");
        assert!(forest[1].children().is_empty());
    }

    #[test]
    fn all_h6_headings_keep_every_entry() {
        let forest = build_forest(&[heading(6, "a", "a"), heading(6, "b", "b")]);

        // One synthetic node per missing level h1..h5.
        let mut node = &forest[0];
        for _ in 0..4 {
            assert!(node.is_synthetic());
            assert_eq!(node.children().len(), 1);
            node = &node.children()[0];
        }
        assert!(node.is_synthetic());
        assert_eq!(texts(node.children()), vec!["a", "b"]);
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        assert!(build_forest(&[]).is_empty());
    }

    #[test]
    fn preserves_levels_on_real_nodes() {
        let forest = build_forest(&[heading(1, "T", "t")]);
        assert_eq!(forest[0].level(), HeadingLevel::new(1).ok());
        assert_eq!(forest[0].anchor(), "t");
    }
}
