use html_toc_config::TocSettings;
pub use html_toc_config::{DEFAULT_CONTAINER_CLASS, DEFAULT_PLACEHOLDER};
use log::debug;

use crate::heading::{HeadingExtractor, MarkupExtractor};
use crate::render::{render_forest, Placeholder};
use crate::tree::{build_forest, TocNode};

/// Rendering knobs for [`TocFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocOptions {
    /// Literal token replaced by the rendered TOC, matched case-insensitively.
    pub placeholder: String,
    pub container_class: String,
    /// Treat a lone top-level heading as the document title and list only its children.
    pub skip_title: bool,
}

impl Default for TocOptions {
    fn default() -> Self {
        Self::from(&TocSettings::default())
    }
}

impl From<&TocSettings> for TocOptions {
    fn from(settings: &TocSettings) -> Self {
        Self {
            placeholder: settings.placeholder.clone(),
            container_class: settings.container_class.clone(),
            skip_title: settings.skip_title,
        }
    }
}

/// Output filter that replaces placeholder tokens with a table of contents.
pub struct TocFilter<E = MarkupExtractor> {
    extractor: E,
    options: TocOptions,
    placeholder: Placeholder,
}

impl TocFilter<MarkupExtractor> {
    pub fn new(options: TocOptions) -> Self {
        Self::with_extractor(MarkupExtractor, options)
    }
}

impl Default for TocFilter<MarkupExtractor> {
    fn default() -> Self {
        Self::new(TocOptions::default())
    }
}

impl<E: HeadingExtractor> TocFilter<E> {
    pub fn with_extractor(extractor: E, options: TocOptions) -> Self {
        let placeholder = Placeholder::new(&options.placeholder);
        Self {
            extractor,
            options,
            placeholder,
        }
    }

    pub fn options(&self) -> &TocOptions {
        &self.options
    }

    /// The forest that [`apply`](Self::apply) would render for `markup`.
    pub fn toc(&self, markup: &str) -> Vec<TocNode> {
        let headings = self.extractor.extract(markup);
        if headings.is_empty() {
            return Vec::new();
        }

        let mut forest = build_forest(&headings);
        if self.options.skip_title && forest.len() == 1 {
            forest = forest.remove(0).into_children();
        }
        debug!(
            "{} heading(s) -> {} top-level toc node(s)",
            headings.len(),
            forest.len()
        );
        forest
    }

    /// Rendered TOC block for `markup`, or `None` when there is nothing to list.
    pub fn render(&self, markup: &str) -> Option<String> {
        let forest = self.toc(markup);
        if forest.is_empty() {
            return None;
        }
        Some(render_forest(&forest, &self.options.container_class))
    }

    /// Replace every placeholder in `markup` with the rendered TOC.
    ///
    /// Returns the input unchanged when it contains no placeholder, no headings,
    /// or only a title heading.
    pub fn apply(&self, markup: &str) -> String {
        if self.options.placeholder.is_empty() || !self.placeholder.occurs_in(markup) {
            return markup.to_string();
        }
        match self.render(markup) {
            Some(block) => self.placeholder.substitute(markup, &block),
            None => markup.to_string(),
        }
    }
}

/// Apply the default filter (`[toc]` placeholder, `toc` class, title skipped).
pub fn render_toc(markup: &str) -> String {
    TocFilter::new(TocOptions::default()).apply(markup)
}
