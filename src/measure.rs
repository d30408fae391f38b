//! Overflow measurement for pages being filled.
//!
//! The engine only ever asks one question, "does the page currently being
//! filled overflow?", through [`OverflowOracle`]. [`Measure`] implementations
//! estimate heights and are adapted into an oracle by [`Measured`], which
//! applies the shared tolerance rule.

use std::sync::Arc;

use crate::markup::{Block, Inline, Page, ProseNode};

/// Fraction of the visible height that content may exceed before a page counts
/// as overflowing. Absorbs rounding noise from the measurement surface.
pub const OVERFLOW_TOLERANCE: f64 = 0.02;

pub trait OverflowOracle {
    fn is_overflowing(&mut self, page: &Page) -> bool;
}

impl<F> OverflowOracle for F
where
    F: FnMut(&Page) -> bool,
{
    fn is_overflowing(&mut self, page: &Page) -> bool {
        self(page)
    }
}

/// Oracle that never reports overflow. Pagination degrades to one page per
/// section start.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverOverflow;

impl OverflowOracle for NeverOverflow {
    fn is_overflowing(&mut self, _page: &Page) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub content: f64,
    pub visible: f64,
}

impl Extent {
    pub fn overflows(&self) -> bool {
        self.content > self.visible + self.visible * OVERFLOW_TOLERANCE
    }
}

pub trait Measure {
    fn measure(&self, page: &Page) -> Extent;
}

impl<M: Measure + ?Sized> Measure for &M {
    fn measure(&self, page: &Page) -> Extent {
        (**self).measure(page)
    }
}

impl<M: Measure + ?Sized> Measure for Arc<M> {
    fn measure(&self, page: &Page) -> Extent {
        (**self).measure(page)
    }
}

#[derive(Debug, Clone)]
pub struct Measured<M>(pub M);

impl<M: Measure> OverflowOracle for Measured<M> {
    fn is_overflowing(&mut self, page: &Page) -> bool {
        self.0.measure(page).overflows()
    }
}

/// Deterministic page model counting abstract units.
///
/// Every word, footnote reference and work word costs `word` units; the other
/// fields price whole nodes. Line breaks and empty paragraphs are free.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitMeasure {
    pub capacity: f64,
    pub word: f64,
    pub heading: f64,
    pub footnote_block: f64,
    pub html_block: f64,
    pub newspaper_block: f64,
}

impl UnitMeasure {
    pub fn with_capacity(capacity: f64) -> Self {
        Self {
            capacity,
            word: 1.0,
            heading: 1.0,
            footnote_block: 1.0,
            html_block: 1.0,
            newspaper_block: 1.0,
        }
    }

    fn block_units(&self, block: &Block) -> f64 {
        match block {
            Block::Prose(fragment) => fragment
                .nodes
                .iter()
                .map(|node| match node {
                    ProseNode::Heading { .. } => self.heading,
                    ProseNode::Footnote { .. } => self.footnote_block,
                    ProseNode::Paragraph(p) => {
                        let items = p
                            .inlines
                            .iter()
                            .filter(|i| !matches!(i, Inline::LineBreak))
                            .count();
                        items as f64 * self.word
                    }
                })
                .sum(),
            Block::Work(fragment) => {
                let title = if fragment.title.is_some() {
                    self.heading
                } else {
                    0.0
                };
                let words: usize = fragment
                    .paragraphs
                    .iter()
                    .map(|p| p.split_whitespace().count())
                    .sum();
                title + words as f64 * self.word
            }
            Block::Html { .. } => self.html_block,
            Block::Newspaper { .. } => self.newspaper_block,
        }
    }
}

impl Measure for UnitMeasure {
    fn measure(&self, page: &Page) -> Extent {
        Extent {
            content: page.blocks.iter().map(|b| self.block_units(b)).sum(),
            visible: self.capacity,
        }
    }
}

/// Line-count estimate of a page in body-text lines.
///
/// Text wraps at `chars_per_line` characters. Headings take a blank line of
/// spacing and wrap at half width. Work blocks scale both line height and
/// wrap width by point size (relative to 14pt) and letter spacing.
#[derive(Debug, Clone, PartialEq)]
pub struct LineMeasure {
    pub chars_per_line: usize,
    pub lines_per_page: f64,
}

const BODY_SIZE_PT: f64 = 14.0;

impl LineMeasure {
    pub fn new(chars_per_line: usize, lines_per_page: f64) -> Self {
        Self {
            chars_per_line: chars_per_line.max(1),
            lines_per_page,
        }
    }

    fn block_lines(&self, block: &Block) -> f64 {
        let cpl = self.chars_per_line as f64;
        match block {
            Block::Prose(fragment) => fragment
                .nodes
                .iter()
                .map(|node| match node {
                    ProseNode::Heading { text } => {
                        wrapped_lines(text.chars().count(), (cpl / 2.0).max(1.0)) + 1.0
                    }
                    ProseNode::Footnote { number, text } => text
                        .split('\n')
                        .map(|line| {
                            wrapped_lines(line.chars().count() + digits(*number), cpl).max(1.0)
                        })
                        .sum(),
                    ProseNode::Paragraph(p) => p
                        .plain_text()
                        .split('\n')
                        .map(|line| wrapped_lines(line.chars().count(), cpl))
                        .sum(),
                })
                .sum(),
            Block::Work(fragment) => {
                let scale = fragment.style.size_pt / BODY_SIZE_PT;
                let spread = (1.0 + fragment.style.letter_spacing_em).max(0.1);
                let width = (cpl / (scale * spread)).max(1.0);
                let title = match &fragment.title {
                    Some(title) => wrapped_lines(title.chars().count(), (width / 2.0).max(1.0)) + 1.0,
                    None => 0.0,
                };
                let body: f64 = fragment
                    .paragraphs
                    .iter()
                    .map(|p| wrapped_lines(collapsed_len(p), width))
                    .sum();
                (title + body) * scale
            }
            Block::Html { content } => {
                wrapped_lines(collapsed_len(&crate::sanitize::visible_text(content)), cpl)
            }
            Block::Newspaper { markup } => {
                wrapped_lines(collapsed_len(&crate::sanitize::visible_text(markup)), cpl)
            }
        }
    }
}

impl Measure for LineMeasure {
    fn measure(&self, page: &Page) -> Extent {
        Extent {
            content: page.blocks.iter().map(|b| self.block_lines(b)).sum(),
            visible: self.lines_per_page,
        }
    }
}

fn wrapped_lines(chars: usize, width: f64) -> f64 {
    if chars == 0 {
        0.0
    } else {
        (chars as f64 / width).ceil()
    }
}

fn collapsed_len(text: &str) -> usize {
    let mut len = 0usize;
    for (idx, word) in text.split_whitespace().enumerate() {
        if idx > 0 {
            len += 1;
        }
        len += word.chars().count();
    }
    len
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}
