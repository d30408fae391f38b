//! Greedy page filling with backtracking.
//!
//! Every tentative mutation of the page being filled is followed by an
//! oracle query; on overflow the mutation is reverted and the same unit is
//! placed at the top of a fresh page. Pages behind the current one are never
//! revisited.

use crate::markup::{
    Block, Inline, Page, PageClass, Paragraph, ProseClass, ProseFragment, ProseNode, WorkFragment,
};
use crate::measure::OverflowOracle;
use crate::render::{render_chapter, render_html_snippet, render_newspaper, render_work};
use crate::section::{Chapter, HtmlSnippet, Newspaper, Section, Work};
use crate::tokenize::{TokenKind, Tokenizer};

/// Lays out sections into pages. Holds the tokenizer cache so repeated
/// previews of the same book reuse tokenized text.
#[derive(Debug, Default)]
pub struct Paginator {
    tokenizer: Tokenizer,
}

impl Paginator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn paginate<'a, I, O>(&self, sections: I, oracle: &mut O) -> Vec<Page>
    where
        I: IntoIterator<Item = &'a Section>,
        O: OverflowOracle + ?Sized,
    {
        let mut sections = sections.into_iter().peekable();
        if sections.peek().is_none() {
            return Vec::new();
        }

        let mut layout = Layout {
            oracle,
            tokenizer: &self.tokenizer,
            pages: vec![Page::default()],
        };
        let mut count = 0usize;
        for section in sections {
            count += 1;
            layout.begin_section();
            match section {
                Section::Chapter(chapter) => layout.chapter(chapter),
                Section::Work(work) => layout.work(work),
                Section::Html(snippet) => layout.html(snippet),
                Section::Newspaper(newspaper) => layout.newspaper(newspaper),
            }
        }

        let pages = layout.finish();
        tracing::debug!(sections = count, pages = pages.len(), "paginated story");
        pages
    }
}

/// Convenience wrapper around a throwaway [`Paginator`].
pub fn paginate<'a, I, O>(sections: I, oracle: &mut O) -> Vec<Page>
where
    I: IntoIterator<Item = &'a Section>,
    O: OverflowOracle + ?Sized,
{
    Paginator::new().paginate(sections, oracle)
}

struct Layout<'a, O: ?Sized> {
    oracle: &'a mut O,
    tokenizer: &'a Tokenizer,
    /// Never empty while a run is in progress; the last page is being filled.
    pages: Vec<Page>,
}

impl<O: OverflowOracle + ?Sized> Layout<'_, O> {
    fn page(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn overflowing(&mut self) -> bool {
        let last = self.pages.len() - 1;
        self.oracle.is_overflowing(&self.pages[last])
    }

    fn new_page(&mut self) {
        tracing::trace!(page = self.pages.len() + 1, "page break");
        self.pages.push(Page::default());
    }

    /// A section never starts filling a page that already holds content.
    fn begin_section(&mut self) {
        if !self.page().is_empty() {
            self.new_page();
        }
    }

    fn push_block(&mut self, block: Block) {
        self.page().blocks.push(block);
    }

    fn prose(&mut self) -> &mut ProseFragment {
        match self.page().blocks.last_mut() {
            Some(Block::Prose(fragment)) => fragment,
            _ => unreachable!("current block is not a prose fragment"),
        }
    }

    fn paragraph(&mut self) -> &mut Paragraph {
        let fragment = self.prose();
        if !matches!(fragment.nodes.last(), Some(ProseNode::Paragraph(_))) {
            fragment
                .nodes
                .push(ProseNode::Paragraph(Paragraph::default()));
        }
        match fragment.nodes.last_mut() {
            Some(ProseNode::Paragraph(p)) => p,
            _ => unreachable!("paragraph was just ensured"),
        }
    }

    fn work_fragment(&mut self) -> &mut WorkFragment {
        match self.page().blocks.last_mut() {
            Some(Block::Work(fragment)) => fragment,
            _ => unreachable!("current block is not a work fragment"),
        }
    }

    fn chapter(&mut self, chapter: &Chapter) {
        let rendered = render_chapter(chapter);
        let preserve = rendered.preserve_line_breaks;
        let class = ProseClass {
            preserve_breaks: preserve,
            no_dropcap: false,
        };
        self.push_block(Block::Prose(ProseFragment::open(class)));

        if let Some(title) = rendered.title {
            let heading = ProseNode::Heading { text: title };
            self.prose().nodes.insert(0, heading.clone());
            if self.overflowing() {
                self.prose().nodes.remove(0);
                self.new_page();
                let mut fragment = ProseFragment::open(class);
                fragment.nodes.insert(0, heading);
                self.push_block(Block::Prose(fragment));
            }
            self.paragraph().no_indent = true;
        }

        let continued = ProseClass {
            preserve_breaks: preserve,
            no_dropcap: true,
        };
        for para in &rendered.paragraphs {
            // Only preserved paragraphs still contain newlines here.
            for token in self.tokenizer.tokenize(para).iter() {
                let inline = match token.kind {
                    TokenKind::Word => Inline::Word(token.text.clone()),
                    TokenKind::FootnoteRef => Inline::FootnoteRef(token.text.clone()),
                    TokenKind::LineBreak => {
                        self.paragraph().inlines.push(Inline::LineBreak);
                        continue;
                    }
                };
                self.place_inline(inline, continued);
            }
            if self.prose().has_content() {
                self.prose()
                    .nodes
                    .push(ProseNode::Paragraph(Paragraph::default()));
            }
        }

        let footnote_class = ProseClass {
            preserve_breaks: false,
            no_dropcap: true,
        };
        for (idx, text) in rendered.footnotes.into_iter().enumerate() {
            let footnote = ProseNode::Footnote {
                number: idx + 1,
                text,
            };
            self.prose().nodes.push(footnote.clone());
            if self.overflowing() {
                self.prose().nodes.pop();
                self.new_page();
                self.push_block(Block::Prose(ProseFragment {
                    class: footnote_class,
                    nodes: vec![footnote],
                }));
            }
        }
    }

    fn place_inline(&mut self, inline: Inline, continued: ProseClass) {
        let paragraph = self.paragraph();
        let before = paragraph.inlines.len();
        paragraph.inlines.push(inline.clone());
        if !self.overflowing() {
            return;
        }

        self.paragraph().inlines.truncate(before);
        self.new_page();
        let mut fragment = ProseFragment::open(continued);
        if let Some(p) = fragment.last_paragraph_mut() {
            p.inlines.push(inline);
        }
        self.push_block(Block::Prose(fragment));
    }

    fn work(&mut self, work: &Work) {
        let block = render_work(work);
        self.push_block(Block::Work(WorkFragment {
            style: block.style.clone(),
            title: block.title.clone(),
            paragraphs: block.paragraphs.clone(),
        }));
        if !self.overflowing() {
            return;
        }

        tracing::debug!(title = %work.title, "work overflows; filling word by word");
        self.page().blocks.pop();
        self.push_block(Block::Work(WorkFragment {
            style: block.style.clone(),
            title: block.title.clone(),
            paragraphs: vec![String::new()],
        }));

        let last_para = block.paragraphs.len().saturating_sub(1);
        for (idx, para) in block.paragraphs.iter().enumerate() {
            for word in para.split_whitespace() {
                let current = self.work_paragraph();
                let before = current.len();
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                if !self.overflowing() {
                    continue;
                }

                self.work_paragraph().truncate(before);
                self.new_page();
                self.push_block(Block::Work(WorkFragment {
                    style: block.style.clone(),
                    title: None,
                    paragraphs: vec![word.to_owned()],
                }));
            }
            if idx < last_para {
                self.work_fragment().paragraphs.push(String::new());
            }
        }
    }

    fn work_paragraph(&mut self) -> &mut String {
        let fragment = self.work_fragment();
        if fragment.paragraphs.is_empty() {
            fragment.paragraphs.push(String::new());
        }
        let last = fragment.paragraphs.len() - 1;
        &mut fragment.paragraphs[last]
    }

    fn html(&mut self, snippet: &HtmlSnippet) {
        let block = Block::Html {
            content: render_html_snippet(snippet).to_owned(),
        };
        self.push_block(block);
        if self.overflowing() {
            let block = self.page().blocks.pop();
            self.new_page();
            if let Some(block) = block {
                self.push_block(block);
            }
        }
    }

    fn newspaper(&mut self, newspaper: &Newspaper) {
        let page = self.page();
        page.class = PageClass::Newspaper;
        page.blocks.push(Block::Newspaper {
            markup: render_newspaper(newspaper),
        });
    }

    fn finish(mut self) -> Vec<Page> {
        for page in &mut self.pages {
            page.prune_empty();
        }
        if self.pages.last().is_some_and(Page::is_empty) {
            self.pages.pop();
        }
        self.pages
    }
}
