//! Structured page tree produced by pagination.
//!
//! Layout works on this tree instead of markup strings; HTML is produced only
//! at the export boundary via [`Page::to_html`].

use serde::Serialize;

use crate::render::WorkStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageClass {
    #[default]
    Regular,
    Newspaper,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Page {
    pub class: PageClass,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Prose(ProseFragment),
    Work(WorkFragment),
    Html { content: String },
    Newspaper { markup: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProseClass {
    pub preserve_breaks: bool,
    pub no_dropcap: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProseFragment {
    pub class: ProseClass,
    pub nodes: Vec<ProseNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProseNode {
    Heading { text: String },
    Paragraph(Paragraph),
    Footnote { number: usize, text: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Paragraph {
    pub no_indent: bool,
    pub inlines: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Inline {
    Word(String),
    FootnoteRef(String),
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkFragment {
    pub style: WorkStyle,
    pub title: Option<String>,
    pub paragraphs: Vec<String>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Drops empty paragraphs, then prose fragments left with no nodes.
    pub fn prune_empty(&mut self) {
        self.blocks.retain_mut(|block| match block {
            Block::Prose(fragment) => {
                fragment.nodes.retain(|node| match node {
                    ProseNode::Paragraph(p) => !p.is_empty(),
                    _ => true,
                });
                !fragment.nodes.is_empty()
            }
            _ => true,
        });
    }

    pub fn to_html(&self) -> String {
        let mut html = String::from("<div class=\"page");
        if self.class == PageClass::Newspaper {
            html.push_str(" newspaper-page");
        }
        html.push_str("\">");
        for block in &self.blocks {
            block.write_html(&mut html);
        }
        html.push_str("</div>");
        html
    }
}

impl Block {
    fn write_html(&self, out: &mut String) {
        match self {
            Self::Prose(fragment) => fragment.write_html(out),
            Self::Work(fragment) => fragment.write_html(out),
            Self::Html { content } => {
                out.push_str("<div class=\"html-snippet\">");
                out.push_str(content);
                out.push_str("</div>");
            }
            Self::Newspaper { markup } => out.push_str(markup),
        }
    }
}

impl ProseClass {
    pub fn css_classes(self) -> String {
        let mut classes = String::from("chapter-prose");
        if self.preserve_breaks {
            classes.push_str(" preserve-breaks");
        }
        if self.no_dropcap {
            classes.push_str(" no-dropcap");
        }
        classes
    }
}

impl ProseFragment {
    /// A fragment holding a single empty paragraph, ready to be filled.
    pub fn open(class: ProseClass) -> Self {
        Self {
            class,
            nodes: vec![ProseNode::Paragraph(Paragraph::default())],
        }
    }

    pub fn has_content(&self) -> bool {
        self.nodes.iter().any(|node| match node {
            ProseNode::Paragraph(p) => !p.is_empty(),
            _ => true,
        })
    }

    pub fn last_paragraph_mut(&mut self) -> Option<&mut Paragraph> {
        self.nodes.iter_mut().rev().find_map(|node| match node {
            ProseNode::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    fn write_html(&self, out: &mut String) {
        out.push_str("<div class=\"");
        out.push_str(&self.class.css_classes());
        out.push_str("\">");
        for node in &self.nodes {
            match node {
                ProseNode::Heading { text } => {
                    out.push_str("<h1>");
                    out.push_str(&escape_html(text));
                    out.push_str("</h1>");
                }
                ProseNode::Paragraph(p) => p.write_html(out),
                ProseNode::Footnote { number, text } => {
                    out.push_str(&format!("<p class=\"footnote-block\"><sup>{number}</sup>"));
                    out.push_str(&escape_html(text).replace('\n', "<br>"));
                    out.push_str("</p>");
                }
            }
        }
        out.push_str("</div>");
    }
}

impl Paragraph {
    pub fn is_empty(&self) -> bool {
        self.inlines.is_empty()
    }

    /// Inline text as laid out: items joined by single spaces, line breaks as `\n`.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        let mut after_break = true;
        for inline in &self.inlines {
            match inline {
                Inline::LineBreak => {
                    text.push('\n');
                    after_break = true;
                }
                Inline::Word(s) | Inline::FootnoteRef(s) => {
                    if !after_break {
                        text.push(' ');
                    }
                    text.push_str(s);
                    after_break = false;
                }
            }
        }
        text
    }

    fn write_html(&self, out: &mut String) {
        if self.no_indent {
            out.push_str("<p style=\"text-indent:0\">");
        } else {
            out.push_str("<p>");
        }
        let mut after_break = true;
        for inline in &self.inlines {
            match inline {
                Inline::LineBreak => {
                    out.push_str("<br>");
                    after_break = true;
                    continue;
                }
                Inline::Word(_) | Inline::FootnoteRef(_) if !after_break => out.push(' '),
                _ => {}
            }
            match inline {
                Inline::Word(word) => out.push_str(&escape_html(word)),
                Inline::FootnoteRef(note) => {
                    out.push_str("<span class=\"footnote\">");
                    out.push_str(&escape_html(note));
                    out.push_str("</span>");
                }
                Inline::LineBreak => {}
            }
            after_break = false;
        }
        out.push_str("</p>");
    }
}

impl WorkFragment {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.paragraphs.iter().all(String::is_empty)
    }

    fn write_html(&self, out: &mut String) {
        out.push_str("<div class=\"work-preview\" style=\"");
        out.push_str(&escape_html(&self.style.css()));
        out.push_str("\">");
        if let Some(title) = &self.title {
            out.push_str("<h2>");
            out.push_str(&escape_html(title));
            out.push_str("</h2>");
        }
        for para in &self.paragraphs {
            out.push_str("<p>");
            out.push_str(&escape_html(para));
            out.push_str("</p>");
        }
        out.push_str("</div>");
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Align;

    #[test]
    fn paragraph_html_separates_words_and_breaks() {
        let p = Paragraph {
            no_indent: true,
            inlines: vec![
                Inline::Word("A".to_owned()),
                Inline::FootnoteRef("<n>".to_owned()),
                Inline::LineBreak,
                Inline::Word("B&C".to_owned()),
            ],
        };
        let mut html = String::new();
        p.write_html(&mut html);
        assert_eq!(
            html,
            "<p style=\"text-indent:0\">A <span class=\"footnote\">&lt;n&gt;</span><br>B&amp;C</p>"
        );
        assert_eq!(p.plain_text(), "A <n>\nB&C");
    }

    #[test]
    fn page_html_marks_classes() {
        let page = Page {
            class: PageClass::Regular,
            blocks: vec![Block::Prose(ProseFragment {
                class: ProseClass {
                    preserve_breaks: true,
                    no_dropcap: true,
                },
                nodes: vec![
                    ProseNode::Heading {
                        text: "T".to_owned(),
                    },
                    ProseNode::Footnote {
                        number: 2,
                        text: "a\nb".to_owned(),
                    },
                ],
            })],
        };
        assert_eq!(
            page.to_html(),
            "<div class=\"page\"><div class=\"chapter-prose preserve-breaks no-dropcap\">\
<h1>T</h1><p class=\"footnote-block\"><sup>2</sup>a<br>b</p></div></div>"
        );
    }

    #[test]
    fn work_fragment_html_carries_style() {
        let fragment = WorkFragment {
            style: WorkStyle {
                font_family: "Garamond".to_owned(),
                size_pt: 18.0,
                letter_spacing_em: 0.05,
                align: Align::Center,
            },
            title: Some("Ode".to_owned()),
            paragraphs: vec!["one two".to_owned()],
        };
        let page = Page {
            class: PageClass::Regular,
            blocks: vec![Block::Work(fragment)],
        };
        assert_eq!(
            page.to_html(),
            "<div class=\"page\"><div class=\"work-preview\" style=\"font-family:Garamond; font-size:18pt; \
letter-spacing:0.05em; text-align:center;\"><h2>Ode</h2><p>one two</p></div></div>"
        );
    }

    #[test]
    fn prune_removes_empty_paragraphs_and_fragments() {
        let mut page = Page {
            class: PageClass::Regular,
            blocks: vec![
                Block::Prose(ProseFragment::open(ProseClass::default())),
                Block::Html {
                    content: String::new(),
                },
            ],
        };
        page.prune_empty();
        assert_eq!(page.blocks.len(), 1);
        assert!(matches!(page.blocks[0], Block::Html { .. }));
    }
}
