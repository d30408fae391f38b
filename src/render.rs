use crate::section::{AdPosition, Align, Chapter, HtmlSnippet, Newspaper, Work};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChapter {
    pub title: Option<String>,
    pub paragraphs: Vec<String>,
    pub preserve_line_breaks: bool,
    pub footnotes: Vec<String>,
}

/// Presentational attributes of a work block, with defaults already applied.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WorkStyle {
    pub font_family: String,
    pub size_pt: f64,
    pub letter_spacing_em: f64,
    pub align: Align,
}

impl WorkStyle {
    pub fn css(&self) -> String {
        format!(
            "font-family:{}; font-size:{}pt; letter-spacing:{}em; text-align:{};",
            self.font_family,
            self.size_pt,
            self.letter_spacing_em,
            self.align.as_css()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkBlock {
    pub style: WorkStyle,
    pub title: Option<String>,
    pub paragraphs: Vec<String>,
}

pub fn render_chapter(chapter: &Chapter) -> RenderedChapter {
    let text = chapter
        .body
        .replace("\r\n", "\n")
        .replace('—', ", ")
        .replace('–', " ");
    let preserve = chapter.preserve_line_breaks;

    let paragraphs = split_blank_line_paragraphs(&text)
        .into_iter()
        .map(|para| {
            if preserve {
                para.split('\n')
                    .map(str::trim_end)
                    .collect::<Vec<_>>()
                    .join("\n")
                    .trim_end()
                    .to_owned()
            } else {
                collapse_newlines(para).trim().to_owned()
            }
        })
        .filter(|para| !para.is_empty())
        .collect();

    RenderedChapter {
        title: non_empty(&chapter.title),
        paragraphs,
        preserve_line_breaks: preserve,
        footnotes: chapter
            .footnotes
            .iter()
            .filter(|note| !note.trim().is_empty())
            .cloned()
            .collect(),
    }
}

pub fn render_work(work: &Work) -> WorkBlock {
    WorkBlock {
        style: WorkStyle {
            font_family: work.effective_font().to_owned(),
            size_pt: work.effective_size_pt(),
            letter_spacing_em: work.effective_letter_spacing_em(),
            align: work.align,
        },
        title: non_empty(&work.title),
        paragraphs: split_double_newline(&work.body)
            .into_iter()
            .filter(|para| !para.trim().is_empty())
            .map(str::to_owned)
            .collect(),
    }
}

pub fn render_html_snippet(snippet: &HtmlSnippet) -> &str {
    &snippet.sanitized_content
}

pub fn render_newspaper(newspaper: &Newspaper) -> String {
    let style_class = newspaper
        .style
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("style-british");

    let articles = newspaper
        .articles
        .iter()
        .map(|article| {
            let body: String = split_double_newline(&article.body)
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| format!("<p>{}</p>", p.trim().replace('\n', " ")))
                .collect();

            let ad = if article.ad_title.is_empty() && article.ad_body.is_empty() {
                String::new()
            } else {
                format!(
                    "<div class=\"ad-box\"><div class=\"ad-title\">{}</div><div class=\"ad-body\">{}</div></div>",
                    article.ad_title, article.ad_body
                )
            };

            let content = match article.ad_pos.unwrap_or_default() {
                AdPosition::Start => format!("{ad}{body}"),
                AdPosition::End => format!("{body}{ad}"),
                AdPosition::Absent => body,
            };
            let cols = article.cols.filter(|&c| c != 0).unwrap_or(2);

            format!(
                "<div class=\"article-block\"><h2>{}</h2><h3>{}</h3><div class=\"article-body cols-{cols}\">{content}</div></div>",
                article.headline, article.subhead
            )
        })
        .collect::<Vec<_>>()
        .join("<hr class=\"divider\">");

    format!(
        "<div class=\"newspaper {style_class}\"><div class=\"masthead\"><h1>{}</h1></div><div class=\"meta\">{}</div><div class=\"newspaper-body\">{articles}</div></div>",
        newspaper.title, newspaper.meta
    )
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

/// Splits on a newline, optional whitespace, then one or more newlines.
///
/// Whitespace after the last newline of a separator belongs to the next
/// paragraph.
fn split_blank_line_paragraphs(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut para_start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '\n' {
            continue;
        }

        let mut last_newline = None;
        for (offset, ch) in text[i + 1..].char_indices() {
            if !ch.is_whitespace() {
                break;
            }
            if ch == '\n' {
                last_newline = Some(i + 1 + offset);
            }
        }

        if let Some(end) = last_newline {
            out.push(&text[para_start..i]);
            para_start = end + 1;
            while chars.next_if(|&(k, _)| k <= end).is_some() {}
        }
    }

    out.push(&text[para_start..]);
    out
}

fn split_double_newline(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("\n\n") {
        out.push(&rest[..pos]);
        rest = rest[pos..].trim_start_matches('\n');
    }
    out.push(rest);
    out
}

fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch == '\n' {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}
