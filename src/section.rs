use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sanitize::{SanitizeOptions, sanitize_html};

pub const DEFAULT_WORK_SIZE_PT: f64 = 14.0;
pub const DEFAULT_WORK_FONT: &str = "serif";

/// One authored unit of book content, tagged by `type` in the persisted form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Section {
    Chapter(Chapter),
    Work(Work),
    Html(HtmlSnippet),
    /// Legacy section kind. Only ever seen on load; converted to `Html`.
    Newspaper(Newspaper),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Chapter,
    Work,
    Html,
    Newspaper,
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        match self {
            Self::Chapter(_) => SectionKind::Chapter,
            Self::Work(_) => SectionKind::Work,
            Self::Html(_) => SectionKind::Html,
            Self::Newspaper(_) => SectionKind::Newspaper,
        }
    }

    /// Title shown in section listings, with a per-kind fallback for blank titles.
    pub fn display_title(&self) -> &str {
        let (title, fallback) = match self {
            Self::Chapter(c) => (c.title.as_str(), "Untitled Chapter"),
            Self::Work(w) => (w.title.as_str(), "Minor/Major Work"),
            Self::Html(h) => (h.title.as_str(), "HTML Snippet"),
            Self::Newspaper(n) => (n.title.as_str(), "Newspaper"),
        };
        if title.is_empty() { fallback } else { title }
    }

    /// Converts a legacy newspaper into an HTML snippet holding its rendered
    /// markup. Every other kind is returned unchanged.
    pub fn into_current(self) -> Self {
        match self {
            Self::Newspaper(newspaper) => Self::Html(newspaper.into_html_snippet()),
            other => other,
        }
    }
}

impl SectionKind {
    pub fn icon(self) -> &'static str {
        match self {
            Self::Chapter => "📖",
            Self::Work => "✒️",
            Self::Html => "🌐",
            Self::Newspaper => "📰",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(
        rename = "preserveBreaks",
        alias = "preserveLineBreaks",
        default = "default_true"
    )]
    pub preserve_line_breaks: bool,
    #[serde(default)]
    pub footnotes: Vec<String>,
}

impl Default for Chapter {
    fn default() -> Self {
        Self {
            title: String::new(),
            body: String::new(),
            preserve_line_breaks: true,
            footnotes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Center,
    Right,
    Justify,
    #[default]
    #[serde(other)]
    Left,
}

impl Align {
    pub fn as_css(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "justify",
        }
    }
}

/// A typeset "minor/major work" with explicit typography controls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Work {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub font: String,
    #[serde(
        rename = "size",
        alias = "sizePt",
        default,
        deserialize_with = "deserialize_lenient_f64"
    )]
    pub size_pt: Option<f64>,
    #[serde(
        rename = "spacing",
        alias = "letterSpacingEm",
        default,
        deserialize_with = "deserialize_lenient_f64"
    )]
    pub letter_spacing_em: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_align")]
    pub align: Align,
}

impl Work {
    pub fn effective_font(&self) -> &str {
        let font = self.font.trim();
        if font.is_empty() {
            DEFAULT_WORK_FONT
        } else {
            font
        }
    }

    pub fn effective_size_pt(&self) -> f64 {
        match self.size_pt {
            Some(size) if size.is_finite() && size > 0.0 => size,
            _ => DEFAULT_WORK_SIZE_PT,
        }
    }

    pub fn effective_letter_spacing_em(&self) -> f64 {
        match self.letter_spacing_em {
            Some(spacing) if spacing.is_finite() => spacing,
            _ => 0.0,
        }
    }
}

fn deserialize_align<'de, D>(deserializer: D) -> Result<Align, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

// Older state files were written by hand-edited forms, so numbers may arrive
// as strings and strings may arrive as numbers or null.

fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_number(&Value::deserialize(deserializer)?))
}

/// Positive whole numbers only; anything else renders with the default.
fn deserialize_lenient_cols<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let cols = lenient_number(&Value::deserialize(deserializer)?)
        .filter(|n| n.fract() == 0.0 && *n >= 1.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32);
    Ok(cols)
}

fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HtmlSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "raw", default)]
    pub raw_html: String,
    #[serde(rename = "content", default)]
    pub sanitized_content: String,
    #[serde(default = "default_true")]
    pub remove_scripts: bool,
    #[serde(default)]
    pub flatten_whitespace: bool,
}

impl HtmlSnippet {
    /// Builds a snippet from pasted markup, sanitizing it once up front.
    pub fn capture(title: &str, raw_html: &str, options: SanitizeOptions) -> Self {
        let title = title.trim();
        Self {
            title: if title.is_empty() {
                "HTML Snippet".to_owned()
            } else {
                title.to_owned()
            },
            raw_html: raw_html.to_owned(),
            sanitized_content: sanitize_html(raw_html, options),
            remove_scripts: options.remove_scripts,
            flatten_whitespace: options.flatten_whitespace,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Newspaper {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub meta: String,
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl Newspaper {
    pub fn into_html_snippet(self) -> HtmlSnippet {
        let content = crate::render::render_newspaper(&self);
        HtmlSnippet {
            title: if self.title.is_empty() {
                "Newspaper".to_owned()
            } else {
                self.title
            },
            raw_html: String::new(),
            sanitized_content: content,
            remove_scripts: false,
            flatten_whitespace: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdPosition {
    Start,
    End,
    #[default]
    #[serde(other)]
    Absent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub headline: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub subhead: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub body: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub ad_title: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub ad_body: String,
    #[serde(default, deserialize_with = "deserialize_ad_pos")]
    pub ad_pos: Option<AdPosition>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_cols",
        skip_serializing_if = "Option::is_none"
    )]
    pub cols: Option<u32>,
}

fn deserialize_ad_pos<'de, D>(deserializer: D) -> Result<Option<AdPosition>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).ok())
}

fn default_true() -> bool {
    true
}
