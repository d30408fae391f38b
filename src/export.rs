use std::fs::OpenOptions;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::process::Command;

use anyhow::Context as _;

use crate::cli::{ExportArgs, ExportFormat};
use crate::config::{ExportConfig, LayoutConfig};
use crate::markup::{Page, escape_html};
use crate::measure::Measured;
use crate::paginate::Paginator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOptions {
    pub title: String,
    pub page_width: String,
    pub page_height: String,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            title: "Book".to_owned(),
            page_width: "6in".to_owned(),
            page_height: "9in".to_owned(),
        }
    }
}

const DOCUMENT_CSS: &str = "\
body { margin: 0; }
.page { box-sizing: border-box; page-break-after: always; break-after: page; overflow: hidden; }
.page:last-child { page-break-after: auto; break-after: auto; }
.chapter-prose p { margin: 0; text-indent: 1.5em; }
.chapter-prose.preserve-breaks p { white-space: pre-wrap; }
.chapter-prose:not(.no-dropcap) h1 + p::first-letter { float: left; font-size: 3em; line-height: 0.8; }
.footnote { font-size: 0.8em; vertical-align: super; }
.footnote-block { font-size: 0.85em; text-indent: 0; }
.work-preview p { margin: 0 0 0.5em; }
";

/// Standalone HTML document with one `.page` element per page.
pub fn render_document(pages: &[Page], options: &DocumentOptions) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>");
    html.push_str(&escape_html(&options.title));
    html.push_str("</title>\n<style>\n@page { size: ");
    html.push_str(&options.page_width);
    html.push(' ');
    html.push_str(&options.page_height);
    html.push_str("; margin: 0; }\n.page { width: ");
    html.push_str(&options.page_width);
    html.push_str("; height: ");
    html.push_str(&options.page_height);
    html.push_str("; }\n");
    html.push_str(DOCUMENT_CSS);
    html.push_str("</style>\n</head>\n<body>\n");
    for page in pages {
        html.push_str(&page.to_html());
        html.push('\n');
    }
    html.push_str("</body>\n</html>\n");
    html
}

pub async fn run(args: ExportArgs) -> anyhow::Result<()> {
    if Path::new(&args.out).exists() && !args.force {
        anyhow::bail!("export output already exists: {}", args.out);
    }
    if let Some(parent) = Path::new(&args.out).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export output dir: {}", parent.display()))?;
    }

    let book = crate::commands::load_book(&args.state).await?;
    let layout = LayoutConfig::from_env().with_overrides(args.chars_per_line, args.lines_per_page);
    let pages = Paginator::new().paginate(book.sections(), &mut Measured(layout.measure()));
    tracing::info!(
        sections = book.len(),
        pages = pages.len(),
        format = ?args.format,
        out = %args.out,
        "export"
    );

    let options = DocumentOptions {
        title: args.title.clone().unwrap_or_else(|| DocumentOptions::default().title),
        ..DocumentOptions::default()
    };
    match args.format {
        ExportFormat::Html => {
            write_output(&args.out, render_document(&pages, &options).as_bytes(), args.force)?
        }
        ExportFormat::Json => {
            let json = serde_json::to_vec_pretty(&pages).context("serialize pages json")?;
            write_output(&args.out, &json, args.force)?
        }
        ExportFormat::Pdf => {
            let pdf_bin = args
                .pdf_bin
                .clone()
                .unwrap_or_else(|| ExportConfig::from_env().pdf_bin);
            export_pdf(&pdf_bin, &render_document(&pages, &options), &args.out)?
        }
    }

    Ok(())
}

fn write_output(out: &str, contents: &[u8], force: bool) -> anyhow::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(out)
        .with_context(|| format!("open output: {out}"))?;
    file.write_all(contents)
        .with_context(|| format!("write output: {out}"))?;
    file.flush()
        .with_context(|| format!("flush output: {out}"))?;
    Ok(())
}

/// Hands the rendered document to an external HTML-to-PDF renderer invoked as
/// `<bin> <input.html> <output.pdf>`.
fn export_pdf(pdf_bin: &str, document: &str, out: &str) -> anyhow::Result<()> {
    let mut input = tempfile::Builder::new()
        .prefix("bookauthor-")
        .suffix(".html")
        .tempfile()
        .context("create pdf input temp file")?;
    input
        .write_all(document.as_bytes())
        .context("write pdf input temp file")?;
    input.flush().context("flush pdf input temp file")?;

    tracing::info!(pdf_bin, out, "export via pdf renderer");
    let output = match Command::new(pdf_bin).arg(input.path()).arg(out).output() {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            anyhow::bail!(
                "pdf renderer not found: {pdf_bin}; install it or pass `--pdf-bin <PATH>`"
            );
        }
        Err(err) => return Err(err).with_context(|| format!("run pdf renderer: {pdf_bin}")),
    };
    if !output.status.success() {
        anyhow::bail!(
            "pdf renderer failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{Block, PageClass};

    #[test]
    fn document_wraps_each_page() {
        let pages = vec![
            Page::default(),
            Page {
                class: PageClass::Newspaper,
                blocks: vec![Block::Html {
                    content: "<b>x</b>".to_owned(),
                }],
            },
        ];
        let html = render_document(
            &pages,
            &DocumentOptions {
                title: "A & B".to_owned(),
                ..DocumentOptions::default()
            },
        );
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains("@page { size: 6in 9in; margin: 0; }"));
        assert_eq!(html.matches("<div class=\"page").count(), 2);
        assert!(html.contains(
            "<div class=\"page newspaper-page\"><div class=\"html-snippet\"><b>x</b></div></div>"
        ));
    }

    #[test]
    fn write_output_refuses_existing_file_unless_forced() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let out = temp.path().join("out.html");
        let out = out.to_string_lossy();
        write_output(&out, b"one", false)?;
        assert!(write_output(&out, b"two", false).is_err());
        write_output(&out, b"three", true)?;
        assert_eq!(std::fs::read_to_string(&*out)?, "three");
        Ok(())
    }
}
