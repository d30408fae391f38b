use std::path::Path;

use anyhow::Context as _;

use crate::book::Book;
use crate::cli::{ImportHtmlArgs, MigrateArgs, PaginateArgs, SectionsArgs};
use crate::config::LayoutConfig;
use crate::markup::{Block, Page, PageClass};
use crate::measure::Measured;
use crate::paginate::Paginator;
use crate::sanitize::SanitizeOptions;
use crate::section::{HtmlSnippet, Section};
use crate::store::{LocalFsStateStore, StateStore as _};

/// Loads a book from an existing state file.
pub async fn load_book(state: &str) -> anyhow::Result<Book> {
    let store = LocalFsStateStore::new(state);
    let Some(persisted) = store.load().await? else {
        anyhow::bail!("state file not found: {state}");
    };
    Ok(Book::from_state(&persisted))
}

pub async fn sections(args: SectionsArgs) -> anyhow::Result<()> {
    let book = load_book(&args.state).await?;
    for line in section_lines(&book) {
        println!("{line}");
    }
    Ok(())
}

pub async fn paginate(args: PaginateArgs) -> anyhow::Result<()> {
    let book = load_book(&args.state).await?;
    let layout = LayoutConfig::from_env().with_overrides(args.chars_per_line, args.lines_per_page);
    tracing::info!(
        sections = book.len(),
        chars_per_line = layout.chars_per_line,
        lines_per_page = layout.lines_per_page,
        "paginate"
    );
    let pages = Paginator::new().paginate(book.sections(), &mut Measured(layout.measure()));

    println!("pages: {}", pages.len());
    for (idx, page) in pages.iter().enumerate() {
        println!("{}. {}", idx + 1, describe_page(page));
    }
    Ok(())
}

pub async fn migrate(args: MigrateArgs) -> anyhow::Result<()> {
    if Path::new(&args.out).exists() && !args.force {
        anyhow::bail!("migrate output already exists: {}", args.out);
    }
    let book = load_book(&args.state).await?;
    LocalFsStateStore::new(&args.out)
        .save(&book.to_state())
        .await?;
    tracing::info!(sections = book.len(), out = %args.out, "migrated state");
    Ok(())
}

pub async fn import_html(args: ImportHtmlArgs) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("read input: {}", args.input))?;

    let store = LocalFsStateStore::new(&args.state);
    let mut book = match store.load().await? {
        Some(persisted) => Book::from_state(&persisted),
        None => Book::new(),
    };

    let options = SanitizeOptions {
        remove_scripts: !args.keep_scripts,
        flatten_whitespace: args.flatten_whitespace,
    };
    let snippet = HtmlSnippet::capture(args.title.as_deref().unwrap_or_default(), &raw, options);
    tracing::info!(
        title = %snippet.title,
        raw_len = snippet.raw_html.len(),
        content_len = snippet.sanitized_content.len(),
        "imported html"
    );
    book.append(Section::Html(snippet));
    store.save(&book.to_state()).await?;

    if let Some(line) = section_lines(&book).last() {
        println!("{line}");
    }
    Ok(())
}

fn section_lines(book: &Book) -> Vec<String> {
    book.sections()
        .enumerate()
        .map(|(idx, section)| {
            format!(
                "{}. {} {}",
                idx + 1,
                section.kind().icon(),
                section.display_title()
            )
        })
        .collect()
}

/// One-line summary of a page: its block kinds and word count.
pub fn describe_page(page: &Page) -> String {
    if page.is_empty() {
        return "(empty)".to_owned();
    }
    let kinds: Vec<&str> = page
        .blocks
        .iter()
        .map(|block| match block {
            Block::Prose(_) => "prose",
            Block::Work(_) => "work",
            Block::Html { .. } => "html",
            Block::Newspaper { .. } => "newspaper",
        })
        .collect();
    let words: usize = page.blocks.iter().map(block_words).sum();
    let mut line = format!("{} ({words} words)", kinds.join(", "));
    if page.class == PageClass::Newspaper {
        line.push_str(" [newspaper page]");
    }
    line
}

fn block_words(block: &Block) -> usize {
    match block {
        Block::Prose(fragment) => fragment
            .nodes
            .iter()
            .map(|node| match node {
                crate::markup::ProseNode::Paragraph(p) => p.plain_text().split_whitespace().count(),
                _ => 0,
            })
            .sum(),
        Block::Work(fragment) => fragment
            .paragraphs
            .iter()
            .map(|p| p.split_whitespace().count())
            .sum(),
        Block::Html { content } => crate::sanitize::visible_text(content).split_whitespace().count(),
        Block::Newspaper { markup } => crate::sanitize::visible_text(markup).split_whitespace().count(),
    }
}
