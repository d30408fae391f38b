use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the sections of a book.
    Sections(SectionsArgs),
    /// Paginate a book and summarize each page.
    Paginate(PaginateArgs),
    /// Export paginated pages.
    Export(ExportArgs),
    /// Rewrite a state file in the current format.
    Migrate(MigrateArgs),
    /// Sanitize an HTML file and append it as a snippet section.
    ImportHtml(ImportHtmlArgs),
}

#[derive(Debug, Args)]
pub struct SectionsArgs {
    /// Book state JSON file.
    #[arg(long)]
    pub state: String,
}

#[derive(Debug, Args)]
pub struct PaginateArgs {
    /// Book state JSON file.
    #[arg(long)]
    pub state: String,

    /// Characters per body line (default: BOOKAUTHOR_CHARS_PER_LINE or 60).
    #[arg(long)]
    pub chars_per_line: Option<usize>,

    /// Body lines per page (default: BOOKAUTHOR_LINES_PER_PAGE or 30).
    #[arg(long)]
    pub lines_per_page: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Html,
    Json,
    Pdf,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Book state JSON file.
    #[arg(long)]
    pub state: String,

    /// Output file path.
    #[arg(long)]
    pub out: String,

    #[arg(long, value_enum, default_value_t = ExportFormat::Html)]
    pub format: ExportFormat,

    /// Overwrite output if it already exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Document title (default: "Book").
    #[arg(long)]
    pub title: Option<String>,

    /// Characters per body line (default: BOOKAUTHOR_CHARS_PER_LINE or 60).
    #[arg(long)]
    pub chars_per_line: Option<usize>,

    /// Body lines per page (default: BOOKAUTHOR_LINES_PER_PAGE or 30).
    #[arg(long)]
    pub lines_per_page: Option<usize>,

    /// HTML-to-PDF renderer (default: BOOKAUTHOR_PDF_BIN or weasyprint).
    #[arg(long)]
    pub pdf_bin: Option<String>,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Book state JSON file to read.
    #[arg(long)]
    pub state: String,

    /// Normalized state JSON file to write.
    #[arg(long)]
    pub out: String,

    /// Overwrite output if it already exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct ImportHtmlArgs {
    /// Book state JSON file (created when missing).
    #[arg(long)]
    pub state: String,

    /// HTML file to import.
    #[arg(long)]
    pub input: String,

    /// Section title (default: "HTML Snippet").
    #[arg(long)]
    pub title: Option<String>,

    /// Keep script/style elements, meta tags and onload handlers.
    #[arg(long, default_value_t = false)]
    pub keep_scripts: bool,

    /// Collapse whitespace runs to single spaces.
    #[arg(long, default_value_t = false)]
    pub flatten_whitespace: bool,
}
