use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use bookauthor::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    bookauthor::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Sections(args) => {
            bookauthor::commands::sections(args)
                .await
                .context("sections")?;
        }
        Command::Paginate(args) => {
            bookauthor::commands::paginate(args)
                .await
                .context("paginate")?;
        }
        Command::Export(args) => {
            bookauthor::export::run(args).await.context("export")?;
        }
        Command::Migrate(args) => {
            bookauthor::commands::migrate(args).await.context("migrate")?;
        }
        Command::ImportHtml(args) => {
            bookauthor::commands::import_html(args)
                .await
                .context("import-html")?;
        }
    }

    Ok(())
}
