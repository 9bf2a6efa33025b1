mod cli;
mod error;

use crate::cli::{Cli, Commands};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use serde_json::Value;
use std::process::ExitCode;
use tome_config::{Config, Settings, SettingsAccess};
use tome_engine::{BookQuery, Engine, Filter, Params};
use tome_model::BookId;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();

    let outcome = tokio::select! {
        outcome = run(cli) => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            return ExitCode::FAILURE;
        },
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "Failed");
            ExitCode::FAILURE
        },
    }
}

fn settings(cli: &Cli) -> Result<Settings> {
    let settings = Settings::new(Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?);
    for (key, raw) in &cli.overrides {
        // Bare words are strings; anything JSON can read keeps its type.
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
        settings.set(key, value).or_raise(|| ErrorKind::Config)?;
    }
    Ok(settings)
}

fn params(pairs: Vec<(String, String)>) -> Params {
    pairs.into_iter().collect()
}

async fn run(cli: Cli) -> Result<()> {
    let engine = Engine::open(settings(&cli)?).await.or_raise(|| ErrorKind::Startup)?;
    let outcome = execute(&engine, cli.command).await;
    engine.close().await;
    outcome
}

async fn execute(engine: &Engine, command: Commands) -> Result<()> {
    match command {
        Commands::Adapters => {
            for name in engine.registry().available() {
                let state = if engine.registry().get(&name).is_some() { "loaded" } else { "available" };
                println!("{name}\t{state}");
            }
        },
        Commands::Fetch { url, adapter, params: pairs } => {
            let book = engine
                .fetch(&url, adapter.as_deref(), &params(pairs))
                .await
                .or_raise(|| ErrorKind::Command("fetch"))?;
            match book {
                Some(book) => println!("{book}"),
                None => exn::bail!(ErrorKind::Command("fetch")),
            }
        },
        Commands::Crawl { adapter, start, end, params: pairs } => {
            let mut params = params(pairs);
            params.extend(start.map(|page| ("start".to_string(), page.to_string())));
            params.extend(end.map(|page| ("end".to_string(), page.to_string())));
            let ids = engine.crawl(&adapter, &params).await.or_raise(|| ErrorKind::Command("crawl"))?;
            println!("{} books acquired", ids.len());
        },
        Commands::Search { keyword, author, style } => {
            let books = engine.search(&keyword, author.as_deref(), style.as_deref(), &Params::new()).await;
            for book in books {
                println!("{book}");
            }
        },
        Commands::List {
            title,
            author,
            adapter,
            completed,
            limit,
            offset,
        } => {
            let mut query = BookQuery::new();
            if let Some(title) = title {
                query = query.filter("title", Filter::Contains(title));
            }
            if let Some(author) = author {
                query = query.filter("author", Filter::Contains(author));
            }
            if let Some(adapter) = adapter {
                query = query.filter("adapter", Filter::Is(adapter));
            }
            if let Some(completed) = completed {
                query = query.filter("status", Filter::Flag(completed));
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            if let Some(offset) = offset {
                query = query.offset(offset);
            }
            for book in engine.list(&query).await.or_raise(|| ErrorKind::Command("list"))? {
                println!("{book}\t{} chapters", book.chapter_count);
            }
        },
        Commands::Check { id: Some(id) } => {
            let book = engine
                .check_book(BookId(id), &Params::new())
                .await
                .or_raise(|| ErrorKind::Command("check"))?;
            match book {
                Some(book) => println!("{book}"),
                None => exn::bail!(ErrorKind::Command("check")),
            }
        },
        Commands::Check { id: None } => {
            let ids = engine.check_all_books(&Params::new()).await.or_raise(|| ErrorKind::Command("check"))?;
            println!("{} books checked", ids.len());
        },
        Commands::Remove { id } => {
            engine.delete_book(BookId(id)).await.or_raise(|| ErrorKind::Command("remove"))?;
        },
        Commands::Export { id, format, output } => {
            let path = engine
                .export_book(BookId(id), &format, &output)
                .await
                .or_raise(|| ErrorKind::Command("export"))?;
            println!("{}", path.display());
        },
    }
    Ok(())
}
