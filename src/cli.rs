use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[clap(name = "tome", version, about = "Incremental harvester for serialized books")]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override a setting for this run, e.g. `--set fetch.max_retry=3`
    #[clap(long = "set", global = true, value_parser = parse_pair)]
    pub overrides: Vec<(String, String)>,
    /// Log at debug level (`RUST_LOG` takes precedence)
    #[clap(short, long, global = true)]
    pub verbose: bool,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// List registered adapters and whether they are loaded
    Adapters,
    /// Download (or bring up to date) the book at a URL
    Fetch {
        url: String,
        /// Adapter to use instead of the one claiming the URL
        #[clap(long)]
        adapter: Option<String>,
        /// Adapter parameter, e.g. `--param key=value`
        #[clap(long = "param", value_parser = parse_pair)]
        params: Vec<(String, String)>,
    },
    /// Walk a site's catalog, downloading every book that changed
    Crawl {
        adapter: String,
        /// First catalog page
        #[clap(long)]
        start: Option<u32>,
        /// Last catalog page
        #[clap(long)]
        end: Option<u32>,
        #[clap(long = "param", value_parser = parse_pair)]
        params: Vec<(String, String)>,
    },
    /// Search every loaded adapter
    Search {
        keyword: String,
        #[clap(long)]
        author: Option<String>,
        #[clap(long)]
        style: Option<String>,
    },
    /// List stored books
    List {
        /// Title contains
        #[clap(long)]
        title: Option<String>,
        /// Author contains
        #[clap(long)]
        author: Option<String>,
        #[clap(long)]
        adapter: Option<String>,
        /// Only completed (`true`) or unfinished (`false`) books
        #[clap(long)]
        completed: Option<bool>,
        #[clap(long)]
        limit: Option<u32>,
        #[clap(long)]
        offset: Option<u32>,
    },
    /// Re-acquire one stored book, or every unfinished one
    Check { id: Option<i64> },
    /// Delete a stored book and its chapters
    Remove { id: i64 },
    /// Write a stored book to disk
    Export {
        id: i64,
        #[clap(long, default_value = "txt")]
        format: String,
        /// File or directory to write to
        #[clap(long, short, default_value = ".")]
        output: PathBuf,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
