use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use command::{classify_error, Workspace};
use sage_protocol::{ErrorEnvelope, SearchMode};
use sage_search::RetrievalConfig;
use sage_vector_store::DATA_DIR_NAME;
use std::io;
use std::path::{Path, PathBuf};

mod command;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "stack-sage")]
#[command(about = "Rules retrieval for Magic: The Gathering judges", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for results)
    #[arg(long, global = true)]
    quiet: bool,

    /// Retrieval configuration file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the corpus, vector store and caches
    #[arg(long, global = true, default_value = DATA_DIR_NAME)]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a rules file and build the vector store and BM25 index
    Index(IndexArgs),

    /// Search the indexed rules
    Search(SearchArgs),
}

#[derive(Args)]
pub(crate) struct IndexArgs {
    /// Comprehensive rules as plain text, or a corpus.json export
    #[arg(long)]
    pub(crate) rules: PathBuf,

    /// Rebuild the BM25 index even if a cached snapshot exists
    #[arg(long)]
    pub(crate) force: bool,

    /// Print the index report as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args)]
pub(crate) struct SearchArgs {
    /// Question or keywords
    pub(crate) query: String,

    /// Number of results (defaults to hybrid.k from the config)
    #[arg(short = 'k', long = "top-k")]
    pub(crate) k: Option<usize>,

    /// Ranking mode: hybrid, adaptive, bm25 or vector
    #[arg(long, default_value = "hybrid")]
    pub(crate) mode: SearchMode,

    /// Print the full search response as JSON
    #[arg(long)]
    pub(crate) json: bool,

    /// Print hits as a rules context block for an answering prompt
    #[arg(long, conflicts_with = "json")]
    pub(crate) context: bool,

    /// Minimum similarity for vector mode
    #[arg(long)]
    pub(crate) min_score: Option<f64>,

    /// Override hybrid.vector_weight
    #[arg(long)]
    pub(crate) vector_weight: Option<f64>,

    /// Override hybrid.bm25_weight
    #[arg(long)]
    pub(crate) bm25_weight: Option<f64>,
}

impl Commands {
    const fn wants_json(&self) -> bool {
        match self {
            Self::Index(args) => args.json,
            Self::Search(args) => args.json,
        }
    }
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn load_config(path: Option<&Path>) -> Result<RetrievalConfig> {
    match path {
        Some(path) => RetrievalConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RetrievalConfig::default()),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let workspace = Workspace::new(cli.data_dir, config);

    let output = match cli.command {
        Commands::Index(args) => command::index::run(&workspace, &args).await?,
        Commands::Search(args) => command::search::run(&workspace, &args).await?,
    };
    print_stdout(&output)
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let json = cli.command.wants_json();
    match run(cli).await {
        Ok(()) => Ok(()),
        Err(err) if json => {
            let (code, hint) = classify_error(&err);
            let envelope = ErrorEnvelope {
                code: code.to_string(),
                message: format!("{err:#}"),
                hint,
            };
            print_stdout(&serde_json::to_string_pretty(&envelope)?)?;
            std::process::exit(1);
        }
        Err(err) => Err(err),
    }
}
