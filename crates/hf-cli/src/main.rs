//! Habr content filter CLI
//!
//! CLI tool for inspecting and editing a rule store kept on disk.

mod commands;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use env_logger::Env;

use hf_core::{BlockDuration, Category, FileBackend, RuleStore, SystemClock};

#[derive(Parser)]
#[command(name = "hf-cli")]
#[command(about = "Habr content filter rule store tools")]
struct Cli {
    /// Directory holding the persisted store
    #[arg(short, long, env = "HF_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Block a tag or author
    Block {
        /// `tags` or `authors`
        category: Category,
        name: String,

        /// permanent, day, week or month
        #[arg(short, long, default_value = "permanent")]
        duration: BlockDuration,
    },

    /// Lift a block
    Unblock { category: Category, name: String },

    /// Report whether a name is blocked right now
    Check { category: Category, name: String },

    /// Show the stored entry for a name
    Stats { category: Category, name: String },

    /// Count one hidden item for a name
    Hide { category: Category, name: String },

    /// List active and previously used rules
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the whole store as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the whole store with an exported snapshot
    Import { input: PathBuf },

    /// Dry-run the hide decision for an article
    Evaluate {
        /// Tag shown on the article (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Article author
        #[arg(short, long)]
        author: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let backend = FileBackend::new(&cli.data_dir);
    let mut store = RuleStore::try_open(backend, SystemClock).map_err(|e| {
        format!("{e} (in '{}'); refusing to overwrite it", cli.data_dir.display())
    })?;
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Block { category, name, duration } => {
            commands::cmd_block(&mut store, &mut out, category, &name, duration)
        }
        Commands::Unblock { category, name } => commands::cmd_unblock(&mut store, &mut out, category, &name),
        Commands::Check { category, name } => commands::cmd_check(&mut store, &mut out, category, &name),
        Commands::Stats { category, name } => commands::cmd_stats(&store, &mut out, category, &name),
        Commands::Hide { category, name } => commands::cmd_hide(&mut store, &mut out, category, &name),
        Commands::List { json } => commands::cmd_list(&store, &mut out, json),
        Commands::Export { output } => commands::cmd_export(&store, &mut out, output.as_deref()),
        Commands::Import { input } => commands::cmd_import(&mut store, &mut out, &input),
        Commands::Evaluate { tags, author } => {
            commands::cmd_evaluate(&mut store, &mut out, &tags, author.as_deref())
        }
    }
}
