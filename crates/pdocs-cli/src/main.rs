mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pdocs",
    about = "Type-aware project documents: validate, repair, template and track them",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .pdocs/, .claude/ or .git/)
    #[arg(long, global = true, env = "PDOCS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .pdocs/ with a default config and an empty registry
    Init,

    /// Validate a file, a directory, or every registered document
    Validate(cmd::validate::ValidateArgs),

    /// Register a document
    Register {
        path: PathBuf,
        /// Document type or alias (default: detect from the path)
        #[arg(long = "type")]
        doc_type: Option<String>,
        /// Associated skill (default: the type's skill)
        #[arg(long)]
        skill: Option<String>,
        /// Re-register a document that is already registered
        #[arg(long)]
        force: bool,
    },

    /// Remove a document from the registry
    Unregister { path: PathBuf },

    /// Register every recognizable document under a directory
    Scan {
        /// Directory to scan (default: project root)
        dir: Option<PathBuf>,
    },

    /// Drop registry records whose file no longer exists
    Prune,

    /// Print or write the resolved template for a type
    Template(cmd::template::TemplateArgs),

    /// Create a new document from its type's template
    Create(cmd::template::CreateArgs),

    /// List registered documents
    List {
        #[arg(long = "type")]
        doc_type: Option<String>,
        /// pending, valid or invalid
        #[arg(long)]
        status: Option<String>,
    },

    /// Show what pdocs knows about a document, or registry stats
    Info { path: Option<PathBuf> },

    /// Issue (or preview) the next id for a type
    Id {
        doc_type: String,
        /// Show the next id without consuming it
        #[arg(long)]
        peek: bool,
    },

    /// List document types with aliases, skills and id patterns
    Types,

    /// Revalidate documents as they change
    Watch {
        /// Paths to watch (default: project root)
        paths: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Watch { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Validate(args) => cmd::validate::run(&root, args, cli.json),
        Commands::Register {
            path,
            doc_type,
            skill,
            force,
        } => cmd::register::register(
            &root,
            &path,
            doc_type.as_deref(),
            skill.as_deref(),
            force,
            cli.json,
        ),
        Commands::Unregister { path } => cmd::register::unregister(&root, &path, cli.json),
        Commands::Scan { dir } => cmd::scan::scan(&root, dir.as_deref(), cli.json),
        Commands::Prune => cmd::scan::prune(&root, cli.json),
        Commands::Template(args) => cmd::template::template(&root, args, cli.json),
        Commands::Create(args) => cmd::template::create(&root, args, cli.json),
        Commands::List { doc_type, status } => {
            cmd::list::list(&root, doc_type.as_deref(), status.as_deref(), cli.json)
        }
        Commands::Info { path } => cmd::list::info(&root, path.as_deref(), cli.json),
        Commands::Id { doc_type, peek } => cmd::id::next(&root, &doc_type, peek, cli.json),
        Commands::Types => cmd::id::types(&root, cli.json),
        Commands::Watch { paths } => cmd::watch::run(&root, &paths, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
