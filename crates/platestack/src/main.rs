use std::cmp::Ordering;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{debug, error};
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

use platestack_core::kernel::constants::{API_VERSION, APP_NAME};
use platestack_core::plugin_system::{ClassPath, Container, DirectoryContainer, PluginLoader, Version};
use platestack_core::{LoaderConfig, Result};

/// PlateStack: inspect plugin directories and version constraints
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Loader configuration file (.json, .toml, .yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the plugins declared in the given directories
    Scan {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Print the load order of the plugins in the given directories
    Order {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Work with plugin versions
    Version {
        #[command(subcommand)]
        command: VersionCommand,
    },
}

#[derive(Subcommand, Debug)]
enum VersionCommand {
    /// Show how a version string is read
    Parse { text: String },
    /// Compare the precedence of two versions
    Compare {
        a: String,
        b: String,
        /// Compare labels case-sensitively
        #[arg(long)]
        case_sensitive: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Err(e) = LogTracer::init() {
        eprintln!("Failed to bridge log records: {e}");
    }
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = subscriber.try_init() {
        eprintln!("Failed to install the log subscriber: {e}");
    }
}

fn loader(config: Option<&PathBuf>) -> Result<PluginLoader> {
    let config = match config {
        Some(path) => LoaderConfig::load(path)?,
        None => LoaderConfig::default(),
    };
    // No classes are linked here, so the loader is only used to discover and plan.
    Ok(PluginLoader::new(config, ClassPath::new()))
}

fn containers(dirs: &[PathBuf]) -> Vec<Arc<dyn Container>> {
    dirs.iter()
        .map(|dir| Arc::new(DirectoryContainer::new(dir)) as Arc<dyn Container>)
        .collect()
}

async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Commands::Scan { dirs } => {
            let loader = loader(args.config.as_ref())?;
            let candidates = loader.discover(&containers(&dirs)).await?;
            if candidates.is_empty() {
                println!("No plugins found.");
            }
            for candidate in candidates {
                println!("{} -- {} [{}]", candidate.metadata, candidate.class_name, candidate.container);
                for relation in candidate.metadata.relations() {
                    println!("    {relation}");
                }
                for library in candidate.metadata.libraries() {
                    println!("    requires {library}");
                }
            }
        }
        Commands::Order { dirs } => {
            let loader = loader(args.config.as_ref())?;
            let candidates = loader.discover(&containers(&dirs)).await?;
            let ordered = loader.plan(candidates)?;
            for (position, candidate) in ordered.iter().enumerate() {
                println!("{}. {} [{}]", position + 1, candidate.metadata, candidate.container);
            }
        }
        Commands::Version { command: VersionCommand::Parse { text } } => {
            let version = Version::parse(&text);
            println!("{}", version.canonical());
            println!("stable: {}", version.is_stable());
        }
        Commands::Version { command: VersionCommand::Compare { a, b, case_sensitive } } => {
            let symbol = match Version::parse(&a).compare(&Version::parse(&b), !case_sensitive) {
                Ordering::Less => "<",
                Ordering::Equal => "==",
                Ordering::Greater => ">",
            };
            println!("{a} {symbol} {b}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);
    debug!("{APP_NAME} (API {API_VERSION})");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
