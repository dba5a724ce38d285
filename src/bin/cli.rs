//! Strata CLI
//!
//! Read-only inspection of container files.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strata::{AccessMode, Config, Enumerator, PropertySetFlags, RootFile, Storage};
use tracing_subscriber::{fmt, EnvFilter};

/// Strata CLI
#[derive(Parser, Debug)]
#[command(name = "strata-cli")]
#[command(about = "Inspect structured storage container files")]
#[command(version)]
struct Args {
    /// Container file
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report whether the file is a container and summarize its root
    Check,

    /// List the children of a storage
    Ls {
        /// Storage path, `/`-separated; the root when omitted
        #[arg(default_value = "")]
        path: String,
    },

    /// Print the whole element tree
    Tree,

    /// Write a stream's content to stdout
    Cat {
        /// Stream path, `/`-separated
        path: String,
    },

    /// Dump the property sets attached to a storage
    Props {
        /// Storage path, `/`-separated; the root when omitted
        #[arg(default_value = "")]
        path: String,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,strata=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        tracing::error!("{}: {}", args.file.display(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> strata::Result<()> {
    if let Commands::Check = args.command {
        if !RootFile::is_structured_file(&args.file)? {
            println!("{}: not a structured storage file", args.file.display());
            std::process::exit(2);
        }
    }

    let files = RootFile::new(Config::default());
    let root = files.open(&args.file, AccessMode::read())?;

    match &args.command {
        Commands::Check => {
            let stat = root.stat()?;
            let sector = root
                .sector_size()
                .map(|s| s.to_string())
                .unwrap_or_default();
            println!("{}: structured storage file", args.file.display());
            println!("  sector size:   {}", sector);
            println!("  class id:      {}", stat.class_id());
            println!("  children:      {}", root.elements().count());
            println!("  property sets: {}", root.property_sets().count());
        }
        Commands::Ls { path } => {
            let child = walk(&root, path)?;
            let storage = child.as_ref().unwrap_or(&root);
            for stats in storage.elements() {
                let stats = stats?;
                println!("{:<8} {:>12}  {}", stats.kind().to_string(), stats.size(), stats.name());
            }
        }
        Commands::Tree => {
            println!("{}", root.name()?);
            print_tree(&root, 1)?;
        }
        Commands::Cat { path } => {
            let (parent, name) = match path.rsplit_once('/') {
                Some((parent, name)) => (parent, name),
                None => ("", path.as_str()),
            };
            let child = walk(&root, parent)?;
            let storage = child.as_ref().unwrap_or(&root);
            let mut stream = storage.open_stream(name, AccessMode::read())?;
            let mut content = Vec::new();
            std::io::Read::read_to_end(&mut stream, &mut content)?;
            std::io::stdout().write_all(&content)?;
        }
        Commands::Props { path } => {
            let child = walk(&root, path)?;
            let storage = child.as_ref().unwrap_or(&root);
            let mut sets = storage.property_set_enumerator();
            loop {
                let batch = sets.next_batch(16)?;
                if batch.is_empty() {
                    break;
                }
                for set_stats in batch {
                    let set = storage.open_property_set(set_stats.format_id(), AccessMode::read())?;
                    println!(
                        "{} ({})",
                        set_stats.format_id(),
                        describe_flags(set_stats.flags())
                    );
                    for property in set.properties()? {
                        if let Some(found) = set.get(property.key.clone())? {
                            println!(
                                "  {:<12} {:<8} {}",
                                property.key.to_string(),
                                property.kind.name(),
                                found.value
                            );
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Open the storage at a `/`-separated path below `root`; `None` for the
/// root itself
fn walk(root: &Storage, path: &str) -> strata::Result<Option<Storage>> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let Some(first) = segments.next() else {
        return Ok(None);
    };
    let mut storage = root.open_storage(first, AccessMode::read())?;
    for segment in segments {
        storage = storage.open_storage(segment, AccessMode::read())?;
    }
    Ok(Some(storage))
}

fn print_tree(storage: &Storage, depth: usize) -> strata::Result<()> {
    for stats in storage.elements() {
        let stats = stats?;
        let indent = "  ".repeat(depth);
        if stats.is_storage() {
            println!("{}{}/", indent, stats.name());
            let child = storage.open_storage(stats.name(), AccessMode::read())?;
            print_tree(&child, depth + 1)?;
        } else {
            println!("{}{} ({} bytes)", indent, stats.name(), stats.size());
        }
    }
    Ok(())
}

fn describe_flags(flags: PropertySetFlags) -> &'static str {
    match (flags.non_simple, flags.case_sensitive) {
        (false, false) => "simple",
        (false, true) => "simple, case-sensitive",
        (true, false) => "non-simple",
        (true, true) => "non-simple, case-sensitive",
    }
}
