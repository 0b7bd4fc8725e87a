//! Archive Inspector CLI
//!
//! Loads observation archives and manages extension bundles.
//!
//! Usage:
//!   archive-inspect load observations.xml
//!   archive-inspect extensions list
//!   archive-inspect extensions install comets.tar.gz
//!   archive-inspect config

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use observation_archive::{
    ArchiveConfig, DocumentLoader, EntryPointCatalog, ExtensionRegistry, TypeRegistry,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "archive-inspect")]
#[command(about = "Inspect observation archives and manage extensions")]
struct Cli {
    /// Configuration file (defaults to archive.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document and print a summary
    Load {
        /// Archive document
        file: PathBuf,

        /// Print every target
        #[arg(long)]
        targets: bool,
    },

    /// Manage extension bundles
    Extensions {
        #[command(subcommand)]
        command: ExtensionCommands,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
enum ExtensionCommands {
    /// List discoverable bundles and whether they activated
    List,

    /// Install a bundle (.tar.gz or directory)
    Install {
        bundle: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ArchiveConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    let registry = Arc::new(TypeRegistry::new());
    let extensions = ExtensionRegistry::new(Arc::clone(&registry), EntryPointCatalog::standard(), config.clone());

    match cli.command {
        Commands::Load { file, targets } => {
            extensions.load_all();
            let loader = DocumentLoader::from_config(Arc::clone(&registry), &config);
            let loaded = loader
                .load_path(&file)
                .with_context(|| format!("loading {}", file.display()))?;

            println!("📂 {}", file.display());
            println!("   Version: {}", loaded.version);
            for (kind, count) in loaded.graph.counts() {
                println!("   {:<13} {}", kind.container_name(), count);
            }

            if targets {
                println!("\n🎯 Targets:");
                for target in loaded.graph.targets() {
                    let observed = loaded.graph.observations_of_target(target).count();
                    println!("   {} {} [{}] ({} observations)", target.id, target.name, target.type_tag, observed);
                }
            }

            if !loaded.skipped.is_empty() {
                println!("\n⚠️  Skipped {} observation(s):", loaded.skipped.len());
                for skipped in &loaded.skipped {
                    println!("   {}: {}", skipped.id.as_deref().unwrap_or("<no id>"), skipped.error);
                }
            }
            Ok(())
        }

        Commands::Extensions { command: ExtensionCommands::List } => {
            let active = extensions.load_all();
            let discovered = extensions.discover(&extensions.search_locations());

            println!("🧩 Extensions ({} discovered, {} active)", discovered.len(), active.len());
            for descriptor in &discovered {
                let state = if extensions.handle(&descriptor.name).is_some() { "✅" } else { "❌" };
                println!("  {} {} v{} ({})", state, descriptor.name, descriptor.version, descriptor.source);
                for decl in &descriptor.types {
                    println!("      {} -> {}", decl.target_tag, decl.finding_tag);
                }
            }
            Ok(())
        }

        Commands::Extensions { command: ExtensionCommands::Install { bundle } } => {
            extensions.load_all();
            let report = extensions
                .install(&bundle)
                .with_context(|| format!("installing {}", bundle.display()))?;

            println!("✅ Installed {} v{}", report.name, report.version);
            println!("   Path:     {}", report.installed_path.display());
            println!("   Checksum: {}", report.checksum);
            for tag in &report.tags {
                println!("   + {}", tag);
            }
            if let Some(err) = &report.persist_error {
                println!("⚠️  Schema extension not persisted: {}", err);
            }
            Ok(())
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
