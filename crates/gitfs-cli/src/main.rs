//! gitfs CLI - browse a remote git tree without cloning it.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// gitfs - read-only access to one commit of a remote repository
#[derive(Parser, Debug)]
#[command(name = "gitfs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Client configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List remote refs
    Refs {
        /// Repository URL
        url: String,
        /// Only refs starting with these prefixes
        prefixes: Vec<String>,
    },

    /// Resolve a ref to a commit id
    Resolve {
        /// Repository URL
        url: String,
        /// Ref name or commit id
        #[arg(name = "ref")]
        name: String,
    },

    /// List a directory in the tree of a ref
    Ls {
        /// Repository URL
        url: String,
        /// Ref name or commit id
        #[arg(name = "ref")]
        name: String,
        /// Path inside the tree
        #[arg(default_value = ".")]
        path: String,
    },

    /// Print a file from the tree of a ref
    Cat {
        /// Repository URL
        url: String,
        /// Ref name or commit id
        #[arg(name = "ref")]
        name: String,
        /// Path inside the tree
        path: String,
    },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = commands::load_config(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("loading {}", path.display()),
        None => "loading configuration".to_string(),
    })?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Refs { url, prefixes } => {
            let client = commands::connect(&url, config)?;
            commands::refs(&client, &prefixes, &mut out)?;
        }
        Commands::Resolve { url, name } => {
            let client = commands::connect(&url, config)?;
            commands::resolve(&client, &name, &mut out)?;
        }
        Commands::Ls { url, name, path } => {
            let client = commands::connect(&url, config)?;
            commands::ls(&client, &name, &path, &mut out)
                .with_context(|| format!("ls {name}:{path}"))?;
        }
        Commands::Cat { url, name, path } => {
            let client = commands::connect(&url, config)?;
            commands::cat(&client, &name, &path, &mut out)
                .with_context(|| format!("cat {name}:{path}"))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gitfs={log_level},gitfs_git={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ls_with_default_path() {
        let cli = Cli::parse_from(["gitfs", "-vv", "ls", "https://example.com/r.git", "main"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ls { name, path, .. } => {
                assert_eq!(name, "main");
                assert_eq!(path, ".");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_refs_prefixes_and_config() {
        let cli = Cli::parse_from([
            "gitfs",
            "refs",
            "https://example.com/r.git",
            "refs/heads/",
            "refs/tags/",
            "--config",
            "gitfs.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("gitfs.toml")));
        match cli.command {
            Commands::Refs { prefixes, .. } => assert_eq!(prefixes, ["refs/heads/", "refs/tags/"]),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
