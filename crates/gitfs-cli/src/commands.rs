//! CLI command implementations.

use gitfs_git::{Client, ClientConfig, GitError, Transport};
use gitfs_vfs::{FsError, Node, TreeFs};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "GITFS";

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Loads the client configuration: built-in defaults, then the optional
/// file, then `GITFS_*` environment variables.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()?;
    let config: ClientConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Print the refs matching `prefixes`.
pub fn refs<T: Transport>(
    client: &Client<T>,
    prefixes: &[String],
    out: &mut impl Write,
) -> Result<()> {
    for found in client.list_refs(prefixes)? {
        writeln!(out, "{} {}", found.id, found.name)?;
    }
    Ok(())
}

/// Print the commit id a ref names.
pub fn resolve<T: Transport>(
    client: &Client<T>,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    let id = client.resolve(name)?;
    writeln!(out, "{id}")?;
    Ok(())
}

/// List a directory, or describe a file, in the tree of `name`.
pub fn ls<T: Transport>(
    client: &Client<T>,
    name: &str,
    path: &str,
    out: &mut impl Write,
) -> Result<()> {
    let (commit, fs) = client.clone(name)?;
    tracing::info!(%commit, path, "listing");
    list(&fs, path, out)
}

/// Write a file from the tree of `name` to `out`.
pub fn cat<T: Transport>(
    client: &Client<T>,
    name: &str,
    path: &str,
    out: &mut impl Write,
) -> Result<()> {
    let (commit, fs) = client.clone(name)?;
    tracing::info!(%commit, path, "reading");
    copy_file(&fs, path, out)
}

/// Lists `path` one entry per line as `<mode> <size> <name>`.
pub fn list(fs: &TreeFs, path: &str, out: &mut impl Write) -> Result<()> {
    match fs.open(path)? {
        Node::File(file) => {
            let info = file.stat();
            writeln!(out, "{:06o} {:>8} {}", info.mode, info.size, info.path)?;
        }
        Node::Directory(mut dir) => loop {
            let page = dir.read_dir(Some(64))?;
            if page.end {
                break;
            }
            for entry in page.entries {
                let suffix = if entry.is_dir() { "/" } else { "" };
                writeln!(
                    out,
                    "{:06o} {:>8} {}{suffix}",
                    entry.mode, entry.size, entry.name
                )?;
            }
        },
    }
    Ok(())
}

/// Copies the content of the file at `path` to `out`.
pub fn copy_file(fs: &TreeFs, path: &str, out: &mut impl Write) -> Result<()> {
    let mut file = fs.open(path)?.into_file()?;
    io::copy(&mut file, out)?;
    out.flush()?;
    Ok(())
}

/// Connects to `url` over HTTP(S).
pub fn connect(url: &str, config: ClientConfig) -> Result<Client<gitfs_git::HttpTransport>> {
    tracing::debug!(url, timeout_secs = config.timeout_secs, "connecting");
    Ok(Client::connect_http(url, config)?)
}
