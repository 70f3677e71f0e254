//! Command-line interface for operating the proxy against a repository
//! configuration file.

pub mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Repository proxy connector tool
#[derive(Parser, Debug)]
#[command(name = "artifact-keeper-proxy")]
#[command(about = "Fetch artifacts and metadata for managed repositories through proxy connectors", long_about = None)]
pub struct ProxyCli {
    #[command(subcommand)]
    pub command: ProxyCommand,

    /// Repository configuration file (can also be set via PROXY_CONFIG_PATH env var)
    #[arg(short, long, env = "PROXY_CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (json, text)
    #[arg(long, default_value = "text", global = true)]
    pub format: String,
}

#[derive(Subcommand, Debug)]
pub enum ProxyCommand {
    /// Fetch a repository path through the repository's proxy connectors
    Fetch {
        /// Managed repository id
        repository: String,

        /// Repository-relative path, e.g. org/example/foo/1.0/foo-1.0.jar
        path: String,
    },

    /// List the proxy connectors of a managed repository in evaluation order
    Connectors {
        /// Managed repository id
        repository: String,
    },

    /// Rebuild a merged maven-metadata.xml from local and proxied copies
    UpdateMetadata {
        /// Managed repository id
        repository: String,

        /// Path of the metadata document, e.g. org/example/foo/maven-metadata.xml
        path: String,
    },

    /// Validate the repository configuration and report what resolves
    CheckConfig,
}
