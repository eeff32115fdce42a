use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod utils;

use commands::{check, config, normalize, parse};
use utils::settings::Settings;

/// Wiki ACL CLI - inspect and maintain the access control directives of wiki pages
#[derive(Parser)]
#[command(name = "wiki-acl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// ACL engine configuration file (defaults to config/config.acl.yaml)
    #[arg(short, long, global = true, env = "ACL_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override the configured directive dialect (enumeration, expression)
    #[arg(short, long, global = true)]
    dialect: Option<String>,

    /// YAML user/group directory used to resolve principal names
    #[arg(long, global = true, env = "ACL_DIRECTORY_PATH")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a page and print its canonical ACL
    Parse {
        /// Page source file
        file: PathBuf,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decide whether a set of principals may perform an action on a page
    Check {
        /// Page source file
        file: PathBuf,

        /// Action to check (view, comment, edit, delete, rename, upload, all)
        #[arg(short, long)]
        action: String,

        /// Principal names, comma separated (user and group names)
        #[arg(short, long, value_delimiter = ',')]
        names: Vec<String>,

        /// Subject whose groups are looked up in the directory and added to the names
        #[arg(short, long)]
        subject: Option<String>,
    },

    /// Rewrite a page with its ACL in canonical form
    Normalize {
        /// Page source file
        file: PathBuf,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective engine configuration
    Show {
        /// Output format (json, yaml)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load(cli.config, cli.dialect.as_deref(), cli.directory)?;

    match cli.command {
        Commands::Parse { file, format } => {
            parse::execute(&settings, &file, &format)?;
        }
        Commands::Check {
            file,
            action,
            names,
            subject,
        } => {
            check::execute(&settings, &file, &action, names, subject.as_deref())?;
        }
        Commands::Normalize { file } => {
            normalize::execute(&settings, &file)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                config::show(&settings, &format)?;
            }
        },
    }

    Ok(())
}
