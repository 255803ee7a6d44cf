//! CLI argument definitions using clap
//!
//! Commands:
//! - typelens fields list --store <dir>
//! - typelens fields remove --store <dir> <id>
//! - typelens fields search --store <dir> <query>
//! - typelens match <text> <query>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// typelens - inspect user-defined fields and the explorer's matcher
#[derive(Parser, Debug)]
#[command(name = "typelens")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage persisted user-defined fields
    Fields {
        #[command(subcommand)]
        action: FieldsAction,
    },

    /// Evaluate the explorer's fuzzy matcher
    Match {
        /// Text to search in
        text: String,
        /// Query to match
        query: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum FieldsAction {
    /// List every persisted field
    List {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Delete a persisted field by id
    Remove {
        #[command(flatten)]
        store: StoreArgs,
        /// Field id (UserField-...)
        id: String,
    },

    /// Fuzzy search persisted fields by name and result type
    Search {
        #[command(flatten)]
        store: StoreArgs,
        query: String,
    },
}

/// Where the persisted fields live
#[derive(clap::Args, Debug)]
pub struct StoreArgs {
    /// Directory holding the store file
    #[arg(long)]
    pub store: PathBuf,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
