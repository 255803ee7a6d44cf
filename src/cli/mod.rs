//! CLI module for typelens
//!
//! Provides command-line access to:
//! - fields: list, remove, and search persisted user-defined fields
//! - match: the explorer's fuzzy matcher

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, FieldsAction, StoreArgs};
pub use commands::{read_fields, remove_field, run_command, search_fields};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}
