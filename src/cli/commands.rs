//! CLI command implementations
//!
//! Commands work directly on the persisted-field store; nothing is
//! compiled or registered.

use serde_json::{json, Value};

use crate::config::LensConfig;
use crate::explorer::fuzzy_match;
use crate::observability::Logger;
use crate::persist::{JsonFileStore, KeyValueStore, PersistedField};

use super::args::{Command, FieldsAction, StoreArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Fields { action } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| CliError::io_error(format!("failed to start runtime: {}", e)))?;
            runtime.block_on(run_fields(action))
        }
        Command::Match { text, query } => write_response(match_result(&text, &query)),
    }
}

async fn run_fields(action: FieldsAction) -> CliResult<()> {
    match action {
        FieldsAction::List { store } => {
            let store = open_store(&store)?;
            for field in read_fields(&store).await? {
                write_response(field_json(&field))?;
            }
            Ok(())
        }
        FieldsAction::Remove { store, id } => {
            let store = open_store(&store)?;
            remove_field(&store, &id).await?;
            write_response(json!({ "removed": id }))
        }
        FieldsAction::Search { store, query } => {
            let store = open_store(&store)?;
            for field in search_fields(&store, &query).await? {
                write_response(field_json(&field))?;
            }
            Ok(())
        }
    }
}

fn open_store(args: &StoreArgs) -> CliResult<JsonFileStore> {
    let config = match &args.config {
        Some(path) => LensConfig::load(path)?,
        None => LensConfig::default(),
    };
    Logger::set_min_severity(config.log_level);
    Ok(JsonFileStore::new(&args.store, &config.store_namespace))
}

/// Decodable records in key order; the rest are reported and skipped
pub async fn read_fields(store: &dyn KeyValueStore) -> CliResult<Vec<PersistedField>> {
    let mut fields = Vec::new();
    for (id, value) in store.all().await? {
        match PersistedField::from_stored(&id, value) {
            Ok(field) => fields.push(field),
            Err(err) => write_error(err.code(), &format!("{}: {}", id, err))?,
        }
    }
    Ok(fields)
}

/// Records whose `name [result type]` fuzzily matches `query`
pub async fn search_fields(store: &dyn KeyValueStore, query: &str) -> CliResult<Vec<PersistedField>> {
    Ok(read_fields(store)
        .await?
        .into_iter()
        .filter(|field| fuzzy_match(&search_text(field), query))
        .collect())
}

pub async fn remove_field(store: &dyn KeyValueStore, id: &str) -> CliResult<()> {
    if store.get(id).await?.is_none() {
        return Err(CliError::not_found(id));
    }
    store.delete(id).await?;
    Ok(())
}

fn search_text(field: &PersistedField) -> String {
    match &field.result_type_name {
        Some(result_type_name) => format!("{} {}", field.name, result_type_name),
        None => field.name.clone(),
    }
}

fn field_json(field: &PersistedField) -> Value {
    let kind = if field.is_description() {
        "description"
    } else {
        "extendedField"
    };
    json!({
        "id": field.unique_id,
        "module": field.module,
        "type": field.type_name,
        "name": field.name,
        "resultType": field.result_type_name,
        "kind": kind,
    })
}

fn match_result(text: &str, query: &str) -> Value {
    json!({
        "text": text,
        "query": query,
        "matches": fuzzy_match(text, query),
    })
}
