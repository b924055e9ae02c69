//! Extraction engine
//!
//! Walks the selected catalog streams one at a time, draining each through
//! `StreamSyncer` and emitting SCHEMA, RECORD and STATE messages to a sink.

pub mod catalog;
pub mod output;
pub mod state;
pub mod stream;

pub use catalog::{Catalog, CatalogEntry, MetadataEntry};
pub use output::{MessageSink, SingerWriter};
pub use state::State;
pub use stream::{StreamSpec, StreamSyncer};

use anyhow::{Context, Result};
use log::info;
use serde_json::Value;

use crate::api::DynamicsClient;

/// Stream metadata key holding the Web API collection name
pub const ENTITY_SET_METADATA: &str = "entity-set-name";

/// Sync every selected stream, resuming from `currently_syncing` if a prior run was interrupted
pub async fn run_sync(
    client: &DynamicsClient,
    start_date: &str,
    catalog: &Catalog,
    mut state: State,
    sink: &mut dyn MessageSink,
) -> Result<State> {
    let selected = catalog.selected_streams(state.currently_syncing.as_deref());
    info!("There are {} selected streams", selected.len());

    let syncer = StreamSyncer::new(client, start_date);

    for entry in selected {
        let stream_id = entry.tap_stream_id.as_str();
        info!("Starting sync for stream: {}", stream_id);

        let entity_set = resolve_entity_set(client, entry).await?;
        let spec = StreamSpec::from_entry(entry, entity_set);

        state.set_currently_syncing(Some(stream_id));
        sink.write_state(&state)?;

        sink.write_schema(
            stream_id,
            &entry.schema,
            &entry.key_properties,
            spec.replication_key.as_deref(),
        )?;

        state = syncer
            .sync(state, &spec, sink)
            .await
            .with_context(|| format!("Failed to sync stream {}", stream_id))?;
        sink.write_state(&state)?;
    }

    state.set_currently_syncing(None);
    sink.write_state(&state)?;
    Ok(state)
}

/// Catalogs written by discovery carry the entity set; older ones are resolved by name
async fn resolve_entity_set(client: &DynamicsClient, entry: &CatalogEntry) -> Result<String> {
    if let Some(entity_set) = entry
        .stream_metadata()
        .and_then(|m| m.get(ENTITY_SET_METADATA))
        .and_then(Value::as_str)
    {
        return Ok(entity_set.to_string());
    }

    let definition = client
        .entity_definition(&entry.tap_stream_id)
        .await
        .with_context(|| format!("Failed to resolve entity set for {}", entry.tap_stream_id))?;
    Ok(definition.entity_set_name)
}
