use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::catalog::CatalogEntry;
use super::output::MessageSink;
use super::state::State;
use crate::api::DynamicsClient;
use crate::api::constants::MAX_SELECT_PARAM_SIZE;
use crate::api::query::{Query, SelectSpec};

/// What to extract for one stream
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub tap_stream_id: String,
    pub entity_set: String,
    /// `None` means a full-table read
    pub replication_key: Option<String>,
    pub columns: Vec<String>,
}

impl StreamSpec {
    pub fn from_entry(entry: &CatalogEntry, entity_set: impl Into<String>) -> Self {
        Self {
            tap_stream_id: entry.tap_stream_id.clone(),
            entity_set: entity_set.into(),
            replication_key: if entry.is_incremental() {
                entry.replication_key.clone()
            } else {
                None
            },
            columns: entry.desired_columns(),
        }
    }
}

/// Drains one stream through the paginator into a sink
pub struct StreamSyncer<'a> {
    client: &'a DynamicsClient,
    start_date: String,
    pagesize: u32,
    select_budget: usize,
}

impl<'a> StreamSyncer<'a> {
    pub fn new(client: &'a DynamicsClient, start_date: impl Into<String>) -> Self {
        Self {
            client,
            start_date: start_date.into(),
            pagesize: client.settings().pagesize,
            select_budget: MAX_SELECT_PARAM_SIZE,
        }
    }

    /// Byte limit for the `$select` column list
    pub fn with_select_budget(mut self, max_bytes: usize) -> Self {
        self.select_budget = max_bytes;
        self
    }

    pub async fn sync(&self, state: State, stream: &StreamSpec, sink: &mut dyn MessageSink) -> Result<State> {
        match &stream.replication_key {
            Some(key) => self.sync_incremental(state, stream, key, sink).await,
            None => self.sync_full_table(state, stream, sink).await,
        }
    }

    /// Ordered by the key ascending from the stored bookmark (or the start date).
    /// State is checkpointed after every page; the bookmark only moves forward.
    async fn sync_incremental(
        &self,
        mut state: State,
        stream: &StreamSpec,
        key: &str,
        sink: &mut dyn MessageSink,
    ) -> Result<State> {
        let stream_id = stream.tap_stream_id.as_str();
        let start = state
            .bookmark(stream_id, key)
            .unwrap_or(self.start_date.as_str())
            .to_string();

        info!("Syncing {} incrementally on {} from {}", stream_id, key, start);

        let query = Query::incremental(&stream.entity_set, key, Some(start.as_str()))
            .select(self.select(stream))
            .max_pagesize(self.pagesize);

        let mut bookmark = start.clone();
        let mut emitted = 0usize;
        let mut skipped = 0usize;
        let mut pages = self.client.pages(query.to_request());

        while let Some(page) = pages.next_page().await? {
            for record in &page.value {
                let Some(value) = record.get(key).and_then(Value::as_str) else {
                    warn!("{} record without a {} value, skipping", stream_id, key);
                    skipped += 1;
                    continue;
                };

                if compare_replication_values(value, &start) == Ordering::Less {
                    skipped += 1;
                    continue;
                }

                sink.write_record(stream_id, &project(record, &stream.columns))?;
                emitted += 1;

                if compare_replication_values(value, &bookmark) == Ordering::Greater {
                    bookmark = value.to_string();
                }
            }

            state.set_bookmark(stream_id, key, bookmark.as_str());
            sink.write_state(&state)?;
            debug!("Checkpointed {} at {} after page {}", stream_id, bookmark, pages.fetched());
        }

        if skipped > 0 {
            debug!("Skipped {} {} records before {}", skipped, stream_id, start);
        }
        info!("Finished syncing {}: {} records, bookmark {}", stream_id, emitted, bookmark);
        Ok(state)
    }

    async fn sync_full_table(&self, state: State, stream: &StreamSpec, sink: &mut dyn MessageSink) -> Result<State> {
        let stream_id = stream.tap_stream_id.as_str();
        info!("Syncing {} as a full table", stream_id);

        let query = Query::new(&stream.entity_set)
            .select(self.select(stream))
            .max_pagesize(self.pagesize);

        let mut emitted = 0usize;
        let mut pages = self.client.pages(query.to_request());

        while let Some(page) = pages.next_page().await? {
            if page.is_empty() {
                warn!("Response is empty for {}", stream.entity_set);
            }
            for record in &page.value {
                sink.write_record(stream_id, &project(record, &stream.columns))?;
                emitted += 1;
            }
        }

        sink.write_state(&state)?;
        info!("Finished syncing {}: {} records", stream_id, emitted);
        Ok(state)
    }

    fn select(&self, stream: &StreamSpec) -> SelectSpec {
        SelectSpec::new(stream.columns.iter().cloned()).with_max_bytes(self.select_budget)
    }
}

/// Keep only the requested columns. OData annotations never survive.
fn project(record: &Value, columns: &[String]) -> Value {
    let Some(fields) = record.as_object() else {
        return record.clone();
    };

    let projected: Map<String, Value> = if columns.is_empty() {
        fields
            .iter()
            .filter(|(name, _)| !name.contains('@'))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    } else {
        columns
            .iter()
            .filter_map(|name| fields.get(name).map(|value| (name.clone(), value.clone())))
            .collect()
    };

    Value::Object(projected)
}

/// Order two replication key values, as instants when both parse as timestamps
pub fn compare_replication_values(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// RFC 3339, offset-less date-times (taken as UTC) and plain dates
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
