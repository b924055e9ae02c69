//! Line-delimited JSON messages written to stdout

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

use super::state::State;

/// Downstream receiver of extracted data
pub trait MessageSink {
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &Value,
        key_properties: &[String],
        bookmark_property: Option<&str>,
    ) -> Result<()>;

    fn write_record(&mut self, stream: &str, record: &Value) -> Result<()>;

    /// Checkpoint; everything before it is considered delivered
    fn write_state(&mut self, state: &State) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum Message<'a> {
    Schema {
        stream: &'a str,
        schema: &'a Value,
        key_properties: &'a [String],
        #[serde(skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<&'a str>,
    },
    Record {
        stream: &'a str,
        record: &'a Value,
        time_extracted: String,
    },
    State {
        value: &'a State,
    },
}

/// Writes one JSON message per line and flushes after each state
pub struct SingerWriter<W: Write> {
    out: W,
}

impl<W: Write> SingerWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, message: &Message<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl SingerWriter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> MessageSink for SingerWriter<W> {
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &Value,
        key_properties: &[String],
        bookmark_property: Option<&str>,
    ) -> Result<()> {
        self.emit(&Message::Schema {
            stream,
            schema,
            key_properties,
            bookmark_properties: bookmark_property.into_iter().collect(),
        })
    }

    fn write_record(&mut self, stream: &str, record: &Value) -> Result<()> {
        self.emit(&Message::Record {
            stream,
            record,
            time_extracted: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }

    fn write_state(&mut self, state: &State) -> Result<()> {
        self.emit(&Message::State { value: state })?;
        self.out.flush()?;
        Ok(())
    }
}
