//! A minimal standalone host: JSON-lines records in, one JSON-lines file per output anchor.
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use download_common::messages::{Messenger, TracingMessenger};
use download_common::record::{FieldType, Record, RecordLayout, MAX_TEXT_LENGTH};
use download_common::sink::OutputSink;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::tool::{
    DownloadTool, OutputAnchors, ANCHOR_NAMES, DUPE_ANCHOR, HEADERS_ANCHOR, OUTPUT_DATA_ANCHOR,
    REQUEST_ANCHOR, UNIQUE_ANCHOR,
};
use crate::transport::{build_http_client, DryRunTransport, HttpTransport, Transport};

/// Report progress upstream every this many records.
const PROGRESS_INTERVAL: u64 = 100;

/// Writes each pushed record as one JSON object per line, keyed by field name.
pub struct JsonLinesSink {
    anchor: String,
    writer: Option<BufWriter<File>>,
    layout: RecordLayout,
}

impl JsonLinesSink {
    pub fn create(dir: &Path, anchor: &str) -> std::io::Result<Self> {
        let file = File::create(dir.join(format!("{anchor}.jsonl")))?;

        Ok(Self {
            anchor: anchor.to_owned(),
            writer: Some(BufWriter::new(file)),
            layout: RecordLayout::new(),
        })
    }

    fn write_line(&mut self, line: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        if let Err(e) = writeln!(writer, "{line}") {
            error!(anchor = %self.anchor, "failed to write output, dropping anchor: {}", e);
            self.writer = None;
        }
    }
}

impl OutputSink for JsonLinesSink {
    fn init(&mut self, layout: &RecordLayout) {
        self.layout = layout.clone();
    }

    fn push(&mut self, record: &Record) {
        let line = Value::Object(record_to_json(&self.layout, record)).to_string();
        self.write_line(&line);
    }

    fn update_progress(&mut self, fraction: f64) {
        tracing::debug!(anchor = %self.anchor, progress = fraction, "output progress");
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                error!(anchor = %self.anchor, "failed to flush output: {}", e);
            }
        }
    }
}

fn record_to_json(layout: &RecordLayout, record: &Record) -> Map<String, Value> {
    layout
        .fields()
        .iter()
        .zip(record.values())
        .map(|(field, value)| {
            let value = value
                .as_ref()
                .map_or(Value::Null, |v| Value::String(v.clone()));
            (field.name.clone(), value)
        })
        .collect()
}

/// Build the layout from the keys of the first record.
pub fn layout_from_json(object: &Map<String, Value>) -> RecordLayout {
    let mut layout = RecordLayout::new();
    for name in object.keys() {
        layout.add_field(name, FieldType::VWString, MAX_TEXT_LENGTH);
    }
    layout
}

/// Read an object's values in layout order. Absent keys and JSON nulls become null values.
pub fn record_from_json(layout: &RecordLayout, object: &Map<String, Value>) -> Record {
    let values = layout
        .fields()
        .iter()
        .map(|field| match object.get(&field.name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
        .collect();
    Record::new(values)
}

/// Stream JSON-lines records through a tool with an incoming connection.
///
/// Returns whether the stream ran without the tool refusing it.
pub fn stream_records<S, M, T, R>(
    tool: &mut DownloadTool<S, M, T>,
    reader: R,
    total_bytes: u64,
    record_limit: i64,
) -> Result<bool>
where
    S: OutputSink,
    M: Messenger,
    T: Transport,
    R: BufRead,
{
    let mut layout: Option<RecordLayout> = None;
    let mut bytes_read: u64 = 0;
    let mut pushed: u64 = 0;

    for (line_number, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        bytes_read += line.len() as u64 + 1;

        if line.trim().is_empty() {
            continue;
        }
        if record_limit >= 0 && pushed >= record_limit as u64 {
            break;
        }

        let object: Map<String, Value> = serde_json::from_str(&line)
            .with_context(|| format!("input line {} is not a JSON object", line_number + 1))?;

        if layout.is_none() {
            let first = layout_from_json(&object);
            if !tool.on_layout(first.clone())? {
                return Ok(false);
            }
            layout = Some(first);
        }

        if let Some(current) = &layout {
            tool.on_record(&record_from_json(current, &object))?;
        }
        pushed += 1;

        if pushed % PROGRESS_INTERVAL == 0 && total_bytes > 0 {
            tool.on_progress(bytes_read as f64 / total_bytes as f64);
        }
    }

    if layout.is_none() {
        warn!("the input has no records, nothing was streamed");
        return Ok(true);
    }

    tool.on_progress(1.0);
    tool.on_stream_end()?;

    Ok(true)
}

/// Run the tool as configured by the environment.
pub fn run(config: &Config) -> Result<()> {
    let blob = fs::read_to_string(config.tool_config_path.as_str()).with_context(|| {
        format!(
            "failed to read tool configuration from {}",
            config.tool_config_path.as_str()
        )
    })?;

    let output_dir = Path::new(&config.output_dir);
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", config.output_dir))?;

    let sink = |anchor: &str| {
        JsonLinesSink::create(output_dir, anchor)
            .with_context(|| format!("failed to create output for {anchor}"))
    };
    let anchors = OutputAnchors {
        request: sink(REQUEST_ANCHOR)?,
        output_data: sink(OUTPUT_DATA_ANCHOR)?,
        headers: sink(HEADERS_ANCHOR)?,
        unique: sink(UNIQUE_ANCHOR)?,
        duplicate: sink(DUPE_ANCHOR)?,
    };

    let transport: Box<dyn Transport> = if config.dry_run {
        Box::new(DryRunTransport)
    } else {
        let client = build_http_client(config.request_timeout.0, &config.user_agent)
            .context("failed to construct the HTTP client")?;
        Box::new(HttpTransport::new(client, config.max_response_body))
    };

    let mut tool = DownloadTool::new(
        config.tool_id,
        anchors,
        TracingMessenger::new(config.tool_id),
        transport,
    );

    tool.configure(&blob)?;

    for anchor in ANCHOR_NAMES {
        if !tool.negotiate_output(anchor) {
            bail!("output {anchor} was refused");
        }
    }

    let success = match &config.input_path {
        None => tool.run_without_input(config.record_limit)?,
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open input {path}"))?;
            let total_bytes = file.metadata().map(|m| m.len()).unwrap_or_default();

            tool.negotiate_input("Input", path)?;
            stream_records(&mut tool, BufReader::new(file), total_bytes, config.record_limit)?
        }
    };

    let had_errors = !success || tool.failed_requests() > 0;
    tool.finalize(had_errors);

    info!(
        records = tool.records_seen(),
        output_dir = %config.output_dir,
        "outputs written"
    );

    if !success {
        bail!("the download tool reported errors, see the log for details");
    }

    Ok(())
}
