//! Host-driven lifecycle of the download tool.
//!
//! The host calls `configure`, negotiates connections, then either `run_without_input` once,
//! or streams records through `on_layout`, `on_record`, `on_progress` and `on_stream_end`.
use download_common::classifier::{AdjacentDuplicateClassifier, Summary};
use download_common::error::ClassifierError;
use download_common::messages::{Messenger, Severity};
use download_common::record::{Record, RecordHandle, RecordLayout};
use download_common::request::RequestDescriptor;
use download_common::resolver::RequestResolver;
use download_common::sink::OutputSink;
use tracing::{debug, info};

use crate::error::ToolError;
use crate::tool_config::ToolConfig;
use crate::transport::Transport;

pub const REQUEST_ANCHOR: &str = "Request";
pub const OUTPUT_DATA_ANCHOR: &str = "OutputData";
pub const HEADERS_ANCHOR: &str = "Headers";
pub const UNIQUE_ANCHOR: &str = "Unique";
pub const DUPE_ANCHOR: &str = "Dupe";

pub const ANCHOR_NAMES: [&str; 5] = [
    REQUEST_ANCHOR,
    OUTPUT_DATA_ANCHOR,
    HEADERS_ANCHOR,
    UNIQUE_ANCHOR,
    DUPE_ANCHOR,
];

/// The outgoing connections of the tool, one sink per anchor.
pub struct OutputAnchors<S> {
    pub request: S,
    pub output_data: S,
    pub headers: S,
    pub unique: S,
    pub duplicate: S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolState {
    Uninitialized,
    Configured,
    Streaming,
    Closed,
}

impl ToolState {
    fn as_str(&self) -> &'static str {
        match self {
            ToolState::Uninitialized => "uninitialized",
            ToolState::Configured => "configured",
            ToolState::Streaming => "streaming",
            ToolState::Closed => "closed",
        }
    }
}

/// Issues one HTTP request per incoming record, or a single one without an incoming
/// connection, and splits incoming records into unique and adjacent-duplicate outputs.
pub struct DownloadTool<S, M, T> {
    tool_id: u32,
    state: ToolState,
    messenger: M,
    transport: T,
    resolver: Option<RequestResolver>,
    field_selection: Option<String>,
    /// Name of the incoming connection, once negotiated.
    input: Option<String>,
    layout: Option<RecordLayout>,
    request_output: S,
    data_output: S,
    headers_output: S,
    request_outputs_open: bool,
    classifier: AdjacentDuplicateClassifier<S>,
    records_seen: u64,
    failed_requests: u64,
}

impl<S, M, T> DownloadTool<S, M, T>
where
    S: OutputSink,
    M: Messenger,
    T: Transport,
{
    pub fn new(tool_id: u32, anchors: OutputAnchors<S>, messenger: M, transport: T) -> Self {
        Self {
            tool_id,
            state: ToolState::Uninitialized,
            messenger,
            transport,
            resolver: None,
            field_selection: None,
            input: None,
            layout: None,
            request_output: anchors.request,
            data_output: anchors.output_data,
            headers_output: anchors.headers,
            request_outputs_open: false,
            classifier: AdjacentDuplicateClassifier::new(anchors.unique, anchors.duplicate),
            records_seen: 0,
            failed_requests: 0,
        }
    }

    /// Parse the configuration blob once and keep the structured result.
    pub fn configure(&mut self, blob: &str) -> Result<(), ToolError> {
        self.expect_state("configure", ToolState::Uninitialized)?;

        let config = match ToolConfig::parse(blob) {
            Ok(config) => config,
            Err(e) => {
                self.messenger.report(Severity::Error, &e.to_string());
                return Err(e.into());
            }
        };

        debug!(
            tool_id = self.tool_id,
            method = %config.axes.method,
            field_selection = ?config.field_selection,
            "tool configured"
        );

        self.resolver = Some(RequestResolver::new(config.axes));
        self.field_selection = config.field_selection;
        self.state = ToolState::Configured;

        Ok(())
    }

    /// Accept the incoming connection. Only one is supported.
    pub fn negotiate_input(&mut self, kind: &str, name: &str) -> Result<(), ToolError> {
        self.expect_state("negotiate_input", ToolState::Configured)?;

        if self.input.is_some() {
            return Err(ToolError::TooManyInputs(name.to_owned()));
        }

        info!(tool_id = self.tool_id, kind, name, "incoming connection added");
        self.input = Some(name.to_owned());

        Ok(())
    }

    pub fn negotiate_output(&self, name: &str) -> bool {
        ANCHOR_NAMES.contains(&name)
    }

    /// Issue the single request of a tool without an incoming connection.
    ///
    /// `record_limit` of zero only validates the configuration. Returns `false` when a
    /// user-facing error was reported.
    pub fn run_without_input(&mut self, record_limit: i64) -> Result<bool, ToolError> {
        self.expect_state("run_without_input", ToolState::Configured)?;
        if self.input.is_some() {
            return Err(ToolError::InvalidState {
                operation: "run_without_input",
                state: "connected to an input",
            });
        }

        let resolver = self.resolver()?.clone();
        self.init_request_outputs();

        let success = match resolver.validate_static() {
            Err(e) => {
                self.messenger.report(Severity::Error, &e.to_string());
                false
            }
            Ok(()) if record_limit == 0 => true,
            Ok(()) => match resolver.resolve(None) {
                Ok(request) => self.issue(&request),
                Err(e) => {
                    self.messenger.report(Severity::Error, &e.to_string());
                    false
                }
            },
        };

        self.close_request_outputs();
        self.state = ToolState::Closed;

        Ok(success)
    }

    /// Validate the incoming layout and initialize every output.
    ///
    /// Configuration problems that depend on the layout are reported here, once, and the
    /// stream is refused.
    pub fn on_layout(&mut self, layout: RecordLayout) -> Result<bool, ToolError> {
        self.expect_state("on_layout", ToolState::Configured)?;
        if self.input.is_none() {
            return Err(ToolError::InvalidState {
                operation: "on_layout",
                state: "without an incoming connection",
            });
        }

        let (static_check, missing) = {
            let resolver = self.resolver()?;
            let missing: Vec<String> = resolver
                .missing_fields(&layout)
                .into_iter()
                .map(|(axis, field)| format!("\"{field}\" ({axis})"))
                .collect();
            (resolver.validate_static(), missing)
        };

        if let Err(e) = static_check {
            self.messenger.report(Severity::Error, &e.to_string());
            return Ok(false);
        }

        if !missing.is_empty() {
            let message = format!(
                "The incoming data has no field named {}",
                missing.join(", ")
            );
            self.messenger.report(Severity::Error, &message);
            return Ok(false);
        }

        match self.classifier.init(self.field_selection.as_deref(), &layout) {
            Ok(()) => {}
            Err(e @ ClassifierError::MissingFieldSelection(_)) => {
                self.messenger.report(Severity::Error, &e.to_string());
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        self.init_request_outputs();
        self.layout = Some(layout);
        self.state = ToolState::Streaming;

        Ok(true)
    }

    /// Resolve and issue the request for a record, then classify it.
    ///
    /// Resolution and transport failures are reported once for the record, which still
    /// reaches the unique or duplicate output.
    pub fn on_record(&mut self, record: &Record) -> Result<bool, ToolError> {
        self.expect_state("on_record", ToolState::Streaming)?;
        self.records_seen += 1;

        let resolved = match (&self.resolver, &self.layout) {
            (Some(resolver), Some(layout)) => {
                resolver.resolve(Some(RecordHandle::new(layout, record)))
            }
            _ => {
                return Err(ToolError::InvalidState {
                    operation: "on_record",
                    state: "missing its configuration",
                })
            }
        };

        match resolved {
            Ok(request) => {
                self.issue(&request);
            }
            Err(e) => {
                let message = format!("Record {}: {}", self.records_seen, e);
                self.messenger.report(Severity::Error, &message);
            }
        }

        let channel = self.classifier.classify(record)?;
        metrics::counter!("download_records_classified", "channel" => channel.as_str())
            .increment(1);

        Ok(true)
    }

    /// Upstream progress fills the second half of the tool's own progress.
    pub fn on_progress(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);

        self.messenger.tool_progress(fraction / 2.0 + 0.5);
        self.classifier.progress(fraction);

        if self.request_outputs_open {
            self.request_output.update_progress(fraction);
            self.data_output.update_progress(fraction);
            self.headers_output.update_progress(fraction);
        }
    }

    /// Close every output and report how many unique and duplicate records were seen.
    pub fn on_stream_end(&mut self) -> Result<Summary, ToolError> {
        self.expect_state("on_stream_end", ToolState::Streaming)?;

        let summary = self.classifier.close()?;
        self.messenger.report(Severity::Info, &summary.to_string());

        self.close_request_outputs();
        self.state = ToolState::Closed;

        Ok(summary)
    }

    /// Called by the host once all processing is over.
    pub fn finalize(&mut self, had_errors: bool) {
        info!(
            tool_id = self.tool_id,
            had_errors,
            records = self.records_seen,
            failed_requests = self.failed_requests,
            "download tool finished"
        );

        // A stream the host abandoned is dropped without a summary.
        self.close_request_outputs();
        self.state = ToolState::Closed;
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests
    }

    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    /// Emit the request description, send the request and emit what came back.
    /// Returns whether the request went through.
    fn issue(&mut self, request: &RequestDescriptor) -> bool {
        self.request_output.push(&Record::single_text(&request.describe()));

        metrics::counter!("download_requests_total").increment(1);
        let now = std::time::Instant::now();

        match self.transport.send(request) {
            Ok(response) => {
                metrics::histogram!("download_request_duration_seconds")
                    .record(now.elapsed().as_secs_f64());

                if !response.status.is_success() {
                    let message = format!(
                        "{} {} returned {}",
                        request.method, request.url, response.status
                    );
                    self.messenger.report(Severity::Warning, &message);
                }

                self.data_output.push(&Record::single_text(&response.body));
                self.headers_output
                    .push(&Record::single_text(&response.headers_text()));

                true
            }
            Err(e) => {
                metrics::counter!("download_requests_failed").increment(1);
                self.failed_requests += 1;

                let message = format!("{} {} failed: {}", request.method, request.url, e);
                self.messenger.report(Severity::Error, &message);

                false
            }
        }
    }

    fn init_request_outputs(&mut self) {
        self.request_output
            .init(&RecordLayout::single_text_field("Request"));
        self.data_output
            .init(&RecordLayout::single_text_field("Output Data"));
        self.headers_output
            .init(&RecordLayout::single_text_field("Headers"));
        self.request_outputs_open = true;
    }

    fn close_request_outputs(&mut self) {
        if !self.request_outputs_open {
            return;
        }
        self.request_output.close();
        self.data_output.close();
        self.headers_output.close();
        self.request_outputs_open = false;
    }

    fn resolver(&self) -> Result<&RequestResolver, ToolError> {
        self.resolver.as_ref().ok_or(ToolError::InvalidState {
            operation: "resolve",
            state: ToolState::Uninitialized.as_str(),
        })
    }

    fn expect_state(&self, operation: &'static str, expected: ToolState) -> Result<(), ToolError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ToolError::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }
}
