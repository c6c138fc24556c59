use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// User-facing messaging channel of the host engine.
pub trait Messenger {
    fn report(&mut self, severity: Severity, text: &str);

    /// Overall progress of the tool, between 0.0 and 1.0.
    fn tool_progress(&mut self, _fraction: f64) {}
}

/// Sends host messages to `tracing`, tagged with the tool id.
#[derive(Debug, Clone, Copy)]
pub struct TracingMessenger {
    tool_id: u32,
}

impl TracingMessenger {
    pub fn new(tool_id: u32) -> Self {
        Self { tool_id }
    }
}

impl Messenger for TracingMessenger {
    fn report(&mut self, severity: Severity, text: &str) {
        match severity {
            Severity::Info => info!(tool_id = self.tool_id, "{}", text),
            Severity::Warning => warn!(tool_id = self.tool_id, "{}", text),
            Severity::Error => error!(tool_id = self.tool_id, "{}", text),
        }
    }

    fn tool_progress(&mut self, fraction: f64) {
        tracing::debug!(tool_id = self.tool_id, progress = fraction, "tool progress");
    }
}

/// Collects messages so callers can assert on them. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingMessenger {
    messages: Rc<RefCell<Vec<(Severity, String)>>>,
    progress: Rc<RefCell<Vec<f64>>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.borrow().clone()
    }

    pub fn with_severity(&self, severity: Severity) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.with_severity(Severity::Error)
    }

    pub fn progress(&self) -> Vec<f64> {
        self.progress.borrow().clone()
    }
}

impl Messenger for RecordingMessenger {
    fn report(&mut self, severity: Severity, text: &str) {
        self.messages.borrow_mut().push((severity, text.to_owned()));
    }

    fn tool_progress(&mut self, fraction: f64) {
        self.progress.borrow_mut().push(fraction);
    }
}
