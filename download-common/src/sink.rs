use std::cell::RefCell;
use std::rc::Rc;

use crate::record::{Record, RecordLayout};

/// An outgoing connection provided by the host.
pub trait OutputSink {
    /// Declare the layout of the records that will be pushed.
    fn init(&mut self, layout: &RecordLayout);

    fn push(&mut self, record: &Record);

    fn update_progress(&mut self, fraction: f64);

    fn close(&mut self);
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn init(&mut self, layout: &RecordLayout) {
        (**self).init(layout)
    }

    fn push(&mut self, record: &Record) {
        (**self).push(record)
    }

    fn update_progress(&mut self, fraction: f64) {
        (**self).update_progress(fraction)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Debug, Default)]
pub struct MemorySinkState {
    pub layout: Option<RecordLayout>,
    pub records: Vec<Record>,
    pub progress: Vec<f64>,
    pub closed: bool,
}

/// Keeps everything pushed to it in memory.
///
/// Clones share the same buffer, so a caller can hand one clone to the tool and read the
/// results through another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Rc<RefCell<MemorySinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self) -> Option<RecordLayout> {
        self.state.borrow().layout.clone()
    }

    pub fn records(&self) -> Vec<Record> {
        self.state.borrow().records.clone()
    }

    /// The first value of every pushed record, for single text field outputs.
    pub fn texts(&self) -> Vec<String> {
        self.state
            .borrow()
            .records
            .iter()
            .map(|record| record.get(0).unwrap_or_default().to_owned())
            .collect()
    }

    pub fn progress(&self) -> Vec<f64> {
        self.state.borrow().progress.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

impl OutputSink for MemorySink {
    fn init(&mut self, layout: &RecordLayout) {
        self.state.borrow_mut().layout = Some(layout.clone());
    }

    fn push(&mut self, record: &Record) {
        self.state.borrow_mut().records.push(record.clone());
    }

    fn update_progress(&mut self, fraction: f64) {
        self.state.borrow_mut().progress.push(fraction);
    }

    fn close(&mut self) {
        self.state.borrow_mut().closed = true;
    }
}
