//! Streaming detection of records repeating the previous record's value.
use std::fmt;

use crate::error::ClassifierError;
use crate::record::{FieldAccessor, Record, RecordLayout};
use crate::sink::OutputSink;

/// The output a classified record is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Unique,
    Duplicate,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Unique => "unique",
            Channel::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub unique_count: u64,
    pub duplicate_count: u64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unique records and {} dupes were found",
            self.unique_count, self.duplicate_count
        )
    }
}

#[derive(Debug, Default)]
struct ClassifierState {
    /// `None` until the first record; the inner `None` is a null field value.
    previous_value: Option<Option<String>>,
    unique_count: u64,
    duplicate_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Ready,
    Streaming,
    Closed,
}

/// Sends each record to the unique or duplicate output depending on whether its selected
/// field equals the one of the record right before it.
///
/// This is adjacent-duplicate detection: `a, b, a` yields three unique records.
pub struct AdjacentDuplicateClassifier<S> {
    unique: S,
    duplicate: S,
    accessor: Option<FieldAccessor>,
    state: ClassifierState,
    phase: Phase,
}

impl<S: OutputSink> AdjacentDuplicateClassifier<S> {
    pub fn new(unique: S, duplicate: S) -> Self {
        Self {
            unique,
            duplicate,
            accessor: None,
            state: ClassifierState::default(),
            phase: Phase::Uninitialized,
        }
    }

    /// Bind the comparison field and initialize both outputs with the input layout.
    pub fn init(
        &mut self,
        selected_field: Option<&str>,
        layout: &RecordLayout,
    ) -> Result<(), ClassifierError> {
        if self.phase == Phase::Closed {
            return Err(ClassifierError::Closed);
        }

        let accessor = selected_field
            .and_then(|field| layout.accessor(field))
            .ok_or_else(|| {
                ClassifierError::MissingFieldSelection(selected_field.map(str::to_owned))
            })?;

        self.unique.init(layout);
        self.duplicate.init(layout);

        self.accessor = Some(accessor);
        self.state = ClassifierState::default();
        self.phase = Phase::Ready;

        Ok(())
    }

    /// Classify a record and push it, unmodified, to the matching output.
    pub fn classify(&mut self, record: &Record) -> Result<Channel, ClassifierError> {
        let accessor = match self.phase {
            Phase::Closed => return Err(ClassifierError::Closed),
            Phase::Uninitialized => return Err(ClassifierError::NotInitialized),
            Phase::Ready | Phase::Streaming => {
                self.accessor.ok_or(ClassifierError::NotInitialized)?
            }
        };
        self.phase = Phase::Streaming;

        let current = accessor.get_as_string(record);
        let channel = match &self.state.previous_value {
            Some(previous) if previous.as_deref() == current => Channel::Duplicate,
            _ => Channel::Unique,
        };

        match channel {
            Channel::Unique => {
                self.state.unique_count += 1;
                self.unique.push(record);
            }
            Channel::Duplicate => {
                self.state.duplicate_count += 1;
                self.duplicate.push(record);
            }
        }

        self.state.previous_value = Some(current.map(str::to_owned));

        Ok(channel)
    }

    /// Forward upstream progress to both outputs, unchanged.
    pub fn progress(&mut self, fraction: f64) {
        if self.phase == Phase::Closed {
            return;
        }
        self.unique.update_progress(fraction);
        self.duplicate.update_progress(fraction);
    }

    /// Close both outputs and return the final counts. Only valid once.
    pub fn close(&mut self) -> Result<Summary, ClassifierError> {
        if self.phase == Phase::Closed {
            return Err(ClassifierError::Closed);
        }
        self.phase = Phase::Closed;

        self.unique.close();
        self.duplicate.close();

        Ok(self.summary())
    }

    pub fn summary(&self) -> Summary {
        Summary {
            unique_count: self.state.unique_count,
            duplicate_count: self.state.duplicate_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldType;
    use crate::sink::MemorySink;

    fn layout() -> RecordLayout {
        let mut layout = RecordLayout::new();
        layout.add_field("id", FieldType::Int64, 8);
        layout.add_field("name", FieldType::VString, 32);
        layout
    }

    fn record(id: usize, name: Option<&str>) -> Record {
        Record::new(vec![Some(id.to_string()), name.map(str::to_owned)])
    }

    fn classifier() -> (AdjacentDuplicateClassifier<MemorySink>, MemorySink, MemorySink) {
        let unique = MemorySink::new();
        let duplicate = MemorySink::new();
        let mut classifier = AdjacentDuplicateClassifier::new(unique.clone(), duplicate.clone());
        classifier
            .init(Some("name"), &layout())
            .expect("name is in the layout");
        (classifier, unique, duplicate)
    }

    #[test]
    fn test_adjacent_duplicates() {
        let (mut classifier, unique, duplicate) = classifier();

        let channels: Vec<Channel> = ["a", "a", "b", "a", "a", "a"]
            .iter()
            .enumerate()
            .map(|(id, name)| classifier.classify(&record(id, Some(*name))).unwrap())
            .collect();

        assert_eq!(
            channels,
            vec![
                Channel::Unique,
                Channel::Duplicate,
                Channel::Unique,
                Channel::Unique,
                Channel::Duplicate,
                Channel::Duplicate,
            ]
        );

        let summary = classifier.close().unwrap();
        assert_eq!(
            summary,
            Summary {
                unique_count: 3,
                duplicate_count: 3
            }
        );
        assert_eq!(
            summary.to_string(),
            "3 unique records and 3 dupes were found"
        );
        assert_eq!(unique.records().len(), 3);
        assert_eq!(duplicate.records().len(), 3);
        assert!(unique.is_closed());
        assert!(duplicate.is_closed());
    }

    #[test]
    fn test_records_pass_through_unmodified() {
        let (mut classifier, unique, duplicate) = classifier();
        let first = record(1, Some("x"));
        let second = record(2, Some("x"));

        classifier.classify(&first).unwrap();
        classifier.classify(&second).unwrap();

        assert_eq!(unique.records(), vec![first]);
        assert_eq!(duplicate.records(), vec![second]);
        assert_eq!(unique.layout(), Some(layout()));
        assert_eq!(duplicate.layout(), Some(layout()));
    }

    #[test]
    fn test_first_record_is_always_unique() {
        for name in [Some(""), None, Some("anything")] {
            let (mut classifier, _, _) = classifier();
            assert_eq!(
                classifier.classify(&record(0, name)).unwrap(),
                Channel::Unique
            );
        }
    }

    #[test]
    fn test_nulls_and_case() {
        let (mut classifier, _, _) = classifier();

        assert_eq!(classifier.classify(&record(0, None)).unwrap(), Channel::Unique);
        assert_eq!(classifier.classify(&record(1, None)).unwrap(), Channel::Duplicate);
        assert_eq!(classifier.classify(&record(2, Some(""))).unwrap(), Channel::Unique);
        assert_eq!(classifier.classify(&record(3, Some("A"))).unwrap(), Channel::Unique);
        assert_eq!(classifier.classify(&record(4, Some("a"))).unwrap(), Channel::Unique);
    }

    #[test]
    fn test_missing_field_selection() {
        let mut classifier = AdjacentDuplicateClassifier::new(MemorySink::new(), MemorySink::new());

        assert_eq!(
            classifier.init(None, &layout()),
            Err(ClassifierError::MissingFieldSelection(None))
        );
        assert_eq!(
            classifier.init(Some("email"), &layout()),
            Err(ClassifierError::MissingFieldSelection(Some("email".to_owned())))
        );
        assert_eq!(
            classifier.classify(&record(0, Some("a"))),
            Err(ClassifierError::NotInitialized)
        );
    }

    #[test]
    fn test_close_is_exactly_once() {
        let (mut classifier, _, _) = classifier();
        classifier.classify(&record(0, Some("a"))).unwrap();

        assert!(classifier.close().is_ok());
        assert_eq!(classifier.close(), Err(ClassifierError::Closed));
        assert_eq!(
            classifier.classify(&record(1, Some("a"))),
            Err(ClassifierError::Closed)
        );
        assert_eq!(classifier.summary().unique_count, 1);
    }

    #[test]
    fn test_progress_is_forwarded_unchanged() {
        let (mut classifier, unique, duplicate) = classifier();

        classifier.progress(0.25);
        classifier.progress(1.0);

        assert_eq!(unique.progress(), vec![0.25, 1.0]);
        assert_eq!(duplicate.progress(), vec![0.25, 1.0]);
    }
}
