use thiserror::Error;

use crate::request::Axis;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("{0} is not a valid HttpMethod")]
pub struct ParseHttpMethodError(pub String);

/// Enumeration of failures while resolving a request from its configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Missing {0}. Please Enter a {0}!")]
    MissingRequiredValue(Axis),
    #[error("the {axis} field \"{field}\" has no value on this record")]
    MissingFieldSource { axis: Axis, field: String },
    #[error("No field is selected for the {0}. Please select a field!")]
    MissingFieldName(Axis),
}

/// Enumeration of failures raised by `AdjacentDuplicateClassifier`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("Select a field.")]
    MissingFieldSelection(Option<String>),
    #[error("the classifier received a record before it was initialized")]
    NotInitialized,
    #[error("the classifier has already been closed")]
    Closed,
}
