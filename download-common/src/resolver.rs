//! Decide, per request, which configured source feeds each request axis.
use crate::error::ResolveError;
use crate::record::{FieldValue, RecordHandle, RecordLayout};
use crate::request::{
    Axis, AxisConfig, AxisConfigSet, Credentials, CredentialsConfig, RequestDescriptor,
};

/// Maps an `AxisConfigSet` and an optional record to a `RequestDescriptor`.
/// Holds no per-request state: every call produces a fresh descriptor.
#[derive(Debug, Clone)]
pub struct RequestResolver {
    config: AxisConfigSet,
}

impl RequestResolver {
    pub fn new(config: AxisConfigSet) -> Self {
        Self { config }
    }

    /// Check what can be known before any record arrives.
    ///
    /// A manual URL must be non-empty and a disabled URL is always an error. A field-sourced
    /// URL passes here and is checked again on every record. Every field-sourced axis must
    /// name its field.
    pub fn validate_static(&self) -> Result<(), ResolveError> {
        match &self.config.url {
            AxisConfig::Manual(url) if !url.is_empty() => {}
            AxisConfig::FromField(field) if !field.is_empty() => {}
            _ => return Err(ResolveError::MissingRequiredValue(Axis::Url)),
        }

        match self
            .config
            .field_references()
            .into_iter()
            .find(|(_, field)| field.is_empty())
        {
            Some((axis, _)) => Err(ResolveError::MissingFieldName(axis)),
            None => Ok(()),
        }
    }

    /// Field references that `layout` cannot satisfy.
    pub fn missing_fields<'c>(&'c self, layout: &RecordLayout) -> Vec<(Axis, &'c str)> {
        self.config
            .field_references()
            .into_iter()
            .filter(|(_, field)| !layout.contains(field))
            .collect()
    }

    pub fn resolve(
        &self,
        record: Option<RecordHandle<'_>>,
    ) -> Result<RequestDescriptor, ResolveError> {
        let url = resolve_axis(Axis::Url, &self.config.url, record)?
            .filter(|url| !url.is_empty())
            .ok_or(ResolveError::MissingRequiredValue(Axis::Url))?;
        let headers = resolve_axis(Axis::Headers, &self.config.headers, record)?;
        let payload = resolve_axis(Axis::Payload, &self.config.payload, record)?;
        let credentials = resolve_credentials(&self.config.credentials, record)?;

        Ok(RequestDescriptor {
            method: self.config.method,
            url,
            headers,
            payload,
            credentials,
        })
    }
}

/// Resolve one of the URL, headers or payload axes.
///
/// `Ok(None)` means the axis is absent: disabled, field-sourced without a record, or a null
/// field value. Only a field the record's layout does not have is an error.
fn resolve_axis(
    axis: Axis,
    config: &AxisConfig,
    record: Option<RecordHandle<'_>>,
) -> Result<Option<String>, ResolveError> {
    match (config, record) {
        (AxisConfig::FromField(field), Some(record)) => match record.get_as_string(field) {
            FieldValue::Text(value) => Ok(Some(value.to_owned())),
            FieldValue::Null => Ok(None),
            FieldValue::Missing => Err(ResolveError::MissingFieldSource {
                axis,
                field: field.to_owned(),
            }),
        },
        (AxisConfig::Manual(value), _) => Ok(Some(value.to_owned())),
        (AxisConfig::FromField(_), None) | (AxisConfig::Disabled, _) => Ok(None),
    }
}

fn resolve_credentials(
    config: &CredentialsConfig,
    record: Option<RecordHandle<'_>>,
) -> Result<Credentials, ResolveError> {
    match config {
        CredentialsConfig::FromField {
            username_field,
            password_field,
        } => {
            let username = required_field(username_field, record)?;
            let password = required_field(password_field, record)?;
            Ok(Credentials::Basic { username, password })
        }
        CredentialsConfig::Manual { username, password } => Ok(Credentials::Basic {
            username: username.to_owned(),
            password: password.to_owned(),
        }),
        CredentialsConfig::IntegratedAuth => Ok(Credentials::Integrated),
        CredentialsConfig::Disabled => Ok(Credentials::None),
    }
}

fn required_field(field: &str, record: Option<RecordHandle<'_>>) -> Result<String, ResolveError> {
    match record.map(|record| record.get_as_string(field)) {
        Some(FieldValue::Text(value)) => Ok(value.to_owned()),
        _ => Err(ResolveError::MissingFieldSource {
            axis: Axis::Credentials,
            field: field.to_owned(),
        }),
    }
}
