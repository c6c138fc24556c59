//! The tool configuration delivered by the host, parsed once at `configure`.
use download_common::request::{
    Axis, AxisConfig, AxisConfigSet, CredentialsConfig, HttpMethod,
};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::error::ConfigError;

/// The configuration blob as the GUI writes it: one selector flag per radio button and
/// one text entry per value or field drop-down. The "no value" radio buttons are not read,
/// an axis with neither source selected is disabled.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawToolConfig {
    #[serde(rename = "HTTPAction")]
    pub http_action: Option<String>,

    #[serde(rename = "radioURLMan", deserialize_with = "deserialize_flag")]
    pub url_manual_selected: bool,
    #[serde(rename = "radioURLField", deserialize_with = "deserialize_flag")]
    pub url_field_selected: bool,
    #[serde(rename = "URLDrop")]
    pub url_field: Option<String>,
    #[serde(rename = "URLText")]
    pub url_manual: Option<String>,

    #[serde(rename = "radioHeadersMan", deserialize_with = "deserialize_flag")]
    pub headers_manual_selected: bool,
    #[serde(rename = "radioHeadersField", deserialize_with = "deserialize_flag")]
    pub headers_field_selected: bool,
    #[serde(rename = "headerFieldsList")]
    pub headers_field: Option<String>,
    #[serde(rename = "headersText")]
    pub headers_manual: Option<String>,

    #[serde(rename = "radioPayloadMan", deserialize_with = "deserialize_flag")]
    pub payload_manual_selected: bool,
    #[serde(rename = "radioPayloadField", deserialize_with = "deserialize_flag")]
    pub payload_field_selected: bool,
    #[serde(rename = "payloadFieldDrop")]
    pub payload_field: Option<String>,
    #[serde(rename = "payloadText")]
    pub payload_manual: Option<String>,

    #[serde(rename = "radioCredentialsMan", deserialize_with = "deserialize_flag")]
    pub credentials_manual_selected: bool,
    #[serde(rename = "radioCredentialsField", deserialize_with = "deserialize_flag")]
    pub credentials_field_selected: bool,
    #[serde(rename = "radioCredentialsWinAuth", deserialize_with = "deserialize_flag")]
    pub credentials_integrated_selected: bool,
    #[serde(rename = "UserDrop")]
    pub username_field: Option<String>,
    #[serde(rename = "UserText")]
    pub username_manual: Option<String>,
    #[serde(rename = "PassDrop")]
    pub password_field: Option<String>,
    #[serde(rename = "PassText")]
    pub password_manual: Option<String>,

    #[serde(rename = "FieldSelect")]
    pub field_selection: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

/// Radio buttons are serialized as `"True"`/`"False"`; plain booleans are accepted too.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Text(s)) => s.trim().eq_ignore_ascii_case("true"),
        None => false,
    })
}

/// Structured tool configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolConfig {
    pub axes: AxisConfigSet,
    /// Field compared between adjacent records to detect duplicates.
    pub field_selection: Option<String>,
}

impl ToolConfig {
    pub fn parse(blob: &str) -> Result<Self, ConfigError> {
        let raw: RawToolConfig = serde_json::from_str(blob)?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawToolConfig> for ToolConfig {
    type Error = ConfigError;

    /// Selectors are not mutually validated: when several are set, the field source wins,
    /// then the manual value, then integrated auth, then nothing.
    fn try_from(raw: RawToolConfig) -> Result<Self, Self::Error> {
        let method = match raw.http_action.as_deref().map(str::trim) {
            None | Some("") => HttpMethod::default(),
            Some(action) => action.parse()?,
        };

        let url = select_axis(
            Axis::Url,
            raw.url_field_selected,
            raw.url_field,
            raw.url_manual_selected,
            raw.url_manual,
        );
        let headers = select_axis(
            Axis::Headers,
            raw.headers_field_selected,
            raw.headers_field,
            raw.headers_manual_selected,
            raw.headers_manual,
        );
        let payload = select_axis(
            Axis::Payload,
            raw.payload_field_selected,
            raw.payload_field,
            raw.payload_manual_selected,
            raw.payload_manual,
        );

        let selected = [
            raw.credentials_field_selected,
            raw.credentials_manual_selected,
            raw.credentials_integrated_selected,
        ];
        warn_on_overlap(Axis::Credentials, &selected);

        let credentials = if raw.credentials_field_selected {
            CredentialsConfig::FromField {
                username_field: raw.username_field.unwrap_or_default(),
                password_field: raw.password_field.unwrap_or_default(),
            }
        } else if raw.credentials_manual_selected {
            CredentialsConfig::Manual {
                username: raw.username_manual.unwrap_or_default(),
                password: raw.password_manual.unwrap_or_default(),
            }
        } else if raw.credentials_integrated_selected {
            CredentialsConfig::IntegratedAuth
        } else {
            CredentialsConfig::Disabled
        };

        Ok(ToolConfig {
            axes: AxisConfigSet {
                method,
                url,
                headers,
                payload,
                credentials,
            },
            field_selection: raw.field_selection.filter(|field| !field.is_empty()),
        })
    }
}

fn select_axis(
    axis: Axis,
    field_selected: bool,
    field: Option<String>,
    manual_selected: bool,
    manual: Option<String>,
) -> AxisConfig {
    warn_on_overlap(axis, &[field_selected, manual_selected]);

    if field_selected {
        AxisConfig::FromField(field.unwrap_or_default())
    } else if manual_selected {
        AxisConfig::Manual(manual.unwrap_or_default())
    } else {
        AxisConfig::Disabled
    }
}

fn warn_on_overlap(axis: Axis, selected: &[bool]) {
    let count = selected.iter().filter(|s| **s).count();
    if count > 1 {
        warn!(
            "{} sources are selected for the {} axis, using the first by precedence",
            count, axis
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manual_configuration() {
        let config = ToolConfig::parse(
            r#"{
                "HTTPAction": "POST",
                "radioURLMan": "True",
                "radioURLField": "False",
                "URLText": "https://x.test/upload",
                "radioHeadersNo": "True",
                "radioPayloadMan": "True",
                "payloadText": "{\"a\": 1}",
                "radioCredentialsWinAuth": "True"
            }"#,
        )
        .unwrap();

        assert_eq!(
            config,
            ToolConfig {
                axes: AxisConfigSet {
                    method: HttpMethod::POST,
                    url: AxisConfig::Manual("https://x.test/upload".to_owned()),
                    headers: AxisConfig::Disabled,
                    payload: AxisConfig::Manual("{\"a\": 1}".to_owned()),
                    credentials: CredentialsConfig::IntegratedAuth,
                },
                field_selection: None,
            }
        );
    }

    #[test]
    fn test_parse_field_configuration() {
        let config = ToolConfig::parse(
            r#"{
                "radioURLField": true,
                "URLDrop": "endpoint",
                "radioHeadersField": "true",
                "headerFieldsList": "hdrs",
                "radioCredentialsField": "True",
                "UserDrop": "user",
                "PassDrop": "pass",
                "FieldSelect": "endpoint"
            }"#,
        )
        .unwrap();

        assert_eq!(config.axes.method, HttpMethod::GET);
        assert_eq!(config.axes.url, AxisConfig::FromField("endpoint".to_owned()));
        assert_eq!(config.axes.headers, AxisConfig::FromField("hdrs".to_owned()));
        assert_eq!(config.axes.payload, AxisConfig::Disabled);
        assert_eq!(
            config.axes.credentials,
            CredentialsConfig::FromField {
                username_field: "user".to_owned(),
                password_field: "pass".to_owned(),
            }
        );
        assert_eq!(config.field_selection.as_deref(), Some("endpoint"));
    }

    #[test]
    fn test_field_source_takes_precedence() {
        let config = ToolConfig::parse(
            r#"{
                "radioURLMan": "True",
                "radioURLField": "True",
                "URLDrop": "endpoint",
                "URLText": "https://ignored.test",
                "radioCredentialsField": "True",
                "radioCredentialsMan": "True",
                "radioCredentialsWinAuth": "True",
                "UserDrop": "user",
                "PassDrop": "pass",
                "UserText": "admin",
                "PassText": "admin"
            }"#,
        )
        .unwrap();

        assert_eq!(config.axes.url, AxisConfig::FromField("endpoint".to_owned()));
        assert!(matches!(
            config.axes.credentials,
            CredentialsConfig::FromField { .. }
        ));
    }

    #[test]
    fn test_manual_credentials_beat_integrated_auth() {
        let config = ToolConfig::parse(
            r#"{"radioCredentialsMan": "True", "radioCredentialsWinAuth": "True", "UserText": "bob"}"#,
        )
        .unwrap();

        assert_eq!(
            config.axes.credentials,
            CredentialsConfig::Manual {
                username: "bob".to_owned(),
                password: String::new(),
            }
        );
    }

    #[test]
    fn test_unselected_axes_are_disabled() {
        let config = ToolConfig::parse(r#"{"URLText": "https://x.test", "FieldSelect": ""}"#).unwrap();

        assert_eq!(config.axes, AxisConfigSet::default());
        assert_eq!(config.field_selection, None);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            ToolConfig::parse("<Configuration/>"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            ToolConfig::parse(r#"{"HTTPAction": "TRACE"}"#),
            Err(ConfigError::HttpActionError(_))
        ));
    }
}
