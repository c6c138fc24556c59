use std::fmt;
use std::str::FromStr;

use serde::{de::Visitor, Deserialize, Serialize};

use crate::error::ParseHttpMethodError;

/// HTTP methods the download tool can issue.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum HttpMethod {
    DELETE,
    #[default]
    GET,
    HEAD,
    PATCH,
    POST,
    PUT,
}

/// Allow casting `HttpMethod` from strings.
impl FromStr for HttpMethod {
    type Err = ParseHttpMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_ref() {
            "DELETE" => Ok(HttpMethod::DELETE),
            "GET" => Ok(HttpMethod::GET),
            "HEAD" => Ok(HttpMethod::HEAD),
            "PATCH" => Ok(HttpMethod::PATCH),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            invalid => Err(ParseHttpMethodError(invalid.to_owned())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HttpMethod::DELETE => write!(f, "DELETE"),
            HttpMethod::GET => write!(f, "GET"),
            HttpMethod::HEAD => write!(f, "HEAD"),
            HttpMethod::PATCH => write!(f, "PATCH"),
            HttpMethod::POST => write!(f, "POST"),
            HttpMethod::PUT => write!(f, "PUT"),
        }
    }
}

struct HttpMethodVisitor;

impl Visitor<'_> for HttpMethodVisitor {
    type Value = HttpMethod;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "the string representation of HttpMethod")
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        match HttpMethod::from_str(s) {
            Ok(method) => Ok(method),
            Err(_) => Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(s),
                &self,
            )),
        }
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(HttpMethodVisitor)
    }
}

impl Serialize for HttpMethod {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(val: HttpMethod) -> Self {
        match val {
            HttpMethod::DELETE => http::Method::DELETE,
            HttpMethod::GET => http::Method::GET,
            HttpMethod::HEAD => http::Method::HEAD,
            HttpMethod::PATCH => http::Method::PATCH,
            HttpMethod::POST => http::Method::POST,
            HttpMethod::PUT => http::Method::PUT,
        }
    }
}

/// The request inputs that can be configured independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Url,
    Headers,
    Payload,
    Credentials,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Axis::Url => write!(f, "URL"),
            Axis::Headers => write!(f, "headers"),
            Axis::Payload => write!(f, "payload"),
            Axis::Credentials => write!(f, "credentials"),
        }
    }
}

/// Where the value of the URL, headers or payload comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AxisConfig {
    /// A literal configured value, used verbatim.
    Manual(String),
    /// The name of a field read from each incoming record.
    FromField(String),
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CredentialsConfig {
    FromField {
        username_field: String,
        password_field: String,
    },
    Manual {
        username: String,
        password: String,
    },
    /// Use the ambient session credentials.
    IntegratedAuth,
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisConfigSet {
    pub method: HttpMethod,
    pub url: AxisConfig,
    pub headers: AxisConfig,
    pub payload: AxisConfig,
    pub credentials: CredentialsConfig,
}

impl AxisConfigSet {
    /// Every record field name the configuration reads, with the axis that reads it.
    pub fn field_references(&self) -> Vec<(Axis, &str)> {
        let mut references = Vec::new();

        for (axis, config) in [
            (Axis::Url, &self.url),
            (Axis::Headers, &self.headers),
            (Axis::Payload, &self.payload),
        ] {
            if let AxisConfig::FromField(field) = config {
                references.push((axis, field.as_str()));
            }
        }

        if let CredentialsConfig::FromField {
            username_field,
            password_field,
        } = &self.credentials
        {
            references.push((Axis::Credentials, username_field.as_str()));
            references.push((Axis::Credentials, password_field.as_str()));
        }

        references
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Integrated,
    None,
}

/// Keep passwords out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Integrated => write!(f, "Integrated"),
            Credentials::None => write!(f, "None"),
        }
    }
}

/// A fully resolved request, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Option<String>,
    pub payload: Option<String>,
    pub credentials: Credentials,
}

/// Serializable summary of a `RequestDescriptor`, written to the Request output.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestDescription {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Option<String>,
    pub payload: Option<String>,
    pub auth: String,
}

impl From<&RequestDescriptor> for RequestDescription {
    fn from(request: &RequestDescriptor) -> Self {
        let auth = match &request.credentials {
            Credentials::Basic { username, .. } => format!("basic {username}"),
            Credentials::Integrated => "integrated".to_owned(),
            Credentials::None => "none".to_owned(),
        };

        Self {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            payload: request.payload.clone(),
            auth,
        }
    }
}

impl RequestDescriptor {
    /// JSON description of the request with any password left out.
    pub fn describe(&self) -> String {
        serde_json::to_string(&RequestDescription::from(self))
            .unwrap_or_else(|_| format!("{} {}", self.method, self.url))
    }
}
