use std::collections::HashMap;
use std::io::Read;
use std::time;

use download_common::request::{Credentials, RequestDescriptor};
use http::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::error::TransportError;

/// What came back from issuing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TransportResponse {
    /// Response headers as `Name: value` lines.
    pub fn headers_text(&self) -> String {
        self.headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Issues resolved requests.
pub trait Transport {
    fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError> {
        (**self).send(request)
    }
}

pub fn build_http_client(
    request_timeout: time::Duration,
    user_agent: &str,
) -> reqwest::Result<Client> {
    reqwest::blocking::Client::builder()
        .user_agent(user_agent.to_owned())
        .timeout(request_timeout)
        .build()
}

/// Sends requests over HTTP with a blocking client.
pub struct HttpTransport {
    client: Client,
    /// Response bodies are cut at this many bytes.
    max_response_body: usize,
}

impl HttpTransport {
    pub fn new(client: Client, max_response_body: usize) -> Self {
        Self {
            client,
            max_response_body,
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError> {
        let method: http::Method = request.method.into();
        let url: reqwest::Url = request.url.parse()?;
        let headers = match &request.headers {
            Some(text) => parse_headers(text)?,
            None => HeaderMap::new(),
        };

        let mut builder = self.client.request(method, url).headers(headers);

        if let Some(payload) = &request.payload {
            builder = builder.body(payload.to_owned());
        }

        match &request.credentials {
            Credentials::Basic { username, password } => {
                builder = builder.basic_auth(username, Some(password));
            }
            Credentials::Integrated => {
                // The blocking client has no negotiate support, the session's ambient
                // credentials (proxies, cookies) are all that is sent.
                debug!("sending request without explicit credentials for integrated auth");
            }
            Credentials::None => {}
        }

        let response = builder.send()?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let mut body = Vec::new();
        response
            .take(self.max_response_body as u64)
            .read_to_end(&mut body)?;

        Ok(TransportResponse {
            status,
            headers,
            body: bytes_to_text(body),
        })
    }
}

/// Resolves requests without sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunTransport;

impl Transport for DryRunTransport {
    fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError> {
        debug!(url = %request.url, "dry run, request not sent");

        Ok(TransportResponse {
            status: StatusCode::NO_CONTENT,
            headers: Vec::new(),
            body: String::new(),
        })
    }
}

/// Parse request headers given either as a JSON object or as `Name: value` lines.
pub fn parse_headers(text: &str) -> Result<HeaderMap, TransportError> {
    let text = text.trim();

    if text.starts_with('{') {
        let map: HashMap<String, String> = serde_json::from_str(text)
            .map_err(|e| TransportError::ParseHeadersError(e.to_string()))?;
        return (&map)
            .try_into()
            .map_err(|e: http::Error| TransportError::ParseHeadersError(e.to_string()));
    }

    let mut headers = HeaderMap::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            TransportError::ParseHeadersError(format!("expected \"Name: value\", got \"{line}\""))
        })?;

        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| TransportError::ParseHeadersError(e.to_string()))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| TransportError::ParseHeadersError(e.to_string()))?;

        headers.append(name, value);
    }

    Ok(headers)
}

/// Decode a possibly truncated body, dropping a multi-byte character cut at the end.
fn bytes_to_text(mut body: Vec<u8>) -> String {
    if let Err(e) = std::str::from_utf8(&body) {
        if e.error_len().is_none() {
            body.truncate(e.valid_up_to());
        }
    }

    match String::from_utf8(body) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use download_common::request::HttpMethod;
    use httpmock::{Method::GET, Method::POST, MockServer};

    fn request(method: HttpMethod, url: String) -> RequestDescriptor {
        RequestDescriptor {
            method,
            url,
            headers: None,
            payload: None,
            credentials: Credentials::None,
        }
    }

    fn transport(max_response_body: usize) -> HttpTransport {
        let client = build_http_client(time::Duration::from_secs(5), "Download Tool Tests")
            .expect("failed to build client");
        HttpTransport::new(client, max_response_body)
    }

    #[test]
    fn test_send_get() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/data");
            then.status(200)
                .header("x-request-id", "abc")
                .body("hello, world");
        });

        let response = transport(1024)
            .send(&request(HttpMethod::GET, server.url("/data")))
            .expect("request failed");

        mock.assert();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "hello, world");
        assert!(response.headers_text().contains("x-request-id: abc"));
    }

    #[test]
    fn test_send_post_with_headers_payload_and_basic_auth() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/upload")
                .header("x-api-key", "k1")
                .header("authorization", "Basic YWxpY2U6czNjcmV0")
                .body("{\"a\":1}");
            then.status(201).body("created");
        });

        let mut descriptor = request(HttpMethod::POST, server.url("/upload"));
        descriptor.headers = Some("X-Api-Key: k1".to_owned());
        descriptor.payload = Some("{\"a\":1}".to_owned());
        descriptor.credentials = Credentials::Basic {
            username: "alice".to_owned(),
            password: "s3cret".to_owned(),
        };

        let response = transport(1024).send(&descriptor).expect("request failed");

        mock.assert();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.body, "created");
    }

    #[test]
    fn test_error_statuses_are_returned_not_raised() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("not here");
        });

        let response = transport(1024)
            .send(&request(HttpMethod::GET, server.url("/missing")))
            .expect("request failed");

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, "not here");
    }

    #[test]
    fn test_response_body_is_truncated() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/big");
            then.status(200).body("0123456789");
        });

        let response = transport(4)
            .send(&request(HttpMethod::GET, server.url("/big")))
            .expect("request failed");

        assert_eq!(response.body, "0123");
    }

    #[test]
    fn test_invalid_url() {
        let result = transport(1024).send(&request(HttpMethod::GET, "not a url".to_owned()));

        assert!(matches!(result, Err(TransportError::ParseUrlError(_))));
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers("Accept: text/plain\n\nX-Trace: 1\r\nX-Trace: 2").unwrap();
        assert_eq!(headers.get("accept").unwrap(), "text/plain");
        assert_eq!(headers.get_all("x-trace").iter().count(), 2);

        let headers = parse_headers(r#"{"Content-Type": "application/json"}"#).unwrap();
        assert_eq!(headers.get("content-type").unwrap(), "application/json");

        assert!(parse_headers("no separator").is_err());
        assert!(parse_headers("Bad Name: x").is_err());
        assert!(parse_headers("").unwrap().is_empty());
    }

    #[test]
    fn test_bytes_to_text_drops_cut_character() {
        let mut bytes = "caf\u{e9}".as_bytes().to_vec();
        bytes.pop();
        assert_eq!(bytes_to_text(bytes), "caf");
        assert_eq!(bytes_to_text(vec![0xff, b'a']), "\u{fffd}a");
    }

    #[test]
    fn test_dry_run() {
        let response = DryRunTransport
            .send(&request(HttpMethod::DELETE, "https://x.test".to_owned()))
            .unwrap();

        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(response.body.is_empty());
    }
}
