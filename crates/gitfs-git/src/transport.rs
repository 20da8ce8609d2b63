//! HTTP transport seam.
//!
//! The client speaks to the remote only through [`Transport`], so tests can
//! serve canned responses and callers can swap the HTTP stack.

use crate::config::ClientConfig;
use crate::Result;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::io::{self, Read};

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name and value pairs, in order.
    pub headers: Vec<(String, String)>,
    /// Request body; empty for GET.
    pub body: Vec<u8>,
}

impl Request {
    /// Returns the first header named `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response whose body is streamed.
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// The Content-Type header, or empty when absent.
    pub content_type: String,
    /// The unread response body.
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Sends HTTP requests on behalf of a client.
pub trait Transport {
    /// Performs one request, returning the response with its body unread.
    fn send(&self, request: Request) -> io::Result<Response>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: Request) -> io::Result<Response> {
        (**self).send(request)
    }
}

/// A blocking HTTP(S) transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Builds a transport from a validated configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(io::Error::other)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> io::Result<Response> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url).body(request.body),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().map_err(io::Error::other)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        tracing::debug!(url = %request.url, status, %content_type, "http response");

        Ok(Response {
            status,
            content_type,
            body: Box::new(response),
        })
    }
}
