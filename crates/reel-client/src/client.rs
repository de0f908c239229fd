//! Raw JSON transport against the pipeline backend.

use std::fmt;
use std::time::Duration;

use reel_core::config::ApiConfig;
use reel_core::error::RequestError;
use serde_json::Value;
use tracing::debug;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Path below the API prefix, kept as raw segments so identifiers are
/// encoded exactly once when the URL is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    segments: Vec<String>,
}

impl ApiPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

pub trait RemoteClient: Send + Sync {
    fn request(
        &self,
        method: Method,
        path: &ApiPath,
        body: Option<&Value>,
    ) -> Result<Value, RequestError>;
}

#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    agent: ureq::Agent,
    base: Url,
    prefix: Vec<String>,
}

impl HttpRemoteClient {
    pub fn new(config: &ApiConfig) -> Result<Self, RequestError> {
        let base = Url::parse(&config.base_url).map_err(|err| {
            RequestError::transport(format!("invalid base url {}: {err}", config.base_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(RequestError::transport(format!(
                "base url {} cannot carry a path",
                config.base_url
            )));
        }
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        let prefix = config
            .api_prefix
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            agent,
            base,
            prefix,
        })
    }

    pub fn url_for(&self, path: &ApiPath) -> Result<Url, RequestError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| RequestError::transport("base url cannot carry a path"))?;
            segments.pop_if_empty();
            segments.extend(self.prefix.iter());
            segments.extend(path.segments());
        }
        Ok(url)
    }
}

impl RemoteClient for HttpRemoteClient {
    fn request(
        &self,
        method: Method,
        path: &ApiPath,
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        let url = self.url_for(path)?;
        debug!(event = "http_request", method = method.as_str(), url = %url);

        let request = match method {
            Method::Get => self.agent.get(url.as_str()),
            Method::Post => self.agent.post(url.as_str()),
        }
        .set("Accept", "application/json");

        let result = match (method, body) {
            (_, Some(body)) => request.send_json(body),
            (Method::Post, None) => request.send_json(Value::Object(Default::default())),
            (Method::Get, None) => request.call(),
        };

        match result {
            Ok(response) => response
                .into_json::<Value>()
                .map_err(|err| RequestError::transport(format!("invalid response body: {err}"))),
            Err(ureq::Error::Status(code, response)) => Err(status_error(code, response)),
            Err(ureq::Error::Transport(transport)) => {
                Err(RequestError::transport(transport.to_string()))
            }
        }
    }
}

fn status_error(code: u16, response: ureq::Response) -> RequestError {
    let status_text = response.status_text().to_string();
    let body = response.into_string().unwrap_or_default();
    RequestError::http(code, error_detail(&body).unwrap_or(status_text))
}

/// Extracts the backend's `detail` field from an error body.
pub fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
