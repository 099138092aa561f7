//! Blocking HTTP client for the beads API.
//!
//! Server errors arrive as `{"error": {"code", "kind", "message", ...}}` and
//! are surfaced as [`ClientError::Api`] with the body intact, so callers can
//! show hints and ambiguous-id candidates.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const DEFAULT_URL: &str = "http://127.0.0.1:8420";

/// Error body returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub candidates: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{}", body.message)]
    Api { status: u16, body: ApiErrorBody },
    #[error("cannot reach beads server at {url}: {message}")]
    Transport { url: String, message: String },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ClientError {
    /// Machine code for error output: the server's `E####` code when known.
    pub fn error_code(&self) -> String {
        match self {
            Self::Api { body, .. } => body.code.clone().unwrap_or_else(|| body.kind.clone()),
            Self::Transport { .. } => "unreachable".to_string(),
            Self::Decode { .. } => "bad_response".to_string(),
        }
    }

    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Api { body, .. } if !body.candidates.is_empty() => Some(format!(
                "matching ids: {}",
                body.candidates.join(", ")
            )),
            Self::Api { body, .. } => body.hint.clone(),
            Self::Transport { .. } => {
                Some("Start a server with `bd serve` or point --url / BEADS_URL at one.".into())
            }
            Self::Decode { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let request = self.agent.request(method, &self.url(path));
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let request = query
            .iter()
            .fold(self.request("GET", path), |req, (key, value)| {
                req.query(key, value)
            });
        tracing::debug!(path, "GET");
        self.finish(path, request.call())
    }

    pub fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: &Value,
    ) -> Result<T, ClientError> {
        tracing::debug!(method, path, "send");
        self.finish(path, self.request(method, path).send_json(body))
    }

    pub fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        tracing::debug!(path, "DELETE");
        self.finish(path, self.request("DELETE", path).call())
    }

    fn finish<T: DeserializeOwned>(
        &self,
        path: &str,
        result: Result<ureq::Response, ureq::Error>,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        match result {
            Ok(response) => response.into_json().map_err(|err| ClientError::Decode {
                url,
                message: err.to_string(),
            }),
            Err(ureq::Error::Status(status, response)) => {
                let text = response.into_string().unwrap_or_default();
                let body = serde_json::from_str::<ErrorEnvelope>(&text).map_or_else(
                    |_| ApiErrorBody {
                        kind: "http".into(),
                        message: format!("HTTP {status}: {}", text.trim()),
                        ..ApiErrorBody::default()
                    },
                    |envelope| envelope.error,
                );
                Err(ClientError::Api { status, body })
            }
            Err(ureq::Error::Transport(transport)) => Err(ClientError::Transport {
                url,
                message: transport.to_string(),
            }),
        }
    }
}
