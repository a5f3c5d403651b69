use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::Snafu;

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const ACCEPT_HEADER: &str = "Accept";
pub const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub address: String,
    pub verb: HttpVerb,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl HttpRequest {
    /// Builds a request that sends and expects JSON.
    pub fn json(address: impl Into<String>, verb: HttpVerb, body: Value) -> Self {
        let headers = BTreeMap::from([
            (CONTENT_TYPE_HEADER.to_string(), JSON_MEDIA_TYPE.to_string()),
            (ACCEPT_HEADER.to_string(), JSON_MEDIA_TYPE.to_string()),
        ]);

        Self {
            address: address.into(),
            verb,
            headers,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub type TransportResult<T> = Result<T, TransportFailure>;

/// Raw failure signal produced at the HTTP boundary, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum TransportFailure {
    #[snafu(display("no response from {address} on `{stage}`: {details}"))]
    Unreachable {
        stage: &'static str,
        address: String,
        details: String,
    },
    #[snafu(display("{address} answered with HTTP status {status}"))]
    Status {
        stage: &'static str,
        address: String,
        status: u16,
        body: String,
    },
    #[snafu(display("response from {address} is not valid JSON: {details}"))]
    InvalidJson {
        stage: &'static str,
        address: String,
        details: String,
    },
    #[snafu(display("request to {address} failed on `{stage}`: {details}"))]
    Other {
        stage: &'static str,
        address: String,
        details: String,
    },
}

/// Performs one HTTP request. Implementations report only the status and raw
/// body; interpreting them is the adapter's job.
pub trait HttpClient: Send + Sync {
    fn send<'a>(&'a self, request: HttpRequest) -> BoxFuture<'a, TransportResult<HttpResponse>>;
}

/// JSON request/response boundary in front of an [`HttpClient`].
///
/// Every failure is surfaced once; there is no retry policy.
#[derive(Clone)]
pub struct TransportAdapter {
    client: Arc<dyn HttpClient>,
}

impl TransportAdapter {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    pub async fn execute(
        &self,
        address: &str,
        verb: HttpVerb,
        body: &Value,
    ) -> TransportResult<Value> {
        let request = HttpRequest::json(address, verb, body.clone());
        tracing::debug!(address = %address, verb = %verb, "dispatching service request");

        let response = self.client.send(request).await?;

        if !response.is_success() {
            tracing::warn!(
                address = %address,
                status = response.status,
                "service answered with a non-success status"
            );
            return StatusSnafu {
                stage: "check-response-status",
                address,
                status: response.status,
                body: response.body,
            }
            .fail();
        }

        serde_json::from_str(&response.body).map_err(|source| {
            tracing::warn!(
                address = %address,
                status = response.status,
                error = %source,
                "service response body is not valid JSON"
            );
            TransportFailure::InvalidJson {
                stage: "decode-response-body",
                address: address.to_string(),
                details: source.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    struct CannedClient {
        outcome: TransportResult<HttpResponse>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl CannedClient {
        fn new(outcome: TransportResult<HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpClient for CannedClient {
        fn send<'a>(
            &'a self,
            request: HttpRequest,
        ) -> BoxFuture<'a, TransportResult<HttpResponse>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(request);
                self.outcome.clone()
            })
        }
    }

    #[tokio::test]
    async fn sets_json_headers_and_parses_body() {
        let client = CannedClient::new(Ok(HttpResponse::new(200, r#"{"response":"ok"}"#)));
        let adapter = TransportAdapter::new(client.clone());

        let payload = adapter
            .execute("http://localhost:8000/chat", HttpVerb::Post, &json!({"a": 1}))
            .await
            .unwrap();

        assert_eq!(payload, json!({"response": "ok"}));
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].verb, HttpVerb::Post);
        assert_eq!(seen[0].body, json!({"a": 1}));
        assert_eq!(
            seen[0].headers.get(CONTENT_TYPE_HEADER).map(String::as_str),
            Some(JSON_MEDIA_TYPE)
        );
        assert_eq!(
            seen[0].headers.get(ACCEPT_HEADER).map(String::as_str),
            Some(JSON_MEDIA_TYPE)
        );
    }

    #[tokio::test]
    async fn non_success_status_becomes_status_failure() {
        let client = CannedClient::new(Ok(HttpResponse::new(405, "Method Not Allowed")));
        let adapter = TransportAdapter::new(client);

        let failure = adapter
            .execute("http://localhost:8000/chat", HttpVerb::Post, &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(failure, TransportFailure::Status { status: 405, .. }));
    }

    #[tokio::test]
    async fn success_with_html_body_is_invalid_json() {
        let client = CannedClient::new(Ok(HttpResponse::new(200, "<html>proxy page</html>")));
        let adapter = TransportAdapter::new(client);

        let failure = adapter
            .execute("http://localhost:8001/query", HttpVerb::Post, &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(failure, TransportFailure::InvalidJson { .. }));
    }

    #[tokio::test]
    async fn network_failure_passes_through_untouched() {
        let unreachable = TransportFailure::Unreachable {
            stage: "send",
            address: "http://localhost:8000/chat".to_string(),
            details: "connection refused".to_string(),
        };
        let client = CannedClient::new(Err(unreachable.clone()));
        let adapter = TransportAdapter::new(client);

        let failure = adapter
            .execute("http://localhost:8000/chat", HttpVerb::Post, &json!({}))
            .await
            .unwrap_err();

        assert_eq!(failure, unreachable);
    }
}
