use std::time::Duration;

use reqwest::Method;
use snafu::ResultExt;
use switchboard_core::{
    BoxFuture, HttpClient, HttpRequest, HttpResponse, HttpVerb, TransportFailure,
    TransportResult,
};

use crate::error::{BuildClientSnafu, HttpResult};

/// [`HttpClient`] backed by a shared `reqwest` connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client whose requests give up after `timeout`. A timed out
    /// request is reported as unreachable.
    pub fn new(timeout: Duration) -> HttpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "build-reqwest-client",
            })?;

        Ok(Self { client })
    }

    async fn perform(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        let body = serde_json::to_vec(&request.body).map_err(|source| TransportFailure::Other {
            stage: "encode-request-body",
            address: request.address.clone(),
            details: source.to_string(),
        })?;

        let mut builder = self
            .client
            .request(to_method(request.verb), request.address.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|source| map_reqwest_error(&request.address, SEND_STAGE, source))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|source| map_reqwest_error(&request.address, "read-response-body", source))?;

        tracing::debug!(
            address = %request.address,
            status,
            body_len = body.len(),
            "received service response"
        );

        Ok(HttpResponse { status, body })
    }
}

impl HttpClient for ReqwestClient {
    fn send<'a>(&'a self, request: HttpRequest) -> BoxFuture<'a, TransportResult<HttpResponse>> {
        Box::pin(self.perform(request))
    }
}

fn to_method(verb: HttpVerb) -> Method {
    match verb {
        HttpVerb::Get => Method::GET,
        HttpVerb::Post => Method::POST,
        HttpVerb::Put => Method::PUT,
        HttpVerb::Patch => Method::PATCH,
        HttpVerb::Delete => Method::DELETE,
    }
}

const SEND_STAGE: &str = "send-request";

// A send that fails without a status never got a response: refused, reset,
// closed mid-exchange or timed out. Details are stripped of the URL.
fn map_reqwest_error(address: &str, stage: &'static str, error: reqwest::Error) -> TransportFailure {
    let unanswered = error.is_connect()
        || error.is_timeout()
        || (stage == SEND_STAGE && !error.is_builder() && error.status().is_none());
    let details = error.without_url().to_string();

    if unanswered {
        tracing::warn!(address = %address, stage, error = %details, "service unreachable");
        return TransportFailure::Unreachable {
            stage,
            address: address.to_string(),
            details,
        };
    }

    tracing::warn!(address = %address, stage, error = %details, "service request failed");
    TransportFailure::Other {
        stage,
        address: address.to_string(),
        details,
    }
}
