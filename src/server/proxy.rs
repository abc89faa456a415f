//! Upstream proxy
//!
//! The application behind the gate: authorized requests are replayed
//! against the configured upstream and its answer is relayed back.

use crate::config::UpstreamConfig;
use crate::metrics;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{self, HeaderMap, HeaderName};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

/// Proxy errors
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Failed to build upstream client: {0}")]
    ClientError(String),

    #[error("Failed to read request body: {0}")]
    BodyError(String),

    #[error("Request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("Upstream error: {0}")]
    UpstreamError(String),
}

/// Forwards requests to a single upstream base URL
#[derive(Clone)]
pub struct UpstreamProxy {
    base_url: String,
    max_body_bytes: usize,
    client: reqwest::Client,
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

impl UpstreamProxy {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProxyError::ClientError(e.to_string()))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            max_body_bytes: config.max_body_bytes,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replay `req` against the upstream
    ///
    /// The body is buffered up to `max_body_bytes`; larger bodies fail with
    /// [`ProxyError::BodyTooLarge`] before anything is sent.
    pub async fn forward<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, ProxyError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let body = Limited::new(body, self.max_body_bytes)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    ProxyError::BodyTooLarge(self.max_body_bytes)
                } else {
                    ProxyError::BodyError(e.to_string())
                }
            })?
            .to_bytes();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        debug!(method = %parts.method, url = %url, "Forwarding to upstream");

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamError(e.to_string()))?;

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| ProxyError::UpstreamError(e.to_string()))?;

        let mut response = Response::new(Full::new(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

impl<B> Service<Request<B>> for UpstreamProxy
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let proxy = self.clone();
        Box::pin(async move {
            match proxy.forward(req).await {
                Ok(response) => Ok(response),
                Err(ProxyError::BodyTooLarge(limit)) => {
                    warn!(limit, "Request body too large");
                    Ok(text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"))
                }
                Err(e) => {
                    error!("Upstream request failed: {}", e);
                    metrics::record_upstream_error();
                    Ok(text_response(StatusCode::BAD_GATEWAY, "Bad Gateway"))
                }
            }
        })
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
