use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Client, Url};

use crate::constants::{REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::error::TransportError;

/// Status and raw body of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// GET transport used by the fetcher.
pub trait Transport: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a Url,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + Send + 'a>>;
}

/// Production transport backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get<'a>(
        &'a self,
        url: &'a Url,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            // The query carries the API key, so errors report the path only.
            let shown = format!("{}{}", url.origin().ascii_serialization(), url.path());
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| TransportError::Request {
                    url: shown.clone(),
                    source: e.without_url(),
                })?;
            let status = response.status();
            // Error statuses are decided by their code alone, so a broken
            // body must not hide them.
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) if !status.is_success() => {
                    tracing::debug!("Discarding unreadable {} body from {}: {}", status, shown, e);
                    String::new()
                }
                Err(e) => {
                    return Err(TransportError::Body {
                        url: shown,
                        source: e.without_url(),
                    })
                }
            };
            Ok(HttpReply {
                status: status.as_u16(),
                body,
            })
        })
    }
}
