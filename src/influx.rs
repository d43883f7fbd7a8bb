use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};

use crate::config::InfluxConfig;
use crate::constants::{REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::error::SinkError;
use crate::formatters::format_line_protocol;
use crate::models::Record;

/// Destination for each cycle's batch of records.
///
/// An empty batch must succeed without side effects.
pub trait RecordSink: Send + Sync {
    fn write<'a>(
        &'a self,
        records: &'a [Record],
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;
}

/// Writes records through the InfluxDB v2 HTTP write API
pub struct InfluxSink {
    client: Client,
    write_url: Url,
    token: String,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let write_url = write_url(config)?;
        tracing::debug!("Influx url: {}", config.url);

        Ok(Self {
            client,
            write_url,
            token: config.token.clone(),
        })
    }
}

fn write_url(config: &InfluxConfig) -> Result<Url> {
    let base = format!("{}/api/v2/write", config.url.trim_end_matches('/'));
    let mut url = Url::parse(&base).with_context(|| format!("invalid InfluxDB url '{}'", config.url))?;
    url.query_pairs_mut()
        .append_pair("org", &config.org)
        .append_pair("bucket", &config.bucket)
        .append_pair("precision", "s");
    Ok(url)
}

impl RecordSink for InfluxSink {
    fn write<'a>(
        &'a self,
        records: &'a [Record],
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            let body = format_line_protocol(records);
            if body.is_empty() {
                return Ok(());
            }

            tracing::info!("Importing {} record(s) to influx", records.len());
            let response = self
                .client
                .post(self.write_url.clone())
                .header(AUTHORIZATION, format!("Token {}", self.token))
                .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SinkError::Status { status, body });
            }
            Ok(())
        })
    }
}
