//! HTTP delivery client for a transactional mail API.
//!
//! Sends `POST <api_url>` with a bearer key and a JSON body of
//! `{from, to, subject, html}`. Any non-2xx answer is a rejection.

use async_trait::async_trait;
use intake_core::domain::{DeliveryError, Secret};
use intake_core::ports::DeliveryClient;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct OutboundEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Mail provider client over `reqwest`.
pub struct HttpDeliveryClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Secret,
    from: String,
    timeout: Duration,
}

impl HttpDeliveryClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: Secret,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            from: from.into(),
            timeout,
        })
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send(&self, to: &str, subject: &str, content: &str) -> Result<(), DeliveryError> {
        let payload = OutboundEmail {
            from: &self.from,
            to: [to],
            subject,
            html: content,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = to, status = status.as_u16(), "Mail provider accepted message");
        Ok(())
    }
}
