//! Remote headless browser over HTTP
//!
//! Talks to a browserless-style service: `POST /content` returns the
//! rendered DOM, `POST /screenshot` returns PNG bytes.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{RenderJob, RenderTarget, RenderedPage, WebRenderer};
use crate::config::BrowserConfig;
use crate::error::{Error, Result};

/// Added to the navigation timeout for the HTTP round trip
const TRANSPORT_SLACK: Duration = Duration::from_secs(5);

/// Renderer backed by a remote headless browser service
pub struct BrowserlessRenderer {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl BrowserlessRenderer {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let client = Client::builder().build()?;

        Ok(BrowserlessRenderer {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn post(&self, endpoint: &str, job: &RenderJob) -> RequestBuilder {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .timeout(job.timeout + TRANSPORT_SLACK);
        if let Some(ref token) = self.token {
            request = request.query(&[("token", token.expose_secret())]);
        }
        request
    }

    fn body(job: &RenderJob, extra: Option<Value>) -> Value {
        let mut body = json!({
            "viewport": { "width": job.viewport.width, "height": job.viewport.height },
            "gotoOptions": {
                "waitUntil": "networkidle0",
                "timeout": job.timeout.as_millis() as u64,
            },
        });
        match job.target {
            RenderTarget::Html(ref html) => body["html"] = json!(html),
            RenderTarget::Url(ref url) => body["url"] = json!(url),
        }
        if let Some(extra) = extra {
            body["options"] = extra;
        }
        body
    }

    async fn content(&self, job: &RenderJob) -> Result<String> {
        let response = self
            .post("content", job)
            .json(&Self::body(job, None))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "Browser content request failed ({}): {}",
                status, text
            )));
        }
        Ok(response.text().await?)
    }

    async fn screenshot(&self, job: &RenderJob) -> Result<Vec<u8>> {
        let options = json!({ "type": "png", "fullPage": true });
        let response = self
            .post("screenshot", job)
            .json(&Self::body(job, Some(options)))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "Browser screenshot request failed ({}): {}",
                status, text
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl WebRenderer for BrowserlessRenderer {
    async fn render(&self, job: &RenderJob) -> Result<RenderedPage> {
        let (html, screenshot_png) = tokio::try_join!(self.content(job), self.screenshot(job))?;
        debug!(
            html_len = html.len(),
            screenshot_len = screenshot_png.len(),
            "Browser render finished"
        );

        Ok(RenderedPage {
            screenshot_png,
            html,
            url: match job.target {
                RenderTarget::Url(ref url) => Some(url.clone()),
                RenderTarget::Html(_) => None,
            },
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let mut request = self.client.get(format!("{}/json/version", self.base_url));
        if let Some(ref token) = self.token {
            request = request.query(&[("token", token.expose_secret())]);
        }
        Ok(request.send().await?.status().is_success())
    }
}
