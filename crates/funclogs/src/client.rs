use anyhow::Context;
use funclogs_core::model::log::LogEntry;
use funclogs_core::query::{StatusResponse, StoredLog};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::protocol::{ErrorBody, LogsQueryParams};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// HTTP client for a running `funclogs serve`.
pub struct GatewayClient {
    http: Client,
    base: Url,
}

impl GatewayClient {
    pub fn connect(addr: Option<String>) -> anyhow::Result<Self> {
        let addr = addr
            .or_else(|| std::env::var("FUNCLOGS_ADDR").ok())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let base = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr
        } else {
            format!("http://{addr}")
        };
        let base = Url::parse(&base).with_context(|| format!("invalid gateway address {base}"))?;
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    fn url(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("gateway address cannot carry a path: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn logs(
        &self,
        cloud_function_name: &str,
        params: &LogsQueryParams,
    ) -> anyhow::Result<Vec<LogEntry>> {
        let url = self.url(&["logs", cloud_function_name])?;
        let resp = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .context("request logs from gateway")?;
        read_json(resp).await
    }

    pub async fn entry(&self, key: &str) -> anyhow::Result<StoredLog> {
        let url = self.url(&["entries", key])?;
        let resp = self.http.get(url).send().await.context("request stored entry")?;
        read_json(resp).await
    }

    pub async fn status(&self) -> anyhow::Result<StatusResponse> {
        let url = self.url(&["status"])?;
        let resp = self.http.get(url).send().await.context("request gateway status")?;
        read_json(resp).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return resp.json().await.context("decode gateway response");
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);
    anyhow::bail!("gateway returned {}: {}", status.as_u16(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_addresses_get_http_scheme() {
        let client = GatewayClient::connect(Some("127.0.0.1:9000".to_string())).unwrap();
        let url = client.url(&["logs", "sample func"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/logs/sample%20func");
    }

    #[test]
    fn base_path_is_kept() {
        let client = GatewayClient::connect(Some("https://gw.example.com/api/".to_string())).unwrap();
        let url = client.url(&["status"]).unwrap();
        assert_eq!(url.as_str(), "https://gw.example.com/api/status");
    }
}
