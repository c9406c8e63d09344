use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use funclogs_core::backend::{BackendError, LogBackend};
use funclogs_core::config::Config;
use funclogs_core::error::{FunclogsError, Result};
use funclogs_core::model::log::RawRecord;
use reqwest::Client;

use crate::auth::{ServiceAccountAuth, ServiceAccountKey, TokenSource};
use crate::decode::{ListEntriesRequest, decode_entry, decode_page, error_from_response};

const ORDER_BY: &str = "timestamp asc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudLoggingConfig {
    pub endpoint: String,
    pub project_id: String,
    pub page_size: u32,
    pub timeout: Duration,
}

/// Cloud Logging `entries.list` client.
#[derive(Clone)]
pub struct CloudLoggingClient {
    http: Client,
    cfg: CloudLoggingConfig,
    tokens: Arc<TokenSource>,
}

impl CloudLoggingClient {
    pub fn new(cfg: CloudLoggingConfig, tokens: TokenSource) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| FunclogsError::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            cfg: CloudLoggingConfig {
                endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
                ..cfg
            },
            tokens: Arc::new(tokens),
        })
    }

    /// Resolves credentials and project from application config. A static
    /// access token wins over a service-account key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let key = match &config.credentials_path {
            Some(path) => Some(ServiceAccountKey::from_file(path)?),
            None => None,
        };

        let project_id = config
            .project_id
            .clone()
            .or_else(|| key.as_ref().and_then(|k| k.project_id.clone()))
            .ok_or_else(|| {
                FunclogsError::Config(
                    "no project id: set project_id or use a service account key that carries one"
                        .to_string(),
                )
            })?;

        let tokens = match (&config.access_token, &key) {
            (Some(token), _) => TokenSource::Static(token.clone()),
            (None, Some(key)) => {
                TokenSource::ServiceAccount(ServiceAccountAuth::new(key, config.token_uri.as_deref())?)
            }
            (None, None) => {
                return Err(FunclogsError::Config(format!(
                    "no credentials: set FUNCLOGS_ACCESS_TOKEN or {}",
                    funclogs_core::config::CREDENTIALS_ENV_VAR
                )));
            }
        };
        tracing::info!(project = %project_id, credentials = ?tokens, "cloud logging backend configured");

        Self::new(
            CloudLoggingConfig {
                endpoint: config.logging_endpoint.clone(),
                project_id,
                page_size: config.page_size,
                timeout: config.backend_timeout,
            },
            tokens,
        )
    }

    pub fn config(&self) -> &CloudLoggingConfig {
        &self.cfg
    }

    async fn fetch_page(
        &self,
        url: &str,
        request: &ListEntriesRequest,
    ) -> std::result::Result<crate::decode::ListEntriesResponse, BackendError> {
        let token = self.tokens.access_token(&self.http).await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(format!("reading response body: {e}")))?;
        if !status.is_success() {
            let err = error_from_response(status.as_u16(), &String::from_utf8_lossy(&body));
            tracing::warn!(status = status.as_u16(), error = %err, "entries.list failed");
            return Err(err);
        }
        decode_page(&body)
    }
}

#[async_trait]
impl LogBackend for CloudLoggingClient {
    async fn list(&self, filter: &str) -> std::result::Result<Vec<RawRecord>, BackendError> {
        let url = format!("{}/v2/entries:list", self.cfg.endpoint);
        let mut request = ListEntriesRequest {
            resource_names: vec![format!("projects/{}", self.cfg.project_id)],
            filter: filter.to_string(),
            order_by: ORDER_BY.to_string(),
            page_size: self.cfg.page_size,
            page_token: None,
        };

        let mut records = Vec::new();
        let mut pages = 0usize;
        loop {
            let page = self.fetch_page(&url, &request).await?;
            pages += 1;
            for entry in page.entries {
                records.push(decode_entry(entry)?);
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => request.page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(pages, entries = records.len(), "entries.list complete");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use funclogs_core::model::log::Payload;
    use serde_json::{Value, json};

    use super::*;

    #[derive(Clone, Default)]
    struct Seen {
        bodies: Arc<Mutex<Vec<Value>>>,
        auth: Arc<Mutex<Vec<String>>>,
    }

    async fn entries_list(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> axum::response::Response {
        seen.bodies.lock().unwrap().push(body.clone());
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            seen.auth.lock().unwrap().push(auth.to_string());
        }

        let filter = body["filter"].as_str().unwrap_or_default();
        if filter.contains("broken(") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": 400, "message": "Unparseable filter", "status": "INVALID_ARGUMENT"}})),
            )
                .into_response();
        }
        if filter.contains("explode") {
            return (StatusCode::INTERNAL_SERVER_ERROR, "backend exploded").into_response();
        }

        match body.get("pageToken").and_then(Value::as_str) {
            None => Json(json!({
                "entries": [
                    {"timestamp": "2023-12-15T12:00:00Z", "severity": "INFO", "textPayload": "first",
                     "resource": {"type": "cloud_function", "labels": {"function_name": "sample-func"}}},
                    {"timestamp": "2023-12-15T12:00:01Z", "severity": "ERROR", "jsonPayload": {"message": "second"},
                     "resource": {"type": "cloud_function", "labels": {"function_name": "sample-func"}}}
                ],
                "nextPageToken": "page-2"
            }))
            .into_response(),
            Some("page-2") => Json(json!({
                "entries": [
                    {"timestamp": "2023-12-15T12:00:02Z", "textPayload": "third",
                     "resource": {"type": "cloud_function", "labels": {"function_name": "sample-func"}}}
                ],
                "nextPageToken": ""
            }))
            .into_response(),
            Some(_) => StatusCode::GONE.into_response(),
        }
    }

    async fn spawn_fake() -> (String, Seen) {
        let seen = Seen::default();
        let app = Router::new()
            .route("/v2/entries:list", post(entries_list))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/"), seen)
    }

    fn client(endpoint: String) -> CloudLoggingClient {
        CloudLoggingClient::new(
            CloudLoggingConfig {
                endpoint,
                project_id: "demo-project".to_string(),
                page_size: 2,
                timeout: Duration::from_secs(5),
            },
            TokenSource::Static("test-token".to_string()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn follows_page_tokens_in_order() {
        let (endpoint, seen) = spawn_fake().await;
        let records = client(endpoint).list("severity >= DEFAULT").await.unwrap();

        let texts: Vec<Option<String>> = records.iter().map(|r| r.payload.text()).collect();
        assert_eq!(
            texts,
            vec![
                Some("first".to_string()),
                Some("second".to_string()),
                Some("third".to_string())
            ]
        );
        assert!(matches!(records[1].payload, Payload::Structured(_)));

        let bodies = seen.bodies.lock().unwrap().clone();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["resourceNames"], json!(["projects/demo-project"]));
        assert_eq!(bodies[0]["filter"], "severity >= DEFAULT");
        assert_eq!(bodies[0]["pageSize"], 2);
        assert!(bodies[0].get("pageToken").is_none());
        assert_eq!(bodies[1]["pageToken"], "page-2");

        let auth = seen.auth.lock().unwrap().clone();
        assert!(auth.iter().all(|h| h == "Bearer test-token"));
    }

    #[tokio::test]
    async fn bad_filter_is_rejected() {
        let (endpoint, _) = spawn_fake().await;
        let err = client(endpoint).list("broken(").await.unwrap_err();
        assert!(err.is_filter_rejection());
        assert!(err.to_string().contains("Unparseable filter"));
    }

    #[tokio::test]
    async fn server_failure_is_a_status_error() {
        let (endpoint, _) = spawn_fake().await;
        let err = client(endpoint).list("explode").await.unwrap_err();
        assert_eq!(
            err,
            BackendError::Status {
                status: 500,
                message: "backend exploded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{addr}")).list("x").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[test]
    fn from_config_requires_credentials_and_project() {
        let mut config = Config::default();
        assert!(matches!(
            CloudLoggingClient::from_config(&config),
            Err(FunclogsError::Config(_))
        ));

        config.project_id = Some("demo-project".to_string());
        let err = CloudLoggingClient::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("no credentials"));

        config.access_token = Some("t".to_string());
        config.logging_endpoint = "http://127.0.0.1:1/".to_string();
        let client = CloudLoggingClient::from_config(&config).unwrap();
        assert_eq!(client.config().endpoint, "http://127.0.0.1:1");
        assert_eq!(client.config().project_id, "demo-project");
    }
}
