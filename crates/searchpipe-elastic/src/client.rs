use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use searchpipe_core::config::BackendSettings;
use searchpipe_core::traits::SearchBackend;
use searchpipe_core::types::BackendResponse;

use crate::response::parse_search_response;

#[derive(Debug, Error)]
pub enum ElasticError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Elasticsearch returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// HTTP handle to an Elasticsearch-compatible cluster.
///
/// Cloning is cheap and clones share the connection pool, so one handle can
/// serve any number of concurrent queries.
#[derive(Debug, Clone)]
pub struct ElasticBackend {
    http: Client,
    hosts: Vec<String>,
    auth: Option<(String, Option<String>)>,
}

impl ElasticBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, ElasticError> {
        if settings.hosts.is_empty() {
            return Err(ElasticError::Config("at least one host is required".into()));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|e| ElasticError::Config(e.to_string()))?;
        let hosts = settings.hosts.iter().map(|h| h.trim_end_matches('/').to_string()).collect();
        let auth = settings.username.clone().map(|user| (user, settings.password.clone()));
        Ok(Self { http, hosts, auth })
    }

    /// Unauthenticated client with default timeouts.
    pub fn from_hosts<I, S>(hosts: I) -> Result<Self, ElasticError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let settings = BackendSettings { hosts: hosts.into_iter().map(Into::into).collect(), ..BackendSettings::default() };
        Self::new(&settings)
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// True when the cluster reports `green` or `yellow`.
    pub async fn health(&self) -> Result<bool, ElasticError> {
        let response = self.send("_cluster/health", |http, url| http.get(url)).await?;
        let body: Value = response.json().await?;
        let status = body.get("status").and_then(Value::as_str).unwrap_or("unknown");
        debug!(status, "cluster health");
        Ok(matches!(status, "green" | "yellow"))
    }

    /// POST a `_search` body against `collection`.
    #[instrument(skip(self, body))]
    pub async fn search(&self, collection: &str, body: &Value) -> Result<BackendResponse, ElasticError> {
        let path = format!("{collection}/_search");
        let response = self.send(&path, |http, url| http.post(url).json(body)).await?;
        let body: Value = response.json().await?;
        let parsed = parse_search_response(&body, collection)?;
        debug!(hits = parsed.hits.len(), total = ?parsed.total_matched, took_ms = ?parsed.backend_elapsed_ms, "search answered");
        Ok(parsed)
    }

    /// Send to each host in turn until one accepts the connection. Only
    /// connection failures move on to the next host; any answer, including an
    /// error status, is final.
    async fn send<F>(&self, path: &str, build: F) -> Result<Response, ElasticError>
    where
        F: Fn(&Client, String) -> RequestBuilder,
    {
        let mut last_error = None;
        for host in &self.hosts {
            let mut request = build(&self.http, format!("{host}/{path}"));
            if let Some((user, password)) = &self.auth {
                request = request.basic_auth(user, password.as_ref());
            }
            match request.send().await {
                Ok(response) => return check_status(response).await,
                Err(e) if e.is_connect() => {
                    warn!(host = %host, error = %e, "host unreachable, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(match last_error {
            Some(e) => e.into(),
            None => ElasticError::Config("no hosts configured".into()),
        })
    }
}

async fn check_status(response: Response) -> Result<Response, ElasticError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ElasticError::Api { status: status.as_u16(), body })
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    async fn query(&self, collection: &str, body: &Value) -> anyhow::Result<BackendResponse> {
        Ok(self.search(collection, body).await?)
    }
}
