//! Client for the context retrieval service.
//!
//! Wire contract: `POST {base}/v1/search` with a JSON [`SearchQuery`],
//! answered by `{"results": [{"source", "content", "score"}]}`.

use std::time::Duration;

use async_trait::async_trait;
use docforge_core::gateway::{ContextRetrieval, ContextSnippet, SearchQuery, ServiceFault};
use serde::Deserialize;
use tracing::debug;

use crate::{fault_for_status, fault_for_transport, trim_trailing_slash};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RetrievalClient {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl RetrievalClient {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(SEARCH_TIMEOUT)
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            client,
            base_url: trim_trailing_slash(base_url.into()),
            api_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ContextSnippet>,
}

#[async_trait]
impl ContextRetrieval for RetrievalClient {
    async fn search(&self, query: SearchQuery) -> Result<Vec<ContextSnippet>, ServiceFault> {
        let url = format!("{}/v1/search", self.base_url);
        debug!(
            project_id = %query.project_id,
            stage = ?query.stage_filter,
            "searching project context"
        );

        let mut request = self.client.post(&url).json(&query);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| fault_for_transport("retrieval service", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fault_for_status("retrieval service", status, &body));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            ServiceFault::permanent(format!("retrieval service returned malformed json: {e}"))
        })?;
        debug!(hits = body.results.len(), "context search finished");
        Ok(body.results)
    }
}
