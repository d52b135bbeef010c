//! Client for the generation service.
//!
//! Wire contract: `POST {base}/v1/generate` with a JSON
//! [`GenerationRequest`], answered by
//! `{"content", "confidence_score", "epics": [...]}`. Generation runs for
//! minutes, so the request races the cancel signal: on cancellation the
//! in-flight request is dropped, which is as much abort as HTTP offers.

use std::time::Duration;

use async_trait::async_trait;
use docforge_core::cancel::CancelSignal;
use docforge_core::gateway::{
    EpicDocument, GeneratedDocument, GenerationRequest, ServiceFault, StepGenerator,
};
use serde::Deserialize;
use tracing::debug;

use crate::{fault_for_status, fault_for_transport, trim_trailing_slash};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const GENERATE_TIMEOUT: Duration = Duration::from_secs(600);

pub struct GenerationClient {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(GENERATE_TIMEOUT)
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            client,
            base_url: trim_trailing_slash(base_url.into()),
            api_token,
        })
    }

    async fn send(&self, request: &GenerationRequest) -> Result<GeneratedDocument, ServiceFault> {
        let url = format!("{}/v1/generate", self.base_url);
        let mut req = self.client.post(&url).json(request);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }
        let response = req
            .send()
            .await
            .map_err(|e| fault_for_transport("generation service", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fault_for_status("generation service", status, &body));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            ServiceFault::permanent(format!("generation service returned malformed json: {e}"))
        })?;
        Ok(GeneratedDocument {
            content: body.content,
            confidence_score: body.confidence_score,
            epics: body.epics,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    content: String,
    confidence_score: f64,
    #[serde(default)]
    epics: Vec<EpicDocument>,
}

#[async_trait]
impl StepGenerator for GenerationClient {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancelSignal,
    ) -> Result<GeneratedDocument, ServiceFault> {
        debug!(
            correlation_id = %request.correlation_id,
            stage = %request.stage,
            context_snippets = request.context.len(),
            prior_documents = request.prior_documents.len(),
            "requesting generation"
        );
        tokio::select! {
            result = self.send(&request) => result,
            _ = cancel.cancelled() => {
                debug!(
                    correlation_id = %request.correlation_id,
                    "generation abandoned after cancellation"
                );
                Err(ServiceFault::transient("generation abandoned: execution cancelled"))
            }
        }
    }
}
