//! HTTP adapters for docforge's external collaborators.
//!
//! [`RetrievalClient`] and [`GenerationClient`] implement the traits from
//! `docforge_core::gateway` over JSON endpoints. Fault classification is
//! shared: timeouts, 408/429, 5xx and transport errors are transient and
//! retried by the orchestrator; every other rejection is permanent.

mod generation;
mod retrieval;

pub use generation::GenerationClient;
pub use retrieval::RetrievalClient;

use docforge_core::config::ServicesConfig;
use docforge_core::gateway::ServiceFault;
use reqwest::StatusCode;

/// Build both clients from the configured service endpoints.
pub fn clients_from_config(
    services: &ServicesConfig,
) -> reqwest::Result<(RetrievalClient, GenerationClient)> {
    let retrieval = RetrievalClient::new(
        services.retrieval_url.clone(),
        services.api_token.clone(),
    )?;
    let generation = GenerationClient::new(
        services.generation_url.clone(),
        services.api_token.clone(),
    )?;
    Ok((retrieval, generation))
}

pub(crate) fn fault_for_status(service: &str, status: StatusCode, body: &str) -> ServiceFault {
    let snippet: String = body.chars().take(200).collect();
    let message = if snippet.is_empty() {
        format!("{service} returned {status}")
    } else {
        format!("{service} returned {status}: {snippet}")
    };
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ServiceFault::transient(message)
    } else {
        ServiceFault::permanent(message)
    }
}

pub(crate) fn fault_for_transport(service: &str, err: reqwest::Error) -> ServiceFault {
    ServiceFault::transient(format!("{service} request failed: {err}"))
}

pub(crate) fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
