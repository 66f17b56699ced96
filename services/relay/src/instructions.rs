//! Fetches the free-text agent instructions for a call.

use crate::error::RelayError;
use async_trait::async_trait;
use callbridge_core::agent_settings::Instructions;
use reqwest::StatusCode;
use tracing::info;

/// A source of agent instructions, consulted once per media session.
#[async_trait]
pub trait InstructionsSource: Send + Sync {
    /// Returns the instruction text, or `UpstreamFetchFailure`.
    async fn fetch(&self) -> Result<String, RelayError>;
}

/// Resolves the instructions for a new session, degrading to the fallback text.
pub async fn resolve(source: &dyn InstructionsSource) -> Instructions {
    Instructions::from_fetch(source.fetch().await)
}

/// Reads instructions with a plain HTTP GET.
pub struct HttpInstructionsSource {
    client: reqwest::Client,
    url: String,
}

impl HttpInstructionsSource {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl InstructionsSource for HttpInstructionsSource {
    async fn fetch(&self) -> Result<String, RelayError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamFetchFailure(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RelayError::UpstreamFetchFailure(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| RelayError::UpstreamFetchFailure(e.to_string()))?;
        info!(url = %self.url, bytes = text.len(), "Fetched agent instructions");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callbridge_core::agent_settings::FALLBACK_INSTRUCTIONS;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> HttpInstructionsSource {
        HttpInstructionsSource::new(
            reqwest::Client::new(),
            format!("{}/instructions.txt", server.uri()),
        )
    }

    #[tokio::test]
    async fn returns_body_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instructions.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Ask about the delivery."))
            .mount(&server)
            .await;

        let source = source_for(&server);
        assert_eq!(source.fetch().await.unwrap(), "Ask about the delivery.");
        assert_eq!(
            resolve(&source).await,
            Instructions::Fetched("Ask about the delivery.".to_string())
        );
    }

    #[tokio::test]
    async fn not_found_falls_back_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instructions.txt"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let source = source_for(&server);
        assert!(matches!(
            source.fetch().await,
            Err(RelayError::UpstreamFetchFailure(_))
        ));

        let instructions = resolve(&source).await;
        assert_eq!(instructions, Instructions::Fallback);
        assert_eq!(instructions.text(), FALLBACK_INSTRUCTIONS);
    }

    #[tokio::test]
    async fn unreachable_host_falls_back() {
        let source = HttpInstructionsSource::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/instructions.txt".to_string(),
        );
        assert_eq!(resolve(&source).await, Instructions::Fallback);
    }
}
