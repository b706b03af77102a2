//! OpenAI-compatible `/embeddings` backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedder speaking the OpenAI-compatible embeddings API
/// (Ollama, vLLM, LM Studio, and the hosted endpoints all accept it).
#[derive(Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl HttpEmbedder {
    /// `base_url` is the API root without the `/embeddings` suffix,
    /// e.g. `http://localhost:11434/v1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        model: String,
        dimensions: usize,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimensions,
            api_key,
        })
    }
}

impl crate::Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "embedding API error: {text}");
            return Err(EmbedError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbedError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // The API may reorder entries; restore input order via index.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn is_available(&self) -> bool {
        let probe = vec!["probe".to_string()];
        match self.embed_batch(&probe).await {
            Ok(vectors) => vectors.first().is_some_and(|v| !v.is_empty()),
            Err(e) => {
                tracing::debug!(error = %e, "embedding service unavailable");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Embedder;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(base_url: &str) -> HttpEmbedder {
        HttpEmbedder::new(
            base_url,
            "test-model".into(),
            3,
            None,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn embed_batch_parses_and_restores_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0, 0.0] },
                    { "index": 0, "embedding": [1.0, 0.0, 0.0] },
                ],
            })))
            .mount(&server)
            .await;

        let texts = vec!["first".to_string(), "second".to_string()];
        let vectors = embedder(&server.uri()).embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn embed_batch_empty_input_skips_network() {
        // No mock server at all: an empty batch must not hit the wire.
        let vectors = embedder("http://127.0.0.1:9").embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let texts = vec!["x".to_string()];
        let err = embedder(&server.uri()).embed_batch(&texts).await.unwrap_err();
        assert!(matches!(err, EmbedError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn count_mismatch_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [ { "index": 0, "embedding": [1.0] } ],
            })))
            .mount(&server)
            .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let err = embedder(&server.uri()).embed_batch(&texts).await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn availability_follows_probe_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [ { "index": 0, "embedding": [1.0, 0.0, 0.0] } ],
            })))
            .mount(&server)
            .await;

        assert!(embedder(&server.uri()).is_available().await);
        assert!(!embedder("http://127.0.0.1:9").is_available().await);
    }
}
