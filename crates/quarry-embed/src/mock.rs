//! Test-only deterministic embedder.

use crate::error::{EmbedError, Result};

/// Deterministic embedder for tests: identical text always produces the
/// identical unit vector, no network involved.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimensions: usize,
    pub available: bool,
    /// When set, any batch containing this substring fails.
    pub fail_on: Option<String>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimensions: 8,
            available: true,
            fail_on: None,
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_on(substring: &str) -> Self {
        Self {
            fail_on: Some(substring.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            v[i % self.dimensions] += f32::from(byte) / 255.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            v[0] = 1.0;
        } else {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl crate::Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if !self.available {
            return Err(EmbedError::InvalidResponse("mock unavailable".into()));
        }
        if let Some(ref needle) = self.fail_on
            && texts.iter().any(|t| t.contains(needle.as_str()))
        {
            return Err(EmbedError::Api {
                status: 500,
                message: format!("mock failure on {needle:?}"),
            });
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Embedder;

    #[tokio::test]
    async fn identical_text_identical_vector() {
        let mock = MockEmbedder::default();
        let texts = vec!["fn main() {}".to_string(), "fn main() {}".to_string()];
        let vectors = mock.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let mock = MockEmbedder::with_dimensions(16);
        let texts = vec!["some code".to_string(), String::new()];
        let vectors = mock.embed_batch(&texts).await.unwrap();
        for v in &vectors {
            assert_eq!(v.len(), 16);
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn fail_on_substring_rejects_batch() {
        let mock = MockEmbedder::failing_on("bad");
        let ok = vec!["good text".to_string()];
        assert!(mock.embed_batch(&ok).await.is_ok());
        let bad = vec!["good".to_string(), "bad text".to_string()];
        assert!(mock.embed_batch(&bad).await.is_err());
    }

    #[tokio::test]
    async fn unavailable_mock_reports_it() {
        let mock = MockEmbedder::unavailable();
        assert!(!mock.is_available().await);
        assert!(mock.embed_batch(&["x".to_string()]).await.is_err());
    }
}
