//! Text embedding interface: batches of text in, fixed-dimension vectors out.
//!
//! The model backend is a black box behind [`Embedder`]; quarry ships an
//! OpenAI-compatible HTTP implementation and a deterministic mock for tests.

pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{EmbedError, Result};
pub use http::HttpEmbedder;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbedder;

use std::future::Future;

/// A batch text-to-vector service.
pub trait Embedder: Send + Sync {
    /// Embed `texts`, returning one vector per input in the same order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or responds with
    /// malformed data.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;

    /// Vector dimension produced by this provider/model pair.
    fn dimensions(&self) -> usize;

    /// Cheap reachability probe.
    fn is_available(&self) -> impl Future<Output = bool> + Send;

    fn name(&self) -> &'static str;
}
