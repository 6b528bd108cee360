//! The adapter facade tying request rewriting, response transformation and
//! stream wrapping together behind one immutable configuration.

use std::fmt::Display;
use std::sync::Arc;

use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::protocol::openai::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse};
use crate::stream::{SseTransformStream, TransformStream};
use crate::{request, response};

/// The tool-calling shim.
///
/// An adapter is immutable after construction and cheap to clone; one
/// instance can serve any number of concurrent requests and streams. Each
/// wrapped stream owns its own state.
#[derive(Debug, Clone)]
pub struct Adapter {
    config: Arc<Config>,
}

impl Default for Adapter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Adapter {
    /// Build an adapter from a configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rewrite an outgoing request: fold tools and tool results into a
    /// synthesized instruction and clear `tools`/`tool_choice`. Requests
    /// without tools or tool-result messages are returned unchanged.
    pub fn transform_request(&self, request: ChatCompletionRequest) -> Result<ChatCompletionRequest> {
        request::transform(&self.config, request, None)
    }

    /// Like [`Adapter::transform_request`], observing `cancel` between
    /// phases. On a trip no partial request is returned.
    pub fn transform_request_with_cancel(
        &self,
        request: ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatCompletionRequest> {
        request::transform(&self.config, request, Some(cancel))
    }

    /// Inspect a completed response and re-lift detected function-call
    /// JSON into structured `tool_calls`. Responses without detectable
    /// calls are returned unchanged.
    pub fn transform_response(&self, response: ChatCompletionResponse) -> Result<ChatCompletionResponse> {
        response::transform(&self.config, response, None)
    }

    /// Like [`Adapter::transform_response`], observing `cancel` before
    /// extraction, decoding, and mutation.
    pub fn transform_response_with_cancel(
        &self,
        response: ChatCompletionResponse,
        cancel: &CancellationToken,
    ) -> Result<ChatCompletionResponse> {
        response::transform(&self.config, response, Some(cancel))
    }

    /// Wrap an upstream chunk stream. The returned stream is a drop-in
    /// replacement for the upstream.
    pub fn wrap_stream<S>(&self, upstream: S) -> TransformStream
    where
        S: Stream<Item = Result<ChatCompletionChunk>> + Send + 'static,
    {
        TransformStream::new(self.config.clone(), upstream, None)
    }

    /// Like [`Adapter::wrap_stream`], with a cancellation signal polled
    /// before every upstream read and every downstream yield.
    pub fn wrap_stream_with_cancel<S>(&self, upstream: S, cancel: CancellationToken) -> TransformStream
    where
        S: Stream<Item = Result<ChatCompletionChunk>> + Send + 'static,
    {
        TransformStream::new(self.config.clone(), upstream, Some(cancel))
    }

    /// Wrap a raw SSE byte stream. The returned stream yields complete
    /// `data: ...\n\n` frames, terminated by `data: [DONE]\n\n`.
    pub fn wrap_sse<S, B, E>(&self, bytes: S) -> SseTransformStream
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: AsRef<[u8]>,
        E: Display,
    {
        SseTransformStream::new(self.config.clone(), bytes, None)
    }

    /// Like [`Adapter::wrap_sse`], with a cancellation signal.
    pub fn wrap_sse_with_cancel<S, B, E>(&self, bytes: S, cancel: CancellationToken) -> SseTransformStream
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: AsRef<[u8]>,
        E: Display,
    {
        SseTransformStream::new(self.config.clone(), bytes, Some(cancel))
    }
}
