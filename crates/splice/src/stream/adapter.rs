//! The streaming adapter for already-parsed chunk streams.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::openai::ChatCompletionChunk;
use crate::stream::machine::Machine;

/// A transformed chat-completion stream.
///
/// Wraps an upstream chunk stream and presents the same interface: content
/// passes through or is buffered for detection according to the configured
/// policy, and decoded calls surface as synthesized `tool_calls` chunks.
/// One consumer owns the stream; it is not meant to be polled concurrently.
pub struct TransformStream {
    machine: Machine,
    upstream: Option<BoxStream<'static, Result<ChatCompletionChunk>>>,
    cancel: Option<CancellationToken>,
    terminated: bool,
}

impl TransformStream {
    pub(crate) fn new<S>(config: Arc<Config>, upstream: S, cancel: Option<CancellationToken>) -> Self
    where
        S: Stream<Item = Result<ChatCompletionChunk>> + Send + 'static,
    {
        Self {
            machine: Machine::new(config),
            upstream: Some(upstream.boxed()),
            cancel,
            terminated: false,
        }
    }
}

impl Stream for TransformStream {
    type Item = Result<ChatCompletionChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.terminated {
                return Poll::Ready(None);
            }

            // Cancellation is polled before every yield and before every
            // upstream read.
            if let Some(token) = &this.cancel
                && token.is_cancelled()
            {
                this.terminated = true;
                this.upstream = None;
                this.machine.discard();
                return Poll::Ready(Some(Err(Error::Cancelled)));
            }

            if let Some(chunk) = this.machine.pop() {
                return Poll::Ready(Some(Ok(chunk)));
            }

            if this.machine.wants_upstream_dropped() && this.upstream.is_some() {
                this.upstream = None;
                this.machine.end();
                continue;
            }

            let Some(upstream) = this.upstream.as_mut() else {
                this.machine.end();
                if let Some(chunk) = this.machine.pop() {
                    return Poll::Ready(Some(Ok(chunk)));
                }
                this.terminated = true;
                continue;
            };

            match upstream.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.upstream = None;
                    this.machine.end();
                }
                Poll::Ready(Some(Err(error))) => {
                    this.machine.discard();
                    this.upstream = None;
                    this.terminated = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(Some(Ok(chunk))) => this.machine.push(chunk),
            }
        }
    }
}
