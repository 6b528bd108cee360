//! The streaming adapter for raw Server-Sent-Events byte streams.
//!
//! Incoming bytes are framed with `eventsource-stream` (which drops
//! comments and blank lines), each `data:` payload is parsed into a chunk
//! and fed through the same state machine as the typed adapter, and the
//! output is re-encoded as `data: <json>\n\n` frames followed by the
//! `data: [DONE]\n\n` terminator. Payloads that do not parse as chunks are
//! passed through verbatim.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use eventsource_stream::{Event, Eventsource};
use futures::Stream;
use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::openai::ChatCompletionChunk;
use crate::stream::machine::Machine;

const DONE_FRAME: &str = "data: [DONE]\n\n";

/// A transformed SSE stream: each item is one complete `data: ...\n\n`
/// frame ready to be written to the wire.
pub struct SseTransformStream {
    machine: Machine,
    events: Option<BoxStream<'static, Result<Event>>>,
    cancel: Option<CancellationToken>,
    queue: VecDeque<String>,
    sent_done: bool,
    terminated: bool,
}

impl SseTransformStream {
    pub(crate) fn new<S, B, E>(config: Arc<Config>, bytes: S, cancel: Option<CancellationToken>) -> Self
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: AsRef<[u8]>,
        E: Display,
    {
        let events = bytes
            .eventsource()
            .map(|event| event.map_err(|error| Error::Upstream(error.to_string())))
            .boxed();

        Self {
            machine: Machine::new(config),
            events: Some(events),
            cancel,
            queue: VecDeque::new(),
            sent_done: false,
            terminated: false,
        }
    }

    /// Move every chunk the machine has ready into the output queue.
    fn drain_machine(&mut self) -> Result<()> {
        while let Some(chunk) = self.machine.pop() {
            let json = sonic_rs::to_string(&chunk)
                .map_err(|error| Error::ChunkSerialization(error.to_string()))?;
            self.queue.push_back(format!("data: {json}\n\n"));
        }
        Ok(())
    }
}

impl Stream for SseTransformStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.terminated {
                return Poll::Ready(None);
            }

            if let Some(token) = &this.cancel
                && token.is_cancelled()
            {
                this.terminated = true;
                this.events = None;
                this.machine.discard();
                return Poll::Ready(Some(Err(Error::Cancelled)));
            }

            if let Err(error) = this.drain_machine() {
                this.terminated = true;
                this.events = None;
                return Poll::Ready(Some(Err(error)));
            }

            if let Some(frame) = this.queue.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }

            if this.machine.wants_upstream_dropped() && this.events.is_some() {
                this.events = None;
                this.machine.end();
                continue;
            }

            let Some(events) = this.events.as_mut() else {
                this.machine.end();
                if let Err(error) = this.drain_machine() {
                    this.terminated = true;
                    return Poll::Ready(Some(Err(error)));
                }
                if this.queue.is_empty() {
                    if this.sent_done {
                        this.terminated = true;
                        continue;
                    }
                    this.sent_done = true;
                    return Poll::Ready(Some(Ok(DONE_FRAME.to_string())));
                }
                continue;
            };

            match events.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.events = None;
                    this.machine.end();
                }
                Poll::Ready(Some(Err(error))) => {
                    this.machine.discard();
                    this.events = None;
                    this.terminated = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(Some(Ok(event))) => {
                    if event.data == "[DONE]" {
                        this.events = None;
                        this.machine.end();
                        continue;
                    }

                    match sonic_rs::from_str::<ChatCompletionChunk>(&event.data) {
                        Ok(chunk) => this.machine.push(chunk),
                        // Not a chunk: forward the payload untouched.
                        Err(_) => this.queue.push_back(format!("data: {}\n\n", event.data)),
                    }
                }
            }
        }
    }
}
