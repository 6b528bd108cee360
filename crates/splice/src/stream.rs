//! Streaming transformation of chat-completion responses.
//!
//! Two adapters share one synchronous state machine: [`TransformStream`]
//! for streams of already-parsed chunks, and [`SseTransformStream`] for
//! raw SSE byte streams. Both are single-consumer and cooperative: the
//! only suspension points are upstream polls and the consumer's own polls.

mod adapter;
mod machine;
mod sse;

pub use adapter::TransformStream;
pub use sse::SseTransformStream;
