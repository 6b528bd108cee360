//! Tool-calling shim for OpenAI-compatible chat completions.
//!
//! Splice sits between an OpenAI-compatible client and a backend model
//! that has no native tool-calling support. Outgoing requests have their
//! `tools` and `tool_choice` folded into a natural-language instruction the
//! model can follow; incoming replies are scanned for function-call JSON
//! emitted inside assistant text (plain, fenced, or backtick-enclosed),
//! which is re-lifted into structured `tool_calls`. Both buffered and
//! streamed responses are supported, and provider-specific envelope fields
//! are preserved through every rewrite.
//!
//! ```no_run
//! use futures::StreamExt;
//! use splice::{Adapter, Config, ToolPolicy};
//!
//! # async fn example(
//! #     request: splice::protocol::openai::ChatCompletionRequest,
//! #     upstream: futures::stream::BoxStream<'static, splice::Result<splice::protocol::openai::ChatCompletionChunk>>,
//! # ) -> splice::Result<()> {
//! let adapter = Adapter::new(
//!     Config::builder()
//!         .tool_policy(ToolPolicy::StopOnFirst)
//!         .build(),
//! );
//!
//! // Outbound: tools become a prompt the model can follow.
//! let _rewritten = adapter.transform_request(request)?;
//!
//! // Inbound: detected calls surface as tool_calls chunks.
//! let mut stream = adapter.wrap_stream(upstream);
//! while let Some(chunk) = stream.next().await {
//!     let _chunk = chunk?;
//!     // forward to the client
//! }
//! # Ok(())
//! # }
//! ```

mod adapter;
mod config;
mod decode;
mod error;
mod extract;
mod policy;
mod prompt;
pub mod protocol;
mod request;
mod response;
mod stream;
mod telemetry;

pub use adapter::Adapter;
pub use config::{Config, ConfigBuilder, DEFAULT_COLLECT_MAX_BYTES, DEFAULT_STREAM_BUFFER_LIMIT, ToolPolicy};
pub use error::{Error, Result};
pub use prompt::TOOLS_PLACEHOLDER;
pub use stream::{SseTransformStream, TransformStream};
pub use telemetry::{MetricEvent, MetricsCallback};
