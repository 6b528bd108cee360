//! Metric events observed by a caller-supplied sink.
//!
//! The sink is invoked synchronously on the transforming thread. A panic
//! inside the callback is caught, logged once at warning level with the
//! event kind, and suppressed; it never unwinds into the state machine.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

/// Observer invoked for every emitted [`MetricEvent`].
pub type MetricsCallback = Arc<dyn Fn(&MetricEvent) + Send + Sync>;

/// Events emitted by the shim, one per transformation or detection.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    /// Emitted once per rewritten request.
    ToolTransformation {
        /// Number of tools folded into the prompt.
        tool_count: usize,
        /// Tool names in enumeration order.
        tool_names: Vec<String>,
        /// Length of the synthesized prompt, in bytes.
        prompt_length: usize,
        /// Wall time spent rewriting, monotonic.
        duration: Duration,
    },

    /// Emitted once per successful function-call decode.
    FunctionCallDetection {
        /// Number of calls decoded before policy truncation.
        call_count: usize,
        /// Decoded call names in order.
        function_names: Vec<String>,
        /// Length of the inspected content, in bytes.
        content_length: usize,
        /// Number of candidates the extractor produced.
        candidate_count: usize,
        /// Whether detection happened on a stream.
        streaming: bool,
        /// Total detection time, monotonic.
        duration: Duration,
        /// Time spent extracting candidates from text.
        extraction_duration: Duration,
        /// Time spent parsing candidates into calls.
        json_parse_duration: Duration,
    },
}

impl MetricEvent {
    /// Short name of the event kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricEvent::ToolTransformation { .. } => "tool_transformation",
            MetricEvent::FunctionCallDetection { .. } => "function_call_detection",
        }
    }
}

/// Deliver `event` to the sink, if one is installed.
pub(crate) fn emit(callback: Option<&MetricsCallback>, event: MetricEvent) {
    let Some(callback) = callback else {
        return;
    };

    if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
        log::warn!("metrics callback panicked while handling {} event", event.kind());
    }
}
