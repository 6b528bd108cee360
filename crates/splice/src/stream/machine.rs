//! The chunk-level state machine behind both streaming adapters.
//!
//! One machine instance serves one stream. It is a synchronous, single
//! threaded object: the owning adapter feeds it upstream chunks with
//! [`Machine::push`], signals exhaustion with [`Machine::end`], and drains
//! synthesized output with [`Machine::pop`]. All policy, budget, and
//! detection logic lives here; the adapters only move chunks and honor
//! cancellation.
//!
//! Phases:
//!
//! - `Buffering`: the initial phase. Assistant content accumulates in an
//!   inspection buffer which is re-decoded on every arrival. With a
//!   non-zero early-detection budget the machine latches to `Passthrough`
//!   once the prefix can no longer be tool-shaped.
//! - `Passthrough`: verbatim forwarding, latched for the stream's
//!   remainder (and the tail mode of `AllowMixed` after emission).
//! - `Collecting`: calls have been decoded and the policy wants more;
//!   bounded by call count, byte budget, and the collect window.
//! - `Suppressing`: calls have been emitted; upstream is drained and its
//!   content discarded.
//! - `Terminated`: nothing further will be ingested or emitted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Config, ToolPolicy};
use crate::decode::{self, DecodeOutcome, RawFunctionCall};
use crate::extract;
use crate::policy;
use crate::protocol::openai::{
    ChatCompletionChunk, ChatRole, ChunkChoice, ChunkDelta, FinishReason, StreamingFunction,
    StreamingToolCall,
};
use crate::protocol::unknown_fields::UnknownFields;
use crate::response::fresh_call_id;
use crate::telemetry::{self, MetricEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Passthrough,
    Buffering,
    Collecting,
    Suppressing,
    Terminated,
}

/// Identity of the stream, captured from the first upstream chunk and
/// reused for every synthesized chunk so downstream sees one consistent
/// completion, envelope extras included.
#[derive(Debug, Clone)]
struct ChunkMeta {
    id: String,
    object: Option<String>,
    created: u64,
    model: String,
    unknown_fields: UnknownFields,
}

impl ChunkMeta {
    fn capture(chunk: &ChatCompletionChunk) -> Self {
        Self {
            id: chunk.id.clone(),
            object: chunk.object.clone(),
            created: chunk.created,
            model: chunk.model.clone(),
            unknown_fields: chunk.unknown_fields.clone(),
        }
    }
}

pub(crate) struct Machine {
    config: Arc<Config>,
    phase: Phase,
    buf: String,
    chars_seen: usize,
    pending: VecDeque<ChatCompletionChunk>,
    collected: Vec<RawFunctionCall>,
    /// Byte offset into `buf` where the first decoded structure begins,
    /// markers included; everything before it is pre-detection prose.
    prose_prefix_end: usize,
    collect_deadline: Option<Instant>,
    first_chunk_meta: Option<ChunkMeta>,
    emitted_tool_call: bool,
    finish_reason_upstream: Option<FinishReason>,
    /// Finish chunk withheld while buffering, content stripped. Re-emitted
    /// verbatim when the buffer is flushed without a detection.
    held_finish: Option<ChatCompletionChunk>,
    /// Whether a finish chunk has been forwarded or synthesized already.
    delivered_finish: bool,
    detection_started: Option<Instant>,
    extraction_time: Duration,
    json_parse_time: Duration,
    candidate_count: usize,
    detection_reported: bool,
}

impl Machine {
    pub(crate) fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            phase: Phase::Buffering,
            buf: String::new(),
            chars_seen: 0,
            pending: VecDeque::new(),
            collected: Vec::new(),
            prose_prefix_end: 0,
            collect_deadline: None,
            first_chunk_meta: None,
            emitted_tool_call: false,
            finish_reason_upstream: None,
            held_finish: None,
            delivered_finish: false,
            detection_started: None,
            extraction_time: Duration::ZERO,
            json_parse_time: Duration::ZERO,
            candidate_count: 0,
            detection_reported: false,
        }
    }

    /// Next synthesized or forwarded chunk, in delivery order.
    pub(crate) fn pop(&mut self) -> Option<ChatCompletionChunk> {
        self.pending.pop_front()
    }

    /// True once the machine will never produce further output.
    pub(crate) fn is_drained(&self) -> bool {
        self.phase == Phase::Terminated && self.pending.is_empty()
    }

    /// True when the adapter should drop the upstream instead of draining
    /// it to completion.
    pub(crate) fn wants_upstream_dropped(&self) -> bool {
        self.phase == Phase::Suppressing && self.config.cancel_upstream_on_stop
    }

    /// Discard all buffered state after an upstream error.
    pub(crate) fn discard(&mut self) {
        self.buf.clear();
        self.buf.shrink_to_fit();
        self.pending.clear();
        self.collected.clear();
        self.phase = Phase::Terminated;
    }

    /// Ingest one upstream chunk.
    pub(crate) fn push(&mut self, chunk: ChatCompletionChunk) {
        if self.first_chunk_meta.is_none() {
            self.first_chunk_meta = Some(ChunkMeta::capture(&chunk));
        }

        if let Some(reason) = chunk.finish_reason() {
            self.finish_reason_upstream = Some(reason.clone());
        }

        match self.phase {
            Phase::Passthrough => {
                if chunk.finish_reason().is_some() {
                    self.delivered_finish = true;
                }
                self.pending.push_back(chunk);
            }
            Phase::Buffering => self.push_buffering(chunk),
            Phase::Collecting => self.push_collecting(chunk),
            Phase::Suppressing => {}
            Phase::Terminated => {}
        }
    }

    /// Upstream is exhausted; settle the stream.
    pub(crate) fn end(&mut self) {
        match self.phase {
            Phase::Buffering => {
                self.flush_buffer_as_content();
                self.phase = Phase::Terminated;
            }
            Phase::Collecting => {
                self.emit_calls();
                self.phase = Phase::Terminated;
            }
            Phase::Passthrough => {
                // The AllowMixed tail owes downstream a terminator when the
                // upstream never produced one.
                if self.emitted_tool_call && !self.delivered_finish {
                    let reason = self
                        .finish_reason_upstream
                        .clone()
                        .unwrap_or(FinishReason::ToolCalls);
                    let terminator = self.synthesized_chunk(ChunkDelta::default(), Some(reason));
                    self.pending.push_back(terminator);
                    self.delivered_finish = true;
                }
                self.phase = Phase::Terminated;
            }
            Phase::Suppressing | Phase::Terminated => {
                self.phase = Phase::Terminated;
            }
        }
    }

    fn push_buffering(&mut self, chunk: ChatCompletionChunk) {
        let fragment = chunk.content_fragment().map(str::to_string);
        let has_finish = chunk.finish_reason().is_some();

        if let Some(fragment) = &fragment
            && !fragment.is_empty()
        {
            self.detection_started.get_or_insert_with(Instant::now);
            self.buf.push_str(fragment);
            self.chars_seen += fragment.chars().count();
        }

        if has_finish {
            self.hold_finish(chunk);
        }

        if self.try_detect() {
            return;
        }

        // Early-detection latch: after the budget, a prefix that cannot be
        // tool-shaped means the stream is plain prose.
        let budget = self.config.streaming_early_detection;
        if budget > 0 && self.chars_seen >= budget && !extract::looks_tool_shaped(&self.buf) {
            self.flush_buffer_as_content();
            self.phase = Phase::Passthrough;
            return;
        }

        self.enforce_buffer_cap();
    }

    fn push_collecting(&mut self, chunk: ChatCompletionChunk) {
        let fragment = chunk.content_fragment().map(str::to_string);
        let has_finish = chunk.finish_reason().is_some();

        if let Some(fragment) = &fragment
            && !fragment.is_empty()
        {
            self.buf.push_str(fragment);
            self.chars_seen += fragment.chars().count();
        }

        if has_finish {
            self.hold_finish(chunk);
        }

        // Re-decode the grown buffer; the decoder is idempotent on partial
        // input, so the snapshot simply replaces the previous one.
        let outcome = self.run_decode();
        if !outcome.is_empty() {
            self.collected = outcome.calls;
        }

        let max_calls = self.config.tool_max_calls;
        if max_calls > 0 && self.collected.len() >= max_calls {
            self.emit_calls();
            return;
        }

        if self.deadline_elapsed() {
            self.emit_calls();
            return;
        }

        if self.buffer_cap_reached() {
            self.warn_buffer_cap();
            self.emit_calls();
        }
    }

    /// Run extraction and decoding over the inspection buffer. Records the
    /// sub-phase timings and, on success, the prose boundary.
    fn run_decode(&mut self) -> DecodeOutcome {
        let extraction_started = Instant::now();
        let candidates = extract::extract_candidates(&self.buf, self.config.stream_buffer_limit);
        self.extraction_time += extraction_started.elapsed();

        let parse_started = Instant::now();
        let outcome = match &self.config.tool_policy {
            ToolPolicy::StopOnFirst | ToolPolicy::Other(_) => decode::decode_first(&candidates),
            _ => decode::decode_all(&candidates),
        };
        self.json_parse_time += parse_started.elapsed();

        if let Some(first) = outcome.first_candidate {
            self.prose_prefix_end = candidates[first].span.start;
            self.candidate_count = candidates.len();
        }

        outcome
    }

    /// Decode the buffer and take the policy-specific transition on the
    /// first success. Returns true when the phase changed.
    fn try_detect(&mut self) -> bool {
        let outcome = self.run_decode();
        if outcome.is_empty() {
            return false;
        }

        self.collected = outcome.calls;

        match &self.config.tool_policy {
            ToolPolicy::StopOnFirst | ToolPolicy::Other(_) => {
                self.collected.truncate(1);
                self.emit_calls();
            }
            ToolPolicy::CollectThenStop => {
                let window = self.config.tool_collect_window;
                let max_calls = self.config.tool_max_calls;

                if max_calls > 0 && self.collected.len() >= max_calls {
                    self.emit_calls();
                } else if window.is_zero() {
                    // Structure-terminated: the structure that carried the
                    // calls has closed, and no timer extends the wait.
                    self.emit_calls();
                } else {
                    self.collect_deadline = Some(Instant::now() + window);
                    self.phase = Phase::Collecting;
                }
            }
            ToolPolicy::DrainAll => {
                let max_calls = self.config.tool_max_calls;
                if max_calls > 0 && self.collected.len() >= max_calls {
                    self.emit_calls();
                } else {
                    self.phase = Phase::Collecting;
                }
            }
            ToolPolicy::AllowMixed => self.emit_calls_mixed(),
        }

        true
    }

    /// Surface the collected calls: pre-detection prose first, then the
    /// call chunk and terminator, then suppress the rest of the stream.
    fn emit_calls(&mut self) {
        self.report_detection();

        let calls = policy::apply(
            &self.config.tool_policy,
            self.config.tool_max_calls,
            std::mem::take(&mut self.collected),
        );

        let prose = &self.buf[..self.prose_prefix_end];
        if !prose.is_empty() {
            let delta = ChunkDelta {
                role: Some(ChatRole::Assistant),
                content: Some(prose.to_string()),
                ..Default::default()
            };
            let chunk = self.synthesized_chunk(delta, None);
            self.pending.push_back(chunk);
        }

        let call_chunk = self.synthesized_chunk(tool_call_delta(&calls), None);
        self.pending.push_back(call_chunk);

        let terminator = self.synthesized_chunk(ChunkDelta::default(), Some(FinishReason::ToolCalls));
        self.pending.push_back(terminator);
        self.delivered_finish = true;

        self.emitted_tool_call = true;
        self.held_finish = None;
        self.buf.clear();
        self.phase = Phase::Suppressing;
    }

    /// AllowMixed surfacing: the buffered text is delivered verbatim (call
    /// JSON included), the call chunk follows, and the stream returns to
    /// passthrough so later prose keeps flowing. The terminator is deferred
    /// to end of stream so the upstream finish reason can be preserved.
    fn emit_calls_mixed(&mut self) {
        self.report_detection();

        let calls = policy::apply(
            &self.config.tool_policy,
            self.config.tool_max_calls,
            std::mem::take(&mut self.collected),
        );

        if !self.buf.is_empty() {
            let delta = ChunkDelta {
                role: Some(ChatRole::Assistant),
                content: Some(std::mem::take(&mut self.buf)),
                ..Default::default()
            };
            let chunk = self.synthesized_chunk(delta, None);
            self.pending.push_back(chunk);
        }

        let call_chunk = self.synthesized_chunk(tool_call_delta(&calls), None);
        self.pending.push_back(call_chunk);

        if let Some(finish) = self.held_finish.take() {
            self.delivered_finish = true;
            self.pending.push_back(finish);
        }

        self.emitted_tool_call = true;
        self.buf.clear();
        self.phase = Phase::Passthrough;
    }

    /// Flush the inspection buffer downstream unchanged: the stream held no
    /// decodable calls (or ran over budget before any were found).
    fn flush_buffer_as_content(&mut self) {
        if !self.buf.is_empty() {
            let delta = ChunkDelta {
                role: Some(ChatRole::Assistant),
                content: Some(std::mem::take(&mut self.buf)),
                ..Default::default()
            };
            let chunk = self.synthesized_chunk(delta, None);
            self.pending.push_back(chunk);
        }

        if let Some(finish) = self.held_finish.take() {
            self.delivered_finish = true;
            self.pending.push_back(finish);
        }

        self.buf.clear();
    }

    fn enforce_buffer_cap(&mut self) {
        if !self.buffer_cap_reached() {
            return;
        }

        self.warn_buffer_cap();
        self.flush_buffer_as_content();
        self.phase = Phase::Passthrough;
    }

    fn buffer_cap_reached(&self) -> bool {
        self.buf.len() >= self.config.effective_buffer_cap()
    }

    fn warn_buffer_cap(&self) {
        let max_bytes = self.config.tool_collect_max_bytes;
        let (cap, knob) = if max_bytes > 0 && self.buf.len() >= max_bytes {
            (max_bytes, "tool_collect_max_bytes")
        } else {
            (self.config.stream_buffer_limit, "stream_buffer_limit")
        };

        log::warn!(
            "stream inspection buffer reached {} bytes (cap {cap}); raise {knob} to buffer more",
            self.buf.len(),
        );
    }

    fn deadline_elapsed(&self) -> bool {
        self.collect_deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn hold_finish(&mut self, mut chunk: ChatCompletionChunk) {
        for choice in &mut chunk.choices {
            choice.delta.content = None;
        }
        self.held_finish = Some(chunk);
    }

    fn report_detection(&mut self) {
        if self.detection_reported {
            return;
        }
        self.detection_reported = true;

        let duration = self
            .detection_started
            .map(|started| started.elapsed())
            .unwrap_or_default();

        telemetry::emit(
            self.config.metrics_callback.as_ref(),
            MetricEvent::FunctionCallDetection {
                call_count: self.collected.len(),
                function_names: self.collected.iter().map(|c| c.name.clone()).collect(),
                content_length: self.buf.len(),
                candidate_count: self.candidate_count,
                streaming: true,
                duration,
                extraction_duration: self.extraction_time,
                json_parse_duration: self.json_parse_time,
            },
        );
    }

    /// Build a chunk with the captured stream identity. Falls back to an
    /// anonymous identity when the upstream ended before any chunk arrived,
    /// which can only happen for empty streams.
    fn synthesized_chunk(&self, delta: ChunkDelta, finish_reason: Option<FinishReason>) -> ChatCompletionChunk {
        let meta = self.first_chunk_meta.clone().unwrap_or_else(|| ChunkMeta {
            id: fresh_call_id(),
            object: Some("chat.completion.chunk".to_string()),
            created: 0,
            model: String::new(),
            unknown_fields: UnknownFields::default(),
        });

        ChatCompletionChunk {
            id: meta.id,
            object: meta.object,
            created: meta.created,
            model: meta.model,
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
                unknown_fields: UnknownFields::default(),
            }],
            unknown_fields: meta.unknown_fields,
        }
    }
}

fn tool_call_delta(calls: &[RawFunctionCall]) -> ChunkDelta {
    let tool_calls = calls
        .iter()
        .enumerate()
        .map(|(index, call)| StreamingToolCall {
            index: index as u32,
            id: Some(fresh_call_id()),
            kind: Some("function".to_string()),
            function: StreamingFunction {
                name: Some(call.name.clone()),
                arguments: Some(call.arguments_json().to_string()),
            },
            unknown_fields: UnknownFields::default(),
        })
        .collect();

    ChunkDelta {
        role: Some(ChatRole::Assistant),
        content: None,
        tool_calls: Some(tool_calls),
        unknown_fields: UnknownFields::default(),
    }
}
