//! Construction-time configuration for the shim.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::MetricsCallback;

/// Collection cap applied while gathering tool calls, in bytes.
pub const DEFAULT_COLLECT_MAX_BYTES: usize = 64 * 1024;

/// Hard cap on any internal stream buffer, in bytes.
pub const DEFAULT_STREAM_BUFFER_LIMIT: usize = 10 * 1024 * 1024;

/// Controls how many detected calls are surfaced and whether surrounding
/// prose is preserved.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPolicy {
    /// Surface at most one call and discard text after detection. The
    /// default.
    #[default]
    StopOnFirst,
    /// Gather up to `tool_max_calls` calls within a bounded window, then
    /// stop; text after the first detection is discarded.
    CollectThenStop,
    /// Surface every call from the full reply and suppress all prose.
    DrainAll,
    /// Surface every call and keep prose verbatim; the upstream finish
    /// reason is preserved when it exists.
    AllowMixed,
    /// Forward-incompatible values supplied by callers. Behaves as
    /// [`ToolPolicy::StopOnFirst`] everywhere.
    #[serde(untagged)]
    Other(String),
}

impl ToolPolicy {
    /// True for policies that suppress assistant prose once a call has been
    /// emitted. Only [`ToolPolicy::AllowMixed`] keeps prose flowing.
    pub fn suppresses_content(&self) -> bool {
        !matches!(self, ToolPolicy::AllowMixed)
    }
}

/// Immutable configuration shared by every transformation an
/// [`Adapter`](crate::Adapter) performs.
#[derive(Clone)]
pub struct Config {
    /// Active tool policy.
    pub tool_policy: ToolPolicy,

    /// Upper bound on surfaced calls for collecting policies. Zero means
    /// unbounded.
    pub tool_max_calls: usize,

    /// Byte budget for content buffered while collecting calls. Zero means
    /// unbounded (the stream buffer limit still applies).
    pub tool_collect_max_bytes: usize,

    /// Time window for gathering additional calls, measured from the first
    /// successful decode. Zero means collection is structure-terminated
    /// only.
    pub tool_collect_window: Duration,

    /// Drop the upstream immediately once calls have been emitted, instead
    /// of draining it to completion.
    pub cancel_upstream_on_stop: bool,

    /// Whether the backend accepts system messages. When false and no
    /// system message exists, the synthesized prompt is folded into the
    /// first user message instead.
    pub system_message_support: bool,

    /// Caller-supplied prompt template overriding the built-in one. The
    /// `{tools}` placeholder is replaced with the rendered tool
    /// enumeration; without a placeholder the enumeration is appended.
    pub custom_prompt_template: Option<String>,

    /// Character budget for the streaming early-detection heuristic. Once
    /// this many assistant characters have been seen without a tool-shaped
    /// prefix the stream is latched to passthrough. Zero disables the
    /// heuristic and buffers from the start.
    pub streaming_early_detection: usize,

    /// Hard byte cap on the stream inspection buffer, independent of
    /// `tool_collect_max_bytes`.
    pub stream_buffer_limit: usize,

    /// Observer for transformation and detection events.
    pub metrics_callback: Option<MetricsCallback>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool_policy: ToolPolicy::default(),
            tool_max_calls: 0,
            tool_collect_max_bytes: DEFAULT_COLLECT_MAX_BYTES,
            tool_collect_window: Duration::ZERO,
            cancel_upstream_on_stop: false,
            system_message_support: false,
            custom_prompt_template: None,
            streaming_early_detection: 0,
            stream_buffer_limit: DEFAULT_STREAM_BUFFER_LIMIT,
            metrics_callback: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("tool_policy", &self.tool_policy)
            .field("tool_max_calls", &self.tool_max_calls)
            .field("tool_collect_max_bytes", &self.tool_collect_max_bytes)
            .field("tool_collect_window", &self.tool_collect_window)
            .field("cancel_upstream_on_stop", &self.cancel_upstream_on_stop)
            .field("system_message_support", &self.system_message_support)
            .field("custom_prompt_template", &self.custom_prompt_template)
            .field("streaming_early_detection", &self.streaming_early_detection)
            .field("stream_buffer_limit", &self.stream_buffer_limit)
            .field("metrics_callback", &self.metrics_callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Config {
    /// Start building a configuration from the defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The effective byte cap for the stream inspection buffer: the tighter
    /// of the collect budget and the hard limit, treating zero as
    /// unbounded.
    pub fn effective_buffer_cap(&self) -> usize {
        match (self.tool_collect_max_bytes, self.stream_buffer_limit) {
            (0, 0) => usize::MAX,
            (0, hard) => hard,
            (soft, 0) => soft,
            (soft, hard) => soft.min(hard),
        }
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the tool policy.
    pub fn tool_policy(mut self, policy: ToolPolicy) -> Self {
        self.config.tool_policy = policy;
        self
    }

    /// Cap the number of surfaced calls. Zero means unbounded.
    pub fn tool_max_calls(mut self, max_calls: usize) -> Self {
        self.config.tool_max_calls = max_calls;
        self
    }

    /// Cap the bytes buffered while collecting calls. Zero means unbounded.
    pub fn tool_collect_max_bytes(mut self, max_bytes: usize) -> Self {
        self.config.tool_collect_max_bytes = max_bytes;
        self
    }

    /// Bound the collection window measured from the first successful
    /// decode. Zero means structure-terminated only.
    pub fn tool_collect_window(mut self, window: Duration) -> Self {
        self.config.tool_collect_window = window;
        self
    }

    /// Drop the upstream once calls have been emitted instead of draining.
    pub fn cancel_upstream_on_stop(mut self, cancel: bool) -> Self {
        self.config.cancel_upstream_on_stop = cancel;
        self
    }

    /// Declare that the backend accepts system messages.
    pub fn system_message_support(mut self, supported: bool) -> Self {
        self.config.system_message_support = supported;
        self
    }

    /// Override the built-in prompt template.
    pub fn custom_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.custom_prompt_template = Some(template.into());
        self
    }

    /// Set the early-detection character budget. Zero disables the
    /// heuristic and buffers from the start.
    pub fn streaming_early_detection(mut self, chars: usize) -> Self {
        self.config.streaming_early_detection = chars;
        self
    }

    /// Set the hard stream buffer cap.
    pub fn stream_buffer_limit(mut self, bytes: usize) -> Self {
        self.config.stream_buffer_limit = bytes;
        self
    }

    /// Install a metrics observer.
    pub fn metrics_callback(mut self, callback: MetricsCallback) -> Self {
        self.config.metrics_callback = Some(callback);
        self
    }

    /// Finish building.
    pub fn build(self) -> Config {
        self.config
    }
}
