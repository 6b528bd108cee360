use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the shim.
///
/// Malformed model output is deliberately absent: undecodable content is
/// passed through unchanged rather than reported, so the only errors a
/// caller can observe are cancellation, upstream failures, and the
/// serialization of synthesized chunks.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller's cancellation signal tripped. No partial result is
    /// produced.
    #[error("operation cancelled")]
    Cancelled,

    /// The upstream stream reported a terminal error. Buffered content
    /// decoded so far is discarded.
    #[error("upstream stream error: {0}")]
    Upstream(String),

    /// A synthesized chunk could not be serialized for the wire.
    #[error("failed to encode synthesized chunk: {0}")]
    ChunkSerialization(String),
}
