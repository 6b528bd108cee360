//! OpenAI chat-completions wire types.
//!
//! The shim speaks the OpenAI protocol on both sides, so a single set of
//! request/response/chunk types is enough. Structs type only the fields the
//! shim reads or rewrites; everything else is carried in a flattened
//! [`unknown_fields::UnknownFields`] map so provider extensions survive a
//! round-trip byte-for-byte at the level they were observed.

pub mod openai;
pub mod unknown_fields;
