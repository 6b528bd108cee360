//! Decoding of extracted candidates into function-call records.
//!
//! A candidate is tried as an array of call records first, then as a single
//! record. The wrapper shape is strict: any field other than `name` and
//! `parameters` rejects the candidate, which keeps arbitrary JSON that
//! happens to contain a `name` field (a person record, a config blob) from
//! being misread as a call. Every accepted name has passed
//! [`name::validate`].

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::extract::Candidate;

pub mod name;

/// A decoded function call: a validated name and the raw bytes of whatever
/// appeared under `parameters`. Parameters are preserved byte-equivalent and
/// never semantically validated; an absent or explicitly `null` payload is
/// the `None` marker. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct RawFunctionCall {
    pub name: String,
    pub parameters: Option<Box<RawValue>>,
}

impl RawFunctionCall {
    /// The argument payload to put on the wire: the raw parameter bytes, or
    /// `"{}"` when the call carried none.
    pub fn arguments_json(&self) -> &str {
        self.parameters.as_deref().map_or("{}", RawValue::get)
    }
}

/// The wire shape the model is instructed to emit.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireCall {
    name: String,
    #[serde(default)]
    parameters: Option<Box<RawValue>>,
}

impl WireCall {
    fn into_call(self) -> RawFunctionCall {
        RawFunctionCall {
            name: self.name,
            parameters: self.parameters,
        }
    }
}

/// Result of decoding a candidate list.
#[derive(Debug, Default)]
pub(crate) struct DecodeOutcome {
    /// Accepted calls in source order.
    pub calls: Vec<RawFunctionCall>,
    /// Index of the first candidate that yielded calls.
    pub first_candidate: Option<usize>,
    /// Index of the last candidate that yielded calls.
    pub last_candidate: Option<usize>,
}

impl DecodeOutcome {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Decode candidates in order, stopping at the first one that yields at
/// least one valid call. Remaining candidates are ignored.
pub(crate) fn decode_first(candidates: &[Candidate<'_>]) -> DecodeOutcome {
    let mut outcome = DecodeOutcome::default();

    for (index, candidate) in candidates.iter().enumerate() {
        if let Some(calls) = decode_candidate(candidate.text) {
            outcome.first_candidate = Some(index);
            outcome.last_candidate = Some(index);
            outcome.calls = calls;
            break;
        }
    }

    outcome
}

/// Decode candidates in order, accumulating calls from every candidate
/// that parses. Collecting policies need this: a reply can carry calls in
/// more than one structure.
pub(crate) fn decode_all(candidates: &[Candidate<'_>]) -> DecodeOutcome {
    let mut outcome = DecodeOutcome::default();

    for (index, candidate) in candidates.iter().enumerate() {
        if let Some(calls) = decode_candidate(candidate.text) {
            outcome.first_candidate.get_or_insert(index);
            outcome.last_candidate = Some(index);
            outcome.calls.extend(calls);
        }
    }

    outcome
}

/// Try one candidate: array shape first, then object shape. A candidate is
/// rejected wholesale when any record fails name validation, so a poisoned
/// array cannot smuggle calls through.
fn decode_candidate(text: &str) -> Option<Vec<RawFunctionCall>> {
    if let Ok(records) = serde_json::from_str::<Vec<WireCall>>(text) {
        if records.is_empty() {
            return None;
        }

        let mut calls = Vec::with_capacity(records.len());
        for record in records {
            if let Err(reason) = name::validate(&record.name) {
                log::debug!("rejecting candidate: call name {:?}: {reason}", record.name);
                return None;
            }
            calls.push(record.into_call());
        }

        return Some(calls);
    }

    let record = serde_json::from_str::<WireCall>(text).ok()?;
    if let Err(reason) = name::validate(&record.name) {
        log::debug!("rejecting candidate: call name {:?}: {reason}", record.name);
        return None;
    }

    Some(vec![record.into_call()])
}
