//! Policy application shared by the unary and streaming transformers.

use crate::config::ToolPolicy;
use crate::decode::RawFunctionCall;

/// Truncate a decoded call list according to the active policy.
///
/// `StopOnFirst` keeps exactly one call regardless of `max_calls`. The
/// collecting policies honor `max_calls` when it is non-zero. Unrecognized
/// policy values get the most restrictive behavior.
pub(crate) fn apply(policy: &ToolPolicy, max_calls: usize, mut calls: Vec<RawFunctionCall>) -> Vec<RawFunctionCall> {
    match policy {
        ToolPolicy::StopOnFirst | ToolPolicy::Other(_) => calls.truncate(1),
        ToolPolicy::CollectThenStop | ToolPolicy::DrainAll | ToolPolicy::AllowMixed => {
            if max_calls > 0 {
                calls.truncate(max_calls);
            }
        }
    }

    calls
}
