// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Canonical string rendering of trace identity.
//!
//! Every place that needs a `traceparent` value or a bare trace id goes
//! through these functions (header injection and log correlation alike), so
//! there is exactly one formatting routine and no way for the two to
//! diverge. Hex components are always zero-padded to their fixed W3C widths
//! (32 for trace ids, 16 for span ids); a small id must never produce a
//! short header.

use crate::propagation::TraceContext;

/// Renders the trace id as 32 lowercase hex characters, no prefix.
#[must_use]
pub fn format_trace_id(context: &TraceContext) -> String {
    format!("{:032x}", context.trace_id)
}

/// Renders the span id as 16 lowercase hex characters, no prefix.
#[must_use]
pub fn format_span_id(context: &TraceContext) -> String {
    format!("{:016x}", context.span_id)
}

/// Renders the canonical W3C `traceparent` value for a context.
///
/// Flags are normalized to `01` (sampled) or `00`; the version is always
/// `00`.
#[must_use]
pub fn format_traceparent(context: &TraceContext) -> String {
    format!(
        "00-{:032x}-{:016x}-{}",
        context.trace_id,
        context.span_id,
        if context.sampled { "01" } else { "00" }
    )
}

/// A container that may hold one context directly or a keyed collection of
/// them.
///
/// Some extraction layers yield a mapping of arbitrary keys to
/// context-bearing values rather than a single context. Only one entry is
/// expected in practice; see [`extract_trace_id`].
#[derive(Debug, Clone)]
pub enum ContextCarrier {
    /// A single trace context.
    Single(TraceContext),
    /// A keyed collection of contexts, in insertion order.
    Keyed(Vec<(String, TraceContext)>),
}

/// Extracts the bare trace id string from a context carrier.
///
/// For [`ContextCarrier::Keyed`] the first entry in iteration order is used.
/// This is a deliberate, documented tie-break: callers only ever supply one
/// context, so picking the first entry is deterministic and sufficient.
/// Returns `None` only for an empty keyed carrier.
#[must_use]
pub fn extract_trace_id(carrier: &ContextCarrier) -> Option<String> {
    match carrier {
        ContextCarrier::Single(context) => Some(format_trace_id(context)),
        ContextCarrier::Keyed(entries) => entries
            .first()
            .map(|(_, context)| format_trace_id(context)),
    }
}
