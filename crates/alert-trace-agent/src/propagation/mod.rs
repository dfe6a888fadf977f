// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Distributed trace context propagation for the alert receiver.
//!
//! This module turns inbound request headers into a [`TraceContext`] and
//! renders that context back out as response headers, so every webhook
//! delivery lands inside the trace its sender started (or a fresh one when
//! the sender did not start any).
//!
//! # Trace Context Flow
//!
//! ```text
//! Incoming Request Headers
//!   ↓
//! Extract (W3C traceparent, or synthesize a fresh context)
//!   ↓
//! TraceContext (trace id, span id, sampled)
//!   ↓
//! Process Request (span parented to the context)
//!   ↓
//! Inject (traceparent + B3 response headers)
//!   ↓
//! Outgoing Response Headers
//! ```
//!
//! Extraction never fails: a malformed or absent `traceparent` falls
//! through to a cryptographically random, well-formed context that is
//! indistinguishable from a legitimate new trace root. The outcome is
//! reported alongside the context so callers can log which path was taken.

use rand::Rng;

use carrier::{Extractor, Injector};
use text_map_propagator::{B3MultiPropagator, TraceContextPropagator};

pub mod carrier;
pub mod error;
pub mod identity;
pub mod text_map_propagator;

/// Context for trace propagation between services.
///
/// Immutable once created: extraction and synthesis both produce a finished
/// value, and nothing downstream mutates it. Lives for one request and is
/// never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceContext {
    /// The 128-bit trace id (shared across all spans in the trace).
    pub trace_id: u128,

    /// The 64-bit span id of the propagated (parent) span.
    pub span_id: u64,

    /// Whether the trace is sampled (bit 0 of the W3C flags byte).
    pub sampled: bool,
}

/// How an extracted context came to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextOrigin {
    /// Parsed from a valid inbound `traceparent` header.
    Propagated,
    /// Freshly generated because no parsable header was present.
    Synthesized,
}

/// The result of context extraction: a context plus its provenance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub context: TraceContext,
    pub origin: ContextOrigin,
}

/// Trait for extracting and injecting distributed trace context.
///
/// Implementations must be thread-safe (`Send + Sync`) for use in async
/// contexts.
pub trait Propagator {
    /// Extracts trace context from a carrier (e.g. HTTP headers).
    ///
    /// Returns `Some` if valid trace context was found, `None` otherwise.
    fn extract(&self, carrier: &dyn Extractor) -> Option<TraceContext>;

    /// Injects trace context into a carrier (e.g. HTTP headers).
    fn inject(&self, context: &TraceContext, carrier: &mut dyn Injector);
}

/// Composite propagator used by the alert receiver.
///
/// Extraction reads the W3C format only; B3 headers never seed the context,
/// they are just echoed back on injection. Synthesis guarantees the
/// returned ids are non-zero.
#[derive(Clone, Copy)]
pub struct AlertReceiverPropagator;

impl AlertReceiverPropagator {
    /// Extracts a trace context from the carrier, synthesizing one when no
    /// valid `traceparent` is present. Never fails.
    #[must_use]
    pub fn extract(carrier: &dyn Extractor) -> Extraction {
        match TraceContextPropagator.extract(carrier) {
            Some(context) => Extraction {
                context,
                origin: ContextOrigin::Propagated,
            },
            None => Extraction {
                context: Self::synthesize(),
                origin: ContextOrigin::Synthesized,
            },
        }
    }

    /// Writes the full response header set for `context`: the canonical
    /// `traceparent` plus the B3 headers, preferring inbound B3 values when
    /// the response is echoing a propagated trace.
    pub fn inject_response(
        context: &TraceContext,
        inbound: &dyn Extractor,
        outbound: &mut dyn Injector,
    ) {
        TraceContextPropagator.inject(context, outbound);
        B3MultiPropagator::inject_with_echo(context, inbound, outbound);
    }

    /// Generates a fresh, always-sampled context with non-zero ids.
    ///
    /// Always-sample is the fixed policy here: alert volume is low and
    /// traces are wanted for audit.
    fn synthesize() -> TraceContext {
        let mut rng = rand::rng();
        TraceContext {
            trace_id: non_zero_u128(&mut rng),
            span_id: non_zero_u64(&mut rng),
            sampled: true,
        }
    }
}

fn non_zero_u128(rng: &mut impl Rng) -> u128 {
    loop {
        let value: u128 = rng.random();
        if value != 0 {
            return value;
        }
    }
}

fn non_zero_u64(rng: &mut impl Rng) -> u64 {
    loop {
        let value: u64 = rng.random();
        if value != 0 {
            return value;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::text_map_propagator::TRACEPARENT_KEY;
    use super::*;

    #[test]
    fn test_extract_propagated_context() {
        let carrier = HashMap::from([(
            TRACEPARENT_KEY.to_string(),
            "00-80f198ee56343ba864fe8b2a57d3eff7-00f067aa0ba902b7-01".to_string(),
        )]);

        let extraction = AlertReceiverPropagator::extract(&carrier);

        assert_eq!(extraction.origin, ContextOrigin::Propagated);
        assert_eq!(
            extraction.context.trace_id,
            0x80f1_98ee_5634_3ba8_64fe_8b2a_57d3_eff7
        );
        assert_eq!(extraction.context.span_id, 0x00f0_67aa_0ba9_02b7);
        assert!(extraction.context.sampled);
    }

    #[test]
    fn test_extract_synthesizes_on_missing_header() {
        let carrier: HashMap<String, String> = HashMap::new();

        let extraction = AlertReceiverPropagator::extract(&carrier);

        assert_eq!(extraction.origin, ContextOrigin::Synthesized);
        assert_ne!(extraction.context.trace_id, 0);
        assert_ne!(extraction.context.span_id, 0);
        assert!(extraction.context.sampled);
    }

    #[test]
    fn test_extract_synthesizes_on_malformed_header() {
        let carrier = HashMap::from([(
            TRACEPARENT_KEY.to_string(),
            "00-not-a-real-header".to_string(),
        )]);

        let extraction = AlertReceiverPropagator::extract(&carrier);

        assert_eq!(extraction.origin, ContextOrigin::Synthesized);
        assert_ne!(extraction.context.trace_id, 0);
    }

    #[test]
    fn test_synthesized_contexts_are_unique_and_well_formed() {
        let carrier: HashMap<String, String> = HashMap::new();
        let mut trace_ids = std::collections::HashSet::new();

        for _ in 0..1000 {
            let extraction = AlertReceiverPropagator::extract(&carrier);
            let trace_id = identity::format_trace_id(&extraction.context);

            assert_eq!(trace_id.len(), 32);
            assert!(trace_id.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(
                trace_ids.insert(trace_id),
                "synthesized trace ids must not repeat"
            );
        }
    }

    #[test]
    fn test_inject_response_always_writes_traceparent() {
        let context = TraceContext {
            trace_id: 0x80f1_98ee_5634_3ba8_64fe_8b2a_57d3_eff7,
            span_id: 0x00f0_67aa_0ba9_02b7,
            sampled: true,
        };
        let inbound: HashMap<String, String> = HashMap::new();
        let mut outbound: HashMap<String, String> = HashMap::new();

        AlertReceiverPropagator::inject_response(&context, &inbound, &mut outbound);

        assert_eq!(
            outbound.get(TRACEPARENT_KEY).unwrap(),
            "00-80f198ee56343ba864fe8b2a57d3eff7-00f067aa0ba902b7-01"
        );
        assert!(outbound.contains_key("x-b3-traceid"));
        assert!(outbound.contains_key("x-b3-spanid"));
        assert!(outbound.contains_key("x-b3-sampled"));
        assert!(outbound.contains_key("x-client-trace-id"));
    }
}
