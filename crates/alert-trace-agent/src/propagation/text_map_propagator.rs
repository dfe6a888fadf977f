// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Text map propagators for the W3C TraceContext and B3 multi-header
//! formats.
//!
//! # W3C TraceContext
//!
//! The `TraceContextPropagator` extracts and injects the standard
//! `traceparent` header:
//!
//! ```text
//! traceparent: 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01
//! ```
//!
//! Only version `00` is accepted on extraction; anything else (wrong
//! length, non-hex segments, all-zero ids, unknown versions, trailing
//! segments) is treated as if the header were absent. The caller decides
//! what "absent" means (this service synthesizes a fresh context).
//!
//! # B3 Multi-Header
//!
//! The `B3MultiPropagator` writes the Zipkin-style header set on responses
//! (`x-b3-traceid`, `x-b3-spanid`, `x-b3-parentspanid`, `x-b3-sampled`) plus
//! the Envoy `x-client-trace-id`. Values already present on the inbound
//! request are echoed back unchanged so a caller's own B3 ids are never
//! silently overwritten; missing values are derived from the context.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::propagation::{
    carrier::{Extractor, Injector},
    error::Error,
    identity, Propagator, TraceContext,
};

/// HTTP header key for the W3C traceparent value.
pub const TRACEPARENT_KEY: &str = "traceparent";

/// HTTP header key for the B3 trace id (32 lowercase hex characters here).
pub const B3_TRACE_ID_KEY: &str = "x-b3-traceid";

/// HTTP header key for the B3 span id (16 lowercase hex characters).
pub const B3_SPAN_ID_KEY: &str = "x-b3-spanid";

/// HTTP header key for the B3 parent span id. Echo-only; see
/// [`B3MultiPropagator::inject_with_echo`].
pub const B3_PARENT_SPAN_ID_KEY: &str = "x-b3-parentspanid";

/// HTTP header key for the B3 sampling decision (`1` or `0`).
pub const B3_SAMPLED_KEY: &str = "x-b3-sampled";

/// HTTP header key for the Envoy client trace id.
pub const CLIENT_TRACE_ID_KEY: &str = "x-client-trace-id";

lazy_static! {
    /// Regex for parsing a W3C traceparent header.
    ///
    /// `version(2 hex)-traceid(32 hex)-spanid(16 hex)-flags(2 hex)` with an
    /// optional trailing `-...` captured for version validation.
    static ref TRACEPARENT_REGEX: Regex =
        Regex::new(r"(?i)^([a-f0-9]{2})-([a-f0-9]{32})-([a-f0-9]{16})-([a-f0-9]{2})(-.*)?$")
            .expect("failed creating regex");

    /// Regex for detecting invalid all-zero id segments.
    static ref INVALID_SEGMENT_REGEX: Regex = Regex::new(r"^0+$").expect("failed creating regex");
}

/// Parsed W3C traceparent header components.
struct Traceparent {
    /// 128-bit trace identifier.
    trace_id: u128,
    /// 64-bit span identifier.
    span_id: u64,
    /// Bit 0 of the flags byte.
    sampled: bool,
}

/// Propagator for the W3C TraceContext format.
#[derive(Clone, Copy)]
pub struct TraceContextPropagator;

impl Propagator for TraceContextPropagator {
    fn extract(&self, carrier: &dyn Extractor) -> Option<TraceContext> {
        let tp = carrier.get(TRACEPARENT_KEY)?.trim();

        match Self::extract_traceparent(tp) {
            Ok(traceparent) => Some(TraceContext {
                trace_id: traceparent.trace_id,
                span_id: traceparent.span_id,
                sampled: traceparent.sampled,
            }),
            Err(e) => {
                debug!("Failed to extract traceparent: {e}");
                None
            }
        }
    }

    fn inject(&self, context: &TraceContext, carrier: &mut dyn Injector) {
        carrier.set(TRACEPARENT_KEY, identity::format_traceparent(context));
    }
}

impl TraceContextPropagator {
    fn extract_traceparent(traceparent: &str) -> Result<Traceparent, Error> {
        let captures = TRACEPARENT_REGEX
            .captures(traceparent)
            .ok_or_else(|| Error::extract("invalid traceparent", "traceparent"))?;

        let version = &captures[1];
        let trace_id = &captures[2];
        let span_id = &captures[3];
        let flags = &captures[4];
        let tail = captures.get(5).map_or("", |m| m.as_str());

        Self::extract_version(version, tail)?;

        let trace_id = Self::extract_trace_id(trace_id)?;
        let span_id = Self::extract_span_id(span_id)?;

        let trace_flags = u8::from_str_radix(flags, 16)
            .map_err(|_| Error::extract("Failed to decode trace_flags", "traceparent"))?;
        let sampled = trace_flags & 0x1 != 0;

        Ok(Traceparent {
            trace_id,
            span_id,
            sampled,
        })
    }

    fn extract_version(version: &str, tail: &str) -> Result<(), Error> {
        if version != "00" {
            return Err(Error::extract(
                "unknown traceparent version",
                "traceparent",
            ));
        }

        if !tail.is_empty() {
            return Err(Error::extract(
                "Traceparent with version `00` should contain only 4 values delimited by `-`",
                "traceparent",
            ));
        }

        Ok(())
    }

    fn extract_trace_id(trace_id: &str) -> Result<u128, Error> {
        if INVALID_SEGMENT_REGEX.is_match(trace_id) {
            return Err(Error::extract(
                "`0` value for trace_id is invalid",
                "traceparent",
            ));
        }

        u128::from_str_radix(trace_id, 16)
            .map_err(|_| Error::extract("Failed to decode trace_id", "traceparent"))
    }

    fn extract_span_id(span_id: &str) -> Result<u64, Error> {
        if INVALID_SEGMENT_REGEX.is_match(span_id) {
            return Err(Error::extract(
                "`0` value for span_id is invalid",
                "traceparent",
            ));
        }

        u64::from_str_radix(span_id, 16)
            .map_err(|_| Error::extract("Failed to decode span_id", "traceparent"))
    }
}

/// Propagator for the B3 multi-header response set.
///
/// This propagator only writes headers. Inbound B3 headers are not used for
/// context extraction (the W3C header is the single extraction source),
/// but they prime the outbound values so a caller that already speaks B3
/// sees its own ids reflected back.
#[derive(Clone, Copy)]
pub struct B3MultiPropagator;

impl B3MultiPropagator {
    /// Writes the B3 header set for `context`, preferring values already
    /// present on the inbound carrier.
    ///
    /// `x-b3-parentspanid` is only ever echoed: a context extracted or
    /// synthesized at this hop has no parent id distinct from its own span
    /// id, so there is nothing meaningful to derive.
    pub fn inject_with_echo(
        context: &TraceContext,
        inbound: &dyn Extractor,
        outbound: &mut dyn Injector,
    ) {
        Self::echo_or(inbound, outbound, B3_TRACE_ID_KEY, || {
            identity::format_trace_id(context)
        });
        Self::echo_or(inbound, outbound, B3_SPAN_ID_KEY, || {
            identity::format_span_id(context)
        });
        if let Some(parent_span_id) = inbound.get(B3_PARENT_SPAN_ID_KEY) {
            outbound.set(B3_PARENT_SPAN_ID_KEY, parent_span_id.to_string());
        }
        Self::echo_or(inbound, outbound, B3_SAMPLED_KEY, || {
            if context.sampled { "1" } else { "0" }.to_string()
        });
        Self::echo_or(inbound, outbound, CLIENT_TRACE_ID_KEY, || {
            identity::format_trace_id(context)
        });
    }

    fn echo_or(
        inbound: &dyn Extractor,
        outbound: &mut dyn Injector,
        key: &str,
        derived: impl FnOnce() -> String,
    ) {
        match inbound.get(key) {
            Some(value) => outbound.set(key, value.to_string()),
            None => outbound.set(key, derived()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn carrier_with_traceparent(value: &str) -> HashMap<String, String> {
        HashMap::from([(TRACEPARENT_KEY.to_string(), value.to_string())])
    }

    macro_rules! test_traceparent_rejected {
        ($($name:ident: $value:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let carrier = carrier_with_traceparent($value);
                    assert!(
                        TraceContextPropagator.extract(&carrier).is_none(),
                        "expected `{}` to be treated as absent",
                        $value
                    );
                }
            )*
        }
    }

    test_traceparent_rejected! {
        rejects_garbage: "invalid",
        rejects_short_trace_id: "00-4bf92f3577b34da6-00f067aa0ba902b7-01",
        rejects_long_trace_id: "00-4bf92f3577b34da6a3ce929d0e0e4736ff-00f067aa0ba902b7-01",
        rejects_short_span_id: "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa-01",
        rejects_non_hex_trace_id: "00-4bf92f3577b34da6a3ce929d0e0e47zz-00f067aa0ba902b7-01",
        rejects_zero_trace_id: "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
        rejects_zero_span_id: "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
        rejects_unknown_version: "01-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        rejects_ff_version: "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        rejects_version_00_with_tail: "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
        rejects_missing_flags: "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",
    }

    #[test]
    fn test_extract_valid_traceparent() {
        let carrier = carrier_with_traceparent(
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        );

        let context = TraceContextPropagator
            .extract(&carrier)
            .expect("couldn't extract trace context");

        assert_eq!(context.trace_id, 0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736);
        assert_eq!(context.span_id, 0x00f0_67aa_0ba9_02b7);
        assert!(context.sampled);
    }

    #[test]
    fn test_extract_not_sampled_flags() {
        let carrier = carrier_with_traceparent(
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00",
        );

        let context = TraceContextPropagator.extract(&carrier).unwrap();
        assert!(!context.sampled);
    }

    #[test]
    fn test_extract_case_insensitive_hex() {
        let carrier = carrier_with_traceparent(
            "00-4BF92F3577B34DA6A3CE929D0E0E4736-00F067AA0BA902B7-01",
        );

        let context = TraceContextPropagator.extract(&carrier).unwrap();
        assert_eq!(context.trace_id, 0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736);
    }

    #[test]
    fn test_extract_trims_whitespace() {
        let carrier = carrier_with_traceparent(
            "  00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01  ",
        );

        assert!(TraceContextPropagator.extract(&carrier).is_some());
    }

    #[test]
    fn test_extract_then_inject_round_trips() {
        let original = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
        let carrier = carrier_with_traceparent(original);

        let context = TraceContextPropagator.extract(&carrier).unwrap();

        let mut outbound: HashMap<String, String> = HashMap::new();
        TraceContextPropagator.inject(&context, &mut outbound);

        assert_eq!(outbound.get(TRACEPARENT_KEY).unwrap(), original);
    }

    #[test]
    fn test_inject_zero_pads_small_ids() {
        let context = TraceContext {
            trace_id: 0x42,
            span_id: 0x7,
            sampled: false,
        };

        let mut outbound: HashMap<String, String> = HashMap::new();
        TraceContextPropagator.inject(&context, &mut outbound);

        assert_eq!(
            outbound.get(TRACEPARENT_KEY).unwrap(),
            "00-00000000000000000000000000000042-0000000000000007-00"
        );
    }

    #[test]
    fn test_b3_inject_derives_all_values() {
        let context = TraceContext {
            trace_id: 0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736,
            span_id: 0x00f0_67aa_0ba9_02b7,
            sampled: true,
        };
        let inbound: HashMap<String, String> = HashMap::new();
        let mut outbound: HashMap<String, String> = HashMap::new();

        B3MultiPropagator::inject_with_echo(&context, &inbound, &mut outbound);

        assert_eq!(
            outbound.get(B3_TRACE_ID_KEY).unwrap(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert_eq!(outbound.get(B3_SPAN_ID_KEY).unwrap(), "00f067aa0ba902b7");
        assert_eq!(outbound.get(B3_SAMPLED_KEY).unwrap(), "1");
        assert_eq!(
            outbound.get(CLIENT_TRACE_ID_KEY).unwrap(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert!(
            !outbound.contains_key(B3_PARENT_SPAN_ID_KEY),
            "parent span id has no derived fallback"
        );
    }

    #[test]
    fn test_b3_inject_prefers_inbound_values() {
        let context = TraceContext {
            trace_id: 0x1,
            span_id: 0x2,
            sampled: true,
        };
        let mut inbound: HashMap<String, String> = HashMap::new();
        inbound.set(B3_TRACE_ID_KEY, "463ac35c9f6413ad48485a3953bb6124".to_string());
        inbound.set(B3_PARENT_SPAN_ID_KEY, "0020000000000001".to_string());
        inbound.set(B3_SAMPLED_KEY, "0".to_string());

        let mut outbound: HashMap<String, String> = HashMap::new();
        B3MultiPropagator::inject_with_echo(&context, &inbound, &mut outbound);

        assert_eq!(
            outbound.get(B3_TRACE_ID_KEY).unwrap(),
            "463ac35c9f6413ad48485a3953bb6124"
        );
        assert_eq!(
            outbound.get(B3_PARENT_SPAN_ID_KEY).unwrap(),
            "0020000000000001"
        );
        assert_eq!(outbound.get(B3_SAMPLED_KEY).unwrap(), "0");
        // Not present inbound, so still derived from the context.
        assert_eq!(outbound.get(B3_SPAN_ID_KEY).unwrap(), "0000000000000002");
    }
}
