// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tracer capability consumed by the alert receiver.
//!
//! The receiver never talks to a tracing backend directly. It is handed an
//! `Arc<dyn Tracer>` at startup and uses it to start one span per request
//! under an explicit parent context, then appends events and attributes and
//! sets a terminal status on the returned handle. Span export, batching and
//! retries all belong to the implementation behind the trait.
//!
//! [`OtelTracer`] is the production implementation, backed by an
//! OpenTelemetry tracer. [`NoopTracer`] keeps the rest of the crate
//! testable without a live exporter.

use std::collections::HashMap;
use std::fmt;

use opentelemetry::global::{BoxedSpan, BoxedTracer};
use opentelemetry::trace::{
    Span as _, SpanContext, SpanId, SpanKind, Status, TraceContextExt, TraceFlags, TraceId,
    TraceState, Tracer as _,
};
use opentelemetry::{Context, KeyValue};

use crate::propagation::TraceContext;

/// A scalar span attribute value.
///
/// The alert payload is arbitrary JSON; everything that lands on a span is
/// first narrowed to one of these scalar shapes (non-scalar values are
/// carried as their JSON text rendering).
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Str(value) => write!(f, "{value}"),
            AttributeValue::Int(value) => write!(f, "{value}"),
            AttributeValue::Float(value) => write!(f, "{value}"),
            AttributeValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<AttributeValue> for opentelemetry::Value {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Str(value) => opentelemetry::Value::from(value),
            AttributeValue::Int(value) => opentelemetry::Value::from(value),
            AttributeValue::Float(value) => opentelemetry::Value::from(value),
            AttributeValue::Bool(value) => opentelemetry::Value::from(value),
        }
    }
}

/// A flat mapping of span or event attributes.
pub type FlatAttributes = HashMap<String, AttributeValue>;

/// Terminal span status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanStatus {
    Unset,
    Ok,
    Error,
}

/// Capability for starting spans under an explicit parent context.
pub trait Tracer {
    /// Starts a span named `name`, parented to `parent`, with the given
    /// initial attributes.
    fn start_span(
        &self,
        name: &str,
        parent: &TraceContext,
        attributes: FlatAttributes,
    ) -> Box<dyn SpanHandle>;
}

/// A handle to one in-flight span.
///
/// The receiver only ever appends to a span and sets its status once; a
/// handle is dropped at the end of the request and the span is never
/// reopened.
pub trait SpanHandle: Send {
    /// Records a named event with its own attribute mapping.
    fn add_event(&mut self, name: &str, attributes: FlatAttributes);

    /// Sets a single attribute on the span.
    fn set_attribute(&mut self, key: &str, value: AttributeValue);

    /// Sets the terminal status.
    fn set_status(&mut self, status: SpanStatus);

    /// Records an error against the span (used when mapping itself fails).
    fn record_exception(&mut self, error: &(dyn std::error::Error + 'static));
}

/// Production tracer backed by an OpenTelemetry tracer.
///
/// Constructed once at startup and passed into the request path; the
/// library itself never reaches for a global tracer.
pub struct OtelTracer {
    tracer: BoxedTracer,
}

impl OtelTracer {
    #[must_use]
    pub fn new(tracer: BoxedTracer) -> Self {
        OtelTracer { tracer }
    }
}

impl Tracer for OtelTracer {
    fn start_span(
        &self,
        name: &str,
        parent: &TraceContext,
        attributes: FlatAttributes,
    ) -> Box<dyn SpanHandle> {
        // The parent arrived over the wire, so it is a remote span context.
        let parent_context = SpanContext::new(
            TraceId::from_bytes(parent.trace_id.to_be_bytes()),
            SpanId::from_bytes(parent.span_id.to_be_bytes()),
            if parent.sampled {
                TraceFlags::SAMPLED
            } else {
                TraceFlags::default()
            },
            true,
            TraceState::default(),
        );
        let parent_context = Context::new().with_remote_span_context(parent_context);

        let span = self
            .tracer
            .span_builder(name.to_string())
            .with_kind(SpanKind::Server)
            .with_attributes(key_values(attributes))
            .start_with_context(&self.tracer, &parent_context);

        Box::new(OtelSpanHandle { span })
    }
}

struct OtelSpanHandle {
    span: BoxedSpan,
}

impl SpanHandle for OtelSpanHandle {
    fn add_event(&mut self, name: &str, attributes: FlatAttributes) {
        self.span.add_event(name.to_string(), key_values(attributes));
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        self.span
            .set_attribute(KeyValue::new(key.to_string(), opentelemetry::Value::from(value)));
    }

    fn set_status(&mut self, status: SpanStatus) {
        self.span.set_status(match status {
            SpanStatus::Unset => Status::Unset,
            SpanStatus::Ok => Status::Ok,
            SpanStatus::Error => Status::error(""),
        });
    }

    fn record_exception(&mut self, error: &(dyn std::error::Error + 'static)) {
        self.span.record_error(error);
    }
}

fn key_values(attributes: FlatAttributes) -> Vec<KeyValue> {
    attributes
        .into_iter()
        .map(|(key, value)| KeyValue::new(key, opentelemetry::Value::from(value)))
        .collect()
}

/// Tracer that records nothing. Used in tests and as a stand-in when no
/// exporter is wanted.
#[derive(Clone, Copy, Default)]
pub struct NoopTracer;

struct NoopSpanHandle;

impl Tracer for NoopTracer {
    fn start_span(
        &self,
        _name: &str,
        _parent: &TraceContext,
        _attributes: FlatAttributes,
    ) -> Box<dyn SpanHandle> {
        Box::new(NoopSpanHandle)
    }
}

impl SpanHandle for NoopSpanHandle {
    fn add_event(&mut self, _name: &str, _attributes: FlatAttributes) {}

    fn set_attribute(&mut self, _key: &str, _value: AttributeValue) {}

    fn set_status(&mut self, _status: SpanStatus) {}

    fn record_exception(&mut self, _error: &(dyn std::error::Error + 'static)) {}
}
