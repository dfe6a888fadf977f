// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Maps Alertmanager webhook payloads onto trace spans.
//!
//! The payload is operator/attacker-supplied and only partially well-formed,
//! so it is traversed as a generic JSON tree with an explicit default at
//! every access point rather than deserialized into a rigid schema. Absent
//! or malformed fields become the string `"None"`; an entirely unstructured
//! body is recorded against the span as an error but still produces a
//! successful response: webhook senders must never see delivery failures
//! caused by tracing-side issues.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::{http, StatusCode, Uri};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::http_utils::{
    self, log_and_create_http_response, log_and_create_propagated_http_response, HttpRequest,
    HttpResponse,
};
use crate::propagation::{identity, AlertReceiverPropagator, ContextOrigin};
use crate::tracer::{AttributeValue, FlatAttributes, SpanStatus, Tracer};

/// Name of the span recorded for each webhook delivery.
const WEBHOOK_SPAN_NAME: &str = "alert-receiver";

/// Placeholder for absent payload fields. A real string rather than an
/// omitted attribute, to keep attribute typing uniform on the tracing
/// backend.
const MISSING_VALUE: &str = "None";

/// Failure of the payload-to-span mapping step.
///
/// Never escapes the processor: it is recorded on the span and the request
/// still answers with a success status.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("alert payload is not structured JSON: {0}")]
    UnstructuredBody(#[from] serde_json::Error),
    #[error("alert payload is not a JSON object")]
    NotAnObject,
}

/// Outcome of decoding the request body.
pub enum ParsedBody {
    /// The body decoded to a JSON object.
    Structured(Value),
    /// No structured data is available; the failure travels with the
    /// outcome so it can be recorded on the span.
    Opaque(MappingError),
}

/// Decodes a request body into a JSON object, reporting failure as a value.
#[must_use]
pub fn parse_body(body: &[u8]) -> ParsedBody {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) if value.is_object() => ParsedBody::Structured(value),
        Ok(_) => ParsedBody::Opaque(MappingError::NotAnObject),
        Err(e) => ParsedBody::Opaque(MappingError::from(e)),
    }
}

/// Recursively inlines nested mappings into a single flat attribute map.
///
/// Scalar values are copied as-is; arrays and nulls are carried as their
/// JSON text rendering. Key collisions resolve last-write-wins in traversal
/// order.
#[must_use]
pub fn flatten(map: &Map<String, Value>) -> FlatAttributes {
    let mut flat = FlatAttributes::new();
    flatten_into(map, &mut flat);
    flat
}

fn flatten_into(map: &Map<String, Value>, flat: &mut FlatAttributes) {
    for (key, value) in map {
        match value {
            Value::Object(nested) => flatten_into(nested, flat),
            other => {
                flat.insert(key.clone(), attribute_value(other));
            }
        }
    }
}

fn attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::String(s) => AttributeValue::Str(s.clone()),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) if n.is_i64() => AttributeValue::Int(n.as_i64().unwrap_or_default()),
        Value::Number(n) => AttributeValue::Float(n.as_f64().unwrap_or_default()),
        other => AttributeValue::Str(other.to_string()),
    }
}

/// One named span event with its own attribute mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanEvent {
    pub name: String,
    pub attributes: FlatAttributes,
}

/// Everything the mapper derives from one payload: span attributes, the
/// ordered event sequence, and the terminal status.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    pub attributes: FlatAttributes,
    pub events: Vec<SpanEvent>,
    pub status: SpanStatus,
}

/// Builds the span data for one alert payload.
///
/// - `groupLabels`, `commonLabels` and `commonAnnotations` are flattened
///   and merged in that precedence order (later wins on collision).
/// - `receiver`, `status`, `externalURL` and `truncatedAlerts` are copied
///   verbatim, defaulting to `"None"`.
/// - `cluster` is the authority (host[:port]) of `externalURL`; absent or
///   unparsable URLs leave it unset at the span level.
/// - Each alert contributes two events, one from its labels and one from
///   its annotations. The two are never merged.
/// - Status is OK only for `"resolved"`; firing, unknown and missing all
///   mean the alert did not fully resolve, which is ERROR.
#[must_use]
pub fn build_span_data(payload: &Value) -> SpanData {
    let empty = Map::new();
    let root = payload.as_object().unwrap_or(&empty);

    let mut attributes = FlatAttributes::new();
    for section in ["groupLabels", "commonLabels", "commonAnnotations"] {
        if let Some(map) = root.get(section).and_then(Value::as_object) {
            attributes.extend(flatten(map));
        }
    }

    for field in ["receiver", "status", "externalURL", "truncatedAlerts"] {
        attributes.insert(field.to_string(), verbatim_or_default(root, field));
    }

    let cluster = root
        .get("externalURL")
        .and_then(Value::as_str)
        .and_then(|url| url.parse::<Uri>().ok())
        .and_then(|uri| uri.authority().map(|authority| authority.as_str().to_string()));
    if let Some(cluster) = &cluster {
        attributes.insert("cluster".to_string(), AttributeValue::Str(cluster.clone()));
    }
    let cluster_value = cluster
        .map(AttributeValue::Str)
        .unwrap_or_else(|| AttributeValue::Str(MISSING_VALUE.to_string()));

    let alerts: &[Value] = root
        .get("alerts")
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice);

    let mut events = Vec::with_capacity(alerts.len() * 2);
    for alert in alerts {
        let alert = alert.as_object().unwrap_or(&empty);
        let labels = alert
            .get("labels")
            .and_then(Value::as_object)
            .map_or_else(FlatAttributes::new, flatten);
        let annotations = alert
            .get("annotations")
            .and_then(Value::as_object)
            .map_or_else(FlatAttributes::new, flatten);

        let starts_at = verbatim_or_default(alert, "startsAt");
        let ends_at = verbatim_or_default(alert, "endsAt");
        let fingerprint = verbatim_or_default(alert, "fingerprint");

        let mut label_attributes = FlatAttributes::new();
        label_attributes.insert("namespace".to_string(), flat_or_default(&labels, "namespace"));
        label_attributes.insert("severity".to_string(), flat_or_default(&labels, "severity"));
        label_attributes.insert("startsAt".to_string(), starts_at.clone());
        label_attributes.insert("endsAt".to_string(), ends_at.clone());
        label_attributes.insert("fingerprint".to_string(), fingerprint.clone());
        label_attributes.insert("cluster".to_string(), cluster_value.clone());
        events.push(SpanEvent {
            name: name_or_default(&labels, "alertname"),
            attributes: label_attributes,
        });

        let mut annotation_attributes = FlatAttributes::new();
        annotation_attributes.insert(
            "runbook_url".to_string(),
            flat_or_default(&annotations, "runbook_url"),
        );
        annotation_attributes.insert("summary".to_string(), flat_or_default(&annotations, "summary"));
        annotation_attributes.insert("startsAt".to_string(), starts_at);
        annotation_attributes.insert("endsAt".to_string(), ends_at);
        annotation_attributes.insert("fingerprint".to_string(), fingerprint);
        annotation_attributes.insert("cluster".to_string(), cluster_value.clone());
        events.push(SpanEvent {
            name: name_or_default(&annotations, "description"),
            attributes: annotation_attributes,
        });
    }

    attributes.insert(
        "count".to_string(),
        AttributeValue::Int(i64::try_from(alerts.len()).unwrap_or_default()),
    );

    let status = if root.get("status").and_then(Value::as_str) == Some("resolved") {
        SpanStatus::Ok
    } else {
        SpanStatus::Error
    };

    SpanData {
        attributes,
        events,
        status,
    }
}

fn verbatim_or_default(map: &Map<String, Value>, key: &str) -> AttributeValue {
    match map.get(key) {
        Some(value) if !value.is_null() => attribute_value(value),
        _ => AttributeValue::Str(MISSING_VALUE.to_string()),
    }
}

fn flat_or_default(flat: &FlatAttributes, key: &str) -> AttributeValue {
    flat.get(key)
        .cloned()
        .unwrap_or_else(|| AttributeValue::Str(MISSING_VALUE.to_string()))
}

fn name_or_default(flat: &FlatAttributes, key: &str) -> String {
    flat.get(key)
        .map_or_else(|| MISSING_VALUE.to_string(), ToString::to_string)
}

#[async_trait]
pub trait AlertProcessor {
    /// Handles one webhook delivery end to end: extracts or synthesizes the
    /// trace context, records a span for the payload, and answers with the
    /// propagation headers for that context.
    async fn process_alert(
        &self,
        config: Arc<Config>,
        req: HttpRequest,
        tracer: Arc<dyn Tracer + Send + Sync>,
    ) -> http::Result<HttpResponse>;
}

#[derive(Clone)]
pub struct WebhookAlertProcessor {}

#[async_trait]
impl AlertProcessor for WebhookAlertProcessor {
    async fn process_alert(
        &self,
        config: Arc<Config>,
        req: HttpRequest,
        tracer: Arc<dyn Tracer + Send + Sync>,
    ) -> http::Result<HttpResponse> {
        debug!("Received alert notification to process");
        let (parts, body) = req.into_parts();

        if let Some(response) = http_utils::verify_request_content_length(
            &parts.headers,
            config.max_request_content_length,
            "Error processing alert notification",
        ) {
            return response;
        }

        let headers = http_utils::headers_to_map(&parts.headers);
        let extraction = AlertReceiverPropagator::extract(&headers);
        let context = extraction.context;
        let traceparent = identity::format_traceparent(&context);
        match extraction.origin {
            ContextOrigin::Propagated => {
                debug!(traceparent = %traceparent, "Continuing propagated trace context");
            }
            ContextOrigin::Synthesized => {
                debug!(traceparent = %traceparent, "No usable traceparent header, synthesized a new trace context");
            }
        }

        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                return log_and_create_http_response(
                    &format!("Error reading alert notification body: {e}"),
                    StatusCode::BAD_REQUEST,
                );
            }
        };

        let origin = http_utils::forwarded_source(&headers);

        match parse_body(&body_bytes) {
            ParsedBody::Structured(payload) => {
                let SpanData {
                    attributes,
                    events,
                    status,
                } = build_span_data(&payload);
                let count = attributes
                    .get("count")
                    .cloned()
                    .unwrap_or(AttributeValue::Int(0));

                let mut span = tracer.start_span(WEBHOOK_SPAN_NAME, &context, attributes);
                span.set_attribute("origin", AttributeValue::Str(origin.clone()));
                for event in events {
                    span.add_event(&event.name, event.attributes);
                }
                span.set_status(status);

                info!(
                    traceparent = %traceparent,
                    "received {count} alerts from {origin}"
                );
            }
            ParsedBody::Opaque(mapping_error) => {
                let mut span =
                    tracer.start_span(WEBHOOK_SPAN_NAME, &context, FlatAttributes::new());
                span.set_attribute("origin", AttributeValue::Str(origin));
                error!(
                    traceparent = %traceparent,
                    "Did not receive a structured alert payload: {mapping_error}"
                );
                span.record_exception(&mapping_error);
                span.set_status(SpanStatus::Error);
            }
        }

        let mut propagation_headers: HashMap<String, String> = HashMap::new();
        AlertReceiverPropagator::inject_response(&context, &headers, &mut propagation_headers);

        log_and_create_propagated_http_response(
            "Successfully converted alert notification to span events",
            StatusCode::CREATED,
            &propagation_headers,
        )
    }
}
