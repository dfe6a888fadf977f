// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock implementations of alert receiver components for testing

use std::sync::{Arc, Mutex};

use alert_trace_agent::alert_processor::AlertProcessor;
use alert_trace_agent::config::Config;
use alert_trace_agent::http_utils::{Body, HttpRequest, HttpResponse};
use alert_trace_agent::propagation::TraceContext;
use alert_trace_agent::tracer::{AttributeValue, FlatAttributes, SpanHandle, SpanStatus, Tracer};
use hyper::http;

/// Mock alert processor that returns 200 OK for all requests
#[allow(dead_code)]
pub struct MockAlertProcessor;

#[async_trait::async_trait]
impl AlertProcessor for MockAlertProcessor {
    async fn process_alert(
        &self,
        _config: Arc<Config>,
        _req: HttpRequest,
        _tracer: Arc<dyn Tracer + Send + Sync>,
    ) -> http::Result<HttpResponse> {
        hyper::Response::builder()
            .status(200)
            .body(Body::from("{}"))
    }
}

/// One span as observed through the recording tracer.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedSpan {
    pub name: String,
    pub parent: TraceContext,
    pub attributes: FlatAttributes,
    pub events: Vec<(String, FlatAttributes)>,
    pub status: SpanStatus,
    pub exceptions: Vec<String>,
}

/// Tracer that records every span operation for later assertions.
#[derive(Clone, Default)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl RecordingTracer {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all spans recorded so far.
    #[allow(dead_code)]
    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.spans.lock().unwrap().clone()
    }
}

impl Tracer for RecordingTracer {
    fn start_span(
        &self,
        name: &str,
        parent: &TraceContext,
        attributes: FlatAttributes,
    ) -> Box<dyn SpanHandle> {
        let mut spans = self.spans.lock().unwrap();
        spans.push(RecordedSpan {
            name: name.to_string(),
            parent: *parent,
            attributes,
            events: Vec::new(),
            status: SpanStatus::Unset,
            exceptions: Vec::new(),
        });
        Box::new(RecordingSpanHandle {
            spans: self.spans.clone(),
            index: spans.len() - 1,
        })
    }
}

struct RecordingSpanHandle {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
    index: usize,
}

impl SpanHandle for RecordingSpanHandle {
    fn add_event(&mut self, name: &str, attributes: FlatAttributes) {
        let mut spans = self.spans.lock().unwrap();
        spans[self.index].events.push((name.to_string(), attributes));
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        let mut spans = self.spans.lock().unwrap();
        spans[self.index].attributes.insert(key.to_string(), value);
    }

    fn set_status(&mut self, status: SpanStatus) {
        let mut spans = self.spans.lock().unwrap();
        spans[self.index].status = status;
    }

    fn record_exception(&mut self, error: &(dyn std::error::Error + 'static)) {
        let mut spans = self.spans.lock().unwrap();
        spans[self.index].exceptions.push(error.to_string());
    }
}
