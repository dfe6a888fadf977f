// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Alert Trace Agent
//!
//! Library behind the `alerts-to-traces` service: an HTTP receiver for
//! Alertmanager-style webhook payloads that re-expresses every delivery as
//! a distributed-trace span.
//!
//! ## Architecture
//!
//! - [`propagation`]: trace context extraction/synthesis, canonical
//!   identity formatting, and response header injection (W3C + B3)
//! - [`alert_processor`]: alert payload flattening and the mapping onto
//!   span attributes, events, and status
//! - [`tracer`]: the tracer capability consumed by the processor, with an
//!   OpenTelemetry-backed and a no-op implementation
//! - [`agent`]: the HTTP accept loop and endpoint dispatch
//! - [`config`]: environment-derived configuration and service identity
//! - [`http_utils`]: shared body/response plumbing

#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]

pub mod agent;
pub mod alert_processor;
pub mod config;
pub mod http_utils;
pub mod propagation;
pub mod tracer;
