// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Carrier traits for trace context propagation.
//!
//! Carriers abstract the transport that trace context travels in (HTTP
//! headers in this service) so propagators can be tested against plain maps.
//! All implementations are case-insensitive: HTTP header names arrive in
//! whatever case the sender chose.
//!
//! # Inspired By
//!
//! Code inspired and adapted from the OpenTelemetry Rust project:
//! <https://github.com/open-telemetry/opentelemetry-rust/blob/main/opentelemetry/src/propagation/mod.rs>

use std::collections::HashMap;

/// Trait for injecting trace context into a carrier.
///
/// Keys are normalized to lowercase so a later case-insensitive lookup
/// always finds them.
pub trait Injector {
    /// Sets a key-value pair in the carrier. The key is lowercased.
    fn set(&mut self, key: &str, value: String);
}

/// Trait for extracting trace context from a carrier.
///
/// Lookups are case-insensitive; `keys` returns the stored (lowercase)
/// forms.
pub trait Extractor {
    /// Gets a value from the carrier by key (case-insensitive).
    fn get(&self, key: &str) -> Option<&str>;

    /// Gets all keys present in the carrier.
    fn keys(&self) -> Vec<&str>;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<&str> {
        self.get(&key.to_lowercase()).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect::<Vec<_>>()
    }
}
