// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error type for trace context propagation operations.
//!
//! Propagation errors are non-fatal: an extract failure means the request
//! starts a fresh synthesized trace, an inject failure means a header is
//! skipped. They exist so parse failures can be logged with enough context
//! to find the offending sender, never so they can be surfaced to a caller.

use thiserror::Error;

/// Error during trace context extraction or injection.
///
/// Formatted as: `"Cannot {operation} from {message}, {propagator_name}"`
#[derive(Error, Debug, Copy, Clone)]
#[error("Cannot {} from {}, {}", operation, message, propagator_name)]
pub struct Error {
    /// Description of what went wrong, e.g. `"invalid traceparent"`.
    message: &'static str,
    /// Name of the propagator that encountered the error.
    propagator_name: &'static str,
    /// Operation that failed (`"extract"` or `"inject"`).
    operation: &'static str,
}

impl Error {
    /// Creates an extraction error.
    #[must_use]
    pub fn extract(message: &'static str, propagator_name: &'static str) -> Self {
        Self {
            message,
            propagator_name,
            operation: "extract",
        }
    }
}
